//! Namespace-agnostic lookups over `roxmltree` documents.
//!
//! Export schemas mix namespaced attributes (`a:uuid`) with plain child
//! elements for the same logical field, so every helper here matches on the
//! local name only.

use roxmltree::Node;
use std::collections::BTreeMap;

pub fn local_name<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

pub fn attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|a| a.name() == name)
        .map(|a| a.value())
}

pub fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children()
        .find(|c| c.is_element() && local_name(*c) == name)
}

pub fn children<'a, 'i>(node: Node<'a, 'i>, name: &'a str) -> impl Iterator<Item = Node<'a, 'i>> + 'a
where
    'i: 'a,
{
    node.children()
        .filter(move |c| c.is_element() && local_name(*c) == name)
}

pub fn element_children<'a, 'i: 'a>(node: Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children().filter(|c| c.is_element())
}

pub fn descendant<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.descendants()
        .find(|d| d.is_element() && local_name(*d) == name)
}

/// Concatenated text content of an element, trimmed. `None` when blank.
pub fn text(node: Node<'_, '_>) -> Option<String> {
    let joined: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name).and_then(text)
}

/// A field that may be declared either as an attribute or as a child element.
pub fn attr_or_child(node: Node<'_, '_>, name: &str) -> Option<String> {
    attr(node, name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| child_text(node, name))
}

/// Text of a localizable field. Accepts both plain text and the
/// `<string-map><pair><value>` form, preferring the first pair.
pub fn localized_text(node: Node<'_, '_>) -> Option<String> {
    match descendant(node, "string-map") {
        Some(map) => children(map, "pair")
            .filter_map(|pair| child_text(pair, "value"))
            .next(),
        None => text(node),
    }
}

/// Identifier of an object element: a `uuid` attribute (any namespace),
/// then a `uuid` child, then an `id` attribute.
pub fn identifier(node: Node<'_, '_>) -> Option<String> {
    attr_or_child(node, "uuid").or_else(|| {
        attr(node, "id")
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    })
}

/// Object name: a `name` attribute, then a localizable `name` child.
pub fn object_name(node: Node<'_, '_>) -> Option<String> {
    attr(node, "name")
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| child(node, "name").and_then(localized_text))
}

pub fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Flatten the attributes and leaf texts of a subtree into `path -> text`.
///
/// Paths are slash-joined local names relative to `node`; attributes are
/// suffixed `@name`. Repeated siblings get an index suffix so no leaf is lost,
/// however large the subtree.
pub fn flatten(node: Node<'_, '_>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(node, String::new(), &mut out);
    out
}

fn flatten_into(node: Node<'_, '_>, prefix: String, out: &mut BTreeMap<String, String>) {
    for a in node.attributes() {
        out.insert(format!("{}@{}", prefix, a.name()), a.value().to_string());
    }

    let elements: Vec<Node<'_, '_>> = element_children(node).collect();
    if elements.is_empty() {
        if let Some(t) = text(node) {
            let key = if prefix.is_empty() { ".".to_string() } else { prefix };
            out.insert(key, t);
        }
        return;
    }

    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    for el in elements {
        let name = local_name(el);
        let n = seen.entry(name).or_insert(0);
        let segment = if *n == 0 {
            name.to_string()
        } else {
            format!("{}[{}]", name, n)
        };
        *n += 1;
        let path = if prefix.is_empty() {
            segment
        } else {
            format!("{}/{}", prefix, segment)
        };
        flatten_into(el, path, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaced_uuid_attribute_is_found() {
        let doc = roxmltree::Document::parse(
            r#"<x xmlns:a="urn:t"><rule a:uuid="_a-1" name="Total"/></x>"#,
        )
        .unwrap();
        let rule = doc.root_element().first_element_child().unwrap();
        assert_eq!(identifier(rule).as_deref(), Some("_a-1"));
        assert_eq!(object_name(rule).as_deref(), Some("Total"));
    }

    #[test]
    fn localized_name_reads_first_pair() {
        let doc = roxmltree::Document::parse(
            "<meta><name><string-map><pair><locale lang=\"en\"/><value>Approve</value></pair>\
             <pair><locale lang=\"fr\"/><value>Approuver</value></pair></string-map></name></meta>",
        )
        .unwrap();
        assert_eq!(object_name(doc.root_element()).as_deref(), Some("Approve"));
    }

    #[test]
    fn flatten_keeps_repeated_siblings() {
        let doc = roxmltree::Document::parse(
            "<n kind=\"x\"><a>1</a><a>2</a><b><c>3</c></b></n>",
        )
        .unwrap();
        let flat = flatten(doc.root_element());
        assert_eq!(flat.get("@kind").map(String::as_str), Some("x"));
        assert_eq!(flat.get("a").map(String::as_str), Some("1"));
        assert_eq!(flat.get("a[1]").map(String::as_str), Some("2"));
        assert_eq!(flat.get("b/c").map(String::as_str), Some("3"));
    }

    #[test]
    fn flatten_keeps_every_leaf_of_large_documents() {
        let strings: String = (0..600).map(|i| format!("<string>s{}</string>", i)).collect();
        let text = format!("<set uuid=\"_t\">{}</set>", strings);
        let doc = roxmltree::Document::parse(&text).unwrap();
        let flat = flatten(doc.root_element());
        assert_eq!(flat.len(), 601);
        assert_eq!(flat.get("string[599]").map(String::as_str), Some("s599"));
    }
}
