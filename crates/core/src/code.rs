//! Embedded expression code: verbatim extraction and indentation layout.
//!
//! Expression bodies are opaque text. Formatting only rewrites whitespace
//! between tokens: every line starts at an indentation equal to the number of
//! brackets still open at that point, with closing brackets dedented before
//! they are emitted. String literals and `/* */` comments are copied as-is.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Indentation emitted per nesting level.
pub const INDENT_UNIT: &str = "  ";

static OBJECT_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"#"([^"\s]+)""#).expect("object literal pattern"));

static PROCESS_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bpv!([A-Za-z_][A-Za-z0-9_]*)").expect("pv pattern"));

/// An expression body in both its verbatim and re-indented forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBody {
    pub raw: String,
    pub formatted: String,
}

impl CodeBody {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let formatted = format_code(&raw);
        CodeBody { raw, formatted }
    }

    pub fn char_count(&self) -> usize {
        self.formatted.chars().count()
    }

    /// Identifiers referenced through `#"<id>"` literals, in first-seen order.
    pub fn referenced_identifiers(&self) -> Vec<String> {
        referenced_identifiers(&self.raw)
    }
}

/// Extract the verbatim text of an element known to hold expression code.
///
/// All text descendants are concatenated so CDATA sections split across
/// nodes survive intact. Returns `None` for blank fields.
pub fn extract_code(field: roxmltree::Node<'_, '_>) -> Option<CodeBody> {
    let text: String = field
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(CodeBody::new(text))
    }
}

/// Identifiers referenced through `#"<id>"` object literals.
pub fn referenced_identifiers(code: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    OBJECT_LITERAL
        .captures_iter(code)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Process variable names mentioned as `pv!<name>`.
pub fn process_variables(code: &str) -> BTreeSet<String> {
    PROCESS_VARIABLE
        .captures_iter(code)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Re-indent expression code by bracket nesting depth.
pub fn format_code(raw: &str) -> String {
    let chars: Vec<char> = raw.trim().chars().collect();
    let mut out = String::with_capacity(raw.len() + raw.len() / 4);
    let mut depth = 0usize;
    let mut pending_break = false;
    let mut pending_space = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            pending_space = true;
            i += 1;
            continue;
        }

        if is_closer(c) {
            depth = depth.saturating_sub(1);
            start_line(&mut out, depth);
            out.push(c);
            pending_break = false;
            pending_space = false;
            i += 1;
            continue;
        }

        if pending_break {
            start_line(&mut out, depth);
            pending_break = false;
        } else if pending_space && !out.is_empty() && c != ',' {
            out.push(' ');
        }
        pending_space = false;

        match c {
            '"' => {
                i = copy_string(&chars, i, &mut out);
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i = copy_comment(&chars, i, &mut out);
                continue;
            }
            '(' | '{' | '[' => {
                out.push(c);
                match next_significant(&chars, i + 1) {
                    Some(j) if chars[j] == matching_closer(c) => {
                        out.push(chars[j]);
                        i = j + 1;
                        continue;
                    }
                    _ => {
                        depth += 1;
                        pending_break = true;
                    }
                }
            }
            ',' => {
                out.push(c);
                if depth > 0 {
                    pending_break = true;
                }
            }
            _ => out.push(c),
        }
        i += 1;
    }

    out
}

fn is_closer(c: char) -> bool {
    matches!(c, ')' | '}' | ']')
}

fn matching_closer(open: char) -> char {
    match open {
        '(' => ')',
        '{' => '}',
        _ => ']',
    }
}

fn next_significant(chars: &[char], from: usize) -> Option<usize> {
    (from..chars.len()).find(|&j| !chars[j].is_whitespace())
}

fn start_line(out: &mut String, depth: usize) {
    let kept = out.trim_end_matches(' ').len();
    out.truncate(kept);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    for _ in 0..depth {
        out.push_str(INDENT_UNIT);
    }
}

/// Copy a string literal starting at `start` (the opening quote). A doubled
/// quote inside the literal is an escaped quote.
fn copy_string(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        i += 1;
        if c == '"' {
            if chars.get(i) == Some(&'"') {
                out.push('"');
                i += 1;
            } else {
                return i;
            }
        }
    }
    i
}

fn copy_comment(chars: &[char], start: usize, out: &mut String) -> usize {
    let mut i = start;
    while i < chars.len() {
        out.push(chars[i]);
        if chars[i] == '/' && i >= start + 3 && chars[i - 1] == '*' {
            return i + 1;
        }
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// For each line: (indent levels, open brackets after the line's leading closers).
    fn indentation_vs_nesting(formatted: &str) -> Vec<(usize, usize)> {
        let mut depth = 0usize;
        let mut result = Vec::new();
        for line in formatted.lines() {
            let indent = line.len() - line.trim_start_matches(' ').len();
            let body = line.trim_start_matches(' ');
            let leading_closers = body.chars().take_while(|c| is_closer(*c)).count();
            let expected = depth.saturating_sub(leading_closers);
            result.push((indent / INDENT_UNIT.len(), expected));

            let mut in_string = false;
            for c in body.chars() {
                match c {
                    '"' => in_string = !in_string,
                    '(' | '{' | '[' if !in_string => depth += 1,
                    ')' | '}' | ']' if !in_string => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
        }
        result
    }

    fn significant(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn nested_call_is_indented_by_depth() {
        let raw = "a!localVariables(local!x: 1, a!boxLayout(label: \"Box\", contents: {a!textField(value: local!x)}))";
        let formatted = format_code(raw);
        assert_eq!(
            formatted,
            "a!localVariables(\n  local!x: 1,\n  a!boxLayout(\n    label: \"Box\",\n    contents: {\n      a!textField(\n        value: local!x\n      )\n    }\n  )\n)"
        );
    }

    #[test]
    fn indentation_equals_unmatched_brackets_at_every_line() {
        let raw = "if(and(ri!a, or(ri!b, ri!c)), {1, 2, {3}}, a!map(k: [1], v: fn!sum(1,2)))";
        let formatted = format_code(raw);
        for (line_no, (indent, expected)) in indentation_vs_nesting(&formatted).iter().enumerate() {
            assert_eq!(indent, expected, "line {} of:\n{}", line_no, formatted);
        }
    }

    #[test]
    fn formatting_only_changes_whitespace() {
        let raw = "a!formLayout(\n\n   label:   \"Order   (draft)\",\n contents:{ a!textField( label: \"Name, first\" ) } )";
        let formatted = format_code(raw);
        assert_eq!(significant(&formatted), significant(raw));
        assert!(formatted.contains("\"Order   (draft)\""));
        assert!(formatted.contains("\"Name, first\""));
    }

    #[test]
    fn brackets_inside_strings_and_comments_do_not_nest() {
        let raw = "concat(\"((\", /* ) { */ \"x\")";
        let formatted = format_code(raw);
        assert_eq!(formatted, "concat(\n  \"((\",\n  /* ) { */ \"x\"\n)");
    }

    #[test]
    fn comment_opener_slash_does_not_close_it() {
        let formatted = format_code("f(/*/ ) */ 1)");
        assert_eq!(formatted, "f(\n  /*/ ) */ 1\n)");
    }

    #[test]
    fn escaped_quotes_stay_inside_literal() {
        let formatted = format_code("f(\"say \"\"hi\"\" (now)\")");
        assert_eq!(formatted, "f(\n  \"say \"\"hi\"\" (now)\"\n)");
    }

    #[test]
    fn empty_brackets_stay_together() {
        assert_eq!(format_code("now()"), "now()");
        assert_eq!(format_code("f( { } )"), "f(\n  {}\n)");
    }

    #[test]
    fn unbalanced_closers_do_not_underflow() {
        let formatted = format_code("a))");
        assert_eq!(formatted, "a\n)\n)");
    }

    #[test]
    fn formatting_is_idempotent() {
        let once = format_code("a!f(x: {1, 2}, y: g(h()))");
        assert_eq!(format_code(&once), once);
    }

    #[test]
    fn object_literals_are_collected_once_in_order() {
        let code = "rule!x(#\"_a-1\", #\"_a-2\", #\"_a-1\")";
        assert_eq!(referenced_identifiers(code), vec!["_a-1", "_a-2"]);
    }

    #[test]
    fn process_variables_are_found() {
        let vars = process_variables("pv!total + pv!tax_rate * 2 & rpv!ignored");
        assert_eq!(
            vars.into_iter().collect::<Vec<_>>(),
            vec!["tax_rate".to_string(), "total".to_string()]
        );
    }

    #[test]
    fn blank_fields_yield_no_code() {
        let doc = roxmltree::Document::parse("<r><definition>  </definition></r>").unwrap();
        let field = doc.root_element().first_element_child().unwrap();
        assert!(extract_code(field).is_none());
    }

    #[test]
    fn cdata_code_is_extracted_verbatim() {
        let doc =
            roxmltree::Document::parse("<r><definition><![CDATA[a < b]]></definition></r>").unwrap();
        let field = doc.root_element().first_element_child().unwrap();
        let body = extract_code(field).unwrap();
        assert_eq!(body.raw, "a < b");
        assert_eq!(body.char_count(), 5);
    }
}
