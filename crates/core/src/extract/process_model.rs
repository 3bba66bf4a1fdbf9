//! `processModelHaul` documents.
//!
//! Extraction records what each node declares (form, expressions, message
//! rule, timer, gateway marker) in its [`NodeShape`]; node kinds and the flow
//! graph are derived afterwards by `pass5_flow`, once the whole model is known.

use super::{header, shape_mismatch, Extraction};
use crate::code::{extract_code, process_variables};
use crate::model::{
    Entity, EntityBody, Flow, GatewayMarker, Node, NodeKind, NodeProperties, NodeShape,
    ObjectType, ProcessModel, Reference, Variable,
};
use crate::xml;
use std::collections::{BTreeMap, BTreeSet};

type XmlNode<'a, 'i> = roxmltree::Node<'a, 'i>;

pub fn extract_process_model(_path: &str, root: XmlNode<'_, '_>) -> Extraction {
    let pm = xml::descendant(root, "pm").ok_or_else(|| shape_mismatch(root, "pm"))?;
    let meta = xml::child(pm, "meta").ok_or_else(|| shape_mismatch(root, "meta"))?;
    let h = header(meta)?;

    let mut nodes = Vec::new();
    let mut flows = Vec::new();
    if let Some(container) = xml::child(pm, "nodes") {
        for (i, el) in xml::children(container, "node").enumerate() {
            let node = extract_node(el, i, &h.id);
            flows.extend(connections(el, &node.id));
            nodes.push(node);
        }
    }
    if let Some(container) = xml::child(pm, "flows") {
        flows.extend(
            xml::children(container, "flow")
                .enumerate()
                .map(|(i, el)| declared_flow(el, i)),
        );
    }

    let mut variables = variables(pm);
    track_variable_usage(&mut variables, &nodes, &flows);

    let model = ProcessModel {
        variables,
        nodes,
        flows,
        graph: Default::default(),
    };
    Ok(Some(
        Entity::new(h.id, h.name, ObjectType::ProcessModel, EntityBody::ProcessModel(model))
            .with_description(h.description),
    ))
}

fn variables(pm: XmlNode<'_, '_>) -> Vec<Variable> {
    let Some(pvs) = xml::child(pm, "pvs") else {
        return Vec::new();
    };
    xml::children(pvs, "pv")
        .filter_map(|pv| {
            Some(Variable {
                name: xml::object_name(pv)?,
                data_type: xml::attr_or_child(pv, "type").unwrap_or_default(),
                is_parameter: xml::attr_or_child(pv, "parameter")
                    .map(|v| xml::parse_bool(&v))
                    .unwrap_or(false),
                used_in: BTreeSet::new(),
                modified_by: BTreeSet::new(),
            })
        })
        .collect()
}

/// Ordered, de-duplicated dependency list that never contains the owning
/// process model itself.
struct Dependencies<'p> {
    owner: &'p str,
    seen: BTreeSet<String>,
    list: Vec<Reference>,
}

impl<'p> Dependencies<'p> {
    fn new(owner: &'p str) -> Self {
        Dependencies {
            owner,
            seen: BTreeSet::new(),
            list: Vec::new(),
        }
    }

    fn push(&mut self, id: String) {
        if id != self.owner && self.seen.insert(id.clone()) {
            self.list.push(Reference::new(id));
        }
    }
}

fn extract_node(el: XmlNode<'_, '_>, index: usize, process_id: &str) -> Node {
    let ac = xml::child(el, "ac");
    let scopes: Vec<XmlNode<'_, '_>> = std::iter::once(el).chain(ac).collect();
    let part = |name: &str| scopes.iter().find_map(|s| xml::child(*s, name));

    let id = xml::identifier(el).unwrap_or_else(|| format!("node-{}", index));
    let name = xml::object_name(el)
        .or_else(|| ac.and_then(xml::object_name))
        .unwrap_or_default();

    let mut shape = NodeShape::default();
    let mut properties = NodeProperties::default();
    let mut deps = Dependencies::new(process_id);
    let mut save_targets = Vec::new();

    if let Some(form) = part("form") {
        shape.has_form = true;
        properties.form = xml::flatten(form);
        let interface = xml::attr_or_child(form, "interfaceUuid")
            .or_else(|| xml::attr_or_child(form, "uiObjectUuid"))
            .or_else(|| xml::identifier(form));
        if let Some(interface) = interface {
            deps.push(interface);
        }
    }

    let mut expressions = Vec::new();
    for scope in &scopes {
        expressions.extend(xml::children(*scope, "expression"));
        if let Some(container) = xml::child(*scope, "expressions") {
            expressions.extend(xml::children(container, "expression"));
        }
    }
    for (i, expr) in expressions.into_iter().enumerate() {
        let expr_name = xml::attr(expr, "name")
            .map(str::to_string)
            .unwrap_or_else(|| format!("expression{}", i));
        if let Some(target) = xml::attr_or_child(expr, "saveInto") {
            shape.has_save_target = true;
            save_targets.push(target);
        }
        let field = xml::child(expr, "value").unwrap_or(expr);
        if let Some(code) = extract_code(field) {
            shape.has_expression = true;
            for id in code.referenced_identifiers() {
                deps.push(id);
            }
            properties.expressions.insert(expr_name, code);
        }
    }

    if let Some(assignment) = part("assignment") {
        properties.assignment = xml::flatten(assignment);
        assignment
            .descendants()
            .filter(|d| d.is_element() && matches!(xml::local_name(*d), "group" | "groupUuid"))
            .filter_map(xml::text)
            .for_each(|g| deps.push(g));
    }

    if let Some(escalation) = part("escalation") {
        properties.escalation = xml::flatten(escalation);
    }

    if let Some(subprocess) = part("subprocess") {
        shape.has_subprocess = true;
        if let Some(target) =
            xml::attr_or_child(subprocess, "processModelUuid").or_else(|| xml::identifier(subprocess))
        {
            deps.push(target);
        }
    }

    if let Some(message) = part("message") {
        shape.has_message_rule = xml::attr(message, "rule").is_some() || xml::child(message, "rule").is_some();
        shape.has_recipients = xml::child(message, "recipients").is_some();
        shape.has_timeout = xml::attr(message, "timeout").is_some() || xml::child(message, "timeout").is_some();
    }

    shape.has_timer = scopes.iter().any(|s| {
        declares_schedule(*s) || xml::child(*s, "timer").is_some_and(declares_schedule)
    });

    shape.gateway = part("gateway")
        .and_then(|g| xml::attr(g, "type"))
        .and_then(|t| match t.trim().to_ascii_lowercase().as_str() {
            "xor" => Some(GatewayMarker::Xor),
            "and" => Some(GatewayMarker::And),
            _ => None,
        });

    shape.raw = xml::flatten(el);
    properties.config = node_config(&shape.raw);

    Node {
        id,
        name,
        kind: NodeKind::Unknown {
            raw: BTreeMap::new(),
        },
        properties,
        dependencies: deps.list,
        save_targets,
        shape,
    }
}

/// Parts of a node captured elsewhere: its header, the grouped property maps,
/// expressions (with their save targets) and outgoing connections.
const PROJECTED_PARTS: &[&str] = &[
    "form",
    "assignment",
    "escalation",
    "expression",
    "expressions",
    "connections",
];

fn node_config(raw: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    raw.iter()
        .filter(|(key, _)| !is_projected_key(key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn is_projected_key(key: &str) -> bool {
    let (path, attribute) = match key.split_once('@') {
        Some((path, attribute)) => (path, Some(attribute)),
        None => (key, None),
    };
    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.split('[').next().unwrap_or(s))
        .collect();
    if segments.iter().any(|s| PROJECTED_PARTS.contains(s)) {
        return true;
    }
    let header = |name: &str| matches!(name, "uuid" | "id" | "name");
    let rest = match segments.as_slice() {
        ["ac", rest @ ..] => rest,
        all => all,
    };
    match (rest.first(), attribute) {
        (Some(first), _) => header(*first),
        (None, Some(a)) => header(a),
        (None, None) => false,
    }
}

fn declares_schedule(node: XmlNode<'_, '_>) -> bool {
    xml::child(node, "duration").is_some() || xml::child(node, "datetime").is_some()
}

/// Outgoing connections declared inline on a node.
fn connections(el: XmlNode<'_, '_>, source: &str) -> Vec<Flow> {
    let Some(container) = xml::child(el, "connections") else {
        return Vec::new();
    };
    xml::children(container, "connection")
        .enumerate()
        .map(|(i, c)| {
            let target = xml::attr_or_child(c, "to").unwrap_or_default();
            Flow {
                id: xml::identifier(c).unwrap_or_else(|| format!("{}->{}#{}", source, target, i)),
                source: source.to_string(),
                target,
                condition: xml::attr_or_child(c, "condition"),
                label: xml::attr_or_child(c, "label"),
                is_default: is_default(c),
            }
        })
        .collect()
}

/// A flow declared in the model-level `<flows>` container.
fn declared_flow(el: XmlNode<'_, '_>, index: usize) -> Flow {
    Flow {
        id: xml::identifier(el).unwrap_or_else(|| format!("flow-{}", index)),
        source: xml::attr_or_child(el, "from").unwrap_or_default(),
        target: xml::attr_or_child(el, "to").unwrap_or_default(),
        condition: xml::attr_or_child(el, "condition"),
        label: xml::attr_or_child(el, "label"),
        is_default: is_default(el),
    }
}

fn is_default(el: XmlNode<'_, '_>) -> bool {
    xml::attr_or_child(el, "default")
        .map(|v| xml::parse_bool(&v))
        .unwrap_or(false)
}

fn track_variable_usage(variables: &mut [Variable], nodes: &[Node], flows: &[Flow]) {
    let mut reads: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut writes: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for node in nodes {
        for code in node.properties.expressions.values() {
            for var in process_variables(&code.raw) {
                reads.entry(var).or_default().insert(node.id.clone());
            }
        }
        for target in &node.save_targets {
            let mut names = process_variables(target);
            if names.is_empty() {
                names.insert(target.trim().to_string());
            }
            for var in names {
                writes.entry(var).or_default().insert(node.id.clone());
            }
        }
    }
    for flow in flows {
        if let Some(condition) = &flow.condition {
            for var in process_variables(condition) {
                reads.entry(var).or_default().insert(flow.source.clone());
            }
        }
    }

    for var in variables {
        if let Some(users) = reads.remove(&var.name) {
            var.used_in = users;
        }
        if let Some(writers) = writes.remove(&var.name) {
            var.modified_by = writers;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const APPROVAL_PROCESS: &str = r#"<processModelHaul>
      <process_model_port>
        <pm>
          <meta>
            <uuid>_pm-1</uuid>
            <name><string-map><pair><locale lang="en"/><value>Approve Order</value></pair></string-map></name>
            <desc>Routes orders for approval</desc>
          </meta>
          <pvs>
            <pv name="total"><type>Number (Decimal)</type></pv>
            <pv name="approved" type="Boolean" parameter="true"/>
          </pvs>
          <nodes>
            <node uuid="n-start">
              <ac><name>Start</name></ac>
              <connections><connection><to>n-calc</to></connection></connections>
            </node>
            <node uuid="n-calc">
              <ac>
                <name>Compute Total</name>
                <expressions>
                  <expression name="sum" saveInto="pv!total">rule!orderTotal(#"_r-1", pv!approved)</expression>
                </expressions>
              </ac>
              <connections><connection><to>n-gw</to></connection></connections>
            </node>
            <node uuid="n-gw">
              <ac><name>Large?</name><gateway type="XOR"/></ac>
              <connections>
                <connection><to>n-review</to><condition>pv!total &gt; 1000</condition></connection>
                <connection default="true"><to>n-end</to></connection>
              </connections>
            </node>
            <node uuid="n-review">
              <ac>
                <name>Review</name>
                <form interfaceUuid="_i-1"/>
                <assignment><group>_g-1</group></assignment>
              </ac>
              <connections><connection><to>n-end</to></connection></connections>
            </node>
            <node uuid="n-end"><ac><name>End</name></ac></node>
          </nodes>
        </pm>
      </process_model_port>
    </processModelHaul>"#;

    fn extract(xml_text: &str) -> Entity {
        let doc = roxmltree::Document::parse(xml_text).unwrap();
        extract_process_model("processModel/_pm-1.xml", doc.root_element())
            .unwrap()
            .unwrap()
    }

    #[test]
    fn header_is_read_from_meta() {
        let entity = extract(APPROVAL_PROCESS);
        assert_eq!(entity.id, "_pm-1");
        assert_eq!(entity.name, "Approve Order");
        assert_eq!(entity.description, "Routes orders for approval");
        assert_eq!(entity.object_type, ObjectType::ProcessModel);
    }

    #[test]
    fn nodes_and_inline_connections() {
        let entity = extract(APPROVAL_PROCESS);
        let pm = entity.as_process_model().unwrap();
        let ids: Vec<&str> = pm.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n-start", "n-calc", "n-gw", "n-review", "n-end"]);
        assert_eq!(pm.flows.len(), 5);

        let conditional = pm.flows.iter().find(|f| f.target == "n-review").unwrap();
        assert_eq!(conditional.source, "n-gw");
        assert_eq!(conditional.condition.as_deref(), Some("pv!total > 1000"));
        let default = pm
            .flows
            .iter()
            .find(|f| f.source == "n-gw" && f.target == "n-end")
            .unwrap();
        assert!(default.is_default);
        assert_eq!(default.id, "n-gw->n-end#1");
    }

    #[test]
    fn node_shapes_and_dependencies() {
        let entity = extract(APPROVAL_PROCESS);
        let pm = entity.as_process_model().unwrap();

        let calc = pm.node("n-calc").unwrap();
        assert!(calc.shape.has_expression);
        assert!(calc.shape.has_save_target);
        assert_eq!(calc.save_targets, vec!["pv!total".to_string()]);
        assert!(calc.properties.expressions.contains_key("sum"));
        assert_eq!(calc.dependencies, vec![Reference::new("_r-1")]);

        let gw = pm.node("n-gw").unwrap();
        assert_eq!(gw.shape.gateway, Some(GatewayMarker::Xor));

        let review = pm.node("n-review").unwrap();
        assert!(review.shape.has_form);
        let deps: Vec<&str> = review.dependencies.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(deps, vec!["_i-1", "_g-1"]);
        assert_eq!(
            review.properties.assignment.get("group").map(String::as_str),
            Some("_g-1")
        );
    }

    #[test]
    fn variables_track_readers_and_writers() {
        let entity = extract(APPROVAL_PROCESS);
        let pm = entity.as_process_model().unwrap();

        let total = &pm.variables[0];
        assert_eq!(total.name, "total");
        assert_eq!(total.data_type, "Number (Decimal)");
        assert!(!total.is_parameter);
        assert_eq!(total.modified_by.iter().collect::<Vec<_>>(), vec!["n-calc"]);
        assert_eq!(total.used_in.iter().collect::<Vec<_>>(), vec!["n-gw"]);

        let approved = &pm.variables[1];
        assert!(approved.is_parameter);
        assert_eq!(approved.used_in.iter().collect::<Vec<_>>(), vec!["n-calc"]);
        assert!(approved.modified_by.is_empty());
    }

    #[test]
    fn timer_and_message_facts() {
        let entity = extract(
            r#"<processModelHaul><pm><meta><uuid>_pm-2</uuid><name>Wait</name></meta><nodes>
                 <node uuid="t"><ac><name>Wait a day</name><timer><duration>P1D</duration></timer></ac></node>
                 <node uuid="m"><ac><name>Notify</name><message rule="notify"><recipients>x</recipients></message></ac></node>
               </nodes><flows><flow from="t" to="m"/></flows></pm></processModelHaul>"#,
        );
        let pm = entity.as_process_model().unwrap();
        assert!(pm.node("t").unwrap().shape.has_timer);
        let m = &pm.node("m").unwrap().shape;
        assert!(m.has_message_rule && m.has_recipients && !m.has_timeout);
        assert_eq!(pm.flows[0].id, "flow-0");
        assert_eq!((pm.flows[0].source.as_str(), pm.flows[0].target.as_str()), ("t", "m"));
    }

    #[test]
    fn node_config_holds_settings_not_captured_elsewhere() {
        let entity = extract(
            r#"<processModelHaul><pm><meta><uuid>_pm-3</uuid><name>Wait</name></meta><nodes>
                 <node uuid="w" priority="2">
                   <ac>
                     <name>Wait</name>
                     <timer><duration>P1D</duration></timer>
                     <subprocess processModelUuid="_pm-9"/>
                     <expressions><expression name="e" saveInto="pv!a">1</expression></expressions>
                     <form interfaceUuid="_i-1"/>
                   </ac>
                   <connections><connection><to>w</to></connection></connections>
                 </node>
               </nodes></pm></processModelHaul>"#,
        );
        let node = entity.as_process_model().unwrap().node("w").unwrap();
        let keys: Vec<&str> = node.properties.config.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["@priority", "ac/subprocess@processModelUuid", "ac/timer/duration"]
        );
        assert_eq!(node.properties.config["ac/timer/duration"], "P1D");
        assert_eq!(node.save_targets, vec!["pv!a"]);
    }

    #[test]
    fn missing_meta_is_a_shape_mismatch() {
        let doc = roxmltree::Document::parse("<processModelHaul><pm/></processModelHaul>").unwrap();
        assert!(matches!(
            extract_process_model("processModel/x.xml", doc.root_element()),
            Err(crate::extract::ExtractError::ShapeMismatch { expected: "meta", .. })
        ));
    }
}
