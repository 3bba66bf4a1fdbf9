//! Comparable-field projection of an entity.
//!
//! Two entities are equal exactly when their projections are equal. The
//! projection holds identity-free content only: resolved reference names,
//! source paths and derived graph data are left out, and code is compared in
//! its formatted form.

use haulmerge_core::model::{
    Entity, EntityBody, GenericObject, Node, ProcessModel, RecordType, Site,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub type Fields = BTreeMap<String, Value>;

pub fn comparable_fields(entity: &Entity) -> Fields {
    let mut fields = Fields::new();
    fields.insert("name".into(), json!(entity.name));
    fields.insert("description".into(), json!(entity.description));
    fields.insert("type".into(), json!(entity.object_type.as_str()));

    match &entity.body {
        EntityBody::Generic(g) => generic_fields(g, &mut fields),
        EntityBody::RecordType(rt) => record_type_fields(rt, &mut fields),
        EntityBody::ProcessModel(pm) => process_model_fields(pm, &mut fields),
        EntityBody::Site(site) => site_fields(site, &mut fields),
    }
    fields
}

/// Fields holding expression code.
pub fn is_code_field(key: &str) -> bool {
    key == "definition" || key.contains(".expressions.")
}

fn generic_fields(g: &GenericObject, fields: &mut Fields) {
    for (k, v) in &g.properties {
        fields.insert(format!("properties.{}", k), json!(v));
    }
    if let Some(code) = &g.code {
        fields.insert("definition".into(), json!(code.formatted));
    }
    let mut refs: Vec<&str> = g.references.iter().map(|r| r.id.as_str()).collect();
    refs.sort_unstable();
    fields.insert("references".into(), json!(refs));
}

fn record_type_fields(rt: &RecordType, fields: &mut Fields) {
    let order: Vec<&str> = rt.fields.iter().map(|f| f.name.as_str()).collect();
    fields.insert("field_order".into(), json!(order));
    for f in &rt.fields {
        fields.insert(
            format!("fields.{}", f.name),
            json!({ "type": f.data_type, "required": f.required }),
        );
    }
    // Names and titles may repeat or be blank, so both lists compare in order.
    let relationships: Vec<Value> = rt
        .relationships
        .iter()
        .map(|r| json!({ "name": r.name, "target": r.target.id }))
        .collect();
    fields.insert("relationships".into(), Value::Array(relationships));
    let actions: Vec<Value> = rt
        .actions
        .iter()
        .map(|a| json!({ "title": a.title, "process": a.process.id }))
        .collect();
    fields.insert("actions".into(), Value::Array(actions));
}

fn process_model_fields(pm: &ProcessModel, fields: &mut Fields) {
    for v in &pm.variables {
        fields.insert(
            format!("variables.{}", v.name),
            json!({ "type": v.data_type, "parameter": v.is_parameter }),
        );
    }
    for node in &pm.nodes {
        fields.insert(format!("nodes.{}", node.id), node_summary(node));
        for (name, code) in &node.properties.expressions {
            fields.insert(
                format!("nodes.{}.expressions.{}", node.id, name),
                json!(code.formatted),
            );
        }
    }
    for flow in &pm.flows {
        fields.insert(
            format!("flows.{}", flow.id),
            json!({
                "source": flow.source,
                "target": flow.target,
                "condition": flow.condition,
                "label": flow.label,
                "default": flow.is_default,
            }),
        );
    }
}

fn node_summary(node: &Node) -> Value {
    let mut deps: Vec<&str> = node.dependencies.iter().map(|d| d.id.as_str()).collect();
    deps.sort_unstable();
    json!({
        "name": node.name,
        "kind": node.kind.label(),
        "assignment": node.properties.assignment,
        "form": node.properties.form,
        "escalation": node.properties.escalation,
        "config": node.properties.config,
        "save_targets": node.save_targets,
        "dependencies": deps,
    })
}

fn site_fields(site: &Site, fields: &mut Fields) {
    let pages: Vec<Value> = site
        .pages
        .iter()
        .map(|p| json!({ "name": p.name, "target": p.target.id }))
        .collect();
    fields.insert("pages".into(), Value::Array(pages));
}
