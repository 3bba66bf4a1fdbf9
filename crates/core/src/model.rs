//! Typed object model for one extracted version of an application export.
//!
//! Every archive entry that survives extraction becomes an [`Entity`]: the
//! shared header (identifier, name, description, type tag) plus an
//! [`EntityBody`] carrying the variant-specific structure. Entities are
//! built once per archive read; the only later mutation is the reference
//! back-fill in Pass 4 and the derived flow graph in Pass 5.

use crate::code::CodeBody;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Type tag of an extracted object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ObjectType {
    Interface,
    ExpressionRule,
    Constant,
    Decision,
    Integration,
    ConnectedSystem,
    DataStore,
    Group,
    WebApi,
    TranslationSet,
    RecordType,
    ProcessModel,
    Site,
    Unknown,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Interface => "Interface",
            ObjectType::ExpressionRule => "Expression Rule",
            ObjectType::Constant => "Constant",
            ObjectType::Decision => "Decision",
            ObjectType::Integration => "Integration",
            ObjectType::ConnectedSystem => "Connected System",
            ObjectType::DataStore => "Data Store",
            ObjectType::Group => "Group",
            ObjectType::WebApi => "Web API",
            ObjectType::TranslationSet => "Translation Set",
            ObjectType::RecordType => "Record Type",
            ObjectType::ProcessModel => "Process Model",
            ObjectType::Site => "Site",
            ObjectType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cross-reference to another object by identifier.
///
/// `name` stays `None` until Pass 4 back-fills it from the object lookup
/// (either the registered name or the unresolved placeholder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub id: String,
    pub name: Option<String>,
}

impl Reference {
    pub fn new(id: impl Into<String>) -> Self {
        Reference {
            id: id.into(),
            name: None,
        }
    }

    /// A declared slot with no target. Kept so the declaration still
    /// compares, but never resolved or counted as a dependency.
    pub fn unset() -> Self {
        Reference::new("")
    }

    pub fn is_set(&self) -> bool {
        !self.id.is_empty()
    }

    /// The resolved name, or the raw identifier before resolution.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// One extracted object.
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub description: String,
    pub object_type: ObjectType,
    /// Archive path the entity was extracted from.
    pub source_path: String,
    pub body: EntityBody,
}

/// Variant-specific structure of an entity.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "variant")]
pub enum EntityBody {
    Generic(GenericObject),
    RecordType(RecordType),
    ProcessModel(ProcessModel),
    Site(Site),
}

impl Entity {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        object_type: ObjectType,
        body: EntityBody,
    ) -> Self {
        Entity {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            object_type,
            source_path: String::new(),
            body,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = path.into();
        self
    }

    pub fn as_process_model(&self) -> Option<&ProcessModel> {
        match &self.body {
            EntityBody::ProcessModel(pm) => Some(pm),
            _ => None,
        }
    }

    pub fn as_record_type(&self) -> Option<&RecordType> {
        match &self.body {
            EntityBody::RecordType(rt) => Some(rt),
            _ => None,
        }
    }

    pub fn as_generic(&self) -> Option<&GenericObject> {
        match &self.body {
            EntityBody::Generic(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_site(&self) -> Option<&Site> {
        match &self.body {
            EntityBody::Site(s) => Some(s),
            _ => None,
        }
    }

    /// Every reference-bearing field of this entity, in declaration order.
    /// Every set reference the entity declares.
    pub fn references(&self) -> Vec<&Reference> {
        let all: Vec<&Reference> = match &self.body {
            EntityBody::Generic(g) => g.references.iter().collect(),
            EntityBody::RecordType(rt) => rt
                .relationships
                .iter()
                .map(|r| &r.target)
                .chain(rt.actions.iter().map(|a| &a.process))
                .collect(),
            EntityBody::ProcessModel(pm) => pm
                .nodes
                .iter()
                .flat_map(|n| n.dependencies.iter())
                .collect(),
            EntityBody::Site(site) => site.pages.iter().map(|p| &p.target).collect(),
        };
        all.into_iter().filter(|r| r.is_set()).collect()
    }

    pub(crate) fn references_mut(&mut self) -> Vec<&mut Reference> {
        let all: Vec<&mut Reference> = match &mut self.body {
            EntityBody::Generic(g) => g.references.iter_mut().collect(),
            EntityBody::RecordType(rt) => rt
                .relationships
                .iter_mut()
                .map(|r| &mut r.target)
                .chain(rt.actions.iter_mut().map(|a| &mut a.process))
                .collect(),
            EntityBody::ProcessModel(pm) => pm
                .nodes
                .iter_mut()
                .flat_map(|n| n.dependencies.iter_mut())
                .collect(),
            EntityBody::Site(site) => site.pages.iter_mut().map(|p| &mut p.target).collect(),
        };
        all.into_iter().filter(|r| r.is_set()).collect()
    }
}

// ── Generic objects ─────────────────────────────────────────────────

/// Interfaces, rules, constants, groups, connected systems and anything the
/// dispatch table has no dedicated strategy for.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenericObject {
    /// Scalar attributes keyed by element path. For fallback extractions this
    /// holds the flattened raw substructure of the document.
    pub properties: BTreeMap<String, String>,
    /// Primary expression body (interface/rule definition, constant value
    /// expression, web API expression).
    pub code: Option<CodeBody>,
    pub references: Vec<Reference>,
}

// ── Record types ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordField {
    pub name: String,
    pub data_type: String,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    pub name: String,
    pub target: Reference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordAction {
    pub title: String,
    pub process: Reference,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordType {
    pub fields: Vec<RecordField>,
    pub relationships: Vec<Relationship>,
    pub actions: Vec<RecordAction>,
}

// ── Sites ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SitePage {
    pub name: String,
    pub target: Reference,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Site {
    pub pages: Vec<SitePage>,
}

// ── Process models ──────────────────────────────────────────────────

/// A process variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variable {
    pub name: String,
    pub data_type: String,
    pub is_parameter: bool,
    /// Nodes whose expressions read `pv!<name>`.
    pub used_in: BTreeSet<String>,
    /// Nodes whose save targets write `pv!<name>`.
    pub modified_by: BTreeSet<String>,
}

/// Structural node kind, inferred in Pass 5.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum NodeKind {
    Start,
    End,
    UserTask,
    ScriptTask,
    XorGateway,
    AndGateway,
    CallProcess,
    SendMessage,
    ReceiveMessage,
    Timer,
    /// No structural predicate matched; the raw leaves of the node are kept.
    Unknown { raw: BTreeMap<String, String> },
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Start => "Start",
            NodeKind::End => "End",
            NodeKind::UserTask => "UserTask",
            NodeKind::ScriptTask => "ScriptTask",
            NodeKind::XorGateway => "XorGateway",
            NodeKind::AndGateway => "AndGateway",
            NodeKind::CallProcess => "CallProcess",
            NodeKind::SendMessage => "SendMessage",
            NodeKind::ReceiveMessage => "ReceiveMessage",
            NodeKind::Timer => "Timer",
            NodeKind::Unknown { .. } => "Unknown",
        }
    }
}

/// Gateway marker declared on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GatewayMarker {
    Xor,
    And,
}

/// Structural facts captured at extraction time and consumed by node-kind
/// inference. Kept on the node so inference can be re-run without the XML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeShape {
    pub has_form: bool,
    pub has_expression: bool,
    pub has_save_target: bool,
    pub has_subprocess: bool,
    pub has_message_rule: bool,
    pub has_recipients: bool,
    pub has_timeout: bool,
    pub has_timer: bool,
    pub gateway: Option<GatewayMarker>,
    /// Flattened leaf text of the node element, retained for `Unknown` nodes.
    pub raw: BTreeMap<String, String>,
}

/// Property bag of a node, grouped by logical concern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeProperties {
    pub assignment: BTreeMap<String, String>,
    pub form: BTreeMap<String, String>,
    pub escalation: BTreeMap<String, String>,
    pub expressions: BTreeMap<String, CodeBody>,
    /// Remaining node settings (timer, message, subprocess, gateway and the
    /// like), flattened relative to the node element.
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    pub properties: NodeProperties,
    /// Other objects this node depends on (form, groups, subprocess, code literals).
    pub dependencies: Vec<Reference>,
    /// Save targets declared on the node's expressions (e.g. `pv!total`).
    pub save_targets: Vec<String>,
    #[serde(skip)]
    pub shape: NodeShape,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flow {
    pub id: String,
    pub source: String,
    pub target: String,
    pub condition: Option<String>,
    pub label: Option<String>,
    pub is_default: bool,
}

/// Incoming and outgoing flow identifiers of one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Adjacency {
    pub incoming: Vec<String>,
    pub outgoing: Vec<String>,
}

/// A flow whose endpoint is not declared in the owning process model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanFlow {
    pub flow_id: String,
    pub missing_endpoint: String,
}

/// Directed graph derived from a process model's nodes and flows.
///
/// Only Pass 5 constructs one; callers read it through the accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlowGraph {
    pub(crate) start_nodes: BTreeSet<String>,
    pub(crate) end_nodes: BTreeSet<String>,
    pub(crate) adjacency: BTreeMap<String, Adjacency>,
    pub(crate) unreachable: BTreeSet<String>,
    pub(crate) orphan_flows: Vec<OrphanFlow>,
}

impl FlowGraph {
    pub fn start_nodes(&self) -> &BTreeSet<String> {
        &self.start_nodes
    }

    pub fn end_nodes(&self) -> &BTreeSet<String> {
        &self.end_nodes
    }

    pub fn adjacency(&self) -> &BTreeMap<String, Adjacency> {
        &self.adjacency
    }

    pub fn unreachable(&self) -> &BTreeSet<String> {
        &self.unreachable
    }

    pub fn orphan_flows(&self) -> &[OrphanFlow] {
        &self.orphan_flows
    }

    /// Outgoing flow identifiers of `node_id`; empty for unknown nodes.
    pub fn outgoing(&self, node_id: &str) -> &[String] {
        self.adjacency
            .get(node_id)
            .map(|a| a.outgoing.as_slice())
            .unwrap_or(&[])
    }

    pub fn incoming(&self, node_id: &str) -> &[String] {
        self.adjacency
            .get(node_id)
            .map(|a| a.incoming.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessModel {
    pub variables: Vec<Variable>,
    pub nodes: Vec<Node>,
    pub flows: Vec<Flow>,
    pub graph: FlowGraph,
}

impl ProcessModel {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn flow(&self, id: &str) -> Option<&Flow> {
        self.flows.iter().find(|f| f.id == id)
    }
}
