//! Pass 5: process flow graphs.
//!
//! For each process model: build the adjacency map (orphan flows excluded),
//! infer every node's kind from its structural facts, then derive start/end
//! sets and reachability.
//!
//! Node-kind inference walks [`NODE_KIND_PRIORITY`] in order and takes the
//! first rule whose predicate holds. Several predicates can hold for one
//! node, so the order is part of the contract.

use crate::error::{Diagnostic, DiagnosticKind};
use crate::model::{
    Adjacency, Entity, EntityBody, Flow, FlowGraph, GatewayMarker, Node, NodeKind, NodeShape,
    OrphanFlow,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::warn;

/// Structural facts about one node, as seen by the kind predicates.
#[derive(Debug, Clone, Copy)]
pub struct NodeFacts<'a> {
    pub shape: &'a NodeShape,
    pub incoming: usize,
    pub outgoing: usize,
    /// Outgoing flows that carry a non-empty condition.
    pub conditional_outgoing: usize,
}

pub struct KindRule {
    pub kind: NodeKind,
    pub matches: fn(&NodeFacts<'_>) -> bool,
}

fn has_form(f: &NodeFacts<'_>) -> bool {
    f.shape.has_form
}

fn is_script(f: &NodeFacts<'_>) -> bool {
    f.shape.has_expression && f.shape.has_save_target
}

fn has_subprocess(f: &NodeFacts<'_>) -> bool {
    f.shape.has_subprocess
}

fn sends_message(f: &NodeFacts<'_>) -> bool {
    f.shape.has_message_rule && f.shape.has_recipients
}

fn receives_message(f: &NodeFacts<'_>) -> bool {
    f.shape.has_message_rule && f.shape.has_timeout
}

fn has_timer(f: &NodeFacts<'_>) -> bool {
    f.shape.has_timer
}

fn is_xor(f: &NodeFacts<'_>) -> bool {
    f.shape.gateway == Some(GatewayMarker::Xor) || (f.shape.gateway.is_none() && f.conditional_outgoing > 0)
}

fn is_and(f: &NodeFacts<'_>) -> bool {
    f.shape.gateway == Some(GatewayMarker::And)
}

fn is_start(f: &NodeFacts<'_>) -> bool {
    f.incoming == 0 && f.conditional_outgoing == 0
}

fn is_end(f: &NodeFacts<'_>) -> bool {
    f.outgoing == 0
}

/// Kind predicates in priority order. First match wins; no match is
/// `NodeKind::Unknown` with the node's raw leaves.
pub const NODE_KIND_PRIORITY: &[KindRule] = &[
    KindRule { kind: NodeKind::UserTask, matches: has_form },
    KindRule { kind: NodeKind::ScriptTask, matches: is_script },
    KindRule { kind: NodeKind::CallProcess, matches: has_subprocess },
    KindRule { kind: NodeKind::SendMessage, matches: sends_message },
    KindRule { kind: NodeKind::ReceiveMessage, matches: receives_message },
    KindRule { kind: NodeKind::Timer, matches: has_timer },
    KindRule { kind: NodeKind::XorGateway, matches: is_xor },
    KindRule { kind: NodeKind::AndGateway, matches: is_and },
    KindRule { kind: NodeKind::Start, matches: is_start },
    KindRule { kind: NodeKind::End, matches: is_end },
];

pub fn infer_node_kind(facts: &NodeFacts<'_>) -> NodeKind {
    NODE_KIND_PRIORITY
        .iter()
        .find(|rule| (rule.matches)(facts))
        .map(|rule| rule.kind.clone())
        .unwrap_or_else(|| NodeKind::Unknown {
            raw: facts.shape.raw.clone(),
        })
}

/// Build the graph for already-kinded nodes.
pub fn build_flow_graph(nodes: &[Node], flows: &[Flow]) -> FlowGraph {
    let (adjacency, orphan_flows) = connect(nodes, flows);
    finish(nodes, adjacency, orphan_flows)
}

/// Infer node kinds and attach the flow graph to a process-model entity.
/// Other entities are left untouched.
pub fn apply_flow_graph(entity: &mut Entity) -> Vec<Diagnostic> {
    let EntityBody::ProcessModel(pm) = &mut entity.body else {
        return Vec::new();
    };

    let (adjacency, orphan_flows) = connect(&pm.nodes, &pm.flows);
    let flows_by_id: BTreeMap<&str, &Flow> = pm.flows.iter().map(|f| (f.id.as_str(), f)).collect();
    let kinds: Vec<NodeKind> = pm
        .nodes
        .iter()
        .map(|node| {
            let adj = &adjacency[&node.id];
            let conditional_outgoing = adj
                .outgoing
                .iter()
                .filter_map(|id| flows_by_id.get(id.as_str()))
                .filter(|f| f.condition.as_deref().is_some_and(|c| !c.trim().is_empty()))
                .count();
            infer_node_kind(&NodeFacts {
                shape: &node.shape,
                incoming: adj.incoming.len(),
                outgoing: adj.outgoing.len(),
                conditional_outgoing,
            })
        })
        .collect();
    for (node, kind) in pm.nodes.iter_mut().zip(kinds) {
        node.kind = kind;
    }
    pm.graph = finish(&pm.nodes, adjacency, orphan_flows);

    let mut diagnostics = Vec::new();
    for orphan in &pm.graph.orphan_flows {
        warn!(
            process = %entity.id,
            flow = %orphan.flow_id,
            endpoint = %orphan.missing_endpoint,
            "orphan flow"
        );
        diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::OrphanFlow,
                &entity.source_path,
                format!(
                    "flow '{}' references undeclared node '{}'",
                    orphan.flow_id, orphan.missing_endpoint
                ),
            )
            .for_object(&entity.id),
        );
    }
    for node_id in &pm.graph.unreachable {
        diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::UnreachableNode,
                &entity.source_path,
                format!("node '{}' is not reachable from any start node", node_id),
            )
            .for_object(&entity.id),
        );
    }
    diagnostics
}

fn connect(nodes: &[Node], flows: &[Flow]) -> (BTreeMap<String, Adjacency>, Vec<OrphanFlow>) {
    let mut adjacency: BTreeMap<String, Adjacency> = nodes
        .iter()
        .map(|n| (n.id.clone(), Adjacency::default()))
        .collect();
    let mut orphans = Vec::new();

    for flow in flows {
        let missing = [&flow.source, &flow.target]
            .into_iter()
            .find(|endpoint| !adjacency.contains_key(endpoint.as_str()));
        if let Some(endpoint) = missing {
            orphans.push(OrphanFlow {
                flow_id: flow.id.clone(),
                missing_endpoint: endpoint.clone(),
            });
            continue;
        }
        if let Some(adj) = adjacency.get_mut(&flow.source) {
            adj.outgoing.push(flow.id.clone());
        }
        if let Some(adj) = adjacency.get_mut(&flow.target) {
            adj.incoming.push(flow.id.clone());
        }
    }
    (adjacency, orphans)
}

fn finish(
    nodes: &[Node],
    adjacency: BTreeMap<String, Adjacency>,
    orphan_flows: Vec<OrphanFlow>,
) -> FlowGraph {
    let mut start_nodes = BTreeSet::new();
    let mut end_nodes = BTreeSet::new();
    for node in nodes {
        let adj = &adjacency[&node.id];
        if adj.incoming.is_empty() || node.kind == NodeKind::Start {
            start_nodes.insert(node.id.clone());
        }
        if adj.outgoing.is_empty() || node.kind == NodeKind::End {
            end_nodes.insert(node.id.clone());
        }
    }

    // Flow id -> target, for walking outgoing edges.
    let mut targets: BTreeMap<&str, &str> = BTreeMap::new();
    for node in nodes {
        for flow_id in &adjacency[&node.id].incoming {
            targets.insert(flow_id.as_str(), node.id.as_str());
        }
    }

    let mut visited: BTreeSet<&str> = BTreeSet::new();
    let mut queue: VecDeque<&str> = start_nodes.iter().map(String::as_str).collect();
    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        for flow_id in &adjacency[id].outgoing {
            if let Some(next) = targets.get(flow_id.as_str()) {
                queue.push_back(*next);
            }
        }
    }
    let unreachable = nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| !visited.contains(id))
        .map(str::to_string)
        .collect();

    FlowGraph {
        start_nodes,
        end_nodes,
        adjacency,
        unreachable,
        orphan_flows,
    }
}
