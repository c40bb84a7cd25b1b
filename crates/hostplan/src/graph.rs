//! Dependency graph over compiled declarations
//!
//! Edges point from the resource that must be ready first to the resource
//! that waits on it:
//! - `run_after` targets before the service
//! - a socket before the service it activates
//! - the setup unit before everything it produces
//! - a group before its users
//!
//! `depends_on` is checked for resolution only; ordering comes from
//! `run_after`, as with systemd's Requires=/After= split.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::resource::{Declaration, ResourceId, ResourceKind, ServiceType};

/// A validated, acyclic graph of declarations
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<ResourceId, ()>,
    index: HashMap<ResourceId, NodeIndex>,
    order: Vec<ResourceId>,
}

impl DependencyGraph {
    /// Build the graph, rejecting duplicate ids, dangling references and cycles
    pub fn build(declarations: &[Declaration]) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for declaration in declarations {
            if index.contains_key(&declaration.id) {
                return Err(Error::DuplicateId(declaration.id.to_string()));
            }
            let node = graph.add_node(declaration.id.clone());
            index.insert(declaration.id.clone(), node);
        }

        let by_id: HashMap<&ResourceId, &Declaration> =
            declarations.iter().map(|d| (&d.id, d)).collect();

        for declaration in declarations {
            for (_, target) in declaration.references() {
                if !index.contains_key(target) {
                    return Err(Error::UnresolvedReference {
                        from: declaration.id.to_string(),
                        to: target.to_string(),
                    });
                }
            }

            if let Some(producer) = declaration.produced_by() {
                let is_oneshot = by_id
                    .get(producer)
                    .and_then(|d| d.as_service())
                    .is_some_and(|s| s.service_type == ServiceType::Oneshot);
                if !is_oneshot {
                    return Err(Error::validation(
                        declaration.id.as_str(),
                        format!("producer {} is not a oneshot service", producer),
                    ));
                }
            }

            let node = index[&declaration.id];
            for before in ordering_predecessors(declaration) {
                graph.add_edge(index[before], node, ());
            }
            if let ResourceKind::Socket(socket) = &declaration.kind {
                graph.add_edge(node, index[&socket.service], ());
            }
        }

        let sorted = toposort(&graph, None)
            .map_err(|cycle| Error::DependencyCycle(graph[cycle.node_id()].to_string()))?;
        let order = sorted.into_iter().map(|idx| graph[idx].clone()).collect();

        Ok(Self {
            graph,
            index,
            order,
        })
    }

    /// Declaration ids in an order that respects every edge
    pub fn order(&self) -> &[ResourceId] {
        &self.order
    }

    /// Position of an id in [`Self::order`]
    pub fn position(&self, id: &ResourceId) -> Option<usize> {
        self.order.iter().position(|o| o == id)
    }

    /// Whether `first` is ordered before `second` through some chain of edges
    pub fn precedes(&self, first: &ResourceId, second: &ResourceId) -> bool {
        match (self.index.get(first), self.index.get(second)) {
            (Some(&a), Some(&b)) => petgraph::algo::has_path_connecting(&self.graph, a, b, None),
            _ => false,
        }
    }

    /// Direct predecessors of a node
    pub fn predecessors(&self, id: &ResourceId) -> Vec<&ResourceId> {
        let Some(&node) = self.index.get(id) else {
            return Vec::new();
        };
        let mut preds: Vec<&ResourceId> = self
            .graph
            .neighbors_directed(node, petgraph::Direction::Incoming)
            .map(|n| &self.graph[n])
            .collect();
        preds.sort();
        preds.dedup();
        preds
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Ids that must come before this declaration
///
/// Sockets are the exception: they point forward to the service they
/// activate and are handled in [`DependencyGraph::build`].
fn ordering_predecessors(declaration: &Declaration) -> Vec<&ResourceId> {
    let mut before = Vec::new();
    match &declaration.kind {
        ResourceKind::Service(service) => before.extend(service.run_after.iter()),
        ResourceKind::PrincipalUser(user) => before.push(&user.group),
        _ => {}
    }
    if let Some(producer) = declaration.produced_by() {
        before.push(producer);
    }
    before
}
