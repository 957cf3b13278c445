//! Dependency graph construction and cycle detection
//!
//! Nodes are keyed by identifier, never by short name: two packages with
//! colliding short names are distinct nodes, and two identical subtrees
//! reached via different identifiers stay distinct. Cycle detection is a
//! depth-first traversal with grey/white/black coloring; a back-edge to a
//! grey node is the cycle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ident::{IdentError, PackageIdent};
use crate::resolver::{PackageRecord, ResolveError, Resolver};

/// Errors for graph construction
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("dependency cycle: {}", format_cycle(.0))]
    CycleDetected(Vec<PackageIdent>),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("invalid import {raw:?} declared by {importer}: {source}")]
    InvalidImport {
        importer: PackageIdent,
        raw: String,
        #[source]
        source: IdentError,
    },
}

fn format_cycle(cycle: &[PackageIdent]) -> String {
    cycle
        .iter()
        .map(PackageIdent::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Ordered pair (importer, imported).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub importer: PackageIdent,
    pub imported: PackageIdent,
}

/// The complete record and edge set reachable from a seed set.
#[derive(Debug, Clone, Default)]
pub struct PackageGraph {
    records: BTreeMap<PackageIdent, PackageRecord>,
    edges: Vec<DependencyEdge>,
    seeds: Vec<PackageIdent>,
}

impl PackageGraph {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn seeds(&self) -> &[PackageIdent] {
        &self.seeds
    }

    pub fn record(&self, ident: &PackageIdent) -> Option<&PackageRecord> {
        self.records.get(ident)
    }

    pub fn records(&self) -> impl Iterator<Item = &PackageRecord> {
        self.records.values()
    }

    pub fn idents(&self) -> impl Iterator<Item = &PackageIdent> {
        self.records.keys()
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Direct dependencies of a node, in declaration order.
    pub fn dependencies(&self, ident: &PackageIdent) -> Vec<&PackageIdent> {
        self.edges
            .iter()
            .filter(|e| &e.importer == ident)
            .map(|e| &e.imported)
            .collect()
    }

    /// Direct dependents of a node.
    pub fn dependents(&self, ident: &PackageIdent) -> Vec<&PackageIdent> {
        self.edges
            .iter()
            .filter(|e| &e.imported == ident)
            .map(|e| &e.importer)
            .collect()
    }

    /// All transitive dependencies of a node, dependencies first.
    pub fn transitive_dependencies(&self, ident: &PackageIdent) -> Vec<PackageIdent> {
        let mut order: Vec<PackageIdent> = Vec::new();
        let mut seen: Vec<&PackageIdent> = Vec::new();
        self.postorder(ident, &mut seen, &mut order);
        // The node itself is last in its own postorder
        order.pop();
        order
    }

    fn postorder<'a>(
        &'a self,
        ident: &'a PackageIdent,
        seen: &mut Vec<&'a PackageIdent>,
        order: &mut Vec<PackageIdent>,
    ) {
        if seen.contains(&ident) {
            return;
        }
        seen.push(ident);
        for dep in self.dependencies(ident) {
            self.postorder(dep, seen, order);
        }
        order.push(ident.clone());
    }

    /// A dependencies-first linearization of the whole graph.
    ///
    /// Any valid linearization is acceptable; this one is deterministic
    /// (seed order, then declaration order within each node).
    pub fn topo_order(&self) -> Vec<PackageIdent> {
        let mut order: Vec<PackageIdent> = Vec::new();
        let mut seen: Vec<&PackageIdent> = Vec::new();
        for seed in &self.seeds {
            self.postorder(seed, &mut seen, &mut order);
        }
        // Nodes unreachable from seeds (none in practice) still get slots
        for ident in self.records.keys() {
            self.postorder(ident, &mut seen, &mut order);
        }
        order
    }
}

/// Node color during the DFS walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Grey,
    Black,
}

/// Builds a [`PackageGraph`] from seed identifiers via a resolver.
pub struct GraphBuilder<'a> {
    resolver: &'a dyn Resolver,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(resolver: &'a dyn Resolver) -> Self {
        Self { resolver }
    }

    /// Resolve the seeds and every transitively declared dependency.
    pub fn build(&self, seeds: &[PackageIdent]) -> Result<PackageGraph, GraphError> {
        let mut graph = PackageGraph {
            seeds: seeds.to_vec(),
            ..Default::default()
        };
        let mut colors: BTreeMap<PackageIdent, Color> = BTreeMap::new();
        let mut stack: Vec<PackageIdent> = Vec::new();

        for seed in seeds {
            self.visit(seed, &mut graph, &mut colors, &mut stack)?;
        }

        Ok(graph)
    }

    fn visit(
        &self,
        ident: &PackageIdent,
        graph: &mut PackageGraph,
        colors: &mut BTreeMap<PackageIdent, Color>,
        stack: &mut Vec<PackageIdent>,
    ) -> Result<(), GraphError> {
        match colors.get(ident) {
            Some(Color::Black) => return Ok(()),
            Some(Color::Grey) => {
                // Back-edge: the cycle is the stack suffix from the first
                // occurrence of this node, closed by the node itself.
                let pos = stack.iter().position(|i| i == ident).unwrap_or(0);
                let mut cycle: Vec<PackageIdent> = stack[pos..].to_vec();
                cycle.push(ident.clone());
                return Err(GraphError::CycleDetected(cycle));
            }
            None => {}
        }

        let record = self.resolver.resolve(ident)?;
        let imports = record.imports.clone();
        graph.records.insert(ident.clone(), record);

        colors.insert(ident.clone(), Color::Grey);
        stack.push(ident.clone());

        for raw in &imports {
            let imported = PackageIdent::parse(raw).map_err(|e| GraphError::InvalidImport {
                importer: ident.clone(),
                raw: raw.clone(),
                source: e,
            })?;

            graph.edges.push(DependencyEdge {
                importer: ident.clone(),
                imported: imported.clone(),
            });

            self.visit(&imported, graph, colors, stack)?;
        }

        stack.pop();
        colors.insert(ident.clone(), Color::Black);
        Ok(())
    }
}
