use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::schema::SchemaGraph;

/// Summary of the parent/child relation graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencySummary {
    pub nodes: usize,
    pub edges: usize,
    /// Relations pointing back at their own model.
    pub self_references: usize,
}

/// Parents-first ordering of models, or the models stuck on a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyReport {
    pub summary: DependencySummary,
    pub topo_order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
}

/// Build a deterministic dependency report for a schema graph.
///
/// Self-references do not constrain the order between models and are only
/// counted in the summary.
pub fn build_dependency_report(graph: &SchemaGraph) -> DependencyReport {
    let (adjacency, self_references) = build_adjacency(graph);
    let nodes = adjacency.len();
    let edges = adjacency.values().map(|targets| targets.len()).sum();
    let summary = DependencySummary {
        nodes,
        edges,
        self_references,
    };

    match toposort(&adjacency) {
        Ok(order) => DependencyReport {
            summary,
            topo_order: Some(order),
            cycle: None,
        },
        Err(cycle) => DependencyReport {
            summary,
            topo_order: None,
            cycle: Some(cycle),
        },
    }
}

fn build_adjacency(graph: &SchemaGraph) -> (BTreeMap<String, BTreeSet<String>>, usize) {
    let mut adjacency: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut self_references = 0;

    for model in graph.models() {
        adjacency.entry(model.name.clone()).or_default();

        for parent in model.parents() {
            if parent.model == model.name {
                self_references += 1;
                continue;
            }
            adjacency
                .entry(parent.model.clone())
                .or_default()
                .insert(model.name.clone());
        }
    }

    (adjacency, self_references)
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<String, usize> =
        graph.keys().map(|node| (node.clone(), 0)).collect();

    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.clone()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<String> = indegree
        .iter()
        .filter_map(|(node, count)| (*count == 0).then(|| node.clone()))
        .collect();

    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = ready.pop_first() {
        if let Some(targets) = graph.get(&node) {
            for target in targets {
                if let Some(count) = indegree.get_mut(target) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(target.clone());
                    }
                }
            }
        }
        order.push(node);
    }

    if order.len() == indegree.len() {
        Ok(order)
    } else {
        Err(indegree
            .into_iter()
            .filter_map(|(node, count)| (count > 0).then_some(node))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::{ModelBuilder, RelationSpec};
    use crate::schema::{ScalarField, ScalarType, SchemaGraph};

    use super::*;

    fn int(name: &str) -> ScalarField {
        ScalarField::new(name, ScalarType::Int)
    }

    #[test]
    fn orders_parents_before_children() {
        let graph = SchemaGraph::builder()
            .model(ModelBuilder::new("Player").id(int("id")).scalar(int("teamId")))
            .model(ModelBuilder::new("Team").id(int("id")))
            .relation(RelationSpec::new("Player", "team", "Team", "players").columns(&["teamId"], &["id"]))
            .build()
            .expect("build graph");

        let report = build_dependency_report(&graph);
        let order = report.topo_order.expect("expected toposort");
        let team = order.iter().position(|name| name == "Team").unwrap();
        let player = order.iter().position(|name| name == "Player").unwrap();
        assert!(team < player);
        assert_eq!(report.summary.edges, 1);
    }

    #[test]
    fn reports_cycle_between_models() {
        let graph = SchemaGraph::builder()
            .model(ModelBuilder::new("Order").id(int("id")).scalar(int("shipmentId")))
            .model(ModelBuilder::new("Shipment").id(int("id")).scalar(int("orderId")))
            .relation(
                RelationSpec::new("Order", "shipment", "Shipment", "orders")
                    .columns(&["shipmentId"], &["id"]),
            )
            .relation(
                RelationSpec::new("Shipment", "order", "Order", "shipments")
                    .columns(&["orderId"], &["id"]),
            )
            .build()
            .expect("build graph");

        let cycle = graph.dependency_order().unwrap_err();
        assert_eq!(cycle, vec!["Order".to_string(), "Shipment".to_string()]);
    }

    #[test]
    fn self_reference_does_not_block_ordering() {
        let graph = SchemaGraph::builder()
            .model(
                ModelBuilder::new("Employee")
                    .id(int("id"))
                    .scalar(int("managerId").optional()),
            )
            .relation(
                RelationSpec::new("Employee", "manager", "Employee", "reports")
                    .columns(&["managerId"], &["id"])
                    .optional(),
            )
            .build()
            .expect("build graph");

        let report = build_dependency_report(&graph);
        assert_eq!(report.summary.self_references, 1);
        assert_eq!(report.topo_order, Some(vec!["Employee".to_string()]));
    }
}
