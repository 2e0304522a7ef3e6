use crate::error::{ModelError, Result};
use crate::graph::Adjacency;
use crate::math::mean;
use crate::order::NodeOrder;
use crate::records::{Branch, Slacknode};
use num_complex::Complex64;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Calculation node, one or more connectivity nodes connected by bridges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalcNode {
    pub index: usize,

    /// Ids of the connectivity nodes, sorted.
    pub ids: Vec<String>,

    /// Node is derived from at least one bridge.
    pub is_merged: bool,

    pub is_slack: bool,
}

/// Slack of the model, one per slack calculation node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(non_snake_case)]
pub struct Slack {
    /// First declared slack id of the calculation node.
    pub id_of_node: String,

    /// Mean of the voltages of all slacks merged into the node.
    pub V: Complex64,

    /// Declared slack ids merged into the node.
    pub members: Vec<String>,

    pub index_of_node: usize,
}

/// Result of the topology resolution.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// Slack nodes first.
    pub nodes: Vec<CalcNode>,
    pub order: NodeOrder,
    pub slacks: Vec<Slack>,
    pub count_of_slacks: usize,

    /// Positions of ordinary branches in the branch table.
    pub ordinary: Vec<usize>,
    /// Positions of bridges in the branch table.
    pub bridges: Vec<usize>,
}

/// A branch is a bridge if the magnitude of its longitudinal admittance
/// exceeds the threshold.
pub fn is_bridge(branch: &Branch, threshold: f64) -> bool {
    branch.y_lo.norm() > threshold
}

/// Sorted ids occurring more than once.
pub(crate) fn duplicates<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    let mut dups = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            dups.insert(id);
        }
    }
    dups.into_iter().collect()
}

/// Merges connectivity nodes connected by bridges into calculation nodes
/// and numbers them.
///
/// Order of calculation nodes:
///
/// 1. slack nodes derived from bridges
/// 2. other slack nodes
/// 3. non-slack nodes derived from bridges
/// 4. other non-slack nodes
///
/// Inside each group nodes are ordered by their smallest member id.
pub fn resolve_topology(
    branches: &[Branch],
    slacknodes: &[Slacknode],
    bridge_threshold: f64,
) -> Result<Topology> {
    let dups = duplicates(branches.iter().map(|br| br.id.as_str()));
    if !dups.is_empty() {
        return Err(ModelError::DuplicateBranchId(dups.join(", ")));
    }

    let (bridges, ordinary): (Vec<usize>, Vec<usize>) =
        (0..branches.len()).partition(|&i| is_bridge(&branches[i], bridge_threshold));

    let ids: BTreeSet<&str> = branches
        .iter()
        .flat_map(|br| [br.id_of_node_A.as_str(), br.id_of_node_B.as_str()])
        .chain(slacknodes.iter().map(|sl| sl.id_of_node.as_str()))
        .collect();
    let ids: Vec<&str> = ids.into_iter().collect();
    let vertex: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    let slack_ids: HashSet<&str> = slacknodes.iter().map(|sl| sl.id_of_node.as_str()).collect();

    let mut graph = Adjacency::with_size(ids.len());
    let mut bridged = vec![false; ids.len()];
    for &i in &bridges {
        let br = &branches[i];
        let a = vertex[br.id_of_node_A.as_str()];
        let b = vertex[br.id_of_node_B.as_str()];
        graph.add_edge(a, b);
        bridged[a] = true;
        bridged[b] = true;
    }

    let mut components: Vec<(bool, bool, Vec<usize>)> = graph
        .components()
        .into_iter()
        .map(|members| {
            let is_slack = members.iter().any(|&v| slack_ids.contains(ids[v]));
            let is_merged = members.iter().any(|&v| bridged[v]);
            (is_slack, is_merged, members)
        })
        .collect();
    // components are ordered by smallest member already, the sort is stable
    components.sort_by_key(|(is_slack, is_merged, _)| (!is_slack, !is_merged));

    let mut order = NodeOrder::with_capacity(ids.len());
    let mut nodes = Vec::with_capacity(components.len());
    for (is_slack, is_merged, members) in components {
        let index = order.push(members.iter().map(|&v| ids[v].to_string()).collect());
        nodes.push(CalcNode {
            index,
            ids: order.i2e[index].clone(),
            is_merged,
            is_slack,
        });
    }
    let count_of_slacks = nodes.iter().filter(|n| n.is_slack).count();

    let slacks = make_slacks(slacknodes, &order, count_of_slacks);

    log::debug!(
        "topology: {} connectivity nodes, {} calculation nodes, {} slacks, {} branches, {} bridges",
        ids.len(),
        nodes.len(),
        count_of_slacks,
        ordinary.len(),
        bridges.len()
    );

    Ok(Topology {
        nodes,
        order,
        slacks,
        count_of_slacks,
        ordinary,
        bridges,
    })
}

fn make_slacks(slacknodes: &[Slacknode], order: &NodeOrder, count_of_slacks: usize) -> Vec<Slack> {
    let mut voltages: Vec<Vec<Complex64>> = vec![Vec::new(); count_of_slacks];
    let mut members: Vec<Vec<String>> = vec![Vec::new(); count_of_slacks];
    for sl in slacknodes {
        if let Some(index) = order.index(&sl.id_of_node) {
            if index < count_of_slacks {
                voltages[index].push(sl.V);
                if !members[index].contains(&sl.id_of_node) {
                    members[index].push(sl.id_of_node.clone());
                }
            }
        }
    }
    members
        .into_iter()
        .zip(voltages)
        .enumerate()
        .filter_map(|(index, (members, vs))| {
            if vs.len() > 1 {
                log::debug!(
                    "{} slack voltages merged into calculation node {}",
                    vs.len(),
                    index
                );
            }
            Some(Slack {
                id_of_node: members.first()?.clone(),
                V: mean(&vs)?,
                members,
                index_of_node: index,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmplx;
    use crate::options::DEFAULT_BRIDGE_THRESHOLD;
    use anyhow::{format_err, Result};

    fn line(id: &str, a: &str, b: &str) -> Branch {
        Branch::new(id, a, b).y_lo(cmplx!(1e3, -1e3))
    }

    #[test]
    fn test_single_bridge() -> Result<()> {
        let branches = vec![Branch::new("br", "n0", "n1")];
        let slacks = vec![Slacknode::new("n0")];

        let topo = resolve_topology(&branches, &slacks, DEFAULT_BRIDGE_THRESHOLD)?;

        assert_eq!(topo.nodes.len(), 1);
        assert_eq!(topo.count_of_slacks, 1);
        assert!(topo.nodes[0].is_merged && topo.nodes[0].is_slack);
        assert_eq!(topo.nodes[0].ids, vec!["n0", "n1"]);
        assert_eq!(topo.bridges, vec![0]);
        assert!(topo.ordinary.is_empty());
        assert_eq!(topo.slacks.len(), 1);
        assert_eq!(topo.slacks[0].index_of_node, 0);
        Ok(())
    }

    #[test]
    fn test_node_order() -> Result<()> {
        // n5-n6 bridged, slack n3 single, n1-n2 bridged with slack n2
        let branches = vec![
            line("l0", "n0", "n3"),
            Branch::new("b0", "n6", "n5"),
            line("l1", "n4", "n5"),
            Branch::new("b1", "n2", "n1"),
            line("l2", "n2", "n0"),
        ];
        let slacks = vec![Slacknode::new("n3"), Slacknode::new("n2")];

        let topo = resolve_topology(&branches, &slacks, DEFAULT_BRIDGE_THRESHOLD)?;
        let names: Vec<Vec<String>> = topo.nodes.iter().map(|n| n.ids.clone()).collect();
        let expected: Vec<Vec<String>> = vec![
            vec!["n1".into(), "n2".into()],
            vec!["n3".into()],
            vec!["n5".into(), "n6".into()],
            vec!["n0".into()],
            vec!["n4".into()],
        ];
        if names != expected {
            return Err(format_err!("unexpected order of nodes: {:?}", names));
        }
        assert_eq!(topo.count_of_slacks, 2);
        assert_eq!(topo.ordinary, vec![0, 2, 4]);
        assert_eq!(topo.bridges, vec![1, 3]);
        for node in &topo.nodes {
            assert_eq!(node.is_slack, node.index < topo.count_of_slacks);
        }
        assert_eq!(topo.order.index("n6"), Some(2));
        Ok(())
    }

    #[test]
    fn test_order_independent_of_input_order() -> Result<()> {
        let mut branches = vec![
            line("l0", "n0", "n1"),
            Branch::new("b0", "n1", "n2"),
            line("l1", "n2", "n3"),
            Branch::new("b1", "n3", "n4"),
        ];
        let slacks = vec![Slacknode::new("n0")];
        let topo1 = resolve_topology(&branches, &slacks, DEFAULT_BRIDGE_THRESHOLD)?;
        branches.reverse();
        let topo2 = resolve_topology(&branches, &slacks, DEFAULT_BRIDGE_THRESHOLD)?;

        assert_eq!(topo1.nodes, topo2.nodes);
        assert_eq!(topo1.order, topo2.order);
        Ok(())
    }

    #[test]
    fn test_merged_slacks_mean_voltage() -> Result<()> {
        let branches = vec![Branch::new("b0", "n0", "n1"), line("l0", "n1", "n2")];
        let mut s0 = Slacknode::new("n1");
        s0.V = cmplx!(1.0, 0.0);
        let mut s1 = Slacknode::new("n0");
        s1.V = cmplx!(0.5, 0.5);

        let topo = resolve_topology(&branches, &[s0, s1], DEFAULT_BRIDGE_THRESHOLD)?;

        assert_eq!(topo.count_of_slacks, 1);
        assert_eq!(topo.slacks.len(), 1);
        assert_eq!(topo.slacks[0].id_of_node, "n1");
        assert_eq!(topo.slacks[0].V, cmplx!(0.75, 0.25));
        assert_eq!(topo.slacks[0].members, vec!["n1", "n0"]);
        Ok(())
    }

    #[test]
    fn test_threshold() -> Result<()> {
        let branches = vec![line("l0", "n0", "n1")];
        let topo = resolve_topology(&branches, &[], DEFAULT_BRIDGE_THRESHOLD)?;
        assert_eq!(topo.nodes.len(), 2);
        assert_eq!(topo.count_of_slacks, 0);

        // |1e3-1e3j| is about 1414
        let topo = resolve_topology(&branches, &[], 1e3)?;
        assert_eq!(topo.nodes.len(), 1);
        assert_eq!(topo.bridges, vec![0]);
        Ok(())
    }

    #[test]
    fn test_duplicate_branch_ids() {
        let branches = vec![
            line("l0", "n0", "n1"),
            line("l1", "n1", "n2"),
            line("l0", "n2", "n3"),
        ];
        let result = resolve_topology(&branches, &[], DEFAULT_BRIDGE_THRESHOLD);
        assert_eq!(
            result.err(),
            Some(ModelError::DuplicateBranchId("l0".to_string()))
        );
    }
}
