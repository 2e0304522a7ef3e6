//! Splitting of the grid at measured terminals.
//!
//! The grid is a bipartite graph of connectivity nodes and devices
//! (branches, bridges, injections), terminals are its edges. Each
//! measurement batch adds a vertex connected to the devices of its
//! outputs. For a set of quantities the graph is cut at all terminals
//! whose batch has a value of one of the quantities, batches without such
//! values are removed. Injections in one of the remaining connected
//! parts can be scaled by one common factor without changing a measured
//! flow.

use crate::factors::StepFactors;
use crate::graph::Adjacency;
use crate::model::Model;
use crate::records::{FactorKind, Part};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Measured quantity of a batch.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone, Serialize)]
pub enum Quantity {
    P,
    Q,
    I,
}

impl Quantity {
    /// Quantities bounding subgraphs for scaling of a power part.
    pub fn for_part(part: Part, with_i: bool) -> Vec<Quantity> {
        let power = match part {
            Part::P => Quantity::P,
            Part::Q => Quantity::Q,
        };
        if with_i {
            vec![power, Quantity::I]
        } else {
            vec![power]
        }
    }
}

/// Measurement batch touching a subgraph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchInfo {
    pub id_of_batch: String,
    pub has_p: bool,
    pub has_q: bool,
    pub has_i: bool,
}

/// Connected part of the grid bounded by measured terminals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subgraph {
    pub index_of_subgraph: usize,
    /// Ids of connectivity nodes, sorted.
    pub nodes: Vec<String>,
    /// Ids of branches and bridges, sorted.
    pub branches: Vec<String>,
    /// Indices of injections, ordered by injection id.
    pub injections: Vec<usize>,
    /// Batches inside the subgraph or at its border, sorted by id.
    pub batches: Vec<BatchInfo>,
    pub has_slack: bool,
}

#[derive(Clone, Copy)]
enum Device<'a> {
    Branch(&'a str),
    Injection(usize),
}

enum Vertex {
    Node(String),
    Branch(String),
    Injection(usize),
    Batch(String),
}

/// Splits the grid at terminals with values of the given quantities.
///
/// The result depends on ids only, not on the order of the input rows.
pub fn make_subgraphs(model: &Model, quantities: &[Quantity]) -> Vec<Subgraph> {
    let has_value = |quantity: Quantity| -> HashSet<&str> {
        match quantity {
            Quantity::P => model.pvalues.iter().map(|v| v.id_of_batch.as_str()).collect(),
            Quantity::Q => model.qvalues.iter().map(|v| v.id_of_batch.as_str()).collect(),
            Quantity::I => model.ivalues.iter().map(|v| v.id_of_batch.as_str()).collect(),
        }
    };
    let (with_p, with_q, with_i) = (
        has_value(Quantity::P),
        has_value(Quantity::Q),
        has_value(Quantity::I),
    );
    let batch_info = |id: &str| BatchInfo {
        id_of_batch: id.to_string(),
        has_p: with_p.contains(id),
        has_q: with_q.contains(id),
        has_i: with_i.contains(id),
    };
    let is_selected = |info: &BatchInfo| {
        quantities.iter().any(|q| match q {
            Quantity::P => info.has_p,
            Quantity::Q => info.has_q,
            Quantity::I => info.has_i,
        })
    };

    // (batch, device, node) of all bound outputs
    let branches = model.branches();
    let mut outputs: Vec<(&str, Device<'_>, &str)> = Vec::new();
    for out in &model.branchoutputs {
        if let Some(t) = model.terminals.get(out.index) {
            outputs.push((
                &out.id_of_batch,
                Device::Branch(&t.id_of_branch),
                &t.id_of_node,
            ));
        }
    }
    for out in &model.injectionoutputs {
        if let Some(inj) = model.injections.get(out.index) {
            outputs.push((
                &out.id_of_batch,
                Device::Injection(inj.index_of_injection),
                &inj.id_of_node,
            ));
        }
    }
    let batches: BTreeMap<&str, BatchInfo> = outputs
        .iter()
        .map(|(batch, _, _)| (*batch, batch_info(*batch)))
        .filter(|(_, info)| is_selected(info))
        .collect();

    // vertices sorted by kind and id
    let node_ids: BTreeSet<&str> = model.node_index.e2i.keys().map(String::as_str).collect();
    let branch_ids: BTreeSet<&str> = branches.iter().map(|br| br.id.as_str()).collect();
    let mut vertices: Vec<Vertex> = Vec::new();
    let mut node_vertex = BTreeMap::new();
    for id in node_ids {
        node_vertex.insert(id, vertices.len());
        vertices.push(Vertex::Node(id.to_string()));
    }
    let mut branch_vertex = BTreeMap::new();
    for id in branch_ids {
        branch_vertex.insert(id, vertices.len());
        vertices.push(Vertex::Branch(id.to_string()));
    }
    let mut injection_order: Vec<(&str, usize)> = model
        .injections
        .iter()
        .map(|inj| (inj.id.as_str(), inj.index_of_injection))
        .collect();
    injection_order.sort();
    let mut injection_vertex = vec![0; model.injections.len()];
    for (_, index) in injection_order {
        injection_vertex[index] = vertices.len();
        vertices.push(Vertex::Injection(index));
    }
    let mut batch_vertex = BTreeMap::new();
    for id in batches.keys() {
        batch_vertex.insert(*id, vertices.len());
        vertices.push(Vertex::Batch(id.to_string()));
    }
    let device_vertex = |device: Device<'_>| -> Option<usize> {
        match device {
            Device::Branch(id) => branch_vertex.get(id).copied(),
            Device::Injection(index) => injection_vertex.get(index).copied(),
        }
    };

    // terminals cut, (node vertex, device vertex) -> batches
    let mut cut: BTreeMap<(usize, usize), Vec<&str>> = BTreeMap::new();
    let mut graph = Adjacency::with_size(vertices.len());
    for &(batch, device, node) in &outputs {
        let Some(&b) = batch_vertex.get(batch) else {
            continue;
        };
        let (Some(d), Some(&n)) = (device_vertex(device), node_vertex.get(node)) else {
            continue;
        };
        graph.add_edge(b, d);
        cut.entry((n, d)).or_default().push(batch);
    }
    for t in model.terminals.iter() {
        let n = node_vertex[t.id_of_node.as_str()];
        let d = branch_vertex[t.id_of_branch.as_str()];
        if !cut.contains_key(&(n, d)) {
            graph.add_edge(n, d);
        }
    }
    for inj in &model.injections {
        let n = node_vertex[inj.id_of_node.as_str()];
        let d = injection_vertex[inj.index_of_injection];
        if !cut.contains_key(&(n, d)) {
            graph.add_edge(n, d);
        }
    }

    let components = graph.components();
    let mut component_of = vec![0; vertices.len()];
    for (c, members) in components.iter().enumerate() {
        for &v in members {
            component_of[v] = c;
        }
    }
    // batches at the border are reported at the node side too
    let mut border: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); components.len()];
    for ((n, _), cut_batches) in &cut {
        border[component_of[*n]].extend(cut_batches.iter().copied());
    }

    let slack_ids: HashSet<&str> = model
        .slacks
        .iter()
        .flat_map(|sl| sl.members.iter().map(String::as_str))
        .collect();

    let subgraphs: Vec<Subgraph> = components
        .iter()
        .zip(border)
        .enumerate()
        .map(|(index_of_subgraph, (members, mut batch_ids))| {
            let mut sg = Subgraph {
                index_of_subgraph,
                nodes: Vec::new(),
                branches: Vec::new(),
                injections: Vec::new(),
                batches: Vec::new(),
                has_slack: false,
            };
            for &v in members {
                match &vertices[v] {
                    Vertex::Node(id) => {
                        sg.has_slack |= slack_ids.contains(id.as_str());
                        sg.nodes.push(id.clone());
                    }
                    Vertex::Branch(id) => sg.branches.push(id.clone()),
                    Vertex::Injection(index) => sg.injections.push(*index),
                    Vertex::Batch(id) => {
                        batch_ids.insert(id.as_str());
                    }
                }
            }
            sg.injections
                .sort_by(|&a, &b| model.injections[a].id.cmp(&model.injections[b].id));
            sg.batches = batch_ids
                .into_iter()
                .filter_map(|id| batches.get(id).cloned())
                .collect();
            sg
        })
        .collect();

    log::debug!(
        "{} subgraphs for {:?}, {} batches cut",
        subgraphs.len(),
        quantities,
        batches.len()
    );
    subgraphs
}

/// Part of an injection in a scaling island.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalingPart {
    pub index_of_injection: usize,
    pub id_of_injection: String,
    pub part: Part,
    /// P10 or Q10.
    pub value: f64,
    pub is_significant: bool,
    pub id_of_factor: String,
    pub kind: FactorKind,
    pub min: f64,
    pub max: f64,
    pub is_discrete: bool,
    /// Significant and scaled by a decision variable.
    pub is_scalable: bool,
    pub ini: f64,
}

/// Subgraph of one power part with its injection parts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalingIsland {
    pub part: Part,
    pub subgraph: Subgraph,
    pub parts: Vec<ScalingPart>,
    /// Sum of initial values divided by sum of values.
    pub k_ini: f64,
    pub needs_scaling: bool,
}

/// Creates scaling islands of a power part for one step.
///
/// `ini` are initial values of the part per injection index, the base
/// values P10/Q10 are used if not given.
pub fn make_scaling_islands(
    model: &Model,
    factors: &StepFactors,
    part: Part,
    with_i: bool,
    pq_limit: f64,
    ini: Option<&[f64]>,
) -> Vec<ScalingIsland> {
    let quantities = Quantity::for_part(part, with_i);
    make_subgraphs(model, &quantities)
        .into_iter()
        .map(|subgraph| {
            let parts: Vec<ScalingPart> = subgraph
                .injections
                .iter()
                .filter_map(|&index| {
                    let inj = model.injections.get(index)?;
                    let factor = factors.factor_of_injection(index, part)?;
                    let value = match part {
                        Part::P => inj.P10,
                        Part::Q => inj.Q10,
                    };
                    // feeding parts (generators) are never significant
                    let is_significant = pq_limit < value;
                    Some(ScalingPart {
                        index_of_injection: index,
                        id_of_injection: inj.id.clone(),
                        part,
                        value,
                        is_significant,
                        id_of_factor: factor.id.clone(),
                        kind: factor.kind,
                        min: factor.min,
                        max: factor.max,
                        is_discrete: factor.is_discrete,
                        is_scalable: is_significant && factor.kind == FactorKind::Var,
                        ini: ini.and_then(|v| v.get(index).copied()).unwrap_or(value),
                    })
                })
                .collect();
            let sum_of_values: f64 = parts.iter().map(|p| p.value).sum();
            let sum_of_ini: f64 = parts.iter().map(|p| p.ini).sum();
            let k_ini = if sum_of_values == 0.0 {
                1.0
            } else {
                sum_of_ini / sum_of_values
            };
            let needs_scaling = !subgraph.has_slack
                && !subgraph.batches.is_empty()
                && parts.iter().any(|p| p.is_scalable);
            ScalingIsland {
                part,
                subgraph,
                parts,
                k_ini,
                needs_scaling,
            }
        })
        .collect()
}
