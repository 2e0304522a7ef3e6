use crate::error::{ModelError, Result};
use crate::order::NodeOrder;
use crate::records::{Branch, Injection, Output};
use crate::topology::{duplicates, Topology};
use num_complex::Complex64;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize)]
pub enum Side {
    A,
    B,
}

/// Branch of the model, ordinary branches precede bridges.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(non_snake_case)]
pub struct BranchData {
    pub index_of_branch: usize,
    pub id: String,
    pub id_of_node_A: String,
    pub id_of_node_B: String,
    pub index_of_node_A: usize,
    pub index_of_node_B: usize,
    pub index_of_term_A: usize,
    pub index_of_term_B: usize,
    pub y_lo: Complex64,
    pub y_tr: Complex64,
    pub is_bridge: bool,
}

/// One end of a branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Terminal {
    pub index_of_terminal: usize,
    pub index_of_branch: usize,
    pub id_of_branch: String,
    pub side: Side,

    pub id_of_node: String,
    pub id_of_other_node: String,
    pub index_of_node: usize,
    pub index_of_other_node: usize,
    pub index_of_other_terminal: usize,

    pub y_lo: Complex64,
    /// Half of the transversal admittance of the branch.
    pub y_tr_half: Complex64,
    pub g_lo: f64,
    pub b_lo: f64,
    pub g_tr_half: f64,
    pub b_tr_half: f64,

    pub is_bridge: bool,

    /// Symbol of the generic tap factor linked to the terminal.
    pub index_of_factor: Option<usize>,
}

/// Terminal of an injection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(non_snake_case)]
pub struct InjectionData {
    pub index_of_injection: usize,
    pub id: String,
    pub id_of_node: String,
    pub index_of_node: usize,
    pub P10: f64,
    pub Q10: f64,
    pub Exp_v_p: f64,
    pub Exp_v_q: f64,
}

/// Terminal of a branch or an injection assigned to a measurement batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundOutput {
    pub id_of_batch: String,
    pub id_of_device: String,
    /// Index of the branch terminal or of the injection.
    pub index: usize,
}

/// Branches and terminals ordered for matrix assembly.
#[derive(Debug, Clone, Default)]
pub struct BranchTerminals {
    pub branches: Vec<BranchData>,
    /// Terminals of ordinary branches, indices `0..2*count_of_ordinary`.
    pub branchterminals: Vec<Terminal>,
    /// Terminals of bridges, indices continue after ordinary terminals.
    pub bridgeterminals: Vec<Terminal>,
    by_branch_node: HashMap<(String, String), usize>,
}

impl BranchTerminals {
    /// Index of the terminal of a branch at a connectivity node.
    pub fn find(&self, id_of_branch: &str, id_of_node: &str) -> Option<usize> {
        self.by_branch_node
            .get(&(id_of_branch.to_string(), id_of_node.to_string()))
            .copied()
    }

    /// All terminals ordered by index.
    pub fn iter(&self) -> impl Iterator<Item = &Terminal> {
        self.branchterminals.iter().chain(self.bridgeterminals.iter())
    }

    pub fn get(&self, index: usize) -> Option<&Terminal> {
        let n = self.branchterminals.len();
        if index < n {
            self.branchterminals.get(index)
        } else {
            self.bridgeterminals.get(index - n)
        }
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Terminal> {
        let n = self.branchterminals.len();
        if index < n {
            self.branchterminals.get_mut(index)
        } else {
            self.bridgeterminals.get_mut(index - n)
        }
    }
}

fn make_terminal(
    branch: &BranchData,
    side: Side,
    index_of_terminal: usize,
    index_of_other_terminal: usize,
) -> Terminal {
    let (id_of_node, id_of_other_node, index_of_node, index_of_other_node) = match side {
        Side::A => (
            &branch.id_of_node_A,
            &branch.id_of_node_B,
            branch.index_of_node_A,
            branch.index_of_node_B,
        ),
        Side::B => (
            &branch.id_of_node_B,
            &branch.id_of_node_A,
            branch.index_of_node_B,
            branch.index_of_node_A,
        ),
    };
    let y_tr_half = branch.y_tr / 2.0;
    Terminal {
        index_of_terminal,
        index_of_branch: branch.index_of_branch,
        id_of_branch: branch.id.clone(),
        side,
        id_of_node: id_of_node.clone(),
        id_of_other_node: id_of_other_node.clone(),
        index_of_node,
        index_of_other_node,
        index_of_other_terminal,
        y_lo: branch.y_lo,
        y_tr_half,
        g_lo: branch.y_lo.re,
        b_lo: branch.y_lo.im,
        g_tr_half: y_tr_half.re,
        b_tr_half: y_tr_half.im,
        is_bridge: branch.is_bridge,
        index_of_factor: None,
    }
}

/// Creates two terminals per branch.
///
/// Terminal indices are assigned in four contiguous ranges: A terminals of
/// ordinary branches, B terminals of ordinary branches, A terminals of
/// bridges and B terminals of bridges.
pub fn make_terminals(branches: &[Branch], topo: &Topology) -> BranchTerminals {
    let order = &topo.order;
    let nb = topo.ordinary.len();
    let nbb = topo.bridges.len();

    let data: Vec<BranchData> = topo
        .ordinary
        .iter()
        .map(|&i| (i, false))
        .chain(topo.bridges.iter().map(|&i| (i, true)))
        .enumerate()
        .filter_map(|(index_of_branch, (i, is_bridge))| {
            let br = &branches[i];
            let (term_a, term_b) = if is_bridge {
                let k = index_of_branch - nb;
                (2 * nb + k, 2 * nb + nbb + k)
            } else {
                (index_of_branch, nb + index_of_branch)
            };
            Some(BranchData {
                index_of_branch,
                id: br.id.clone(),
                id_of_node_A: br.id_of_node_A.clone(),
                id_of_node_B: br.id_of_node_B.clone(),
                index_of_node_A: order.index(&br.id_of_node_A)?,
                index_of_node_B: order.index(&br.id_of_node_B)?,
                index_of_term_A: term_a,
                index_of_term_B: term_b,
                y_lo: br.y_lo,
                y_tr: br.y_tr,
                is_bridge,
            })
        })
        .collect();

    let mut terminals: Vec<Terminal> = data
        .iter()
        .flat_map(|br| {
            [
                make_terminal(br, Side::A, br.index_of_term_A, br.index_of_term_B),
                make_terminal(br, Side::B, br.index_of_term_B, br.index_of_term_A),
            ]
        })
        .collect();
    terminals.sort_by_key(|t| t.index_of_terminal);

    let mut by_branch_node = HashMap::with_capacity(terminals.len());
    for t in &terminals {
        by_branch_node
            .entry((t.id_of_branch.clone(), t.id_of_node.clone()))
            .or_insert(t.index_of_terminal);
    }
    let bridgeterminals = terminals.split_off(2 * nb);

    log::debug!(
        "{} branch terminals, {} bridge terminals",
        terminals.len(),
        bridgeterminals.len()
    );

    BranchTerminals {
        branches: data,
        branchterminals: terminals,
        bridgeterminals,
        by_branch_node,
    }
}

/// Connects injections to calculation nodes.
///
/// Injections at unknown nodes are excluded.
pub fn make_injections(injections: &[Injection], order: &NodeOrder) -> Result<Vec<InjectionData>> {
    let dups = duplicates(injections.iter().map(|inj| inj.id.as_str()));
    if !dups.is_empty() {
        return Err(ModelError::DuplicateInjectionId(dups.join(", ")));
    }
    let mut data = Vec::with_capacity(injections.len());
    for inj in injections {
        let Some(index_of_node) = order.index(&inj.id_of_node) else {
            log::debug!(
                "injection '{}' excluded, node '{}' is not connected",
                inj.id,
                inj.id_of_node
            );
            continue;
        };
        data.push(InjectionData {
            index_of_injection: data.len(),
            id: inj.id.clone(),
            id_of_node: inj.id_of_node.clone(),
            index_of_node,
            P10: inj.P10,
            Q10: inj.Q10,
            Exp_v_p: inj.Exp_v_p,
            Exp_v_q: inj.Exp_v_q,
        });
    }
    Ok(data)
}

/// Binds outputs to branch terminals and injections.
///
/// Returns the outputs at branch terminals and at injections, outputs
/// referencing no terminal are dropped.
pub fn bind_outputs(
    outputs: &[Output],
    terminals: &BranchTerminals,
    injections: &[InjectionData],
) -> (Vec<BoundOutput>, Vec<BoundOutput>) {
    let injection_index: HashMap<&str, usize> = injections
        .iter()
        .map(|inj| (inj.id.as_str(), inj.index_of_injection))
        .collect();
    let mut at_branches = Vec::new();
    let mut at_injections = Vec::new();
    for out in outputs {
        let (index, target) = match &out.id_of_node {
            Some(id_of_node) => (
                terminals.find(&out.id_of_device, id_of_node),
                &mut at_branches,
            ),
            None => (
                injection_index.get(out.id_of_device.as_str()).copied(),
                &mut at_injections,
            ),
        };
        match index {
            Some(index) => target.push(BoundOutput {
                id_of_batch: out.id_of_batch.clone(),
                id_of_device: out.id_of_device.clone(),
                index,
            }),
            None => log::debug!(
                "output of batch '{}' excluded, no terminal of device '{}'",
                out.id_of_batch,
                out.id_of_device
            ),
        }
    }
    (at_branches, at_injections)
}
