use crate::error::Result;
use crate::factors::{make_factordefs, FactorDefs};
use crate::incidence::{make_node_injection_matrix, NodeInjectionMatrix};
use crate::options::ModelOptions;
use crate::order::NodeOrder;
use crate::records::{IValue, Message, PValue, QValue, RecordStore, Term};
use crate::terminals::{
    bind_outputs, make_injections, make_terminals, BoundOutput, BranchData, BranchTerminals,
    InjectionData, Terminal,
};
use crate::topology::{resolve_topology, CalcNode, Slack};
use serde::Serialize;

/// Voltage at a calculation node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(non_snake_case)]
pub struct NodeVoltage {
    pub id_of_node: String,
    pub index_of_node: usize,
    pub V: f64,
}

/// Voltage limits at a calculation node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeLimit {
    pub id_of_node: String,
    pub index_of_node: usize,
    pub min: f64,
    pub max: f64,
    pub step: i32,
}

/// Model is the indexed grid handed over to power flow calculation and
/// estimation.
#[derive(Debug)]
#[allow(non_snake_case)]
pub struct Model {
    /// Calculation nodes, slack nodes first.
    pub nodes: Vec<CalcNode>,

    /// Maps ids of connectivity nodes to calculation nodes.
    pub node_index: NodeOrder,

    pub slacks: Vec<Slack>,

    pub count_of_slacks: usize,

    /// Branches and their terminals.
    pub terminals: BranchTerminals,

    pub injections: Vec<InjectionData>,

    /// Outputs bound to branch terminals.
    pub branchoutputs: Vec<BoundOutput>,

    /// Outputs bound to injections.
    pub injectionoutputs: Vec<BoundOutput>,

    pub pvalues: Vec<PValue>,
    pub qvalues: Vec<QValue>,
    pub ivalues: Vec<IValue>,
    pub vvalues: Vec<NodeVoltage>,
    pub vlimits: Vec<NodeLimit>,

    pub terms: Vec<Term>,
    pub messages: Vec<Message>,

    /// Shape of the branch admittance matrix.
    pub shape_of_Y: (usize, usize),

    pub mnodeinj: NodeInjectionMatrix,

    pub factordefs: FactorDefs,
}

impl Model {
    pub fn branches(&self) -> &[BranchData] {
        &self.terminals.branches
    }

    /// Terminals of ordinary branches.
    pub fn branchterminals(&self) -> &[Terminal] {
        &self.terminals.branchterminals
    }

    pub fn bridgeterminals(&self) -> &[Terminal] {
        &self.terminals.bridgeterminals
    }

    /// Terminals of injections, same as `injections`.
    pub fn injectionterminals(&self) -> &[InjectionData] {
        &self.injections
    }

    /// Index of the calculation node of a connectivity node.
    pub fn index_of_node(&self, id_of_node: &str) -> Option<usize> {
        self.node_index.index(id_of_node)
    }

    pub fn count_of_nodes(&self) -> usize {
        self.nodes.len()
    }
}

/// Creates the indexed model from the tables of the record store.
///
/// Fails for duplicate ids of branches or injections. Rows referencing
/// unknown nodes, devices or factors are excluded.
pub fn make_model(store: &RecordStore, options: &ModelOptions) -> Result<Model> {
    let topo = resolve_topology(&store.branches, &store.slacknodes, options.bridge_threshold)?;
    let mut terminals = make_terminals(&store.branches, &topo);
    let injections = make_injections(&store.injections, &topo.order)?;
    let (branchoutputs, injectionoutputs) = bind_outputs(&store.outputs, &terminals, &injections);

    let count_of_nodes = topo.nodes.len();
    let mnodeinj = make_node_injection_matrix(count_of_nodes, &injections);

    let vvalues = store
        .vvalues
        .iter()
        .filter_map(|v| {
            let index_of_node = topo.order.index(&v.id_of_node);
            if index_of_node.is_none() {
                log::debug!("voltage at unknown node '{}' excluded", v.id_of_node);
            }
            Some(NodeVoltage {
                id_of_node: v.id_of_node.clone(),
                index_of_node: index_of_node?,
                V: v.V,
            })
        })
        .collect();
    let vlimits = store
        .vlimits
        .iter()
        .filter_map(|v| {
            let index_of_node = topo.order.index(&v.id_of_node);
            if index_of_node.is_none() {
                log::debug!("voltage limit at unknown node '{}' excluded", v.id_of_node);
            }
            Some(NodeLimit {
                id_of_node: v.id_of_node.clone(),
                index_of_node: index_of_node?,
                min: v.min,
                max: v.max,
                step: v.step,
            })
        })
        .collect();

    let factordefs = make_factordefs(
        &store.factors,
        &store.injectionlinks,
        &store.terminallinks,
        &injections,
        &terminals,
        &options.default_factor_id,
    );
    let count_of_terminals = terminals.branchterminals.len() + terminals.bridgeterminals.len();
    for index in 0..count_of_terminals {
        let symbol = factordefs.generic_terminal_symbol(index);
        if let Some(t) = terminals.get_mut(index) {
            t.index_of_factor = symbol;
        }
    }

    log::debug!(
        "model: {} nodes ({} slacks), {} branches, {} injections, {} outputs",
        count_of_nodes,
        topo.count_of_slacks,
        terminals.branches.len(),
        injections.len(),
        branchoutputs.len() + injectionoutputs.len()
    );

    Ok(Model {
        nodes: topo.nodes,
        node_index: topo.order,
        slacks: topo.slacks,
        count_of_slacks: topo.count_of_slacks,
        terminals,
        injections,
        branchoutputs,
        injectionoutputs,
        pvalues: store.pvalues.clone(),
        qvalues: store.qvalues.clone(),
        ivalues: store.ivalues.clone(),
        vvalues,
        vlimits,
        terms: store.terms.clone(),
        messages: store.messages.clone(),
        shape_of_Y: (count_of_nodes, count_of_nodes),
        mnodeinj,
        factordefs,
    })
}
