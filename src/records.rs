#![allow(non_snake_case)]

use crate::math::INF_ADMITTANCE;
use crate::options::DEFAULT_FACTOR_ID;
use num_complex::Complex64;
use serde::Serialize;

/// Step of data valid for all optimization steps.
pub const GENERIC_STEP: i32 = -1;

/// RecordStore is the tabular description of an electric grid and of
/// the factors scaling its injections and positioning its taps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordStore {
    /// Lines, cables, transformer windings and closed switches.
    pub branches: Vec<Branch>,

    pub slacknodes: Vec<Slacknode>,

    /// Consumers, generators, batteries and shunts.
    pub injections: Vec<Injection>,

    /// Terminals belonging to a measurement batch.
    pub outputs: Vec<Output>,

    pub pvalues: Vec<PValue>,
    pub qvalues: Vec<QValue>,
    pub ivalues: Vec<IValue>,
    pub vvalues: Vec<Vvalue>,
    pub vlimits: Vec<Vlimit>,

    /// Generic (step -1) and step specific factor definitions.
    pub factors: Vec<Factor>,

    pub injectionlinks: Vec<InjectionLink>,
    pub terminallinks: Vec<TerminalLink>,

    /// Terms of the objective function, handed to the solver as given.
    pub terms: Vec<Term>,

    pub messages: Vec<Message>,
}

/// Branch is an electric device having two terminals, e.g. a line, a
/// transformer winding or a closed switch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Branch {
    pub id: String,

    pub id_of_node_A: String,
    pub id_of_node_B: String,

    /// Longitudinal admittance, infinite for an ideal short.
    pub y_lo: Complex64,

    /// Transversal admittance, half of it is placed at each terminal.
    pub y_tr: Complex64,
}

impl Branch {
    pub fn new(id: &str, id_of_node_A: &str, id_of_node_B: &str) -> Self {
        Self {
            id: id.to_string(),
            id_of_node_A: id_of_node_A.to_string(),
            id_of_node_B: id_of_node_B.to_string(),
            y_lo: INF_ADMITTANCE,
            y_tr: Complex64::default(),
        }
    }

    pub fn y_lo(mut self, y_lo: Complex64) -> Self {
        self.y_lo = y_lo;
        self
    }

    pub fn y_tr(mut self, y_tr: Complex64) -> Self {
        self.y_tr = y_tr;
        self
    }
}

/// Slacknode tags a node with fixed voltage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slacknode {
    pub id_of_node: String,

    /// Voltage at the slack node (p.u.), default is 1+0j.
    pub V: Complex64,
}

impl Slacknode {
    pub fn new(id_of_node: &str) -> Self {
        Self {
            id_of_node: id_of_node.to_string(),
            V: Complex64::new(1.0, 0.0),
        }
    }
}

/// Injection is a one-terminal device: positive and negative loads, PQ and
/// PV generators, batteries and shunt capacitors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Injection {
    pub id: String,
    pub id_of_node: String,

    /// Active power at a voltage of 1.0 p.u.
    pub P10: f64,

    /// Reactive power at a voltage of 1.0 p.u.
    pub Q10: f64,

    /// Voltage exponent of active power, 0 for constant power,
    /// 2 for constant conductance.
    pub Exp_v_p: f64,

    /// Voltage exponent of reactive power.
    pub Exp_v_q: f64,
}

impl Injection {
    pub fn new(id: &str, id_of_node: &str) -> Self {
        Self {
            id: id.to_string(),
            id_of_node: id_of_node.to_string(),
            P10: 0.0,
            Q10: 0.0,
            Exp_v_p: 0.0,
            Exp_v_q: 0.0,
        }
    }

    pub fn pq(mut self, P10: f64, Q10: f64) -> Self {
        self.P10 = P10;
        self.Q10 = Q10;
        self
    }
}

/// Output assigns a terminal of a branch or an injection to a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    pub id_of_batch: String,

    /// Id of a branch or an injection.
    pub id_of_device: String,

    /// Node of the branch terminal, `None` at injections.
    pub id_of_node: Option<String>,
}

impl Output {
    pub fn at_branch(id_of_batch: &str, id_of_device: &str, id_of_node: &str) -> Self {
        Self {
            id_of_batch: id_of_batch.to_string(),
            id_of_device: id_of_device.to_string(),
            id_of_node: Some(id_of_node.to_string()),
        }
    }

    pub fn at_injection(id_of_batch: &str, id_of_device: &str) -> Self {
        Self {
            id_of_batch: id_of_batch.to_string(),
            id_of_device: id_of_device.to_string(),
            id_of_node: None,
        }
    }
}

/// Measured or fixed active power of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PValue {
    pub id_of_batch: String,
    pub P: f64,
    /// -1 or 1
    pub direction: f64,
}

/// Measured or fixed reactive power of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QValue {
    pub id_of_batch: String,
    pub Q: f64,
    /// -1 or 1
    pub direction: f64,
}

/// Measured electric current of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IValue {
    pub id_of_batch: String,
    pub I: f64,
}

/// Measured voltage or voltage setpoint at a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vvalue {
    pub id_of_node: String,
    pub V: f64,
}

/// Voltage limits of a node for one optimization step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vlimit {
    pub id_of_node: String,
    pub min: f64,
    pub max: f64,
    pub step: i32,
}

/// Factor is a decision variable (`type == "var"`) or a parameter
/// (`type == "const"`) scaling an injection or positioning taps.
///
/// The kind is kept as given. Rows of other kinds are not resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Factor {
    /// Optimization step, `GENERIC_STEP` for all steps.
    pub step: i32,

    pub id: String,

    #[serde(rename = "type")]
    pub type_: String,

    /// Factor of the previous step providing the initial value.
    pub id_of_source: String,

    /// Initial value if there is no source factor.
    pub value: f64,

    pub min: f64,
    pub max: f64,

    /// Factor requires integral values (tap positions).
    pub is_discrete: bool,

    /// Effective multiplier is `m * value + n`.
    pub m: f64,
    pub n: f64,

    /// Cost of a change of the value.
    pub cost: f64,
}

impl Factor {
    /// Creates a generic decision variable sourced by its own id.
    pub fn new(id: &str) -> Self {
        Self {
            step: GENERIC_STEP,
            id: id.to_string(),
            type_: "var".to_string(),
            id_of_source: id.to_string(),
            value: 1.0,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            is_discrete: false,
            m: 1.0,
            n: 0.0,
            cost: 0.0,
        }
    }

    /// Constant factor 1.0 used where a multiplier is required but
    /// none is defined.
    pub fn default_factor(id: &str, step: i32) -> Self {
        Self {
            step,
            id: id.to_string(),
            type_: "const".to_string(),
            id_of_source: id.to_string(),
            value: 1.0,
            min: 1.0,
            max: 1.0,
            is_discrete: false,
            m: 1.0,
            n: 0.0,
            cost: 0.0,
        }
    }

    pub fn step(mut self, step: i32) -> Self {
        self.step = step;
        self
    }

    pub fn constant(mut self) -> Self {
        self.type_ = "const".to_string();
        self
    }

    pub fn source(mut self, id_of_source: &str) -> Self {
        self.id_of_source = id_of_source.to_string();
        self
    }

    pub fn value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn bounds(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn kind(&self) -> Option<FactorKind> {
        FactorKind::from_name(&self.type_)
    }
}

impl Default for Factor {
    fn default() -> Self {
        Factor::default_factor(DEFAULT_FACTOR_ID, GENERIC_STEP)
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone, Serialize)]
pub enum FactorKind {
    #[serde(rename = "var")]
    Var,
    #[serde(rename = "const")]
    Const,
}

impl FactorKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "var" => Some(FactorKind::Var),
            "const" => Some(FactorKind::Const),
            _ => None,
        }
    }
}

impl std::fmt::Display for FactorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactorKind::Var => write!(f, "var"),
            FactorKind::Const => write!(f, "const"),
        }
    }
}

/// Power part of an injection scaled by a factor.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone, Serialize)]
pub enum Part {
    #[serde(rename = "p")]
    P,
    #[serde(rename = "q")]
    Q,
}

impl Part {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "p" => Some(Part::P),
            "q" => Some(Part::Q),
            _ => None,
        }
    }
}

impl std::fmt::Display for Part {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Part::P => write!(f, "p"),
            Part::Q => write!(f, "q"),
        }
    }
}

/// Links the active (`"p"`) or reactive (`"q"`) power of an injection
/// with a factor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InjectionLink {
    pub step: i32,
    pub injid: String,
    pub part: String,
    /// Id of the factor.
    pub id: String,
}

impl InjectionLink {
    pub fn new(step: i32, injid: &str, part: &str, id: &str) -> Self {
        Self {
            step,
            injid: injid.to_string(),
            part: part.to_string(),
            id: id.to_string(),
        }
    }
}

/// Links the terminal of a branch at a node with a tap factor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminalLink {
    pub step: i32,
    pub branchid: String,
    pub nodeid: String,
    /// Id of the factor.
    pub id: String,
}

impl TerminalLink {
    pub fn new(step: i32, branchid: &str, nodeid: &str, id: &str) -> Self {
        Self {
            step,
            branchid: branchid.to_string(),
            nodeid: nodeid.to_string(),
            id: id.to_string(),
        }
    }
}

/// Term of the objective function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Term {
    pub id: String,

    /// References to the arguments of the function.
    pub args: Vec<String>,

    #[serde(rename = "fn")]
    pub fn_: String,

    pub step: i32,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Serialize)]
pub enum Level {
    Info = 0,
    Warning = 1,
    Error = 2,
}

impl Level {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Level::Info),
            1 => Some(Level::Warning),
            2 => Some(Level::Error),
            _ => None,
        }
    }
}

/// Information, warning or error about the input data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub message: String,
    pub level: Level,
}

impl Message {
    pub fn new(message: impl Into<String>, level: Level) -> Self {
        Self {
            message: message.into(),
            level,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, Level::Warning)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, Level::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_defaults() {
        let br = Branch::new("line_0", "n0", "n1");
        assert!(br.y_lo.re.is_infinite() && br.y_lo.im.is_infinite());
        assert_eq!(br.y_tr, Complex64::default());

        let slack = Slacknode::new("n0");
        assert_eq!(slack.V, Complex64::new(1.0, 0.0));

        let f = Factor::new("kp");
        assert_eq!(f.step, GENERIC_STEP);
        assert_eq!(f.kind(), Some(FactorKind::Var));
        assert_eq!(f.id_of_source, "kp");
        assert_eq!((f.m, f.n), (1.0, 0.0));

        let f = Factor::default();
        assert_eq!(f.kind(), Some(FactorKind::Const));
        assert_eq!((f.value, f.min, f.max), (1.0, 1.0, 1.0));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(FactorKind::from_name("var"), Some(FactorKind::Var));
        assert_eq!(FactorKind::from_name("const"), Some(FactorKind::Const));
        assert_eq!(FactorKind::from_name("variable"), None);
        assert_eq!(Part::from_name("q"), Some(Part::Q));
        assert_eq!(Part::from_name("pq"), None);
        assert_eq!(Level::from_code(1), Some(Level::Warning));
        assert_eq!(Level::from_code(3), None);
    }
}
