//! Reading of the record store from JSON.
//!
//! The document is an object of tables, each table an array of row
//! objects:
//!
//! ```json
//! {
//!   "Branch": [{"id": "line_0", "id_of_node_A": "n0", "id_of_node_B": "n1", "y_lo": "1k-1kj"}],
//!   "Slacknode": [{"id_of_node": "n0"}],
//!   "Injection": [{"id": "consumer_0", "id_of_node": "n1", "P10": 30, "Q10": "10"}]
//! }
//! ```
//!
//! Missing columns take their default values. Rows with malformed values
//! are excluded and reported by an error message, unknown tables and
//! columns by a warning.

use crate::error::{ModelError, Result};
use crate::records::{
    Branch, Factor, IValue, Injection, InjectionLink, Level, Message, Output, PValue, QValue,
    RecordStore, Slacknode, Term, TerminalLink, Vlimit, Vvalue, GENERIC_STEP,
};
use crate::units::{parse_complex, parse_number};
use num_complex::Complex64;
use num_traits::{One, Zero};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::fs;
use std::path::Path;

const BRANCH: &[&str] = &["id", "id_of_node_A", "id_of_node_B", "y_lo", "y_tr"];
const SLACKNODE: &[&str] = &["id_of_node", "V"];
const INJECTION: &[&str] = &["id", "id_of_node", "P10", "Q10", "Exp_v_p", "Exp_v_q"];
const OUTPUT: &[&str] = &["id_of_batch", "id_of_device", "id_of_node"];
const PVALUE: &[&str] = &["id_of_batch", "P", "direction"];
const QVALUE: &[&str] = &["id_of_batch", "Q", "direction"];
const IVALUE: &[&str] = &["id_of_batch", "I"];
const VVALUE: &[&str] = &["id_of_node", "V"];
const VLIMIT: &[&str] = &["id_of_node", "min", "max", "step"];
const FACTOR: &[&str] = &[
    "step",
    "id",
    "type",
    "id_of_source",
    "value",
    "min",
    "max",
    "is_discrete",
    "m",
    "n",
    "cost",
];
const INJECTIONLINK: &[&str] = &["step", "injid", "part", "id"];
const TERMINALLINK: &[&str] = &["step", "branchid", "nodeid", "id"];
const TERM: &[&str] = &["id", "args", "fn", "step"];
const MESSAGE: &[&str] = &["message", "level"];

/// Reads the record store from a JSON file.
pub fn load_store(path: &Path) -> Result<RecordStore> {
    let text = fs::read_to_string(path)
        .map_err(|err| ModelError::Data(format!("{}: {}", path.display(), err)))?;
    store_from_json(&text)
}

/// Reads the record store from a JSON document.
///
/// Fails only if the text is not JSON or not an object. Problems of
/// tables and rows are appended to `messages` of the store.
pub fn store_from_json(text: &str) -> Result<RecordStore> {
    let document: Value =
        serde_json::from_str(text).map_err(|err| ModelError::Data(err.to_string()))?;
    let Value::Object(tables) = document else {
        return Err(ModelError::Data("expected an object of tables".to_string()));
    };

    let mut store = RecordStore::default();
    let mut diagnostics = Vec::new();
    for (name, rows) in &tables {
        let Some(rows) = rows.as_array() else {
            diagnostics.push(Message::error(format!(
                "table {} is not an array of rows, table ignored",
                name
            )));
            continue;
        };
        let d = &mut diagnostics;
        match name.as_str() {
            "Branch" => store.branches = read_table(name, rows, BRANCH, read_branch, d),
            "Slacknode" => store.slacknodes = read_table(name, rows, SLACKNODE, read_slacknode, d),
            "Injection" => store.injections = read_table(name, rows, INJECTION, read_injection, d),
            "Output" => store.outputs = read_table(name, rows, OUTPUT, read_output, d),
            "PValue" => store.pvalues = read_table(name, rows, PVALUE, read_pvalue, d),
            "QValue" => store.qvalues = read_table(name, rows, QVALUE, read_qvalue, d),
            "IValue" => store.ivalues = read_table(name, rows, IVALUE, read_ivalue, d),
            "Vvalue" => store.vvalues = read_table(name, rows, VVALUE, read_vvalue, d),
            "Vlimit" => store.vlimits = read_table(name, rows, VLIMIT, read_vlimit, d),
            "Factor" => store.factors = read_table(name, rows, FACTOR, read_factor, d),
            "InjectionLink" => {
                store.injectionlinks = read_table(name, rows, INJECTIONLINK, read_injectionlink, d)
            }
            "TerminalLink" => {
                store.terminallinks = read_table(name, rows, TERMINALLINK, read_terminallink, d)
            }
            "Term" => store.terms = read_table(name, rows, TERM, read_term, d),
            "Message" => store.messages = read_table(name, rows, MESSAGE, read_message, d),
            _ => d.push(Message::warning(format!("unknown table {}, table ignored", name))),
        }
    }
    if !diagnostics.is_empty() {
        log::debug!("{} messages reading tables", diagnostics.len());
    }
    store.messages.extend(diagnostics);
    Ok(store)
}

fn read_table<T>(
    name: &str,
    rows: &[Value],
    columns: &[&str],
    read: fn(&mut Row) -> T,
    messages: &mut Vec<Message>,
) -> Vec<T> {
    let mut unknown = BTreeSet::new();
    let mut records = Vec::with_capacity(rows.len());
    for (index, value) in rows.iter().enumerate() {
        let Some(fields) = value.as_object() else {
            messages.push(Message::error(format!(
                "{} row {}: not an object, row excluded",
                name, index
            )));
            continue;
        };
        unknown.extend(
            fields
                .keys()
                .filter(|key| !columns.contains(&key.as_str()))
                .cloned(),
        );
        let mut row = Row {
            fields,
            error: None,
        };
        let record = read(&mut row);
        match row.error {
            None => records.push(record),
            Some(error) => messages.push(Message::error(format!(
                "{} row {}: {}, row excluded",
                name, index, error
            ))),
        }
    }
    for column in unknown {
        messages.push(Message::warning(format!(
            "{}: unknown column {} ignored",
            name, column
        )));
    }
    records
}

/// Fields of one row, records the first malformed value.
struct Row<'a> {
    fields: &'a Map<String, Value>,
    error: Option<String>,
}

impl<'a> Row<'a> {
    fn fail(&mut self, column: &str, reason: impl Display) {
        if self.error.is_none() {
            self.error = Some(format!("invalid value of {} ({})", column, reason));
        }
    }

    fn get(&self, column: &str) -> Option<&'a Value> {
        self.fields.get(column).filter(|value| !value.is_null())
    }

    fn opt_string(&mut self, column: &str) -> Option<String> {
        match self.get(column)? {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            other => {
                self.fail(column, format!("expected a string, got {}", other));
                None
            }
        }
    }

    fn string(&mut self, column: &str) -> String {
        if self.get(column).is_none() {
            self.fail(column, "missing");
        }
        self.opt_string(column).unwrap_or_default()
    }

    fn string_or(&mut self, column: &str, default: &str) -> String {
        self.opt_string(column).unwrap_or_else(|| default.to_string())
    }

    fn strings(&mut self, column: &str) -> Vec<String> {
        match self.get(column) {
            None => Vec::new(),
            Some(Value::Array(items)) => {
                let mut strings = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(text) => strings.push(text.clone()),
                        other => {
                            self.fail(column, format!("expected strings, got {}", other));
                            return Vec::new();
                        }
                    }
                }
                strings
            }
            Some(Value::String(text)) => vec![text.clone()],
            Some(other) => {
                self.fail(column, format!("expected strings, got {}", other));
                Vec::new()
            }
        }
    }

    fn number_or(&mut self, column: &str, default: f64) -> f64 {
        let value = match self.get(column) {
            None => return default,
            Some(value) => value,
        };
        let number = match value {
            Value::Number(number) => number.as_f64().ok_or_else(|| number.to_string()),
            Value::String(text) => parse_number(text).map_err(|err| err.to_string()),
            other => Err(format!("expected a number, got {}", other)),
        };
        number.unwrap_or_else(|reason| {
            self.fail(column, reason);
            default
        })
    }

    fn number(&mut self, column: &str) -> f64 {
        if self.get(column).is_none() {
            self.fail(column, "missing");
        }
        self.number_or(column, 0.0)
    }

    fn complex_or(&mut self, column: &str, default: Complex64) -> Complex64 {
        let value = match self.get(column) {
            None => return default,
            Some(value) => value,
        };
        let number = match value {
            Value::Number(number) => number
                .as_f64()
                .map(|re| Complex64::new(re, 0.0))
                .ok_or_else(|| number.to_string()),
            Value::String(text) => parse_complex(text).map_err(|err| err.to_string()),
            Value::Array(parts) => match parts.as_slice() {
                [re, im] => match (re.as_f64(), im.as_f64()) {
                    (Some(re), Some(im)) => Ok(Complex64::new(re, im)),
                    _ => Err(format!("expected [re, im], got {}", value)),
                },
                _ => Err(format!("expected [re, im], got {}", value)),
            },
            other => Err(format!("expected a complex number, got {}", other)),
        };
        number.unwrap_or_else(|reason| {
            self.fail(column, reason);
            default
        })
    }

    fn integer_or(&mut self, column: &str, default: i32) -> i32 {
        let value = match self.get(column) {
            None => return default,
            Some(value) => value,
        };
        let integer = match value {
            Value::Number(number) => number.as_i64().and_then(|i| i32::try_from(i).ok()),
            Value::String(text) => text.trim().parse::<i32>().ok(),
            _ => None,
        };
        integer.unwrap_or_else(|| {
            self.fail(column, format!("expected an integer, got {}", value));
            default
        })
    }

    fn boolean_or(&mut self, column: &str, default: bool) -> bool {
        let value = match self.get(column) {
            None => return default,
            Some(value) => value,
        };
        let flag = match value {
            Value::Bool(flag) => Some(*flag),
            Value::Number(number) => match number.as_i64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            Value::String(text) => match text.trim() {
                "true" | "True" | "1" => Some(true),
                "false" | "False" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        };
        flag.unwrap_or_else(|| {
            self.fail(column, format!("expected a boolean, got {}", value));
            default
        })
    }
}

fn read_branch(row: &mut Row) -> Branch {
    let id = row.string("id");
    Branch::new(&id, &row.string("id_of_node_A"), &row.string("id_of_node_B"))
        .y_lo(row.complex_or("y_lo", Complex64::new(f64::INFINITY, f64::INFINITY)))
        .y_tr(row.complex_or("y_tr", Complex64::zero()))
}

fn read_slacknode(row: &mut Row) -> Slacknode {
    Slacknode {
        id_of_node: row.string("id_of_node"),
        V: row.complex_or("V", Complex64::one()),
    }
}

fn read_injection(row: &mut Row) -> Injection {
    Injection {
        id: row.string("id"),
        id_of_node: row.string("id_of_node"),
        P10: row.number_or("P10", 0.0),
        Q10: row.number_or("Q10", 0.0),
        Exp_v_p: row.number_or("Exp_v_p", 0.0),
        Exp_v_q: row.number_or("Exp_v_q", 0.0),
    }
}

fn read_output(row: &mut Row) -> Output {
    Output {
        id_of_batch: row.string("id_of_batch"),
        id_of_device: row.string("id_of_device"),
        id_of_node: row.opt_string("id_of_node"),
    }
}

fn read_pvalue(row: &mut Row) -> PValue {
    PValue {
        id_of_batch: row.string("id_of_batch"),
        P: row.number_or("P", 0.0),
        direction: row.number_or("direction", 1.0),
    }
}

fn read_qvalue(row: &mut Row) -> QValue {
    QValue {
        id_of_batch: row.string("id_of_batch"),
        Q: row.number_or("Q", 0.0),
        direction: row.number_or("direction", 1.0),
    }
}

fn read_ivalue(row: &mut Row) -> IValue {
    IValue {
        id_of_batch: row.string("id_of_batch"),
        I: row.number_or("I", 0.0),
    }
}

fn read_vvalue(row: &mut Row) -> Vvalue {
    Vvalue {
        id_of_node: row.string("id_of_node"),
        V: row.number_or("V", 1.0),
    }
}

fn read_vlimit(row: &mut Row) -> Vlimit {
    Vlimit {
        id_of_node: row.string("id_of_node"),
        min: row.number_or("min", 0.0),
        max: row.number_or("max", f64::INFINITY),
        step: row.integer_or("step", GENERIC_STEP),
    }
}

fn read_factor(row: &mut Row) -> Factor {
    let id = row.string("id");
    Factor {
        step: row.integer_or("step", GENERIC_STEP),
        type_: row.string_or("type", "var"),
        id_of_source: row.string_or("id_of_source", &id),
        value: row.number_or("value", 1.0),
        min: row.number_or("min", f64::NEG_INFINITY),
        max: row.number_or("max", f64::INFINITY),
        is_discrete: row.boolean_or("is_discrete", false),
        m: row.number_or("m", 1.0),
        n: row.number_or("n", 0.0),
        cost: row.number_or("cost", 0.0),
        id,
    }
}

fn read_injectionlink(row: &mut Row) -> InjectionLink {
    InjectionLink {
        step: row.integer_or("step", GENERIC_STEP),
        injid: row.string("injid"),
        part: row.string("part"),
        id: row.string("id"),
    }
}

fn read_terminallink(row: &mut Row) -> TerminalLink {
    TerminalLink {
        step: row.integer_or("step", GENERIC_STEP),
        branchid: row.string("branchid"),
        nodeid: row.string("nodeid"),
        id: row.string("id"),
    }
}

fn read_term(row: &mut Row) -> Term {
    Term {
        id: row.string("id"),
        args: row.strings("args"),
        fn_: row.string_or("fn", "diff"),
        step: row.integer_or("step", 0),
    }
}

fn read_message(row: &mut Row) -> Message {
    let code = row.integer_or("level", Level::Error as i32);
    let level = Level::from_code(code.into()).unwrap_or_else(|| {
        row.fail("level", format!("unknown level {}", code));
        Level::Error
    });
    Message::new(row.string_or("message", ""), level)
}
