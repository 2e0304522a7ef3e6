//! Factors scaling injections and positioning taps, resolved per
//! optimization step.
//!
//! Factors and links are either generic (step -1, valid for all steps) or
//! specific to one step. Data of a step override generic data with the
//! same key:
//!
//! * factors are keyed by `id`
//! * injection links are keyed by `(injection, part)`
//! * terminal links are keyed by `(branch, node)`
//!
//! Generic factors referenced by generic links receive symbol indices
//! `0..count_of_generic_factors` which are identical in all steps.
//! Factors needed by a step in addition, including the default factor
//! replacing undefined ones, are numbered after them.

use crate::error::{ModelError, Result};
use crate::factormeta::{make_factor_meta, FactorMeta};
use crate::records::{Factor, FactorKind, InjectionLink, Part, TerminalLink, GENERIC_STEP};
use crate::terminals::{BranchTerminals, InjectionData};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Factors and links of all steps, prepared once per model.
#[derive(Debug, Clone, Default)]
pub struct FactorDefs {
    /// Valid factors per step, `GENERIC_STEP` holds generic factors.
    factors: BTreeMap<i32, BTreeMap<String, Factor>>,

    /// Links of injection parts per step.
    injlinks: BTreeMap<i32, BTreeMap<(usize, Part), String>>,

    /// Links of branch terminals per step.
    termlinks: BTreeMap<i32, BTreeMap<usize, String>>,

    /// Symbol indices of generic factors referenced by generic links.
    pub generic_symbols: BTreeMap<String, usize>,

    pub count_of_generic_factors: usize,

    pub default_factor_id: String,

    injection_ids: Vec<String>,

    /// (branch, node) of linked terminals.
    terminal_ids: BTreeMap<usize, (String, String)>,
}

/// Prepares factors and links of all steps.
///
/// Rows which cannot be resolved are excluded: factors of other kinds than
/// `var` and `const`, links to unknown injections or terminals and links
/// with an invalid part. Links to factors not defined for a step resolve
/// to the default factor of that step. Of several rows with identical key
/// the first one is used.
pub fn make_factordefs(
    factors: &[Factor],
    injectionlinks: &[InjectionLink],
    terminallinks: &[TerminalLink],
    injections: &[InjectionData],
    terminals: &BranchTerminals,
    default_factor_id: &str,
) -> FactorDefs {
    let mut defs = FactorDefs {
        default_factor_id: default_factor_id.to_string(),
        injection_ids: injections.iter().map(|inj| inj.id.clone()).collect(),
        ..Default::default()
    };

    for f in factors {
        if f.step < GENERIC_STEP || f.kind().is_none() {
            log::debug!(
                "factor '{}' of step {} excluded, type '{}'",
                f.id,
                f.step,
                f.type_
            );
            continue;
        }
        defs.factors
            .entry(f.step)
            .or_default()
            .entry(f.id.clone())
            .or_insert_with(|| f.clone());
    }
    let injection_index: BTreeMap<&str, usize> = injections
        .iter()
        .map(|inj| (inj.id.as_str(), inj.index_of_injection))
        .collect();
    for link in injectionlinks {
        let index = injection_index.get(link.injid.as_str()).copied();
        let part = Part::from_name(&link.part);
        let (Some(index), Some(part)) = (index, part) else {
            log::debug!(
                "link of injection '{}' part '{}' excluded",
                link.injid,
                link.part
            );
            continue;
        };
        if link.step < GENERIC_STEP {
            log::debug!("link to factor '{}' of step {} excluded", link.id, link.step);
            continue;
        }
        defs.injlinks
            .entry(link.step)
            .or_default()
            .entry((index, part))
            .or_insert_with(|| link.id.clone());
    }

    for link in terminallinks {
        let Some(index) = terminals.find(&link.branchid, &link.nodeid) else {
            log::debug!(
                "link of terminal ('{}', '{}') excluded",
                link.branchid,
                link.nodeid
            );
            continue;
        };
        if link.step < GENERIC_STEP {
            log::debug!("link to factor '{}' of step {} excluded", link.id, link.step);
            continue;
        }
        defs.terminal_ids
            .entry(index)
            .or_insert_with(|| (link.branchid.clone(), link.nodeid.clone()));
        defs.termlinks
            .entry(link.step)
            .or_default()
            .entry(index)
            .or_insert_with(|| link.id.clone());
    }

    let generic_ids: BTreeSet<&String> = defs
        .injlinks
        .get(&GENERIC_STEP)
        .into_iter()
        .flat_map(|links| links.values())
        .chain(
            defs.termlinks
                .get(&GENERIC_STEP)
                .into_iter()
                .flat_map(|links| links.values()),
        )
        .filter(|id| {
            defs.factors
                .get(&GENERIC_STEP)
                .map_or(false, |generic| generic.contains_key(*id))
        })
        .collect();
    let generic_symbols: BTreeMap<String, usize> = generic_ids
        .into_iter()
        .enumerate()
        .map(|(index, id)| (id.clone(), index))
        .collect();
    defs.count_of_generic_factors = generic_symbols.len();
    defs.generic_symbols = generic_symbols;

    log::debug!(
        "factor definitions: {} generic symbols, steps {:?}",
        defs.count_of_generic_factors,
        defs.steps()
    );
    defs
}

impl FactorDefs {
    /// Steps having specific factors or links.
    pub fn steps(&self) -> Vec<i32> {
        let steps: BTreeSet<i32> = self
            .factors
            .keys()
            .chain(self.injlinks.keys())
            .chain(self.termlinks.keys())
            .copied()
            .filter(|&step| step > GENERIC_STEP)
            .collect();
        steps.into_iter().collect()
    }

    /// Symbol index of the generic factor linked to the terminal.
    pub fn generic_terminal_symbol(&self, index_of_terminal: usize) -> Option<usize> {
        self.termlinks
            .get(&GENERIC_STEP)
            .and_then(|links| links.get(&index_of_terminal))
            .and_then(|id| self.generic_symbols.get(id))
            .copied()
    }

    fn merged<K: Ord + Clone, V: Clone>(
        data: &BTreeMap<i32, BTreeMap<K, V>>,
        step: i32,
    ) -> BTreeMap<K, V> {
        let mut merged = data.get(&GENERIC_STEP).cloned().unwrap_or_default();
        if let Some(specific) = data.get(&step) {
            for (key, value) in specific {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}

/// Factor resolved for one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedFactor {
    pub step: i32,
    pub id: String,
    pub kind: FactorKind,
    pub id_of_source: String,
    /// Literal value of the definition.
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub is_discrete: bool,
    pub m: f64,
    pub n: f64,
    pub cost: f64,

    /// Position in the vector of symbols of the step.
    pub index_of_symbol: usize,

    /// Symbol of the source factor in the previous step.
    pub index_of_source: Option<usize>,

    /// Value of the source factor in the previous step or the literal value.
    pub initial: f64,
}

/// Factors scaling active and reactive power of an injection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InjectionFactors {
    pub index_of_injection: usize,
    pub id_of_injection: String,
    pub id_of_kp: String,
    pub id_of_kq: String,
    /// Symbol of the active power factor.
    pub kp: usize,
    /// Symbol of the reactive power factor.
    pub kq: usize,
}

impl InjectionFactors {
    pub fn symbol(&self, part: Part) -> usize {
        match part {
            Part::P => self.kp,
            Part::Q => self.kq,
        }
    }
}

/// Tap factor of a branch terminal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminalFactor {
    pub index_of_terminal: usize,
    pub id_of_branch: String,
    pub id_of_node: String,
    pub id_of_factor: String,
    pub index_of_symbol: usize,
}

/// Value of a factor after a step, input for the next step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FactorValue {
    pub index_of_symbol: usize,
    pub value: f64,
}

/// Values of the factors of one step by factor id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorValues {
    pub step: i32,
    pub values: BTreeMap<String, FactorValue>,
}

impl FactorValues {
    pub fn get(&self, id: &str) -> Option<&FactorValue> {
        self.values.get(id)
    }

    pub fn value(&self, id: &str) -> Option<f64> {
        self.values.get(id).map(|v| v.value)
    }
}

/// Factors of one optimization step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepFactors {
    pub step: i32,
    pub count_of_generic_factors: usize,

    /// Sorted by symbol index.
    pub factors: Vec<ResolvedFactor>,

    /// One entry per injection, ordered by injection index.
    pub injfactors: Vec<InjectionFactors>,

    /// Linked terminals ordered by terminal index.
    pub termfactors: Vec<TerminalFactor>,

    pub meta: FactorMeta,
}

impl StepFactors {
    pub fn get(&self, id: &str) -> Option<&ResolvedFactor> {
        self.factors.iter().find(|f| f.id == id)
    }

    /// Factor scaling a part of an injection.
    pub fn factor_of_injection(
        &self,
        index_of_injection: usize,
        part: Part,
    ) -> Option<&ResolvedFactor> {
        let symbol = self.injfactors.get(index_of_injection)?.symbol(part);
        self.factors.iter().find(|f| f.index_of_symbol == symbol)
    }

    /// Values of the factors from the solver result `var_const`, values of
    /// variables followed by values of constants.
    pub fn values_from_result(&self, var_const: &[f64]) -> Result<FactorValues> {
        let expected = self.meta.index_of_var_symbol.len() + self.meta.index_of_const_symbol.len();
        if var_const.len() != expected {
            return Err(ModelError::ResultLength {
                expected,
                actual: var_const.len(),
            });
        }
        let values = self
            .factors
            .iter()
            .zip(&self.meta.var_const_to_factor)
            .map(|(f, &k)| {
                (
                    f.id.clone(),
                    FactorValue {
                        index_of_symbol: f.index_of_symbol,
                        value: var_const[k],
                    },
                )
            })
            .collect();
        Ok(FactorValues {
            step: self.step,
            values,
        })
    }

    /// Initial values of the factors.
    pub fn initial_values(&self) -> FactorValues {
        FactorValues {
            step: self.step,
            values: self
                .factors
                .iter()
                .map(|f| {
                    (
                        f.id.clone(),
                        FactorValue {
                            index_of_symbol: f.index_of_symbol,
                            value: f.initial,
                        },
                    )
                })
                .collect(),
        }
    }
}

/// Resolves the factors of `step`, step specific symbols start after the
/// generic symbols.
///
/// `previous` are the values of step `step - 1`, they are required for
/// `step > 0` and must be `None` for step 0.
pub fn resolve_step(
    defs: &FactorDefs,
    step: i32,
    previous: Option<&FactorValues>,
) -> Result<StepFactors> {
    resolve_step_with_offset(defs, step, previous, defs.count_of_generic_factors)
}

/// Resolves the factors of `step`, step specific symbols start at `offset`.
pub fn resolve_step_with_offset(
    defs: &FactorDefs,
    step: i32,
    previous: Option<&FactorValues>,
    offset: usize,
) -> Result<StepFactors> {
    if step < 0 {
        return Err(ModelError::InvalidStep(step));
    }
    match previous {
        None if step > 0 => return Err(ModelError::MissingPreviousStep(step)),
        Some(prev) if prev.step != step - 1 => {
            return Err(ModelError::StepMismatch {
                step,
                expected: step - 1,
                given: prev.step,
            })
        }
        _ => {}
    }
    if offset < defs.count_of_generic_factors {
        return Err(ModelError::Options(format!(
            "offset {} of step specific symbols overlaps {} generic symbols",
            offset, defs.count_of_generic_factors
        )));
    }

    let factors = FactorDefs::merged(&defs.factors, step);
    let injlinks = FactorDefs::merged(&defs.injlinks, step);
    let termlinks = FactorDefs::merged(&defs.termlinks, step);

    let default_id = &defs.default_factor_id;
    let resolve_id = |id: Option<&String>| -> String {
        match id {
            Some(id) if factors.contains_key(id) => id.clone(),
            Some(id) => {
                log::debug!("step {}: factor '{}' is not defined, using default", step, id);
                default_id.clone()
            }
            None => default_id.clone(),
        }
    };

    let inj_ids: Vec<(String, String)> = (0..defs.injection_ids.len())
        .map(|i| {
            (
                resolve_id(injlinks.get(&(i, Part::P))),
                resolve_id(injlinks.get(&(i, Part::Q))),
            )
        })
        .collect();
    let term_ids: Vec<(usize, String)> = termlinks
        .iter()
        .map(|(&index, id)| (index, resolve_id(Some(id))))
        .collect();

    let mut symbols = defs.generic_symbols.clone();
    let required: BTreeSet<&String> = inj_ids
        .iter()
        .flat_map(|(kp, kq)| [kp, kq])
        .chain(term_ids.iter().map(|(_, id)| id))
        .filter(|id| !defs.generic_symbols.contains_key(*id))
        .collect();
    for (k, id) in required.into_iter().enumerate() {
        symbols.insert(id.clone(), offset + k);
    }

    let mut resolved: Vec<ResolvedFactor> = symbols
        .iter()
        .map(|(id, &index_of_symbol)| {
            let f = factors
                .get(id)
                .cloned()
                .unwrap_or_else(|| Factor::default_factor(id, step));
            let (initial, index_of_source) = match previous.and_then(|p| p.get(&f.id_of_source)) {
                Some(source) => (source.value, Some(source.index_of_symbol)),
                None => (f.value, None),
            };
            ResolvedFactor {
                step,
                id: id.clone(),
                kind: f.kind().unwrap_or(FactorKind::Const),
                id_of_source: f.id_of_source,
                value: f.value,
                min: f.min,
                max: f.max,
                is_discrete: f.is_discrete,
                m: f.m,
                n: f.n,
                cost: f.cost,
                index_of_symbol,
                index_of_source,
                initial,
            }
        })
        .collect();
    resolved.sort_by_key(|f| f.index_of_symbol);

    let injfactors: Vec<InjectionFactors> = inj_ids
        .into_iter()
        .enumerate()
        .map(|(i, (id_of_kp, id_of_kq))| InjectionFactors {
            index_of_injection: i,
            id_of_injection: defs.injection_ids[i].clone(),
            kp: symbols[&id_of_kp],
            kq: symbols[&id_of_kq],
            id_of_kp,
            id_of_kq,
        })
        .collect();
    let termfactors: Vec<TerminalFactor> = term_ids
        .into_iter()
        .map(|(index, id)| {
            let (branch, node) = defs.terminal_ids.get(&index).cloned().unwrap_or_default();
            TerminalFactor {
                index_of_terminal: index,
                id_of_branch: branch,
                id_of_node: node,
                index_of_symbol: symbols[&id],
                id_of_factor: id,
            }
        })
        .collect();

    let meta = make_factor_meta(
        &resolved,
        &injfactors,
        &termfactors,
        defs.count_of_generic_factors,
    );

    log::debug!(
        "step {}: {} factors ({} vars, {} consts), {} terminal factors",
        step,
        resolved.len(),
        meta.index_of_var_symbol.len(),
        meta.index_of_const_symbol.len(),
        termfactors.len()
    );

    Ok(StepFactors {
        step,
        count_of_generic_factors: defs.count_of_generic_factors,
        factors: resolved,
        injfactors,
        termfactors,
        meta,
    })
}

/// Resolves steps `0..count_of_steps`, each step initialized by the
/// initial values of its predecessor.
pub fn resolve_steps(defs: &FactorDefs, count_of_steps: usize) -> Result<Vec<StepFactors>> {
    let mut steps: Vec<StepFactors> = Vec::with_capacity(count_of_steps);
    for step in 0..count_of_steps {
        let previous = steps.last().map(|sf| sf.initial_values());
        let step = i32::try_from(step).map_err(|_| ModelError::InvalidStep(i32::MAX))?;
        steps.push(resolve_step(defs, step, previous.as_ref())?);
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{make_model, Model};
    use crate::options::ModelOptions;
    use crate::cmplx;
    use crate::records::{Branch, Injection, RecordStore, Slacknode};
    use anyhow::{format_err, Result};

    fn grid() -> RecordStore {
        RecordStore {
            branches: vec![
                Branch::new("line_0", "n0", "n1").y_lo(cmplx!(1e3, -1e3)),
                Branch::new("line_1", "n1", "n2").y_lo(cmplx!(1e3, -1e3)),
            ],
            slacknodes: vec![Slacknode::new("n0")],
            injections: vec![
                Injection::new("consumer_0", "n1").pq(30.0, 10.0),
                Injection::new("consumer_1", "n2").pq(20.0, 5.0),
            ],
            ..Default::default()
        }
    }

    fn model(store: &RecordStore) -> Result<Model> {
        Ok(make_model(store, &ModelOptions::default())?)
    }

    #[test]
    fn test_generic_factor_stable_symbol() -> Result<()> {
        let mut store = grid();
        store.factors = vec![Factor::new("kp")];
        store.injectionlinks = vec![InjectionLink::new(-1, "consumer_0", "p", "kp")];
        let model = model(&store)?;

        let steps = resolve_steps(&model.factordefs, 3)?;
        for sf in &steps {
            let rows: Vec<&ResolvedFactor> = sf.factors.iter().filter(|f| f.id == "kp").collect();
            if rows.len() != 1 {
                return Err(format_err!("step {}: {} rows of kp", sf.step, rows.len()));
            }
            assert_eq!(rows[0].index_of_symbol, 0);
            assert_eq!(rows[0].kind, FactorKind::Var);
            assert_eq!(sf.injfactors[0].kp, 0);
        }
        assert_eq!(steps[0].count_of_generic_factors, 1);
        Ok(())
    }

    #[test]
    fn test_default_factors() -> Result<()> {
        let store = grid();
        let model = model(&store)?;
        let sf = resolve_step(&model.factordefs, 0, None)?;

        assert_eq!(sf.factors.len(), 1);
        let f = &sf.factors[0];
        assert_eq!(f.id, "_default_");
        assert_eq!(f.kind, FactorKind::Const);
        assert_eq!((f.value, f.min, f.max), (1.0, 1.0, 1.0));
        for inj in &sf.injfactors {
            assert_eq!((inj.kp, inj.kq), (0, 0));
        }
        Ok(())
    }

    #[test]
    fn test_missing_terminal_factor() -> Result<()> {
        let mut store = grid();
        store.terminallinks = vec![TerminalLink::new(0, "line_0", "n0", "taps")];
        let model = model(&store)?;

        let sf = resolve_step(&model.factordefs, 0, None)?;

        assert_eq!(sf.termfactors.len(), 1);
        let tf = &sf.termfactors[0];
        assert_eq!(tf.id_of_factor, "_default_");
        assert_eq!(tf.index_of_terminal, 0);
        let f = sf
            .get("_default_")
            .ok_or_else(|| format_err!("default factor missing"))?;
        assert_eq!(f.index_of_symbol, tf.index_of_symbol);
        assert_eq!((f.kind, f.value, f.min, f.max), (FactorKind::Const, 1.0, 1.0, 1.0));
        Ok(())
    }

    #[test]
    fn test_step_specific_override() -> Result<()> {
        let mut store = grid();
        store.factors = vec![
            Factor::new("kp").bounds(0.5, 2.0),
            Factor::new("kp").step(1).constant().value(1.2),
            Factor::new("kq").step(1),
            Factor::new("kx").step(0).source("kp"),
        ];
        store.injectionlinks = vec![
            InjectionLink::new(-1, "consumer_0", "p", "kp"),
            InjectionLink::new(-1, "consumer_1", "p", "kp"),
            InjectionLink::new(0, "consumer_1", "p", "kx"),
            InjectionLink::new(1, "consumer_1", "q", "kq"),
        ];
        let model = model(&store)?;

        let step0 = resolve_step(&model.factordefs, 0, None)?;
        let ids: Vec<(&str, usize)> = step0
            .factors
            .iter()
            .map(|f| (f.id.as_str(), f.index_of_symbol))
            .collect();
        assert_eq!(ids, vec![("kp", 0), ("_default_", 1), ("kx", 2)]);
        assert_eq!(step0.injfactors[1].id_of_kp, "kx");
        // step 0 never inherits
        assert!(step0.factors.iter().all(|f| f.index_of_source.is_none()));

        let step1 = resolve_step(&model.factordefs, 1, Some(&step0.initial_values()))?;
        let kp = step1.get("kp").ok_or_else(|| format_err!("kp missing"))?;
        assert_eq!(kp.index_of_symbol, 0);
        assert_eq!(kp.kind, FactorKind::Const);
        assert_eq!(kp.value, 1.2);
        // source kp exists in step 0
        assert_eq!(kp.index_of_source, Some(0));
        assert_eq!(kp.initial, 1.0);
        assert!(step1.get("kx").is_none());
        assert_eq!(step1.injfactors[1].id_of_kp, "kp");
        assert_eq!(step1.injfactors[1].id_of_kq, "kq");
        Ok(())
    }

    #[test]
    fn test_inherit_or_literal() -> Result<()> {
        let mut store = grid();
        store.factors = vec![
            Factor::new("k0").step(0).value(3.0),
            Factor::new("k1").step(1).source("k0").value(7.0),
            Factor::new("k2").step(1).source("unknown").value(5.0),
        ];
        store.injectionlinks = vec![
            InjectionLink::new(0, "consumer_0", "p", "k0"),
            InjectionLink::new(1, "consumer_0", "p", "k1"),
            InjectionLink::new(1, "consumer_0", "q", "k2"),
        ];
        let model = model(&store)?;
        let step0 = resolve_step(&model.factordefs, 0, None)?;
        assert_eq!(step0.get("k0").map(|f| f.initial), Some(3.0));

        let mut previous = step0.initial_values();
        previous.values.insert(
            "k0".to_string(),
            FactorValue {
                index_of_symbol: 1,
                value: 4.5,
            },
        );
        let step1 = resolve_step(&model.factordefs, 1, Some(&previous))?;

        let k1 = step1.get("k1").ok_or_else(|| format_err!("k1 missing"))?;
        assert_eq!((k1.initial, k1.index_of_source), (4.5, Some(1)));
        let k2 = step1.get("k2").ok_or_else(|| format_err!("k2 missing"))?;
        assert_eq!((k2.initial, k2.index_of_source), (5.0, None));
        Ok(())
    }

    #[test]
    fn test_resolve_is_idempotent() -> Result<()> {
        let mut store = grid();
        store.factors = vec![Factor::new("kp"), Factor::new("kq").step(1)];
        store.injectionlinks = vec![
            InjectionLink::new(-1, "consumer_0", "p", "kp"),
            InjectionLink::new(1, "consumer_0", "q", "kq"),
        ];
        let model = model(&store)?;
        let step0 = resolve_step(&model.factordefs, 0, None)?;
        let previous = step0.initial_values();

        let a = resolve_step(&model.factordefs, 1, Some(&previous))?;
        let b = resolve_step(&model.factordefs, 1, Some(&previous))?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn test_step_chain_errors() -> Result<()> {
        let model = model(&grid())?;
        let defs = &model.factordefs;
        let step0 = resolve_step(defs, 0, None)?;

        assert_eq!(
            resolve_step(defs, 2, None).err(),
            Some(ModelError::MissingPreviousStep(2))
        );
        assert_eq!(
            resolve_step(defs, 2, Some(&step0.initial_values())).err(),
            Some(ModelError::StepMismatch {
                step: 2,
                expected: 1,
                given: 0
            })
        );
        assert_eq!(
            resolve_step(defs, 0, Some(&step0.initial_values())).err(),
            Some(ModelError::StepMismatch {
                step: 0,
                expected: -1,
                given: 0
            })
        );
        assert_eq!(resolve_step(defs, -1, None).err(), Some(ModelError::InvalidStep(-1)));
        Ok(())
    }

    #[test]
    fn test_invalid_rows_excluded() -> Result<()> {
        let mut store = grid();
        let mut bad = Factor::new("kbad");
        bad.type_ = "variable".to_string();
        store.factors = vec![bad, Factor::new("kp").step(0)];
        store.injectionlinks = vec![
            InjectionLink::new(-1, "consumer_0", "p", "kbad"),
            InjectionLink::new(-2, "consumer_1", "q", "kp"),
            InjectionLink::new(0, "consumer_9", "p", "kp"),
            InjectionLink::new(0, "consumer_1", "pq", "kp"),
        ];
        let model = model(&store)?;
        let defs = &model.factordefs;
        assert_eq!(defs.count_of_generic_factors, 0);

        let sf = resolve_step(defs, 0, None)?;
        assert_eq!(sf.factors.len(), 1);
        assert_eq!(sf.factors[0].id, "_default_");
        assert_eq!(sf.injfactors[0].id_of_kp, "_default_");
        Ok(())
    }

    #[test]
    fn test_generic_terminal_link_to_missing_factor() -> Result<()> {
        let mut store = grid();
        store.terminallinks = vec![TerminalLink::new(-1, "line_0", "n0", "taps")];
        let model = model(&store)?;
        assert_eq!(model.factordefs.count_of_generic_factors, 0);
        assert_eq!(model.branchterminals()[0].index_of_factor, None);

        for sf in resolve_steps(&model.factordefs, 2)? {
            assert_eq!(sf.termfactors.len(), 1);
            let tf = &sf.termfactors[0];
            assert_eq!(tf.id_of_factor, "_default_");
            assert_eq!((tf.id_of_branch.as_str(), tf.id_of_node.as_str()), ("line_0", "n0"));
            let f = sf
                .get("_default_")
                .ok_or_else(|| format_err!("step {}: default factor missing", sf.step))?;
            assert_eq!(f.index_of_symbol, tf.index_of_symbol);
            assert_eq!((f.kind, f.value, f.min, f.max), (FactorKind::Const, 1.0, 1.0, 1.0));
            assert_eq!(sf.meta.var_const_to_ftaps.len(), 1);
        }
        Ok(())
    }

    #[test]
    fn test_generic_injection_link_to_missing_factor() -> Result<()> {
        let mut store = grid();
        store.factors = vec![Factor::new("kq").step(1)];
        store.injectionlinks = vec![
            InjectionLink::new(-1, "consumer_0", "p", "kmissing"),
            InjectionLink::new(-1, "consumer_0", "q", "kq"),
        ];
        let model = model(&store)?;
        assert_eq!(model.factordefs.count_of_generic_factors, 0);

        let steps = resolve_steps(&model.factordefs, 2)?;
        assert_eq!(steps[0].injfactors[0].id_of_kp, "_default_");
        // kq is defined for step 1 only
        assert_eq!(steps[0].injfactors[0].id_of_kq, "_default_");
        assert_eq!(steps[1].injfactors[0].id_of_kp, "_default_");
        assert_eq!(steps[1].injfactors[0].id_of_kq, "kq");
        let kq = steps[1].get("kq").ok_or_else(|| format_err!("kq missing"))?;
        assert_eq!(kq.kind, FactorKind::Var);
        assert_eq!(steps[1].injfactors[0].kq, kq.index_of_symbol);
        Ok(())
    }

    #[test]
    fn test_override_of_generic_link_and_inheritance() -> Result<()> {
        let mut store = grid();
        store.factors = vec![
            Factor::new("kp").value(0.7),
            Factor::new("k1").step(1).source("kp").value(9.0),
        ];
        store.injectionlinks = vec![
            InjectionLink::new(-1, "consumer_0", "p", "kp"),
            InjectionLink::new(1, "consumer_0", "p", "k1"),
        ];
        let model = model(&store)?;
        let steps = resolve_steps(&model.factordefs, 3)?;

        assert_eq!(steps[0].injfactors[0].id_of_kp, "kp");
        assert_eq!(steps[1].injfactors[0].id_of_kp, "k1");
        // no data of step 2, generic link applies again
        assert_eq!(steps[2].injfactors[0].id_of_kp, "kp");

        let k1 = steps[1].get("k1").ok_or_else(|| format_err!("k1 missing"))?;
        assert_eq!((k1.initial, k1.index_of_source), (0.7, Some(0)));
        assert_eq!(k1.index_of_symbol, 2);
        assert!(steps[2].get("k1").is_none());
        let kp = steps[2].get("kp").ok_or_else(|| format_err!("kp missing"))?;
        assert_eq!((kp.initial, kp.index_of_symbol), (0.7, 0));

        assert_eq!(
            resolve_step(&model.factordefs, 2, None).err(),
            Some(ModelError::MissingPreviousStep(2))
        );
        Ok(())
    }

    #[test]
    fn test_offset() -> Result<()> {
        let mut store = grid();
        store.factors = vec![Factor::new("kp"), Factor::new("kq").step(0)];
        store.injectionlinks = vec![
            InjectionLink::new(-1, "consumer_0", "p", "kp"),
            InjectionLink::new(0, "consumer_0", "q", "kq"),
        ];
        let model = model(&store)?;
        let sf = resolve_step_with_offset(&model.factordefs, 0, None, 10)?;
        let symbols: Vec<usize> = sf.factors.iter().map(|f| f.index_of_symbol).collect();
        // "_default_" < "kq"
        assert_eq!(symbols, vec![0, 10, 11]);

        assert!(resolve_step_with_offset(&model.factordefs, 0, None, 0).is_err());
        Ok(())
    }
}
