use crate::factors::{InjectionFactors, ResolvedFactor, TerminalFactor};
use crate::records::FactorKind;
use serde::Serialize;

/// Layout of the vector of decision variables and parameters of a step.
///
/// A solver works on `var_const`, values of all variables followed by
/// values of all constants, each ordered by symbol index. The
/// `var_const_to_*` arrays pick values from `var_const`:
///
/// ```text
/// factor values    = var_const[var_const_to_factor]
/// active power k   = var_const[var_const_to_kp]
/// reactive power k = var_const[var_const_to_kq]
/// tap positions    = var_const[var_const_to_ftaps]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FactorMeta {
    /// Ids of the symbols specific to the step.
    pub id_of_step_symbol: Vec<String>,

    pub index_of_var_symbol: Vec<usize>,
    pub index_of_const_symbol: Vec<usize>,

    /// Initial values of variables.
    pub values_of_vars: Vec<f64>,
    pub var_min: Vec<f64>,
    pub var_max: Vec<f64>,
    pub is_discrete: Vec<bool>,
    /// Cost of change of variables.
    pub cost: Vec<f64>,

    pub values_of_consts: Vec<f64>,

    /// Per factor (symbol order).
    pub var_const_to_factor: Vec<usize>,
    /// Per injection.
    pub var_const_to_kp: Vec<usize>,
    /// Per injection.
    pub var_const_to_kq: Vec<usize>,
    /// Per linked terminal (terminal order).
    pub var_const_to_ftaps: Vec<usize>,
}

impl FactorMeta {
    pub fn count_of_vars(&self) -> usize {
        self.index_of_var_symbol.len()
    }

    pub fn count_of_consts(&self) -> usize {
        self.index_of_const_symbol.len()
    }
}

/// Arranges resolved factors in var/const order.
///
/// `factors` must be sorted by symbol index and contain every symbol
/// referenced by `injfactors` and `termfactors`.
pub fn make_factor_meta(
    factors: &[ResolvedFactor],
    injfactors: &[InjectionFactors],
    termfactors: &[TerminalFactor],
    count_of_generic_factors: usize,
) -> FactorMeta {
    let (vars, consts): (Vec<&ResolvedFactor>, Vec<&ResolvedFactor>) =
        factors.iter().partition(|f| f.kind == FactorKind::Var);

    let size = factors
        .iter()
        .map(|f| f.index_of_symbol + 1)
        .max()
        .unwrap_or(0);
    let mut position = vec![usize::MAX; size];
    for (k, f) in vars.iter().chain(consts.iter()).enumerate() {
        position[f.index_of_symbol] = k;
    }

    FactorMeta {
        id_of_step_symbol: factors
            .iter()
            .filter(|f| f.index_of_symbol >= count_of_generic_factors)
            .map(|f| f.id.clone())
            .collect(),
        index_of_var_symbol: vars.iter().map(|f| f.index_of_symbol).collect(),
        index_of_const_symbol: consts.iter().map(|f| f.index_of_symbol).collect(),
        values_of_vars: vars.iter().map(|f| f.initial).collect(),
        var_min: vars.iter().map(|f| f.min).collect(),
        var_max: vars.iter().map(|f| f.max).collect(),
        is_discrete: vars.iter().map(|f| f.is_discrete).collect(),
        cost: vars.iter().map(|f| f.cost).collect(),
        values_of_consts: consts.iter().map(|f| f.initial).collect(),
        var_const_to_factor: factors.iter().map(|f| position[f.index_of_symbol]).collect(),
        var_const_to_kp: injfactors.iter().map(|inj| position[inj.kp]).collect(),
        var_const_to_kq: injfactors.iter().map(|inj| position[inj.kq]).collect(),
        var_const_to_ftaps: termfactors
            .iter()
            .map(|tf| position[tf.index_of_symbol])
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::{resolve_step, resolve_steps};
    use crate::model::make_model;
    use crate::options::ModelOptions;
    use crate::cmplx;
    use crate::error::ModelError;
    use crate::records::{
        Branch, Factor, Injection, InjectionLink, RecordStore, Slacknode, TerminalLink,
    };
    use anyhow::Result;

    fn store() -> RecordStore {
        let mut taps = Factor::new("taps").bounds(-16.0, 16.0).value(0.0);
        taps.is_discrete = true;
        taps.m = -0.00625;
        taps.n = 1.0;
        taps.cost = 0.5;
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
            factors: vec![
                taps,
                Factor::new("kp").bounds(0.0, 5.0).value(0.8),
                Factor::new("kq").constant().value(0.9),
            ],
            injectionlinks: vec![
                InjectionLink::new(-1, "consumer_0", "p", "kp"),
                InjectionLink::new(-1, "consumer_1", "p", "kp"),
                InjectionLink::new(-1, "consumer_1", "q", "kq"),
            ],
            terminallinks: vec![TerminalLink::new(-1, "line_1", "n1", "taps")],
            ..Default::default()
        }
    }

    #[test]
    fn test_var_const_layout() -> Result<()> {
        let model = make_model(&store(), &ModelOptions::default())?;
        let sf = resolve_step(&model.factordefs, 0, None)?;

        // symbols: kp 0, kq 1, taps 2, _default_ 3
        let ids: Vec<&str> = sf.factors.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["kp", "kq", "taps", "_default_"]);

        let meta = &sf.meta;
        assert_eq!(meta.id_of_step_symbol, vec!["_default_"]);
        assert_eq!(meta.index_of_var_symbol, vec![0, 2]);
        assert_eq!(meta.index_of_const_symbol, vec![1, 3]);
        assert_eq!(meta.values_of_vars, vec![0.8, 0.0]);
        assert_eq!(meta.var_min, vec![0.0, -16.0]);
        assert_eq!(meta.is_discrete, vec![false, true]);
        assert_eq!(meta.cost, vec![0.0, 0.5]);
        assert_eq!(meta.values_of_consts, vec![0.9, 1.0]);
        // var_const: [kp, taps, kq, _default_]
        assert_eq!(meta.var_const_to_factor, vec![0, 2, 1, 3]);
        assert_eq!(meta.var_const_to_kp, vec![0, 0]);
        assert_eq!(meta.var_const_to_kq, vec![3, 2]);
        assert_eq!(meta.var_const_to_ftaps, vec![1]);
        assert_eq!(sf.termfactors[0].index_of_terminal, 1);
        Ok(())
    }

    #[test]
    fn test_values_from_result() -> Result<()> {
        let model = make_model(&store(), &ModelOptions::default())?;
        let sf = resolve_step(&model.factordefs, 0, None)?;

        let values = sf.values_from_result(&[1.1, 3.0, 0.9, 1.0])?;
        assert_eq!(values.step, 0);
        assert_eq!(values.value("kp"), Some(1.1));
        assert_eq!(values.value("taps"), Some(3.0));
        assert_eq!(values.value("kq"), Some(0.9));

        let next = resolve_step(&model.factordefs, 1, Some(&values))?;
        assert_eq!(next.get("taps").map(|f| f.initial), Some(3.0));
        assert_eq!(next.meta.values_of_vars, vec![1.1, 3.0]);

        assert_eq!(
            sf.values_from_result(&[1.0]).err(),
            Some(ModelError::ResultLength {
                expected: 4,
                actual: 1
            })
        );
        Ok(())
    }

    #[test]
    fn test_chained_steps_keep_layout() -> Result<()> {
        let model = make_model(&store(), &ModelOptions::default())?;
        let steps = resolve_steps(&model.factordefs, 3)?;
        assert_eq!(steps.len(), 3);
        for sf in &steps[1..] {
            assert_eq!(sf.meta, steps[0].meta);
        }
        Ok(())
    }
}
