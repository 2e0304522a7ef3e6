use crate::factors::StepFactors;
use crate::subgraph::ScalingIsland;
use num_complex::Complex64;
use pretty_dtoa::{dtoa, FmtFloatConfig};
use std::f64::consts::PI;

const FLOAT_CONFIG: FmtFloatConfig = FmtFloatConfig::default()
    .add_point_zero(false)
    .max_significant_digits(9);

pub fn format_f64(f: f64) -> String {
    dtoa(f, FLOAT_CONFIG)
}

pub fn format_f64_vec(v: &[f64]) -> String {
    let a: Vec<String> = v.iter().map(|f| format_f64(*f)).collect();
    format!("[{}]", a.join(", "))
}

/// Rectangular form `a+bj`, the notation of complex literals in tables.
pub fn format_complex(z: &Complex64) -> String {
    format!(
        "{}{}{}j",
        format_f64(z.re),
        if z.im.is_sign_negative() { "-" } else { "+" },
        format_f64(z.im.abs())
    )
}

pub fn format_rect_vec(v: &[Complex64]) -> String {
    let a: Vec<String> = v.iter().map(format_complex).collect();
    format!("[{}]", a.join(", "))
}

fn format_polar(z: &Complex64) -> String {
    format!(
        "{}\u{2220}{}\u{00B0}",
        format_f64(z.norm()),
        format_f64(z.arg() * 180.0 / PI)
    )
}

pub fn format_polar_vec(v: &[Complex64]) -> String {
    let a: Vec<String> = v.iter().map(format_polar).collect();
    format!("[{}]", a.join(", "))
}

/// One line per factor of the step in symbol order.
pub fn format_step_factors(sf: &StepFactors) -> String {
    let mut s = String::new();
    for f in &sf.factors {
        s.push_str(&format!(
            "{:>4} {:<16} {:<5} initial={} min={} max={} source={}{}\n",
            f.index_of_symbol,
            f.id,
            f.kind,
            format_f64(f.initial),
            format_f64(f.min),
            format_f64(f.max),
            f.id_of_source,
            if f.is_discrete { " discrete" } else { "" }
        ));
    }
    s
}

pub fn format_island(island: &ScalingIsland) -> String {
    let sg = &island.subgraph;
    let mut s = format!(
        "{} subgraph {}: nodes {:?}, batches {:?}, slack={}, k_ini={}, needs_scaling={}",
        island.part,
        sg.index_of_subgraph,
        sg.nodes,
        sg.batches
            .iter()
            .map(|b| b.id_of_batch.as_str())
            .collect::<Vec<&str>>(),
        sg.has_slack,
        format_f64(island.k_ini),
        island.needs_scaling
    );
    for p in &island.parts {
        s.push_str(&format!(
            "\n    {:<16} {}={} factor={} ({}){}",
            p.id_of_injection,
            p.part,
            format_f64(p.value),
            p.id_of_factor,
            p.kind,
            if p.is_scalable { " scalable" } else { "" }
        ));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmplx;

    #[test]
    fn test_format_vectors() {
        assert_eq!(format_f64_vec(&[1.0, 0.25, -3.0]), "[1, 0.25, -3]");
        assert_eq!(
            format_rect_vec(&[cmplx!(1.0, -2.0), cmplx!(0.5, 0.0)]),
            "[1-2j, 0.5+0j]"
        );
        assert_eq!(format_polar_vec(&[cmplx!(0.0, 2.0)]), "[2\u{2220}90\u{00B0}]");
    }
}
