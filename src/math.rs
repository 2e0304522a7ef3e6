// Copyright (c) 2022-2024, Richard Lincoln. All rights reserved.

use num_complex::Complex64;

/// Admittance of a branch without given impedance, an ideal short.
pub const INF_ADMITTANCE: Complex64 = Complex64 {
    re: f64::INFINITY,
    im: f64::INFINITY,
};

#[macro_export]
macro_rules! cmplx {
    () => {
        num_complex::Complex64::new(0.0, 0.0)
    };
    ($arg1:expr) => {
        num_complex::Complex64::new($arg1, 0.0)
    };
    ($arg1:expr, $arg2:expr) => {
        num_complex::Complex64::new($arg1, $arg2)
    };
}

/// Arithmetic mean of complex values, `None` for an empty input.
pub fn mean(values: &[Complex64]) -> Option<Complex64> {
    if values.is_empty() {
        return None;
    }
    let sum: Complex64 = values.iter().sum();
    Some(sum / Complex64::new(values.len() as f64, 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[cmplx!(1.0, 1.0)]), Some(cmplx!(1.0, 1.0)));
        assert_eq!(
            mean(&[cmplx!(1.0, 0.0), cmplx!(0.5, 0.5)]),
            Some(cmplx!(0.75, 0.25))
        );
    }

    #[test]
    fn test_inf_admittance_norm() {
        assert!(INF_ADMITTANCE.norm() > 1e300);
    }
}
