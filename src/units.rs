//! Decoding of numeric literals with engineering-notation suffixes.
//!
//! | suffix      | factor |
//! |-------------|--------|
//! | `n`         | 1e-9   |
//! | `u`, `µ`    | 1e-6   |
//! | `m`         | 1e-3   |
//! | `k`         | 1e3    |
//! | `M`         | 1e6    |
//! | `G`         | 1e9    |
//!
//! Complex literals are written `a+bj` or `a-bj`, a pure imaginary value
//! as `bj`. Both parts may carry a suffix, e.g. `1k-2.5kj`.

use crate::error::{ModelError, Result};
use num_complex::Complex64;

fn suffix_exponent(c: char) -> Option<i32> {
    match c {
        'n' => Some(-9),
        'u' | 'µ' => Some(-6),
        'm' => Some(-3),
        'k' => Some(3),
        'M' => Some(6),
        'G' => Some(9),
        _ => None,
    }
}

fn number_error(literal: &str) -> ModelError {
    ModelError::Literal {
        literal: literal.to_string(),
        kind: "number",
    }
}

/// Parses a float which may end with an engineering-notation suffix.
///
/// The suffix is decoded as decimal exponent, `"7n"` is read as `"7e-9"`.
/// A mantissa with an exponent of its own does not take a suffix.
pub fn parse_number(literal: &str) -> Result<f64> {
    let text = literal.trim();
    let suffix = text
        .chars()
        .last()
        .and_then(|c| suffix_exponent(c).map(|exp| (c, exp)));
    let Some((c, exp)) = suffix else {
        return text.parse::<f64>().map_err(|_| number_error(literal));
    };
    let mantissa = &text[..text.len() - c.len_utf8()];
    if mantissa.is_empty() || mantissa.contains(|c| c == 'e' || c == 'E') {
        return Err(number_error(literal));
    }
    format!("{}e{}", mantissa, exp)
        .parse::<f64>()
        .map_err(|_| number_error(literal))
}

/// Parses a complex value, see module documentation for the syntax.
pub fn parse_complex(literal: &str) -> Result<Complex64> {
    let complex_error = || ModelError::Literal {
        literal: literal.to_string(),
        kind: "complex number",
    };
    let text: String = literal.chars().filter(|c| !c.is_whitespace()).collect();
    let text = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(text.as_str());
    if text.is_empty() {
        return Err(complex_error());
    }
    let Some(imag) = text.strip_suffix('j') else {
        return parse_number(text)
            .map(|re| Complex64::new(re, 0.0))
            .map_err(|_| complex_error());
    };
    // split at the sign which starts the imaginary part, signs of exponents
    // follow an 'e' or 'E'
    let bytes = imag.as_bytes();
    let split = (1..bytes.len()).rev().find(|&i| {
        (bytes[i] == b'+' || bytes[i] == b'-') && !matches!(bytes[i - 1], b'e' | b'E')
    });
    let (re, im) = match split {
        Some(i) => (&imag[..i], &imag[i..]),
        None => ("", imag),
    };
    let im = match im {
        "" | "+" => 1.0,
        "-" => -1.0,
        im => parse_number(im).map_err(|_| complex_error())?,
    };
    let re = if re.is_empty() {
        0.0
    } else {
        parse_number(re).map_err(|_| complex_error())?
    };
    Ok(Complex64::new(re, im))
}
