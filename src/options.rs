use crate::error::ModelError;
use derive_builder::Builder;

/// Identifier of synthesized default factors.
pub const DEFAULT_FACTOR_ID: &str = "_default_";

/// Longitudinal admittances with a magnitude above this value are treated
/// as ideal shorts.
pub const DEFAULT_BRIDGE_THRESHOLD: f64 = 1e6;

/// Smallest magnitude of P10/Q10 of an injection part considered for
/// subgraph scaling.
pub const DEFAULT_PQ_LIMIT: f64 = 0.01;

/// Options for building a model and resolving its factors.
///
/// ```
/// use egrid::ModelOptionsBuilder;
///
/// let options = ModelOptionsBuilder::default()
///     .bridge_threshold(1e4)
///     .build()
///     .unwrap();
/// assert_eq!(options.default_factor_id, egrid::DEFAULT_FACTOR_ID);
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(
    default,
    build_fn(validate = "Self::validate", error = "ModelError"),
    setter(into)
)]
pub struct ModelOptions {
    /// A branch is a bridge if |y_lo| is strictly greater.
    pub bridge_threshold: f64,

    /// Id given to default factors (const, value = min = max = 1.0).
    pub default_factor_id: String,

    /// Minimum |P10| or |Q10| for a significant injection part.
    pub pq_limit: f64,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            bridge_threshold: DEFAULT_BRIDGE_THRESHOLD,
            default_factor_id: DEFAULT_FACTOR_ID.to_string(),
            pq_limit: DEFAULT_PQ_LIMIT,
        }
    }
}

impl ModelOptionsBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(threshold) = self.bridge_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(format!(
                    "bridge_threshold must be finite and not negative, is {}",
                    threshold
                ));
            }
        }
        if let Some(id) = &self.default_factor_id {
            if id.is_empty() {
                return Err("default_factor_id must not be empty".to_string());
            }
        }
        if let Some(limit) = self.pq_limit {
            if limit.is_nan() || limit < 0.0 {
                return Err(format!("pq_limit must not be negative, is {}", limit));
            }
        }
        Ok(())
    }
}

impl From<derive_builder::UninitializedFieldError> for ModelError {
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        ModelError::Options(err.to_string())
    }
}

impl From<String> for ModelError {
    fn from(msg: String) -> Self {
        ModelError::Options(msg)
    }
}
