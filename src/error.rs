use thiserror::Error;

/// Errors raised while building a model or resolving factors.
///
/// Only identity violations and misuse of the step chain are errors.
/// Dangling references and malformed rows are excluded from the result
/// instead, see [`crate::Message`].
#[derive(Error, Debug, PartialEq)]
pub enum ModelError {
    /// Two or more branches share an identifier.
    #[error("IDs of branches must be unique but are not: {0}")]
    DuplicateBranchId(String),

    /// Two or more injections share an identifier.
    #[error("IDs of injections must be unique but are not: {0}")]
    DuplicateInjectionId(String),

    /// Step `s > 0` was requested without values of step `s - 1`.
    #[error("resolving step {0} requires the resolved factors of the previous step")]
    MissingPreviousStep(i32),

    /// The values handed over as previous step belong to another step.
    #[error("step {step} expects values of step {expected}, got values of step {given}")]
    StepMismatch { step: i32, expected: i32, given: i32 },

    /// Steps are counted from 0, generic data have step -1.
    #[error("invalid optimization step: {0}")]
    InvalidStep(i32),

    /// A solver result does not match the var/const layout, or a vector
    /// of injection values does not match the injections.
    #[error("result vector must have {expected} elements, got {actual}")]
    ResultLength { expected: usize, actual: usize },

    #[error("invalid options: {0}")]
    Options(String),

    /// A literal could not be decoded.
    #[error("cannot parse '{literal}' as {kind}")]
    Literal { literal: String, kind: &'static str },

    #[error("invalid record data: {0}")]
    Data(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::DuplicateBranchId("line_0".into());
        assert!(err.to_string().contains("branches"));
        assert!(err.to_string().contains("line_0"));

        let err = ModelError::MissingPreviousStep(3);
        assert!(err.to_string().contains("step 3"));

        let err = ModelError::StepMismatch {
            step: 2,
            expected: 1,
            given: 0,
        };
        assert_eq!(
            err.to_string(),
            "step 2 expects values of step 1, got values of step 0"
        );
    }
}
