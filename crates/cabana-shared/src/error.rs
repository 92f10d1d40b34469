use thiserror::Error;

/// Validation failures for client-supplied input.
///
/// The messages are user-facing; the request/response path surfaces them
/// verbatim as inline errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{label} must be at least {min} characters")]
    TooShort {
        label: &'static str,
        min: usize,
    },

    #[error("{label} must be at most {max} characters")]
    TooLong {
        label: &'static str,
        max: usize,
    },
}
