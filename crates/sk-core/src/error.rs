//! Error types for StochKit

use thiserror::Error;

/// StochKit error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Distribution parameter outside of its valid domain (raised at construction)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Operand dimension does not match the distribution dimension
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Dimension required by the callee
        expected: usize,
        /// Dimension actually supplied
        got: usize,
    },

    /// Iterative solver exceeded its iteration budget
    #[error("Convergence error: {0}")]
    Convergence(String),

    /// Estimation input is empty or too small to estimate anything
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// Validation error (argument outside its accepted range)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

impl Error {
    /// Shorthand for [`Error::DimensionMismatch`].
    pub fn dimension(expected: usize, got: usize) -> Self {
        Error::DimensionMismatch { expected, got }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Fail with [`Error::DimensionMismatch`] unless `got == expected`.
#[inline]
pub fn check_dimension(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(Error::dimension(expected, got));
    }
    Ok(())
}

/// Fail with [`Error::Validation`] unless `p` is a probability in `[0, 1]`.
#[inline]
pub fn check_probability(p: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(Error::Validation(format!("probability must be in [0, 1], got {p}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_message() {
        let e = Error::dimension(3, 2);
        assert_eq!(e.to_string(), "Dimension mismatch: expected 3, got 2");
    }

    #[test]
    fn test_checks() {
        assert!(check_dimension(2, 2).is_ok());
        assert!(matches!(check_dimension(2, 1), Err(Error::DimensionMismatch { expected: 2, got: 1 })));
        assert!(check_probability(0.0).is_ok());
        assert!(check_probability(1.0).is_ok());
        assert!(check_probability(1.5).is_err());
        assert!(check_probability(f64::NAN).is_err());
    }
}
