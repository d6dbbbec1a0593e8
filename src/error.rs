use thiserror::Error;

use crate::graph::GraphError;

/// Errors reported synchronously by the control surface.
///
/// Every check runs before any mutation, so a rejected call leaves the engine
/// exactly as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SynthError {
    /// A value outside a documented numeric domain
    #[error("{name} must be between {min} and {max}, got {value}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// An index or code outside structural bounds
    #[error("{what} {value} out of range ({min}-{max})")]
    OutOfRange {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A name that does not match any known variant
    #[error("unknown {what}: {name:?}")]
    UnknownName { what: &'static str, name: String },

    #[error("failed to start release scheduler: {0}")]
    Scheduler(String),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type Result<T> = std::result::Result<T, SynthError>;

/// Reject `value` unless it lies in `[min, max]`. NaN is always rejected.
pub(crate) fn check_parameter(name: &'static str, value: f64, (min, max): (f64, f64)) -> Result<f64> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(SynthError::InvalidParameter { name, value, min, max })
    }
}

/// Structural bound check, reported as [`SynthError::OutOfRange`].
pub(crate) fn check_range(what: &'static str, value: f64, (min, max): (f64, f64)) -> Result<f64> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(SynthError::OutOfRange { what, value, min, max })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_parameter_bounds_inclusive() {
        assert_eq!(check_parameter("attack", 0.0, (0.0, 10.0)), Ok(0.0));
        assert_eq!(check_parameter("attack", 10.0, (0.0, 10.0)), Ok(10.0));
        assert!(matches!(
            check_parameter("attack", 10.5, (0.0, 10.0)),
            Err(SynthError::InvalidParameter { name: "attack", .. })
        ));
    }

    #[test]
    fn test_nan_is_rejected() {
        assert!(check_parameter("decay", f64::NAN, (0.0, 10.0)).is_err());
        assert!(check_range("note", f64::NAN, (0.0, 127.0)).is_err());
    }

    #[test]
    fn test_error_messages() {
        let err = check_range("voice index", 9.0, (0.0, 7.0)).unwrap_err();
        assert_eq!(err.to_string(), "voice index 9 out of range (0-7)");
    }
}
