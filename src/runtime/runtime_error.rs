use thiserror::Error;

use crate::lang::value::Value;

/// Result type used throughout the runtime.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Everything that can go wrong while selecting nodes or executing
/// instructions.
///
/// Errors fall in two groups, see [`RuntimeError::is_fatal`]. Fatal errors
/// mean the compiled program is broken or incompatible and always leave the
/// VM `Stopped`. Recoverable errors are content or host mistakes; the VM stays
/// in a well-defined state the host can continue from.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("no node named '{0}'")]
    UnknownNode(String),

    #[error("no label '{label}' in node '{node}'")]
    UnknownLabel { node: String, label: String },

    #[error("no function named '{0}'")]
    UnknownFunction(String),

    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("stack underflow: needed {needed} value(s), found {available}")]
    StackUnderflow { needed: usize, available: usize },

    #[error("string table has no entry {0}")]
    StringLookup(usize),

    #[error("function '{name}' failed: {message}")]
    FunctionFailed { name: String, message: String },

    #[error("{0}")]
    LimitExceeded(String),

    #[error("no node selected")]
    NoNodeSelected,

    #[error("host usage error: {0}")]
    HostUsage(String),
}

impl RuntimeError {
    pub fn type_mismatch(expected: &'static str, found: &Value) -> Self {
        RuntimeError::TypeMismatch {
            expected,
            found: found.type_name(),
        }
    }

    pub fn underflow(needed: usize, available: usize) -> Self {
        RuntimeError::StackUnderflow { needed, available }
    }

    pub fn host_usage(message: impl Into<String>) -> Self {
        RuntimeError::HostUsage(message.into())
    }

    /// Fatal errors halt the VM. `UnknownNode`, `NoNodeSelected` and
    /// `HostUsage` are reported but leave the VM continuable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            RuntimeError::UnknownNode(_) | RuntimeError::NoNodeSelected | RuntimeError::HostUsage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = RuntimeError::UnknownLabel {
            node: "Start".to_string(),
            label: "L1".to_string(),
        };
        assert_eq!(err.to_string(), "no label 'L1' in node 'Start'");
        assert_eq!(
            RuntimeError::underflow(2, 1).to_string(),
            "stack underflow: needed 2 value(s), found 1"
        );
        assert_eq!(
            RuntimeError::type_mismatch("number", &Value::Bool(true)).to_string(),
            "type mismatch: expected number, got bool"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(!RuntimeError::UnknownNode("Gone".to_string()).is_fatal());
        assert!(!RuntimeError::host_usage("still waiting").is_fatal());
        assert!(!RuntimeError::NoNodeSelected.is_fatal());
        assert!(RuntimeError::UnknownFunction("Add".to_string()).is_fatal());
        assert!(RuntimeError::underflow(1, 0).is_fatal());
        assert!(RuntimeError::StringLookup(9).is_fatal());
    }

    #[test]
    fn test_error_implements_std_error() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&RuntimeError::StringLookup(4));
    }
}
