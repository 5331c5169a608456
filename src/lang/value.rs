use crate::runtime::runtime_error::RuntimeError;

/// Runtime value on the dialogue evaluation stack.
///
/// Coercions are explicit and strict: asking a value for a kind it does not
/// hold is a [`RuntimeError::TypeMismatch`], never an implicit conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Floating-point number. All numeric variables are stored as numbers.
    Number(f64),

    /// UTF-8 string value.
    String(String),

    /// Boolean value.
    Bool(bool),

    /// The absence of a value.
    Null,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::Null => "null",
        }
    }

    pub fn as_number(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(RuntimeError::type_mismatch("number", other)),
        }
    }

    pub fn as_string(&self) -> Result<&str, RuntimeError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(RuntimeError::type_mismatch("string", other)),
        }
    }

    /// Boolean test used by `JumpIfFalse`. Only `Bool` values qualify.
    pub fn as_bool(&self) -> Result<bool, RuntimeError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(RuntimeError::type_mismatch("bool", other)),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_number() {
        assert_eq!(Value::Number(2.5).as_number().unwrap(), 2.5);
        assert!(Value::Bool(true).as_number().is_err());
    }

    #[test]
    fn test_as_string() {
        assert_eq!(Value::from("Start").as_string().unwrap(), "Start");
        assert!(Value::Null.as_string().is_err());
    }

    #[test]
    fn test_as_bool_rejects_other_kinds() {
        assert!(Value::Bool(false).as_bool().is_ok());
        let err = Value::Number(0.0).as_bool().unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::TypeMismatch {
                expected: "bool",
                found: "number"
            }
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(1.5).to_string(), "1.5");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Bool(true).to_string(), "true");
    }
}
