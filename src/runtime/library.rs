use std::collections::HashMap;

use crate::lang::value::Value;
use crate::runtime::host::{Function, Library};

/// Registry of host functions, keyed by name.
#[derive(Debug, Default)]
pub struct FunctionLibrary {
    functions: HashMap<String, Function>,
}

impl FunctionLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library preloaded with the operators dialogue compilers emit as
    /// `CallFunc` instructions.
    pub fn standard() -> Self {
        let mut library = Self::new();
        library.import_operators();
        library
    }

    /// Register (or replace) a function.
    pub fn register(&mut self, function: Function) {
        self.functions.insert(function.name.clone(), function);
    }

    /// Register a function that pushes its result.
    pub fn register_function(
        &mut self,
        name: &str,
        arity: usize,
        body: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) {
        self.register(Function::new(name, arity, true, body));
    }

    /// Register a function called only for its side effects.
    pub fn register_procedure(
        &mut self,
        name: &str,
        arity: usize,
        body: impl Fn(&[Value]) -> Result<(), String> + 'static,
    ) {
        self.register(Function::new(name, arity, false, move |args| {
            body(args).map(|()| Value::Null)
        }));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn import_operators(&mut self) {
        self.register_function("Add", 2, |args| match (&args[0], &args[1]) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::String(format!("{}{}", args[0], args[1])))
            }
            (a, b) => Err(format!("cannot add {} and {}", a.type_name(), b.type_name())),
        });
        self.register_function("Minus", 2, |args| arithmetic(args, |a, b| a - b));
        self.register_function("Multiply", 2, |args| arithmetic(args, |a, b| a * b));
        self.register_function("Divide", 2, |args| arithmetic(args, |a, b| a / b));
        self.register_function("Modulo", 2, |args| arithmetic(args, |a, b| a % b));
        self.register_function("UnaryMinus", 1, |args| Ok(Value::Number(-number(&args[0])?)));

        self.register_function("EqualTo", 2, |args| Ok(Value::Bool(args[0] == args[1])));
        self.register_function("NotEqualTo", 2, |args| Ok(Value::Bool(args[0] != args[1])));
        self.register_function("GreaterThan", 2, |args| comparison(args, |a, b| a > b));
        self.register_function("GreaterThanOrEqualTo", 2, |args| comparison(args, |a, b| a >= b));
        self.register_function("LessThan", 2, |args| comparison(args, |a, b| a < b));
        self.register_function("LessThanOrEqualTo", 2, |args| comparison(args, |a, b| a <= b));

        self.register_function("And", 2, |args| logic(args, |a, b| a && b));
        self.register_function("Or", 2, |args| logic(args, |a, b| a || b));
        self.register_function("Xor", 2, |args| logic(args, |a, b| a ^ b));
        self.register_function("Not", 1, |args| Ok(Value::Bool(!boolean(&args[0])?)));
    }
}

impl Library for FunctionLibrary {
    fn lookup(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }
}

fn number(value: &Value) -> Result<f64, String> {
    value.as_number().map_err(|e| e.to_string())
}

fn boolean(value: &Value) -> Result<bool, String> {
    value.as_bool().map_err(|e| e.to_string())
}

fn arithmetic(args: &[Value], op: impl Fn(f64, f64) -> f64) -> Result<Value, String> {
    Ok(Value::Number(op(number(&args[0])?, number(&args[1])?)))
}

fn comparison(args: &[Value], op: impl Fn(f64, f64) -> bool) -> Result<Value, String> {
    Ok(Value::Bool(op(number(&args[0])?, number(&args[1])?)))
}

fn logic(args: &[Value], op: impl Fn(bool, bool) -> bool) -> Result<Value, String> {
    Ok(Value::Bool(op(boolean(&args[0])?, boolean(&args[1])?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(library: &FunctionLibrary, name: &str, args: &[Value]) -> Result<Value, String> {
        let function = library.lookup(name).expect("function should be registered");
        assert_eq!(function.arity, args.len());
        function.invoke(args)
    }

    #[test]
    fn test_standard_operators_registered() {
        let library = FunctionLibrary::standard();
        for name in [
            "Add",
            "Minus",
            "Multiply",
            "Divide",
            "Modulo",
            "UnaryMinus",
            "EqualTo",
            "NotEqualTo",
            "GreaterThan",
            "GreaterThanOrEqualTo",
            "LessThan",
            "LessThanOrEqualTo",
            "And",
            "Or",
            "Xor",
            "Not",
        ] {
            assert!(library.contains(name), "missing {}", name);
        }
        assert_eq!(library.len(), 16);
    }

    #[test]
    fn test_arithmetic() {
        let library = FunctionLibrary::standard();
        let n = Value::Number;
        assert_eq!(call(&library, "Add", &[n(2.0), n(3.0)]), Ok(n(5.0)));
        assert_eq!(call(&library, "Minus", &[n(2.0), n(3.0)]), Ok(n(-1.0)));
        assert_eq!(call(&library, "Multiply", &[n(2.0), n(3.0)]), Ok(n(6.0)));
        assert_eq!(call(&library, "Divide", &[n(3.0), n(2.0)]), Ok(n(1.5)));
        assert_eq!(call(&library, "Modulo", &[n(7.0), n(4.0)]), Ok(n(3.0)));
        assert_eq!(call(&library, "UnaryMinus", &[n(4.0)]), Ok(n(-4.0)));
    }

    #[test]
    fn test_add_concatenates_strings() {
        let library = FunctionLibrary::standard();
        assert_eq!(
            call(&library, "Add", &[Value::from("gold: "), Value::Number(3.0)]),
            Ok(Value::from("gold: 3"))
        );
        assert!(call(&library, "Add", &[Value::Bool(true), Value::Null]).is_err());
    }

    #[test]
    fn test_comparisons_and_logic() {
        let library = FunctionLibrary::standard();
        let n = Value::Number;
        let b = Value::Bool;
        assert_eq!(call(&library, "GreaterThan", &[n(3.0), n(2.0)]), Ok(b(true)));
        assert_eq!(call(&library, "LessThanOrEqualTo", &[n(3.0), n(2.0)]), Ok(b(false)));
        assert_eq!(call(&library, "EqualTo", &[Value::from("a"), Value::from("a")]), Ok(b(true)));
        assert_eq!(call(&library, "NotEqualTo", &[n(1.0), Value::Null]), Ok(b(true)));
        assert_eq!(call(&library, "Xor", &[b(true), b(true)]), Ok(b(false)));
        assert_eq!(call(&library, "Not", &[b(false)]), Ok(b(true)));
        assert!(call(&library, "And", &[b(true), n(1.0)]).is_err());
    }

    #[test]
    fn test_register_procedure_returns_nothing() {
        let mut library = FunctionLibrary::new();
        library.register_procedure("log", 1, |_| Ok(()));
        let function = library.lookup("log").unwrap();
        assert!(!function.returns_value);
        assert_eq!(function.invoke(&[Value::Null]), Ok(Value::Null));
    }
}
