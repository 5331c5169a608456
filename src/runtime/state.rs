use crate::lang::value::Value;
use crate::runtime::runtime_error::{Result, RuntimeError};

/// Execution status of a [`VirtualMachine`](crate::runtime::vm::VirtualMachine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStatus {
    #[default]
    Stopped,
    Running,
    WaitingOnOptionSelection,
}

/// An option queued by `AddOption`, waiting for `ShowOptions`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOption {
    /// String table index of the option text; `None` for an unlabeled option.
    pub text: Option<usize>,
    pub destination: String,
}

/// Mutable per-run context owned by one virtual machine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionState {
    pub current_node: Option<String>,
    pub program_counter: usize,
    pub stack: Vec<Value>,
    pub pending_options: Vec<PendingOption>,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the state at a freshly selected node.
    pub fn enter_node(&mut self, name: &str) {
        self.current_node = Some(name.to_string());
        self.program_counter = 0;
        self.stack.clear();
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or(RuntimeError::underflow(1, 0))
    }

    pub fn peek(&self) -> Result<&Value> {
        self.stack.last().ok_or(RuntimeError::underflow(1, 0))
    }

    /// Pop `count` values, returned in the order they were pushed.
    pub fn pop_n(&mut self, count: usize) -> Result<Vec<Value>> {
        let available = self.stack.len();
        if available < count {
            return Err(RuntimeError::underflow(count, available));
        }
        Ok(self.stack.split_off(available - count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_empty_is_underflow() {
        let mut state = ExecutionState::new();
        assert_eq!(state.pop(), Err(RuntimeError::underflow(1, 0)));
        assert!(state.peek().is_err());
    }

    #[test]
    fn test_peek_leaves_value() {
        let mut state = ExecutionState::new();
        state.push(Value::Bool(true));
        assert_eq!(state.peek().unwrap(), &Value::Bool(true));
        assert_eq!(state.stack.len(), 1);
    }

    #[test]
    fn test_pop_n_keeps_call_order() {
        let mut state = ExecutionState::new();
        state.push(Value::Number(1.0));
        state.push(Value::Number(2.0));
        state.push(Value::Number(3.0));
        let args = state.pop_n(2).unwrap();
        assert_eq!(args, vec![Value::Number(2.0), Value::Number(3.0)]);
        assert_eq!(state.stack, vec![Value::Number(1.0)]);
    }

    #[test]
    fn test_pop_n_underflow_leaves_stack_untouched() {
        let mut state = ExecutionState::new();
        state.push(Value::Null);
        assert_eq!(state.pop_n(3), Err(RuntimeError::underflow(3, 1)));
        assert_eq!(state.stack.len(), 1);
    }

    #[test]
    fn test_enter_node_resets_counter_and_stack() {
        let mut state = ExecutionState::new();
        state.program_counter = 7;
        state.push(Value::Null);
        state.enter_node("Start");
        assert_eq!(state.current_node.as_deref(), Some("Start"));
        assert_eq!(state.program_counter, 0);
        assert!(state.stack.is_empty());
    }
}
