use std::cell::RefCell;
use std::collections::HashMap;

use crate::runtime::host::VariableStorage;

/// In-memory variable store.
///
/// Unset variables read as `default` (0 unless configured otherwise).
#[derive(Debug, Default)]
pub struct MemoryVariableStorage {
    values: RefCell<HashMap<String, f64>>,
    default: f64,
}

impl MemoryVariableStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(default: f64) -> Self {
        Self {
            values: RefCell::new(HashMap::new()),
            default,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.borrow().contains_key(name)
    }

    pub fn clear(&self) {
        self.values.borrow_mut().clear();
    }
}

impl VariableStorage for MemoryVariableStorage {
    fn get_number(&self, name: &str) -> f64 {
        self.values
            .borrow()
            .get(name)
            .copied()
            .unwrap_or(self.default)
    }

    fn set_number(&self, name: &str, value: f64) {
        self.values.borrow_mut().insert(name.to_string(), value);
    }
}
