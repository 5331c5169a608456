//! Boundaries between the virtual machine and the embedding application.
//!
//! The VM never owns presentation, persistence or function implementations.
//! It talks to the host through the traits in this module:
//!
//! - [`DialogueHandler`] receives lines, commands, option lists and
//!   node-complete events, synchronously, while an instruction executes.
//! - [`VariableStorage`] reads and writes numeric variables.
//! - [`Library`] resolves function names to callables.
//!
//! Storage and library are session-scoped: they outlive a single run and may
//! be shared by several machines through `Rc`.

use crate::lang::value::Value;

/// Single-use handle passed to [`DialogueHandler::show_options`].
///
/// The host resumes execution by handing it back to
/// [`VirtualMachine::select_option`](crate::runtime::vm::VirtualMachine::select_option).
/// It is neither `Clone` nor `Copy`, so it can be spent at most once, and the
/// VM checks that it belongs to the suspension currently in progress.
#[derive(Debug, PartialEq, Eq)]
pub struct OptionSelection {
    pub(crate) ticket: u64,
    pub(crate) option_count: usize,
}

impl OptionSelection {
    pub fn option_count(&self) -> usize {
        self.option_count
    }
}

/// Callback sink for everything the dialogue shows to the player.
pub trait DialogueHandler {
    fn run_line(&mut self, text: &str);

    fn run_command(&mut self, text: &str);

    /// Present `options` in order. Execution stays suspended until the host
    /// passes `selection` back with the chosen index.
    fn show_options(&mut self, options: &[String], selection: OptionSelection);

    /// A node finished, either by running out of instructions or through a
    /// `Stop` instruction. `next_node` is always `None` in this version.
    fn node_complete(&mut self, next_node: Option<&str>);
}

/// Numeric variable store consulted by `PushVariable` and `StoreVariable`.
///
/// Implementations decide what reading an unset variable yields. Methods take
/// `&self` so one store can back several machines; implementations provide
/// their own interior mutability.
pub trait VariableStorage {
    fn get_number(&self, name: &str) -> f64;

    fn set_number(&self, name: &str, value: f64);
}

/// Host function body. Receives exactly `arity` arguments in call order.
pub type FunctionBody = dyn Fn(&[Value]) -> Result<Value, String>;

/// A callable the dialogue can reach through `CallFunc`.
pub struct Function {
    pub name: String,
    pub arity: usize,
    pub returns_value: bool,
    body: Box<FunctionBody>,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        arity: usize,
        returns_value: bool,
        body: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            returns_value,
            body: Box::new(body),
        }
    }

    pub fn invoke(&self, args: &[Value]) -> Result<Value, String> {
        (self.body)(args)
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("returns_value", &self.returns_value)
            .finish_non_exhaustive()
    }
}

/// Name-to-function lookup.
pub trait Library {
    fn lookup(&self, name: &str) -> Option<&Function>;
}
