pub mod host;
pub mod library;
pub mod runtime_error;
pub mod state;
pub mod storage;
pub mod vm;

pub use host::{DialogueHandler, Function, Library, OptionSelection, VariableStorage};
pub use runtime_error::RuntimeError;
pub use state::{ExecutionState, ExecutionStatus, PendingOption};
pub use vm::{RejectedSelection, VirtualMachine, VmConfig};
