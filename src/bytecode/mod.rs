pub mod asm;
pub mod disasm;
pub mod format;
pub mod ir;
pub mod op;
pub mod stack_check;

pub use ir::{Node, Program};
pub use op::Op;
