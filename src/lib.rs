//! # loom
//!
//! Embeddable runtime for compiled branching dialogue.
//!
//! A compiled [`Program`](bytecode::Program) holds named nodes of
//! instructions and a string table. A [`VirtualMachine`](runtime::VirtualMachine)
//! executes one instruction per [`step`](runtime::VirtualMachine::step),
//! reporting lines, commands and option prompts to a
//! [`DialogueHandler`](runtime::DialogueHandler), and suspends on option
//! prompts until the host hands back its choice.

pub mod bytecode;
pub mod frontend;
pub mod lang;
pub mod runtime;
