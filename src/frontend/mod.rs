//! Helpers shared with dialogue front ends.
//!
//! Compiling dialogue source is not this crate's job, but indentation
//! measurement has to agree between every tool that reads source, so the
//! rule lives here.

pub mod indent;
