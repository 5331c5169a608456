//! # Dialogue values
//!
//! Values are the only data that can live on the dialogue evaluation stack.
//! They are produced by literal pushes, variable reads and function calls.

pub mod value;
