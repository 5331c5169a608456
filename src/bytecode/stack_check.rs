use thiserror::Error;

use crate::bytecode::{Node, Op, Program};
use crate::runtime::host::Library;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("stack-check error in '{node}' at ip={ip}: {message}")]
pub struct StackCheckError {
    pub node: String,
    pub ip: usize,
    pub message: String,
}

impl StackCheckError {
    fn new(node: &Node, ip: usize, message: impl Into<String>) -> Self {
        Self {
            node: node.name.clone(),
            ip,
            message: message.into(),
        }
    }
}

/// Returns (pops, pushes) for an op, or None if the effect depends on a
/// function the checker cannot see.
///
/// Peeking ops count as popping and pushing back the same value.
pub(crate) fn effect(op: &Op, library: Option<&dyn Library>) -> Option<(usize, usize)> {
    Some(match op {
        Op::Label(_) | Op::JumpTo(_) => (0, 0),
        Op::Jump | Op::JumpIfFalse(_) => (1, 1),

        Op::RunLine(_) | Op::RunCommand(_) | Op::AddOption { .. } => (0, 0),
        // Resumes with the chosen destination on the stack.
        Op::ShowOptions => (0, 1),

        Op::PushString(_) | Op::PushNumber(_) | Op::PushBool(_) | Op::PushNull => (0, 1),
        Op::Pop => (1, 0),

        Op::CallFunc(name) => {
            let function = library?.lookup(name)?;
            (function.arity, usize::from(function.returns_value))
        }
        Op::PushVariable(_) => (0, 1),
        Op::StoreVariable(_) => (1, 1),

        Op::Stop => (0, 0),
        Op::RunNode => (1, 1),
    })
}

/// Instructions control can reach after `ip`. Static jump targets must
/// already be resolved.
fn successors(node: &Node, ip: usize, op: &Op) -> Vec<usize> {
    let next = ip + 1;
    let fall_through = if next < node.ops.len() { vec![next] } else { vec![] };

    match op {
        Op::JumpTo(label) => node.label_index(label).into_iter().collect(),
        Op::JumpIfFalse(label) => {
            let mut targets = fall_through;
            targets.extend(node.label_index(label));
            targets
        }
        // Dynamic target: the checker cannot follow it.
        Op::Jump => vec![],
        Op::Stop | Op::RunNode => vec![],
        _ => fall_through,
    }
}

/// Check every node of a program.
pub fn check_program(program: &Program, library: Option<&dyn Library>) -> Result<(), StackCheckError> {
    for node in program.nodes() {
        check_node(program, node, library)?;
    }
    Ok(())
}

/// Check one node: label targets and string indices resolve, the stack never
/// underflows on any path, and every instruction is reached with a single
/// stack height.
///
/// Paths end at `Stop`, `RunNode`, dynamic `Jump`s and calls to functions the
/// library does not describe.
pub fn check_node(
    program: &Program,
    node: &Node,
    library: Option<&dyn Library>,
) -> Result<(), StackCheckError> {
    for (ip, op) in node.ops.iter().enumerate() {
        if let Some(label) = op.jump_target() {
            if node.label_index(label).is_none() {
                return Err(StackCheckError::new(
                    node,
                    ip,
                    format!("jump to unknown label '{}'", label),
                ));
            }
        }
        if let Some(index) = op.string_index() {
            if index >= program.strings().len() {
                return Err(StackCheckError::new(
                    node,
                    ip,
                    format!("string index {} out of range", index),
                ));
            }
        }
    }

    if node.ops.is_empty() {
        return Ok(());
    }

    let mut heights: Vec<Option<usize>> = vec![None; node.ops.len()];
    let mut worklist = vec![(0_usize, 0_usize)];

    while let Some((ip, h)) = worklist.pop() {
        match heights[ip] {
            Some(seen) if seen == h => continue,
            Some(seen) => {
                return Err(StackCheckError::new(
                    node,
                    ip,
                    format!("stack height mismatch at join point ({} vs {})", seen, h),
                ));
            }
            None => heights[ip] = Some(h),
        }

        let op = &node.ops[ip];
        let Some((pops, pushes)) = effect(op, library) else {
            continue;
        };

        if pops > h {
            return Err(StackCheckError::new(
                node,
                ip,
                format!("stack underflow, op={:?} needed {} item(s), have {}", op, pops, h),
            ));
        }
        let after = h - pops + pushes;

        for target in successors(node, ip, op) {
            worklist.push((target, after));
        }
    }

    Ok(())
}
