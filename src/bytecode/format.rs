//! Binary container for compiled programs.
//!
//! Layout: the 4-byte magic `LOOM`, a little-endian `u16` format version,
//! then the postcard encoding of a [`WireProgram`]. Instructions travel as a
//! numeric opcode plus two untyped operands and are validated into [`Op`]s
//! on load, so a program produced by a newer compiler is rejected here
//! instead of failing halfway through a conversation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bytecode::ir::{DuplicateNode, Node, Program};
use crate::bytecode::op::{Op, OpCode};

pub const MAGIC: [u8; 4] = *b"LOOM";
pub const FORMAT_VERSION: u16 = 1;

/// Wire value of an `AddOption` text operand that has no label.
pub const NO_LABEL: f64 = -1.0;

const HEADER_LEN: usize = MAGIC.len() + 2;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("not a compiled dialogue program")]
    BadMagic,

    #[error("unsupported format version {found} (this runtime reads {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("malformed program body: {0}")]
    Codec(postcard::Error),

    #[error("node '{node}', instruction {index}: unknown opcode {opcode}")]
    UnknownOpcode {
        node: String,
        index: usize,
        opcode: u8,
    },

    #[error("node '{node}', instruction {index}: {message}")]
    BadOperand {
        node: String,
        index: usize,
        message: String,
    },

    #[error(transparent)]
    DuplicateNode(#[from] DuplicateNode),
}

/// Untyped instruction operand as stored on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    None,
    String(String),
    Number(f64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireInstruction {
    pub opcode: u8,
    pub a: Operand,
    pub b: Operand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireNode {
    pub name: String,
    pub tags: Vec<String>,
    pub instructions: Vec<WireInstruction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireProgram {
    pub name: String,
    pub strings: Vec<String>,
    pub nodes: Vec<WireNode>,
}

pub fn to_bytes(program: &Program) -> Result<Vec<u8>, FormatError> {
    let wire = to_wire(program);
    let body = postcard::to_allocvec(&wire).map_err(FormatError::Codec)?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

pub fn from_bytes(bytes: &[u8]) -> Result<Program, FormatError> {
    if bytes.len() < HEADER_LEN || bytes[..MAGIC.len()] != MAGIC {
        return Err(FormatError::BadMagic);
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    let wire: WireProgram = postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(FormatError::Codec)?;
    from_wire(wire)
}

pub fn to_wire(program: &Program) -> WireProgram {
    WireProgram {
        name: program.name().to_string(),
        strings: program.strings().to_vec(),
        nodes: program
            .nodes()
            .into_iter()
            .map(|node| WireNode {
                name: node.name.clone(),
                tags: node.tags.clone(),
                instructions: node.ops.iter().map(encode_op).collect(),
            })
            .collect(),
    }
}

pub fn from_wire(wire: WireProgram) -> Result<Program, FormatError> {
    let mut nodes = Vec::with_capacity(wire.nodes.len());

    for node in wire.nodes {
        let mut ops = Vec::with_capacity(node.instructions.len());
        for (index, instruction) in node.instructions.into_iter().enumerate() {
            ops.push(decode_op(&node.name, index, instruction)?);
        }
        nodes.push(Node::new(node.name, ops).with_tags(node.tags));
    }

    Ok(Program::new(wire.name, wire.strings, nodes)?)
}

fn index_operand(index: usize) -> Operand {
    Operand::Number(index as f64)
}

fn encode_op(op: &Op) -> WireInstruction {
    let (a, b) = match op {
        Op::Label(name) | Op::JumpTo(name) | Op::JumpIfFalse(name) => {
            (Operand::String(name.clone()), Operand::None)
        }
        Op::RunCommand(text) => (Operand::String(text.clone()), Operand::None),
        Op::CallFunc(name) | Op::PushVariable(name) | Op::StoreVariable(name) => {
            (Operand::String(name.clone()), Operand::None)
        }
        Op::RunLine(index) | Op::PushString(index) => (index_operand(*index), Operand::None),
        Op::AddOption { text, destination } => {
            let text = match text {
                Some(index) => index_operand(*index),
                None => Operand::Number(NO_LABEL),
            };
            (text, Operand::String(destination.clone()))
        }
        Op::PushNumber(n) => (Operand::Number(*n), Operand::None),
        Op::PushBool(b) => (Operand::Bool(*b), Operand::None),
        Op::Jump | Op::ShowOptions | Op::PushNull | Op::Pop | Op::Stop | Op::RunNode => {
            (Operand::None, Operand::None)
        }
    };

    WireInstruction {
        opcode: op.opcode() as u8,
        a,
        b,
    }
}

fn decode_op(node: &str, index: usize, instruction: WireInstruction) -> Result<Op, FormatError> {
    let bad = |message: String| FormatError::BadOperand {
        node: node.to_string(),
        index,
        message,
    };

    let opcode = OpCode::from_u8(instruction.opcode).ok_or_else(|| FormatError::UnknownOpcode {
        node: node.to_string(),
        index,
        opcode: instruction.opcode,
    })?;

    let text = |operand: Operand| match operand {
        Operand::String(s) => Ok(s),
        other => Err(bad(format!(
            "{} expects a string operand, got {:?}",
            opcode.mnemonic(),
            other
        ))),
    };

    let string_index = |operand: Operand| match operand {
        Operand::Number(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as usize),
        other => Err(bad(format!(
            "{} expects a string table index, got {:?}",
            opcode.mnemonic(),
            other
        ))),
    };

    let WireInstruction { a, b, .. } = instruction;

    Ok(match opcode {
        OpCode::Label => Op::Label(text(a)?),
        OpCode::JumpTo => Op::JumpTo(text(a)?),
        OpCode::Jump => Op::Jump,
        OpCode::JumpIfFalse => Op::JumpIfFalse(text(a)?),
        OpCode::RunLine => Op::RunLine(string_index(a)?),
        OpCode::RunCommand => Op::RunCommand(text(a)?),
        OpCode::AddOption => {
            let text_index = match a {
                Operand::Number(n) if n == NO_LABEL => None,
                other => Some(string_index(other)?),
            };
            Op::AddOption {
                text: text_index,
                destination: text(b)?,
            }
        }
        OpCode::ShowOptions => Op::ShowOptions,
        OpCode::PushString => Op::PushString(string_index(a)?),
        OpCode::PushNumber => match a {
            Operand::Number(n) => Op::PushNumber(n),
            other => return Err(bad(format!("PushNumber expects a number, got {:?}", other))),
        },
        OpCode::PushBool => match a {
            Operand::Bool(b) => Op::PushBool(b),
            other => return Err(bad(format!("PushBool expects a bool, got {:?}", other))),
        },
        OpCode::PushNull => Op::PushNull,
        OpCode::Pop => Op::Pop,
        OpCode::CallFunc => Op::CallFunc(text(a)?),
        OpCode::PushVariable => Op::PushVariable(text(a)?),
        OpCode::StoreVariable => Op::StoreVariable(text(a)?),
        OpCode::Stop => Op::Stop,
        OpCode::RunNode => Op::RunNode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_program() -> Program {
        Program::new(
            "sample",
            vec!["Hello".to_string(), "Go left".to_string()],
            vec![
                Node::new(
                    "Start",
                    vec![
                        Op::RunLine(0),
                        Op::AddOption {
                            text: Some(1),
                            destination: "Left".to_string(),
                        },
                        Op::AddOption {
                            text: None,
                            destination: "Right".to_string(),
                        },
                        Op::ShowOptions,
                        Op::RunNode,
                    ],
                )
                .with_tags(vec!["intro".to_string()]),
                Node::new(
                    "Left",
                    vec![
                        Op::PushNumber(2.5),
                        Op::StoreVariable("$gold".to_string()),
                        Op::Label("end".to_string()),
                        Op::RunCommand("fade out".to_string()),
                    ],
                ),
            ],
        )
        .unwrap()
    }

    fn header() -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes
    }

    fn encode_wire(wire: &WireProgram) -> Vec<u8> {
        let mut bytes = header();
        bytes.extend_from_slice(&postcard::to_allocvec(wire).unwrap());
        bytes
    }

    fn single_instruction(instruction: WireInstruction) -> WireProgram {
        WireProgram {
            name: "bad".to_string(),
            strings: vec![],
            nodes: vec![WireNode {
                name: "Start".to_string(),
                tags: vec![],
                instructions: vec![instruction],
            }],
        }
    }

    #[test]
    fn test_save_then_load_preserves_program() {
        let program = sample_program();
        let bytes = to_bytes(&program).unwrap();
        assert_eq!(&bytes[..4], b"LOOM");
        assert_eq!(from_bytes(&bytes).unwrap(), program);
    }

    #[test]
    fn test_no_label_sentinel_on_wire() {
        let wire = to_wire(&sample_program());
        let start = wire.nodes.iter().find(|n| n.name == "Start").unwrap();
        assert_eq!(start.instructions[2].a, Operand::Number(NO_LABEL));
        assert_eq!(start.instructions[2].b, Operand::String("Right".to_string()));
    }

    #[test]
    fn test_bad_magic() {
        assert!(matches!(from_bytes(b"NOPE\x01\x00"), Err(FormatError::BadMagic)));
        assert!(matches!(from_bytes(b"LO"), Err(FormatError::BadMagic)));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = to_bytes(&sample_program()).unwrap();
        bytes[4] = 9;
        assert!(matches!(
            from_bytes(&bytes),
            Err(FormatError::UnsupportedVersion {
                found: 9,
                expected: 1
            })
        ));
    }

    #[test]
    fn test_truncated_body() {
        let bytes = to_bytes(&sample_program()).unwrap();
        let cut = &bytes[..bytes.len() / 2];
        assert!(matches!(from_bytes(cut), Err(FormatError::Codec(_))));
    }

    #[test]
    fn test_unknown_opcode_rejected_on_load() {
        let bytes = encode_wire(&single_instruction(WireInstruction {
            opcode: 42,
            a: Operand::None,
            b: Operand::None,
        }));
        match from_bytes(&bytes) {
            Err(FormatError::UnknownOpcode { node, index, opcode }) => {
                assert_eq!(node, "Start");
                assert_eq!(index, 0);
                assert_eq!(opcode, 42);
            }
            other => panic!("expected unknown opcode error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_operand_rejected_on_load() {
        let bytes = encode_wire(&single_instruction(WireInstruction {
            opcode: OpCode::RunLine as u8,
            a: Operand::String("line:1".to_string()),
            b: Operand::None,
        }));
        let err = from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("RunLine expects a string table index"));
    }

    #[test]
    fn test_fractional_string_index_rejected() {
        let bytes = encode_wire(&single_instruction(WireInstruction {
            opcode: OpCode::PushString as u8,
            a: Operand::Number(1.5),
            b: Operand::None,
        }));
        assert!(matches!(from_bytes(&bytes), Err(FormatError::BadOperand { .. })));
    }

    #[test]
    fn test_duplicate_node_rejected_on_load() {
        let node = WireNode {
            name: "Start".to_string(),
            tags: vec![],
            instructions: vec![],
        };
        let wire = WireProgram {
            name: "dup".to_string(),
            strings: vec![],
            nodes: vec![node.clone(), node],
        };
        assert!(matches!(
            from_bytes(&encode_wire(&wire)),
            Err(FormatError::DuplicateNode(_))
        ));
    }
}
