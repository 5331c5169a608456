//! Text assembler for compiled dialogue.
//!
//! # Syntax
//!
//! ```text
//! # comment
//! program "Intro"
//! string 0 "Hello there."
//! string 1 "Ask about the ship"
//!
//! node Start:
//!     tags intro
//!     RunLine 0
//!     AddOption 1 Ship
//!     AddOption - Leave      # unlabeled option
//!     ShowOptions
//!     RunNode
//! ```
//!
//! - One directive or instruction per line; `#` starts a comment.
//! - String table entries must be declared in index order starting at 0.
//! - Names (nodes, labels, functions, variables) may be bare words or
//!   double-quoted; `RunCommand` text is usually quoted.
//! - The disassembler emits exactly this syntax.

use std::collections::HashSet;

use thiserror::Error;

use crate::bytecode::ir::{Node, Program};
use crate::bytecode::op::{Op, OpCode};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{line}:{col}: {message}")]
pub struct AsmError {
    pub line: usize,
    pub col: usize,
    pub message: String,
}

impl AsmError {
    fn new(line: usize, col: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            col,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Word {
    Bare(String),
    Quoted(String),
}

impl Word {
    fn text(&self) -> &str {
        match self {
            Word::Bare(s) | Word::Quoted(s) => s,
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    col: usize,
    word: Word,
}

pub fn assemble(source: &str) -> Result<Program, AsmError> {
    let mut name = String::new();
    let mut strings: Vec<String> = Vec::new();
    let mut nodes: Vec<Node> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (i, raw) in source.lines().enumerate() {
        let line = i + 1;
        let tokens = tokenize(raw, line)?;
        let Some((head, rest)) = tokens.split_first() else {
            continue;
        };

        match (&head.word, rest) {
            (Word::Bare(w), _) if w == "program" => {
                name = single_operand(line, head, rest)?.to_string();
            }
            (Word::Bare(w), _) if w == "string" => {
                let [index, text] = rest else {
                    return Err(AsmError::new(
                        line,
                        head.col,
                        "expected: string <index> \"<text>\"",
                    ));
                };
                let index = parse_index(line, index)?;
                if index != strings.len() {
                    return Err(AsmError::new(
                        line,
                        head.col,
                        format!("string {} declared out of order, expected {}", index, strings.len()),
                    ));
                }
                strings.push(text.word.text().to_string());
            }
            (Word::Bare(w), _) if w == "node" => {
                let node_name = node_header(line, head, rest)?;
                if !seen.insert(node_name.clone()) {
                    return Err(AsmError::new(
                        line,
                        head.col,
                        format!("duplicate node '{}'", node_name),
                    ));
                }
                nodes.push(Node::new(node_name, Vec::new()));
            }
            (Word::Bare(w), _) if w == "tags" => {
                let node = current_node(&mut nodes, line, head)?;
                node.tags
                    .extend(rest.iter().map(|t| t.word.text().to_string()));
            }
            (Word::Bare(w), _) => {
                let op = parse_op(line, head.col, w, rest)?;
                current_node(&mut nodes, line, head)?.ops.push(op);
            }
            (Word::Quoted(_), _) => {
                return Err(AsmError::new(line, head.col, "expected a directive or instruction"));
            }
        }
    }

    Program::new(name, strings, nodes).map_err(|e| AsmError::new(0, 0, e.to_string()))
}

fn current_node<'a>(nodes: &'a mut [Node], line: usize, head: &Token) -> Result<&'a mut Node, AsmError> {
    nodes
        .last_mut()
        .ok_or_else(|| AsmError::new(line, head.col, "instruction outside of a node"))
}

fn node_header(line: usize, head: &Token, rest: &[Token]) -> Result<String, AsmError> {
    let name = match rest {
        [name] => match &name.word {
            Word::Bare(w) => w.strip_suffix(':').unwrap_or(w),
            Word::Quoted(q) => q.as_str(),
        },
        [name, colon] if colon.word == Word::Bare(":".to_string()) => name.word.text(),
        _ => return Err(AsmError::new(line, head.col, "expected: node <name>:")),
    };

    if name.is_empty() {
        return Err(AsmError::new(line, head.col, "node name cannot be empty"));
    }
    Ok(name.to_string())
}

fn single_operand<'a>(line: usize, head: &Token, rest: &'a [Token]) -> Result<&'a str, AsmError> {
    match rest {
        [operand] => Ok(operand.word.text()),
        _ => Err(AsmError::new(
            line,
            head.col,
            format!("{} takes exactly one operand", head.word.text()),
        )),
    }
}

fn parse_index(line: usize, token: &Token) -> Result<usize, AsmError> {
    match &token.word {
        Word::Bare(w) => w
            .parse::<usize>()
            .map_err(|_| AsmError::new(line, token.col, format!("invalid string index '{}'", w))),
        Word::Quoted(_) => Err(AsmError::new(line, token.col, "string index must be a number")),
    }
}

fn parse_op(line: usize, col: usize, mnemonic: &str, operands: &[Token]) -> Result<Op, AsmError> {
    let opcode = OpCode::from_mnemonic(mnemonic)
        .ok_or_else(|| AsmError::new(line, col, format!("unknown instruction '{}'", mnemonic)))?;

    let arity = match opcode {
        OpCode::AddOption => 2,
        OpCode::Jump
        | OpCode::ShowOptions
        | OpCode::PushNull
        | OpCode::Pop
        | OpCode::Stop
        | OpCode::RunNode => 0,
        _ => 1,
    };
    if operands.len() != arity {
        return Err(AsmError::new(
            line,
            col,
            format!(
                "{} takes {} operand(s), got {}",
                mnemonic,
                arity,
                operands.len()
            ),
        ));
    }

    let text = |i: usize| operands[i].word.text().to_string();

    Ok(match opcode {
        OpCode::Label => Op::Label(text(0)),
        OpCode::JumpTo => Op::JumpTo(text(0)),
        OpCode::Jump => Op::Jump,
        OpCode::JumpIfFalse => Op::JumpIfFalse(text(0)),
        OpCode::RunLine => Op::RunLine(parse_index(line, &operands[0])?),
        OpCode::RunCommand => Op::RunCommand(text(0)),
        OpCode::AddOption => {
            let label = match &operands[0].word {
                Word::Bare(w) if w == "-" => None,
                _ => Some(parse_index(line, &operands[0])?),
            };
            Op::AddOption {
                text: label,
                destination: text(1),
            }
        }
        OpCode::ShowOptions => Op::ShowOptions,
        OpCode::PushString => Op::PushString(parse_index(line, &operands[0])?),
        OpCode::PushNumber => {
            let value = text(0).parse::<f64>().map_err(|_| {
                AsmError::new(line, operands[0].col, format!("invalid number '{}'", text(0)))
            })?;
            Op::PushNumber(value)
        }
        OpCode::PushBool => match text(0).as_str() {
            "true" => Op::PushBool(true),
            "false" => Op::PushBool(false),
            other => {
                return Err(AsmError::new(
                    line,
                    operands[0].col,
                    format!("invalid bool '{}'", other),
                ));
            }
        },
        OpCode::PushNull => Op::PushNull,
        OpCode::Pop => Op::Pop,
        OpCode::CallFunc => Op::CallFunc(text(0)),
        OpCode::PushVariable => Op::PushVariable(text(0)),
        OpCode::StoreVariable => Op::StoreVariable(text(0)),
        OpCode::Stop => Op::Stop,
        OpCode::RunNode => Op::RunNode,
    })
}

/// Split a line into bare words and quoted strings, dropping comments.
fn tokenize(raw: &str, line: usize) -> Result<Vec<Token>, AsmError> {
    let chars: Vec<char> = raw.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let ch = chars[pos];
        if ch.is_whitespace() {
            pos += 1;
            continue;
        }
        if ch == '#' {
            break;
        }

        let col = pos + 1;
        if ch == '"' {
            pos += 1;
            let mut text = String::new();
            loop {
                match chars.get(pos) {
                    Some('"') => {
                        pos += 1;
                        break;
                    }
                    Some('\\') => {
                        pos += 1;
                        match chars.get(pos) {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some('r') => text.push('\r'),
                            Some('\\') => text.push('\\'),
                            Some('"') => text.push('"'),
                            Some(other) => {
                                return Err(AsmError::new(
                                    line,
                                    pos + 1,
                                    format!("unknown escape sequence: \\{}", other),
                                ));
                            }
                            None => return Err(AsmError::new(line, col, "unterminated string")),
                        }
                        pos += 1;
                    }
                    Some(c) => {
                        text.push(*c);
                        pos += 1;
                    }
                    None => return Err(AsmError::new(line, col, "unterminated string")),
                }
            }
            tokens.push(Token {
                col,
                word: Word::Quoted(text),
            });
        } else {
            let start = pos;
            while pos < chars.len() && !chars[pos].is_whitespace() && chars[pos] != '"' {
                pos += 1;
            }
            tokens.push(Token {
                col,
                word: Word::Bare(chars[start..pos].iter().collect()),
            });
        }
    }

    Ok(tokens)
}
