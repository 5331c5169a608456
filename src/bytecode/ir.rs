use std::collections::HashMap;

use thiserror::Error;

use crate::bytecode::Op;
use crate::runtime::runtime_error::RuntimeError;

/// A compiled dialogue program.
///
/// Programs are built once (by the assembler, the binary loader or a
/// compiler) and are read-only afterwards, so any number of virtual machines
/// can share one behind an `Rc`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    name: String,
    nodes: HashMap<String, Node>,
    strings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("duplicate node '{0}'")]
pub struct DuplicateNode(pub String);

impl Program {
    pub fn new(
        name: impl Into<String>,
        strings: Vec<String>,
        nodes: Vec<Node>,
    ) -> Result<Self, DuplicateNode> {
        let mut by_name = HashMap::with_capacity(nodes.len());
        for node in nodes {
            if by_name.contains_key(&node.name) {
                return Err(DuplicateNode(node.name));
            }
            by_name.insert(node.name.clone(), node);
        }

        Ok(Self {
            name: name.into(),
            nodes: by_name,
            strings,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Nodes in name order, so listings are stable.
    pub fn nodes(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        nodes
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub fn string(&self, index: usize) -> Result<&str, RuntimeError> {
        self.strings
            .get(index)
            .map(String::as_str)
            .ok_or(RuntimeError::StringLookup(index))
    }
}

/// A named, independently addressable instruction stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub ops: Vec<Op>,
    pub tags: Vec<String>,
}

impl Node {
    pub fn new(name: impl Into<String>, ops: Vec<Op>) -> Self {
        Self {
            name: name.into(),
            ops,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Index of the first `Label` with this name.
    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.ops
            .iter()
            .position(|op| matches!(op, Op::Label(name) if name == label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(name: &str) -> Op {
        Op::Label(name.to_string())
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let result = Program::new(
            "dup",
            vec![],
            vec![Node::new("Start", vec![]), Node::new("Start", vec![Op::Stop])],
        );
        assert_eq!(result.unwrap_err(), DuplicateNode("Start".to_string()));
    }

    #[test]
    fn test_string_lookup() {
        let program = Program::new("p", vec!["Hello".to_string()], vec![]).unwrap();
        assert_eq!(program.string(0).unwrap(), "Hello");
        assert_eq!(program.string(1).unwrap_err(), RuntimeError::StringLookup(1));
    }

    #[test]
    fn test_label_index_first_match() {
        let node = Node::new(
            "Start",
            vec![Op::Pop, label("a"), Op::Pop, label("b"), label("a")],
        );
        assert_eq!(node.label_index("a"), Some(1));
        assert_eq!(node.label_index("b"), Some(3));
        assert_eq!(node.label_index("c"), None);
    }

    #[test]
    fn test_nodes_sorted_by_name() {
        let program = Program::new(
            "p",
            vec![],
            vec![
                Node::new("b", vec![]),
                Node::new("c", vec![]),
                Node::new("a", vec![]),
            ],
        )
        .unwrap();
        let names: Vec<&str> = program.nodes().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
