use crate::bytecode::{Node, Op, Program};

/// Render a program in assembler syntax.
///
/// Nodes are listed by name. Every instruction carries its index and, where
/// it refers to the string table, the resolved text in a trailing comment.
/// Feeding the output back to [`assemble`](crate::bytecode::asm::assemble)
/// reproduces the program.
pub fn disassemble(program: &Program) -> String {
    let rule = "# ════════════════════════════════════════".to_string();
    let mut lines = vec![
        rule.clone(),
        format!("# {} node(s), {} string(s)", program.nodes().len(), program.strings().len()),
        rule,
        format!("program {}", quote(program.name())),
    ];

    for (i, text) in program.strings().iter().enumerate() {
        lines.push(format!("string {} {}", i, quote(text)));
    }

    for node in program.nodes() {
        lines.push(String::new());
        node_lines(&mut lines, program, node);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn node_lines(lines: &mut Vec<String>, program: &Program, node: &Node) {
    lines.push(format!("node {}:", name(&node.name)));
    if !node.tags.is_empty() {
        let tags: Vec<String> = node.tags.iter().map(|t| name(t)).collect();
        lines.push(format!("    tags {}", tags.join(" ")));
    }

    for (ip, op) in node.ops.iter().enumerate() {
        let text = format_op(op);
        let note = op
            .string_index()
            .map(|index| match program.strings().get(index) {
                Some(s) => format!(" {}", quote(s)),
                None => " <missing string>".to_string(),
            })
            .unwrap_or_default();

        // Labels sit at the margin so jump targets stand out.
        let indent = if matches!(op, Op::Label(_)) { "  " } else { "    " };
        lines.push(format!("{}{:<32} # {:04}{}", indent, text, ip, note));
    }
}

fn format_op(op: &Op) -> String {
    let mnemonic = op.opcode().mnemonic();
    match op {
        Op::Label(label) | Op::JumpTo(label) | Op::JumpIfFalse(label) => {
            format!("{} {}", mnemonic, name(label))
        }
        Op::RunLine(index) | Op::PushString(index) => format!("{} {}", mnemonic, index),
        Op::RunCommand(text) => format!("{} {}", mnemonic, quote(text)),
        Op::AddOption { text, destination } => {
            let text = text.map_or_else(|| "-".to_string(), |i| i.to_string());
            format!("{} {} {}", mnemonic, text, name(destination))
        }
        Op::PushNumber(n) => format!("{} {}", mnemonic, n),
        Op::PushBool(b) => format!("{} {}", mnemonic, b),
        Op::CallFunc(id) | Op::PushVariable(id) | Op::StoreVariable(id) => {
            format!("{} {}", mnemonic, name(id))
        }
        Op::Jump | Op::ShowOptions | Op::PushNull | Op::Pop | Op::Stop | Op::RunNode => {
            mnemonic.to_string()
        }
    }
}

/// Bare word when it survives tokenizing unchanged, quoted otherwise.
fn name(text: &str) -> String {
    let bare = !text.is_empty()
        && !text.starts_with('#')
        && !text.ends_with(':')
        && text != "-"
        && !text.chars().any(|c| c.is_whitespace() || c == '"');
    if bare { text.to_string() } else { quote(text) }
}

fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::asm::assemble;

    fn sample() -> Program {
        Program::new(
            "demo",
            vec!["Hi \"you\"".to_string(), "Go".to_string()],
            vec![
                Node::new(
                    "Start",
                    vec![
                        Op::RunLine(0),
                        Op::PushBool(true),
                        Op::JumpIfFalse("skip".to_string()),
                        Op::AddOption {
                            text: Some(1),
                            destination: "Two words".to_string(),
                        },
                        Op::AddOption {
                            text: None,
                            destination: "Next".to_string(),
                        },
                        Op::Label("skip".to_string()),
                        Op::ShowOptions,
                        Op::RunNode,
                    ],
                )
                .with_tags(vec!["intro".to_string()]),
                Node::new(
                    "Two words",
                    vec![
                        Op::PushNumber(-2.5),
                        Op::StoreVariable("$mood".to_string()),
                        Op::RunCommand("say \"hi\" # now".to_string()),
                        Op::PushNull,
                        Op::Pop,
                        Op::Stop,
                    ],
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_listing_annotates_strings() {
        let text = disassemble(&sample());
        assert!(text.contains("program \"demo\""));
        assert!(text.contains("string 0 \"Hi \\\"you\\\"\""));
        assert!(text.contains("node Start:"));
        assert!(text.contains("node \"Two words\":"));
        assert!(text.contains("    tags intro"));
        assert!(text.contains("# 0000 \"Hi \\\"you\\\"\""));
        assert!(text.contains("AddOption - Next"));
        assert!(text.contains("\n  Label skip"));
    }

    #[test]
    fn test_listing_reassembles_to_same_program() {
        let program = sample();
        let reassembled = assemble(&disassemble(&program)).unwrap();
        assert_eq!(reassembled, program);
    }

    #[test]
    fn test_missing_string_is_marked() {
        let program = Program::new("p", vec![], vec![Node::new("A", vec![Op::RunLine(3)])]).unwrap();
        assert!(disassemble(&program).contains("<missing string>"));
    }
}
