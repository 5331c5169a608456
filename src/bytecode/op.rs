// =============================================================================
// OP - Dialogue bytecode instructions
// =============================================================================

/// A single instruction of a compiled node.
///
/// String operands named `*_index` refer to the program's string table;
/// everything else is a literal. Label names are scoped to the node that
/// contains them.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    // ==========================================================================
    // Control flow - label-based, resolved by linear scan of the current node
    // ==========================================================================
    /// No-op marker used as a jump target.
    Label(String),

    /// Jump to the named label.
    JumpTo(String),

    /// Peek a string from the stack and jump to the label it names.
    /// The value is left on the stack.
    Jump,

    /// Peek a bool from the stack; jump to the label if it is false.
    /// The value is left on the stack either way.
    JumpIfFalse(String),

    // host output
    RunLine(usize),
    RunCommand(String),

    // options
    /// Queue an option. `text` is `None` for an unlabeled option, which
    /// `ShowOptions` selects without asking the host when it is alone.
    AddOption {
        text: Option<usize>,
        destination: String,
    },
    ShowOptions,

    // literals
    PushString(usize),
    PushNumber(f64),
    PushBool(bool),
    PushNull,

    // stack ops
    Pop,

    // host functions and variables
    CallFunc(String),
    PushVariable(String),
    StoreVariable(String),

    // node control
    Stop,
    RunNode,
}

/// Numeric opcode used by the binary program format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    JumpTo = 0,
    Jump = 1,
    RunLine = 2,
    RunCommand = 3,
    AddOption = 4,
    ShowOptions = 5,
    PushString = 6,
    PushNumber = 7,
    PushBool = 8,
    PushNull = 9,
    JumpIfFalse = 10,
    Pop = 11,
    CallFunc = 12,
    PushVariable = 13,
    StoreVariable = 14,
    Stop = 15,
    RunNode = 16,
    Label = 17,
}

impl OpCode {
    pub const ALL: [OpCode; 18] = [
        OpCode::JumpTo,
        OpCode::Jump,
        OpCode::RunLine,
        OpCode::RunCommand,
        OpCode::AddOption,
        OpCode::ShowOptions,
        OpCode::PushString,
        OpCode::PushNumber,
        OpCode::PushBool,
        OpCode::PushNull,
        OpCode::JumpIfFalse,
        OpCode::Pop,
        OpCode::CallFunc,
        OpCode::PushVariable,
        OpCode::StoreVariable,
        OpCode::Stop,
        OpCode::RunNode,
        OpCode::Label,
    ];

    pub fn from_u8(byte: u8) -> Option<OpCode> {
        OpCode::ALL.iter().copied().find(|op| *op as u8 == byte)
    }

    /// Assembly mnemonic, shared by the assembler and the disassembler.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::JumpTo => "JumpTo",
            OpCode::Jump => "Jump",
            OpCode::RunLine => "RunLine",
            OpCode::RunCommand => "RunCommand",
            OpCode::AddOption => "AddOption",
            OpCode::ShowOptions => "ShowOptions",
            OpCode::PushString => "PushString",
            OpCode::PushNumber => "PushNumber",
            OpCode::PushBool => "PushBool",
            OpCode::PushNull => "PushNull",
            OpCode::JumpIfFalse => "JumpIfFalse",
            OpCode::Pop => "Pop",
            OpCode::CallFunc => "CallFunc",
            OpCode::PushVariable => "PushVariable",
            OpCode::StoreVariable => "StoreVariable",
            OpCode::Stop => "Stop",
            OpCode::RunNode => "RunNode",
            OpCode::Label => "Label",
        }
    }

    pub fn from_mnemonic(name: &str) -> Option<OpCode> {
        OpCode::ALL.iter().copied().find(|op| op.mnemonic() == name)
    }
}

impl Op {
    pub fn opcode(&self) -> OpCode {
        match self {
            Op::Label(_) => OpCode::Label,
            Op::JumpTo(_) => OpCode::JumpTo,
            Op::Jump => OpCode::Jump,
            Op::JumpIfFalse(_) => OpCode::JumpIfFalse,
            Op::RunLine(_) => OpCode::RunLine,
            Op::RunCommand(_) => OpCode::RunCommand,
            Op::AddOption { .. } => OpCode::AddOption,
            Op::ShowOptions => OpCode::ShowOptions,
            Op::PushString(_) => OpCode::PushString,
            Op::PushNumber(_) => OpCode::PushNumber,
            Op::PushBool(_) => OpCode::PushBool,
            Op::PushNull => OpCode::PushNull,
            Op::Pop => OpCode::Pop,
            Op::CallFunc(_) => OpCode::CallFunc,
            Op::PushVariable(_) => OpCode::PushVariable,
            Op::StoreVariable(_) => OpCode::StoreVariable,
            Op::Stop => OpCode::Stop,
            Op::RunNode => OpCode::RunNode,
        }
    }

    /// Label name this op may transfer control to, if it is a static jump.
    pub fn jump_target(&self) -> Option<&str> {
        match self {
            Op::JumpTo(label) | Op::JumpIfFalse(label) => Some(label),
            _ => None,
        }
    }

    /// String table index this op reads, if any.
    pub fn string_index(&self) -> Option<usize> {
        match self {
            Op::RunLine(index) | Op::PushString(index) => Some(*index),
            Op::AddOption { text, .. } => *text,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_byte_lookup() {
        for op in OpCode::ALL {
            assert_eq!(OpCode::from_u8(op as u8), Some(op));
        }
        assert_eq!(OpCode::from_u8(18), None);
        assert_eq!(OpCode::from_u8(255), None);
    }

    #[test]
    fn test_mnemonic_lookup() {
        assert_eq!(OpCode::from_mnemonic("ShowOptions"), Some(OpCode::ShowOptions));
        assert_eq!(OpCode::from_mnemonic("showoptions"), None);
    }

    #[test]
    fn test_jump_target() {
        assert_eq!(Op::JumpTo("L1".to_string()).jump_target(), Some("L1"));
        assert_eq!(Op::JumpIfFalse("L2".to_string()).jump_target(), Some("L2"));
        assert_eq!(Op::Jump.jump_target(), None);
    }

    #[test]
    fn test_string_index() {
        assert_eq!(Op::RunLine(3).string_index(), Some(3));
        let unlabeled = Op::AddOption {
            text: None,
            destination: "Next".to_string(),
        };
        assert_eq!(unlabeled.string_index(), None);
        assert_eq!(Op::RunCommand("wait 2".to_string()).string_index(), None);
    }
}
