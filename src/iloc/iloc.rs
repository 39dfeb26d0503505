use std::fmt::{self, Display};

/// A register operand. Virtual registers are positive and allocated from
/// 1; the four machine registers are negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register(pub i32);

impl Register {
    pub const RBSS: Register = Register(-4);
    pub const RFP: Register = Register(-3);
    pub const RSP: Register = Register(-2);
    pub const RPC: Register = Register(-1);

    pub fn is_special(self) -> bool {
        self.0 < 0
    }
}

impl Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Register::RBSS => write!(f, "rbss"),
            Register::RFP => write!(f, "rfp"),
            Register::RSP => write!(f, "rsp"),
            Register::RPC => write!(f, "rpc"),
            Register(n) => write!(f, "r{}", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl Label {
    /// Target of a jump emitted before its destination exists.
    pub const PENDING: Label = Label(u32::MAX);
}

impl Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl Relation {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Relation::Equal => "cmp_EQ",
            Relation::NotEqual => "cmp_NE",
            Relation::Less => "cmp_LT",
            Relation::LessEqual => "cmp_LE",
            Relation::Greater => "cmp_GT",
            Relation::GreaterEqual => "cmp_GE",
        }
    }
}

/// One ILOC operation. Operands are listed in printed order, so the
/// destination is always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Add(Register, Register, Register),
    Sub(Register, Register, Register),
    Mult(Register, Register, Register),
    Div(Register, Register, Register),
    AddI(Register, i32, Register),
    RSubI(Register, i32, Register),
    LoadI(i32, Register),
    LoadAI(Register, i32, Register),
    /// `storeAI value => base, offset`
    StoreAI(Register, Register, i32),
    I2I(Register, Register),
    Cmp(Relation, Register, Register, Register),
    Cbr(Register, Label, Label),
    JumpI(Label),
    Jump(Register),
    Halt,
    Nop,
}

impl Op {
    /// Register written by this operation, if any.
    pub fn destination(&self) -> Option<Register> {
        match *self {
            Op::Add(_, _, d)
            | Op::Sub(_, _, d)
            | Op::Mult(_, _, d)
            | Op::Div(_, _, d)
            | Op::AddI(_, _, d)
            | Op::RSubI(_, _, d)
            | Op::LoadI(_, d)
            | Op::LoadAI(_, _, d)
            | Op::I2I(_, d)
            | Op::Cmp(_, _, _, d) => Some(d),
            Op::StoreAI(..) | Op::Cbr(..) | Op::JumpI(_) | Op::Jump(_) | Op::Halt | Op::Nop => None,
        }
    }

    /// Labels this operation may transfer control to.
    pub fn targets(&self) -> Vec<Label> {
        match *self {
            Op::Cbr(_, taken, not_taken) => vec![taken, not_taken],
            Op::JumpI(label) => vec![label],
            _ => vec![],
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Add(a, b, d) => write!(f, "add {}, {} => {}", a, b, d),
            Op::Sub(a, b, d) => write!(f, "sub {}, {} => {}", a, b, d),
            Op::Mult(a, b, d) => write!(f, "mult {}, {} => {}", a, b, d),
            Op::Div(a, b, d) => write!(f, "div {}, {} => {}", a, b, d),
            Op::AddI(a, n, d) => write!(f, "addI {}, {} => {}", a, n, d),
            Op::RSubI(a, n, d) => write!(f, "rsubI {}, {} => {}", a, n, d),
            Op::LoadI(n, d) => write!(f, "loadI {} => {}", n, d),
            Op::LoadAI(base, offset, d) => write!(f, "loadAI {}, {} => {}", base, offset, d),
            Op::StoreAI(value, base, offset) => write!(f, "storeAI {} => {}, {}", value, base, offset),
            Op::I2I(a, d) => write!(f, "i2i {} => {}", a, d),
            Op::Cmp(relation, a, b, d) => write!(f, "{} {}, {} -> {}", relation.mnemonic(), a, b, d),
            Op::Cbr(r, taken, not_taken) => write!(f, "cbr {} -> {}, {}", r, taken, not_taken),
            Op::JumpI(label) => write!(f, "jumpI -> {}", label),
            Op::Jump(r) => write!(f, "jump -> {}", r),
            Op::Halt => write!(f, "halt"),
            Op::Nop => write!(f, "nop"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub op: Op,
    pub label: Option<Label>,
    pub comment: Option<String>,
}

impl Instruction {
    pub fn new(op: Op) -> Self {
        Instruction {
            op,
            label: None,
            comment: None,
        }
    }

    pub fn label(&mut self, label: Label) -> &mut Self {
        self.label = Some(label);
        self
    }

    pub fn comment(&mut self, comment: impl Into<String>) -> &mut Self {
        self.comment = Some(comment.into());
        self
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = self.label {
            write!(f, "{}: ", label)?;
        }
        write!(f, "{}", self.op)?;
        if let Some(comment) = &self.comment {
            write!(f, " // {}", comment)?;
        }
        Ok(())
    }
}

/// Instructions in emission order. Only ever appended to, apart from
/// [`Program::patch_jump`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    /// Appends `op` and returns the new instruction so a label or comment
    /// can be attached.
    pub fn emit(&mut self, op: Op) -> &mut Instruction {
        self.instructions.push(Instruction::new(op));
        let last = self.instructions.len() - 1;
        &mut self.instructions[last]
    }

    /// Rewrites the target of the `jumpI` at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range or does not hold a `jumpI`.
    pub fn patch_jump(&mut self, index: usize, label: Label) {
        match self.instructions.get_mut(index).map(|instruction| &mut instruction.op) {
            Some(Op::JumpI(target)) => *target = label,
            other => panic!("instruction {} is not a jumpI: {:?}", index, other),
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    /// Index of the instruction carrying `label`.
    pub fn position_of(&self, label: Label) -> Option<usize> {
        self.instructions
            .iter()
            .position(|instruction| instruction.label == Some(label))
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.instructions {
            writeln!(f, "{}", instruction)?;
        }
        Ok(())
    }
}
