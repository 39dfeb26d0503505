use super::ast::NodeId;

/// Binary operators, grouped by the checking rule that applies to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Pow,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
    Equal,
    NotEqual,
    And,
    Or,
    BitAnd,
    BitOr,
    BashPipe,
    ForwardPipe,
}

impl BinOp {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Subtract | BinOp::Multiply | BinOp::Divide | BinOp::Modulo | BinOp::Pow
        )
    }

    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinOp::Greater
                | BinOp::Less
                | BinOp::GreaterEqual
                | BinOp::LessEqual
                | BinOp::Equal
                | BinOp::NotEqual
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(self, BinOp::BitAnd | BinOp::BitOr)
    }

    pub fn is_pipe(&self) -> bool {
        matches!(self, BinOp::BashPipe | BinOp::ForwardPipe)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Minus,
    Plus,
    Address,
    Value,
    EvalBool,
    Hash,
}

/// A use of a named storage location: `a`, `v[i]` or `p.x`.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableRef {
    pub identifier: String,
    pub index: Option<NodeId>,
    pub field: Option<String>,
}

impl VariableRef {
    pub fn named(identifier: &str) -> Self {
        VariableRef {
            identifier: identifier.to_string(),
            index: None,
            field: None,
        }
    }

    pub fn indexed(identifier: &str, index: NodeId) -> Self {
        VariableRef {
            identifier: identifier.to_string(),
            index: Some(index),
            field: None,
        }
    }

    pub fn field(identifier: &str, field: &str) -> Self {
        VariableRef {
            identifier: identifier.to_string(),
            index: None,
            field: Some(field.to_string()),
        }
    }
}
