use std::cell::OnceCell;

use crate::Position;

use super::{
    expressions::{BinOp, UnOp, VariableRef},
    statements::{Field, Param, ShiftDirection},
    types::{Type, TypeKind},
};

/// Index of a node inside its [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Node Kinds
///
/// Every construct the external parser can produce. Lists (statements,
/// call arguments, output operands, for-each expressions) are sibling
/// chains linked through [`Node::next`], starting at the `Option<NodeId>`
/// stored here.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // Literals
    Int(i32),
    Float(f32),
    Bool(bool),
    Char(char),
    Str(String),
    Variable(VariableRef),
    /// Placeholder for the left-hand result of a pipe.
    Dot,

    // Operators
    BinOp { op: BinOp, left: NodeId, right: NodeId },
    UnOp { op: UnOp, value: NodeId },
    TernOp { cond: NodeId, then: NodeId, otherwise: NodeId },

    // Globals
    TypeDecl { identifier: String, fields: Vec<Field> },
    GlobalVarDecl { ty: Type, identifier: String, is_static: bool, array_size: Option<u32> },
    FunctionDecl {
        ty: Type,
        identifier: String,
        is_static: bool,
        params: Vec<Param>,
        body: Option<NodeId>,
    },

    // Commands
    LocalVarDecl {
        ty: Type,
        identifier: String,
        is_static: bool,
        is_const: bool,
        init: Option<NodeId>,
    },
    Assign { target: VariableRef, value: NodeId },
    Shift { direction: ShiftDirection, target: VariableRef, value: NodeId },
    FunctionCall { identifier: String, arguments: Option<NodeId> },
    Return { value: NodeId },
    Input { value: NodeId },
    Output { values: Option<NodeId> },
    Break,
    Continue,
    Case(i32),
    Block { body: Option<NodeId> },

    // Flow control
    If { cond: NodeId, then: Option<NodeId>, otherwise: Option<NodeId> },
    While { cond: NodeId, body: Option<NodeId> },
    DoWhile { cond: NodeId, body: Option<NodeId> },
    Switch { expression: NodeId, body: Option<NodeId> },
    For {
        initializers: Option<NodeId>,
        condition: NodeId,
        commands: Option<NodeId>,
        body: Option<NodeId>,
    },
    ForEach { identifier: String, expressions: Option<NodeId>, body: Option<NodeId> },
}

impl NodeKind {
    /// Source-level name of the construct, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Int(_) => "int literal",
            NodeKind::Float(_) => "float literal",
            NodeKind::Bool(_) => "bool literal",
            NodeKind::Char(_) => "char literal",
            NodeKind::Str(_) => "string literal",
            NodeKind::Variable(_) => "variable",
            NodeKind::Dot => "pipe placeholder",
            NodeKind::BinOp { .. } => "binary operation",
            NodeKind::UnOp { .. } => "unary operation",
            NodeKind::TernOp { .. } => "ternary operation",
            NodeKind::TypeDecl { .. } => "class declaration",
            NodeKind::GlobalVarDecl { .. } => "global declaration",
            NodeKind::FunctionDecl { .. } => "function declaration",
            NodeKind::LocalVarDecl { .. } => "local declaration",
            NodeKind::Assign { .. } => "assignment",
            NodeKind::Shift { .. } => "shift",
            NodeKind::FunctionCall { .. } => "function call",
            NodeKind::Return { .. } => "return",
            NodeKind::Input { .. } => "input",
            NodeKind::Output { .. } => "output",
            NodeKind::Break => "break",
            NodeKind::Continue => "continue",
            NodeKind::Case(_) => "case",
            NodeKind::Block { .. } => "block",
            NodeKind::If { .. } => "if",
            NodeKind::While { .. } => "while",
            NodeKind::DoWhile { .. } => "do-while",
            NodeKind::Switch { .. } => "switch",
            NodeKind::For { .. } => "for",
            NodeKind::ForEach { .. } => "for-each",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub position: Position,
    /// Written at most once, by the type checker, when the node's value
    /// must be converted to a different kind than its own.
    pub coerced_to: OnceCell<TypeKind>,
    pub next: Option<NodeId>,
}

/// Arena holding every node of one compilation unit.
///
/// Nodes are never removed; dropping the `Ast` frees the whole tree.
#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Ast {
    pub fn new() -> Self {
        Ast::default()
    }

    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        self.add_at(kind, Position::null())
    }

    pub fn add_at(&mut self, kind: NodeKind, position: Position) -> NodeId {
        self.nodes.push(Node {
            kind,
            position,
            coerced_to: OnceCell::new(),
            next: None,
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Links `ids` into a sibling chain and returns its head.
    pub fn chain(&mut self, ids: &[NodeId]) -> Option<NodeId> {
        for pair in ids.windows(2) {
            self.nodes[pair[0].0].next = Some(pair[1]);
        }
        ids.first().copied()
    }

    pub fn set_root(&mut self, root: Option<NodeId>) {
        self.root = root;
    }

    pub fn with_root(mut self, root: Option<NodeId>) -> Self {
        self.set_root(root);
        self
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn position(&self, id: NodeId) -> Position {
        self.nodes[id.0].position
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates a sibling chain starting at `first`.
    pub fn siblings(&self, first: Option<NodeId>) -> Siblings<'_> {
        Siblings { ast: self, current: first }
    }

    pub fn coerced_to(&self, id: NodeId) -> Option<TypeKind> {
        self.nodes[id.0].coerced_to.get().copied()
    }

    /// Records the coercion of `id`. A node is stamped once; re-checking
    /// the same tree must produce the same stamp.
    pub fn stamp(&self, id: NodeId, kind: TypeKind) {
        let node = &self.nodes[id.0];
        if let Err(kind) = node.coerced_to.set(kind) {
            debug_assert_eq!(node.coerced_to.get(), Some(&kind), "conflicting coercion stamps");
        }
    }
}

pub struct Siblings<'a> {
    ast: &'a Ast,
    current: Option<NodeId>,
}

impl Iterator for Siblings<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        self.current = self.ast.node(id).next;
        Some(id)
    }
}
