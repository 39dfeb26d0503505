//! Main compiler module.
//!
//! This module contains the core Compiler structure and drives the lowering
//! of a checked AST into an ILOC program. It owns the register and label
//! counters, the memory store, the function table and the stack frame
//! layout used by the call, entry and exit sequences.

use std::collections::HashMap;

use log::{debug, warn};

use crate::{
    ast::{
        ast::{Ast, NodeId},
        statements::Field,
    },
    iloc::iloc::{Instruction, Label, Op, Program, Register},
};

use super::{memory::MemoryStore, stmt::gen_statement_list};

/// Size in bytes of one stack or global word.
pub const WORD: i32 = 4;

/// Fixed machine constants used by the generated program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Initial value of `rfp` and `rsp`.
    pub stack_base: i32,
    /// Initial value of `rbss`.
    pub globals_base: i32,
    /// Distance from the `addI rpc` of a call sequence to the instruction
    /// that reads the return value.
    pub return_address_offset: i32,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            stack_base: 1024,
            globals_base: 0,
            return_address_offset: 4,
        }
    }
}

/// Offsets, relative to `rfp`, of the slots of a frame with
/// `param_count` parameter words. A class-typed parameter takes one word
/// per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    param_count: i32,
}

impl FrameLayout {
    pub fn new(param_count: usize) -> Self {
        FrameLayout {
            param_count: param_count as i32,
        }
    }

    pub fn param_count(&self) -> usize {
        self.param_count as usize
    }

    pub fn return_value(&self) -> i32 {
        0
    }

    pub fn param(&self, index: usize) -> i32 {
        WORD + WORD * index as i32
    }

    pub fn return_address(&self) -> i32 {
        WORD + WORD * self.param_count
    }

    pub fn dynamic_link(&self) -> i32 {
        2 * WORD + WORD * self.param_count
    }

    pub fn static_link(&self) -> i32 {
        3 * WORD + WORD * self.param_count
    }

    pub fn locals_start(&self) -> i32 {
        4 * WORD + WORD * self.param_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionInfo {
    pub label: Label,
    pub layout: FrameLayout,
}

/// Labels `break` and `continue` jump to inside the innermost loop.
#[derive(Debug, Clone, Copy)]
pub struct LoopLabels {
    pub continue_label: Option<Label>,
    pub break_label: Label,
}

/// The function currently being lowered.
#[derive(Debug, Clone)]
pub struct CurrentFunction {
    pub name: String,
    pub is_main: bool,
    /// Where `return` jumps: the exit sequence, or the final `halt` of main.
    pub return_label: Label,
}

/// The main compiler structure that holds the state of one lowering.
///
/// Registers and labels are handed out by monotonically increasing
/// counters and are never reused within a compilation unit.
pub struct Compiler<'a> {
    /// The checked tree being lowered
    pub ast: &'a Ast,
    pub options: CompilerOptions,
    /// The instruction stream being built
    pub program: Program,

    /// Entry label and frame layout of every function lowered so far
    pub functions: HashMap<String, FunctionInfo>,
    /// Field lists of declared classes
    pub classes: HashMap<String, Vec<Field>>,
    /// Locations of variables, parameters and globals
    pub memory: MemoryStore,

    /// Innermost loop or switch last
    pub loops: Vec<LoopLabels>,
    /// Label of every `case` marker of the innermost switch
    pub cases: Vec<HashMap<NodeId, Label>>,
    /// Register holding the left-hand result of the innermost pipe
    pub dot: Option<Register>,
    pub current_function: Option<CurrentFunction>,

    next_register: i32,
    next_label: u32,
    next_global_offset: i32,
    next_local_offset: i32,
    preamble_jump: usize,
}

impl<'a> Compiler<'a> {
    pub fn new(ast: &'a Ast, options: CompilerOptions) -> Self {
        Compiler {
            ast,
            options,
            program: Program::new(),
            functions: HashMap::new(),
            classes: HashMap::new(),
            memory: MemoryStore::new(),
            loops: vec![],
            cases: vec![],
            dot: None,
            current_function: None,
            next_register: 1,
            next_label: 0,
            next_global_offset: 0,
            next_local_offset: 0,
            preamble_jump: 0,
        }
    }

    pub fn new_register(&mut self) -> Register {
        let register = Register(self.next_register);
        self.next_register += 1;
        register
    }

    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    pub fn emit(&mut self, op: Op) -> &mut Instruction {
        self.program.emit(op)
    }

    /// Emits a `nop` carrying `label`, marking a jump target.
    pub fn emit_label(&mut self, label: Label) -> &mut Instruction {
        self.program.emit(Op::Nop).label(label)
    }

    /// Reserves `words` words of global storage and returns the offset of
    /// the first one from `rbss`.
    pub fn allocate_global(&mut self, words: i32) -> i32 {
        let offset = self.next_global_offset;
        self.next_global_offset += WORD * words;
        offset
    }

    /// Pushes one word onto the stack and returns its offset from `rfp`.
    pub fn allocate_local(&mut self) -> i32 {
        self.emit(Op::AddI(Register::RSP, WORD, Register::RSP));
        let offset = self.next_local_offset;
        self.next_local_offset += WORD;
        offset
    }

    pub fn reset_locals(&mut self, start: i32) {
        self.next_local_offset = start;
    }

    /// Field list of the class `name`.
    ///
    /// # Panics
    ///
    /// Panics when the class was never declared.
    pub fn class_fields(&self, name: &str) -> Vec<Field> {
        self.classes
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("class `{}` was not declared", name))
    }

    pub fn function(&self, name: &str) -> FunctionInfo {
        *self
            .functions
            .get(name)
            .unwrap_or_else(|| panic!("function `{}` has no label", name))
    }

    /// Points the preamble jump at `label`.
    pub fn patch_entry(&mut self, label: Label) {
        self.program.patch_jump(self.preamble_jump, label);
    }

    fn emit_preamble(&mut self) {
        let CompilerOptions { stack_base, globals_base, .. } = self.options;
        self.emit(Op::LoadI(stack_base, Register::RFP));
        self.emit(Op::LoadI(stack_base, Register::RSP));
        self.emit(Op::LoadI(globals_base, Register::RBSS));
        self.preamble_jump = self.program.len();
        self.emit(Op::JumpI(Label::PENDING)).comment("main");
    }

    fn compile(&mut self) {
        self.emit_preamble();
        let root = self.ast.root();
        gen_statement_list(self, root);

        if !self.functions.contains_key("main") {
            warn!("compilation unit has no main function");
            let end = self.new_label();
            self.emit(Op::Halt).label(end);
            self.patch_entry(end);
        }
        debug!(
            "lowered {} functions into {} instructions",
            self.functions.len(),
            self.program.len()
        );
    }
}

/// Lowers a checked `ast` into an ILOC program.
///
/// # Panics
///
/// Panics on trees the type checker would have rejected.
pub fn compile(ast: &Ast, options: CompilerOptions) -> Program {
    let mut compiler = Compiler::new(ast, options);
    compiler.compile();
    compiler.program
}
