use crate::{
    ast::{
        ast::{NodeId, NodeKind},
        expressions::{BinOp, UnOp, VariableRef},
        types::TypeKind,
    },
    iloc::iloc::{Op, Register, Relation},
};

use super::compiler::{Compiler, WORD};

/// Name of the memory entry a variable reference resolves to.
pub fn storage_name(var: &VariableRef) -> String {
    match &var.field {
        Some(field) => format!("{}.{}", var.identifier, field),
        None => var.identifier.clone(),
    }
}

/// Lowers `node` and returns the register holding its value.
///
/// Values stamped as booleans by the checker are normalized to 0 or 1.
pub fn gen_expression(compiler: &mut Compiler, node: NodeId) -> Register {
    let value = gen_value(compiler, node);
    match compiler.ast.coerced_to(node) {
        Some(TypeKind::Bool) => gen_normalize_bool(compiler, value),
        _ => value,
    }
}

fn gen_normalize_bool(compiler: &mut Compiler, value: Register) -> Register {
    let zero = compiler.new_register();
    compiler.emit(Op::LoadI(0, zero));
    let result = compiler.new_register();
    compiler.emit(Op::Cmp(Relation::NotEqual, value, zero, result));
    result
}

fn gen_value(compiler: &mut Compiler, node: NodeId) -> Register {
    let ast = compiler.ast;

    match ast.kind(node) {
        NodeKind::Int(value) => gen_constant(compiler, *value),
        // Truncated toward zero; the machine has no float registers.
        NodeKind::Float(value) => gen_constant(compiler, *value as i32),
        NodeKind::Bool(value) => gen_constant(compiler, *value as i32),
        NodeKind::Char(value) => gen_constant(compiler, *value as i32),
        NodeKind::Str(value) => panic!("string literal {:?} has no word representation", value),
        NodeKind::Variable(var) => gen_load(compiler, var),
        NodeKind::Dot => {
            let dot = compiler
                .dot
                .unwrap_or_else(|| panic!("pipe placeholder used outside of a pipe"));
            let result = compiler.new_register();
            compiler.emit(Op::I2I(dot, result));
            result
        }
        NodeKind::BinOp { op, left, right } => gen_binary(compiler, *op, *left, *right),
        NodeKind::UnOp { op, value } => gen_unary(compiler, *op, *value),
        NodeKind::TernOp { cond, then, otherwise } => {
            let result = gen_expression(compiler, *cond);
            let then_label = compiler.new_label();
            let else_label = compiler.new_label();
            let end_label = compiler.new_label();
            compiler.emit(Op::Cbr(result, then_label, else_label));

            compiler.emit_label(then_label);
            let then_value = gen_expression(compiler, *then);
            compiler.emit(Op::I2I(then_value, result));
            compiler.emit(Op::JumpI(end_label));

            compiler.emit_label(else_label);
            let else_value = gen_expression(compiler, *otherwise);
            compiler.emit(Op::I2I(else_value, result));

            compiler.emit_label(end_label);
            let converged = compiler.new_register();
            compiler.emit(Op::I2I(result, converged));
            converged
        }
        NodeKind::FunctionCall { identifier, arguments } => gen_call(compiler, identifier, *arguments),
        NodeKind::TypeDecl { .. }
        | NodeKind::GlobalVarDecl { .. }
        | NodeKind::FunctionDecl { .. }
        | NodeKind::LocalVarDecl { .. }
        | NodeKind::Assign { .. }
        | NodeKind::Shift { .. }
        | NodeKind::Return { .. }
        | NodeKind::Input { .. }
        | NodeKind::Output { .. }
        | NodeKind::Break
        | NodeKind::Continue
        | NodeKind::Case(_)
        | NodeKind::Block { .. }
        | NodeKind::If { .. }
        | NodeKind::While { .. }
        | NodeKind::DoWhile { .. }
        | NodeKind::Switch { .. }
        | NodeKind::For { .. }
        | NodeKind::ForEach { .. } => {
            panic!("{} is a command, not an expression", ast.kind(node).name())
        }
    }
}

fn gen_constant(compiler: &mut Compiler, value: i32) -> Register {
    let result = compiler.new_register();
    compiler.emit(Op::LoadI(value, result));
    result
}

/// Base register and offset of the word `var` refers to. Indexed
/// accesses compute `base + 4 * index` into a fresh register.
pub fn gen_address(compiler: &mut Compiler, var: &VariableRef) -> (Register, i32) {
    let location = compiler.memory.location(&storage_name(var));

    match var.index {
        None => (location.base, location.offset),
        Some(index) => {
            let index = gen_expression(compiler, index);
            let width = compiler.new_register();
            compiler.emit(Op::LoadI(WORD, width));
            let scaled = compiler.new_register();
            compiler.emit(Op::Mult(index, width, scaled));
            let address = compiler.new_register();
            compiler.emit(Op::Add(scaled, location.base, address));
            (address, location.offset)
        }
    }
}

pub fn gen_load(compiler: &mut Compiler, var: &VariableRef) -> Register {
    let (base, offset) = gen_address(compiler, var);
    let result = compiler.new_register();
    compiler.emit(Op::LoadAI(base, offset, result)).comment(storage_name(var));
    result
}

pub fn gen_store(compiler: &mut Compiler, var: &VariableRef, value: Register) {
    let (base, offset) = gen_address(compiler, var);
    compiler.emit(Op::StoreAI(value, base, offset)).comment(storage_name(var));
}

fn relation(op: BinOp) -> Option<Relation> {
    match op {
        BinOp::Equal => Some(Relation::Equal),
        BinOp::NotEqual => Some(Relation::NotEqual),
        BinOp::Less => Some(Relation::Less),
        BinOp::LessEqual => Some(Relation::LessEqual),
        BinOp::Greater => Some(Relation::Greater),
        BinOp::GreaterEqual => Some(Relation::GreaterEqual),
        _ => None,
    }
}

fn gen_binary(compiler: &mut Compiler, op: BinOp, left: NodeId, right: NodeId) -> Register {
    match op {
        BinOp::And | BinOp::Or => return gen_short_circuit(compiler, op, left, right),
        BinOp::BashPipe | BinOp::ForwardPipe => {
            let piped = gen_expression(compiler, left);
            let outer = compiler.dot.replace(piped);
            let result = gen_expression(compiler, right);
            compiler.dot = outer;
            return result;
        }
        _ => {}
    }

    let left = gen_expression(compiler, left);
    let right = gen_expression(compiler, right);

    if let Some(relation) = relation(op) {
        let result = compiler.new_register();
        compiler.emit(Op::Cmp(relation, left, right, result));
        return result;
    }

    match op {
        BinOp::Add => gen_arithmetic(compiler, Op::Add, left, right),
        BinOp::Subtract => gen_arithmetic(compiler, Op::Sub, left, right),
        BinOp::Multiply => gen_arithmetic(compiler, Op::Mult, left, right),
        BinOp::Divide => gen_arithmetic(compiler, Op::Div, left, right),
        BinOp::Modulo => {
            // a - (a / b) * b
            let quotient = gen_arithmetic(compiler, Op::Div, left, right);
            let product = gen_arithmetic(compiler, Op::Mult, quotient, right);
            gen_arithmetic(compiler, Op::Sub, left, product)
        }
        BinOp::Pow => gen_pow(compiler, left, right),
        BinOp::BitAnd => {
            let left = gen_normalize_bool(compiler, left);
            let right = gen_normalize_bool(compiler, right);
            gen_arithmetic(compiler, Op::Mult, left, right)
        }
        BinOp::BitOr => {
            let left = gen_normalize_bool(compiler, left);
            let right = gen_normalize_bool(compiler, right);
            let sum = gen_arithmetic(compiler, Op::Add, left, right);
            gen_normalize_bool(compiler, sum)
        }
        BinOp::Greater
        | BinOp::Less
        | BinOp::GreaterEqual
        | BinOp::LessEqual
        | BinOp::Equal
        | BinOp::NotEqual
        | BinOp::And
        | BinOp::Or
        | BinOp::BashPipe
        | BinOp::ForwardPipe => unreachable!("{:?} is lowered above", op),
    }
}

fn gen_arithmetic(
    compiler: &mut Compiler,
    op: fn(Register, Register, Register) -> Op,
    left: Register,
    right: Register,
) -> Register {
    let result = compiler.new_register();
    compiler.emit(op(left, right, result));
    result
}

/// Multiplies `base` into an accumulator `exponent` times.
fn gen_pow(compiler: &mut Compiler, base: Register, exponent: Register) -> Register {
    let result = gen_constant(compiler, 1);
    let count = compiler.new_register();
    compiler.emit(Op::I2I(exponent, count));
    let zero = gen_constant(compiler, 0);

    let test_label = compiler.new_label();
    let body_label = compiler.new_label();
    let end_label = compiler.new_label();

    compiler.emit_label(test_label).comment("pow");
    let more = compiler.new_register();
    compiler.emit(Op::Cmp(Relation::Greater, count, zero, more));
    compiler.emit(Op::Cbr(more, body_label, end_label));

    compiler.emit_label(body_label);
    compiler.emit(Op::Mult(result, base, result));
    compiler.emit(Op::AddI(count, -1, count));
    compiler.emit(Op::JumpI(test_label));

    compiler.emit_label(end_label);
    result
}

/// `&&` skips the right operand when the left is false, `||` when it is
/// true. Both paths leave the value in the left register, which is then
/// moved into a fresh one.
fn gen_short_circuit(compiler: &mut Compiler, op: BinOp, left: NodeId, right: NodeId) -> Register {
    let result = gen_expression(compiler, left);
    let eval_label = compiler.new_label();
    let skip_label = compiler.new_label();

    match op {
        BinOp::And => compiler.emit(Op::Cbr(result, eval_label, skip_label)),
        _ => compiler.emit(Op::Cbr(result, skip_label, eval_label)),
    };

    compiler.emit_label(eval_label);
    let right = gen_expression(compiler, right);
    compiler.emit(Op::I2I(right, result));

    compiler.emit_label(skip_label);
    let converged = compiler.new_register();
    compiler.emit(Op::I2I(result, converged));
    converged
}

fn gen_unary(compiler: &mut Compiler, op: UnOp, value: NodeId) -> Register {
    let value = gen_expression(compiler, value);

    match op {
        UnOp::Not => {
            let true_label = compiler.new_label();
            let false_label = compiler.new_label();
            let end_label = compiler.new_label();
            let result = compiler.new_register();
            compiler.emit(Op::Cbr(value, true_label, false_label));

            compiler.emit_label(true_label);
            compiler.emit(Op::Cmp(Relation::NotEqual, value, value, result));
            compiler.emit(Op::JumpI(end_label));

            compiler.emit_label(false_label);
            compiler.emit(Op::Cmp(Relation::Equal, value, value, result));

            compiler.emit_label(end_label);
            result
        }
        UnOp::Minus => {
            let result = compiler.new_register();
            compiler.emit(Op::RSubI(value, 0, result));
            result
        }
        UnOp::Plus => {
            let result = compiler.new_register();
            compiler.emit(Op::I2I(value, result));
            result
        }
        UnOp::EvalBool => gen_normalize_bool(compiler, value),
        UnOp::Address | UnOp::Value | UnOp::Hash => {
            panic!("{:?} is rejected by the type checker", op)
        }
    }
}

/// Caller side of a call: reserve the return slot, push the arguments and
/// the return address, jump, then read the returned value. A record
/// argument is pushed one field at a time.
pub fn gen_call(compiler: &mut Compiler, identifier: &str, arguments: Option<NodeId>) -> Register {
    let ast = compiler.ast;
    let function = compiler.function(identifier);

    let frame = compiler.new_register();
    compiler
        .emit(Op::I2I(Register::RSP, frame))
        .comment(format!("call {}", identifier));
    compiler.emit(Op::AddI(Register::RSP, WORD, Register::RSP));

    for argument in ast.siblings(arguments) {
        let values = match record_argument(compiler, argument) {
            Some((source, class)) => compiler
                .class_fields(&class)
                .into_iter()
                .map(|field| {
                    let from = VariableRef {
                        field: Some(field.identifier),
                        ..source.clone()
                    };
                    gen_load(compiler, &from)
                })
                .collect(),
            None => vec![gen_expression(compiler, argument)],
        };
        for value in values {
            compiler.emit(Op::StoreAI(value, Register::RSP, 0));
            compiler.emit(Op::AddI(Register::RSP, WORD, Register::RSP));
        }
    }

    let return_address = compiler.new_register();
    let offset = compiler.options.return_address_offset;
    compiler.emit(Op::AddI(Register::RPC, offset, return_address));
    compiler
        .emit(Op::StoreAI(return_address, Register::RSP, 0))
        .comment("return address");
    compiler.emit(Op::I2I(frame, Register::RSP));
    compiler.emit(Op::JumpI(function.label));

    let result = compiler.new_register();
    compiler
        .emit(Op::LoadAI(Register::RSP, 0, result))
        .comment(format!("value of {}", identifier));
    result
}

/// The variable and class of an argument naming a whole record.
fn record_argument(compiler: &Compiler, argument: NodeId) -> Option<(VariableRef, String)> {
    match compiler.ast.kind(argument) {
        NodeKind::Variable(var) if var.field.is_none() => compiler
            .memory
            .record_class(&var.identifier)
            .map(|class| (var.clone(), class.to_string())),
        _ => None,
    }
}
