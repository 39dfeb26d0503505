use std::collections::HashMap;

use log::{debug, trace, warn};

use crate::{
    ast::{
        ast::{Ast, NodeId, NodeKind},
        expressions::VariableRef,
        statements::{Param, ShiftDirection},
        types::Type,
    },
    iloc::iloc::{Label, Op, Register, Relation},
};

use super::{
    compiler::{Compiler, CurrentFunction, FrameLayout, FunctionInfo, LoopLabels},
    expr::{gen_expression, gen_load, gen_store, storage_name},
    memory::Location,
};

pub fn gen_statement_list(compiler: &mut Compiler, first: Option<NodeId>) {
    let ast = compiler.ast;
    for node in ast.siblings(first) {
        gen_statement(compiler, node);
    }
}

pub fn gen_statement(compiler: &mut Compiler, node: NodeId) {
    let ast = compiler.ast;

    match ast.kind(node) {
        NodeKind::TypeDecl { identifier, fields } => {
            compiler.classes.insert(identifier.clone(), fields.clone());
        }
        NodeKind::GlobalVarDecl { ty, identifier, array_size, .. } => {
            let length = array_size.map_or(1, |size| size as i32);
            match ty {
                Type::Custom(class) => {
                    // Field-major: each field is its own run of `length` words.
                    for field in compiler.class_fields(class) {
                        let offset = compiler.allocate_global(length);
                        compiler
                            .memory
                            .bind(&format!("{}.{}", identifier, field.identifier), Location::global(offset));
                    }
                    compiler.memory.bind_record(identifier, class);
                }
                _ => {
                    let offset = compiler.allocate_global(length);
                    compiler.memory.bind(identifier, Location::global(offset));
                }
            }
            debug!("global `{}` reserved {} words", identifier, length);
        }
        NodeKind::FunctionDecl { identifier, params, body, .. } => {
            gen_function(compiler, identifier, params, *body);
        }
        NodeKind::LocalVarDecl { ty, identifier, init, .. } => match ty {
            Type::Custom(class) => {
                reserve_local(compiler, identifier, ty);
                if let Some(init) = init {
                    gen_record_copy(compiler, &VariableRef::named(identifier), *init, class);
                }
            }
            _ => {
                let offset = compiler.allocate_local();
                // Strings have no word representation; only the slot is reserved.
                let value = init
                    .filter(|init| !matches!(ast.kind(*init), NodeKind::Str(_)))
                    .map(|init| gen_expression(compiler, init));
                compiler.memory.bind(identifier, Location::local(offset));
                if let Some(value) = value {
                    compiler
                        .emit(Op::StoreAI(value, Register::RFP, offset))
                        .comment(identifier.as_str());
                }
            }
        },
        NodeKind::Assign { target, value } => {
            if target.field.is_none() {
                if let Some(class) = compiler.memory.record_class(&target.identifier) {
                    let class = class.to_string();
                    gen_record_copy(compiler, target, *value, &class);
                    return;
                }
            }
            if matches!(ast.kind(*value), NodeKind::Str(_)) {
                trace!("string assigned to `{}` is not stored", storage_name(target));
                return;
            }
            let value = gen_expression(compiler, *value);
            gen_store(compiler, target, value);
        }
        NodeKind::Shift { direction, target, value } => gen_shift(compiler, *direction, target, *value),
        NodeKind::Return { value } => {
            let value = gen_expression(compiler, *value);
            let current = compiler
                .current_function
                .clone()
                .unwrap_or_else(|| panic!("return outside of a function"));
            if !current.is_main {
                compiler
                    .emit(Op::StoreAI(value, Register::RFP, 0))
                    .comment("return value");
            }
            compiler.emit(Op::JumpI(current.return_label));
        }
        NodeKind::Input { value } => {
            let comment = match ast.kind(*value) {
                NodeKind::Variable(var) => format!("input {}", storage_name(var)),
                _ => "input".to_string(),
            };
            compiler.emit(Op::Nop).comment(comment);
        }
        NodeKind::Output { values } => {
            for value in ast.siblings(*values) {
                if !matches!(ast.kind(value), NodeKind::Str(_)) {
                    gen_expression(compiler, value);
                }
            }
        }
        NodeKind::Break => match compiler.loops.last().map(|labels| labels.break_label) {
            Some(target) => {
                compiler.emit(Op::JumpI(target)).comment("break");
            }
            None => warn!("ignoring break outside of a loop or switch"),
        },
        NodeKind::Continue => {
            match compiler.loops.iter().rev().find_map(|labels| labels.continue_label) {
                Some(target) => {
                    compiler.emit(Op::JumpI(target)).comment("continue");
                }
                None => warn!("ignoring continue outside of a loop"),
            }
        }
        NodeKind::Case(value) => {
            match compiler.cases.last().and_then(|cases| cases.get(&node)).copied() {
                Some(label) => {
                    compiler.emit_label(label).comment(format!("case {}", value));
                }
                None => warn!("ignoring case {} outside of a switch", value),
            }
        }
        NodeKind::Block { body } => gen_statement_list(compiler, *body),
        NodeKind::If { cond, then, otherwise } => {
            let cond = gen_expression(compiler, *cond);
            let then_label = compiler.new_label();
            let else_label = compiler.new_label();
            let end_label = compiler.new_label();
            compiler.emit(Op::Cbr(cond, then_label, else_label));

            compiler.emit_label(then_label);
            gen_statement_list(compiler, *then);
            compiler.emit(Op::JumpI(end_label));

            compiler.emit_label(else_label);
            gen_statement_list(compiler, *otherwise);

            compiler.emit_label(end_label);
        }
        NodeKind::While { cond, body } => {
            let test_label = compiler.new_label();
            let body_label = compiler.new_label();
            let end_label = compiler.new_label();

            compiler.emit_label(test_label).comment("while");
            let cond = gen_expression(compiler, *cond);
            compiler.emit(Op::Cbr(cond, body_label, end_label));

            compiler.emit_label(body_label);
            gen_loop_body(compiler, *body, Some(test_label), end_label);
            compiler.emit(Op::JumpI(test_label));

            compiler.emit_label(end_label);
        }
        NodeKind::DoWhile { cond, body } => {
            let body_label = compiler.new_label();
            let test_label = compiler.new_label();
            let end_label = compiler.new_label();

            compiler.emit_label(body_label).comment("do");
            gen_loop_body(compiler, *body, Some(test_label), end_label);

            compiler.emit_label(test_label);
            let cond = gen_expression(compiler, *cond);
            compiler.emit(Op::Cbr(cond, body_label, end_label));

            compiler.emit_label(end_label);
        }
        NodeKind::For { initializers, condition, commands, body } => {
            gen_statement_list(compiler, *initializers);
            let test_label = compiler.new_label();
            let body_label = compiler.new_label();
            let step_label = compiler.new_label();
            let end_label = compiler.new_label();

            compiler.emit_label(test_label).comment("for");
            let cond = gen_expression(compiler, *condition);
            compiler.emit(Op::Cbr(cond, body_label, end_label));

            compiler.emit_label(body_label);
            gen_loop_body(compiler, *body, Some(step_label), end_label);

            compiler.emit_label(step_label);
            gen_statement_list(compiler, *commands);
            compiler.emit(Op::JumpI(test_label));

            compiler.emit_label(end_label);
        }
        NodeKind::ForEach { identifier, expressions, body } => {
            let end_label = compiler.new_label();
            compiler.memory.push_frame();
            let offset = compiler.allocate_local();
            compiler.memory.bind(identifier, Location::local(offset));

            // The body is replicated once per listed value.
            for expression in ast.siblings(*expressions) {
                let value = gen_expression(compiler, expression);
                compiler
                    .emit(Op::StoreAI(value, Register::RFP, offset))
                    .comment(identifier.as_str());
                let next_label = compiler.new_label();
                gen_loop_body(compiler, *body, Some(next_label), end_label);
                compiler.emit_label(next_label);
            }

            compiler.emit_label(end_label);
            compiler.memory.pop_frame();
        }
        NodeKind::Switch { expression, body } => gen_switch(compiler, *expression, *body),
        NodeKind::Int(_)
        | NodeKind::Float(_)
        | NodeKind::Bool(_)
        | NodeKind::Char(_)
        | NodeKind::Str(_)
        | NodeKind::Variable(_)
        | NodeKind::Dot
        | NodeKind::BinOp { .. }
        | NodeKind::UnOp { .. }
        | NodeKind::TernOp { .. }
        | NodeKind::FunctionCall { .. } => {
            gen_expression(compiler, node);
        }
    }
}

fn gen_loop_body(
    compiler: &mut Compiler,
    body: Option<NodeId>,
    continue_label: Option<Label>,
    break_label: Label,
) {
    compiler.loops.push(LoopLabels {
        continue_label,
        break_label,
    });
    gen_statement_list(compiler, body);
    compiler.loops.pop();
}

/// Reserves stack words for a local: one per field for a record, one
/// otherwise.
fn reserve_local(compiler: &mut Compiler, identifier: &str, ty: &Type) {
    match ty {
        Type::Custom(class) => {
            for field in compiler.class_fields(class) {
                let offset = compiler.allocate_local();
                compiler
                    .memory
                    .bind(&format!("{}.{}", identifier, field.identifier), Location::local(offset));
            }
            compiler.memory.bind_record(identifier, class);
        }
        _ => {
            let offset = compiler.allocate_local();
            compiler.memory.bind(identifier, Location::local(offset));
        }
    }
}

/// Number of frame words the parameters occupy.
fn param_words(compiler: &Compiler, params: &[Param]) -> usize {
    params
        .iter()
        .map(|param| match &param.ty {
            Type::Custom(class) => compiler.class_fields(class).len(),
            _ => 1,
        })
        .sum()
}

/// Binds each parameter to its frame words, field by field for records.
fn bind_params(compiler: &mut Compiler, params: &[Param], layout: FrameLayout) {
    let mut word = 0;
    for param in params {
        match &param.ty {
            Type::Custom(class) => {
                for field in compiler.class_fields(class) {
                    compiler.memory.bind(
                        &format!("{}.{}", param.identifier, field.identifier),
                        Location::local(layout.param(word)),
                    );
                    word += 1;
                }
                compiler.memory.bind_record(&param.identifier, class);
            }
            _ => {
                compiler
                    .memory
                    .bind(&param.identifier, Location::local(layout.param(word)));
                word += 1;
            }
        }
    }
}

/// Lowers a function declaration. `main` runs in the frame set up by the
/// preamble and ends in `halt`; every other function gets the entry and
/// exit sequences around its body.
fn gen_function(compiler: &mut Compiler, identifier: &str, params: &[Param], body: Option<NodeId>) {
    debug!("lowering function `{}`", identifier);
    let label = compiler.new_label();
    let layout = FrameLayout::new(param_words(compiler, params));
    compiler
        .functions
        .insert(identifier.to_string(), FunctionInfo { label, layout });
    compiler.memory.push_frame();

    if identifier == "main" {
        compiler.patch_entry(label);
        compiler.emit_label(label).comment("main");
        compiler.reset_locals(0);
        // Nothing calls main, so its parameters are plain locals.
        for param in params {
            reserve_local(compiler, &param.identifier, &param.ty);
        }

        let end_label = compiler.new_label();
        compiler.current_function = Some(CurrentFunction {
            name: identifier.to_string(),
            is_main: true,
            return_label: end_label,
        });
        gen_statement_list(compiler, body);
        compiler.emit(Op::Halt).label(end_label);
    } else {
        compiler.emit_label(label).comment(identifier);

        let caller_frame = compiler.new_register();
        compiler.emit(Op::I2I(Register::RFP, caller_frame));
        compiler.emit(Op::I2I(Register::RSP, Register::RFP));
        compiler
            .emit(Op::StoreAI(caller_frame, Register::RFP, layout.dynamic_link()))
            .comment("dynamic link");
        let static_link = compiler.new_register();
        compiler.emit(Op::LoadI(0, static_link));
        compiler
            .emit(Op::StoreAI(static_link, Register::RFP, layout.static_link()))
            .comment("static link");
        compiler.emit(Op::AddI(Register::RSP, layout.locals_start(), Register::RSP));

        bind_params(compiler, params, layout);
        compiler.reset_locals(layout.locals_start());

        let return_label = compiler.new_label();
        compiler.current_function = Some(CurrentFunction {
            name: identifier.to_string(),
            is_main: false,
            return_label,
        });
        gen_statement_list(compiler, body);

        compiler
            .emit_label(return_label)
            .comment(format!("return from {}", identifier));
        let return_address = compiler.new_register();
        compiler.emit(Op::LoadAI(Register::RFP, layout.return_address(), return_address));
        let dynamic_link = compiler.new_register();
        compiler.emit(Op::LoadAI(Register::RFP, layout.dynamic_link(), dynamic_link));
        compiler.emit(Op::I2I(dynamic_link, Register::RFP));
        compiler.emit(Op::I2I(Register::RFP, Register::RSP));
        compiler.emit(Op::Jump(return_address));
    }

    trace!("leaving function `{}`", identifier);
    compiler.current_function = None;
    compiler.memory.pop_frame();
}

/// Copies every field of the record named by `source` into `target`.
fn gen_record_copy(compiler: &mut Compiler, target: &VariableRef, source: NodeId, class: &str) {
    let ast = compiler.ast;
    let NodeKind::Variable(source) = ast.kind(source) else {
        panic!("a `{}` record can only be copied from a variable", class);
    };

    for field in compiler.class_fields(class) {
        let from = VariableRef {
            field: Some(field.identifier.clone()),
            ..source.clone()
        };
        let to = VariableRef {
            field: Some(field.identifier.clone()),
            ..target.clone()
        };
        let value = gen_load(compiler, &from);
        gen_store(compiler, &to, value);
    }
}

/// `a << n` doubles `a` n times, `a >> n` halves it.
fn gen_shift(compiler: &mut Compiler, direction: ShiftDirection, target: &VariableRef, amount: NodeId) {
    let current = gen_load(compiler, target);
    let amount = gen_expression(compiler, amount);
    let count = compiler.new_register();
    compiler.emit(Op::I2I(amount, count));
    let two = compiler.new_register();
    compiler.emit(Op::LoadI(2, two));
    let zero = compiler.new_register();
    compiler.emit(Op::LoadI(0, zero));

    let test_label = compiler.new_label();
    let body_label = compiler.new_label();
    let end_label = compiler.new_label();

    compiler.emit_label(test_label).comment("shift");
    let more = compiler.new_register();
    compiler.emit(Op::Cmp(Relation::Greater, count, zero, more));
    compiler.emit(Op::Cbr(more, body_label, end_label));

    compiler.emit_label(body_label);
    match direction {
        ShiftDirection::Left => compiler.emit(Op::Mult(current, two, current)),
        ShiftDirection::Right => compiler.emit(Op::Div(current, two, current)),
    };
    compiler.emit(Op::AddI(count, -1, count));
    compiler.emit(Op::JumpI(test_label));

    compiler.emit_label(end_label);
    gen_store(compiler, target, current);
}

/// `case` markers of a switch body in source order. Nested switches own
/// their markers, and for-each bodies are replicated, so neither is
/// searched.
fn collect_cases(ast: &Ast, first: Option<NodeId>, cases: &mut Vec<(NodeId, i32)>) {
    for node in ast.siblings(first) {
        match ast.kind(node) {
            NodeKind::Case(value) => cases.push((node, *value)),
            NodeKind::Block { body }
            | NodeKind::While { body, .. }
            | NodeKind::DoWhile { body, .. }
            | NodeKind::For { body, .. } => collect_cases(ast, *body, cases),
            NodeKind::If { then, otherwise, .. } => {
                collect_cases(ast, *then, cases);
                collect_cases(ast, *otherwise, cases);
            }
            _ => {}
        }
    }
}

/// Compares the switch value against each `case` in turn; the first
/// match jumps to that marker's label, no match jumps past the body.
fn gen_switch(compiler: &mut Compiler, expression: NodeId, body: Option<NodeId>) {
    let ast = compiler.ast;
    let value = gen_expression(compiler, expression);
    let end_label = compiler.new_label();

    let mut markers = vec![];
    collect_cases(ast, body, &mut markers);
    let cases: Vec<(NodeId, i32, Label)> = markers
        .into_iter()
        .map(|(node, case)| (node, case, compiler.new_label()))
        .collect();

    for (_, case, label) in &cases {
        let constant = compiler.new_register();
        compiler.emit(Op::LoadI(*case, constant));
        let matched = compiler.new_register();
        compiler.emit(Op::Cmp(Relation::Equal, value, constant, matched));
        let next_label = compiler.new_label();
        compiler.emit(Op::Cbr(matched, *label, next_label));
        compiler.emit_label(next_label);
    }
    compiler.emit(Op::JumpI(end_label));

    let labels: HashMap<NodeId, Label> = cases.into_iter().map(|(node, _, label)| (node, label)).collect();
    compiler.cases.push(labels);
    gen_loop_body(compiler, body, None, end_label);
    compiler.cases.pop();

    compiler.emit_label(end_label);
}
