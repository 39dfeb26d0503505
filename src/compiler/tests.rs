//! Unit tests for code generation.

use std::collections::HashSet;

use proptest::prelude::*;

use crate::{
    ast::{
        ast::{Ast, NodeId, NodeKind},
        expressions::{BinOp, UnOp, VariableRef},
        statements::{Field, Param, ShiftDirection},
        types::Type,
    },
    compile_program,
    iloc::iloc::{Label, Op, Program, Register},
};

use super::compiler::{compile, Compiler, CompilerOptions, FrameLayout};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn function(ast: &mut Ast, ty: Type, identifier: &str, params: Vec<Param>, body: &[NodeId]) -> NodeId {
    let body = ast.chain(body);
    ast.add(NodeKind::FunctionDecl {
        ty,
        identifier: identifier.to_string(),
        is_static: false,
        params,
        body,
    })
}

fn output(ast: &mut Ast, value: NodeId) -> NodeId {
    ast.add(NodeKind::Output { values: Some(value) })
}

fn local(ast: &mut Ast, ty: Type, identifier: &str, init: Option<NodeId>) -> NodeId {
    ast.add(NodeKind::LocalVarDecl {
        ty,
        identifier: identifier.to_string(),
        is_static: false,
        is_const: false,
        init,
    })
}

fn global(ast: &mut Ast, ty: Type, identifier: &str, array_size: Option<u32>) -> NodeId {
    ast.add(NodeKind::GlobalVarDecl {
        ty,
        identifier: identifier.to_string(),
        is_static: false,
        array_size,
    })
}

/// Wraps `body` in `int main()` and lowers the unit without checking it.
fn lower_main(mut ast: Ast, before: &[NodeId], body: &[NodeId]) -> Program {
    init();
    let main = function(&mut ast, Type::Int, "main", vec![], body);
    let mut top_level = before.to_vec();
    top_level.push(main);
    let root = ast.chain(&top_level);
    compile(&ast.with_root(root), CompilerOptions::default())
}

/// Like `lower_main`, but through the checker first.
fn check_and_lower_main(mut ast: Ast, before: &[NodeId], params: Vec<Param>, body: &[NodeId]) -> Program {
    init();
    let main = function(&mut ast, Type::Int, "main", params, body);
    let mut top_level = before.to_vec();
    top_level.push(main);
    let root = ast.chain(&top_level);
    compile_program(&ast.with_root(root), CompilerOptions::default()).unwrap()
}

/// Every label is defined once and every branch target is defined.
fn assert_labels_consistent(program: &Program) {
    let mut defined = HashSet::new();
    for instruction in program {
        if let Some(label) = instruction.label {
            assert!(defined.insert(label), "label {} defined twice", label);
        }
    }
    for instruction in program {
        for target in instruction.op.targets() {
            assert!(defined.contains(&target), "branch target {} is never defined", target);
        }
    }
}

fn lines(program: &Program) -> Vec<String> {
    program.iter().map(|instruction| instruction.to_string()).collect()
}

/// Listing after the four preamble instructions.
fn body_lines(program: &Program) -> Vec<String> {
    lines(program).split_off(4)
}

fn label_with_comment(program: &Program, comment: &str) -> Label {
    program
        .iter()
        .filter(|instruction| instruction.comment.as_deref() == Some(comment))
        .find_map(|instruction| instruction.label)
        .unwrap()
}

#[test]
fn test_frame_layout_two_params() {
    let layout = FrameLayout::new(2);

    assert_eq!(layout.return_value(), 0);
    assert_eq!(layout.param(0), 4);
    assert_eq!(layout.param(1), 8);
    assert_eq!(layout.return_address(), 12);
    assert_eq!(layout.dynamic_link(), 16);
    assert_eq!(layout.static_link(), 20);
    assert_eq!(layout.locals_start(), 24);
}

#[test]
fn test_frame_layout_no_params() {
    let layout = FrameLayout::new(0);

    assert_eq!(layout.param_count(), 0);
    assert_eq!(layout.return_address(), 4);
    assert_eq!(layout.locals_start(), 16);
}

#[test]
fn test_counters_never_repeat() {
    let ast = Ast::new();
    let mut compiler = Compiler::new(&ast, CompilerOptions::default());

    assert_eq!(compiler.new_register(), Register(1));
    assert_eq!(compiler.new_register(), Register(2));
    assert_eq!(compiler.new_label(), Label(0));
    assert_eq!(compiler.new_label(), Label(1));
    assert_eq!(compiler.new_register(), Register(3));
}

#[test]
fn test_preamble_jumps_to_main() {
    let program = lower_main(Ast::new(), &[], &[]);

    assert_eq!(
        lines(&program),
        vec![
            "loadI 1024 => rfp",
            "loadI 1024 => rsp",
            "loadI 0 => rbss",
            "jumpI -> L0 // main",
            "L0: nop // main",
            "L1: halt",
        ]
    );
}

#[test]
fn test_preamble_follows_options() {
    init();
    let ast = Ast::new();
    let options = CompilerOptions {
        stack_base: 2048,
        globals_base: 64,
        return_address_offset: 4,
    };
    let program = compile(&ast, options);

    assert_eq!(program.get(0).unwrap().op, Op::LoadI(2048, Register::RFP));
    assert_eq!(program.get(2).unwrap().op, Op::LoadI(64, Register::RBSS));
}

#[test]
fn test_unit_without_main_halts() {
    init();
    let mut ast = Ast::new();
    let g = global(&mut ast, Type::Int, "g", None);
    let root = ast.chain(&[g]);
    let program = compile(&ast.with_root(root), CompilerOptions::default());

    assert_eq!(body_lines(&program), vec!["L0: halt"]);
    assert_eq!(program.get(3).unwrap().op, Op::JumpI(Label(0)));
}

#[test]
fn test_literals() {
    let mut ast = Ast::new();
    let half = ast.add(NodeKind::Float(2.9));
    let negative = ast.add(NodeKind::Float(-2.9));
    let yes = ast.add(NodeKind::Bool(true));
    let letter = ast.add(NodeKind::Char('a'));
    let text = ast.add(NodeKind::Str("skipped".to_string()));
    let values = ast.chain(&[text, half, negative, yes, letter]);
    let out = ast.add(NodeKind::Output { values });
    let program = lower_main(ast, &[], &[out]);

    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // main",
            "loadI 2 => r1",
            "loadI -2 => r2",
            "loadI 1 => r3",
            "loadI 97 => r4",
            "L1: halt",
        ]
    );
}

#[test]
fn test_string_initializer_only_reserves_a_slot() {
    let mut ast = Ast::new();
    let text = ast.add(NodeKind::Str("hi".to_string()));
    let decl = local(&mut ast, Type::String, "s", Some(text));
    let again = ast.add(NodeKind::Str("again".to_string()));
    let assign = ast.add(NodeKind::Assign {
        target: VariableRef::named("s"),
        value: again,
    });
    let program = check_and_lower_main(ast, &[], vec![], &[decl, assign]);

    assert_eq!(
        body_lines(&program),
        vec!["L0: nop // main", "addI rsp, 4 => rsp", "L1: halt"]
    );
}

#[test]
#[should_panic(expected = "has no word representation")]
fn test_unchecked_string_operand_panics() {
    let mut ast = Ast::new();
    let left = ast.add(NodeKind::Str("a".to_string()));
    let right = ast.add(NodeKind::Str("b".to_string()));
    let same = ast.add(NodeKind::BinOp { op: BinOp::Equal, left, right });
    let out = output(&mut ast, same);
    lower_main(ast, &[], &[out]);
}

#[test]
fn test_main_parameters_are_locals() {
    let mut ast = Ast::new();
    let argc = ast.add(NodeKind::Variable(VariableRef::named("argc")));
    let out = output(&mut ast, argc);
    let program = check_and_lower_main(ast, &[], vec![Param::new(Type::Int, "argc")], &[out]);

    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // main",
            "addI rsp, 4 => rsp",
            "loadAI rfp, 0 => r1 // argc",
            "L1: halt",
        ]
    );
}

#[test]
fn test_record_parameter_is_passed_field_by_field() {
    let mut ast = Ast::new();
    let class = ast.add(NodeKind::TypeDecl {
        identifier: "P".to_string(),
        fields: vec![Field::new(Type::Int, "x"), Field::new(Type::Int, "y")],
    });
    let read_y = ast.add(NodeKind::Variable(VariableRef::field("p", "y")));
    let ret = ast.add(NodeKind::Return { value: read_y });
    let f = function(&mut ast, Type::Int, "f", vec![Param::new(Type::custom("P"), "p")], &[ret]);

    let q = local(&mut ast, Type::custom("P"), "q", None);
    let read_q = ast.add(NodeKind::Variable(VariableRef::named("q")));
    let call = ast.add(NodeKind::FunctionCall {
        identifier: "f".to_string(),
        arguments: Some(read_q),
    });
    let out = output(&mut ast, call);
    let program = check_and_lower_main(ast, &[class, f], vec![], &[q, out]);

    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // f",
            "i2i rfp => r1",
            "i2i rsp => rfp",
            "storeAI r1 => rfp, 16 // dynamic link",
            "loadI 0 => r2",
            "storeAI r2 => rfp, 20 // static link",
            "addI rsp, 24 => rsp",
            "loadAI rfp, 8 => r3 // p.y",
            "storeAI r3 => rfp, 0 // return value",
            "jumpI -> L1",
            "L1: nop // return from f",
            "loadAI rfp, 12 => r4",
            "loadAI rfp, 16 => r5",
            "i2i r5 => rfp",
            "i2i rfp => rsp",
            "jump -> r4",
            "L2: nop // main",
            "addI rsp, 4 => rsp",
            "addI rsp, 4 => rsp",
            "i2i rsp => r6 // call f",
            "addI rsp, 4 => rsp",
            "loadAI rfp, 0 => r7 // q.x",
            "loadAI rfp, 4 => r8 // q.y",
            "storeAI r7 => rsp, 0",
            "addI rsp, 4 => rsp",
            "storeAI r8 => rsp, 0",
            "addI rsp, 4 => rsp",
            "addI rpc, 4 => r9",
            "storeAI r9 => rsp, 0 // return address",
            "i2i r6 => rsp",
            "jumpI -> L0",
            "loadAI rsp, 0 => r10 // value of f",
            "L3: halt",
        ]
    );
}

#[test]
fn test_local_declarations_grow_the_stack() {
    let mut ast = Ast::new();
    let seven = ast.add(NodeKind::Int(7));
    let a = local(&mut ast, Type::Int, "a", Some(seven));
    let b = local(&mut ast, Type::Int, "b", None);
    let read_a = ast.add(NodeKind::Variable(VariableRef::named("a")));
    let assign = ast.add(NodeKind::Assign {
        target: VariableRef::named("b"),
        value: read_a,
    });
    let program = lower_main(ast, &[], &[a, b, assign]);

    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // main",
            "addI rsp, 4 => rsp",
            "loadI 7 => r1",
            "storeAI r1 => rfp, 0 // a",
            "addI rsp, 4 => rsp",
            "loadAI rfp, 0 => r2 // a",
            "storeAI r2 => rfp, 4 // b",
            "L1: halt",
        ]
    );
}

#[test]
fn test_unary_minus_and_not() {
    let mut ast = Ast::new();
    let five = ast.add(NodeKind::Int(5));
    let minus = ast.add(NodeKind::UnOp { op: UnOp::Minus, value: five });
    let yes = ast.add(NodeKind::Bool(true));
    let not = ast.add(NodeKind::UnOp { op: UnOp::Not, value: yes });
    let values = ast.chain(&[minus, not]);
    let out = ast.add(NodeKind::Output { values });
    let program = lower_main(ast, &[], &[out]);

    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // main",
            "loadI 5 => r1",
            "rsubI r1, 0 => r2",
            "loadI 1 => r3",
            "cbr r3 -> L2, L3",
            "L2: nop",
            "cmp_NE r3, r3 -> r4",
            "jumpI -> L4",
            "L3: nop",
            "cmp_EQ r3, r3 -> r4",
            "L4: nop",
            "L1: halt",
        ]
    );
}

#[test]
fn test_short_circuit_and_skips_call() {
    let mut ast = Ast::new();
    let yes = ast.add(NodeKind::Bool(true));
    let ret = ast.add(NodeKind::Return { value: yes });
    let f = function(&mut ast, Type::Bool, "f", vec![], &[ret]);

    let no = ast.add(NodeKind::Bool(false));
    let call = ast.add(NodeKind::FunctionCall {
        identifier: "f".to_string(),
        arguments: None,
    });
    let and = ast.add(NodeKind::BinOp { op: BinOp::And, left: no, right: call });
    let out = output(&mut ast, and);
    let program = lower_main(ast, &[f], &[out]);

    let f_label = label_with_comment(&program, "f");
    let main_start = program.position_of(label_with_comment(&program, "main")).unwrap();
    let (cbr_index, eval, skip) = program
        .iter()
        .enumerate()
        .skip(main_start)
        .find_map(|(index, instruction)| match instruction.op {
            Op::Cbr(_, eval, skip) => Some((index, eval, skip)),
            _ => None,
        })
        .unwrap();
    let call_index = program
        .iter()
        .position(|instruction| instruction.op == Op::JumpI(f_label))
        .unwrap();
    let eval_index = program.position_of(eval).unwrap();
    let skip_index = program.position_of(skip).unwrap();

    assert_eq!(eval_index, cbr_index + 1);
    assert!(eval_index < call_index);
    assert!(call_index < skip_index);
}

#[test]
fn test_short_circuit_or_branches_reversed() {
    let mut ast = Ast::new();
    let yes = ast.add(NodeKind::Bool(true));
    let no = ast.add(NodeKind::Bool(false));
    let or = ast.add(NodeKind::BinOp { op: BinOp::Or, left: yes, right: no });
    let out = output(&mut ast, or);
    let program = lower_main(ast, &[], &[out]);

    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // main",
            "loadI 1 => r1",
            "cbr r1 -> L3, L2",
            "L2: nop",
            "loadI 0 => r2",
            "i2i r2 => r1",
            "L3: nop",
            "i2i r1 => r3",
            "L1: halt",
        ]
    );
}

#[test]
fn test_modulo_expands() {
    let mut ast = Ast::new();
    let seven = ast.add(NodeKind::Int(7));
    let three = ast.add(NodeKind::Int(3));
    let modulo = ast.add(NodeKind::BinOp { op: BinOp::Modulo, left: seven, right: three });
    let out = output(&mut ast, modulo);
    let program = lower_main(ast, &[], &[out]);

    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // main",
            "loadI 7 => r1",
            "loadI 3 => r2",
            "div r1, r2 => r3",
            "mult r3, r2 => r4",
            "sub r1, r4 => r5",
            "L1: halt",
        ]
    );
}

#[test]
fn test_relational_comparison() {
    let mut ast = Ast::new();
    let one = ast.add(NodeKind::Int(1));
    let two = ast.add(NodeKind::Int(2));
    let less = ast.add(NodeKind::BinOp { op: BinOp::LessEqual, left: one, right: two });
    let out = output(&mut ast, less);
    let program = lower_main(ast, &[], &[out]);

    assert!(lines(&program).contains(&"cmp_LE r1, r2 -> r3".to_string()));
}

#[test]
fn test_call_and_function_frame() {
    let mut ast = Ast::new();
    let x = ast.add(NodeKind::Variable(VariableRef::named("x")));
    let y = ast.add(NodeKind::Variable(VariableRef::named("y")));
    let sum = ast.add(NodeKind::BinOp { op: BinOp::Add, left: x, right: y });
    let ret = ast.add(NodeKind::Return { value: sum });
    let add = function(
        &mut ast,
        Type::Int,
        "add",
        vec![Param::new(Type::Int, "x"), Param::new(Type::Int, "y")],
        &[ret],
    );

    let one = ast.add(NodeKind::Int(1));
    let two = ast.add(NodeKind::Int(2));
    let arguments = ast.chain(&[one, two]);
    let call = ast.add(NodeKind::FunctionCall {
        identifier: "add".to_string(),
        arguments,
    });
    let out = output(&mut ast, call);
    let program = lower_main(ast, &[add], &[out]);

    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // add",
            "i2i rfp => r1",
            "i2i rsp => rfp",
            "storeAI r1 => rfp, 16 // dynamic link",
            "loadI 0 => r2",
            "storeAI r2 => rfp, 20 // static link",
            "addI rsp, 24 => rsp",
            "loadAI rfp, 4 => r3 // x",
            "loadAI rfp, 8 => r4 // y",
            "add r3, r4 => r5",
            "storeAI r5 => rfp, 0 // return value",
            "jumpI -> L1",
            "L1: nop // return from add",
            "loadAI rfp, 12 => r6",
            "loadAI rfp, 16 => r7",
            "i2i r7 => rfp",
            "i2i rfp => rsp",
            "jump -> r6",
            "L2: nop // main",
            "i2i rsp => r8 // call add",
            "addI rsp, 4 => rsp",
            "loadI 1 => r9",
            "storeAI r9 => rsp, 0",
            "addI rsp, 4 => rsp",
            "loadI 2 => r10",
            "storeAI r10 => rsp, 0",
            "addI rsp, 4 => rsp",
            "addI rpc, 4 => r11",
            "storeAI r11 => rsp, 0 // return address",
            "i2i r8 => rsp",
            "jumpI -> L0",
            "loadAI rsp, 0 => r12 // value of add",
            "L3: halt",
        ]
    );
    assert_eq!(program.get(3).unwrap().op, Op::JumpI(Label(2)));
}

#[test]
fn test_return_in_main_jumps_to_halt() {
    let mut ast = Ast::new();
    let zero = ast.add(NodeKind::Int(0));
    let ret = ast.add(NodeKind::Return { value: zero });
    let program = lower_main(ast, &[], &[ret]);

    assert_eq!(
        body_lines(&program),
        vec!["L0: nop // main", "loadI 0 => r1", "jumpI -> L1", "L1: halt"]
    );
}

#[test]
fn test_if_always_has_else_label() {
    let mut ast = Ast::new();
    let yes = ast.add(NodeKind::Bool(true));
    let one = ast.add(NodeKind::Int(1));
    let out = output(&mut ast, one);
    let cond = ast.add(NodeKind::If {
        cond: yes,
        then: Some(out),
        otherwise: None,
    });
    let program = lower_main(ast, &[], &[cond]);

    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // main",
            "loadI 1 => r1",
            "cbr r1 -> L2, L3",
            "L2: nop",
            "loadI 1 => r2",
            "jumpI -> L4",
            "L3: nop",
            "L4: nop",
            "L1: halt",
        ]
    );
}

#[test]
fn test_while_with_coerced_condition() {
    init();
    let mut ast = Ast::new();
    let one = ast.add(NodeKind::Int(1));
    let stop = ast.add(NodeKind::Break);
    let cond = ast.add(NodeKind::While { cond: one, body: Some(stop) });
    let main = function(&mut ast, Type::Int, "main", vec![], &[cond]);
    let root = ast.chain(&[main]);
    let program = compile_program(&ast.with_root(root), CompilerOptions::default()).unwrap();

    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // main",
            "L2: nop // while",
            "loadI 1 => r1",
            "loadI 0 => r2",
            "cmp_NE r1, r2 -> r3",
            "cbr r3 -> L3, L4",
            "L3: nop",
            "jumpI -> L4 // break",
            "jumpI -> L2",
            "L4: nop",
            "L1: halt",
        ]
    );
}

#[test]
fn test_do_while_and_continue() {
    let mut ast = Ast::new();
    let again = ast.add(NodeKind::Continue);
    let no = ast.add(NodeKind::Bool(false));
    let loop_ = ast.add(NodeKind::DoWhile { cond: no, body: Some(again) });
    let program = lower_main(ast, &[], &[loop_]);

    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // main",
            "L2: nop // do",
            "jumpI -> L3 // continue",
            "L3: nop",
            "loadI 0 => r1",
            "cbr r1 -> L2, L4",
            "L4: nop",
            "L1: halt",
        ]
    );
}

#[test]
fn test_for_loop_continue_runs_commands() {
    let mut ast = Ast::new();
    let zero = ast.add(NodeKind::Int(0));
    let i = local(&mut ast, Type::Int, "i", Some(zero));
    let read_i = ast.add(NodeKind::Variable(VariableRef::named("i")));
    let three = ast.add(NodeKind::Int(3));
    let condition = ast.add(NodeKind::BinOp { op: BinOp::Less, left: read_i, right: three });
    let read_again = ast.add(NodeKind::Variable(VariableRef::named("i")));
    let one = ast.add(NodeKind::Int(1));
    let next = ast.add(NodeKind::BinOp { op: BinOp::Add, left: read_again, right: one });
    let step = ast.add(NodeKind::Assign {
        target: VariableRef::named("i"),
        value: next,
    });
    let again = ast.add(NodeKind::Continue);
    let for_ = ast.add(NodeKind::For {
        initializers: Some(i),
        condition,
        commands: Some(step),
        body: Some(again),
    });
    let program = lower_main(ast, &[], &[for_]);

    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // main",
            "addI rsp, 4 => rsp",
            "loadI 0 => r1",
            "storeAI r1 => rfp, 0 // i",
            "L2: nop // for",
            "loadAI rfp, 0 => r2 // i",
            "loadI 3 => r3",
            "cmp_LT r2, r3 -> r4",
            "cbr r4 -> L3, L5",
            "L3: nop",
            "jumpI -> L4 // continue",
            "L4: nop",
            "loadAI rfp, 0 => r5 // i",
            "loadI 1 => r6",
            "add r5, r6 => r7",
            "storeAI r7 => rfp, 0 // i",
            "jumpI -> L2",
            "L5: nop",
            "L1: halt",
        ]
    );
}

#[test]
fn test_foreach_replicates_body() {
    let mut ast = Ast::new();
    let one = ast.add(NodeKind::Int(1));
    let two = ast.add(NodeKind::Int(2));
    let expressions = ast.chain(&[one, two]);
    let read_i = ast.add(NodeKind::Variable(VariableRef::named("i")));
    let body = output(&mut ast, read_i);
    let each = ast.add(NodeKind::ForEach {
        identifier: "i".to_string(),
        expressions,
        body: Some(body),
    });
    let program = lower_main(ast, &[], &[each]);

    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // main",
            "addI rsp, 4 => rsp",
            "loadI 1 => r1",
            "storeAI r1 => rfp, 0 // i",
            "loadAI rfp, 0 => r2 // i",
            "L3: nop",
            "loadI 2 => r3",
            "storeAI r3 => rfp, 0 // i",
            "loadAI rfp, 0 => r4 // i",
            "L4: nop",
            "L2: nop",
            "L1: halt",
        ]
    );
}

#[test]
fn test_switch_compares_each_case() {
    let mut ast = Ast::new();
    let two = ast.add(NodeKind::Int(2));
    let case_one = ast.add(NodeKind::Case(1));
    let ten = ast.add(NodeKind::Int(10));
    let out_ten = output(&mut ast, ten);
    let stop = ast.add(NodeKind::Break);
    let case_two = ast.add(NodeKind::Case(2));
    let twenty = ast.add(NodeKind::Int(20));
    let out_twenty = output(&mut ast, twenty);
    let body = ast.chain(&[case_one, out_ten, stop, case_two, out_twenty]);
    let switch = ast.add(NodeKind::Switch { expression: two, body });
    let program = lower_main(ast, &[], &[switch]);

    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // main",
            "loadI 2 => r1",
            "loadI 1 => r2",
            "cmp_EQ r1, r2 -> r3",
            "cbr r3 -> L3, L5",
            "L5: nop",
            "loadI 2 => r4",
            "cmp_EQ r1, r4 -> r5",
            "cbr r5 -> L4, L6",
            "L6: nop",
            "jumpI -> L2",
            "L3: nop // case 1",
            "loadI 10 => r6",
            "jumpI -> L2 // break",
            "L4: nop // case 2",
            "loadI 20 => r7",
            "L2: nop",
            "L1: halt",
        ]
    );
}

#[test]
fn test_duplicate_case_values_get_their_own_labels() {
    let mut ast = Ast::new();
    let one = ast.add(NodeKind::Int(1));
    let first = ast.add(NodeKind::Case(1));
    let second = ast.add(NodeKind::Case(1));
    let body = ast.chain(&[first, second]);
    let switch = ast.add(NodeKind::Switch { expression: one, body });
    let program = check_and_lower_main(ast, &[], vec![], &[switch]);

    assert_labels_consistent(&program);
    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // main",
            "loadI 1 => r1",
            "loadI 1 => r2",
            "cmp_EQ r1, r2 -> r3",
            "cbr r3 -> L3, L5",
            "L5: nop",
            "loadI 1 => r4",
            "cmp_EQ r1, r4 -> r5",
            "cbr r5 -> L4, L6",
            "L6: nop",
            "jumpI -> L2",
            "L3: nop // case 1",
            "L4: nop // case 1",
            "L2: nop",
            "L1: halt",
        ]
    );
}

#[test]
fn test_case_inside_a_block_belongs_to_the_switch() {
    let mut ast = Ast::new();
    let one = ast.add(NodeKind::Int(1));
    let case = ast.add(NodeKind::Case(1));
    let block = ast.add(NodeKind::Block { body: Some(case) });
    let switch = ast.add(NodeKind::Switch { expression: one, body: Some(block) });
    let program = check_and_lower_main(ast, &[], vec![], &[switch]);

    assert_labels_consistent(&program);
    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // main",
            "loadI 1 => r1",
            "loadI 1 => r2",
            "cmp_EQ r1, r2 -> r3",
            "cbr r3 -> L3, L4",
            "L4: nop",
            "jumpI -> L2",
            "L3: nop // case 1",
            "L2: nop",
            "L1: halt",
        ]
    );
}

#[test]
fn test_nested_switch_keeps_its_own_cases() {
    let mut ast = Ast::new();
    let inner_value = ast.add(NodeKind::Int(2));
    let inner_case = ast.add(NodeKind::Case(2));
    let inner = ast.add(NodeKind::Switch { expression: inner_value, body: Some(inner_case) });
    let outer_case = ast.add(NodeKind::Case(1));
    let outer_value = ast.add(NodeKind::Int(1));
    let body = ast.chain(&[outer_case, inner]);
    let outer = ast.add(NodeKind::Switch { expression: outer_value, body });
    let program = check_and_lower_main(ast, &[], vec![], &[outer]);

    assert_labels_consistent(&program);
    let text = program.to_string();
    assert_eq!(text.matches("// case 1\n").count(), 1);
    assert_eq!(text.matches("// case 2\n").count(), 1);
}

#[test]
fn test_stray_break_continue_and_case_are_ignored() {
    let mut ast = Ast::new();
    let stop = ast.add(NodeKind::Break);
    let again = ast.add(NodeKind::Continue);
    let case = ast.add(NodeKind::Case(3));
    let program = check_and_lower_main(ast, &[], vec![], &[stop, again, case]);

    assert_eq!(body_lines(&program), vec!["L0: nop // main", "L1: halt"]);
}

#[test]
fn test_break_in_switch_inside_loop_leaves_the_switch() {
    let mut ast = Ast::new();
    let one = ast.add(NodeKind::Int(1));
    let case = ast.add(NodeKind::Case(1));
    let stop = ast.add(NodeKind::Break);
    let body = ast.chain(&[case, stop]);
    let switch = ast.add(NodeKind::Switch { expression: one, body });
    let again = ast.add(NodeKind::Continue);
    let loop_body = ast.chain(&[switch, again]);
    let yes = ast.add(NodeKind::Bool(true));
    let loop_ = ast.add(NodeKind::While { cond: yes, body: loop_body });
    let program = check_and_lower_main(ast, &[], vec![], &[loop_]);

    assert_labels_consistent(&program);
    let switch_end = program
        .iter()
        .find(|instruction| instruction.comment.as_deref() == Some("break"))
        .map(|instruction| instruction.op.clone())
        .unwrap();
    let loop_test = label_with_comment(&program, "while");
    assert_ne!(switch_end, Op::JumpI(loop_test));
    assert!(program
        .iter()
        .any(|instruction| instruction.op == Op::JumpI(loop_test) && instruction.comment.as_deref() == Some("continue")));
}

#[test]
fn test_global_vector_indexing() {
    let mut ast = Ast::new();
    let padding = global(&mut ast, Type::Int, "padding", None);
    let v = global(&mut ast, Type::Int, "v", Some(10));
    let five = ast.add(NodeKind::Int(5));
    let two = ast.add(NodeKind::Int(2));
    let assign = ast.add(NodeKind::Assign {
        target: VariableRef::indexed("v", two),
        value: five,
    });
    let program = lower_main(ast, &[padding, v], &[assign]);

    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // main",
            "loadI 5 => r1",
            "loadI 2 => r2",
            "loadI 4 => r3",
            "mult r2, r3 => r4",
            "add r4, rbss => r5",
            "storeAI r1 => r5, 4 // v",
            "L1: halt",
        ]
    );
}

#[test]
fn test_record_fields_and_copy() {
    let mut ast = Ast::new();
    let class = ast.add(NodeKind::TypeDecl {
        identifier: "Point".to_string(),
        fields: vec![Field::new(Type::Int, "x"), Field::new(Type::Int, "y")],
    });
    let g = global(&mut ast, Type::custom("Point"), "g", None);
    let p = local(&mut ast, Type::custom("Point"), "p", None);
    let three = ast.add(NodeKind::Int(3));
    let set_y = ast.add(NodeKind::Assign {
        target: VariableRef::field("p", "y"),
        value: three,
    });
    let read_p = ast.add(NodeKind::Variable(VariableRef::named("p")));
    let copy = ast.add(NodeKind::Assign {
        target: VariableRef::named("g"),
        value: read_p,
    });
    let program = lower_main(ast, &[class, g], &[p, set_y, copy]);

    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // main",
            "addI rsp, 4 => rsp",
            "addI rsp, 4 => rsp",
            "loadI 3 => r1",
            "storeAI r1 => rfp, 4 // p.y",
            "loadAI rfp, 0 => r2 // p.x",
            "storeAI r2 => rbss, 0 // g.x",
            "loadAI rfp, 4 => r3 // p.y",
            "storeAI r3 => rbss, 4 // g.y",
            "L1: halt",
        ]
    );
}

#[test]
fn test_shift_left_doubles_in_a_loop() {
    let mut ast = Ast::new();
    let a = global(&mut ast, Type::Int, "a", None);
    let two = ast.add(NodeKind::Int(2));
    let shift = ast.add(NodeKind::Shift {
        direction: ShiftDirection::Left,
        target: VariableRef::named("a"),
        value: two,
    });
    let program = lower_main(ast, &[a], &[shift]);

    assert_eq!(
        body_lines(&program),
        vec![
            "L0: nop // main",
            "loadAI rbss, 0 => r1 // a",
            "loadI 2 => r2",
            "i2i r2 => r3",
            "loadI 2 => r4",
            "loadI 0 => r5",
            "L2: nop // shift",
            "cmp_GT r3, r5 -> r6",
            "cbr r6 -> L3, L4",
            "L3: nop",
            "mult r1, r4 => r1",
            "addI r3, -1 => r3",
            "jumpI -> L2",
            "L4: nop",
            "storeAI r1 => rbss, 0 // a",
            "L1: halt",
        ]
    );
}

#[test]
fn test_pipe_feeds_left_result_into_dot() {
    let mut ast = Ast::new();
    let x = ast.add(NodeKind::Variable(VariableRef::named("x")));
    let ret = ast.add(NodeKind::Return { value: x });
    let id = function(&mut ast, Type::Int, "id", vec![Param::new(Type::Int, "x")], &[ret]);

    let one = ast.add(NodeKind::Int(1));
    let first = ast.add(NodeKind::FunctionCall {
        identifier: "id".to_string(),
        arguments: Some(one),
    });
    let dot = ast.add(NodeKind::Dot);
    let second = ast.add(NodeKind::FunctionCall {
        identifier: "id".to_string(),
        arguments: Some(dot),
    });
    let pipe = ast.add(NodeKind::BinOp { op: BinOp::ForwardPipe, left: first, right: second });
    let out = output(&mut ast, pipe);
    let program = lower_main(ast, &[id], &[out]);

    let piped = program
        .iter()
        .find_map(|instruction| match (&instruction.op, instruction.comment.as_deref()) {
            (Op::LoadAI(Register::RSP, 0, result), Some("value of id")) => Some(*result),
            _ => None,
        })
        .unwrap();
    assert!(program
        .iter()
        .any(|instruction| matches!(instruction.op, Op::I2I(source, _) if source == piped)));
}

#[test]
fn test_input_is_annotated_nop() {
    let mut ast = Ast::new();
    let a = global(&mut ast, Type::Int, "a", None);
    let read_a = ast.add(NodeKind::Variable(VariableRef::named("a")));
    let input = ast.add(NodeKind::Input { value: read_a });
    let program = lower_main(ast, &[a], &[input]);

    assert_eq!(body_lines(&program), vec!["L0: nop // main", "nop // input a", "L1: halt"]);
}

#[derive(Debug, Clone)]
enum Expr {
    Int(i32),
    Bool(bool),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Unary(UnOp, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

fn expr_strategy() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        (-100i32..100).prop_map(Expr::Int),
        any::<bool>().prop_map(Expr::Bool),
    ];
    leaf.prop_recursive(4, 32, 3, |inner| {
        let binary_op = prop_oneof![
            Just(BinOp::Add),
            Just(BinOp::Subtract),
            Just(BinOp::Multiply),
            Just(BinOp::Divide),
            Just(BinOp::Modulo),
            Just(BinOp::Less),
            Just(BinOp::Equal),
            Just(BinOp::And),
            Just(BinOp::Or),
            Just(BinOp::BitAnd),
        ];
        let unary_op = prop_oneof![Just(UnOp::Not), Just(UnOp::Minus), Just(UnOp::EvalBool)];
        prop_oneof![
            (binary_op, inner.clone(), inner.clone())
                .prop_map(|(op, left, right)| Expr::Binary(op, Box::new(left), Box::new(right))),
            (unary_op, inner.clone()).prop_map(|(op, value)| Expr::Unary(op, Box::new(value))),
            (inner.clone(), inner.clone(), inner)
                .prop_map(|(c, t, o)| Expr::Ternary(Box::new(c), Box::new(t), Box::new(o))),
        ]
    })
}

fn build(ast: &mut Ast, expr: &Expr) -> NodeId {
    match expr {
        Expr::Int(value) => ast.add(NodeKind::Int(*value)),
        Expr::Bool(value) => ast.add(NodeKind::Bool(*value)),
        Expr::Binary(op, left, right) => {
            let left = build(ast, left);
            let right = build(ast, right);
            ast.add(NodeKind::BinOp { op: *op, left, right })
        }
        Expr::Unary(op, value) => {
            let value = build(ast, value);
            ast.add(NodeKind::UnOp { op: *op, value })
        }
        Expr::Ternary(cond, then, otherwise) => {
            let cond = build(ast, cond);
            let then = build(ast, then);
            let otherwise = build(ast, otherwise);
            ast.add(NodeKind::TernOp { cond, then, otherwise })
        }
    }
}

proptest! {
    /// Labels are defined once, every jump target exists, and freshly
    /// allocated destinations appear in strictly increasing order.
    #[test]
    fn registers_and_labels_are_never_reused(exprs in prop::collection::vec(expr_strategy(), 1..4)) {
        let mut ast = Ast::new();
        let statements: Vec<NodeId> = exprs
            .iter()
            .map(|expr| {
                let value = build(&mut ast, expr);
                output(&mut ast, value)
            })
            .collect();
        let program = lower_main(ast, &[], &statements);

        let mut defined = HashSet::new();
        for instruction in &program {
            if let Some(label) = instruction.label {
                prop_assert!(defined.insert(label), "label {} defined twice", label);
            }
        }
        for instruction in &program {
            for target in instruction.op.targets() {
                prop_assert!(defined.contains(&target), "jump to undefined {}", target);
            }
        }

        let mut last = 0;
        for instruction in &program {
            let fresh = match instruction.op {
                Op::LoadI(_, destination)
                | Op::LoadAI(_, _, destination)
                | Op::RSubI(_, _, destination)
                | Op::Add(_, _, destination)
                | Op::Sub(_, _, destination)
                | Op::Mult(_, _, destination)
                | Op::Div(_, _, destination) => Some(destination),
                _ => None,
            };
            if let Some(Register(number)) = fresh.filter(|register| !register.is_special()) {
                prop_assert!(number > last, "r{} allocated after r{}", number, last);
                last = number;
            }
        }
    }
}
