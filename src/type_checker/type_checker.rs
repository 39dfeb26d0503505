use std::fmt::Display;

use log::debug;

use crate::{
    ast::{
        ast::{Ast, NodeId, NodeKind},
        expressions::{BinOp, UnOp, VariableRef},
        statements::Param,
        types::Type,
    },
    errors::errors::{Error, ErrorImpl},
    Position,
};

use super::scope::{Nature, ScopeStore, Symbol};

/// Structural equality for builtins, nominal equality for classes.
pub fn type_match(left: &Type, right: &Type) -> bool {
    left == right
}

/// Numeric promotion over `bool < int < float`. Strings, chars and
/// custom types never combine numerically.
pub fn infer(left: &Type, right: &Type) -> Option<Type> {
    if !left.is_numeric() || !right.is_numeric() {
        None
    } else if *left == Type::Float || *right == Type::Float {
        Some(Type::Float)
    } else if *left == Type::Int || *right == Type::Int {
        Some(Type::Int)
    } else {
        Some(Type::Bool)
    }
}

/// Whether a value of type `actual` can be used where `expected` is
/// required. The result always has `expected`'s kind.
pub fn convert(expected: &Type, actual: &Type) -> Option<Type> {
    if type_match(expected, actual) || infer(expected, actual).is_some() {
        Some(expected.clone())
    } else {
        None
    }
}

fn type_mismatch(expected: impl Display, received: impl Display, position: Position) -> Error {
    Error::new(
        ErrorImpl::TypeMatchError {
            expected: expected.to_string(),
            received: received.to_string(),
        },
        position,
    )
}

#[derive(Debug)]
pub struct TypeChecker<'a> {
    pub ast: &'a Ast,
    pub scopes: ScopeStore,
}

impl<'a> TypeChecker<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        TypeChecker {
            ast,
            scopes: ScopeStore::new(),
        }
    }

    /// Converts the value of `node` (of type `actual`) to `expected`,
    /// stamping the node when its kind changes.
    pub fn coerce(&self, expected: &Type, node: NodeId, actual: &Type) -> Result<Type, Error> {
        let converted = convert(expected, actual)
            .ok_or_else(|| type_mismatch(expected, actual, self.ast.position(node)))?;
        if converted.kind() != actual.kind() {
            self.ast.stamp(node, converted.kind());
        }
        Ok(converted)
    }

    fn declared_size(&self, ty: &Type, position: Position) -> Result<Option<u32>, Error> {
        self.scopes.size_for_type(ty, position)
    }

    fn already_declared(identifier: &str, position: Position) -> Error {
        Error::new(
            ErrorImpl::IdentifierAlreadyDeclared {
                identifier: identifier.to_string(),
            },
            position,
        )
    }

    fn not_declared(identifier: &str, position: Position) -> Error {
        Error::new(
            ErrorImpl::IdentifierNotDeclared {
                identifier: identifier.to_string(),
            },
            position,
        )
    }
}

/// Checks a use of a storage location and returns the type it holds.
pub fn type_check_variable(
    type_checker: &mut TypeChecker,
    var: &VariableRef,
    position: Position,
) -> Result<Type, Error> {
    let (nature, ty) = match type_checker.scopes.get_symbol(&var.identifier) {
        Some(symbol) => (symbol.nature, symbol.ty.clone()),
        None => return Err(TypeChecker::not_declared(&var.identifier, position)),
    };
    let identifier = var.identifier.clone();

    match nature {
        Nature::Function => {
            return Err(Error::new(ErrorImpl::ExpectedFunctionUse { identifier }, position))
        }
        Nature::Class => {
            return Err(Error::new(ErrorImpl::ExpectedClassUse { identifier }, position))
        }
        Nature::Variable if var.index.is_some() => {
            return Err(Error::new(ErrorImpl::ExpectedVariableUse { identifier }, position))
        }
        Nature::Vector if var.index.is_none() => {
            return Err(Error::new(ErrorImpl::ExpectedVectorUse { identifier }, position))
        }
        Nature::Variable | Nature::Vector => {}
    }

    if let Some(index) = var.index {
        let index_type = type_check_expr(type_checker, index)?;
        type_checker.coerce(&Type::Int, index, &index_type)?;
    }

    let ty = ty.ok_or_else(|| {
        Error::new(ErrorImpl::ExpectedVariableUse { identifier: var.identifier.clone() }, position)
    })?;

    match &var.field {
        None => Ok(ty),
        Some(field) => {
            let Type::Custom(class_name) = &ty else {
                return Err(Error::new(
                    ErrorImpl::ExpectedVariableUse { identifier: var.identifier.clone() },
                    position,
                ));
            };
            type_checker
                .scopes
                .get_symbol(class_name)
                .filter(|class| class.nature == Nature::Class)
                .and_then(|class| class.field(field))
                .map(|field| field.ty.clone())
                .ok_or_else(|| TypeChecker::not_declared(field, position))
        }
    }
}

/// String literals and whole records have no single-word value; they
/// may only be copied into storage or written by `output`.
fn require_word(ast: &Ast, node: NodeId, ty: &Type) -> Result<(), Error> {
    let wordless = match ast.kind(node) {
        NodeKind::Str(_) => true,
        NodeKind::Variable(var) => var.field.is_none() && matches!(ty, Type::Custom(_)),
        _ => false,
    };
    if wordless {
        return Err(type_mismatch("single-word value", ty, ast.position(node)));
    }
    Ok(())
}

/// Checks an operand that is lowered into one register.
pub fn type_check_word(type_checker: &mut TypeChecker, node: NodeId) -> Result<Type, Error> {
    let ty = type_check_expr(type_checker, node)?;
    require_word(type_checker.ast, node, &ty)?;
    Ok(ty)
}

fn is_record_variable(ast: &Ast, node: NodeId) -> bool {
    matches!(ast.kind(node), NodeKind::Variable(var) if var.field.is_none())
}

/// Checks the source of a whole-record copy into a `expected` record.
fn type_check_record_source(
    type_checker: &mut TypeChecker,
    node: NodeId,
    expected: &Type,
) -> Result<Type, Error> {
    let ty = type_check_expr(type_checker, node)?;
    if !is_record_variable(type_checker.ast, node) {
        return Err(type_mismatch(
            format!("{} variable", expected),
            &ty,
            type_checker.ast.position(node),
        ));
    }
    type_checker.coerce(expected, node, &ty)
}

pub fn type_check_expr(type_checker: &mut TypeChecker, node: NodeId) -> Result<Type, Error> {
    let ast = type_checker.ast;
    let position = ast.position(node);

    match ast.kind(node) {
        NodeKind::Int(_) => Ok(Type::Int),
        NodeKind::Float(_) => Ok(Type::Float),
        NodeKind::Bool(_) => Ok(Type::Bool),
        NodeKind::Char(_) => Ok(Type::Char),
        NodeKind::Str(_) => Ok(Type::String),
        NodeKind::Variable(var) => type_check_variable(type_checker, var, position),
        NodeKind::Dot => type_checker
            .scopes
            .get_dot()
            .and_then(|dot| dot.ty.clone())
            .ok_or_else(|| TypeChecker::not_declared(".", position)),
        NodeKind::BinOp { op, left, right } => {
            let left_type = type_check_expr(type_checker, *left)?;

            if op.is_pipe() {
                let left_is_call = matches!(
                    ast.kind(*left),
                    NodeKind::FunctionCall { .. } | NodeKind::BinOp { op: BinOp::BashPipe | BinOp::ForwardPipe, .. }
                );
                if !left_is_call {
                    return Err(type_mismatch("function call", &left_type, ast.position(*left)));
                }

                let size = type_checker.declared_size(&left_type, position)?;
                let previous = type_checker.scopes.get_dot().cloned();
                type_checker
                    .scopes
                    .set_dot(Symbol::new(Nature::Variable, Some(left_type), size, position));
                let right_type = type_check_word(type_checker, *right);
                match previous {
                    Some(dot) => type_checker.scopes.set_dot(dot),
                    None => type_checker.scopes.clear_dot(),
                }
                return right_type;
            }

            require_word(ast, *left, &left_type)?;
            let right_type = type_check_word(type_checker, *right)?;

            if op.is_arithmetic() {
                infer(&left_type, &right_type).ok_or_else(|| type_mismatch(&left_type, &right_type, position))
            } else if op.is_relational() {
                type_checker.coerce(&left_type, *right, &right_type)?;
                Ok(Type::Bool)
            } else if op.is_logical() {
                match (&left_type, &right_type) {
                    (Type::Bool, Type::Bool) => Ok(Type::Bool),
                    (Type::Bool, other) => Err(type_mismatch(Type::Bool, other, ast.position(*right))),
                    (other, _) => Err(type_mismatch(Type::Bool, other, ast.position(*left))),
                }
            } else {
                // Bitwise
                convert(&left_type, &right_type)
                    .map(|_| Type::Bool)
                    .ok_or_else(|| type_mismatch(&left_type, &right_type, position))
            }
        }
        NodeKind::UnOp { op, value } => {
            let value_type = type_check_expr(type_checker, *value)?;

            match op {
                UnOp::Not => type_checker.coerce(&Type::Bool, *value, &value_type),
                UnOp::Minus | UnOp::Plus => infer(&Type::Bool, &value_type)
                    .ok_or_else(|| type_mismatch("number", &value_type, position)),
                UnOp::EvalBool => convert(&Type::Bool, &value_type)
                    .ok_or_else(|| type_mismatch(Type::Bool, &value_type, position)),
                UnOp::Address | UnOp::Value | UnOp::Hash => {
                    Err(type_mismatch(format!("operand of {:?}", op), &value_type, position))
                }
            }
        }
        NodeKind::TernOp { cond, then, otherwise } => {
            let cond_type = type_check_expr(type_checker, *cond)?;
            type_checker.coerce(&Type::Bool, *cond, &cond_type)?;

            let then_type = type_check_word(type_checker, *then)?;
            let otherwise_type = type_check_word(type_checker, *otherwise)?;
            type_checker.coerce(&then_type, *otherwise, &otherwise_type)
        }
        NodeKind::FunctionCall { identifier, arguments } => {
            let (params, return_type) = match type_checker.scopes.get_symbol(identifier) {
                None => return Err(TypeChecker::not_declared(identifier, position)),
                Some(symbol) => {
                    let identifier = identifier.clone();
                    match symbol.nature {
                        Nature::Variable => {
                            return Err(Error::new(ErrorImpl::ExpectedVariableUse { identifier }, position))
                        }
                        Nature::Class => {
                            return Err(Error::new(ErrorImpl::ExpectedClassUse { identifier }, position))
                        }
                        Nature::Vector => {
                            return Err(Error::new(ErrorImpl::ExpectedVectorUse { identifier }, position))
                        }
                        Nature::Function => (symbol.params.clone(), symbol.ty.clone()),
                    }
                }
            };

            let arguments: Vec<NodeId> = ast.siblings(*arguments).collect();
            for (argument, param) in arguments.iter().zip(params.iter()) {
                let argument_type = type_check_expr(type_checker, *argument)?;
                let converted = convert(&param.ty, &argument_type).ok_or_else(|| {
                    Error::new(
                        ErrorImpl::ArgumentTypeMatchError {
                            expected: param.ty.to_string(),
                            received: argument_type.to_string(),
                        },
                        ast.position(*argument),
                    )
                })?;
                if converted.kind() != argument_type.kind() {
                    ast.stamp(*argument, converted.kind());
                }
                match &param.ty {
                    Type::Custom(_) if !is_record_variable(ast, *argument) => {
                        return Err(Error::new(
                            ErrorImpl::ArgumentTypeMatchError {
                                expected: format!("{} variable", param.ty),
                                received: argument_type.to_string(),
                            },
                            ast.position(*argument),
                        ));
                    }
                    Type::Custom(_) => {}
                    _ => require_word(ast, *argument, &argument_type)?,
                }
            }

            if arguments.len() > params.len() {
                return Err(Error::new(
                    ErrorImpl::UnexpectedArguments {
                        expected: params.len(),
                        received: arguments.len(),
                    },
                    ast.position(arguments[params.len()]),
                ));
            }
            if arguments.len() < params.len() {
                return Err(Error::new(
                    ErrorImpl::MissingArguments {
                        expected: params.len(),
                        received: arguments.len(),
                    },
                    position,
                ));
            }

            return_type.ok_or_else(|| Error::new(ErrorImpl::ExpectedFunctionUse { identifier: identifier.clone() }, position))
        }
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
        | NodeKind::ForEach { .. } => Err(Error::new(
            ErrorImpl::NotAnExpression {
                kind: ast.kind(node).name().to_string(),
            },
            position,
        )),
    }
}

pub fn type_check_stmt(type_checker: &mut TypeChecker, node: NodeId) -> Result<(), Error> {
    let ast = type_checker.ast;
    let position = ast.position(node);

    match ast.kind(node) {
        NodeKind::GlobalVarDecl { ty, identifier, array_size, .. } => {
            debug!("checking global variable `{}`", identifier);
            if type_checker.scopes.get_symbol(identifier).is_some() {
                return Err(TypeChecker::already_declared(identifier, position));
            }

            let element_size = type_checker.declared_size(ty, position)?;
            let (nature, size) = match array_size {
                Some(count) => (Nature::Vector, element_size.map(|size| size * count)),
                None => (Nature::Variable, element_size),
            };
            type_checker
                .scopes
                .add_symbol(identifier, Symbol::new(nature, Some(ty.clone()), size, position));
            Ok(())
        }
        NodeKind::TypeDecl { identifier, fields } => {
            debug!("checking class `{}`", identifier);
            if type_checker.scopes.get_symbol(identifier).is_some() {
                return Err(TypeChecker::already_declared(identifier, position));
            }

            let mut size = 0;
            for field in fields {
                size += type_checker.declared_size(&field.ty, position)?.unwrap_or(0);
            }
            let mut symbol = Symbol::new(Nature::Class, None, Some(size), position);
            symbol.fields = fields.clone();
            type_checker.scopes.add_symbol(identifier, symbol);
            Ok(())
        }
        NodeKind::FunctionDecl { ty, identifier, params, body, .. } => {
            debug!("checking function `{}`", identifier);
            if type_checker.scopes.get_symbol(identifier).is_some() {
                return Err(TypeChecker::already_declared(identifier, position));
            }

            let size = type_checker.declared_size(ty, position)?;
            let mut symbol = Symbol::new(Nature::Function, Some(ty.clone()), size, position);
            symbol.params = params.clone();
            type_checker.scopes.set_return(symbol.clone());
            type_checker.scopes.add_symbol(identifier, symbol);

            type_checker.scopes.push_scope();
            let result = type_check_params_and_body(type_checker, params, *body);
            type_checker.scopes.clear_return();
            type_checker.scopes.pop_scope();
            result
        }
        NodeKind::LocalVarDecl { ty, identifier, init, .. } => {
            debug!("checking declaration of `{}`", identifier);
            if type_checker.scopes.get_symbol_current_scope(identifier).is_some() {
                return Err(TypeChecker::already_declared(identifier, position));
            }

            let mut literal_len = None;
            match (init, ty) {
                (Some(init), Type::Custom(_)) => {
                    type_check_record_source(type_checker, *init, ty)?;
                }
                (Some(init), _) => {
                    let init_type = type_check_expr(type_checker, *init)?;
                    type_checker.coerce(ty, *init, &init_type)?;
                    if let NodeKind::Str(literal) = ast.kind(*init) {
                        literal_len = Some(literal.len() as u32);
                    }
                }
                (None, _) => {}
            }

            let size = type_checker.declared_size(ty, position)?;
            type_checker.scopes.add_symbol(
                identifier,
                Symbol::new(Nature::Variable, Some(ty.clone()), literal_len.or(size), position),
            );
            Ok(())
        }
        NodeKind::Return { value } => {
            let value_type = type_check_expr(type_checker, *value)?;
            let expected = type_checker
                .scopes
                .get_return(position)?
                .ty
                .clone()
                .ok_or_else(|| Error::new(ErrorImpl::ReturnOutsideFunction, position))?;

            match convert(&expected, &value_type) {
                Some(converted) => {
                    if converted.kind() != value_type.kind() {
                        ast.stamp(*value, converted.kind());
                    }
                    require_word(ast, *value, &value_type)
                }
                None => Err(Error::new(
                    ErrorImpl::ReturnTypeMatchError {
                        expected: expected.to_string(),
                        received: value_type.to_string(),
                    },
                    position,
                )),
            }
        }
        NodeKind::Input { value } => {
            if !matches!(ast.kind(*value), NodeKind::Variable(_)) {
                return Err(Error::new(ErrorImpl::InvalidInputOperand, position));
            }
            type_check_expr(type_checker, *value).map(|_| ())
        }
        NodeKind::Output { values } => {
            for value in ast.siblings(*values) {
                if let NodeKind::Str(_) = ast.kind(value) {
                    continue;
                }
                let value_type = type_check_expr(type_checker, value)?;
                let converted = convert(&Type::Int, &value_type).ok_or_else(|| {
                    Error::new(
                        ErrorImpl::InvalidOutputOperand { received: value_type.to_string() },
                        ast.position(value),
                    )
                })?;
                if converted.kind() != value_type.kind() {
                    ast.stamp(value, converted.kind());
                }
            }
            Ok(())
        }
        NodeKind::Assign { target, value } => {
            let target_type = type_check_variable(type_checker, target, position)?;
            if matches!(target_type, Type::Custom(_)) && target.field.is_none() {
                return type_check_record_source(type_checker, *value, &target_type).map(|_| ());
            }

            let value_type = type_check_expr(type_checker, *value)?;
            type_checker.coerce(&target_type, *value, &value_type)?;
            match ast.kind(*value) {
                NodeKind::Str(literal) => {
                    if let Some(symbol) = type_checker.scopes.get_symbol_mut(&target.identifier) {
                        if symbol.size.is_none() {
                            symbol.size = Some(literal.len() as u32);
                        }
                    }
                    Ok(())
                }
                _ => require_word(ast, *value, &value_type),
            }
        }
        NodeKind::Shift { target, value, .. } => {
            let target_type = type_check_variable(type_checker, target, position)?;
            let value_type = type_check_expr(type_checker, *value)?;

            if convert(&Type::Int, &value_type).is_none() {
                return Err(type_mismatch(Type::Int, &value_type, ast.position(*value)));
            }
            if convert(&Type::Int, &target_type).is_none() {
                return Err(type_mismatch(Type::Int, &target_type, position));
            }
            Ok(())
        }
        NodeKind::Break | NodeKind::Continue | NodeKind::Case(_) => Ok(()),
        NodeKind::Block { body } => type_check_list(type_checker, *body),
        NodeKind::If { cond, then, otherwise } => {
            type_check_condition(type_checker, *cond, &Type::Bool)?;
            type_check_list(type_checker, *then)?;
            type_check_list(type_checker, *otherwise)
        }
        NodeKind::While { cond, body } | NodeKind::DoWhile { cond, body } => {
            type_check_condition(type_checker, *cond, &Type::Bool)?;
            type_check_list(type_checker, *body)
        }
        NodeKind::Switch { expression, body } => {
            type_check_condition(type_checker, *expression, &Type::Int)?;
            type_check_list(type_checker, *body)
        }
        NodeKind::For { initializers, condition, commands, body } => {
            type_check_list(type_checker, *initializers)?;
            type_check_condition(type_checker, *condition, &Type::Bool)?;
            type_check_list(type_checker, *commands)?;
            type_check_list(type_checker, *body)
        }
        NodeKind::ForEach { identifier, expressions, body } => {
            let mut common_type: Option<Type> = None;
            for expression in ast.siblings(*expressions) {
                let expression_type = type_check_word(type_checker, expression)?;
                match &common_type {
                    None => common_type = Some(expression_type),
                    Some(common) => {
                        type_checker.coerce(common, expression, &expression_type)?;
                    }
                }
            }

            let loop_type = common_type.unwrap_or(Type::Int);
            let size = type_checker.declared_size(&loop_type, position)?;
            type_checker.scopes.push_scope();
            type_checker
                .scopes
                .add_symbol(identifier, Symbol::new(Nature::Variable, Some(loop_type), size, position));
            let result = type_check_list(type_checker, *body);
            type_checker.scopes.pop_scope();
            result
        }
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
        | NodeKind::FunctionCall { .. } => type_check_word(type_checker, node).map(|_| ()),
    }
}

fn type_check_condition(type_checker: &mut TypeChecker, cond: NodeId, expected: &Type) -> Result<(), Error> {
    let cond_type = type_check_expr(type_checker, cond)?;
    type_checker.coerce(expected, cond, &cond_type).map(|_| ())
}

fn type_check_params_and_body(
    type_checker: &mut TypeChecker,
    params: &[Param],
    body: Option<NodeId>,
) -> Result<(), Error> {
    for param in params {
        if type_checker.scopes.get_symbol_current_scope(&param.identifier).is_some() {
            return Err(TypeChecker::already_declared(&param.identifier, param.position));
        }
        let size = type_checker.declared_size(&param.ty, param.position)?;
        type_checker.scopes.add_symbol(
            &param.identifier,
            Symbol::new(Nature::Variable, Some(param.ty.clone()), size, param.position),
        );
    }
    type_check_list(type_checker, body)
}

/// Checks a sibling chain in order, stopping at the first error.
pub fn type_check_list(type_checker: &mut TypeChecker, first: Option<NodeId>) -> Result<(), Error> {
    let ast = type_checker.ast;
    for node in ast.siblings(first) {
        type_check_stmt(type_checker, node)?;
    }
    Ok(())
}

/// Checks a whole compilation unit, returning the checker so callers can
/// inspect the global scope afterwards.
pub fn type_check(ast: &Ast) -> (TypeChecker<'_>, Option<Error>) {
    let mut type_checker = TypeChecker::new(ast);
    let result = type_check_list(&mut type_checker, ast.root());
    (type_checker, result.err())
}

pub fn check_program(ast: &Ast) -> Result<(), Error> {
    match type_check(ast) {
        (_, None) => Ok(()),
        (_, Some(error)) => {
            debug!("semantic error: {}", error);
            Err(error)
        }
    }
}
