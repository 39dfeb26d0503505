use std::fmt::Display;

use thiserror::Error;

use crate::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    internal_error: ErrorImpl,
    position: Position,
}

impl Error {
    pub fn new(error_impl: ErrorImpl, position: Position) -> Self {
        Error {
            internal_error: error_impl,
            position,
        }
    }

    pub fn get_position(&self) -> &Position {
        &self.position
    }

    pub fn get_impl(&self) -> &ErrorImpl {
        &self.internal_error
    }

    pub fn get_error_name(&self) -> &str {
        match &self.internal_error {
            ErrorImpl::IdentifierNotDeclared { .. } => "IdentifierNotDeclared",
            ErrorImpl::IdentifierAlreadyDeclared { .. } => "IdentifierAlreadyDeclared",
            ErrorImpl::ExpectedVariableUse { .. } => "ExpectedVariableUse",
            ErrorImpl::ExpectedVectorUse { .. } => "ExpectedVectorUse",
            ErrorImpl::ExpectedFunctionUse { .. } => "ExpectedFunctionUse",
            ErrorImpl::ExpectedClassUse { .. } => "ExpectedClassUse",
            ErrorImpl::TypeMatchError { .. } => "TypeMatchError",
            ErrorImpl::MissingArguments { .. } => "MissingArguments",
            ErrorImpl::UnexpectedArguments { .. } => "UnexpectedArguments",
            ErrorImpl::ArgumentTypeMatchError { .. } => "ArgumentTypeMatchError",
            ErrorImpl::InvalidInputOperand => "InvalidInputOperand",
            ErrorImpl::InvalidOutputOperand { .. } => "InvalidOutputOperand",
            ErrorImpl::ReturnTypeMatchError { .. } => "ReturnTypeMatchError",
            ErrorImpl::ReturnOutsideFunction => "ReturnOutsideFunction",
            ErrorImpl::NotAnExpression { .. } => "NotAnExpression",
        }
    }

    /// The fixed sentence the driver prints for each error code.
    pub fn message(&self) -> &'static str {
        match &self.internal_error {
            ErrorImpl::IdentifierNotDeclared { .. } => "Identifier not declared",
            ErrorImpl::IdentifierAlreadyDeclared { .. } => "Identifier already declared",
            ErrorImpl::ExpectedVariableUse { .. } => "Identifier should be used as variable",
            ErrorImpl::ExpectedVectorUse { .. } => "Identifier should be used as vector",
            ErrorImpl::ExpectedFunctionUse { .. } => "Identifier should be used as function",
            ErrorImpl::ExpectedClassUse { .. } => "Identifier should be used as custom type",
            ErrorImpl::TypeMatchError { .. } => "Incompatible types",
            ErrorImpl::MissingArguments { .. } => "Missing arguments",
            ErrorImpl::UnexpectedArguments { .. } => "Arguments in excess",
            ErrorImpl::ArgumentTypeMatchError { .. } => "Wrong type arguments",
            ErrorImpl::InvalidInputOperand => "Input parameter should be an identifier",
            ErrorImpl::InvalidOutputOperand { .. } => {
                "Output parameter should be string or expression"
            }
            ErrorImpl::ReturnTypeMatchError { .. } => "Wrong return type",
            ErrorImpl::ReturnOutsideFunction => "Return outside of a function",
            ErrorImpl::NotAnExpression { .. } => "Command used as an expression",
        }
    }

    pub fn get_tip(&self) -> ErrorTip {
        match &self.internal_error {
            ErrorImpl::IdentifierNotDeclared { identifier } => {
                ErrorTip::Suggestion(format!("`{}` is not declared in this scope", identifier))
            }
            ErrorImpl::IdentifierAlreadyDeclared { identifier } => {
                ErrorTip::Suggestion(format!("`{}` is already declared", identifier))
            }
            ErrorImpl::ExpectedVariableUse { identifier } => ErrorTip::Suggestion(format!(
                "`{}` is a variable, use it without an index or call",
                identifier
            )),
            ErrorImpl::ExpectedVectorUse { identifier } => ErrorTip::Suggestion(format!(
                "`{}` is a vector, index it with `{}[...]`",
                identifier, identifier
            )),
            ErrorImpl::ExpectedFunctionUse { identifier } => ErrorTip::Suggestion(format!(
                "`{}` is a function, call it with `{}(...)`",
                identifier, identifier
            )),
            ErrorImpl::ExpectedClassUse { identifier } => ErrorTip::Suggestion(format!(
                "`{}` is a class, it can only name a type",
                identifier
            )),
            ErrorImpl::TypeMatchError { expected, received } => ErrorTip::Suggestion(format!(
                "Expected type `{}`, received `{}`",
                expected, received
            )),
            ErrorImpl::MissingArguments { expected, received } => ErrorTip::Suggestion(format!(
                "Expected {} arguments, received {}",
                expected, received
            )),
            ErrorImpl::UnexpectedArguments { expected, received } => ErrorTip::Suggestion(format!(
                "Expected {} arguments, received {}",
                expected, received
            )),
            ErrorImpl::ArgumentTypeMatchError { expected, received } => {
                ErrorTip::Suggestion(format!(
                    "Expected argument type `{}`, received `{}`",
                    expected, received
                ))
            }
            ErrorImpl::InvalidInputOperand => ErrorTip::None,
            ErrorImpl::InvalidOutputOperand { received } => ErrorTip::Suggestion(format!(
                "`{}` cannot be written, expected a string literal or a number",
                received
            )),
            ErrorImpl::ReturnTypeMatchError { expected, received } => {
                ErrorTip::Suggestion(format!(
                    "Function returns `{}`, received `{}`",
                    expected, received
                ))
            }
            ErrorImpl::ReturnOutsideFunction => ErrorTip::None,
            ErrorImpl::NotAnExpression { kind } => {
                ErrorTip::Suggestion(format!("`{}` has no value", kind))
            }
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.internal_error, self.position)
    }
}

impl std::error::Error for Error {}

pub enum ErrorTip {
    None,
    Suggestion(String),
}

impl Display for ErrorTip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorTip::None => write!(f, ""),
            ErrorTip::Suggestion(suggestion) => write!(f, "{}", suggestion),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorImpl {
    #[error("identifier {identifier:?} not declared")]
    IdentifierNotDeclared { identifier: String },
    #[error("identifier {identifier:?} already declared")]
    IdentifierAlreadyDeclared { identifier: String },
    #[error("identifier {identifier:?} should be used as variable")]
    ExpectedVariableUse { identifier: String },
    #[error("identifier {identifier:?} should be used as vector")]
    ExpectedVectorUse { identifier: String },
    #[error("identifier {identifier:?} should be used as function")]
    ExpectedFunctionUse { identifier: String },
    #[error("identifier {identifier:?} should be used as custom type")]
    ExpectedClassUse { identifier: String },
    #[error("types do not match: expected {expected:?}, received {received:?}")]
    TypeMatchError { expected: String, received: String },
    #[error("missing arguments: expected {expected:?}, received {received:?}")]
    MissingArguments { expected: usize, received: usize },
    #[error("unexpected arguments: expected {expected:?}, received {received:?}")]
    UnexpectedArguments { expected: usize, received: usize },
    #[error("argument types do not match: expected {expected:?}, received {received:?}")]
    ArgumentTypeMatchError { expected: String, received: String },
    #[error("input operand is not an identifier")]
    InvalidInputOperand,
    #[error("output operand of type {received:?} is neither a string nor an expression")]
    InvalidOutputOperand { received: String },
    #[error("wrong return type: expected {expected:?}, received {received:?}")]
    ReturnTypeMatchError { expected: String, received: String },
    #[error("return context requested outside of a function")]
    ReturnOutsideFunction,
    #[error("{kind} is a command, not an expression")]
    NotAnExpression { kind: String },
}
