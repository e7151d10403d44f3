use thiserror::Error;

/// A syntax error reported by the parser.
///
/// `line` is 1-indexed, unlike the 0-indexed lines stored on tokens and
/// AST nodes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} line: {line}")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read source: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("\"{0}\" is declared as both a command and a condition")]
    CapabilityConflict(String),
    #[error("invalid capability name \"{0}\"")]
    InvalidCapability(String),
}
