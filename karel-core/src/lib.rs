//! Core of the Karel language toolchain.
//!
//! The pipeline is short:
//!
//!   source text
//!     -> lexer   (tokens, with indentation made explicit)
//!     -> parser  (AST bound against a capability descriptor)
//!
//! Executing the tree is the job of whatever runtime supplied the
//! `Capabilities`. Higher-level tools (CLI, editors, etc.) should depend
//! on this crate rather than reimplementing the frontend.

use std::fs;
use std::path::Path;

// ---------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------

pub mod error;

// ---------------------------------------------------------------------
// Front-end: capabilities, lexing and parsing
// ---------------------------------------------------------------------

pub mod capabilities;
pub mod lexer;
pub mod ast;
pub mod parser;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use ast::{Block, Callable, Elif, Expression};
pub use capabilities::Capabilities;
pub use error::{CoreError, SyntaxError};
pub use lexer::{Token, TokenKind, Tokenizer};
pub use parser::Parser;

/// Read a program from disk.
pub fn read_program(path: impl AsRef<Path>) -> Result<String, CoreError> {
    Ok(fs::read_to_string(path)?)
}

/// Parse `source` against `capabilities` in one call.
pub fn parse_program(source: &str, capabilities: &Capabilities) -> Result<Block, CoreError> {
    Ok(Parser::new(source, capabilities).parse()?)
}
