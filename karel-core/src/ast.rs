//! Syntax tree produced by the parser.
//!
//! The tree is plain owned data: a `Block` owns its expressions and every
//! nested block, with no back-references. An executor walks
//! `Block::expressions` in order and dispatches on the variant.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

/// What an expression invokes when executed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Callable {
    /// A zero-argument action from the capability descriptor.
    Command(String),
    /// A zero-argument predicate from the capability descriptor.
    Condition(String),
    /// The `do` primitive.
    Repeat,
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Callable::Command(name) | Callable::Condition(name) => name,
            Callable::Repeat => "do",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Block {
    pub expressions: Vec<Expression>,
}

/// An `elif` arm of an `if` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Elif {
    pub callable: Callable,
    pub line: usize,
    pub block: Block,
}

/// A single statement. `line` is always the 0-indexed line of the
/// statement's first token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Expression {
    Command {
        callable: Callable,
        line: usize,
    },
    Do {
        callable: Callable,
        count: u32,
        block: Block,
        line: usize,
    },
    If {
        callable: Callable,
        block: Block,
        elifs: Vec<Elif>,
        else_block: Option<Block>,
        line: usize,
    },
    While {
        callable: Callable,
        block: Block,
        line: usize,
    },
    /// Declares a procedure. Nothing in `block` runs at declaration time.
    Define {
        name: String,
        block: Block,
        line: usize,
    },
    /// Invokes a procedure by name. Resolution against `Define` nodes is
    /// left to whoever executes the tree.
    Call {
        fname: String,
        line: usize,
    },
}

impl Expression {
    pub fn name(&self) -> &str {
        match self {
            Expression::Command { callable, .. } => callable.name(),
            Expression::Do { .. } => "do",
            Expression::If { .. } => "if",
            Expression::While { .. } => "while",
            Expression::Define { name, .. } => name,
            Expression::Call { fname, .. } => fname,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Expression::Command { line, .. }
            | Expression::Do { line, .. }
            | Expression::If { line, .. }
            | Expression::While { line, .. }
            | Expression::Define { line, .. }
            | Expression::Call { line, .. } => *line,
        }
    }

    pub fn callable(&self) -> Option<&Callable> {
        match self {
            Expression::Command { callable, .. }
            | Expression::Do { callable, .. }
            | Expression::If { callable, .. }
            | Expression::While { callable, .. } => Some(callable),
            Expression::Define { .. } | Expression::Call { .. } => None,
        }
    }

    /// Blocks directly nested in this expression, in source order.
    pub fn blocks(&self) -> Vec<&Block> {
        match self {
            Expression::Command { .. } | Expression::Call { .. } => Vec::new(),
            Expression::Do { block, .. }
            | Expression::While { block, .. }
            | Expression::Define { block, .. } => vec![block],
            Expression::If {
                block,
                elifs,
                else_block,
                ..
            } => {
                let mut blocks = vec![block];
                blocks.extend(elifs.iter().map(|elif| &elif.block));
                blocks.extend(else_block.iter());
                blocks
            }
        }
    }
}

impl Block {
    pub fn new(expressions: Vec<Expression>) -> Self {
        Self { expressions }
    }

    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// Collect every procedure definition in the tree, nested ones
    /// included. A later definition of the same name replaces an earlier one.
    pub fn definitions<'a>(&'a self) -> BTreeMap<&'a str, &'a Block> {
        let mut found = BTreeMap::new();
        self.walk(&mut |expr: &'a Expression| {
            if let Expression::Define { name, block, .. } = expr {
                found.insert(name.as_str(), block);
            }
        });
        found
    }

    /// Calls whose name no `define` in the tree declares.
    pub fn undefined_calls<'a>(&'a self) -> Vec<(&'a str, usize)> {
        let defined: BTreeSet<&str> = self.definitions().into_keys().collect();
        let mut missing = Vec::new();
        self.walk(&mut |expr: &'a Expression| {
            if let Expression::Call { fname, line } = expr {
                if !defined.contains(fname.as_str()) {
                    missing.push((fname.as_str(), *line));
                }
            }
        });
        missing
    }

    fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expression)) {
        for expr in &self.expressions {
            visit(expr);
            for block in expr.blocks() {
                block.walk(visit);
            }
        }
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        for expr in &self.expressions {
            let pad = "  ".repeat(depth);
            let line = expr.line() + 1;
            match expr {
                Expression::Command { callable, .. } => {
                    writeln!(f, "{pad}command {} (line {line})", callable.name())?;
                }
                Expression::Call { fname, .. } => {
                    writeln!(f, "{pad}call {fname} (line {line})")?;
                }
                Expression::Do { count, block, .. } => {
                    writeln!(f, "{pad}do {count} (line {line})")?;
                    block.write_tree(f, depth + 1)?;
                }
                Expression::While {
                    callable, block, ..
                } => {
                    writeln!(f, "{pad}while {} (line {line})", callable.name())?;
                    block.write_tree(f, depth + 1)?;
                }
                Expression::Define { name, block, .. } => {
                    writeln!(f, "{pad}define {name} (line {line})")?;
                    block.write_tree(f, depth + 1)?;
                }
                Expression::If {
                    callable,
                    block,
                    elifs,
                    else_block,
                    ..
                } => {
                    writeln!(f, "{pad}if {} (line {line})", callable.name())?;
                    block.write_tree(f, depth + 1)?;
                    for elif in elifs {
                        writeln!(
                            f,
                            "{pad}elif {} (line {})",
                            elif.callable.name(),
                            elif.line + 1
                        )?;
                        elif.block.write_tree(f, depth + 1)?;
                    }
                    if let Some(else_block) = else_block {
                        writeln!(f, "{pad}else")?;
                        else_block.write_tree(f, depth + 1)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f, 0)
    }
}
