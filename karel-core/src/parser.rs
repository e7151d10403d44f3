//! Recursive-descent parser for Karel programs.
//!
//! The grammar only ever sees explicit structure: the tokenizer has already
//! turned indentation into `Indent`/`Dedent` tokens. Every failure is a
//! `SyntaxError` carrying the 1-indexed line of the offending token, and the
//! first one encountered ends the parse.

use tracing::{debug, warn};

use crate::ast::{Block, Callable, Elif, Expression};
use crate::capabilities::Capabilities;
use crate::error::SyntaxError;
use crate::lexer::{Token, TokenKind, Tokenizer};

const EXPECTED_NUMBER: &str = "Expected number after do.";
const EXPECTED_COLON: &str = "Expected a colon.";
const EXPECTED_NEWLINE: &str = "Expected a newline.";
const EXPECTED_BLOCK: &str = "Expected an indented block.";
const EXPECTED_FUNCTION_NAME: &str = "Expected a function name after define.";
const EXPECTED_STATEMENT: &str = "Expected a statement.";
const UNEXPECTED_INDENT: &str = "Unexpected indent.";
const MISPLACED_ELIF: &str = "elif statement can only come after an if statement.";
const MISPLACED_ELSE: &str = "else statement can only come after an if statement.";

/// Parses one program against a capability descriptor.
///
/// The descriptor is only borrowed, so a single `Capabilities` can back
/// many parsers at once.
#[derive(Debug)]
pub struct Parser<'caps> {
    tokenizer: Tokenizer,
    capabilities: &'caps Capabilities,
}

impl<'caps> Parser<'caps> {
    pub fn new(source: &str, capabilities: &'caps Capabilities) -> Self {
        Self {
            tokenizer: Tokenizer::new(source),
            capabilities,
        }
    }

    /// Pull the next token from the underlying tokenizer.
    pub fn get_token(&mut self) -> Token {
        self.tokenizer.get_token()
    }

    pub fn get_num_tokens(&self) -> usize {
        self.tokenizer.get_num_tokens()
    }

    /// Parse the whole program into its root block.
    pub fn parse(&mut self) -> Result<Block, SyntaxError> {
        debug!(tokens = self.get_num_tokens(), "parsing program");
        let block = self.parse_block()?;
        let token = self.tokenizer.get_token();
        if !token.is(TokenKind::Eof) {
            return Err(error_at(&token, EXPECTED_STATEMENT));
        }
        debug!(statements = block.len(), "parsed program");
        Ok(block)
    }

    fn parse_block(&mut self) -> Result<Block, SyntaxError> {
        let mut expressions = Vec::new();
        loop {
            match self.tokenizer.peek().kind {
                TokenKind::Dedent | TokenKind::Eof => break,
                TokenKind::Newline => {
                    self.tokenizer.get_token();
                }
                _ => expressions.push(self.parse_statement()?),
            }
        }
        Ok(Block::new(expressions))
    }

    fn parse_statement(&mut self) -> Result<Expression, SyntaxError> {
        let token = self.tokenizer.get_token();
        match token.kind {
            TokenKind::Identifier => self.parse_simple(token),
            TokenKind::Do => self.parse_do(token),
            TokenKind::If => self.parse_if(token),
            TokenKind::While => self.parse_while(token),
            TokenKind::Define => self.parse_define(token),
            TokenKind::Elif => Err(error_at(&token, MISPLACED_ELIF)),
            TokenKind::Else => Err(error_at(&token, MISPLACED_ELSE)),
            TokenKind::Indent => Err(error_at(&token, UNEXPECTED_INDENT)),
            TokenKind::Number
            | TokenKind::Colon
            | TokenKind::Newline
            | TokenKind::Dedent
            | TokenKind::Eof => Err(error_at(&token, EXPECTED_STATEMENT)),
        }
    }

    /// A bare identifier: a command if the descriptor knows it, otherwise
    /// a call to a procedure that may be defined anywhere.
    fn parse_simple(&mut self, token: Token) -> Result<Expression, SyntaxError> {
        let line = token.line;
        let name = token.text.unwrap_or_default();
        let expr = if self.capabilities.is_command(&name) {
            Expression::Command {
                callable: Callable::Command(name),
                line,
            }
        } else {
            Expression::Call { fname: name, line }
        };
        self.end_statement()?;
        Ok(expr)
    }

    fn parse_do(&mut self, token: Token) -> Result<Expression, SyntaxError> {
        let number = self.tokenizer.get_token();
        let count = number
            .value
            .filter(|&count| number.is(TokenKind::Number) && count > 0)
            .ok_or_else(|| error_at(&number, EXPECTED_NUMBER))?;
        let block = self.parse_body()?;
        Ok(Expression::Do {
            callable: Callable::Repeat,
            count,
            block,
            line: token.line,
        })
    }

    fn parse_if(&mut self, token: Token) -> Result<Expression, SyntaxError> {
        let callable = self.parse_condition(&token)?;
        let block = self.parse_body()?;
        let mut elifs = Vec::new();
        let mut else_block = None;

        loop {
            self.skip_newlines();
            match self.tokenizer.peek().kind {
                TokenKind::Elif => {
                    let elif = self.tokenizer.get_token();
                    let callable = self.parse_condition(&elif)?;
                    let block = self.parse_body()?;
                    elifs.push(Elif {
                        callable,
                        line: elif.line,
                        block,
                    });
                }
                TokenKind::Else => {
                    self.tokenizer.get_token();
                    else_block = Some(self.parse_body()?);
                    break;
                }
                _ => break,
            }
        }

        Ok(Expression::If {
            callable,
            block,
            elifs,
            else_block,
            line: token.line,
        })
    }

    fn parse_while(&mut self, token: Token) -> Result<Expression, SyntaxError> {
        let callable = self.parse_condition(&token)?;
        let block = self.parse_body()?;
        Ok(Expression::While {
            callable,
            block,
            line: token.line,
        })
    }

    fn parse_define(&mut self, token: Token) -> Result<Expression, SyntaxError> {
        let name_token = self.tokenizer.get_token();
        if !name_token.is(TokenKind::Identifier) {
            return Err(error_at(&name_token, EXPECTED_FUNCTION_NAME));
        }
        let name = name_token.text.unwrap_or_default();
        if self.capabilities.is_command(&name) {
            warn!(
                procedure = %name,
                line = token.line + 1,
                "procedure shares its name with a command; calls will run the command"
            );
        }
        let block = self.parse_body()?;
        Ok(Expression::Define {
            name,
            block,
            line: token.line,
        })
    }

    /// The condition following `keyword` (an `if`, `elif` or `while` token).
    fn parse_condition(&mut self, keyword: &Token) -> Result<Callable, SyntaxError> {
        let token = self.tokenizer.get_token();
        if !token.is(TokenKind::Identifier) {
            let article = if keyword.is(TokenKind::While) { "a" } else { "an" };
            return Err(error_at(
                &token,
                format!(
                    "Expected a conditional expression after {article} {}.",
                    keyword.text()
                ),
            ));
        }
        let name = token.text();
        if !self.capabilities.is_condition(name) {
            return Err(error_at(
                &token,
                format!("Unrecognized conditional expression \"{name}\"."),
            ));
        }
        Ok(Callable::Condition(name.to_string()))
    }

    /// `COLON NEWLINE INDENT Block DEDENT`, shared by every compound statement.
    fn parse_body(&mut self) -> Result<Block, SyntaxError> {
        self.expect(TokenKind::Colon, EXPECTED_COLON)?;

        let token = self.tokenizer.get_token();
        match token.kind {
            TokenKind::Newline => {}
            TokenKind::Eof => return Err(error_at(&token, EXPECTED_BLOCK)),
            _ => return Err(error_at(&token, EXPECTED_NEWLINE)),
        }

        self.expect(TokenKind::Indent, EXPECTED_BLOCK)?;
        let block = self.parse_block()?;
        self.expect(TokenKind::Dedent, EXPECTED_STATEMENT)?;
        Ok(block)
    }

    fn end_statement(&mut self) -> Result<(), SyntaxError> {
        let token = self.tokenizer.peek();
        match token.kind {
            TokenKind::Newline => {
                self.tokenizer.get_token();
                Ok(())
            }
            TokenKind::Dedent | TokenKind::Eof => Ok(()),
            _ => Err(error_at(token, EXPECTED_NEWLINE)),
        }
    }

    fn skip_newlines(&mut self) {
        while self.tokenizer.peek().is(TokenKind::Newline) {
            self.tokenizer.get_token();
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token, SyntaxError> {
        let token = self.tokenizer.get_token();
        if token.is(kind) {
            Ok(token)
        } else {
            Err(error_at(&token, message))
        }
    }
}

fn error_at(token: &Token, message: impl Into<String>) -> SyntaxError {
    SyntaxError::new(message, token.line + 1)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn parse(lines: &[&str]) -> Result<Block, SyntaxError> {
        let caps = Capabilities::karel();
        Parser::new(&lines.join("\n"), &caps).parse()
    }

    fn parse_ok(lines: &[&str]) -> Block {
        parse(lines).expect("parse")
    }

    fn command(name: &str) -> Callable {
        Callable::Command(name.to_string())
    }

    fn condition(name: &str) -> Callable {
        Callable::Condition(name.to_string())
    }

    #[test]
    fn parses_command() {
        let block = parse_ok(&["move"]);
        assert_eq!(
            block.expressions,
            vec![Expression::Command {
                callable: command("move"),
                line: 0
            }]
        );
    }

    #[test]
    fn parses_do() {
        let block = parse_ok(&["do 3:", "  move"]);
        assert_eq!(block.len(), 1);
        let Expression::Do {
            callable,
            count,
            block: body,
            line,
        } = &block.expressions[0]
        else {
            panic!("unexpected variant");
        };
        assert_eq!(*callable, Callable::Repeat);
        assert_eq!(*count, 3);
        assert_eq!(*line, 0);
        assert_eq!(body.len(), 1);
        assert_eq!(body.expressions[0].callable(), Some(&command("move")));
    }

    #[test]
    fn parses_if() {
        let block = parse_ok(&["if front_is_clear:", "  move"]);
        let expr = &block.expressions[0];
        assert_eq!(expr.name(), "if");
        assert_eq!(expr.callable(), Some(&condition("front_is_clear")));
        assert_eq!(expr.line(), 0);
        let Expression::If { block: body, .. } = expr else {
            panic!("unexpected variant");
        };
        assert_eq!(body.expressions[0].callable(), Some(&command("move")));
        assert_eq!(body.expressions[0].line(), 1);
    }

    #[test]
    fn parses_else() {
        let block = parse_ok(&["if front_is_clear:", "  move", "else:", "  turnleft"]);
        assert_eq!(block.len(), 1);
        let Expression::If {
            elifs, else_block, ..
        } = &block.expressions[0]
        else {
            panic!("unexpected variant");
        };
        assert!(elifs.is_empty());
        let else_block = else_block.as_ref().expect("else block");
        assert_eq!(else_block.len(), 1);
        assert_eq!(else_block.expressions[0].callable(), Some(&command("turnleft")));
        assert_eq!(else_block.expressions[0].line(), 3);
    }

    #[test]
    fn parses_elif_chain() {
        let block = parse_ok(&[
            "if front_is_clear:",
            "  move",
            "elif facing_north:",
            "  putbeeper",
            "elif facing_south:",
            "  pickbeeper",
            "else:",
            "  turnleft",
        ]);
        assert_eq!(block.len(), 1);
        let Expression::If {
            elifs, else_block, ..
        } = &block.expressions[0]
        else {
            panic!("unexpected variant");
        };
        assert_eq!(elifs.len(), 2);
        assert_eq!(elifs[0].callable, condition("facing_north"));
        assert_eq!(elifs[0].line, 2);
        assert_eq!(elifs[1].callable, condition("facing_south"));
        assert_eq!(elifs[1].line, 4);
        assert!(else_block.is_some());
    }

    #[test]
    fn blank_lines_do_not_detach_else() {
        let block = parse_ok(&["if front_is_clear:", "  move", "", "else:", "  turnleft"]);
        assert_eq!(block.len(), 1);
        assert!(matches!(
            &block.expressions[0],
            Expression::If {
                else_block: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn parses_while() {
        let block = parse_ok(&["while front_is_clear:", "  move"]);
        let expr = &block.expressions[0];
        assert_eq!(expr.name(), "while");
        assert_eq!(expr.callable(), Some(&condition("front_is_clear")));
        let Expression::While { block: body, .. } = expr else {
            panic!("unexpected variant");
        };
        assert_eq!(body.expressions[0].line(), 1);
    }

    #[test]
    fn parses_define() {
        let block = parse_ok(&["define turnright:", "  do 3:", "    turnleft"]);
        let expr = &block.expressions[0];
        assert_eq!(expr.name(), "turnright");
        assert_eq!(expr.line(), 0);
        let Expression::Define { block: body, .. } = expr else {
            panic!("unexpected variant");
        };
        let Expression::Do {
            count,
            block: inner,
            line,
            ..
        } = &body.expressions[0]
        else {
            panic!("unexpected variant");
        };
        assert_eq!(*line, 1);
        assert_eq!(*count, 3);
        assert_eq!(inner.expressions[0].callable(), Some(&command("turnleft")));
    }

    #[test]
    fn parses_function_call() {
        let block = parse_ok(&["define turnright:", "  do 3:", "    turnleft", "turnright"]);
        assert_eq!(block.len(), 2);
        assert_eq!(
            block.expressions[1],
            Expression::Call {
                fname: "turnright".to_string(),
                line: 3
            }
        );
    }

    #[test]
    fn undefined_calls_still_parse() {
        let block = parse_ok(&["jump"]);
        assert!(matches!(&block.expressions[0], Expression::Call { fname, .. } if fname == "jump"));
    }

    #[test]
    fn parses_multiline_block() {
        let block = parse_ok(&["while front_is_clear:", "  move", "  move", "  turnleft", "move"]);
        assert_eq!(block.len(), 2);
        assert_eq!(block.expressions[0].blocks()[0].len(), 3);
    }

    #[test]
    fn parses_program_with_blank_lines_and_comments() {
        let block = parse_ok(&[
            "# turn right by turning left three times",
            "define turnright:",
            "  do 3:",
            "    turnleft",
            "",
            "if facing_north:  # only when facing north",
            "  turnright",
            "",
        ]);
        assert_eq!(block.len(), 2);
        assert_eq!(block.expressions[0].name(), "turnright");
        assert_eq!(block.expressions[1].name(), "if");
        assert_eq!(block.undefined_calls(), Vec::<(&str, usize)>::new());
    }

    #[test]
    fn procedure_named_after_a_command_is_accepted() {
        let block = parse_ok(&["define move:", "  turnleft", "move"]);
        assert_eq!(block.expressions[1].callable(), Some(&command("move")));
    }

    #[test]
    fn binds_against_the_given_capabilities() {
        let caps = Capabilities::new(["jump"], ["on_ground"]).expect("capabilities");
        let block = Parser::new("while on_ground:\n  jump\nmove", &caps)
            .parse()
            .expect("parse");
        let body = block.expressions[0].blocks()[0];
        assert_eq!(body.expressions[0].callable(), Some(&command("jump")));
        assert!(matches!(&block.expressions[1], Expression::Call { fname, .. } if fname == "move"));

        let err = Parser::new("if front_is_clear:\n  jump", &caps)
            .parse()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unrecognized conditional expression \"front_is_clear\". line: 1"
        );
    }

    #[test]
    fn exposes_the_token_stream() {
        let caps = Capabilities::karel();
        let mut parser = Parser::new("move\nmove", &caps);
        assert_eq!(parser.get_num_tokens(), 3);
        assert_eq!(parser.get_token().kind, TokenKind::Identifier);
        assert_eq!(parser.get_token().kind, TokenKind::Newline);
    }

    #[test]
    fn parsers_share_capabilities_across_threads() {
        let caps = Capabilities::karel();
        let caps = &caps;
        let sources = ["move", "do 2:\n  turnleft", "while front_is_clear:\n  move"];
        std::thread::scope(|scope| {
            let handles: Vec<_> = sources
                .iter()
                .map(|&source| scope.spawn(move || Parser::new(source, caps).parse()))
                .collect();
            for handle in handles {
                let block = handle.join().expect("thread").expect("parse");
                assert_eq!(block.len(), 1);
            }
        });
    }

    #[rstest]
    #[case::do_without_number(&["do n: move"], "Expected number after do. line: 1")]
    #[case::do_zero_times(&["do 0:", "  move"], "Expected number after do. line: 1")]
    #[case::do_count_overflows(&["do 99999999999:", "  move"], "Expected number after do. line: 1")]
    #[case::unknown_condition(
        &["if not-a-valid-condition:", "  move"],
        "Unrecognized conditional expression \"not\". line: 1"
    )]
    #[case::unknown_elif_condition(
        &["if facing_north:", "  move", "elif not-a-valid-condition:", "  move"],
        "Unrecognized conditional expression \"not\". line: 3"
    )]
    #[case::missing_if_condition(
        &["if:", "  move"],
        "Expected a conditional expression after an if. line: 1"
    )]
    #[case::missing_elif_condition(
        &["if facing_north:", "  move", "elif:", "  move"],
        "Expected a conditional expression after an elif. line: 3"
    )]
    #[case::missing_while_condition(
        &["while:", "  move"],
        "Expected a conditional expression after a while. line: 1"
    )]
    #[case::elif_without_if(&["elif:", "  move"], "elif statement can only come after an if statement. line: 1")]
    #[case::else_without_if(&["else:", "  move"], "else statement can only come after an if statement. line: 1")]
    #[case::second_else(
        &["if facing_north:", "  move", "else:", "  move", "else:", "  move"],
        "else statement can only come after an if statement. line: 5"
    )]
    #[case::define_without_name(&["define:", "  move"], "Expected a function name after define. line: 1")]
    #[case::define_without_colon(&["define foo", "  move"], "Expected a colon. line: 1")]
    #[case::define_with_two_names(&["define foo bar", "  move"], "Expected a colon. line: 1")]
    #[case::content_after_colon(&["define foo: move"], "Expected a newline. line: 1")]
    #[case::missing_indent(&["define foo:", "move"], "Expected an indented block. line: 2")]
    #[case::header_at_end_of_input(&["define foo:"], "Expected an indented block. line: 1")]
    #[case::two_statements_on_a_line(&["move move"], "Expected a newline. line: 1")]
    #[case::over_indented_line(&["move", "  move"], "Unexpected indent. line: 2")]
    #[case::inconsistent_dedent(&["define foo:", "    move", "  move"], "Unexpected indent. line: 3")]
    #[case::stray_colon(&[": move"], "Expected a statement. line: 1")]
    fn reports_syntax_errors(#[case] lines: &[&str], #[case] expected: &str) {
        let err = parse(lines).unwrap_err();
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn reports_the_first_error_only() {
        let err = parse(&["do n:", "  move", "elif:"]).unwrap_err();
        assert_eq!(err, SyntaxError::new(EXPECTED_NUMBER, 1));
    }
}
