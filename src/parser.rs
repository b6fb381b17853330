//! Syntax checking over the token stream.
//!
//! The grammar is flat enough to express as an adjacency table: each token
//! kind allows a fixed set of successors, with a synthetic statement
//! terminator seeding the walk. Brace nesting is tracked separately since
//! procedures cannot contain procedures.

use crate::diagnostics::{self, Diagnostics};
use crate::token::{Token, TokenKind};

const AFTER_END: &[TokenKind] = &[
    TokenKind::End,
    TokenKind::Instruction,
    TokenKind::Label,
    TokenKind::RightBrace,
    TokenKind::LeftBrace,
];
const AFTER_INSTRUCTION: &[TokenKind] = &[
    TokenKind::End,
    TokenKind::AddressingMode,
    TokenKind::Value,
    TokenKind::Register,
    TokenKind::Label,
    TokenKind::RightBrace,
];
const AFTER_ADDRESSING_MODE: &[TokenKind] =
    &[TokenKind::Value, TokenKind::Register, TokenKind::Label];
const AFTER_OPERAND: &[TokenKind] = &[
    TokenKind::End,
    TokenKind::Separator,
    TokenKind::RightBrace,
    TokenKind::LeftBrace,
];
const AFTER_LABEL: &[TokenKind] = &[
    TokenKind::End,
    TokenKind::Separator,
    TokenKind::Instruction,
    TokenKind::RightBrace,
    TokenKind::LeftBrace,
    TokenKind::AssemblyDirective,
];
const AFTER_SEPARATOR: &[TokenKind] = &[
    TokenKind::AddressingMode,
    TokenKind::Value,
    TokenKind::Register,
    TokenKind::Label,
];
const AFTER_BRACE: &[TokenKind] = &[TokenKind::End];
const AFTER_ASSEMBLY_DIRECTIVE: &[TokenKind] = &[TokenKind::End, TokenKind::Value];

fn expected_after(kind: TokenKind) -> &'static [TokenKind] {
    match kind {
        TokenKind::End => AFTER_END,
        TokenKind::Instruction => AFTER_INSTRUCTION,
        TokenKind::AddressingMode => AFTER_ADDRESSING_MODE,
        TokenKind::Value | TokenKind::Register => AFTER_OPERAND,
        TokenKind::Label => AFTER_LABEL,
        TokenKind::Separator => AFTER_SEPARATOR,
        TokenKind::LeftBrace | TokenKind::RightBrace => AFTER_BRACE,
        TokenKind::AssemblyDirective => AFTER_ASSEMBLY_DIRECTIVE,
    }
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    errors: Diagnostics,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Parser<'a> {
        Parser {
            tokens,
            errors: Diagnostics::new(diagnostics::PARSER_ERRORS),
        }
    }

    pub fn check(mut self) -> Result<(), Diagnostics> {
        self.check_braces();
        self.check_adjacency();
        self.errors.into_result(())
    }

    fn check_braces(&mut self) {
        let mut open: Option<&Token> = None;
        for token in self.tokens {
            match token.kind {
                TokenKind::LeftBrace => {
                    if open.is_none() {
                        open = Some(token);
                    } else {
                        self.errors.record_text(
                            token.row,
                            token.column,
                            diagnostics::INVALID_SYNTAX,
                            "Block scopes cannot be nested".to_string(),
                        );
                    }
                }
                TokenKind::RightBrace => {
                    if open.take().is_none() {
                        self.errors.record_text(
                            token.row,
                            token.column,
                            diagnostics::INVALID_SYNTAX,
                            "Block scope was closed but never opened".to_string(),
                        );
                    }
                }
                _ => {}
            }
        }
        if let Some(token) = open {
            self.errors.record_text(
                token.row,
                token.column,
                diagnostics::INVALID_SYNTAX,
                "Block scope was opened but never closed".to_string(),
            );
        }
    }

    fn check_adjacency(&mut self) {
        // A statement terminator precedes the stream, opening the first
        // statement.
        let mut previous: Option<&Token> = None;
        for token in self.tokens {
            let previous_kind = previous.map_or(TokenKind::End, |token| token.kind);
            if !expected_after(previous_kind).contains(&token.kind) {
                self.record_mismatch(previous, token);
            }
            previous = Some(token);
        }
    }

    fn record_mismatch(&mut self, previous: Option<&Token>, token: &Token) {
        let previous_kind = previous.map_or(TokenKind::End, |token| token.kind);
        if previous_kind == TokenKind::End {
            self.errors.record_text(
                token.row,
                token.column,
                diagnostics::INVALID_SYNTAX,
                format!(
                    "Statement cannot begin with a {}",
                    token.kind.description()
                ),
            );
        } else if token.kind == TokenKind::End {
            // The previous token is real whenever its kind is not End.
            let (row, column) = previous.map_or((-1, -1), |token| (token.row, token.column));
            self.errors.record_text(
                row,
                column,
                diagnostics::INVALID_SYNTAX,
                format!(
                    "Statement cannot end with a {}",
                    previous_kind.description()
                ),
            );
        } else {
            self.errors.record_text(
                token.row,
                token.column,
                diagnostics::INVALID_SYNTAX,
                format!(
                    "{} was found after {}",
                    token.kind.description(),
                    previous_kind.description()
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn check(source: &str) -> Result<(), Diagnostics> {
        let tokens = Lexer::new(source).tokenize().unwrap();
        Parser::new(&tokens).check()
    }

    #[test]
    fn well_formed_programs_pass() {
        check("LDA #5, %ACC\nADD %REG1, %ACC\nOUT %ACC\nHLT\n").unwrap();
        check("COUNT DAT 3\nLOOP LDA COUNT, %ACC\nBRP LOOP, %ACC\n").unwrap();
        check("CALL PRINT\nHLT\nPRINT {\nRET\n}\n").unwrap();
        check("").unwrap();
    }

    #[test]
    fn a_statement_cannot_begin_with_a_value() {
        let errors = check("5 HLT\n").unwrap_err();
        assert_eq!(
            errors.to_string(),
            "Parser Errors:\n\
             Invalid Syntax Error 1:1 -> Statement cannot begin with a Value\n\
             Invalid Syntax Error 1:3 -> Instruction was found after Value"
        );
    }

    #[test]
    fn a_statement_cannot_end_with_an_addressing_mode() {
        let errors = check("LDA #\n").unwrap_err();
        assert_eq!(
            errors.to_string(),
            "Parser Errors:\n\
             Invalid Syntax Error 1:5 -> Statement cannot end with a Addressing Mode"
        );
    }

    #[test]
    fn adjacent_operands_need_a_separator() {
        let errors = check("LDA #5 5\n").unwrap_err();
        assert_eq!(
            errors.to_string(),
            "Parser Errors:\n\
             Invalid Syntax Error 1:8 -> Value was found after Value"
        );
    }

    #[test]
    fn nested_scopes_are_rejected() {
        let errors = check("A {\nB {\n}\n}\n").unwrap_err();
        let rendered = errors.to_string();
        assert!(rendered.contains("Block scopes cannot be nested"), "{rendered}");
    }

    #[test]
    fn an_unopened_scope_is_rejected() {
        let errors = check("HLT\n}\n").unwrap_err();
        assert!(errors
            .to_string()
            .contains("Block scope was closed but never opened"));
    }

    #[test]
    fn an_unclosed_scope_is_rejected() {
        let errors = check("A {\nHLT\n").unwrap_err();
        assert!(errors
            .to_string()
            .contains("Block scope was opened but never closed"));
    }
}
