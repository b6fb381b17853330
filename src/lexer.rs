//! Tokenising the source text.
//!
//! The lexer walks the source once. Directive and comment lines are skipped
//! wholesale (directives were already handled before assembly began), the
//! single-character tokens are matched directly, and anything else is read
//! as an upper-cased word and classified against the instruction set,
//! register names, addressing modes and the `DAT` keyword. Unmatched words
//! become labels.

use crate::addressing_modes::AddressingMode;
use crate::config::{COMMENT_PREFIX, DIRECTIVE_PREFIX};
use crate::diagnostics::{self, Diagnostics};
use crate::instructions::{self, Instruction};
use crate::registers::{SpecialRegister, GPR_VARIANTS};
use crate::token::{is_line_break, Position, Token, TokenKind};

const SEPARATOR: char = ',';
const LEFT_BRACE: char = '{';
const RIGHT_BRACE: char = '}';

fn is_spacing(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0B')
}

/// A character that ends a word.
fn is_delimiter(c: char) -> bool {
    c == DIRECTIVE_PREFIX
        || c == COMMENT_PREFIX
        || c == SEPARATOR
        || c == LEFT_BRACE
        || c == RIGHT_BRACE
        || is_spacing(c)
        || is_line_break(c)
        || AddressingMode::from_sigil(c).is_some()
}

pub struct Lexer {
    chars: Vec<char>,
    index: usize,
    position: Position,
    tokens: Vec<Token>,
    errors: Diagnostics,
}

impl Lexer {
    pub fn new(source: &str) -> Lexer {
        Lexer {
            chars: source.chars().collect(),
            index: 0,
            position: Position::start(),
            tokens: Vec::new(),
            errors: Diagnostics::new(diagnostics::LEXER_ERRORS),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostics> {
        self.scan();
        self.errors.into_result(self.tokens)
    }

    fn scan(&mut self) {
        while self.index < self.chars.len() {
            let c = self.chars[self.index];
            let (row, column) = (self.position.row, self.position.column);

            if c == DIRECTIVE_PREFIX || c == COMMENT_PREFIX {
                self.skip_line();
                self.tokens.push(Token::new(TokenKind::End, "/", row, column));
            } else if is_line_break(c) {
                // Consecutive statement terminators collapse into one.
                if self.tokens.last().is_some_and(|token| token.kind != TokenKind::End) {
                    self.tokens.push(Token::new(TokenKind::End, "/", row, column));
                }
            } else if c == LEFT_BRACE {
                self.tokens
                    .push(Token::new(TokenKind::LeftBrace, c, row, column));
            } else if c == RIGHT_BRACE {
                self.tokens
                    .push(Token::new(TokenKind::RightBrace, c, row, column));
            } else if c == SEPARATOR {
                self.tokens
                    .push(Token::new(TokenKind::Separator, c, row, column));
            } else if let Some(mode) = AddressingMode::from_sigil(c) {
                self.tokens.push(Token::new(
                    TokenKind::AddressingMode,
                    mode.sigil(),
                    row,
                    column,
                ));
            } else if !is_spacing(c) {
                let word = self.read_word();
                // The word read left the cursor on the delimiter; step back
                // so the shared advance below lands there again.
                self.index -= 1;
                self.position.column += word.chars().count() as i32 - 1;
                let token = self.classify(word, row, column);
                self.tokens.push(token);
            }

            self.position.advance(self.chars[self.index]);
            self.index += 1;
        }

        self.tokens.push(Token::new(
            TokenKind::End,
            "/",
            self.position.row,
            self.position.column,
        ));
    }

    /// Consume to the end of the line, stopping on the line break itself.
    fn skip_line(&mut self) {
        while self.index + 1 < self.chars.len() && !is_line_break(self.chars[self.index]) {
            self.index += 1;
        }
    }

    fn read_word(&mut self) -> String {
        let start = self.index;
        while self.index < self.chars.len() && !is_delimiter(self.chars[self.index]) {
            self.index += 1;
        }
        self.chars[start..self.index]
            .iter()
            .collect::<String>()
            .to_uppercase()
    }

    fn classify(&mut self, word: String, row: i32, column: i32) -> Token {
        // Word reads never produce an empty string: the branch is only taken
        // on a non-delimiter character.
        let first = word.chars().next().unwrap_or('\0');

        if first == '+' || first == '-' || first.is_ascii_digit() {
            self.check_value(&word, row, column);
            return Token::new(TokenKind::Value, word, row, column);
        }

        if let Some(digits) = gpr_digits(&word) {
            return Token::new(TokenKind::Register, digits, row, column);
        }

        if Instruction::from_mnemonic(&word).is_some() {
            Token::new(TokenKind::Instruction, word, row, column)
        } else if SpecialRegister::from_name(&word).is_some() {
            Token::new(TokenKind::Register, word, row, column)
        } else if let Some(mode) = AddressingMode::from_word(&word) {
            Token::new(TokenKind::AddressingMode, mode.sigil(), row, column)
        } else if word == instructions::DAT {
            Token::new(TokenKind::AssemblyDirective, word, row, column)
        } else {
            self.check_label(&word, row, column);
            Token::new(TokenKind::Label, word, row, column)
        }
    }

    fn check_value(&mut self, word: &str, row: i32, column: i32) {
        let skip = usize::from(word.starts_with(['+', '-']));
        for (offset, c) in word.chars().enumerate().skip(skip) {
            if !c.is_ascii_digit() {
                self.errors
                    .record(row, column + offset as i32, diagnostics::INVALID_VALUE);
            }
        }
    }

    fn check_label(&mut self, word: &str, row: i32, column: i32) {
        for (offset, c) in word.chars().enumerate() {
            if !c.is_ascii_alphanumeric() && c != '_' {
                self.errors
                    .record(row, column + offset as i32, diagnostics::INVALID_LABEL);
            }
        }
    }
}

/// The register number of a general-purpose register word like `REG5`, or
/// `None` when the word is not one. A bare variant with no digits is an
/// ordinary label.
fn gpr_digits(word: &str) -> Option<&str> {
    let name = word.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &word[name.len()..];
    if !digits.is_empty() && GPR_VARIANTS.contains(&name) {
        Some(digits)
    } else {
        None
    }
}
