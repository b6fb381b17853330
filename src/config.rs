//! Machine configuration and the `!KEY=VALUE` directives that set it.
//!
//! Directives arrive from two places with identical syntax: extra
//! command-line arguments, and lines in the source file itself. Both are
//! processed before assembly proper and the resulting [`Config`] is
//! read-only from then on.

use crate::diagnostics::{self, Diagnostics};
use crate::token::{is_line_break, Position};

pub const DIRECTIVE_PREFIX: char = '!';
pub const COMMENT_PREFIX: char = ';';
const DELIMITER: char = '=';

const MEMORY_KEY: &str = "MEMORY";
const REGISTERS_KEY: &str = "REGISTERS";
const CLOCK_KEY: &str = "CLOCK";

#[derive(Debug, Clone)]
pub struct Config {
    /// Number of data memory cells.
    pub memory: usize,
    /// Number of general-purpose registers.
    pub registers: usize,
    /// Delay between cycles in milliseconds.
    pub clock: u64,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            memory: 100,
            registers: 3,
            clock: 0,
        }
    }
}

impl Config {
    fn minimum(key: &str) -> Option<i64> {
        match key {
            MEMORY_KEY => Some(100),
            REGISTERS_KEY => Some(3),
            CLOCK_KEY => Some(0),
            _ => None,
        }
    }

    fn set(&mut self, key: &str, value: i64) {
        match key {
            MEMORY_KEY => self.memory = value as usize,
            REGISTERS_KEY => self.registers = value as usize,
            CLOCK_KEY => self.clock = value as u64,
            _ => {}
        }
    }

    /// Apply the directives passed on the command line after the file path.
    /// Each argument is reported as its own row.
    pub fn apply_arguments(&mut self, arguments: &[String]) -> Result<(), Diagnostics> {
        let mut errors = Diagnostics::new(diagnostics::ARGUMENT_PROCESSOR_ERRORS);
        for (index, argument) in arguments.iter().enumerate() {
            self.apply_directive(argument, index as i32 + 1, 1, &mut errors);
        }
        errors.into_result(())
    }

    /// Scan the source for `!` directives, skipping comments, and apply each
    /// one at its source position. The source itself is left untouched; the
    /// lexer discards directive lines on its own pass.
    pub fn apply_source(&mut self, source: &str) -> Result<(), Diagnostics> {
        let mut errors = Diagnostics::new(diagnostics::PREPROCESSOR_ERRORS);
        let chars: Vec<char> = source.chars().collect();
        let mut directives: Vec<(String, i32, i32)> = Vec::new();
        let mut position = Position::start();
        let mut index = 0;

        while index < chars.len() {
            match chars[index] {
                COMMENT_PREFIX => {
                    while index < chars.len() && !is_line_break(chars[index]) {
                        position.advance(chars[index]);
                        index += 1;
                    }
                }
                DIRECTIVE_PREFIX => {
                    let (row, column) = (position.row, position.column);
                    let start = index;
                    position.advance(chars[index]);
                    index += 1;
                    while index < chars.len()
                        && !is_line_break(chars[index])
                        && chars[index] != DIRECTIVE_PREFIX
                        && chars[index] != COMMENT_PREFIX
                    {
                        position.advance(chars[index]);
                        index += 1;
                    }
                    directives.push((chars[start..index].iter().collect(), row, column));
                }
                c => {
                    position.advance(c);
                    index += 1;
                }
            }
        }

        for (directive, row, column) in directives {
            self.apply_directive(&directive, row, column, &mut errors);
        }
        errors.into_result(())
    }

    fn apply_directive(
        &mut self,
        directive: &str,
        row: i32,
        start_column: i32,
        errors: &mut Diagnostics,
    ) {
        let tokens = split_directive(directive, row, start_column);
        let (key, value) = match tokens.as_slice() {
            [key, value] => (key, value),
            [] => return,
            [first, ..] => {
                errors.record(first.row, first.column, diagnostics::SINGLE_KEY_VALUE_PAIR);
                return;
            }
        };

        if Config::minimum(&key.text).is_none() {
            errors.record(key.row, key.column, diagnostics::UNKNOWN_CONFIG_OPTION);
            return;
        }
        if value.text.starts_with(['+', '-']) {
            errors.record(value.row, value.column, diagnostics::SIGN_SPECIFIED);
            return;
        }
        if value.text.chars().any(|c| !c.is_ascii_digit()) {
            errors.record(value.row, value.column, diagnostics::INVALID_CONFIG_VALUE);
            return;
        }
        let Ok(parsed) = value.text.parse::<i64>() else {
            errors.record(value.row, value.column, diagnostics::INVALID_CONFIG_VALUE);
            return;
        };
        // Checked above: the key names a known option.
        let minimum = Config::minimum(&key.text).unwrap_or_default();
        if parsed < minimum {
            errors.record(value.row, value.column, diagnostics::MINIMUM_VALUE);
            return;
        }
        self.set(&key.text, parsed);
    }
}

struct DirectiveToken {
    text: String,
    row: i32,
    column: i32,
}

/// Split a directive into upper-cased words on whitespace and `=`, keeping
/// the column each word starts in.
fn split_directive(directive: &str, row: i32, start_column: i32) -> Vec<DirectiveToken> {
    let chars: Vec<char> = directive.chars().collect();
    let mut tokens = Vec::new();
    let mut column = start_column;
    let mut index = 0;

    if chars.first() == Some(&DIRECTIVE_PREFIX) {
        index += 1;
        column += 1;
    }

    while index < chars.len() {
        let c = chars[index];
        if c.is_whitespace() || c == DELIMITER {
            index += 1;
            column += 1;
            continue;
        }
        let start_index = index;
        let token_column = column;
        while index < chars.len() && !chars[index].is_whitespace() && chars[index] != DELIMITER {
            index += 1;
            column += 1;
        }
        tokens.push(DirectiveToken {
            text: chars[start_index..index]
                .iter()
                .collect::<String>()
                .to_uppercase(),
            row,
            column: token_column,
        });
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(errors: &Diagnostics, index: usize) -> String {
        let entry = &errors.entries()[index];
        format!("{} {}:{} -> {}", entry.kind, entry.row, entry.column, entry.message)
    }

    #[test]
    fn defaults_match_the_option_minimums() {
        let config = Config::default();
        assert_eq!(config.memory, 100);
        assert_eq!(config.registers, 3);
        assert_eq!(config.clock, 0);
    }

    #[test]
    fn arguments_update_the_configuration() {
        let mut config = Config::default();
        config
            .apply_arguments(&["!MEMORY=200".to_string(), "!registers = 5".to_string()])
            .unwrap();
        assert_eq!(config.memory, 200);
        assert_eq!(config.registers, 5);
    }

    #[test]
    fn source_directives_update_the_configuration() {
        let mut config = Config::default();
        let source = "; a comment\n!CLOCK=250\nLDA #1, %ACC\n!MEMORY = 150\n";
        config.apply_source(source).unwrap();
        assert_eq!(config.clock, 250);
        assert_eq!(config.memory, 150);
    }

    #[test]
    fn directives_inside_comments_are_ignored() {
        let mut config = Config::default();
        config.apply_source("; !MEMORY=900\n").unwrap();
        assert_eq!(config.memory, 100);
    }

    #[test]
    fn unknown_options_are_rejected() {
        let mut config = Config::default();
        let errors = config
            .apply_arguments(&["!SPEED=9".to_string()])
            .unwrap_err();
        assert_eq!(
            entry(&errors, 0),
            "Unknown Option Error 1:2 -> Unknown configuration option"
        );
    }

    #[test]
    fn signed_and_non_numeric_values_are_rejected() {
        let mut config = Config::default();
        let errors = config
            .apply_arguments(&["!MEMORY=-200".to_string(), "!CLOCK=fast".to_string()])
            .unwrap_err();
        assert_eq!(
            entry(&errors, 0),
            "Invalid Value Error 1:9 -> Don't specify the sign of a configuration value"
        );
        assert_eq!(
            entry(&errors, 1),
            "Invalid Value Error 2:8 -> Configuration value must contain digits only"
        );
    }

    #[test]
    fn values_below_the_minimum_are_rejected() {
        let mut config = Config::default();
        let errors = config
            .apply_arguments(&["!MEMORY=50".to_string()])
            .unwrap_err();
        assert_eq!(
            entry(&errors, 0),
            "Minimum Value Error 1:9 -> Value is below its minimum"
        );
        assert_eq!(config.memory, 100);
    }

    #[test]
    fn a_directive_needs_exactly_one_pair() {
        let mut config = Config::default();
        let errors = config
            .apply_source("!MEMORY=200=300\n")
            .unwrap_err();
        assert_eq!(
            entry(&errors, 0),
            "Syntax Error 1:2 -> Should contain a single key : value pair"
        );
    }
}
