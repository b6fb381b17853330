//! Positioned error accumulation.
//!
//! Every assembler stage collects the problems it finds and only fails once
//! its whole pass is complete, so a single run reports as much as possible.
//! A failed stage renders as its header followed by one
//! `TYPE row:column -> message` line per error.

use std::fmt;

pub const ARGUMENT_PROCESSOR_ERRORS: &str = "Argument Processor Errors:";
pub const PREPROCESSOR_ERRORS: &str = "Preprocessor Errors:";
pub const LEXER_ERRORS: &str = "Lexer Errors:";
pub const PARSER_ERRORS: &str = "Parser Errors:";
pub const INSTRUCTION_POOL_ERRORS: &str = "Instruction Pool Errors:";
pub const SEMANTIC_ANALYSER_ERRORS: &str = "Semantic Analyser Errors:";

pub const INVALID_SYNTAX: &str = "Invalid Syntax Error";

/// An error category paired with its fixed message text.
#[derive(Debug, Copy, Clone)]
pub struct Message {
    pub kind: &'static str,
    pub text: &'static str,
}

const fn message(kind: &'static str, text: &'static str) -> Message {
    Message { kind, text }
}

mod kind {
    pub const SYNTAX: &str = "Syntax Error";
    pub const UNKNOWN_OPTION: &str = "Unknown Option Error";
    pub const INVALID_VALUE: &str = "Invalid Value Error";
    pub const MINIMUM_VALUE: &str = "Minimum Value Error";
    pub const INVALID_LABEL: &str = "Invalid Label Error";
    pub const BRANCH_LABEL: &str = "Branch Label Error";
    pub const VARIABLE_LABEL: &str = "Variable Label Error";
    pub const INVALID_OPERANDS: &str = "Invalid Operands Error";
    pub const INVALID_ADDRESSING_MODE: &str = "Invalid Addressing Mode Error";
    pub const INVALID_REGISTER: &str = "Invalid Register Error";
}

// Configuration directives.
pub const SINGLE_KEY_VALUE_PAIR: Message =
    message(kind::SYNTAX, "Should contain a single key : value pair");
pub const UNKNOWN_CONFIG_OPTION: Message =
    message(kind::UNKNOWN_OPTION, "Unknown configuration option");
pub const SIGN_SPECIFIED: Message = message(
    kind::INVALID_VALUE,
    "Don't specify the sign of a configuration value",
);
pub const INVALID_CONFIG_VALUE: Message = message(
    kind::INVALID_VALUE,
    "Configuration value must contain digits only",
);
pub const MINIMUM_VALUE: Message = message(kind::MINIMUM_VALUE, "Value is below its minimum");

// Lexing.
pub const INVALID_VALUE: Message =
    message(kind::INVALID_VALUE, "Value contains non-value character");
pub const INVALID_LABEL: Message =
    message(kind::INVALID_LABEL, "Label contains non-label character");

// Scope and symbol construction.
pub const PROC_TO_BRANCH_REDECL: Message = message(
    kind::BRANCH_LABEL,
    "Attempting to redeclare a procedure label to a branch label",
);
pub const DUPLICATE_BRANCH: Message =
    message(kind::BRANCH_LABEL, "Duplicate branch error found");
pub const DUPLICATE_VAR: Message =
    message(kind::VARIABLE_LABEL, "Duplicate variable label found");
pub const VAR_TO_BRANCH_REDECL: Message = message(
    kind::BRANCH_LABEL,
    "Attempting to redeclare a variable label to a branch label",
);
pub const PROC_TO_VAR_REDECL: Message = message(
    kind::VARIABLE_LABEL,
    "Attempting to redeclare a procedure label to a variable label",
);
pub const BRANCH_TO_VAR_REDECL: Message = message(
    kind::VARIABLE_LABEL,
    "Attempting to redeclare a branch label to a variable label",
);

// Semantic analysis.
pub const EXCESS_OPERANDS: Message = message(
    kind::INVALID_OPERANDS,
    "Too many operands supplied for the given instruction",
);
pub const REGISTER_MODE_MISMATCH: Message = message(
    kind::INVALID_ADDRESSING_MODE,
    "Non-register paired with register addressing mode",
);
pub const REGISTER_OPERAND_MISMATCH: Message = message(
    kind::INVALID_ADDRESSING_MODE,
    "Register paired with non-register addressing mode",
);
pub const UNDECLARED_LABEL: Message =
    message(kind::INVALID_LABEL, "Attempting to use an undeclared label");
pub const GPR_ZERO: Message = message(kind::INVALID_REGISTER, "Cannot access GPR 0");
pub const NO_SOURCE_OPERAND: Message = message(
    kind::INVALID_OPERANDS,
    "The source operand for a double operand instruction must be specified",
);
pub const NON_REGISTER_INP_OPERAND: Message = message(
    kind::INVALID_OPERANDS,
    "INP instruction operand must be a register",
);
pub const IMMEDIATE_MODE: Message = message(
    kind::INVALID_OPERANDS,
    "Source operand of target instruction cannot be addressed in immediate mode",
);
pub const NON_REGISTER_DESTINATION_OPERAND: Message = message(
    kind::INVALID_OPERANDS,
    "Destination operand must be a register",
);

#[derive(Debug)]
pub struct Diagnostic {
    pub row: i32,
    pub column: i32,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct Diagnostics {
    header: &'static str,
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new(header: &'static str) -> Diagnostics {
        Diagnostics {
            header,
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, row: i32, column: i32, message: Message) {
        self.record_text(row, column, message.kind, message.text.to_string());
    }

    pub fn record_text(&mut self, row: i32, column: i32, kind: &'static str, message: String) {
        self.entries.push(Diagnostic {
            row,
            column,
            kind,
            message,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Yield `value` when the pass recorded nothing, the accumulated errors
    /// otherwise.
    pub fn into_result<T>(self, value: T) -> Result<T, Diagnostics> {
        if self.entries.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header)?;
        for entry in &self.entries {
            write!(
                f,
                "\n{} {}:{} -> {}",
                entry.kind, entry.row, entry.column, entry.message
            )?;
        }
        Ok(())
    }
}
