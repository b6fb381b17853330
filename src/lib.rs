#![allow(clippy::upper_case_acronyms)] // Mnemonics like HLT and LDA read better fully capitalised!

//! An assembler and virtual machine for the Chadsembly language.
//!
//! Source text runs through five stages: lexing, parsing, scope splitting,
//! semantic analysis and code generation. The result is a [`Memory`] image
//! of equal-width binary words that a [`Cpu`] executes with a plain
//! fetch/decode/execute loop.

use std::fmt;
use std::io;

pub use crate::addressing_modes::AddressingMode;
pub use crate::analyser::SemanticAnalyser;
pub use crate::bits::BitString;
pub use crate::codegen::{CodeGenerator, Layout};
pub use crate::config::Config;
pub use crate::cpu::Cpu;
pub use crate::diagnostics::Diagnostics;
pub use crate::instructions::Instruction;
pub use crate::lexer::Lexer;
pub use crate::memory::Memory;
pub use crate::parser::Parser;
pub use crate::registers::SpecialRegister;
pub use crate::scopes::{Program, Scope, Symbol, SymbolKind, SymbolTable};
pub use crate::token::{Position, Token, TokenKind};

mod addressing_modes;
mod analyser;
mod bits;
mod codegen;
mod config;
mod cpu;
mod diagnostics;
mod instructions;
mod lexer;
mod memory;
mod parser;
mod registers;
mod scopes;
mod token;

/// Run the whole assembler pipeline over `source`, yielding the memory
/// image ready for execution. The configuration must already have had its
/// directives applied.
pub fn assemble(source: &str, config: &Config) -> Result<Memory, AssembleError> {
    let tokens = Lexer::new(source).tokenize()?;
    log::debug!("lexed {} tokens", tokens.len());

    Parser::new(&tokens).check()?;

    let mut program = Program::from_tokens(tokens)?;
    log::debug!(
        "split {} procedure scope(s) from the global scope",
        program.procedures.len()
    );

    SemanticAnalyser::new().analyse(&mut program)?;

    let memory = CodeGenerator::new(config).generate(&mut program)?;
    log::debug!("generated {}-bit instruction words", Layout::new(config).word_bits());
    Ok(memory)
}

/// Why assembly stopped: either the source was rejected with positioned
/// diagnostics, or laying out the image faulted.
#[derive(Debug)]
pub enum AssembleError {
    Rejected(Diagnostics),
    Fault(RuntimeError),
}

impl From<Diagnostics> for AssembleError {
    fn from(diagnostics: Diagnostics) -> AssembleError {
        AssembleError::Rejected(diagnostics)
    }
}

impl From<RuntimeError> for AssembleError {
    fn from(fault: RuntimeError) -> AssembleError {
        AssembleError::Fault(fault)
    }
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssembleError::Rejected(diagnostics) => diagnostics.fmt(f),
            AssembleError::Fault(fault) => fault.fmt(f),
        }
    }
}

/// A fault that stops the machine (or the layout pass) outright.
#[derive(Debug)]
pub enum RuntimeError {
    /// An address outside the register/memory pool.
    SegmentationFault(i64),
    /// `INP` read something that was not an integer.
    InvalidInput,
    /// A fetched word's operation field decodes to nothing.
    InvalidOperation(i64),
    /// `OUTC` was handed a value with no character for it.
    InvalidCharacter(i64),
    Io(io::Error),
}

impl From<io::Error> for RuntimeError {
    fn from(error: io::Error) -> RuntimeError {
        RuntimeError::Io(error)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::SegmentationFault(address) => write!(
                f,
                "Segmentation Fault: Attempted to access memory address {address}"
            ),
            RuntimeError::InvalidInput => {
                write!(f, "Runtime Error: Input could not be interpreted as an integer")
            }
            RuntimeError::InvalidOperation(opcode) => {
                write!(f, "Runtime Error: No machine operation with opcode {opcode}")
            }
            RuntimeError::InvalidCharacter(value) => {
                write!(f, "Runtime Error: Value {value} cannot be output as a character")
            }
            RuntimeError::Io(error) => write!(f, "Runtime Error: {error}"),
        }
    }
}
