//! Laying out the program image and emitting instruction words.
//!
//! Every word in the image has the same shape: an operation field, an
//! addressing mode field, then two signed operand fields. A negative
//! operand names a register, a non-negative one a memory address, which is
//! why the operand field carries one bit more than the larger of the two
//! spaces needs.

use crate::addressing_modes::{AddressingMode, MODE_COUNT};
use crate::bits::{bits_needed, BitString};
use crate::config::Config;
use crate::instructions::{Instruction, INSTRUCTION_COUNT};
use crate::memory::Memory;
use crate::registers::{SpecialRegister, SPECIAL_REGISTER_COUNT};
use crate::scopes::{parse_literal, Program, Scope, SymbolKind, SymbolTable};
use crate::token::{Token, TokenKind};
use crate::RuntimeError;

/// The bit widths of each instruction field, fixed by the configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Layout {
    pub operation_bits: usize,
    pub mode_bits: usize,
    pub operand_bits: usize,
}

impl Layout {
    pub fn new(config: &Config) -> Layout {
        let registers = config.registers + SPECIAL_REGISTER_COUNT;
        let operand_bits = if registers > config.memory {
            bits_needed(registers)
        } else {
            bits_needed(config.memory - 1)
        } + 1;
        Layout {
            operation_bits: bits_needed(INSTRUCTION_COUNT - 1),
            mode_bits: bits_needed(MODE_COUNT - 1),
            operand_bits,
        }
    }

    /// Width of a whole instruction word.
    pub fn word_bits(&self) -> usize {
        self.operation_bits + self.mode_bits + 2 * self.operand_bits
    }
}

pub struct CodeGenerator {
    layout: Layout,
    /// Register slots in the pool: the configured GPRs plus the specials.
    registers: usize,
    gprs: usize,
    /// Next free data slot.
    offset: i64,
    /// Next instruction slot.
    index: i64,
}

impl CodeGenerator {
    pub fn new(config: &Config) -> CodeGenerator {
        CodeGenerator {
            layout: Layout::new(config),
            registers: config.registers + SPECIAL_REGISTER_COUNT,
            gprs: config.registers,
            offset: 0,
            index: 0,
        }
    }

    /// Lay out every scope and return the finished memory image. The global
    /// scope's image comes first, then each procedure in declaration order,
    /// with a scope's variables packed directly after its instructions.
    pub fn generate(mut self, program: &mut Program) -> Result<Memory, RuntimeError> {
        self.place_procedures(program);

        let mut memory = Memory::new(
            self.registers,
            self.layout.word_bits(),
            self.layout.operand_bits,
        );

        self.place_symbols(&mut program.globals, &mut memory)?;
        self.emit_scope(
            &program.globals.tokens,
            &program.globals.symbols,
            &program.globals.symbols,
            &mut memory,
        )?;

        for (_, scope) in &mut program.procedures {
            self.place_symbols(scope, &mut memory)?;
            self.emit_scope(
                &scope.tokens,
                &scope.symbols,
                &program.globals.symbols,
                &mut memory,
            )?;
        }

        Ok(memory)
    }

    /// Give each procedure symbol the address its first instruction will
    /// land on.
    fn place_procedures(&mut self, program: &mut Program) {
        let globals = &program.globals;
        let mut offset = (globals.instruction_count + globals.variable_count) as i64;
        for (name, scope) in &program.procedures {
            if let Some(symbol) = program.globals.symbols.get_mut(name) {
                symbol.value = offset;
            }
            offset += (scope.instruction_count + scope.variable_count) as i64;
        }
    }

    /// Rebase branch symbols onto the scope's position in memory and write
    /// each variable's initial value into its slot.
    fn place_symbols(&mut self, scope: &mut Scope, memory: &mut Memory) -> Result<(), RuntimeError> {
        self.offset += scope.instruction_count as i64;
        for (_, symbol) in scope.symbols.iter_mut() {
            match symbol.kind {
                SymbolKind::Branch => symbol.value += self.index,
                SymbolKind::Variable => {
                    memory.store_value(self.offset, symbol.value)?;
                    symbol.value = self.offset;
                    self.offset += 1;
                }
                SymbolKind::Procedure => {}
            }
        }
        Ok(())
    }

    fn emit_scope(
        &mut self,
        tokens: &[Token],
        local: &SymbolTable,
        global: &SymbolTable,
        memory: &mut Memory,
    ) -> Result<(), RuntimeError> {
        for (index, token) in tokens.iter().enumerate() {
            if token.kind != TokenKind::Instruction {
                continue;
            }
            let Some(instruction) = Instruction::from_mnemonic(&token.text) else {
                continue;
            };

            // Instructions short of two operands keep the field layout with
            // a register-mode zero in the unused slots.
            let default_mode = Token::synthetic(
                TokenKind::AddressingMode,
                AddressingMode::Register.sigil(),
            );
            let default_value = Token::synthetic(TokenKind::Value, "0");

            let (source_mode, source_value) = if instruction.operands() > 0 {
                (&tokens[index + 1], &tokens[index + 2])
            } else {
                (&default_mode, &default_value)
            };
            let destination_value = if instruction.operands() > 1 {
                &tokens[index + 5]
            } else {
                &default_value
            };

            let word = self.encode(instruction, source_mode, source_value, destination_value, local, global);
            memory.store(self.index, word)?;
            self.index += 1;
        }
        self.index = self.offset;
        Ok(())
    }

    fn encode(
        &self,
        instruction: Instruction,
        source_mode: &Token,
        source_value: &Token,
        destination_value: &Token,
        local: &SymbolTable,
        global: &SymbolTable,
    ) -> BitString {
        let operation = BitString::unsigned(
            instruction.opcode() as i64,
            self.layout.operation_bits,
        );
        let mode = AddressingMode::from_word(&source_mode.text)
            .map_or(0, |mode| mode.opcode());
        let mode_field = BitString::unsigned(mode as i64, self.layout.mode_bits);
        let source = BitString::signed(
            self.resolve_operand(source_value, local, global),
            self.layout.operand_bits,
        );
        let destination = BitString::signed(
            self.resolve_operand(destination_value, local, global),
            self.layout.operand_bits,
        );
        BitString::concat([&operation, &mode_field, &source, &destination])
    }

    /// The signed integer an operand token encodes to: symbol addresses and
    /// literals stay non-negative, registers go negative.
    fn resolve_operand(&self, token: &Token, local: &SymbolTable, global: &SymbolTable) -> i64 {
        match token.kind {
            TokenKind::Label => {
                // Analysis guarantees the label resolves in one of the two
                // tables.
                local
                    .get(&token.text)
                    .or_else(|| global.get(&token.text))
                    .map_or(0, |symbol| symbol.value)
            }
            TokenKind::Value => parse_literal(&token.text),
            TokenKind::Register => match SpecialRegister::from_name(&token.text) {
                Some(register) => register.address(self.gprs),
                None => {
                    // GPR numbers wrap into 1..=G; register 0 was already
                    // rejected.
                    let number = parse_literal(&token.text);
                    -(1 + (number - 1).rem_euclid(self.gprs as i64))
                }
            },
            _ => 0,
        }
    }
}
