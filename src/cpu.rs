//! Executing the program image.
//!
//! The machine runs a plain fetch/decode/execute loop over the memory
//! pool. Each cycle writes the incremented program counter back before the
//! operation runs, so branches simply overwrite it. Input and output are
//! generic so the machine can run against stdin/stdout or test buffers.

use std::io::{BufRead, Write};
use std::thread;
use std::time::Duration;

use log::trace;

use crate::addressing_modes::AddressingMode;
use crate::bits::BitString;
use crate::codegen::Layout;
use crate::config::Config;
use crate::instructions::Instruction;
use crate::memory::Memory;
use crate::registers::SpecialRegister;
use crate::RuntimeError;

/// An operand resolved against memory: where it lives, its raw word and the
/// signed value that word holds.
#[derive(Debug)]
struct MemoryValue {
    address: i64,
    bits: BitString,
    value: i64,
}

enum Step {
    Continue,
    Halt,
}

pub struct Cpu<R, W> {
    memory: Memory,
    layout: Layout,
    word_bits: usize,
    gprs: usize,
    clock: Duration,
    program_counter_address: i64,
    return_register_address: i64,
    flags_register_address: i64,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Cpu<R, W> {
    pub fn new(memory: Memory, layout: Layout, config: &Config, input: R, output: W) -> Cpu<R, W> {
        Cpu {
            memory,
            layout,
            word_bits: layout.word_bits(),
            gprs: config.registers,
            clock: Duration::from_millis(config.clock),
            program_counter_address: SpecialRegister::ProgramCounter.address(config.registers),
            return_register_address: SpecialRegister::ReturnRegister.address(config.registers),
            flags_register_address: SpecialRegister::FlagsRegister.address(config.registers),
            input,
            output,
        }
    }

    /// A short description of the machine: word shape, value ranges and how
    /// much of it there is.
    pub fn banner(&self) -> String {
        let max_operand = (1u64 << (self.layout.operand_bits - 1)) - 1;
        let max_address_value = (1u64 << (self.word_bits - 1)) - 1;
        let addresses = 1u64 << (self.layout.operand_bits - 1);
        let format = format!(
            "{} {} {} {}",
            "0".repeat(self.layout.operation_bits),
            "0".repeat(self.layout.mode_bits),
            "0".repeat(self.layout.operand_bits),
            "0".repeat(self.layout.operand_bits),
        );
        format!(
            "Chadsembly Version `{}`\n\
             {} bit operand, {} bit address bus,\n\
             Instruction Format: {}\n\
             Values -{}..{} in an Operand, Values -{}..{} in an address\n\
             {} (0..{}) memory addresses, {} (1..{}) GPRs",
            env!("CARGO_PKG_VERSION"),
            self.layout.operand_bits,
            self.word_bits,
            format,
            max_operand,
            max_operand,
            max_address_value,
            max_address_value,
            addresses,
            addresses - 1,
            self.gprs,
            self.gprs,
        )
    }

    /// Run from address zero until a `HLT` or a fault.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        let mut program_counter = 0i64;
        loop {
            if !self.clock.is_zero() {
                thread::sleep(self.clock);
            }
            let word = self.memory.load(program_counter)?.clone();
            if let Step::Halt = self.step(&word, program_counter)? {
                return Ok(());
            }
            program_counter = self.memory.load(self.program_counter_address)?.read_unsigned();
        }
    }

    /// The memory pool, exposed so a finished run can be inspected.
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Give back the output handle, usually to read what a test run wrote.
    pub fn into_output(self) -> W {
        self.output
    }

    fn step(&mut self, word: &BitString, program_counter: i64) -> Result<Step, RuntimeError> {
        self.memory.store(
            self.program_counter_address,
            BitString::unsigned(program_counter + 1, self.word_bits),
        )?;

        let mut cursor = 0;
        let operation = word.slice(cursor..cursor + self.layout.operation_bits);
        cursor += self.layout.operation_bits;
        let mode = word.slice(cursor..cursor + self.layout.mode_bits);
        cursor += self.layout.mode_bits;
        let source = word.slice(cursor..cursor + self.layout.operand_bits);
        cursor += self.layout.operand_bits;
        let destination = word.slice(cursor..cursor + self.layout.operand_bits);

        let opcode = operation.read_unsigned();
        let instruction =
            Instruction::from_opcode(opcode).ok_or(RuntimeError::InvalidOperation(opcode))?;
        let mode = AddressingMode::from_opcode(mode.read_unsigned())
            .ok_or(RuntimeError::InvalidOperation(opcode))?;

        let source = self.resolve(mode, &source)?;
        // The destination field names a register in any valid program, so
        // its mode is fixed.
        let destination = self.resolve(AddressingMode::Register, &destination)?;

        trace!(
            "{:?} source {} = {}, destination {} = {}",
            instruction,
            source.address,
            source.value,
            destination.address,
            destination.value,
        );

        self.execute(instruction, source, destination)
    }

    fn resolve(&self, mode: AddressingMode, operand: &BitString) -> Result<MemoryValue, RuntimeError> {
        let operand_value = operand.read_signed();
        let bits = self.memory.load(operand_value)?.clone();
        let value = bits.read_signed();

        match mode {
            AddressingMode::Register | AddressingMode::Direct => Ok(MemoryValue {
                address: operand_value,
                bits,
                value,
            }),
            AddressingMode::Indirect => {
                let bits = self.memory.load(value)?.clone();
                Ok(MemoryValue {
                    address: value,
                    value: bits.read_signed(),
                    bits,
                })
            }
            AddressingMode::Immediate => Ok(MemoryValue {
                address: operand_value,
                bits: BitString::signed(operand_value, self.word_bits),
                value: operand_value,
            }),
        }
    }

    fn execute(
        &mut self,
        instruction: Instruction,
        source: MemoryValue,
        destination: MemoryValue,
    ) -> Result<Step, RuntimeError> {
        match instruction {
            Instruction::HLT => return Ok(Step::Halt),
            Instruction::NOP => {}
            Instruction::ADD => {
                self.memory.store_value(
                    destination.address,
                    destination.value.wrapping_add(source.value),
                )?;
            }
            Instruction::SUB => {
                self.memory.store_value(
                    destination.address,
                    destination.value.wrapping_sub(source.value),
                )?;
            }
            Instruction::STA => {
                self.memory.store(source.address, destination.bits)?;
            }
            Instruction::LDA => {
                self.memory.store(destination.address, source.bits)?;
            }
            Instruction::BRA => {
                self.memory
                    .store_value(self.program_counter_address, source.address)?;
            }
            Instruction::BRZ => {
                if destination.value == 0 {
                    self.memory
                        .store_value(self.program_counter_address, source.address)?;
                }
            }
            Instruction::BRP => {
                if destination.value > -1 {
                    self.memory
                        .store_value(self.program_counter_address, source.address)?;
                }
            }
            Instruction::INP => {
                let value = self.read_input()?;
                self.memory.store_value(source.address, value)?;
            }
            Instruction::OUT => {
                writeln!(self.output, "{}", source.value)?;
                self.output.flush()?;
            }
            Instruction::OUTC => {
                let character = u32::try_from(source.value)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(RuntimeError::InvalidCharacter(source.value))?;
                write!(self.output, "{character}")?;
                self.output.flush()?;
            }
            Instruction::OUTB => {
                writeln!(self.output, "{}", source.bits)?;
                self.output.flush()?;
            }
            Instruction::AND => {
                self.memory
                    .store(destination.address, source.bits.and(&destination.bits))?;
            }
            Instruction::OR => {
                self.memory
                    .store(destination.address, source.bits.or(&destination.bits))?;
            }
            Instruction::NOT => {
                self.memory.store(destination.address, source.bits.not())?;
            }
            Instruction::XOR => {
                self.memory
                    .store(destination.address, source.bits.xor(&destination.bits))?;
            }
            Instruction::LSL => {
                let shift = destination.bits.logical_shift_left(source.value);
                self.write_shift(&destination, shift)?;
            }
            Instruction::LSR => {
                let shift = destination.bits.logical_shift_right(source.value);
                self.write_shift(&destination, shift)?;
            }
            Instruction::ASL => {
                let shift = destination.bits.arithmetic_shift_left(source.value);
                self.write_shift(&destination, shift)?;
            }
            Instruction::ASR => {
                let shift = destination.bits.arithmetic_shift_right(source.value);
                self.write_shift(&destination, shift)?;
            }
            Instruction::CSL => {
                if let Some(bits) = destination.bits.circular_shift_left(source.value) {
                    self.memory.store(destination.address, bits)?;
                }
            }
            Instruction::CSR => {
                if let Some(bits) = destination.bits.circular_shift_right(source.value) {
                    self.memory.store(destination.address, bits)?;
                }
            }
            Instruction::CSLC => {
                let carry = self.memory.load(self.flags_register_address)?.low_bit();
                let shift = destination
                    .bits
                    .circular_shift_left_carry(carry, source.value);
                self.write_shift(&destination, shift)?;
            }
            Instruction::CSRC => {
                let carry = self.memory.load(self.flags_register_address)?.low_bit();
                let shift = destination
                    .bits
                    .circular_shift_right_carry(carry, source.value);
                self.write_shift(&destination, shift)?;
            }
            Instruction::CALL => {
                let return_address = self.memory.load(self.program_counter_address)?.clone();
                self.memory
                    .store(self.return_register_address, return_address)?;
                self.memory
                    .store_value(self.program_counter_address, source.address)?;
            }
            Instruction::RET => {
                let return_address = self.memory.load(self.return_register_address)?.clone();
                self.memory
                    .store(self.program_counter_address, return_address)?;
            }
        }
        Ok(Step::Continue)
    }

    /// Write a shift's result and its carry into the FR; a `None` shift
    /// leaves both untouched.
    fn write_shift(
        &mut self,
        destination: &MemoryValue,
        shift: Option<(u8, BitString)>,
    ) -> Result<(), RuntimeError> {
        if let Some((carry, bits)) = shift {
            self.memory.store(
                self.flags_register_address,
                BitString::carry_word(carry, self.word_bits),
            )?;
            self.memory.store(destination.address, bits)?;
        }
        Ok(())
    }

    fn read_input(&mut self) -> Result<i64, RuntimeError> {
        write!(self.output, ">>>")?;
        self.output.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        line.trim()
            .parse::<i64>()
            .map_err(|_| RuntimeError::InvalidInput)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::analyser::SemanticAnalyser;
    use crate::codegen::CodeGenerator;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::scopes::Program;

    fn cpu_for(source: &str, input: &str) -> Cpu<Cursor<String>, Vec<u8>> {
        let config = Config::default();
        let tokens = Lexer::new(source).tokenize().unwrap();
        Parser::new(&tokens).check().unwrap();
        let mut program = Program::from_tokens(tokens).unwrap();
        SemanticAnalyser::new().analyse(&mut program).unwrap();
        let memory = CodeGenerator::new(&config).generate(&mut program).unwrap();
        Cpu::new(
            memory,
            Layout::new(&config),
            &config,
            Cursor::new(input.to_string()),
            Vec::new(),
        )
    }

    fn run(source: &str, input: &str) -> String {
        let mut cpu = cpu_for(source, input);
        cpu.run().unwrap();
        String::from_utf8(cpu.into_output()).unwrap()
    }

    #[test]
    fn arithmetic_runs_through_registers() {
        let output = run(
            "LDA #5, %ACC\nLDA #3, %REG1\nADD %REG1, %ACC\nOUT %ACC\nHLT\n",
            "",
        );
        assert_eq!(output, "8\n");
    }

    #[test]
    fn subtraction_can_go_negative() {
        let output = run("LDA #3, %ACC\nSUB #5, %ACC\nOUT %ACC\nHLT\n", "");
        assert_eq!(output, "-2\n");
    }

    #[test]
    fn input_echoes_back_out() {
        let output = run("INP %ACC\nOUT %ACC\nHLT\n", "42\n");
        assert_eq!(output, ">>>42\n");
    }

    #[test]
    fn non_numeric_input_is_a_fault() {
        let mut cpu = cpu_for("INP %ACC\nHLT\n", "not a number\n");
        assert!(matches!(cpu.run(), Err(RuntimeError::InvalidInput)));
    }

    #[test]
    fn character_output_uses_the_codepoint() {
        let output = run("LDA #65, %ACC\nOUTC %ACC\nLDA #10, %ACC\nOUTC %ACC\nHLT\n", "");
        assert_eq!(output, "A\n");
    }

    #[test]
    fn store_writes_the_destination_into_the_source_address() {
        let output = run(
            "N DAT 0\nLDA #7, %ACC\nSTA N, %ACC\nLDA N, %REG1\nOUT %REG1\nHLT\n",
            "",
        );
        assert_eq!(output, "7\n");
    }

    #[test]
    fn indirect_operands_follow_the_pointer() {
        // Five instructions put the variables at 5 and 6; P ends up holding
        // N's address, so loading >P reads N's value.
        let output = run(
            "N DAT 9\nP DAT 0\nLDA #5, %REG1\nSTA P, %REG1\nLDA >P, %ACC\nOUT %ACC\nHLT\n",
            "",
        );
        assert_eq!(output, "9\n");
    }

    #[test]
    fn a_countdown_loop_branches_until_negative() {
        let output = run(
            "LOOP LDA COUNT, %ACC\nOUT %ACC\nSUB #1, %ACC\nSTA COUNT, %ACC\nBRP LOOP, %ACC\nHLT\nCOUNT DAT 3\n",
            "",
        );
        assert_eq!(output, "3\n2\n1\n0\n");
    }

    #[test]
    fn branch_if_zero_skips_when_nonzero() {
        let output = run(
            "LDA #1, %ACC\nBRZ SKIP, %ACC\nOUT %ACC\nSKIP HLT\n",
            "",
        );
        assert_eq!(output, "1\n");
    }

    #[test]
    fn procedures_call_and_return() {
        let output = run(
            "CALL PRINT\nHLT\nPRINT {\nLDA #65, %ACC\nOUTC %ACC\nRET\n}\n",
            "",
        );
        assert_eq!(output, "A");
    }

    #[test]
    fn bitwise_operations_mask_registers() {
        let output = run(
            "LDA #12, %ACC\nLDA #10, %REG1\nAND %REG1, %ACC\nOUT %ACC\nHLT\n",
            "",
        );
        assert_eq!(output, "8\n");
    }

    #[test]
    fn shifts_move_values_and_set_the_carry() {
        // 3 << 1 = 6 with no carry; the FR stays zero.
        let output = run(
            "LDA #3, %ACC\nLSL #1, %ACC\nOUT %ACC\nOUT %FR\nHLT\n",
            "",
        );
        assert_eq!(output, "6\n0\n");
    }

    #[test]
    fn a_right_shift_of_one_carries_the_low_bit() {
        let output = run(
            "LDA #3, %ACC\nLSR #1, %ACC\nOUT %ACC\nOUT %FR\nHLT\n",
            "",
        );
        assert_eq!(output, "1\n1\n");
    }

    #[test]
    fn a_zero_shift_leaves_the_flags_untouched() {
        let output = run(
            "LDA #3, %ACC\nLSR #1, %ACC\nLSL #0, %ACC\nOUT %FR\nHLT\n",
            "",
        );
        // The first shift set the carry; the no-op shift must not clear it.
        assert_eq!(output, "1\n");
    }

    #[test]
    fn circular_shifts_preserve_all_bits() {
        let output = run(
            "LDA #5, %ACC\nCSL #3, %ACC\nCSR #3, %ACC\nOUT %ACC\nHLT\n",
            "",
        );
        assert_eq!(output, "5\n");
    }

    #[test]
    fn carry_rotation_threads_the_flag_bit() {
        // Set the carry, park a one in REG1's top bit, then rotate left
        // through the carry: the top bit moves into the carry and the old
        // carry arrives at the bottom.
        let output = run(
            "LDA #1, %FR\nLDA #1, %REG1\nCSR #1, %REG1\nCSLC #1, %REG1\nOUT %REG1\nOUTB %FR\nHLT\n",
            "",
        );
        assert_eq!(output, format!("1\n{}1\n", "0".repeat(22)));
    }

    #[test]
    fn branching_into_zeroed_memory_halts() {
        // Every untouched cell is a zero word, which decodes as HLT.
        let mut cpu = cpu_for("BRA @127, %ACC\nHLT\n", "");
        cpu.run().unwrap();
    }

    #[test]
    fn an_operand_outside_the_pool_is_a_segmentation_fault() {
        let mut cpu = cpu_for("LDA #-120, %ACC\nHLT\n", "");
        assert!(matches!(
            cpu.run(),
            Err(RuntimeError::SegmentationFault(-120))
        ));
    }

    #[test]
    fn the_banner_describes_the_machine() {
        let cpu = cpu_for("HLT\n", "");
        let banner = cpu.banner();
        assert!(banner.contains("8 bit operand, 23 bit address bus"));
        assert!(banner.contains("Instruction Format: 00000 00 00000000 00000000"));
        assert!(banner.contains("128 (0..127) memory addresses, 3 (1..3) GPRs"));
    }
}
