//! Semantic checking and operand normalisation.
//!
//! Beyond validating each instruction's operands, this stage rewrites the
//! token stream into a uniform shape: omitted operands become `%ACC`,
//! omitted addressing modes are inferred from the operand (`%` for a
//! register, `@` for a label or value), and a separator is planted between
//! the operand pairs. Code generation can then read every instruction's
//! operands at fixed offsets.

use crate::addressing_modes::AddressingMode;
use crate::diagnostics::{self, Diagnostics};
use crate::instructions::Instruction;
use crate::registers::SpecialRegister;
use crate::scopes::{Program, SymbolTable};
use crate::token::{Token, TokenKind};

/// An operand as it sits in the normalised stream: an addressing mode token
/// followed by a value token.
struct Operand {
    mode: Token,
    value: Token,
}

impl Operand {
    fn mode_sigil(&self) -> char {
        self.mode.text.chars().next().unwrap_or('\0')
    }
}

pub struct SemanticAnalyser {
    errors: Diagnostics,
}

impl Default for SemanticAnalyser {
    fn default() -> SemanticAnalyser {
        SemanticAnalyser::new()
    }
}

impl SemanticAnalyser {
    pub fn new() -> SemanticAnalyser {
        SemanticAnalyser {
            errors: Diagnostics::new(diagnostics::SEMANTIC_ANALYSER_ERRORS),
        }
    }

    pub fn analyse(mut self, program: &mut Program) -> Result<(), Diagnostics> {
        {
            let globals = &mut program.globals;
            self.analyse_scope(&mut globals.tokens, &globals.symbols, &globals.symbols);
        }
        let globals = &program.globals.symbols;
        for (_, scope) in &mut program.procedures {
            self.analyse_scope(&mut scope.tokens, &scope.symbols, globals);
        }
        self.errors.into_result(())
    }

    fn analyse_scope(
        &mut self,
        tokens: &mut Vec<Token>,
        local: &SymbolTable,
        global: &SymbolTable,
    ) {
        let mut index = 0;
        while index < tokens.len() {
            if tokens[index].kind == TokenKind::Instruction {
                self.analyse_instruction(tokens, index, local, global);
            }
            index += 1;
        }
    }

    fn analyse_instruction(
        &mut self,
        tokens: &mut Vec<Token>,
        index: usize,
        local: &SymbolTable,
        global: &SymbolTable,
    ) {
        let token = tokens[index].clone();
        let Some(instruction) = Instruction::from_mnemonic(&token.text) else {
            return;
        };

        if count_operands(tokens, index) > instruction.operands() {
            self.errors
                .record(token.row, token.column, diagnostics::EXCESS_OPERANDS);
            return;
        }

        if instruction.operands() > 1 && kind_at(tokens, index + 1) == TokenKind::End {
            self.errors
                .record(token.row, token.column, diagnostics::NO_SOURCE_OPERAND);
        }

        if instruction.operands() > 0 {
            let source = normalise_operand(tokens, index + 1);
            self.analyse_operand(&source, local, global);

            if instruction == Instruction::INP
                && source.mode_sigil() != AddressingMode::Register.sigil()
            {
                self.errors.record(
                    token.row,
                    token.column,
                    diagnostics::NON_REGISTER_INP_OPERAND,
                );
            }
            if instruction.rejects_immediate_source()
                && source.mode_sigil() == AddressingMode::Immediate.sigil()
            {
                self.errors
                    .record(token.row, token.column, diagnostics::IMMEDIATE_MODE);
            }
        }

        if instruction.operands() > 1 {
            let destination = normalise_operand(tokens, index + 3);
            self.analyse_operand(&destination, local, global);

            if destination.mode_sigil() != AddressingMode::Register.sigil() {
                self.errors.record(
                    token.row,
                    token.column,
                    diagnostics::NON_REGISTER_DESTINATION_OPERAND,
                );
            }
        }
    }

    fn analyse_operand(&mut self, operand: &Operand, local: &SymbolTable, global: &SymbolTable) {
        let register_sigil = AddressingMode::Register.sigil();
        if operand.mode_sigil() == register_sigil && operand.value.kind != TokenKind::Register {
            self.errors.record(
                operand.value.row,
                operand.value.column,
                diagnostics::REGISTER_MODE_MISMATCH,
            );
        } else if operand.mode_sigil() != register_sigil
            && operand.value.kind == TokenKind::Register
        {
            self.errors.record(
                operand.value.row,
                operand.value.column,
                diagnostics::REGISTER_OPERAND_MISMATCH,
            );
        }

        if operand.value.kind == TokenKind::Label
            && !local.contains(&operand.value.text)
            && !global.contains(&operand.value.text)
        {
            self.errors.record(
                operand.value.row,
                operand.value.column,
                diagnostics::UNDECLARED_LABEL,
            );
        } else if operand.value.kind == TokenKind::Register && operand.value.text == "0" {
            self.errors.record(
                operand.value.row,
                operand.value.column,
                diagnostics::GPR_ZERO,
            );
        }
    }
}

fn kind_at(tokens: &[Token], index: usize) -> TokenKind {
    tokens.get(index).map_or(TokenKind::End, |token| token.kind)
}

/// Operands between an instruction and its statement terminator.
fn count_operands(tokens: &[Token], index: usize) -> usize {
    let mut operands = 0;
    let mut index = index;
    while kind_at(tokens, index) != TokenKind::End {
        if matches!(
            kind_at(tokens, index),
            TokenKind::Value | TokenKind::Register | TokenKind::Label
        ) {
            operands += 1;
        }
        index += 1;
    }
    operands
}

/// Read the operand starting at `index`, inserting whatever tokens are
/// missing so the stream always holds a full mode/value pair there.
fn normalise_operand(tokens: &mut Vec<Token>, index: usize) -> Operand {
    match kind_at(tokens, index) {
        TokenKind::Separator => normalise_operand(tokens, index + 1),
        TokenKind::End => {
            let mut index = index;
            tokens.insert(
                index,
                Token::synthetic(TokenKind::Register, SpecialRegister::Accumulator.name()),
            );
            tokens.insert(
                index,
                Token::synthetic(
                    TokenKind::AddressingMode,
                    AddressingMode::Register.sigil(),
                ),
            );
            if index > 0
                && matches!(
                    tokens[index - 1].kind,
                    TokenKind::Register | TokenKind::Label | TokenKind::Value
                )
            {
                tokens.insert(index, Token::synthetic(TokenKind::Separator, ","));
                index += 1;
            }
            Operand {
                mode: tokens[index].clone(),
                value: tokens[index + 1].clone(),
            }
        }
        TokenKind::Register => {
            tokens.insert(
                index,
                Token::synthetic(
                    TokenKind::AddressingMode,
                    AddressingMode::Register.sigil(),
                ),
            );
            Operand {
                mode: tokens[index].clone(),
                value: tokens[index + 1].clone(),
            }
        }
        TokenKind::Label | TokenKind::Value => {
            tokens.insert(
                index,
                Token::synthetic(TokenKind::AddressingMode, AddressingMode::Direct.sigil()),
            );
            Operand {
                mode: tokens[index].clone(),
                value: tokens[index + 1].clone(),
            }
        }
        _ => Operand {
            mode: tokens[index].clone(),
            value: tokens[index + 1].clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::scopes::Program;

    fn analysed(source: &str) -> Program {
        let tokens = Lexer::new(source).tokenize().unwrap();
        Parser::new(&tokens).check().unwrap();
        let mut program = Program::from_tokens(tokens).unwrap();
        SemanticAnalyser::new().analyse(&mut program).unwrap();
        program
    }

    fn analysis_errors(source: &str) -> Diagnostics {
        let tokens = Lexer::new(source).tokenize().unwrap();
        Parser::new(&tokens).check().unwrap();
        let mut program = Program::from_tokens(tokens).unwrap();
        SemanticAnalyser::new()
            .analyse(&mut program)
            .unwrap_err()
    }

    fn stream(program: &Program) -> Vec<(TokenKind, &str)> {
        program
            .globals
            .tokens
            .iter()
            .map(|token| (token.kind, token.text.as_str()))
            .collect()
    }

    #[test]
    fn a_fully_spelled_statement_is_untouched() {
        let program = analysed("LDA #5, %ACC\n");
        assert_eq!(
            stream(&program),
            vec![
                (TokenKind::Instruction, "LDA"),
                (TokenKind::AddressingMode, "#"),
                (TokenKind::Value, "5"),
                (TokenKind::Separator, ","),
                (TokenKind::AddressingMode, "%"),
                (TokenKind::Register, "ACC"),
                (TokenKind::End, "/"),
                (TokenKind::End, "/"),
            ]
        );
    }

    #[test]
    fn a_missing_destination_becomes_the_accumulator() {
        let program = analysed("ADD #5\n");
        assert_eq!(
            stream(&program),
            vec![
                (TokenKind::Instruction, "ADD"),
                (TokenKind::AddressingMode, "#"),
                (TokenKind::Value, "5"),
                (TokenKind::Separator, ","),
                (TokenKind::AddressingMode, "%"),
                (TokenKind::Register, "ACC"),
                (TokenKind::End, "/"),
                (TokenKind::End, "/"),
            ]
        );
    }

    #[test]
    fn a_bare_register_operand_gains_the_register_mode() {
        let program = analysed("OUT ACC\n");
        assert_eq!(
            stream(&program),
            vec![
                (TokenKind::Instruction, "OUT"),
                (TokenKind::AddressingMode, "%"),
                (TokenKind::Register, "ACC"),
                (TokenKind::End, "/"),
                (TokenKind::End, "/"),
            ]
        );
    }

    #[test]
    fn a_bare_value_operand_gains_the_direct_mode() {
        let program = analysed("N DAT 4\nLDA N, %ACC\nOUT 3\n");
        let kinds: Vec<(TokenKind, &str)> = stream(&program);
        assert!(kinds.contains(&(TokenKind::AddressingMode, "@")));
    }

    #[test]
    fn an_instruction_with_no_operands_gains_an_accumulator_pair() {
        let program = analysed("INP\n");
        assert_eq!(
            stream(&program),
            vec![
                (TokenKind::Instruction, "INP"),
                (TokenKind::AddressingMode, "%"),
                (TokenKind::Register, "ACC"),
                (TokenKind::End, "/"),
                (TokenKind::End, "/"),
            ]
        );
    }

    #[test]
    fn zero_operand_instructions_stay_bare() {
        let program = analysed("HLT\n");
        assert_eq!(
            stream(&program),
            vec![(TokenKind::Instruction, "HLT"), (TokenKind::End, "/"), (TokenKind::End, "/")]
        );
    }

    #[test]
    fn excess_operands_are_rejected() {
        let errors = analysis_errors("OUT %ACC, %ACC\n");
        assert!(errors
            .to_string()
            .contains("Too many operands supplied for the given instruction"));
    }

    #[test]
    fn a_two_operand_instruction_needs_an_explicit_source() {
        let errors = analysis_errors("ADD\n");
        assert!(errors.to_string().contains(
            "The source operand for a double operand instruction must be specified"
        ));
    }

    #[test]
    fn register_mode_requires_a_register_operand() {
        let errors = analysis_errors("LDA %5, %ACC\n");
        assert!(errors
            .to_string()
            .contains("Non-register paired with register addressing mode"));
    }

    #[test]
    fn a_register_operand_requires_register_mode() {
        let errors = analysis_errors("LDA #ACC, %ACC\n");
        assert!(errors
            .to_string()
            .contains("Register paired with non-register addressing mode"));
    }

    #[test]
    fn labels_must_be_declared_somewhere() {
        let errors = analysis_errors("LDA MISSING, %ACC\n");
        assert!(errors
            .to_string()
            .contains("Attempting to use an undeclared label"));
    }

    #[test]
    fn procedure_code_sees_global_labels() {
        analysed("N DAT 2\nCALL F\nHLT\nF {\nLDA N, %ACC\nRET\n}\n");
    }

    #[test]
    fn register_zero_is_unreachable() {
        let errors = analysis_errors("INP %REG0\n");
        assert!(errors.to_string().contains("Cannot access GPR 0"));
    }

    #[test]
    fn inp_requires_a_register_operand() {
        let errors = analysis_errors("N DAT 0\nINP N\n");
        assert!(errors
            .to_string()
            .contains("INP instruction operand must be a register"));
    }

    #[test]
    fn branch_sources_cannot_be_immediate() {
        let errors = analysis_errors("BRA #3, %ACC\n");
        assert!(errors.to_string().contains(
            "Source operand of target instruction cannot be addressed in immediate mode"
        ));
    }

    #[test]
    fn destinations_must_be_registers() {
        let errors = analysis_errors("LDA #5, #3\n");
        assert!(errors
            .to_string()
            .contains("Destination operand must be a register"));
    }
}
