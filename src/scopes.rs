//! Splitting the token stream into scopes and building symbol tables.
//!
//! A program has one global scope plus a scope per procedure, where a
//! procedure is a braced block named by the label written before its
//! opening brace. Variable declarations (`LABEL DAT [value]`) are lifted
//! out of the token stream into the symbol table here; branch labels and
//! procedure names stay behind as symbols to be given addresses during
//! code generation.

use crate::diagnostics::{self, Diagnostics};
use crate::token::{Token, TokenKind};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    /// A label on an instruction; the value is first the instruction's
    /// index within its scope, later its final address.
    Branch,
    /// A `DAT` declaration; the value is first the literal initialiser,
    /// later the address the variable was placed at.
    Variable,
    /// A procedure name; the value becomes the address of the procedure's
    /// first instruction.
    Procedure,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub value: i64,
    pub kind: SymbolKind,
}

impl Symbol {
    fn unplaced(kind: SymbolKind) -> Symbol {
        Symbol { value: -1, kind }
    }
}

/// A name-to-symbol map that keeps insertion order, so variables are laid
/// out in memory in declaration order. Scopes hold few symbols; a linear
/// scan is plenty.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: Vec<(String, Symbol)>,
}

impl SymbolTable {
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, symbol)| symbol)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.entries
            .iter_mut()
            .find(|(entry, _)| entry == name)
            .map(|(_, symbol)| symbol)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn insert(&mut self, name: String, symbol: Symbol) {
        match self.get_mut(&name) {
            Some(existing) => *existing = symbol,
            None => self.entries.push((name, symbol)),
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Symbol)> {
        self.entries
            .iter_mut()
            .map(|(name, symbol)| (name.as_str(), symbol))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Scope {
    pub tokens: Vec<Token>,
    pub symbols: SymbolTable,
    pub instruction_count: usize,
    pub variable_count: usize,
}

#[derive(Debug)]
pub struct Program {
    pub globals: Scope,
    /// Procedure scopes in declaration order; layout depends on it.
    pub procedures: Vec<(String, Scope)>,
}

impl Program {
    /// Split the token stream into scopes and populate each scope's symbol
    /// table, recording redeclarations as errors.
    pub fn from_tokens(tokens: Vec<Token>) -> Result<Program, Diagnostics> {
        let mut errors = Diagnostics::new(diagnostics::INSTRUCTION_POOL_ERRORS);
        let mut program = split_scopes(tokens);

        for (name, _) in &program.procedures {
            program
                .globals
                .symbols
                .insert(name.clone(), Symbol::unplaced(SymbolKind::Procedure));
        }

        build_symbols(&mut program.globals, &mut errors);
        for (_, scope) in &mut program.procedures {
            build_symbols(scope, &mut errors);
        }

        errors.into_result(program)
    }
}

fn split_scopes(tokens: Vec<Token>) -> Program {
    let mut globals = Scope::default();
    let mut procedures: Vec<(String, Scope)> = Vec::new();
    let mut index = 0;

    while index < tokens.len() {
        if tokens[index].kind == TokenKind::LeftBrace {
            // The last meaningful token before the brace names the
            // procedure; it and any terminator after it leave the global
            // stream.
            while globals
                .tokens
                .last()
                .is_some_and(|token| token.kind == TokenKind::End)
            {
                globals.tokens.pop();
            }
            let name = globals
                .tokens
                .pop()
                .map(|token| token.text)
                .unwrap_or_default();

            // Skip the brace and the terminator that follows it.
            index = (index + 2).min(tokens.len());
            let start = index;
            while index < tokens.len() && tokens[index].kind != TokenKind::RightBrace {
                index += 1;
            }
            let scope = Scope {
                tokens: tokens[start..index].to_vec(),
                ..Scope::default()
            };
            match procedures.iter_mut().find(|(entry, _)| *entry == name) {
                Some((_, existing)) => *existing = scope,
                None => procedures.push((name, scope)),
            }
            // Skip the closing brace and the terminator after it.
            index += 2;
        } else {
            globals.tokens.push(tokens[index].clone());
            index += 1;
        }
    }

    Program {
        globals,
        procedures,
    }
}

fn build_symbols(scope: &mut Scope, errors: &mut Diagnostics) {
    let mut statements = 0;
    let mut index = 0;
    while index < scope.tokens.len() {
        let kind = scope.tokens[index].kind;
        let next_kind = scope.tokens.get(index + 1).map(|token| token.kind);
        if kind == TokenKind::Label
            && matches!(
                next_kind,
                Some(TokenKind::Instruction | TokenKind::AssemblyDirective)
            )
        {
            declare_label(scope, index, statements, errors);
        } else if kind == TokenKind::Instruction {
            statements += 1;
        }
        index += 1;
    }
    scope.instruction_count = statements;
}

fn declare_label(scope: &mut Scope, index: usize, statements: usize, errors: &mut Diagnostics) {
    let label = scope.tokens[index].clone();
    let following = scope.tokens[index + 1].kind;

    if let Some(existing) = scope.symbols.get(&label.text) {
        record_redeclaration(existing.kind, following, &label, errors);
        return;
    }

    match following {
        TokenKind::AssemblyDirective => {
            let value = scope
                .tokens
                .get(index + 2)
                .filter(|token| token.kind == TokenKind::Value)
                .map_or(0, |token| parse_literal(&token.text));
            remove_declaration(scope, index);
            scope.variable_count += 1;
            scope.symbols.insert(
                label.text,
                Symbol {
                    value,
                    kind: SymbolKind::Variable,
                },
            );
        }
        TokenKind::Instruction => {
            scope.symbols.insert(
                label.text,
                Symbol {
                    value: statements as i64,
                    kind: SymbolKind::Branch,
                },
            );
        }
        _ => {}
    }
}

fn record_redeclaration(
    existing: SymbolKind,
    following: TokenKind,
    label: &Token,
    errors: &mut Diagnostics,
) {
    let message = match (following, existing) {
        (TokenKind::Instruction, SymbolKind::Procedure) => diagnostics::PROC_TO_BRANCH_REDECL,
        (TokenKind::Instruction, SymbolKind::Branch) => diagnostics::DUPLICATE_BRANCH,
        (TokenKind::Instruction, SymbolKind::Variable) => diagnostics::VAR_TO_BRANCH_REDECL,
        (TokenKind::AssemblyDirective, SymbolKind::Procedure) => diagnostics::PROC_TO_VAR_REDECL,
        (TokenKind::AssemblyDirective, SymbolKind::Branch) => diagnostics::BRANCH_TO_VAR_REDECL,
        (TokenKind::AssemblyDirective, SymbolKind::Variable) => diagnostics::DUPLICATE_VAR,
        _ => return,
    };
    errors.record(label.row, label.column, message);
}

/// Drop the `LABEL DAT [value]` tokens, leaving the statement terminator in
/// place.
fn remove_declaration(scope: &mut Scope, index: usize) {
    while index < scope.tokens.len() && scope.tokens[index].kind != TokenKind::End {
        scope.tokens.remove(index);
    }
}

/// Parse a decimal literal, wrapping at the native word rather than
/// failing: the encoding wraps every value modulo the word width anyway.
pub fn parse_literal(text: &str) -> i64 {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let mut value: i64 = 0;
    for c in digits.chars() {
        value = value
            .wrapping_mul(10)
            .wrapping_add(i64::from(c.to_digit(10).unwrap_or(0)));
    }
    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}
