//! The Chadsembly instruction set: 27 operations identified by mnemonic and
//! encoded by their position in the declaration order below.

/// Keyword that declares a variable rather than naming a machine operation.
pub const DAT: &str = "DAT";

pub const INSTRUCTION_COUNT: usize = 27;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Suspend execution of the program.
    HLT,
    /// Add the source value onto the destination register.
    ADD,
    /// Subtract the source value from the destination register.
    SUB,
    /// Store the destination register's bits into the source address.
    STA,
    /// Do nothing for one cycle.
    NOP,
    /// Load the source bits into the destination register.
    LDA,
    /// Branch unconditionally to the source address.
    BRA,
    /// Branch to the source address when the destination register is zero.
    BRZ,
    /// Branch to the source address when the destination register is not
    /// negative.
    BRP,
    /// Read an integer from input into the source register.
    INP,
    /// Print the source value as a decimal integer.
    OUT,
    /// Print the source value as a character.
    OUTC,
    /// Print the source operand's raw bits.
    OUTB,
    /// Bitwise AND of the destination with the source mask.
    AND,
    /// Bitwise OR of the destination with the source mask.
    OR,
    /// Bitwise NOT of the source, stored into the destination.
    NOT,
    /// Bitwise XOR of the destination with the source mask.
    XOR,
    /// Logical shift left of the destination by the source value.
    LSL,
    /// Logical shift right of the destination by the source value.
    LSR,
    /// Arithmetic shift left of the destination by the source value.
    ASL,
    /// Arithmetic shift right of the destination by the source value.
    ASR,
    /// Circular shift left of the destination by the source value.
    CSL,
    /// Circular shift right of the destination by the source value.
    CSR,
    /// Circular shift left through the carry bit.
    CSLC,
    /// Circular shift right through the carry bit.
    CSRC,
    /// Record the return address in the RR and jump to the source address.
    CALL,
    /// Jump back to the address held in the RR.
    RET,
}

impl Instruction {
    pub const ALL: [Instruction; INSTRUCTION_COUNT] = [
        Instruction::HLT,
        Instruction::ADD,
        Instruction::SUB,
        Instruction::STA,
        Instruction::NOP,
        Instruction::LDA,
        Instruction::BRA,
        Instruction::BRZ,
        Instruction::BRP,
        Instruction::INP,
        Instruction::OUT,
        Instruction::OUTC,
        Instruction::OUTB,
        Instruction::AND,
        Instruction::OR,
        Instruction::NOT,
        Instruction::XOR,
        Instruction::LSL,
        Instruction::LSR,
        Instruction::ASL,
        Instruction::ASR,
        Instruction::CSL,
        Instruction::CSR,
        Instruction::CSLC,
        Instruction::CSRC,
        Instruction::CALL,
        Instruction::RET,
    ];

    pub fn from_mnemonic(word: &str) -> Option<Instruction> {
        Instruction::ALL
            .iter()
            .find(|instruction| instruction.mnemonic() == word)
            .copied()
    }

    pub fn from_opcode(opcode: i64) -> Option<Instruction> {
        let index = usize::try_from(opcode).ok()?;
        Instruction::ALL.get(index).copied()
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Instruction::HLT => "HLT",
            Instruction::ADD => "ADD",
            Instruction::SUB => "SUB",
            Instruction::STA => "STA",
            Instruction::NOP => "NOP",
            Instruction::LDA => "LDA",
            Instruction::BRA => "BRA",
            Instruction::BRZ => "BRZ",
            Instruction::BRP => "BRP",
            Instruction::INP => "INP",
            Instruction::OUT => "OUT",
            Instruction::OUTC => "OUTC",
            Instruction::OUTB => "OUTB",
            Instruction::AND => "AND",
            Instruction::OR => "OR",
            Instruction::NOT => "NOT",
            Instruction::XOR => "XOR",
            Instruction::LSL => "LSL",
            Instruction::LSR => "LSR",
            Instruction::ASL => "ASL",
            Instruction::ASR => "ASR",
            Instruction::CSL => "CSL",
            Instruction::CSR => "CSR",
            Instruction::CSLC => "CSLC",
            Instruction::CSRC => "CSRC",
            Instruction::CALL => "CALL",
            Instruction::RET => "RET",
        }
    }

    pub fn opcode(self) -> usize {
        self as usize
    }

    /// How many operands the instruction accepts at most.
    pub fn operands(self) -> usize {
        match self {
            Instruction::HLT | Instruction::NOP | Instruction::RET => 0,
            Instruction::INP
            | Instruction::OUT
            | Instruction::OUTC
            | Instruction::OUTB
            | Instruction::CALL => 1,
            _ => 2,
        }
    }

    /// Instructions whose source operand names a location to write or jump
    /// to, so an immediate value is meaningless there.
    pub fn rejects_immediate_source(self) -> bool {
        matches!(
            self,
            Instruction::STA
                | Instruction::BRA
                | Instruction::BRZ
                | Instruction::BRP
                | Instruction::CALL
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_follow_declaration_order() {
        assert_eq!(Instruction::HLT.opcode(), 0);
        assert_eq!(Instruction::LDA.opcode(), 5);
        assert_eq!(Instruction::OUTB.opcode(), 12);
        assert_eq!(Instruction::RET.opcode(), 26);
    }

    #[test]
    fn mnemonics_round_trip() {
        for instruction in Instruction::ALL {
            assert_eq!(
                Instruction::from_mnemonic(instruction.mnemonic()),
                Some(instruction)
            );
            assert_eq!(
                Instruction::from_opcode(instruction.opcode() as i64),
                Some(instruction)
            );
        }
    }

    #[test]
    fn unknown_lookups_fail() {
        assert_eq!(Instruction::from_mnemonic("MOV"), None);
        assert_eq!(Instruction::from_mnemonic(DAT), None);
        assert_eq!(Instruction::from_opcode(27), None);
        assert_eq!(Instruction::from_opcode(-1), None);
    }

    #[test]
    fn operand_counts_match_the_instruction_set() {
        assert_eq!(Instruction::HLT.operands(), 0);
        assert_eq!(Instruction::CALL.operands(), 1);
        assert_eq!(Instruction::INP.operands(), 1);
        assert_eq!(Instruction::ADD.operands(), 2);
        assert_eq!(Instruction::CSLC.operands(), 2);
    }

    #[test]
    fn store_and_branch_sources_reject_immediates() {
        assert!(Instruction::STA.rejects_immediate_source());
        assert!(Instruction::BRZ.rejects_immediate_source());
        assert!(Instruction::CALL.rejects_immediate_source());
        assert!(!Instruction::LDA.rejects_immediate_source());
        assert!(!Instruction::OUT.rejects_immediate_source());
    }
}
