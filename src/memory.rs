//! The unified register and memory pool.
//!
//! Registers and addressable memory live in one array of equal-width words.
//! Addresses are signed offsets from the first memory cell: `0` upwards is
//! program and data space, `-1` down to `-R` are the registers. Anything
//! outside the pool is a segmentation fault.

use crate::bits::BitString;
use crate::RuntimeError;

#[derive(Debug)]
pub struct Memory {
    cells: Vec<BitString>,
    registers: usize,
    word_bits: usize,
}

impl Memory {
    /// An all-zero pool with `registers` register slots and as many memory
    /// cells as an operand can address.
    pub fn new(registers: usize, word_bits: usize, operand_bits: usize) -> Memory {
        let addresses = 1usize << (operand_bits - 1);
        Memory {
            cells: vec![BitString::zeros(word_bits); registers + addresses],
            registers,
            word_bits,
        }
    }

    fn index(&self, address: i64) -> Result<usize, RuntimeError> {
        let pointer = self.registers as i64 + address;
        if pointer >= 0 && (pointer as usize) < self.cells.len() {
            Ok(pointer as usize)
        } else {
            Err(RuntimeError::SegmentationFault(address))
        }
    }

    pub fn load(&self, address: i64) -> Result<&BitString, RuntimeError> {
        Ok(&self.cells[self.index(address)?])
    }

    pub fn store(&mut self, address: i64, word: BitString) -> Result<(), RuntimeError> {
        let index = self.index(address)?;
        self.cells[index] = word;
        Ok(())
    }

    /// Encode `value` as a sign-magnitude word of the pool's width and store
    /// it.
    pub fn store_value(&mut self, address: i64, value: i64) -> Result<(), RuntimeError> {
        self.store(address, BitString::signed(value, self.word_bits))
    }

    pub fn word_bits(&self) -> usize {
        self.word_bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_memory_is_zeroed_to_the_word_width() {
        let memory = Memory::new(7, 23, 8);
        assert_eq!(memory.load(0).unwrap(), &BitString::zeros(23));
        assert_eq!(memory.load(-7).unwrap(), &BitString::zeros(23));
        assert_eq!(memory.load(127).unwrap(), &BitString::zeros(23));
    }

    #[test]
    fn stores_round_trip_through_loads() {
        let mut memory = Memory::new(7, 23, 8);
        memory.store_value(5, -42).unwrap();
        assert_eq!(memory.load(5).unwrap().read_signed(), -42);
        memory.store(-1, BitString::unsigned(9, 23)).unwrap();
        assert_eq!(memory.load(-1).unwrap().read_unsigned(), 9);
    }

    #[test]
    fn accesses_outside_the_pool_fault() {
        let mut memory = Memory::new(7, 23, 8);
        assert!(matches!(
            memory.load(-8),
            Err(RuntimeError::SegmentationFault(-8))
        ));
        assert!(matches!(
            memory.store_value(128, 1),
            Err(RuntimeError::SegmentationFault(128))
        ));
    }
}
