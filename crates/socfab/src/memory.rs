//! Sparse byte-addressed backing store for simulated memories.
//!
//! Bridge windows are hundreds of megabytes long while a simulation touches a
//! handful of words, so storage is allocated per 4 KiB page on first write.
//! Unwritten bytes read as zero.

use crate::bus::{lane, set_lane};
use std::collections::HashMap;

const PAGE_BITS: u32 = 12;
const PAGE_SIZE: usize = 1 << PAGE_BITS;

#[derive(Debug, Default, Clone)]
pub struct SparseMemory {
    pages: HashMap<u64, Box<[u8; PAGE_SIZE]>>,
}

impl SparseMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_byte(&self, addr: u64) -> u8 {
        self.pages
            .get(&(addr >> PAGE_BITS))
            .map_or(0, |page| page[(addr as usize) & (PAGE_SIZE - 1)])
    }

    pub fn write_byte(&mut self, addr: u64, value: u8) {
        let page = self
            .pages
            .entry(addr >> PAGE_BITS)
            .or_insert_with(|| Box::new([0; PAGE_SIZE]));
        page[(addr as usize) & (PAGE_SIZE - 1)] = value;
    }

    /// Little-endian word of `bytes` bytes starting at `addr`
    pub fn read_word(&self, addr: u64, bytes: u32) -> u128 {
        let mut word = 0;
        for i in 0..bytes {
            set_lane(&mut word, i, self.read_byte(addr + u64::from(i)));
        }
        word
    }

    /// Write the lanes of `data` selected by `strobe`
    pub fn write_word(&mut self, addr: u64, data: u128, strobe: u16, bytes: u32) {
        for i in 0..bytes {
            if strobe & (1 << i) != 0 {
                self.write_byte(addr + u64::from(i), lane(data, i));
            }
        }
    }

    /// Pages allocated so far
    pub fn resident_pages(&self) -> usize {
        self.pages.len()
    }
}
