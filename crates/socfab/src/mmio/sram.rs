use super::BusDevice;
use crate::error::DeviceError;
use crate::memory::SparseMemory;

/// Byte-addressed RAM on the simple bus
#[derive(Debug)]
pub struct Sram {
    name: String,
    size: u64,
    word_bytes: u32,
    mem: SparseMemory,
}

impl Sram {
    pub fn new(name: impl Into<String>, size: u64, word_bytes: u32) -> Self {
        Self {
            name: name.into(),
            size,
            word_bytes,
            mem: SparseMemory::new(),
        }
    }

    pub fn memory(&self) -> &SparseMemory {
        &self.mem
    }

    fn check(&self, offset: u64) -> Result<u64, DeviceError> {
        if offset >= self.size {
            return Err(DeviceError::Unmapped { offset });
        }
        Ok(offset & !u64::from(self.word_bytes - 1))
    }
}

impl BusDevice for Sram {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, offset: u64, _sel: u16) -> Result<u128, DeviceError> {
        let addr = self.check(offset)?;
        Ok(self.mem.read_word(addr, self.word_bytes))
    }

    fn write(&mut self, offset: u64, data: u128, sel: u16) -> Result<(), DeviceError> {
        let addr = self.check(offset)?;
        self.mem.write_word(addr, data, sel, self.word_bytes);
        Ok(())
    }
}
