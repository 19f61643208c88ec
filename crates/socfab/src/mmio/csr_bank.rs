use super::BusDevice;
use crate::bus::mask_data;
use crate::csr::{Access, BankMap, RegisterBankLayout};
use crate::error::DeviceError;
use tracing::debug;

#[derive(Debug)]
struct BankState {
    name: String,
    words: Vec<u64>,
    writable: Vec<bool>,
}

/// Serves every bank of a [`RegisterBankLayout`] behind one register-bus port.
///
/// Offsets are relative to the layout origin. Multi-word registers are
/// stored least significant word first.
#[derive(Debug)]
pub struct CsrBankDevice {
    granularity: u64,
    stride: u64,
    data_bytes: u32,
    banks: Vec<Option<BankState>>,
}

impl CsrBankDevice {
    pub fn new(layout: &RegisterBankLayout) -> Self {
        let slots = layout
            .banks()
            .iter()
            .map(|b| b.index as usize + 1)
            .max()
            .unwrap_or(0);
        let mut banks: Vec<Option<BankState>> = (0..slots).map(|_| None).collect();
        let word_mask = if layout.data_width >= 64 {
            u64::MAX
        } else {
            (1u64 << layout.data_width) - 1
        };

        for bank in layout.banks() {
            let count = bank.word_count as usize;
            let mut words = vec![0u64; count];
            let mut writable = vec![true; count];
            if let BankMap::Registers { registers } = &bank.map {
                for reg in registers {
                    for w in 0..reg.words {
                        let slot = (reg.offset + w) as usize;
                        let shift = w * u64::from(layout.data_width);
                        words[slot] = reg.reset.checked_shr(shift as u32).unwrap_or(0) & word_mask;
                        writable[slot] = reg.access == Access::ReadWrite;
                    }
                }
            }
            banks[bank.index as usize] = Some(BankState {
                name: bank.name.clone(),
                words,
                writable,
            });
        }

        Self {
            granularity: layout.granularity,
            stride: layout.stride,
            data_bytes: layout.data_width / 8,
            banks,
        }
    }

    fn locate(&mut self, offset: u64) -> Result<(&mut BankState, usize), DeviceError> {
        let index = (offset / self.granularity) as usize;
        let word = ((offset % self.granularity) / self.stride) as usize;
        match self.banks.get_mut(index).and_then(Option::as_mut) {
            Some(bank) if word < bank.words.len() => Ok((bank, word)),
            _ => Err(DeviceError::Unmapped { offset }),
        }
    }
}

impl BusDevice for CsrBankDevice {
    fn name(&self) -> &str {
        "csr"
    }

    fn read(&mut self, offset: u64, _sel: u16) -> Result<u128, DeviceError> {
        let (bank, word) = self.locate(offset)?;
        Ok(u128::from(bank.words[word]))
    }

    fn write(&mut self, offset: u64, data: u128, sel: u16) -> Result<(), DeviceError> {
        let data_bytes = self.data_bytes;
        let (bank, word) = self.locate(offset)?;
        if !bank.writable[word] {
            return Err(DeviceError::ReadOnly { offset });
        }
        let mut value = u128::from(bank.words[word]);
        for i in 0..data_bytes {
            if sel & (1 << i) != 0 {
                let mask = 0xFFu128 << (8 * i);
                value = (value & !mask) | (data & mask);
            }
        }
        bank.words[word] = mask_data(value, data_bytes) as u64;
        debug!("CSR {}[{}] <- {:#X}", bank.name, word, bank.words[word]);
        Ok(())
    }
}
