//! Protocol and width conversion between split-transaction and simple buses.
//!
//! Address translation moves whole source-bus words. When the source is wider
//! than the target, the base of the source word holding (origin-relative)
//! byte `A` is scaled by `2^address_shift`; when it is narrower, the base is
//! kept and the word packs into the lanes of a wider target word. The byte
//! offset inside the word never changes, so distinct source bytes always
//! land on distinct target bytes. Bytes are then grouped by the simple-bus
//! word they fall in, one simple transaction per touched word.

pub mod axi_to_simple;
pub mod simple_to_axi;

pub use axi_to_simple::AxiToSimple;
pub use simple_to_axi::SimpleToAxi;

use crate::bus::{lane, set_lane, SimpleRequest};
use crate::error::ConfigError;
use crate::port::Protocol;
use socfab_hw::specs::bus::{MAX_DATA_WIDTH, MIN_DATA_WIDTH};

/// Which way a bridge moves transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Split-transaction master into the simple fabric
    SplitToSimple,
    /// Simple fabric into a split-transaction slave
    SimpleToSplit,
}

/// Static description of one bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSpec {
    pub source_protocol: Protocol,
    pub target_protocol: Protocol,
    pub source_width: u32,
    pub target_width: u32,
    /// `log2(source bytes) - log2(target bytes)`
    pub address_shift: i32,
}

impl BridgeSpec {
    pub fn new(
        source_protocol: Protocol,
        source_width: u32,
        target_protocol: Protocol,
        target_width: u32,
    ) -> Result<Self, ConfigError> {
        check_width(source_width)?;
        check_width(target_width)?;

        let supported = matches!(
            (source_protocol, target_protocol),
            (Protocol::WideSplit | Protocol::WideSplitLite, Protocol::SimpleSync)
                | (Protocol::SimpleSync, Protocol::WideSplit)
        );
        if !supported {
            return Err(ConfigError::UnsupportedBridge {
                from: source_protocol,
                target: target_protocol,
            });
        }

        let address_shift = log2_bytes(source_width) as i32 - log2_bytes(target_width) as i32;
        Ok(Self {
            source_protocol,
            target_protocol,
            source_width,
            target_width,
            address_shift,
        })
    }

    pub fn direction(&self) -> Direction {
        if self.source_protocol.is_split() {
            Direction::SplitToSimple
        } else {
            Direction::SimpleToSplit
        }
    }

    /// Width of the split-transaction side in bits
    pub fn split_width(&self) -> u32 {
        match self.direction() {
            Direction::SplitToSimple => self.source_width,
            Direction::SimpleToSplit => self.target_width,
        }
    }

    /// Width of the simple side in bits
    pub fn simple_width(&self) -> u32 {
        match self.direction() {
            Direction::SplitToSimple => self.target_width,
            Direction::SimpleToSplit => self.source_width,
        }
    }

    pub fn split_bytes(&self) -> u64 {
        u64::from(self.split_width() / 8)
    }

    pub fn simple_bytes(&self) -> u64 {
        u64::from(self.simple_width() / 8)
    }

    /// Bits dropped from a byte address to form a simple-bus word address
    pub fn word_shift(&self) -> u32 {
        log2_bytes(self.simple_width())
    }

    /// Address width of the simple side, in word-address bits
    pub fn simple_address_width(&self, split_address_width: u32) -> u32 {
        split_address_width.saturating_sub(self.word_shift())
    }

    pub fn source_bytes(&self) -> u64 {
        u64::from(self.source_width / 8)
    }

    /// Map a source-side byte address onto the target side
    pub fn translate(&self, addr: u64) -> u64 {
        let offset = addr & (self.source_bytes() - 1);
        let base = addr - offset;
        (base << self.address_shift.max(0)) | offset
    }

    /// Source-side byte address that [`translate`](Self::translate) maps
    /// onto `addr`, if any
    pub fn untranslate(&self, addr: u64) -> Option<u64> {
        let offset = addr & (self.source_bytes() - 1);
        let source = ((addr - offset) >> self.address_shift.max(0)) | offset;
        (self.translate(source) == addr).then_some(source)
    }
}

fn check_width(width: u32) -> Result<(), ConfigError> {
    if !width.is_power_of_two() {
        return Err(ConfigError::WidthNotPowerOfTwo { width });
    }
    if !(MIN_DATA_WIDTH..=MAX_DATA_WIDTH).contains(&width) {
        return Err(ConfigError::WidthOutOfRange {
            width,
            min: MIN_DATA_WIDTH,
            max: MAX_DATA_WIDTH,
        });
    }
    Ok(())
}

fn log2_bytes(width: u32) -> u32 {
    (width / 8).trailing_zeros()
}

/// One simple-bus word touched by a split-side beat
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WordOp {
    pub req: SimpleRequest,
    /// (simple lane, split lane) pairs carried by this word
    pub lanes: Vec<(u32, u32)>,
}

/// Group simple-bus byte positions into per-word transactions.
///
/// `bytes` yields `(simple byte address, split lane)` in transfer order.
pub(crate) fn group_words(
    bytes: impl Iterator<Item = (u64, u32)>,
    simple_bytes: u64,
) -> Vec<WordOp> {
    let mut words: Vec<WordOp> = Vec::new();
    for (addr, split_lane) in bytes {
        let adr = addr & !(simple_bytes - 1);
        let simple_lane = (addr % simple_bytes) as u32;
        match words.last_mut() {
            Some(word) if word.req.adr == adr => word.lanes.push((simple_lane, split_lane)),
            _ => words.push(WordOp {
                req: SimpleRequest::read(adr, 0),
                lanes: vec![(simple_lane, split_lane)],
            }),
        }
    }
    words
}

/// Fill in write data and byte enables from a split-side beat
pub(crate) fn load_write(word: &mut WordOp, data: u128, strb: u16) {
    word.req.we = true;
    for &(simple_lane, split_lane) in &word.lanes {
        if strb & (1 << split_lane) != 0 {
            set_lane(&mut word.req.dat_w, simple_lane, lane(data, split_lane));
            word.req.sel |= 1 << simple_lane;
        }
    }
}

/// Select every lane a read needs
pub(crate) fn load_read(word: &mut WordOp) {
    for &(simple_lane, _) in &word.lanes {
        word.req.sel |= 1 << simple_lane;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_follows_width_ratio() {
        let down = BridgeSpec::new(Protocol::WideSplit, 64, Protocol::SimpleSync, 32).unwrap();
        assert_eq!(down.address_shift, 1);
        assert_eq!(down.direction(), Direction::SplitToSimple);
        assert_eq!(down.translate(0x100), 0x200);
        assert_eq!(down.translate(0x104), 0x204);
        assert_eq!(down.translate(0x108), 0x210);
        assert_eq!(down.untranslate(0x204), Some(0x104));
        assert_eq!(down.untranslate(0x208), None);
        assert_eq!(down.word_shift(), 2);
        assert_eq!(down.simple_address_width(32), 30);

        let up = BridgeSpec::new(Protocol::SimpleSync, 32, Protocol::WideSplit, 128).unwrap();
        assert_eq!(up.address_shift, -2);
        assert_eq!(up.direction(), Direction::SimpleToSplit);
        assert_eq!(up.translate(0x400), 0x400);
        assert_eq!(up.translate(0x404), 0x404);
        assert_eq!(up.split_width(), 128);

        let same = BridgeSpec::new(Protocol::WideSplitLite, 32, Protocol::SimpleSync, 32).unwrap();
        assert_eq!(same.address_shift, 0);
    }

    #[test]
    fn translation_never_merges_source_bytes() {
        for (src, tgt) in [(32, 64), (32, 128), (64, 32), (128, 32), (64, 128), (128, 64)] {
            let down = BridgeSpec::new(Protocol::WideSplit, src, Protocol::SimpleSync, tgt).unwrap();
            let up = BridgeSpec::new(Protocol::SimpleSync, src, Protocol::WideSplit, tgt).unwrap();
            for spec in [down, up] {
                let mut seen = std::collections::BTreeSet::new();
                for addr in 0..0x100u64 {
                    let target = spec.translate(addr);
                    assert!(seen.insert(target), "{spec:?}: {addr:#x} collides at {target:#x}");
                    assert_eq!(spec.untranslate(target), Some(addr));
                }
            }
        }
    }

    #[test]
    fn rejects_bad_widths() {
        assert_eq!(
            BridgeSpec::new(Protocol::WideSplit, 48, Protocol::SimpleSync, 32),
            Err(ConfigError::WidthNotPowerOfTwo { width: 48 })
        );
        assert!(matches!(
            BridgeSpec::new(Protocol::WideSplit, 256, Protocol::SimpleSync, 32),
            Err(ConfigError::WidthOutOfRange { width: 256, .. })
        ));
    }

    #[test]
    fn rejects_unsupported_pairs() {
        assert!(matches!(
            BridgeSpec::new(Protocol::RegisterBus, 32, Protocol::SimpleSync, 32),
            Err(ConfigError::UnsupportedBridge { .. })
        ));
        assert!(matches!(
            BridgeSpec::new(Protocol::WideSplit, 64, Protocol::WideSplit, 32),
            Err(ConfigError::UnsupportedBridge { .. })
        ));
    }

    #[test]
    fn bytes_group_by_word() {
        let words = group_words((0..8u64).map(|j| (0x202 + j, j as u32)), 4);
        let adrs: Vec<u64> = words.iter().map(|w| w.req.adr).collect();
        assert_eq!(adrs, vec![0x200, 0x204, 0x208]);
        assert_eq!(words[0].lanes, vec![(2, 0), (3, 1)]);
        assert_eq!(words[2].lanes, vec![(0, 6), (1, 7)]);
    }
}
