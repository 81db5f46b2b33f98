//! Raw 32-byte directory entries.
//!
//! Layout:
//! - Byte 0: Status (user number, 0xE5 free, 0x20 label, 0x21 stamps)
//! - Bytes 1-8: Filename (space-padded, high bits are F1-F8)
//! - Bytes 9-11: Extension (space-padded, high bits are RO, SYS, ARCV)
//! - Byte 12: Extent number, low 5 bits (EX)
//! - Byte 13: Bytes used in the last record (S1)
//! - Byte 14: Extent number, high 6 bits (S2)
//! - Byte 15: Record count in this extent (RC)
//! - Bytes 16-31: Block pointers, 16 x 8 bit or 8 x 16 bit

use bitflags::bitflags;

/// Size of a directory entry in bytes.
pub const ENTRY_SIZE: usize = 32;

/// Size of a CP/M record in bytes.
pub const RECORD_SIZE: usize = 128;

/// Bytes covered by one logical extent.
pub const EXTENT_BYTES: usize = 16384;

/// Highest logical extent EX and S2 can hold together (5 + 6 bits).
pub const MAX_EXTENT: usize = 0x7FF;

/// Largest file a directory can describe.
pub const MAX_FILE_BYTES: u64 = (MAX_EXTENT as u64 + 1) * EXTENT_BYTES as u64;

pub const STATUS_FREE: u8 = 0xE5;
pub const STATUS_LABEL: u8 = 0x20;
pub const STATUS_STAMPS: u8 = 0x21;

bitflags! {
    /// File attributes, decoded from the high bits of the name.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attributes: u32 {
        const F1 = 1 << 0;
        const F2 = 1 << 1;
        const F3 = 1 << 2;
        const F4 = 1 << 3;
        const F5 = 1 << 4;
        const F6 = 1 << 5;
        const F7 = 1 << 6;
        const F8 = 1 << 7;
        const READ_ONLY = 1 << 8;
        const SYSTEM = 1 << 9;
        const ARCHIVE = 1 << 10;
        /// Password required to delete.
        const PW_DELETE = 1 << 11;
        /// Password required to write.
        const PW_WRITE = 1 << 12;
        /// Password required to read.
        const PW_READ = 1 << 13;
    }
}

impl Attributes {
    /// Flags that live in the high bits of name and extension.
    pub const NAME_BITS: Attributes = Attributes::from_bits_retain(0x7FF);
    /// Flags a user may change through `set_attributes`.
    pub const SETTABLE: Attributes = Attributes::F1
        .union(Attributes::F2)
        .union(Attributes::F3)
        .union(Attributes::F4)
        .union(Attributes::READ_ONLY)
        .union(Attributes::SYSTEM)
        .union(Attributes::ARCHIVE);

    /// Gather attribute bits from the raw name and extension bytes.
    pub fn from_name_bits(name: &[u8; 8], ext: &[u8; 3]) -> Self {
        let mut bits = 0u32;
        for (i, &b) in name.iter().chain(ext.iter()).enumerate() {
            if b & 0x80 != 0 {
                bits |= 1 << i;
            }
        }
        Attributes::from_bits_retain(bits)
    }

    /// Set the high bits of `name` and `ext` from these attributes.
    pub fn apply_to_name(self, name: &mut [u8; 8], ext: &mut [u8; 3]) {
        for (i, b) in name.iter_mut().chain(ext.iter_mut()).enumerate() {
            *b &= 0x7F;
            if self.bits() & (1 << i) != 0 {
                *b |= 0x80;
            }
        }
    }
}

/// Width of the block pointers in a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerWidth {
    Byte,
    Word,
}

impl PointerWidth {
    pub fn for_blocks(blocks: usize) -> Self {
        if blocks < 256 {
            PointerWidth::Byte
        } else {
            PointerWidth::Word
        }
    }

    /// Pointers per entry.
    pub fn count(self) -> usize {
        match self {
            PointerWidth::Byte => 16,
            PointerWidth::Word => 8,
        }
    }
}

/// The block pointer list of one extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockList {
    width: PointerWidth,
    raw: [u8; 16],
}

impl BlockList {
    pub fn empty(width: PointerWidth) -> Self {
        Self::from_raw(width, [0; 16])
    }

    pub fn from_raw(width: PointerWidth, raw: [u8; 16]) -> Self {
        Self { width, raw }
    }

    pub fn len(&self) -> usize {
        self.width.count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().all(|b| b == 0)
    }

    /// Block number at `index`; 0 means unallocated.
    pub fn get(&self, index: usize) -> usize {
        match self.width {
            PointerWidth::Byte => self.raw[index] as usize,
            PointerWidth::Word => {
                u16::from_le_bytes([self.raw[2 * index], self.raw[2 * index + 1]]) as usize
            }
        }
    }

    pub fn set(&mut self, index: usize, block: usize) {
        match self.width {
            PointerWidth::Byte => self.raw[index] = block as u8,
            PointerWidth::Word => {
                self.raw[2 * index..2 * index + 2].copy_from_slice(&(block as u16).to_le_bytes())
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).map(|i| self.get(i))
    }

    pub fn clear(&mut self) {
        self.raw = [0; 16];
    }

    pub fn raw(&self) -> &[u8; 16] {
        &self.raw
    }
}

/// Byte view of one directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEntry(pub [u8; ENTRY_SIZE]);

impl RawEntry {
    pub fn status(&self) -> u8 {
        self.0[0]
    }

    /// Filename bytes with attribute bits.
    pub fn name(&self) -> [u8; 8] {
        let mut name = [0; 8];
        name.copy_from_slice(&self.0[1..9]);
        name
    }

    /// Extension bytes with attribute bits.
    pub fn ext(&self) -> [u8; 3] {
        let mut ext = [0; 3];
        ext.copy_from_slice(&self.0[9..12]);
        ext
    }

    pub fn set_name(&mut self, name: &[u8; 8], ext: &[u8; 3]) {
        self.0[1..9].copy_from_slice(name);
        self.0[9..12].copy_from_slice(ext);
    }

    /// Extent number assembled from EX and S2.
    pub fn extent(&self) -> u16 {
        (self.0[12] & 0x1F) as u16 | (((self.0[14] & 0x3F) as u16) << 5)
    }

    pub fn set_extent(&mut self, extent: u16) {
        self.0[12] = (extent & 0x1F) as u8;
        self.0[14] = ((extent >> 5) & 0x3F) as u8;
    }

    /// S1: bytes used in the last record, 0 meaning all 128.
    pub fn s1(&self) -> u8 {
        self.0[13]
    }

    pub fn rc(&self) -> u8 {
        self.0[15]
    }

    pub fn pointers(&self) -> [u8; 16] {
        let mut raw = [0; 16];
        raw.copy_from_slice(&self.0[16..32]);
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_bits() {
        let mut name = *b"HELLO   ";
        let mut ext = *b"COM";
        name[0] |= 0x80;
        ext[0] |= 0x80;
        ext[1] |= 0x80;
        let attrs = Attributes::from_name_bits(&name, &ext);
        assert_eq!(
            attrs,
            Attributes::F1 | Attributes::READ_ONLY | Attributes::SYSTEM
        );

        let mut name2 = *b"HELLO   ";
        let mut ext2 = *b"COM";
        attrs.apply_to_name(&mut name2, &mut ext2);
        assert_eq!(name2, name);
        assert_eq!(ext2, ext);
    }

    #[test]
    fn test_attribute_values() {
        assert_eq!(Attributes::READ_ONLY.bits(), 256);
        assert_eq!(Attributes::ARCHIVE.bits(), 1024);
        assert_eq!(Attributes::PW_READ.bits(), 8192);
    }

    #[test]
    fn test_word_pointers() {
        let mut list = BlockList::empty(PointerWidth::Word);
        assert_eq!(list.len(), 8);
        list.set(3, 0x1234);
        assert_eq!(list.get(3), 0x1234);
        assert_eq!(list.raw()[6], 0x34);
        assert_eq!(list.raw()[7], 0x12);
        assert!(!list.is_empty());
    }

    #[test]
    fn test_byte_pointers() {
        let mut list = BlockList::empty(PointerWidth::Byte);
        assert_eq!(list.len(), 16);
        list.set(15, 200);
        assert_eq!(list.iter().last(), Some(200));
        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn test_extent_number() {
        let mut raw = RawEntry([0; ENTRY_SIZE]);
        raw.set_extent(100);
        assert_eq!(raw.0[12], 100 & 0x1F);
        assert_eq!(raw.0[14], 3);
        assert_eq!(raw.extent(), 100);
    }
}
