//! Typed directory slots.
//!
//! Each 32-byte entry is decoded once at mount into a [`DirSlot`] and
//! encoded back only when the directory is flushed.

use super::entry::{
    Attributes, BlockList, PointerWidth, RawEntry, ENTRY_SIZE, STATUS_FREE, STATUS_LABEL,
    STATUS_STAMPS,
};
use crate::format::Dialect;
use crate::name::CpmName;
use crate::time::CpmStamp;

/// One extent of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExtent {
    pub user: u8,
    /// 7-bit name, space padded.
    pub name: [u8; 8],
    /// 7-bit extension, space padded.
    pub ext: [u8; 3],
    pub attrs: Attributes,
    pub extent: u16,
    /// Bytes used in the last record, 0 meaning a full record.
    pub last_record_bytes: u8,
    pub record_count: u8,
    pub blocks: BlockList,
}

impl FileExtent {
    /// A zero-length first extent for `name`.
    pub fn new(name: &CpmName, width: PointerWidth) -> Self {
        FileExtent {
            user: name.user,
            name: name.name,
            ext: name.ext,
            attrs: Attributes::empty(),
            extent: 0,
            last_record_bytes: 0,
            record_count: 0,
            blocks: BlockList::empty(width),
        }
    }

    pub fn matches(&self, name: &CpmName) -> bool {
        self.user == name.user && self.name == name.name && self.ext == name.ext
    }

    pub fn cpm_name(&self) -> CpmName {
        CpmName {
            user: self.user,
            name: self.name,
            ext: self.ext,
        }
    }

    /// Bytes of the file up to the end of this extent.
    ///
    /// An extent with no records contributes nothing.
    pub fn end_offset(&self) -> u64 {
        let base = self.extent as u64 * 16384;
        if self.record_count == 0 {
            return base;
        }
        let last = if self.last_record_bytes == 0 {
            128
        } else {
            self.last_record_bytes as u64
        };
        base + (self.record_count as u64 - 1) * 128 + last
    }

    /// Grow the extent number and counts so the file reaches `end`.
    ///
    /// Counts never shrink.
    pub fn extend_to(&mut self, end: u64) {
        if end == 0 || end <= self.end_offset() {
            return;
        }
        self.extent = ((end - 1) / 16384) as u16;
        self.record_count = (((end - 1) % 16384) / 128 + 1) as u8;
        self.last_record_bytes = (end % 128) as u8;
    }

    fn decode(raw: &RawEntry, width: PointerWidth) -> Self {
        let mut name = raw.name();
        let mut ext = raw.ext();
        let attrs = Attributes::from_name_bits(&name, &ext);
        Attributes::empty().apply_to_name(&mut name, &mut ext);
        FileExtent {
            user: raw.status(),
            name,
            ext,
            attrs,
            extent: raw.extent(),
            last_record_bytes: raw.s1(),
            record_count: raw.rc(),
            blocks: BlockList::from_raw(width, raw.pointers()),
        }
    }

    fn encode(&self) -> RawEntry {
        let mut raw = RawEntry([0; ENTRY_SIZE]);
        raw.0[0] = self.user;
        let mut name = self.name;
        let mut ext = self.ext;
        (self.attrs & Attributes::NAME_BITS).apply_to_name(&mut name, &mut ext);
        raw.set_name(&name, &ext);
        raw.set_extent(self.extent);
        raw.0[13] = self.last_record_bytes;
        raw.0[15] = self.record_count;
        raw.0[16..32].copy_from_slice(self.blocks.raw());
        raw
    }
}

/// A CP/M 3 password record (status 16-31).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordEntry {
    raw: RawEntry,
}

impl PasswordEntry {
    /// User number of the protected file.
    pub fn user(&self) -> u8 {
        self.raw.status() - 16
    }

    /// Protection mode byte (byte 12).
    pub fn mode(&self) -> u8 {
        self.raw.0[12]
    }

    /// Decoded password, space padded.
    pub fn password(&self) -> [u8; 8] {
        let key = self.raw.0[13];
        let mut pw = [0; 8];
        for (j, b) in pw.iter_mut().enumerate() {
            *b = (self.raw.0[16 + 7 - j] ^ key) & 0x7F;
        }
        pw
    }

    /// The 24-byte line shown in `[passwd]`.
    pub fn record(&self) -> [u8; 24] {
        let mut rec = [b' '; 24];
        let user = self.user();
        rec[0] = b'0' + user / 10;
        rec[1] = b'0' + user % 10;
        for (dst, src) in rec[2..10].iter_mut().zip(self.raw.name()) {
            *dst = src & 0x7F;
        }
        let ext = self.raw.ext();
        rec[10] = if ext[0] & 0x7F == b' ' { b' ' } else { b'.' };
        for (dst, src) in rec[11..14].iter_mut().zip(ext) {
            *dst = src & 0x7F;
        }
        rec[14] = b' ';
        rec[15..23].copy_from_slice(&self.password());
        rec[23] = b'\n';
        rec
    }
}

/// Flag in the label entry: a label is present.
pub const LABEL_EXISTS: u8 = 0x01;
/// Flag in the label entry: stamps record creation rather than access.
pub const LABEL_CREATE_STAMPS: u8 = 0x10;

/// The CP/M 3 volume label (status 0x20).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEntry {
    raw: RawEntry,
}

impl LabelEntry {
    pub fn flags(&self) -> u8 {
        self.raw.0[12]
    }

    pub fn exists(&self) -> bool {
        self.flags() & LABEL_EXISTS != 0
    }

    pub fn create_stamps(&self) -> bool {
        self.flags() & LABEL_CREATE_STAMPS != 0
    }

    /// The 12-byte content of `[label]`.
    pub fn record(&self) -> [u8; 12] {
        let mut rec = [b'\n'; 12];
        for (dst, src) in rec[..8].iter_mut().zip(self.raw.name()) {
            *dst = src & 0x7F;
        }
        for (dst, src) in rec[8..11].iter_mut().zip(self.raw.ext()) {
            *dst = src & 0x7F;
        }
        rec
    }
}

/// Stamps for one of the three files sharing a date-stamp slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StampRecord {
    /// Creation or access time, depending on the volume label.
    pub create_access: CpmStamp,
    pub update: CpmStamp,
    /// Password mode bits (0x20 delete, 0x40 write, 0x80 read).
    pub protect: u8,
}

impl StampRecord {
    pub fn protection(&self) -> Attributes {
        let mut attrs = Attributes::empty();
        if self.protect & 0x20 != 0 {
            attrs |= Attributes::PW_DELETE;
        }
        if self.protect & 0x40 != 0 {
            attrs |= Attributes::PW_WRITE;
        }
        if self.protect & 0x80 != 0 {
            attrs |= Attributes::PW_READ;
        }
        attrs
    }
}

/// The date-stamp slot (status 0x21) closing every group of four entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateStamps {
    pub records: [StampRecord; 3],
    raw: RawEntry,
}

impl DateStamps {
    fn decode(raw: &RawEntry) -> Self {
        let mut records = [StampRecord::default(); 3];
        for (k, rec) in records.iter_mut().enumerate() {
            let base = 1 + 10 * k;
            rec.create_access = CpmStamp::from_bytes(&raw.0[base..base + 4]);
            rec.update = CpmStamp::from_bytes(&raw.0[base + 4..base + 8]);
            rec.protect = raw.0[base + 8];
        }
        DateStamps { records, raw: *raw }
    }

    fn encode(&self) -> RawEntry {
        let mut raw = self.raw;
        for (k, rec) in self.records.iter().enumerate() {
            let base = 1 + 10 * k;
            raw.0[base..base + 4].copy_from_slice(&rec.create_access.to_bytes());
            raw.0[base + 4..base + 8].copy_from_slice(&rec.update.to_bytes());
            raw.0[base + 8] = rec.protect;
        }
        raw
    }
}

/// Decoded contents of one directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirSlot {
    /// Status 0xE5; the stale bytes are kept as they were.
    Free(RawEntry),
    File(FileExtent),
    Password(PasswordEntry),
    Label(LabelEntry),
    Stamps(DateStamps),
    /// Anything the dialect gives no meaning to.
    Other(RawEntry),
}

impl DirSlot {
    pub fn empty() -> Self {
        DirSlot::Free(RawEntry([STATUS_FREE; ENTRY_SIZE]))
    }

    pub fn decode(bytes: &[u8; ENTRY_SIZE], dialect: Dialect, width: PointerWidth) -> Self {
        let raw = RawEntry(*bytes);
        match raw.status() {
            STATUS_FREE => DirSlot::Free(raw),
            user if user <= dialect.max_user() => DirSlot::File(FileExtent::decode(&raw, width)),
            16..=31 if dialect == Dialect::Dr3 => DirSlot::Password(PasswordEntry { raw }),
            STATUS_LABEL if dialect == Dialect::Dr3 => DirSlot::Label(LabelEntry { raw }),
            STATUS_STAMPS if dialect.has_stamps() => DirSlot::Stamps(DateStamps::decode(&raw)),
            _ => DirSlot::Other(raw),
        }
    }

    pub fn encode(&self) -> [u8; ENTRY_SIZE] {
        match self {
            DirSlot::Free(raw) | DirSlot::Other(raw) => raw.0,
            DirSlot::File(extent) => extent.encode().0,
            DirSlot::Password(pw) => pw.raw.0,
            DirSlot::Label(label) => label.raw.0,
            DirSlot::Stamps(stamps) => stamps.encode().0,
        }
    }

    /// Mark the slot free, keeping its other bytes.
    pub fn release(&mut self) {
        let mut raw = RawEntry(self.encode());
        raw.0[0] = STATUS_FREE;
        *self = DirSlot::Free(raw);
    }

    pub fn is_free(&self) -> bool {
        matches!(self, DirSlot::Free(_))
    }

    pub fn as_file(&self) -> Option<&FileExtent> {
        match self {
            DirSlot::File(extent) => Some(extent),
            _ => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut FileExtent> {
        match self {
            DirSlot::File(extent) => Some(extent),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_bytes() -> [u8; ENTRY_SIZE] {
        let mut b = [0u8; ENTRY_SIZE];
        b[0] = 3;
        b[1..9].copy_from_slice(b"HELLO   ");
        b[9..12].copy_from_slice(b"TXT");
        b[9] |= 0x80;
        b[12] = 0x02;
        b[13] = 0x10;
        b[14] = 0x01;
        b[15] = 0x40;
        b[16] = 5;
        b[17] = 6;
        b
    }

    #[test]
    fn test_decode_file_extent() {
        let slot = DirSlot::decode(&file_bytes(), Dialect::Dr22, PointerWidth::Byte);
        let ext = slot.as_file().unwrap();
        assert_eq!(ext.user, 3);
        assert_eq!(&ext.name, b"HELLO   ");
        assert_eq!(&ext.ext, b"TXT");
        assert_eq!(ext.attrs, Attributes::READ_ONLY);
        assert_eq!(ext.extent, 34);
        assert_eq!(ext.blocks.get(0), 5);
        assert_eq!(ext.blocks.get(1), 6);
        assert_eq!(slot.encode(), file_bytes());
    }

    #[test]
    fn test_end_offset() {
        let slot = DirSlot::decode(&file_bytes(), Dialect::Dr22, PointerWidth::Byte);
        let ext = slot.as_file().unwrap();
        assert_eq!(ext.end_offset(), 34 * 16384 + 63 * 128 + 16);
    }

    #[test]
    fn test_empty_extent_has_no_bytes() {
        let name = CpmName::parse("00empty", Dialect::Dr22).unwrap();
        let ext = FileExtent::new(&name, PointerWidth::Byte);
        assert_eq!(ext.end_offset(), 0);
    }

    #[test]
    fn test_extend_to() {
        let name = CpmName::parse("00grow", Dialect::Dr22).unwrap();
        let mut ext = FileExtent::new(&name, PointerWidth::Byte);
        ext.extend_to(300);
        assert_eq!((ext.extent, ext.record_count, ext.last_record_bytes), (0, 3, 44));
        ext.extend_to(100);
        assert_eq!(ext.end_offset(), 300);
        ext.extend_to(16384);
        assert_eq!((ext.extent, ext.record_count, ext.last_record_bytes), (0, 128, 0));
        assert_eq!(ext.end_offset(), 16384);
        ext.extend_to(16385);
        assert_eq!((ext.extent, ext.record_count, ext.last_record_bytes), (1, 1, 1));
    }

    #[test]
    fn test_dialect_specific_status() {
        let mut b = file_bytes();
        b[0] = 20;
        assert!(matches!(
            DirSlot::decode(&b, Dialect::Dr3, PointerWidth::Byte),
            DirSlot::Password(_)
        ));
        assert!(matches!(
            DirSlot::decode(&b, Dialect::P2dos, PointerWidth::Byte),
            DirSlot::File(_)
        ));
        b[0] = STATUS_STAMPS;
        assert!(matches!(
            DirSlot::decode(&b, Dialect::Dr22, PointerWidth::Byte),
            DirSlot::Other(_)
        ));
    }

    #[test]
    fn test_release_keeps_bytes() {
        let mut slot = DirSlot::decode(&file_bytes(), Dialect::Dr22, PointerWidth::Byte);
        slot.release();
        assert!(slot.is_free());
        let bytes = slot.encode();
        assert_eq!(bytes[0], STATUS_FREE);
        assert_eq!(&bytes[1..], &file_bytes()[1..]);
    }

    #[test]
    fn test_password_record() {
        let mut b = [0u8; ENTRY_SIZE];
        b[0] = 16 + 2;
        b[1..9].copy_from_slice(b"SECRET  ");
        b[9..12].copy_from_slice(b"DAT");
        b[12] = 0x80;
        b[13] = 0x55;
        for (j, c) in b"PASSWORD".iter().enumerate() {
            b[16 + 7 - j] = c ^ 0x55;
        }
        let slot = DirSlot::decode(&b, Dialect::Dr3, PointerWidth::Byte);
        let DirSlot::Password(pw) = slot else {
            panic!("not a password entry");
        };
        assert_eq!(pw.user(), 2);
        assert_eq!(&pw.password(), b"PASSWORD");
        assert_eq!(&pw.record(), b"02SECRET  .DAT PASSWORD\n");
    }

    #[test]
    fn test_label() {
        let mut b = [0u8; ENTRY_SIZE];
        b[0] = STATUS_LABEL;
        b[1..9].copy_from_slice(b"MYDISK  ");
        b[9..12].copy_from_slice(b"   ");
        b[12] = LABEL_EXISTS | LABEL_CREATE_STAMPS;
        let DirSlot::Label(label) = DirSlot::decode(&b, Dialect::Dr3, PointerWidth::Byte) else {
            panic!("not a label");
        };
        assert!(label.exists());
        assert!(label.create_stamps());
        assert_eq!(&label.record(), b"MYDISK     \n");
    }

    #[test]
    fn test_stamps_roundtrip() {
        let mut b = [0u8; ENTRY_SIZE];
        b[0] = STATUS_STAMPS;
        b[11] = 0x34;
        b[12] = 0x12;
        b[13] = 0x09;
        b[14] = 0x45;
        b[19] = 0xA0;
        b[31] = 0x77;
        let slot = DirSlot::decode(&b, Dialect::P2dos, PointerWidth::Byte);
        let DirSlot::Stamps(stamps) = &slot else {
            panic!("not a stamps entry");
        };
        assert_eq!(stamps.records[1].create_access.days, 0x1234);
        assert_eq!(stamps.records[1].create_access.hour, 0x09);
        assert_eq!(
            stamps.records[1].protection(),
            Attributes::PW_DELETE | Attributes::PW_READ
        );
        assert_eq!(slot.encode(), b);
    }
}
