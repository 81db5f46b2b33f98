//! The in-memory directory table.
//!
//! The directory is read whole at mount, decoded into [`DirSlot`]s and
//! addressed by index from then on. Nothing is written back until the
//! volume is synced.

pub mod entry;
pub mod slot;

use crate::format::Dialect;
use crate::name::CpmName;

pub use entry::{
    Attributes, BlockList, PointerWidth, RawEntry, ENTRY_SIZE, EXTENT_BYTES, MAX_EXTENT,
    MAX_FILE_BYTES, RECORD_SIZE, STATUS_FREE,
};
pub use slot::{DateStamps, DirSlot, FileExtent, LabelEntry, PasswordEntry, StampRecord};

#[derive(Debug, Clone)]
pub struct Directory {
    slots: Vec<DirSlot>,
    dialect: Dialect,
    width: PointerWidth,
    /// Logical extents per entry.
    extents: usize,
}

impl Directory {
    /// Decode `maxdir` entries from the raw directory bytes.
    pub fn decode(
        bytes: &[u8],
        maxdir: usize,
        dialect: Dialect,
        width: PointerWidth,
        extents: usize,
    ) -> Self {
        let slots = (0..maxdir)
            .map(|i| {
                let mut raw = [STATUS_FREE; ENTRY_SIZE];
                if let Some(src) = bytes.get(i * ENTRY_SIZE..(i + 1) * ENTRY_SIZE) {
                    raw.copy_from_slice(src);
                }
                DirSlot::decode(&raw, dialect, width)
            })
            .collect();
        Directory {
            slots,
            dialect,
            width,
            extents: extents.max(1),
        }
    }

    /// An empty directory of `maxdir` free slots.
    pub fn blank(maxdir: usize, dialect: Dialect, width: PointerWidth, extents: usize) -> Self {
        Directory {
            slots: vec![DirSlot::empty(); maxdir],
            dialect,
            width,
            extents: extents.max(1),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        self.slots.iter().flat_map(|slot| slot.encode()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn width(&self) -> PointerWidth {
        self.width
    }

    pub fn slots(&self) -> &[DirSlot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> &DirSlot {
        &self.slots[index]
    }

    pub fn set_slot(&mut self, index: usize, slot: DirSlot) {
        self.slots[index] = slot;
    }

    pub fn extent(&self, index: usize) -> Option<&FileExtent> {
        self.slots.get(index).and_then(DirSlot::as_file)
    }

    pub fn extent_mut(&mut self, index: usize) -> Option<&mut FileExtent> {
        self.slots.get_mut(index).and_then(DirSlot::as_file_mut)
    }

    /// Live file extents with their indices.
    pub fn extents(&self) -> impl Iterator<Item = (usize, &FileExtent)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_file().map(|e| (i, e)))
    }

    /// First extent of `name` at or after `start`.
    ///
    /// With `extent` set, only an entry covering that logical extent
    /// matches.
    pub fn find_extent(&self, name: &CpmName, start: usize, extent: Option<usize>) -> Option<usize> {
        let group = extent.map(|e| e / self.extents);
        (start..self.slots.len()).find(|&i| match self.extent(i) {
            Some(ext) => {
                ext.matches(name)
                    && group.map_or(true, |g| ext.extent as usize / self.extents == g)
            }
            None => false,
        })
    }

    /// Indices of every extent of `name`.
    pub fn extents_of(&self, name: &CpmName) -> Vec<usize> {
        self.extents()
            .filter(|(_, e)| e.matches(name))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn find_free(&self) -> Option<usize> {
        self.slots.iter().position(DirSlot::is_free)
    }

    pub fn free_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_free()).count()
    }

    /// Stamps shared by the group `index` belongs to.
    pub fn stamps(&self, index: usize) -> Option<&StampRecord> {
        if !self.dialect.has_stamps() || index & 3 == 3 {
            return None;
        }
        match self.slots.get(index | 3) {
            Some(DirSlot::Stamps(stamps)) => Some(&stamps.records[index & 3]),
            _ => None,
        }
    }

    pub fn stamps_mut(&mut self, index: usize) -> Option<&mut StampRecord> {
        if !self.dialect.has_stamps() || index & 3 == 3 {
            return None;
        }
        match self.slots.get_mut(index | 3) {
            Some(DirSlot::Stamps(stamps)) => Some(&mut stamps.records[index & 3]),
            _ => None,
        }
    }

    pub fn passwords(&self) -> impl Iterator<Item = &PasswordEntry> + '_ {
        self.slots.iter().filter_map(|slot| match slot {
            DirSlot::Password(pw) => Some(pw),
            _ => None,
        })
    }

    pub fn label(&self) -> Option<&LabelEntry> {
        self.slots.iter().find_map(|slot| match slot {
            DirSlot::Label(label) => Some(label),
            _ => None,
        })
    }
}
