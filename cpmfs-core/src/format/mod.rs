//! Disk format descriptions.
//!
//! A [`DiskDef`] is the textual geometry preset read from a diskdefs file
//! (or decoded from an Amstrad boot record). It says nothing about derived
//! sizes; [`crate::geometry::Geometry`] turns it into a mountable volume
//! descriptor.

pub mod amstrad;
pub mod diskdefs;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::error::{CpmError, CpmResult};

pub use diskdefs::{find_diskdef, parse_diskdefs, search_paths, BUILTIN_DISKDEFS};

/// Directory dialect of a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// CP/M 2.2: plain file extents, no stamps.
    Dr22,
    /// P2DOS: CP/M 2.2 with a date-stamp entry in every fourth slot.
    P2dos,
    /// CP/M 3: passwords, a volume label and date stamps.
    Dr3,
}

impl Dialect {
    /// Parse the value of the `os` keyword.
    pub fn from_keyword(value: &str) -> Option<Self> {
        match value {
            "2.2" => Some(Dialect::Dr22),
            "3" => Some(Dialect::Dr3),
            "p2dos" => Some(Dialect::P2dos),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Dialect::Dr22 => "2.2",
            Dialect::Dr3 => "3",
            Dialect::P2dos => "p2dos",
        }
    }

    /// Highest user number a file may carry.
    pub fn max_user(self) -> u8 {
        match self {
            Dialect::P2dos => 31,
            Dialect::Dr22 | Dialect::Dr3 => 15,
        }
    }

    /// Whether `index|3` slots may hold date stamps.
    pub fn has_stamps(self) -> bool {
        matches!(self, Dialect::P2dos | Dialect::Dr3)
    }
}

/// How logical tracks are laid onto the heads of a multi-sided medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sidedness {
    /// Track `n` is cylinder `n/heads`, head `n%heads`.
    Alternate,
    /// Head 0 outwards, then head 1 back inwards.
    OutBack,
    /// Head 0 outwards, then head 1 outwards again.
    OutOut,
    /// Fixed interleave used by the nanowasp emulator images.
    Nanowasp,
}

impl Sidedness {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Sidedness::Alternate),
            1 => Some(Sidedness::OutBack),
            2 => Some(Sidedness::OutOut),
            3 => Some(Sidedness::Nanowasp),
            _ => None,
        }
    }

    /// The `sidedness` keyword value.
    pub fn code(self) -> i64 {
        match self {
            Sidedness::Alternate => 0,
            Sidedness::OutBack => 1,
            Sidedness::OutOut => 2,
            Sidedness::Nanowasp => 3,
        }
    }
}

/// A named geometry preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskDef {
    pub name: String,
    pub sec_length: usize,
    /// Logical tracks, boot tracks included.
    pub tracks: usize,
    pub sectrk: usize,
    pub blksiz: usize,
    pub maxdir: usize,
    pub skew: usize,
    pub skewstart: usize,
    /// Number of the first sector on a track (usually 0 or 1).
    pub datasect: usize,
    pub heads: usize,
    /// Zero when the preset only gives `tracks`.
    pub cylinders: usize,
    pub sidedness: Sidedness,
    pub side_offset: usize,
    pub test_side: bool,
    pub fm: bool,
    /// Controller data rate, `None` for automatic.
    pub datarate: Option<u32>,
    pub boottrk: usize,
    /// Logical extents per directory entry, zero to derive from the geometry.
    pub logical_extents: usize,
    pub dialect: Dialect,
}

impl DiskDef {
    /// A preset with the diskdefs defaults and no sizing filled in.
    pub fn named(name: &str) -> Self {
        DiskDef {
            name: name.to_string(),
            sec_length: 0,
            tracks: 0,
            sectrk: 0,
            blksiz: 0,
            maxdir: 0,
            skew: 1,
            skewstart: 1,
            datasect: 1,
            heads: 1,
            cylinders: 0,
            sidedness: Sidedness::Alternate,
            side_offset: 0,
            test_side: false,
            fm: false,
            datarate: None,
            boottrk: 0,
            logical_extents: 0,
            dialect: Dialect::Dr3,
        }
    }
}

/// Name of the self-describing Amstrad format.
pub const AMSTRAD: &str = "amstrad";

/// Resolve a format name to a preset.
///
/// `amstrad` is read from the boot record of `device`; anything else is
/// looked up in the diskdefs files.
pub fn resolve<D: Device>(
    name: &str,
    diskdefs: Option<&Path>,
    device: &mut D,
) -> CpmResult<DiskDef> {
    if name == AMSTRAD {
        return amstrad::read_amstrad_def(device);
    }
    find_diskdef(name, diskdefs)?.ok_or_else(|| CpmError::UnknownFormat(name.to_string()))
}
