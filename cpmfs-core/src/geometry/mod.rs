//! Derived volume geometry.
//!
//! [`Geometry`] is the DPB equivalent of a mounted volume: the preset's
//! physical parameters plus everything computed from them once (block
//! count, pointer width, extent capacity).

pub mod sides;
pub mod skew;

use serde::Serialize;

use crate::device::DeviceGeometry;
use crate::dir::{PointerWidth, ENTRY_SIZE, EXTENT_BYTES};
use crate::error::{CpmError, CpmResult};
use crate::format::{Dialect, DiskDef, Sidedness};

pub use sides::physical_location;

/// Block numbers a 16-bit pointer can hold.
const MAX_BLOCKS: usize = 0x10000;
pub use skew::SkewTable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub name: String,
    pub sec_length: usize,
    pub tracks: usize,
    pub sectrk: usize,
    pub boottrk: usize,
    pub blksiz: usize,
    pub maxdir: usize,
    pub skew: usize,
    pub skewstart: usize,
    pub datasect: usize,
    pub heads: usize,
    pub cylinders: usize,
    pub sidedness: Sidedness,
    pub side_offset: usize,
    pub test_side: bool,
    pub fm: bool,
    pub datarate: Option<u32>,
    pub dialect: Dialect,
    /// Blocks in the data area, directory included.
    pub blocks: usize,
    /// Logical 16K extents covered by one directory entry.
    pub extents: usize,
    /// Words in the allocation bitmap.
    pub alv_words: usize,
}

impl Geometry {
    /// Derive the volume descriptor, rejecting presets that cannot be mounted.
    pub fn from_def(def: &DiskDef) -> CpmResult<Self> {
        let bad = |msg: &str| Err(CpmError::Config(format!("{}: {}", def.name, msg)));

        if def.sec_length == 0 || def.sectrk == 0 || def.blksiz == 0 || def.maxdir == 0 {
            return bad("seclen, sectrk, blocksize and maxdir must be non-zero");
        }
        if def.blksiz % def.sec_length != 0 {
            return bad("blocksize must be a multiple of seclen");
        }
        if def.tracks <= def.boottrk {
            return bad("no tracks left after the boot tracks");
        }
        if def.heads == 0 {
            return bad("heads must be non-zero");
        }

        let track_bytes = def.sec_length.checked_mul(def.sectrk);
        let Some(track_bytes) = track_bytes.filter(|t| t.checked_mul(def.tracks).is_some()) else {
            return bad("volume size overflows");
        };
        let blocks = track_bytes * (def.tracks - def.boottrk) / def.blksiz;
        if blocks > MAX_BLOCKS {
            return bad("more blocks than 16-bit pointers can address");
        }
        let width = PointerWidth::for_blocks(blocks);
        let natural = width.count().checked_mul(def.blksiz).unwrap_or(usize::MAX);
        if natural < EXTENT_BYTES {
            return bad("blocksize too small for 16-bit block pointers");
        }
        let extents = if def.logical_extents != 0 {
            def.logical_extents
        } else {
            (natural / EXTENT_BYTES).max(1)
        };
        if extents.checked_mul(EXTENT_BYTES).map_or(true, |bytes| bytes > natural) {
            return bad("logicalextents exceeds the capacity of a directory entry");
        }

        let Some(dir_bytes) = def.maxdir.checked_mul(ENTRY_SIZE) else {
            return bad("maxdir too large");
        };
        let dir_blocks = dir_bytes.div_ceil(def.blksiz);
        if dir_blocks >= blocks {
            return bad("directory does not fit on the volume");
        }

        let cylinders = if def.cylinders != 0 {
            def.cylinders
        } else {
            def.tracks.div_ceil(def.heads)
        };

        Ok(Geometry {
            name: def.name.clone(),
            sec_length: def.sec_length,
            tracks: def.tracks,
            sectrk: def.sectrk,
            boottrk: def.boottrk,
            blksiz: def.blksiz,
            maxdir: def.maxdir,
            skew: def.skew,
            skewstart: def.skewstart,
            datasect: def.datasect,
            heads: def.heads,
            cylinders,
            sidedness: def.sidedness,
            side_offset: def.side_offset,
            test_side: def.test_side,
            fm: def.fm,
            datarate: def.datarate,
            dialect: def.dialect,
            blocks,
            extents,
            alv_words: blocks.div_ceil(64),
        })
    }

    pub fn pointer_width(&self) -> PointerWidth {
        PointerWidth::for_blocks(self.blocks)
    }

    pub fn sectors_per_block(&self) -> usize {
        self.blksiz / self.sec_length
    }

    /// Blocks occupied by the directory at the start of the data area.
    pub fn dir_blocks(&self) -> usize {
        (self.maxdir * ENTRY_SIZE).div_ceil(self.blksiz)
    }

    /// Bytes addressed by one directory entry.
    pub fn extent_capacity(&self) -> usize {
        self.extents * EXTENT_BYTES
    }

    /// Bytes on the whole medium, boot tracks included.
    pub fn medium_bytes(&self) -> usize {
        self.tracks * self.sectrk * self.sec_length
    }

    pub fn device_geometry(&self) -> DeviceGeometry {
        DeviceGeometry {
            sec_length: self.sec_length,
            sectrk: self.sectrk,
            tracks: self.tracks,
            datasect: self.datasect,
            heads: self.heads,
            cylinders: self.cylinders,
            sidedness: self.sidedness,
            side_offset: self.side_offset,
            test_side: self.test_side,
            fm: self.fm,
            datarate: self.datarate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::parse_diskdefs;
    use crate::format::BUILTIN_DISKDEFS;

    fn builtin(name: &str) -> Geometry {
        let def = parse_diskdefs(BUILTIN_DISKDEFS, name).unwrap().unwrap();
        Geometry::from_def(&def).unwrap()
    }

    #[test]
    fn test_ibm_3740() {
        let g = builtin("ibm-3740");
        assert_eq!(g.blocks, 243);
        assert_eq!(g.pointer_width(), PointerWidth::Byte);
        assert_eq!(g.extents, 1);
        assert_eq!(g.dir_blocks(), 2);
        assert_eq!(g.extent_capacity(), 16384);
        assert_eq!(g.sectors_per_block(), 8);
    }

    #[test]
    fn test_large_volume_uses_word_pointers() {
        let g = builtin("4mb-hd");
        assert_eq!(g.blocks, 2048);
        assert_eq!(g.pointer_width(), PointerWidth::Word);
        assert_eq!(g.extents, 1);
        assert_eq!(g.alv_words, 32);
    }

    #[test]
    fn test_multiple_logical_extents() {
        let mut def = DiskDef::named("big");
        def.sec_length = 512;
        def.tracks = 80;
        def.sectrk = 32;
        def.blksiz = 4096;
        def.maxdir = 128;
        let g = Geometry::from_def(&def).unwrap();
        assert_eq!(g.blocks, 320);
        assert_eq!(g.extents, 2);
        assert_eq!(g.extent_capacity(), 32768);
    }

    #[test]
    fn test_cylinders_derived_from_tracks() {
        let g = builtin("pcw");
        assert_eq!(g.cylinders, 40);
        assert_eq!(g.heads, 1);
    }

    #[test]
    fn test_rejects_bad_blocksize() {
        let mut def = DiskDef::named("bad");
        def.sec_length = 512;
        def.tracks = 80;
        def.sectrk = 9;
        def.blksiz = 1000;
        def.maxdir = 64;
        assert!(Geometry::from_def(&def).is_err());

        def.blksiz = 1024;
        def.tracks = 160;
        def.sectrk = 18;
        // 1K blocks with more than 255 of them cannot be addressed.
        assert!(Geometry::from_def(&def).is_err());
    }

    #[test]
    fn test_rejects_oversized_values() {
        let mut def = DiskDef::named("huge");
        def.sec_length = 512;
        def.tracks = 80;
        def.sectrk = usize::MAX / 256;
        def.blksiz = 4096;
        def.maxdir = 64;
        assert!(matches!(Geometry::from_def(&def), Err(CpmError::Config(_))));

        def.sectrk = 8192;
        // 80 tracks of 4M in 4K blocks: more than 16-bit pointers reach.
        assert!(Geometry::from_def(&def).is_err());

        def.sectrk = 32;
        def.maxdir = usize::MAX / 8;
        assert!(Geometry::from_def(&def).is_err());

        def.maxdir = 128;
        def.logical_extents = usize::MAX;
        assert!(Geometry::from_def(&def).is_err());
    }
}
