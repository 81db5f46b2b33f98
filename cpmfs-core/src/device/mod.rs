//! Sector-level storage backends.
//!
//! The engine never touches bytes on the medium directly; it asks a
//! [`Device`] for whole sectors addressed by logical track and physical
//! sector number.

pub mod image_file;
pub mod memory;

use crate::error::{CpmError, CpmResult};
use crate::format::Sidedness;
use crate::geometry::physical_location;

pub use image_file::ImageFile;
pub use memory::MemoryDevice;

/// Physical parameters a backend needs to address sectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceGeometry {
    pub sec_length: usize,
    pub sectrk: usize,
    pub tracks: usize,
    pub datasect: usize,
    pub heads: usize,
    pub cylinders: usize,
    pub sidedness: Sidedness,
    pub side_offset: usize,
    pub test_side: bool,
    pub fm: bool,
    pub datarate: Option<u32>,
}

impl DeviceGeometry {
    /// Geometry good enough to read the first sector of an Amstrad disk.
    pub fn provisional() -> Self {
        DeviceGeometry {
            sec_length: 512,
            sectrk: 9,
            tracks: 40,
            datasect: 0,
            heads: 1,
            cylinders: 40,
            sidedness: Sidedness::Alternate,
            side_offset: 0,
            test_side: false,
            fm: false,
            datarate: None,
        }
    }

    pub fn image_len(&self) -> usize {
        self.tracks * self.sectrk * self.sec_length
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// Order in which an image stores its tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageOrder {
    /// Logical tracks one after another.
    #[default]
    Logical,
    /// Cylinder-major, head-minor, as dumped from a multi-sided drive.
    Physical,
}

impl ImageOrder {
    /// Parse a device option string such as `"physical"`.
    ///
    /// Options are separated by commas or whitespace; an empty string
    /// selects the default.
    pub fn from_options(options: Option<&str>) -> CpmResult<Self> {
        let mut order = ImageOrder::default();
        let Some(options) = options else {
            return Ok(order);
        };
        for option in options
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|o| !o.is_empty())
        {
            order = match option {
                "logical" => ImageOrder::Logical,
                "physical" => ImageOrder::Physical,
                other => return Err(CpmError::Config(format!("unknown device option {other}"))),
            };
        }
        Ok(order)
    }
}

/// Sector transfer contract used by the block layer.
///
/// `sector` is the physical (skewed) sector number, `lsector` the logical
/// sector it was derived from; `flags` is reserved for backends that talk
/// to real controllers and is zero for image files.
pub trait Device {
    fn set_geometry(&mut self, geometry: &DeviceGeometry);

    fn read_sector(
        &mut self,
        track: usize,
        sector: usize,
        lsector: usize,
        flags: u32,
        buf: &mut [u8],
    ) -> CpmResult<()>;

    fn write_sector(
        &mut self,
        track: usize,
        sector: usize,
        lsector: usize,
        flags: u32,
        buf: &[u8],
    ) -> CpmResult<()>;

    fn close(&mut self) -> CpmResult<()> {
        Ok(())
    }
}

/// Byte offset of a sector inside an image.
pub(crate) fn sector_offset(
    geometry: Option<&DeviceGeometry>,
    order: ImageOrder,
    track: usize,
    sector: usize,
) -> CpmResult<u64> {
    let geometry = geometry.ok_or_else(|| CpmError::Device("geometry not set".into()))?;
    if sector < geometry.datasect || sector - geometry.datasect >= geometry.sectrk {
        return Err(CpmError::Device(format!("invalid sector number {sector}")));
    }
    if track >= geometry.tracks {
        return Err(CpmError::Device(format!("invalid track number {track}")));
    }

    let sector = sector - geometry.datasect;
    let track = match order {
        ImageOrder::Logical => track,
        ImageOrder::Physical => {
            let (cylinder, head) = physical_location(
                geometry.cylinders,
                geometry.heads,
                geometry.sidedness,
                track,
            );
            cylinder * geometry.heads + head
        }
    };
    Ok(((track * geometry.sectrk + sector) * geometry.sec_length) as u64)
}
