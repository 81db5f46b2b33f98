//! In-memory disk image.

use super::{sector_offset, Device, DeviceGeometry, ImageOrder};
use crate::error::{CpmError, CpmResult};
use crate::geometry::Geometry;

/// A disk image held in a byte vector.
///
/// Reads past the end of the data return zeros and writes past it grow
/// the vector, the same way a sparse image file behaves.
#[derive(Debug, Default, Clone)]
pub struct MemoryDevice {
    data: Vec<u8>,
    geometry: Option<DeviceGeometry>,
    order: ImageOrder,
    read_only: bool,
}

impl MemoryDevice {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// A freshly formatted image: every byte 0xE5, so the directory is empty.
    pub fn blank(geometry: &Geometry) -> Self {
        Self::new(vec![0xE5; geometry.medium_bytes()])
    }

    pub fn with_order(mut self, order: ImageOrder) -> Self {
        self.order = order;
        self
    }

    /// Reject all writes, like an image opened read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl Device for MemoryDevice {
    fn set_geometry(&mut self, geometry: &DeviceGeometry) {
        self.geometry = Some(geometry.clone());
    }

    fn read_sector(
        &mut self,
        track: usize,
        sector: usize,
        _lsector: usize,
        _flags: u32,
        buf: &mut [u8],
    ) -> CpmResult<()> {
        let offset = sector_offset(self.geometry.as_ref(), self.order, track, sector)? as usize;
        let len = self.geometry.as_ref().map_or(0, |g| g.sec_length).min(buf.len());
        let buf = &mut buf[..len];

        let available = self.data.len().saturating_sub(offset).min(len);
        if available > 0 {
            buf[..available].copy_from_slice(&self.data[offset..offset + available]);
        }
        buf[available..].fill(0);
        Ok(())
    }

    fn write_sector(
        &mut self,
        track: usize,
        sector: usize,
        _lsector: usize,
        _flags: u32,
        buf: &[u8],
    ) -> CpmResult<()> {
        if self.read_only {
            return Err(CpmError::PermissionDenied);
        }
        let offset = sector_offset(self.geometry.as_ref(), self.order, track, sector)? as usize;
        let len = self.geometry.as_ref().map_or(0, |g| g.sec_length).min(buf.len());

        if self.data.len() < offset + len {
            self.data.resize(offset + len, 0);
        }
        self.data[offset..offset + len].copy_from_slice(&buf[..len]);
        Ok(())
    }
}
