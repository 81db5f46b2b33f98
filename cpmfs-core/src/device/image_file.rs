//! Disk image stored in a host file.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::{sector_offset, Device, DeviceGeometry, ImageOrder, OpenMode};
use crate::error::{CpmError, CpmResult};

pub struct ImageFile {
    file: File,
    mode: OpenMode,
    order: ImageOrder,
    geometry: Option<DeviceGeometry>,
}

impl ImageFile {
    /// Open an image. `options` is the device option string, e.g. `"physical"`.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode, options: Option<&str>) -> CpmResult<Self> {
        let order = ImageOrder::from_options(options)?;
        let file = OpenOptions::new()
            .read(true)
            .write(mode == OpenMode::ReadWrite)
            .open(path.as_ref())?;
        log::debug!("opened image {} ({mode:?}, {order:?})", path.as_ref().display());
        Ok(Self {
            file,
            mode,
            order,
            geometry: None,
        })
    }

    fn sector_len(&self) -> usize {
        self.geometry.as_ref().map_or(0, |g| g.sec_length)
    }
}

impl Device for ImageFile {
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
        let offset = sector_offset(self.geometry.as_ref(), self.order, track, sector)?;
        let len = self.sector_len().min(buf.len());
        let buf = &mut buf[..len];

        self.file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < len {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        // Images may be truncated after the last written sector.
        buf[filled..].fill(0);
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
        if self.mode == OpenMode::ReadOnly {
            return Err(CpmError::PermissionDenied);
        }
        let offset = sector_offset(self.geometry.as_ref(), self.order, track, sector)?;
        let len = self.sector_len().min(buf.len());

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&buf[..len])?;
        Ok(())
    }

    fn close(&mut self) -> CpmResult<()> {
        if self.mode == OpenMode::ReadWrite {
            self.file.sync_all()?;
        }
        Ok(())
    }
}
