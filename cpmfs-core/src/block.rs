//! Block-level access to a device.

use crate::device::Device;
use crate::error::{CpmError, CpmResult};
use crate::geometry::{Geometry, SkewTable};

/// A device together with the geometry and skew needed to address blocks.
pub struct Disk<D: Device> {
    device: D,
    geometry: Geometry,
    skew: SkewTable,
}

impl<D: Device> Disk<D> {
    pub fn new(mut device: D, geometry: Geometry) -> Self {
        device.set_geometry(&geometry.device_geometry());
        let skew = SkewTable::for_geometry(&geometry);
        log::trace!("skew table for {}: {:?}", geometry.name, skew.as_slice());
        Self {
            device,
            geometry,
            skew,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn skew(&self) -> &SkewTable {
        &self.skew
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    /// Logical track and sector of sector `index` within `block`.
    fn locate(&self, block: usize, index: usize) -> (usize, usize) {
        let absolute = block * self.geometry.sectors_per_block() + index;
        let sector = absolute % self.geometry.sectrk;
        let track = absolute / self.geometry.sectrk + self.geometry.boottrk;
        (track, sector)
    }

    /// Resolve the sector range `start..=end` of a block, `None` meaning
    /// the last sector.
    fn range(
        &self,
        block: usize,
        start: usize,
        end: Option<usize>,
        len: usize,
    ) -> CpmResult<(usize, usize)> {
        if block >= self.geometry.blocks {
            return Err(CpmError::Device(format!("block {block} out of range")));
        }
        let per_block = self.geometry.sectors_per_block();
        let end = end.unwrap_or(per_block - 1);
        if start > end || end >= per_block || len < (end + 1) * self.geometry.sec_length {
            return Err(CpmError::Device(format!(
                "invalid sector range {start}..={end} in block {block}"
            )));
        }
        Ok((start, end))
    }

    /// Read sectors `start..=end` of `block` into the matching part of `buf`.
    pub fn read_block(
        &mut self,
        block: usize,
        buf: &mut [u8],
        start: usize,
        end: Option<usize>,
    ) -> CpmResult<()> {
        let (start, end) = self.range(block, start, end, buf.len())?;
        let seclen = self.geometry.sec_length;
        for index in start..=end {
            let (track, sector) = self.locate(block, index);
            let physical = self.skew.physical(sector);
            self.device.read_sector(
                track,
                physical,
                sector,
                0,
                &mut buf[index * seclen..(index + 1) * seclen],
            )?;
        }
        Ok(())
    }

    /// Write sectors `start..=end` of `block` from the matching part of `buf`.
    pub fn write_block(
        &mut self,
        block: usize,
        buf: &[u8],
        start: usize,
        end: Option<usize>,
    ) -> CpmResult<()> {
        let (start, end) = self.range(block, start, end, buf.len())?;
        let seclen = self.geometry.sec_length;
        for index in start..=end {
            let (track, sector) = self.locate(block, index);
            let physical = self.skew.physical(sector);
            self.device.write_sector(
                track,
                physical,
                sector,
                0,
                &buf[index * seclen..(index + 1) * seclen],
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryDevice;
    use crate::format::{parse_diskdefs, BUILTIN_DISKDEFS};

    fn ibm_disk() -> Disk<MemoryDevice> {
        let def = parse_diskdefs(BUILTIN_DISKDEFS, "ibm-3740").unwrap().unwrap();
        let geometry = Geometry::from_def(&def).unwrap();
        let dev = MemoryDevice::blank(&geometry);
        Disk::new(dev, geometry)
    }

    #[test]
    fn test_block_goes_through_skew() {
        let mut disk = ibm_disk();
        let mut block = vec![0u8; 1024];
        for (i, chunk) in block.chunks_mut(128).enumerate() {
            chunk.fill(i as u8 + 1);
        }
        disk.write_block(0, &block, 0, None).unwrap();

        let image = disk.into_device().into_inner();
        // Block 0 starts on track 2; logical sector 1 is physical sector 7.
        let track2 = 2 * 26 * 128;
        assert_eq!(image[track2], 1);
        assert_eq!(image[track2 + 6 * 128], 2);
        assert_eq!(image[track2 + 12 * 128], 3);
    }

    #[test]
    fn test_partial_read() {
        let mut disk = ibm_disk();
        let block = vec![0x5Au8; 1024];
        disk.write_block(3, &block, 0, None).unwrap();

        let mut back = vec![0u8; 1024];
        disk.read_block(3, &mut back, 2, Some(3)).unwrap();
        assert!(back[..256].iter().all(|&b| b == 0));
        assert!(back[256..512].iter().all(|&b| b == 0x5A));
        assert!(back[512..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_block_out_of_range() {
        let mut disk = ibm_disk();
        let mut buf = vec![0u8; 1024];
        assert!(disk.read_block(243, &mut buf, 0, None).is_err());
        assert!(disk.read_block(0, &mut buf[..512], 0, None).is_err());
    }
}
