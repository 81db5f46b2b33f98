//! Amstrad PCW/CPC boot-record geometry.

use super::{Dialect, DiskDef, Sidedness};
use crate::device::{Device, DeviceGeometry};
use crate::error::{CpmError, CpmResult};

/// Largest size shift in a boot record: 128 << 7 = 16K.
const MAX_SHIFT: u8 = 7;

/// Read the boot record from track 0 sector 0 and describe the disk.
pub fn read_amstrad_def<D: Device>(device: &mut D) -> CpmResult<DiskDef> {
    let provisional = DeviceGeometry::provisional();
    device.set_geometry(&provisional);
    let mut boot = vec![0u8; provisional.sec_length];
    device.read_sector(0, 0, 0, 0, &mut boot)?;
    parse_boot_record(&boot)
}

/// Decode the geometry record of an Amstrad boot sector.
///
/// The record is either at the start of the sector (format byte 0 or 3) or,
/// on JCE's PCW16 disks, 128 bytes in behind an MS-DOS boot sector.
pub fn parse_boot_record(boot: &[u8]) -> CpmResult<DiskDef> {
    if boot.len() < 136 {
        return Err(CpmError::Config("boot sector too short".into()));
    }

    let jce = (boot[0] == 0xE9 || boot[0] == 0xEB)
        && &boot[0x2B..0x2F] == b"CP/M"
        && &boot[0x33..0x36] == b"DSK"
        && &boot[0x7C..0x80] == b"CP/M";
    let record = if jce {
        &boot[128..136]
    } else if boot[0] == 0 || boot[0] == 3 {
        &boot[..8]
    } else {
        return Err(CpmError::Config("Amstrad superblock not present".into()));
    };

    // record[1] sidedness/density, [2] tracks per side, [3] sectors per track,
    // [4] sector shift, [5] reserved tracks, [6] block shift, [7] dir blocks.
    if record[2] == 0 || record[3] == 0 || record[7] == 0 {
        return Err(CpmError::Config(
            "Amstrad superblock has no tracks, sectors or directory".into(),
        ));
    }
    if record[4] > MAX_SHIFT || record[6] > MAX_SHIFT {
        return Err(CpmError::Config(format!(
            "Amstrad superblock sector shift {} or block shift {} out of range",
            record[4], record[6]
        )));
    }
    let mut def = DiskDef::named(super::AMSTRAD);
    def.sec_length = 128 << record[4];
    def.tracks = record[2] as usize;
    if record[1] & 3 != 0 {
        def.tracks *= 2;
    }
    def.sectrk = record[3] as usize;
    def.blksiz = 128 << record[6];
    def.maxdir = (def.blksiz / 32) * record[7] as usize;
    def.skew = 1;
    def.skewstart = 1;
    def.datasect = 1;
    def.heads = 1;
    def.sidedness = Sidedness::Alternate;
    def.boottrk = record[5] as usize;
    def.dialect = Dialect::Dr3;

    log::debug!(
        "amstrad boot record: {} tracks, {} x {} byte sectors, {} byte blocks",
        def.tracks,
        def.sectrk,
        def.sec_length,
        def.blksiz
    );
    Ok(def)
}
