//! The mounted filesystem.
//!
//! [`CpmFs`] owns the device, the decoded directory and the allocation
//! bitmap. Files are addressed through [`Inode`]s obtained from
//! [`CpmFs::lookup`] or [`CpmFs::create`]; the directory is only written
//! back by [`CpmFs::sync`] or [`CpmFs::unmount`].

mod file;
mod inode;
mod readdir;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alloc::AllocVector;
use crate::block::Disk;
use crate::device::Device;
use crate::dir::{Attributes, DirSlot, Directory, FileExtent};
use crate::error::{CpmError, CpmResult};
use crate::format::{Dialect, DiskDef};
use crate::geometry::Geometry;
use crate::name::CpmName;
use crate::time::{CpmStamp, TimeCodec};

pub use file::CpmFile;
pub use inode::{Inode, InodeId, Stat, S_IFDIR, S_IFMT, S_IFREG};
pub use readdir::{DirCursor, DirEntry};

/// Filesystem usage, as reported by `df`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatFs {
    pub block_size: usize,
    /// Blocks on the whole medium, boot tracks included.
    pub blocks: usize,
    /// Data blocks in use, directory excluded.
    pub used: usize,
    pub free: usize,
    pub files: usize,
    pub files_free: usize,
    pub name_len: usize,
}

/// A mounted CP/M volume.
pub struct CpmFs<D: Device> {
    disk: Disk<D>,
    dir: Directory,
    alv: AllocVector,
    /// Content of `[passwd]`.
    passwd: Vec<u8>,
    /// Content of `[label]`.
    label: Vec<u8>,
    /// Stamps record creation instead of access.
    create_stamps: bool,
    dirty: bool,
    clock: TimeCodec,
}

impl<D: Device> CpmFs<D> {
    /// Mount `device` using the host's UTC offset for timestamps.
    pub fn mount(def: &DiskDef, device: D) -> CpmResult<Self> {
        Self::mount_with_clock(def, device, TimeCodec::host())
    }

    pub fn mount_with_clock(def: &DiskDef, device: D, clock: TimeCodec) -> CpmResult<Self> {
        let geometry = Geometry::from_def(def)?;
        let mut disk = Disk::new(device, geometry);

        let (blksiz, dir_blocks) = (disk.geometry().blksiz, disk.geometry().dir_blocks());
        let mut bytes = vec![0u8; dir_blocks * blksiz];
        for (block, chunk) in bytes.chunks_mut(blksiz).enumerate() {
            disk.read_block(block, chunk, 0, None)?;
        }

        let g = disk.geometry();
        let dir = Directory::decode(&bytes, g.maxdir, g.dialect, g.pointer_width(), g.extents);
        Ok(Self::assemble(disk, dir, clock, false))
    }

    /// Start a new, empty volume on `device`.
    ///
    /// Nothing is written until the volume is synced.
    pub fn format(def: &DiskDef, device: D, clock: TimeCodec) -> CpmResult<Self> {
        let geometry = Geometry::from_def(def)?;
        let dir = Directory::blank(
            geometry.maxdir,
            geometry.dialect,
            geometry.pointer_width(),
            geometry.extents,
        );
        let disk = Disk::new(device, geometry);
        Ok(Self::assemble(disk, dir, clock, true))
    }

    fn assemble(disk: Disk<D>, dir: Directory, clock: TimeCodec, dirty: bool) -> Self {
        let g = disk.geometry();
        let alv = AllocVector::from_directory(g.blocks, g.dir_blocks(), &dir);

        let mut passwd = Vec::new();
        for pw in dir.passwords() {
            log::debug!("password entry for user {}", pw.user());
            passwd.extend_from_slice(&pw.record());
        }

        let mut label = Vec::new();
        let mut create_stamps = true;
        if let Some(entry) = dir.label() {
            create_stamps = entry.create_stamps();
            if entry.exists() {
                label.extend_from_slice(&entry.record());
                log::debug!("volume label {:?}", String::from_utf8_lossy(&label).trim_end());
            }
        }

        log::debug!(
            "mounted {}: {} blocks of {} bytes, {} directory entries ({} free), {:?}",
            g.name,
            g.blocks,
            g.blksiz,
            g.maxdir,
            dir.free_count(),
            g.dialect
        );

        CpmFs {
            disk,
            dir,
            alv,
            passwd,
            label,
            create_stamps,
            dirty,
            clock,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        self.disk.geometry()
    }

    pub fn directory(&self) -> &Directory {
        &self.dir
    }

    pub fn allocation(&self) -> &AllocVector {
        &self.alv
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn dialect(&self) -> Dialect {
        self.dir.dialect()
    }

    /// The root directory, the only directory CP/M has.
    pub fn root(&self) -> Inode {
        Inode::root(self.geometry().maxdir)
    }

    pub fn statfs(&self) -> StatFs {
        let g = self.geometry();
        StatFs {
            block_size: g.blksiz,
            blocks: g.medium_bytes() / g.blksiz,
            used: self.alv.used() - self.alv.dir_blocks(),
            free: self.alv.free(),
            files: g.maxdir,
            files_free: self.dir.free_count(),
            name_len: 11,
        }
    }

    /// Write the directory back if anything changed.
    pub fn sync(&mut self) -> CpmResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let blksiz = self.geometry().blksiz;
        let bytes = self.dir.encode();
        let mut block_buf = vec![0u8; blksiz];
        for (block, chunk) in bytes.chunks(blksiz).enumerate() {
            if chunk.len() < blksiz {
                // The directory ends inside this block; keep the rest of it.
                self.disk.read_block(block, &mut block_buf, 0, None)?;
            }
            block_buf[..chunk.len()].copy_from_slice(chunk);
            self.disk.write_block(block, &block_buf, 0, None)?;
        }
        log::debug!("directory flushed ({} bytes)", bytes.len());
        self.dirty = false;
        Ok(())
    }

    /// Sync, close the device and hand it back.
    pub fn unmount(mut self) -> CpmResult<D> {
        self.sync()?;
        self.disk.device_mut().close()?;
        Ok(self.disk.into_device())
    }

    fn require_dir(dir: &Inode) -> CpmResult<()> {
        if dir.is_dir() {
            Ok(())
        } else {
            Err(CpmError::NotADirectory)
        }
    }

    /// Create an empty file. Without write bits in `mode` it is read-only.
    pub fn create(&mut self, dir: &Inode, fname: &str, mode: u32) -> CpmResult<Inode> {
        Self::require_dir(dir)?;
        let name = CpmName::parse(fname, self.dialect())?;
        if self.dir.find_extent(&name, 0, None).is_some() {
            return Err(CpmError::FileExists(fname.to_string()));
        }
        let index = self.dir.find_free().ok_or(CpmError::DirectoryFull)?;

        let mut extent = FileExtent::new(&name, self.dir.width());
        if mode & 0o222 == 0 {
            extent.attrs |= Attributes::READ_ONLY;
        }
        let attrs = extent.attrs;
        self.dir.set_slot(index, DirSlot::File(extent));
        self.dirty = true;

        let now = Some(Utc::now());
        let inode = Inode {
            id: InodeId::File(index),
            mode: inode::file_mode(attrs, name.is_com()),
            size: 0,
            attrs,
            atime: now,
            mtime: now,
            ctime: now,
        };
        self.update_stamps(index, &inode);
        log::debug!("created {name} in entry {index}");
        Ok(inode)
    }

    /// Delete every extent of a file and release its blocks.
    pub fn unlink(&mut self, dir: &Inode, fname: &str) -> CpmResult<()> {
        Self::require_dir(dir)?;
        let name = CpmName::parse(fname, self.dialect())?;
        let indices = self.dir.extents_of(&name);
        if indices.is_empty() {
            return Err(CpmError::FileNotFound(fname.to_string()));
        }
        for index in indices {
            let mut slot = self.dir.slot(index).clone();
            slot.release();
            self.dir.set_slot(index, slot);
        }
        self.dirty = true;
        self.alv.rebuild(&self.dir);
        log::debug!("deleted {name}");
        Ok(())
    }

    /// Rename a file, keeping its attributes.
    pub fn rename(&mut self, dir: &Inode, old: &str, new: &str) -> CpmResult<()> {
        Self::require_dir(dir)?;
        let from = CpmName::parse(old, self.dialect())?;
        let to = CpmName::parse(new, self.dialect())?;
        let indices = self.dir.extents_of(&from);
        if indices.is_empty() {
            return Err(CpmError::FileNotFound(old.to_string()));
        }
        if self.dir.find_extent(&to, 0, None).is_some() {
            return Err(CpmError::FileExists(new.to_string()));
        }
        for index in indices {
            if let Some(extent) = self.dir.extent_mut(index) {
                extent.user = to.user;
                extent.name = to.name;
                extent.ext = to.ext;
            }
        }
        self.dirty = true;
        log::debug!("renamed {from} to {to}");
        Ok(())
    }

    /// Record the inode's times in the stamp slot of entry `index`.
    fn update_stamps(&mut self, index: usize, inode: &Inode) {
        let clock = self.clock;
        let encode =
            |t: Option<DateTime<Utc>>| t.map_or(CpmStamp::ZERO, |t| clock.encode(t));
        let create_access = if self.create_stamps {
            inode.ctime
        } else {
            inode.atime
        };
        if let Some(record) = self.dir.stamps_mut(index) {
            record.create_access = encode(create_access);
            record.update = encode(inode.mtime);
            self.dirty = true;
        }
    }
}
