//! Simulated inodes.
//!
//! CP/M has no inodes. A file is identified by the directory index of its
//! lowest extent; its size, mode and times are derived from the directory
//! every time it is looked up.

use chrono::{DateTime, Utc};

use super::CpmFs;
use crate::device::Device;
use crate::dir::{Attributes, FileExtent};
use crate::error::{CpmError, CpmResult};
use crate::name::CpmName;

pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InodeId {
    Root,
    /// The synthetic `[passwd]` file.
    Passwd,
    /// The synthetic `[label]` file.
    Label,
    /// A file, by the directory index of its lowest extent.
    File(usize),
}

impl InodeId {
    /// Inode number as reported by `stat`.
    pub fn number(self, maxdir: usize) -> usize {
        match self {
            InodeId::File(index) => index,
            InodeId::Root => maxdir,
            InodeId::Passwd => maxdir + 1,
            InodeId::Label => maxdir + 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub id: InodeId,
    pub mode: u32,
    pub size: u64,
    pub attrs: Attributes,
    pub atime: Option<DateTime<Utc>>,
    pub mtime: Option<DateTime<Utc>>,
    pub ctime: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub ino: usize,
    pub mode: u32,
    pub size: u64,
    pub atime: Option<DateTime<Utc>>,
    pub mtime: Option<DateTime<Utc>>,
    pub ctime: Option<DateTime<Utc>>,
}

impl Inode {
    pub(crate) fn root(maxdir: usize) -> Self {
        Inode {
            id: InodeId::Root,
            mode: S_IFDIR | 0o777,
            size: (maxdir * 32) as u64,
            attrs: Attributes::empty(),
            atime: None,
            mtime: None,
            ctime: None,
        }
    }

    fn pseudo(id: InodeId, size: usize) -> Self {
        Inode {
            id,
            mode: S_IFREG | 0o444,
            size: size as u64,
            attrs: Attributes::empty(),
            atime: None,
            mtime: None,
            ctime: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_regular(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }
}

/// Unix mode bits for a file with `attrs`.
pub(crate) fn file_mode(attrs: Attributes, is_com: bool) -> u32 {
    let mut mode = S_IFREG | 0o444;
    if !attrs.contains(Attributes::READ_ONLY) {
        mode |= 0o222;
    }
    if is_com {
        mode |= 0o111;
    }
    if attrs.contains(Attributes::SYSTEM) {
        mode |= 0o1000;
    }
    mode
}

impl<D: Device> CpmFs<D> {
    /// Find `fname` in `dir`.
    ///
    /// Besides `UUname.ext`, the root answers to `.`, `..`, and on CP/M 3
    /// volumes to `[passwd]` and `[label]`.
    pub fn lookup(&self, dir: &Inode, fname: &str) -> CpmResult<Inode> {
        Self::require_dir(dir)?;
        match fname {
            "." | ".." => return Ok(self.root()),
            "[passwd]" if !self.passwd.is_empty() => {
                return Ok(Inode::pseudo(InodeId::Passwd, self.passwd.len()))
            }
            "[label]" if !self.label.is_empty() => {
                return Ok(Inode::pseudo(InodeId::Label, self.label.len()))
            }
            _ => {}
        }

        let name = CpmName::parse(fname, self.dialect())?;
        self.file_inode(&name)
            .ok_or_else(|| CpmError::FileNotFound(fname.to_string()))
    }

    /// Index of the lowest extent of `name`, if the file exists.
    pub(crate) fn first_extent(&self, name: &CpmName) -> Option<usize> {
        self.dir
            .extents()
            .filter(|(_, e)| e.matches(name))
            .min_by_key(|&(i, e)| (e.extent, i))
            .map(|(i, _)| i)
    }

    /// Current size of `name`, from its highest extent.
    pub(crate) fn file_size(&self, name: &CpmName) -> u64 {
        self.dir
            .extents()
            .filter(|(_, e)| e.matches(name))
            .map(|(_, e)| e.end_offset())
            .max()
            .unwrap_or(0)
    }

    fn file_inode(&self, name: &CpmName) -> Option<Inode> {
        let index = self.first_extent(name)?;
        let first = self.dir.extent(index)?;
        let mut attrs = first.attrs & Attributes::SETTABLE;
        let (mut atime, mut mtime, mut ctime) = (None, None, None);

        if let Some(stamps) = self.dir.stamps(index) {
            attrs |= stamps.protection();
            let create_access = self.clock.decode(stamps.create_access);
            if self.create_stamps {
                ctime = create_access;
            } else {
                atime = create_access;
            }
            mtime = self.clock.decode(stamps.update);
        }

        Some(Inode {
            id: InodeId::File(index),
            mode: file_mode(attrs, name.is_com()),
            size: self.file_size(name),
            attrs,
            atime,
            mtime,
            ctime,
        })
    }

    /// The extent an inode refers to, or an error for non-files.
    pub(crate) fn owner_extent(&self, inode: &Inode) -> CpmResult<(usize, &FileExtent)> {
        let InodeId::File(index) = inode.id else {
            return Err(CpmError::NotRegularFile);
        };
        let extent = self
            .dir
            .extent(index)
            .ok_or_else(|| CpmError::FileNotFound(format!("entry {index}")))?;
        Ok((index, extent))
    }

    pub fn stat(&self, inode: &Inode) -> Stat {
        Stat {
            ino: inode.id.number(self.geometry().maxdir),
            mode: inode.mode,
            size: inode.size,
            atime: inode.atime,
            mtime: inode.mtime,
            ctime: inode.ctime,
        }
    }

    pub fn attributes(&self, inode: &Inode) -> Attributes {
        inode.attrs
    }

    /// Set F1-F4, read-only, system and archive on every extent.
    ///
    /// F5-F8 and the password flags are left alone.
    pub fn set_attributes(&mut self, inode: &mut Inode, attrs: Attributes) -> CpmResult<()> {
        let (_, owner) = self.owner_extent(inode)?;
        let name = owner.cpm_name();
        let wanted = attrs & Attributes::SETTABLE;

        for index in self.dir.extents_of(&name) {
            if let Some(extent) = self.dir.extent_mut(index) {
                extent.attrs = (extent.attrs - Attributes::SETTABLE) | wanted;
            }
        }
        self.dirty = true;

        inode.attrs = (inode.attrs - Attributes::SETTABLE) | wanted;
        inode.mode = file_mode(inode.attrs, name.is_com());
        Ok(())
    }

    /// Only the owner write bit matters: without it the file becomes
    /// read-only.
    pub fn chmod(&mut self, inode: &mut Inode, mode: u32) -> CpmResult<()> {
        let mut attrs = inode.attrs - Attributes::READ_ONLY;
        if mode & 0o200 == 0 {
            attrs |= Attributes::READ_ONLY;
        }
        self.set_attributes(inode, attrs)
    }
}
