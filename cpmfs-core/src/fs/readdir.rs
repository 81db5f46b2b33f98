//! Directory listing.

use super::{CpmFs, Inode, InodeId};
use crate::device::Device;
use crate::error::CpmResult;

/// One name in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: usize,
    pub name: String,
    /// Cursor position of the next entry.
    pub offset: usize,
}

/// Position in a listing: `.`, `..`, `[passwd]`, `[label]`, then one slot
/// per directory entry.
#[derive(Debug, Clone, Default)]
pub struct DirCursor {
    pos: usize,
}

const FIRST_SLOT: usize = 4;

impl<D: Device> CpmFs<D> {
    pub fn opendir(&self, dir: &Inode) -> CpmResult<DirCursor> {
        Self::require_dir(dir)?;
        Ok(DirCursor::default())
    }

    /// Next name, or `None` at the end.
    ///
    /// A file is listed once, at the slot of its lowest extent.
    pub fn readdir(&self, cursor: &mut DirCursor) -> Option<DirEntry> {
        let maxdir = self.geometry().maxdir;
        loop {
            let pos = cursor.pos;
            if pos >= FIRST_SLOT + maxdir {
                return None;
            }
            cursor.pos += 1;

            let found = match pos {
                0 => Some((InodeId::Root, ".".to_string())),
                1 => Some((InodeId::Root, "..".to_string())),
                2 if !self.passwd.is_empty() => Some((InodeId::Passwd, "[passwd]".to_string())),
                3 if !self.label.is_empty() => Some((InodeId::Label, "[label]".to_string())),
                2 | 3 => None,
                _ => {
                    let index = pos - FIRST_SLOT;
                    self.dir.extent(index).and_then(|extent| {
                        let name = extent.cpm_name();
                        (self.first_extent(&name) == Some(index))
                            .then(|| (InodeId::File(index), name.to_string()))
                    })
                }
            };

            if let Some((id, name)) = found {
                return Some(DirEntry {
                    ino: id.number(maxdir),
                    name,
                    offset: cursor.pos,
                });
            }
        }
    }

    /// The whole listing of `dir`.
    pub fn read_dir(&self, dir: &Inode) -> CpmResult<Vec<DirEntry>> {
        let mut cursor = self.opendir(dir)?;
        let mut entries = Vec::new();
        while let Some(entry) = self.readdir(&mut cursor) {
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Names in `dir`, in listing order.
    pub fn list_names(&self, dir: &Inode) -> CpmResult<Vec<String>> {
        Ok(self.read_dir(dir)?.into_iter().map(|e| e.name).collect())
    }
}
