//! Reading and writing file contents.

use chrono::Utc;

use super::{CpmFs, Inode, InodeId};
use crate::device::{Device, OpenMode};
use crate::dir::{DirSlot, FileExtent, EXTENT_BYTES, MAX_EXTENT, MAX_FILE_BYTES};
use crate::error::{CpmError, CpmResult};

/// An open file: an inode and a byte position.
#[derive(Debug, Clone)]
pub struct CpmFile {
    inode: Inode,
    pos: u64,
    mode: OpenMode,
}

impl CpmFile {
    pub fn inode(&self) -> &Inode {
        &self.inode
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }
}

/// Where a chunk of I/O lands: the block slot inside an extent and the
/// byte range inside that block.
struct Span {
    extent: usize,
    pointer: usize,
    offset: usize,
    len: usize,
}

impl<D: Device> CpmFs<D> {
    pub fn open(&self, inode: &Inode, mode: OpenMode) -> CpmResult<CpmFile> {
        if !inode.is_regular() {
            return Err(CpmError::NotRegularFile);
        }
        if mode == OpenMode::ReadWrite
            && (inode.mode & 0o222 == 0 || !matches!(inode.id, InodeId::File(_)))
        {
            return Err(CpmError::PermissionDenied);
        }
        Ok(CpmFile {
            inode: inode.clone(),
            pos: 0,
            mode,
        })
    }

    pub fn close(&mut self, file: CpmFile) -> CpmResult<()> {
        log::trace!("closed {:?} at {}", file.inode.id, file.pos);
        Ok(())
    }

    fn span(&self, pos: u64, remaining: usize) -> Span {
        let g = self.geometry();
        let pos = pos as usize;
        let offset = pos % g.blksiz;
        Span {
            extent: pos / EXTENT_BYTES,
            pointer: (pos % g.extent_capacity()) / g.blksiz,
            offset,
            len: remaining.min(g.blksiz - offset),
        }
    }

    /// Read from the current position; returns 0 at end of file.
    pub fn read(&mut self, file: &mut CpmFile, buf: &mut [u8]) -> CpmResult<usize> {
        let (index, owner) = match file.inode.id {
            InodeId::Passwd => return Ok(read_blob(&self.passwd, file, buf)),
            InodeId::Label => return Ok(read_blob(&self.label, file, buf)),
            _ => self.owner_extent(&file.inode)?,
        };
        let name = owner.cpm_name();
        let size = self.file_size(&name);
        let seclen = self.geometry().sec_length;
        let mut block_buf = vec![0u8; self.geometry().blksiz];
        let mut done = 0;

        while done < buf.len() && file.pos < size {
            let want = (buf.len() - done).min((size - file.pos) as usize);
            let span = self.span(file.pos, want);
            let block = self
                .dir
                .find_extent(&name, 0, Some(span.extent))
                .and_then(|i| self.dir.extent(i))
                .map_or(0, |e| e.blocks.get(span.pointer));

            let out = &mut buf[done..done + span.len];
            if block == 0 {
                out.fill(0);
            } else {
                let start = span.offset / seclen;
                let end = (span.offset + span.len - 1) / seclen;
                self.disk.read_block(block, &mut block_buf, start, Some(end))?;
                out.copy_from_slice(&block_buf[span.offset..span.offset + span.len]);
            }
            file.pos += span.len as u64;
            done += span.len;
        }
        log::trace!("read {done} bytes from entry {index}");
        Ok(done)
    }

    /// Write at the current position, growing the file as needed.
    ///
    /// Running out of directory entries or blocks part way through, or
    /// reaching the last extent number, gives a short count; the error is
    /// only returned if nothing was written.
    pub fn write(&mut self, file: &mut CpmFile, buf: &[u8]) -> CpmResult<usize> {
        if file.mode != OpenMode::ReadWrite {
            return Err(CpmError::PermissionDenied);
        }
        let (owner_index, owner) = self.owner_extent(&file.inode)?;
        let owner = owner.clone();
        let name = owner.cpm_name();
        let (seclen, blksiz) = (self.geometry().sec_length, self.geometry().blksiz);
        let mut block_buf = vec![0u8; blksiz];
        let mut done = 0;

        while done < buf.len() {
            if file.pos >= MAX_FILE_BYTES {
                return short_write(done, CpmError::FileTooLarge);
            }
            let span = self.span(file.pos, buf.len() - done);

            let index = match self.dir.find_extent(&name, 0, Some(span.extent)) {
                Some(index) => index,
                None => match self.claim_extent(&owner, span.extent) {
                    Ok(index) => {
                        file.inode.mtime = Some(Utc::now());
                        let inode = file.inode.clone();
                        self.update_stamps(index, &inode);
                        index
                    }
                    Err(e) => return short_write(done, e),
                },
            };

            let existing = self.dir.extent(index).map_or(0, |e| e.blocks.get(span.pointer));
            let (block, start, end) = if existing == 0 {
                let block = match self.alv.allocate() {
                    Ok(block) => block,
                    Err(e) => return short_write(done, e),
                };
                if let Some(extent) = self.dir.extent_mut(index) {
                    extent.blocks.set(span.pointer, block);
                }
                self.dirty = true;
                block_buf.fill(0);
                (block, 0, blksiz / seclen - 1)
            } else {
                let start = span.offset / seclen;
                let end = (span.offset + span.len - 1) / seclen;
                if span.offset % seclen != 0 {
                    self.disk.read_block(existing, &mut block_buf, start, Some(start))?;
                }
                let tail = (span.offset + span.len) % seclen != 0;
                if tail && (end != start || span.offset % seclen == 0) {
                    self.disk.read_block(existing, &mut block_buf, end, Some(end))?;
                }
                (existing, start, end)
            };

            block_buf[span.offset..span.offset + span.len]
                .copy_from_slice(&buf[done..done + span.len]);
            self.disk.write_block(block, &block_buf, start, Some(end))?;

            file.pos += span.len as u64;
            done += span.len;
            if let Some(extent) = self.dir.extent_mut(index) {
                extent.extend_to(file.pos);
            }
            file.inode.size = file.inode.size.max(file.pos);
            file.inode.mtime = Some(Utc::now());
            let inode = file.inode.clone();
            self.update_stamps(owner_index, &inode);
            self.dirty = true;
        }
        log::trace!("wrote {done} bytes to entry {owner_index}");
        Ok(done)
    }

    /// Take a free entry for logical extent `extent` of the file `owner`.
    fn claim_extent(&mut self, owner: &FileExtent, extent: usize) -> CpmResult<usize> {
        let extent = u16::try_from(extent)
            .ok()
            .filter(|&e| e as usize <= MAX_EXTENT)
            .ok_or(CpmError::FileTooLarge)?;
        let index = self.dir.find_free().ok_or(CpmError::DirectoryFull)?;
        let mut entry = FileExtent::new(&owner.cpm_name(), self.dir.width());
        entry.attrs = owner.attrs;
        entry.extent = extent;
        self.dir.set_slot(index, DirSlot::File(entry));
        self.dirty = true;
        log::debug!("extent {extent} of {} in entry {index}", owner.cpm_name());
        Ok(index)
    }
}

fn short_write(done: usize, err: CpmError) -> CpmResult<usize> {
    if done > 0 {
        log::debug!("short write of {done} bytes: {err}");
        Ok(done)
    } else {
        Err(err)
    }
}

fn read_blob(blob: &[u8], file: &mut CpmFile, buf: &mut [u8]) -> usize {
    let start = (file.pos as usize).min(blob.len());
    let n = buf.len().min(blob.len() - start);
    buf[..n].copy_from_slice(&blob[start..start + n]);
    file.pos += n as u64;
    n
}
