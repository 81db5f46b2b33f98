//! CP/M filesystem engine
//!
//! This crate reads and writes CP/M volumes (floppy and hard disk images)
//! from a host system:
//! - Disk definitions (diskdefs) and the derived volume geometry
//! - Sector skew and multi-sided track mapping
//! - The directory with its extents, passwords, label and date stamps
//! - File read/write/create/delete/rename through simulated inodes
//!
//! # Architecture
//!
//! The engine is layered:
//! - `Device` trait: sector transfer for image files or memory
//! - `Disk`: block I/O through the skew table
//! - `Directory` + `AllocVector`: the in-memory directory and free-block map
//! - `CpmFs`: the mounted filesystem, with file handles and inodes
//!
//! ```
//! use cpmfs_core::{CpmFs, Geometry, MemoryDevice, OpenMode, TimeCodec};
//! use cpmfs_core::format::{parse_diskdefs, BUILTIN_DISKDEFS};
//!
//! let def = parse_diskdefs(BUILTIN_DISKDEFS, "ibm-3740").unwrap().unwrap();
//! let device = MemoryDevice::blank(&Geometry::from_def(&def).unwrap());
//! let mut fs = CpmFs::mount_with_clock(&def, device, TimeCodec::utc()).unwrap();
//!
//! let root = fs.root();
//! let inode = fs.create(&root, "00hello.txt", 0o666).unwrap();
//! let mut file = fs.open(&inode, OpenMode::ReadWrite).unwrap();
//! fs.write(&mut file, b"hello, world").unwrap();
//! fs.close(file).unwrap();
//!
//! assert_eq!(fs.lookup(&root, "00hello.txt").unwrap().size, 12);
//! ```

pub mod alloc;
pub mod block;
pub mod device;
pub mod dir;
pub mod error;
pub mod format;
pub mod fs;
pub mod geometry;
pub mod name;
pub mod time;

pub use crate::alloc::AllocVector;
pub use block::Disk;
pub use device::{Device, DeviceGeometry, ImageFile, ImageOrder, MemoryDevice, OpenMode};
pub use dir::{Attributes, Directory};
pub use error::{CpmError, CpmResult, ErrorKind};
pub use format::{Dialect, DiskDef, Sidedness};
pub use fs::{CpmFile, CpmFs, DirEntry, Inode, InodeId, Stat, StatFs};
pub use geometry::{Geometry, SkewTable};
pub use name::{glob, glob_match, split_user, CpmName};
pub use time::{CpmStamp, TimeCodec};
