//! Subcommand implementations.

use std::error::Error;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Local;
use serde::Serialize;

use cpmfs_core::fs::S_IFDIR;
use cpmfs_core::{
    format, glob, split_user, Attributes, CpmFs, CpmName, Device, Geometry, ImageFile, Inode,
    MemoryDevice, OpenMode,
};

use crate::Global;

type CmdResult = Result<(), Box<dyn Error>>;

const CHUNK: usize = 4096;
const CTRL_Z: u8 = 0x1A;

/// Letters accepted by `chattr`, in display order.
const ATTR_LETTERS: [(char, Attributes); 7] = [
    ('1', Attributes::F1),
    ('2', Attributes::F2),
    ('3', Attributes::F3),
    ('4', Attributes::F4),
    ('r', Attributes::READ_ONLY),
    ('s', Attributes::SYSTEM),
    ('a', Attributes::ARCHIVE),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    Plain,
    Long,
    Attributes,
    Json,
}

/// Per-file failures are reported as they happen; the command fails at the end.
#[derive(Default)]
struct Failures(usize);

impl Failures {
    fn record(&mut self, what: &str, err: impl Display) {
        eprintln!("cpmtool: {what}: {err}");
        self.0 += 1;
    }

    fn finish(self) -> CmdResult {
        match self.0 {
            0 => Ok(()),
            1 => Err("1 file failed".into()),
            n => Err(format!("{n} files failed").into()),
        }
    }
}

fn mount(g: &Global, image: &Path, mode: OpenMode) -> Result<CpmFs<ImageFile>, Box<dyn Error>> {
    let mut device = ImageFile::open(image, mode, g.options.as_deref())?;
    let def = format::resolve(&g.format, g.diskdefs.as_deref(), &mut device)?;
    Ok(CpmFs::mount(&def, device)?)
}

/// `u:name.ext` (user 0 when omitted) in listing form.
fn listing_name(arg: &str) -> String {
    let (user, rest) = split_user(arg);
    format!("{:02}{}", user.unwrap_or(0), rest.to_ascii_lowercase())
}

/// Expand patterns against the listing, leaving out `[passwd]` and `[label]`.
///
/// A pattern that matched nothing comes back in normalized form so the
/// following lookup reports it.
fn expand<D: Device>(fs: &CpmFs<D>, patterns: &[String]) -> Result<Vec<String>, Box<dyn Error>> {
    let names = fs.list_names(&fs.root())?;
    Ok(glob(patterns, &names)
        .into_iter()
        .filter(|name| !name.starts_with('['))
        .collect())
}

fn read_all<D: Device>(fs: &mut CpmFs<D>, inode: &Inode) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut file = fs.open(inode, OpenMode::ReadOnly)?;
    let mut data = Vec::with_capacity(inode.size as usize);
    let mut buf = [0u8; CHUNK];
    loop {
        let n = fs.read(&mut file, &mut buf)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    fs.close(file)?;
    Ok(data)
}

/// Text read from CP/M: stop at ^Z, CR LF becomes LF.
fn text_from_cpm(data: &[u8]) -> Vec<u8> {
    let end = data.iter().position(|&b| b == CTRL_Z).unwrap_or(data.len());
    let mut out = Vec::with_capacity(end);
    let mut bytes = data[..end].iter().peekable();
    while let Some(&b) = bytes.next() {
        if b == b'\r' && bytes.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}

/// Text written to CP/M: LF becomes CR LF, terminated by ^Z.
fn text_to_cpm(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 16 + 1);
    let mut prev = 0;
    for &b in data {
        if b == b'\n' && prev != b'\r' {
            out.push(b'\r');
        }
        out.push(b);
        prev = b;
    }
    out.push(CTRL_Z);
    out
}

fn mode_string(mode: u32) -> String {
    let mut s = String::with_capacity(10);
    s.push(if mode & S_IFDIR == S_IFDIR { 'd' } else { '-' });
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 7;
        s.push(if bits & 4 != 0 { 'r' } else { '-' });
        s.push(if bits & 2 != 0 { 'w' } else { '-' });
        s.push(if bits & 1 != 0 { 'x' } else { '-' });
    }
    if mode & 0o1000 != 0 {
        let last = if mode & 1 != 0 { 't' } else { 'T' };
        s.pop();
        s.push(last);
    }
    s
}

fn attr_string(attrs: Attributes) -> String {
    ATTR_LETTERS
        .iter()
        .map(|&(c, flag)| if attrs.contains(flag) { c } else { '-' })
        .collect()
}

fn parse_attrs(letters: &str) -> Result<Attributes, Box<dyn Error>> {
    let mut attrs = Attributes::empty();
    for c in letters.chars() {
        let flag = ATTR_LETTERS
            .iter()
            .find(|&&(l, _)| l == c.to_ascii_lowercase())
            .map(|&(_, flag)| flag)
            .ok_or_else(|| format!("unknown attribute '{c}' (use 1234rsa)"))?;
        attrs |= flag;
    }
    Ok(attrs)
}

#[derive(Debug, Serialize)]
struct ListEntry {
    user: u8,
    name: String,
    size: u64,
    mode: String,
    attributes: String,
    modified: Option<String>,
}

impl ListEntry {
    fn new(listing: &str, inode: &Inode) -> Self {
        let user = listing[..2].parse().unwrap_or(0);
        ListEntry {
            user,
            name: listing[2..].to_string(),
            size: inode.size,
            mode: mode_string(inode.mode),
            attributes: attr_string(inode.attrs),
            modified: inode.mtime.map(|t| t.to_rfc3339()),
        }
    }
}

pub fn ls(g: &Global, image: &Path, patterns: &[String], style: ListStyle) -> CmdResult {
    let fs = mount(g, image, OpenMode::ReadOnly)?;
    let root = fs.root();
    let names = if patterns.is_empty() {
        fs.list_names(&root)?
            .into_iter()
            .filter(|n| n != "." && n != ".." && !n.starts_with('['))
            .collect()
    } else {
        expand(&fs, patterns)?
    };

    let mut failures = Failures::default();
    let mut listed: Vec<(ListEntry, Inode)> = Vec::new();
    for name in names {
        match fs.lookup(&root, &name) {
            Ok(inode) => listed.push((ListEntry::new(&name, &inode), inode)),
            Err(e) => failures.record(&name, e),
        }
    }
    listed.sort_by(|(a, _), (b, _)| (a.user, &a.name).cmp(&(b.user, &b.name)));

    match style {
        ListStyle::Json => {
            let entries: Vec<&ListEntry> = listed.iter().map(|(e, _)| e).collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        ListStyle::Plain => {
            let mut user = None;
            for (entry, _) in &listed {
                if user != Some(entry.user) {
                    println!("{}:", entry.user);
                    user = Some(entry.user);
                }
                println!("  {}", entry.name);
            }
        }
        ListStyle::Long => {
            for (entry, inode) in &listed {
                let date = inode.mtime.map_or_else(
                    || " ".repeat(17),
                    |t| t.with_timezone(&Local).format("%b %e %Y %H:%M").to_string(),
                );
                println!(
                    "{} {:>8} {} {:>2}: {}",
                    entry.mode, entry.size, date, entry.user, entry.name
                );
            }
        }
        ListStyle::Attributes => {
            for (entry, _) in &listed {
                println!("{} {:>2}: {}", entry.attributes, entry.user, entry.name);
            }
        }
    }

    fs.unmount()?;
    failures.finish()
}

pub fn df(g: &Global, image: &Path, json: bool) -> CmdResult {
    let fs = mount(g, image, OpenMode::ReadOnly)?;
    let st = fs.statfs();
    if json {
        println!("{}", serde_json::to_string_pretty(&st)?);
    } else {
        println!(
            "{}: {} blocks of {} bytes, {} used, {} free",
            image.display(),
            st.blocks,
            st.block_size,
            st.used,
            st.free
        );
        println!("{} directory entries, {} free", st.files, st.files_free);
    }
    fs.unmount()?;
    Ok(())
}

/// Copy out when the destination is a host path, in when it is `user:[file]`.
pub fn cp(
    g: &Global,
    image: &Path,
    sources: &[String],
    dest: &str,
    text: bool,
    preserve: bool,
) -> CmdResult {
    match split_user(dest) {
        (Some(user), name) => copy_in(g, image, sources, user, name, text),
        (None, _) => copy_out(g, image, sources, Path::new(dest), text, preserve),
    }
}

fn copy_out(
    g: &Global,
    image: &Path,
    sources: &[String],
    dest: &Path,
    text: bool,
    preserve: bool,
) -> CmdResult {
    let mut fs = mount(g, image, OpenMode::ReadOnly)?;
    let root = fs.root();
    let names = expand(&fs, sources)?;
    let into_dir = dest.is_dir();
    if names.len() > 1 && !into_dir {
        return Err(format!("{}: not a directory", dest.display()).into());
    }

    let mut failures = Failures::default();
    for name in names {
        let target: PathBuf = if into_dir {
            dest.join(&name[2..])
        } else {
            dest.to_path_buf()
        };
        let copied = (|| -> CmdResult {
            let inode = fs.lookup(&root, &name)?;
            let mut data = read_all(&mut fs, &inode)?;
            if text {
                data = text_from_cpm(&data);
            }
            fs::write(&target, &data)?;
            if let (true, Some(mtime)) = (preserve, inode.mtime) {
                fs::File::options()
                    .write(true)
                    .open(&target)?
                    .set_modified(SystemTime::from(mtime))?;
            }
            log::debug!("copied {name} to {}", target.display());
            Ok(())
        })();
        if let Err(e) = copied {
            failures.record(&name, e);
        }
    }

    fs.unmount()?;
    failures.finish()
}

fn copy_in(
    g: &Global,
    image: &Path,
    sources: &[String],
    user: u8,
    name: &str,
    text: bool,
) -> CmdResult {
    if !name.is_empty() && sources.len() > 1 {
        return Err(format!("{user}:{name}: copying several files onto one name").into());
    }
    let mut fs = mount(g, image, OpenMode::ReadWrite)?;
    let root = fs.root();
    let dialect = fs.geometry().dialect;

    let mut failures = Failures::default();
    for source in sources {
        let host = Path::new(source);
        let copied = (|| -> CmdResult {
            let cpm_name = if name.is_empty() {
                let base = host.file_name().and_then(|n| n.to_str()).unwrap_or(source);
                CpmName::from_host(base, user, dialect)?
            } else {
                CpmName::parse(&format!("{user:02}{name}"), dialect)?
            };
            let target = cpm_name.to_string();
            let mut data = fs::read(host)?;
            if text {
                data = text_to_cpm(&data);
            }
            if fs.lookup(&root, &target).is_ok() {
                fs.unlink(&root, &target)?;
            }
            let inode = fs.create(&root, &target, 0o666)?;
            let mut file = fs.open(&inode, OpenMode::ReadWrite)?;
            let mut written = 0;
            while written < data.len() {
                written += fs.write(&mut file, &data[written..])?;
            }
            fs.close(file)?;
            log::debug!("copied {source} to {target}");
            Ok(())
        })();
        if let Err(e) = copied {
            failures.record(source, e);
        }
    }

    fs.unmount()?;
    failures.finish()
}

pub fn rm(g: &Global, image: &Path, files: &[String]) -> CmdResult {
    let mut fs = mount(g, image, OpenMode::ReadWrite)?;
    let root = fs.root();
    let mut failures = Failures::default();
    for name in expand(&fs, files)? {
        if let Err(e) = fs.unlink(&root, &name) {
            failures.record(&name, e);
        }
    }
    fs.unmount()?;
    failures.finish()
}

pub fn mv(g: &Global, image: &Path, old: &str, new: &str) -> CmdResult {
    let mut fs = mount(g, image, OpenMode::ReadWrite)?;
    let root = fs.root();
    fs.rename(&root, &listing_name(old), &listing_name(new))?;
    fs.unmount()?;
    Ok(())
}

pub fn chmod(g: &Global, image: &Path, mode: &str, files: &[String]) -> CmdResult {
    let mode = u32::from_str_radix(mode, 8).map_err(|_| format!("invalid mode {mode}"))?;
    let mut fs = mount(g, image, OpenMode::ReadWrite)?;
    let root = fs.root();
    let mut failures = Failures::default();
    for name in expand(&fs, files)? {
        let changed = fs
            .lookup(&root, &name)
            .and_then(|mut inode| fs.chmod(&mut inode, mode));
        if let Err(e) = changed {
            failures.record(&name, e);
        }
    }
    fs.unmount()?;
    failures.finish()
}

pub fn chattr(g: &Global, image: &Path, letters: &str, files: &[String]) -> CmdResult {
    let attrs = parse_attrs(letters)?;
    let mut fs = mount(g, image, OpenMode::ReadWrite)?;
    let root = fs.root();
    let mut failures = Failures::default();
    for name in expand(&fs, files)? {
        let changed = fs
            .lookup(&root, &name)
            .and_then(|mut inode| fs.set_attributes(&mut inode, attrs));
        if let Err(e) = changed {
            failures.record(&name, e);
        }
    }
    fs.unmount()?;
    failures.finish()
}

pub fn diskdef(g: &Global, name: &str, image: Option<&Path>, json: bool) -> CmdResult {
    let def = match image {
        Some(path) => {
            let mut device = ImageFile::open(path, OpenMode::ReadOnly, g.options.as_deref())?;
            format::resolve(name, g.diskdefs.as_deref(), &mut device)?
        }
        None => format::resolve(name, g.diskdefs.as_deref(), &mut MemoryDevice::default())?,
    };
    let geometry = Geometry::from_def(&def)?;

    if json {
        let out = serde_json::json!({ "diskdef": def, "geometry": geometry });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("diskdef {}", def.name);
    println!("  seclen {}", def.sec_length);
    if def.cylinders != 0 {
        println!("  cylinders {}", def.cylinders);
        println!("  heads {}", def.heads);
    } else {
        println!("  tracks {}", def.tracks);
    }
    println!("  sectrk {}", def.sectrk);
    println!("  blocksize {}", def.blksiz);
    println!("  maxdir {}", def.maxdir);
    println!("  skew {}", def.skew);
    println!("  boottrk {}", def.boottrk);
    if def.sidedness.code() != 0 {
        println!("  sidedness {}", def.sidedness.code());
    }
    if def.logical_extents != 0 {
        println!("  logicalextents {}", def.logical_extents);
    }
    println!("  os {}", def.dialect.keyword());
    println!("end");
    println!(
        "# {} blocks, {} directory blocks, {} logical extents per entry, {:?} pointers",
        geometry.blocks,
        geometry.dir_blocks(),
        geometry.extents,
        geometry.pointer_width()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_conversion() {
        assert_eq!(text_from_cpm(b"one\r\ntwo\r\n\x1a\x1a\x1a"), b"one\ntwo\n");
        assert_eq!(text_from_cpm(b"bare\rcr"), b"bare\rcr");
        assert_eq!(text_to_cpm(b"one\ntwo\r\n"), b"one\r\ntwo\r\n\x1a");
    }

    #[test]
    fn test_mode_string() {
        assert_eq!(mode_string(0o100666), "-rw-rw-rw-");
        assert_eq!(mode_string(0o100555), "-r-xr-xr-x");
        assert_eq!(mode_string(0o101444), "-r--r--r-T");
        assert_eq!(mode_string(0o040777), "drwxrwxrwx");
    }

    #[test]
    fn test_attr_letters() {
        let attrs = parse_attrs("1rS").unwrap();
        assert_eq!(attrs, Attributes::F1 | Attributes::READ_ONLY | Attributes::SYSTEM);
        assert_eq!(attr_string(attrs), "1---rs-");
        assert!(parse_attrs("x").is_err());
    }

    #[test]
    fn test_listing_name() {
        assert_eq!(listing_name("3:FOO.COM"), "03foo.com");
        assert_eq!(listing_name("12:x"), "12x");
        assert_eq!(listing_name("plain.txt"), "00plain.txt");
    }
}
