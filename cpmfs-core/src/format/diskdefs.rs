//! Parser for the diskdefs text format.
//!
//! ```text
//! diskdef ibm-3740
//!   seclen 128
//!   tracks 77
//!   sectrk 26
//!   blocksize 1024
//!   maxdir 64
//!   skew 6
//!   boottrk 2
//!   os 2.2
//! end
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use super::{Dialect, DiskDef, Sidedness};
use crate::error::{CpmError, CpmResult};

/// Definitions compiled into the crate, consulted last.
pub const BUILTIN_DISKDEFS: &str = include_str!("../../diskdefs");

/// Candidate diskdefs files, most specific first.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        paths.push(home.join(".diskdefsp"));
        paths.push(home.join(".diskdefs"));
    }
    paths.push(PathBuf::from("diskdefsp"));
    paths.push(PathBuf::from("diskdefs"));
    paths.push(PathBuf::from("/etc/cpmtools/diskdefs"));
    paths
}

/// Look up `name`, either in `explicit` alone or along [`search_paths`]
/// followed by the built-in table.
pub fn find_diskdef(name: &str, explicit: Option<&Path>) -> CpmResult<Option<DiskDef>> {
    if let Some(path) = explicit {
        let text = fs::read_to_string(path)?;
        return parse_diskdefs(&text, name);
    }

    for path in search_paths() {
        let Ok(text) = fs::read_to_string(&path) else {
            continue;
        };
        log::debug!("reading disk definitions from {}", path.display());
        if let Some(def) = parse_diskdefs(&text, name)? {
            return Ok(Some(def));
        }
    }

    parse_diskdefs(BUILTIN_DISKDEFS, name)
}

/// Parse `text` and return the definition called `name`, if present.
///
/// Blocks for other formats are skipped without validation.
pub fn parse_diskdefs(text: &str, name: &str) -> CpmResult<Option<DiskDef>> {
    let mut current: Option<Builder> = None;
    let mut skipping = false;

    for (lineno, line) in text.lines().enumerate() {
        let mut words = line.split_whitespace();
        let Some(keyword) = words.next() else {
            continue;
        };
        if keyword.starts_with('#') {
            continue;
        }
        let value = words.next();

        if skipping {
            if keyword == "end" {
                skipping = false;
            }
            continue;
        }

        if current.is_none() {
            if keyword == "diskdef" {
                match value {
                    Some(v) if v == name => current = Some(Builder::new(name)),
                    _ => skipping = true,
                }
            }
            continue;
        }
        let Some(builder) = current.as_mut() else {
            continue;
        };
        if keyword == "end" {
            return builder.finish().map(Some);
        }
        let value = value.ok_or_else(|| {
            CpmError::Config(format!("line {}: missing value for {keyword}", lineno + 1))
        })?;
        builder.set(keyword, value)?;
    }

    match current {
        Some(_) => Err(CpmError::Config(format!("diskdef {name} has no end"))),
        None => Ok(None),
    }
}

/// Integer in C `strtol(.., 0)` notation: decimal, `0x` hex or leading-zero octal.
fn parse_number(keyword: &str, value: &str) -> CpmResult<i64> {
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let parsed = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse()
    };
    let n = parsed.map_err(|_| CpmError::Config(format!("invalid value {value} for {keyword}")))?;
    Ok(if negative { -n } else { n })
}

fn parse_unsigned(keyword: &str, value: &str) -> CpmResult<usize> {
    let n = parse_number(keyword, value)?;
    usize::try_from(n).map_err(|_| CpmError::Config(format!("{keyword} must not be negative")))
}

struct Builder {
    def: DiskDef,
    side_offset_given: bool,
    seen_seclen: bool,
    seen_tracks: bool,
    seen_sectrk: bool,
    seen_blocksize: bool,
    seen_maxdir: bool,
    seen_boottrk: bool,
}

impl Builder {
    fn new(name: &str) -> Self {
        Builder {
            def: DiskDef::named(name),
            side_offset_given: false,
            seen_seclen: false,
            seen_tracks: false,
            seen_sectrk: false,
            seen_blocksize: false,
            seen_maxdir: false,
            seen_boottrk: false,
        }
    }

    fn set(&mut self, keyword: &str, value: &str) -> CpmResult<()> {
        let def = &mut self.def;
        match keyword {
            "seclen" => {
                def.sec_length = parse_unsigned(keyword, value)?;
                self.seen_seclen = true;
            }
            "tracks" => {
                def.tracks = parse_unsigned(keyword, value)?;
                self.seen_tracks = true;
            }
            "sectrk" => {
                def.sectrk = parse_unsigned(keyword, value)?;
                self.seen_sectrk = true;
            }
            "blocksize" => {
                def.blksiz = parse_unsigned(keyword, value)?;
                self.seen_blocksize = true;
            }
            "maxdir" => {
                def.maxdir = parse_unsigned(keyword, value)?;
                self.seen_maxdir = true;
            }
            "boottrk" => {
                def.boottrk = parse_unsigned(keyword, value)?;
                self.seen_boottrk = true;
            }
            "skew" => def.skew = parse_unsigned(keyword, value)?,
            "skewstart" => def.skewstart = parse_unsigned(keyword, value)?,
            "datasect" => def.datasect = parse_unsigned(keyword, value)?,
            "cylinders" => {
                def.cylinders = parse_unsigned(keyword, value)?;
                self.seen_tracks |= def.cylinders != 0;
            }
            "heads" => def.heads = parse_unsigned(keyword, value)?,
            "fm" => def.fm = parse_number(keyword, value)? != 0,
            "testside" => def.test_side = parse_number(keyword, value)? != 0,
            "datarate" => {
                let rate = parse_number(keyword, value)?;
                def.datarate = u32::try_from(rate).ok();
            }
            "sidedness" => {
                let code = parse_number(keyword, value)?;
                def.sidedness = Sidedness::from_code(code)
                    .ok_or_else(|| CpmError::Config(format!("invalid sidedness {value}")))?;
            }
            "sideoffs" => {
                def.side_offset = parse_unsigned(keyword, value)?;
                self.side_offset_given = def.side_offset != 0;
            }
            "logicalextents" => def.logical_extents = parse_unsigned(keyword, value)?,
            "os" => {
                def.dialect = Dialect::from_keyword(value)
                    .ok_or_else(|| CpmError::Config(format!("invalid os {value}")))?;
            }
            _ => return Err(CpmError::Config(format!("invalid keyword `{keyword}'"))),
        }
        Ok(())
    }

    fn finish(&mut self) -> CpmResult<DiskDef> {
        let missing = [
            (self.seen_seclen, "seclen"),
            (self.seen_tracks, "tracks"),
            (self.seen_sectrk, "sectrk"),
            (self.seen_blocksize, "blocksize"),
            (self.seen_maxdir, "maxdir"),
            (self.seen_boottrk, "boottrk"),
        ]
        .into_iter()
        .find(|(seen, _)| !seen);
        if let Some((_, keyword)) = missing {
            return Err(CpmError::Config(format!(
                "{} parameter missing in diskdef {}",
                keyword, self.def.name
            )));
        }

        let mut def = self.def.clone();
        if def.cylinders != 0 {
            def.tracks = def.cylinders * def.heads;
        }
        if self.side_offset_given {
            def.test_side = true;
        }
        Ok(def)
    }
}
