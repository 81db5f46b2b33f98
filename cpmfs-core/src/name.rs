//! CP/M file names and wildcard matching.
//!
//! Names on the host side are written `UUname.ext`, where `UU` is the
//! two-digit user number. Patterns may instead start with `u:` or `uu:`.

use std::fmt;

use crate::error::{CpmError, CpmResult};
use crate::format::Dialect;

/// A validated user number, name and extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CpmName {
    pub user: u8,
    /// Uppercase, space padded.
    pub name: [u8; 8],
    /// Uppercase, space padded.
    pub ext: [u8; 3],
}

fn is_file_char(c: u8) -> bool {
    c.is_ascii_graphic() && !b"<>.,;:=?*[]|".contains(&c)
}

/// Legal characters of `src`, uppercased into a space padded field.
fn host_field<const N: usize>(src: &str) -> ([u8; N], usize) {
    let mut field = [b' '; N];
    let mut len = 0;
    for c in src.bytes().filter(|&c| is_file_char(c)).take(N) {
        field[len] = c.to_ascii_uppercase();
        len += 1;
    }
    (field, len)
}

impl CpmName {
    /// Split `UUname.ext`.
    ///
    /// Names longer than 8 characters and extensions longer than 3 are
    /// truncated; illegal characters and out-of-range users are rejected.
    pub fn parse(full: &str, dialect: Dialect) -> CpmResult<Self> {
        let illegal = || CpmError::InvalidName(full.to_string());
        let bytes = full.as_bytes();
        if bytes.len() < 3 || !bytes[0].is_ascii_digit() || !bytes[1].is_ascii_digit() {
            return Err(illegal());
        }
        let user = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
        if user > dialect.max_user() {
            return Err(illegal());
        }

        let rest = &bytes[2..];
        let (stem, ext) = match rest.iter().position(|&c| c == b'.') {
            Some(dot) => (&rest[..dot], &rest[dot + 1..]),
            None => (rest, &rest[rest.len()..]),
        };
        if stem.is_empty() || !stem.iter().chain(ext).all(|&c| is_file_char(c)) {
            return Err(illegal());
        }

        let mut name = [b' '; 8];
        for (dst, src) in name.iter_mut().zip(stem) {
            *dst = src.to_ascii_uppercase();
        }
        let mut extension = [b' '; 3];
        for (dst, src) in extension.iter_mut().zip(ext) {
            *dst = src.to_ascii_uppercase();
        }
        Ok(CpmName {
            user,
            name,
            ext: extension,
        })
    }

    /// Name a host file `filename` for `user`.
    ///
    /// The extension starts at the last dot. Characters CP/M cannot hold
    /// are dropped before cutting to 8.3; an empty stem becomes `_`.
    ///
    /// ```
    /// use cpmfs_core::{CpmName, Dialect};
    /// let name = CpmName::from_host("Read Me.first", 3, Dialect::Dr22).unwrap();
    /// assert_eq!(name.to_string(), "03readme.fir");
    /// ```
    pub fn from_host(filename: &str, user: u8, dialect: Dialect) -> CpmResult<Self> {
        if user > dialect.max_user() {
            return Err(CpmError::InvalidName(format!("{user}:{filename}")));
        }
        let (stem, ext) = filename.rsplit_once('.').unwrap_or((filename, ""));
        let (mut name, len) = host_field::<8>(stem);
        if len == 0 {
            name[0] = b'_';
        }
        let (ext, _) = host_field::<3>(ext);
        Ok(CpmName { user, name, ext })
    }

    /// `.COM` files are the executables of CP/M.
    pub fn is_com(&self) -> bool {
        &self.ext == b"COM"
    }
}

impl fmt::Display for CpmName {
    /// `UUname.ext` in lower case, the form used in directory listings.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.user)?;
        for &c in self.name.iter().take_while(|&&c| c != b' ') {
            write!(f, "{}", (c & 0x7F).to_ascii_lowercase() as char)?;
        }
        if self.ext[0] & 0x7F != b' ' {
            write!(f, ".")?;
            for &c in self.ext.iter().take_while(|&&c| c != b' ') {
                write!(f, "{}", (c & 0x7F).to_ascii_lowercase() as char)?;
            }
        }
        Ok(())
    }
}

/// Split an optional `u:` / `uu:` user prefix off a name or pattern.
pub fn split_user(pattern: &str) -> (Option<u8>, &str) {
    let b = pattern.as_bytes();
    if b.len() >= 2 && b[0].is_ascii_digit() && b[1] == b':' {
        (Some(b[0] - b'0'), &pattern[2..])
    } else if b.len() >= 3 && b[0].is_ascii_digit() && b[1].is_ascii_digit() && b[2] == b':' {
        (Some((b[0] - b'0') * 10 + (b[1] - b'0')), &pattern[3..])
    } else {
        (None, pattern)
    }
}

/// Rewrite a user pattern into the `UU…` form matched against listings.
///
/// `0:*.*` becomes `00*`, `foo.*` becomes `??foo.*`, and an empty pattern
/// or one starting with `*.*` matches everything.
pub fn normalize_pattern(pattern: &str) -> String {
    let (user, rest) = split_user(pattern);
    let rest = if rest.is_empty() || rest.starts_with("*.*") {
        "*"
    } else {
        rest
    };
    match user {
        Some(user) => format!("{user:02}{rest}"),
        None => format!("??{rest}"),
    }
}

/// Match a listing name against a user pattern.
pub fn glob_match(name: &str, pattern: &str) -> bool {
    wildcard_match(name.as_bytes(), normalize_pattern(pattern).as_bytes())
}

/// Case-insensitive wildcard match.
///
/// `*` matches any run of characters, dots included; `?` matches exactly
/// one. Backtracks only to the most recent star.
pub fn wildcard_match(name: &[u8], pattern: &[u8]) -> bool {
    let (mut n, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        match pattern.get(p) {
            Some(b'*') => {
                star = Some((p, n));
                p += 1;
            }
            Some(b'?') => {
                n += 1;
                p += 1;
            }
            Some(&c) if c.eq_ignore_ascii_case(&name[n]) => {
                n += 1;
                p += 1;
            }
            _ => match star {
                Some((sp, sn)) => {
                    p = sp + 1;
                    n = sn + 1;
                    star = Some((sp, sn + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == b'*')
}

/// Expand `patterns` against a directory listing.
///
/// Each pattern contributes every matching name, in listing order; a
/// pattern with no match contributes its normalized form so the caller
/// can report it as missing. `.` and `..` never match.
pub fn glob<S: AsRef<str>>(patterns: &[S], listing: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let mut matched = false;
        for name in listing {
            if name == "." || name == ".." || !glob_match(name, pattern) {
                continue;
            }
            matched = true;
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        if !matched {
            out.push(normalize_pattern(pattern));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let n = CpmName::parse("00hello.txt", Dialect::Dr22).unwrap();
        assert_eq!(n.user, 0);
        assert_eq!(&n.name, b"HELLO   ");
        assert_eq!(&n.ext, b"TXT");
        assert_eq!(n.to_string(), "00hello.txt");
    }

    #[test]
    fn test_parse_no_extension() {
        let n = CpmName::parse("15readme", Dialect::Dr3).unwrap();
        assert_eq!(n.user, 15);
        assert_eq!(&n.ext, b"   ");
        assert_eq!(n.to_string(), "15readme");
    }

    #[test]
    fn test_parse_truncates() {
        let n = CpmName::parse("01verylongname.text", Dialect::Dr22).unwrap();
        assert_eq!(&n.name, b"VERYLONG");
        assert_eq!(&n.ext, b"TEX");
    }

    #[test]
    fn test_parse_rejects() {
        assert!(CpmName::parse("hello.txt", Dialect::Dr22).is_err());
        assert!(CpmName::parse("00", Dialect::Dr22).is_err());
        assert!(CpmName::parse("00.txt", Dialect::Dr22).is_err());
        assert!(CpmName::parse("00a*b", Dialect::Dr22).is_err());
        assert!(CpmName::parse("00a b", Dialect::Dr22).is_err());
        assert!(CpmName::parse("16foo", Dialect::Dr22).is_err());
        assert!(CpmName::parse("16foo", Dialect::Dr3).is_err());
        assert!(CpmName::parse("31foo", Dialect::P2dos).is_ok());
        assert!(CpmName::parse("32foo", Dialect::P2dos).is_err());
    }

    #[test]
    fn test_from_host() {
        let host = |f: &str| CpmName::from_host(f, 0, Dialect::Dr22).unwrap().to_string();
        assert_eq!(host("hello.txt"), "00hello.txt");
        assert_eq!(host("VeryLongName.extension"), "00verylong.ext");
        assert_eq!(host("test$file.com"), "00test$fil.com");
        assert_eq!(host("hello world.txt"), "00hellowor.txt");
        assert_eq!(host("archive.tar.gz"), "00archivet.gz");
        assert_eq!(host(".txt"), "00_.txt");
        assert_eq!(host("caf\u{e9}:1"), "00caf1");
    }

    #[test]
    fn test_from_host_user_range() {
        let name = CpmName::from_host("x.com", 31, Dialect::P2dos).unwrap();
        assert_eq!(name.user, 31);
        assert!(name.is_com());
        assert!(CpmName::from_host("x.com", 16, Dialect::Dr3).is_err());
    }

    #[test]
    fn test_from_host_parses_back() {
        for host in ["a.b", "weird name!.tar.gz", "x{y}.$$$", "..."] {
            let name = CpmName::from_host(host, 5, Dialect::Dr22).unwrap();
            assert_eq!(CpmName::parse(&name.to_string(), Dialect::Dr22).unwrap(), name);
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_pattern("0:*.*"), "00*");
        assert_eq!(normalize_pattern("12:foo.*"), "12foo.*");
        assert_eq!(normalize_pattern(""), "??*");
        assert_eq!(normalize_pattern("*.com"), "??*.com");
    }

    #[test]
    fn test_user_scoped_match() {
        assert!(glob_match("00foo.bar", "0:*.*"));
        assert!(!glob_match("01foo.bar", "0:*.*"));
        assert!(glob_match("01foo.bar", "1:foo.bar"));
    }

    #[test]
    fn test_any_user_match() {
        assert!(wildcard_match(b"00foo.bar", b"??*"));
        assert!(wildcard_match(b"31x", b"??*"));
        assert!(glob_match("07FOO.BAR", "foo.*"));
        assert!(!glob_match("07foo", "foo.*"));
    }

    #[test]
    fn test_star_crosses_dot() {
        assert!(wildcard_match(b"00foo.bar", b"00f*r"));
        assert!(wildcard_match(b"00foo.bar", b"00*.*"));
        assert!(!wildcard_match(b"00foo", b"00*.*"));
        assert!(wildcard_match(b"00ab", b"00ab*"));
    }

    #[test]
    fn test_question_needs_a_character() {
        assert!(!wildcard_match(b"00ab", b"00ab?"));
        assert!(wildcard_match(b"00abc", b"00ab?"));
    }

    #[test]
    fn test_pathological_pattern() {
        let name = vec![b'a'; 200];
        let pattern = b"*a*a*a*a*a*a*a*a*a*a*b";
        assert!(!wildcard_match(&name, pattern));
    }

    #[test]
    fn test_glob_expansion() {
        let listing: Vec<String> = [".", "..", "[label]", "00a.com", "00b.txt", "01a.com"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(glob(&["0:*.com"], &listing), vec!["00a.com"]);
        assert_eq!(glob(&["*.com"], &listing), vec!["00a.com", "01a.com"]);
        assert_eq!(glob(&["0:nosuch"], &listing), vec!["00nosuch"]);
        assert_eq!(glob(&["*"], &listing), vec!["[label]", "00a.com", "00b.txt", "01a.com"]);
    }
}
