//! Error types for the CP/M filesystem engine.

use thiserror::Error;

/// Broad classification of a [`CpmError`], for callers that only care
/// about what went wrong and not where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown format or inconsistent geometry.
    Configuration,
    /// Illegal filename or user number.
    Name,
    NotFound,
    AlreadyExists,
    /// Directory or data area full.
    ResourceExhausted,
    /// Reported by the underlying device.
    Device,
    Permission,
    /// Operation applied to the wrong kind of object.
    Invalid,
}

/// Errors that can occur while accessing a CP/M volume.
#[derive(Error, Debug)]
pub enum CpmError {
    #[error("unknown format {0}")]
    UnknownFormat(String),

    #[error("invalid disk definition: {0}")]
    Config(String),

    #[error("illegal CP/M filename: {0}")]
    InvalidName(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("file already exists: {0}")]
    FileExists(String),

    #[error("directory full")]
    DirectoryFull,

    #[error("device full")]
    DeviceFull,

    #[error("file too large")]
    FileTooLarge,

    #[error("permission denied")]
    PermissionDenied,

    #[error("not a regular file")]
    NotRegularFile,

    #[error("not a directory")]
    NotADirectory,

    #[error("device error: {0}")]
    Device(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CpmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CpmError::UnknownFormat(_) | CpmError::Config(_) => ErrorKind::Configuration,
            CpmError::InvalidName(_) => ErrorKind::Name,
            CpmError::FileNotFound(_) => ErrorKind::NotFound,
            CpmError::FileExists(_) => ErrorKind::AlreadyExists,
            CpmError::DirectoryFull | CpmError::DeviceFull | CpmError::FileTooLarge => {
                ErrorKind::ResourceExhausted
            }
            CpmError::PermissionDenied => ErrorKind::Permission,
            CpmError::NotRegularFile | CpmError::NotADirectory => ErrorKind::Invalid,
            CpmError::Device(_) | CpmError::Io(_) => ErrorKind::Device,
        }
    }
}

/// Result type for CP/M filesystem operations.
pub type CpmResult<T> = Result<T, CpmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(CpmError::DirectoryFull.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(CpmError::DeviceFull.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(CpmError::FileTooLarge.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(
            CpmError::FileExists("00foo.bar".into()).kind(),
            ErrorKind::AlreadyExists
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(CpmError::from(io).kind(), ErrorKind::Device);
    }

    #[test]
    fn test_display() {
        let err = CpmError::UnknownFormat("nosuch".into());
        assert_eq!(err.to_string(), "unknown format nosuch");
    }
}
