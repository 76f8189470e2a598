//! Status codes and error plumbing.
//!
//! Failures propagate as `eyre::Report` so that call sites can attach
//! context with `wrap_err` the usual way, but every report produced by this
//! crate carries a [`DbError`] status at its root. Callers that need to
//! branch on the *kind* of failure (tests, the last-error slot, retry
//! logic) recover it with [`DbError::of`] instead of string-matching.

use thiserror::Error;

/// The status carried by every failure this crate produces.
///
/// Input and state errors are returned before any persistent state is
/// touched. I/O errors abort the local transaction and propagate unchanged.
/// Structural corruption surfaces as [`DbError::Io`] rather than silently
/// damaging the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DbError {
    #[error("invalid parameter")]
    InvParameter,
    #[error("invalid page size")]
    InvPageSize,
    #[error("invalid key size")]
    InvKeySize,
    #[error("key not found")]
    KeyNotFound,
    #[error("duplicate key")]
    DuplicateKey,
    #[error("cursor is nil")]
    CursorIsNil,
    #[error("database not initialized")]
    NotInitialized,
    #[error("cache limits reached")]
    LimitsReached,
    #[error("i/o error")]
    Io,
    #[error("file not found")]
    FileNotFound,
    #[error("short read")]
    ShortRead,
    #[error("invalid file version")]
    InvFileVersion,
    #[error("out of memory")]
    OutOfMemory,
}

impl DbError {
    /// Recovers the status from a report.
    ///
    /// Reports produced by this crate always carry a `DbError`; anything
    /// foreign (an OS error that escaped unmapped, a corrupt structure
    /// detected by an `ensure!`) is reported as [`DbError::Io`].
    pub fn of(report: &eyre::Report) -> DbError {
        report
            .downcast_ref::<DbError>()
            .copied()
            .unwrap_or(DbError::Io)
    }
}

/// Maps an OS-level I/O error to the status a caller should see.
pub(crate) fn io_status(err: &std::io::Error) -> DbError {
    match err.kind() {
        std::io::ErrorKind::NotFound => DbError::FileNotFound,
        std::io::ErrorKind::UnexpectedEof => DbError::ShortRead,
        _ => DbError::Io,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::{eyre, WrapErr};

    #[test]
    fn status_survives_wrapping() {
        let report = Err::<(), _>(eyre!(DbError::DuplicateKey))
            .wrap_err("inserting key")
            .unwrap_err();

        assert_eq!(DbError::of(&report), DbError::DuplicateKey);
    }

    #[test]
    fn foreign_reports_fall_back_to_io() {
        let report = eyre!("something unexpected");
        assert_eq!(DbError::of(&report), DbError::Io);
    }

    #[test]
    fn io_status_mapping() {
        use std::io::{Error, ErrorKind};

        assert_eq!(
            io_status(&Error::from(ErrorKind::NotFound)),
            DbError::FileNotFound
        );
        assert_eq!(
            io_status(&Error::from(ErrorKind::UnexpectedEof)),
            DbError::ShortRead
        );
        assert_eq!(
            io_status(&Error::from(ErrorKind::PermissionDenied)),
            DbError::Io
        );
    }
}
