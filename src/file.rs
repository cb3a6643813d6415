//! Locating configuration files on disk.
//!
//! A program reads up to three files, in this order:
//!
//! - the site-wide file (by default `/etc/mailutils.rc`),
//! - the per-user file `~/.{program}`,
//! - a custom file named on the command line.
//!
//! A missing site or user file is not an error, only an absent layer. A
//! missing custom file is an error, since the user asked for it explicitly.
//! Any other I/O failure (permissions and the like) is always propagated.
//!
//! The same module decides where an `include` directive points: a regular
//! file, a directory (which only means something in a program-scoped context),
//! or nothing at all.

use std::path::{Path, PathBuf};

use crate::error::CfgError;

/// Default location of the site-wide configuration file.
pub const SITE_CONFIG_FILE: &str = "/etc/mailutils.rc";

/// The per-user file for `program`: `~/.{program}`.
///
/// Returns `None` if no home directory can be determined.
pub fn user_config_path(program: &str) -> Option<PathBuf> {
    let user = directories::UserDirs::new()?;
    Some(user.home_dir().join(format!(".{program}")))
}

/// Read a file that may legitimately be absent.
pub fn read_optional(path: &Path) -> Result<Option<String>, CfgError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no configuration file, skipping");
            Ok(None)
        }
        Err(e) => Err(CfgError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Read a file that must exist.
pub fn read_required(path: &Path) -> Result<String, CfgError> {
    std::fs::read_to_string(path).map_err(|e| CfgError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Anchor a possibly relative include target.
///
/// Absolute targets are used as given. Relative ones are joined onto `base`,
/// or onto the working directory when there is no base.
pub fn resolve_relative(target: &str, base: Option<&Path>) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        return target.to_path_buf();
    }
    match base {
        Some(base) => base.join(target),
        None => std::env::current_dir()
            .map(|cwd| cwd.join(target))
            .unwrap_or_else(|_| target.to_path_buf()),
    }
}

/// What an include target turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeTarget {
    File(PathBuf),
    Dir(PathBuf),
    Missing(PathBuf),
}

/// Classify `path` without reading it.
pub fn locate(path: &Path) -> Result<IncludeTarget, CfgError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(IncludeTarget::Dir(path.to_path_buf())),
        Ok(_) => Ok(IncludeTarget::File(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(IncludeTarget::Missing(path.to_path_buf()))
        }
        Err(e) => Err(CfgError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
