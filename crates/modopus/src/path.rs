//! Input path decomposition and output path derivation.
//!
//! Paths are split on the last separator and the last `.` after it, so
//! `directory + base_name + extension` always reproduces the input when a
//! base name exists.

use std::path::{Path, PathBuf, is_separator};

use crate::decode::DecodeEngine;
use crate::error::TranscodeError;

/// Longest accepted input path, in bytes.
#[cfg(windows)]
pub const PATH_MAX: usize = 260;
#[cfg(not(windows))]
pub const PATH_MAX: usize = 4096;

/// Longest accepted file name (base name plus extension), in bytes.
pub const NAME_MAX: usize = 255;

/// Suffix appended to the base name of every output file.
pub const OUTPUT_EXTENSION: &str = ".opus";

/// An input path split into its three optional components.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathParts {
    /// Everything up to and including the last separator.
    pub directory: Option<String>,
    /// File name without the extension.
    pub base_name: Option<String>,
    /// Extension including its leading `.`.
    pub extension: Option<String>,
}

impl PathParts {
    /// Split `path` into directory, base name and extension.
    pub fn decompose(path: &str) -> Result<Self, TranscodeError> {
        if path.len() > PATH_MAX {
            return Err(TranscodeError::PathTooLong {
                len: path.len(),
                max: PATH_MAX,
            });
        }

        let mut last_dot = None;
        let mut last_sep = None;
        for (index, ch) in path.char_indices() {
            if ch == '.' {
                last_dot = Some(index);
            } else if is_separator(ch) {
                last_sep = Some(index);
            }
        }

        // A dot before the last separator belongs to a directory component.
        if let (Some(dot), Some(sep)) = (last_dot, last_sep) {
            if dot < sep {
                last_dot = None;
            }
        }

        let name_start = last_sep.map_or(0, |sep| sep + 1);
        let name_len = path.len() - name_start;
        if name_len > NAME_MAX {
            return Err(TranscodeError::NameTooLong {
                len: name_len,
                max: NAME_MAX,
            });
        }

        let stem_end = last_dot.unwrap_or(path.len());
        let directory = last_sep.map(|sep| path[..=sep].to_string());
        let base_name = (stem_end > name_start).then(|| path[name_start..stem_end].to_string());
        let extension = last_dot.map(|dot| path[dot..].to_string());

        Ok(Self {
            directory,
            base_name,
            extension,
        })
    }

    /// Extension without its leading dot, if one is present and non-empty.
    pub fn bare_extension(&self) -> Option<&str> {
        self.extension
            .as_deref()
            .map(|ext| ext.strip_prefix('.').unwrap_or(ext))
            .filter(|ext| !ext.is_empty())
    }

    /// Whether the decode engine can open files with this extension.
    pub fn is_supported_extension(&self, engine: &dyn DecodeEngine) -> bool {
        match self.bare_extension() {
            Some(ext) => engine.is_extension_supported(ext),
            None => false,
        }
    }

    /// Derive the `.opus` output path.
    ///
    /// The input's directory is mirrored unless `output_dir` overrides it.
    pub fn derive_output_path(
        &self,
        output_dir: Option<&Path>,
    ) -> Result<PathBuf, TranscodeError> {
        let base = self.base_name.as_deref().ok_or(TranscodeError::NoBaseName)?;
        let file_name = format!("{base}{OUTPUT_EXTENSION}");
        let path = match (output_dir, self.directory.as_deref()) {
            (Some(dir), _) => dir.join(file_name),
            (None, Some(dir)) => PathBuf::from(format!("{dir}{file_name}")),
            (None, None) => PathBuf::from(file_name),
        };
        Ok(path)
    }
}
