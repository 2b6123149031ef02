//! Input discovery and output directory setup.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::ExtractorError;

/// Container extension of GoPro recordings, matched case-insensitively.
pub const VIDEO_EXTENSION: &str = "mp4";

/// Resolve the files a session should process.
///
/// A file is returned as is. A directory yields its `.mp4` files sorted by
/// name, which puts chaptered GoPro recordings in capture order.
///
/// # Errors
///
/// - [`ExtractorError::InputMissing`] if `input` does not exist.
/// - [`ExtractorError::InvalidStructure`] if a directory holds no videos.
/// - [`ExtractorError::IoError`] if the directory cannot be listed.
pub fn collect_inputs<P: AsRef<Path>>(input: P) -> Result<Vec<PathBuf>, ExtractorError> {
    let input = input.as_ref();
    if !input.exists() {
        return Err(ExtractorError::InputMissing {
            path: input.to_path_buf(),
        });
    }
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(input)? {
        let path = entry?.path();
        if path.is_file() && is_video(&path) {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(ExtractorError::InvalidStructure(format!(
            "no .{VIDEO_EXTENSION} files in {}",
            input.display()
        )));
    }
    log::debug!("Found {} videos in {}", files.len(), input.display());
    Ok(files)
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case(VIDEO_EXTENSION))
}

/// Create `output` as an empty directory, removing anything already there.
///
/// # Errors
///
/// - [`ExtractorError::OutputMissing`] if an existing `output` cannot be
///   removed.
/// - [`ExtractorError::CannotCreateOutput`] if the directory cannot be
///   created.
pub fn prepare_output_dir<P: AsRef<Path>>(output: P) -> Result<(), ExtractorError> {
    let output = output.as_ref();
    if output.exists() {
        log::info!("Replacing existing output {}", output.display());
        let removed = if output.is_dir() {
            fs::remove_dir_all(output)
        } else {
            fs::remove_file(output)
        };
        removed.map_err(|error| ExtractorError::OutputMissing {
            path: output.to_path_buf(),
            reason: error.to_string(),
        })?;
    }

    fs::create_dir_all(output).map_err(|error| ExtractorError::CannotCreateOutput {
        path: output.to_path_buf(),
        reason: error.to_string(),
    })
}
