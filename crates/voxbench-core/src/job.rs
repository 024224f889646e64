//! Benchmark jobs and the dataset manifest.
//!
//! A dataset directory holds audio files plus a `metadata.json` manifest:
//! a JSON array of `{"audio": <file>, "text": <reference transcript>}`
//! entries. One [`BenchmarkJob`] is built per audio file that appears in the
//! manifest; files without a reference are ignored. Downloading or caching
//! the dataset itself is someone else's problem.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Audio container formats the benchmark binary accepts.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "ogg", "flac", "aac", "wav"];

/// One audio sample to score against its reference transcript. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkJob {
    /// Host path of the audio asset.
    pub audio_path: PathBuf,
    /// Dataset this sample belongs to.
    pub dataset: String,
    /// Reference transcript text.
    pub reference: String,
}

impl BenchmarkJob {
    /// File name of the audio asset.
    pub fn file_name(&self) -> String {
        self.audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    audio: String,
    text: String,
}

/// Build the job list from a single audio file or a dataset directory.
///
/// Job order is the sorted file-name order, so repeated runs sequence jobs
/// identically.
pub fn load_jobs(input: &Path) -> io::Result<Vec<BenchmarkJob>> {
    let (dataset_dir, files) = if input.is_file() {
        let dir = input
            .parent()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "input file has no parent directory")
            })?
            .to_path_buf();
        (dir, vec![input.to_path_buf()])
    } else if input.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(input)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && has_audio_extension(p))
            .collect();
        files.sort();
        (input.to_path_buf(), files)
    } else {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("input not found: {}", input.display()),
        ));
    };

    let dataset = dataset_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string());

    let manifest_path = dataset_dir.join("metadata.json");
    let manifest: Vec<ManifestEntry> =
        serde_json::from_str(&fs::read_to_string(&manifest_path)?)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut jobs = Vec::with_capacity(files.len());
    for file in files {
        let Some(stem) = file.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        // The manifest may list a different container for the same sample
        // (e.g. .flac in metadata, .mp3 on disk), so match on the stem.
        if let Some(entry) = manifest.iter().find(|m| m.audio.contains(&stem)) {
            jobs.push(BenchmarkJob {
                audio_path: file,
                dataset: dataset.clone(),
                reference: entry.text.clone(),
            });
        } else {
            log::debug!("skipping {}: not in manifest", file.display());
        }
    }

    Ok(jobs)
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}
