//! Facilities for discovering and loading patient timeline files.
//!
//! Timelines are exchanged as JSONL: one patient per line, each line a JSON
//! array of [`Event`] objects in chronological order. This is the interchange
//! format with the upstream timeline source; the clinical-warehouse extract
//! itself is out of scope.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::config::TimelineConfig;
use crate::error::{EhrTokError, Result};
use crate::event::Event;

/// Discovers timeline files rooted at the provided input paths.
///
/// Directories are traversed recursively by default; set
/// [`TimelineConfig::recursive`] to `false` to limit discovery to the first
/// level. Symlink traversal is controlled through
/// [`TimelineConfig::follow_symlinks`].
pub fn collect_paths<P: AsRef<Path>>(inputs: &[P], cfg: &TimelineConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let path = input.as_ref();
        if !path.exists() {
            return Err(EhrTokError::InvalidConfig(format!(
                "input path {path:?} does not exist"
            )));
        }
        let metadata = path
            .symlink_metadata()
            .map_err(|err| EhrTokError::io(err, Some(path.to_path_buf())))?;
        if metadata.is_dir() {
            if cfg.recursive {
                let walker = WalkDir::new(path).follow_links(cfg.follow_symlinks);
                for entry in walker {
                    let entry = entry.map_err(|err| EhrTokError::Internal(err.to_string()))?;
                    if entry.file_type().is_file() {
                        files.push(entry.path().to_path_buf());
                    }
                }
            } else {
                for entry in std::fs::read_dir(path)
                    .map_err(|err| EhrTokError::io(err, Some(path.to_path_buf())))?
                {
                    let entry =
                        entry.map_err(|err| EhrTokError::io(err, Some(path.to_path_buf())))?;
                    let entry_path = entry.path();
                    if entry_path.is_file() {
                        files.push(entry_path);
                    }
                }
            }
        } else if metadata.is_file() {
            files.push(path.to_path_buf());
        }
    }
    if files.is_empty() {
        return Err(EhrTokError::InvalidConfig(
            "no timeline files discovered in provided inputs".into(),
        ));
    }
    files.sort();
    Ok(files)
}

/// Loads patient timelines from JSONL files in discovery order.
///
/// Blank lines are skipped; a malformed line is a fatal parse error carrying
/// the file and line number, never a silently dropped patient.
pub fn load_timelines<P: AsRef<Path>>(
    inputs: &[P],
    cfg: &TimelineConfig,
) -> Result<Vec<Vec<Event>>> {
    let file_paths = collect_paths(inputs, cfg)?;
    let mut timelines = Vec::new();
    for file_path in file_paths {
        let file =
            File::open(&file_path).map_err(|err| EhrTokError::io(err, Some(file_path.clone())))?;
        let reader = BufReader::new(file);
        let mut patients_in_file = 0usize;
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|err| EhrTokError::io(err, Some(file_path.clone())))?;
            if line.trim().is_empty() {
                continue;
            }
            let events: Vec<Event> = serde_json::from_str(&line).map_err(|err| {
                EhrTokError::Serialization(format!(
                    "malformed timeline at {file_path:?}:{}: {err}",
                    line_no + 1
                ))
            })?;
            timelines.push(events);
            patients_in_file += 1;
        }
        debug!("loaded {patients_in_file} timelines from {file_path:?}");
    }
    if timelines.is_empty() {
        return Err(EhrTokError::InvalidConfig(
            "no patient timelines could be loaded from inputs".into(),
        ));
    }
    Ok(timelines)
}
