use crate::core::file_processor::{FileProcessor, ProcessError};
use crate::core::models::{DestinationRoot, ProcessingStats};
use crate::core::path_utils;
use crate::core::run_control::RunControl;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/*
 * Walks the source tree depth-first in file-name order, mirrors every directory
 * that is not ignored into each destination root, and runs the file pipeline once
 * per (file, destination) pair.
 *
 * Ignored directories are pruned before they are entered, so neither they nor
 * anything below them is visited or mirrored. The stop signal is checked before
 * every entry; once seen, the walk returns `WalkOutcome::Stopped` without
 * touching anything else.
 */

#[derive(Debug)]
pub enum WalkError {
    SourceMissing(PathBuf),
    Fatal(ProcessError),
}

impl std::fmt::Display for WalkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalkError::SourceMissing(path) => {
                write!(f, "Source folder {path:?} does not exist or is not a directory")
            }
            WalkError::Fatal(e) => write!(f, "Run aborted: {e}"),
        }
    }
}

impl std::error::Error for WalkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WalkError::Fatal(e) => Some(e),
            WalkError::SourceMissing(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    Completed,
    Stopped,
}

pub struct TreeWalker<'a> {
    processor: &'a FileProcessor,
    destinations: &'a [DestinationRoot],
}

impl<'a> TreeWalker<'a> {
    pub fn new(processor: &'a FileProcessor, destinations: &'a [DestinationRoot]) -> Self {
        TreeWalker {
            processor,
            destinations,
        }
    }

    /*
     * Processes the whole source tree, accumulating per-file results into `stats`.
     * A failing (file, destination) pair fails that file and skips its remaining
     * destinations; only configuration errors abort the walk.
     */
    pub fn walk(
        &self,
        control: &RunControl,
        stats: &mut ProcessingStats,
    ) -> Result<WalkOutcome, WalkError> {
        let source_root = &self.processor.settings().source_root;
        if !source_root.is_dir() {
            return Err(WalkError::SourceMissing(source_root.clone()));
        }
        log::info!("TreeWalker: Starting to process directory {source_root:?}");

        let walker = WalkDir::new(source_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_ignored_dir(source_root, entry));

        for entry_result in walker {
            if control.is_stopped() {
                log::info!("TreeWalker: Processing stopped");
                return Ok(WalkOutcome::Stopped);
            }

            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    log::error!("TreeWalker: Failed to read directory entry: {e}");
                    if let Some(path) = e.path() {
                        stats.record_failure(path);
                    }
                    continue;
                }
            };

            let Some(relative) = path_utils::relative_slash_path(source_root, entry.path()) else {
                continue;
            };

            if entry.file_type().is_dir() {
                self.mirror_directory(&relative);
                continue;
            }
            if !entry.path().is_file() {
                log::debug!("TreeWalker: Skipping non-file entry {:?}", entry.path());
                continue;
            }

            log::debug!("TreeWalker: File '{relative}'");
            if self.process_entry(entry.path(), control, stats)? == WalkOutcome::Stopped {
                return Ok(WalkOutcome::Stopped);
            }
        }

        Ok(WalkOutcome::Completed)
    }

    fn is_ignored_dir(&self, source_root: &Path, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let Some(relative) = path_utils::relative_slash_path(source_root, entry.path()) else {
            return false;
        };
        match self
            .processor
            .settings()
            .ignore_rules
            .matching_dir_pattern(&relative)
        {
            Some(pattern) => {
                log::info!(
                    "TreeWalker: Skipping ignored directory '{relative}' (matched pattern: {pattern})"
                );
                true
            }
            None => false,
        }
    }

    fn mirror_directory(&self, relative: &str) {
        for destination in self.destinations {
            let target = destination.mirror_of(Path::new(relative));
            if target.is_dir() {
                continue;
            }
            log::debug!("TreeWalker: Creating target directory {target:?}");
            // A failure here resurfaces as a per-file error when the pipeline writes.
            if let Err(e) = fs::create_dir_all(&target) {
                log::warn!("TreeWalker: Failed to create target directory {target:?}: {e}");
            }
        }
    }

    fn process_entry(
        &self,
        source_path: &Path,
        control: &RunControl,
        stats: &mut ProcessingStats,
    ) -> Result<WalkOutcome, WalkError> {
        for destination in self.destinations {
            match self.processor.process_file(source_path, destination, control) {
                Ok(outcome) if outcome.is_stopped() => return Ok(WalkOutcome::Stopped),
                Ok(outcome) => {
                    log::trace!("TreeWalker: {source_path:?} -> [{}] {outcome:?}", destination.lang);
                    stats.record_outcome(outcome);
                }
                Err(e) if e.is_fatal() => {
                    log::error!("TreeWalker: Fatal error on {source_path:?}: {e}");
                    stats.record_failure(source_path);
                    return Err(WalkError::Fatal(e));
                }
                Err(e) => {
                    log::error!(
                        "TreeWalker: Failed to process {source_path:?} for [{}]: {e}",
                        destination.lang
                    );
                    stats.record_failure(source_path);
                    break;
                }
            }
        }
        Ok(WalkOutcome::Completed)
    }
}
