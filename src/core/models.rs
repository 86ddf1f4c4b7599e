/*
 * Core data structures shared by the translation engine: destination roots with
 * their language tags, the run-scoped processing statistics, and the outcome a
 * single (source file, destination root) pair can reach in the file pipeline.
 */
use std::path::{Path, PathBuf};

/*
 * Language tags with a known display name. The display name is what the
 * translation instruction tells the model; any other well-formed tag is accepted
 * and shown as-is.
 */
pub const SUPPORTED_LANGUAGES: [(&str, &str); 19] = [
    ("zh-cn", "Simplified Chinese"),
    ("zh-tw", "Traditional Chinese"),
    ("en-us", "English"),
    ("ja-jp", "Japanese"),
    ("ko-kr", "Korean"),
    ("fr-fr", "French"),
    ("de-de", "German"),
    ("es-es", "Spanish"),
    ("pt-br", "Portuguese"),
    ("ru-ru", "Russian"),
    ("it-it", "Italian"),
    ("nl-nl", "Dutch"),
    ("pl-pl", "Polish"),
    ("tr-tr", "Turkish"),
    ("ar-sa", "Arabic"),
    ("hi-in", "Hindi"),
    ("vi-vn", "Vietnamese"),
    ("th-th", "Thai"),
    ("id-id", "Indonesian"),
];

pub fn language_display_name(tag: &str) -> &str {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(tag))
        .map(|(_, name)| *name)
        .unwrap_or(tag)
}

/*
 * A tag is usable as a ledger table suffix only if it is non-empty and made of
 * ASCII alphanumerics and dashes.
 */
pub fn is_well_formed_language_tag(tag: &str) -> bool {
    !tag.is_empty()
        && !tag.starts_with('-')
        && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/*
 * One configured target directory paired with exactly one language tag.
 * Every destination written by a run is mirrored from the same source root.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationRoot {
    pub path: PathBuf,
    pub lang: String,
}

impl DestinationRoot {
    pub fn new(path: impl Into<PathBuf>, lang: impl Into<String>) -> Self {
        DestinationRoot {
            path: path.into(),
            lang: lang.into(),
        }
    }

    pub fn mirror_of(&self, relative_path: &Path) -> PathBuf {
        self.path.join(relative_path)
    }
}

/*
 * Terminal state of the file pipeline for one (source file, destination root) pair.
 * Failures are not represented here; they surface as `ProcessError`.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    IgnoredByPattern,
    SkippedIdentical,
    CopiedIgnoredExtension,
    CopiedBinary,
    SkippedFresh,
    Translated,
    // Written, but the run was paused or stopped before the ledger was updated.
    LeftUnrecorded,
    Stopped,
}

impl FileOutcome {
    pub fn is_stopped(self) -> bool {
        self == FileOutcome::Stopped
    }
}

/*
 * Run-scoped counters. Reset at the start of each run and read at the end for
 * the summary. Skips include pattern matches, identical copies and fresh ledger
 * entries; processed includes copies and completed translations.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    pub processed_files: usize,
    pub skipped_files: usize,
    pub failed_files: usize,
    pub failed_paths: Vec<PathBuf>,
}

impl ProcessingStats {
    pub fn record_outcome(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::IgnoredByPattern
            | FileOutcome::SkippedIdentical
            | FileOutcome::SkippedFresh => self.skipped_files += 1,
            FileOutcome::CopiedIgnoredExtension
            | FileOutcome::CopiedBinary
            | FileOutcome::Translated => self.processed_files += 1,
            FileOutcome::LeftUnrecorded | FileOutcome::Stopped => {}
        }
    }

    pub fn record_failure(&mut self, source_path: &Path) {
        self.failed_files += 1;
        self.failed_paths.push(source_path.to_path_buf());
    }
}
