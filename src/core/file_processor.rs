/*
 * The per-file pipeline. For one (source file, destination root) pair it decides
 * what happens to the file, in order:
 *
 *   1. an ignore pattern matches the relative path: nothing is done;
 *   2. the extension is excluded from translation: copied unless the destination
 *      is already byte-identical;
 *   3. the content sniffs as binary: copied verbatim;
 *   4. the ledger says the destination is still fresh: skipped;
 *   5. otherwise the text is translated, whole or segment by segment.
 *
 * Segmented translations rewrite the destination after every segment, so partial
 * output survives a crash or a stop. The ledger row is reset before translation
 * starts and stamped only when the translation finished on an undisturbed run.
 */
use crate::core::checksum_utils;
use crate::core::config::{RunSettings, normalize_extension};
use crate::core::content_sniff;
use crate::core::ignore_rules::IgnoreRules;
use crate::core::models::{DestinationRoot, FileOutcome};
use crate::core::path_utils;
use crate::core::run_control::RunControl;
use crate::core::segmentation::{MarkerTable, combine_segments, segment_text};
use crate::core::tokenizer_utils::estimate_tokens;
use crate::core::translation_ledger::{LedgerError, TranslationLedgerOperations};
use crate::core::translator::{TranslateError, TranslationRequest, TranslatorOperations};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug)]
pub enum ProcessError {
    Io { path: PathBuf, source: io::Error },
    Ledger(LedgerError),
    Translate(TranslateError),
    SourceOutsideRoot(PathBuf),
}

impl From<LedgerError> for ProcessError {
    fn from(err: LedgerError) -> Self {
        ProcessError::Ledger(err)
    }
}

impl From<TranslateError> for ProcessError {
    fn from(err: TranslateError) -> Self {
        ProcessError::Translate(err)
    }
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessError::Io { path, source } => write!(f, "I/O error on {path:?}: {source}"),
            ProcessError::Ledger(e) => write!(f, "{e}"),
            ProcessError::Translate(e) => write!(f, "{e}"),
            ProcessError::SourceOutsideRoot(path) => {
                write!(f, "Source file {path:?} is not inside the source root")
            }
        }
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProcessError::Io { source, .. } => Some(source),
            ProcessError::Ledger(e) => Some(e),
            ProcessError::Translate(e) => Some(e),
            ProcessError::SourceOutsideRoot(_) => None,
        }
    }
}

impl ProcessError {
    /*
     * Configuration errors abort the whole run; anything else only fails the file.
     */
    pub fn is_fatal(&self) -> bool {
        match self {
            ProcessError::SourceOutsideRoot(_) => true,
            ProcessError::Ledger(e) => e.is_configuration_error(),
            ProcessError::Io { .. } | ProcessError::Translate(_) => false,
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ProcessError + '_ {
    move |source| ProcessError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/*
 * The part of `RunSettings` the pipeline needs.
 */
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub source_root: PathBuf,
    pub ignore_rules: IgnoreRules,
    pub ignore_translation_extensions: HashSet<String>,
    pub markers: MarkerTable,
    pub max_tokens_per_segment: usize,
}

impl PipelineSettings {
    pub fn from_run_settings(settings: &RunSettings) -> Self {
        PipelineSettings {
            source_root: settings.source_root.clone(),
            ignore_rules: settings.ignore_rules.clone(),
            ignore_translation_extensions: settings.ignore_translation_extensions.clone(),
            markers: settings.markers.clone(),
            max_tokens_per_segment: settings.max_tokens_per_segment,
        }
    }
}

pub struct FileProcessor {
    settings: PipelineSettings,
    ledger: Arc<dyn TranslationLedgerOperations>,
    translator: Arc<dyn TranslatorOperations>,
}

impl FileProcessor {
    pub fn new(
        settings: PipelineSettings,
        ledger: Arc<dyn TranslationLedgerOperations>,
        translator: Arc<dyn TranslatorOperations>,
    ) -> Self {
        FileProcessor {
            settings,
            ledger,
            translator,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /*
     * Runs the pipeline for one (source file, destination root) pair and returns
     * where it ended. Cancellation is an outcome (`FileOutcome::Stopped`), never an
     * error.
     */
    pub fn process_file(
        &self,
        source_path: &Path,
        destination: &DestinationRoot,
        control: &RunControl,
    ) -> Result<FileOutcome, ProcessError> {
        let relative = path_utils::relative_slash_path(&self.settings.source_root, source_path)
            .filter(|relative| !relative.is_empty())
            .ok_or_else(|| ProcessError::SourceOutsideRoot(source_path.to_path_buf()))?;

        if let Some(pattern) = self.settings.ignore_rules.matching_file_pattern(&relative) {
            log::info!("FileProcessor: Skipping ignored file '{relative}' (matched pattern: {pattern})");
            return Ok(FileOutcome::IgnoredByPattern);
        }

        let destination_path = destination.mirror_of(Path::new(&relative));
        log::debug!(
            "FileProcessor: Processing '{relative}' -> {destination_path:?} [{}]",
            destination.lang
        );
        if let Some(parent) = destination_path.parent() {
            if !parent.exists() {
                log::debug!("FileProcessor: Creating target directory {parent:?}");
                fs::create_dir_all(parent).map_err(io_error(parent))?;
            }
        }

        let extension = source_path
            .extension()
            .map(|ext| normalize_extension(&ext.to_string_lossy()))
            .unwrap_or_default();

        if !extension.is_empty() && self.settings.ignore_translation_extensions.contains(&extension) {
            return self.copy_ignored_extension(source_path, &destination_path, &relative);
        }

        if content_sniff::is_binary_file(source_path).map_err(io_error(source_path))? {
            log::info!("FileProcessor: Detected binary file '{relative}', performing direct copy");
            fs::copy(source_path, &destination_path).map_err(io_error(&destination_path))?;
            return Ok(FileOutcome::CopiedBinary);
        }

        if !self.ledger.should_translate(source_path, &destination_path)? {
            log::info!("FileProcessor: '{relative}' is within the translation interval, skipping");
            return Ok(FileOutcome::SkippedFresh);
        }

        self.translate_text_file(source_path, &destination_path, &destination.lang, &extension, control)
    }

    fn copy_ignored_extension(
        &self,
        source_path: &Path,
        destination_path: &Path,
        relative: &str,
    ) -> Result<FileOutcome, ProcessError> {
        if checksum_utils::files_identical(source_path, destination_path)
            .map_err(io_error(destination_path))?
        {
            log::info!("FileProcessor: '{relative}' is identical at the destination, skipping copy");
            return Ok(FileOutcome::SkippedIdentical);
        }
        log::info!("FileProcessor: '{relative}' has an untranslated extension, copying");
        fs::copy(source_path, destination_path).map_err(io_error(destination_path))?;
        Ok(FileOutcome::CopiedIgnoredExtension)
    }

    fn translate_text_file(
        &self,
        source_path: &Path,
        destination_path: &Path,
        target_lang: &str,
        extension: &str,
        control: &RunControl,
    ) -> Result<FileOutcome, ProcessError> {
        self.ledger.mark_attempt_start(source_path, destination_path)?;
        log::debug!("FileProcessor: Translation timestamp reset for {source_path:?}");

        if control.wait_while_paused().is_err() {
            log::info!("FileProcessor: Stopped before translating {source_path:?}");
            return Ok(FileOutcome::Stopped);
        }

        let bytes = fs::read(source_path).map_err(io_error(source_path))?;
        let content = String::from_utf8_lossy(&bytes);
        let started = Instant::now();
        let estimated_tokens = estimate_tokens(&content);

        let outcome = if estimated_tokens > self.settings.max_tokens_per_segment {
            self.translate_segmented(&content, source_path, destination_path, target_lang, extension, control)
        } else {
            self.translate_whole(&content, source_path, destination_path, target_lang, control)
        };
        match outcome {
            Ok(()) => {}
            Err(ProcessError::Translate(TranslateError::Cancelled)) => {
                log::info!("FileProcessor: Translation of {source_path:?} stopped");
                return Ok(FileOutcome::Stopped);
            }
            Err(e) => {
                log::error!("FileProcessor: Translation of {source_path:?} failed: {e}");
                return Err(e);
            }
        }
        log::info!(
            "FileProcessor: Translation time: {:.2} seconds",
            started.elapsed().as_secs_f64()
        );

        if control.is_paused() || control.is_stopped() {
            log::info!(
                "FileProcessor: Run paused or stopped, leaving {destination_path:?} unrecorded"
            );
            return Ok(FileOutcome::LeftUnrecorded);
        }
        self.ledger.mark_attempt_complete(source_path, destination_path)?;
        log::info!("FileProcessor: File processing completed, translation timestamp updated");
        Ok(FileOutcome::Translated)
    }

    fn translate_whole(
        &self,
        content: &str,
        source_path: &Path,
        destination_path: &Path,
        target_lang: &str,
        control: &RunControl,
    ) -> Result<(), ProcessError> {
        let translated = self.translator.translate(
            &TranslationRequest {
                content,
                target_lang,
                source_path,
            },
            control,
        )?;
        fs::write(destination_path, translated).map_err(io_error(destination_path))?;
        log::debug!("FileProcessor: Translation result written to {destination_path:?}");
        Ok(())
    }

    fn translate_segmented(
        &self,
        content: &str,
        source_path: &Path,
        destination_path: &Path,
        target_lang: &str,
        extension: &str,
        control: &RunControl,
    ) -> Result<(), ProcessError> {
        let segments = segment_text(
            content,
            extension,
            self.settings.max_tokens_per_segment,
            &self.settings.markers,
        );
        let total = segments.len();
        log::info!("FileProcessor: File too large, split into {total} segments");

        let mut translated_segments: Vec<String> = Vec::with_capacity(total);
        for (index, segment) in segments.iter().enumerate() {
            if control.is_stopped() {
                return Err(ProcessError::Translate(TranslateError::Cancelled));
            }
            log::info!(
                "FileProcessor: Translating segment {}/{total} (approximately {} tokens)...",
                index + 1,
                segment.estimated_tokens
            );
            let translated = self
                .translator
                .translate(
                    &TranslationRequest {
                        content: &segment.text,
                        target_lang,
                        source_path,
                    },
                    control,
                )
                .inspect_err(|e| {
                    log::error!("FileProcessor: Failed to translate segment {}: {e}", index + 1);
                })?;
            translated_segments.push(translated);

            fs::write(destination_path, combine_segments(&translated_segments))
                .map_err(io_error(destination_path))?;
            log::debug!(
                "FileProcessor: Checkpoint written for segment {}/{total}",
                index + 1
            );
        }
        Ok(())
    }
}
