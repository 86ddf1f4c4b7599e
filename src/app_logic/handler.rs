use crate::core::{
    ConfigError, ConfigManagerOperations, CoreTranslationLedger, CoreTranslator, FileProcessor,
    LEDGER_FILENAME, LedgerError, PipelineSettings, ProcessingStats, RatePacer, RunControl,
    RunSettings, TokenUsage, TranslateError, TranslationLedgerOperations, TranslatorOperations,
    TreeWalker, WalkError, WalkOutcome,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

// Made pub(crate) for access from handler_tests.rs
pub(crate) const APP_NAME: &str = "ProjectTranslator";

/*
 * Everything that can end a run before or during the walk. Per-file failures are
 * not here; they are counted in `ProcessingStats`.
 */
#[derive(Debug)]
pub enum RunError {
    Config(ConfigError),
    Ledger(LedgerError),
    Translator(TranslateError),
    Walk(WalkError),
}

impl From<ConfigError> for RunError {
    fn from(err: ConfigError) -> Self {
        RunError::Config(err)
    }
}

impl From<LedgerError> for RunError {
    fn from(err: LedgerError) -> Self {
        RunError::Ledger(err)
    }
}

impl From<TranslateError> for RunError {
    fn from(err: TranslateError) -> Self {
        RunError::Translator(err)
    }
}

impl From<WalkError> for RunError {
    fn from(err: WalkError) -> Self {
        RunError::Walk(err)
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Config(e) => write!(f, "{e}"),
            RunError::Ledger(e) => write!(f, "{e}"),
            RunError::Translator(e) => write!(f, "{e}"),
            RunError::Walk(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Config(e) => Some(e),
            RunError::Ledger(e) => Some(e),
            RunError::Translator(e) => Some(e),
            RunError::Walk(e) => Some(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Stopped,
    Failed(String),
}

/*
 * What a run reports upward: how it ended, the per-file counters, the vendor's
 * token usage and the wall-clock time.
 */
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub stats: ProcessingStats,
    pub token_usage: TokenUsage,
    pub elapsed: Duration,
}

impl RunReport {
    fn failed(error: &RunError, stats: ProcessingStats, token_usage: TokenUsage, elapsed: Duration) -> Self {
        RunReport {
            status: RunStatus::Failed(error.to_string()),
            stats,
            token_usage,
            elapsed,
        }
    }

    /*
     * 0 for completed and stopped runs, 1 when the run failed or any file failed.
     */
    pub fn exit_code(&self) -> i32 {
        match &self.status {
            RunStatus::Completed if self.stats.failed_files == 0 => 0,
            RunStatus::Stopped => 0,
            _ => 1,
        }
    }

    pub fn log_summary(&self) {
        log::info!("==========================================");
        log::info!("Translation Task Summary");
        log::info!("==========================================");
        match &self.status {
            RunStatus::Completed => log::info!("Project translation completed."),
            RunStatus::Stopped => log::info!("Project translation stopped."),
            RunStatus::Failed(reason) => log::error!("Translation failed: {reason}"),
        }
        log::info!("Translated files: {}", self.stats.processed_files);
        log::info!("Skipped files: {}", self.stats.skipped_files);
        log::info!("Failed files: {}", self.stats.failed_files);
        if !self.stats.failed_paths.is_empty() {
            log::info!("Failed files list:");
            for (index, path) in self.stats.failed_paths.iter().enumerate() {
                log::info!("  {}. {}", index + 1, path.display());
            }
        }
        log::info!("Total time: {:.2} seconds", self.elapsed.as_secs_f64());
        log::info!("Total tokens consumed:");
        log::info!("  - Input: {} tokens", self.token_usage.input_tokens);
        log::info!("  - Output: {} tokens", self.token_usage.output_tokens);
        log::info!("  - Total: {} tokens", self.token_usage.total());
        if let Some(rate) = self.token_usage.tokens_per_minute(self.elapsed) {
            log::info!("  - Processing speed: {rate:.0} tokens/minute");
        }
    }
}

/*
 * Orchestrates one translation run for a workspace: loads and validates the
 * configuration, opens the ledger and the translator client, walks the source
 * tree under the run's `RunControl`, and produces a `RunReport`.
 */
pub struct ProjectTranslator {
    pub(crate) config_manager: Arc<dyn ConfigManagerOperations>,
    pub(crate) workspace: PathBuf,
    pub(crate) explicit_config: Option<PathBuf>,
}

impl ProjectTranslator {
    pub fn new(
        config_manager: Arc<dyn ConfigManagerOperations>,
        workspace: PathBuf,
        explicit_config: Option<PathBuf>,
    ) -> Self {
        ProjectTranslator {
            config_manager,
            workspace,
            explicit_config,
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.workspace.join(LEDGER_FILENAME)
    }

    /*
     * Resolves, loads and validates the configuration. Every configuration error
     * surfaces here, before any file is touched.
     */
    pub fn prepare(&self) -> Result<RunSettings, RunError> {
        let config_path = self
            .config_manager
            .resolve_config_path(&self.workspace, self.explicit_config.as_deref())?;
        log::info!("ProjectTranslator: Using configuration {config_path:?}");
        let config = self.config_manager.load_config(&config_path)?;
        let settings = config.validate(&self.workspace)?;
        log::info!(
            "ProjectTranslator: Source folder {:?}, {} destination(s), interval {} day(s).",
            settings.source_root,
            settings.destinations.len(),
            settings.interval_days
        );
        for destination in &settings.destinations {
            log::info!(
                "ProjectTranslator: Destination {:?} [{}]",
                destination.path,
                destination.lang
            );
        }
        Ok(settings)
    }

    /*
     * Runs the whole translation with the production ledger and translator.
     */
    pub fn run(&self, control: &RunControl) -> RunReport {
        log::info!("==========================================");
        log::info!("Starting new translation task");
        log::info!("==========================================");
        let started = Instant::now();

        let settings = match self.prepare() {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("ProjectTranslator: {e}");
                return RunReport::failed(&e, ProcessingStats::default(), TokenUsage::default(), started.elapsed());
            }
        };

        let collaborators = self.open_ledger(&settings).and_then(|ledger| {
            let translator = CoreTranslator::new(
                settings.vendor.clone(),
                settings.prompts.clone(),
                Arc::new(RatePacer::new()),
            )?;
            Ok((ledger, translator))
        });
        match collaborators {
            Ok((ledger, translator)) => {
                let mut report = run_with(&settings, Arc::new(ledger), Arc::new(translator), control);
                report.elapsed = started.elapsed();
                report
            }
            Err(e) => {
                log::error!("ProjectTranslator: {e}");
                RunReport::failed(&e, ProcessingStats::default(), TokenUsage::default(), started.elapsed())
            }
        }
    }

    fn open_ledger(&self, settings: &RunSettings) -> Result<CoreTranslationLedger, RunError> {
        let ledger_path = self.ledger_path();
        log::debug!("ProjectTranslator: Opening translation ledger {ledger_path:?}");
        Ok(CoreTranslationLedger::open(
            &ledger_path,
            &settings.source_root,
            &settings.destinations,
            settings.interval_days,
        )?)
    }
}

/*
 * Walks the tree with the given collaborators. Token counters and statistics are
 * reset at the start so the report covers this run only.
 */
pub fn run_with(
    settings: &RunSettings,
    ledger: Arc<dyn TranslationLedgerOperations>,
    translator: Arc<dyn TranslatorOperations>,
    control: &RunControl,
) -> RunReport {
    let started = Instant::now();
    translator.reset_token_usage();
    let mut stats = ProcessingStats::default();

    let processor = FileProcessor::new(
        PipelineSettings::from_run_settings(settings),
        ledger,
        Arc::clone(&translator),
    );
    let walker = TreeWalker::new(&processor, &settings.destinations);
    let walk_result = walker.walk(control, &mut stats);

    let token_usage = translator.token_usage();
    let elapsed = started.elapsed();
    match walk_result {
        Ok(WalkOutcome::Completed) => RunReport {
            status: RunStatus::Completed,
            stats,
            token_usage,
            elapsed,
        },
        Ok(WalkOutcome::Stopped) => RunReport {
            status: RunStatus::Stopped,
            stats,
            token_usage,
            elapsed,
        },
        Err(e) => {
            let error = RunError::from(e);
            log::error!("ProjectTranslator: {error}");
            RunReport::failed(&error, stats, token_usage, elapsed)
        }
    }
}

pub fn default_workspace() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| Path::new(".").to_path_buf())
}
