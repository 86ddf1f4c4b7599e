/*
 * This module consolidates the core, platform-agnostic logic of the translator:
 * configuration, the translation ledger, text segmentation, run control and rate
 * pacing, the translator client, the per-file pipeline and the tree walker. It
 * re-exports the abstractions (`ConfigManagerOperations`,
 * `TranslationLedgerOperations`, `TranslatorOperations`) and their core
 * implementations used by the application logic.
 */
pub mod checksum_utils;
pub mod config;
pub mod content_sniff;
pub mod file_processor;
pub mod ignore_rules;
pub mod models;
pub mod path_utils;
pub mod rate_pacer;
pub mod run_control;
pub mod segmentation;
pub mod token_usage;
pub mod tokenizer_utils;
pub mod translation_ledger;
pub mod translator;
pub mod tree_walker;


// Re-export key structures and enums
pub use models::ProcessingStats;

// Re-export config related items
pub use config::{ConfigError, ConfigManagerOperations, CoreConfigManager, RunSettings};

pub use translation_ledger::{
    CoreTranslationLedger, LEDGER_FILENAME, LedgerError, TranslationLedgerOperations,
};

pub use translator::{CoreTranslator, TranslateError, TranslatorOperations};

pub use file_processor::{FileProcessor, PipelineSettings};
pub use tree_walker::{TreeWalker, WalkError, WalkOutcome};

pub use rate_pacer::RatePacer;
pub use run_control::RunControl;
pub use token_usage::TokenUsage;
