/*
 * Loads and validates the translator configuration. Settings are stored as a
 * camelCase JSON file, found either at an explicit path, in the workspace, or in
 * the per-user local configuration directory. Validation turns the raw file into
 * `RunSettings`, the immutable inputs of one run, and rejects configuration errors
 * (untagged destinations, missing vendor credentials, bad globs or markers) before
 * any file is touched.
 *
 * A trait (`ConfigManagerOperations`) keeps the storage location swappable for
 * tests; `CoreConfigManager` is the file-system implementation.
 */
use crate::core::ignore_rules::IgnoreRules;
use crate::core::models::{DestinationRoot, is_well_formed_language_tag};
use crate::core::path_utils;
use crate::core::segmentation::MarkerTable;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "project-translator.json";
pub const DEFAULT_INTERVAL_DAYS: u32 = 7;
pub const DEFAULT_MAX_TOKENS_PER_SEGMENT: usize = 4096;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_VENDOR_NAME: &str = "openai";

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Serde(serde_json::Error),
    NotFound(Vec<PathBuf>),
    MissingSourceFolder,
    NoDestinations,
    MissingLanguage(PathBuf),
    InvalidLanguageTag(String),
    InvalidVendor(String),
    InvalidIgnorePattern(String, glob::PatternError),
    InvalidMarker(regex::Error),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serde(err)
    }
}

impl From<regex::Error> for ConfigError {
    fn from(err: regex::Error) -> Self {
        ConfigError::InvalidMarker(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::Serde(e) => write!(f, "Configuration file is not valid: {e}"),
            ConfigError::NotFound(candidates) => {
                write!(f, "No configuration file found. Looked in: {candidates:?}")
            }
            ConfigError::MissingSourceFolder => write!(f, "No source folder configured"),
            ConfigError::NoDestinations => write!(f, "No destination folders configured"),
            ConfigError::MissingLanguage(path) => write!(
                f,
                "Destination folder {path:?} has no language set, please configure it in destFolders"
            ),
            ConfigError::InvalidLanguageTag(tag) => write!(f, "Invalid language tag: '{tag}'"),
            ConfigError::InvalidVendor(name) => write!(
                f,
                "Please provide valid API settings for vendor '{name}' in the vendor configuration"
            ),
            ConfigError::InvalidIgnorePattern(pattern, e) => {
                write!(f, "Invalid ignore pattern '{pattern}': {e}")
            }
            ConfigError::InvalidMarker(e) => write!(f, "Invalid segmentation marker: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Serde(e) => Some(e),
            ConfigError::InvalidIgnorePattern(_, e) => Some(e),
            ConfigError::InvalidMarker(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestFolderConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub lang: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorConfig {
    pub name: String,
    pub api_endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub rpm: Option<i64>,
    #[serde(default)]
    pub max_tokens_per_segment: Option<usize>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl VendorConfig {
    /*
     * The pacing rate for this vendor. A missing, zero or negative `rpm` disables
     * pacing.
     */
    pub fn requests_per_minute(&self) -> Option<u32> {
        self.rpm
            .filter(|rpm| *rpm > 0)
            .map(|rpm| u32::try_from(rpm).unwrap_or(u32::MAX))
    }
}

/*
 * Raw on-disk configuration. Every field has a default so partial files load.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslatorConfig {
    pub source_folder: Option<PathBuf>,
    pub dest_folders: Vec<DestFolderConfig>,
    pub translation_interval_days: u32,
    pub ignore_translation_extensions: Vec<String>,
    pub ignore_paths: Vec<String>,
    pub current_vendor: String,
    pub vendors: Vec<VendorConfig>,
    pub system_prompts: Vec<String>,
    pub user_prompts: Vec<String>,
    pub segmentation_markers: HashMap<String, Vec<String>>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        TranslatorConfig {
            source_folder: None,
            dest_folders: Vec::new(),
            translation_interval_days: DEFAULT_INTERVAL_DAYS,
            ignore_translation_extensions: Vec::new(),
            ignore_paths: Vec::new(),
            current_vendor: DEFAULT_VENDOR_NAME.to_string(),
            vendors: Vec::new(),
            system_prompts: Vec::new(),
            user_prompts: Vec::new(),
            segmentation_markers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptSet {
    pub system: Vec<String>,
    pub user: Vec<String>,
}

/*
 * Validated, immutable inputs of one run.
 */
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub source_root: PathBuf,
    pub destinations: Vec<DestinationRoot>,
    pub interval_days: u32,
    pub vendor: VendorConfig,
    pub prompts: PromptSet,
    pub ignore_rules: IgnoreRules,
    // Lowercase, without the leading dot.
    pub ignore_translation_extensions: HashSet<String>,
    pub markers: MarkerTable,
    pub max_tokens_per_segment: usize,
}

pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

impl TranslatorConfig {
    pub fn current_vendor_config(&self) -> Option<&VendorConfig> {
        self.vendors.iter().find(|v| v.name == self.current_vendor)
    }

    /*
     * Checks the configuration and resolves relative folders against `workspace`.
     */
    pub fn validate(&self, workspace: &Path) -> Result<RunSettings> {
        let source_folder = self
            .source_folder
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::MissingSourceFolder)?;
        let source_root = path_utils::resolve_against(workspace, source_folder);

        if self.dest_folders.is_empty() {
            return Err(ConfigError::NoDestinations);
        }
        let mut destinations = Vec::with_capacity(self.dest_folders.len());
        for folder in &self.dest_folders {
            let lang = folder
                .lang
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .ok_or_else(|| ConfigError::MissingLanguage(folder.path.clone()))?;
            if !is_well_formed_language_tag(lang) {
                return Err(ConfigError::InvalidLanguageTag(lang.to_string()));
            }
            destinations.push(DestinationRoot::new(
                path_utils::resolve_against(workspace, &folder.path),
                lang.to_ascii_lowercase(),
            ));
        }

        let vendor = self
            .current_vendor_config()
            .filter(|v| !v.api_key.trim().is_empty())
            .cloned()
            .ok_or_else(|| ConfigError::InvalidVendor(self.current_vendor.clone()))?;

        let mut ignore_rules = IgnoreRules::default();
        if !self.ignore_paths.is_empty() {
            ignore_rules = IgnoreRules::new(&self.ignore_paths).map_err(|e| {
                let offending = self
                    .ignore_paths
                    .iter()
                    .find(|p| glob::Pattern::new(p.trim()).is_err())
                    .cloned()
                    .unwrap_or_default();
                ConfigError::InvalidIgnorePattern(offending, e)
            })?;
        }

        let markers = MarkerTable::with_overrides(&self.segmentation_markers)?;
        let max_tokens_per_segment = vendor
            .max_tokens_per_segment
            .filter(|max| *max > 0)
            .unwrap_or(DEFAULT_MAX_TOKENS_PER_SEGMENT);

        Ok(RunSettings {
            source_root,
            destinations,
            interval_days: self.translation_interval_days,
            vendor,
            prompts: PromptSet {
                system: self.system_prompts.clone(),
                user: self.user_prompts.clone(),
            },
            ignore_rules,
            ignore_translation_extensions: self
                .ignore_translation_extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .filter(|ext| !ext.is_empty())
                .collect(),
            markers,
            max_tokens_per_segment,
        })
    }
}

pub trait ConfigManagerOperations: Send + Sync {
    fn resolve_config_path(&self, workspace: &Path, explicit: Option<&Path>) -> Result<PathBuf>;
    fn load_config(&self, path: &Path) -> Result<TranslatorConfig>;
}

pub struct CoreConfigManager {
    app_name: String,
}

impl CoreConfigManager {
    pub fn new(app_name: &str) -> Self {
        CoreConfigManager {
            app_name: app_name.to_string(),
        }
    }
}

impl ConfigManagerOperations for CoreConfigManager {
    /*
     * An explicit path wins. Otherwise the workspace file is preferred over the
     * per-user file found through `path_utils::get_base_app_config_local_dir`.
     */
    fn resolve_config_path(&self, workspace: &Path, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            log::trace!("CoreConfigManager: Using explicit configuration path {path:?}");
            return Ok(path.to_path_buf());
        }

        let mut candidates = vec![workspace.join(CONFIG_FILENAME)];
        if let Some(user_dir) = path_utils::get_base_app_config_local_dir(&self.app_name) {
            candidates.push(user_dir.join(CONFIG_FILENAME));
        }

        match candidates.iter().find(|candidate| candidate.is_file()) {
            Some(found) => {
                log::debug!("CoreConfigManager: Found configuration at {found:?}.");
                Ok(found.clone())
            }
            None => Err(ConfigError::NotFound(candidates)),
        }
    }

    fn load_config(&self, path: &Path) -> Result<TranslatorConfig> {
        log::trace!("CoreConfigManager: Loading configuration from {path:?}");
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: TranslatorConfig = serde_json::from_reader(reader)?;
        log::debug!(
            "CoreConfigManager: Loaded configuration with {} destination(s) and {} vendor(s) from {path:?}.",
            config.dest_folders.len(),
            config.vendors.len()
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn vendor(name: &str, api_key: &str) -> VendorConfig {
        VendorConfig {
            name: name.to_string(),
            api_endpoint: "https://api.example.com/v1".to_string(),
            api_key: api_key.to_string(),
            model: "gpt-test".to_string(),
            rpm: Some(20),
            max_tokens_per_segment: None,
            timeout: None,
            temperature: Some(0.2),
        }
    }

    fn valid_config() -> TranslatorConfig {
        TranslatorConfig {
            source_folder: Some(PathBuf::from("docs")),
            dest_folders: vec![DestFolderConfig {
                path: PathBuf::from("i18n/fr"),
                lang: Some("fr-FR".to_string()),
            }],
            ignore_translation_extensions: vec![".PNG".to_string(), "svg".to_string()],
            ignore_paths: vec!["drafts".to_string(), "*.log".to_string()],
            vendors: vec![vendor("openai", "sk-test")],
            ..TranslatorConfig::default()
        }
    }

    #[test]
    fn test_parse_camel_case_json_with_defaults() {
        // Arrange
        let json = r#"{
            "sourceFolder": "docs",
            "destFolders": [{ "path": "i18n/ja", "lang": "ja-jp" }, { "path": "untagged" }],
            "vendors": [{ "name": "openai", "apiEndpoint": "https://api.openai.com/v1", "apiKey": "k", "model": "m", "rpm": 10, "maxTokensPerSegment": 2000 }],
            "segmentationMarkers": { "markdown": ["^## "] }
        }"#;

        // Act
        let config: TranslatorConfig = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(config.translation_interval_days, DEFAULT_INTERVAL_DAYS);
        assert_eq!(config.current_vendor, DEFAULT_VENDOR_NAME);
        assert_eq!(config.dest_folders.len(), 2);
        assert_eq!(config.dest_folders[1].lang, None);
        let vendor = config.current_vendor_config().unwrap();
        assert_eq!(vendor.rpm, Some(10));
        assert_eq!(vendor.max_tokens_per_segment, Some(2000));
        assert_eq!(vendor.timeout, None);
        assert_eq!(config.segmentation_markers["markdown"], vec!["^## ".to_string()]);
    }

    #[test]
    fn test_non_positive_rpm_loads_and_disables_pacing() {
        let json = r#"{
            "vendors": [
                { "name": "negative", "apiEndpoint": "http://a", "rpm": -5 },
                { "name": "zero", "apiEndpoint": "http://b", "rpm": 0 },
                { "name": "huge", "apiEndpoint": "http://c", "rpm": 10000000000 },
                { "name": "normal", "apiEndpoint": "http://d", "rpm": 60 }
            ]
        }"#;

        let config: TranslatorConfig = serde_json::from_str(json).unwrap();

        let rates: Vec<Option<u32>> = config
            .vendors
            .iter()
            .map(VendorConfig::requests_per_minute)
            .collect();
        assert_eq!(config.vendors[0].rpm, Some(-5));
        assert_eq!(rates, vec![None, None, Some(u32::MAX), Some(60)]);
    }

    #[test]
    fn test_validate_resolves_paths_and_normalizes() {
        let settings = valid_config().validate(Path::new("/work")).unwrap();
        assert_eq!(settings.source_root, PathBuf::from("/work/docs"));
        assert_eq!(
            settings.destinations,
            vec![DestinationRoot::new("/work/i18n/fr", "fr-fr")]
        );
        assert_eq!(settings.interval_days, DEFAULT_INTERVAL_DAYS);
        assert_eq!(settings.max_tokens_per_segment, DEFAULT_MAX_TOKENS_PER_SEGMENT);
        assert!(settings.ignore_translation_extensions.contains("png"));
        assert!(settings.ignore_translation_extensions.contains("svg"));
        assert_eq!(settings.ignore_rules.matching_dir_pattern("drafts"), Some("drafts"));
    }

    #[test]
    fn test_validate_rejects_untagged_destination() {
        let mut config = valid_config();
        config.dest_folders.push(DestFolderConfig {
            path: PathBuf::from("i18n/unknown"),
            lang: None,
        });
        assert!(matches!(
            config.validate(Path::new("/work")),
            Err(ConfigError::MissingLanguage(_))
        ));
    }

    #[test]
    fn test_validate_rejects_malformed_language_tag() {
        let mut config = valid_config();
        config.dest_folders[0].lang = Some("fr_fr; drop".to_string());
        assert!(matches!(
            config.validate(Path::new("/work")),
            Err(ConfigError::InvalidLanguageTag(_))
        ));
    }

    #[test]
    fn test_validate_rejects_missing_vendor_or_key() {
        let mut config = valid_config();
        config.current_vendor = "deepseek".to_string();
        assert!(matches!(
            config.validate(Path::new("/work")),
            Err(ConfigError::InvalidVendor(name)) if name == "deepseek"
        ));

        let mut config = valid_config();
        config.vendors = vec![vendor("openai", "  ")];
        assert!(matches!(
            config.validate(Path::new("/work")),
            Err(ConfigError::InvalidVendor(_))
        ));
    }

    #[test]
    fn test_validate_rejects_missing_source_and_destinations() {
        let mut config = valid_config();
        config.source_folder = None;
        assert!(matches!(
            config.validate(Path::new("/work")),
            Err(ConfigError::MissingSourceFolder)
        ));

        let mut config = valid_config();
        config.dest_folders.clear();
        assert!(matches!(
            config.validate(Path::new("/work")),
            Err(ConfigError::NoDestinations)
        ));
    }

    #[test]
    fn test_validate_rejects_bad_glob_and_marker() {
        let mut config = valid_config();
        config.ignore_paths.push("a/***".to_string());
        match config.validate(Path::new("/work")) {
            Err(ConfigError::InvalidIgnorePattern(pattern, _)) => assert_eq!(pattern, "a/***"),
            other => panic!("Expected InvalidIgnorePattern, got {other:?}"),
        }

        let mut config = valid_config();
        config
            .segmentation_markers
            .insert("python".to_string(), vec!["^def(".to_string()]);
        assert!(matches!(
            config.validate(Path::new("/work")),
            Err(ConfigError::InvalidMarker(_))
        ));
    }

    #[test]
    fn test_vendor_segment_budget_overrides_default() {
        let mut config = valid_config();
        config.vendors[0].max_tokens_per_segment = Some(1500);
        let settings = config.validate(Path::new("/work")).unwrap();
        assert_eq!(settings.max_tokens_per_segment, 1500);
    }

    #[test]
    fn test_core_config_manager_prefers_explicit_then_workspace() {
        // Arrange
        let workspace = tempdir().unwrap();
        let manager = CoreConfigManager::new(&format!(
            "TestApp_Config_{}",
            rand::random::<u64>()
        ));
        let workspace_file = workspace.path().join(CONFIG_FILENAME);
        fs::write(
            &workspace_file,
            serde_json::to_string_pretty(&valid_config()).unwrap(),
        )
        .unwrap();

        // Act & Assert
        let explicit = workspace.path().join("custom.json");
        assert_eq!(
            manager
                .resolve_config_path(workspace.path(), Some(&explicit))
                .unwrap(),
            explicit
        );
        let resolved = manager.resolve_config_path(workspace.path(), None).unwrap();
        assert_eq!(resolved, workspace_file);
        let loaded = manager.load_config(&resolved).unwrap();
        assert_eq!(loaded, valid_config());
    }

    #[test]
    fn test_core_config_manager_falls_back_to_user_config_dir() {
        // Arrange
        let unique_app_name = format!("TestApp_ConfigFallback_{}", rand::random::<u64>());
        let manager = CoreConfigManager::new(&unique_app_name);
        let workspace = tempdir().unwrap();
        let user_dir = path_utils::get_base_app_config_local_dir(&unique_app_name)
            .expect("User config dir should be available");
        let user_file = user_dir.join(CONFIG_FILENAME);
        fs::write(&user_file, "{}").unwrap();

        // Act
        let resolved = manager.resolve_config_path(workspace.path(), None);

        // Assert
        assert_eq!(resolved.unwrap(), user_file);

        // Cleanup
        if let Err(e) = fs::remove_dir_all(&user_dir) {
            eprintln!("Test cleanup failed for {user_dir:?}: {e}");
        }
    }

    #[test]
    fn test_core_config_manager_reports_missing_file() {
        let workspace = tempdir().unwrap();
        let manager = CoreConfigManager::new(&format!("TestApp_Missing_{}", rand::random::<u64>()));
        match manager.resolve_config_path(workspace.path(), None) {
            Err(ConfigError::NotFound(candidates)) => {
                assert_eq!(candidates[0], workspace.path().join(CONFIG_FILENAME));
                if let Some(user_dir) = candidates.get(1).and_then(|c| c.parent()) {
                    let _ = fs::remove_dir_all(user_dir);
                }
            }
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_load_config_rejects_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "{ not json").unwrap();
        let manager = CoreConfigManager::new("unused");
        assert!(matches!(manager.load_config(&path), Err(ConfigError::Serde(_))));
    }
}
