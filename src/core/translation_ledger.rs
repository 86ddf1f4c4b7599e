/*
 * Persistent record of when each (source file, destination language) pair was last
 * judged to be in sync. The store is a SQLite database with one table per
 * language, keyed by the source path relative to the source root.
 *
 * A translation attempt resets its row to epoch zero before any output is written
 * and stamps the current time only once the output is complete. A run that dies in
 * between leaves the row at zero, so the next run retranslates the file instead of
 * trusting a half-written destination.
 */
use crate::core::models::{DestinationRoot, is_well_formed_language_tag};
use crate::core::path_utils;
use rusqlite::{Connection, OptionalExtension, params};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use time::OffsetDateTime;

pub const LEDGER_FILENAME: &str = ".prj.trans.sqlite";
pub const MILLIS_PER_DAY: i64 = 86_400_000;

#[derive(Debug)]
pub enum LedgerError {
    Sqlite(rusqlite::Error),
    Io(io::Error),
    SourceOutsideRoot(PathBuf),
    UnmatchedDestination(PathBuf),
    InvalidLanguageTag(String),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::Sqlite(err)
    }
}

impl From<io::Error> for LedgerError {
    fn from(err: io::Error) -> Self {
        LedgerError::Io(err)
    }
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::Sqlite(e) => write!(f, "Translation ledger database error: {e}"),
            LedgerError::Io(e) => write!(f, "Translation ledger I/O error: {e}"),
            LedgerError::SourceOutsideRoot(path) => {
                write!(f, "Source file {path:?} is not inside the source root")
            }
            LedgerError::UnmatchedDestination(path) => write!(
                f,
                "Destination {path:?} matches no configured destination folder"
            ),
            LedgerError::InvalidLanguageTag(tag) => {
                write!(f, "Destination language tag '{tag}' cannot name a ledger table")
            }
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LedgerError::Sqlite(e) => Some(e),
            LedgerError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl LedgerError {
    /*
     * Path-resolution failures mean the run itself is misconfigured.
     */
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            LedgerError::SourceOutsideRoot(_)
                | LedgerError::UnmatchedDestination(_)
                | LedgerError::InvalidLanguageTag(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/*
 * Source of "now" in epoch milliseconds. Injected so staleness can be tested
 * without waiting days.
 */
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
    }
}

pub trait TranslationLedgerOperations: Send + Sync {
    /*
     * True when the destination is missing, when no record exists for the pair, or
     * when the record is older than the staleness interval. Read failures count as
     * "due"; path resolution failures are errors.
     */
    fn should_translate(&self, source_path: &Path, destination_path: &Path) -> Result<bool>;
    fn mark_attempt_start(&self, source_path: &Path, destination_path: &Path) -> Result<()>;
    fn mark_attempt_complete(&self, source_path: &Path, destination_path: &Path) -> Result<()>;
}

pub fn table_name_for_language(lang: &str) -> String {
    format!("translations_{}", lang.replace('-', "_"))
}

pub struct CoreTranslationLedger {
    connection: Mutex<Connection>,
    source_root: PathBuf,
    destinations: Vec<DestinationRoot>,
    interval_days: u32,
    clock: Arc<dyn Clock>,
}

impl CoreTranslationLedger {
    /*
     * Opens (or creates) the ledger database at `db_path` and makes sure a table
     * exists for every destination language.
     */
    pub fn open(
        db_path: &Path,
        source_root: &Path,
        destinations: &[DestinationRoot],
        interval_days: u32,
    ) -> Result<Self> {
        log::debug!("TranslationLedger: Opening ledger database {db_path:?}");
        let connection = Connection::open(db_path)?;
        Self::from_connection(connection, source_root, destinations, interval_days)
    }

    #[cfg(test)]
    pub fn open_in_memory(
        source_root: &Path,
        destinations: &[DestinationRoot],
        interval_days: u32,
    ) -> Result<Self> {
        let connection = Connection::open_in_memory()?;
        Self::from_connection(connection, source_root, destinations, interval_days)
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn from_connection(
        connection: Connection,
        source_root: &Path,
        destinations: &[DestinationRoot],
        interval_days: u32,
    ) -> Result<Self> {
        for destination in destinations {
            if !is_well_formed_language_tag(&destination.lang) {
                return Err(LedgerError::InvalidLanguageTag(destination.lang.clone()));
            }
            let table = table_name_for_language(&destination.lang);
            connection.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    source_path TEXT PRIMARY KEY,
                    last_translation_time INTEGER
                );"
            ))?;
            log::trace!(
                "TranslationLedger: Created/verified table {table} for language '{}'",
                destination.lang
            );
        }

        Ok(CoreTranslationLedger {
            connection: Mutex::new(connection),
            source_root: path_utils::normalize_lexically(source_root),
            destinations: destinations
                .iter()
                .map(|d| DestinationRoot::new(path_utils::normalize_lexically(&d.path), d.lang.clone()))
                .collect(),
            interval_days,
            clock: Arc::new(SystemClock),
        })
    }

    fn lock_connection(&self) -> MutexGuard<'_, Connection> {
        self.connection.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn relative_source_path(&self, source_path: &Path) -> Result<String> {
        path_utils::relative_slash_path(&self.source_root, source_path)
            .filter(|relative| !relative.is_empty())
            .ok_or_else(|| LedgerError::SourceOutsideRoot(source_path.to_path_buf()))
    }

    /*
     * The language of the longest configured destination root containing
     * `destination_path`. Containment is component-wise.
     */
    fn language_for_destination(&self, destination_path: &Path) -> Result<&str> {
        let normalized = path_utils::normalize_lexically(destination_path);
        self.destinations
            .iter()
            .filter(|root| normalized.starts_with(&root.path))
            .max_by_key(|root| root.path.components().count())
            .map(|root| root.lang.as_str())
            .ok_or_else(|| {
                log::error!(
                    "TranslationLedger: No destination root for {destination_path:?}. Available roots: {:?}",
                    self.destinations.iter().map(|d| &d.path).collect::<Vec<_>>()
                );
                LedgerError::UnmatchedDestination(destination_path.to_path_buf())
            })
    }

    fn resolve_key(&self, source_path: &Path, destination_path: &Path) -> Result<(String, String)> {
        let relative = self.relative_source_path(source_path)?;
        let table = table_name_for_language(self.language_for_destination(destination_path)?);
        Ok((table, relative))
    }

    fn query_time(&self, table: &str, relative: &str) -> rusqlite::Result<Option<i64>> {
        let connection = self.lock_connection();
        connection
            .query_row(
                &format!("SELECT last_translation_time FROM {table} WHERE source_path = ?1"),
                params![relative],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()
            .map(Option::flatten)
    }

    /*
     * The stored timestamp for the pair, if any. Epoch zero marks an attempt that
     * never completed.
     */
    #[cfg(test)]
    pub fn last_translation_time(
        &self,
        source_path: &Path,
        destination_path: &Path,
    ) -> Result<Option<i64>> {
        let (table, relative) = self.resolve_key(source_path, destination_path)?;
        Ok(self.query_time(&table, &relative)?)
    }

    fn upsert_time(&self, source_path: &Path, destination_path: &Path, timestamp: i64) -> Result<()> {
        let (table, relative) = self.resolve_key(source_path, destination_path)?;
        let connection = self.lock_connection();
        connection.execute(
            &format!(
                "INSERT OR REPLACE INTO {table} (source_path, last_translation_time) VALUES (?1, ?2)"
            ),
            params![relative, timestamp],
        )?;
        log::trace!("TranslationLedger: {table}[{relative}] = {timestamp}");
        Ok(())
    }
}

impl TranslationLedgerOperations for CoreTranslationLedger {
    fn should_translate(&self, source_path: &Path, destination_path: &Path) -> Result<bool> {
        if !destination_path.exists() {
            log::debug!(
                "TranslationLedger: Destination {destination_path:?} does not exist, translation due."
            );
            return Ok(true);
        }

        let (table, relative) = self.resolve_key(source_path, destination_path)?;
        let last = match self.query_time(&table, &relative) {
            Ok(Some(last)) => last,
            Ok(None) => {
                log::debug!("TranslationLedger: No record for '{relative}' in {table}, translation due.");
                return Ok(true);
            }
            Err(e) => {
                log::warn!(
                    "TranslationLedger: Failed to read record for '{relative}' in {table}, treating as due: {e}"
                );
                return Ok(true);
            }
        };

        let interval_millis = i64::from(self.interval_days) * MILLIS_PER_DAY;
        let age = self.clock.now_millis().saturating_sub(last);
        let due = age > interval_millis;
        log::debug!(
            "TranslationLedger: '{relative}' in {table} last translated {:.1} day(s) ago, due: {due}",
            age as f64 / MILLIS_PER_DAY as f64
        );
        Ok(due)
    }

    fn mark_attempt_start(&self, source_path: &Path, destination_path: &Path) -> Result<()> {
        self.upsert_time(source_path, destination_path, 0)
    }

    fn mark_attempt_complete(&self, source_path: &Path, destination_path: &Path) -> Result<()> {
        let now = self.clock.now_millis();
        self.upsert_time(source_path, destination_path, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicI64, Ordering};
    use tempfile::{TempDir, tempdir};

    const START: i64 = 1_700_000_000_000;

    struct ManualClock(AtomicI64);

    impl ManualClock {
        fn advance(&self, millis: i64) {
            self.0.fetch_add(millis, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    struct Fixture {
        dir: TempDir,
        clock: Arc<ManualClock>,
        ledger: CoreTranslationLedger,
    }

    impl Fixture {
        fn new(interval_days: u32) -> Self {
            let dir = tempdir().unwrap();
            fs::create_dir_all(dir.path().join("src/guide")).unwrap();
            fs::create_dir_all(dir.path().join("out/fr/guide")).unwrap();
            fs::write(dir.path().join("src/guide/a.md"), "# Hello").unwrap();
            let destinations = vec![DestinationRoot::new(dir.path().join("out/fr"), "fr-fr")];
            let clock = Arc::new(ManualClock(AtomicI64::new(START)));
            let ledger =
                CoreTranslationLedger::open_in_memory(&dir.path().join("src"), &destinations, interval_days)
                    .unwrap()
                    .with_clock(clock.clone());
            Fixture { dir, clock, ledger }
        }

        fn source(&self) -> PathBuf {
            self.dir.path().join("src/guide/a.md")
        }

        fn destination(&self) -> PathBuf {
            self.dir.path().join("out/fr/guide/a.md")
        }

        fn write_destination(&self) {
            fs::write(self.destination(), "# Bonjour").unwrap();
        }
    }

    #[test]
    fn test_missing_destination_is_always_due() {
        let fixture = Fixture::new(7);
        fixture
            .ledger
            .mark_attempt_complete(&fixture.source(), &fixture.destination())
            .unwrap();
        assert!(
            fixture
                .ledger
                .should_translate(&fixture.source(), &fixture.destination())
                .unwrap()
        );
    }

    #[test]
    fn test_existing_destination_without_record_is_due() {
        let fixture = Fixture::new(7);
        fixture.write_destination();
        assert!(
            fixture
                .ledger
                .should_translate(&fixture.source(), &fixture.destination())
                .unwrap()
        );
    }

    #[test]
    fn test_completed_pair_is_fresh_until_interval_elapses() {
        // Arrange
        let fixture = Fixture::new(7);
        fixture.write_destination();
        fixture
            .ledger
            .mark_attempt_complete(&fixture.source(), &fixture.destination())
            .unwrap();

        // Act & Assert
        assert!(!fixture.ledger.should_translate(&fixture.source(), &fixture.destination()).unwrap());
        fixture.clock.advance(7 * MILLIS_PER_DAY);
        assert!(!fixture.ledger.should_translate(&fixture.source(), &fixture.destination()).unwrap());
        fixture.clock.advance(1);
        assert!(fixture.ledger.should_translate(&fixture.source(), &fixture.destination()).unwrap());
    }

    #[test]
    fn test_start_without_complete_forces_retranslation() {
        // Arrange
        let fixture = Fixture::new(365);
        fixture.write_destination();
        fixture
            .ledger
            .mark_attempt_complete(&fixture.source(), &fixture.destination())
            .unwrap();

        // Act: a new attempt starts and never completes.
        fixture
            .ledger
            .mark_attempt_start(&fixture.source(), &fixture.destination())
            .unwrap();

        // Assert
        assert_eq!(
            fixture
                .ledger
                .last_translation_time(&fixture.source(), &fixture.destination())
                .unwrap(),
            Some(0)
        );
        assert!(fixture.ledger.should_translate(&fixture.source(), &fixture.destination()).unwrap());
    }

    #[test]
    fn test_records_are_keyed_by_slash_relative_source_path() {
        let fixture = Fixture::new(7);
        fixture
            .ledger
            .mark_attempt_complete(&fixture.source(), &fixture.destination())
            .unwrap();
        let connection = fixture.ledger.lock_connection();
        let stored: (String, i64) = connection
            .query_row(
                "SELECT source_path, last_translation_time FROM translations_fr_fr",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(stored, ("guide/a.md".to_string(), START));
    }

    #[test]
    fn test_longest_destination_root_wins() {
        // Arrange
        let dir = tempdir().unwrap();
        let source_root = dir.path().join("src");
        fs::create_dir_all(&source_root).unwrap();
        fs::create_dir_all(dir.path().join("out/ja")).unwrap();
        let destinations = vec![
            DestinationRoot::new(dir.path().join("out"), "en-us"),
            DestinationRoot::new(dir.path().join("out/ja"), "ja-jp"),
        ];
        let ledger = CoreTranslationLedger::open_in_memory(&source_root, &destinations, 7).unwrap();
        let source = source_root.join("a.md");
        let nested_destination = dir.path().join("out/ja/a.md");

        // Act
        ledger.mark_attempt_complete(&source, &nested_destination).unwrap();

        // Assert
        let connection = ledger.lock_connection();
        let ja_rows: i64 = connection
            .query_row("SELECT COUNT(*) FROM translations_ja_jp", [], |row| row.get(0))
            .unwrap();
        let en_rows: i64 = connection
            .query_row("SELECT COUNT(*) FROM translations_en_us", [], |row| row.get(0))
            .unwrap();
        assert_eq!((ja_rows, en_rows), (1, 0));
    }

    #[test]
    fn test_unmatched_destination_is_a_configuration_error() {
        let fixture = Fixture::new(7);
        let stray = fixture.dir.path().join("elsewhere.md");
        fs::write(&stray, "x").unwrap();

        let err = fixture.ledger.should_translate(&fixture.source(), &stray).unwrap_err();
        assert!(matches!(err, LedgerError::UnmatchedDestination(_)));
        assert!(err.is_configuration_error());

        let err = fixture.ledger.mark_attempt_start(&fixture.source(), &stray).unwrap_err();
        assert!(matches!(err, LedgerError::UnmatchedDestination(_)));
    }

    #[test]
    fn test_source_outside_root_is_a_configuration_error() {
        let fixture = Fixture::new(7);
        let outside = fixture.dir.path().join("other/a.md");
        let err = fixture
            .ledger
            .mark_attempt_start(&outside, &fixture.destination())
            .unwrap_err();
        assert!(matches!(err, LedgerError::SourceOutsideRoot(_)));
    }

    #[test]
    fn test_read_failure_fails_open() {
        let fixture = Fixture::new(7);
        fixture.write_destination();
        fixture
            .ledger
            .mark_attempt_complete(&fixture.source(), &fixture.destination())
            .unwrap();
        fixture
            .ledger
            .lock_connection()
            .execute_batch("DROP TABLE translations_fr_fr;")
            .unwrap();

        assert!(fixture.ledger.should_translate(&fixture.source(), &fixture.destination()).unwrap());
        // Writes do not fail open.
        assert!(matches!(
            fixture.ledger.mark_attempt_start(&fixture.source(), &fixture.destination()),
            Err(LedgerError::Sqlite(_))
        ));
    }

    #[test]
    fn test_invalid_language_tag_is_rejected_on_open() {
        let destinations = vec![DestinationRoot::new("/out", "fr; DROP TABLE x")];
        assert!(matches!(
            CoreTranslationLedger::open_in_memory(Path::new("/src"), &destinations, 7),
            Err(LedgerError::InvalidLanguageTag(_))
        ));
    }

    #[test]
    fn test_records_persist_across_reopen() {
        // Arrange
        let dir = tempdir().unwrap();
        let db_path = dir.path().join(LEDGER_FILENAME);
        let source_root = dir.path().join("src");
        let destinations = vec![DestinationRoot::new(dir.path().join("out"), "de-de")];
        fs::create_dir_all(dir.path().join("out")).unwrap();
        let destination = dir.path().join("out/a.md");
        fs::write(&destination, "Hallo").unwrap();

        // Act
        {
            let ledger = CoreTranslationLedger::open(&db_path, &source_root, &destinations, 7).unwrap();
            ledger
                .mark_attempt_complete(&source_root.join("a.md"), &destination)
                .unwrap();
        }
        let reopened = CoreTranslationLedger::open(&db_path, &source_root, &destinations, 7).unwrap();

        // Assert
        assert!(db_path.is_file());
        assert!(!reopened.should_translate(&source_root.join("a.md"), &destination).unwrap());
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}
