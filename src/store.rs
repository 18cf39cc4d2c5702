//! Persistent SQLite statement store: the training sink and the responder.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::harvest::TrainingSequence;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to access '{}': {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("invalid corpus '{}': {source}", path.display())]
    Corpus { path: PathBuf, source: serde_json::Error },
}

/// Anything that learns from training sequences.
pub trait TrainingSink {
    fn train(&mut self, sequence: &TrainingSequence) -> Result<(), StoreError>;
}

/// Conversations as exported and imported on disk.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Corpus {
    pub conversations: Vec<Vec<String>>,
}

impl Corpus {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Io { path: path.to_path_buf(), source: e })?;
        serde_json::from_str(&json)
            .map_err(|e| StoreError::Corpus { path: path.to_path_buf(), source: e })
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::Corpus { path: path.to_path_buf(), source: e })?;
        std::fs::write(path, json).map_err(|e| StoreError::Io { path: path.to_path_buf(), source: e })
    }
}

/// A reply chosen for some input.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub text: String,
    /// Word overlap between the input and the prompt this reply answered.
    pub confidence: f64,
}

/// Statements and the statements they answered.
pub struct StatementStore {
    conn: Connection,
    conversation: String,
}

impl StatementStore {
    /// Create a new in-memory store.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open (or create) a store at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io { path: parent.to_path_buf(), source: e })?;
        }
        let store = Self::init(Connection::open(path)?)?;
        info!("Loaded statement store from {:?} ({} statements)", path, store.statement_count()?);
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS statements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL,
                in_response_to TEXT,
                conversation TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_statements_in_response_to ON statements(in_response_to);
            CREATE INDEX IF NOT EXISTS idx_statements_conversation ON statements(conversation);
        "#)?;

        Ok(Self { conn, conversation: "training".to_string() })
    }

    /// Tag subsequent training with a conversation name (e.g. "reddit", "manual").
    pub fn set_conversation(&mut self, conversation: impl Into<String>) {
        self.conversation = conversation.into();
    }

    pub fn statement_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM statements", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Store each statement as a response to the one before it.
    fn learn(&mut self, statements: &[String]) -> Result<(), StoreError> {
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO statements (text, in_response_to, conversation, created_at) VALUES (?1, ?2, ?3, ?4)",
            )?;
            let mut previous: Option<&str> = None;
            for text in statements {
                stmt.execute(params![text, previous, self.conversation, now])?;
                previous = Some(text.as_str());
            }
        }
        tx.commit()?;
        debug!("Learned {} statements ({})", statements.len(), self.conversation);
        Ok(())
    }

    /// Best stored reply for `input`, or `None` when nothing clears `threshold`.
    pub fn best_response(&self, input: &str, threshold: f64) -> Result<Option<Response>, StoreError> {
        let input_words = words(input);
        if input_words.is_empty() {
            return Ok(None);
        }

        let mut stmt = self.conn.prepare(
            "SELECT text, in_response_to FROM statements WHERE in_response_to IS NOT NULL ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut best: Option<Response> = None;
        for row in rows {
            let (text, prompt) = row?;
            let confidence = jaccard(&input_words, &words(&prompt));
            // Strictly greater keeps the oldest statement on ties.
            if best.as_ref().is_none_or(|b| confidence > b.confidence) {
                best = Some(Response { text, confidence });
            }
        }

        Ok(best.filter(|b| b.confidence > 0.0 && b.confidence >= threshold))
    }

    /// All learned prompt/reply pairs, oldest first.
    pub fn export(&self) -> Result<Corpus, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT in_response_to, text FROM statements WHERE in_response_to IS NOT NULL ORDER BY id",
        )?;
        let conversations = stmt
            .query_map([], |row| Ok(vec![row.get::<_, String>(0)?, row.get::<_, String>(1)?]))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Corpus { conversations })
    }

    /// Train every conversation of a corpus. Returns how many were learned.
    pub fn import(&mut self, corpus: &Corpus) -> Result<usize, StoreError> {
        let mut count = 0;
        for conversation in &corpus.conversations {
            if let Some(seq) = TrainingSequence::from_statements(conversation.clone()) {
                self.train(&seq)?;
                count += 1;
            }
        }
        Ok(count)
    }
}

impl TrainingSink for StatementStore {
    fn train(&mut self, sequence: &TrainingSequence) -> Result<(), StoreError> {
        self.learn(sequence.statements())
    }
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seq(items: &[&str]) -> TrainingSequence {
        TrainingSequence::from_statements(items.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_train_stores_every_statement() {
        let mut store = StatementStore::in_memory().unwrap();
        store.train(&seq(&["hi", "hello there", "how are you"])).unwrap();
        assert_eq!(store.statement_count().unwrap(), 3);
    }

    #[test]
    fn test_export_pairs_in_order() {
        let mut store = StatementStore::in_memory().unwrap();
        store.train(&seq(&["hi", "hello there", "how are you"])).unwrap();

        let corpus = store.export().unwrap();
        assert_eq!(
            corpus.conversations,
            vec![
                vec!["hi".to_string(), "hello there".to_string()],
                vec!["hello there".to_string(), "how are you".to_string()],
            ]
        );
    }

    #[test]
    fn test_best_response_picks_closest_prompt() {
        let mut store = StatementStore::in_memory().unwrap();
        store.train(&seq(&["what is rust", "a systems language"])).unwrap();
        store.train(&seq(&["what is for dinner", "pasta"])).unwrap();

        let r = store.best_response("What is Rust?", 0.2).unwrap().unwrap();
        assert_eq!(r.text, "a systems language");
        assert!((r.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_best_response_ties_keep_oldest() {
        let mut store = StatementStore::in_memory().unwrap();
        store.train(&seq(&["hello", "first"])).unwrap();
        store.train(&seq(&["hello", "second"])).unwrap();

        let r = store.best_response("hello", 0.0).unwrap().unwrap();
        assert_eq!(r.text, "first");
    }

    #[test]
    fn test_best_response_below_threshold() {
        let mut store = StatementStore::in_memory().unwrap();
        store.train(&seq(&["the quick brown fox jumps", "ok"])).unwrap();

        assert!(store.best_response("fox", 0.5).unwrap().is_none());
        assert!(store.best_response("fox", 0.1).unwrap().is_some());
        assert!(store.best_response("zebra", 0.0).unwrap().is_none());
    }

    #[test]
    fn test_best_response_empty_store() {
        let store = StatementStore::in_memory().unwrap();
        assert!(store.best_response("anything", 0.0).unwrap().is_none());
    }

    #[test]
    fn test_corpus_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("nested").join("edward.db");
        let corpus_path = dir.path().join("corpus.json");

        let mut store = StatementStore::open(&db_path).unwrap();
        store.train(&seq(&["ping", "pong"])).unwrap();
        store.export().unwrap().save(&corpus_path).unwrap();

        let mut fresh = StatementStore::in_memory().unwrap();
        let imported = fresh.import(&Corpus::load(&corpus_path).unwrap()).unwrap();
        assert_eq!(imported, 1);
        assert_eq!(fresh.export().unwrap(), store.export().unwrap());
    }

    #[test]
    fn test_reopen_keeps_statements() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("edward.db");
        {
            let mut store = StatementStore::open(&db_path).unwrap();
            store.train(&seq(&["a", "b"])).unwrap();
        }
        let store = StatementStore::open(&db_path).unwrap();
        assert_eq!(store.statement_count().unwrap(), 2);
    }

    #[test]
    fn test_invalid_corpus() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(Corpus::load(&path), Err(StoreError::Corpus { .. })));
    }

    #[test]
    fn test_import_skips_empty_conversations() {
        let mut store = StatementStore::in_memory().unwrap();
        let corpus = Corpus { conversations: vec![vec![], vec!["solo".into()]] };
        assert_eq!(store.import(&corpus).unwrap(), 1);
        assert_eq!(store.statement_count().unwrap(), 1);
    }
}
