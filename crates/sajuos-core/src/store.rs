use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::card::{canonicalize, RuleCard};
use crate::error::{Error, Result};

/// In-memory index over one snapshot of the rule-card JSONL export.
///
/// Built once by [`RuleCardStore::load`] and read-only afterwards, so a loaded
/// store can be shared across request handlers behind an `Arc` without locking.
/// Each card is allocated once; the topic index holds `Arc`s into `cards`.
#[derive(Debug, Clone, Default)]
pub struct RuleCardStore {
    path: PathBuf,
    cards: Vec<Arc<RuleCard>>,
    by_topic: HashMap<String, Vec<Arc<RuleCard>>>,
    idf: HashMap<String, f64>,
}

impl RuleCardStore {
    /// Remember the path. Nothing is read until `load()`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Construct and load in one step.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self::new(path);
        store.load()?;
        Ok(store)
    }

    /// Read the JSONL file and rebuild every index, replacing prior state.
    ///
    /// Only a missing file is an error. Blank lines, lines that are not valid
    /// UTF-8 or not JSON objects, and records without `id`/`topic`/`tags` are
    /// skipped.
    pub fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Err(Error::NotFound(self.path.clone()));
        }
        let raw = fs::read(&self.path)?;

        let mut cards = Vec::new();
        let mut skipped = 0usize;
        for (lineno, bytes) in raw.split(|b| *b == b'\n').enumerate() {
            let line = match std::str::from_utf8(bytes) {
                Ok(line) => line.trim(),
                Err(_) => {
                    skipped += 1;
                    tracing::debug!(line = lineno + 1, "skipping rule card line with invalid UTF-8");
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            let card = serde_json::from_str::<Value>(line)
                .ok()
                .and_then(|v| RuleCard::from_record(&v));
            match card {
                Some(card) => cards.push(Arc::new(card)),
                None => {
                    skipped += 1;
                    tracing::debug!(line = lineno + 1, "skipping malformed rule card record");
                }
            }
        }

        self.by_topic = build_topic_index(&cards);
        self.idf = build_idf(&cards);
        self.cards = cards;

        tracing::info!(
            path = %self.path.display(),
            cards = self.cards.len(),
            topics = self.by_topic.len(),
            tokens = self.idf.len(),
            skipped,
            "rule cards loaded"
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All cards in file order.
    pub fn cards(&self) -> &[Arc<RuleCard>] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Topic -> cards, each list sorted by descending priority.
    pub fn by_topic(&self) -> &HashMap<String, Vec<Arc<RuleCard>>> {
        &self.by_topic
    }

    /// Cards for one topic, highest priority first. Empty for an unknown topic.
    pub fn topic(&self, topic: &str) -> &[Arc<RuleCard>] {
        self.by_topic.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Topic names, sorted.
    pub fn topics(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_topic.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn get(&self, id: &str) -> Option<&RuleCard> {
        self.cards.iter().find(|c| c.id == id).map(|c| &**c)
    }

    /// Token -> smoothed inverse document frequency.
    pub fn idf(&self) -> &HashMap<String, f64> {
        &self.idf
    }

    /// IDF weight of a token. Tokens never seen in the corpus weigh 0.0, so
    /// an unknown feature tag adds nothing to a card's score.
    pub fn token_weight(&self, token: &str) -> f64 {
        self.idf.get(&canonicalize(token)).copied().unwrap_or(0.0)
    }
}

fn build_topic_index(cards: &[Arc<RuleCard>]) -> HashMap<String, Vec<Arc<RuleCard>>> {
    let mut index: HashMap<String, Vec<Arc<RuleCard>>> = HashMap::new();
    for card in cards {
        index.entry(card.topic.clone()).or_default().push(Arc::clone(card));
    }
    // sort_by is stable: equal priorities keep file order
    for list in index.values_mut() {
        list.sort_by(|a, b| b.priority.total_cmp(&a.priority));
    }
    index
}

fn build_idf(cards: &[Arc<RuleCard>]) -> HashMap<String, f64> {
    let mut df: HashMap<String, usize> = HashMap::new();
    for card in cards {
        let tokens: HashSet<String> = card.tokens().into_iter().collect();
        for token in tokens {
            *df.entry(token).or_insert(0) += 1;
        }
    }

    let n = cards.len() as f64;
    df.into_iter()
        .map(|(token, d)| {
            let weight = ((n + 1.0) / (d as f64 + 1.0)).ln() + 1.0;
            (token, weight)
        })
        .collect()
}

// --- Runtime reload ---

/// A store handle that can be reloaded while readers hold snapshots.
///
/// `reload` builds a complete new store first and only then swaps the
/// published `Arc`, so a reader sees either the old or the new index.
#[derive(Debug)]
pub struct SharedStore {
    current: RwLock<Arc<RuleCardStore>>,
}

impl SharedStore {
    pub fn new(store: RuleCardStore) -> Self {
        Self {
            current: RwLock::new(Arc::new(store)),
        }
    }

    /// The currently published store.
    pub fn snapshot(&self) -> Arc<RuleCardStore> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Re-read the file behind the current store and publish the result.
    /// On failure the previous snapshot stays in place.
    pub fn reload(&self) -> Result<Arc<RuleCardStore>> {
        let path = self.snapshot().path().to_path_buf();
        let fresh = Arc::new(RuleCardStore::open(path)?);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::clone(&fresh);
        Ok(fresh)
    }
}
