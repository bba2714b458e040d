//! Game content documents (races, classes, skills, ...) kept as JSON files.
//!
//! Each document is a key→definition map stored at `<dir>/<name>.json`.
//! Writers are serialized by one lock and every write lands through a
//! temporary file and a rename, so readers never see a half-written file.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::constants::{CONFIG_NAMES, MAX_HIT_DIE};
use crate::error::{AppError, Result};

pub type ContentMap = Map<String, Value>;

const DEFAULTS: [(&str, &str); 6] = [
    ("races", include_str!("../dnd_configs/races.json")),
    ("classes", include_str!("../dnd_configs/classes.json")),
    ("skills", include_str!("../dnd_configs/skills.json")),
    ("spells", include_str!("../dnd_configs/spells.json")),
    ("items", include_str!("../dnd_configs/items.json")),
    ("feats", include_str!("../dnd_configs/feats.json")),
];

/// One search match
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub config: &'static str,
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentStats {
    #[serde(flatten)]
    pub documents: BTreeMap<&'static str, DocumentStats>,
    pub total: usize,
}

/// Resolve a document name to its canonical form, or 400
pub fn document_name(name: &str) -> Result<&'static str> {
    CONFIG_NAMES
        .iter()
        .copied()
        .find(|n| *n == name)
        .ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Unknown config '{}'; allowed: {}",
                name,
                CONFIG_NAMES.join(", ")
            ))
        })
}

/// Find a definition by key, or by a case-insensitive match on its key or
/// `name` field
pub fn lookup<'a>(map: &'a ContentMap, wanted: &str) -> Option<&'a Value> {
    if let Some(v) = map.get(wanted) {
        return Some(v);
    }
    let wanted = wanted.trim().to_lowercase();
    let as_key = wanted.replace([' ', '-'], "_");
    map.iter()
        .find(|(key, value)| {
            key.to_lowercase() == as_key
                || value
                    .get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|n| n.to_lowercase() == wanted)
        })
        .map(|(_, v)| v)
}

pub struct ContentStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl ContentStore {
    /// Open the store, creating the directory and seeding any missing
    /// document from the built-in defaults
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        };

        tokio::fs::create_dir_all(&store.dir).await?;

        for (name, default) in DEFAULTS {
            let path = store.path_for(name);
            if tokio::fs::try_exists(&path).await? {
                continue;
            }
            let map: ContentMap = serde_json::from_str(default)?;
            store.persist(name, &map).await?;
            tracing::info!("Seeded config '{}' with {} entries", name, map.len());
        }

        tracing::info!("Content store ready at {}", store.dir.display());
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    async fn load(&self, name: &'static str) -> Result<ContentMap> {
        let path = self.path_for(name);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ContentMap::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            _ => {
                tracing::warn!("Config '{}' is not a JSON object; treating as empty", name);
                Ok(ContentMap::new())
            }
        }
    }

    /// Write `map` through a temp file, fsync, then rename over the target
    async fn persist(&self, name: &str, map: &ContentMap) -> Result<()> {
        let target = self.path_for(name);
        let temp = self.dir.join(format!(".{}.json.tmp", name));

        let bytes = serde_json::to_vec_pretty(map)?;
        let mut file = tokio::fs::File::create(&temp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp, &target).await?;
        Ok(())
    }

    pub async fn read(&self, name: &str) -> Result<ContentMap> {
        self.load(document_name(name)?).await
    }

    /// Replace a whole document
    pub async fn write(&self, name: &str, map: &ContentMap) -> Result<()> {
        let name = document_name(name)?;
        let _guard = self.write_lock.lock().await;
        self.persist(name, map).await
    }

    pub async fn get(&self, name: &str, key: &str) -> Result<Option<Value>> {
        let map = self.read(name).await?;
        Ok(lookup(&map, key).cloned())
    }

    /// Insert a new definition; 409 when the key is taken
    pub async fn add(&self, name: &str, key: &str, value: Value) -> Result<()> {
        let name = document_name(name)?;
        let _guard = self.write_lock.lock().await;

        let mut map = self.load(name).await?;
        if map.contains_key(key) {
            return Err(AppError::Conflict(format!(
                "'{}' already exists in {}",
                key, name
            )));
        }
        map.insert(key.to_string(), value);
        self.persist(name, &map).await?;

        tracing::info!("Added '{}' to config '{}'", key, name);
        Ok(())
    }

    /// Shallow-merge `patch` into an existing definition and return the result
    pub async fn update(&self, name: &str, key: &str, patch: Value) -> Result<Value> {
        let name = document_name(name)?;
        let _guard = self.write_lock.lock().await;

        let mut map = self.load(name).await?;
        let entry = map
            .get_mut(key)
            .ok_or_else(|| AppError::NotFound(format!("'{}' in {}", key, name)))?;

        match (entry, patch) {
            (Value::Object(existing), Value::Object(fields)) => {
                for (k, v) in fields {
                    existing.insert(k, v);
                }
            }
            (entry, patch) => *entry = patch,
        }

        let merged = map.get(key).cloned().unwrap_or(Value::Null);
        self.persist(name, &map).await?;

        tracing::info!("Updated '{}' in config '{}'", key, name);
        Ok(merged)
    }

    /// Remove a definition and return it; 404 when absent
    pub async fn remove(&self, name: &str, key: &str) -> Result<Value> {
        let name = document_name(name)?;
        let _guard = self.write_lock.lock().await;

        let mut map = self.load(name).await?;
        let removed = map
            .remove(key)
            .ok_or_else(|| AppError::NotFound(format!("'{}' in {}", key, name)))?;
        self.persist(name, &map).await?;

        tracing::info!("Removed '{}' from config '{}'", key, name);
        Ok(removed)
    }

    /// Every document, keyed by name
    pub async fn all(&self) -> Result<BTreeMap<&'static str, ContentMap>> {
        let mut out = BTreeMap::new();
        for name in CONFIG_NAMES {
            out.insert(name, self.load(name).await?);
        }
        Ok(out)
    }

    /// Case-insensitive substring search over keys and serialized values
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(AppError::InvalidInput("Search query is required".to_string()));
        }

        let mut hits = Vec::new();
        for (config, map) in self.all().await? {
            for (key, value) in map {
                let haystack = format!("{} {}", key, value).to_lowercase();
                if haystack.contains(&needle) {
                    hits.push(SearchHit { config, key, value });
                }
            }
        }
        Ok(hits)
    }

    pub async fn stats(&self) -> Result<ContentStats> {
        let documents: BTreeMap<_, _> = self
            .all()
            .await?
            .into_iter()
            .map(|(name, map)| (name, DocumentStats { count: map.len() }))
            .collect();
        let total = documents.values().map(|d| d.count).sum();
        Ok(ContentStats { documents, total })
    }

    /// Hit die declared by a class definition, if it has one in `1..=20`
    pub async fn class_hit_die(&self, class: &str) -> Result<Option<i64>> {
        Ok(self
            .get("classes", class)
            .await?
            .and_then(|c| c.get("hit_die").and_then(Value::as_i64))
            .filter(|d| (1..=MAX_HIT_DIE).contains(d)))
    }
}
