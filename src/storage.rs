use crate::model::{ContentItem, ItemId, ItemKind};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const STORE_DIR: &str = ".daybook";
pub const JOURNAL_FILE: &str = "journal.yml";
pub const BACKUP_VERSION: u32 = 1;
pub const DEFAULT_CACHE_TTL_MS: i64 = 3_600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    Project,
    Global,
}

/// Directory holding the journal, config, exports and logs.
#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub dir: PathBuf,
    pub scope: StoreScope,
}

impl StoreLocation {
    pub fn journal_path(&self) -> PathBuf {
        self.dir.join(JOURNAL_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(crate::config::CONFIG_FILE)
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.dir.join("exports")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.join("logs")
    }
}

pub fn init_project_store() -> Result<StoreLocation> {
    let cwd = env::current_dir()?;
    let dir = cwd.join(STORE_DIR);
    fs::create_dir_all(&dir).context("failed to create .daybook directory")?;
    Ok(StoreLocation {
        dir,
        scope: StoreScope::Project,
    })
}

pub fn locate_store(start: &Path) -> Result<StoreLocation> {
    if let Some(dir) = find_project_store(start) {
        return Ok(StoreLocation {
            dir,
            scope: StoreScope::Project,
        });
    }
    Ok(StoreLocation {
        dir: global_store_dir()?,
        scope: StoreScope::Global,
    })
}

fn find_project_store(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(STORE_DIR);
        if candidate.is_dir() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

fn global_store_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "daybook").context("locating data directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("storage unavailable at {path:?}: {source}")]
    Unavailable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("writing {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing journal file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("serializing journal: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("backup document is not valid: {0}")]
    Backup(#[from] serde_json::Error),
    #[error("unsupported backup version {0}")]
    BackupVersion(u64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Value,
    pub expiry: i64,
}

/// On-disk shape of the journal file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    items: BTreeMap<ItemId, ContentItem>,
    #[serde(default)]
    settings: BTreeMap<String, Value>,
    #[serde(default)]
    cache: BTreeMap<String, CacheEntry>,
}

#[derive(Debug, Clone)]
enum Backend {
    File(PathBuf),
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub items: usize,
    pub by_kind: BTreeMap<ItemKind, usize>,
    pub dates: usize,
    pub settings: usize,
    pub cache: usize,
    pub total_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub items: usize,
    pub settings: usize,
    pub skipped: usize,
}

#[derive(Serialize)]
struct BackupSetting<'a> {
    key: &'a str,
    value: &'a Value,
}

#[derive(Serialize)]
struct BackupDocument<'a> {
    version: u32,
    timestamp: i64,
    items: Vec<&'a ContentItem>,
    settings: Vec<BackupSetting<'a>>,
}

/// Items keyed by id with date and kind indexes, plus settings and an expiring cache.
///
/// The file backend rewrites the whole document after every mutation.
#[derive(Debug)]
pub struct JournalDb {
    backend: Backend,
    items: BTreeMap<ItemId, ContentItem>,
    by_date: BTreeMap<String, BTreeSet<ItemId>>,
    by_kind: BTreeMap<ItemKind, BTreeSet<ItemId>>,
    settings: BTreeMap<String, Value>,
    cache: BTreeMap<String, CacheEntry>,
}

impl JournalDb {
    pub fn open(path: &Path) -> Result<JournalDb, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Unavailable {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let snapshot = if path.exists() {
            let data = fs::read_to_string(path).map_err(|source| StoreError::Unavailable {
                path: path.to_path_buf(),
                source,
            })?;
            serde_yaml::from_str::<Option<Snapshot>>(&data)
                .map_err(|source| StoreError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
                .unwrap_or_default()
        } else {
            Snapshot::default()
        };
        debug!(
            "event=store_open path={} items={}",
            path.display(),
            snapshot.items.len()
        );
        Ok(JournalDb::from_snapshot(
            Backend::File(path.to_path_buf()),
            snapshot,
        ))
    }

    pub fn in_memory() -> JournalDb {
        JournalDb::from_snapshot(Backend::Memory, Snapshot::default())
    }

    fn from_snapshot(backend: Backend, snapshot: Snapshot) -> JournalDb {
        let mut db = JournalDb {
            backend,
            items: BTreeMap::new(),
            by_date: BTreeMap::new(),
            by_kind: BTreeMap::new(),
            settings: snapshot.settings,
            cache: snapshot.cache,
        };
        for (_, item) in snapshot.items {
            db.insert_indexed(item);
        }
        db
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.backend {
            Backend::File(path) => Some(path),
            Backend::Memory => None,
        }
    }

    fn insert_indexed(&mut self, item: ContentItem) {
        self.remove_indexed(&item.id);
        self.by_date
            .entry(item.date.clone())
            .or_default()
            .insert(item.id.clone());
        self.by_kind
            .entry(item.kind())
            .or_default()
            .insert(item.id.clone());
        self.items.insert(item.id.clone(), item);
    }

    /// A day holds one verse; another id filed under the same date blocks this one.
    fn has_other_verse(&self, item: &ContentItem) -> bool {
        item.kind() == ItemKind::Verse
            && self
                .items_by_date(&item.date)
                .iter()
                .any(|existing| existing.kind() == ItemKind::Verse && existing.id != item.id)
    }

    fn remove_indexed(&mut self, id: &str) -> Option<ContentItem> {
        let item = self.items.remove(id)?;
        if let Some(ids) = self.by_date.get_mut(&item.date) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_date.remove(&item.date);
            }
        }
        let kind = item.kind();
        if let Some(ids) = self.by_kind.get_mut(&kind) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_kind.remove(&kind);
            }
        }
        Some(item)
    }

    pub fn put_item(&mut self, item: ContentItem) -> Result<(), StoreError> {
        self.insert_indexed(item);
        self.persist()
    }

    /// Updates memory only; the next write (or `flush`) carries it to disk.
    pub fn stage_item(&mut self, item: ContentItem) {
        self.insert_indexed(item);
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.persist()
    }

    pub fn get_item(&self, id: &str) -> Option<&ContentItem> {
        self.items.get(id)
    }

    /// Removes an item; a missing id is not an error.
    pub fn delete_item(&mut self, id: &str) -> Result<Option<ContentItem>, StoreError> {
        let removed = self.remove_indexed(id);
        if removed.is_some() {
            self.persist()?;
        }
        Ok(removed)
    }

    fn sorted<'a>(&'a self, ids: impl Iterator<Item = &'a ItemId>) -> Vec<&'a ContentItem> {
        let mut items: Vec<&ContentItem> = ids.filter_map(|id| self.items.get(id)).collect();
        items.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        items
    }

    pub fn items_by_date(&self, date: &str) -> Vec<&ContentItem> {
        match self.by_date.get(date) {
            Some(ids) => self.sorted(ids.iter()),
            None => Vec::new(),
        }
    }

    pub fn items_by_kind(&self, kind: ItemKind) -> Vec<&ContentItem> {
        match self.by_kind.get(&kind) {
            Some(ids) => self.sorted(ids.iter()),
            None => Vec::new(),
        }
    }

    /// Items whose date key falls in `start..=end`, ordered by date.
    pub fn items_in_range(&self, start: &str, end: &str) -> Vec<&ContentItem> {
        if start > end {
            return Vec::new();
        }
        self.by_date
            .range(start.to_string()..=end.to_string())
            .flat_map(|(_, ids)| self.sorted(ids.iter()))
            .collect()
    }

    pub fn all_items(&self) -> Vec<&ContentItem> {
        self.sorted(self.items.keys())
    }

    pub fn dates(&self) -> impl Iterator<Item = &String> {
        self.by_date.keys()
    }

    /// Every whitespace-separated term must appear in the item's text, kind or date.
    pub fn search(&self, query: &str) -> Vec<&ContentItem> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        self.all_items()
            .into_iter()
            .filter(|item| {
                let haystack = format!(
                    "{} {} {} {}",
                    item.content.text(),
                    item.title,
                    item.kind(),
                    item.date
                )
                .to_lowercase();
                terms.iter().all(|term| haystack.contains(term.as_str()))
            })
            .collect()
    }

    pub fn get_setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    pub fn set_settings<I>(&mut self, entries: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.settings.extend(entries);
        self.persist()
    }

    pub fn set_cache(
        &mut self,
        key: &str,
        data: Value,
        ttl_ms: Option<i64>,
        now_ms: i64,
    ) -> Result<(), StoreError> {
        let expiry = now_ms + ttl_ms.unwrap_or(DEFAULT_CACHE_TTL_MS);
        self.cache
            .insert(key.to_string(), CacheEntry { data, expiry });
        self.persist()
    }

    /// Returns cached data, evicting the entry if it has expired.
    pub fn get_cache(&mut self, key: &str, now_ms: i64) -> Result<Option<Value>, StoreError> {
        match self.cache.get(key) {
            Some(entry) if entry.expiry < now_ms => {
                self.cache.remove(key);
                debug!("event=cache_evict key={}", key);
                self.persist()?;
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.data.clone())),
            None => Ok(None),
        }
    }

    /// Clears one key, or the whole cache when `key` is `None`.
    pub fn clear_cache(&mut self, key: Option<&str>) -> Result<usize, StoreError> {
        let removed = match key {
            Some(key) => usize::from(self.cache.remove(key).is_some()),
            None => {
                let count = self.cache.len();
                self.cache.clear();
                count
            }
        };
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn sweep_expired(&mut self, now_ms: i64) -> Result<usize, StoreError> {
        let before = self.cache.len();
        self.cache.retain(|_, entry| entry.expiry >= now_ms);
        let removed = before - self.cache.len();
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn stats(&self) -> StoreStats {
        let by_kind = self
            .by_kind
            .iter()
            .map(|(kind, ids)| (*kind, ids.len()))
            .collect();
        let total_size = serde_json::to_vec(&serde_json::json!({
            "items": self.items,
            "settings": self.settings,
            "cache": self.cache,
        }))
        .map(|bytes| bytes.len())
        .unwrap_or(0);
        StoreStats {
            items: self.items.len(),
            by_kind,
            dates: self.by_date.len(),
            settings: self.settings.len(),
            cache: self.cache.len(),
            total_size,
        }
    }

    pub fn export_backup(&self, now_ms: i64) -> Result<String, StoreError> {
        let doc = BackupDocument {
            version: BACKUP_VERSION,
            timestamp: now_ms,
            items: self.all_items(),
            settings: self
                .settings
                .iter()
                .map(|(key, value)| BackupSetting { key, value })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Upserts items and settings from a backup. Malformed entries are skipped.
    pub fn import_backup(&mut self, json: &str) -> Result<ImportSummary, StoreError> {
        let doc: Value = serde_json::from_str(json)?;
        if let Some(version) = doc.get("version").and_then(Value::as_u64) {
            if version > u64::from(BACKUP_VERSION) {
                return Err(StoreError::BackupVersion(version));
            }
        }
        let mut summary = ImportSummary::default();
        if let Some(items) = doc.get("items").and_then(Value::as_array) {
            for (index, raw) in items.iter().enumerate() {
                match serde_json::from_value::<ContentItem>(raw.clone()) {
                    Ok(item) if self.has_other_verse(&item) => {
                        warn!(
                            "event=backup_verse_skipped id={} date={}",
                            item.id, item.date
                        );
                        summary.skipped += 1;
                    }
                    Ok(item) => {
                        self.insert_indexed(item);
                        summary.items += 1;
                    }
                    Err(err) => {
                        warn!("event=backup_item_skipped index={} error={}", index, err);
                        summary.skipped += 1;
                    }
                }
            }
        }
        if let Some(settings) = doc.get("settings").and_then(Value::as_array) {
            for (index, raw) in settings.iter().enumerate() {
                match raw.get("key").and_then(Value::as_str) {
                    Some(key) => {
                        let value = raw.get("value").cloned().unwrap_or(Value::Null);
                        self.settings.insert(key.to_string(), value);
                        summary.settings += 1;
                    }
                    None => {
                        warn!("event=backup_setting_skipped index={}", index);
                        summary.skipped += 1;
                    }
                }
            }
        }
        self.persist()?;
        Ok(summary)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Backend::File(path) = &self.backend else {
            return Ok(());
        };
        let snapshot = SnapshotRef {
            items: &self.items,
            settings: &self.settings,
            cache: &self.cache,
        };
        let serialized = serde_yaml::to_string(&snapshot)?;
        fs::write(path, serialized).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    items: &'a BTreeMap<ItemId, ContentItem>,
    settings: &'a BTreeMap<String, Value>,
    cache: &'a BTreeMap<String, CacheEntry>,
}
