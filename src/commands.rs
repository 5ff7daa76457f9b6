use crate::calendar::{day_key, parse_day_key};
use crate::config::{Coordinates, Settings, CONFIG_FILE};
use crate::export::{self, DayExport, Delivery, ExportFormat};
use crate::journal::{starter_content, Journal, AI_PROMPT};
use crate::location::lookup_within;
use crate::logging::sanitize;
use crate::media::media_content;
use crate::model::{parse_todo_lines, Content, ContentItem, ItemKind, Point, Size};
use crate::storage::{init_project_store, locate_store, JournalDb, StoreLocation, StoreScope};
use crate::ui;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate, Utc};
use log::info;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Canvas assumed for items placed from the command line.
const CLI_VIEWPORT: Size = Size {
    width: 800.0,
    height: 600.0,
};

/// How long an export waits for an uncached place name.
const PLACE_WAIT: Duration = Duration::from_millis(1500);

/// The resolved journal directory and the settings that apply to it.
pub struct Session {
    pub location: StoreLocation,
    pub settings: Settings,
}

impl Session {
    pub fn open(config: Option<PathBuf>) -> Result<Session> {
        let cwd = env::current_dir()?;
        let location = locate_store(&cwd)?;
        let config_path = config.unwrap_or_else(|| location.config_path());
        let settings = Settings::load(&config_path)?;
        Ok(Session { location, settings })
    }

    fn db(&self) -> Result<JournalDb> {
        JournalDb::open(&self.location.journal_path())
            .with_context(|| format!("opening journal in {}", self.location.dir.display()))
    }

    fn journal(&self) -> Result<Journal> {
        Ok(Journal::new(self.db()?))
    }
}

pub fn init() -> Result<()> {
    let location = init_project_store()?;
    let config = location.dir.join(CONFIG_FILE);
    if !config.exists() {
        let defaults = serde_yaml::to_string(&Settings::default())?;
        fs::write(&config, defaults).with_context(|| format!("writing {:?}", config))?;
    }
    println!("Initialized journal at {}", location.dir.display());
    Ok(())
}

pub fn list(session: &Session, date: Option<String>, kind: Option<ItemKind>) -> Result<()> {
    let journal = session.journal()?;
    println!(
        "Journal: {} ({})",
        session.location.dir.display(),
        match session.location.scope {
            StoreScope::Project => "project",
            StoreScope::Global => "global",
        }
    );
    let dates: Vec<String> = match date {
        Some(raw) => vec![day_key(parse_date(&raw)?)],
        None => journal.db().dates().cloned().collect(),
    };
    if dates.is_empty() {
        println!("  (empty)");
    }
    let of_kind = kind.map(|k| journal.db().items_by_kind(k));
    for date in dates {
        println!("{}", date);
        let items: Vec<&ContentItem> = match &of_kind {
            Some(matching) => matching.iter().copied().filter(|i| i.date == date).collect(),
            None => journal.items_for(&date),
        };
        if items.is_empty() {
            println!("  (empty)");
        }
        for item in items {
            print_item(item);
        }
        println!();
    }
    Ok(())
}

pub fn add(
    session: &Session,
    kind: ItemKind,
    text: Option<String>,
    file: Option<PathBuf>,
    date: Option<String>,
    position: Option<(f64, f64)>,
) -> Result<()> {
    let mut journal = session.journal()?;
    let date = match date {
        Some(raw) => parse_date(&raw)?,
        None => today(),
    };
    let key = day_key(date);
    let now = now_ms();
    let content = match kind {
        ItemKind::Note => {
            let text = text.ok_or_else(|| anyhow!("a note needs text"))?;
            Content::Note(text)
        }
        ItemKind::Ai => Content::Ai(text.unwrap_or_else(|| AI_PROMPT.to_string())),
        ItemKind::Todos => match text {
            Some(text) => Content::Todos(parse_todo_lines(&text)),
            None => starter(kind, now)?,
        },
        ItemKind::Photo | ItemKind::Audio | ItemKind::Video => {
            let file = file.ok_or_else(|| anyhow!("{} items need --file", kind))?;
            media_content(&file, kind).with_context(|| format!("attaching {:?}", file))?
        }
        ItemKind::Verse => return add_verse(&mut journal, &key, now),
        ItemKind::Timer | ItemKind::Thai => starter(kind, now)?,
    };
    let anchor = position.map(|(x, y)| Point::new(x, y));
    let item = journal.create_item(&key, content, anchor, CLI_VIEWPORT, now);
    surface_store_error(&mut journal)?;
    println!("Added {} {} to {}", item.kind(), item.id, key);
    Ok(())
}

/// A day carries one verse, so adding one reports the existing verse if there is one.
fn add_verse(journal: &mut Journal, key: &str, now: i64) -> Result<()> {
    if let Some(item) = journal.ensure_daily_verse(key, CLI_VIEWPORT, now) {
        surface_store_error(journal)?;
        println!("Added {} {} to {}", item.kind(), item.id, key);
        return Ok(());
    }
    if let Some(existing) = journal
        .items_for(key)
        .into_iter()
        .find(|item| item.kind() == ItemKind::Verse)
    {
        println!("{} already has verse {} ({})", key, existing.id, existing.title);
    }
    Ok(())
}

pub fn move_item(session: &Session, id: String, x: f64, y: f64) -> Result<()> {
    let mut journal = session.journal()?;
    journal
        .update_position(&id, Point::new(x, y))
        .with_context(|| format!("moving item {}", id))?;
    surface_store_error(&mut journal)?;
    println!("Moved {} to ({}, {})", id, x, y);
    Ok(())
}

pub fn delete(session: &Session, id: String) -> Result<()> {
    let mut journal = session.journal()?;
    match journal.delete_item(&id) {
        Some(item) => {
            surface_store_error(&mut journal)?;
            println!("Deleted {} {}", item.kind(), id);
        }
        None => println!("No item {}", id),
    }
    Ok(())
}

pub struct ExportRequest {
    pub date: String,
    pub format: ExportFormat,
    pub out: Option<PathBuf>,
    pub stdout: bool,
    pub coords: Option<Coordinates>,
}

pub fn export(session: &Session, request: ExportRequest) -> Result<()> {
    let mut journal = session.journal()?;
    let date = parse_date(&request.date)?;
    let key = day_key(date);
    let now = now_ms();

    let location = request
        .coords
        .or(session.settings.location)
        .map(|coords| {
            lookup_within(
                journal.db_mut(),
                &session.settings.geocode,
                coords,
                PLACE_WAIT,
                now,
            )
        });

    let items = journal.items_for(&key);
    let day = DayExport::new(date, &items, location);
    let document = export::render(&day, request.format)?;
    let target = request.out.unwrap_or_else(|| {
        session
            .location
            .exports_dir()
            .join(export::file_name(&key, request.format))
    });
    let delivery = export::deliver(&document, request.stdout, &target)?;
    info!(
        "event=export date={} format={} delivery={}",
        key, request.format, delivery
    );
    if let Delivery::File(path) = delivery {
        println!("Exported {} to {}", key, path.display());
    }
    Ok(())
}

pub fn backup(session: &Session, path: PathBuf) -> Result<()> {
    let journal = session.journal()?;
    let json = journal.db().export_backup(now_ms())?;
    fs::write(&path, json).with_context(|| format!("writing backup {:?}", path))?;
    println!(
        "Backed up {} items to {}",
        journal.db().stats().items,
        path.display()
    );
    Ok(())
}

pub fn restore(session: &Session, path: PathBuf, dry_run: bool) -> Result<()> {
    let json = fs::read_to_string(&path).with_context(|| format!("reading backup {:?}", path))?;
    let mut db = if dry_run {
        JournalDb::in_memory()
    } else {
        session.db()?
    };
    let summary = db
        .import_backup(&json)
        .with_context(|| format!("importing {:?}", path))?;
    println!(
        "{} {} items and {} settings ({} skipped)",
        if dry_run { "Would restore" } else { "Restored" },
        summary.items,
        summary.settings,
        summary.skipped
    );
    Ok(())
}

pub fn cache_sweep(session: &Session) -> Result<()> {
    let mut journal = session.journal()?;
    let removed = journal.db_mut().sweep_expired(now_ms())?;
    println!("Removed {} expired entries", removed);
    Ok(())
}

pub fn cache_clear(session: &Session, key: Option<String>) -> Result<()> {
    let mut journal = session.journal()?;
    let removed = journal.db_mut().clear_cache(key.as_deref())?;
    println!("Removed {} entries", removed);
    Ok(())
}

pub fn stats(session: &Session) -> Result<()> {
    let journal = session.journal()?;
    let stats = journal.db().stats();
    println!("Items:    {}", stats.items);
    for (kind, count) in &stats.by_kind {
        println!("  {} {:<6} {}", kind.icon(), kind.as_str(), count);
    }
    println!("Days:     {}", stats.dates);
    println!("Settings: {}", stats.settings);
    println!("Cache:    {}", stats.cache);
    println!("Size:     {} bytes", stats.total_size);
    Ok(())
}

pub fn search(session: &Session, query: String) -> Result<()> {
    let journal = session.journal()?;
    let hits = journal.db().search(&query);
    info!(
        "event=search query={} hits={}",
        sanitize(&query, 60),
        hits.len()
    );
    if hits.is_empty() {
        println!("No matches for {:?}", query);
    }
    for item in hits {
        println!("{}", item.date);
        print_item(item);
    }
    Ok(())
}

pub fn tui(session: Session) -> Result<()> {
    let journal = session.journal()?;
    ui::run(journal, session.settings, session.location)
}

fn starter(kind: ItemKind, now_ms: i64) -> Result<Content> {
    starter_content(kind, now_ms).ok_or_else(|| anyhow!("{} items need input", kind))
}

fn surface_store_error(journal: &mut Journal) -> Result<()> {
    match journal.take_store_error() {
        Some(err) => bail!("journal not saved: {}", err),
        None => Ok(()),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    parse_day_key(raw.trim())
        .ok_or_else(|| anyhow!("invalid date (use YYYY-MM-DD): {}", raw))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn print_item(item: &ContentItem) {
    println!(
        "  - {} {} {} @ ({:.0}, {:.0})",
        item.id,
        item.kind().icon(),
        item.title,
        item.x,
        item.y
    );
    let preview = item.preview();
    if !preview.is_empty() {
        println!("    {}", preview);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn session_in(dir: &std::path::Path) -> Session {
        Session {
            location: StoreLocation {
                dir: dir.to_path_buf(),
                scope: StoreScope::Project,
            },
            settings: Settings::default(),
        }
    }

    fn verses_on(session: &Session, key: &str) -> usize {
        session
            .journal()
            .unwrap()
            .items_for(key)
            .into_iter()
            .filter(|item| item.kind() == ItemKind::Verse)
            .count()
    }

    #[test]
    fn adding_a_verse_twice_keeps_one_per_day() {
        let dir = tempdir().unwrap();
        let session = session_in(dir.path());
        let day = Some("2026-10-19".to_string());
        add(&session, ItemKind::Verse, None, None, day.clone(), None).unwrap();
        add(&session, ItemKind::Verse, None, None, day, None).unwrap();
        assert_eq!(verses_on(&session, "2026-10-19"), 1);
    }

    #[test]
    fn restoring_a_backup_keeps_todays_verse() {
        let dir = tempdir().unwrap();
        let session = session_in(dir.path());
        add(&session, ItemKind::Verse, None, None, Some("2026-10-19".into()), None).unwrap();

        let other = tempdir().unwrap();
        let elsewhere = session_in(other.path());
        add(&elsewhere, ItemKind::Verse, None, None, Some("2026-10-19".into()), None).unwrap();
        add(
            &elsewhere,
            ItemKind::Note,
            Some("from the other journal".into()),
            None,
            Some("2026-10-19".into()),
            None,
        )
        .unwrap();
        let backup = other.path().join("backup.json");
        super::backup(&elsewhere, backup.clone()).unwrap();

        restore(&session, backup, false).unwrap();
        assert_eq!(verses_on(&session, "2026-10-19"), 1);
        assert_eq!(session.journal().unwrap().items_for("2026-10-19").len(), 2);
    }
}
