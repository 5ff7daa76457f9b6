//! Shareable renderings of a single day.

pub mod html;
pub mod image;

use crate::location::Location;
use crate::model::{Content, ContentItem, MediaRef, Verse};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{info, warn};
use std::fmt;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const MAX_STRIP_PHOTOS: usize = 4;
pub const STICKERS: [&str; 5] = ["💝", "🌸", "✨", "🦋", "🌈"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Html,
    Image,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Html => "html",
            ExportFormat::Image => "jpg",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Html => write!(f, "html"),
            ExportFormat::Image => write!(f, "image"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(ExportFormat::Html),
            "image" | "jpg" | "jpeg" => Ok(ExportFormat::Image),
            other => Err(format!("unknown export format `{other}`; expected html|image")),
        }
    }
}

/// A day's items split the way both renderings lay them out.
#[derive(Debug, Clone)]
pub struct DayExport<'a> {
    pub date: NaiveDate,
    pub date_string: String,
    pub location: Option<Location>,
    pub notes: Vec<&'a str>,
    pub photos: Vec<&'a MediaRef>,
    pub audio: Vec<&'a MediaRef>,
    pub verse: Option<&'a Verse>,
}

impl<'a> DayExport<'a> {
    pub fn new(date: NaiveDate, items: &[&'a ContentItem], location: Option<Location>) -> Self {
        let mut export = DayExport {
            date,
            date_string: long_date(date),
            location,
            notes: Vec::new(),
            photos: Vec::new(),
            audio: Vec::new(),
            verse: None,
        };
        for item in items.iter().copied() {
            match &item.content {
                Content::Note(text) if !text.trim().is_empty() => export.notes.push(text),
                Content::Photo(media) => export.photos.push(media),
                Content::Audio(media) => export.audio.push(media),
                Content::Verse(verse) if export.verse.is_none() => export.verse = Some(verse),
                _ => {}
            }
        }
        export
    }

    /// The photos shown on the strip and in the grid.
    pub fn strip_photos(&self) -> &[&'a MediaRef] {
        &self.photos[..self.photos.len().min(MAX_STRIP_PHOTOS)]
    }
}

pub fn long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

pub fn render(export: &DayExport<'_>, format: ExportFormat) -> Result<Vec<u8>> {
    Ok(match format {
        ExportFormat::Html => html::render_day(export).into_string().into_bytes(),
        ExportFormat::Image => image::render_jpeg(export).context("rendering image")?,
    })
}

pub fn file_name(date_key: &str, format: ExportFormat) -> String {
    format!("journal-{}.{}", date_key, format.extension())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Stdout,
    File(PathBuf),
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delivery::Stdout => write!(f, "stdout"),
            Delivery::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Shares to stdout when it is piped; anything else lands as a file.
pub fn deliver(document: &[u8], share: bool, target: &Path) -> Result<Delivery> {
    if share {
        let stdout = io::stdout();
        if stdout.is_terminal() {
            info!("event=export_share_fallback reason=terminal");
        } else {
            let mut lock = stdout.lock();
            match lock
                .write_all(document)
                .and_then(|_| lock.flush())
            {
                Ok(()) => return Ok(Delivery::Stdout),
                Err(err) => warn!("event=export_share_failed error={}", err),
            }
        }
    }
    write_file(document, target)?;
    Ok(Delivery::File(target.to_path_buf()))
}

pub fn write_file(document: &[u8], target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    fs::write(target, document).with_context(|| format!("writing {:?}", target))?;
    info!(
        "event=export_written path={} bytes={}",
        target.display(),
        document.len()
    );
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn partitions_by_kind() {
        let items = vec![note("first"), photo(1), note("   "), verse(), verse()];
        let refs: Vec<&ContentItem> = items.iter().collect();
        let export = DayExport::new(day(), &refs, None);
        assert_eq!(export.notes, vec!["first"]);
        assert_eq!(export.photos.len(), 1);
        assert!(export.audio.is_empty());
        assert!(export.verse.is_some());
        assert_eq!(export.date_string, "Monday, October 19, 2026");
    }

    #[test]
    fn strip_keeps_first_four_photos() {
        let items: Vec<ContentItem> = (0..5).map(photo).collect();
        let refs: Vec<&ContentItem> = items.iter().collect();
        let export = DayExport::new(day(), &refs, None);
        assert_eq!(export.strip_photos().len(), 4);
        assert!(export.strip_photos()[3].data_uri.ends_with("UE5H3"));
    }

    #[test]
    fn format_parses_and_names_files() {
        assert_eq!("HTML".parse::<ExportFormat>().unwrap(), ExportFormat::Html);
        assert_eq!("image".parse::<ExportFormat>().unwrap(), ExportFormat::Image);
        assert_eq!("jpeg".parse::<ExportFormat>().unwrap(), ExportFormat::Image);
        assert!("svg".parse::<ExportFormat>().is_err());
        assert_eq!(file_name("2026-10-19", ExportFormat::Image), "journal-2026-10-19.jpg");
    }

    #[test]
    fn delivery_without_share_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("exports").join("journal-2026-10-19.html");
        let delivery = deliver(b"<html></html>", false, &target).unwrap();
        assert_eq!(delivery, Delivery::File(target.clone()));
        assert_eq!(fs::read_to_string(&target).unwrap(), "<html></html>");
    }
}
