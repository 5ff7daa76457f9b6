use crate::export::ExportFormat;
use crate::model::ItemKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "daybook", version, about = "Terminal journaling calendar")]
pub struct Cli {
    /// Settings file (defaults to config.yml in the journal directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a project journal in the current directory
    Init,
    /// List items, for one day or for every day
    List {
        /// Day in YYYY-MM-DD format
        #[arg(long)]
        date: Option<String>,
        /// Only items of this kind
        #[arg(long)]
        kind: Option<ItemKind>,
    },
    /// Add an item to a day
    Add {
        /// Item kind: note, photo, audio, video, todos, timer, thai, verse, ai
        kind: ItemKind,
        /// Text for notes and AI prompts; one task per line for todos
        text: Option<String>,
        /// Media file for photo, audio and video items
        #[arg(long)]
        file: Option<PathBuf>,
        /// Day in YYYY-MM-DD format (defaults to today)
        #[arg(long)]
        date: Option<String>,
        /// Canvas x position in pixels
        #[arg(long, requires = "y")]
        x: Option<f64>,
        /// Canvas y position in pixels
        #[arg(long, requires = "x")]
        y: Option<f64>,
    },
    /// Move an item on its day canvas
    Move {
        /// Item id
        id: String,
        x: f64,
        y: f64,
    },
    /// Delete an item
    Delete {
        /// Item id
        id: String,
    },
    /// Export one day as a standalone page or an image
    Export {
        /// Day in YYYY-MM-DD format
        date: String,
        /// html or image
        #[arg(long, default_value = "html")]
        format: ExportFormat,
        /// Output path (defaults to the exports directory)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Write to stdout when it is piped
        #[arg(long)]
        stdout: bool,
        /// Latitude for the location header
        #[arg(long, requires = "lng", allow_hyphen_values = true)]
        lat: Option<f64>,
        /// Longitude for the location header
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lng: Option<f64>,
    },
    /// Write a JSON backup of items and settings
    Backup {
        path: PathBuf,
    },
    /// Merge a JSON backup into the journal
    Restore {
        path: PathBuf,
        /// Check the backup without changing the journal
        #[arg(long)]
        dry_run: bool,
    },
    /// Manage the lookup cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
    /// Show store statistics
    Stats,
    /// Search item text, kinds and dates
    Search {
        query: String,
    },
    /// Launch the interactive TUI
    Tui,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Drop expired entries
    Sweep,
    /// Drop one entry, or all of them
    Clear {
        key: Option<String>,
    },
}
