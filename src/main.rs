mod app;
mod calendar;
mod cli;
mod commands;
mod config;
mod export;
mod gesture;
mod journal;
mod location;
mod logging;
mod media;
mod model;
mod radial;
mod storage;
mod ui;

use anyhow::Result;
use clap::Parser;
use cli::{CacheCommand, Command};
use commands::{ExportRequest, Session};
use config::Coordinates;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let command = args.command.unwrap_or(Command::Tui);
    if let Command::Init = command {
        return commands::init();
    }

    let session = Session::open(args.config)?;
    logging::init_logging(&session.settings.log_level, &session.location.log_dir())?;

    match command {
        Command::Init => commands::init(),
        Command::List { date, kind } => commands::list(&session, date, kind),
        Command::Add {
            kind,
            text,
            file,
            date,
            x,
            y,
        } => commands::add(&session, kind, text, file, date, x.zip(y)),
        Command::Move { id, x, y } => commands::move_item(&session, id, x, y),
        Command::Delete { id } => commands::delete(&session, id),
        Command::Export {
            date,
            format,
            out,
            stdout,
            lat,
            lng,
        } => commands::export(
            &session,
            ExportRequest {
                date,
                format,
                out,
                stdout,
                coords: lat.zip(lng).map(|(lat, lng)| Coordinates { lat, lng }),
            },
        ),
        Command::Backup { path } => commands::backup(&session, path),
        Command::Restore { path, dry_run } => commands::restore(&session, path, dry_run),
        Command::Cache { action } => match action {
            CacheCommand::Sweep => commands::cache_sweep(&session),
            CacheCommand::Clear { key } => commands::cache_clear(&session, key),
        },
        Command::Stats => commands::stats(&session),
        Command::Search { query } => commands::search(&session, query),
        Command::Tui => commands::tui(session),
    }
}
