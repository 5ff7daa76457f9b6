use crate::app::{Action, Controller, Hit, Outcome, Prompt};
use crate::calendar::{day_key, month_key, TimeDirection, ViewLevel, ZoomDirection};
use crate::config::{CanvasSettings, Settings};
use crate::export::{self, DayExport, ExportFormat};
use crate::gesture::{PointerId, PointerInput, PressPhase};
use crate::journal::Journal;
use crate::location::{cached_location, start_lookup, PlaceLookup};
use crate::model::{format_todo_lines, truncate_chars, Content, ContentItem, ItemId, ItemKind, Point, Size};
use crate::radial::MenuAction;
use crate::storage::{StoreLocation, StoreScope};
use anyhow::Result;
use chrono::{Datelike, Local, NaiveDate, Utc};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use log::{info, warn};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::Duration;

/// Poll interval; also the resolution of long-press and timer ticks.
const TICK: Duration = Duration::from_millis(50);
const MOUSE_POINTER: PointerId = 1;

pub fn run(journal: Journal, settings: Settings, location: StoreLocation) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(journal, settings, location, terminal.size()?);
    let result = app.event_loop(&mut terminal);
    app.controller.flush(now_ms());
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    controller: Controller,
    settings: Settings,
    location: StoreLocation,
    status: String,
    mode: Mode,
    selected: Option<ItemId>,
    /// Inner area of the canvas block in the last frame.
    canvas: Rect,
    /// Calendar cells drawn in the last frame, for tap hit-testing.
    date_cells: Vec<(Rect, NaiveDate)>,
    /// Place name being resolved for exports.
    place_lookup: Option<PlaceLookup>,
}

enum Mode {
    Normal,
    Prompt { prompt: Prompt, field: FieldValue },
    Editing { id: ItemId, field: FieldValue },
    Picking { index: usize },
    Jump { field: FieldValue },
    ConfirmDelete { id: ItemId },
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_char(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_char(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_char(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }

    /// Applies an editing key. Returns true when the key submits the field.
    fn edit(&mut self, key: KeyEvent, multiline: bool) -> bool {
        match key.code {
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Enter => {
                let control = key.modifiers.contains(KeyModifiers::CONTROL);
                if multiline && !control {
                    self.insert_char('\n');
                } else {
                    return true;
                }
            }
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    self.insert_char(c);
                }
            }
            _ => {}
        }
        false
    }
}

impl App {
    fn new(journal: Journal, settings: Settings, location: StoreLocation, screen: Rect) -> Self {
        let canvas = canvas_area(screen);
        let viewport = viewport_size(canvas, &settings.canvas);
        let mut controller = Controller::new(journal, &settings, viewport, today(), now_ms());
        let place_lookup = settings.location.and_then(|coords| {
            start_lookup(
                controller.journal_mut().db_mut(),
                &settings.geocode,
                coords,
                now_ms() as i64,
            )
        });
        let mut status = format!("Loaded journal from {}", location.dir.display());
        if let Some(logs) = crate::logging::log_dir() {
            status.push_str(&format!(" • logs in {}", logs.display()));
        }
        App {
            controller,
            settings,
            location,
            status,
            mode: Mode::Normal,
            selected: None,
            canvas,
            date_cells: Vec::new(),
            place_lookup,
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            self.sync_viewport();
            if event::poll(TICK)? {
                match event::read()? {
                    Event::Key(key) => {
                        if key.kind == KeyEventKind::Press && self.handle_key(key)? {
                            break;
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => {}
                }
            }
            let cells = &self.date_cells;
            let canvas = self.canvas;
            let cell = &self.settings.canvas;
            let hit = |p: Point| date_hit(cells, canvas, cell, p);
            let outcome = self.controller.tick(&hit, today(), now_ms());
            self.apply(outcome);
            self.settle_place();
        }
        Ok(())
    }

    fn settle_place(&mut self) {
        let Some(lookup) = &self.place_lookup else {
            return;
        };
        let db = self.controller.journal_mut().db_mut();
        if let Some(location) = lookup.settle(db, now_ms() as i64) {
            if let Some(label) = location.label() {
                info!("event=place_resolved label={}", crate::logging::sanitize(&label, 80));
            }
            self.place_lookup = None;
        }
    }

    fn sync_viewport(&mut self) {
        let viewport = viewport_size(self.canvas, &self.settings.canvas);
        if viewport != self.controller.state().viewport {
            self.dispatch(Action::Resize(viewport));
        }
    }

    fn dispatch(&mut self, action: Action) {
        let outcome = self.controller.dispatch(action, now_ms());
        self.apply(outcome);
    }

    fn apply(&mut self, outcome: Outcome) {
        if let Some(notice) = outcome.notices.last() {
            self.status = notice.clone();
        }
        if let Some(prompt) = outcome.prompts.into_iter().next() {
            self.mode = Mode::Prompt {
                prompt,
                field: FieldValue::new(""),
            };
        }
        if let Some(id) = &self.selected {
            if self.controller.journal().get(id).is_none() {
                self.selected = None;
            }
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if !matches!(self.mode, Mode::Normal) {
            return;
        }
        let time_ms = now_ms();
        let at = cell_to_point(self.canvas, &self.settings.canvas, mouse.column, mouse.row);
        let input = match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => PointerInput::Down {
                id: MOUSE_POINTER,
                at,
                time_ms,
            },
            MouseEventKind::Drag(MouseButton::Left) => PointerInput::Move {
                id: MOUSE_POINTER,
                at,
                time_ms,
            },
            MouseEventKind::Up(MouseButton::Left) => PointerInput::Up {
                id: MOUSE_POINTER,
                at,
                time_ms,
            },
            MouseEventKind::ScrollUp => {
                self.dispatch(Action::Zoom(ZoomDirection::In));
                return;
            }
            MouseEventKind::ScrollDown => {
                self.dispatch(Action::Zoom(ZoomDirection::Out));
                return;
            }
            _ => return,
        };
        let cells = &self.date_cells;
        let canvas = self.canvas;
        let cell = &self.settings.canvas;
        let hit = |p: Point| date_hit(cells, canvas, cell, p);
        let outcome = self.controller.pointer(input, &hit, today(), time_ms);
        self.apply(outcome);
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        let mode = std::mem::replace(&mut self.mode, Mode::Normal);
        match mode {
            Mode::Normal => return self.handle_normal_key(key),
            Mode::Prompt { prompt, field } => self.handle_prompt_key(key, prompt, field),
            Mode::Editing { id, field } => self.handle_edit_key(key, id, field),
            Mode::Picking { index } => self.handle_picker_key(key, index),
            Mode::Jump { field } => self.handle_jump_key(key, field),
            Mode::ConfirmDelete { id } => self.handle_confirm_key(key, id),
        }
        Ok(false)
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        let day_view = self.controller.state().nav.level == ViewLevel::Day;
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Up | KeyCode::Char('k') => self.dispatch(Action::Navigate(TimeDirection::Back)),
            KeyCode::Down | KeyCode::Char('j') => {
                self.dispatch(Action::Navigate(TimeDirection::Forward))
            }
            KeyCode::Left | KeyCode::Char('h') => self.dispatch(Action::Zoom(ZoomDirection::Out)),
            KeyCode::Right | KeyCode::Char('l') => self.dispatch(Action::Zoom(ZoomDirection::In)),
            KeyCode::Char(' ') | KeyCode::Char('t') => self.dispatch(Action::GoTo(today())),
            KeyCode::Char('g') => {
                self.mode = Mode::Jump {
                    field: FieldValue::new(&day_key(self.controller.state().nav.current)),
                }
            }
            KeyCode::Char('n') if day_view => self.mode = Mode::Picking { index: 0 },
            KeyCode::Tab if day_view => self.cycle_selection(),
            KeyCode::Esc => self.selected = None,
            KeyCode::Char('e') => self.start_edit(),
            KeyCode::Char('d') => {
                if let Some(id) = self.selected.clone() {
                    self.mode = Mode::ConfirmDelete { id };
                }
            }
            KeyCode::Enter | KeyCode::Char('s') => {
                if let Some(id) = self.selected.clone() {
                    self.dispatch(Action::Activate(id));
                }
            }
            KeyCode::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                self.toggle_selected_todo(index);
            }
            KeyCode::Char(c @ ('H' | 'J' | 'K' | 'L')) => {
                let (dx, dy) = match c {
                    'H' => (-self.settings.canvas.cell_width, 0.0),
                    'L' => (self.settings.canvas.cell_width, 0.0),
                    'K' => (0.0, -self.settings.canvas.cell_height),
                    _ => (0.0, self.settings.canvas.cell_height),
                };
                self.nudge_selected(dx, dy);
            }
            KeyCode::Char('x') => self.export_day(ExportFormat::Html),
            KeyCode::Char('X') => self.export_day(ExportFormat::Image),
            _ => {}
        }
        Ok(false)
    }

    fn handle_prompt_key(&mut self, key: KeyEvent, prompt: Prompt, mut field: FieldValue) {
        if key.code == KeyCode::Esc {
            self.status = "Canceled".into();
            return;
        }
        let multiline = matches!(prompt, Prompt::NoteText { .. });
        if field.edit(key, multiline) {
            let outcome = self.controller.complete(prompt, &field.value, now_ms());
            if outcome.notices.is_empty() && outcome.render {
                self.status = "Added".into();
            }
            self.apply(outcome);
        } else {
            self.mode = Mode::Prompt { prompt, field };
        }
    }

    fn handle_edit_key(&mut self, key: KeyEvent, id: ItemId, mut field: FieldValue) {
        if key.code == KeyCode::Esc {
            self.status = "Canceled".into();
            return;
        }
        if field.edit(key, true) {
            match self.controller.edit_note(&id, &field.value) {
                Ok(()) => self.status = format!("Updated {}", id),
                Err(err) => self.status = format!("Could not edit: {}", err),
            }
        } else {
            self.mode = Mode::Editing { id, field };
        }
    }

    fn handle_picker_key(&mut self, key: KeyEvent, index: usize) {
        let count = MenuAction::ALL.len();
        let chosen = match key.code {
            KeyCode::Esc => return,
            KeyCode::Up | KeyCode::Char('k') => {
                self.mode = Mode::Picking {
                    index: (index + count - 1) % count,
                };
                return;
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => {
                self.mode = Mode::Picking {
                    index: (index + 1) % count,
                };
                return;
            }
            KeyCode::Enter => index,
            KeyCode::Char(c @ '1'..='9') => c as usize - '1' as usize,
            _ => {
                self.mode = Mode::Picking { index };
                return;
            }
        };
        self.dispatch(Action::Create {
            action: MenuAction::ALL[chosen],
            anchor: None,
        });
    }

    fn handle_jump_key(&mut self, key: KeyEvent, mut field: FieldValue) {
        if key.code == KeyCode::Esc {
            return;
        }
        if !field.edit(key, false) {
            self.mode = Mode::Jump { field };
            return;
        }
        match crate::calendar::parse_day_key(&field.value) {
            Some(date) => self.dispatch(Action::GoTo(date)),
            None => {
                self.status = format!("Not a date (use YYYY-MM-DD): {}", field.value);
                self.mode = Mode::Jump { field };
            }
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent, id: ItemId) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                self.dispatch(Action::Delete(id.clone()));
                self.selected = None;
                self.status = format!("Deleted {}", id);
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete canceled".into();
            }
            _ => self.mode = Mode::ConfirmDelete { id },
        }
    }

    fn current_items(&self) -> Vec<&ContentItem> {
        let key = self.controller.state().day_key();
        self.controller.journal().items_for(&key)
    }

    fn cycle_selection(&mut self) {
        let ids: Vec<ItemId> = self.current_items().iter().map(|i| i.id.clone()).collect();
        if ids.is_empty() {
            self.selected = None;
            return;
        }
        let next = match &self.selected {
            Some(current) => ids
                .iter()
                .position(|id| id == current)
                .map(|pos| (pos + 1) % ids.len())
                .unwrap_or(0),
            None => 0,
        };
        self.selected = Some(ids[next].clone());
    }

    fn selected_item(&self) -> Option<&ContentItem> {
        self.selected
            .as_ref()
            .and_then(|id| self.controller.journal().get(id))
    }

    fn start_edit(&mut self) {
        let Some(item) = self.selected_item() else {
            self.status = "Select an item with Tab first".into();
            return;
        };
        let text = match &item.content {
            Content::Note(text) | Content::Ai(text) => text.clone(),
            Content::Todos(todos) => format_todo_lines(todos),
            _ => {
                self.status = format!("{} items have no text to edit", item.kind());
                return;
            }
        };
        self.mode = Mode::Editing {
            id: item.id.clone(),
            field: FieldValue::new(&text),
        };
    }

    fn toggle_selected_todo(&mut self, index: usize) {
        let Some(id) = self.selected.clone() else {
            return;
        };
        match self.controller.journal_mut().toggle_todo(&id, index) {
            Ok(done) => {
                self.status = format!("Task {} {}", index + 1, if done { "done" } else { "reopened" })
            }
            Err(err) => self.status = err.to_string(),
        }
    }

    fn nudge_selected(&mut self, dx: f64, dy: f64) {
        let Some(item) = self.selected_item() else {
            return;
        };
        let id = item.id.clone();
        let to = Point::new((item.x + dx).max(0.0), (item.y + dy).max(0.0));
        if let Err(err) = self.controller.journal_mut().update_position(&id, to) {
            self.status = err.to_string();
        }
    }

    fn export_day(&mut self, format: ExportFormat) {
        let date = self.controller.state().nav.current;
        let key = day_key(date);
        let now = now_ms() as i64;
        let journal = self.controller.journal_mut();
        // Only the cache is read here; the place name arrives in the background.
        let location = self
            .settings
            .location
            .map(|coords| cached_location(journal.db_mut(), coords, now));
        let items = journal.items_for(&key);
        let day = DayExport::new(date, &items, location);
        let target = self
            .location
            .exports_dir()
            .join(export::file_name(&key, format));
        let written = export::render(&day, format)
            .and_then(|document| export::write_file(&document, &target));
        self.status = match written {
            Ok(()) => {
                info!("event=export date={} format={}", key, format);
                format!("Exported to {}", target.display())
            }
            Err(err) => {
                warn!("event=export_failed date={} error={:#}", key, err);
                format!("Export failed: {:#}", err)
            }
        };
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = screen_layout(f.size());
        self.draw_header(f, layout[0]);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                self.controller.state().nav.header(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ));
        let inner = block.inner(layout[1]);
        f.render_widget(block, layout[1]);
        self.canvas = inner;
        self.date_cells.clear();
        match self.controller.state().nav.level {
            ViewLevel::Day => self.draw_day(f, inner),
            ViewLevel::Week => self.draw_week(f, inner),
            ViewLevel::Month => self.draw_month(f, inner),
            ViewLevel::Year => self.draw_year(f, inner),
        }
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::Prompt { prompt, field } => {
                let (title, label) = match prompt {
                    Prompt::NoteText { .. } => ("New Note", "Text"),
                    Prompt::MediaPath { kind, .. } => match kind {
                        ItemKind::Photo => ("Attach Photo", "File"),
                        ItemKind::Audio => ("Attach Audio", "File"),
                        _ => ("Attach Video", "File"),
                    },
                };
                let multiline = matches!(prompt, Prompt::NoteText { .. });
                self.draw_field_dialog(f, title, label, field, multiline);
            }
            Mode::Editing { field, .. } => self.draw_field_dialog(f, "Edit", "Text", field, true),
            Mode::Jump { field } => {
                self.draw_field_dialog(f, "Jump to Date", "YYYY-MM-DD", field, false)
            }
            Mode::Picking { index } => self.draw_picker(f, *index),
            Mode::ConfirmDelete { id } => self.draw_confirm(f, id),
            Mode::Normal => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let scope = match self.location.scope {
            StoreScope::Project => "project",
            StoreScope::Global => "global",
        };
        let nav = self.controller.state().nav;
        let title = Line::from(vec![
            Span::styled(
                "daybook ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(nav.period_key(), Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(
                if nav.is_today(today()) { " (now)" } else { "" },
                Style::default().fg(Color::Yellow),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("view {}", nav.level),
                Style::default().fg(Color::Magenta),
            ),
            Span::raw("  •  "),
            Span::styled(scope, Style::default().fg(Color::Green)),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", self.location.dir.display()),
                Style::default().fg(Color::DarkGray),
            ),
        ]);

        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_day(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let state = self.controller.state();
        let cell = &self.settings.canvas;
        let items = self.current_items();
        if items.is_empty() {
            let hint = Paragraph::new("Hold the mouse button on the canvas to add something")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray));
            f.render_widget(hint, area);
        }

        for item in &items {
            let dragging = state.drag.as_ref().filter(|d| d.id == item.id);
            let position = dragging.map(|d| d.item_position()).unwrap_or(item.position());
            let bounds = item.bounds();
            let Some(rect) = pixel_rect(area, cell, position, Size::new(bounds.width, bounds.height))
            else {
                continue;
            };
            let selected = self.selected.as_deref() == Some(item.id.as_str());
            let border = if dragging.is_some() {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else if selected {
                Style::default()
                    .fg(Color::LightYellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(shade_color(item.shade.value()))
            };
            let mut lines: Vec<Line<'static>> = item.render_lines().into_iter().map(Line::raw).collect();
            if let Content::Verse(verse) = &item.content {
                if verse.read {
                    lines.push(Line::styled("✓ read", Style::default().fg(Color::Green)));
                }
            }
            let card = Paragraph::new(lines)
                .wrap(Wrap { trim: true })
                .style(Style::default().fg(Color::Gray))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(border)
                        .title(format!("{} {}", item.kind().icon(), item.title)),
                );
            f.render_widget(Clear, rect);
            f.render_widget(card, rect);
        }

        if let Some(drag) = &state.drag {
            let trash = state.trash.rect;
            if let Some(rect) = pixel_rect(
                area,
                cell,
                Point::new(trash.x, trash.y),
                Size::new(trash.width, trash.height),
            ) {
                let style = if drag.over_trash {
                    Style::default().bg(Color::Red).fg(Color::White)
                } else {
                    Style::default().fg(Color::LightRed)
                };
                let bin = Paragraph::new("🗑 drop to delete")
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .style(style)
                    .block(Block::default().borders(Borders::ALL).border_style(style));
                f.render_widget(Clear, rect);
                f.render_widget(bin, rect);
            }
        }

        if let Some(anchor) = state.menu.anchor() {
            let armed = state.menu.armed();
            for (action, position) in state.menu.option_positions() {
                let style = if armed == Some(action) {
                    Style::default()
                        .bg(Color::Magenta)
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White).bg(Color::Rgb(40, 40, 60))
                };
                label_at(f, area, cell, position, &format!("{} {}", action.icon(), action.label()), style);
            }
            label_at(f, area, cell, state.menu.pointer(), "◆", Style::default().fg(Color::Cyan));
            label_at(
                f,
                area,
                cell,
                anchor,
                "✚",
                Style::default().fg(Color::LightMagenta).add_modifier(Modifier::BOLD),
            );
        }
    }

    fn draw_week(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let nav = self.controller.state().nav;
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, 7); 7])
            .split(area);
        let today = today();
        let mut cells = Vec::new();
        for (date, column) in nav.week_dates().into_iter().zip(columns.iter().copied()) {
            let items = self.controller.journal().items_for(&day_key(date));
            let width = column.width.saturating_sub(4) as usize;
            let list: Vec<ListItem<'static>> = items
                .iter()
                .map(|item| {
                    ListItem::new(truncate_chars(&item.preview(), width))
                        .style(Style::default().fg(shade_color(item.shade.value())))
                })
                .collect();
            let style = date_style(date, nav.current, today, true);
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(style)
                .title(Span::styled(date.format("%a %-d").to_string(), style));
            f.render_widget(List::new(list).block(block), column);
            cells.push((column, date));
        }
        self.date_cells = cells;
    }

    fn draw_month(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let nav = self.controller.state().nav;
        let grid = nav.month_grid();
        let weeks = (grid.len() / 7).max(1);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(
                std::iter::once(Constraint::Length(1))
                    .chain(std::iter::repeat(Constraint::Ratio(1, weeks as u32)).take(weeks))
                    .collect::<Vec<_>>(),
            )
            .split(area);

        let headings = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];
        let heading_cells = week_columns(rows[0]);
        for (heading, rect) in headings.iter().zip(heading_cells.iter()) {
            f.render_widget(
                Paragraph::new(*heading)
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(Color::Gray)),
                *rect,
            );
        }

        let today = today();
        let mut cells = Vec::new();
        for (week, row) in grid.chunks(7).zip(rows.iter().skip(1)) {
            for (day, rect) in week.iter().zip(week_columns(*row).iter().copied()) {
                let count = self.controller.journal().items_for(&day_key(day.date)).len();
                let style = date_style(day.date, nav.current, today, day.is_current_month);
                let mut lines = vec![Line::styled(format!("{:>2}", day.date.day()), style)];
                if count > 0 {
                    lines.push(Line::styled(
                        format!("• {}", count),
                        Style::default().fg(Color::LightYellow),
                    ));
                }
                f.render_widget(
                    Paragraph::new(lines).alignment(Alignment::Center).block(
                        Block::default()
                            .borders(Borders::ALL)
                            .border_style(Style::default().fg(Color::DarkGray)),
                    ),
                    rect,
                );
                cells.push((rect, day.date));
            }
        }
        self.date_cells = cells;
    }

    fn draw_year(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let nav = self.controller.state().nav;
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Ratio(1, 3); 3])
            .split(area);
        let mut cells = Vec::new();
        let months = nav.year_months();
        for (chunk, row) in months.chunks(4).zip(rows.iter()) {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(vec![Constraint::Ratio(1, 4); 4])
                .split(*row);
            for (month, rect) in chunk.iter().zip(columns.iter().copied()) {
                let key = month_key(*month);
                let items = self
                    .controller
                    .journal()
                    .db()
                    .items_in_range(&format!("{}-01", key), &format!("{}-31", key));
                let mut days: Vec<&str> = items.iter().map(|i| i.date.as_str()).collect();
                days.dedup();
                let current = month.month() == nav.current.month();
                let style = if current {
                    Style::default()
                        .fg(Color::LightCyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                };
                let body = vec![
                    Line::raw(format!("{} entries", items.len())),
                    Line::styled(
                        format!("{} days", days.len()),
                        Style::default().fg(Color::DarkGray),
                    ),
                ];
                f.render_widget(
                    Paragraph::new(body).alignment(Alignment::Center).block(
                        Block::default()
                            .borders(Borders::ALL)
                            .border_style(style)
                            .title(Span::styled(month.format("%B").to_string(), style)),
                    ),
                    rect,
                );
                cells.push((rect, *month));
            }
        }
        self.date_cells = cells;
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[1]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, bottom[0]);

        let detail = Paragraph::new(self.detail_line())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray))
                    .title("Selected"),
            );
        f.render_widget(detail, bottom[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let mut spans = vec![
            Span::styled("↑↓", Style::default().fg(Color::LightCyan)),
            Span::raw(" period  "),
            Span::styled("←→", Style::default().fg(Color::LightCyan)),
            Span::raw(" zoom  "),
            Span::styled("space", Style::default().fg(Color::LightCyan)),
            Span::raw(" today  "),
            Span::styled("g", Style::default().fg(Color::LightCyan)),
            Span::raw(" jump  "),
        ];
        if self.controller.state().nav.level == ViewLevel::Day {
            spans.extend([
                Span::styled("n", Style::default().fg(Color::LightMagenta)),
                Span::raw(" new  "),
                Span::styled("Tab", Style::default().fg(Color::LightCyan)),
                Span::raw(" select  "),
                Span::styled("e", Style::default().fg(Color::LightYellow)),
                Span::raw(" edit  "),
                Span::styled("HJKL", Style::default().fg(Color::LightGreen)),
                Span::raw(" move  "),
                Span::styled("d", Style::default().fg(Color::LightRed)),
                Span::raw(" delete  "),
                Span::styled("x/X", Style::default().fg(Color::LightGreen)),
                Span::raw(" export  "),
            ]);
        } else {
            spans.extend([
                Span::styled("click", Style::default().fg(Color::LightYellow)),
                Span::raw(" open  "),
            ]);
        }
        spans.extend([
            Span::styled("q", Style::default().fg(Color::LightRed)),
            Span::raw(" quit"),
        ]);
        Line::from(spans)
    }

    fn detail_line(&self) -> Line<'static> {
        let state = self.controller.state();
        if state.menu.is_active() {
            let armed = state
                .menu
                .armed()
                .map(|action| format!("{} {}", action.icon(), action.label()))
                .unwrap_or_else(|| "move away to choose".to_string());
            return Line::from(vec![
                Span::styled(armed, Style::default().fg(Color::LightMagenta)),
                Span::styled(
                    format!("  {:.0}px", state.menu.distance()),
                    Style::default().fg(Color::DarkGray),
                ),
            ]);
        }
        if state.nav.level == ViewLevel::Day && self.controller.press_phase() == PressPhase::Tracking {
            return Line::from(Span::styled(
                "keep holding to open the menu",
                Style::default().fg(Color::DarkGray),
            ));
        }
        match self.selected_item() {
            Some(item) => Line::from(vec![
                Span::styled(
                    format!("{} {}", item.kind().icon(), item.title),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw("  "),
                Span::styled(
                    item.preview(),
                    Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
                ),
            ]),
            None => Line::from(Span::styled(
                format!("{} items today", self.current_items().len()),
                Style::default().fg(Color::DarkGray),
            )),
        }
    }

    fn draw_field_dialog(
        &self,
        f: &mut ratatui::Frame<'_>,
        title: &str,
        label: &str,
        field: &FieldValue,
        multiline: bool,
    ) {
        let area = centered_rect(70, if multiline { 60 } else { 25 }, f.size());
        let mut lines = field_lines(label, field);
        lines.push(Line::from(Span::styled(
            if multiline {
                "Ctrl+Enter to save • Esc to cancel • Enter adds a newline"
            } else {
                "Enter to confirm • Esc to cancel"
            },
            Style::default().fg(Color::Gray),
        )));
        let dialog = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(Span::styled(
                        title.to_string(),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_picker(&self, f: &mut ratatui::Frame<'_>, index: usize) {
        let area = centered_rect(40, 50, f.size());
        let items: Vec<ListItem<'static>> = MenuAction::ALL
            .iter()
            .enumerate()
            .map(|(i, action)| {
                let text = format!("{} {} {}", i + 1, action.icon(), action.label());
                let style = if i == index {
                    Style::default()
                        .bg(Color::LightCyan)
                        .fg(Color::Black)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                };
                ListItem::new(text).style(style)
            })
            .collect();
        let list = List::new(items).block(
            Block::default()
                .title(Span::styled(
                    "Add",
                    Style::default()
                        .fg(Color::LightMagenta)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightMagenta)),
        );
        f.render_widget(Clear, area);
        f.render_widget(list, area);
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, id: &str) {
        let area = centered_rect(50, 30, f.size());
        let title = self
            .controller
            .journal()
            .get(id)
            .map(|item| format!("{} {}", item.kind().icon(), item.title))
            .unwrap_or_else(|| id.to_string());
        let body = vec![
            Line::from(Span::styled(
                format!("Delete \"{}\"?", title),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    "Confirm Delete",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn screen_layout(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(4),
        ])
        .split(area)
}

/// Inner canvas area for a screen, before the first frame is drawn.
fn canvas_area(screen: Rect) -> Rect {
    Block::default()
        .borders(Borders::ALL)
        .inner(screen_layout(screen)[1])
}

fn viewport_size(canvas: Rect, cell: &CanvasSettings) -> Size {
    Size::new(
        f64::from(canvas.width) * cell.cell_width,
        f64::from(canvas.height) * cell.cell_height,
    )
}

/// Pixel position of the centre of a terminal cell, relative to the canvas.
fn cell_to_point(canvas: Rect, cell: &CanvasSettings, column: u16, row: u16) -> Point {
    Point::new(
        (f64::from(column) - f64::from(canvas.x) + 0.5) * cell.cell_width,
        (f64::from(row) - f64::from(canvas.y) + 0.5) * cell.cell_height,
    )
}

fn point_to_cell(canvas: Rect, cell: &CanvasSettings, p: Point) -> (i32, i32) {
    (
        i32::from(canvas.x) + (p.x / cell.cell_width).floor() as i32,
        i32::from(canvas.y) + (p.y / cell.cell_height).floor() as i32,
    )
}

/// Terminal rect covering a pixel box, clipped to the canvas.
fn pixel_rect(canvas: Rect, cell: &CanvasSettings, at: Point, size: Size) -> Option<Rect> {
    let (x0, y0) = point_to_cell(canvas, cell, at);
    let width = (size.width / cell.cell_width).ceil().max(3.0) as i32;
    let height = (size.height / cell.cell_height).ceil().max(3.0) as i32;
    let left = x0.max(i32::from(canvas.x));
    let top = y0.max(i32::from(canvas.y));
    let right = (x0 + width).min(i32::from(canvas.x) + i32::from(canvas.width));
    let bottom = (y0 + height).min(i32::from(canvas.y) + i32::from(canvas.height));
    if right <= left || bottom <= top {
        return None;
    }
    Some(Rect::new(
        left as u16,
        top as u16,
        (right - left) as u16,
        (bottom - top) as u16,
    ))
}

fn label_at(
    f: &mut ratatui::Frame<'_>,
    canvas: Rect,
    cell: &CanvasSettings,
    at: Point,
    text: &str,
    style: Style,
) {
    let width = text.chars().count() as f64 + 1.0;
    let size = Size::new(width * cell.cell_width, cell.cell_height);
    let (x, y) = point_to_cell(canvas, cell, at);
    let inside = x >= i32::from(canvas.x)
        && y >= i32::from(canvas.y)
        && y < i32::from(canvas.y) + i32::from(canvas.height);
    if !inside {
        return;
    }
    if let Some(mut rect) = pixel_rect(canvas, cell, at, size) {
        rect.height = 1;
        f.render_widget(Paragraph::new(Span::styled(text.to_string(), style)), rect);
    }
}

fn date_hit(cells: &[(Rect, NaiveDate)], canvas: Rect, cell: &CanvasSettings, p: Point) -> Hit {
    let (x, y) = point_to_cell(canvas, cell, p);
    cells
        .iter()
        .find(|(rect, _)| {
            x >= i32::from(rect.x)
                && x < i32::from(rect.x) + i32::from(rect.width)
                && y >= i32::from(rect.y)
                && y < i32::from(rect.y) + i32::from(rect.height)
        })
        .map(|(_, date)| Hit::Date(*date))
        .unwrap_or(Hit::Empty)
}

fn week_columns(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Ratio(1, 7); 7])
        .split(area)
}

fn date_style(date: NaiveDate, current: NaiveDate, today: NaiveDate, in_month: bool) -> Style {
    let mut style = Style::default().fg(if in_month { Color::Gray } else { Color::DarkGray });
    if date == today {
        style = style.fg(Color::LightGreen).add_modifier(Modifier::BOLD);
    }
    if date == current {
        style = style.fg(Color::LightCyan).add_modifier(Modifier::BOLD);
    }
    style
}

fn shade_color(shade: u8) -> Color {
    let palette = [
        Color::Gray,
        Color::LightYellow,
        Color::LightGreen,
        Color::LightMagenta,
        Color::LightBlue,
        Color::LightRed,
    ];
    palette[usize::from(shade) % palette.len()]
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn prev_char(cursor: usize, text: &str) -> usize {
    if cursor == 0 {
        return 0;
    }
    let mut prev = 0;
    for (idx, _) in text.char_indices() {
        if idx >= cursor {
            break;
        }
        prev = idx;
    }
    prev
}

fn next_char(cursor: usize, text: &str) -> usize {
    for (idx, ch) in text.char_indices() {
        if idx > cursor {
            return idx;
        }
        if idx == cursor {
            return cursor + ch.len_utf8();
        }
    }
    text.len()
}

fn field_lines(label: &str, field: &FieldValue) -> Vec<Line<'static>> {
    let label_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value_style = Style::default().fg(Color::Cyan);
    let prefix = format!("{}: ", label);
    let spacer = " ".repeat(prefix.chars().count());
    let text = field.with_caret();
    text.split('\n')
        .enumerate()
        .map(|(idx, line)| {
            Line::from(vec![
                Span::styled(
                    if idx == 0 {
                        prefix.clone()
                    } else {
                        spacer.clone()
                    },
                    label_style,
                ),
                Span::styled(line.to_string(), value_style),
            ])
        })
        .collect()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells() -> CanvasSettings {
        CanvasSettings::default()
    }

    #[test]
    fn cell_centres_map_to_pixels() {
        let canvas = Rect::new(1, 4, 80, 20);
        let p = cell_to_point(canvas, &cells(), 11, 6);
        assert_eq!(p, Point::new(84.0, 40.0));
        assert_eq!(point_to_cell(canvas, &cells(), p), (11, 6));
    }

    #[test]
    fn pixel_rect_clips_to_canvas() {
        let canvas = Rect::new(0, 0, 40, 10);
        let rect = pixel_rect(canvas, &cells(), Point::new(280.0, 120.0), Size::new(200.0, 150.0))
            .unwrap();
        assert_eq!(rect, Rect::new(35, 7, 5, 3));
        assert!(pixel_rect(canvas, &cells(), Point::new(400.0, 0.0), Size::new(80.0, 80.0)).is_none());
    }

    #[test]
    fn date_hit_finds_calendar_cell() {
        let canvas = Rect::new(0, 0, 70, 20);
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let cells_drawn = vec![(Rect::new(10, 0, 10, 20), date)];
        let inside = cell_to_point(canvas, &cells(), 12, 3);
        let outside = cell_to_point(canvas, &cells(), 2, 3);
        assert_eq!(date_hit(&cells_drawn, canvas, &cells(), inside), Hit::Date(date));
        assert_eq!(date_hit(&cells_drawn, canvas, &cells(), outside), Hit::Empty);
    }

    #[test]
    fn field_editing_submits_on_enter_when_single_line() {
        let mut field = FieldValue::new("2026-10-1");
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert!(!field.edit(key(KeyCode::Char('9')), false));
        assert_eq!(field.value, "2026-10-19");
        field.move_left();
        field.backspace();
        assert_eq!(field.value, "2026-10-9");
        assert!(field.edit(key(KeyCode::Enter), false));
        let mut note = FieldValue::new("a");
        assert!(!note.edit(key(KeyCode::Enter), true));
        assert_eq!(note.value, "a\n");
    }
}
