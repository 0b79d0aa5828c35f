//! Ratatui-based terminal form.
//!
//! One row per editable field, grouped by calibration step, followed by the
//! object frames and the save path. A file picker overlay lists FITS frames
//! discovered under the working directory.

use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::warn;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use crate::cli::picker::{discover_fits_files, pretty_path};
use crate::domain::Form;
use crate::error::AppError;
use crate::io::resolve_save_path;

pub mod form;

use form::{Field, FormEditor, PickMode};

/// Width of the step-name column.
const LABEL_WIDTH: usize = 14;

/// Start the TUI, optionally loading `config` first.
pub fn run(config: Option<PathBuf>, root: PathBuf, depth: usize) -> Result<(), AppError> {
    let mut app = App::new(config, root, depth);

    let _guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// File picker overlay state.
struct Picker {
    files: Vec<PathBuf>,
    cursor: usize,
    marked: BTreeSet<usize>,
    mode: PickMode,
}

impl Picker {
    fn chosen(&self) -> Vec<PathBuf> {
        if self.marked.is_empty() {
            return self.files.get(self.cursor).cloned().into_iter().collect();
        }
        self.marked.iter().filter_map(|&i| self.files.get(i).cloned()).collect()
    }
}

struct App {
    editor: FormEditor,
    picker: Option<Picker>,
    root: PathBuf,
    depth: usize,
    status: String,
}

impl App {
    fn new(config: Option<PathBuf>, root: PathBuf, depth: usize) -> Self {
        let mut app = Self {
            editor: FormEditor::new(Form::new()),
            picker: None,
            root,
            depth,
            status: "Ready.".to_string(),
        };

        if let Some(path) = config {
            if path.exists() {
                app.load(path);
            } else {
                app.status = format!("New config: {}", path.display());
                app.editor.form.save_path = Some(path);
            }
        }
        app
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns true when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        if self.picker.is_some() {
            self.handle_picker_key(code);
            return false;
        }
        if self.editor.edit_buffer().is_some() {
            self.handle_edit_key(code);
            return false;
        }

        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Up => self.editor.select_prev(),
            KeyCode::Down => self.editor.select_next(),
            KeyCode::Left => self.horizontal(-1),
            KeyCode::Right => self.horizontal(1),
            KeyCode::Char(' ') => self.toggle(),
            KeyCode::Enter => {
                if !self.editor.begin_edit() {
                    self.toggle();
                } else {
                    self.status = "Editing. Enter to apply, Esc to cancel.".to_string();
                }
            }
            KeyCode::Char('f') => self.open_picker(),
            KeyCode::Char('s') => self.save(),
            KeyCode::Char('l') => {
                let path = resolve_save_path(self.editor.form.save_path.as_deref());
                self.load(path);
            }
            _ => {}
        }
        false
    }

    fn handle_edit_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.editor.cancel_edit();
                self.status = "Edit canceled.".to_string();
            }
            KeyCode::Enter => {
                self.status = match self.editor.commit_edit() {
                    Ok(()) => self.applied(format!("{} updated.", self.editor.selected().label())),
                    Err(err) => err.to_string(),
                };
            }
            KeyCode::Backspace => self.editor.pop_char(),
            KeyCode::Char(c) => self.editor.push_char(c),
            _ => {}
        }
    }

    fn handle_picker_key(&mut self, code: KeyCode) {
        let Some(picker) = &mut self.picker else {
            return;
        };
        match code {
            KeyCode::Esc => {
                self.picker = None;
                self.status = "Picker closed.".to_string();
            }
            KeyCode::Up => picker.cursor = picker.cursor.saturating_sub(1),
            KeyCode::Down => {
                if picker.cursor + 1 < picker.files.len() {
                    picker.cursor += 1;
                }
            }
            KeyCode::Char(' ') if picker.mode == PickMode::OpenMany => {
                if !picker.marked.remove(&picker.cursor) {
                    picker.marked.insert(picker.cursor);
                }
            }
            KeyCode::Enter => {
                let chosen = picker.chosen();
                self.picker = None;
                self.status = match self.editor.apply_picked(&chosen) {
                    Ok(()) => self.applied(format!("Picked {} file(s).", chosen.len())),
                    Err(err) => err.to_string(),
                };
            }
            _ => {}
        }
    }

    /// Status line after a row changed, with the first input-file warning.
    fn applied(&self, done: String) -> String {
        let warnings = self.editor.input_warnings(self.editor.selected());
        match warnings.first() {
            Some(first) if warnings.len() > 1 => format!("{done} Warning: {first} (+{} more)", warnings.len() - 1),
            Some(first) => format!("{done} Warning: {first}"),
            None => done,
        }
    }

    fn horizontal(&mut self, delta: isize) {
        match self.editor.selected() {
            Field::Mode(_) => self.toggle(),
            Field::Dependencies(_) | Field::ObjectDependencies => self.editor.move_dep_cursor(delta),
            _ => {}
        }
    }

    fn toggle(&mut self) {
        let field = self.editor.selected();
        let result = match field {
            Field::Mode(kind) => self
                .editor
                .toggle_mode()
                .map(|m| m.map(|m| format!("{}: {}", kind.display_name(), m.display_name()))),
            _ => self.editor.toggle_dependency().map(|t| {
                t.map(|(dep, on)| format!("{} {}", dep.short_label(), if on { "applied" } else { "removed" }))
            }),
        };
        match result {
            Ok(Some(msg)) => self.status = msg,
            Ok(None) => {}
            Err(err) => self.status = err.to_string(),
        }
    }

    fn open_picker(&mut self) {
        let field = self.editor.selected();
        let Some(mode) = field.pick_mode() else {
            self.status = "No file to pick on this row.".to_string();
            return;
        };
        if !self.editor.is_enabled(field) {
            self.status = "Row is disabled in the current mode.".to_string();
            return;
        }
        let files = discover_fits_files(&self.root, self.depth);
        if files.is_empty() {
            self.status = format!("No .fits files under {}. Type a path with Enter.", self.root.display());
            return;
        }
        self.picker = Some(Picker {
            files,
            cursor: 0,
            marked: BTreeSet::new(),
            mode,
        });
        self.status = match mode {
            PickMode::OpenMany => "Space to mark, Enter to pick, Esc to cancel.".to_string(),
            _ => "Enter to pick, Esc to cancel.".to_string(),
        };
    }

    fn save(&mut self) {
        self.status = match crate::app::pipeline::save_form(&self.editor.form) {
            Ok(path) => format!("Saved {}", path.display()),
            Err(err) => {
                warn!("save failed: {err}");
                format!("Save failed: {err}")
            }
        };
    }

    fn load(&mut self, path: PathBuf) {
        self.status = match crate::app::pipeline::load_form(&path) {
            Ok(form) => {
                self.editor.replace_form(form);
                format!("Loaded {}", path.display())
            }
            Err(err) => {
                warn!("load failed: {err}");
                format!("Load failed: {err}")
            }
        };
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_form(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);

        if self.picker.is_some() {
            self.draw_picker(frame, centered(size, 70, 60));
        }
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let target = resolve_save_path(self.editor.form.save_path.as_deref());
        let line = Line::from(vec![
            Span::styled("tdsr", Style::default().fg(Color::Cyan)),
            Span::raw(" reduction config | "),
            Span::styled(
                format!("save target: {}", target.display()),
                Style::default().fg(Color::Gray),
            ),
        ]);
        let p = Paragraph::new(Text::from(line)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_form(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = self
            .editor
            .fields()
            .iter()
            .enumerate()
            .map(|(i, &field)| ListItem::new(self.row_line(i, field)))
            .collect();

        let list = List::new(items)
            .block(Block::default().title("Calibrations").borders(Borders::ALL))
            .highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        state.select(Some(self.editor.selected_index()));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn row_line(&self, index: usize, field: Field) -> Line<'static> {
        let enabled = self.editor.is_enabled(field);
        let base = if enabled {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let selected = index == self.editor.selected_index();

        let group = match field {
            Field::Mode(kind) => kind.display_name(),
            Field::ObjectFrames => "Object",
            Field::SavePath => "Config",
            _ => "",
        };
        let mut spans = vec![
            Span::styled(
                format!("{group:<LABEL_WIDTH$}"),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("{:<15}", field.label()), base),
        ];

        let options = field.dependency_options();
        if !options.is_empty() {
            for (j, &dep) in options.iter().enumerate() {
                let mark = if self.editor.is_checked(field, dep) { "[x]" } else { "[ ]" };
                let mut style = base;
                if selected && j == self.editor.dep_cursor() {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                spans.push(Span::styled(format!("{mark} {}", dep.short_label()), style));
                spans.push(Span::raw(" "));
            }
            return Line::from(spans);
        }

        let value = match (selected, self.editor.edit_buffer()) {
            (true, Some(buf)) => {
                spans.push(Span::styled(
                    format!("{buf}_"),
                    Style::default().fg(Color::Yellow),
                ));
                return Line::from(spans);
            }
            _ => self.editor.field_text(field),
        };

        let value = match field {
            Field::Mode(_) => format!("< {value} >"),
            Field::SavePath if value.is_empty() => "(last_config.yaml)".to_string(),
            _ if value.is_empty() => "-".to_string(),
            _ => value,
        };
        spans.push(Span::styled(value, base));
        Line::from(spans)
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ select  ←/→ mode/cursor  Space toggle  Enter edit  f pick  s save  l load  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_picker(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let Some(picker) = &self.picker else {
            return;
        };
        let items: Vec<ListItem> = picker
            .files
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let mark = match picker.mode {
                    PickMode::OpenMany if picker.marked.contains(&i) => "[x] ",
                    PickMode::OpenMany => "[ ] ",
                    _ => "",
                };
                ListItem::new(format!("{mark}{}", pretty_path(path)))
            })
            .collect();

        let title = match picker.mode {
            PickMode::Open => "Open FITS file",
            PickMode::OpenMany => "Open FITS files",
            PickMode::Save => "Write to FITS file",
        };
        let list = List::new(items)
            .block(Block::default().title(title).borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        state.select(Some(picker.cursor));
        frame.render_widget(Clear, area);
        frame.render_stateful_widget(list, area, &mut state);
    }
}

/// A rectangle covering `pct_x`/`pct_y` percent of `area`, centered.
fn centered(area: Rect, pct_x: u16, pct_y: u16) -> Rect {
    let width = area.width * pct_x / 100;
    let height = area.height * pct_y / 100;
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
