// 🖥️ Staging Screen - files ready to load, files already loaded, messages
// Redraws from the session after every key press

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;
use tabular_ingest::{
    normalize_dropped_path, CategoryMismatch, IngestError, RecordStore, RejectionPolicy, Session,
    VERSION,
};

/// Lines in the message panel; one action never emits more than this
const MAX_MESSAGES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    /// Typing (or pasting a dropped) path to stage
    AddPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Info(String),
    Error(String),
}

pub struct App<S> {
    pub session: Session<S>,
    pub staged_state: TableState,
    pub mode: Mode,
    pub input: String,
    pub messages: Vec<Message>,
    pub export_path: PathBuf,
}

impl<S: RecordStore> App<S> {
    pub fn new(session: Session<S>, export_path: PathBuf) -> Self {
        Self {
            session,
            staged_state: TableState::default(),
            mode: Mode::Normal,
            input: String::new(),
            messages: Vec::new(),
            export_path,
        }
    }

    fn info(&mut self, text: impl Into<String>) {
        self.push_message(Message::Info(text.into()));
    }

    fn error(&mut self, text: impl Into<String>) {
        self.push_message(Message::Error(text.into()));
    }

    fn push_message(&mut self, message: Message) {
        self.messages.push(message);
        if self.messages.len() > MAX_MESSAGES {
            let overflow = self.messages.len() - MAX_MESSAGES;
            self.messages.drain(..overflow);
        }
    }

    /// Clamp the selection to the freshly rendered staged list
    fn sync_selection(&mut self) {
        let len = self.session.staged().len();
        let selected = match (self.staged_state.selected(), len) {
            (_, 0) => None,
            (Some(i), _) => Some(i.min(len - 1)),
            (None, _) => Some(0),
        };
        self.staged_state.select(selected);
    }

    pub fn add_path(&mut self, raw: &str) {
        let Some(path) = normalize_dropped_path(raw) else {
            return;
        };

        match self.session.add_file(path) {
            Ok(()) => {
                let last = self.session.staged().len() - 1;
                self.staged_state.select(Some(last));
            }
            Err(e) => self.error(e.to_string()),
        }
        self.sync_selection();
    }

    pub fn delete_selected(&mut self) {
        if let Some(i) = self.staged_state.selected() {
            if let Err(e) = self.session.remove_file(i) {
                self.error(e.to_string());
            }
        }
        self.sync_selection();
    }

    pub fn cycle_category(&mut self, forward: bool) {
        let Some(i) = self.staged_state.selected() else {
            return;
        };
        let Some(current) = self.session.staged().get(i).map(|e| e.declared_category) else {
            return;
        };

        let next = if forward { current.next() } else { current.previous() };
        if let Err(e) = self.session.set_category(i, next) {
            self.error(e.to_string());
        }
    }

    /// One error per rejected file, folding the tail into a single line when
    /// the panel would otherwise scroll part of the batch away
    fn report_mismatches(&mut self, mismatches: &[CategoryMismatch], reserved: usize) {
        let room = MAX_MESSAGES.saturating_sub(reserved).max(1);
        if mismatches.len() <= room {
            for m in mismatches {
                self.error(format!("{}. Please try again.", m));
            }
            return;
        }

        let (shown, folded) = mismatches.split_at(room - 1);
        for m in shown {
            self.error(format!("{}. Please try again.", m));
        }
        let names: Vec<String> = folded.iter().map(mismatch_file_name).collect();
        self.error(format!(
            "{} more files did not match their type: {}. Please try again.",
            folded.len(),
            names.join(", ")
        ));
    }

    pub fn commit(&mut self) {
        match self.session.commit_all() {
            Ok(report) => {
                self.report_mismatches(&report.mismatches, 1);
                if report.is_clean() {
                    self.info("All files uploaded successfully!");
                } else {
                    self.info("All valid files uploaded successfully!");
                }
            }
            Err(IngestError::NothingValidated { mismatches }) => {
                self.report_mismatches(&mismatches.0, 0);
            }
            Err(e) => {
                if let IngestError::Record { mismatches, .. } = &e {
                    self.report_mismatches(&mismatches.0, 1);
                }
                self.error(e.to_string());
            }
        }
        self.sync_selection();
    }

    fn rejection_label(&self) -> &'static str {
        match self.session.policy() {
            RejectionPolicy::DiscardRejected => "rejects discarded",
            RejectionPolicy::RetainRejected => "rejects kept",
        }
    }

    pub fn export(&mut self) {
        let destination = self.export_path.clone();
        match self.session.export(&destination) {
            Ok(()) => self.info(format!(
                "All files exported successfully to {}",
                destination.display()
            )),
            Err(e) => self.error(e.to_string()),
        }
    }

    pub fn next(&mut self) {
        let len = self.session.staged().len();
        if len == 0 {
            return;
        }
        let i = match self.staged_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.staged_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.session.staged().len();
        if len == 0 {
            return;
        }
        let i = match self.staged_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.staged_state.select(Some(i));
    }
}

/// Take over the terminal for the key loop and always hand it back
pub fn run_ui<S: RecordStore>(app: &mut App<S>) -> Result<()> {
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let outcome = run_app(&mut terminal, app);
    let restored = restore_terminal(&mut terminal);

    outcome?;
    restored
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend, S: RecordStore>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.mode {
            Mode::AddPath => match key.code {
                KeyCode::Enter => {
                    let raw = std::mem::take(&mut app.input);
                    app.mode = Mode::Normal;
                    app.add_path(&raw);
                }
                KeyCode::Esc => {
                    app.input.clear();
                    app.mode = Mode::Normal;
                }
                KeyCode::Backspace => {
                    app.input.pop();
                }
                KeyCode::Char(c) => app.input.push(c),
                _ => {}
            },
            Mode::Normal => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('a') => app.mode = Mode::AddPath,
                KeyCode::Char('d') | KeyCode::Delete => app.delete_selected(),
                KeyCode::Right | KeyCode::Char('l') => app.cycle_category(true),
                KeyCode::Left | KeyCode::Char('h') => app.cycle_category(false),
                KeyCode::Char('c') => app.commit(),
                KeyCode::Char('e') => app.export(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                _ => {}
            },
        }
    }
}

fn ui<S: RecordStore>(f: &mut Frame, app: &mut App<S>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                        // Header
            Constraint::Min(6),                           // Files ready to load
            Constraint::Percentage(30),                   // Files already loaded
            Constraint::Length(MAX_MESSAGES as u16 + 2),  // Messages
            Constraint::Length(3),                        // Status bar / input
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_staged(f, chunks[1], app);
    render_committed(f, chunks[2], app);
    render_messages(f, chunks[3], app);
    render_status_bar(f, chunks[4], app);
}

fn render_header<S: RecordStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let mode = if app.session.store().validator().is_some() {
        Span::styled("validating", Style::default().fg(Color::Green))
    } else {
        Span::styled("recording only", Style::default().fg(Color::Yellow))
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!("Upload Files v{}", VERSION),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Staged: {}", app.session.staged().len()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Loaded: {}", app.session.committed().len()),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  |  "),
        mode,
        Span::raw(", "),
        Span::styled(app.rejection_label(), Style::default().fg(Color::DarkGray)),
    ]))
    .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_staged<S: RecordStore>(f: &mut Frame, area: Rect, app: &mut App<S>) {
    let header = Row::new(["File", "Type", "Rows"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    }))
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows: Vec<Row> = app
        .session
        .staged()
        .iter()
        .map(|entry| {
            Row::new(vec![
                Cell::from(truncate(&entry.display_name(), 48)),
                Cell::from(format!("◀ {} ▶", entry.declared_category))
                    .style(Style::default().fg(Color::Cyan)),
                Cell::from(entry.rows.to_string()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [Constraint::Min(20), Constraint::Length(12), Constraint::Length(8)],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Files ready to Load "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.staged_state);
}

fn render_committed<S: RecordStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let rows: Vec<Row> = app
        .session
        .committed()
        .iter()
        .map(|entry| {
            Row::new(vec![
                Cell::from(truncate(&entry.display_name(), 48)),
                Cell::from(entry.category.to_string()),
                Cell::from(format!(
                    "{} new / {} dup",
                    entry.summary.rows_recorded, entry.summary.duplicates_skipped
                )),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [Constraint::Min(20), Constraint::Length(12), Constraint::Length(20)],
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green))
            .title(" Files Already Loaded "),
    );

    f.render_widget(table, area);
}

fn render_messages<S: RecordStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let lines: Vec<Line> = app
        .messages
        .iter()
        .map(|m| match m {
            Message::Info(text) => Line::from(Span::styled(text.clone(), Style::default().fg(Color::Green))),
            Message::Error(text) => Line::from(Span::styled(text.clone(), Style::default().fg(Color::Red))),
        })
        .collect();

    let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Messages "));
    f.render_widget(panel, area);
}

fn render_status_bar<S: RecordStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let line = match app.mode {
        Mode::AddPath => Line::from(vec![
            Span::styled(" Path: ", Style::default().fg(Color::Yellow)),
            Span::raw(app.input.as_str()),
            Span::styled("█", Style::default().fg(Color::Yellow)),
            Span::styled("  (Enter stage, Esc cancel)", Style::default().fg(Color::DarkGray)),
        ]),
        Mode::Normal => {
            let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
            Line::from(vec![
                key(" a"),
                Span::raw(" Add | "),
                key("d"),
                Span::raw(" Delete | "),
                key("←/→"),
                Span::raw(" Type | "),
                key("c"),
                Span::raw(" Load All | "),
                key("e"),
                Span::raw(" Export | "),
                Span::styled("q", Style::default().fg(Color::Red)),
                Span::raw(" Quit"),
            ])
        }
    };

    let status_bar = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn mismatch_file_name(m: &CategoryMismatch) -> String {
    m.path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| m.path.display().to_string())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tabular_ingest::{Category, CategorySignatures, SqliteRecordStore, ValidatingStore};
    use tempfile::TempDir;

    fn app() -> App<SqliteRecordStore> {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        App::new(Session::new(store), PathBuf::from("unused.xlsx"))
    }

    #[test]
    fn test_add_selects_new_entry_and_reports_errors() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("a.csv");
        fs::write(&csv, "Company,Website\nAcme,acme.io\n").unwrap();
        let mut app = app();

        app.add_path(&format!("{{{}}}", csv.display()));
        assert_eq!(app.session.staged().len(), 1);
        assert_eq!(app.staged_state.selected(), Some(0));

        app.add_path("/tmp/notes.txt");
        assert_eq!(app.session.staged().len(), 1);
        assert!(matches!(app.messages.last(), Some(Message::Error(_))));
    }

    #[test]
    fn test_delete_clamps_selection() {
        let dir = TempDir::new().unwrap();
        let mut app = app();
        for name in ["a.csv", "b.csv"] {
            let path = dir.path().join(name);
            fs::write(&path, "Company\nAcme\n").unwrap();
            app.add_path(&path.display().to_string());
        }

        assert_eq!(app.staged_state.selected(), Some(1));
        app.delete_selected();
        assert_eq!(app.staged_state.selected(), Some(0));
        app.delete_selected();
        assert_eq!(app.staged_state.selected(), None);
        assert!(app.session.staged().is_empty());
    }

    #[test]
    fn test_cycle_category_and_commit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, "Company\nAcme\n").unwrap();
        let mut app = app();
        app.add_path(&path.display().to_string());

        app.cycle_category(true);
        assert_eq!(app.session.staged()[0].declared_category, Category::Cb);
        app.cycle_category(false);
        app.cycle_category(false);
        assert_eq!(app.session.staged()[0].declared_category, Category::Other);

        app.commit();
        assert!(app.session.staged().is_empty());
        assert_eq!(app.session.committed()[0].category, Category::Other);
        assert_eq!(
            app.messages.last(),
            Some(&Message::Info("All files uploaded successfully!".to_string()))
        );
    }

    #[test]
    fn test_messages_are_capped() {
        let mut app = app();
        for _ in 0..10 {
            app.commit();
        }
        assert_eq!(app.messages.len(), MAX_MESSAGES);
    }

    fn error_texts<S: RecordStore>(app: &App<S>) -> Vec<String> {
        app.messages
            .iter()
            .filter_map(|m| match m {
                Message::Error(text) => Some(text.clone()),
                Message::Info(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_every_rejected_file_is_named_after_a_large_batch() {
        let dir = TempDir::new().unwrap();
        let store = ValidatingStore::new(
            SqliteRecordStore::open_in_memory().unwrap(),
            CategorySignatures::default(),
        );
        let mut app = App::new(Session::new(store), PathBuf::from("unused.xlsx"));

        // Company/Website is a tsun file, so every `cb` label below is rejected
        let names = ["r0.csv", "r1.csv", "r2.csv", "r3.csv", "r4.csv", "ok.csv"];
        for name in names {
            let path = dir.path().join(name);
            fs::write(&path, "Company,Website\nAcme,acme.io\n").unwrap();
            app.add_path(&path.display().to_string());
        }
        for i in 0..5 {
            app.session.set_category(i, Category::Cb).unwrap();
        }

        app.commit();

        assert_eq!(app.session.committed().len(), 1);
        assert!(app.session.staged().is_empty());
        assert!(app.messages.len() <= MAX_MESSAGES);
        assert_eq!(
            app.messages.last(),
            Some(&Message::Info("All valid files uploaded successfully!".to_string()))
        );

        let errors = error_texts(&app);
        for name in &names[..5] {
            assert!(
                errors.iter().any(|e| e.contains(name)),
                "{name} has no message in {errors:?}"
            );
        }
        assert!(errors.iter().all(|e| !e.contains("ok.csv")));
    }

    #[test]
    fn test_small_batch_gets_one_line_per_rejection() {
        let mut app = app();
        let mismatches: Vec<CategoryMismatch> = ["a.csv", "b.csv"]
            .iter()
            .map(|n| CategoryMismatch { path: PathBuf::from(n), category: Category::Pb })
            .collect();

        app.report_mismatches(&mismatches, 1);

        assert_eq!(
            error_texts(&app),
            vec![
                "File 'a.csv' does not match the specified type 'pb'. Please try again.",
                "File 'b.csv' does not match the specified type 'pb'. Please try again.",
            ]
        );
    }

    #[test]
    fn test_header_shows_rejection_policy() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        let session = Session::new(store).with_policy(RejectionPolicy::RetainRejected);
        let retaining = App::new(session, PathBuf::from("unused.xlsx"));

        assert_eq!(retaining.rejection_label(), "rejects kept");
        assert_eq!(app().rejection_label(), "rejects discarded");
    }
}
