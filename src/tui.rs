use std::io::{self, stdout};
use std::path::Path;

use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};
use tokio::runtime::Runtime;

use crate::calculator::{Advance, Calculator, Phase, StepStatus};
use crate::config::{Field, FieldType};
use crate::gateway::{CartGateway, SubmitRequest, UploadGateway};
use crate::output::OutputMode;
use crate::state::{FieldValue, FormState};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Browse,
    // Editing a text-like field (or a file path) into the input buffer
    Input,
}

pub struct App<'a> {
    calculator: Calculator,
    uploads: &'a dyn UploadGateway,
    cart: &'a dyn CartGateway,
    runtime: &'a Runtime,
    field_index: usize,
    option_index: usize,
    mode: Mode,
    input_buffer: String,
    last_payload: Option<SubmitRequest>,
}

impl<'a> App<'a> {
    pub fn new(
        calculator: Calculator,
        uploads: &'a dyn UploadGateway,
        cart: &'a dyn CartGateway,
        runtime: &'a Runtime,
    ) -> Self {
        Self {
            calculator,
            uploads,
            cart,
            runtime,
            field_index: 0,
            option_index: 0,
            mode: Mode::Browse,
            input_buffer: String::new(),
            last_payload: None,
        }
    }

    fn selected_field(&self) -> Option<&Field> {
        self.calculator.current_step().fields.get(self.field_index)
    }

    fn field_count(&self) -> usize {
        self.calculator.current_step().fields.len()
    }

    fn move_up(&mut self) {
        if self.field_index > 0 {
            self.field_index -= 1;
            self.option_index = 0;
        }
    }

    fn move_down(&mut self) {
        if self.field_index + 1 < self.field_count() {
            self.field_index += 1;
            self.option_index = 0;
        }
    }

    fn cycle_option(&mut self, forward: bool) {
        let Some(field) = self.selected_field() else {
            return;
        };
        let len = field.options.len();
        if !field.field_type.uses_options() || len == 0 {
            return;
        }
        self.option_index = if forward {
            (self.option_index + 1) % len
        } else {
            (self.option_index + len - 1) % len
        };
    }

    /// Space on an option-backed field: radios and selects pick the
    /// highlighted option, checkboxes toggle its membership.
    fn choose_option(&mut self) {
        let Some(field) = self.selected_field() else {
            return;
        };
        let Some(option) = field.options.get(self.option_index) else {
            return;
        };
        let name = field.name.clone();
        let value = option.value.clone();
        match field.field_type {
            FieldType::Select | FieldType::Radio => {
                self.calculator.edit(&name, FieldValue::Text(value));
            }
            FieldType::Checkbox => {
                let mut members = match self.calculator.form().value(&name) {
                    Some(FieldValue::Many(values)) => values.clone(),
                    _ => Vec::new(),
                };
                if let Some(pos) = members.iter().position(|m| *m == value) {
                    members.remove(pos);
                } else {
                    members.push(value);
                }
                self.calculator.edit(&name, FieldValue::Many(members));
            }
            _ => {}
        }
    }

    fn begin_editing(&mut self) {
        let Some(field) = self.selected_field() else {
            return;
        };
        let field_type = field.field_type;
        let name = field.name.clone();
        if !matches!(
            field_type,
            FieldType::Text | FieldType::Number | FieldType::Textarea | FieldType::File
        ) {
            return;
        }
        // File fields always start from an empty path, not the stored URL
        let seed = match self.calculator.form().value(&name) {
            Some(FieldValue::Text(text)) if field_type != FieldType::File => text.clone(),
            _ => String::new(),
        };
        self.input_buffer = seed;
        self.mode = Mode::Input;
    }

    fn commit_input(&mut self) {
        let Some(field) = self.selected_field() else {
            self.mode = Mode::Browse;
            return;
        };
        let name = field.name.clone();
        let field_type = field.field_type;
        let entered = std::mem::take(&mut self.input_buffer);
        self.mode = Mode::Browse;

        if field_type == FieldType::File {
            self.upload_from_path(&name, entered.trim());
        } else {
            self.calculator.edit(&name, FieldValue::Text(entered));
        }
    }

    /// File fields take a local path in the preview; the bytes go through
    /// the upload gateway exactly as a browser drop would.
    fn upload_from_path(&mut self, field: &str, path: &str) {
        if path.is_empty() {
            return;
        }
        let file_name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        match std::fs::read(path) {
            Ok(bytes) => {
                self.runtime.block_on(self.calculator.upload_file(
                    field,
                    &file_name,
                    bytes,
                    self.uploads,
                ));
            }
            Err(err) => {
                tracing::debug!(%err, path, "could not read file for upload");
                self.calculator
                    .set_field_error(field, format!("Could not read file: {}", err));
            }
        }
    }

    fn advance(&mut self) {
        match self.calculator.advance() {
            Advance::Moved => {
                self.field_index = 0;
                self.option_index = 0;
            }
            Advance::Submit(request) => {
                self.last_payload = Some(request.clone());
                let outcome = self.runtime.block_on(self.cart.submit(&request));
                self.calculator.complete_submit(outcome);
            }
            Advance::Stayed => {}
        }
    }

    fn retry(&mut self) {
        if let Some(request) = self.calculator.retry() {
            let outcome = self.runtime.block_on(self.cart.submit(&request));
            self.calculator.complete_submit(outcome);
        }
    }

    fn previous(&mut self) -> bool {
        let moved = self.calculator.previous();
        if moved {
            self.field_index = 0;
            self.option_index = 0;
        }
        moved
    }

    fn payload_json(&self) -> String {
        self.last_payload
            .as_ref()
            .and_then(|payload| serde_json::to_string_pretty(payload).ok())
            .unwrap_or_else(|| "{}".to_string())
    }
}

pub fn run(
    calculator: Calculator,
    uploads: &dyn UploadGateway,
    cart: &dyn CartGateway,
    runtime: &Runtime,
) -> io::Result<Option<(String, OutputMode)>> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut app = App::new(calculator, uploads, cart, runtime);

    let result = loop {
        terminal.draw(|f| ui(f, &app))?;

        if let Event::Key(key) = event::read()? {
            // The phase is matched on a snapshot so the handlers below can
            // borrow the app mutably
            let phase = app.calculator.phase().clone();
            match phase {
                Phase::Step => match app.mode {
                    Mode::Browse => match key.code {
                        KeyCode::Char('q') => break Ok(None),
                        KeyCode::Esc => {
                            if !app.previous() {
                                break Ok(None);
                            }
                        }
                        KeyCode::Enter => app.advance(),
                        KeyCode::Up | KeyCode::Char('k') => app.move_up(),
                        KeyCode::Down | KeyCode::Char('j') => app.move_down(),
                        KeyCode::Left | KeyCode::Char('h') => app.cycle_option(false),
                        KeyCode::Right | KeyCode::Char('l') => app.cycle_option(true),
                        KeyCode::Char(' ') => app.choose_option(),
                        KeyCode::Char('e') => app.begin_editing(),
                        _ => {}
                    },
                    Mode::Input => match key.code {
                        KeyCode::Enter => app.commit_input(),
                        KeyCode::Esc => {
                            app.input_buffer.clear();
                            app.mode = Mode::Browse;
                        }
                        KeyCode::Char(c) => app.input_buffer.push(c),
                        KeyCode::Backspace => {
                            app.input_buffer.pop();
                        }
                        _ => {}
                    },
                },
                Phase::Submitting => {
                    // Transient: the gateway call completes synchronously
                    // from the loop's perspective
                }
                Phase::Failed(_) => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break Ok(None),
                    KeyCode::Enter | KeyCode::Char('r') => app.retry(),
                    _ => {}
                },
                Phase::Succeeded(_) => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break Ok(None),
                    KeyCode::Enter => {
                        break Ok(Some((app.payload_json(), OutputMode::Print)));
                    }
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        break Ok(Some((app.payload_json(), OutputMode::Clipboard)));
                    }
                    _ => {}
                },
            }
        }
    };

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn ui(f: &mut Frame, app: &App) {
    let mut constraints = vec![
        Constraint::Length(2), // progress
        Constraint::Min(4),    // content
    ];
    if app.calculator.price_text().is_some() {
        constraints.push(Constraint::Length(1)); // price
    }
    constraints.push(Constraint::Length(3)); // help / input

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(constraints)
        .split(f.area());

    let config = app.calculator.config();
    let mut title = format!(" {} ", config.title);
    if let Some(product) = &config.product_name {
        title = format!(" {} — {} ", config.title, product);
    }
    let frame_block = Block::default().borders(Borders::ALL).title(title);
    f.render_widget(frame_block, f.area());

    f.render_widget(progress_line(app), chunks[0]);

    match app.calculator.phase() {
        Phase::Step => render_step_body(f, chunks[1], app),
        Phase::Submitting => {
            f.render_widget(Paragraph::new("Adding to cart..."), chunks[1]);
        }
        Phase::Succeeded(receipt) => {
            let mut lines = vec![
                Line::from(Span::styled(
                    "✓ Added to Cart!",
                    Style::default().fg(Color::Green).bold(),
                )),
                Line::from(receipt.message.clone()),
                Line::from(format!("Cart: {}", receipt.cart_url)),
            ];
            if let Some(count) = receipt.cart_item_count {
                lines.push(Line::from(Span::styled(
                    format!("Items in cart: {}", count),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            f.render_widget(Paragraph::new(lines), chunks[1]);
        }
        Phase::Failed(message) => {
            let lines = vec![
                Line::from(Span::styled(
                    format!("Error: {}", message),
                    Style::default().fg(Color::Red).bold(),
                )),
                Line::from(""),
                Line::from("Press Enter to try again"),
            ];
            f.render_widget(Paragraph::new(lines), chunks[1]);
        }
    }

    let mut next_chunk = 2;
    if let Some(price) = app.calculator.price_text() {
        let price_line = Paragraph::new(Line::from(vec![
            Span::styled("Estimated Price: ", Style::default().fg(Color::DarkGray)),
            Span::styled(price, Style::default().fg(Color::Green).bold()),
        ]));
        f.render_widget(price_line, chunks[next_chunk]);
        next_chunk += 1;
    }

    let help_text = match (app.calculator.phase(), app.mode) {
        (Phase::Step, Mode::Input) => {
            let editing_file = app
                .selected_field()
                .map(|field| field.field_type == FieldType::File)
                .unwrap_or(false);
            if editing_file {
                format!("File path: {}█", app.input_buffer)
            } else {
                format!("Value: {}█", app.input_buffer)
            }
        }
        (Phase::Step, Mode::Browse) => {
            let action = if app.calculator.at_last_step() {
                config.button_text.as_str()
            } else {
                "next"
            };
            format!(
                "↑↓ field  ←/→ option  Space pick  e edit  Enter {}  Esc back  q quit",
                action
            )
        }
        (Phase::Succeeded(_), _) => "Enter print payload  ^C copy  q quit".to_string(),
        (Phase::Failed(_), _) => "Enter retry  q quit".to_string(),
        (Phase::Submitting, _) => "Adding to cart...".to_string(),
    };
    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(help, chunks[next_chunk]);
}

fn progress_line(app: &App) -> Paragraph<'static> {
    let mut spans = Vec::new();
    let steps = &app.calculator.config().steps;
    for (index, (step, status)) in steps
        .iter()
        .zip(app.calculator.step_statuses())
        .enumerate()
    {
        if index > 0 {
            spans.push(Span::styled(" › ", Style::default().fg(Color::DarkGray)));
        }
        let (marker, style) = match status {
            StepStatus::Completed => ("✓ ", Style::default().fg(Color::Green)),
            StepStatus::Active => ("● ", Style::default().fg(Color::Cyan).bold()),
            StepStatus::Pending => ("○ ", Style::default().fg(Color::DarkGray)),
        };
        spans.push(Span::styled(format!("{}{}", marker, step.title), style));
    }
    Paragraph::new(Line::from(spans))
}

fn render_step_body(f: &mut Frame, area: Rect, app: &App) {
    let step = app.calculator.current_step();
    let form = app.calculator.form();
    let mut lines = vec![
        Line::from(Span::styled(step.title.clone(), Style::default().bold())),
        Line::from(""),
    ];

    if step.fields.is_empty() {
        lines.push(Line::from(Span::styled(
            "Nothing to configure on this step",
            Style::default().fg(Color::DarkGray),
        )));
    }

    for (index, field) in step.fields.iter().enumerate() {
        let is_cursor = index == app.field_index;
        let marker = if is_cursor { "● " } else { "○ " };
        let style = if is_cursor {
            Style::default().fg(Color::Cyan).bold()
        } else {
            Style::default()
        };
        let required = if field.required { " *" } else { "" };
        let summary = field_summary(field, form, is_cursor, app.option_index);

        let mut spans = vec![Span::styled(
            format!("{}{}{}: ", marker, field.label, required),
            style,
        )];
        spans.push(Span::raw(summary));
        lines.push(Line::from(spans));

        if let Some(error) = form.error(&field.name) {
            lines.push(Line::from(Span::styled(
                format!("    {}", error),
                Style::default().fg(Color::Red),
            )));
        }
    }

    f.render_widget(Paragraph::new(lines), area);
}

/// One-line value summary for a field, with the option cursor drawn for the
/// selected field.
fn field_summary(field: &Field, form: &FormState, is_cursor: bool, option_index: usize) -> String {
    match field.field_type {
        FieldType::Text | FieldType::Number | FieldType::Textarea => {
            match form.value(&field.name) {
                Some(FieldValue::Text(text)) if !text.is_empty() => text.clone(),
                _ => "—".to_string(),
            }
        }
        FieldType::Select | FieldType::Radio => {
            let current = match form.value(&field.name) {
                Some(FieldValue::Text(value)) => Some(value.as_str()),
                _ => None,
            };
            field
                .options
                .iter()
                .enumerate()
                .map(|(i, option)| {
                    let picked = current == Some(option.value.as_str());
                    let mark = if picked { "●" } else { "○" };
                    if is_cursor && i == option_index {
                        format!("[{} {}]", mark, option.label)
                    } else {
                        format!("{} {}", mark, option.label)
                    }
                })
                .collect::<Vec<_>>()
                .join("  ")
        }
        FieldType::Checkbox => {
            let members: Vec<&str> = match form.value(&field.name) {
                Some(FieldValue::Many(values)) => values.iter().map(String::as_str).collect(),
                _ => Vec::new(),
            };
            field
                .options
                .iter()
                .enumerate()
                .map(|(i, option)| {
                    let checked = members.contains(&option.value.as_str());
                    let mark = if checked { "[x]" } else { "[ ]" };
                    if is_cursor && i == option_index {
                        format!("«{} {}»", mark, option.label)
                    } else {
                        format!("{} {}", mark, option.label)
                    }
                })
                .collect::<Vec<_>>()
                .join("  ")
        }
        FieldType::File => match form.uploaded(&field.name) {
            Some(file) => file.name.clone(),
            None => {
                if form.upload_in_flight(&field.name) {
                    "uploading...".to_string()
                } else {
                    "No file chosen".to_string()
                }
            }
        },
    }
}
