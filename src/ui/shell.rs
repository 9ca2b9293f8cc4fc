//! Full-screen shell hosting the login and registration views.
//!
//! Tab switches between the two views. The view being left is torn down and
//! a fresh one is built for the view being entered.

use crate::auth::AuthClient;
use crate::recording::{CaptureConstraints, CaptureDevice};
use crate::ui::HeartbeatVisualizer;
use crate::views::{register, LoginView, Outcome, Phase, RegisterView, Status};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Padding, Paragraph, Wrap},
};
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

const BG: Color = Color::Rgb(0, 0, 0);
const FG: Color = Color::Rgb(255, 255, 255);
const HELP_FG: Color = Color::Rgb(100, 100, 100);
const ACCENT: Color = Color::Rgb(255, 123, 0);
const SUCCESS_FG: Color = Color::Rgb(80, 200, 120);
const ERROR_FG: Color = Color::Rgb(255, 80, 80);

const FRAME_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Login,
    Register,
}

impl ViewKind {
    fn other(self) -> Self {
        match self {
            ViewKind::Login => ViewKind::Register,
            ViewKind::Register => ViewKind::Login,
        }
    }
}

/// What a key press asks the shell to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Quit,
    SwitchView,
    ToggleRecording,
    Submit,
    EditUsername,
    Ignore,
}

/// Maps a key press to an action for the given view.
///
/// In the registration view plain characters go to the username field, so
/// recording is toggled with Ctrl+R there.
fn action_for(kind: ViewKind, key: &KeyEvent, username_editable: bool) -> Action {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => Action::Quit,
        KeyCode::Char('c') if ctrl => Action::Quit,
        KeyCode::Tab | KeyCode::BackTab => Action::SwitchView,
        KeyCode::Enter => Action::Submit,
        KeyCode::Char('r') if ctrl => Action::ToggleRecording,
        KeyCode::Char(' ') | KeyCode::Char('r') if kind == ViewKind::Login => {
            Action::ToggleRecording
        }
        _ if kind == ViewKind::Register && username_editable => Action::EditUsername,
        _ => Action::Ignore,
    }
}

enum ActiveView {
    Login(LoginView),
    Register(RegisterView),
}

impl ActiveView {
    fn kind(&self) -> ViewKind {
        match self {
            ActiveView::Login(_) => ViewKind::Login,
            ActiveView::Register(_) => ViewKind::Register,
        }
    }

    fn is_recording(&self) -> bool {
        match self {
            ActiveView::Login(view) => view.is_recording(),
            ActiveView::Register(view) => view.is_recording(),
        }
    }

    async fn poll(&mut self) {
        match self {
            ActiveView::Login(view) => view.poll().await,
            ActiveView::Register(view) => view.poll().await,
        }
    }

    async fn toggle_recording(&mut self) {
        match self {
            ActiveView::Login(view) => view.toggle_recording().await,
            ActiveView::Register(view) => view.toggle_recording().await,
        }
    }

    fn submit(&mut self) {
        match self {
            ActiveView::Login(view) => {
                view.authenticate();
            }
            ActiveView::Register(view) => {
                view.register();
            }
        }
    }

    async fn teardown(&mut self) {
        match self {
            ActiveView::Login(view) => view.teardown().await,
            ActiveView::Register(view) => view.teardown().await,
        }
    }
}

/// Everything needed to build a fresh view.
struct ViewFactory {
    device: Arc<dyn CaptureDevice>,
    constraints: CaptureConstraints,
    client: AuthClient,
    min_recording_secs: u32,
}

impl ViewFactory {
    fn build(&self, kind: ViewKind) -> ActiveView {
        match kind {
            ViewKind::Login => ActiveView::Login(LoginView::new(
                self.device.clone(),
                self.constraints,
                self.client.clone(),
            )),
            ViewKind::Register => ActiveView::Register(RegisterView::with_min_recording(
                self.device.clone(),
                self.constraints,
                self.client.clone(),
                self.min_recording_secs,
            )),
        }
    }
}

pub struct Shell {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    factory: ViewFactory,
    view: ActiveView,
    username_input: Input,
    visualizer: HeartbeatVisualizer,
    cleaned_up: bool,
}

impl Shell {
    /// Enters the alternate screen and mounts the `initial` view.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        constraints: CaptureConstraints,
        client: AuthClient,
        min_recording_secs: u32,
        initial: ViewKind,
        username: Option<String>,
    ) -> Result<Self> {
        let factory = ViewFactory {
            device,
            constraints,
            client,
            min_recording_secs,
        };
        let mut view = factory.build(initial);

        let mut username_input = Input::default();
        if let (ActiveView::Register(register), Some(name)) = (&mut view, username) {
            register.set_username(name.clone());
            username_input = Input::new(name);
        }

        enable_raw_mode()?;
        let terminal = undo_on_error(
            || {
                let mut stdout = io::stdout();
                execute!(stdout, EnterAlternateScreen)?;
                Ok(Terminal::new(CrosstermBackend::new(stdout))?)
            },
            || {
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
                let _ = disable_raw_mode();
            },
        )?;

        Ok(Self {
            terminal,
            factory,
            view,
            username_input,
            visualizer: HeartbeatVisualizer::new(),
            cleaned_up: false,
        })
    }

    /// Runs the draw/input loop until the user quits.
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Shell started on {:?} view", self.view.kind());

        loop {
            self.view.poll().await;
            self.visualizer.set_active(self.view.is_recording());
            self.visualizer.tick(Instant::now());
            self.draw()?;

            if !event::poll(FRAME_POLL)? {
                continue;
            }
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            let editable = match &self.view {
                ActiveView::Register(view) => view.can_edit_username(),
                ActiveView::Login(_) => false,
            };

            match action_for(self.view.kind(), &key, editable) {
                Action::Quit => break,
                Action::SwitchView => self.switch_view().await,
                Action::ToggleRecording => self.view.toggle_recording().await,
                Action::Submit => self.view.submit(),
                Action::EditUsername => {
                    self.username_input.handle_event(&Event::Key(key));
                    if let ActiveView::Register(view) = &mut self.view {
                        view.set_username(self.username_input.value());
                    }
                }
                Action::Ignore => {}
            }
        }

        self.view.teardown().await;
        tracing::info!("Shell closed");
        self.cleanup()
    }

    async fn switch_view(&mut self) {
        let next = self.view.kind().other();
        tracing::debug!("Switching to {:?} view", next);
        self.view.teardown().await;
        self.view = self.factory.build(next);
        self.username_input = Input::default();
        self.visualizer = HeartbeatVisualizer::new();
    }

    fn draw(&mut self) -> Result<()> {
        let view = &self.view;
        let visualizer = &self.visualizer;
        let input = &self.username_input;

        self.terminal.draw(|frame| {
            let area = frame.area();

            let padding_block = Block::default()
                .padding(Padding::uniform(1))
                .style(Style::default().bg(BG));
            frame.render_widget(&padding_block, area);
            let inner = padding_block.inner(area);

            let layout = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(2),
                    Constraint::Min(0),
                    Constraint::Length(1),
                ])
                .split(inner);

            render_tabs(frame, layout[0], view.kind());
            match view {
                ActiveView::Login(login) => render_login(frame, layout[1], login, visualizer),
                ActiveView::Register(register) => {
                    render_register(frame, layout[1], register, input, visualizer)
                }
            }
            render_help(frame, layout[2], view.kind());
        })?;

        Ok(())
    }

    /// Restores the terminal. Safe to call more than once.
    fn cleanup(&mut self) -> Result<()> {
        if self.cleaned_up {
            return Ok(());
        }
        self.cleaned_up = true;

        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Runs `undo` when `setup` fails, then hands back the error.
fn undo_on_error<T>(setup: impl FnOnce() -> Result<T>, undo: impl FnOnce()) -> Result<T> {
    let result = setup();
    if result.is_err() {
        undo();
    }
    result
}

/// Horizontal scroll and cursor column for a one-line field `width` cells wide.
///
/// The column always lands inside the field.
fn field_cursor(input: &Input, width: u16) -> (u16, u16) {
    let last = usize::from(width.saturating_sub(1));
    let scroll = input.visual_scroll(last);
    let column = input.visual_cursor().saturating_sub(scroll).min(last);
    (
        u16::try_from(scroll).unwrap_or(u16::MAX),
        u16::try_from(column).unwrap_or(0),
    )
}

fn render_tabs(frame: &mut Frame, area: Rect, active: ViewKind) {
    let tab = |label: &'static str, kind: ViewKind| {
        if kind == active {
            Span::styled(
                format!(" {label} "),
                Style::default().fg(BG).bg(ACCENT).bold(),
            )
        } else {
            Span::styled(format!(" {label} "), Style::default().fg(HELP_FG))
        }
    };
    let line = Line::from(vec![
        tab("Login", ViewKind::Login),
        Span::raw(" "),
        tab("Register", ViewKind::Register),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_help(frame: &mut Frame, area: Rect, kind: ViewKind) {
    let text = match kind {
        ViewKind::Login => "space/r record, enter authenticate, tab register, esc quit",
        ViewKind::Register => "type username, ctrl+r record, enter register, tab login, esc quit",
    };
    frame.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .style(Style::default().fg(HELP_FG)),
        area,
    );
}

fn render_login(frame: &mut Frame, area: Rect, view: &LoginView, visualizer: &HeartbeatVisualizer) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(3),
            Constraint::Length(2),
        ])
        .split(area);

    let prompt = match view.phase() {
        Phase::Idle if view.can_authenticate() => "Recording ready. Press enter to authenticate.",
        Phase::Idle => "Press space to record your voice.",
        Phase::Recording => "Recording... press space to stop.",
        Phase::Processing => "Verifying...",
    };
    frame.render_widget(
        Paragraph::new(prompt).style(Style::default().fg(FG)),
        layout[0],
    );
    visualizer.render(frame, layout[1]);
    render_outcome(frame, layout[2], view.outcome());
}

fn render_register(
    frame: &mut Frame,
    area: Rect,
    view: &RegisterView,
    input: &Input,
    visualizer: &HeartbeatVisualizer,
) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(2),
        ])
        .split(area);

    let field_style = if view.can_edit_username() {
        Style::default().fg(FG)
    } else {
        Style::default().fg(HELP_FG)
    };
    let input_block = Block::default().title(" Username ").borders(Borders::ALL);
    let input_inner = input_block.inner(layout[0]);
    frame.render_widget(&input_block, layout[0]);
    let (scroll, column) = field_cursor(input, input_inner.width);
    frame.render_widget(
        Paragraph::new(input.value())
            .style(field_style)
            .scroll((0, scroll)),
        input_inner,
    );
    if view.can_edit_username() {
        frame.set_cursor_position(Position::new(input_inner.x + column, input_inner.y));
    }

    let phrase = Text::from(vec![
        Line::styled(register::VOWEL_PHRASE, Style::default().fg(FG)),
        Line::styled(register::VOWEL_HINT, Style::default().fg(HELP_FG)),
    ]);
    frame.render_widget(Paragraph::new(phrase).wrap(Wrap { trim: true }), layout[1]);

    let status = match view.phase() {
        Phase::Recording if view.is_stopping() => "Finishing recording...".to_string(),
        Phase::Recording => format!(
            "Recording: {}s remaining (minimum {}s)",
            view.countdown(),
            view.min_recording_secs()
        ),
        Phase::Processing => "Registering...".to_string(),
        Phase::Idle if view.can_register() => "Press enter to register.".to_string(),
        Phase::Idle => "Press ctrl+r to record.".to_string(),
    };
    frame.render_widget(
        Paragraph::new(status).style(Style::default().fg(ACCENT)),
        layout[2],
    );

    visualizer.render(frame, layout[3]);
    render_outcome(frame, layout[4], view.outcome());
}

fn render_outcome(frame: &mut Frame, area: Rect, outcome: Option<&Outcome>) {
    let Some(outcome) = outcome else {
        return;
    };
    let (marker, color) = match outcome.status {
        Status::Success => ("✓", SUCCESS_FG),
        Status::Error => ("✗", ERROR_FG),
    };
    let line = Line::from(vec![
        Span::styled(format!("{marker} "), Style::default().fg(color).bold()),
        Span::styled(outcome.message.as_str(), Style::default().fg(color)),
    ]);
    frame.render_widget(Paragraph::new(line).wrap(Wrap { trim: true }), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::Cell;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn test_login_keys() {
        let login = ViewKind::Login;
        assert_eq!(action_for(login, &key(KeyCode::Char(' ')), false), Action::ToggleRecording);
        assert_eq!(action_for(login, &key(KeyCode::Char('r')), false), Action::ToggleRecording);
        assert_eq!(action_for(login, &key(KeyCode::Enter), false), Action::Submit);
        assert_eq!(action_for(login, &key(KeyCode::Tab), false), Action::SwitchView);
        assert_eq!(action_for(login, &key(KeyCode::Esc), false), Action::Quit);
        assert_eq!(action_for(login, &key(KeyCode::Char('x')), false), Action::Ignore);
    }

    #[test]
    fn test_register_keys_route_text_to_username() {
        let register = ViewKind::Register;
        assert_eq!(action_for(register, &key(KeyCode::Char('r')), true), Action::EditUsername);
        assert_eq!(action_for(register, &key(KeyCode::Char(' ')), true), Action::EditUsername);
        assert_eq!(action_for(register, &key(KeyCode::Backspace), true), Action::EditUsername);
        assert_eq!(action_for(register, &ctrl('r'), true), Action::ToggleRecording);
        assert_eq!(action_for(register, &ctrl('c'), true), Action::Quit);
        assert_eq!(action_for(register, &key(KeyCode::Enter), true), Action::Submit);
    }

    #[test]
    fn test_locked_username_ignores_text() {
        let register = ViewKind::Register;
        assert_eq!(action_for(register, &key(KeyCode::Char('a')), false), Action::Ignore);
        assert_eq!(action_for(register, &ctrl('r'), false), Action::ToggleRecording);
    }

    #[test]
    fn test_long_username_keeps_cursor_in_field() {
        let input = Input::new("x".repeat(40));
        assert_eq!(field_cursor(&input, 10), (31, 9));

        let input = Input::new("carol".to_string());
        assert_eq!(field_cursor(&input, 10), (0, 5));
        assert_eq!(field_cursor(&input, 0), (5, 0));
    }

    #[test]
    fn test_failed_setup_runs_undo() {
        let undone = Cell::new(false);
        let result: Result<()> = undo_on_error(|| Err(anyhow!("no tty")), || undone.set(true));
        assert!(result.is_err());
        assert!(undone.get());

        let undone = Cell::new(false);
        let value = undo_on_error(|| Ok(7), || undone.set(true)).unwrap();
        assert_eq!(value, 7);
        assert!(!undone.get());
    }

    #[test]
    fn test_view_kind_toggles() {
        assert_eq!(ViewKind::Login.other(), ViewKind::Register);
        assert_eq!(ViewKind::Register.other(), ViewKind::Login);
    }
}
