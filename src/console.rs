//! # Console
//!
//! Line-oriented terminal front end.  Provides the three collaborators the
//! session bridge needs, all rendered on one text console:
//!
//! - [`ConsolePrompts`]: numbered menus and input lines for the wizard
//! - [`ConsoleDisplay`]: port output, status lines and the exportable log
//! - [`ConsoleShell`]: running indicator and the "save log as" prompt
//!
//! Input arrives as whole lines.  Lines starting with `:` are commands
//! (see [`parse_line`]); everything else is sent to the port.

use async_trait::async_trait;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use sterm_serial::serial::{DisplayMessage, DisplaySurface, HostCommand, HostShell, LineEnding, SurfaceMessage};
use sterm_wizard::wizard::{PromptHost, PromptWidget, QuickInputButton, WidgetEvent, WidgetKind, WidgetSpec};
use tokio::sync::mpsc;

pub const HELP: &str = "\
commands:
  :start    configure and open a serial port
  :stop     close the open port
  :clear    clear the screen and the output log
  :save     export the output log to a file
  :status   show the connection state
  :help     show this help
  :quit     close the port and exit
any other line is sent to the port; start a line with '::' to send a literal ':'
";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Console I/O
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Shared output sink plus the queue of typed lines.
#[derive(Clone)]
pub struct Console {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
    lines: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl Console {
    pub fn new(out: Box<dyn Write + Send>, lines: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
            lines: Arc::new(tokio::sync::Mutex::new(lines)),
        }
    }

    /// Console on the process's stdin / stdout.
    pub fn stdio() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        spawn_stdin_thread(tx)?;
        Ok(Self::new(Box::new(std::io::stdout()), rx))
    }

    /// In-memory console: lines are fed through the returned sender and
    /// everything printed lands in the [`Transcript`].
    pub fn scripted() -> (Self, mpsc::UnboundedSender<String>, Transcript) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transcript = Transcript::default();
        (Self::new(Box::new(transcript.clone()), rx), tx, transcript)
    }

    pub fn print(&self, text: &str) {
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            log::debug!("console write failed: {}", e);
        }
    }

    pub fn println(&self, text: &str) {
        self.print(&format!("{}\n", text));
    }

    /// Next typed line; `None` once input is closed.  Cancellation safe.
    pub async fn next_line(&self) -> Option<String> {
        self.lines.lock().await.recv().await
    }
}

/// Captured console output.
#[derive(Clone, Default)]
pub struct Transcript(Arc<Mutex<Vec<u8>>>);

impl Transcript {
    pub fn text(&self) -> String {
        self.0
            .lock()
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default()
    }
}

impl Write for Transcript {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(mut inner) = self.0.lock() {
            inner.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Forward lines from `reader` until EOF, a read error, or the receiver
/// going away.  Returns the number of lines forwarded.
pub fn forward_lines<R: BufRead>(reader: R, tx: mpsc::UnboundedSender<String>) -> usize {
    let mut count = 0;
    for line in reader.lines() {
        match line {
            Ok(line) => {
                if tx.send(line).is_err() {
                    break;
                }
                count += 1;
            }
            Err(e) => {
                log::warn!("stdin read failed: {}", e);
                break;
            }
        }
    }
    count
}

/// Blocking stdin reads run on their own thread so a pending read never
/// holds the runtime open at exit.
pub fn spawn_stdin_thread(tx: mpsc::UnboundedSender<String>) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new().name("stdin-lines".into()).spawn(move || {
        let stdin = std::io::stdin();
        let count = forward_lines(stdin.lock(), tx);
        log::debug!("stdin closed after {} line(s)", count);
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Wizard prompts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ConsolePrompts {
    console: Console,
}

impl ConsolePrompts {
    pub fn new(console: Console) -> Self {
        Self { console }
    }
}

impl PromptHost for ConsolePrompts {
    fn create_widget(&self, spec: WidgetSpec) -> Box<dyn PromptWidget> {
        Box::new(ConsoleWidget {
            console: self.console.clone(),
            spec,
            submitted: false,
            disposed: false,
        })
    }
}

struct ConsoleWidget {
    console: Console,
    spec: WidgetSpec,
    /// Set when a value was accepted; cleared once its validation result is shown.
    submitted: bool,
    disposed: bool,
}

impl ConsoleWidget {
    fn header(&self) -> String {
        match self.spec.progress() {
            Some(progress) => format!("== {} ({}) ==", self.spec.title, progress),
            None => format!("== {} ==", self.spec.title),
        }
    }

    fn hints(&self, prefix: &str) -> String {
        let mut hints = Vec::new();
        if self.spec.has_back_button() {
            hints.push(format!("{}b = back", prefix));
        }
        hints.push(format!("{}q = cancel", prefix));
        hints.join(", ")
    }

    fn back(&self) -> Option<QuickInputButton> {
        self.spec.buttons.iter().find(|b| b.is_back()).cloned()
    }

    fn render(&self) -> String {
        let mut text = format!("{}\n", self.header());
        match &self.spec.kind {
            WidgetKind::QuickPick {
                items,
                active_item,
                placeholder,
            } => {
                for (i, item) in items.iter().enumerate() {
                    let marker = if Some(i) == *active_item { '*' } else { ' ' };
                    text.push_str(&format!("{} {:>2}) {}", marker, i + 1, item.label));
                    if let Some(description) = &item.description {
                        text.push_str(&format!("  ({})", description));
                    }
                    text.push('\n');
                }
                if !placeholder.is_empty() {
                    text.push_str(&format!("{}\n", placeholder));
                }
                text.push_str(&format!("[{}]\n", self.hints("")));
            }
            WidgetKind::InputBox { value, prompt } => {
                text.push_str(&format!("{} [{}]\n", prompt, self.hints(":")));
                if !value.is_empty() {
                    text.push_str(&format!("(enter keeps '{}')\n", value));
                }
            }
        }
        text
    }

    async fn pick_event(&self, count: usize, active: Option<usize>) -> WidgetEvent {
        loop {
            self.console.print("> ");
            let Some(line) = self.console.next_line().await else {
                return WidgetEvent::Hidden;
            };
            match line.trim() {
                "" => return WidgetEvent::Selected(active),
                "q" => return WidgetEvent::Hidden,
                "b" => match self.back() {
                    Some(back) => return WidgetEvent::ButtonTriggered(back),
                    None => self.console.println("nothing to go back to"),
                },
                other => match other.parse::<usize>() {
                    Ok(n) if (1..=count).contains(&n) => return WidgetEvent::Selected(Some(n - 1)),
                    _ => self.console.println(&format!("enter a number from 1 to {}", count)),
                },
            }
        }
    }

    async fn input_event(&mut self, initial: &str) -> WidgetEvent {
        loop {
            self.console.print("> ");
            let Some(line) = self.console.next_line().await else {
                return WidgetEvent::Hidden;
            };
            let value = match line.trim() {
                ":q" => return WidgetEvent::Hidden,
                ":b" => match self.back() {
                    Some(back) => return WidgetEvent::ButtonTriggered(back),
                    None => {
                        self.console.println("nothing to go back to");
                        continue;
                    }
                },
                "" => initial.to_string(),
                value => value.to_string(),
            };
            self.submitted = true;
            return WidgetEvent::Accepted(value);
        }
    }
}

#[async_trait]
impl PromptWidget for ConsoleWidget {
    // A line prompt only reads while it is waiting for an answer.
    fn set_enabled(&mut self, _enabled: bool) {}

    fn set_busy(&mut self, _busy: bool) {}

    fn set_validation_message(&mut self, message: Option<String>) {
        // Only answer a submitted value; the initial check of an empty box stays quiet.
        if let Some(message) = message {
            if self.submitted {
                self.submitted = false;
                self.console.println(&format!("! {}", message));
            }
        }
    }

    fn show(&mut self) {
        self.console.print(&self.render());
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }

    async fn next_event(&mut self) -> WidgetEvent {
        if self.disposed {
            return WidgetEvent::Hidden;
        }
        match self.spec.kind.clone() {
            WidgetKind::QuickPick { items, active_item, .. } => self.pick_event(items.len(), active_item).await,
            WidgetKind::InputBox { value, .. } => self.input_event(&value).await,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Display surface
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Prints port output and keeps the most recent `capacity` bytes of it
/// for log export.
pub struct ConsoleDisplay {
    console: Console,
    log: Mutex<String>,
    capacity: usize,
    surface: mpsc::UnboundedSender<SurfaceMessage>,
}

impl ConsoleDisplay {
    pub fn new(console: Console, capacity: usize, surface: mpsc::UnboundedSender<SurfaceMessage>) -> Self {
        Self {
            console,
            log: Mutex::new(String::new()),
            capacity,
            surface,
        }
    }

    pub fn log_text(&self) -> String {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    fn append(&self, text: &str) {
        let Ok(mut log) = self.log.lock() else {
            return;
        };
        log.push_str(text);
        if log.len() > self.capacity {
            let mut cut = log.len() - self.capacity;
            while !log.is_char_boundary(cut) {
                cut += 1;
            }
            log.drain(..cut);
        }
    }
}

impl DisplaySurface for ConsoleDisplay {
    fn post(&self, message: DisplayMessage) {
        match message {
            DisplayMessage::Stdout(text) => {
                self.console.print(&text);
                self.append(&text);
            }
            DisplayMessage::Clear => {
                if let Ok(mut log) = self.log.lock() {
                    log.clear();
                }
                self.console.print("\x1b[2J\x1b[H");
            }
            DisplayMessage::Connected(true) => self.console.println("\n-- connected --"),
            DisplayMessage::Connected(false) => self.console.println("\n-- disconnected --"),
            DisplayMessage::Save => {
                if self.surface.send(SurfaceMessage::Save(self.log_text())).is_err() {
                    log::warn!("save requested but the session loop is gone");
                }
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Host shell
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ConsoleShell {
    console: Console,
    running: AtomicBool,
}

impl ConsoleShell {
    pub fn new(console: Console) -> Self {
        Self {
            console,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostShell for ConsoleShell {
    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        log::debug!("running indicator {}", if running { "on" } else { "off" });
    }

    async fn show_save_dialog(&self, suggested_name: &str) -> Option<PathBuf> {
        self.console.print(&format!("Save log as [{}] (:q to cancel): ", suggested_name));
        let line = self.console.next_line().await?;
        match line.trim() {
            ":q" => None,
            "" => Some(PathBuf::from(suggested_name)),
            path => Some(PathBuf::from(path)),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Input lines
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Command(HostCommand),
    Status,
    Help,
    Quit,
    Unknown(String),
    /// Bytes for the port, line ending included.
    Data(Vec<u8>),
}

pub fn parse_line(line: &str, ending: LineEnding) -> ConsoleInput {
    let line = line.trim_end_matches(['\r', '\n']);
    let text = match line.strip_prefix(':') {
        Some(rest) if rest.starts_with(':') => rest,
        Some(command) => {
            return match command.trim().to_ascii_lowercase().as_str() {
                "q" | "quit" | "exit" => ConsoleInput::Quit,
                "h" | "help" | "?" => ConsoleInput::Help,
                "status" => ConsoleInput::Status,
                word => match HostCommand::from_str(word) {
                    Ok(command) => ConsoleInput::Command(command),
                    Err(_) => ConsoleInput::Unknown(word.to_string()),
                },
            }
        }
        None => line,
    };
    let mut data = text.as_bytes().to_vec();
    data.extend_from_slice(ending.bytes());
    ConsoleInput::Data(data)
}
