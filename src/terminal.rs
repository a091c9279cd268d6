//! Console session loop.
//!
//! Wires the session bridge to the console and multiplexes three inputs:
//! typed lines, relay notifications, and replies from the display surface.

use crate::console::{parse_line, Console, ConsoleDisplay, ConsoleInput, ConsolePrompts, ConsoleShell, HELP};
use crate::error::AppResult;
use crate::settings::AppSettings;
use std::sync::Arc;
use sterm_serial::serial::{
    ConnectOutcome, HostCommand, LineEnding, LinkEvent, PortConfigFlow, SerialDriver, SessionBridge, SessionOptions,
    SessionState, StateStore, SurfaceMessage,
};
use sterm_wizard::wizard::ResumeBudget;
use tokio::sync::mpsc;

pub struct Terminal {
    console: Console,
    bridge: SessionBridge,
    link_events: mpsc::UnboundedReceiver<LinkEvent>,
    surface: mpsc::UnboundedReceiver<SurfaceMessage>,
    line_ending: LineEnding,
}

impl Terminal {
    pub fn new(
        settings: &AppSettings,
        console: Console,
        driver: Arc<dyn SerialDriver>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let (surface_tx, surface) = mpsc::unbounded_channel();
        let prompts = Arc::new(ConsolePrompts::new(console.clone()));
        let display = Arc::new(ConsoleDisplay::new(console.clone(), settings.log_capacity, surface_tx));
        let shell = Arc::new(ConsoleShell::new(console.clone()));
        let flow = PortConfigFlow::new(
            driver.clone(),
            prompts,
            Arc::new(ResumeBudget::new(settings.max_resumes)),
        );
        let options = SessionOptions {
            read_buffer_size: settings.read_buffer_size,
        };
        let (bridge, link_events) = SessionBridge::new(driver, flow, store, display, shell, options);
        Self {
            console,
            bridge,
            link_events,
            surface,
            line_ending: settings.line_ending,
        }
    }

    pub fn bridge(&self) -> &SessionBridge {
        &self.bridge
    }

    /// Run until `:quit` or end of input, then close any open port.
    pub async fn run(mut self) -> AppResult<()> {
        self.console.println("serial-terminal: type :start to open a port, :help for commands");
        loop {
            tokio::select! {
                line = self.console.next_line() => match line {
                    Some(line) => {
                        if !self.handle_line(&line).await {
                            break;
                        }
                    }
                    None => {
                        log::debug!("input closed");
                        break;
                    }
                },
                Some(event) = self.link_events.recv() => self.bridge.handle_link_event(event).await,
                Some(message) = self.surface.recv() => {
                    if let Err(e) = self.bridge.handle_surface_message(message).await {
                        log::warn!("surface message failed: {}", e);
                    }
                }
            }
        }
        self.bridge.disconnect().await;
        Ok(())
    }

    /// Returns `false` when the session should end.
    async fn handle_line(&mut self, line: &str) -> bool {
        match parse_line(line, self.line_ending) {
            ConsoleInput::Quit => return false,
            ConsoleInput::Help => self.console.print(HELP),
            ConsoleInput::Status => self.console.println(&self.status()),
            ConsoleInput::Unknown(word) => self.console.println(&format!("unknown command :{} (try :help)", word)),
            ConsoleInput::Command(HostCommand::Start) => self.start().await,
            ConsoleInput::Command(command) => self.bridge.handle_command(command).await,
            // Dropped by the bridge unless a port is open.
            ConsoleInput::Data(data) => self.bridge.write(&data).await,
        }
        true
    }

    async fn start(&mut self) {
        match self.bridge.connect().await {
            ConnectOutcome::Connected(config) => {
                self.console.println(&format!("{} @ {}", config.path, config.summary()));
            }
            ConnectOutcome::AlreadyActive => self.console.println(&self.status()),
            // Failures are already on the display; a cancelled wizard stays quiet.
            ConnectOutcome::Cancelled | ConnectOutcome::Failed(_) => {}
        }
    }

    fn status(&self) -> String {
        match (self.bridge.state(), self.bridge.active_config()) {
            (SessionState::Open, Some(config)) => {
                let since = self
                    .bridge
                    .connected_since()
                    .map(|t| t.format(" since %H:%M:%S UTC").to_string())
                    .unwrap_or_default();
                format!("connected to {} ({}){}", config.path, config.shorthand(), since)
            }
            (state, _) => format!("not connected ({:?})", state).to_lowercase(),
        }
    }
}
