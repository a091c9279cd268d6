//! Session bridge.
//!
//! Owns the single serial link and its lifecycle:
//!
//! ```text
//!   Idle ──connect──▶ Connecting ──open ok──▶ Open ──stop / link failure──▶ Closing ──▶ Idle
//!                          │
//!                          └── cancelled / open failed ──▶ Idle
//! ```
//!
//! All methods take `&mut self`; the owner drives the bridge from one
//! event loop, feeding it host commands, surface messages and the
//! [`LinkEvent`]s coming out of the receiver returned by [`SessionBridge::new`].

use crate::serial::config_flow::PortConfigFlow;
use crate::serial::error::{SerialError, SerialResult};
use crate::serial::host::{DisplaySurface, HostShell, StateStore};
use crate::serial::recent::RecentConfigs;
use crate::serial::session::{spawn_relay, LinkEvent, RelayHandle};
use crate::serial::transport::{SerialDriver, SerialTransport};
use crate::serial::types::*;
use chrono::{DateTime, Local, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Size of each relay read.
    pub read_buffer_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { read_buffer_size: 4096 }
    }
}

/// Result of [`SessionBridge::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected(PortConfig),
    /// The user backed out of the wizard.
    Cancelled,
    /// The wizard or the transport failed; already reported on the display.
    Failed(SerialError),
    /// A link is already open or being opened.
    AlreadyActive,
}

struct ActiveLink {
    id: Uuid,
    config: PortConfig,
    transport: Arc<dyn SerialTransport>,
    relay: RelayHandle,
    connected_at: DateTime<Utc>,
}

/// Terminal-styled (red) inline error line.
pub fn error_line(error: &SerialError) -> String {
    format!("\x1b[31m[serial-terminal] {}\x1b[m\r\n", error)
}

/// Timestamped default file name for an exported log.
pub fn suggested_log_name(now: DateTime<Local>) -> String {
    now.format("serial-%Y%m%d-%H%M%S.log").to_string()
}

pub struct SessionBridge {
    driver: Arc<dyn SerialDriver>,
    flow: PortConfigFlow,
    store: Arc<dyn StateStore>,
    display: Arc<dyn DisplaySurface>,
    host: Arc<dyn HostShell>,
    options: SessionOptions,
    state: SessionState,
    link: Option<ActiveLink>,
    link_events: mpsc::UnboundedSender<LinkEvent>,
}

impl SessionBridge {
    pub fn new(
        driver: Arc<dyn SerialDriver>,
        flow: PortConfigFlow,
        store: Arc<dyn StateStore>,
        display: Arc<dyn DisplaySurface>,
        host: Arc<dyn HostShell>,
        options: SessionOptions,
    ) -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let (link_events, events_rx) = mpsc::unbounded_channel();
        let bridge = Self {
            driver,
            flow,
            store,
            display,
            host,
            options,
            state: SessionState::Idle,
            link: None,
            link_events,
        };
        (bridge, events_rx)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Configuration of the open link.
    pub fn active_config(&self) -> Option<&PortConfig> {
        self.link.as_ref().map(|l| &l.config)
    }

    pub fn link_id(&self) -> Option<Uuid> {
        self.link.as_ref().map(|l| l.id)
    }

    pub fn connected_since(&self) -> Option<DateTime<Utc>> {
        self.link.as_ref().map(|l| l.connected_at)
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Run the configuration wizard and open the chosen port.
    pub async fn connect(&mut self) -> ConnectOutcome {
        if self.state != SessionState::Idle {
            log::debug!("connect ignored while {:?}", self.state);
            return ConnectOutcome::AlreadyActive;
        }
        self.state = SessionState::Connecting;

        let mut recent = RecentConfigs::load(self.store.as_ref()).await;
        let config = match self.flow.run(&recent).await {
            Ok(Some(config)) => config,
            Ok(None) => {
                log::debug!("port configuration cancelled");
                self.state = SessionState::Idle;
                return ConnectOutcome::Cancelled;
            }
            Err(e) => return self.connect_failed(e),
        };

        let transport = match self.driver.open(&config).await {
            Ok(transport) => transport,
            Err(e) => return self.connect_failed(e.with_port(&config.path)),
        };

        recent.push(config.clone());
        if let Err(e) = recent.persist(self.store.as_ref()).await {
            log::warn!("could not persist recent configurations: {}", e);
        }

        let id = Uuid::new_v4();
        let relay = spawn_relay(
            id,
            transport.clone(),
            self.display.clone(),
            self.link_events.clone(),
            self.options.read_buffer_size,
        );
        self.link = Some(ActiveLink {
            id,
            config: config.clone(),
            transport,
            relay,
            connected_at: Utc::now(),
        });
        self.state = SessionState::Open;
        self.display.post(DisplayMessage::Connected(true));
        self.host.set_running(true);
        log::info!("connected to {} ({}), link {}", config.path, config.shorthand(), id);
        ConnectOutcome::Connected(config)
    }

    fn connect_failed(&mut self, error: SerialError) -> ConnectOutcome {
        log::warn!("connect failed: {}", error);
        self.state = SessionState::Idle;
        self.display.post(DisplayMessage::Stdout(error_line(&error)));
        ConnectOutcome::Failed(error)
    }

    /// Close the open link.  Returns `false` (and does nothing) when idle.
    pub async fn disconnect(&mut self) -> bool {
        if self.state != SessionState::Open {
            return false;
        }
        match self.link.take() {
            Some(link) => {
                self.teardown(link).await;
                true
            }
            None => {
                self.state = SessionState::Idle;
                false
            }
        }
    }

    async fn teardown(&mut self, link: ActiveLink) {
        self.state = SessionState::Closing;
        let stats = link.relay.stop().await;
        if let Err(e) = link.transport.close().await {
            log::warn!("closing {} reported: {}", link.config.path, e);
        }
        self.state = SessionState::Idle;
        self.display.post(DisplayMessage::Connected(false));
        self.host.set_running(false);
        log::info!(
            "disconnected from {} after {}s ({} bytes in {} chunks)",
            link.config.path,
            (Utc::now() - link.connected_at).num_seconds(),
            stats.bytes,
            stats.chunks
        );
    }

    /// Report a failure on the open link and drop it.
    async fn link_failed(&mut self, error: SerialError) {
        if let Some(link) = self.link.take() {
            let error = error.with_session(link.id.to_string());
            self.display.post(DisplayMessage::Stdout(error_line(&error)));
            self.teardown(link).await;
        }
    }

    /// Handle a relay notification.  Events from earlier links are ignored.
    pub async fn handle_link_event(&mut self, event: LinkEvent) {
        if self.link_id() != Some(event.link_id()) {
            log::debug!("ignoring event for stale link {}", event.link_id());
            return;
        }
        match event {
            LinkEvent::Failed { error, .. } => self.link_failed(error).await,
            LinkEvent::Closed { .. } => {
                if let Some(link) = self.link.take() {
                    self.teardown(link).await;
                }
            }
        }
    }

    // ── Data ─────────────────────────────────────────────────────

    /// Forward user input.  Dropped silently unless a link is open.
    pub async fn write(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let transport = match (&self.state, &self.link) {
            (SessionState::Open, Some(link)) => link.transport.clone(),
            _ => {
                log::debug!("dropping {} byte(s) of input while {:?}", data.len(), self.state);
                return;
            }
        };
        if let Err(e) = transport.write(data).await {
            log::warn!("write to {} failed: {}", transport.port_name(), e);
            self.link_failed(e).await;
        }
    }

    pub fn clear(&self) {
        self.display.post(DisplayMessage::Clear);
    }

    /// Ask the display for its buffered log; the reply arrives as
    /// [`SurfaceMessage::Save`].
    pub fn request_save(&self) {
        self.display.post(DisplayMessage::Save);
    }

    /// Export `log` to a user-chosen file.  `Ok(None)` when the dialog is dismissed.
    pub async fn save(&self, log: &str) -> SerialResult<Option<PathBuf>> {
        let suggested = suggested_log_name(Local::now());
        let Some(path) = self.host.show_save_dialog(&suggested).await else {
            return Ok(None);
        };
        tokio::fs::write(&path, log.as_bytes())
            .await
            .map_err(|e| SerialError::from(e).with_port(path.display().to_string()))?;
        log::info!("saved {} bytes of output to {}", log.len(), path.display());
        Ok(Some(path))
    }

    // ── Dispatch ─────────────────────────────────────────────────

    pub async fn handle_surface_message(&mut self, message: SurfaceMessage) -> SerialResult<()> {
        match message {
            SurfaceMessage::Stdin(bytes) => {
                self.write(&bytes).await;
                Ok(())
            }
            SurfaceMessage::Save(log) => match self.save(&log).await {
                Ok(_) => Ok(()),
                Err(e) => {
                    self.display.post(DisplayMessage::Stdout(error_line(&e)));
                    Err(e)
                }
            },
        }
    }

    pub async fn handle_command(&mut self, command: HostCommand) {
        match command {
            HostCommand::Start => {
                self.connect().await;
            }
            HostCommand::Stop => {
                self.disconnect().await;
            }
            HostCommand::Clear => self.clear(),
            HostCommand::Save => self.request_save(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_error_line_is_red_and_terminated() {
        let line = error_line(&SerialError::port_not_found("gone").with_port("COM9"));
        assert!(line.starts_with("\x1b[31m"));
        assert!(line.contains("COM9: gone"));
        assert!(line.ends_with("\x1b[m\r\n"));
    }

    #[test]
    fn test_suggested_log_name() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(suggested_log_name(now), "serial-20240309-140507.log");
    }
}
