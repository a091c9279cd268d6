//! Serial transport abstraction.
//!
//! A [`SerialDriver`] enumerates ports and opens them; the resulting
//! [`SerialTransport`] moves bytes.  The simulated pair below is fully
//! in-memory and backs the tests and `--simulate` mode.

use crate::serial::error::{SerialError, SerialResult};
use crate::serial::port_scanner;
use crate::serial::types::*;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// How long a simulated read waits for data before reporting nothing.
const SIMULATED_READ_WAIT: std::time::Duration = std::time::Duration::from_millis(50);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An open serial port.
#[async_trait::async_trait]
pub trait SerialTransport: Send + Sync {
    /// Read up to `buf.len()` bytes.  `Ok(0)` means nothing arrived within
    /// the read timeout; errors mean the link is unusable.
    async fn read(&self, buf: &mut [u8]) -> SerialResult<usize>;

    /// Write all of `data`.
    async fn write(&self, data: &[u8]) -> SerialResult<usize>;

    async fn close(&self) -> SerialResult<()>;

    fn is_open(&self) -> bool;

    fn port_name(&self) -> &str;
}

/// Port enumeration and opening.
#[async_trait::async_trait]
pub trait SerialDriver: Send + Sync {
    async fn list_ports(&self) -> SerialResult<Vec<SerialPortInfo>>;

    async fn open(&self, config: &PortConfig) -> SerialResult<Arc<dyn SerialTransport>>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Simulated transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SimulatedTransport {
    name: String,
    config: PortConfig,
    open: AtomicBool,
    loopback: AtomicBool,
    rx_buf: Mutex<VecDeque<u8>>,
    tx_buf: Mutex<Vec<u8>>,
    rx_notify: Notify,
    read_failure: std::sync::Mutex<Option<SerialError>>,
    write_failure: std::sync::Mutex<Option<SerialError>>,
    write_calls: AtomicUsize,
}

impl SimulatedTransport {
    /// An already-open transport for `config.path`.
    pub fn new(config: PortConfig) -> Arc<Self> {
        Arc::new(Self {
            name: config.path.clone(),
            config,
            open: AtomicBool::new(true),
            loopback: AtomicBool::new(false),
            rx_buf: Mutex::new(VecDeque::with_capacity(4096)),
            tx_buf: Mutex::new(Vec::with_capacity(4096)),
            rx_notify: Notify::new(),
            read_failure: std::sync::Mutex::new(None),
            write_failure: std::sync::Mutex::new(None),
            write_calls: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// Echo every written byte back as received data.
    pub fn set_loopback(&self, enabled: bool) {
        self.loopback.store(enabled, Ordering::SeqCst);
    }

    /// Simulate incoming data.
    pub async fn inject_rx(&self, data: &[u8]) {
        self.rx_buf.lock().await.extend(data);
        self.rx_notify.notify_waiters();
    }

    /// Everything written so far, draining the buffer.
    pub async fn drain_tx(&self) -> Vec<u8> {
        std::mem::take(&mut *self.tx_buf.lock().await)
    }

    /// Number of `write` calls that reached the port.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Make the next read fail (e.g. device unplugged).
    pub fn fail_next_read(&self, error: SerialError) {
        if let Ok(mut slot) = self.read_failure.lock() {
            *slot = Some(error);
        }
        self.rx_notify.notify_waiters();
    }

    /// Make the next write fail.
    pub fn fail_next_write(&self, error: SerialError) {
        if let Ok(mut slot) = self.write_failure.lock() {
            *slot = Some(error);
        }
    }

    fn take_failure(slot: &std::sync::Mutex<Option<SerialError>>) -> Option<SerialError> {
        slot.lock().ok().and_then(|mut s| s.take())
    }

    fn ensure_open(&self) -> SerialResult<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SerialError::not_connected("Port not open").with_port(&self.name))
        }
    }
}

#[async_trait::async_trait]
impl SerialTransport for SimulatedTransport {
    async fn read(&self, buf: &mut [u8]) -> SerialResult<usize> {
        self.ensure_open()?;
        if let Some(err) = Self::take_failure(&self.read_failure) {
            return Err(err);
        }
        let mut rx = self.rx_buf.lock().await;
        if rx.is_empty() {
            drop(rx);
            tokio::select! {
                _ = self.rx_notify.notified() => {},
                _ = tokio::time::sleep(SIMULATED_READ_WAIT) => {},
            }
            if let Some(err) = Self::take_failure(&self.read_failure) {
                return Err(err);
            }
            rx = self.rx_buf.lock().await;
        }
        let count = buf.len().min(rx.len());
        for (slot, byte) in buf.iter_mut().zip(rx.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    async fn write(&self, data: &[u8]) -> SerialResult<usize> {
        self.ensure_open()?;
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = Self::take_failure(&self.write_failure) {
            return Err(err);
        }
        self.tx_buf.lock().await.extend_from_slice(data);
        if self.loopback.load(Ordering::SeqCst) {
            self.inject_rx(data).await;
        }
        Ok(data.len())
    }

    async fn close(&self) -> SerialResult<()> {
        self.open.store(false, Ordering::SeqCst);
        self.rx_notify.notify_waiters();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn port_name(&self) -> &str {
        &self.name
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Simulated driver
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// In-memory driver.  Opening a listed port yields a fresh
/// [`SimulatedTransport`]; unlisted paths fail with `PortNotFound`.
#[derive(Default)]
pub struct SimulatedDriver {
    ports: std::sync::Mutex<Vec<SerialPortInfo>>,
    list_failure: std::sync::Mutex<Option<SerialError>>,
    open_failures: std::sync::Mutex<HashMap<String, SerialError>>,
    opened: std::sync::Mutex<Vec<PortConfig>>,
    transports: std::sync::Mutex<HashMap<String, Arc<SimulatedTransport>>>,
    loopback: AtomicBool,
}

impl SimulatedDriver {
    pub fn new(ports: Vec<SerialPortInfo>) -> Self {
        Self {
            ports: std::sync::Mutex::new(ports),
            ..Default::default()
        }
    }

    /// Ports known only by name.
    pub fn with_port_names(names: &[&str]) -> Self {
        Self::new(
            names
                .iter()
                .map(|n| port_scanner::build_port_info(n, None, None, None, None))
                .collect(),
        )
    }

    /// New transports echo what they are sent.
    pub fn set_loopback(&self, enabled: bool) {
        self.loopback.store(enabled, Ordering::SeqCst);
    }

    pub fn set_ports(&self, ports: Vec<SerialPortInfo>) {
        if let Ok(mut slot) = self.ports.lock() {
            *slot = ports;
        }
    }

    /// Fail the next enumeration.
    pub fn fail_list(&self, error: SerialError) {
        if let Ok(mut slot) = self.list_failure.lock() {
            *slot = Some(error);
        }
    }

    /// Fail the next open of `path`.
    pub fn fail_open(&self, path: &str, error: SerialError) {
        if let Ok(mut failures) = self.open_failures.lock() {
            failures.insert(path.to_string(), error);
        }
    }

    /// Configurations passed to successful opens, oldest first.
    pub fn opened_configs(&self) -> Vec<PortConfig> {
        self.opened.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// The transport most recently opened for `path`.
    pub fn transport(&self, path: &str) -> Option<Arc<SimulatedTransport>> {
        self.transports.lock().ok().and_then(|t| t.get(path).cloned())
    }
}

#[async_trait::async_trait]
impl SerialDriver for SimulatedDriver {
    async fn list_ports(&self) -> SerialResult<Vec<SerialPortInfo>> {
        if let Some(err) = self.list_failure.lock().ok().and_then(|mut s| s.take()) {
            return Err(err);
        }
        Ok(self.ports.lock().map(|p| p.clone()).unwrap_or_default())
    }

    async fn open(&self, config: &PortConfig) -> SerialResult<Arc<dyn SerialTransport>> {
        config.baud_rate.value().map_err(|e| e.with_port(&config.path))?;
        if let Some(err) = self
            .open_failures
            .lock()
            .ok()
            .and_then(|mut f| f.remove(&config.path))
        {
            return Err(err.with_port(&config.path));
        }
        let known = self
            .ports
            .lock()
            .map(|ports| ports.iter().any(|p| p.port_name == config.path))
            .unwrap_or(false);
        if !known {
            return Err(SerialError::port_not_found("No such device").with_port(&config.path));
        }

        let transport = SimulatedTransport::new(config.clone());
        transport.set_loopback(self.loopback.load(Ordering::SeqCst));
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(config.clone());
        }
        if let Ok(mut transports) = self.transports.lock() {
            transports.insert(config.path.clone(), transport.clone());
        }
        log::debug!("simulated port {} opened ({})", config.path, config.shorthand());
        Ok(transport)
    }
}
