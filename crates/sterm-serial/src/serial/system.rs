//! Operating-system serial driver backed by the `serialport` crate.
//!
//! `serialport` is blocking, so every call runs on the blocking pool.  The
//! read half and write half are separate handles (`try_clone`) so a pending
//! read never delays a keystroke.

use crate::serial::error::{SerialError, SerialResult};
use crate::serial::port_scanner;
use crate::serial::transport::{SerialDriver, SerialTransport};
use crate::serial::types::*;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type PortHandle = Arc<Mutex<Option<Box<dyn SerialPort>>>>;

fn join_error(e: tokio::task::JoinError) -> SerialError {
    SerialError::io(format!("serial worker failed: {}", e))
}

pub struct SystemDriver {
    read_timeout: Duration,
}

impl SystemDriver {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl Default for SystemDriver {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

/// Map a configuration onto `serialport` settings.  Mark and space parity
/// have no portable equivalent.
fn port_settings(config: &PortConfig) -> SerialResult<(serialport::DataBits, serialport::Parity, serialport::StopBits)> {
    let data_bits = match config.data_bits {
        DataBits::Five => serialport::DataBits::Five,
        DataBits::Six => serialport::DataBits::Six,
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    };
    let parity = match config.parity {
        Parity::None => serialport::Parity::None,
        Parity::Odd => serialport::Parity::Odd,
        Parity::Even => serialport::Parity::Even,
        Parity::Mark | Parity::Space => {
            return Err(SerialError::unsupported(format!(
                "{} parity is not supported by the system driver",
                config.parity.name()
            ))
            .with_port(&config.path))
        }
    };
    let stop_bits = match config.stop_bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    };
    Ok((data_bits, parity, stop_bits))
}

#[async_trait::async_trait]
impl SerialDriver for SystemDriver {
    async fn list_ports(&self) -> SerialResult<Vec<SerialPortInfo>> {
        let raw = tokio::task::spawn_blocking(serialport::available_ports)
            .await
            .map_err(join_error)??;
        let mut ports: Vec<SerialPortInfo> = raw.into_iter().map(port_scanner::from_system).collect();
        port_scanner::sort_ports(&mut ports);
        log::debug!("found {} serial port(s)", ports.len());
        Ok(ports)
    }

    async fn open(&self, config: &PortConfig) -> SerialResult<Arc<dyn SerialTransport>> {
        let baud = config.baud_rate.value().map_err(|e| e.with_port(&config.path))?;
        let (data_bits, parity, stop_bits) = port_settings(config)?;
        let builder = serialport::new(config.path.clone(), baud)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .flow_control(serialport::FlowControl::None)
            .timeout(self.read_timeout);

        let path = config.path.clone();
        let (reader, writer) = tokio::task::spawn_blocking(move || -> serialport::Result<_> {
            let reader = builder.open()?;
            let writer = reader.try_clone()?;
            Ok((reader, writer))
        })
        .await
        .map_err(join_error)?
        .map_err(|e| SerialError::from(e).with_port(&path))?;

        log::info!("opened {} ({})", path, config.shorthand());
        Ok(Arc::new(SystemTransport {
            name: path,
            reader: Arc::new(Mutex::new(Some(reader))),
            writer: Arc::new(Mutex::new(Some(writer))),
            open: AtomicBool::new(true),
        }))
    }
}

struct SystemTransport {
    name: String,
    reader: PortHandle,
    writer: PortHandle,
    open: AtomicBool,
}

impl SystemTransport {
    async fn with_port<T, F>(&self, handle: &PortHandle, f: F) -> SerialResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Box<dyn SerialPort>) -> SerialResult<T> + Send + 'static,
    {
        let handle = handle.clone();
        let name = self.name.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = handle
                .lock()
                .map_err(|_| SerialError::io("port handle poisoned").with_port(&name))?;
            let port = guard
                .as_mut()
                .ok_or_else(|| SerialError::not_connected("Port not open").with_port(&name))?;
            f(port).map_err(|e| e.with_port(&name))
        })
        .await
        .map_err(join_error)?
    }
}

#[async_trait::async_trait]
impl SerialTransport for SystemTransport {
    async fn read(&self, buf: &mut [u8]) -> SerialResult<usize> {
        let len = buf.len();
        let chunk = self
            .with_port(&self.reader, move |port| {
                let mut chunk = vec![0u8; len];
                match port.read(&mut chunk) {
                    Ok(n) => {
                        chunk.truncate(n);
                        Ok(chunk)
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
                    Err(e) => Err(e.into()),
                }
            })
            .await?;
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }

    async fn write(&self, data: &[u8]) -> SerialResult<usize> {
        let data = data.to_vec();
        self.with_port(&self.writer, move |port| {
            port.write_all(&data)?;
            port.flush()?;
            Ok(data.len())
        })
        .await
    }

    async fn close(&self) -> SerialResult<()> {
        self.open.store(false, Ordering::SeqCst);
        let reader = self.reader.clone();
        let writer = self.writer.clone();
        tokio::task::spawn_blocking(move || {
            for handle in [reader, writer] {
                if let Ok(mut guard) = handle.lock() {
                    guard.take();
                }
            }
        })
        .await
        .map_err(join_error)?;
        log::info!("closed {}", self.name);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn port_name(&self) -> &str {
        &self.name
    }
}
