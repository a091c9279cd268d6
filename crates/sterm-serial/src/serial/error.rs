//! Serial bridge error type.

use serde::{Deserialize, Serialize};
use sterm_wizard::wizard::WizardError;

/// Error kinds specific to serial operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SerialErrorKind {
    PortNotFound,
    PortBusy,
    PermissionDenied,
    InvalidConfig,
    /// The configuration is valid but the platform driver cannot express it.
    Unsupported,
    IoError,
    NotConnected,
    /// Persisted state could not be read or written.
    Storage,
    /// The configuration wizard failed (not cancelled; cancellation is not an error).
    Wizard,
}

/// Structured serial error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialError {
    pub kind: SerialErrorKind,
    pub message: String,
    pub port_name: Option<String>,
    pub session_id: Option<String>,
}

pub type SerialResult<T> = Result<T, SerialError>;

impl std::fmt::Display for SerialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.port_name {
            Some(port) => write!(f, "[{:?}] {}: {}", self.kind, port, self.message),
            None => write!(f, "[{:?}] {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for SerialError {}

impl SerialError {
    pub fn new(kind: SerialErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            port_name: None,
            session_id: None,
        }
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port_name = Some(port.into());
        self
    }

    pub fn with_session(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    // ── Convenience constructors ─────────────────────────────────

    pub fn port_not_found(msg: impl Into<String>) -> Self {
        Self::new(SerialErrorKind::PortNotFound, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(SerialErrorKind::InvalidConfig, msg)
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::new(SerialErrorKind::Unsupported, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(SerialErrorKind::IoError, msg)
    }

    pub fn not_connected(msg: impl Into<String>) -> Self {
        Self::new(SerialErrorKind::NotConnected, msg)
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::new(SerialErrorKind::Storage, msg)
    }
}

fn kind_for_io(kind: std::io::ErrorKind, message: &str) -> SerialErrorKind {
    match kind {
        std::io::ErrorKind::NotFound => SerialErrorKind::PortNotFound,
        std::io::ErrorKind::PermissionDenied => SerialErrorKind::PermissionDenied,
        std::io::ErrorKind::InvalidInput => SerialErrorKind::InvalidConfig,
        _ if message.to_ascii_lowercase().contains("busy") => SerialErrorKind::PortBusy,
        _ => SerialErrorKind::IoError,
    }
}

impl From<std::io::Error> for SerialError {
    fn from(e: std::io::Error) -> Self {
        let message = e.to_string();
        Self::new(kind_for_io(e.kind(), &message), message)
    }
}

impl From<serialport::Error> for SerialError {
    fn from(e: serialport::Error) -> Self {
        let kind = match e.kind() {
            serialport::ErrorKind::NoDevice => SerialErrorKind::PortNotFound,
            serialport::ErrorKind::InvalidInput => SerialErrorKind::InvalidConfig,
            serialport::ErrorKind::Io(io_kind) => kind_for_io(io_kind, &e.description),
            serialport::ErrorKind::Unknown => kind_for_io(std::io::ErrorKind::Other, &e.description),
        };
        Self::new(kind, e.description)
    }
}

impl From<serde_json::Error> for SerialError {
    fn from(e: serde_json::Error) -> Self {
        Self::storage(e.to_string())
    }
}

impl From<WizardError> for SerialError {
    fn from(e: WizardError) -> Self {
        Self::new(SerialErrorKind::Wizard, e.to_string())
    }
}

impl From<SerialError> for String {
    fn from(e: SerialError) -> String {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_error_builder() {
        let err = SerialError::port_not_found("device vanished")
            .with_port("COM99")
            .with_session("abc-123");
        assert_eq!(err.kind, SerialErrorKind::PortNotFound);
        assert_eq!(err.port_name.as_deref(), Some("COM99"));
        assert_eq!(err.session_id.as_deref(), Some("abc-123"));
        assert_eq!(err.to_string(), "[PortNotFound] COM99: device vanished");
    }

    #[test]
    fn test_from_io_error_kinds() {
        let denied: SerialError = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope").into();
        assert_eq!(denied.kind, SerialErrorKind::PermissionDenied);
        let busy: SerialError = std::io::Error::new(std::io::ErrorKind::Other, "Device or resource busy").into();
        assert_eq!(busy.kind, SerialErrorKind::PortBusy);
        let other: SerialError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe").into();
        assert_eq!(other.kind, SerialErrorKind::IoError);
    }

    #[test]
    fn test_from_serialport_error() {
        let err: SerialError = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone").into();
        assert_eq!(err.kind, SerialErrorKind::PortNotFound);
        assert_eq!(err.message, "gone");
    }

    #[test]
    fn test_from_wizard_error() {
        let err: SerialError = WizardError::new("enumeration failed").in_step("path").into();
        assert_eq!(err.kind, SerialErrorKind::Wizard);
        assert!(err.message.contains("enumeration failed"));
    }
}
