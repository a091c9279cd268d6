//! Shared types for the serial bridge.
//!
//! Covers port configuration (and its in-progress wizard form), port
//! discovery info, session state, and the message protocol spoken with
//! the display surface and host.

use crate::serial::error::{SerialError, SerialResult};
use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Port Configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Baud rate as the user entered it.
///
/// Kept textual because the free-text entry is not validated; it is
/// parsed when the transport opens.  Deserializes from a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawBaudRate", into = "String")]
pub struct BaudRate(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBaudRate {
    Text(String),
    Number(u64),
}

impl From<RawBaudRate> for BaudRate {
    fn from(raw: RawBaudRate) -> Self {
        match raw {
            RawBaudRate::Text(s) => Self(s),
            RawBaudRate::Number(n) => Self(n.to_string()),
        }
    }
}

impl From<BaudRate> for String {
    fn from(b: BaudRate) -> String {
        b.0
    }
}

impl From<&str> for BaudRate {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BaudRate {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u32> for BaudRate {
    fn from(v: u32) -> Self {
        Self(v.to_string())
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        Self::from(9600)
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl BaudRate {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value; fails unless the text is a positive integer.
    pub fn value(&self) -> SerialResult<u32> {
        match self.0.trim().parse::<u32>() {
            Ok(v) if v > 0 => Ok(v),
            _ => Err(SerialError::invalid_config(format!("Invalid baud rate '{}'", self.0))),
        }
    }

    /// Rates offered by the configuration wizard, fastest first.
    pub fn menu() -> [u32; 6] {
        [115200, 57600, 38400, 19200, 9600, 4800]
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl Default for DataBits {
    fn default() -> Self {
        Self::Eight
    }
}

impl DataBits {
    pub fn value(&self) -> u8 {
        match self {
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }

    pub fn from_value(v: u8) -> Option<Self> {
        match v {
            5 => Some(Self::Five),
            6 => Some(Self::Six),
            7 => Some(Self::Seven),
            8 => Some(Self::Eight),
            _ => None,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        label.trim().parse::<u8>().ok().and_then(Self::from_value)
    }

    /// Wizard menu order.
    pub fn menu() -> [Self; 4] {
        [Self::Eight, Self::Seven, Self::Six, Self::Five]
    }
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Self::from_value(v).ok_or_else(|| format!("data bits must be 5, 6, 7 or 8 (got {})", v))
    }
}

impl From<DataBits> for u8 {
    fn from(d: DataBits) -> u8 {
        d.value()
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Even,
    Mark,
    Odd,
    Space,
}

impl Default for Parity {
    fn default() -> Self {
        Self::None
    }
}

impl Parity {
    /// Single-letter shorthand ("8N1" style).
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "N",
            Self::Odd => "O",
            Self::Even => "E",
            Self::Mark => "M",
            Self::Space => "S",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Even => "even",
            Self::Mark => "mark",
            Self::Odd => "odd",
            Self::Space => "space",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::menu().into_iter().find(|p| p.name() == name.trim())
    }

    /// Wizard menu order.
    pub fn menu() -> [Self; 5] {
        [Self::None, Self::Even, Self::Mark, Self::Odd, Self::Space]
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    One,
    Two,
}

impl Default for StopBits {
    fn default() -> Self {
        Self::One
    }
}

impl StopBits {
    pub fn value(&self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "1" => Some(Self::One),
            "2" => Some(Self::Two),
            _ => None,
        }
    }

    pub fn menu() -> [Self; 2] {
        [Self::One, Self::Two]
    }
}

impl TryFrom<u8> for StopBits {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(format!("stop bits must be 1 or 2 (got {})", other)),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(s: StopBits) -> u8 {
        s.value()
    }
}

/// Complete serial port configuration.  Persisted as
/// `{path, baudRate, dataBits, parity, stopBits}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortConfig {
    /// Device path (e.g. `/dev/ttyUSB0`, `COM3`).
    pub path: String,
    pub baud_rate: BaudRate,
    #[serde(default)]
    pub data_bits: DataBits,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default)]
    pub stop_bits: StopBits,
}

impl PortConfig {
    pub fn new(path: impl Into<String>, baud_rate: impl Into<BaudRate>) -> Self {
        Self {
            path: path.into(),
            baud_rate: baud_rate.into(),
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
        }
    }

    /// Shorthand notation (e.g. "9600-8N1").
    pub fn shorthand(&self) -> String {
        format!(
            "{}-{}{}{}",
            self.baud_rate,
            self.data_bits.value(),
            self.parity.label(),
            self.stop_bits.value()
        )
    }

    /// One-line description used when listing recent configurations.
    pub fn summary(&self) -> String {
        format!(
            "baudRate: {}, dataBits: {}, parity: {}, stopBits: {}",
            self.baud_rate,
            self.data_bits.value(),
            self.parity.name(),
            self.stop_bits.value()
        )
    }
}

/// A configuration being assembled by the wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortConfigDraft {
    pub path: Option<String>,
    pub baud_rate: Option<BaudRate>,
    pub data_bits: Option<DataBits>,
    pub parity: Option<Parity>,
    pub stop_bits: Option<StopBits>,
}

impl PortConfigDraft {
    /// Copy all five fields from a finished configuration.
    pub fn fill_from(&mut self, config: &PortConfig) {
        self.path = Some(config.path.clone());
        self.baud_rate = Some(config.baud_rate.clone());
        self.data_bits = Some(config.data_bits);
        self.parity = Some(config.parity);
        self.stop_bits = Some(config.stop_bits);
    }

    /// Finish the draft.  `None` when path or baud rate were never chosen.
    pub fn finish(self) -> Option<PortConfig> {
        let path = self.path.filter(|p| !p.trim().is_empty())?;
        Some(PortConfig {
            path,
            baud_rate: self.baud_rate?,
            data_bits: self.data_bits.unwrap_or_default(),
            parity: self.parity.unwrap_or_default(),
            stop_bits: self.stop_bits.unwrap_or_default(),
        })
    }
}

/// Line ending appended to typed lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    None,
    Cr,
    Lf,
    CrLf,
}

impl Default for LineEnding {
    fn default() -> Self {
        Self::Cr
    }
}

impl LineEnding {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::None => b"",
            Self::Cr => b"\r",
            Self::Lf => b"\n",
            Self::CrLf => b"\r\n",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Port Information
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Information about a discovered serial port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialPortInfo {
    /// System port name (e.g. `COM3`, `/dev/ttyUSB0`).
    pub port_name: String,
    pub port_type: PortType,
    pub description: Option<String>,
    pub manufacturer: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub serial_number: Option<String>,
    /// Friendly name, e.g. "/dev/ttyUSB0 - Silicon Labs CP2102".
    pub display_name: String,
}

/// Type of serial port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PortType {
    UsbSerial,
    Native,
    Pci,
    Bluetooth,
    Virtual,
    Unknown,
}

impl PortType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::UsbSerial => "USB-Serial",
            Self::Native => "Native",
            Self::Pci => "PCI",
            Self::Bluetooth => "Bluetooth",
            Self::Virtual => "Virtual",
            Self::Unknown => "Unknown",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Lifecycle of the bridge's single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closing,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Display surface protocol
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Bridge → display surface.  Wire form `{"type": .., "value": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum DisplayMessage {
    Connected(bool),
    Stdout(String),
    Clear,
    /// Ask the surface to hand back its buffered log.
    Save,
}

/// Display surface → bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum SurfaceMessage {
    /// Raw keystrokes / pasted text.
    Stdin(Vec<u8>),
    /// Full buffered log, in reply to [`DisplayMessage::Save`].
    Save(String),
}

/// User-invocable host actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostCommand {
    Start,
    Stop,
    Clear,
    Save,
}

impl std::str::FromStr for HostCommand {
    type Err = SerialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "clear" => Ok(Self::Clear),
            "save" => Ok(Self::Save),
            other => Err(SerialError::invalid_config(format!("Unknown command '{}'", other))),
        }
    }
}
