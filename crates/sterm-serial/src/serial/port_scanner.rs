//! Serial port discovery helpers.
//!
//! Turns raw enumeration results into [`SerialPortInfo`] records with a
//! friendly description, recognising common USB-serial bridges by VID/PID.

use crate::serial::types::*;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Known USB-serial adapters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy)]
pub struct KnownAdapter {
    pub vid: u16,
    pub pid: u16,
    pub manufacturer: &'static str,
    pub product: &'static str,
}

const fn adapter(vid: u16, pid: u16, manufacturer: &'static str, product: &'static str) -> KnownAdapter {
    KnownAdapter { vid, pid, manufacturer, product }
}

/// Bridges commonly found on development boards and console cables.
pub const KNOWN_ADAPTERS: &[KnownAdapter] = &[
    adapter(0x0403, 0x6001, "FTDI", "FT232R"),
    adapter(0x0403, 0x6010, "FTDI", "FT2232"),
    adapter(0x0403, 0x6014, "FTDI", "FT232H"),
    adapter(0x0403, 0x6015, "FTDI", "FT-X Series"),
    adapter(0x10C4, 0xEA60, "Silicon Labs", "CP2102"),
    adapter(0x10C4, 0xEA70, "Silicon Labs", "CP2105"),
    adapter(0x067B, 0x2303, "Prolific", "PL2303"),
    adapter(0x1A86, 0x7523, "WCH", "CH340"),
    adapter(0x1A86, 0x55D4, "WCH", "CH9102"),
    adapter(0x2341, 0x0043, "Arduino", "Uno R3"),
    adapter(0x2341, 0x0042, "Arduino", "Mega 2560 R3"),
    adapter(0x303A, 0x1001, "Espressif", "ESP32-S2"),
    adapter(0x0483, 0x5740, "STMicroelectronics", "STM32 VCP"),
    adapter(0x2E8A, 0x000A, "Raspberry Pi", "Pico"),
];

pub fn lookup_adapter(vid: u16, pid: u16) -> Option<&'static KnownAdapter> {
    KNOWN_ADAPTERS.iter().find(|a| a.vid == vid && a.pid == pid)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Port records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Guess a port's type from its name alone.
pub fn classify_port(port_name: &str) -> PortType {
    let lower = port_name.to_lowercase();
    if lower.contains("usb") || lower.contains("acm") {
        PortType::UsbSerial
    } else if lower.contains("bluetooth") || lower.contains("rfcomm") {
        PortType::Bluetooth
    } else if lower.contains("pts") || lower.contains("pty") {
        PortType::Virtual
    } else if lower.starts_with("com") || lower.starts_with("/dev/ttys") {
        PortType::Native
    } else {
        PortType::Unknown
    }
}

/// Human-readable description: adapter model, else the OS description,
/// else the port type.
pub fn describe_port(info: &SerialPortInfo) -> String {
    if let Some(known) = info.vid.zip(info.pid).and_then(|(v, p)| lookup_adapter(v, p)) {
        return format!("{} {}", known.manufacturer, known.product);
    }
    match (&info.manufacturer, &info.description) {
        (Some(m), Some(d)) if !d.is_empty() => format!("{} {}", m, d),
        (_, Some(d)) if !d.is_empty() => d.clone(),
        (Some(m), _) if !m.is_empty() => m.clone(),
        _ => info.port_type.label().to_string(),
    }
}

pub fn build_port_info(
    port_name: &str,
    vid: Option<u16>,
    pid: Option<u16>,
    description: Option<&str>,
    manufacturer: Option<&str>,
) -> SerialPortInfo {
    let port_type = if vid.is_some() {
        PortType::UsbSerial
    } else {
        classify_port(port_name)
    };
    let mut info = SerialPortInfo {
        port_name: port_name.to_string(),
        port_type,
        description: description.map(str::to_string),
        manufacturer: manufacturer.map(str::to_string),
        vid,
        pid,
        serial_number: None,
        display_name: String::new(),
    };
    info.display_name = format!("{} - {}", info.port_name, describe_port(&info));
    info
}

/// Convert an OS enumeration result.
pub fn from_system(port: serialport::SerialPortInfo) -> SerialPortInfo {
    match port.port_type {
        serialport::SerialPortType::UsbPort(usb) => {
            let mut info = build_port_info(
                &port.port_name,
                Some(usb.vid),
                Some(usb.pid),
                usb.product.as_deref(),
                usb.manufacturer.as_deref(),
            );
            info.serial_number = usb.serial_number;
            info
        }
        serialport::SerialPortType::PciPort => {
            let mut info = build_port_info(&port.port_name, None, None, None, None);
            info.port_type = PortType::Pci;
            info
        }
        serialport::SerialPortType::BluetoothPort => {
            let mut info = build_port_info(&port.port_name, None, None, None, None);
            info.port_type = PortType::Bluetooth;
            info
        }
        serialport::SerialPortType::Unknown => build_port_info(&port.port_name, None, None, None, None),
    }
}

/// Stable listing order: USB adapters first, then by name.
pub fn sort_ports(ports: &mut [SerialPortInfo]) {
    ports.sort_by(|a, b| {
        let rank = |p: &SerialPortInfo| if p.port_type == PortType::UsbSerial { 0 } else { 1 };
        rank(a).cmp(&rank(b)).then_with(|| a.port_name.cmp(&b.port_name))
    });
}
