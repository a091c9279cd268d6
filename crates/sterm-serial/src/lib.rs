//! # Serial Terminal – Serial Session Bridge
//!
//! Bridges one serial port to an interactive terminal surface:
//!
//! - **Configuration wizard** – path, baud rate, data bits, parity and stop
//!   bits collected step by step, seeded by recently used configurations
//! - **Recent configurations** – bounded most-recent-first history kept in
//!   the host's persisted state
//! - **Transport** – async driver/transport traits over `serialport`, plus an
//!   in-memory simulated driver
//! - **Session bridge** – connect / disconnect / error recovery, byte relay
//!   to the display surface, input forwarding, log export

pub mod serial;
