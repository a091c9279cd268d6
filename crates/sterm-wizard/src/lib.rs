//! # Serial Terminal – Wizard
//!
//! Generic multi-step prompt runner:
//!
//! - **Engine** – a stack of executed steps with back / cancel / resume
//!   navigation driven by explicit step directives
//! - **Prompts** – quick picks and input boxes over a pluggable prompt host,
//!   one live widget at a time, live validation with stale results discarded
//! - **Scripted host** – an in-memory prompt host that replays events and
//!   journals widget lifecycle, for tests and demos

pub mod wizard;
