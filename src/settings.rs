//! # Settings
//!
//! Application settings and command-line overrides.
//!
//! Settings live in a camelCase JSON file, by default
//! `<config_dir>/serial-terminal/settings.json`.  Every field has a default,
//! so a partial file (or no file at all) is valid.  A file that exists but
//! does not parse is reported as an error rather than silently ignored.

use crate::error::{AppError, AppResult};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use sterm_serial::serial::LineEnding;

/// Directory name used under the platform config / data directories.
pub const APP_DIR: &str = "serial-terminal";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// JSON file holding persisted state (recent configurations).
    pub state_file: PathBuf,
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Appended to every line typed at the console.
    pub line_ending: LineEnding,
    pub read_timeout_ms: u64,
    pub read_buffer_size: usize,
    /// Bytes of port output kept for log export.
    pub log_capacity: usize,
    /// Dismissed prompts re-shown before the wizard gives up.
    pub max_resumes: usize,
    /// Use the in-memory loopback driver instead of real ports.
    pub simulate: bool,
    pub simulated_ports: Vec<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            log_level: "warn".to_string(),
            line_ending: LineEnding::Cr,
            read_timeout_ms: 50,
            read_buffer_size: 4096,
            log_capacity: 1024 * 1024,
            max_resumes: 0,
            simulate: false,
            simulated_ports: vec!["/dev/ttySIM0".to_string(), "/dev/ttySIM1".to_string()],
        }
    }
}

fn default_state_file() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("state.json")
}

impl AppSettings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("settings.json"))
    }

    /// Load from `path`, or from [`AppSettings::default_path`] when `None`.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => return Ok(Self::default()),
        };
        if !path.exists() {
            log::debug!("no settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        serde_json::from_str(&text).map_err(|source| AppError::Settings { path, source })
    }

    /// Apply command-line overrides.
    pub fn apply(&mut self, args: &CliArgs) {
        if args.simulate {
            self.simulate = true;
        }
        if let Some(state) = &args.state {
            self.state_file = state.clone();
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Command line
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Command-line overrides for the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Parser)]
#[command(
    name = "serial-terminal",
    about = "Interactive serial port terminal with a guided port configuration wizard",
    version
)]
pub struct CliArgs {
    /// Settings JSON (default: <config dir>/serial-terminal/settings.json)
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,
    /// Persisted state JSON; overrides the stateFile setting
    #[arg(long, value_name = "FILE")]
    pub state: Option<PathBuf>,
    /// Use the in-memory loopback driver
    #[arg(long)]
    pub simulate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"lineEnding": "crlf", "maxResumes": 2, "simulate": true}}"#).unwrap();

        let settings = assert_ok!(AppSettings::load(Some(file.path())));
        assert_eq!(settings.line_ending, LineEnding::CrLf);
        assert_eq!(settings.max_resumes, 2);
        assert!(settings.simulate);
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.read_buffer_size, 4096);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = assert_ok!(AppSettings::load(Some(&dir.path().join("absent.json"))));
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = assert_err!(AppSettings::load(Some(file.path())));
        assert!(matches!(err, AppError::Settings { .. }));
    }

    #[test]
    fn test_cli_parse_and_apply() {
        let args = assert_ok!(CliArgs::try_parse_from(["serial-terminal", "--simulate", "--state", "/tmp/s.json"]));
        assert!(args.simulate);
        assert_eq!(args.settings, None);
        let mut settings = AppSettings::default();
        settings.apply(&args);
        assert!(settings.simulate);
        assert_eq!(settings.state_file, PathBuf::from("/tmp/s.json"));
    }

    #[test]
    fn test_cli_rejects_unknown_and_dangling() {
        let err = assert_err!(CliArgs::try_parse_from(["serial-terminal", "--baud"]));
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
        assert_err!(CliArgs::try_parse_from(["serial-terminal", "--settings"]));
        let help = assert_err!(CliArgs::try_parse_from(["serial-terminal", "-h"]));
        assert_eq!(help.kind(), ErrorKind::DisplayHelp);
        assert!(help.to_string().contains("--simulate"));
    }
}
