pub mod console;
pub mod error;
pub mod settings;
pub mod storage;
pub mod terminal;

use console::Console;
use error::{AppError, AppResult};
use clap::error::ErrorKind;
use clap::Parser;
use settings::{AppSettings, CliArgs};
use std::sync::Arc;
use std::time::Duration;
use sterm_serial::serial::{SerialDriver, SimulatedDriver, SystemDriver};
use storage::JsonStateStore;
use terminal::Terminal;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.  `RUST_LOG` wins over `level`; `log`
/// records from the library crates are bridged into it.
pub fn init_logging(level: &str) -> AppResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| AppError::Logging(e.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))
}

/// Driver selected by the settings.
pub fn driver_for(settings: &AppSettings) -> Arc<dyn SerialDriver> {
    if settings.simulate {
        let names: Vec<&str> = settings.simulated_ports.iter().map(String::as_str).collect();
        let driver = SimulatedDriver::with_port_names(&names);
        driver.set_loopback(true);
        Arc::new(driver)
    } else {
        Arc::new(SystemDriver::new(Duration::from_millis(settings.read_timeout_ms)))
    }
}

/// Entry point behind `main`.  `args` includes the program name.
pub async fn run<I, T>(args: I) -> AppResult<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let args = match CliArgs::try_parse_from(args) {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            return Ok(());
        }
        Err(e) => return Err(AppError::Usage(e.to_string())),
    };

    let mut settings = AppSettings::load(args.settings.as_deref())?;
    settings.apply(&args);
    init_logging(&settings.log_level)?;
    tracing::info!(
        state_file = %settings.state_file.display(),
        simulate = settings.simulate,
        "starting serial-terminal"
    );

    let store = Arc::new(JsonStateStore::open(&settings.state_file).await?);
    let driver = driver_for(&settings);
    let console = Console::stdio()?;
    Terminal::new(&settings, console, driver, store).run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_simulated_driver_lists_configured_ports() {
        let settings = AppSettings {
            simulate: true,
            simulated_ports: vec!["/dev/ttySIM7".into()],
            ..AppSettings::default()
        };
        let ports = assert_ok!(driver_for(&settings).list_ports().await);
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port_name, "/dev/ttySIM7");
    }

    #[tokio::test]
    async fn test_help_exits_before_touching_files() {
        assert_ok!(run(["serial-terminal", "--help"]).await);
        assert_ok!(run(["serial-terminal", "--version"]).await);
    }

    #[tokio::test]
    async fn test_bad_argument_is_usage_error() {
        let err = run(["serial-terminal", "--baud", "9600"]).await.err().unwrap();
        assert!(matches!(err, AppError::Usage(_)));
    }
}
