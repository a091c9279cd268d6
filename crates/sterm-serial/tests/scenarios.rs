//! End-to-end bridge scenarios against the simulated driver and scripted prompts.

use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sterm_serial::serial::recent::RECENT_CONFIGS_KEY;
use sterm_serial::serial::*;
use sterm_wizard::wizard::scripted::{Scripted, ScriptedPrompts};
use sterm_wizard::wizard::{NeverResume, WidgetEvent};
use tokio::sync::mpsc::UnboundedReceiver;

// ── Collaborators ────────────────────────────────────────────────

#[derive(Default)]
struct Surface {
    messages: Mutex<Vec<DisplayMessage>>,
}

impl DisplaySurface for Surface {
    fn post(&self, message: DisplayMessage) {
        self.messages.lock().unwrap().push(message);
    }
}

impl Surface {
    fn messages(&self) -> Vec<DisplayMessage> {
        self.messages.lock().unwrap().clone()
    }

    fn stdout(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                DisplayMessage::Stdout(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

#[derive(Default)]
struct Shell {
    running: Mutex<Vec<bool>>,
    save_to: Mutex<Option<PathBuf>>,
    suggested: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl HostShell for Shell {
    fn set_running(&self, running: bool) {
        self.running.lock().unwrap().push(running);
    }

    async fn show_save_dialog(&self, suggested_name: &str) -> Option<PathBuf> {
        self.suggested.lock().unwrap().push(suggested_name.to_string());
        self.save_to.lock().unwrap().clone()
    }
}

struct Rig {
    bridge: SessionBridge,
    events: UnboundedReceiver<LinkEvent>,
    driver: Arc<SimulatedDriver>,
    prompts: Arc<ScriptedPrompts>,
    store: Arc<MemoryStateStore>,
    surface: Arc<Surface>,
    shell: Arc<Shell>,
}

fn rig(ports: &[&str], store: MemoryStateStore, script: Vec<Scripted>) -> Rig {
    let driver = Arc::new(SimulatedDriver::with_port_names(ports));
    let prompts = ScriptedPrompts::new(script);
    let store = Arc::new(store);
    let surface = Arc::new(Surface::default());
    let shell = Arc::new(Shell::default());
    let flow = PortConfigFlow::new(driver.clone(), prompts.clone(), Arc::new(NeverResume));
    let (bridge, events) = SessionBridge::new(
        driver.clone(),
        flow,
        store.clone(),
        surface.clone(),
        shell.clone(),
        SessionOptions::default(),
    );
    Rig {
        bridge,
        events,
        driver,
        prompts,
        store,
        surface,
        shell,
    }
}

fn select(index: Option<usize>) -> Scripted {
    Scripted::Event(WidgetEvent::Selected(index))
}

fn hidden() -> Scripted {
    Scripted::Event(WidgetEvent::Hidden)
}

/// First port, 9600 baud, nothing selected for the remaining steps.
fn default_picks() -> Vec<Scripted> {
    vec![select(Some(0)), select(Some(4)), select(None), select(None), select(None)]
}

fn expected_default(path: &str) -> PortConfig {
    PortConfig {
        path: path.to_string(),
        baud_rate: BaudRate::from("9600"),
        data_bits: DataBits::Eight,
        parity: Parity::None,
        stop_bits: StopBits::One,
    }
}

async fn recent(store: &MemoryStateStore) -> Vec<PortConfig> {
    RecentConfigs::load(store).await.entries().to_vec()
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..500 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached");
}

// ── Connect ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_with_empty_history_uses_defaults() {
    let mut rig = rig(&["/dev/ttyUSB0"], MemoryStateStore::new(), default_picks());

    let outcome = rig.bridge.connect().await;
    let expected = expected_default("/dev/ttyUSB0");
    assert_eq!(outcome, ConnectOutcome::Connected(expected.clone()));
    assert_eq!(rig.bridge.state(), SessionState::Open);
    assert_eq!(rig.bridge.active_config(), Some(&expected));
    assert!(rig.bridge.connected_since().is_some());
    assert_eq!(recent(&rig.store).await, vec![expected.clone()]);
    assert_eq!(rig.driver.opened_configs(), vec![expected]);
    assert_eq!(rig.surface.messages(), vec![DisplayMessage::Connected(true)]);
    assert_eq!(*rig.shell.running.lock().unwrap(), vec![true]);

    let stored = rig.store.snapshot(RECENT_CONFIGS_KEY).unwrap();
    assert_eq!(
        stored,
        json!([{"path": "/dev/ttyUSB0", "baudRate": "9600", "dataBits": 8, "parity": "none", "stopBits": 1}])
    );
    rig.bridge.disconnect().await;
}

#[tokio::test]
async fn test_fourth_connect_evicts_oldest() {
    let history = json!([
        {"path": "A", "baudRate": "9600", "dataBits": 8, "parity": "none", "stopBits": 1},
        {"path": "B", "baudRate": "9600", "dataBits": 8, "parity": "none", "stopBits": 1},
        {"path": "C", "baudRate": "9600", "dataBits": 8, "parity": "none", "stopBits": 1}
    ]);
    let store = MemoryStateStore::new().with_value(RECENT_CONFIGS_KEY, history);
    let mut script = vec![select(Some(0))];
    script.extend(default_picks());
    let mut rig = rig(&["/dev/ttyUSB0"], store, script);

    assert!(matches!(rig.bridge.connect().await, ConnectOutcome::Connected(_)));
    let paths: Vec<String> = recent(&rig.store).await.into_iter().map(|c| c.path).collect();
    assert_eq!(paths, vec!["/dev/ttyUSB0", "A", "B"]);
    rig.bridge.disconnect().await;
}

#[tokio::test]
async fn test_recent_pick_opens_identical_config() {
    let mut stored = PortConfig::new("/dev/ttyACM0", "115200");
    stored.data_bits = DataBits::Seven;
    stored.parity = Parity::Odd;
    stored.stop_bits = StopBits::Two;
    let store = MemoryStateStore::new().with_value(RECENT_CONFIGS_KEY, json!([stored]));
    let mut rig = rig(&["/dev/ttyACM0"], store, vec![select(Some(1))]);

    assert_eq!(rig.bridge.connect().await, ConnectOutcome::Connected(stored.clone()));
    assert_eq!(rig.driver.opened_configs(), vec![stored.clone()]);
    assert_eq!(recent(&rig.store).await, vec![stored]);
    rig.bridge.disconnect().await;
}

#[tokio::test]
async fn test_legacy_single_object_history_is_offered() {
    let legacy = json!({"path": "COM3", "baudRate": 57600, "dataBits": 8, "parity": "none", "stopBits": 1});
    let store = MemoryStateStore::new().with_value(RECENT_CONFIGS_KEY, legacy);
    let mut rig = rig(&["COM3"], store, vec![select(Some(1))]);

    match rig.bridge.connect().await {
        ConnectOutcome::Connected(config) => assert_eq!(config.baud_rate.as_str(), "57600"),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(rig.store.snapshot(RECENT_CONFIGS_KEY).unwrap().is_array());
    rig.bridge.disconnect().await;
}

#[tokio::test]
async fn test_cancelling_at_any_step_changes_nothing() {
    let history = json!([{"path": "COM1", "baudRate": "9600", "dataBits": 8, "parity": "none", "stopBits": 1}]);
    // [other], path, baud, data bits, parity, then dismiss the following prompt.
    let picks = [select(Some(0)), select(Some(0)), select(Some(0)), select(None), select(None)];
    for answered in 0..=picks.len() {
        let store = MemoryStateStore::new().with_value(RECENT_CONFIGS_KEY, history.clone());
        let mut script: Vec<Scripted> = picks[..answered].to_vec();
        script.push(hidden());
        let mut rig = rig(&["COM2"], store, script);

        assert_eq!(rig.bridge.connect().await, ConnectOutcome::Cancelled, "dismissed after {} answers", answered);
        assert_eq!(rig.bridge.state(), SessionState::Idle);
        assert_eq!(rig.store.snapshot(RECENT_CONFIGS_KEY), Some(history.clone()));
        assert!(rig.driver.opened_configs().is_empty());
        assert!(rig.surface.messages().is_empty());
        assert_eq!(rig.prompts.live(), 0);
    }
}

#[tokio::test]
async fn test_open_failure_reports_one_line() {
    let mut rig = rig(&["/dev/ttyUSB0"], MemoryStateStore::new(), default_picks());
    rig.driver.fail_open(
        "/dev/ttyUSB0",
        SerialError::new(SerialErrorKind::PortBusy, "port busy"),
    );

    let outcome = rig.bridge.connect().await;
    match outcome {
        ConnectOutcome::Failed(e) => assert_eq!(e.kind, SerialErrorKind::PortBusy),
        other => panic!("unexpected outcome {:?}", other),
    }
    let messages = rig.surface.messages();
    assert_eq!(messages.len(), 1);
    assert!(matches!(&messages[0], DisplayMessage::Stdout(line) if line.contains("port busy")));
    assert_eq!(rig.bridge.state(), SessionState::Idle);
    assert!(rig.store.snapshot(RECENT_CONFIGS_KEY).is_none());
    assert!(rig.shell.running.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_wizard_failure_is_reported_like_open_failure() {
    let mut rig = rig(&["COM1"], MemoryStateStore::new(), default_picks());
    rig.driver.fail_list(SerialError::io("enumeration failed"));

    assert!(matches!(rig.bridge.connect().await, ConnectOutcome::Failed(_)));
    assert_eq!(rig.surface.stdout().len(), 1);
    assert_eq!(rig.bridge.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_connect_while_open_is_rejected() {
    let mut rig = rig(&["COM1"], MemoryStateStore::new(), default_picks());
    assert!(matches!(rig.bridge.connect().await, ConnectOutcome::Connected(_)));
    let created = rig.prompts.created();

    assert_eq!(rig.bridge.connect().await, ConnectOutcome::AlreadyActive);
    assert_eq!(rig.prompts.created(), created);
    assert_eq!(rig.driver.opened_configs().len(), 1);
    rig.bridge.disconnect().await;
}

// ── Data path ────────────────────────────────────────────────────

#[tokio::test]
async fn test_input_reaches_port_only_while_open() {
    let mut rig = rig(&["COM1"], MemoryStateStore::new(), default_picks());
    rig.bridge.write(b"ignored").await;

    rig.bridge.connect().await;
    let transport = rig.driver.transport("COM1").unwrap();
    rig.bridge
        .handle_surface_message(SurfaceMessage::Stdin(b"AT\r".to_vec()))
        .await
        .unwrap();
    assert_eq!(transport.drain_tx().await, b"AT\r");
    assert_eq!(transport.write_calls(), 1);

    assert!(rig.bridge.disconnect().await);
    rig.bridge.write(b"late").await;
    assert_eq!(transport.write_calls(), 1);
}

#[tokio::test]
async fn test_port_output_is_relayed_as_text() {
    let mut rig = rig(&["COM1"], MemoryStateStore::new(), default_picks());
    rig.bridge.connect().await;
    let transport = rig.driver.transport("COM1").unwrap();

    transport.inject_rx("temp: 21°C\r\n".as_bytes()).await;
    let surface = rig.surface.clone();
    wait_until(move || surface.stdout().concat() == "temp: 21°C\r\n").await;
    rig.bridge.disconnect().await;
}

#[tokio::test]
async fn test_disconnect_when_idle_is_silent() {
    let mut rig = rig(&["COM1"], MemoryStateStore::new(), vec![]);
    assert!(!rig.bridge.disconnect().await);
    assert!(rig.surface.messages().is_empty());
    assert!(rig.shell.running.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_disconnect_closes_and_notifies() {
    let mut rig = rig(&["COM1"], MemoryStateStore::new(), default_picks());
    rig.bridge.connect().await;
    let transport = rig.driver.transport("COM1").unwrap();

    assert!(rig.bridge.disconnect().await);
    assert!(!transport.is_open());
    assert_eq!(rig.bridge.state(), SessionState::Idle);
    assert_eq!(rig.bridge.link_id(), None);
    assert_eq!(rig.surface.messages().last(), Some(&DisplayMessage::Connected(false)));
    assert_eq!(*rig.shell.running.lock().unwrap(), vec![true, false]);
}

// ── Failures on an open link ─────────────────────────────────────

#[tokio::test]
async fn test_read_failure_drops_to_idle() {
    let mut rig = rig(&["COM1"], MemoryStateStore::new(), default_picks());
    rig.bridge.connect().await;
    let transport = rig.driver.transport("COM1").unwrap();

    transport.fail_next_read(SerialError::io("device unplugged"));
    let event = rig.events.recv().await.unwrap();
    rig.bridge.handle_link_event(event).await;

    assert_eq!(rig.bridge.state(), SessionState::Idle);
    assert!(!transport.is_open());
    let lines = rig.surface.stdout();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("device unplugged"));
    assert_eq!(rig.surface.messages().last(), Some(&DisplayMessage::Connected(false)));
    assert_eq!(*rig.shell.running.lock().unwrap(), vec![true, false]);
    // No automatic reconnect.
    assert_eq!(rig.driver.opened_configs().len(), 1);
}

#[tokio::test]
async fn test_write_failure_drops_to_idle() {
    let mut rig = rig(&["COM1"], MemoryStateStore::new(), default_picks());
    rig.bridge.connect().await;
    let transport = rig.driver.transport("COM1").unwrap();

    transport.fail_next_write(SerialError::io("tx fault"));
    rig.bridge.write(b"x").await;
    assert_eq!(rig.bridge.state(), SessionState::Idle);
    assert!(rig.surface.stdout()[0].contains("tx fault"));
}

#[tokio::test]
async fn test_stale_link_events_are_ignored() {
    let mut rig = rig(&["COM1"], MemoryStateStore::new(), default_picks());
    rig.bridge.connect().await;

    rig.bridge
        .handle_link_event(LinkEvent::Closed {
            link_id: uuid::Uuid::new_v4(),
        })
        .await;
    assert_eq!(rig.bridge.state(), SessionState::Open);
    rig.bridge.disconnect().await;
}

// ── Host commands ────────────────────────────────────────────────

#[tokio::test]
async fn test_host_commands_drive_the_bridge() {
    let mut rig = rig(&["COM1"], MemoryStateStore::new(), default_picks());
    rig.bridge.handle_command(HostCommand::Start).await;
    assert_eq!(rig.bridge.state(), SessionState::Open);
    rig.bridge.handle_command(HostCommand::Clear).await;
    rig.bridge.handle_command(HostCommand::Save).await;
    rig.bridge.handle_command(HostCommand::Stop).await;
    assert_eq!(
        rig.surface.messages(),
        vec![
            DisplayMessage::Connected(true),
            DisplayMessage::Clear,
            DisplayMessage::Save,
            DisplayMessage::Connected(false),
        ]
    );
}

#[tokio::test]
async fn test_save_writes_log_to_chosen_file() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("session.log");
    let rig = rig(&["COM1"], MemoryStateStore::new(), vec![]);
    *rig.shell.save_to.lock().unwrap() = Some(target.clone());

    let mut bridge = rig.bridge;
    bridge
        .handle_surface_message(SurfaceMessage::Save("boot ok\r\n".into()))
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "boot ok\r\n");
    let suggested = rig.shell.suggested.lock().unwrap().clone();
    assert!(suggested[0].starts_with("serial-") && suggested[0].ends_with(".log"));
}

#[tokio::test]
async fn test_dismissed_save_dialog_is_a_no_op() {
    let rig = rig(&["COM1"], MemoryStateStore::new(), vec![]);
    assert_eq!(rig.bridge.save("data").await.unwrap(), None);
    assert!(rig.surface.messages().is_empty());
}
