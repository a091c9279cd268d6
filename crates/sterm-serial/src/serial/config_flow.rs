//! Port configuration wizard.
//!
//! Steps, in order: recent configurations (only when there are any),
//! path, baud rate, data bits, parity, stop bits.  Picking a recent entry
//! finishes the flow at once.  The five full-path steps carry a `n/5`
//! counter; the recent pick carries none.

use crate::serial::error::SerialResult;
use crate::serial::port_scanner;
use crate::serial::recent::RecentConfigs;
use crate::serial::transport::SerialDriver;
use crate::serial::types::*;
use std::sync::Arc;
use sterm_wizard::wizard::{
    validator, Flow, InputBoxParams, InputStep, MultiStepInput, PromptHost, QuickPickItem, QuickPickParams, Reply,
    ResumePolicy, Step, Wizard, WizardError, WizardOutcome, WizardResult,
};

pub const WIZARD_TITLE: &str = "Serial Port Configuration";
pub const TOTAL_STEPS: usize = 5;
/// Sentinel menu entry for "something not listed".
pub const OTHER_LABEL: &str = "[other]";
/// Baud rate used when the baud menu is accepted with nothing selected.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

type FlowStep = Step<PortConfigDraft>;

/// Result of a plain menu prompt.
enum Choice {
    Picked(String),
    Nothing,
    Navigate(Flow),
}

async fn menu(
    input: &mut MultiStepInput,
    step: usize,
    placeholder: &str,
    labels: Vec<String>,
    current: Option<String>,
) -> Choice {
    let active = current.and_then(|c| labels.iter().position(|l| *l == c));
    let items = labels.into_iter().map(QuickPickItem::new).collect();
    let mut params = QuickPickParams::new(WIZARD_TITLE, items)
        .step(step, TOTAL_STEPS)
        .placeholder(placeholder);
    if let Some(index) = active {
        params = params.active_item(index);
    }
    match input.show_quick_pick(params).await {
        Reply::Value(Some(item)) => Choice::Picked(item.label),
        Reply::Value(None) | Reply::Button(_) => Choice::Nothing,
        Reply::Flow(flow) => Choice::Navigate(flow),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Steps
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct PickRecent {
    recent: Vec<PortConfig>,
    driver: Arc<dyn SerialDriver>,
}

#[async_trait::async_trait]
impl InputStep<PortConfigDraft> for PickRecent {
    async fn run(&self, input: &mut MultiStepInput, state: &mut PortConfigDraft) -> WizardResult<FlowStep> {
        let pick_path = || Step::next(PickPath { driver: self.driver.clone() });
        if self.recent.is_empty() {
            return Ok(pick_path());
        }

        let mut items = vec![QuickPickItem::new(OTHER_LABEL)];
        items.extend(
            self.recent
                .iter()
                .map(|c| QuickPickItem::new(c.path.clone()).with_description(c.summary())),
        );
        let params = QuickPickParams::new(WIZARD_TITLE, items.clone()).placeholder("Select a port configuration");

        match input.show_quick_pick(params).await {
            Reply::Value(Some(item)) => {
                let chosen = items
                    .iter()
                    .position(|i| *i == item)
                    .and_then(|index| index.checked_sub(1))
                    .and_then(|index| self.recent.get(index));
                match chosen {
                    Some(config) => {
                        state.fill_from(config);
                        Ok(Step::Complete)
                    }
                    None => Ok(pick_path()),
                }
            }
            Reply::Value(None) | Reply::Button(_) => Ok(pick_path()),
            Reply::Flow(flow) => Ok(flow.into()),
        }
    }
}

struct PickPath {
    driver: Arc<dyn SerialDriver>,
}

impl PickPath {
    /// Free-text fallback when enumeration finds nothing.
    async fn enter_path(&self, input: &mut MultiStepInput, state: &PortConfigDraft) -> Option<Choice> {
        let params = InputBoxParams::new(WIZARD_TITLE, "No serial ports found. Enter a device path")
            .step(1, TOTAL_STEPS)
            .value(state.path.clone().unwrap_or_default())
            .validate(validator(|value: String| async move {
                if value.trim().is_empty() {
                    Some("A device path is required".to_string())
                } else {
                    None
                }
            }));
        match input.show_input_box(params).await {
            Reply::Value(path) => Some(Choice::Picked(path.trim().to_string())),
            Reply::Button(_) => None,
            Reply::Flow(flow) => Some(Choice::Navigate(flow)),
        }
    }
}

#[async_trait::async_trait]
impl InputStep<PortConfigDraft> for PickPath {
    async fn run(&self, input: &mut MultiStepInput, state: &mut PortConfigDraft) -> WizardResult<FlowStep> {
        let ports = self
            .driver
            .list_ports()
            .await
            .map_err(|e| WizardError::new(format!("port enumeration failed: {}", e)).in_step("path"))?;

        let choice = if ports.is_empty() {
            self.enter_path(input, state).await.unwrap_or(Choice::Nothing)
        } else {
            let items: Vec<QuickPickItem> = ports
                .iter()
                .map(|p| QuickPickItem::new(p.port_name.clone()).with_description(port_scanner::describe_port(p)))
                .collect();
            let mut params = QuickPickParams::new(WIZARD_TITLE, items)
                .step(1, TOTAL_STEPS)
                .placeholder("Select a serial port");
            if let Some(index) = state
                .path
                .as_ref()
                .and_then(|path| ports.iter().position(|p| p.port_name == *path))
            {
                params = params.active_item(index);
            }
            match input.show_quick_pick(params).await {
                Reply::Value(Some(item)) => Choice::Picked(item.label),
                Reply::Value(None) | Reply::Button(_) => Choice::Nothing,
                Reply::Flow(flow) => Choice::Navigate(flow),
            }
        };

        match choice {
            Choice::Picked(path) => {
                state.path = Some(path);
                Ok(Step::next(PickBaudRate))
            }
            // A path is mandatory: ask again.
            Choice::Nothing => Ok(Step::Resume),
            Choice::Navigate(flow) => Ok(flow.into()),
        }
    }
}

struct PickBaudRate;

#[async_trait::async_trait]
impl InputStep<PortConfigDraft> for PickBaudRate {
    async fn run(&self, input: &mut MultiStepInput, state: &mut PortConfigDraft) -> WizardResult<FlowStep> {
        let mut labels: Vec<String> = BaudRate::menu().iter().map(|r| r.to_string()).collect();
        labels.push(OTHER_LABEL.to_string());
        let current = state.baud_rate.as_ref().map(|b| b.to_string());

        let baud = match menu(input, 2, "Select a baud rate", labels, current).await {
            Choice::Picked(label) if label == OTHER_LABEL => {
                let params = InputBoxParams::new(WIZARD_TITLE, "Enter a baud rate").step(2, TOTAL_STEPS);
                match input.show_input_box(params).await {
                    Reply::Value(text) => BaudRate::from(text),
                    Reply::Button(_) => return Ok(Step::Resume),
                    Reply::Flow(flow) => return Ok(flow.into()),
                }
            }
            Choice::Picked(label) => BaudRate::from(label),
            Choice::Nothing => BaudRate::from(DEFAULT_BAUD_RATE),
            Choice::Navigate(flow) => return Ok(flow.into()),
        };
        state.baud_rate = Some(baud);
        Ok(Step::next(PickDataBits))
    }
}

struct PickDataBits;

#[async_trait::async_trait]
impl InputStep<PortConfigDraft> for PickDataBits {
    async fn run(&self, input: &mut MultiStepInput, state: &mut PortConfigDraft) -> WizardResult<FlowStep> {
        let labels = DataBits::menu().iter().map(|d| d.value().to_string()).collect();
        let current = state.data_bits.map(|d| d.value().to_string());
        state.data_bits = Some(match menu(input, 3, "Select data bits", labels, current).await {
            Choice::Picked(label) => DataBits::from_label(&label).unwrap_or_default(),
            Choice::Nothing => DataBits::default(),
            Choice::Navigate(flow) => return Ok(flow.into()),
        });
        Ok(Step::next(PickParity))
    }
}

struct PickParity;

#[async_trait::async_trait]
impl InputStep<PortConfigDraft> for PickParity {
    async fn run(&self, input: &mut MultiStepInput, state: &mut PortConfigDraft) -> WizardResult<FlowStep> {
        let labels = Parity::menu().iter().map(|p| p.name().to_string()).collect();
        let current = state.parity.map(|p| p.name().to_string());
        state.parity = Some(match menu(input, 4, "Select parity", labels, current).await {
            Choice::Picked(label) => Parity::from_name(&label).unwrap_or_default(),
            Choice::Nothing => Parity::default(),
            Choice::Navigate(flow) => return Ok(flow.into()),
        });
        Ok(Step::next(PickStopBits))
    }
}

struct PickStopBits;

#[async_trait::async_trait]
impl InputStep<PortConfigDraft> for PickStopBits {
    async fn run(&self, input: &mut MultiStepInput, state: &mut PortConfigDraft) -> WizardResult<FlowStep> {
        let labels = StopBits::menu().iter().map(|s| s.value().to_string()).collect();
        let current = state.stop_bits.map(|s| s.value().to_string());
        state.stop_bits = Some(match menu(input, 5, "Select stop bits", labels, current).await {
            Choice::Picked(label) => StopBits::from_label(&label).unwrap_or_default(),
            Choice::Nothing => StopBits::default(),
            Choice::Navigate(flow) => return Ok(flow.into()),
        });
        Ok(Step::Complete)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Flow
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Collects a [`PortConfig`] from the user.
pub struct PortConfigFlow {
    driver: Arc<dyn SerialDriver>,
    prompts: Arc<dyn PromptHost>,
    resume: Arc<dyn ResumePolicy>,
}

impl PortConfigFlow {
    pub fn new(driver: Arc<dyn SerialDriver>, prompts: Arc<dyn PromptHost>, resume: Arc<dyn ResumePolicy>) -> Self {
        Self { driver, prompts, resume }
    }

    /// Run the wizard.  `Ok(None)` means the user cancelled.
    pub async fn run(&self, recent: &RecentConfigs) -> SerialResult<Option<PortConfig>> {
        let start: Arc<dyn InputStep<PortConfigDraft>> = if recent.is_empty() {
            Arc::new(PickPath { driver: self.driver.clone() })
        } else {
            Arc::new(PickRecent {
                recent: recent.entries().to_vec(),
                driver: self.driver.clone(),
            })
        };

        let mut draft = PortConfigDraft::default();
        let wizard = Wizard::new(self.prompts.clone(), self.resume.clone());
        match wizard.run(start, &mut draft).await? {
            WizardOutcome::Completed => Ok(draft.finish()),
            WizardOutcome::Aborted => Ok(None),
        }
    }
}
