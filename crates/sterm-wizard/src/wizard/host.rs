//! Prompt host abstraction.
//!
//! The engine never draws anything itself.  A [`PromptHost`] creates
//! widgets, and each [`PromptWidget`] reports what the user did through
//! [`PromptWidget::next_event`].

use crate::wizard::types::{QuickInputButton, QuickPickItem};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What kind of widget to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetKind {
    QuickPick {
        items: Vec<QuickPickItem>,
        active_item: Option<usize>,
        placeholder: String,
    },
    InputBox {
        value: String,
        prompt: String,
    },
}

/// Everything a host needs to render a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetSpec {
    pub kind: WidgetKind,
    pub title: String,
    pub step: Option<usize>,
    pub total_steps: usize,
    /// Includes the Back button when the flow can go back.
    pub buttons: Vec<QuickInputButton>,
    /// Keep the prompt open when focus moves elsewhere.
    pub ignore_focus_out: bool,
}

impl WidgetSpec {
    pub fn has_back_button(&self) -> bool {
        self.buttons.iter().any(|b| b.is_back())
    }

    /// "2/5"-style progress text, if the widget has a step number.
    pub fn progress(&self) -> Option<String> {
        self.step.map(|s| format!("{}/{}", s, self.total_steps))
    }
}

/// User interaction reported by a live widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
    /// Quick pick selection changed; `None` = accepted with nothing selected.
    Selected(Option<usize>),
    /// Input box text changed (one event per keystroke).
    ValueChanged(String),
    /// Input box submitted.
    Accepted(String),
    ButtonTriggered(QuickInputButton),
    /// The widget was dismissed without an answer.
    Hidden,
}

/// A single on-screen prompt.
#[async_trait::async_trait]
pub trait PromptWidget: Send {
    fn set_enabled(&mut self, enabled: bool);

    fn set_busy(&mut self, busy: bool);

    /// Show (or clear, with `None`) the validation message.
    fn set_validation_message(&mut self, message: Option<String>);

    fn show(&mut self);

    /// Tear the widget down.  Called exactly once per created widget.
    fn dispose(&mut self);

    /// Wait for the next user interaction.
    ///
    /// Must be cancellation safe: the input box loop races this against
    /// pending validations and drops whichever future loses.
    async fn next_event(&mut self) -> WidgetEvent;
}

/// Factory for prompt widgets.
pub trait PromptHost: Send + Sync {
    fn create_widget(&self, spec: WidgetSpec) -> Box<dyn PromptWidget>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Resume policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decides whether a dismissed prompt is re-shown (resume) or ends the
/// run (cancel).
#[async_trait::async_trait]
pub trait ResumePolicy: Send + Sync {
    async fn should_resume(&self) -> bool;
}

/// Every dismissal cancels.
pub struct NeverResume;

#[async_trait::async_trait]
impl ResumePolicy for NeverResume {
    async fn should_resume(&self) -> bool {
        false
    }
}

/// Resume up to `n` dismissals, then cancel.
pub struct ResumeBudget {
    remaining: AtomicUsize,
}

impl ResumeBudget {
    pub fn new(resumes: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(resumes),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ResumePolicy for ResumeBudget {
    async fn should_resume(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}
