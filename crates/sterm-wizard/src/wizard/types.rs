//! Prompt parameters and replies shared by the engine and its hosts.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Items & buttons
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One selectable entry of a quick pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickPickItem {
    pub label: String,
    /// Secondary text rendered next to the label.
    pub description: Option<String>,
}

impl QuickPickItem {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Identifier reserved for the built-in Back button.
pub const BACK_BUTTON_ID: &str = "wizard.back";

/// A button rendered in the prompt's title bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickInputButton {
    pub id: String,
    pub tooltip: String,
}

impl QuickInputButton {
    pub fn new(id: impl Into<String>, tooltip: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tooltip: tooltip.into(),
        }
    }

    /// The built-in Back button.
    pub fn back() -> Self {
        Self::new(BACK_BUTTON_ID, "Back")
    }

    pub fn is_back(&self) -> bool {
        self.id == BACK_BUTTON_ID
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Asynchronous input validator. `None` means the value is acceptable,
/// `Some(message)` is shown to the user as the validation message.
pub type Validator = Arc<dyn Fn(String) -> BoxFuture<'static, Option<String>> + Send + Sync>;

/// Wrap an async closure as a [`Validator`].
pub fn validator<F, Fut>(f: F) -> Validator
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<String>> + Send + 'static,
{
    Arc::new(move |value| Box::pin(f(value)))
}

/// A validator that accepts every value.
pub fn accept_any() -> Validator {
    validator(|_| async { None })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Prompt parameters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parameters for [`MultiStepInput::show_quick_pick`](crate::wizard::MultiStepInput::show_quick_pick).
#[derive(Debug, Clone)]
pub struct QuickPickParams {
    pub title: String,
    /// Position in the flow; `None` hides the step counter.
    pub step: Option<usize>,
    pub total_steps: usize,
    pub items: Vec<QuickPickItem>,
    /// Index into `items` to highlight initially.
    pub active_item: Option<usize>,
    pub placeholder: String,
    /// Extra buttons besides Back.
    pub buttons: Vec<QuickInputButton>,
}

impl QuickPickParams {
    pub fn new(title: impl Into<String>, items: Vec<QuickPickItem>) -> Self {
        Self {
            title: title.into(),
            step: None,
            total_steps: 0,
            items,
            active_item: None,
            placeholder: String::new(),
            buttons: Vec::new(),
        }
    }

    pub fn step(mut self, step: usize, total_steps: usize) -> Self {
        self.step = Some(step);
        self.total_steps = total_steps;
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn active_item(mut self, index: usize) -> Self {
        self.active_item = Some(index);
        self
    }

    pub fn button(mut self, button: QuickInputButton) -> Self {
        self.buttons.push(button);
        self
    }
}

/// Parameters for [`MultiStepInput::show_input_box`](crate::wizard::MultiStepInput::show_input_box).
#[derive(Clone)]
pub struct InputBoxParams {
    pub title: String,
    pub step: Option<usize>,
    pub total_steps: usize,
    /// Initial text.
    pub value: String,
    pub prompt: String,
    pub validate: Validator,
    pub buttons: Vec<QuickInputButton>,
}

impl InputBoxParams {
    pub fn new(title: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            step: None,
            total_steps: 0,
            value: String::new(),
            prompt: prompt.into(),
            validate: accept_any(),
            buttons: Vec::new(),
        }
    }

    pub fn step(mut self, step: usize, total_steps: usize) -> Self {
        self.step = Some(step);
        self.total_steps = total_steps;
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn validate(mut self, validate: Validator) -> Self {
        self.validate = validate;
        self
    }

    pub fn button(mut self, button: QuickInputButton) -> Self {
        self.buttons.push(button);
        self
    }
}

impl std::fmt::Debug for InputBoxParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputBoxParams")
            .field("title", &self.title)
            .field("step", &self.step)
            .field("total_steps", &self.total_steps)
            .field("value", &self.value)
            .field("prompt", &self.prompt)
            .field("buttons", &self.buttons)
            .finish_non_exhaustive()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Replies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Navigation requested by the user while a prompt was open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Back button: re-run the previous step.
    Back,
    /// Prompt dismissed and the resume policy declined: abort the run.
    Cancel,
    /// Prompt dismissed but the resume policy opted to continue: re-run this step.
    Resume,
}

/// What a prompt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    /// The user answered.
    Value(T),
    /// A custom (non-Back) button was triggered.
    Button(QuickInputButton),
    /// The user navigated away; the step should hand this to the engine.
    Flow(Flow),
}

impl<T> Reply<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}
