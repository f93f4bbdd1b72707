//! Host form collaborator interface.
//!
//! The scheduler never queries the rendered form directly; the host supplies
//! an implementation of `FormFields` and forwards field events.

/// Event kinds the scheduler subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldEventKind {
    Change,
    Blur,
}

/// A change or blur reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEvent {
    pub field: String,
    pub kind: FieldEventKind,
}

impl FieldEvent {
    pub fn change(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: FieldEventKind::Change,
        }
    }

    pub fn blur(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: FieldEventKind::Blur,
        }
    }
}

/// Inline status shown next to a source field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusDisplay {
    Calculating,
    Result(String),
    Error(String),
}

impl StatusDisplay {
    pub fn text(&self) -> String {
        match self {
            StatusDisplay::Calculating => "Calculating...".to_string(),
            StatusDisplay::Result(text) => text.clone(),
            StatusDisplay::Error(message) => format!("Error: {message}"),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StatusDisplay::Error(_))
    }
}

/// Field storage and events provided by the host form.
pub trait FormFields {
    /// Current text of a field; empty when the field is absent.
    fn read_field(&self, name: &str) -> String;

    /// Value of the checked option in a choice group; empty when none is checked.
    fn read_checked_choice(&self, group: &str) -> String;

    /// Store a value and fire the host's own change notification.
    fn write_field(&mut self, name: &str, value: &str);

    /// Register interest in `kind` events for `name`.
    fn subscribe(&mut self, name: &str, kind: FieldEventKind);

    /// Remove any status display attached next to `anchor`.
    fn clear_status(&mut self, _anchor: &str) {}

    /// Attach a status display next to `anchor`.
    fn append_status(&mut self, _anchor: &str, _status: &StatusDisplay) {}
}
