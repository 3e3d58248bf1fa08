//! Records of what a reconciliation cycle did, for whoever observes it.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{AppId, PolicyId, Zone};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    Normal,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    Create,
    Update,
    Delete,
    Skip,
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Skip => "skip",
        })
    }
}

/// What an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Subject {
    Application {
        name: String,
        /// Unknown when creation failed.
        id: Option<AppId>,
    },
    Policy {
        app_id: AppId,
        name: String,
        /// Unknown when creation failed.
        id: Option<PolicyId>,
    },
}

impl Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subject::Application { name, id: Some(id) } => {
                write!(f, "application {} ({})", name, id)
            }
            Subject::Application { name, id: None } => write!(f, "application {}", name),
            Subject::Policy {
                app_id,
                name,
                id: Some(id),
            } => write!(f, "policy {} ({}) of application {}", name, id, app_id),
            Subject::Policy {
                app_id,
                name,
                id: None,
            } => write!(f, "policy {} of application {}", name, app_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub time: DateTime<Utc>,
    pub kind: EventKind,
    pub action: Action,
    pub zone: String,
    pub subject: Subject,
    /// Human readable detail: the fields applied, or the error.
    pub message: String,
}

impl Event {
    pub fn normal(action: Action, zone: &Zone, subject: Subject, message: String) -> Event {
        Event {
            time: Utc::now(),
            kind: EventKind::Normal,
            action,
            zone: zone.name.clone(),
            subject,
            message,
        }
    }

    pub fn warning(action: Action, zone: &Zone, subject: Subject, message: String) -> Event {
        Event {
            time: Utc::now(),
            kind: EventKind::Warning,
            action,
            zone: zone.name.clone(),
            subject,
            message,
        }
    }

    pub fn is_warning(&self) -> bool {
        self.kind == EventKind::Warning
    }
}

/// Sink for [`Event`]s.
pub trait Recorder: Send + Sync {
    fn record(&self, event: Event);
}
