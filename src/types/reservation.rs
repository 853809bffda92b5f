//! Reservation targets, attempt outcomes and the events a loop emits

use crate::error::{Error, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Course category, mapped to the portal's teaching-class type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Courses of the student's own major
    #[default]
    Major,
    /// General electives
    Elective,
    /// Physical education
    Physical,
    /// Courses inside the training programme
    Program,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Major,
        Category::Elective,
        Category::Physical,
        Category::Program,
    ];

    /// Code sent as `teachingClassType`
    pub fn code(self) -> &'static str {
        match self {
            Category::Major => "TJKC",
            Category::Elective => "XGXK",
            Category::Physical => "TYKC",
            Category::Program => "FANKC",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Major => "major",
            Category::Elective => "elective",
            Category::Physical => "physical",
            Category::Program => "program",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::validation(
                    "category",
                    &format!(
                        "unknown category '{}', expected one of major, elective, physical, program",
                        s
                    ),
                )
            })
    }
}

/// One course to grab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationTarget {
    /// Public course code, e.g. `COMP30072701`
    pub code: String,
    #[serde(default)]
    pub category: Category,
}

impl ReservationTarget {
    pub fn new(code: impl Into<String>, category: Category) -> Self {
        Self {
            code: code.into().trim().to_string(),
            category,
        }
    }
}

impl fmt::Display for ReservationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.category)
    }
}

/// Parses `CODE` or `CODE:category`
impl FromStr for ReservationTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (code, category) = match s.split_once(':') {
            Some((code, category)) => (code, category.parse()?),
            None => (s, Category::default()),
        };
        if code.trim().is_empty() {
            return Err(Error::validation("course", "course code must not be empty"));
        }
        Ok(Self::new(code, category))
    }
}

/// Result of one privileged attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationOutcome {
    /// The seat is ours
    Success(String),
    /// Understood and declined: full, time conflict, window closed
    RejectedRetryable(String),
    /// The portal no longer recognises the session
    SessionExpired(String),
    /// Transport or parse failure during the attempt
    TransientError(String),
}

impl ReservationOutcome {
    pub fn message(&self) -> &str {
        match self {
            ReservationOutcome::Success(m)
            | ReservationOutcome::RejectedRetryable(m)
            | ReservationOutcome::SessionExpired(m)
            | ReservationOutcome::TransientError(m) => m,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationOutcome::Success(_))
    }
}

/// What an event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Success,
    Rejected,
    SessionExpired,
    TransientError,
    Reauthenticated,
    ReauthFailed,
    Cancelled,
}

impl From<&ReservationOutcome> for EventKind {
    fn from(outcome: &ReservationOutcome) -> Self {
        match outcome {
            ReservationOutcome::Success(_) => EventKind::Success,
            ReservationOutcome::RejectedRetryable(_) => EventKind::Rejected,
            ReservationOutcome::SessionExpired(_) => EventKind::SessionExpired,
            ReservationOutcome::TransientError(_) => EventKind::TransientError,
        }
    }
}

/// Line in a loop's event stream
#[derive(Debug, Clone, Serialize)]
pub struct ReservationEvent {
    pub timestamp: DateTime<Local>,
    /// Course code of the loop that emitted the event
    pub target: String,
    pub kind: EventKind,
    pub message: String,
}

impl ReservationEvent {
    pub fn new(target: &ReservationTarget, kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            target: target.code.clone(),
            kind,
            message: message.into(),
        }
    }

    pub fn from_outcome(target: &ReservationTarget, outcome: &ReservationOutcome) -> Self {
        Self::new(target, EventKind::from(outcome), outcome.message())
    }
}

impl fmt::Display for ReservationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.target,
            self.message
        )
    }
}
