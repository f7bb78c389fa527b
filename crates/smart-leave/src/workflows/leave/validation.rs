use serde::{Deserialize, Serialize};

use super::domain::{ApprovalStatus, LeaveApplication, Registration};
use crate::config::AuthConfig;

/// Input problems reported to the caller before any state changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("email must use the institutional @{domain} domain")]
    EmailDomain { domain: String },
    #[error("an account with this email already exists")]
    DuplicateEmail,
    #[error("a rejection requires a reason")]
    MissingReason,
    #[error("to date {to} is before from date {from}")]
    InvertedDateRange { from: String, to: String },
    #[error("leave spans {days} days, more than the {max} allowed")]
    RangeTooLong { days: i64, max: u32 },
    #[error("no duty on this request is assigned to you")]
    NotAssigned,
}

/// Non-blank reason text; the only way to build a rejecting [`Decision`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionReason(String);

impl RejectionReason {
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingReason);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Wire form of an approver's choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionKind {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject(RejectionReason),
}

impl Decision {
    /// Boundary check: a rejection without a usable reason never reaches the
    /// state machine.
    pub fn from_parts(kind: DecisionKind, reason: Option<String>) -> Result<Self, ValidationError> {
        match kind {
            DecisionKind::Approved => Ok(Self::Approve),
            DecisionKind::Rejected => {
                let reason = reason.ok_or(ValidationError::MissingReason)?;
                Ok(Self::Reject(RejectionReason::new(reason)?))
            }
        }
    }

    pub const fn status(&self) -> ApprovalStatus {
        match self {
            Self::Approve => ApprovalStatus::Approved,
            Self::Reject(_) => ApprovalStatus::Rejected,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Approve => None,
            Self::Reject(reason) => Some(reason.as_str()),
        }
    }
}

/// Guard applied to registration and leave forms.
#[derive(Debug, Clone)]
pub struct IntakeGuard {
    auth: AuthConfig,
}

impl IntakeGuard {
    pub fn new(auth: AuthConfig) -> Self {
        Self { auth }
    }

    pub fn auth(&self) -> &AuthConfig {
        &self.auth
    }

    pub fn check_email(&self, email: &str) -> Result<(), ValidationError> {
        if email.trim().is_empty() {
            return Err(ValidationError::MissingField("email"));
        }
        if !self.auth.accepts_email(email) {
            return Err(ValidationError::EmailDomain {
                domain: self.auth.email_domain.trim_start_matches('@').to_string(),
            });
        }
        Ok(())
    }

    pub fn check_registration(&self, registration: &Registration) -> Result<(), ValidationError> {
        self.check_email(&registration.email)?;
        if registration.password.is_empty() {
            return Err(ValidationError::MissingField("password"));
        }
        if registration.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        Ok(())
    }

    pub fn check_application(&self, application: &LeaveApplication) -> Result<(), ValidationError> {
        let to_date = application.to_date.unwrap_or(application.from_date);
        if to_date < application.from_date {
            return Err(ValidationError::InvertedDateRange {
                from: application.from_date.to_string(),
                to: to_date.to_string(),
            });
        }
        // Inclusive of both ends.
        let days = (to_date - application.from_date).num_days() + 1;
        if days > i64::from(self.auth.max_leave_days) {
            return Err(ValidationError::RangeTooLong {
                days,
                max: self.auth.max_leave_days,
            });
        }
        Ok(())
    }
}
