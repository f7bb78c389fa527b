use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use super::acting::distinct_assignees;
use super::approval::ApprovalStage;
use super::domain::{AppNotification, LeaveRequest, NotificationKind, User, UserId};
use super::identity::{matches_any, IdentityResolver};
use super::repository::{LeaveStore, RepositoryError};
use super::validation::Decision;

/// Message sent to a colleague named as cover on a new request.
pub fn coverage_request_message(leave: &LeaveRequest, sender: Option<&str>) -> String {
    match sender {
        Some(head) => format!("{head} (HoD) assigned you duty for {}.", leave.name),
        None => format!("{} requested you for coverage.", leave.name),
    }
}

/// Message sent to the applicant after a colleague answers a coverage request.
pub fn coverage_decision_message(actor: &str, decision: &Decision, dates: &[NaiveDate]) -> String {
    let dates = dates
        .iter()
        .map(NaiveDate::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let verb = decision.status().label().to_lowercase();
    match decision.reason() {
        Some(reason) => format!("{actor} has {verb} duty for {dates}. Reason: {reason}"),
        None => format!("{actor} has {verb} duty for {dates}."),
    }
}

pub fn stage_decision_message(
    leave: &LeaveRequest,
    stage: ApprovalStage,
    approver: &User,
    decision: &Decision,
) -> String {
    let verb = decision.status().label().to_lowercase();
    let base = format!(
        "Your {} request from {} was {verb} by {} ({}).",
        leave.purpose.label(),
        leave.from_date,
        approver.name,
        stage.label()
    );
    match decision.reason() {
        Some(reason) => format!("{base} Reason: {reason}"),
        None => base,
    }
}

pub const fn decision_kind(decision: &Decision) -> NotificationKind {
    match decision {
        Decision::Approve => NotificationKind::Success,
        Decision::Reject(_) => NotificationKind::Warning,
    }
}

/// Writes workflow notifications and answers inbox queries.
pub struct NotificationDispatcher<S> {
    store: Arc<S>,
    resolver: Arc<IdentityResolver>,
}

impl<S> NotificationDispatcher<S>
where
    S: LeaveStore + 'static,
{
    pub fn new(store: Arc<S>, resolver: Arc<IdentityResolver>) -> Self {
        Self { store, resolver }
    }

    /// Notifies every registered colleague named on the request, once per
    /// account. Names that do not resolve to an account are skipped. Returns
    /// how many accounts were notified.
    pub fn notify_acting_staff(
        &self,
        leave: &LeaveRequest,
        sender: Option<&str>,
    ) -> Result<usize, RepositoryError> {
        let assignees = distinct_assignees(&leave.acting_staff);
        if assignees.is_empty() {
            return Ok(0);
        }

        let users = self.store.users()?;
        let message = coverage_request_message(leave, sender);
        let mut notified: Vec<&UserId> = Vec::new();
        for assignee in assignees {
            let recipient = users
                .iter()
                .find(|user| matches_any(&self.resolver.resolve_identities(user), &assignee));
            let Some(recipient) = recipient else {
                debug!(assignee = %assignee, leave_id = %leave.id, "no account for acting staff");
                continue;
            };
            // Per account: several spellings on one request can resolve to
            // the same colleague.
            if notified.contains(&&recipient.id) {
                continue;
            }
            self.store.prepend_notification(AppNotification::unread(
                recipient.id.clone(),
                leave.id.clone(),
                NotificationKind::Info,
                message.clone(),
            ))?;
            notified.push(&recipient.id);
        }
        Ok(notified.len())
    }

    pub fn notify_user(
        &self,
        user_id: &UserId,
        leave: &LeaveRequest,
        kind: NotificationKind,
        message: String,
    ) -> Result<(), RepositoryError> {
        self.store.prepend_notification(AppNotification::unread(
            user_id.clone(),
            leave.id.clone(),
            kind,
            message,
        ))
    }

    /// Newest first.
    pub fn notifications_for(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AppNotification>, RepositoryError> {
        let mut notifications = self.store.notifications_for(user_id)?;
        notifications.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(notifications)
    }

    pub fn mark_all_read(&self, user_id: &UserId) -> Result<usize, RepositoryError> {
        self.store.mark_all_read(user_id)
    }

    pub fn unread_count(&self, user_id: &UserId) -> Result<usize, RepositoryError> {
        Ok(self
            .store
            .notifications_for(user_id)?
            .iter()
            .filter(|notification| !notification.is_read)
            .count())
    }
}
