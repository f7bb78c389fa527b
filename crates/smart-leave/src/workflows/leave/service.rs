use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::acting::{self, PendingDuty};
use super::approval::{self, ApprovalStage, TransitionError};
use super::directory::Directory;
use super::domain::{
    effective_to_date, AppNotification, ApprovalStatus, DayType, LeaveApplication, LeaveId,
    LeaveRequest, LeaveStatus, NotificationKind, Registration, Role, User, UserId, UserView,
};
use super::events::{ChangeBus, ChangeKind};
use super::identity::IdentityResolver;
use super::notifications::{
    coverage_decision_message, decision_kind, stage_decision_message, NotificationDispatcher,
};
use super::repository::{LeaveStore, RepositoryError};
use super::validation::{Decision, IntakeGuard, ValidationError};
use crate::config::AuthConfig;

/// Writes that lose an optimistic-version race are re-read and retried this
/// many times before the conflict is reported.
const MAX_WRITE_ATTEMPTS: usize = 3;

/// Requests received on one day as seen by an approver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityBoard {
    pub date: NaiveDate,
    pub pending_count: usize,
    pub leaves: Vec<LeaveRequest>,
}

/// Service composing identity resolution, the approval state machine, duty
/// delegation and notifications over one [`LeaveStore`].
pub struct LeaveWorkflowService<S> {
    store: Arc<S>,
    resolver: Arc<IdentityResolver>,
    guard: Arc<IntakeGuard>,
    notifications: NotificationDispatcher<S>,
    bus: ChangeBus,
}

impl<S> LeaveWorkflowService<S>
where
    S: LeaveStore + 'static,
{
    pub fn new(store: Arc<S>, directory: Arc<Directory>, auth: AuthConfig, bus: ChangeBus) -> Self {
        let resolver = Arc::new(IdentityResolver::new(directory));
        let notifications = NotificationDispatcher::new(Arc::clone(&store), Arc::clone(&resolver));
        Self {
            store,
            resolver,
            guard: Arc::new(IntakeGuard::new(auth)),
            notifications,
            bus,
        }
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    /// Creates an account (or claims a password-less placeholder) and signs
    /// it in. The official directory overrides the supplied name and
    /// department when the e-mail or name resolves.
    pub fn register(&self, registration: Registration) -> Result<UserView, LeaveWorkflowError> {
        self.guard.check_registration(&registration)?;

        let existing = self.store.find_user_by_email(&registration.email)?;
        if existing
            .as_ref()
            .is_some_and(|user| user.password_hash.is_some())
        {
            return Err(ValidationError::DuplicateEmail.into());
        }

        let official = self
            .resolver
            .official_profile_by_email(&registration.email)
            .or_else(|| self.resolver.official_profile(&registration.name));
        let (name, department) = match official {
            Some(entry) => (entry.name.clone(), Some(entry.department.clone())),
            None => (
                registration.name.trim().to_string(),
                registration
                    .department
                    .filter(|department| !department.trim().is_empty()),
            ),
        };

        let password_hash = bcrypt::hash(&registration.password, self.guard.auth().bcrypt_cost)?;
        let user = User {
            id: existing.map(|user| user.id).unwrap_or_else(UserId::generate),
            name,
            email: registration.email.trim().to_string(),
            password_hash: Some(password_hash),
            role: registration.role,
            department,
            is_teaching_staff: registration.is_teaching_staff
                && !registration.role.is_senior_administration(),
            gender: registration.gender,
        };

        let stored = self.store.upsert_user(user)?;
        self.store.start_session(stored.id.clone())?;
        self.bus.publish(ChangeKind::Users);
        self.bus.publish(ChangeKind::Session);
        info!(user_id = %stored.id, role = stored.role.label(), "account registered");
        Ok(stored.view())
    }

    /// Any failure (unknown e-mail, placeholder account, wrong password) is the
    /// same `InvalidCredentials`.
    pub fn login(&self, email: &str, password: &str) -> Result<UserView, LeaveWorkflowError> {
        let user = self
            .store
            .find_user_by_email(email)?
            .ok_or(LeaveWorkflowError::InvalidCredentials)?;
        let hash = user
            .password_hash
            .as_deref()
            .ok_or(LeaveWorkflowError::InvalidCredentials)?;
        if !bcrypt::verify(password, hash).unwrap_or(false) {
            debug!(user_id = %user.id, "password rejected");
            return Err(LeaveWorkflowError::InvalidCredentials);
        }

        self.store.start_session(user.id.clone())?;
        self.bus.publish(ChangeKind::Session);
        info!(user_id = %user.id, "signed in");
        Ok(user.view())
    }

    pub fn logout(&self) -> Result<(), LeaveWorkflowError> {
        self.store.end_session()?;
        self.bus.publish(ChangeKind::Session);
        Ok(())
    }

    pub fn current_user(&self) -> Result<Option<UserView>, LeaveWorkflowError> {
        let Some(user_id) = self.store.current_session()? else {
            return Ok(None);
        };
        Ok(self.store.fetch_user(&user_id)?.map(|user| user.view()))
    }

    fn user(&self, user_id: &UserId) -> Result<User, LeaveWorkflowError> {
        self.store
            .fetch_user(user_id)?
            .ok_or_else(|| LeaveWorkflowError::UnknownUser(user_id.clone()))
    }

    pub fn identities_for(&self, user_id: &UserId) -> Result<Vec<String>, LeaveWorkflowError> {
        let user = self.user(user_id)?;
        Ok(self.resolver.resolve_identities(&user))
    }

    /// Normalizes and stores a new request, then asks the named colleagues
    /// for cover.
    pub fn submit(
        &self,
        user_id: &UserId,
        application: LeaveApplication,
    ) -> Result<LeaveRequest, LeaveWorkflowError> {
        let user = self.user(user_id)?;
        self.guard.check_application(&application)?;

        let department = application
            .department
            .filter(|department| !department.trim().is_empty())
            .or_else(|| user.department.clone());
        let applicant_is_head = user.role == Role::HeadOfDepartment
            || self
                .resolver
                .is_head_of_department(&user.name, department.as_deref());
        let to_date = effective_to_date(
            application.from_date,
            application.to_date,
            application.day_type,
            application.purpose,
        );
        let (acting_staff, acting_staff_statuses) = acting::normalize_assignments(
            &application.acting_staff,
            application.from_date,
            to_date,
            user.is_teaching_staff,
        );
        let half_day = application.day_type == DayType::HalfDay;

        let leave = LeaveRequest {
            id: LeaveId::generate(),
            user_id: user.id.clone(),
            name: user.name.clone(),
            is_teaching_staff: user.is_teaching_staff,
            department,
            from_date: application.from_date,
            to_date,
            day_type: application.day_type,
            purpose: application.purpose,
            description: application.description,
            acting_staff,
            acting_staff_statuses,
            acting_staff_rejection_reasons: Default::default(),
            has_medical_certificate: application.has_medical_certificate,
            final_letter_content: application.final_letter_content,
            submitted_at: Utc::now(),
            time: application.time.filter(|_| half_day),
            sections: if half_day {
                application.sections
            } else {
                Vec::new()
            },
            status: LeaveStatus::Pending,
            hod_approval: approval::initial_hod_approval(user.is_teaching_staff, applicant_is_head),
            admin_approval: ApprovalStatus::Pending,
            hod_rejection_reason: None,
            admin_rejection_reason: None,
            approver_name: None,
            approver_role: None,
            version: 0,
        };

        let stored = self.store.insert_leave(leave)?;
        self.bus.publish(ChangeKind::Leaves);
        info!(
            leave_id = %stored.id,
            user_id = %stored.user_id,
            from = %stored.from_date,
            to = %stored.to_date,
            hod_approval = stored.hod_approval.label(),
            "leave request submitted"
        );

        if stored.is_teaching_staff {
            match self.notifications.notify_acting_staff(&stored, None) {
                Ok(0) => {}
                Ok(_) => self.bus.publish(ChangeKind::Notifications),
                Err(err) => {
                    warn!(leave_id = %stored.id, error = %err, "acting staff notification failed");
                }
            }
        }

        Ok(stored)
    }

    /// Re-reads and retries `mutate` when another writer bumped the version in
    /// between.
    fn update_leave_with<T, F>(
        &self,
        leave_id: &LeaveId,
        mut mutate: F,
    ) -> Result<(LeaveRequest, T), LeaveWorkflowError>
    where
        F: FnMut(&mut LeaveRequest) -> Result<T, LeaveWorkflowError>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut leave = self
                .store
                .fetch_leave(leave_id)?
                .ok_or_else(|| LeaveWorkflowError::UnknownLeave(leave_id.clone()))?;
            let outcome = mutate(&mut leave)?;
            match self.store.update_leave(leave) {
                Ok(stored) => return Ok((stored, outcome)),
                Err(RepositoryError::Stale { stored, attempted })
                    if attempt < MAX_WRITE_ATTEMPTS =>
                {
                    warn!(
                        leave_id = %leave_id,
                        stored,
                        attempted,
                        attempt,
                        "stale leave write, retrying"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// The decision is already committed when this runs, so a failed
    /// notification is logged rather than reported to the caller.
    fn notify_applicant(&self, leave: &LeaveRequest, kind: NotificationKind, message: String) {
        match self
            .notifications
            .notify_user(&leave.user_id, leave, kind, message)
        {
            Ok(()) => self.bus.publish(ChangeKind::Notifications),
            Err(err) => warn!(leave_id = %leave.id, error = %err, "applicant notification failed"),
        }
    }

    /// Records an approver's decision on the stage their role owns.
    pub fn decide_stage(
        &self,
        approver_id: &UserId,
        leave_id: &LeaveId,
        decision: Decision,
    ) -> Result<LeaveRequest, LeaveWorkflowError> {
        let approver = self.user(approver_id)?;
        let stage =
            ApprovalStage::for_role(approver.role).ok_or(TransitionError::NoStage(approver.role))?;

        let (stored, ()) = self.update_leave_with(leave_id, |leave| {
            if !approval::is_visible_to(leave, &approver) {
                return Err(LeaveWorkflowError::NotVisible);
            }
            approval::apply_stage_decision(leave, stage, &decision, &approver)?;
            Ok(())
        })?;
        self.bus.publish(ChangeKind::Leaves);

        self.notify_applicant(
            &stored,
            decision_kind(&decision),
            stage_decision_message(&stored, stage, &approver, &decision),
        );

        info!(
            leave_id = %stored.id,
            approver_id = %approver.id,
            stage = stage.label(),
            decision = decision.status().label(),
            status = stored.status.label(),
            "stage decision recorded"
        );
        Ok(stored)
    }

    /// Requests visible to `viewer_id` that were received on `date` (today
    /// when absent), optionally only those awaiting the viewer's stage.
    pub fn authority_board(
        &self,
        viewer_id: &UserId,
        date: Option<NaiveDate>,
        pending_only: bool,
    ) -> Result<AuthorityBoard, LeaveWorkflowError> {
        let viewer = self.user(viewer_id)?;
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        let leaves = self.store.leaves()?;

        let visible: Vec<&LeaveRequest> =
            approval::visible_to_authority(&leaves, &viewer).collect();
        let pending_count = visible
            .iter()
            .filter(|leave| approval::is_actionable_by(leave, &viewer))
            .count();
        let leaves = visible
            .into_iter()
            .filter(|leave| leave.submitted_at.date_naive() == date)
            .filter(|leave| !pending_only || approval::is_actionable_by(leave, &viewer))
            .cloned()
            .collect();

        Ok(AuthorityBoard {
            date,
            pending_count,
            leaves,
        })
    }

    pub fn leaves_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<LeaveRequest>, LeaveWorkflowError> {
        let user = self.user(user_id)?;
        Ok(self
            .store
            .leaves()?
            .into_iter()
            .filter(|leave| leave.user_id == user.id)
            .collect())
    }

    pub fn leaves_on(&self, date: NaiveDate) -> Result<Vec<LeaveRequest>, LeaveWorkflowError> {
        let leaves = self.store.leaves()?;
        Ok(acting::leaves_on(&leaves, date).into_iter().cloned().collect())
    }

    pub fn acting_requests_for(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<LeaveRequest>, LeaveWorkflowError> {
        let identities = self.identities_for(user_id)?;
        let leaves = self.store.leaves()?;
        Ok(acting::acting_requests_for(&leaves, &identities)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn pending_duty_count(&self, user_id: &UserId) -> Result<usize, LeaveWorkflowError> {
        let identities = self.identities_for(user_id)?;
        Ok(acting::pending_duty_count(&self.store.leaves()?, &identities))
    }

    pub fn pending_duties(&self, user_id: &UserId) -> Result<Vec<PendingDuty>, LeaveWorkflowError> {
        let identities = self.identities_for(user_id)?;
        Ok(acting::pending_duties(&self.store.leaves()?, &identities))
    }

    /// Applies the colleague's answer to every period on the request assigned
    /// to them and tells the applicant which dates were affected.
    pub fn update_acting_status(
        &self,
        user_id: &UserId,
        leave_id: &LeaveId,
        decision: Decision,
    ) -> Result<LeaveRequest, LeaveWorkflowError> {
        let identities = self.identities_for(user_id)?;
        let (stored, dates) = self.update_leave_with(leave_id, |leave| {
            Ok(acting::apply_acting_decision(leave, &identities, &decision)?)
        })?;
        self.bus.publish(ChangeKind::Leaves);

        let actor = identities.first().map(String::as_str).unwrap_or_default();
        self.notify_applicant(
            &stored,
            decision_kind(&decision),
            coverage_decision_message(actor, &decision, &dates),
        );

        info!(
            leave_id = %stored.id,
            user_id = %user_id,
            decision = decision.status().label(),
            dates = dates.len(),
            "acting duty answered"
        );
        Ok(stored)
    }

    pub fn acting_staff_options(
        &self,
        department: &str,
        exclude_user_id: Option<&UserId>,
    ) -> Result<Vec<UserView>, LeaveWorkflowError> {
        let users = self.store.users()?;
        Ok(self
            .resolver
            .acting_staff_options(&users, department, exclude_user_id))
    }

    pub fn notifications_for(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AppNotification>, LeaveWorkflowError> {
        let user = self.user(user_id)?;
        Ok(self.notifications.notifications_for(&user.id)?)
    }

    pub fn unread_count(&self, user_id: &UserId) -> Result<usize, LeaveWorkflowError> {
        let user = self.user(user_id)?;
        Ok(self.notifications.unread_count(&user.id)?)
    }

    pub fn mark_all_read(&self, user_id: &UserId) -> Result<usize, LeaveWorkflowError> {
        let user = self.user(user_id)?;
        let changed = self.notifications.mark_all_read(&user.id)?;
        if changed > 0 {
            self.bus.publish(ChangeKind::Notifications);
        }
        Ok(changed)
    }

    /// Clears every table, including the session.
    pub fn reset(&self) -> Result<(), LeaveWorkflowError> {
        self.store.clear_all()?;
        self.bus.publish(ChangeKind::Reset);
        warn!("all workflow data cleared");
        Ok(())
    }
}

/// Error raised by the leave workflow service.
#[derive(Debug, thiserror::Error)]
pub enum LeaveWorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("request is not visible to this approver")]
    NotVisible,
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("unknown user {0}")]
    UnknownUser(UserId),
    #[error("unknown leave request {0}")]
    UnknownLeave(LeaveId),
    #[error("credential hashing failed: {0}")]
    Credentials(#[from] bcrypt::BcryptError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
