use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{NaiveDate, Utc};
use serde_json::Value;

use crate::config::AuthConfig;
use crate::workflows::leave::domain::{
    ActingStaffAssignment, AppNotification, ApprovalStatus, DayType, LeaveApplication, LeaveId,
    LeavePurpose, LeaveRequest, LeaveStatus, Period, Registration, Role, User, UserId, UserView,
};
use crate::workflows::leave::repository::{
    LeaveRepository, LeaveStore, NotificationRepository, RepositoryError, SessionRepository,
    UserRepository,
};
use crate::workflows::leave::{ChangeBus, Directory, InMemoryLeaveStore, LeaveWorkflowService};

pub(super) fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).expect("valid date")
}

pub(super) fn directory() -> Arc<Directory> {
    Arc::new(Directory::standard().expect("bundled directory parses"))
}

pub(super) fn auth() -> AuthConfig {
    AuthConfig {
        email_domain: "sankara.ac.in".to_string(),
        bcrypt_cost: 4,
        max_leave_days: 60,
    }
}

pub(super) fn service_with<S: LeaveStore + 'static>(store: Arc<S>) -> LeaveWorkflowService<S> {
    LeaveWorkflowService::new(store, directory(), auth(), ChangeBus::new())
}

pub(super) fn build_service() -> (
    LeaveWorkflowService<InMemoryLeaveStore>,
    Arc<InMemoryLeaveStore>,
) {
    let store = Arc::new(InMemoryLeaveStore::new());
    (service_with(Arc::clone(&store)), store)
}

pub(super) fn registration(
    name: &str,
    email: &str,
    role: Role,
    department: Option<&str>,
) -> Registration {
    Registration {
        name: name.to_string(),
        email: email.to_string(),
        password: "correct horse".to_string(),
        role,
        department: department.map(str::to_string),
        is_teaching_staff: true,
        gender: crate::workflows::leave::domain::Gender::Other,
    }
}

/// Accounts used across the scenarios: a Computer Science head, two of their
/// staff and the principal.
pub(super) struct Staffroom {
    pub(super) head: UserView,
    pub(super) applicant: UserView,
    pub(super) colleague: UserView,
    pub(super) principal: UserView,
}

pub(super) fn staffroom<S: LeaveStore + 'static>(service: &LeaveWorkflowService<S>) -> Staffroom {
    let head = service
        .register(registration(
            "Lingaraj Mani",
            "lingarajm@sankara.ac.in",
            Role::HeadOfDepartment,
            Some("Computer Science"),
        ))
        .expect("head registers");
    let applicant = service
        .register(registration("Bhavya", "bhavyap@sankara.ac.in", Role::Staff, None))
        .expect("applicant registers");
    let colleague = service
        .register(registration("Hema", "hemalathad@sankara.ac.in", Role::Staff, None))
        .expect("colleague registers");
    let mut principal_form =
        registration("Dr.K.Anand", "principal@sankara.ac.in", Role::Principal, None);
    principal_form.is_teaching_staff = false;
    let principal = service.register(principal_form).expect("principal registers");

    Staffroom {
        head,
        applicant,
        colleague,
        principal,
    }
}

pub(super) fn assignment(cells: &[(NaiveDate, Period, &str)]) -> ActingStaffAssignment {
    let mut acting = ActingStaffAssignment::new();
    for (date, period, name) in cells {
        acting
            .entry(*date)
            .or_insert_with(BTreeMap::new)
            .insert(*period, name.to_string());
    }
    acting
}

pub(super) fn application(
    from: NaiveDate,
    to: Option<NaiveDate>,
    purpose: LeavePurpose,
    acting_staff: ActingStaffAssignment,
) -> LeaveApplication {
    LeaveApplication {
        from_date: from,
        to_date: to,
        day_type: DayType::FullDay,
        purpose,
        description: String::new(),
        department: None,
        acting_staff,
        has_medical_certificate: false,
        final_letter_content: String::new(),
        time: None,
        sections: Vec::new(),
    }
}

/// Two-day personal leave with two periods handed to the colleague and one
/// marked free.
pub(super) fn two_day_application() -> LeaveApplication {
    application(
        date(11),
        Some(date(12)),
        LeavePurpose::PersonalIssue,
        assignment(&[
            (date(11), Period::First, "Hemalatha"),
            (date(11), Period::Third, "Free"),
            (date(12), Period::Second, "Ms.D.Hemalatha"),
        ]),
    )
}

/// Bare stored record for pure state machine tests.
pub(super) fn leave_record(owner: &str, department: &str, teaching: bool) -> LeaveRequest {
    LeaveRequest {
        id: LeaveId("leave-1".to_string()),
        user_id: UserId(owner.to_string()),
        name: "Ms.P.Bhavya".to_string(),
        is_teaching_staff: teaching,
        department: Some(department.to_string()),
        from_date: date(11),
        to_date: date(11),
        day_type: DayType::FullDay,
        purpose: LeavePurpose::PersonalIssue,
        description: String::new(),
        acting_staff: ActingStaffAssignment::new(),
        acting_staff_statuses: BTreeMap::new(),
        acting_staff_rejection_reasons: BTreeMap::new(),
        has_medical_certificate: false,
        final_letter_content: String::new(),
        submitted_at: Utc::now(),
        time: None,
        sections: Vec::new(),
        status: LeaveStatus::Pending,
        hod_approval: if teaching {
            ApprovalStatus::Pending
        } else {
            ApprovalStatus::NotApplicable
        },
        admin_approval: ApprovalStatus::Pending,
        hod_rejection_reason: None,
        admin_rejection_reason: None,
        approver_name: None,
        approver_role: None,
        version: 0,
    }
}

pub(super) fn approver(id: &str, role: Role, department: Option<&str>) -> User {
    User {
        id: UserId(id.to_string()),
        name: format!("Approver {id}"),
        email: format!("{id}@sankara.ac.in"),
        password_hash: None,
        role,
        department: department.map(str::to_string),
        is_teaching_staff: role == Role::HeadOfDepartment,
        gender: crate::workflows::leave::domain::Gender::Other,
    }
}

/// Store double that lets another writer win the race for the next
/// `races` leave updates.
pub(super) struct RacingStore {
    pub(super) inner: InMemoryLeaveStore,
    races: Mutex<usize>,
}

impl RacingStore {
    pub(super) fn new(races: usize) -> Self {
        Self {
            inner: InMemoryLeaveStore::new(),
            races: Mutex::new(races),
        }
    }
}

impl UserRepository for RacingStore {
    fn upsert_user(&self, user: User) -> Result<User, RepositoryError> {
        self.inner.upsert_user(user)
    }

    fn fetch_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        self.inner.fetch_user(id)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.inner.find_user_by_email(email)
    }

    fn users(&self) -> Result<Vec<User>, RepositoryError> {
        self.inner.users()
    }
}

impl LeaveRepository for RacingStore {
    fn insert_leave(&self, leave: LeaveRequest) -> Result<LeaveRequest, RepositoryError> {
        self.inner.insert_leave(leave)
    }

    fn update_leave(&self, leave: LeaveRequest) -> Result<LeaveRequest, RepositoryError> {
        let mut races = self.races.lock().expect("race counter poisoned");
        if *races > 0 {
            *races -= 1;
            let current = self
                .inner
                .fetch_leave(&leave.id)?
                .ok_or(RepositoryError::NotFound)?;
            self.inner.update_leave(current)?;
        }
        drop(races);
        self.inner.update_leave(leave)
    }

    fn fetch_leave(&self, id: &LeaveId) -> Result<Option<LeaveRequest>, RepositoryError> {
        self.inner.fetch_leave(id)
    }

    fn leaves(&self) -> Result<Vec<LeaveRequest>, RepositoryError> {
        self.inner.leaves()
    }
}

impl NotificationRepository for RacingStore {
    fn prepend_notification(&self, notification: AppNotification) -> Result<(), RepositoryError> {
        self.inner.prepend_notification(notification)
    }

    fn notifications_for(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AppNotification>, RepositoryError> {
        self.inner.notifications_for(user_id)
    }

    fn mark_all_read(&self, user_id: &UserId) -> Result<usize, RepositoryError> {
        self.inner.mark_all_read(user_id)
    }
}

impl SessionRepository for RacingStore {
    fn current_session(&self) -> Result<Option<UserId>, RepositoryError> {
        self.inner.current_session()
    }

    fn start_session(&self, user_id: UserId) -> Result<(), RepositoryError> {
        self.inner.start_session(user_id)
    }

    fn end_session(&self) -> Result<(), RepositoryError> {
        self.inner.end_session()
    }
}

impl LeaveStore for RacingStore {
    fn clear_all(&self) -> Result<(), RepositoryError> {
        self.inner.clear_all()
    }
}

/// Store that fails every call.
pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("store offline".to_string()))
}

impl UserRepository for UnavailableStore {
    fn upsert_user(&self, _user: User) -> Result<User, RepositoryError> {
        offline()
    }

    fn fetch_user(&self, _id: &UserId) -> Result<Option<User>, RepositoryError> {
        offline()
    }

    fn find_user_by_email(&self, _email: &str) -> Result<Option<User>, RepositoryError> {
        offline()
    }

    fn users(&self) -> Result<Vec<User>, RepositoryError> {
        offline()
    }
}

impl LeaveRepository for UnavailableStore {
    fn insert_leave(&self, _leave: LeaveRequest) -> Result<LeaveRequest, RepositoryError> {
        offline()
    }

    fn update_leave(&self, _leave: LeaveRequest) -> Result<LeaveRequest, RepositoryError> {
        offline()
    }

    fn fetch_leave(&self, _id: &LeaveId) -> Result<Option<LeaveRequest>, RepositoryError> {
        offline()
    }

    fn leaves(&self) -> Result<Vec<LeaveRequest>, RepositoryError> {
        offline()
    }
}

impl NotificationRepository for UnavailableStore {
    fn prepend_notification(&self, _notification: AppNotification) -> Result<(), RepositoryError> {
        offline()
    }

    fn notifications_for(
        &self,
        _user_id: &UserId,
    ) -> Result<Vec<AppNotification>, RepositoryError> {
        offline()
    }

    fn mark_all_read(&self, _user_id: &UserId) -> Result<usize, RepositoryError> {
        offline()
    }
}

impl SessionRepository for UnavailableStore {
    fn current_session(&self) -> Result<Option<UserId>, RepositoryError> {
        offline()
    }

    fn start_session(&self, _user_id: UserId) -> Result<(), RepositoryError> {
        offline()
    }

    fn end_session(&self) -> Result<(), RepositoryError> {
        offline()
    }
}

impl LeaveStore for UnavailableStore {
    fn clear_all(&self) -> Result<(), RepositoryError> {
        offline()
    }
}

/// Store double whose notification inbox rejects every write while the rest
/// of the tables behave normally.
pub(super) struct InboxOutageStore {
    pub(super) inner: InMemoryLeaveStore,
}

impl InboxOutageStore {
    pub(super) fn new() -> Self {
        Self {
            inner: InMemoryLeaveStore::new(),
        }
    }
}

impl UserRepository for InboxOutageStore {
    fn upsert_user(&self, user: User) -> Result<User, RepositoryError> {
        self.inner.upsert_user(user)
    }

    fn fetch_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        self.inner.fetch_user(id)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.inner.find_user_by_email(email)
    }

    fn users(&self) -> Result<Vec<User>, RepositoryError> {
        self.inner.users()
    }
}

impl LeaveRepository for InboxOutageStore {
    fn insert_leave(&self, leave: LeaveRequest) -> Result<LeaveRequest, RepositoryError> {
        self.inner.insert_leave(leave)
    }

    fn update_leave(&self, leave: LeaveRequest) -> Result<LeaveRequest, RepositoryError> {
        self.inner.update_leave(leave)
    }

    fn fetch_leave(&self, id: &LeaveId) -> Result<Option<LeaveRequest>, RepositoryError> {
        self.inner.fetch_leave(id)
    }

    fn leaves(&self) -> Result<Vec<LeaveRequest>, RepositoryError> {
        self.inner.leaves()
    }
}

impl NotificationRepository for InboxOutageStore {
    fn prepend_notification(&self, _notification: AppNotification) -> Result<(), RepositoryError> {
        offline()
    }

    fn notifications_for(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AppNotification>, RepositoryError> {
        self.inner.notifications_for(user_id)
    }

    fn mark_all_read(&self, user_id: &UserId) -> Result<usize, RepositoryError> {
        self.inner.mark_all_read(user_id)
    }
}

impl SessionRepository for InboxOutageStore {
    fn current_session(&self) -> Result<Option<UserId>, RepositoryError> {
        self.inner.current_session()
    }

    fn start_session(&self, user_id: UserId) -> Result<(), RepositoryError> {
        self.inner.start_session(user_id)
    }

    fn end_session(&self) -> Result<(), RepositoryError> {
        self.inner.end_session()
    }
}

impl LeaveStore for InboxOutageStore {
    fn clear_all(&self) -> Result<(), RepositoryError> {
        self.inner.clear_all()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
