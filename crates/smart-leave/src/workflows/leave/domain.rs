use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for registered accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for submitted leave requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeaveId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl UserId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl LeaveId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl NotificationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for LeaveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Staff,
    #[serde(rename = "HoD")]
    HeadOfDepartment,
    Principal,
    #[serde(rename = "Vice Principal")]
    VicePrincipal,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Staff => "Staff",
            Self::HeadOfDepartment => "HoD",
            Self::Principal => "Principal",
            Self::VicePrincipal => "Vice Principal",
        }
    }

    /// Principal and Vice Principal share the institution-wide approval stage.
    pub const fn is_senior_administration(self) -> bool {
        matches!(self, Self::Principal | Self::VicePrincipal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Registered account. Credentials are a bcrypt hash and never leave the
/// service through [`UserView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub password_hash: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub department: Option<String>,
    pub is_teaching_staff: bool,
    pub gender: Gender,
}

impl User {
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            department: self.department.clone(),
            is_teaching_staff: self.is_teaching_staff,
            gender: self.gender,
        }
    }
}

/// Public projection of a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
    pub is_teaching_staff: bool,
    pub gender: Gender,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayType {
    #[serde(rename = "Full Day")]
    FullDay,
    #[serde(rename = "Half Day")]
    HalfDay,
}

impl DayType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::FullDay => "Full Day",
            Self::HalfDay => "Half Day",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeavePurpose {
    #[serde(rename = "On Duty")]
    OnDuty,
    Condolences,
    #[serde(rename = "Personal Issue")]
    PersonalIssue,
    #[serde(rename = "Medical Leave")]
    MedicalLeave,
    #[serde(rename = "Important Function")]
    ImportantFunction,
    Others,
}

impl LeavePurpose {
    pub const fn label(self) -> &'static str {
        match self {
            Self::OnDuty => "On Duty",
            Self::Condolences => "Condolences",
            Self::PersonalIssue => "Personal Issue",
            Self::MedicalLeave => "Medical Leave",
            Self::ImportantFunction => "Important Function",
            Self::Others => "Others",
        }
    }
}

/// Per-stage and per-period approval state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl ApprovalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::NotApplicable => "N/A",
        }
    }
}

/// Overall request status; terminal once approved or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One of the six teaching periods of a working day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "period1")]
    First,
    #[serde(rename = "period2")]
    Second,
    #[serde(rename = "period3")]
    Third,
    #[serde(rename = "period4")]
    Fourth,
    #[serde(rename = "period5")]
    Fifth,
    #[serde(rename = "period6")]
    Sixth,
}

impl Period {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::First,
            Self::Second,
            Self::Third,
            Self::Fourth,
            Self::Fifth,
            Self::Sixth,
        ]
    }

    pub const fn number(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
            Self::Third => 3,
            Self::Fourth => 4,
            Self::Fifth => 5,
            Self::Sixth => 6,
        }
    }

    /// Short label used in letters and duty inboxes, e.g. `P3`.
    pub fn short_label(self) -> String {
        format!("P{}", self.number())
    }
}

pub type DailyAssignment = BTreeMap<Period, String>;
pub type ActingStaffAssignment = BTreeMap<NaiveDate, DailyAssignment>;
pub type ActingStaffStatuses = BTreeMap<NaiveDate, BTreeMap<Period, ApprovalStatus>>;
pub type ActingStaffReasons = BTreeMap<NaiveDate, BTreeMap<Period, String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HalfDaySection {
    Morning,
    Afternoon,
}

impl HalfDaySection {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Morning => "Morning",
            Self::Afternoon => "Afternoon",
        }
    }
}

/// Last day actually covered by a request. On-duty and half-day requests are
/// single-day regardless of the requested end date.
pub fn effective_to_date(
    from_date: NaiveDate,
    to_date: Option<NaiveDate>,
    day_type: DayType,
    purpose: LeavePurpose,
) -> NaiveDate {
    if purpose == LeavePurpose::OnDuty || day_type == DayType::HalfDay {
        return from_date;
    }
    to_date.unwrap_or(from_date)
}

/// Inclusive list of dates between `from` and `to`; empty when `to < from`.
pub fn dates_in_range(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = from;
    while current <= to {
        dates.push(current);
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    dates
}

/// Applicant supplied form, validated and normalized by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveApplication {
    pub from_date: NaiveDate,
    #[serde(default)]
    pub to_date: Option<NaiveDate>,
    pub day_type: DayType,
    pub purpose: LeavePurpose,
    #[serde(default)]
    pub description: String,
    /// Overrides the applicant's registered department when present.
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub acting_staff: ActingStaffAssignment,
    #[serde(default)]
    pub has_medical_certificate: bool,
    #[serde(default)]
    pub final_letter_content: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub sections: Vec<HalfDaySection>,
}

/// Stored leave request record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub id: LeaveId,
    pub user_id: UserId,
    pub name: String,
    pub is_teaching_staff: bool,
    pub department: Option<String>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub day_type: DayType,
    pub purpose: LeavePurpose,
    pub description: String,
    pub acting_staff: ActingStaffAssignment,
    pub acting_staff_statuses: ActingStaffStatuses,
    #[serde(default)]
    pub acting_staff_rejection_reasons: ActingStaffReasons,
    pub has_medical_certificate: bool,
    pub final_letter_content: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub sections: Vec<HalfDaySection>,
    pub status: LeaveStatus,
    pub hod_approval: ApprovalStatus,
    pub admin_approval: ApprovalStatus,
    #[serde(default)]
    pub hod_rejection_reason: Option<String>,
    #[serde(default)]
    pub admin_rejection_reason: Option<String>,
    #[serde(default)]
    pub approver_name: Option<String>,
    #[serde(default)]
    pub approver_role: Option<Role>,
    /// Optimistic concurrency token, bumped by the store on every update.
    #[serde(default)]
    pub version: u64,
}

impl LeaveRequest {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.from_date <= date && date <= self.to_date
    }

    pub fn department_label(&self) -> &str {
        self.department.as_deref().unwrap_or("N/A")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppNotification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    pub timestamp: DateTime<Utc>,
    pub leave_id: LeaveId,
}

impl AppNotification {
    pub fn unread(
        user_id: UserId,
        leave_id: LeaveId,
        kind: NotificationKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: NotificationId::generate(),
            user_id,
            message: message.into(),
            kind,
            is_read: false,
            timestamp: Utc::now(),
            leave_id,
        }
    }
}

/// Registration form. The name and department may be replaced by the
/// official directory entry when the e-mail or name resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub department: Option<String>,
    pub is_teaching_staff: bool,
    #[serde(default = "default_gender")]
    pub gender: Gender,
}

fn default_gender() -> Gender {
    Gender::Other
}
