use super::domain::{AppNotification, LeaveId, LeaveRequest, User, UserId};

/// Storage abstraction for registered accounts. Emails are unique
/// case-insensitively.
pub trait UserRepository: Send + Sync {
    /// Inserts the user, or replaces the account registered under the same
    /// e-mail while keeping its id.
    fn upsert_user(&self, user: User) -> Result<User, RepositoryError>;
    fn fetch_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    fn users(&self) -> Result<Vec<User>, RepositoryError>;
}

/// Storage abstraction for leave requests.
pub trait LeaveRepository: Send + Sync {
    fn insert_leave(&self, leave: LeaveRequest) -> Result<LeaveRequest, RepositoryError>;
    /// Replaces the stored request when `leave.version` matches the stored
    /// version and returns the record with its new version.
    fn update_leave(&self, leave: LeaveRequest) -> Result<LeaveRequest, RepositoryError>;
    fn fetch_leave(&self, id: &LeaveId) -> Result<Option<LeaveRequest>, RepositoryError>;
    /// All requests, newest submission first.
    fn leaves(&self) -> Result<Vec<LeaveRequest>, RepositoryError>;
}

pub trait NotificationRepository: Send + Sync {
    /// Stores the notification ahead of every existing one.
    fn prepend_notification(&self, notification: AppNotification) -> Result<(), RepositoryError>;
    fn notifications_for(&self, user_id: &UserId) -> Result<Vec<AppNotification>, RepositoryError>;
    /// Returns how many notifications changed state.
    fn mark_all_read(&self, user_id: &UserId) -> Result<usize, RepositoryError>;
}

/// Singleton holding the currently signed-in account.
pub trait SessionRepository: Send + Sync {
    fn current_session(&self) -> Result<Option<UserId>, RepositoryError>;
    fn start_session(&self, user_id: UserId) -> Result<(), RepositoryError>;
    fn end_session(&self) -> Result<(), RepositoryError>;
}

/// The four logical tables behind the workflow.
pub trait LeaveStore:
    UserRepository + LeaveRepository + NotificationRepository + SessionRepository
{
    /// Irreversibly clears every table.
    fn clear_all(&self) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error(
        "record changed since it was read (stored version {stored}, write based on {attempted})"
    )]
    Stale { stored: u64, attempted: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
