//! Leave requests, coverage delegation and the two-stage approval chain.

pub mod acting;
pub mod approval;
pub mod directory;
pub mod domain;
pub mod events;
pub mod identity;
pub mod notifications;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;
pub mod validation;

#[cfg(test)]
mod tests;

pub use approval::{ApprovalStage, TransitionError};
pub use directory::{DepartmentEntry, Directory, DirectoryEntry, DirectoryError};
pub use domain::{
    ActingStaffAssignment, ActingStaffStatuses, AppNotification, ApprovalStatus, DayType, Gender,
    HalfDaySection, LeaveApplication, LeaveId, LeavePurpose, LeaveRequest, LeaveStatus,
    NotificationKind, Period, Registration, Role, User, UserId, UserView,
};
pub use events::{spawn_reconciler, ChangeBus, ChangeEvent, ChangeKind};
pub use identity::{names_match, IdentityResolver};
pub use notifications::NotificationDispatcher;
pub use repository::{
    LeaveRepository, LeaveStore, NotificationRepository, RepositoryError, SessionRepository,
    UserRepository,
};
pub use router::leave_router;
pub use service::{AuthorityBoard, LeaveWorkflowError, LeaveWorkflowService};
pub use store::InMemoryLeaveStore;
pub use validation::{Decision, DecisionKind, RejectionReason, ValidationError};
