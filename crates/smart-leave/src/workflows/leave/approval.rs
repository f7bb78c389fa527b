//! Two-stage approval state machine and authority routing.
//!
//! Functions here never touch storage: they inspect or mutate a cloned
//! [`LeaveRequest`] and the service hands the result back to the store.

use serde::Serialize;

use super::directory::normalize;
use super::domain::{ApprovalStatus, LeaveRequest, LeaveStatus, Role, User};
use super::validation::Decision;

/// Stage an approver acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApprovalStage {
    HeadOfDepartment,
    Administration,
}

impl ApprovalStage {
    pub const fn for_role(role: Role) -> Option<Self> {
        match role {
            Role::HeadOfDepartment => Some(Self::HeadOfDepartment),
            Role::Principal | Role::VicePrincipal => Some(Self::Administration),
            Role::Staff => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::HeadOfDepartment => "HoD",
            Self::Administration => "Administration",
        }
    }

    pub fn status_of(self, leave: &LeaveRequest) -> ApprovalStatus {
        match self {
            Self::HeadOfDepartment => leave.hod_approval,
            Self::Administration => leave.admin_approval,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("request is already {}", .0.label())]
    Terminal(LeaveStatus),
    #[error("{} stage is {} and cannot be decided", .stage.label(), .status.label())]
    StageNotPending {
        stage: ApprovalStage,
        status: ApprovalStatus,
    },
    #[error("head of department has not approved this request yet")]
    AwaitingHeadOfDepartment,
    #[error("role {} has no approval stage", .0.label())]
    NoStage(Role),
}

/// Head-of-department stage at submission: skipped for non-teaching staff and
/// pre-approved when the applicant is a head.
pub const fn initial_hod_approval(
    is_teaching_staff: bool,
    applicant_is_head: bool,
) -> ApprovalStatus {
    if applicant_is_head {
        ApprovalStatus::Approved
    } else if is_teaching_staff {
        ApprovalStatus::Pending
    } else {
        ApprovalStatus::NotApplicable
    }
}

/// Records `decision` on `stage`. Head rejection is final and leaves the
/// administration stage as it was.
pub fn apply_stage_decision(
    leave: &mut LeaveRequest,
    stage: ApprovalStage,
    decision: &Decision,
    approver: &User,
) -> Result<(), TransitionError> {
    if leave.status.is_terminal() {
        return Err(TransitionError::Terminal(leave.status));
    }
    let current = stage.status_of(leave);
    if current != ApprovalStatus::Pending {
        return Err(TransitionError::StageNotPending {
            stage,
            status: current,
        });
    }

    match stage {
        ApprovalStage::HeadOfDepartment => {
            leave.hod_approval = decision.status();
            if let Decision::Reject(reason) = decision {
                leave.hod_rejection_reason = Some(reason.as_str().to_string());
                leave.status = LeaveStatus::Rejected;
            }
        }
        ApprovalStage::Administration => {
            if leave.hod_approval == ApprovalStatus::Pending {
                return Err(TransitionError::AwaitingHeadOfDepartment);
            }
            leave.admin_approval = decision.status();
            match decision {
                Decision::Approve => leave.status = LeaveStatus::Approved,
                Decision::Reject(reason) => {
                    leave.admin_rejection_reason = Some(reason.as_str().to_string());
                    leave.status = LeaveStatus::Rejected;
                }
            }
        }
    }

    leave.approver_name = Some(approver.name.clone());
    leave.approver_role = Some(approver.role);
    Ok(())
}

/// True when the head's department (possibly "A & B") includes `department`.
pub fn department_in_scope(head_department: &str, department: &str) -> bool {
    let target = normalize(department);
    if target.is_empty() {
        return false;
    }
    if normalize(head_department) == target {
        return true;
    }
    head_department
        .split('&')
        .any(|component| normalize(component) == target)
}

/// Authority routing: which requests `viewer` sees on their approval board.
pub fn is_visible_to(leave: &LeaveRequest, viewer: &User) -> bool {
    if leave.user_id == viewer.id {
        return false;
    }
    match viewer.role {
        Role::HeadOfDepartment => {
            match (viewer.department.as_deref(), leave.department.as_deref()) {
                (Some(head), Some(department)) => department_in_scope(head, department),
                _ => false,
            }
        }
        Role::Principal | Role::VicePrincipal => {
            leave.hod_approval == ApprovalStatus::Approved || !leave.is_teaching_staff
        }
        Role::Staff => false,
    }
}

/// Visible and still waiting on the viewer's stage.
pub fn is_actionable_by(leave: &LeaveRequest, viewer: &User) -> bool {
    let Some(stage) = ApprovalStage::for_role(viewer.role) else {
        return false;
    };
    !leave.status.is_terminal()
        && stage.status_of(leave) == ApprovalStatus::Pending
        && is_visible_to(leave, viewer)
}

pub fn visible_to_authority<'a>(
    leaves: &'a [LeaveRequest],
    viewer: &'a User,
) -> impl Iterator<Item = &'a LeaveRequest> + 'a {
    leaves.iter().filter(move |leave| is_visible_to(leave, viewer))
}
