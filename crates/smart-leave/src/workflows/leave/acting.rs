//! Period coverage ("acting staff") delegation.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{
    dates_in_range, ActingStaffAssignment, ActingStaffReasons, ActingStaffStatuses,
    ApprovalStatus, DailyAssignment, LeaveId, LeaveRequest, Period,
};
use super::identity::matches_any;
use super::validation::{Decision, ValidationError};

const SENTINELS: [&str; 2] = ["Free", "N/A"];

/// Blank, "Free" and "N/A" mean the period needs no cover. Case-sensitive.
pub fn is_sentinel(assignee: &str) -> bool {
    let trimmed = assignee.trim();
    trimmed.is_empty() || SENTINELS.contains(&trimmed)
}

/// Trims the submitted map to `[from, to]` with all six periods per date and
/// derives the initial statuses. Non-teaching requests carry no assignments.
pub fn normalize_assignments(
    submitted: &ActingStaffAssignment,
    from: NaiveDate,
    to: NaiveDate,
    is_teaching_staff: bool,
) -> (ActingStaffAssignment, ActingStaffStatuses) {
    let mut acting = ActingStaffAssignment::new();
    let mut statuses = ActingStaffStatuses::new();

    for date in dates_in_range(from, to) {
        let day = submitted.get(&date);
        let mut assignments = DailyAssignment::new();
        let mut day_statuses = BTreeMap::new();
        for period in Period::ordered() {
            let assignee = if is_teaching_staff {
                day.and_then(|periods| periods.get(&period))
                    .map(|name| name.trim().to_string())
                    .unwrap_or_default()
            } else {
                String::new()
            };
            let status = if is_sentinel(&assignee) {
                ApprovalStatus::NotApplicable
            } else {
                ApprovalStatus::Pending
            };
            day_statuses.insert(period, status);
            if is_teaching_staff {
                assignments.insert(period, assignee);
            }
        }
        if is_teaching_staff {
            acting.insert(date, assignments);
        }
        statuses.insert(date, day_statuses);
    }

    (acting, statuses)
}

/// Every (date, period) on `leave` whose assignee is one of `identities`.
pub fn assigned_cells(leave: &LeaveRequest, identities: &[String]) -> Vec<(NaiveDate, Period)> {
    leave
        .acting_staff
        .iter()
        .flat_map(|(date, periods)| {
            periods
                .iter()
                .filter(|(_, name)| !is_sentinel(name) && matches_any(identities, name))
                .map(move |(period, _)| (*date, *period))
        })
        .collect()
}

pub fn is_assigned_to(leave: &LeaveRequest, identities: &[String]) -> bool {
    !assigned_cells(leave, identities).is_empty()
}

/// Requests with at least one period delegated to the caller.
pub fn acting_requests_for<'a>(
    leaves: &'a [LeaveRequest],
    identities: &[String],
) -> Vec<&'a LeaveRequest> {
    leaves
        .iter()
        .filter(|leave| is_assigned_to(leave, identities))
        .collect()
}

/// Applies one decision to every cell assigned to the caller and returns the
/// affected dates in order.
pub fn apply_acting_decision(
    leave: &mut LeaveRequest,
    identities: &[String],
    decision: &Decision,
) -> Result<Vec<NaiveDate>, ValidationError> {
    let cells = assigned_cells(leave, identities);
    if cells.is_empty() {
        return Err(ValidationError::NotAssigned);
    }

    let status = decision.status();
    let mut dates: Vec<NaiveDate> = Vec::new();
    for (date, period) in cells {
        leave
            .acting_staff_statuses
            .entry(date)
            .or_default()
            .insert(period, status);
        record_reason(&mut leave.acting_staff_rejection_reasons, date, period, decision);
        if dates.last() != Some(&date) {
            dates.push(date);
        }
    }
    Ok(dates)
}

fn record_reason(
    reasons: &mut ActingStaffReasons,
    date: NaiveDate,
    period: Period,
    decision: &Decision,
) {
    match decision.reason() {
        Some(reason) => {
            reasons
                .entry(date)
                .or_default()
                .insert(period, reason.to_string());
        }
        None => {
            if let Some(day) = reasons.get_mut(&date) {
                day.remove(&period);
                if day.is_empty() {
                    reasons.remove(&date);
                }
            }
        }
    }
}

fn pending_periods(leave: &LeaveRequest, identities: &[String]) -> Vec<(NaiveDate, Period)> {
    assigned_cells(leave, identities)
        .into_iter()
        .filter(|(date, period)| {
            leave
                .acting_staff_statuses
                .get(date)
                .and_then(|day| day.get(period))
                == Some(&ApprovalStatus::Pending)
        })
        .collect()
}

/// Number of cells still waiting on the caller's answer.
pub fn pending_duty_count(leaves: &[LeaveRequest], identities: &[String]) -> usize {
    leaves
        .iter()
        .map(|leave| pending_periods(leave, identities).len())
        .sum()
}

/// One inbox row: the periods on a date that await the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDuty {
    pub leave_id: LeaveId,
    pub applicant: String,
    pub department: Option<String>,
    pub date: NaiveDate,
    pub periods: Vec<Period>,
}

pub fn pending_duties(leaves: &[LeaveRequest], identities: &[String]) -> Vec<PendingDuty> {
    let mut duties: Vec<PendingDuty> = Vec::new();
    for leave in leaves {
        for (date, period) in pending_periods(leave, identities) {
            let same_row = duties
                .last()
                .is_some_and(|duty| duty.leave_id == leave.id && duty.date == date);
            if let (true, Some(duty)) = (same_row, duties.last_mut()) {
                duty.periods.push(period);
                continue;
            }
            duties.push(PendingDuty {
                leave_id: leave.id.clone(),
                applicant: leave.name.clone(),
                department: leave.department.clone(),
                date,
                periods: vec![period],
            });
        }
    }
    duties
}

/// Requests whose date range covers `date`.
pub fn leaves_on(leaves: &[LeaveRequest], date: NaiveDate) -> Vec<&LeaveRequest> {
    leaves.iter().filter(|leave| leave.covers(date)).collect()
}

/// Distinct non-sentinel assignees in date/period order.
pub fn distinct_assignees(acting: &ActingStaffAssignment) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in acting.values().flat_map(|periods| periods.values()) {
        let trimmed = name.trim();
        if !is_sentinel(trimmed) && !names.iter().any(|existing| existing == trimmed) {
            names.push(trimmed.to_string());
        }
    }
    names
}
