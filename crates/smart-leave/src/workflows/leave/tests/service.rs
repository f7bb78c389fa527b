use std::sync::Arc;

use super::common::*;
use crate::workflows::leave::domain::{
    ApprovalStatus, DayType, LeavePurpose, LeaveStatus, NotificationKind, Period, Role,
};
use crate::workflows::leave::repository::{LeaveRepository, RepositoryError, UserRepository};
use crate::workflows::leave::validation::{Decision, DecisionKind, RejectionReason, ValidationError};
use crate::workflows::leave::{ChangeKind, LeaveWorkflowError, TransitionError};

fn reject(reason: &str) -> Decision {
    Decision::Reject(RejectionReason::new(reason).expect("non-blank reason"))
}

#[test]
fn registration_adopts_official_profile_and_signs_in() {
    let (service, store) = build_service();
    let view = service
        .register(registration("Hema", "HemalathaD@sankara.ac.in", Role::Staff, Some("MBA")))
        .expect("registers");

    assert_eq!(view.name, "Ms.D.Hemalatha");
    assert_eq!(view.department.as_deref(), Some("Computer Science"));
    assert_eq!(
        service.current_user().expect("session readable"),
        Some(view.clone())
    );

    let stored = store
        .fetch_user(&view.id)
        .expect("fetch")
        .expect("user stored");
    let hash = stored.password_hash.expect("password hashed");
    assert_ne!(hash, "correct horse");
    assert!(bcrypt::verify("correct horse", &hash).expect("valid hash"));
}

#[test]
fn registration_rejects_foreign_domain_and_duplicates() {
    let (service, _) = build_service();
    let err = service
        .register(registration("Guest", "guest@gmail.com", Role::Staff, None))
        .expect_err("foreign domain");
    assert!(matches!(
        err,
        LeaveWorkflowError::Validation(ValidationError::EmailDomain { .. })
    ));

    service
        .register(registration("Bhavya", "bhavyap@sankara.ac.in", Role::Staff, None))
        .expect("first registration");
    let err = service
        .register(registration("Bhavya", " BhavyaP@sankara.ac.in ", Role::Staff, None))
        .expect_err("duplicate");
    assert!(matches!(
        err,
        LeaveWorkflowError::Validation(ValidationError::DuplicateEmail)
    ));
}

#[test]
fn administration_accounts_are_never_teaching_staff() {
    let (service, _) = build_service();
    let view = service
        .register(registration("Dr.K.Anand", "principal@sankara.ac.in", Role::Principal, None))
        .expect("registers");
    assert!(!view.is_teaching_staff);
}

#[test]
fn login_failures_are_indistinguishable() {
    let (service, _) = build_service();
    service
        .register(registration("Bhavya", "bhavyap@sankara.ac.in", Role::Staff, None))
        .expect("registers");
    service.logout().expect("logout");
    assert_eq!(service.current_user().expect("session readable"), None);

    let wrong_password = service
        .login("bhavyap@sankara.ac.in", "tr0ub4dor")
        .expect_err("wrong password");
    let unknown = service
        .login("nobody@sankara.ac.in", "correct horse")
        .expect_err("unknown email");
    assert_eq!(wrong_password.to_string(), unknown.to_string());
    assert!(matches!(unknown, LeaveWorkflowError::InvalidCredentials));

    let view = service
        .login("BHAVYAP@sankara.ac.in", "correct horse")
        .expect("case-insensitive email");
    assert_eq!(view.name, "Ms.P.Bhavya");
}

#[test]
fn two_day_request_with_delegation() {
    let (service, _) = build_service();
    let room = staffroom(&service);
    let mut events = service.bus().subscribe();

    let leave = service
        .submit(&room.applicant.id, two_day_application())
        .expect("submits");

    assert_eq!(leave.to_date, date(12));
    assert_eq!(leave.department.as_deref(), Some("Computer Science"));
    assert_eq!(leave.status, LeaveStatus::Pending);
    assert_eq!(leave.hod_approval, ApprovalStatus::Pending);
    assert_eq!(leave.admin_approval, ApprovalStatus::Pending);
    let cells: usize = leave.acting_staff_statuses.values().map(|day| day.len()).sum();
    assert_eq!(cells, 12);
    assert_eq!(
        service.pending_duty_count(&room.colleague.id).expect("count"),
        2
    );
    assert_eq!(events.try_recv().expect("leave event").kind, ChangeKind::Leaves);

    let inbox = service
        .notifications_for(&room.colleague.id)
        .expect("notifications");
    assert_eq!(inbox.len(), 1, "one notification per colleague");
    assert_eq!(inbox[0].message, "Ms.P.Bhavya requested you for coverage.");
    assert_eq!(inbox[0].kind, NotificationKind::Info);
    assert!(!inbox[0].is_read);
}

#[test]
fn on_duty_collapses_to_a_single_day() {
    let (service, _) = build_service();
    let room = staffroom(&service);
    let mut form = two_day_application();
    form.purpose = LeavePurpose::OnDuty;
    form.to_date = Some(date(15));

    let leave = service.submit(&room.applicant.id, form).expect("submits");

    assert_eq!(leave.to_date, leave.from_date);
    assert_eq!(leave.acting_staff_statuses.len(), 1);
    assert_eq!(leave.acting_staff.len(), 1);
    assert_eq!(service.pending_duty_count(&room.colleague.id).expect("count"), 1);
}

#[test]
fn half_day_keeps_time_and_sections_only_for_half_days() {
    let (service, _) = build_service();
    let room = staffroom(&service);

    let mut half = two_day_application();
    half.day_type = DayType::HalfDay;
    half.time = Some("13:30".to_string());
    half.sections = vec![crate::workflows::leave::domain::HalfDaySection::Afternoon];
    let leave = service.submit(&room.applicant.id, half).expect("submits");
    assert_eq!(leave.to_date, date(11));
    assert_eq!(leave.time.as_deref(), Some("13:30"));

    let mut full = two_day_application();
    full.time = Some("13:30".to_string());
    let leave = service.submit(&room.applicant.id, full).expect("submits");
    assert_eq!(leave.time, None);
    assert!(leave.sections.is_empty());
}

#[test]
fn inverted_range_is_refused() {
    let (service, store) = build_service();
    let room = staffroom(&service);
    let mut form = two_day_application();
    form.from_date = date(12);
    form.to_date = Some(date(11));

    let err = service
        .submit(&room.applicant.id, form)
        .expect_err("to before from");
    assert!(matches!(
        err,
        LeaveWorkflowError::Validation(ValidationError::InvertedDateRange { .. })
    ));
    assert!(store.leaves().expect("leaves").is_empty());
}

#[test]
fn range_beyond_the_configured_maximum_is_refused() {
    let (service, store) = build_service();
    let room = staffroom(&service);
    let mut form = two_day_application();
    form.to_date = Some(chrono::NaiveDate::MAX);

    let err = service
        .submit(&room.applicant.id, form)
        .expect_err("range far past the cap");
    assert!(matches!(
        err,
        LeaveWorkflowError::Validation(ValidationError::RangeTooLong { max: 60, .. })
    ));
    assert!(store.leaves().expect("leaves").is_empty());

    let mut form = two_day_application();
    form.to_date = Some(date(11) + chrono::Duration::days(59));
    let leave = service
        .submit(&room.applicant.id, form)
        .expect("exactly sixty days is allowed");
    assert_eq!(leave.acting_staff_statuses.len(), 60);
}

#[test]
fn head_of_department_is_self_exempt() {
    let (service, _) = build_service();
    let room = staffroom(&service);

    let leave = service
        .submit(&room.head.id, two_day_application())
        .expect("head submits");
    assert_eq!(leave.hod_approval, ApprovalStatus::Approved);

    let inbox = service
        .notifications_for(&room.colleague.id)
        .expect("notifications");
    assert_eq!(
        inbox[0].message,
        "Dr.M.Lingaraj Mani requested you for coverage."
    );

    let board = service
        .authority_board(&room.principal.id, None, false)
        .expect("board");
    assert_eq!(board.leaves.len(), 1, "goes straight to administration");
}

#[test]
fn directory_head_registered_as_staff_is_also_exempt() {
    let (service, _) = build_service();
    let head = service
        .register(registration("Sasikala", "sasikalar@sankara.ac.in", Role::Staff, None))
        .expect("registers");
    assert_eq!(head.name, "Dr.R.Sasikala");

    let leave = service
        .submit(&head.id, two_day_application())
        .expect("submits");
    assert_eq!(leave.hod_approval, ApprovalStatus::Approved);
}

#[test]
fn non_teaching_request_skips_head_and_delegation() {
    let (service, _) = build_service();
    let room = staffroom(&service);
    let mut form = registration(
        "Office Clerk",
        "clerk@sankara.ac.in",
        Role::Staff,
        Some("Non-Teaching Support"),
    );
    form.is_teaching_staff = false;
    let clerk = service.register(form).expect("registers");

    let leave = service
        .submit(&clerk.id, two_day_application())
        .expect("submits");

    assert_eq!(leave.hod_approval, ApprovalStatus::NotApplicable);
    assert!(leave.acting_staff.is_empty());
    assert!(leave
        .acting_staff_statuses
        .values()
        .flat_map(|day| day.values())
        .all(|status| *status == ApprovalStatus::NotApplicable));
    assert!(service
        .notifications_for(&room.colleague.id)
        .expect("notifications")
        .is_empty());

    let board = service
        .authority_board(&room.principal.id, None, true)
        .expect("board");
    assert_eq!(board.leaves.len(), 1);
}

#[test]
fn administration_sees_teaching_request_only_after_head_approval() {
    let (service, _) = build_service();
    let room = staffroom(&service);
    let leave = service
        .submit(&room.applicant.id, two_day_application())
        .expect("submits");

    let board = service
        .authority_board(&room.principal.id, None, false)
        .expect("board");
    assert!(board.leaves.is_empty());
    assert_eq!(board.pending_count, 0);

    let err = service
        .decide_stage(&room.principal.id, &leave.id, Decision::Approve)
        .expect_err("not visible yet");
    assert!(matches!(err, LeaveWorkflowError::NotVisible));

    let head_board = service
        .authority_board(&room.head.id, None, true)
        .expect("board");
    assert_eq!(head_board.pending_count, 1);

    service
        .decide_stage(&room.head.id, &leave.id, Decision::Approve)
        .expect("head approves");
    let board = service
        .authority_board(&room.principal.id, None, true)
        .expect("board");
    assert_eq!(board.leaves.len(), 1);
    assert_eq!(board.pending_count, 1);

    let approved = service
        .decide_stage(&room.principal.id, &leave.id, Decision::Approve)
        .expect("principal approves");
    assert_eq!(approved.status, LeaveStatus::Approved);
    assert_eq!(approved.approver_role, Some(Role::Principal));

    let inbox = service
        .notifications_for(&room.applicant.id)
        .expect("notifications");
    assert_eq!(inbox.len(), 2);
    assert!(inbox.iter().all(|n| n.kind == NotificationKind::Success));
}

#[test]
fn rejection_without_reason_is_refused_then_retry_succeeds() {
    let (service, store) = build_service();
    let room = staffroom(&service);
    let leave = service
        .submit(&room.applicant.id, two_day_application())
        .expect("submits");

    let err = Decision::from_parts(DecisionKind::Rejected, Some("   ".to_string()))
        .expect_err("blank reason");
    assert_eq!(err, ValidationError::MissingReason);
    let unchanged = store
        .fetch_leave(&leave.id)
        .expect("fetch")
        .expect("stored");
    assert_eq!(unchanged.hod_approval, ApprovalStatus::Pending);
    assert_eq!(unchanged.version, leave.version);

    let decision = Decision::from_parts(DecisionKind::Rejected, Some("Exam week".to_string()))
        .expect("reason given");
    let rejected = service
        .decide_stage(&room.head.id, &leave.id, decision)
        .expect("head rejects");
    assert_eq!(rejected.status, LeaveStatus::Rejected);
    assert_eq!(rejected.hod_rejection_reason.as_deref(), Some("Exam week"));
    assert_eq!(rejected.admin_approval, ApprovalStatus::Pending);

    let inbox = service
        .notifications_for(&room.applicant.id)
        .expect("notifications");
    assert_eq!(inbox[0].kind, NotificationKind::Warning);
    assert!(inbox[0].message.ends_with("Reason: Exam week"));

    let err = service
        .decide_stage(&room.head.id, &leave.id, Decision::Approve)
        .expect_err("terminal");
    assert!(matches!(
        err,
        LeaveWorkflowError::Transition(TransitionError::Terminal(LeaveStatus::Rejected))
    ));
}

#[test]
fn staff_cannot_decide_stages() {
    let (service, _) = build_service();
    let room = staffroom(&service);
    let leave = service
        .submit(&room.applicant.id, two_day_application())
        .expect("submits");

    let err = service
        .decide_stage(&room.colleague.id, &leave.id, Decision::Approve)
        .expect_err("staff has no stage");
    assert!(matches!(
        err,
        LeaveWorkflowError::Transition(TransitionError::NoStage(Role::Staff))
    ));
}

#[test]
fn colleague_answer_notifies_applicant_with_all_dates() {
    let (service, _) = build_service();
    let room = staffroom(&service);
    let leave = service
        .submit(&room.applicant.id, two_day_application())
        .expect("submits");

    let updated = service
        .update_acting_status(&room.colleague.id, &leave.id, reject("Lab exam"))
        .expect("colleague answers");
    assert_eq!(
        updated.acting_staff_statuses[&date(11)][&Period::First],
        ApprovalStatus::Rejected
    );
    assert_eq!(updated.version, leave.version + 1);
    assert_eq!(service.pending_duty_count(&room.colleague.id).expect("count"), 0);

    let inbox = service
        .notifications_for(&room.applicant.id)
        .expect("notifications");
    assert_eq!(
        inbox[0].message,
        "Ms.D.Hemalatha has rejected duty for 2024-03-11, 2024-03-12. Reason: Lab exam"
    );
    assert_eq!(inbox[0].kind, NotificationKind::Warning);
    assert_eq!(service.unread_count(&room.applicant.id).expect("unread"), 1);
    assert_eq!(service.mark_all_read(&room.applicant.id).expect("marked"), 1);
    assert_eq!(service.mark_all_read(&room.applicant.id).expect("idempotent"), 0);
}

#[test]
fn committed_writes_survive_a_notification_outage() {
    let store = Arc::new(InboxOutageStore::new());
    let service = service_with(Arc::clone(&store));
    let room = staffroom(&service);

    let leave = service
        .submit(&room.applicant.id, two_day_application())
        .expect("submission stands without coverage notices");
    assert_eq!(store.leaves().expect("leaves"), vec![leave.clone()]);

    let answered = service
        .update_acting_status(&room.colleague.id, &leave.id, Decision::Approve)
        .expect("answer stands without applicant notice");
    let decided = service
        .decide_stage(&room.head.id, &leave.id, Decision::Approve)
        .expect("decision stands without applicant notice");

    let stored = store.fetch_leave(&leave.id).expect("fetch").expect("stored");
    assert_eq!(stored, decided);
    assert_eq!(stored.version, answered.version + 1);
    assert_eq!(stored.hod_approval, ApprovalStatus::Approved);
    assert!(service
        .notifications_for(&room.applicant.id)
        .expect("inbox")
        .is_empty());
}

#[test]
fn unassigned_colleague_cannot_answer() {
    let (service, store) = build_service();
    let room = staffroom(&service);
    let leave = service
        .submit(&room.applicant.id, two_day_application())
        .expect("submits");

    let err = service
        .update_acting_status(&room.head.id, &leave.id, Decision::Approve)
        .expect_err("head holds no period");
    assert!(matches!(
        err,
        LeaveWorkflowError::Validation(ValidationError::NotAssigned)
    ));
    let stored = store.fetch_leave(&leave.id).expect("fetch").expect("stored");
    assert_eq!(stored, leave);
}

#[test]
fn unknown_leave_and_user_are_reported() {
    let (service, _) = build_service();
    let room = staffroom(&service);
    let missing = crate::workflows::leave::domain::LeaveId("missing".to_string());
    assert!(matches!(
        service.update_acting_status(&room.colleague.id, &missing, Decision::Approve),
        Err(LeaveWorkflowError::UnknownLeave(_))
    ));
    let ghost = crate::workflows::leave::domain::UserId("ghost".to_string());
    assert!(matches!(
        service.submit(&ghost, two_day_application()),
        Err(LeaveWorkflowError::UnknownUser(_))
    ));
}

#[test]
fn stale_write_is_retried_against_fresh_record() {
    let store = Arc::new(RacingStore::new(1));
    let service = service_with(Arc::clone(&store));
    let room = staffroom(&service);
    let leave = service
        .submit(&room.applicant.id, two_day_application())
        .expect("submits");

    let updated = service
        .update_acting_status(&room.colleague.id, &leave.id, Decision::Approve)
        .expect("retry lands");
    assert_eq!(updated.version, leave.version + 2);
    assert_eq!(
        updated.acting_staff_statuses[&date(12)][&Period::Second],
        ApprovalStatus::Approved
    );
}

#[test]
fn persistent_conflict_is_reported_after_bounded_retries() {
    let store = Arc::new(RacingStore::new(10));
    let service = service_with(Arc::clone(&store));
    let room = staffroom(&service);
    let leave = service
        .submit(&room.applicant.id, two_day_application())
        .expect("submits");

    let err = service
        .decide_stage(&room.head.id, &leave.id, Decision::Approve)
        .expect_err("keeps losing the race");
    assert!(matches!(
        err,
        LeaveWorkflowError::Repository(RepositoryError::Stale { .. })
    ));
}

#[test]
fn authority_board_filters_by_received_date() {
    let (service, _) = build_service();
    let room = staffroom(&service);
    service
        .submit(&room.applicant.id, two_day_application())
        .expect("submits");

    let yesterday = chrono::Utc::now().date_naive() - chrono::Duration::days(1);
    let board = service
        .authority_board(&room.head.id, Some(yesterday), false)
        .expect("board");
    assert!(board.leaves.is_empty());
    assert_eq!(board.pending_count, 1, "badge counts every pending request");
}

#[test]
fn acting_options_exclude_the_applicant() {
    let (service, _) = build_service();
    let room = staffroom(&service);

    let options = service
        .acting_staff_options("Computer Science", Some(&room.applicant.id))
        .expect("options");

    assert!(options.iter().all(|option| option.id != room.applicant.id));
    assert!(options.iter().any(|option| option.id == room.colleague.id));
    assert!(options.iter().all(|option| option.name != "Ms.P.Bhavya"));
    assert!(options.iter().any(|option| option.id.0 == "dir-Mrs.T.Nandhini"));
}

#[test]
fn reset_clears_everything_and_publishes() {
    let (service, store) = build_service();
    let room = staffroom(&service);
    service
        .submit(&room.applicant.id, two_day_application())
        .expect("submits");
    let mut events = service.bus().subscribe();

    service.reset().expect("reset");

    assert!(store.users().expect("users").is_empty());
    assert!(store.leaves().expect("leaves").is_empty());
    assert_eq!(service.current_user().expect("session"), None);
    assert_eq!(events.try_recv().expect("event").kind, ChangeKind::Reset);
}

#[test]
fn leaves_on_and_for_user() {
    let (service, _) = build_service();
    let room = staffroom(&service);
    service
        .submit(&room.applicant.id, two_day_application())
        .expect("submits");

    assert_eq!(service.leaves_on(date(12)).expect("by date").len(), 1);
    assert!(service.leaves_on(date(13)).expect("by date").is_empty());
    assert_eq!(
        service.leaves_for_user(&room.applicant.id).expect("mine").len(),
        1
    );
    assert!(service
        .leaves_for_user(&room.colleague.id)
        .expect("theirs")
        .is_empty());
    assert_eq!(
        service.acting_requests_for(&room.colleague.id).expect("duties").len(),
        1
    );
}
