use std::sync::Arc;

use super::common::*;
use crate::workflows::leave::domain::{ApprovalStatus, NotificationKind, Period, Role, User, UserId};
use crate::workflows::leave::notifications::{
    coverage_decision_message, coverage_request_message, decision_kind, stage_decision_message,
};
use crate::workflows::leave::repository::UserRepository;
use crate::workflows::leave::validation::{Decision, RejectionReason};
use crate::workflows::leave::{
    ApprovalStage, IdentityResolver, InMemoryLeaveStore, NotificationDispatcher,
};

fn member(id: &str, name: &str, email: &str) -> User {
    let mut user = approver(id, Role::Staff, Some("Computer Science"));
    user.name = name.to_string();
    user.email = email.to_string();
    user
}

fn dispatcher(store: &Arc<InMemoryLeaveStore>) -> NotificationDispatcher<InMemoryLeaveStore> {
    NotificationDispatcher::new(Arc::clone(store), Arc::new(IdentityResolver::new(directory())))
}

#[test]
fn one_notification_per_account_even_under_several_names() {
    let store = Arc::new(InMemoryLeaveStore::new());
    store
        .upsert_user(member("hema", "Ms.D.Hemalatha", "hemalathad@sankara.ac.in"))
        .expect("user");
    let mut leave = leave_record("owner", "Computer Science", true);
    leave.acting_staff = assignment(&[
        (date(11), Period::First, "Hemalatha"),
        (date(11), Period::Second, "D. Hemalatha"),
        (date(11), Period::Third, "Mrs.T.Nandhini"),
        (date(11), Period::Fourth, "N/A"),
    ]);

    let notified = dispatcher(&store)
        .notify_acting_staff(&leave, None)
        .expect("dispatch");

    assert_eq!(notified, 1, "unregistered colleagues are skipped");
    let inbox = dispatcher(&store)
        .notifications_for(&UserId("hema".to_string()))
        .expect("inbox");
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].leave_id, leave.id);
}

#[test]
fn request_without_assignees_notifies_nobody() {
    let store = Arc::new(InMemoryLeaveStore::new());
    let leave = leave_record("owner", "Computer Science", true);
    assert_eq!(
        dispatcher(&store)
            .notify_acting_staff(&leave, Some("Dr.M.Lingaraj Mani"))
            .expect("dispatch"),
        0
    );
}

#[test]
fn unread_count_tracks_mark_all_read() {
    let store = Arc::new(InMemoryLeaveStore::new());
    let leave = leave_record("owner", "Computer Science", true);
    let notifications = dispatcher(&store);
    let owner = UserId("owner".to_string());
    for message in ["first", "second"] {
        notifications
            .notify_user(&owner, &leave, NotificationKind::Info, message.to_string())
            .expect("notify");
    }

    assert_eq!(notifications.unread_count(&owner).expect("count"), 2);
    assert_eq!(notifications.mark_all_read(&owner).expect("mark"), 2);
    assert_eq!(notifications.unread_count(&owner).expect("count"), 0);
    assert_eq!(notifications.mark_all_read(&owner).expect("mark again"), 0);
    let inbox = notifications.notifications_for(&owner).expect("inbox");
    assert!(inbox[0].timestamp >= inbox[1].timestamp);
}

#[test]
fn messages_read_naturally() {
    let leave = leave_record("owner", "Computer Science", true);
    assert_eq!(
        coverage_request_message(&leave, None),
        "Ms.P.Bhavya requested you for coverage."
    );
    assert_eq!(
        coverage_request_message(&leave, Some("Dr.M.Lingaraj Mani")),
        "Dr.M.Lingaraj Mani (HoD) assigned you duty for Ms.P.Bhavya."
    );
    assert_eq!(
        coverage_decision_message("Ms.D.Hemalatha", &Decision::Approve, &[date(11)]),
        "Ms.D.Hemalatha has approved duty for 2024-03-11."
    );

    let head = approver("head", Role::HeadOfDepartment, Some("Computer Science"));
    let rejection = Decision::Reject(RejectionReason::new("Exam week").expect("reason"));
    assert_eq!(
        stage_decision_message(&leave, ApprovalStage::HeadOfDepartment, &head, &rejection),
        concat!(
            "Your Personal Issue request from 2024-03-11 was rejected by ",
            "Approver head (HoD). Reason: Exam week"
        )
    );
    assert_eq!(decision_kind(&rejection), NotificationKind::Warning);
    assert_eq!(rejection.status(), ApprovalStatus::Rejected);
}
