use std::time::Duration;

use super_dispatch::messaging::Mailbox;
use super_dispatch::models::message::MessageKind;

fn open(dir: &std::path::Path) -> Mailbox {
    Mailbox::open(dir, Duration::from_secs(5)).expect("open mailbox")
}

#[test]
fn request_help_truncates_subject() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mailbox = open(dir.path());
    let task = "x".repeat(80);

    let msg = mailbox.request_help("a", "b", &task).unwrap();

    assert_eq!(msg.msg_type, MessageKind::Request);
    assert_eq!(msg.subject, format!("Help needed: {}", "x".repeat(50)));
    assert_eq!(msg.content, task);
}

#[test]
fn short_task_is_not_padded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mailbox = open(dir.path());

    let msg = mailbox.request_help("a", "b", "flaky test").unwrap();
    assert_eq!(msg.subject, "Help needed: flaky test");
}

#[test]
fn truncation_counts_characters_not_bytes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mailbox = open(dir.path());
    let task = "é".repeat(60);

    let msg = mailbox.handoff_task("a", "b", &task, "ctx").unwrap();
    assert_eq!(msg.subject, format!("Task handoff: {}", "é".repeat(50)));
}

#[test]
fn handoff_packs_task_and_context() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mailbox = open(dir.path());

    let msg = mailbox
        .handoff_task("a", "b", "ship it", "branch feat/x")
        .unwrap();

    assert_eq!(msg.msg_type, MessageKind::Handoff);
    assert_eq!(msg.content, "TASK: ship it\n\nCONTEXT:\nbranch feat/x");
}

#[test]
fn share_data_names_the_payload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mailbox = open(dir.path());

    let msg = mailbox
        .share_data("a", "b", "coverage", "{\"lines\": 91}")
        .unwrap();

    assert_eq!(msg.msg_type, MessageKind::Data);
    assert_eq!(msg.subject, "Data: coverage");
    assert_eq!(msg.content, "{\"lines\": 91}");
}

#[test]
fn broadcast_status_goes_to_everyone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mailbox = open(dir.path());
    mailbox.register("x").unwrap();
    mailbox.register("y").unwrap();

    let msg = mailbox.broadcast_status("lead", "50% done").unwrap();

    assert!(msg.is_broadcast());
    assert_eq!(msg.msg_type, MessageKind::Status);
    assert_eq!(msg.subject, "Status update");
    assert_eq!(mailbox.receive("x", true).unwrap().len(), 1);
    assert_eq!(mailbox.receive("y", true).unwrap().len(), 1);
}
