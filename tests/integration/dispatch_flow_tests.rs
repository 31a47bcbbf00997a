//! Queue → spawn → finish → spawn, end to end through the shared document.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use super_dispatch::orchestrator::{
    spawn_next, HealthMonitor, SessionRegistry, TaskQueue, TerminalSessions,
};
use super_dispatch::AppError;

use super::support::{store, FakeTerminals};

#[test]
fn spawner_fills_slots_in_queue_order() {
    let home = tempfile::tempdir().expect("tempdir");
    let shared = store(home.path());
    shared
        .update(|doc| {
            doc.max_concurrent = 2;
            Ok(())
        })
        .unwrap();
    let queue = TaskQueue::new(Arc::new(store(home.path())));
    queue.queue_task("t1", "coder", 2, "first").unwrap();
    queue.queue_task("t2", "reviewer", 1, "second").unwrap();
    queue.preempt_queue("t3", "coder", "urgent").unwrap();
    let terminals = FakeTerminals::default();

    let first = spawn_next(&shared, &terminals).unwrap().unwrap();
    let second = spawn_next(&shared, &terminals).unwrap().unwrap();
    let blocked = spawn_next(&shared, &terminals).unwrap();

    assert_eq!(first.session.session_id, "agent-t3");
    assert_eq!(first.task.prompt, "urgent");
    assert_eq!(second.session.session_id, "agent-t2");
    assert_eq!(second.session.agent_type, "reviewer");
    assert!(blocked.is_none());
    assert!(terminals.exists("agent-t3").unwrap());
    assert_eq!(queue.get_queue_status().unwrap().next_task.as_deref(), Some("t1"));
}

#[test]
fn finishing_a_session_frees_its_slot() {
    let home = tempfile::tempdir().expect("tempdir");
    let shared = Arc::new(store(home.path()));
    shared
        .update(|doc| {
            doc.max_concurrent = 1;
            Ok(())
        })
        .unwrap();
    let queue = TaskQueue::new(Arc::clone(&shared));
    let terminals = Arc::new(FakeTerminals::default());
    let monitor = HealthMonitor::new(Arc::clone(&shared), terminals.clone());
    queue.queue_task("a", "coder", 2, "").unwrap();
    queue.queue_task("b", "coder", 2, "").unwrap();

    spawn_next(&shared, terminals.as_ref()).unwrap().unwrap();
    assert!(spawn_next(&shared, terminals.as_ref()).unwrap().is_none());

    assert!(monitor.cleanup_session("agent-a").unwrap());
    let next = spawn_next(&shared, terminals.as_ref()).unwrap().unwrap();
    assert_eq!(next.task.task_id, "b");
    assert_eq!(terminals.live(), 1);
}

#[test]
fn empty_queue_spawns_nothing() {
    let home = tempfile::tempdir().expect("tempdir");
    let shared = store(home.path());
    assert!(spawn_next(&shared, &FakeTerminals::default())
        .unwrap()
        .is_none());
}

#[test]
fn failed_terminal_start_requeues_the_task() {
    let home = tempfile::tempdir().expect("tempdir");
    let shared = Arc::new(store(home.path()));
    let queue = TaskQueue::new(Arc::clone(&shared));
    queue.queue_task("t1", "coder", 2, "keep me").unwrap();
    queue.queue_task("t2", "coder", 3, "").unwrap();
    let terminals = FakeTerminals::default();
    terminals.fail_create.store(true, Ordering::SeqCst);

    let err = spawn_next(&shared, &terminals).unwrap_err();

    assert!(matches!(err, AppError::Terminal(_)));
    let doc = shared.load().unwrap();
    assert!(doc.sessions.is_empty());
    assert_eq!(doc.queue[0].task_id, "t1");
    assert_eq!(doc.queue[0].prompt, "keep me");
    assert_eq!(doc.queue.len(), 2);
}

#[test]
fn task_with_live_session_is_skipped_not_stalled() {
    let home = tempfile::tempdir().expect("tempdir");
    let shared = Arc::new(store(home.path()));
    let queue = TaskQueue::new(Arc::clone(&shared));
    queue.queue_task("dup", "coder", 1, "").unwrap();
    queue.queue_task("other", "coder", 5, "").unwrap();
    SessionRegistry::new(Arc::clone(&shared))
        .add_session("dup", "coder", 1)
        .unwrap();
    let terminals = FakeTerminals::default();

    let launch = spawn_next(&shared, &terminals).unwrap().unwrap();

    assert_eq!(launch.task.task_id, "other");
    let doc = shared.load().unwrap();
    assert_eq!(doc.queue.len(), 1);
    assert_eq!(doc.queue[0].task_id, "dup");
    assert_eq!(doc.sessions.len(), 2);
    assert!(spawn_next(&shared, &terminals).unwrap().is_none());
}

#[test]
fn blocked_task_runs_once_its_session_ends() {
    let home = tempfile::tempdir().expect("tempdir");
    let shared = Arc::new(store(home.path()));
    let queue = TaskQueue::new(Arc::clone(&shared));
    let registry = SessionRegistry::new(Arc::clone(&shared));
    queue.queue_task("dup", "coder", 1, "").unwrap();
    let session = registry.add_session("dup", "coder", 1).unwrap();
    let terminals = FakeTerminals::default();
    assert!(spawn_next(&shared, &terminals).unwrap().is_none());

    assert!(registry.remove_session(&session.session_id).unwrap());
    let launch = spawn_next(&shared, &terminals).unwrap().unwrap();

    assert_eq!(launch.task.task_id, "dup");
    assert!(shared.load().unwrap().queue.is_empty());
}

#[test]
fn duplicate_task_is_rejected_while_its_session_runs() {
    let home = tempfile::tempdir().expect("tempdir");
    let shared = Arc::new(store(home.path()));
    let queue = TaskQueue::new(Arc::clone(&shared));
    queue.queue_task("t1", "coder", 2, "").unwrap();
    spawn_next(&shared, &FakeTerminals::default()).unwrap().unwrap();

    let err = queue.queue_task("t1", "coder", 2, "again").unwrap_err();

    assert!(matches!(err, AppError::AlreadyExists(_)));
    assert!(shared.load().unwrap().queue.is_empty());
}

#[test]
fn sweep_reclaims_crashed_sessions_for_the_queue() {
    let home = tempfile::tempdir().expect("tempdir");
    let shared = Arc::new(store(home.path()));
    shared
        .update(|doc| {
            doc.max_concurrent = 1;
            Ok(())
        })
        .unwrap();
    let queue = TaskQueue::new(Arc::clone(&shared));
    let terminals = Arc::new(FakeTerminals::default());
    let monitor = HealthMonitor::new(Arc::clone(&shared), terminals.clone());
    queue.queue_task("first", "coder", 2, "").unwrap();
    queue.queue_task("second", "coder", 2, "").unwrap();
    spawn_next(&shared, terminals.as_ref()).unwrap().unwrap();

    terminals.crash("agent-first");
    let report = monitor.sweep().unwrap();

    assert_eq!(report.dead, ["agent-first"]);
    assert!(report.timed_out.is_empty());
    let next = spawn_next(&shared, terminals.as_ref()).unwrap().unwrap();
    assert_eq!(next.task.task_id, "second");
}
