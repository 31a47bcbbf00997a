use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use super_dispatch::models::session::Session;
use super_dispatch::orchestrator::HealthMonitor;
use super_dispatch::persistence::{StateDocument, StateStore};

use super::support::{store_in, FakeTerminals};

fn seed(store: &StateStore, sessions: Vec<Session>) {
    store
        .save(&StateDocument {
            sessions,
            ..StateDocument::default()
        })
        .expect("seed");
}

fn ago(minutes: i64, task_id: &str) -> Session {
    Session::started_at(
        task_id,
        "coder",
        2,
        Utc::now() - TimeDelta::minutes(minutes),
    )
}

#[test]
fn timeout_boundary_is_strict() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_in(dir.path());
    let now = Utc::now();
    seed(
        &store,
        vec![
            Session::started_at("over", "coder", 2, now - TimeDelta::minutes(11)),
            Session::started_at("under", "coder", 2, now - TimeDelta::minutes(9)),
            Session::started_at("exact", "coder", 2, now - TimeDelta::minutes(10)),
        ],
    );
    let monitor = HealthMonitor::new(Arc::clone(&store), FakeTerminals::with_alive(&[]));

    let ids: Vec<_> = monitor
        .timed_out_sessions_at(now)
        .unwrap()
        .into_iter()
        .map(|s| s.task_id)
        .collect();
    assert_eq!(ids, ["over"]);
}

#[test]
fn timeout_uses_configured_minutes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_in(dir.path());
    store
        .save(&StateDocument {
            sessions: vec![ago(3, "short")],
            timeout_minutes: 2,
            ..StateDocument::default()
        })
        .unwrap();
    let monitor = HealthMonitor::new(Arc::clone(&store), FakeTerminals::with_alive(&[]));

    assert_eq!(monitor.get_timed_out_sessions().unwrap().len(), 1);
}

#[test]
fn health_check_partitions_without_mutating() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_in(dir.path());
    seed(&store, vec![ago(1, "alive"), ago(1, "gone")]);
    let monitor = HealthMonitor::new(
        Arc::clone(&store),
        FakeTerminals::with_alive(&["agent-alive"]),
    );

    let report = monitor.health_check().unwrap();

    assert_eq!(report.healthy, ["agent-alive"]);
    assert_eq!(report.dead, ["agent-gone"]);
    assert_eq!(store.load().unwrap().sessions.len(), 2);
}

#[test]
fn exists_failure_counts_as_dead() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_in(dir.path());
    seed(&store, vec![ago(1, "t1")]);
    let terminals = FakeTerminals::with_alive(&["agent-t1"]);
    terminals.fail_exists.store(true, Ordering::SeqCst);
    let monitor = HealthMonitor::new(Arc::clone(&store), terminals);

    let report = monitor.health_check().unwrap();
    assert!(report.healthy.is_empty());
    assert_eq!(report.dead, ["agent-t1"]);
}

#[test]
fn cleanup_kills_and_removes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_in(dir.path());
    seed(&store, vec![ago(1, "t1")]);
    let terminals = FakeTerminals::with_alive(&["agent-t1"]);
    let monitor = HealthMonitor::new(Arc::clone(&store), terminals.clone());

    assert!(monitor.cleanup_session("agent-t1").unwrap());

    assert!(!terminals.is_alive("agent-t1"));
    assert!(store.load().unwrap().sessions.is_empty());
}

#[test]
fn cleanup_removes_even_when_kill_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_in(dir.path());
    seed(&store, vec![ago(1, "t1")]);
    let terminals = FakeTerminals::with_alive(&["agent-t1"]);
    terminals.fail_kill.store(true, Ordering::SeqCst);
    let monitor = HealthMonitor::new(Arc::clone(&store), terminals.clone());

    assert!(monitor.cleanup_session("agent-t1").unwrap());
    assert_eq!(*terminals.killed.lock().unwrap(), ["agent-t1"]);
    assert!(store.load().unwrap().sessions.is_empty());
}

#[test]
fn cleanup_of_unknown_session_is_false() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_in(dir.path());
    let monitor = HealthMonitor::new(Arc::clone(&store), FakeTerminals::with_alive(&[]));

    assert!(!monitor.cleanup_session("agent-ghost").unwrap());
}

#[test]
fn sweep_removes_timed_out_and_dead_sessions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = store_in(dir.path());
    seed(
        &store,
        vec![ago(30, "stale"), ago(1, "crashed"), ago(1, "working")],
    );
    let terminals = FakeTerminals::with_alive(&["agent-stale", "agent-working"]);
    let monitor = HealthMonitor::new(Arc::clone(&store), terminals.clone());

    let report = monitor.sweep().unwrap();

    assert_eq!(report.timed_out, ["agent-stale"]);
    assert_eq!(report.dead, ["agent-crashed"]);
    assert!(!terminals.is_alive("agent-stale"));
    let remaining: Vec<_> = store
        .load()
        .unwrap()
        .sessions
        .into_iter()
        .map(|s| s.session_id)
        .collect();
    assert_eq!(remaining, ["agent-working"]);
}
