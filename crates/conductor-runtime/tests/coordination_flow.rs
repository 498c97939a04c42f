//! End-to-end coordination against a real directory tree.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use conductor_models::{Agent, AgentRole, PhaseState, PhaseStatus, TaskDispatch, TaskId, TaskStatus};
use conductor_persistence::{CoordinationStore, FileCoordinationStore};
use conductor_runtime::{AgentRegistry, ContinuationInjector, Coordinator, CoordinatorEvent, RuntimeConfig};
use tempfile::tempdir;

const PROSE: &str = "# Project coordination\n\nHuman notes live here.\n";

fn agent(root: &Path, id: &str, role: AgentRole) -> Agent {
    let dir = root.join(id);
    fs::create_dir_all(&dir).unwrap();
    Agent::new(id, role, dir)
}

#[tokio::test]
async fn test_phase_hand_off_to_reviewer() {
    let root = tempdir().unwrap();
    let frontend = agent(root.path(), "fe", AgentRole::Frontend);
    let backend = agent(root.path(), "be", AgentRole::Backend);
    let reviewer = agent(root.path(), "rev", AgentRole::Reviewer);

    fs::write(frontend.file("task.md"), "# Frontend\n- [x] Login form\n").unwrap();
    fs::write(backend.file("task.md"), "# Backend\n- [/] Auth API\n").unwrap();

    let doc_path = root.path().join("COORDINATION.md");
    fs::write(&doc_path, PROSE).unwrap();
    let store = Arc::new(FileCoordinationStore::new(&doc_path));
    store
        .init_phase(PhaseState::new("p2").with_tasks(vec![
            TaskDispatch::new("P2-001", AgentRole::Frontend, "Login form")
                .with_status(TaskStatus::Complete),
            TaskDispatch::new("P2-002", AgentRole::Backend, "Auth API")
                .with_status(TaskStatus::InProgress),
        ]))
        .unwrap();

    let registry = AgentRegistry::from_agents(vec![
        frontend.clone(),
        backend.clone(),
        reviewer.clone(),
    ])
    .unwrap();
    let config = RuntimeConfig::new()
        .with_idle_threshold(Duration::from_secs(3600))
        .with_poll_interval(Duration::from_millis(10))
        .with_phase_check_interval(Duration::from_millis(10));
    let coordinator = Coordinator::new(config, store.clone(), registry);
    let mut events = coordinator.subscribe();
    let mut coordination = coordinator.coordination_loop();

    let outcome = coordination.poll_cycle().await.unwrap();
    assert_eq!(outcome.statuses.len(), 3);
    assert!(outcome.statuses[0].is_complete);
    assert!(!outcome.statuses[1].is_complete);
    assert!(outcome.statuses.iter().all(|s| !s.is_idle));

    let check = coordination.phase_cycle().await.unwrap().unwrap();
    assert!(!check.fired);
    assert!(!ContinuationInjector::pending(&reviewer));

    // Backend finishes; the store is updated by the operator.
    fs::write(backend.file("task.md"), "# Backend\n- [x] Auth API\n").unwrap();
    store
        .set_task_status(&TaskId::from("P2-002"), TaskStatus::Complete)
        .unwrap();

    coordination.poll_cycle().await.unwrap();
    for _ in 0..3 {
        coordination.phase_cycle().await.unwrap();
    }

    let request = ContinuationInjector::consume(&reviewer).unwrap().unwrap();
    assert!(request.prompt.contains("P2-001"));
    assert!(request.prompt.contains("P2-002"));
    assert!(!ContinuationInjector::pending(&reviewer));

    let mut phase_events = 0;
    let mut agent_completions = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            CoordinatorEvent::PhaseComplete { notified, .. } => {
                assert!(notified);
                phase_events += 1;
            }
            CoordinatorEvent::AgentComplete { .. } => agent_completions += 1,
            _ => {}
        }
    }
    assert_eq!(phase_events, 1);
    assert_eq!(agent_completions, 2);

    let doc = store.read().unwrap().unwrap();
    assert_eq!(doc.phase.status, PhaseStatus::Review);
    assert_eq!(doc.heartbeats.len(), 3);

    let text = fs::read_to_string(&doc_path).unwrap();
    assert!(text.starts_with(PROSE));
}

#[tokio::test]
async fn test_new_phase_archives_previous() {
    let root = tempdir().unwrap();
    let doc_path = root.path().join("COORDINATION.md");
    let store = FileCoordinationStore::new(&doc_path);

    store
        .init_phase(PhaseState::new("p1").with_tasks(vec![TaskDispatch::new(
            "P1-001",
            AgentRole::Docs,
            "README",
        )
        .with_status(TaskStatus::Complete)]))
        .unwrap();
    let archived = store.init_phase(PhaseState::new("p2")).unwrap();

    assert_eq!(archived.map(|p| p.to_string()).as_deref(), Some("p1"));
    let old = store.archived_phase(&"p1".into()).unwrap().unwrap();
    assert_eq!(old.total(), 1);
    assert_eq!(store.read().unwrap().unwrap().phase.id.as_str(), "p2");
}
