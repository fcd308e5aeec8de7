//! Save/load round-trip tests for the file storage operator.

use runstate::{
    ActionData, ActionRegistry, Execution, ExecutionContext, FileStateOperator, GenericAction,
    Matrix, MemoryStateOperator, NullHistoryHandler, ReportsInfo, RunInfo, RunObjects, Scheduler,
    StateError, StateManager, StateOperator, Step, StepFactory, StepSettings, DefaultStepFactory,
    Timestamp,
};
use std::collections::BTreeMap;
use tempfile::TempDir;

struct TestScheduler {
    step_factory: DefaultStepFactory,
}

impl Scheduler for TestScheduler {
    fn name(&self) -> &str {
        "scheduler1"
    }

    fn step_factory(&self) -> &dyn StepFactory {
        &self.step_factory
    }
}

fn registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    registry.register_generic("SendMessage");
    registry.register_generic("Compare");
    registry
}

fn step(name: &str) -> Step {
    DefaultStepFactory.create_step(StepSettings {
        name: name.into(),
        kind: "Default".into(),
        execute: true,
        ..Default::default()
    })
}

fn action(kind: &str, id: &str, step_name: &str, matrix_name: &str, done: bool) -> GenericAction {
    GenericAction::new(
        kind,
        ActionData {
            id_in_matrix: id.into(),
            name: kind.into(),
            step_name: step_name.into(),
            matrix_name: matrix_name.into(),
            done,
            ..Default::default()
        },
    )
}

fn execution(steps: Vec<Step>, matrices: Vec<Matrix>) -> Execution {
    Execution {
        scheduler_name: "scheduler1".into(),
        steps,
        matrices,
        context: ExecutionContext {
            business_day: Some(Timestamp(1_700_000_000_000_000)),
            base_time: None,
            weekend_holiday: true,
            holidays: BTreeMap::from([("2026-01-01".to_string(), true)]),
            started_by_user: Some("admin".into()),
            history: Box::new(NullHistoryHandler),
        },
        preparables: BTreeMap::new(),
        reports: ReportsInfo::default(),
        fixed_ids: BTreeMap::from([("seed".to_string(), "41".to_string())]),
        started: Some(Timestamp(1_700_000_100_000_000)),
        ended: None,
    }
}

fn rich_execution() -> Execution {
    let mut m1 = Matrix::new("matrices/m1.csv", "m1");
    m1.description = "settlement flow".into();
    for (id, done) in [("a1", true), ("a2", false)] {
        m1.actions
            .push(Box::new(action("SendMessage", id, "Step1", "m1", done)));
    }
    m1.variables.set("a1.passed", serde_json::json!(true));
    m1.constants.insert("currency".into(), "EUR".into());
    m1.step_success.insert("Step1".into(), true);
    m1.step_status_comments
        .insert("Step1".into(), vec!["all actions passed".into()]);
    m1.started = Some(Timestamp(1_700_000_200_000_000));
    m1.actions_done = 1;
    m1.context.set("lastOrderId", serde_json::json!("ORD-17"));

    let mut m2 = Matrix::new("matrices/m2.csv", "m2");
    m2.actions
        .push(Box::new(action("Compare", "b1", "Step2", "m2", false)));
    m2.variables.set("b1.qty", serde_json::json!("250"));

    execution(vec![step("Step1"), step("Step2")], vec![m1, m2])
}

fn reports() -> ReportsInfo {
    ReportsInfo {
        reports_path: Some("reports/run_001".into()),
        ..Default::default()
    }
}

#[test]
fn test_roundtrip_preserves_all_persisted_fields() {
    let dir = TempDir::new().unwrap();
    let operator = FileStateOperator::new(dir.path().join("state")).unwrap();
    let mut manager = StateManager::new(operator, Box::new(registry()));

    let run = rich_execution();
    let expected = manager.snapshot_of_run(&run, &DefaultStepFactory, &reports());

    manager.save(&run, &DefaultStepFactory, &reports()).unwrap();
    let loaded = manager.load().unwrap();

    assert_eq!(loaded.info, expected.info);
    assert_eq!(loaded.objects, expected.objects);
}

#[test]
fn test_empty_run_roundtrip_yields_empty_collections() {
    let dir = TempDir::new().unwrap();
    let operator = FileStateOperator::new(dir.path().join("state")).unwrap();
    let mut manager = StateManager::new(operator, Box::new(registry()));

    let run = execution(Vec::new(), Vec::new());
    manager.save(&run, &DefaultStepFactory, &reports()).unwrap();
    let loaded = manager.load().unwrap();

    assert!(loaded.info.steps().is_empty());
    assert!(loaded.info.matrices.is_empty());
    assert!(loaded.objects.matrices.is_empty());
    assert_eq!(
        loaded.info.started_by_user.as_deref(),
        Some("admin"),
        "run metadata survives even with nothing to execute"
    );
}

#[test]
fn test_save_replaces_previous_snapshot() {
    let dir = TempDir::new().unwrap();
    let state_dir = dir.path().join("state");
    let operator = FileStateOperator::new(&state_dir).unwrap();
    let mut manager = StateManager::new(operator, Box::new(registry()));

    manager
        .save(&rich_execution(), &DefaultStepFactory, &reports())
        .unwrap();
    assert!(state_dir.join("m1.csv_actions_1.json").is_file());

    manager
        .save(
            &execution(vec![step("Step1")], Vec::new()),
            &DefaultStepFactory,
            &reports(),
        )
        .unwrap();

    assert!(
        !state_dir.join("m1.csv_actions_1.json").exists(),
        "stale matrix files must not survive a new save"
    );
    let loaded = manager.load().unwrap();
    assert!(loaded.objects.matrices.is_empty());
}

#[test]
fn test_missing_vars_file_yields_fresh_empty_set() {
    let dir = TempDir::new().unwrap();
    let state_dir = dir.path().join("state");
    let operator = FileStateOperator::new(&state_dir).unwrap();
    let mut manager = StateManager::new(operator, Box::new(registry()));

    manager
        .save(&rich_execution(), &DefaultStepFactory, &reports())
        .unwrap();
    std::fs::remove_file(state_dir.join("m1.csv_vars.json")).unwrap();

    let loaded = manager.load().unwrap();
    assert!(loaded.objects.matrices[0].variables.is_empty());
    assert_eq!(
        loaded.objects.matrices[1].variables.get("b1.qty"),
        Some(&serde_json::json!("250")),
        "other matrices keep their variables"
    );
}

#[test]
fn test_matrix_list_mismatch_fails_load() {
    let dir = TempDir::new().unwrap();
    let state_dir = dir.path().join("state");

    {
        let mut operator = FileStateOperator::new(&state_dir).unwrap();
        let mut info = RunInfo::new();
        info.matrices = vec!["m1.csv".into(), "m2.csv".into()];
        operator.save(&info, &RunObjects::default()).unwrap();
        operator.close().unwrap();
    }

    let operator = FileStateOperator::new(&state_dir).unwrap();
    let mut manager = StateManager::new(operator, Box::new(registry()));
    let err = manager.load().unwrap_err();
    assert!(matches!(err, StateError::Reconstruction(_)));
}

#[test]
fn test_memory_operator_roundtrip_matches_file_operator() {
    let mut manager = StateManager::new(MemoryStateOperator::new(), Box::new(registry()));

    let run = rich_execution();
    let expected = manager.snapshot_of_run(&run, &DefaultStepFactory, &reports());
    manager.save(&run, &DefaultStepFactory, &reports()).unwrap();
    let loaded = manager.load().unwrap();

    assert_eq!(loaded.info, expected.info);
    assert_eq!(loaded.objects, expected.objects);
}

#[test]
fn test_rebuild_after_roundtrip_relinks_scheduler() {
    let dir = TempDir::new().unwrap();
    let operator = FileStateOperator::new(dir.path().join("state")).unwrap();
    let mut manager = StateManager::new(operator, Box::new(registry()));

    let run = rich_execution();
    manager.save(&run, &DefaultStepFactory, &reports()).unwrap();
    let snapshot = manager.load().unwrap();

    let scheduler = TestScheduler {
        step_factory: DefaultStepFactory,
    };
    let rebuilt = manager
        .rebuild(
            &snapshot,
            &scheduler,
            &runstate::DefaultExecutorFactory,
            None,
            None,
            Some("admin".into()),
        )
        .unwrap();

    assert_eq!(rebuilt.scheduler_name, "scheduler1");
    assert_eq!(rebuilt.fixed_ids.get("seed").map(String::as_str), Some("41"));
    assert_eq!(rebuilt.started, Some(Timestamp(1_700_000_100_000_000)));
    assert_eq!(rebuilt.steps.len(), 2);
    assert_eq!(rebuilt.matrices.len(), 2);
}
