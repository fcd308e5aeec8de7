//! Persistence benchmarks for the run-state store.
//!
//! `update_after_action` rewrites the whole snapshot, so its cost grows
//! with total run size; the update benchmark exists to keep that contract
//! visible.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use runstate::{
    ActionSnapshot, FileStateOperator, GenericAction, MatrixSnapshot, RunInfo, RunObjects,
    StateOperator,
};
use tempfile::TempDir;

fn objects_with_actions(count: usize) -> RunObjects {
    let mut matrix = MatrixSnapshot {
        file_name: "m1.csv".into(),
        name: "m1".into(),
        ..Default::default()
    };
    for i in 1..=count {
        matrix.actions.push(ActionSnapshot {
            id_in_matrix: format!("a{i}"),
            name: "SendMessage".into(),
            step_name: "Step1".into(),
            ..Default::default()
        });
    }
    RunObjects {
        matrices: vec![matrix],
        ..Default::default()
    }
}

fn info_for(objects: &RunObjects) -> RunInfo {
    let mut info = RunInfo::new();
    info.matrices = objects.matrices.iter().map(|m| m.short_file_name()).collect();
    info
}

/// Benchmark a full save with varying action counts
fn bench_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("save");

    for action_count in [100, 1000, 5000] {
        group.bench_with_input(
            BenchmarkId::new("actions", action_count),
            &action_count,
            |b, &count| {
                let dir = TempDir::new().unwrap();
                let mut operator = FileStateOperator::new(dir.path().join("state")).unwrap();
                let objects = objects_with_actions(count);
                let info = info_for(&objects);

                b.iter(|| {
                    black_box(operator.save(&info, &objects).unwrap());
                });
            },
        );
    }

    group.finish();
}

/// Benchmark a full load with varying action counts
fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");

    for action_count in [100, 1000, 5000] {
        group.bench_with_input(
            BenchmarkId::new("actions", action_count),
            &action_count,
            |b, &count| {
                let dir = TempDir::new().unwrap();
                let mut operator = FileStateOperator::new(dir.path().join("state")).unwrap();
                let objects = objects_with_actions(count);
                operator.save(&info_for(&objects), &objects).unwrap();

                b.iter(|| {
                    let (_, mut handle) = operator.load_info().unwrap();
                    black_box(operator.load_objects(&mut handle).unwrap());
                });
            },
        );
    }

    group.finish();
}

/// Benchmark one action update against runs of growing total size
fn bench_update_after_action(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_after_action");

    for action_count in [100, 1000, 5000] {
        group.bench_with_input(
            BenchmarkId::new("total_actions", action_count),
            &action_count,
            |b, &count| {
                let dir = TempDir::new().unwrap();
                let mut operator = FileStateOperator::new(dir.path().join("state")).unwrap();
                let objects = objects_with_actions(count);
                let info = info_for(&objects);
                let mut handle = operator.save(&info, &objects).unwrap();

                let mut completed = objects.matrices[0].actions[0].clone();
                completed.done = true;
                let live = GenericAction::new("SendMessage", {
                    let mut data = runstate::ActionData::default();
                    data.id_in_matrix = completed.id_in_matrix.clone();
                    data.matrix_name = "m1".into();
                    data.done = true;
                    data
                });

                b.iter(|| {
                    operator
                        .update_after_action(&info, &mut handle, &live, &completed)
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_save, bench_load, bench_update_after_action);
criterion_main!(benches);
