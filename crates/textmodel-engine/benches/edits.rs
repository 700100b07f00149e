use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use textmodel_engine::{EditOperation, Position, Range, Selection, TextModel};
mod common;

fn bench_model_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("model_creation");
    group.sample_size(20);

    let content = common::generate_source_text(10_000);
    group.bench_function("from_bytes", |b| {
        let bytes = content.as_bytes();
        b.iter(|| {
            let model = TextModel::from_bytes(black_box(bytes)).unwrap();
            black_box(model);
        });
    });

    let mixed = common::generate_mixed_width_text(10_000);
    group.bench_function("new_mixed_width", |b| {
        b.iter(|| black_box(TextModel::new(black_box(&mixed))));
    });

    group.finish();
}

fn bench_single_edits(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_edits");
    group.sample_size(20);

    let content = common::generate_source_text(10_000);

    group.bench_function("type_character_mid_document", |b| {
        b.iter_batched(
            || TextModel::new(&content),
            |mut model| {
                model
                    .apply_edits(vec![EditOperation::insert(Position::new(5_000, 5), "x")])
                    .unwrap();
                black_box(model);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("insert_line_break_at_top", |b| {
        b.iter_batched(
            || TextModel::new(&content),
            |mut model| {
                model
                    .apply_edits(vec![EditOperation::insert(Position::new(1, 1), "\n")])
                    .unwrap();
                black_box(model);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("delete_block_of_lines", |b| {
        b.iter_batched(
            || TextModel::new(&content),
            |mut model| {
                model
                    .apply_edits(vec![EditOperation::delete(Range::new(100, 1, 600, 1))])
                    .unwrap();
                black_box(model);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn bench_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("batches");
    group.sample_size(20);

    let content = common::generate_source_text(2_000);

    for count in [100, 999, 1_000, 2_000] {
        group.bench_function(format!("comment_out_{count}_lines"), |b| {
            b.iter_batched(
                || TextModel::new(&content),
                |mut model| {
                    let operations = (1..=count)
                        .map(|line| EditOperation::insert(Position::new(line, 1), "// "))
                        .collect();
                    model.apply_edits(operations).unwrap();
                    black_box(model);
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_undo_redo(c: &mut Criterion) {
    let mut group = c.benchmark_group("undo_redo");
    group.sample_size(20);

    let content = common::generate_source_text(5_000);

    group.bench_function("typing_then_undo", |b| {
        b.iter_batched(
            || TextModel::new(&content),
            |mut model| {
                for column in 1..=50 {
                    model
                        .push_edit_operations(
                            &[Selection::collapsed(Position::new(2_500, column))],
                            vec![EditOperation::insert(Position::new(2_500, column), "a")],
                            |_| None,
                        )
                        .unwrap();
                }
                model.undo();
                model.redo();
                black_box(model);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_model_creation,
    bench_single_edits,
    bench_batches,
    bench_undo_redo
);
criterion_main!(benches);
