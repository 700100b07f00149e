use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use textmodel_engine::{
    DecorationOptions, EditOperation, ModelDeltaDecoration, Position, Range, TextModel,
};
mod common;

fn keyword_decorations(lines: usize) -> Vec<ModelDeltaDecoration> {
    (1..=lines)
        .map(|line| {
            ModelDeltaDecoration::new(
                Range::new(line, 1, line, 3),
                DecorationOptions::with_class_name("keyword"),
            )
        })
        .collect()
}

fn block_decorations(lines: usize) -> Vec<ModelDeltaDecoration> {
    (1..lines)
        .step_by(6)
        .map(|line| {
            ModelDeltaDecoration::new(
                Range::new(line, 1, (line + 4).min(lines), 2),
                DecorationOptions::with_class_name("block"),
            )
        })
        .collect()
}

fn decorated_model(lines: usize) -> TextModel {
    let mut model = TextModel::new(&common::generate_source_text(lines));
    let mut decorations = keyword_decorations(lines);
    decorations.extend(block_decorations(lines));
    model.delta_decorations(&[], decorations);
    model
}

fn bench_delta_decorations(c: &mut Criterion) {
    let mut group = c.benchmark_group("delta_decorations");
    group.sample_size(20);

    let content = common::generate_source_text(5_000);

    group.bench_function("add_5000", |b| {
        b.iter_batched(
            || TextModel::new(&content),
            |mut model| {
                let ids = model.delta_decorations(&[], keyword_decorations(5_000));
                black_box(ids);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("replace_identical_5000", |b| {
        b.iter_batched(
            || {
                let mut model = TextModel::new(&content);
                let ids = model.delta_decorations(&[], keyword_decorations(5_000));
                (model, ids)
            },
            |(mut model, ids)| {
                let ids = model.delta_decorations(&ids, keyword_decorations(5_000));
                black_box(ids);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("decoration_queries");
    group.sample_size(20);

    let model = decorated_model(5_000);

    group.bench_function("viewport_lines", |b| {
        b.iter(|| black_box(model.lines_decorations(black_box(2_500), 2_550, 0, false)));
    });

    group.bench_function("all_decorations", |b| {
        b.iter(|| black_box(model.all_decorations(0, false)));
    });

    group.finish();
}

fn bench_edits_with_decorations(c: &mut Criterion) {
    let mut group = c.benchmark_group("edits_with_decorations");
    group.sample_size(20);

    group.bench_function("line_break_above_decorations", |b| {
        b.iter_batched(
            || decorated_model(5_000),
            |mut model| {
                model
                    .apply_edits(vec![EditOperation::insert(Position::new(10, 1), "\n")])
                    .unwrap();
                black_box(model);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_delta_decorations,
    bench_queries,
    bench_edits_with_decorations
);
criterion_main!(benches);
