use automl_pipeline::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn scoring_pipeline(max_evals: usize) -> Pipeline {
    Pipeline::new()
        .then(classification_models())
        .unwrap()
        .then(Hyperopt::new(CV::new(Metric::Accuracy), max_evals))
        .unwrap()
        .then(ChooseBest::new(1))
        .unwrap()
}

fn bench_cv(c: &mut Criterion) {
    let mut group = c.benchmark_group("cv");
    group.sample_size(10);

    for n_samples in [200, 1000].iter() {
        let dataset = make_classification(*n_samples, 10, 4, 0.05, 1).unwrap();
        let pipeline = Pipeline::new()
            .then(classification_models())
            .unwrap()
            .then(CV::new(Metric::Accuracy))
            .unwrap();

        group.bench_with_input(BenchmarkId::new("classification_models", n_samples), &dataset, |b, ds| {
            b.iter(|| {
                LocalExecutor::new(black_box(ds.clone()))
                    .with_seed(0)
                    .run(&pipeline)
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_hyperopt(c: &mut Criterion) {
    let mut group = c.benchmark_group("hyperopt");
    group.sample_size(10);
    let dataset = make_classification(300, 8, 3, 0.05, 2).unwrap();

    for max_evals in [5, 20].iter() {
        let pipeline = scoring_pipeline(*max_evals);
        group.bench_with_input(BenchmarkId::new("max_evals", max_evals), &pipeline, |b, p| {
            b.iter(|| {
                LocalExecutor::new(dataset.clone())
                    .with_seed(0)
                    .run(black_box(p))
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_feature_selection(c: &mut Criterion) {
    let dataset = make_regression(500, 12, 4, 0.1, 3).unwrap();
    let pipeline = Pipeline::new()
        .then(FormulaFeatureGenerator::from_symbols(&["+", "*"]).unwrap())
        .unwrap()
        .then(automl_pipeline::hyperparam::templates::regression_models())
        .unwrap()
        .then(VotingFeatureSelector::mult(10))
        .unwrap();

    c.bench_function("generate_and_vote", |b| {
        b.iter(|| {
            LocalExecutor::new(dataset.clone())
                .with_seed(0)
                .run(black_box(&pipeline))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_cv, bench_hyperopt, bench_feature_selection);
criterion_main!(benches);
