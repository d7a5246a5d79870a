use mr_analytics::configuration::{EngineSettings, JobSettings, MatrixSettings};
use mr_analytics::jobs::funnel::{rank_step, Candidate, Funnel, RankStep};
use mr_analytics::jobs::keywords::top_keywords;
use mr_analytics::jobs::matrix::{check_product, dense_tuples, format_cell, matrix_product, Cell};
use mr_analytics::{
    record_stream, MapReduce, MrError, ParallelMapReduce, Pipeline, Sequential,
    SequentialMapReduce,
};

fn a() -> Vec<Vec<f64>> {
    vec![vec![1.0, 2.0], vec![3.0, 4.0]]
}

fn b() -> Vec<Vec<f64>> {
    vec![vec![5.0, 6.0], vec![7.0, 8.0]]
}

fn tuples(left: &[Vec<f64>], right: &[Vec<f64>]) -> Vec<String> {
    let mut lines = dense_tuples("A", left);
    lines.extend(dense_tuples("B", right));
    lines
}

fn sorted(mut records: Vec<(Cell, f64)>) -> Vec<(Cell, f64)> {
    records.sort_by_key(|(cell, _)| *cell);
    records
}

#[tokio::test]
async fn two_by_two_product_on_the_worker_pool() {
    let pipeline = matrix_product(MatrixSettings::new(2, 2)).expect("Failed to build job");

    let out = ParallelMapReduce::new(
        record_stream(tuples(&a(), &b())),
        pipeline,
        EngineSettings::new(3, 2),
    )
    .run()
    .await
    .expect("matrix job failed");

    let records = sorted(out.records);
    let lines: Vec<String> = records.iter().map(|(c, v)| format_cell(c, *v)).collect();
    assert_eq!(
        lines,
        vec!["[0, 0]\t19", "[0, 1]\t22", "[1, 0]\t43", "[1, 1]\t50"]
    );
    check_product(&a(), &b(), &records, 1e-10).expect("product mismatch");
    assert_eq!(out.report.skipped_records(), 0);
}

#[test]
fn malformed_tuples_are_skipped_and_counted() {
    let mut input = tuples(&a(), &b());
    input.insert(3, "A 0 0".to_string());
    input.push("C 0 0 1".to_string());
    input.push("B one 0 1".to_string());

    let out = SequentialMapReduce::new(
        record_stream(input),
        matrix_product(MatrixSettings::new(2, 2)).expect("Failed to build job"),
        EngineSettings::new(1, 3),
    )
    .run_sync()
    .expect("matrix job failed");

    assert_eq!(out.report.skipped_records(), 3);
    check_product(&a(), &b(), &out.records, 1e-10).expect("product mismatch");
}

#[tokio::test]
async fn mismatched_inner_dimensions_fail_the_job() {
    let left = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];

    let err = ParallelMapReduce::new(
        record_stream(tuples(&left, &b())),
        matrix_product(MatrixSettings::new(2, 2)).expect("Failed to build job"),
        EngineSettings::new(2, 4),
    )
    .run()
    .await
    .unwrap_err();

    match err {
        MrError::JoinLengthMismatch { left, right, .. } => assert_eq!((left, right), (3, 2)),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn sparse_operands_are_rejected() {
    let input: Vec<String> = tuples(&a(), &b())
        .into_iter()
        .filter(|line| line != "A 0 1 2" && line != "B 0 0 5")
        .collect();

    let err = SequentialMapReduce::new(
        record_stream(input),
        matrix_product(MatrixSettings::new(2, 2)).expect("Failed to build job"),
        EngineSettings::new(1, 8),
    )
    .run_sync()
    .unwrap_err();

    assert!(matches!(
        err,
        MrError::JoinLengthMismatch { .. } | MrError::JoinIndexMismatch { .. }
    ));
}

#[test]
fn funnel_keeps_the_two_best() {
    let candidates = vec![
        (Funnel, Candidate::new(3u64, "a".to_string())),
        (Funnel, Candidate::new(1, "b".to_string())),
        (Funnel, Candidate::new(5, "c".to_string())),
    ];

    let out = Pipeline::new(rank_step::<Funnel, u64, String>(2))
        .execute(record_stream(candidates), &Sequential, &EngineSettings::new(1, 1))
        .expect("funnel failed");

    let ranked: Vec<(u64, String)> = out
        .records
        .into_iter()
        .map(|(_, c)| (c.score, c.payload))
        .collect();
    assert_eq!(ranked, vec![(5, "c".to_string()), (3, "a".to_string())]);
}

#[test]
fn empty_step_list_never_runs() {
    let err = Pipeline::from_steps(Vec::<RankStep<Funnel, u64, String>>::new())
        .err()
        .expect("empty pipeline accepted");
    assert!(matches!(err, MrError::EmptyPipeline));
}

#[test]
fn step_list_reranks_repeatedly() {
    let pipeline = Pipeline::from_steps(vec![
        rank_step::<Funnel, u64, String>(3),
        rank_step(1),
    ])
    .expect("non-empty");
    let candidates = (0..10u64).map(|n| (Funnel, Candidate::new(n, format!("p{n}"))));

    let out = pipeline
        .execute(
            record_stream(candidates.collect::<Vec<_>>()),
            &Sequential,
            &EngineSettings::new(1, 4),
        )
        .expect("pipeline failed");

    assert_eq!(out.records, vec![(Funnel, Candidate::new(9, "p9".to_string()))]);
    assert_eq!(out.report.steps.len(), 2);
}

#[tokio::test]
async fn keyword_job_agrees_across_runners() {
    let titles: Vec<String> = (0..200)
        .map(|i| {
            let kind = if i % 3 == 0 { "tvEpisode" } else { "movie" };
            format!(
                "tt{i:07}\t{kind}\tThe Night of {} {}\tx\t0\t2000\t\\N\t90\tDrama",
                ["Wolves", "Kings", "Rain"][i % 3],
                ["Returns", "Falls", "Rises", "Ends"][i % 4]
            )
        })
        .collect();
    let settings = JobSettings {
        top_k: 4,
        ..JobSettings::default()
    };

    let parallel = ParallelMapReduce::new(
        record_stream(titles.clone()),
        top_keywords(&settings),
        EngineSettings::new(4, 7),
    )
    .run()
    .await
    .expect("parallel job failed");
    let sequential = SequentialMapReduce::new(
        record_stream(titles),
        top_keywords(&settings),
        EngineSettings::new(1, 1024),
    )
    .run()
    .await
    .expect("sequential job failed");

    assert_eq!(parallel.records, sequential.records);
    assert_eq!(parallel.records[0].1.payload, "night");
    assert_eq!(parallel.records[0].1.score, 133);
}
