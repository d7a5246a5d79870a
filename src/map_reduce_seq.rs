use std::sync::Arc;

use async_trait::async_trait;

use crate::common::{JobOutput, MapReduce, RecordStream, Scheduler};
use crate::configuration::EngineSettings;
use crate::error::MrError;
use crate::pipeline::{Pipeline, Stage};

/// Runs every task inline on the calling thread, in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl Scheduler for Sequential {
    fn parallelism(&self) -> usize {
        1
    }

    fn run_tasks<T, R, F>(&self, tasks: Vec<T>, f: Arc<F>) -> Result<Vec<R>, MrError>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        Ok(tasks.into_iter().map(|task| f(task)).collect())
    }
}

pub struct SequentialMapReduce<P, I, O> {
    input: RecordStream<I>,
    pipeline: Pipeline<P, I, O>,
    settings: EngineSettings,
}

impl<P, I, O> SequentialMapReduce<P, I, O>
where
    P: Stage<I, O>,
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new(
        input: RecordStream<I>,
        pipeline: Pipeline<P, I, O>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            input,
            pipeline,
            settings,
        }
    }

    #[tracing::instrument(name = "Sequential MapReduce", skip_all)]
    pub fn run_sync(self) -> Result<JobOutput<O>, MrError> {
        self.pipeline
            .execute(self.input, &Sequential, &self.settings)
    }
}

#[async_trait]
impl<P, I, O> MapReduce for SequentialMapReduce<P, I, O>
where
    P: Stage<I, O> + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    type Output = O;

    async fn run(self) -> Result<JobOutput<O>, MrError> {
        self.run_sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{record_stream, FnMapper, FnReducer};
    use crate::step::Step;

    #[tokio::test]
    async fn runs_a_pipeline_to_completion() {
        let step = Step::new(
            FnMapper::new(|n: u64| Ok(vec![(n % 3, n)])),
            FnReducer::new(|k: u64, vs: Vec<u64>| Ok(vec![(k, vs.iter().sum::<u64>())])),
        );
        let mr = SequentialMapReduce::new(
            record_stream(1..=9u64),
            Pipeline::new(step),
            EngineSettings::new(1, 4),
        );

        let out = mr.run().await.expect("job failed");

        assert_eq!(out.records, vec![(1, 12), (2, 15), (0, 18)]);
        assert_eq!(out.report.skipped_records(), 0);
    }

    #[test]
    fn sequential_scheduler_keeps_task_order() {
        let out = Sequential
            .run_tasks(vec![3, 1, 2], Arc::new(|n: i32| n * 10))
            .expect("tasks failed");
        assert_eq!(out, vec![30, 10, 20]);
    }
}
