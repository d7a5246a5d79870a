mod coordinator;
mod worker_pool;

use async_trait::async_trait;

use crate::common::{JobOutput, MapReduce, RecordStream};
use crate::configuration::EngineSettings;
use crate::error::MrError;
use crate::pipeline::{Pipeline, Stage};

pub use coordinator::Coordinator;
pub use worker_pool::{Worker, WorkerPool};

pub struct ParallelMapReduce<P, I, O> {
    input: RecordStream<I>,
    pipeline: Pipeline<P, I, O>,
    settings: EngineSettings,
}

impl<P, I, O> ParallelMapReduce<P, I, O>
where
    P: Stage<I, O> + 'static,
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
}

#[async_trait]
impl<P, I, O> MapReduce for ParallelMapReduce<P, I, O>
where
    P: Stage<I, O> + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    type Output = O;

    #[tracing::instrument(name = "Parallel MapReduce", skip_all)]
    async fn run(self) -> Result<JobOutput<O>, MrError> {
        let Self {
            input,
            pipeline,
            settings,
        } = self;
        // Worker threads block; keep them off the async executor.
        tokio::task::spawn_blocking(move || Coordinator::new(settings).start_pool(&pipeline, input))
            .await?
    }
}
