use crate::common::{JobOutput, RecordStream};
use crate::configuration::EngineSettings;
use crate::error::MrError;
use crate::pipeline::{Pipeline, Stage};

use super::worker_pool::WorkerPool;

pub struct Coordinator {
    settings: EngineSettings,
}

impl Coordinator {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// Spins up a worker pool sized from the settings and drives the whole
    /// pipeline on it. The pool lives for exactly one job.
    #[tracing::instrument(name = "Start pool", skip_all, fields(workers = self.settings.workers))]
    pub fn start_pool<P, I, O>(
        &self,
        pipeline: &Pipeline<P, I, O>,
        input: RecordStream<I>,
    ) -> Result<JobOutput<O>, MrError>
    where
        P: Stage<I, O>,
        I: Send + 'static,
        O: Send + 'static,
    {
        self.settings.validate()?;
        let pool = WorkerPool::new(self.settings.workers)?;
        tracing::debug!(
            workers = ?pool.workers.iter().map(|w| w.id.as_str()).collect::<Vec<_>>(),
            "worker pool ready"
        );

        pipeline.execute(input, &pool, &self.settings)
    }
}
