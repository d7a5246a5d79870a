//! Sequences steps: the reducer output of one step is the record stream of
//! the next.

use std::marker::PhantomData;

use tracing::info;

use crate::common::{record_stream, JobOutput, JobReport, RecordStream, Scheduler};
use crate::configuration::EngineSettings;
use crate::error::MrError;

/// A runnable unit of a pipeline: a single step or a chain of steps.
pub trait Stage<I, O>: Send + Sync {
    /// Number of steps this stage runs.
    fn len(&self) -> usize;

    fn execute<S: Scheduler>(
        &self,
        input: RecordStream<I>,
        scheduler: &S,
        settings: &EngineSettings,
        report: &mut JobReport,
    ) -> Result<Vec<O>, MrError>;
}

/// Runs `first` to completion, then feeds its output to `second`.
pub struct Chain<A, B, Mid> {
    first: A,
    second: B,
    _mid: PhantomData<fn() -> Mid>,
}

impl<I, Mid, O, A, B> Stage<I, O> for Chain<A, B, Mid>
where
    A: Stage<I, Mid>,
    B: Stage<Mid, O>,
    Mid: Send + 'static,
{
    fn len(&self) -> usize {
        self.first.len() + self.second.len()
    }

    fn execute<S: Scheduler>(
        &self,
        input: RecordStream<I>,
        scheduler: &S,
        settings: &EngineSettings,
        report: &mut JobReport,
    ) -> Result<Vec<O>, MrError> {
        let intermediate = self.first.execute(input, scheduler, settings, report)?;
        self.second
            .execute(record_stream(intermediate), scheduler, settings, report)
    }
}

/// Steps that all read and write the same record type, run in order.
pub struct StepList<S> {
    steps: Vec<S>,
}

impl<T, St> Stage<T, T> for StepList<St>
where
    St: Stage<T, T>,
    T: Send + 'static,
{
    fn len(&self) -> usize {
        self.steps.iter().map(|step| Stage::<T, T>::len(step)).sum()
    }

    fn execute<S: Scheduler>(
        &self,
        input: RecordStream<T>,
        scheduler: &S,
        settings: &EngineSettings,
        report: &mut JobReport,
    ) -> Result<Vec<T>, MrError> {
        let (first, rest) = self.steps.split_first().ok_or(MrError::EmptyPipeline)?;
        let mut records = first.execute(input, scheduler, settings, report)?;
        for step in rest {
            records = step.execute(record_stream(records), scheduler, settings, report)?;
        }
        Ok(records)
    }
}

pub struct Pipeline<P, I, O> {
    stage: P,
    _io: PhantomData<fn(I) -> O>,
}

impl<P, I, O> Pipeline<P, I, O>
where
    P: Stage<I, O>,
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new(stage: P) -> Self {
        Self {
            stage,
            _io: PhantomData,
        }
    }

    /// Appends a step (or another stage) after the current last step.
    pub fn then<Q, O2>(self, next: Q) -> Pipeline<Chain<P, Q, O>, I, O2>
    where
        Q: Stage<O, O2>,
        O2: Send + 'static,
    {
        Pipeline::new(Chain {
            first: self.stage,
            second: next,
            _mid: PhantomData,
        })
    }

    pub fn steps(&self) -> usize {
        self.stage.len()
    }

    /// Runs every step over `input`. Steps never overlap: each one starts
    /// from the complete output of the one before.
    pub fn execute<S: Scheduler>(
        &self,
        input: RecordStream<I>,
        scheduler: &S,
        settings: &EngineSettings,
    ) -> Result<JobOutput<O>, MrError> {
        settings.validate()?;
        if self.steps() == 0 {
            return Err(MrError::EmptyPipeline);
        }

        let mut report = JobReport::default();
        let records = self.stage.execute(input, scheduler, settings, &mut report)?;
        info!(
            steps = report.steps.len(),
            records = records.len(),
            skipped = report.skipped_records(),
            "pipeline finished"
        );
        Ok(JobOutput { records, report })
    }
}

impl<St, T> Pipeline<StepList<St>, T, T>
where
    St: Stage<T, T>,
    T: Send + 'static,
{
    pub fn from_steps(steps: Vec<St>) -> Result<Self, MrError> {
        if steps.is_empty() {
            return Err(MrError::EmptyPipeline);
        }
        Ok(Pipeline::new(StepList { steps }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{FnMapper, FnReducer};
    use crate::error::MalformedRecord;
    use crate::map_reduce_seq::Sequential;
    use crate::step::{NoCombiner, Passthrough, Step};

    type Pair = (String, u64);

    fn settings() -> EngineSettings {
        EngineSettings::new(2, 2)
    }

    #[test]
    fn second_step_reads_first_step_output() {
        let count = Step::new(
            FnMapper::new(|line: String| {
                Ok(line
                    .split_whitespace()
                    .map(|w| (w.to_string(), 1u64))
                    .collect())
            }),
            FnReducer::new(|w: String, ones: Vec<u64>| Ok(vec![(ones.len() as u64, w)])),
        );
        let by_count = Step::new(
            Passthrough::<u64, String>::new(),
            FnReducer::new(|n: u64, mut ws: Vec<String>| {
                ws.sort();
                Ok(vec![(n, ws.join(","))])
            }),
        );
        let pipeline = Pipeline::new(count).then(by_count);

        let out = pipeline
            .execute(
                record_stream(vec!["x y x".to_string(), "z y w".to_string()]),
                &Sequential,
                &settings(),
            )
            .expect("pipeline failed");

        assert_eq!(pipeline.steps(), 2);
        assert_eq!(
            out.records,
            vec![(2, "x,y".to_string()), (1, "w,z".to_string())]
        );
        assert_eq!(out.report.steps.len(), 2);
    }

    type DoubleFn = fn(String, Vec<u64>) -> Result<Vec<Pair>, MrError>;
    type Doubling = Step<Passthrough<String, u64>, NoCombiner, FnReducer<DoubleFn, String, u64>>;

    fn doubling_step() -> Doubling {
        fn double(k: String, vs: Vec<u64>) -> Result<Vec<Pair>, MrError> {
            Ok(vs.into_iter().map(|v| (k.clone(), v * 2)).collect())
        }
        Step::new(Passthrough::new(), FnReducer::new(double as DoubleFn))
    }

    #[test]
    fn step_list_runs_steps_in_order() {
        let pipeline = Pipeline::from_steps(vec![doubling_step(), doubling_step(), doubling_step()])
            .expect("non-empty");

        let out = pipeline
            .execute(record_stream(vec![("a".to_string(), 1)]), &Sequential, &settings())
            .expect("pipeline failed");

        assert_eq!(out.records, vec![("a".to_string(), 8)]);
        assert_eq!(out.report.steps.len(), 3);
    }

    #[test]
    fn empty_step_list_is_rejected() {
        let err = Pipeline::from_steps(Vec::<Doubling>::new())
            .err()
            .expect("empty pipeline accepted");
        assert!(matches!(err, MrError::EmptyPipeline));
    }

    #[test]
    fn invalid_settings_fail_before_running() {
        let step = Step::new(
            FnMapper::new(|_: String| -> Result<Vec<Pair>, MalformedRecord> {
                panic!("mapper must not run")
            }),
            FnReducer::new(|k: String, vs: Vec<u64>| Ok(vec![(k, vs.len() as u64)])),
        );

        let err = Pipeline::new(step)
            .execute(
                record_stream(vec!["x".to_string()]),
                &Sequential,
                &EngineSettings::new(0, 1),
            )
            .err()
            .expect("invalid settings accepted");

        assert!(matches!(err, MrError::InvalidConfig(_)));
    }
}
