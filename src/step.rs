//! One map -> combine -> shuffle -> reduce step.

use std::{marker::PhantomData, mem, sync::Arc};

use tracing::{debug, info, info_span};

use crate::common::{
    Combiner, GroupedEntry, JobReport, Key, Mapper, RecordStream, Reducer, Scheduler, StepReport,
};
use crate::configuration::EngineSettings;
use crate::error::{MalformedRecord, MrError};
use crate::pipeline::Stage;
use crate::shuffle::group_by_key;

pub struct Step<M, C, R> {
    mapper: Arc<M>,
    combiner: Option<Arc<C>>,
    reducer: Arc<R>,
}

/// Combiner type of steps that skip local aggregation. It has no values, so
/// such a step never holds a combiner.
pub enum NoCombiner {}

impl<K, V> Combiner<K, V> for NoCombiner {
    fn combine(&self, _key: &K, _values: Vec<V>) -> V {
        match *self {}
    }
}

impl<M, R> Step<M, NoCombiner, R>
where
    M: Mapper,
    R: Reducer<Key = M::Key, Value = M::Value>,
{
    pub fn new(mapper: M, reducer: R) -> Self {
        Self {
            mapper: Arc::new(mapper),
            combiner: None,
            reducer: Arc::new(reducer),
        }
    }
}

impl<M, C, R> Step<M, C, R>
where
    M: Mapper,
    R: Reducer<Key = M::Key, Value = M::Value>,
{
    pub fn with_combiner<C2>(self, combiner: C2) -> Step<M, C2, R>
    where
        C2: Combiner<M::Key, M::Value>,
    {
        Step {
            mapper: self.mapper,
            combiner: Some(Arc::new(combiner)),
            reducer: self.reducer,
        }
    }
}

/// Identity mapper for steps that only regroup the previous step's output.
pub struct Passthrough<K, V> {
    _kv: PhantomData<fn(K, V)>,
}

impl<K, V> Passthrough<K, V> {
    pub fn new() -> Self {
        Self { _kv: PhantomData }
    }
}

impl<K, V> Default for Passthrough<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, V: Send + 'static> Mapper for Passthrough<K, V> {
    type In = (K, V);
    type Key = K;
    type Value = V;

    fn map(&self, record: (K, V)) -> Result<Vec<(K, V)>, MalformedRecord> {
        Ok(vec![record])
    }
}

struct MappedPartition<K, V> {
    pairs: Vec<(K, V)>,
    records_in: usize,
    skipped: usize,
    emitted: usize,
}

impl<M, C, R> Stage<M::In, (R::OutKey, R::OutValue)> for Step<M, C, R>
where
    M: Mapper,
    C: Combiner<M::Key, M::Value>,
    R: Reducer<Key = M::Key, Value = M::Value>,
{
    fn len(&self) -> usize {
        1
    }

    fn execute<S: Scheduler>(
        &self,
        input: RecordStream<M::In>,
        scheduler: &S,
        settings: &EngineSettings,
        report: &mut JobReport,
    ) -> Result<Vec<(R::OutKey, R::OutValue)>, MrError> {
        let span = info_span!("step", index = report.steps.len());
        let _entered = span.enter();
        let mut step_report = StepReport::default();

        let partitions = partition(input, settings.partition_size);
        let partition_count = partitions.len();
        let mapper = Arc::clone(&self.mapper);
        let combiner = self.combiner.clone();
        let mapped = scheduler.run_tasks(
            partitions,
            Arc::new(move |records: Vec<M::In>| {
                map_partition(mapper.as_ref(), combiner.as_deref(), records)
            }),
        )?;

        let mut pairs = Vec::with_capacity(mapped.len());
        for part in mapped {
            step_report.records_in += part.records_in;
            step_report.skipped += part.skipped;
            step_report.emitted += part.emitted;
            step_report.combined += part.pairs.len();
            pairs.push(part.pairs);
        }

        // Barrier: nothing is reduced until every partition has been mapped.
        let groups = group_by_key(pairs);
        step_report.groups = groups.len();
        info!(
            partitions = partition_count,
            records = step_report.records_in,
            skipped = step_report.skipped,
            groups = step_report.groups,
            "map phase finished"
        );

        let batches = batch(groups, scheduler.parallelism());
        let reducer = Arc::clone(&self.reducer);
        let reduced = scheduler.run_tasks(
            batches,
            Arc::new(move |entries: Vec<GroupedEntry<M::Key, M::Value>>| {
                reduce_batch(reducer.as_ref(), entries)
            }),
        )?;

        let mut output = Vec::new();
        for result in reduced {
            output.extend(result?);
        }
        step_report.records_out = output.len();
        info!(records = step_report.records_out, "reduce phase finished");

        report.steps.push(step_report);
        Ok(output)
    }
}

fn partition<I>(mut input: RecordStream<I>, size: usize) -> Vec<Vec<I>> {
    let mut partitions = Vec::new();
    loop {
        let chunk: Vec<I> = input.by_ref().take(size).collect();
        if chunk.is_empty() {
            return partitions;
        }
        partitions.push(chunk);
    }
}

/// Splits `items` into at most `batches` contiguous runs.
fn batch<T>(items: Vec<T>, batches: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let per_batch = items.len().div_ceil(batches.max(1));
    let mut out = Vec::new();
    let mut current = Vec::with_capacity(per_batch);
    for item in items {
        current.push(item);
        if current.len() == per_batch {
            out.push(mem::replace(&mut current, Vec::with_capacity(per_batch)));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn map_partition<M, C>(
    mapper: &M,
    combiner: Option<&C>,
    records: Vec<M::In>,
) -> MappedPartition<M::Key, M::Value>
where
    M: Mapper,
    C: Combiner<M::Key, M::Value>,
{
    let mut out = MappedPartition {
        pairs: Vec::new(),
        records_in: records.len(),
        skipped: 0,
        emitted: 0,
    };

    for record in records {
        match mapper.map(record) {
            Ok(pairs) => {
                out.emitted += pairs.len();
                out.pairs.extend(pairs);
            }
            Err(err) => {
                out.skipped += 1;
                debug!(reason = %err.reason, "skipping malformed record");
            }
        }
    }

    if let Some(combiner) = combiner {
        let local = group_by_key(std::iter::once(mem::take(&mut out.pairs)));
        for entry in local {
            let value = combiner.combine(&entry.key, entry.values);
            out.pairs.push((entry.key, value));
        }
    }

    out
}

fn reduce_batch<R: Reducer>(
    reducer: &R,
    entries: Vec<GroupedEntry<R::Key, R::Value>>,
) -> Result<Vec<(R::OutKey, R::OutValue)>, MrError> {
    let mut out = Vec::new();
    for entry in entries {
        out.extend(reducer.reduce(entry.key, entry.values)?);
    }
    Ok(out)
}
