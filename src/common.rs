use async_trait::async_trait;
use std::{fmt::Debug, hash::Hash, marker::PhantomData, sync::Arc};

use crate::error::{MalformedRecord, MrError};

/// Anything that can be grouped on during a shuffle.
pub trait Key: Hash + Eq + Clone + Debug + Send + Sync + 'static {}

impl<T: Hash + Eq + Clone + Debug + Send + Sync + 'static> Key for T {}

/// Forward-only, consumed-once sequence of records feeding a step.
pub type RecordStream<I> = Box<dyn Iterator<Item = I> + Send>;

pub fn record_stream<I, It>(records: It) -> RecordStream<I>
where
    It: IntoIterator<Item = I>,
    It::IntoIter: Send + 'static,
{
    Box::new(records.into_iter())
}

/// {key: [values in emission order]}
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedEntry<K, V> {
    pub key: K,
    pub values: Vec<V>,
}

impl<K, V> GroupedEntry<K, V> {
    pub fn new(key: K, values: Vec<V>) -> Self {
        Self { key, values }
    }
}

pub trait Mapper: Send + Sync + 'static {
    type In: Send + 'static;
    type Key: Key;
    type Value: Send + 'static;

    /// Expands one record into zero or more pairs. Returning
    /// `Err` drops the record; the step keeps going.
    fn map(&self, record: Self::In) -> Result<Vec<(Self::Key, Self::Value)>, MalformedRecord>;
}

/// Partition-local pre-aggregation. Only sees values from one map partition,
/// so it must be safe to apply zero, one or many times before the reducer.
/// A key that reaches the combiner always leaves it with exactly one value.
pub trait Combiner<K, V>: Send + Sync + 'static {
    fn combine(&self, key: &K, values: Vec<V>) -> V;
}

impl<K, V, F> Combiner<K, V> for F
where
    F: Fn(&K, Vec<V>) -> V + Send + Sync + 'static,
{
    fn combine(&self, key: &K, values: Vec<V>) -> V {
        self(key, values)
    }
}

pub trait Reducer: Send + Sync + 'static {
    type Key: Key;
    type Value: Send + 'static;
    type OutKey: Send + 'static;
    type OutValue: Send + 'static;

    fn reduce(
        &self,
        key: Self::Key,
        values: Vec<Self::Value>,
    ) -> Result<Vec<(Self::OutKey, Self::OutValue)>, MrError>;
}

/// Mapper backed by a plain function or closure.
pub struct FnMapper<F, I> {
    f: F,
    _in: PhantomData<fn(I)>,
}

impl<F, I> FnMapper<F, I> {
    pub fn new<K, V>(f: F) -> Self
    where
        F: Fn(I) -> Result<Vec<(K, V)>, MalformedRecord>,
    {
        Self { f, _in: PhantomData }
    }
}

impl<F, I, K, V> Mapper for FnMapper<F, I>
where
    F: Fn(I) -> Result<Vec<(K, V)>, MalformedRecord> + Send + Sync + 'static,
    I: Send + 'static,
    K: Key,
    V: Send + 'static,
{
    type In = I;
    type Key = K;
    type Value = V;

    fn map(&self, record: I) -> Result<Vec<(K, V)>, MalformedRecord> {
        (self.f)(record)
    }
}

/// Reducer backed by a plain function or closure.
pub struct FnReducer<F, K, V> {
    f: F,
    _kv: PhantomData<fn(K, V)>,
}

impl<F, K, V> FnReducer<F, K, V> {
    pub fn new<OK, OV>(f: F) -> Self
    where
        F: Fn(K, Vec<V>) -> Result<Vec<(OK, OV)>, MrError>,
    {
        Self { f, _kv: PhantomData }
    }
}

impl<F, K, V, OK, OV> Reducer for FnReducer<F, K, V>
where
    F: Fn(K, Vec<V>) -> Result<Vec<(OK, OV)>, MrError> + Send + Sync + 'static,
    K: Key,
    V: Send + 'static,
    OK: Send + 'static,
    OV: Send + 'static,
{
    type Key = K;
    type Value = V;
    type OutKey = OK;
    type OutValue = OV;

    fn reduce(&self, key: K, values: Vec<V>) -> Result<Vec<(OK, OV)>, MrError> {
        (self.f)(key, values)
    }
}

/// Runs independent tasks and hands back their results in task order,
/// only once every task has finished.
pub trait Scheduler {
    fn parallelism(&self) -> usize;

    fn run_tasks<T, R, F>(&self, tasks: Vec<T>, f: Arc<F>) -> Result<Vec<R>, MrError>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub records_in: usize,
    pub skipped: usize,
    pub emitted: usize,
    /// Pairs left after partition-local combining.
    pub combined: usize,
    pub groups: usize,
    pub records_out: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    pub steps: Vec<StepReport>,
}

impl JobReport {
    pub fn skipped_records(&self) -> usize {
        self.steps.iter().map(|s| s.skipped).sum()
    }
}

#[derive(Debug)]
pub struct JobOutput<O> {
    pub records: Vec<O>,
    pub report: JobReport,
}

#[async_trait]
pub trait MapReduce {
    type Output: Send;

    async fn run(self) -> Result<JobOutput<Self::Output>, MrError>;
}
