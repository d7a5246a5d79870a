//! Associative folds shared by the counting and revenue jobs.

use std::marker::PhantomData;

use crate::common::{Combiner, Key, Reducer};
use crate::error::MrError;

use super::funnel::{Candidate, Funnel};

/// A value that can be folded in any grouping and any number of passes.
pub trait Aggregate: Copy + Send + Sync + 'static {
    fn zero() -> Self;
    fn merge(self, other: Self) -> Self;
}

impl Aggregate for u64 {
    fn zero() -> Self {
        0
    }
    fn merge(self, other: Self) -> Self {
        self + other
    }
}

impl Aggregate for f64 {
    fn zero() -> Self {
        0.0
    }
    fn merge(self, other: Self) -> Self {
        self + other
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SalesTotals {
    pub quantity: f64,
    pub revenue: f64,
}

impl Aggregate for SalesTotals {
    fn zero() -> Self {
        Self::default()
    }
    fn merge(self, other: Self) -> Self {
        Self {
            quantity: self.quantity + other.quantity,
            revenue: self.revenue + other.revenue,
        }
    }
}

pub fn fold<V: Aggregate>(values: impl IntoIterator<Item = V>) -> V {
    values.into_iter().fold(V::zero(), V::merge)
}

/// Collapses a partition's values for a key into their sum.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumCombiner;

impl<K, V: Aggregate> Combiner<K, V> for SumCombiner {
    fn combine(&self, _key: &K, values: Vec<V>) -> V {
        fold(values)
    }
}

/// Sums a key's values and re-keys the total as a ranking candidate:
/// `key -> (new_key, payload)` decides where the candidate is grouped next.
pub struct Regroup<K, V, F> {
    split: F,
    _kv: PhantomData<fn(K, V)>,
}

impl<K, V, F> Regroup<K, V, F> {
    pub fn new<NK, P>(split: F) -> Self
    where
        F: Fn(K) -> (NK, P),
    {
        Self {
            split,
            _kv: PhantomData,
        }
    }
}

impl<K, V> Regroup<K, V, fn(K) -> (Funnel, K)> {
    /// Sends every candidate to the single funnel key.
    pub fn funnel() -> Self {
        fn to_funnel<K>(key: K) -> (Funnel, K) {
            (Funnel, key)
        }
        Self::new(to_funnel::<K> as fn(K) -> (Funnel, K))
    }
}

impl<K, V, F, NK, P> Reducer for Regroup<K, V, F>
where
    K: Key,
    V: Aggregate,
    F: Fn(K) -> (NK, P) + Send + Sync + 'static,
    NK: Send + 'static,
    P: Send + 'static,
{
    type Key = K;
    type Value = V;
    type OutKey = NK;
    type OutValue = Candidate<V, P>;

    fn reduce(&self, key: K, values: Vec<V>) -> Result<Vec<(NK, Candidate<V, P>)>, MrError> {
        let (next_key, payload) = (self.split)(key);
        Ok(vec![(next_key, Candidate::new(fold(values), payload))])
    }
}
