//! Global top-K through a single shared key.
//!
//! Stage one reduces per natural key to a score and re-keys every candidate to
//! [`Funnel`]; the shuffle then puts all of them into one group, so stage two
//! runs exactly one reducer with full visibility. That reducer is a serial
//! bottleneck: top-K ranking cannot scale past a single reducer.

use std::cmp::Ordering;
use std::fmt::Debug;
use std::marker::PhantomData;

use crate::common::{Key, Reducer};
use crate::error::MrError;
use crate::step::{NoCombiner, Passthrough, Step};

/// The sentinel key every funnel candidate is emitted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Funnel;

/// Scores need a total order so ranking never depends on input order.
pub trait Score: Copy + Debug + Send + Sync + 'static {
    fn cmp_score(&self, other: &Self) -> Ordering;
}

impl Score for u64 {
    fn cmp_score(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl Score for f64 {
    fn cmp_score(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<S, P> {
    pub score: S,
    pub payload: P,
}

impl<S, P> Candidate<S, P> {
    pub fn new(score: S, payload: P) -> Self {
        Self { score, payload }
    }
}

/// Highest score first; equal scores fall back to ascending payload.
pub fn rank<S: Score, P: Ord>(a: &Candidate<S, P>, b: &Candidate<S, P>) -> Ordering {
    b.score
        .cmp_score(&a.score)
        .then_with(|| a.payload.cmp(&b.payload))
}

/// Keeps the `k` best candidates, best first.
pub fn top_k<S: Score, P: Ord>(
    mut candidates: Vec<Candidate<S, P>>,
    k: usize,
) -> Vec<Candidate<S, P>> {
    candidates.sort_by(rank);
    candidates.truncate(k);
    candidates
}

/// Ranks every candidate grouped under a key and keeps the top `k`.
/// Grouped under [`Funnel`] this is the global ranking.
pub struct TopKReducer<K, S, P> {
    k: usize,
    _ksp: PhantomData<fn(K, S, P)>,
}

impl<K, S, P> TopKReducer<K, S, P> {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            _ksp: PhantomData,
        }
    }
}

impl<K, S, P> Reducer for TopKReducer<K, S, P>
where
    K: Key,
    S: Score,
    P: Ord + Send + 'static,
{
    type Key = K;
    type Value = Candidate<S, P>;
    type OutKey = K;
    type OutValue = Candidate<S, P>;

    fn reduce(
        &self,
        key: K,
        candidates: Vec<Candidate<S, P>>,
    ) -> Result<Vec<(K, Candidate<S, P>)>, MrError> {
        Ok(top_k(candidates, self.k)
            .into_iter()
            .map(|candidate| (key.clone(), candidate))
            .collect())
    }
}

/// Second step of a funnel: regroup the previous step's candidates as they
/// are and rank each group.
pub type RankStep<K, S, P> =
    Step<Passthrough<K, Candidate<S, P>>, NoCombiner, TopKReducer<K, S, P>>;

pub fn rank_step<K, S, P>(k: usize) -> RankStep<K, S, P>
where
    K: Key,
    S: Score,
    P: Ord + Send + 'static,
{
    Step::new(Passthrough::new(), TopKReducer::new(k))
}
