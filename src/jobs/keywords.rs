//! Keyword counts over tab-separated title records
//! (`tconst titleType primaryTitle originalTitle isAdult startYear endYear
//! runtimeMinutes genres`).

use std::collections::HashSet;
use std::sync::Arc;

use crate::common::Mapper;
use crate::configuration::JobSettings;
use crate::error::MalformedRecord;
use crate::pipeline::{Chain, Pipeline};
use crate::step::Step;

use super::aggregate::{Regroup, SumCombiner};
use super::funnel::{rank_step, Candidate, Funnel, RankStep};
use super::text::TextFilter;

const TITLE_TYPE: usize = 1;
const PRIMARY_TITLE: usize = 2;
const GENRES: usize = 8;

/// Placeholder for a missing column value.
const MISSING: &str = "\\N";

fn fields(line: &str, needed: usize) -> Result<Vec<&str>, MalformedRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() <= needed {
        return Err(MalformedRecord::new(format!(
            "expected at least {} fields, got {}",
            needed + 1,
            fields.len()
        )));
    }
    Ok(fields)
}

/// Emits `(word, 1)` for every keyword of a title whose type is counted.
pub struct KeywordMapper {
    filter: Arc<TextFilter>,
    title_types: HashSet<String>,
}

impl KeywordMapper {
    pub fn new(filter: Arc<TextFilter>, title_types: impl IntoIterator<Item = String>) -> Self {
        Self {
            filter,
            title_types: title_types.into_iter().collect(),
        }
    }
}

impl Mapper for KeywordMapper {
    type In = String;
    type Key = String;
    type Value = u64;

    fn map(&self, line: String) -> Result<Vec<(String, u64)>, MalformedRecord> {
        let fields = fields(&line, PRIMARY_TITLE)?;
        if !self.title_types.contains(fields[TITLE_TYPE]) {
            return Ok(Vec::new());
        }
        Ok(self
            .filter
            .keywords(fields[PRIMARY_TITLE])
            .map(|word| (word, 1))
            .collect())
    }
}

/// Emits `((genre, word), 1)` for every genre of a title and every keyword
/// in its primary title.
pub struct GenreKeywordMapper {
    filter: Arc<TextFilter>,
    title_type: String,
}

impl GenreKeywordMapper {
    pub fn new(filter: Arc<TextFilter>, title_type: impl Into<String>) -> Self {
        Self {
            filter,
            title_type: title_type.into(),
        }
    }
}

impl Mapper for GenreKeywordMapper {
    type In = String;
    type Key = (String, String);
    type Value = u64;

    fn map(&self, line: String) -> Result<Vec<((String, String), u64)>, MalformedRecord> {
        let fields = fields(&line, GENRES)?;
        if fields[TITLE_TYPE] != self.title_type {
            return Ok(Vec::new());
        }

        let genres: Vec<&str> = fields[GENRES]
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty() && *g != MISSING)
            .collect();

        let mut out = Vec::new();
        for word in self.filter.keywords(fields[PRIMARY_TITLE]) {
            for genre in &genres {
                out.push(((genre.to_string(), word.clone()), 1));
            }
        }
        Ok(out)
    }
}

type ToFunnel = fn(String) -> (Funnel, String);
type ByGenre = fn((String, String)) -> (String, String);

pub type KeywordCount = Step<KeywordMapper, SumCombiner, Regroup<String, u64, ToFunnel>>;
pub type GenreKeywordCount =
    Step<GenreKeywordMapper, SumCombiner, Regroup<(String, String), u64, ByGenre>>;

pub type TopKeywords = Pipeline<
    Chain<KeywordCount, RankStep<Funnel, u64, String>, (Funnel, Candidate<u64, String>)>,
    String,
    (Funnel, Candidate<u64, String>),
>;
pub type TopGenreKeywords = Pipeline<
    Chain<GenreKeywordCount, RankStep<String, u64, String>, (String, Candidate<u64, String>)>,
    String,
    (String, Candidate<u64, String>),
>;

/// Most common `top_k` keywords across titles of the configured types.
pub fn top_keywords(settings: &JobSettings) -> TopKeywords {
    let filter = Arc::new(TextFilter::new(&settings.stop_words));
    let count = Step::new(
        KeywordMapper::new(filter, settings.title_types.iter().cloned()),
        Regroup::funnel(),
    )
    .with_combiner(SumCombiner);
    Pipeline::new(count).then(rank_step(settings.top_k))
}

/// Most common `top_k` keywords of each genre, as `(genre, Candidate)` records
/// scored by count with the word as payload. Best first within a genre.
pub fn top_genre_keywords(settings: &JobSettings) -> TopGenreKeywords {
    fn by_genre((genre, word): (String, String)) -> (String, String) {
        (genre, word)
    }

    let filter = Arc::new(TextFilter::new(&settings.stop_words));
    let count = Step::new(
        GenreKeywordMapper::new(filter, settings.genre_title_type.clone()),
        Regroup::new(by_genre as ByGenre),
    )
    .with_combiner(SumCombiner);
    Pipeline::new(count).then(rank_step(settings.top_k))
}
