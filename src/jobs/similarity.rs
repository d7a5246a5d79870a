use std::sync::Arc;

use serde::Deserialize;

use crate::common::Mapper;
use crate::configuration::JobSettings;
use crate::error::MalformedRecord;
use crate::pipeline::Pipeline;
use crate::step::{NoCombiner, Step};

use super::funnel::{Candidate, Funnel, TopKReducer};
use super::text::{TermVector, TextFilter};

/// Score reported when either vector is empty. Cosine scores of count
/// vectors are never negative, so it always ranks last.
pub const NO_SIMILARITY: f64 = -1.0;

#[derive(Debug, Clone, Deserialize)]
pub struct Paper {
    pub id: String,
    pub summary: String,
}

/// Scores each paper summary against a fixed query and sends every score to
/// the funnel.
pub struct SimilarityMapper {
    filter: Arc<TextFilter>,
    query: TermVector,
}

impl SimilarityMapper {
    pub fn new(filter: Arc<TextFilter>, query: &str) -> Self {
        let query = filter.term_vector(query);
        Self { filter, query }
    }

    pub fn score(&self, summary: &str) -> f64 {
        self.filter
            .term_vector(summary)
            .cosine(&self.query)
            .unwrap_or(NO_SIMILARITY)
    }
}

impl Mapper for SimilarityMapper {
    type In = String;
    type Key = Funnel;
    type Value = Candidate<f64, String>;

    fn map(&self, line: String) -> Result<Vec<(Funnel, Candidate<f64, String>)>, MalformedRecord> {
        let paper: Paper = serde_json::from_str(&line)
            .map_err(|e| MalformedRecord::new(format!("bad paper record: {e}")))?;
        Ok(vec![(
            Funnel,
            Candidate::new(self.score(&paper.summary), paper.id),
        )])
    }
}

pub type SimilarityStep = Step<SimilarityMapper, NoCombiner, TopKReducer<Funnel, f64, String>>;
pub type MostSimilar = Pipeline<SimilarityStep, String, (Funnel, Candidate<f64, String>)>;

/// Papers whose summaries are closest to the configured query, best first.
/// The mapper already emits under the funnel key, so this is a single step.
pub fn most_similar(settings: &JobSettings) -> MostSimilar {
    let filter = Arc::new(TextFilter::new(&settings.stop_words));
    let mapper = SimilarityMapper::new(filter, &settings.query);
    Pipeline::new(Step::new(mapper, TopKReducer::new(settings.top_k)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::record_stream;
    use crate::configuration::EngineSettings;
    use crate::map_reduce_seq::Sequential;

    fn paper(id: &str, summary: &str) -> String {
        serde_json::json!({ "id": id, "summary": summary, "title": "ignored" }).to_string()
    }

    fn settings(query: &str, top_k: usize) -> JobSettings {
        JobSettings {
            top_k,
            query: query.into(),
            ..JobSettings::default()
        }
    }

    #[test]
    fn empty_summary_gets_the_sentinel() {
        let mapper = SimilarityMapper::new(Arc::new(TextFilter::new(["the"])), "neural networks");
        assert_eq!(mapper.score("the the"), NO_SIMILARITY);
        assert!(mapper.score("neural networks") > 0.99);
    }

    #[test]
    fn invalid_json_is_malformed() {
        let mapper = SimilarityMapper::new(Arc::new(TextFilter::default()), "query");
        assert!(mapper.map("{not json".into()).is_err());
        assert!(mapper.map(r#"{"id": "1"}"#.into()).is_err());
    }

    #[test]
    fn ranks_papers_by_similarity_to_the_query() {
        let input = vec![
            paper("1", "A survey of graph neural networks."),
            paper("2", "Convolutional networks for image question answering."),
            paper("3", "Neural networks reason about image relations."),
            paper("4", "The"),
            "garbage".to_string(),
        ];

        let out = most_similar(&settings("neural networks reason about image relations", 3))
            .execute(record_stream(input), &Sequential, &EngineSettings::new(2, 2))
            .expect("job failed");

        let ids: Vec<&str> = out.records.iter().map(|(_, c)| c.payload.as_str()).collect();
        assert_eq!(ids[0], "3");
        assert_eq!(out.records.len(), 3);
        assert!(out.records.iter().all(|(_, c)| c.score > NO_SIMILARITY));
        assert_eq!(out.report.skipped_records(), 1);
    }
}
