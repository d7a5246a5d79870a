use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w']+").expect("invalid regex"));

/// Lower-cased words with stop words removed. Built once per job and shared
/// by every mapper.
#[derive(Debug, Clone, Default)]
pub struct TextFilter {
    stop_words: HashSet<String>,
}

impl TextFilter {
    pub fn new<I, S>(stop_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            stop_words: stop_words
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }

    pub fn keywords<'a>(&'a self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        WORD_RE
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .filter(move |w| !self.is_stop_word(w))
    }

    /// Bag of words over unigrams and bigrams of the filtered text.
    pub fn term_vector(&self, text: &str) -> TermVector {
        let words: Vec<String> = self.keywords(&text.replace('-', " ")).collect();
        let mut counts = HashMap::new();
        for word in &words {
            *counts.entry(word.clone()).or_insert(0) += 1;
        }
        for pair in words.windows(2) {
            *counts.entry(format!("{} {}", pair[0], pair[1])).or_insert(0) += 1;
        }
        TermVector { counts }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermVector {
    counts: HashMap<String, u64>,
}

impl TermVector {
    pub fn magnitude(&self) -> f64 {
        self.counts
            .values()
            .map(|&c| (c * c) as f64)
            .sum::<f64>()
            .sqrt()
    }

    pub fn dot(&self, other: &TermVector) -> f64 {
        self.counts
            .iter()
            .filter_map(|(term, &a)| other.counts.get(term).map(|&b| (a * b) as f64))
            .sum()
    }

    /// Cosine of the angle between two vectors, or `None` when either is
    /// all zeros.
    pub fn cosine(&self, other: &TermVector) -> Option<f64> {
        let norms = self.magnitude() * other.magnitude();
        (norms > 0.0).then(|| self.dot(other) / norms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_lowercased_and_filtered() {
        let filter = TextFilter::new(["the", "OF"]);
        let words: Vec<_> = filter.keywords("The Lord of the Rings: Frodo's Quest").collect();
        assert_eq!(words, vec!["lord", "rings", "frodo's", "quest"]);
    }

    #[test]
    fn term_vector_counts_unigrams_and_bigrams() {
        let filter = TextFilter::new(["a"]);
        let v = filter.term_vector("deep learning a deep-learning");
        assert_eq!(v.counts.get("deep"), Some(&2));
        assert_eq!(v.counts.get("deep learning"), Some(&2));
        assert_eq!(v.counts.get("learning deep"), Some(&1));
    }

    #[test]
    fn identical_texts_have_cosine_one() {
        let filter = TextFilter::default();
        let a = filter.term_vector("graph neural networks");
        let sim = a.cosine(&a.clone()).expect("non-zero vector");
        assert!((sim - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_vector_has_no_cosine() {
        let filter = TextFilter::new(["the"]);
        let empty = filter.term_vector("the the");
        let other = filter.term_vector("networks");
        assert_eq!(empty.cosine(&other), None);
    }
}
