use anyhow::Context;
use serde::Deserialize;
use std::{fs, path::Path};

use crate::error::MrError;

const DEFAULT_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his",
    "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more", "most",
    "my", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our",
    "out", "over", "own", "same", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub jobs: JobSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Size of the worker pool; also the upper bound on reduce batches.
    pub workers: usize,
    /// Records per map partition.
    pub partition_size: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            partition_size: 1024,
        }
    }
}

impl EngineSettings {
    pub fn new(workers: usize, partition_size: usize) -> Self {
        Self {
            workers,
            partition_size,
        }
    }

    pub fn validate(&self) -> Result<(), MrError> {
        if self.workers == 0 {
            return Err(MrError::InvalidConfig("workers must be at least 1".into()));
        }
        if self.partition_size == 0 {
            return Err(MrError::InvalidConfig(
                "partition_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    pub top_k: usize,
    pub stop_words: Vec<String>,
    /// Title types counted by the keyword job.
    pub title_types: Vec<String>,
    /// Title type counted by the per-genre keyword job.
    pub genre_title_type: String,
    /// Text the similarity job ranks summaries against.
    pub query: String,
    pub matrix: MatrixSettings,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            top_k: 10,
            stop_words: DEFAULT_STOP_WORDS.iter().map(|w| w.to_string()).collect(),
            title_types: vec!["movie".into(), "short".into()],
            genre_title_type: "movie".into(),
            query: String::new(),
            matrix: MatrixSettings::default(),
        }
    }
}

/// Output dimensions are never inferred from the data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MatrixSettings {
    pub left: String,
    pub right: String,
    pub left_rows: usize,
    pub right_cols: usize,
}

impl Default for MatrixSettings {
    fn default() -> Self {
        Self {
            left: "A".into(),
            right: "B".into(),
            left_rows: 0,
            right_cols: 0,
        }
    }
}

impl MatrixSettings {
    pub fn new(left_rows: usize, right_cols: usize) -> Self {
        Self {
            left_rows,
            right_cols,
            ..Self::default()
        }
    }
}

/// Loads settings from a TOML file, or falls back to defaults when no file
/// is given.
pub fn get_configuration(path: Option<&Path>) -> anyhow::Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
    let settings: Settings = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse configuration file {}", path.display()))?;
    settings.engine.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_a_file() {
        let settings = get_configuration(None).expect("Failed to get configuration");

        assert!(settings.engine.workers >= 1);
        assert_eq!(settings.engine.partition_size, 1024);
        assert_eq!(settings.jobs.top_k, 10);
        assert!(settings.jobs.stop_words.iter().any(|w| w == "the"));
        assert_eq!(settings.jobs.matrix.left, "A");
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        writeln!(
            file,
            r#"
[engine]
workers = 3

[jobs]
top_k = 2
stop_words = ["foo"]

[jobs.matrix]
left = "M"
left_rows = 3
right_cols = 2
"#
        )
        .expect("Failed to write config");

        let settings = get_configuration(Some(file.path())).expect("Failed to get configuration");

        assert_eq!(settings.engine.workers, 3);
        assert_eq!(settings.engine.partition_size, 1024);
        assert_eq!(settings.jobs.top_k, 2);
        assert_eq!(settings.jobs.stop_words, vec!["foo".to_string()]);
        assert_eq!(settings.jobs.matrix.left, "M");
        assert_eq!(settings.jobs.matrix.right, "B");
        assert_eq!(settings.jobs.matrix.left_rows, 3);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, "[engine]\nworkers = 0").expect("Failed to write config");

        assert!(get_configuration(Some(file.path())).is_err());
    }

    #[test]
    fn zero_partition_size_is_invalid() {
        let err = EngineSettings::new(2, 0).validate().unwrap_err();
        assert!(matches!(err, MrError::InvalidConfig(_)));
    }
}
