use std::path::Path;

use burn::data::dataset::{
    Dataset, InMemDataset, SqliteDataset, source::huggingface::HuggingfaceDatasetLoader,
};
use tracing::info;

#[derive(Clone, Debug)]
pub struct TextGenerationItem {
    pub text: String,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct DatasetItem {
    pub text: String,
}

/// Ordered corpus of text records, either from the HuggingFace hub or a local file.
pub enum TextDataset {
    Hub(SqliteDataset<DatasetItem>),
    Local(InMemDataset<DatasetItem>),
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to import dataset '{0}' from the hub: {1}")]
    Hub(String, String),
    #[error("failed to read dataset file {0}: {1}")]
    Io(String, std::io::Error),
    #[error("unsupported dataset file {0} (expected .jsonl or .txt)")]
    Format(String),
}

impl Dataset<TextGenerationItem> for TextDataset {
    fn get(&self, index: usize) -> Option<TextGenerationItem> {
        let item = match self {
            Self::Hub(dataset) => dataset.get(index),
            Self::Local(dataset) => dataset.get(index),
        };
        item.map(|item| TextGenerationItem { text: item.text })
    }

    fn len(&self) -> usize {
        match self {
            Self::Hub(dataset) => dataset.len(),
            Self::Local(dataset) => dataset.len(),
        }
    }
}

impl TextDataset {
    /// Open `source`: an existing `.jsonl`/`.txt` file, or a HuggingFace dataset name.
    pub fn open(source: &str, split: &str) -> Result<Self, DatasetError> {
        let path = Path::new(source);
        if path.exists() {
            Self::from_file(path)
        } else {
            Self::from_hub(source, split)
        }
    }

    pub fn from_hub(name: &str, split: &str) -> Result<Self, DatasetError> {
        info!("Loading split '{split}' of {name} from the HuggingFace hub");
        let dataset: SqliteDataset<DatasetItem> = HuggingfaceDatasetLoader::new(name)
            .dataset(split)
            .map_err(|e| DatasetError::Hub(name.to_string(), format!("{e:?}")))?;
        Ok(Self::Hub(dataset))
    }

    /// JSON lines with a `text` field, or plain text with one record per non-empty line.
    pub fn from_file(path: &Path) -> Result<Self, DatasetError> {
        let display = path.display().to_string();
        let dataset = match path.extension().and_then(|e| e.to_str()) {
            Some("jsonl") => InMemDataset::from_json_rows(path)
                .map_err(|e| DatasetError::Io(display.clone(), e))?,
            Some("txt") => {
                let content =
                    std::fs::read_to_string(path).map_err(|e| DatasetError::Io(display.clone(), e))?;
                let items = content
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(|line| DatasetItem {
                        text: line.to_string(),
                    })
                    .collect();
                InMemDataset::new(items)
            }
            _ => return Err(DatasetError::Format(display)),
        };
        info!("Loaded {} records from {}", dataset.len(), path.display());
        Ok(Self::Local(dataset))
    }

    /// Build directly from records, mostly for tests and the `score` command.
    #[must_use]
    pub fn from_texts(texts: impl IntoIterator<Item = String>) -> Self {
        let items = texts.into_iter().map(|text| DatasetItem { text }).collect();
        Self::Local(InMemDataset::new(items))
    }
}

/// The evaluation batch: the first `n` records, in dataset order.
pub fn first_records<D: Dataset<TextGenerationItem>>(dataset: &D, n: usize) -> Vec<String> {
    (0..n.min(dataset.len()))
        .filter_map(|idx| dataset.get(idx))
        .map(|item| item.text)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_records_prefix() {
        let dataset = TextDataset::from_texts((0..5).map(|i| format!("record {i}")));
        assert_eq!(first_records(&dataset, 2), vec!["record 0", "record 1"]);
        assert_eq!(first_records(&dataset, 10).len(), 5);
        assert!(first_records(&dataset, 0).is_empty());
    }

    #[test]
    fn test_txt_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.txt");
        std::fs::write(&path, "first line\n\n   \nsecond line\n").unwrap();

        let dataset = TextDataset::open(path.to_str().unwrap(), "train").unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.get(1).unwrap().text, "second line");
    }

    #[test]
    fn test_jsonl_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.jsonl");
        std::fs::write(
            &path,
            "{\"text\": \"the quick brown fox\"}\n{\"text\": \"jumps over\"}\n",
        )
        .unwrap();

        let dataset = TextDataset::from_file(&path).unwrap();
        assert_eq!(
            first_records(&dataset, 10),
            vec!["the quick brown fox", "jumps over"]
        );
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.csv");
        std::fs::write(&path, "text\nhello\n").unwrap();
        assert!(matches!(
            TextDataset::from_file(&path),
            Err(DatasetError::Format(_))
        ));
    }
}
