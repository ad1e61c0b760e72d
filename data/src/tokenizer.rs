use std::{collections::HashMap, path::Path, sync::Arc};

use tokenizers::tokenizer::Tokenizer as HfTokenizer;

/// Mapping between text and token ids.
pub trait TokenizerTrait: Send + Sync {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<usize>, TokenizerError>;
    fn decode(&self, token_ids: &[usize], skip_special_tokens: bool)
    -> Result<String, TokenizerError>;
    fn vocab_size(&self) -> usize;
    /// End-of-sequence marker, if the vocabulary defines one.
    fn eos_token(&self) -> Option<usize>;
}

#[derive(Debug, thiserror::Error)]
pub enum TokenizerError {
    #[error("failed to load tokenizer '{0}': {1}")]
    Load(String, String),
    #[error("failed to encode text: {0}")]
    Encode(String),
    #[error("failed to decode tokens: {0}")]
    Decode(String),
    #[error("character {0:?} is not in the vocabulary")]
    UnknownCharacter(char),
    #[error("token id {0} is outside the vocabulary")]
    UnknownToken(usize),
}

/// HuggingFace `tokenizers` wrapper.
pub struct Tokenizer {
    inner: HfTokenizer,
    eos_token_id: Option<usize>,
}

impl Tokenizer {
    #[must_use]
    pub fn new(tokenizer: HfTokenizer, eos_token_id: Option<usize>) -> Self {
        Self {
            inner: tokenizer,
            eos_token_id,
        }
    }

    /// Load a tokenizer from either a HuggingFace model name or a local file path.
    ///
    /// - If the path exists on disk, loads from file
    /// - Otherwise, treats as a HuggingFace model name (e.g., "gpt2")
    pub fn load(identifier: &str, eos_token: Option<&str>) -> Result<Self, TokenizerError> {
        let tokenizer = if Path::new(identifier).exists() {
            HfTokenizer::from_file(identifier)
        } else {
            HfTokenizer::from_pretrained(identifier, None)
        }
        .map_err(|e| TokenizerError::Load(identifier.to_string(), e.to_string()))?;

        Ok(Self::from_hf_tokenizer(tokenizer, eos_token))
    }

    /// Create from an already-loaded HuggingFace tokenizer, detecting the EOS token.
    /// An explicit `eos_token` wins over the well-known fallbacks.
    #[must_use]
    pub fn from_hf_tokenizer(tokenizer: HfTokenizer, eos_token: Option<&str>) -> Self {
        let eos_candidates = ["<eos>", "</s>", "[EOS]", "<|endoftext|>"];

        let eos_token_id = eos_token
            .and_then(|t| tokenizer.token_to_id(t))
            .or_else(|| eos_candidates.iter().find_map(|t| tokenizer.token_to_id(t)))
            .map(|id| id as usize);

        Self::new(tokenizer, eos_token_id)
    }
}

impl TokenizerTrait for Tokenizer {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<usize>, TokenizerError> {
        let encoding = self
            .inner
            .encode(text, add_special_tokens)
            .map_err(|e| TokenizerError::Encode(e.to_string()))?;
        Ok(encoding.get_ids().iter().map(|&id| id as usize).collect())
    }

    fn decode(
        &self,
        token_ids: &[usize],
        skip_special_tokens: bool,
    ) -> Result<String, TokenizerError> {
        let token_ids = token_ids
            .iter()
            .map(|&id| u32::try_from(id).map_err(|_| TokenizerError::UnknownToken(id)))
            .collect::<Result<Vec<u32>, _>>()?;
        self.inner
            .decode(&token_ids, skip_special_tokens)
            .map_err(|e| TokenizerError::Decode(e.to_string()))
    }

    fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    fn eos_token(&self) -> Option<usize> {
        self.eos_token_id
    }
}

/// Character-level vocabulary: one token per distinct character.
#[derive(Clone, Debug)]
pub struct CharTokenizer {
    chars: Vec<char>,
    ids: HashMap<char, usize>,
    eos_token_id: Option<usize>,
}

impl CharTokenizer {
    /// Build from an alphabet; duplicates keep their first position.
    pub fn new(alphabet: impl IntoIterator<Item = char>) -> Self {
        let mut chars = Vec::new();
        let mut ids = HashMap::new();
        for c in alphabet {
            ids.entry(c).or_insert_with(|| {
                chars.push(c);
                chars.len() - 1
            });
        }
        Self {
            chars,
            ids,
            eos_token_id: None,
        }
    }

    /// Sorted set of characters appearing in `corpus`.
    pub fn from_corpus<'a>(corpus: impl IntoIterator<Item = &'a str>) -> Self {
        let mut chars: Vec<char> = corpus.into_iter().flat_map(str::chars).collect();
        chars.sort_unstable();
        chars.dedup();
        Self::new(chars)
    }

    /// Alphabet file: every character of the file (newlines included) is a token.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TokenizerError> {
        let path = path.as_ref();
        let alphabet = std::fs::read_to_string(path)
            .map_err(|e| TokenizerError::Load(path.display().to_string(), e.to_string()))?;
        Ok(Self::new(alphabet.chars()))
    }

    /// Designate a character of the alphabet as the end-of-sequence marker.
    pub fn with_eos(mut self, eos: char) -> Result<Self, TokenizerError> {
        let id = *self
            .ids
            .get(&eos)
            .ok_or(TokenizerError::UnknownCharacter(eos))?;
        self.eos_token_id = Some(id);
        Ok(self)
    }

    #[must_use]
    pub fn token_id(&self, c: char) -> Option<usize> {
        self.ids.get(&c).copied()
    }
}

impl TokenizerTrait for CharTokenizer {
    fn encode(&self, text: &str, _add_special_tokens: bool) -> Result<Vec<usize>, TokenizerError> {
        text.chars()
            .map(|c| {
                self.ids
                    .get(&c)
                    .copied()
                    .ok_or(TokenizerError::UnknownCharacter(c))
            })
            .collect()
    }

    fn decode(
        &self,
        token_ids: &[usize],
        skip_special_tokens: bool,
    ) -> Result<String, TokenizerError> {
        token_ids
            .iter()
            .filter(|&&id| !(skip_special_tokens && Some(id) == self.eos_token_id))
            .map(|&id| {
                self.chars
                    .get(id)
                    .copied()
                    .ok_or(TokenizerError::UnknownToken(id))
            })
            .collect()
    }

    fn vocab_size(&self) -> usize {
        self.chars.len()
    }

    fn eos_token(&self) -> Option<usize> {
        self.eos_token_id
    }
}

/// Resolve a tokenizer identifier.
///
/// `chars:<path>` builds a [`CharTokenizer`] from an alphabet file; anything else is
/// handed to [`Tokenizer::load`].
pub fn load_tokenizer(identifier: &str) -> Result<Arc<dyn TokenizerTrait>, TokenizerError> {
    if let Some(path) = identifier.strip_prefix("chars:") {
        return Ok(Arc::new(CharTokenizer::from_file(path)?));
    }
    Ok(Arc::new(Tokenizer::load(identifier, None)?))
}
