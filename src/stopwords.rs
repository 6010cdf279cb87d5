use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;

/// Common English words left out of the counts when no ignore file exists.
pub static DEFAULT_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can't", "cannot", "could", "couldn't", "did", "didn't", "do", "does",
    "doesn't", "doing", "don't", "down", "during", "each", "few", "for", "from", "further",
    "had", "hadn't", "has", "hasn't", "have", "haven't", "having", "he", "he'd", "he'll",
    "he's", "her", "here", "here's", "hers", "herself", "him", "himself", "his", "how", "how's",
    "i", "i'd", "i'll", "i'm", "i've", "if", "in", "into", "is", "isn't", "it", "it's", "its",
    "itself", "let's", "me", "more", "most", "mustn't", "my", "myself", "no", "nor", "not", "of",
    "off", "on", "once", "only", "or", "other", "ought", "our", "ours", "ourselves", "out",
    "over", "own", "same", "shan't", "she", "she'd", "she'll", "she's", "should", "shouldn't",
    "so", "some", "such", "than", "that", "that's", "the", "their", "theirs", "them",
    "themselves", "then", "there", "there's", "these", "they", "they'd", "they'll", "they're",
    "they've", "this", "those", "through", "to", "too", "under", "until", "up", "very", "was",
    "wasn't", "we", "we'd", "we'll", "we're", "we've", "were", "weren't", "what", "what's",
    "when", "when's", "where", "where's", "which", "while", "who", "who's", "whom", "why",
    "why's", "with", "won't", "would", "wouldn't", "you", "you'd", "you'll", "you're", "you've",
    "your", "yours", "yourself", "yourselves",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopWordSource {
    File,
    BuiltIn,
}

/// Active ignore list, kept exactly as loaded.
#[derive(Debug, Clone)]
pub struct StopWords {
    words: Vec<String>,
    lookup: HashSet<String>,
    pub source: StopWordSource,
}

impl StopWords {
    pub fn new(words: Vec<String>, source: StopWordSource) -> Self {
        let lookup = words.iter().cloned().collect();
        Self {
            words,
            lookup,
            source,
        }
    }

    pub fn builtin() -> Self {
        Self::new(
            DEFAULT_STOP_WORDS.iter().map(|w| w.to_string()).collect(),
            StopWordSource::BuiltIn,
        )
    }

    /// Exact, case-sensitive membership.
    pub fn contains(&self, word: &str) -> bool {
        self.lookup.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    /// Words ordered case-insensitively, as displayed and persisted.
    pub fn sorted(&self) -> Vec<&str> {
        let mut words: Vec<&str> = self.iter().collect();
        words.sort_by_key(|w| w.to_lowercase());
        words
    }
}

pub fn load_stop_words(path: &Path) -> Result<StopWords> {
    if path.is_file() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read ignore words file {:?}", path))?;
        let words: Vec<String> = content.lines().map(str::to_string).collect();
        info!(action = "loaded", component = "stop_words", file_path = ?path, word_count = words.len(), "Loaded ignore words from file");
        return Ok(StopWords::new(words, StopWordSource::File));
    }

    let stop_words = StopWords::builtin();
    info!(
        action = "loaded",
        component = "stop_words",
        file_path = ?path,
        word_count = stop_words.len(),
        "Ignore words file not found, using built-in list"
    );
    Ok(stop_words)
}

/// Unions two word lists, dropping words already seen in any letter case,
/// then orders the result case-insensitively.
pub fn merge_stop_word_lists<'a>(
    first: impl IntoIterator<Item = &'a str>,
    second: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut merged: Vec<String> = first
        .into_iter()
        .chain(second)
        .filter(|word| seen.insert(word.to_lowercase()))
        .map(str::to_string)
        .collect();
    merged.sort_by_key(|w| w.to_lowercase());
    merged
}

/// Reads both inputs before touching `output`.
pub fn merge_stop_word_files(first: &Path, second: &Path, output: &Path) -> Result<usize> {
    let first_content = fs::read_to_string(first)
        .with_context(|| format!("Failed to read word list {:?}", first))?;
    let second_content = fs::read_to_string(second)
        .with_context(|| format!("Failed to read word list {:?}", second))?;

    let merged = merge_stop_word_lists(first_content.lines(), second_content.lines());
    fs::write(output, merged.join("\n"))
        .with_context(|| format!("Failed to write merged word list {:?}", output))?;

    info!(
        action = "complete",
        component = "stop_word_merge",
        output = ?output,
        word_count = merged.len(),
        "Merged word lists"
    );
    Ok(merged.len())
}
