use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tracing::info;

use crate::stopwords::StopWords;
use crate::tokens::TokenStream;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    pub word_counts: HashMap<String, usize>,
}

impl FrequencyTable {
    /// Counts every distinct non-stop token with a linear scan over the
    /// stream. Quadratic, but ticket exports are small.
    pub fn count(stream: &TokenStream, stop_words: &StopWords) -> Self {
        let start_time = Instant::now();

        let tokens: Vec<&str> = stream.tokens().collect();
        let mut unique_words: BTreeSet<&str> = tokens.iter().copied().collect();
        let distinct_before = unique_words.len();
        unique_words.retain(|word| !stop_words.contains(word));

        let word_counts: HashMap<String, usize> = unique_words
            .into_iter()
            .map(|word| {
                let count = tokens.iter().filter(|token| **token == word).count();
                (word.to_string(), count)
            })
            .collect();

        info!(
            action = "complete",
            component = "frequency_count",
            token_count = tokens.len(),
            distinct_words = distinct_before,
            counted_words = word_counts.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Counted word frequencies"
        );

        FrequencyTable { word_counts }
    }

    pub fn len(&self) -> usize {
        self.word_counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word_counts.is_empty()
    }

    pub fn get(&self, word: &str) -> Option<usize> {
        self.word_counts.get(word).copied()
    }

    pub fn total(&self) -> usize {
        self.word_counts.values().sum()
    }

    /// Highest count first, equal counts alphabetically.
    pub fn ranked(&self) -> Vec<WordCount> {
        let mut sorted: Vec<WordCount> = self
            .word_counts
            .iter()
            .map(|(word, count)| WordCount {
                word: word.clone(),
                count: *count,
            })
            .collect();
        sorted.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stopwords::StopWordSource;

    fn stop_words(words: &[&str]) -> StopWords {
        StopWords::new(
            words.iter().map(|w| w.to_string()).collect(),
            StopWordSource::File,
        )
    }

    #[test]
    fn test_counts_example_tickets() {
        let stream = TokenStream::from_values([Some("Help me please help"), Some("please help again")]);
        let table = FrequencyTable::count(&stream, &stop_words(&["me"]));

        assert_eq!(table.len(), 3);
        assert_eq!(table.get("help"), Some(3));
        assert_eq!(table.get("please"), Some(2));
        assert_eq!(table.get("again"), Some(1));
        assert_eq!(table.get("me"), None);
    }

    #[test]
    fn test_total_matches_non_stop_tokens() {
        let stream = TokenStream::from_values([
            Some("the printer is on fire"),
            Some("The printer is jammed again"),
            None,
        ]);
        let ignore = stop_words(&["the", "is", "on"]);
        let table = FrequencyTable::count(&stream, &ignore);

        let expected = stream.tokens().filter(|t| !ignore.contains(t)).count();
        assert_eq!(table.total(), expected);
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let stream = TokenStream::from_values([Some("a b c a d")]);
        let ignore = stop_words(&["a", "c"]);
        let first = FrequencyTable::count(&stream, &ignore);

        let survivors: Vec<&str> = first.word_counts.keys().map(String::as_str).collect();
        let again = TokenStream::from_values(survivors.iter().map(|w| Some(*w)));
        let second = FrequencyTable::count(&again, &ignore);
        assert_eq!(second.len(), first.len());
    }

    #[test]
    fn test_mixed_case_stop_words_do_not_match() {
        let stream = TokenStream::from_values([Some("Zendesk zendesk")]);
        let table = FrequencyTable::count(&stream, &stop_words(&["Zendesk"]));
        assert_eq!(table.get("zendesk"), Some(2));
    }

    #[test]
    fn test_ranked_ties_alphabetical() {
        let stream = TokenStream::from_values([Some("pear apple pear fig apple kiwi")]);
        let ranked = FrequencyTable::count(&stream, &stop_words(&[])).ranked();
        let words: Vec<&str> = ranked.iter().map(|e| e.word.as_str()).collect();
        assert_eq!(words, vec!["apple", "pear", "fig", "kiwi"]);
    }
}
