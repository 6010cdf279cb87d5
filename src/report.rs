use std::path::Path;

use crate::stats::{FrequencyTable, WordCount};
use crate::stopwords::StopWords;
use crate::tickets::DateRange;

const RULE_WIDTH: usize = 35;

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub word: String,
    pub count: usize,
    /// Mentions per hundred tickets, so it can exceed 100.
    pub percent: f64,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub source: String,
    pub field: String,
    pub range: DateRange,
    pub requested: usize,
    pub available: usize,
    pub rows: Vec<ReportRow>,
}

impl Report {
    pub fn build(
        table: &FrequencyTable,
        requested: usize,
        record_count: usize,
        source: &Path,
        field: &str,
        range: DateRange,
    ) -> Self {
        let available = table.len();
        let rows = table
            .ranked()
            .into_iter()
            .take(requested)
            .map(|WordCount { word, count }| ReportRow {
                percent: percent_of(count, record_count),
                word,
                count,
            })
            .collect();

        Report {
            source: source.display().to_string(),
            field: field.to_string(),
            range,
            requested,
            available,
            rows,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.requested > self.available
    }

    pub fn shown(&self) -> usize {
        self.rows.len()
    }

    pub fn warning(&self) -> Option<String> {
        self.is_truncated().then(|| {
            format!(
                "amount of top words to report ({}) is larger than total amount of words ({}). Showing all available words",
                self.requested, self.available
            )
        })
    }

    /// Header, column titles and one row per word, without a closing rule.
    pub fn render_table(&self) -> String {
        let rule = "-".repeat(RULE_WIDTH);
        let mut lines = vec![
            format!(
                "Wordcloud generated from file: {} for field: {} in tickets from {}",
                self.source, self.field, self.range
            ),
            String::new(),
            format!("Top {} words:", self.shown()),
            rule.clone(),
            format!("{:<20}{:<4}{:>8}", "Word", "Freq", "%"),
            rule,
        ];
        lines.extend(
            self.rows
                .iter()
                .map(|row| format!("{:<20}{:>4}{:>8.1}", row.word, row.count, row.percent)),
        );
        lines.join("\n")
    }

    /// Contents of `<name>_report.txt`.
    pub fn render_file(&self, stop_words: &StopWords) -> String {
        format!(
            "{}\n{}\n\nIgnored words:\n{}",
            self.render_table(),
            "-".repeat(RULE_WIDTH),
            stop_words.sorted().join("\n")
        )
    }
}

fn percent_of(count: usize, record_count: usize) -> f64 {
    if record_count == 0 {
        return 0.0;
    }
    count as f64 / record_count as f64 * 100.0
}
