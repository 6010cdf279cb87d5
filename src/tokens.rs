use tracing::info;

use crate::tickets::TicketTable;

/// Stand-in text for empty cells, so they still show up as a token.
pub const MISSING_VALUE: &str = "nan";

/// Lowercased words of one column across all tickets, space separated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStream(String);

impl TokenStream {
    pub fn from_values<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        let mut text = String::new();
        for value in values {
            let value = value.unwrap_or(MISSING_VALUE);
            let words: Vec<String> = value.split_whitespace().map(str::to_lowercase).collect();
            text.push_str(&words.join(" "));
            text.push(' ');
        }
        TokenStream(text)
    }

    pub fn from_tickets(table: &TicketTable, field: &str) -> Self {
        let stream = Self::from_values(table.records.iter().map(|record| record.field(field)));
        info!(
            action = "complete",
            component = "tokenizer",
            field = field,
            record_count = table.len(),
            token_count = stream.tokens().count(),
            "Built token stream"
        );
        stream
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.split_whitespace()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens().next().is_none()
    }
}
