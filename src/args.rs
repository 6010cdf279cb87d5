use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "support-wordcloud",
    about = "Create wordclouds and top word reports from Zendesk ticket CSV exports",
    version,
    long_about = None
)]
pub struct Args {
    /// Data file path
    #[arg(short, long, alias = "file_path", default_value = "data.csv")]
    pub file_path: PathBuf,

    /// File with words to ignore. Falls back to a built-in English list when missing
    #[arg(short, long, alias = "ignore_words", default_value = "ignore_words.txt")]
    pub ignore_words: PathBuf,

    /// First day of tickets to include (YYYY-MM-DD)
    #[arg(long, alias = "start_date", value_parser = parse_date)]
    pub start_date: Option<NaiveDate>,

    /// Last day of tickets to include (YYYY-MM-DD)
    #[arg(long, alias = "end_date", value_parser = parse_date)]
    pub end_date: Option<NaiveDate>,

    /// Column the wordcloud text is taken from
    #[arg(long, default_value = "Subject")]
    pub field: String,

    /// Column holding the ticket creation timestamp
    #[arg(long, alias = "date_column", default_value = "Created at")]
    pub date_column: String,

    /// Output base name. Writes <name>.png and <name>_report.txt
    #[arg(short, long)]
    pub output: Option<String>,

    /// Also write <name>.svg (requires --output)
    #[arg(long)]
    pub svg: bool,

    /// Open the wordcloud image even when writing output files
    #[arg(long, alias = "show_wordcloud")]
    pub show_wordcloud: bool,

    /// Print the top words report to the console
    #[arg(long, alias = "show_top_words")]
    pub show_top_words: bool,

    /// Print the ignored words to the console
    #[arg(long, alias = "show_ignore_words")]
    pub show_ignore_words: bool,

    /// Number of top words in the report
    #[arg(long, alias = "top_words", default_value_t = 20)]
    pub top_words: usize,

    /// TrueType/OpenType font used to draw words in the PNG
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// The image is shown whenever nothing is written to disk.
    pub fn should_display(&self) -> bool {
        self.show_wordcloud || self.output.is_none()
    }

    pub fn wants_report(&self) -> bool {
        self.output.is_some() || self.show_top_words
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{}': {}", value, e))
}
