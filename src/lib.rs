pub mod args;
pub mod cloud;
pub mod pipeline;
pub mod report;
pub mod stats;
pub mod stopwords;
pub mod tickets;
pub mod tokens;
pub mod utils;

pub use args::Args;
pub use cloud::{CloudRenderer, RenderConfig, SpiralRenderer, WordCloud};
pub use pipeline::{run, Analysis, RunOutcome};
pub use report::Report;
pub use stats::FrequencyTable;
pub use stopwords::{merge_stop_word_files, StopWords};
