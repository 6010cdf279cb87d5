use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::error;

use support_wordcloud::{merge_stop_word_files, utils};

const PROJECT_IGNORE_FILE: &str = "ignore_words.txt";
const COMMON_IGNORE_FILE: &str = "common_ignore.txt";
const MERGED_IGNORE_FILE: &str = "my_full_ignore.txt";

#[derive(Parser, Debug)]
#[command(
    name = "merge-ignore-words",
    about = "Merge ignore_words.txt and common_ignore.txt into my_full_ignore.txt",
    version,
    long_about = None
)]
struct MergeArgs {}

fn main() -> Result<()> {
    let _args = MergeArgs::parse();
    utils::setup_logging(false);

    match merge_stop_word_files(
        Path::new(PROJECT_IGNORE_FILE),
        Path::new(COMMON_IGNORE_FILE),
        Path::new(MERGED_IGNORE_FILE),
    ) {
        Ok(count) => {
            println!("Wrote {} words to {}", count, MERGED_IGNORE_FILE);
            Ok(())
        }
        Err(e) => {
            error!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
