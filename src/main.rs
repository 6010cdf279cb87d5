use anyhow::Result;
use clap::Parser;
use std::io;
use tracing::error;

use support_wordcloud::cloud::{RenderConfig, SpiralRenderer};
use support_wordcloud::{pipeline, utils, Args, RunOutcome};

fn execute(args: &Args) -> Result<RunOutcome> {
    let config = RenderConfig::default();
    let renderer = match &args.font {
        Some(path) => SpiralRenderer::with_font_file(config, path)?,
        None => SpiralRenderer::new(config)?,
    };

    let outcome = pipeline::run(args, &renderer, &mut io::stdout())?;

    if args.should_display() {
        pipeline::display_wordcloud(&outcome)?;
    }

    Ok(outcome)
}

fn main() -> Result<()> {
    let args = Args::parse();
    utils::setup_logging(args.verbose);
    utils::validate_args(&args)?;

    match execute(&args) {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
