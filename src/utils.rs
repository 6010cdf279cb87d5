use time::macros::format_description;
use tracing::warn;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr so stdout only carries reports. `RUST_LOG` overrides the
/// level picked from `verbose`.
pub fn setup_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(LocalTime::new(format_description!(
            "[hour]:[minute]:[second].[subsecond digits:3]"
        )))
        .with_writer(std::io::stderr)
        .init();
}

pub fn validate_args(args: &crate::args::Args) -> anyhow::Result<()> {
    if args.top_words == 0 {
        anyhow::bail!("--top-words must be greater than 0");
    }

    if args.svg && args.output.is_none() {
        warn!(
            action = "validate",
            component = "args",
            "--svg has no effect without --output"
        );
    }

    Ok(())
}
