use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use crate::cloud::CloudRenderer;
use crate::report::Report;
use crate::stats::FrequencyTable;
use crate::stopwords::{self, StopWords};
use crate::tickets::{self, DateRange};
use crate::tokens::TokenStream;
use crate::Args;

/// Filtered, tokenized view of one ticket export.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub range: DateRange,
    pub record_count: usize,
    pub stop_words: StopWords,
    pub tokens: TokenStream,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub analysis: Analysis,
    pub report: Option<Report>,
    pub png: Vec<u8>,
    pub written: Vec<PathBuf>,
}

impl RunOutcome {
    pub fn png_path(&self) -> Option<&Path> {
        self.written
            .iter()
            .find(|path| path.extension().is_some_and(|ext| ext == "png"))
            .map(PathBuf::as_path)
    }
}

pub fn analyze(args: &Args) -> Result<Analysis> {
    let table = tickets::load_tickets(&args.file_path, &args.date_column)?;
    let available = table
        .available_range()
        .context("Data file contains no tickets")?;

    let range = tickets::resolve_date_range(args.start_date, args.end_date, available)?;
    let table = if args.start_date.is_some() || args.end_date.is_some() {
        table.filter_by_range(&range)
    } else {
        table
    };

    if !table.has_column(&args.field) {
        anyhow::bail!(
            "Field '{}' not found in {:?}. Available columns: {}",
            args.field,
            args.file_path,
            table.headers.join(", ")
        );
    }

    let tokens = TokenStream::from_tickets(&table, &args.field);
    let stop_words = stopwords::load_stop_words(&args.ignore_words)?;

    Ok(Analysis {
        range,
        record_count: table.len(),
        stop_words,
        tokens,
    })
}

pub fn build_report(args: &Args, analysis: &Analysis) -> Report {
    let table = FrequencyTable::count(&analysis.tokens, &analysis.stop_words);
    let report = Report::build(
        &table,
        args.top_words,
        analysis.record_count,
        &args.file_path,
        &args.field,
        analysis.range,
    );
    if let Some(message) = report.warning() {
        warn!(action = "truncate", component = "report", requested = report.requested, available = report.available, "{}", message);
    }
    report
}

/// Runs the whole pipeline, echoing the requested listings to `console`.
/// Outputs are staged next to their targets and only renamed into place once
/// every one of them has been written.
pub fn run(args: &Args, renderer: &dyn CloudRenderer, console: &mut dyn Write) -> Result<RunOutcome> {
    let total_start_time = Instant::now();
    info!(action = "start", component = "pipeline", file_path = ?args.file_path, field = %args.field, "Starting wordcloud pipeline");

    let analysis = analyze(args)?;
    if args.show_ignore_words {
        print_ignore_words(console, &analysis.stop_words)?;
    }

    let cloud = renderer.render(analysis.tokens.as_str(), &analysis.stop_words)?;
    let png = cloud.to_png()?;
    let svg = (args.output.is_some() && args.svg).then(|| cloud.to_svg());
    let report = args.wants_report().then(|| build_report(args, &analysis));

    if args.show_top_words {
        if let Some(report) = &report {
            print_top_words(console, report)?;
        }
    }

    let mut written = Vec::new();
    if let Some(name) = &args.output {
        let report_text = report
            .as_ref()
            .map(|report| report.render_file(&analysis.stop_words));

        let mut outputs: Vec<(PathBuf, &[u8])> = vec![(PathBuf::from(format!("{}.png", name)), png.as_slice())];
        if let Some(svg) = &svg {
            outputs.push((PathBuf::from(format!("{}.svg", name)), svg.as_bytes()));
        }
        if let Some(text) = &report_text {
            outputs.push((PathBuf::from(format!("{}_report.txt", name)), text.as_bytes()));
        }
        written = commit_outputs(&outputs)?;
    }

    info!(
        action = "complete",
        component = "pipeline",
        files_written = written.len(),
        duration_ms = total_start_time.elapsed().as_millis(),
        "Wordcloud pipeline completed"
    );

    Ok(RunOutcome {
        analysis,
        report,
        png,
        written,
    })
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_owned();
    staged.push(".tmp");
    PathBuf::from(staged)
}

/// Writes every output or none of them.
fn commit_outputs(outputs: &[(PathBuf, &[u8])]) -> Result<Vec<PathBuf>> {
    let mut staged: Vec<PathBuf> = Vec::new();
    for (path, contents) in outputs {
        let staging = staging_path(path);
        if let Err(e) = write_output(&staging, contents) {
            discard(&staged);
            return Err(e);
        }
        staged.push(staging);
    }

    let mut committed: Vec<PathBuf> = Vec::new();
    for (index, (path, _)) in outputs.iter().enumerate() {
        let result = fs::rename(&staged[index], path)
            .with_context(|| format!("Failed to write {:?}", path));
        if let Err(e) = result {
            discard(&staged[index..]);
            discard(&committed);
            return Err(e);
        }
        info!(action = "commit", component = "output", file_path = ?path, "Moved output into place");
        committed.push(path.clone());
    }
    Ok(committed)
}

fn discard(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            warn!(action = "cleanup", component = "output", file_path = ?path, error = %e, "Failed to remove partial output");
        }
    }
}

fn write_output(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))?;
    info!(action = "write", component = "output", file_path = ?path, bytes = contents.len(), "Wrote output file");
    Ok(())
}

pub fn print_ignore_words(console: &mut dyn Write, stop_words: &StopWords) -> Result<()> {
    writeln!(console, "Ignored words:")?;
    writeln!(console, "{}", stop_words.sorted().join("\n"))?;
    Ok(())
}

pub fn print_top_words(console: &mut dyn Write, report: &Report) -> Result<()> {
    writeln!(console, "{}", report.render_table())?;
    Ok(())
}

/// Opens the PNG in the system viewer. Without an output name the image is
/// written to the temp directory first.
pub fn display_wordcloud(outcome: &RunOutcome) -> Result<()> {
    let path = match outcome.png_path() {
        Some(path) => path.to_path_buf(),
        None => {
            let path = std::env::temp_dir().join(format!("support-wordcloud-{}.png", std::process::id()));
            write_output(&path, &outcome.png)?;
            path
        }
    };

    if let Err(e) = open::that(&path) {
        warn!(action = "display", component = "viewer", file_path = ?path, error = %e, "Failed to open wordcloud viewer");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{RenderConfig, SpiralRenderer, WordCloud};
    use clap::Parser;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "support-wordcloud-pipeline-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_fixture(dir: &Path) -> (PathBuf, PathBuf) {
        let data = dir.join("data.csv");
        fs::write(
            &data,
            "Created at,Subject\n\
             2024-01-01 09:00:00,Help me please help\n\
             2024-01-02 17:45:00,please help again\n\
             2024-03-01 08:00:00,Refund request\n",
        )
        .unwrap();
        let ignore = dir.join("ignore_words.txt");
        fs::write(&ignore, "me\n").unwrap();
        (data, ignore)
    }

    fn args_for(dir: &Path, extra: &[&str]) -> Args {
        let (data, ignore) = write_fixture(dir);
        let mut argv = vec![
            "support-wordcloud".to_string(),
            "-f".to_string(),
            data.display().to_string(),
            "-i".to_string(),
            ignore.display().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        Args::parse_from(argv)
    }

    fn renderer() -> SpiralRenderer {
        SpiralRenderer::new(RenderConfig::default()).unwrap()
    }

    #[test]
    fn test_analyze_filters_to_requested_range() {
        let dir = scratch_dir("analyze");
        let args = args_for(&dir, &["--end-date", "2024-01-02"]);
        let analysis = analyze(&args).unwrap();

        assert_eq!(analysis.record_count, 2);
        assert_eq!(analysis.range.to_string(), "2024-01-01 to 2024-01-02");
        assert_eq!(analysis.tokens.as_str(), "help me please help please help again ");
    }

    #[test]
    fn test_end_to_end_report() {
        let dir = scratch_dir("end-to-end");
        let output = dir.join("cloud").display().to_string();
        let args = args_for(
            &dir,
            &["--end-date", "2024-01-02", "--top-words", "2", "-o", output.as_str(), "--svg"],
        );

        let outcome = run(&args, &renderer(), &mut Vec::<u8>::new()).unwrap();
        let report = outcome.report.as_ref().unwrap();
        assert_eq!(report.rows.len(), 2);
        assert_eq!((report.rows[0].word.as_str(), report.rows[0].count), ("help", 3));
        assert_eq!(report.rows[0].percent, 150.0);
        assert_eq!((report.rows[1].word.as_str(), report.rows[1].count), ("please", 2));
        assert_eq!(report.rows[1].percent, 100.0);

        assert_eq!(outcome.written.len(), 3);
        assert!(dir.join("cloud.png").exists());
        assert!(dir.join("cloud.svg").exists());
        let text = fs::read_to_string(dir.join("cloud_report.txt")).unwrap();
        assert!(text.starts_with("Wordcloud generated from file: "));
        assert!(text.contains("for field: Subject in tickets from 2024-01-01 to 2024-01-02"));
        assert!(text.contains("\nTop 2 words:\n"));
        assert!(text.ends_with("\nIgnored words:\nme"));
        assert_eq!(outcome.png_path(), Some(dir.join("cloud.png").as_path()));
    }

    #[test]
    fn test_inverted_range_writes_nothing() {
        let dir = scratch_dir("inverted");
        let output = dir.join("cloud").display().to_string();
        let args = args_for(
            &dir,
            &["--start-date", "2024-02-01", "--end-date", "2024-01-01", "-o", output.as_str()],
        );

        let err = run(&args, &renderer(), &mut Vec::<u8>::new()).unwrap_err().to_string();
        for date in ["2024-02-01", "2024-01-01", "2024-03-01"] {
            assert!(err.contains(date), "missing {} in {}", date, err);
        }
        assert!(!dir.join("cloud.png").exists());
        assert!(!dir.join("cloud_report.txt").exists());
    }

    #[test]
    fn test_missing_field_is_fatal() {
        let dir = scratch_dir("field");
        let args = args_for(&dir, &["--field", "Description"]);
        let err = analyze(&args).unwrap_err().to_string();
        assert!(err.contains("Description"));
        assert!(err.contains("Created at, Subject"));
    }

    #[test]
    fn test_top_words_larger_than_available() {
        let dir = scratch_dir("truncate");
        let args = args_for(&dir, &["--show-top-words"]);
        let outcome = run(&args, &renderer(), &mut Vec::<u8>::new()).unwrap();

        let report = outcome.report.unwrap();
        assert!(report.warning().is_some());
        // help, please, again, refund, request
        assert_eq!(report.rows.len(), 5);
        assert!(outcome.written.is_empty());
    }

    #[test]
    fn test_no_report_without_output_or_flag() {
        let dir = scratch_dir("no-report");
        let args = args_for(&dir, &[]);
        let outcome = run(&args, &renderer(), &mut Vec::<u8>::new()).unwrap();
        assert!(outcome.report.is_none());
        assert!(outcome.written.is_empty());
        assert!(!outcome.png.is_empty());
        assert!(outcome.png_path().is_none());
    }

    struct BrokenRenderer;

    impl CloudRenderer for BrokenRenderer {
        fn render(&self, _text: &str, _stop_words: &StopWords) -> Result<WordCloud> {
            anyhow::bail!("renderer unavailable")
        }
    }

    #[test]
    fn test_failed_report_write_removes_other_outputs() {
        let dir = scratch_dir("partial");
        let output = dir.join("cloud").display().to_string();
        fs::create_dir_all(dir.join("cloud_report.txt")).unwrap();
        let args = args_for(&dir, &["-o", output.as_str(), "--svg"]);

        let err = run(&args, &renderer(), &mut Vec::<u8>::new()).unwrap_err();
        assert!(err.to_string().contains("cloud_report.txt"));
        assert!(!dir.join("cloud.png").exists());
        assert!(!dir.join("cloud.svg").exists());

        let mut leftovers: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        leftovers.sort();
        assert_eq!(leftovers, vec!["cloud_report.txt", "data.csv", "ignore_words.txt"]);
    }

    #[test]
    fn test_ignore_words_echoed_before_rendering() {
        let dir = scratch_dir("echo");
        let args = args_for(&dir, &["--show-ignore-words"]);
        let mut console = Vec::<u8>::new();

        let err = run(&args, &BrokenRenderer, &mut console).unwrap_err();
        assert!(err.to_string().contains("renderer unavailable"));
        assert_eq!(String::from_utf8(console).unwrap(), "Ignored words:\nme\n");
    }

    #[test]
    fn test_top_words_echoed_to_console() {
        let dir = scratch_dir("echo-top");
        let args = args_for(&dir, &["--show-top-words", "--top-words", "1"]);
        let mut console = Vec::<u8>::new();

        run(&args, &renderer(), &mut console).unwrap();
        let text = String::from_utf8(console).unwrap();
        assert!(text.contains("\nTop 1 words:\n"));
        assert!(text.ends_with("help                   3   100.0\n"));
    }
}
