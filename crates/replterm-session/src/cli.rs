//! Command line for `replterm-replay`.

use std::path::{Path, PathBuf};

use clap::Parser;
use replterm_core::{OutboundFrame, TerminalConfig};

use crate::error::ReplayError;
use crate::logging::{self, LogFormat};
use crate::replay::{ReplayReport, load_trace, replay};

#[derive(Debug, Parser)]
#[command(
    name = "replterm-replay",
    about = "Replay a recorded terminal session trace and print the result",
    version
)]
pub struct Cli {
    /// JSONL trace to replay.
    pub trace: PathBuf,

    /// Terminal config, TOML or `.json`.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

pub fn run_from_env() -> Result<(), ReplayError> {
    let cli = Cli::parse();
    logging::init(cli.log_format);
    run(&cli)
}

pub fn run(cli: &Cli) -> Result<(), ReplayError> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TerminalConfig::default(),
    };
    let records = load_trace(&cli.trace)?;
    tracing::info!(
        target: "replterm.session",
        trace = %cli.trace.display(),
        records = records.len(),
        "replaying trace"
    );
    let report = replay(config, &records);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_report(&report));
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<TerminalConfig, ReplayError> {
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let config = if is_json {
        TerminalConfig::from_json_file(path)?
    } else {
        TerminalConfig::from_toml_file(path)?
    };
    Ok(config)
}

/// Human-readable report.
#[must_use]
pub fn format_report(report: &ReplayReport) -> String {
    let mut out = String::new();
    out.push_str("── transcript ──\n");
    out.push_str(&report.transcript);
    if !report.transcript.ends_with('\n') {
        out.push('\n');
    }
    if !report.cmd.is_empty() {
        out.push_str(&format!("── pending command ──\n{}\n", report.cmd));
    }
    out.push_str("── sent ──\n");
    for frame in &report.frames {
        match frame {
            OutboundFrame::Command(line) => out.push_str(&format!("command {line:?}\n")),
            OutboundFrame::Interrupt => out.push_str("interrupt\n"),
        }
    }
    for event in &report.events {
        out.push_str(&format!("event {event}\n"));
    }
    for error in &report.errors {
        out.push_str(&format!("error {error}\n"));
    }
    out.push_str(&format!(
        "flushes={} dropped={} scroll_top={}\n",
        report.flushes, report.dropped_batches, report.scroll_top
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "replterm-replay",
            "trace.jsonl",
            "--json",
            "--log-format",
            "json",
        ])
        .expect("parse");
        assert_eq!(cli.trace, PathBuf::from("trace.jsonl"));
        assert!(cli.json);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(cli.config.is_none());
    }

    #[test]
    fn run_reports_missing_trace() {
        let cli = Cli {
            trace: PathBuf::from("/nonexistent/trace.jsonl"),
            config: None,
            json: false,
            log_format: LogFormat::Text,
        };
        let err = run(&cli).expect_err("missing");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn run_with_json_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let trace = dir.path().join("trace.jsonl");
        std::fs::write(&trace, "{\"at_ms\": 0, \"kind\": \"text\", \"data\": \"hi\"}\n")
            .expect("write trace");
        let config = dir.path().join("replterm.json");
        let mut file = std::fs::File::create(&config).expect("create config");
        writeln!(file, "{{\"flush_delay_ms\": 10}}").expect("write config");

        let cli = Cli {
            trace,
            config: Some(config),
            json: true,
            log_format: LogFormat::Text,
        };
        assert!(run(&cli).is_ok());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("replterm.toml");
        std::fs::write(&config, "rows = 0\n").expect("write config");
        let err = load_config(&config).expect_err("invalid");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn text_report_lists_frames() {
        let report = ReplayReport {
            transcript: "$ ls\n".into(),
            cmd: String::new(),
            history: vec!["ls".into()],
            frames: vec![OutboundFrame::Command("ls\n".into()), OutboundFrame::Interrupt],
            events: vec!["RunFinished(Completed)".into()],
            errors: Vec::new(),
            scroll_top: 0.0,
            flushes: 1,
            dropped_batches: 0,
        };
        let text = format_report(&report);
        assert!(text.contains("command \"ls\\n\"\n"));
        assert!(text.contains("interrupt\n"));
        assert!(text.contains("event RunFinished(Completed)\n"));
        assert!(text.contains("flushes=1 dropped=0"));
    }
}
