use serde::Serialize;
use std::io::{self, Write};

use crate::migrator::MigrationResult;
use crate::theme::Theme;

const COLOR_RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

pub struct ReportOptions {
    pub format: ReportFormat,
    pub use_color: bool,
    pub theme: Theme,
}

/// Totals over a run's results
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub planned: usize,
}

impl RunSummary {
    pub fn from_results(results: &[MigrationResult]) -> Self {
        let mut summary = RunSummary {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            if result.is_planned() {
                summary.planned += 1;
            } else if result.success() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
        }
        summary
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    results: &'a [MigrationResult],
    summary: RunSummary,
}

pub fn write_report<W: Write>(
    writer: &mut W,
    results: &[MigrationResult],
    options: &ReportOptions,
) -> io::Result<()> {
    let summary = RunSummary::from_results(results);

    match options.format {
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, &JsonReport { results, summary })?;
            writeln!(writer)?;
        }
        ReportFormat::Text => {
            for result in results {
                write_result_line(writer, result, options)?;
            }
            write_summary_line(writer, &summary, options)?;
        }
    }

    writer.flush()
}

fn write_result_line<W: Write>(
    writer: &mut W,
    result: &MigrationResult,
    options: &ReportOptions,
) -> io::Result<()> {
    let (label, color) = if result.is_planned() {
        ("plan", &options.theme.planned)
    } else if result.success() {
        ("ok  ", &options.theme.success)
    } else {
        ("FAIL", &options.theme.failure)
    };

    let detail = match (result.oci_image_path(), result.error_message()) {
        (Some(oci), _) => format!("-> {}", oci.display()),
        (None, Some(message)) => message.to_string(),
        (None, None) => String::new(),
    };

    let file = result.singularity_file().display();
    if options.use_color {
        writeln!(
            writer,
            "{}{}{} {}{}{} {}",
            color, label, COLOR_RESET, options.theme.path, file, COLOR_RESET, detail
        )
    } else {
        writeln!(writer, "{} {} {}", label, file, detail)
    }
}

fn write_summary_line<W: Write>(
    writer: &mut W,
    summary: &RunSummary,
    options: &ReportOptions,
) -> io::Result<()> {
    let mut line = format!(
        "{} processed: {} migrated, {} failed",
        summary.total, summary.succeeded, summary.failed
    );
    if summary.planned > 0 {
        line.push_str(&format!(", {} planned", summary.planned));
    }

    if options.use_color {
        writeln!(writer, "{}{}{}", options.theme.summary, line, COLOR_RESET)
    } else {
        writeln!(writer, "{}", line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results() -> Vec<MigrationResult> {
        vec![
            MigrationResult::succeeded(
                "images/bids/Singularity.bids-validator--1.2.3".into(),
                "images-oci/bids/bids-validator--1.2.3.oci".into(),
                "images-oci/bids/bids-validator--1.2.3.sif".into(),
            ),
            MigrationResult::failed(
                "images/nipreps/Singularity.fmriprep--20.2.0".into(),
                "pull denied",
            ),
        ]
    }

    fn options(format: ReportFormat) -> ReportOptions {
        ReportOptions {
            format,
            use_color: false,
            theme: Theme::default(),
        }
    }

    #[test]
    fn test_summary_counts() {
        let mut all = results();
        all.push(MigrationResult::planned("a".into(), "a.oci".into(), "a.sif".into()));

        let summary = RunSummary::from_results(&all);
        assert_eq!(
            summary,
            RunSummary {
                total: 3,
                succeeded: 1,
                failed: 1,
                planned: 1
            }
        );
    }

    #[test]
    fn test_text_report() {
        let mut out = Vec::new();
        write_report(&mut out, &results(), &options(ReportFormat::Text)).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            concat!(
                "ok   images/bids/Singularity.bids-validator--1.2.3",
                " -> images-oci/bids/bids-validator--1.2.3.oci"
            )
        );
        assert_eq!(lines[1], "FAIL images/nipreps/Singularity.fmriprep--20.2.0 pull denied");
        assert_eq!(lines[2], "2 processed: 1 migrated, 1 failed");
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn test_colored_report_uses_theme() {
        let mut out = Vec::new();
        let mut opts = options(ReportFormat::Text);
        opts.use_color = true;
        write_report(&mut out, &results(), &opts).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains(&opts.theme.failure));
        assert!(text.contains(COLOR_RESET));
    }

    #[test]
    fn test_json_report() {
        let mut out = Vec::new();
        write_report(&mut out, &results(), &options(ReportFormat::Json)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["summary"]["total"], 2);
        assert_eq!(value["results"][0]["success"], true);
        assert_eq!(value["results"][1]["error_message"], "pull denied");
        assert!(value["results"][1]["oci_image_path"].is_null());
    }
}
