//! Report rendering. Sinks receive one [`Section`] per completed step; nothing else in the
//! crate prints.

use crate::script::Outcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};

/// Logger target the report lines are written to.
pub const REPORT_TARGET: &str = "plp_bookstore::report";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub title: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportHeader {
    pub collection: String,
    pub steps: usize,
    pub started_at: DateTime<Utc>,
}

impl ReportHeader {
    #[must_use]
    pub fn new(collection: &str, steps: usize) -> Self {
        Self { collection: collection.to_string(), steps, started_at: Utc::now() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub steps: usize,
    pub elapsed_ms: u64,
}

pub trait ReportSink {
    /// # Errors
    /// Returns an error if the sink cannot write.
    fn begin(&mut self, header: &ReportHeader) -> io::Result<()>;

    /// `step` counts from 1.
    ///
    /// # Errors
    /// Returns an error if the sink cannot write.
    fn write_section(&mut self, step: usize, section: &Section) -> io::Result<()>;

    /// # Errors
    /// Returns an error if the sink cannot write.
    fn finish(&mut self, summary: &RunSummary) -> io::Result<()>;
}

fn pretty<T: Serialize>(value: &T) -> io::Result<String> {
    serde_json::to_string_pretty(value).map_err(io::Error::other)
}

fn pretty_all<T: Serialize>(items: &[T], lines: &mut Vec<String>) -> io::Result<()> {
    if items.is_empty() {
        lines.push("(no documents)".to_string());
    }
    for item in items {
        lines.push(pretty(item)?);
    }
    Ok(())
}

/// Human-readable body of one section.
///
/// # Errors
/// Returns an error if a value cannot be serialized.
pub fn render_outcome(outcome: &Outcome) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    match outcome {
        Outcome::Books(books) => pretty_all(books, &mut lines)?,
        Outcome::Updated { report, books } => {
            lines.push(format!("Matched: {}, modified: {}", report.matched, report.modified));
            lines.push("Update completed - checking updated book:".to_string());
            pretty_all(books, &mut lines)?;
        }
        Outcome::Deleted { report, remaining } => {
            lines.push(format!("Deleted: {}", report.deleted));
            lines.push(format!("Remaining books count: {remaining}"));
        }
        Outcome::Projection(rows) => pretty_all(rows, &mut lines)?,
        Outcome::GenreAverages(rows) => pretty_all(rows, &mut lines)?,
        Outcome::AuthorCounts(rows) => pretty_all(rows, &mut lines)?,
        Outcome::DecadeCounts(rows) => pretty_all(rows, &mut lines)?,
        Outcome::IndexesEnsured(acks) => {
            for ack in acks {
                let state = if ack.created { "created" } else { "already present" };
                lines.push(format!("Index {}: {state}", ack.name));
            }
        }
        Outcome::Indexes(indexes) => pretty_all(indexes, &mut lines)?,
        Outcome::Plan(plan) => {
            lines.push(format!("Execution time: {} ms", plan.execution_time_ms));
            lines.push(format!("Documents examined: {}", plan.total_docs_examined));
            lines.push(format!("Keys examined: {}", plan.total_keys_examined));
            lines.push(format!("Documents returned: {}", plan.n_returned));
            lines.push(format!("Index used: {}", plan.index_label()));
        }
        Outcome::Count(n) => lines.push(format!("Count: {n}")),
    }
    Ok(lines)
}

fn banner(header: &ReportHeader) -> [String; 2] {
    [
        "=== PLP BOOKSTORE QUERIES ===".to_string(),
        format!(
            "collection: {} | steps: {} | started: {}",
            header.collection,
            header.steps,
            header.started_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        ),
    ]
}

fn closing(summary: &RunSummary) -> String {
    format!("=== {} steps completed in {} ms ===", summary.steps, summary.elapsed_ms)
}

/// Plain text to any writer (stdout in the binary).
#[derive(Debug)]
pub struct ConsoleSink<W: Write> {
    out: W,
}

impl<W: Write> ConsoleSink<W> {
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for ConsoleSink<W> {
    fn begin(&mut self, header: &ReportHeader) -> io::Result<()> {
        for line in banner(header) {
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }

    fn write_section(&mut self, step: usize, section: &Section) -> io::Result<()> {
        writeln!(self.out, "\n{step}. {}:", section.title)?;
        for line in render_outcome(&section.outcome)? {
            writeln!(self.out, "{line}")?;
        }
        self.out.flush()
    }

    fn finish(&mut self, summary: &RunSummary) -> io::Result<()> {
        writeln!(self.out, "\n{}", closing(summary))?;
        self.out.flush()
    }
}

/// Report lines through `log` on [`REPORT_TARGET`]; the logging config decides where they go.
#[derive(Debug, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn begin(&mut self, header: &ReportHeader) -> io::Result<()> {
        for line in banner(header) {
            log::info!(target: REPORT_TARGET, "{line}");
        }
        Ok(())
    }

    fn write_section(&mut self, step: usize, section: &Section) -> io::Result<()> {
        log::info!(target: REPORT_TARGET, "{step}. {}:", section.title);
        for line in render_outcome(&section.outcome)? {
            log::info!(target: REPORT_TARGET, "{line}");
        }
        Ok(())
    }

    fn finish(&mut self, summary: &RunSummary) -> io::Result<()> {
        log::info!(target: REPORT_TARGET, "{}", closing(summary));
        Ok(())
    }
}

/// One JSON object per line: a header, each section, then the summary.
#[derive(Debug)]
pub struct NdjsonSink<W: Write> {
    out: W,
}

impl<W: Write> NdjsonSink<W> {
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, value: &serde_json::Value) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, value).map_err(io::Error::other)?;
        self.out.write_all(b"\n")
    }
}

impl<W: Write> ReportSink for NdjsonSink<W> {
    fn begin(&mut self, header: &ReportHeader) -> io::Result<()> {
        let v = serde_json::json!({ "header": header });
        self.line(&v)
    }

    fn write_section(&mut self, step: usize, section: &Section) -> io::Result<()> {
        let mut v = serde_json::to_value(&section.outcome).map_err(io::Error::other)?;
        if let serde_json::Value::Object(map) = &mut v {
            map.insert("step".into(), step.into());
            map.insert("title".into(), section.title.clone().into());
        }
        self.line(&v)
    }

    fn finish(&mut self, summary: &RunSummary) -> io::Result<()> {
        let v = serde_json::json!({ "summary": summary });
        self.line(&v)?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{ExplainReport, PlanStage};

    fn plan(index: Option<&str>) -> Outcome {
        Outcome::Plan(ExplainReport {
            stage: if index.is_some() { PlanStage::Ixscan } else { PlanStage::Collscan },
            index_name: index.map(str::to_string),
            execution_time_ms: 0,
            total_docs_examined: 12,
            total_keys_examined: 0,
            n_returned: 2,
        })
    }

    #[test]
    fn plan_lines_name_the_index_or_collscan() {
        let lines = render_outcome(&plan(None)).unwrap();
        assert!(lines.contains(&"Index used: COLLSCAN".to_string()));
        assert!(lines.contains(&"Documents examined: 12".to_string()));
        let lines = render_outcome(&plan(Some("title_1"))).unwrap();
        assert!(lines.contains(&"Index used: title_1".to_string()));
    }

    #[test]
    fn console_sink_writes_titled_blocks() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.begin(&ReportHeader::new("books", 1)).unwrap();
        sink.write_section(1, &Section { title: "Total".into(), outcome: Outcome::Count(12) })
            .unwrap();
        sink.finish(&RunSummary { steps: 1, elapsed_ms: 3 }).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text.starts_with("=== PLP BOOKSTORE QUERIES ==="));
        assert!(text.contains("\n1. Total:\nCount: 12\n"));
        assert!(text.trim_end().ends_with("=== 1 steps completed in 3 ms ==="));
    }

    #[test]
    fn ndjson_sink_emits_one_object_per_line() {
        let mut sink = NdjsonSink::new(Vec::new());
        sink.begin(&ReportHeader::new("books", 1)).unwrap();
        sink.write_section(1, &Section { title: "Total".into(), outcome: Outcome::Count(12) })
            .unwrap();
        sink.finish(&RunSummary { steps: 1, elapsed_ms: 0 }).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> =
            text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1]["kind"], "count");
        assert_eq!(lines[1]["data"], 12);
        assert_eq!(lines[1]["step"], 1);
        assert_eq!(lines[2]["summary"]["steps"], 1);
    }
}
