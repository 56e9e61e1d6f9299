//! JUnit-XML and JSON report artifacts.
//!
//! Each artifact is written to a temporary file in the destination directory
//! and renamed into place, so a report file is either complete or absent.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::ReportWriteError;
use crate::obs::emit_report_written;
use crate::report::{Outcome, RuleResult, RunReport};

/// Paths written by [`Reporter::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReports {
    pub junit: PathBuf,
    pub json: PathBuf,
}

/// Serializes a [`RunReport`] into its persisted artifacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter;

impl Reporter {
    /// Write the JUnit report to `junit_path` and the JSON report to `json_path`.
    pub fn write(
        &self,
        report: &RunReport,
        junit_path: &Path,
        json_path: &Path,
    ) -> Result<WrittenReports, ReportWriteError> {
        write_atomic(junit_path, render_junit(report).as_bytes())?;
        emit_report_written("junit", junit_path);

        write_atomic(json_path, render_json(report)?.as_bytes())?;
        emit_report_written("json", json_path);

        Ok(WrittenReports {
            junit: junit_path.to_path_buf(),
            json: json_path.to_path_buf(),
        })
    }

    /// Read back a JSON report written by [`Reporter::write`].
    pub fn read_json(&self, path: &Path) -> Result<Vec<RuleResult>, ReportWriteError> {
        let content = fs::read_to_string(path).map_err(|source| ReportWriteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Render the JSON artifact: an array of rule results in report order.
pub fn render_json(report: &RunReport) -> Result<String, ReportWriteError> {
    Ok(serde_json::to_string_pretty(&report.results)?)
}

/// Render a JUnit test-suite document with one `testcase` per rule.
pub fn render_junit(report: &RunReport) -> String {
    let tests = report.results.len();
    let failures = report.count(Outcome::Failure);
    let skipped = report.count(Outcome::Skipped);
    let suite_name = format!("{}.{}", report.catalog, report.category);

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!(
        "<testsuites tests=\"{}\" failures=\"{}\" errors=\"0\" skipped=\"{}\" time=\"{:.3}\">\n",
        tests,
        failures,
        skipped,
        report.total_duration_secs()
    ));
    out.push_str(&format!(
        "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"0\" skipped=\"{}\" time=\"{:.3}\" timestamp=\"{}\">\n",
        xml_escape(&suite_name),
        tests,
        failures,
        skipped,
        report.total_duration_secs(),
        report.started_at.format("%Y-%m-%dT%H:%M:%S")
    ));

    for result in &report.results {
        out.push_str(&format!(
            "    <testcase classname=\"{}\" name=\"{}\" time=\"{:.3}\"",
            xml_escape(&format!("{}.{}", result.catalog, result.category)),
            xml_escape(&result.rule_name),
            result.duration_ms as f64 / 1000.0
        ));
        match result.outcome {
            Outcome::Success => out.push_str("/>\n"),
            Outcome::Skipped => {
                out.push_str(">\n");
                out.push_str("      <skipped message=\"dry-run: action not executed\"/>\n");
                out.push_str("    </testcase>\n");
            }
            Outcome::Failure => {
                let detail = result.error.as_deref().unwrap_or("rule failed");
                out.push_str(">\n");
                out.push_str(&format!(
                    "      <failure message=\"{}\">{}</failure>\n",
                    xml_escape(first_line(detail)),
                    xml_escape(detail)
                ));
                out.push_str("    </testcase>\n");
            }
        }
    }

    out.push_str("  </testsuite>\n");
    out.push_str("</testsuites>\n");
    out
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or(s)
}

/// Escape markup and replace characters XML 1.0 cannot carry, such as the
/// ANSI colour escapes in captured stderr, with U+FFFD.
fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if is_xml_char(c) => out.push(c),
            _ => out.push(char::REPLACEMENT_CHARACTER),
        }
    }
    out
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r')
        || ('\u{20}'..='\u{D7FF}').contains(&c)
        || ('\u{E000}'..='\u{FFFD}').contains(&c)
        || c >= '\u{10000}'
}

/// Write `data` to `path` via a temporary sibling file and a rename.
fn write_atomic(path: &Path, data: &[u8]) -> Result<(), ReportWriteError> {
    let io_err = |source: std::io::Error| ReportWriteError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
    tmp.write_all(data).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
