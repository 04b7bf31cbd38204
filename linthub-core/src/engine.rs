//! Analysis engine invocation.
//!
//! The engine is an external Checkstyle-compatible command. It receives
//! the rendered rule configuration and the selected files, and produces
//! an XML report on stdout. The report is authoritative: a non-zero exit
//! with a readable report just means violations were found.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use linthub_model::{Finding, Severity};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tokio::process::Command;
use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::fetch::FetchedTree;
use crate::relativize::display_path;

#[async_trait]
pub trait RuleEngine: Send + Sync {
    /// Run the configured rules over the fetched tree. Finding paths are
    /// already in display form, relative to the tree root where possible.
    async fn analyze(
        &self,
        config_xml: &str,
        tree: &FetchedTree,
    ) -> Result<Vec<Finding>>;
}

/// Adapter over the Checkstyle command line.
#[derive(Debug, Clone)]
pub struct CheckstyleEngine {
    command: String,
    extra_args: Vec<String>,
}

impl CheckstyleEngine {
    pub fn new(command: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            extra_args,
        }
    }
}

#[async_trait]
impl RuleEngine for CheckstyleEngine {
    async fn analyze(
        &self,
        config_xml: &str,
        tree: &FetchedTree,
    ) -> Result<Vec<Finding>> {
        let config_file = tempfile::Builder::new()
            .prefix("rules-")
            .suffix(".xml")
            .tempfile()
            .map_err(|e| {
                AnalysisError::Engine(format!(
                    "failed to stage rule configuration: {e}"
                ))
            })?;
        std::fs::write(config_file.path(), config_xml).map_err(|e| {
            AnalysisError::Engine(format!(
                "failed to stage rule configuration: {e}"
            ))
        })?;

        let output = Command::new(&self.command)
            .args(&self.extra_args)
            .arg("-c")
            .arg(config_file.path())
            .arg("-f")
            .arg("xml")
            .args(&tree.files)
            .output()
            .await
            .map_err(|e| {
                AnalysisError::Engine(format!(
                    "failed to run {}: {e}",
                    self.command
                ))
            })?;

        let report = String::from_utf8_lossy(&output.stdout);
        debug!(
            status = %output.status,
            report_bytes = report.len(),
            "engine finished"
        );

        match parse_report(&report) {
            Ok(violations) => Ok(violations
                .into_iter()
                .map(|violation| to_finding(&tree.root, violation))
                .collect()),
            // An unreadable report from a failed run means the engine
            // itself broke; surface its stderr instead of the parse noise.
            Err(parse_err) if output.status.success() => Err(parse_err),
            Err(_) => Err(AnalysisError::Engine(engine_failure(&output))),
        }
    }
}

fn engine_failure(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("engine exited with {}", output.status))
}

#[derive(Debug)]
struct RawViolation {
    file: PathBuf,
    line: u32,
    severity: Severity,
    message: String,
}

fn to_finding(root: &Path, violation: RawViolation) -> Finding {
    Finding {
        file_path: display_path(root, &violation.file),
        line: violation.line,
        severity: violation.severity,
        message: violation.message,
    }
}

/// Extract violations from a Checkstyle XML report.
///
/// `<error>` elements outside a `<file>` (Checkstyle emits those for
/// configuration-level problems) and `ignore`-severity entries are
/// dropped. Anything that is not a complete report document is an error.
fn parse_report(report: &str) -> Result<Vec<RawViolation>> {
    let mut reader = Reader::from_str(report);
    reader.config_mut().check_end_names = true;

    let mut violations = Vec::new();
    let mut saw_root = false;
    let mut current_file: Option<PathBuf> = None;
    let mut open_files = 0usize;

    loop {
        match reader.read_event().map_err(report_error)? {
            Event::Start(e) | Event::Empty(e)
                if e.local_name().as_ref() == b"checkstyle" =>
            {
                saw_root = true;
            }
            Event::Start(e) if e.local_name().as_ref() == b"file" => {
                current_file =
                    attribute(&e, "name")?.map(PathBuf::from);
                open_files += 1;
            }
            Event::Start(e) | Event::Empty(e)
                if e.local_name().as_ref() == b"error" =>
            {
                let Some(file) = current_file.clone() else {
                    continue;
                };
                if let Some(violation) = read_violation(&e, file)? {
                    violations.push(violation);
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"file" => {
                current_file = None;
                open_files = open_files.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(AnalysisError::Engine(
            "engine produced no report".to_string(),
        ));
    }
    if open_files > 0 {
        return Err(AnalysisError::Engine(
            "engine report was truncated".to_string(),
        ));
    }

    Ok(violations)
}

fn read_violation(
    element: &BytesStart<'_>,
    file: PathBuf,
) -> Result<Option<RawViolation>> {
    let severity = match attribute(element, "severity")? {
        Some(raw) if raw == "ignore" => return Ok(None),
        Some(raw) => Severity::parse(&raw).unwrap_or(Severity::Warning),
        None => Severity::Warning,
    };
    let line = attribute(element, "line")?
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(0);
    let message = attribute(element, "message")?.unwrap_or_default();

    Ok(Some(RawViolation {
        file,
        line,
        severity,
        message,
    }))
}

fn attribute(
    element: &BytesStart<'_>,
    name: &str,
) -> Result<Option<String>> {
    let Some(attr) =
        element.try_get_attribute(name).map_err(report_error)?
    else {
        return Ok(None);
    };
    let value = attr.unescape_value().map_err(report_error)?;
    Ok(Some(value.into_owned()))
}

fn report_error<E: std::fmt::Display>(e: E) -> AnalysisError {
    AnalysisError::Engine(format!("unreadable analysis report: {e}"))
}
