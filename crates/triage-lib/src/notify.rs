//! Report delivery
//!
//! Handles:
//! - Printing colour-coded report blocks to a console
//! - Emitting reports as structured log events
//! - Fanning each report out to every enabled notifier, in order

use std::io::Write;
use std::sync::Mutex;

use colored::Colorize;

use crate::error::{Result, TriageError};
use crate::observability::StructuredLogger;
use crate::settings::NotifierSettings;
use crate::summarizer::{IncidentReport, Severity};

/// Destination for rendered incident reports
pub trait Notifier: Send + Sync {
    fn notify(&self, report: &IncidentReport) -> Result<()>;

    /// Notifier name for logs
    fn name(&self) -> &'static str;
}

/// Prints report blocks, header coloured by severity
pub struct ConsoleNotifier<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleNotifier<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleNotifier<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Consume the notifier and return the writer
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Colour a severity-tagged line
pub fn colorize_severity(text: &str, severity: Severity) -> String {
    match severity {
        Severity::Critical => text.red().bold().to_string(),
        Severity::Warning => text.yellow().bold().to_string(),
        Severity::Info => text.blue().bold().to_string(),
    }
}

impl<W: Write + Send> Notifier for ConsoleNotifier<W> {
    fn notify(&self, report: &IncidentReport) -> Result<()> {
        let rendered = report.render();
        let (header, body) = rendered.split_once('\n').unwrap_or((rendered.as_str(), ""));

        let mut out = self
            .out
            .lock()
            .map_err(|_| TriageError::Notify("console writer lock poisoned".to_string()))?;
        writeln!(out, "{}", colorize_severity(header, report.severity))?;
        if !body.is_empty() {
            writeln!(out, "{}", body)?;
        }
        writeln!(out)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

/// Emits each report as a structured log event
pub struct LogNotifier {
    logger: StructuredLogger,
}

impl LogNotifier {
    pub fn new(logger: StructuredLogger) -> Self {
        Self { logger }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, report: &IncidentReport) -> Result<()> {
        self.logger.log_report(report);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Set of enabled notifiers
#[derive(Default)]
pub struct NotifierSet {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable notifiers from the settings flags
    pub fn from_settings(settings: &NotifierSettings, logger: &StructuredLogger) -> Self {
        let mut set = Self::new();
        if settings.print {
            set.add(Box::new(ConsoleNotifier::stdout()));
        }
        if settings.log {
            set.add(Box::new(LogNotifier::new(logger.clone())));
        }
        set
    }

    pub fn add(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    /// Deliver reports in order to every notifier.
    ///
    /// Stops at the first delivery failure.
    pub fn dispatch(&self, reports: &[IncidentReport]) -> Result<()> {
        for report in reports {
            for notifier in &self.notifiers {
                notifier.notify(report).map_err(|e| {
                    tracing::warn!(notifier = notifier.name(), error = %e, "Notification failed");
                    e
                })?;
            }
        }
        Ok(())
    }
}
