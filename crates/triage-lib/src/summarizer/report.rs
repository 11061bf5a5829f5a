//! Incident reports and their text rendering

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::policy::{IncidentClass, Severity};
use super::signature::{AnomalySignature, FlaggedMetric};

/// Structured incident derived from one anomaly signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentReport {
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub class: IncidentClass,
    /// Flagged metrics with their observed values
    pub signature: Vec<FlaggedMetric>,
    pub cause: String,
    pub message: String,
    pub suggested_action: String,
    /// Set when the node produced repeated anomalies in the same run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_note: Option<String>,
}

impl IncidentReport {
    pub fn from_signature(signature: &AnomalySignature, class: IncidentClass) -> Self {
        Self {
            node_id: signature.node_id.clone(),
            timestamp: signature.timestamp,
            severity: class.severity(),
            class,
            signature: signature.flagged().cloned().collect(),
            cause: class.cause().to_string(),
            message: class.message(signature),
            suggested_action: class.suggested_action().to_string(),
            recurrence_note: None,
        }
    }

    pub fn with_recurrence_note(mut self, note: impl Into<String>) -> Self {
        self.recurrence_note = Some(note.into());
        self
    }

    /// Tag for colour coding (`CRITICAL`, `WARNING`, `INFO`)
    pub fn severity_tag(&self) -> &'static str {
        self.severity.tag()
    }

    /// Human-readable text block, ready for a console or UI
    pub fn render(&self) -> String {
        let metrics = self
            .signature
            .iter()
            .map(|f| format!("{}={:.2}", f.metric, f.observed_value))
            .collect::<Vec<_>>()
            .join(", ");

        let mut lines = vec![
            format!("[{}] {}: {}", self.severity_tag(), self.node_id, self.cause),
            self.message.clone(),
            format!("Suggested action: {}", self.suggested_action),
            format!(
                "• Time: {}",
                self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            format!("• Node: {}", self.node_id),
            format!("• Metrics: {}", metrics),
        ];
        if let Some(note) = &self.recurrence_note {
            lines.push(format!("Note: {}", note));
        }

        lines.join("\n")
    }
}

impl std::fmt::Display for IncidentReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}
