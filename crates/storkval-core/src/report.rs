//! Pure projection of `DisplayState` into display lines.
//!
//! Front ends decide how each `Tone` looks; this module has no I/O.

use crate::state::DisplayState;

const PLACEHOLDER: &str = "-";
const HEADER: &str = "=========User Data============";
const SEPARATOR: &str = "============================";

/// How a line or value should be emphasized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Good,
    Bad,
    Muted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
    Rule { text: &'static str },
    Field {
        label: &'static str,
        value: String,
        tone: Tone,
    },
}

impl ReportLine {
    fn field(label: &'static str, value: Option<String>, tone: Tone) -> Self {
        match value.filter(|v| !v.is_empty()) {
            Some(value) => ReportLine::Field { label, value, tone },
            None => ReportLine::Field {
                label,
                value: PLACEHOLDER.to_string(),
                tone: Tone::Muted,
            },
        }
    }

    /// Plain-text rendering of the line
    pub fn to_text(&self) -> String {
        match self {
            ReportLine::Rule { text } => text.to_string(),
            ReportLine::Field { label, value, .. } => format!("{} : {}", label, value),
        }
    }
}

pub struct StatusReport;

impl StatusReport {
    pub fn from_state(state: &DisplayState) -> Vec<ReportLine> {
        let stats = state.stats.as_ref();
        let outcome = state.outcome.as_ref();

        let status_tone = if state.status.is_error() {
            Tone::Bad
        } else {
            Tone::Muted
        };

        vec![
            ReportLine::Rule { text: HEADER },
            ReportLine::field("Email", stats.map(|s| s.email.clone()), Tone::Plain),
            ReportLine::field("ID", stats.map(|s| s.id.clone()), Tone::Plain),
            ReportLine::field("Valid", stats.map(|s| s.valid_count.to_string()), Tone::Good),
            ReportLine::field("Invalid", stats.map(|s| s.invalid_count.to_string()), Tone::Bad),
            ReportLine::Rule { text: SEPARATOR },
            ReportLine::field(
                "Validation Response",
                outcome.map(|o| o.response_message.clone()),
                Tone::Plain,
            ),
            ReportLine::field(
                "Last Verified At",
                stats.and_then(|s| s.last_verified_at.clone()),
                Tone::Plain,
            ),
            ReportLine::Rule { text: SEPARATOR },
            ReportLine::field("Status", Some(state.status.label()), status_tone),
            ReportLine::field(
                "Last Cycle",
                state
                    .last_cycle_at
                    .map(|t| t.format("%H:%M:%S UTC").to_string()),
                Tone::Muted,
            ),
            ReportLine::field(
                "Cycles",
                Some(format!(
                    "{} ok / {} failed",
                    state.cycles_succeeded, state.cycles_failed
                )),
                Tone::Muted,
            ),
        ]
    }

    /// The whole report as plain text, one line per entry
    pub fn to_text(state: &DisplayState) -> String {
        Self::from_state(state)
            .iter()
            .map(ReportLine::to_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
