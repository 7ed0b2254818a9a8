//! Plain-text rendering for chat-style command replies.
use crate::service::{MutationReport, ReportRow};

const UNLOCKED_MARK: &str = "[\u{2705}] ";
const LOCKED_MARK: &str = "[\u{274C}] ";
const RESTRICTED_MARK: &str = "\u{26A0}\u{FE0F} ";

pub fn unavailable(resource: &str) -> String {
    format!("Can't retrieve achievements for {}", resource)
}

/// `Achievements for <resource>:` followed by one padded line per row.
pub fn render_report(resource: &str, rows: &[ReportRow]) -> String {
    if rows.is_empty() {
        return unavailable(resource);
    }
    let mut out = format!("Achievements for {}:", resource);
    for row in rows {
        out.push('\n');
        out.push_str(&format!("{:<5}", row.index));
        out.push_str(if row.unlocked { UNLOCKED_MARK } else { LOCKED_MARK });
        if row.restricted {
            out.push_str(RESTRICTED_MARK);
        }
        out.push_str(&row.name);
    }
    out
}

pub fn render_mutation(report: &MutationReport) -> String {
    let mut lines: Vec<String> = report.diagnostics.iter().map(|d| d.to_string()).collect();
    if !lines.is_empty() && !report.writes.is_empty() {
        lines.push("Trying to switch remaining achievements...".to_string());
    }
    lines.push(if report.success { "Success!" } else { "Failed!" }.to_string());
    lines.join("\n")
}
