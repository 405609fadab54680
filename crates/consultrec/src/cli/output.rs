//! Text rendering for CLI output.

use std::fmt::Write as _;

use crate::error::Result;
use crate::record::ConsultationRecord;
use crate::store::StoreStats;

use super::OutputFormat;

/// Render a creation instant for display, or `-` when out of range.
#[must_use]
pub fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d %H:%M UTC").to_string())
}

/// Human-readable byte count.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    if bytes >= MIB {
        format!("{}.{} MiB", bytes / MIB, (bytes % MIB) * 10 / MIB)
    } else if bytes >= KIB {
        format!("{}.{} KiB", bytes / KIB, (bytes % KIB) * 10 / KIB)
    } else {
        format!("{bytes} B")
    }
}

/// Cut `text` to at most `max` characters, marking the cut with `…`.
fn truncate(text: &str, max: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max {
        return single_line;
    }
    let kept: String = single_line.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}

/// Render a list of records.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_records(records: &[ConsultationRecord], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(records)?);
    }
    if records.is_empty() {
        return Ok("No consultations stored.".to_string());
    }

    let mut out = String::new();
    match format {
        OutputFormat::Table => {
            let _ = writeln!(
                out,
                "{:<36}  {:<20}  {:<12}  {:<14}  {}",
                "ID", "CREATED", "ISSUE", "ROLE", "SYMPTOMS"
            );
            for record in records {
                let _ = writeln!(
                    out,
                    "{:<36}  {:<20}  {:<12}  {:<14}  {}",
                    record.id,
                    format_timestamp(record.timestamp),
                    record.form_data.issue_type,
                    record.form_data.role,
                    truncate(&record.form_data.symptoms, 40)
                );
            }
        }
        OutputFormat::Plain | OutputFormat::Json => {
            for record in records {
                let _ = writeln!(
                    out,
                    "{}  {}  [{}] {}",
                    format_timestamp(record.timestamp),
                    record.id,
                    record.form_data.issue_type,
                    truncate(&record.form_data.symptoms, 60)
                );
            }
        }
    }
    Ok(out.trim_end().to_string())
}

/// Render one record in full.
#[must_use]
pub fn render_record(record: &ConsultationRecord) -> String {
    let form = &record.form_data;
    let result = &record.result;
    let or_dash = |value: &str| {
        if value.trim().is_empty() {
            "-".to_string()
        } else {
            value.to_string()
        }
    };

    let mut lines = vec![
        format!("Consultation {}", record.id),
        format!("Created:        {}", format_timestamp(record.timestamp)),
        format!("Role:           {}", form.role),
        format!("Issue:          {}", form.issue_type),
        format!("Phone:          {}", or_dash(&form.phone)),
        format!("Email:          {}", or_dash(&form.email)),
        String::new(),
        format!("Symptoms:       {}", or_dash(&form.symptoms)),
        format!("History:        {}", or_dash(&form.history)),
        format!("Other party:    {}", or_dash(&form.other_party_info)),
        String::new(),
    ];

    if result.is_consultation_possible {
        lines.extend([
            format!("Core issue:     {}", or_dash(&result.core_issue)),
            format!("Technical:      {}", or_dash(&result.technical_estimation)),
            format!("Responsibility: {}", or_dash(&result.responsibility_judgment)),
            format!("Legal basis:    {}", or_dash(&result.legal_basis)),
            format!("Precedent:      {}", or_dash(&result.precedent)),
            format!("Script:         {}", or_dash(&result.recommended_script)),
        ]);
    } else {
        lines.push(format!("Refused:        {}", or_dash(&result.refusal_reason)));
    }

    lines.join("\n")
}

/// Render store statistics as aligned lines.
#[must_use]
pub fn render_stats(stats: &StoreStats) -> Vec<String> {
    let when = |at: Option<chrono::DateTime<chrono::Utc>>| {
        at.map_or_else(|| "-".to_string(), |at| format_timestamp(at.timestamp_millis()))
    };
    let quota = stats
        .quota_bytes
        .map_or_else(|| "unlimited".to_string(), format_bytes);

    vec![
        format!("Records:       {}", stats.total_records),
        format!("Oldest:        {}", when(stats.oldest_record)),
        format!("Newest:        {}", when(stats.newest_record)),
        format!("Stored:        {} of {}", format_bytes(stats.stored_bytes), quota),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::{form, result};
    use crate::record::RecordId;

    fn record(symptoms: &str, possible: bool) -> ConsultationRecord {
        ConsultationRecord::new(
            RecordId::from("rec-1"),
            1_709_615_229_000,
            &form(symptoms),
            &result(possible),
        )
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1_709_615_229_000), "2024-03-05 05:07 UTC");
        assert_eq!(format_timestamp(i64::MAX), "-");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("line one\nline two", 40), "line one line two");
        assert_eq!(truncate("천장에서 물이 샙니다", 5), "천장에서…");
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(
            render_records(&[], OutputFormat::Plain).unwrap(),
            "No consultations stored."
        );
        assert_eq!(render_records(&[], OutputFormat::Json).unwrap(), "[]");
    }

    #[test]
    fn test_render_plain_and_table() {
        let records = vec![record("water dripping", true)];

        let plain = render_records(&records, OutputFormat::Plain).unwrap();
        assert!(plain.contains("rec-1"));
        assert!(plain.contains("[누수] water dripping"));

        let table = render_records(&records, OutputFormat::Table).unwrap();
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].contains("임차인(세입자)"));
    }

    #[test]
    fn test_render_json_round_trips() {
        let records = vec![record("water dripping", true)];
        let json = render_records(&records, OutputFormat::Json).unwrap();
        let parsed: Vec<ConsultationRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, records);
    }

    #[test]
    fn test_render_record_detail() {
        let text = render_record(&record("water dripping", true));
        assert!(text.starts_with("Consultation rec-1"));
        assert!(text.contains("Email:          -"));
        assert!(text.contains("Core issue:     ceiling leak"));

        let refused = render_record(&record("water dripping", false));
        assert!(refused.contains("Refused:"));
        assert!(!refused.contains("Core issue:"));
    }

    #[test]
    fn test_render_stats() {
        let stats = StoreStats {
            total_records: 2,
            oldest_record: chrono::DateTime::from_timestamp_millis(1_709_615_229_000),
            newest_record: None,
            stored_bytes: 2048,
            quota_bytes: None,
        };
        let lines = render_stats(&stats);
        assert_eq!(lines[0], "Records:       2");
        assert_eq!(lines[2], "Newest:        -");
        assert_eq!(lines[3], "Stored:        2.0 KiB of unlimited");
    }
}
