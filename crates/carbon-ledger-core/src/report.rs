use std::fmt::Write;

use serde::Serialize;

use crate::audit::{AuditReport, RiskTier, ScoreBreakdown, Violation};

const CSV_HEADER: &str = "sku,rule,reason";

/// Format styles supported in default reporter implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
    /// One row per violation, RFC 4180 quoting.
    Csv,
}

/// Produce a report string from an `AuditReport` using the desired format.
pub fn render_report(report: &AuditReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(report),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonReport::from(report))?),
        OutputFormat::Csv => Ok(render_csv(&report.violations)),
    }
}

fn render_human(report: &AuditReport) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(
        out,
        "CarbonDebt Score: {}/100 ({} Risk)",
        report.carbon_debt,
        report.risk_tier.label()
    )?;
    writeln!(
        out,
        "Total Emissions: {} kg CO₂e",
        group_thousands(report.total_emissions)
    )?;
    writeln!(
        out,
        "Estimated Fine: €{}",
        group_thousands(i64::try_from(report.estimated_fine).unwrap_or(i64::MAX))
    )?;
    writeln!(out)?;

    if report.violations.is_empty() {
        writeln!(out, "No critical violations found.")?;
    } else {
        writeln!(out, "Violations ({}):", report.violations.len())?;
        for violation in &report.violations {
            let sku = if violation.affected.is_empty() {
                "<no sku>"
            } else {
                violation.affected.as_str()
            };
            writeln!(out, "  - {sku:<12} {}", violation.reason)?;
        }
    }

    if !report.suggestions.is_empty() {
        writeln!(out)?;
        writeln!(out, "Recommendations:")?;
        for suggestion in &report.suggestions {
            writeln!(out, "  - {suggestion}")?;
        }
    }

    Ok(out)
}

fn render_csv(violations: &[Violation]) -> String {
    let mut out = String::new();
    out.push_str(CSV_HEADER);
    out.push('\n');
    for v in violations {
        out.push_str(&format!(
            "{},{},{}\n",
            escape_csv_field(&v.affected),
            v.rule.as_str(),
            escape_csv_field(&v.reason)
        ));
    }
    out
}

/// Quote fields containing commas, quotes or newlines; double embedded quotes.
fn escape_csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Format an integer with `,` between groups of three digits.
fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    carbon_debt: u32,
    risk_tier: RiskTier,
    total_emissions: i64,
    estimated_fine: u64,
    violations: &'a [Violation],
    suggestions: &'a [String],
    breakdown: &'a ScoreBreakdown,
}

impl<'a> From<&'a AuditReport> for JsonReport<'a> {
    fn from(report: &'a AuditReport) -> Self {
        Self {
            carbon_debt: report.carbon_debt,
            risk_tier: report.risk_tier,
            total_emissions: report.total_emissions,
            estimated_fine: report.estimated_fine,
            violations: &report.violations,
            suggestions: &report.suggestions,
            breakdown: &report.breakdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{default_scorer::DefaultScorer, AuditRow, Scorer, ViolationKind};

    fn sample_report() -> AuditReport {
        DefaultScorer::default().score(&[
            AuditRow::new("SKU-1", "", 12_500.0),
            AuditRow::new("SKU-2", "Acme", 40.0),
        ])
    }

    #[test]
    fn human_report_contains_score_and_violations() {
        let output = render_report(&sample_report(), OutputFormat::Human).unwrap();
        assert!(output.contains("CarbonDebt Score: 76/100 (Moderate Risk)"));
        assert!(output.contains("Total Emissions: 12,540 kg CO₂e"));
        assert!(output.contains("Estimated Fine: €5,500"));
        assert!(output.contains("SKU-1"));
        assert!(output.contains("Missing supplier name"));
        assert!(output.contains("Recommendations:"));
    }

    #[test]
    fn human_report_for_clean_data() {
        let report = DefaultScorer::default().score(&[AuditRow::new("A", "Acme", 1.0)]);
        let output = render_report(&report, OutputFormat::Human).unwrap();
        assert!(output.contains("No critical violations found."));
        assert!(output.contains("Great work!"));
        assert!(output.contains("(Low Risk)"));
    }

    #[test]
    fn json_report_serializes() {
        let report = sample_report();
        let output = render_report(&report, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["carbon_debt"], serde_json::json!(76));
        assert_eq!(value["risk_tier"], serde_json::json!("moderate"));
        assert_eq!(value["violations"][0]["rule"], "SUPPLIER_MISSING");
        assert_eq!(value["violations"][0]["affected"], "SKU-1");
        assert!(value["suggestions"].is_array());
        assert_eq!(value["breakdown"]["volume_penalty"], serde_json::json!(14));
    }

    #[test]
    fn csv_report_escapes_fields() {
        let violations = vec![Violation {
            rule: ViolationKind::EmissionsHigh,
            reason: "High emissions (>2000 kg)".into(),
            affected: "SKU,\"7\"".into(),
        }];
        let output = render_csv(&violations);
        assert_eq!(
            output,
            "sku,rule,reason\n\"SKU,\"\"7\"\"\",EMISSIONS_HIGH,High emissions (>2000 kg)\n"
        );
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(6390), "6,390");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
        assert_eq!(group_thousands(-12_000), "-12,000");
    }
}
