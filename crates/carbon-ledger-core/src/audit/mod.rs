use anyhow::Result as AnyResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

pub mod csv_parser;
pub mod default_scorer;
/// Sources that materialize raw CSV text before parsing.
pub mod file_source;

/// Canonical sample dataset used in documentation and manual testing.
pub const SAMPLE_CSV: &str = "SKU,Supplier,Emissions (kg CO₂e)
SKU1001,SustainableCo,1800
SKU1002,GreenProduction,1200
SKU1003,FutureFoods,950
SKU1004,SupplierPlus,2100
SKU1005,ZeroWaste,340
";

/// One validated data record from the ingested CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRow {
    pub sku: String,
    pub supplier: String,
    /// Emissions in kg CO₂e. Finite, but not range-checked.
    pub emissions: f64,
}

impl AuditRow {
    pub fn new(sku: impl Into<String>, supplier: impl Into<String>, emissions: f64) -> Self {
        Self {
            sku: sku.into(),
            supplier: supplier.into(),
            emissions,
        }
    }
}

/// Result of parsing a CSV document. `Ok` always carries at least one row.
pub type ParseOutcome = Result<Vec<AuditRow>, ParseError>;

/// Failures reported by the CSV parser. The display text is user-facing.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseError {
    #[error("CSV must have a header and at least one data row.")]
    MissingDataRows,
    #[error("Missing required columns: SKU, Supplier, Emissions (kg CO₂e)")]
    MissingColumns,
    #[error("Row {line}: Invalid emission value: '{raw}'")]
    InvalidEmission { line: usize, raw: String },
    #[error("CSV contains no valid data rows.")]
    NoValidRows,
}

/// Compliance rules checked against every row, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    SupplierMissing,
    EmissionsZero,
    EmissionsHigh,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SupplierMissing => "SUPPLIER_MISSING",
            Self::EmissionsZero => "EMISSIONS_ZERO",
            Self::EmissionsHigh => "EMISSIONS_HIGH",
        }
    }
}

/// A single rule firing on a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: ViolationKind,
    pub reason: String,
    /// SKU of the offending row; may be empty.
    pub affected: String,
}

/// Qualitative bucket derived from the carbon-debt score. Lower scores mean higher risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

impl RiskTier {
    /// Map a carbon-debt score into a tier using the default thresholds.
    pub fn from_score(score: u32) -> Self {
        Self::from_score_with_thresholds(score, &RiskThresholds::default())
    }

    pub fn from_score_with_thresholds(score: u32, thresholds: &RiskThresholds) -> Self {
        if score < thresholds.high_below {
            Self::High
        } else if score < thresholds.moderate_below {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
        }
    }
}

/// Score boundaries below which a report falls into a riskier tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub high_below: u32,
    pub moderate_below: u32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high_below: 60,
            moderate_below: 80,
        }
    }
}

/// Penalty table behind the carbon-debt score and fine estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditPolicy {
    pub missing_supplier_penalty: u32,
    pub high_emissions_penalty: u32,
    pub zero_emissions_penalty: u32,
    /// Emissions above this value (kg) trigger the high-emissions rule.
    pub high_emissions_threshold: f64,
    /// Every full step of total emissions costs `volume_step_penalty` points.
    pub volume_step: f64,
    pub volume_step_penalty: u32,
    pub fine_per_violation: u64,
    pub volume_surcharge_threshold: f64,
    pub volume_surcharge: u64,
    pub min_score: u32,
    pub max_score: u32,
    pub tiers: RiskThresholds,
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self {
            missing_supplier_penalty: 5,
            high_emissions_penalty: 5,
            zero_emissions_penalty: 3,
            high_emissions_threshold: 2000.0,
            volume_step: 5000.0,
            volume_step_penalty: 7,
            fine_per_violation: 2000,
            volume_surcharge_threshold: 10_000.0,
            volume_surcharge: 1500,
            min_score: 30,
            max_score: 100,
            tiers: RiskThresholds::default(),
        }
    }
}

impl AuditPolicy {
    /// Validate invariants for a policy loaded from configuration.
    pub fn validate(&self) -> Result<(), PolicyValidationError> {
        if self.min_score > self.max_score {
            return Err(PolicyValidationError::InvertedScoreBounds {
                min: self.min_score,
                max: self.max_score,
            });
        }
        if !self.volume_step.is_finite() || self.volume_step <= 0.0 {
            return Err(PolicyValidationError::InvalidVolumeStep {
                step: self.volume_step,
            });
        }
        for (field, value) in [
            ("high_emissions_threshold", self.high_emissions_threshold),
            (
                "volume_surcharge_threshold",
                self.volume_surcharge_threshold,
            ),
        ] {
            if !value.is_finite() {
                return Err(PolicyValidationError::NonFiniteThreshold {
                    field: field.to_string(),
                    value,
                });
            }
        }
        if self.tiers.high_below > self.tiers.moderate_below {
            return Err(PolicyValidationError::InvertedTiers {
                high_below: self.tiers.high_below,
                moderate_below: self.tiers.moderate_below,
            });
        }
        Ok(())
    }
}

/// Errors emitted while validating an audit policy.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyValidationError {
    #[error("min_score {min} must not exceed max_score {max}")]
    InvertedScoreBounds { min: u32, max: u32 },
    #[error("volume_step must be a positive finite number (got {step})")]
    InvalidVolumeStep { step: f64 },
    #[error("`{field}` must be finite (got {value})")]
    NonFiniteThreshold { field: String, value: f64 },
    #[error("tiers.high_below ({high_below}) must not exceed tiers.moderate_below ({moderate_below})")]
    InvertedTiers { high_below: u32, moderate_below: u32 },
}

/// Intermediate values behind a report, kept for explainability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ScoreBreakdown {
    pub rows: usize,
    pub missing_suppliers: usize,
    pub zero_emissions: usize,
    pub high_emissions: usize,
    /// Unrounded emissions sum; drives every threshold.
    pub raw_total_emissions: f64,
    pub volume_penalty: i64,
    /// Score before clamping; may be negative.
    pub raw_score: i64,
    pub volume_surcharge: u64,
}

/// Compliance report produced by the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub carbon_debt: u32,
    pub risk_tier: RiskTier,
    /// Rounded half-up for display. Saturates at the `i64` bounds when the sum overflows.
    pub total_emissions: i64,
    pub violations: Vec<Violation>,
    pub estimated_fine: u64,
    pub suggestions: Vec<String>,
    pub breakdown: ScoreBreakdown,
}

/// Turns parsed rows into a compliance report. Implementations never fail.
pub trait Scorer: Send + Sync {
    fn score(&self, rows: &[AuditRow]) -> AuditReport;
}

/// Abstraction over how raw CSV text is acquired (files, stdin, in-memory).
#[async_trait]
pub trait CsvSource: Send + Sync {
    /// Read the full document as UTF-8 text.
    async fn load(&self) -> AnyResult<String>;

    /// Short human-readable name used in logs and error context.
    fn label(&self) -> String;
}

/// Parse `text` and score the resulting rows.
#[instrument(name = "audit_text", skip_all, fields(input_len = text.len()))]
pub fn audit_text<S: Scorer + ?Sized>(text: &str, scorer: &S) -> Result<AuditReport, ParseError> {
    let rows = csv_parser::parse(text)?;
    let report = scorer.score(&rows);
    debug!(
        rows = rows.len(),
        violations = report.violations.len(),
        carbon_debt = report.carbon_debt,
        "audit completed"
    );
    Ok(report)
}

/// Load text from `source`, then parse and score it.
pub async fn audit_source<C, S>(source: &C, scorer: &S) -> AnyResult<AuditReport>
where
    C: CsvSource + ?Sized,
    S: Scorer + ?Sized,
{
    let text = source.load().await?;
    let report = audit_text(&text, scorer)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::default_scorer::DefaultScorer;
    use crate::audit::file_source::StaticCsvSource;

    #[test]
    fn parse_errors_render_user_messages() {
        assert_eq!(
            ParseError::InvalidEmission {
                line: 4,
                raw: "n/a".into()
            }
            .to_string(),
            "Row 4: Invalid emission value: 'n/a'"
        );
        assert_eq!(
            ParseError::MissingColumns.to_string(),
            "Missing required columns: SKU, Supplier, Emissions (kg CO₂e)"
        );
    }

    #[test]
    fn risk_tier_thresholds() {
        assert_eq!(RiskTier::from_score(30), RiskTier::High);
        assert_eq!(RiskTier::from_score(59), RiskTier::High);
        assert_eq!(RiskTier::from_score(60), RiskTier::Moderate);
        assert_eq!(RiskTier::from_score(79), RiskTier::Moderate);
        assert_eq!(RiskTier::from_score(80), RiskTier::Low);
        assert_eq!(RiskTier::from_score(100), RiskTier::Low);
    }

    #[test]
    fn default_policy_is_valid() {
        AuditPolicy::default()
            .validate()
            .expect("default policy should validate");
    }

    #[test]
    fn policy_validation_rejects_inverted_bounds() {
        let policy = AuditPolicy {
            min_score: 90,
            max_score: 40,
            ..AuditPolicy::default()
        };
        let err = policy.validate().expect_err("inverted bounds should fail");
        assert!(matches!(
            err,
            PolicyValidationError::InvertedScoreBounds { min: 90, max: 40 }
        ));
    }

    #[test]
    fn policy_validation_rejects_zero_volume_step() {
        let policy = AuditPolicy {
            volume_step: 0.0,
            ..AuditPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(PolicyValidationError::InvalidVolumeStep { .. })
        ));
    }

    #[test]
    fn partial_policy_deserializes_with_defaults() {
        let policy: AuditPolicy =
            serde_json::from_str(r#"{ "fine_per_violation": 500 }"#).unwrap();
        assert_eq!(policy.fine_per_violation, 500);
        assert_eq!(policy.missing_supplier_penalty, 5);
        assert_eq!(policy.tiers, RiskThresholds::default());
    }

    #[test]
    fn audit_text_surfaces_parse_errors() {
        let err = audit_text("SKU,Supplier,Emissions\n", &DefaultScorer::default())
            .expect_err("header only should fail");
        assert_eq!(err, ParseError::MissingDataRows);
    }

    #[tokio::test]
    async fn audit_source_scores_sample() {
        let source = StaticCsvSource::new("sample", SAMPLE_CSV);
        let report = audit_source(&source, &DefaultScorer::default())
            .await
            .unwrap();
        assert_eq!(report.carbon_debt, 88);
        assert_eq!(report.total_emissions, 6390);
        assert_eq!(report.estimated_fine, 2000);
    }

    #[tokio::test]
    async fn audit_source_wraps_parse_error() {
        let source = StaticCsvSource::new("broken", "Foo,Bar,Baz\nA,B,1\n");
        let err = audit_source(&source, &DefaultScorer::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ParseError>(),
            Some(&ParseError::MissingColumns)
        );
    }
}
