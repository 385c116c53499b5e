use tracing::{debug, instrument};

use super::{
    AuditPolicy, AuditReport, AuditRow, RiskTier, ScoreBreakdown, Scorer, Violation,
    ViolationKind,
};

const SUGGEST_SUPPLIERS: &str = "Add all missing suppliers for better compliance.";
const SUGGEST_HIGH_EMISSIONS: &str = "Investigate products with high emissions.";
const SUGGEST_ZERO_EMISSIONS: &str =
    "Review entries reporting zero emissions; ensure data accuracy.";
const SUGGEST_ALL_CLEAR: &str = "Great work! No critical issues. Stay compliant!";

/// Scorer applying the supplier, zero-emissions and high-emissions rules of an [`AuditPolicy`].
#[derive(Debug, Clone, Default)]
pub struct DefaultScorer {
    policy: AuditPolicy,
}

impl DefaultScorer {
    pub fn new(policy: AuditPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AuditPolicy {
        &self.policy
    }

    /// Check every rule against one row, in fixed order, appending what fires.
    fn check_row(&self, row: &AuditRow, counts: &mut ScoreBreakdown, out: &mut Vec<Violation>) {
        if row.supplier.is_empty() {
            counts.missing_suppliers += 1;
            out.push(self.violation(ViolationKind::SupplierMissing, row));
        }
        if row.emissions == 0.0 {
            counts.zero_emissions += 1;
            out.push(self.violation(ViolationKind::EmissionsZero, row));
        }
        if row.emissions > self.policy.high_emissions_threshold {
            counts.high_emissions += 1;
            out.push(self.violation(ViolationKind::EmissionsHigh, row));
        }
    }

    fn violation(&self, rule: ViolationKind, row: &AuditRow) -> Violation {
        let reason = match rule {
            ViolationKind::SupplierMissing => "Missing supplier name".to_string(),
            ViolationKind::EmissionsZero => "Zero emissions is non-compliant".to_string(),
            ViolationKind::EmissionsHigh => format!(
                "High emissions (>{} kg)",
                self.policy.high_emissions_threshold
            ),
        };
        Violation {
            rule,
            reason,
            affected: row.sku.clone(),
        }
    }

    fn volume_penalty(&self, total: f64) -> i64 {
        let steps = (total / self.policy.volume_step).floor() as i64;
        steps.saturating_mul(i64::from(self.policy.volume_step_penalty))
    }

    fn raw_score(&self, counts: &ScoreBreakdown) -> i64 {
        let policy = &self.policy;
        let rule_penalty = |count: usize, weight: u32| {
            i64::try_from(count)
                .unwrap_or(i64::MAX)
                .saturating_mul(i64::from(weight))
        };
        i64::from(policy.max_score)
            .saturating_sub(rule_penalty(
                counts.missing_suppliers,
                policy.missing_supplier_penalty,
            ))
            .saturating_sub(rule_penalty(
                counts.high_emissions,
                policy.high_emissions_penalty,
            ))
            .saturating_sub(rule_penalty(
                counts.zero_emissions,
                policy.zero_emissions_penalty,
            ))
            .saturating_sub(counts.volume_penalty)
    }

    fn suggestions(counts: &ScoreBreakdown, violations: usize) -> Vec<String> {
        let mut suggestions = Vec::new();
        if counts.missing_suppliers > 0 {
            suggestions.push(SUGGEST_SUPPLIERS.to_string());
        }
        if counts.high_emissions > 0 {
            suggestions.push(SUGGEST_HIGH_EMISSIONS.to_string());
        }
        if counts.zero_emissions > 0 {
            suggestions.push(SUGGEST_ZERO_EMISSIONS.to_string());
        }
        if violations == 0 {
            suggestions.push(SUGGEST_ALL_CLEAR.to_string());
        }
        suggestions
    }
}

impl Scorer for DefaultScorer {
    #[instrument(name = "score_rows", skip_all, fields(rows = rows.len()))]
    fn score(&self, rows: &[AuditRow]) -> AuditReport {
        let policy = &self.policy;
        let mut counts = ScoreBreakdown {
            rows: rows.len(),
            ..ScoreBreakdown::default()
        };
        let mut violations = Vec::new();

        for row in rows {
            counts.raw_total_emissions += row.emissions;
            self.check_row(row, &mut counts, &mut violations);
        }

        let total = counts.raw_total_emissions;
        counts.volume_penalty = self.volume_penalty(total);
        counts.raw_score = self.raw_score(&counts);
        let carbon_debt = counts
            .raw_score
            .max(i64::from(policy.min_score))
            .min(i64::from(policy.max_score)) as u32;

        counts.volume_surcharge = if total > policy.volume_surcharge_threshold {
            policy.volume_surcharge
        } else {
            0
        };
        let estimated_fine = (violations.len() as u64)
            .saturating_mul(policy.fine_per_violation)
            .saturating_add(counts.volume_surcharge);

        let suggestions = Self::suggestions(&counts, violations.len());
        debug!(
            violations = violations.len(),
            carbon_debt, estimated_fine, "scored rows"
        );

        AuditReport {
            carbon_debt,
            risk_tier: RiskTier::from_score_with_thresholds(carbon_debt, &policy.tiers),
            total_emissions: round_half_up(total),
            violations,
            estimated_fine,
            suggestions,
            breakdown: counts,
        }
    }
}

/// Round to the nearest integer, with halves rounded toward positive infinity.
/// Non-finite values saturate to the `i64` bounds.
fn round_half_up(value: f64) -> i64 {
    let floor = value.floor();
    let rounded = if value - floor >= 0.5 { floor + 1.0 } else { floor };
    rounded as i64
}
