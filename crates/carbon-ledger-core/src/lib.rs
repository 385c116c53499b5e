pub mod audit;
pub mod report;

pub use audit::{
    audit_source, audit_text, csv_parser::parse, default_scorer::DefaultScorer,
    file_source::FileCsvSource, file_source::StaticCsvSource, file_source::StdinCsvSource,
    AuditPolicy, AuditReport, AuditRow, CsvSource, ParseError, ParseOutcome,
    PolicyValidationError, RiskThresholds, RiskTier, ScoreBreakdown, Scorer, Violation,
    ViolationKind, SAMPLE_CSV,
};
pub use report::{render_report, OutputFormat};
