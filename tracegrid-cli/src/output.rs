//! Report rendering for the terminal.
//!
//! Renders the matrix report as colored text grouped by variant, with a
//! totals line at the end. JSON output goes through `serde_json` directly
//! in `main`.

use std::io::Write;

use colored::Colorize;

use tracegrid_core::types::CaseResult;
use tracegrid_engine::MatrixReport;

/// Trait for human-readable text rendering.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

impl Render for MatrixReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", "tracegrid matrix report".bold())?;

        for (variant_id, cases) in &self.variants {
            writeln!(w, "  {}", variant_id.cyan())?;
            for case in cases {
                let (marker, line) = case_line(&case.result);
                writeln!(w, "    {marker} {} {line}", case.application_id)?;
            }
        }

        let verdict = if self.is_success() {
            "PASS".green().bold()
        } else {
            "FAIL".red().bold()
        };
        writeln!(
            w,
            "{verdict}  {} cases: {} passed, {} behavioral, {} infra, {} skipped",
            self.totals.total,
            self.totals.pass,
            self.totals.behavioral_failures,
            self.totals.infra_failures,
            self.totals.skipped,
        )?;
        Ok(())
    }
}

fn case_line(result: &CaseResult) -> (colored::ColoredString, String) {
    match result {
        CaseResult::Pass => ("PASS".green(), String::new()),
        CaseResult::BehavioralFailure(detail) => {
            ("FAIL".red(), format!("behavioral: {detail}"))
        }
        CaseResult::InfraFailure(detail) => ("INFRA".yellow(), format!("infra: {detail}")),
        CaseResult::Skipped(detail) => ("SKIP".dimmed(), format!("skipped: {detail}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracegrid_core::types::TestCase;
    use tracegrid_engine::ResultAggregator;

    fn sample_report() -> MatrixReport {
        let aggregator = ResultAggregator::new();
        aggregator.record(&TestCase::new("rt-14", "alpha"), CaseResult::Pass);
        aggregator.record(
            &TestCase::new("rt-14", "beta"),
            CaseResult::BehavioralFailure("status 500".to_owned()),
        );
        aggregator.record(
            &TestCase::new("rt-15", "alpha"),
            CaseResult::Skipped("cancelled".to_owned()),
        );
        aggregator.report()
    }

    #[test]
    fn text_report_groups_by_variant_with_totals() {
        colored::control::set_override(false);
        let mut buf = Vec::new();
        sample_report().render_text(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("rt-14"));
        assert!(text.contains("rt-15"));
        assert!(text.contains("PASS alpha"));
        assert!(text.contains("behavioral: status 500"));
        assert!(text.contains("skipped: cancelled"));
        assert!(text.contains("3 cases: 1 passed, 1 behavioral, 0 infra, 1 skipped"));
        assert!(text.contains("FAIL"));
    }

    #[test]
    fn all_pass_report_shows_pass_verdict() {
        colored::control::set_override(false);
        let aggregator = ResultAggregator::new();
        aggregator.record(&TestCase::new("rt-14", "alpha"), CaseResult::Pass);

        let mut buf = Vec::new();
        aggregator.report().render_text(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("PASS  1 cases: 1 passed"));
    }
}
