//! Dashboard rendering.
//!
//! This module assembles a [`DashboardReport`] from a session and renders
//! it as Markdown (tables with text bar charts) or JSON.

use crate::analysis::{churn_by_country, feature_importance, overview_metrics};
use crate::models::{
    AtRiskView, CountryChurn, DashboardReport, FeatureImportance, OverviewMetrics, ReportFormat,
    ReportMetadata,
};
use crate::session::Session;
use anyhow::{Context, Result};
use chrono::Utc;
use num_format::{Locale, ToFormattedString};
use std::path::Path;

/// Width of the text bars in chart tables.
const BAR_WIDTH: usize = 20;

/// Retention guidance appended to the dashboard.
pub const DEFAULT_INSIGHTS: &str = "Analyze the characteristics (Recency, Frequency, Monetary, Tenure) of at-risk customers and the top churn drivers to develop targeted retention strategies. For instance, customers with high Recency (haven't purchased recently) and low Frequency might be prime candidates for re-engagement campaigns.";

/// Knobs for assembling a report.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Number of features shown in the drivers chart.
    pub feature_chart_limit: usize,
    /// Append the insights call-out.
    pub include_insights: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            feature_chart_limit: 10,
            include_insights: true,
        }
    }
}

/// Run every dashboard query for the session's current threshold.
pub fn build_report(session: &Session, options: &ReportOptions, duration_seconds: f64) -> DashboardReport {
    let dataset = session.dataset();

    let mut features = feature_importance();
    features.truncate(options.feature_chart_limit);

    DashboardReport {
        metadata: ReportMetadata {
            data_source: dataset.source().display().to_string(),
            generated_at: Utc::now(),
            rows_loaded: dataset.len(),
            threshold: session.threshold(),
            duration_seconds,
        },
        overview: overview_metrics(dataset),
        feature_importance: features,
        churn_by_country: churn_by_country(dataset),
        at_risk: session.at_risk(),
        insights: options.include_insights.then(|| DEFAULT_INSIGHTS.to_string()),
    }
}

/// Render the report in the requested format.
pub fn render(report: &DashboardReport, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Markdown => Ok(generate_markdown_report(report)),
        ReportFormat::Json => generate_json_report(report),
    }
}

/// Generate a complete Markdown dashboard.
pub fn generate_markdown_report(report: &DashboardReport) -> String {
    let mut output = String::new();

    output.push_str("# Retail Customer Churn Analysis Dashboard\n\n");
    output.push_str(
        "Predicted customer churn and its key influencing factors, for targeted retention strategies.\n\n",
    );

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_overview_section(&report.overview));
    output.push_str(&generate_drivers_section(&report.feature_importance));
    output.push_str(&generate_country_section(&report.churn_by_country));
    output.push_str(&generate_at_risk_section(&report.at_risk));

    if let Some(ref insights) = report.insights {
        output.push_str("## Insights\n\n");
        output.push_str(&format!("> 💡 **Insights:** {}\n\n", insights));
    }

    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Data Source:** `{}`\n", metadata.data_source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Rows Loaded:** {}\n",
        format_count(metadata.rows_loaded)
    ));
    section.push_str(&format!(
        "- **At-Risk Threshold:** {:.2}\n",
        metadata.threshold
    ));
    section.push_str(&format!(
        "- **Processing Time:** {:.2}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn generate_overview_section(overview: &OverviewMetrics) -> String {
    let mut section = String::new();

    section.push_str("## 📈 Overall Churn Insights\n\n");
    section.push_str(
        "| Total Customers | Actual Churn Rate | Predicted Churn Rate | Predicted Churners |\n",
    );
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        format_count(overview.total_customers),
        format_percent(overview.actual_churn_rate),
        format_percent(overview.predicted_churn_rate),
        format_count(overview.predicted_churners),
    ));

    section
}

fn generate_drivers_section(features: &[FeatureImportance]) -> String {
    let mut section = String::new();

    section.push_str("## 📊 Key Churn Drivers\n\n");

    if features.is_empty() {
        section.push_str("Feature importance data not available.\n\n");
        return section;
    }

    section.push_str("| Feature | Importance | |\n");
    section.push_str("|:---|---:|:---|\n");

    let max = features.iter().map(|f| f.importance).fold(0.0, f64::max);
    for feature in features {
        section.push_str(&format!(
            "| {} | {:.2} | `{}` |\n",
            feature.feature,
            feature.importance,
            text_bar(feature.importance, max)
        ));
    }
    section.push('\n');

    section
}

fn generate_country_section(rates: &[CountryChurn]) -> String {
    let mut section = String::new();

    section.push_str("## 🌍 Churn Rate by Country Group\n\n");
    section.push_str("| Country Group | Churn Rate (%) | |\n");
    section.push_str("|:---|---:|:---|\n");

    for rate in rates {
        section.push_str(&format!(
            "| {} | {:.2} | `{}` |\n",
            escape_cell(&rate.country),
            rate.churn_rate,
            text_bar(rate.churn_rate, 100.0)
        ));
    }
    section.push('\n');

    section
}

/// Render the at-risk customer section on its own.
///
/// Used both inside the full dashboard and after each interactive
/// threshold change.
pub fn generate_at_risk_section(view: &AtRiskView) -> String {
    let mut section = String::new();

    section.push_str("## 🎯 At-Risk Customers\n\n");
    section.push_str(&format!(
        "Showing {} customers with churn probability >= {:.2}\n\n",
        format_count(view.total_matches),
        view.threshold
    ));

    if view.customers.is_empty() {
        section.push_str("No customers identified as 'at-risk' with the current threshold.\n\n");
        return section;
    }

    if view.is_truncated() {
        section.push_str(&format!(
            "*Top {} listed by churn probability.*\n\n",
            format_count(view.customers.len())
        ));
    }

    section.push_str("| Customer ID | Churn Probability | Predicted Churn | Recency (Days) | Frequency (Transactions) | Monetary (£) | Tenure (Days) | Country Group |\n");
    section.push_str("|:---|---:|:---:|---:|---:|---:|---:|:---|\n");

    for customer in &view.customers {
        section.push_str(&format!(
            "| {} | {:.2} | {} | {} | {} | £{:.2} | {} | {} |\n",
            escape_cell(&customer.customer_id),
            customer.churn_probability,
            if customer.predicted_churn { "✓" } else { "✗" },
            customer.recency,
            customer.frequency,
            customer.monetary,
            customer.tenure,
            escape_cell(&customer.country_group),
        ));
    }
    section.push('\n');

    section
}

/// Make CSV text safe inside a Markdown table cell.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Dashboard generated by ChurnLens*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &DashboardReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Render and write the report to `path`.
pub fn write_report(report: &DashboardReport, format: ReportFormat, path: &Path) -> Result<()> {
    let content = render(report, format)?;

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write dashboard to {}", path.display()))
}

/// Percentage with two decimals, e.g. `30.00%`.
pub fn format_percent(rate: f64) -> String {
    format!("{:.2}%", rate)
}

/// Count with thousands separators, e.g. `4,338`.
pub fn format_count(n: usize) -> String {
    n.to_formatted_string(&Locale::en)
}

fn text_bar(value: f64, max: f64) -> String {
    let filled = if max > 0.0 {
        ((value / max) * BAR_WIDTH as f64).round().clamp(0.0, BAR_WIDTH as f64) as usize
    } else {
        0
    };

    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CustomerRecord, Dataset};
    use std::sync::Arc;

    fn create_test_session(threshold: f64) -> Session {
        let records = (0..12)
            .map(|i| CustomerRecord {
                customer_id: format!("{}", 12346 + i),
                is_churned: i % 4 == 0,
                predicted_churn: i % 3 == 0,
                churn_probability: i as f64 / 11.0,
                recency: 10.0 * i as f64,
                frequency: i as u64,
                monetary: 1250.5,
                tenure: 300.0,
                country_group: if i % 2 == 0 { "United Kingdom" } else { "Other" }.to_string(),
            })
            .collect();

        Session::new(
            Arc::new(Dataset::new("data/churn.csv", records).unwrap()),
            threshold,
            5,
        )
    }

    #[test]
    fn test_build_report() {
        let session = create_test_session(0.5);
        let report = build_report(&session, &ReportOptions::default(), 0.25);

        assert_eq!(report.metadata.rows_loaded, 12);
        assert_eq!(report.metadata.threshold, 0.5);
        assert_eq!(report.overview.total_customers, 12);
        assert_eq!(report.feature_importance.len(), 4);
        assert_eq!(report.churn_by_country.len(), 2);
        assert_eq!(report.at_risk.total_matches, 6);
        assert_eq!(report.at_risk.customers.len(), 5);
        assert!(report.insights.is_some());
    }

    #[test]
    fn test_feature_chart_limit_and_insights_toggle() {
        let session = create_test_session(0.5);
        let options = ReportOptions {
            feature_chart_limit: 2,
            include_insights: false,
        };

        let report = build_report(&session, &options, 0.0);

        assert_eq!(report.feature_importance.len(), 2);
        assert_eq!(report.feature_importance[0].feature, "Recency");
        assert!(report.insights.is_none());
        assert!(!generate_markdown_report(&report).contains("## Insights"));
    }

    #[test]
    fn test_generate_markdown_report() {
        let session = create_test_session(0.5);
        let report = build_report(&session, &ReportOptions::default(), 0.1);
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# Retail Customer Churn Analysis Dashboard"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("Overall Churn Insights"));
        assert!(markdown.contains("| 12 | 25.00% | 33.33% | 4 |"));
        assert!(markdown.contains("Key Churn Drivers"));
        assert!(markdown.contains("| Recency | 0.40 |"));
        assert!(markdown.contains("| Other | 0.00 |"));
        assert!(markdown.contains("| United Kingdom | 50.00 |"));
        assert!(markdown.contains("Showing 6 customers with churn probability >= 0.50"));
        assert!(markdown.contains("Top 5 listed"));
        assert!(markdown.contains("£1250.50"));
        assert!(markdown.contains("💡 **Insights:**"));
    }

    #[test]
    fn test_empty_at_risk_section() {
        let view = AtRiskView {
            threshold: 0.99,
            total_matches: 0,
            customers: Vec::new(),
        };

        let section = generate_at_risk_section(&view);

        assert!(section.contains("Showing 0 customers with churn probability >= 0.99"));
        assert!(section.contains("No customers identified as 'at-risk' with the current threshold."));
        assert!(!section.contains("| Customer ID |"));
    }

    #[test]
    fn test_at_risk_rows_ordered() {
        let session = create_test_session(0.0);
        let section = generate_at_risk_section(&session.at_risk());

        let first = section.find("| 12357 |").unwrap();
        let second = section.find("| 12356 |").unwrap();
        assert!(first < second);
    }

    fn column_separators(line: &str) -> usize {
        line.matches('|').count() - line.matches("\\|").count()
    }

    #[test]
    fn test_country_label_with_pipe_keeps_columns() {
        let section = generate_country_section(&[CountryChurn {
            country: "EU|Other".to_string(),
            churn_rate: 10.0,
        }]);

        let row = section.lines().find(|l| l.contains("EU")).unwrap();
        assert!(row.starts_with("| EU\\|Other | 10.00 |"));
        assert_eq!(column_separators(row), 4);
    }

    #[test]
    fn test_at_risk_cells_are_escaped() {
        let view = AtRiskView {
            threshold: 0.5,
            total_matches: 1,
            customers: vec![CustomerRecord {
                customer_id: "A|1".to_string(),
                is_churned: true,
                predicted_churn: true,
                churn_probability: 0.8,
                recency: 3.0,
                frequency: 1,
                monetary: 10.0,
                tenure: 20.0,
                country_group: "EU|Other\nNorth".to_string(),
            }],
        };

        let section = generate_at_risk_section(&view);

        let row = section.lines().find(|l| l.starts_with("| A")).unwrap();
        assert!(row.starts_with("| A\\|1 | 0.80 |"));
        assert!(row.ends_with("| EU\\|Other North |"));
        assert_eq!(column_separators(row), 9);
    }

    #[test]
    fn test_generate_json_report() {
        let session = create_test_session(0.5);
        let report = build_report(&session, &ReportOptions::default(), 0.1);
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"overview\""));
        assert!(json.contains("\"churn_by_country\""));
        assert!(json.contains("\"total_matches\": 6"));
        assert!(json.contains("\"Customer ID\""));
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dashboard.json");
        let report = build_report(&create_test_session(0.5), &ReportOptions::default(), 0.1);

        write_report(&report, ReportFormat::Json, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let parsed: DashboardReport = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed.at_risk.total_matches, 6);
    }

    #[test]
    fn test_formatting_helpers() {
        assert_eq!(format_percent(30.000000000000004), "30.00%");
        assert_eq!(format_count(4338), "4,338");
        assert_eq!(format_count(1234567), "1,234,567");
        assert_eq!(text_bar(50.0, 100.0), format!("{}{}", "█".repeat(10), "░".repeat(10)));
        assert_eq!(text_bar(0.0, 0.0), "░".repeat(BAR_WIDTH));
    }
}
