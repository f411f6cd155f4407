//! Churn aggregation and filtering.
//!
//! Pure queries over a loaded [`Dataset`]. None of them mutate the dataset,
//! so each can be re-run as often as the caller likes.

use crate::models::{
    AtRiskView, CountryChurn, CustomerRecord, Dataset, FeatureImportance, OverviewMetrics,
};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Maximum number of at-risk customers returned for display.
pub const DISPLAY_LIMIT: usize = 500;

/// Placeholder feature weights used until a trained model is available.
const FEATURE_WEIGHTS: [(&str, f64); 4] = [
    ("Recency", 0.40),
    ("Frequency", 0.30),
    ("Monetary", 0.20),
    ("Tenure", 0.10),
];

/// Compute the headline churn figures.
pub fn overview_metrics(dataset: &Dataset) -> OverviewMetrics {
    let records = dataset.records();

    let total_customers = records
        .iter()
        .map(|r| r.customer_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    let predicted_churners = records.iter().filter(|r| r.predicted_churn).count();

    OverviewMetrics {
        total_customers,
        actual_churn_rate: churn_rate(records.iter().map(|r| r.is_churned)),
        predicted_churn_rate: churn_rate(records.iter().map(|r| r.predicted_churn)),
        predicted_churners,
    }
}

/// Observed churn rate per country group, highest first.
///
/// Equal rates are ordered by country name.
pub fn churn_by_country(dataset: &Dataset) -> Vec<CountryChurn> {
    let mut grouped: BTreeMap<&str, (usize, usize)> = BTreeMap::new();

    for record in dataset.records() {
        let (rows, churned) = grouped.entry(record.country_group.as_str()).or_default();
        *rows += 1;
        if record.is_churned {
            *churned += 1;
        }
    }

    let mut rates: Vec<CountryChurn> = grouped
        .into_iter()
        .map(|(country, (rows, churned))| CountryChurn {
            country: country.to_string(),
            churn_rate: churned as f64 / rows as f64 * 100.0,
        })
        .collect();

    // Stable sort keeps the BTreeMap's name order among ties.
    rates.sort_by(|a, b| b.churn_rate.total_cmp(&a.churn_rate));

    rates
}

/// Static feature importance table, most important first.
pub fn feature_importance() -> Vec<FeatureImportance> {
    FEATURE_WEIGHTS
        .iter()
        .map(|(feature, importance)| FeatureImportance {
            feature: feature.to_string(),
            importance: *importance,
        })
        .collect()
}

/// Customers whose churn probability is at or above `threshold`, highest
/// first, with at most `limit` of them listed.
///
/// `total_matches` always counts every matching row, whatever the limit.
/// Pass [`DISPLAY_LIMIT`] for the dashboard default.
pub fn at_risk_customers(dataset: &Dataset, threshold: f64, limit: usize) -> AtRiskView {
    let threshold = clamp_threshold(threshold);

    let mut matches: Vec<&CustomerRecord> = dataset
        .records()
        .iter()
        .filter(|r| r.churn_probability >= threshold)
        .collect();

    // `sort_by` is stable: equal probabilities keep file order.
    matches.sort_by(|a, b| b.churn_probability.total_cmp(&a.churn_probability));

    let total_matches = matches.len();
    let customers = matches.into_iter().take(limit).cloned().collect();

    AtRiskView {
        threshold,
        total_matches,
        customers,
    }
}

/// Bring a threshold into [0, 1]. NaN is treated as 0.
pub fn clamp_threshold(threshold: f64) -> f64 {
    if threshold.is_nan() {
        warn!("Churn threshold is NaN, using 0.0");
        return 0.0;
    }

    let clamped = threshold.clamp(0.0, 1.0);
    if clamped != threshold {
        warn!("Churn threshold {} outside [0, 1], using {}", threshold, clamped);
    }
    clamped
}

fn churn_rate(flags: impl Iterator<Item = bool>) -> f64 {
    let (rows, positives) = flags.fold((0usize, 0usize), |(rows, positives), flag| {
        (rows + 1, positives + usize::from(flag))
    });

    if rows == 0 {
        return 0.0;
    }

    positives as f64 / rows as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_record(id: usize, country: &str, churned: bool, probability: f64) -> CustomerRecord {
        CustomerRecord {
            customer_id: id.to_string(),
            is_churned: churned,
            predicted_churn: probability >= 0.5,
            churn_probability: probability,
            recency: 30.0,
            frequency: 4,
            monetary: 250.0,
            tenure: 365.0,
            country_group: country.to_string(),
        }
    }

    fn dataset(records: Vec<CustomerRecord>) -> Dataset {
        Dataset::new("test.csv", records).unwrap()
    }

    /// Deterministic spread of probabilities with duplicates.
    fn mixed_dataset() -> Dataset {
        let countries = ["UK", "France", "Germany", "Other"];
        let records = (0..40)
            .map(|i| {
                let probability = ((i * 37) % 21) as f64 / 20.0;
                create_test_record(i, countries[i % 4], i % 3 == 0, probability)
            })
            .collect();
        dataset(records)
    }

    #[test]
    fn test_actual_churn_rate_thirty_percent() {
        let records = (0..10)
            .map(|i| create_test_record(i, "UK", i < 3, 0.2))
            .collect();

        let metrics = overview_metrics(&dataset(records));

        assert!((metrics.actual_churn_rate - 30.0).abs() < 1e-9);
        assert_eq!(format!("{:.2}%", metrics.actual_churn_rate), "30.00%");
    }

    #[test]
    fn test_overview_counts_distinct_customers() {
        let records = vec![
            create_test_record(1, "UK", false, 0.9),
            create_test_record(1, "UK", false, 0.9),
            create_test_record(2, "UK", true, 0.1),
            create_test_record(3, "France", false, 0.6),
        ];

        let metrics = overview_metrics(&dataset(records));

        assert_eq!(metrics.total_customers, 3);
        assert_eq!(metrics.predicted_churners, 3);
        assert!((metrics.predicted_churn_rate - 75.0).abs() < 1e-9);
        assert!((metrics.actual_churn_rate - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_churn_by_country_sorted_descending() {
        let mut records = Vec::new();
        for i in 0..5 {
            records.push(create_test_record(i, "UK", i < 2, 0.3));
        }
        for i in 5..8 {
            records.push(create_test_record(i, "France", true, 0.8));
        }

        let rates = churn_by_country(&dataset(records));

        assert_eq!(
            rates,
            vec![
                CountryChurn {
                    country: "France".to_string(),
                    churn_rate: 100.0
                },
                CountryChurn {
                    country: "UK".to_string(),
                    churn_rate: 40.0
                },
            ]
        );
    }

    #[test]
    fn test_churn_by_country_ties_use_name_order() {
        let records = vec![
            create_test_record(1, "Spain", true, 0.5),
            create_test_record(2, "Belgium", true, 0.5),
            create_test_record(3, "Norway", false, 0.5),
            create_test_record(4, "Austria", false, 0.5),
        ];

        let names: Vec<String> = churn_by_country(&dataset(records))
            .into_iter()
            .map(|c| c.country)
            .collect();

        assert_eq!(names, vec!["Belgium", "Spain", "Austria", "Norway"]);
    }

    #[test]
    fn test_churn_by_country_covers_every_country() {
        let data = mixed_dataset();
        let rates = churn_by_country(&data);

        let expected: HashSet<&str> = data.records().iter().map(|r| r.country_group.as_str()).collect();
        assert_eq!(rates.len(), expected.len());
        for pair in rates.windows(2) {
            assert!(pair[0].churn_rate >= pair[1].churn_rate);
        }
        for rate in &rates {
            assert!(expected.contains(rate.country.as_str()));
            assert!((0.0..=100.0).contains(&rate.churn_rate));
        }
    }

    #[test]
    fn test_feature_importance_fixed_order() {
        let features = feature_importance();

        let names: Vec<&str> = features.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(names, vec!["Recency", "Frequency", "Monetary", "Tenure"]);
        assert_eq!(features[0].importance, 0.40);
        assert_eq!(features[3].importance, 0.10);
        assert_eq!(features, feature_importance());
    }

    #[test]
    fn test_at_risk_zero_threshold_returns_all() {
        let data = mixed_dataset();
        let view = at_risk_customers(&data, 0.0, DISPLAY_LIMIT);

        assert_eq!(view.total_matches, data.len());
        assert_eq!(view.customers.len(), data.len());
    }

    #[test]
    fn test_at_risk_full_threshold_only_certain() {
        let data = mixed_dataset();
        let view = at_risk_customers(&data, 1.0, DISPLAY_LIMIT);

        assert!(view.total_matches > 0);
        assert!(view.customers.iter().all(|c| c.churn_probability == 1.0));
    }

    #[test]
    fn test_at_risk_sorted_with_stable_ties() {
        let records = vec![
            create_test_record(1, "UK", false, 0.6),
            create_test_record(2, "UK", false, 0.9),
            create_test_record(3, "UK", false, 0.6),
            create_test_record(4, "UK", false, 0.2),
            create_test_record(5, "UK", false, 0.6),
        ];

        let view = at_risk_customers(&dataset(records), 0.5, DISPLAY_LIMIT);
        let ids: Vec<&str> = view.customers.iter().map(|c| c.customer_id.as_str()).collect();

        assert_eq!(ids, vec!["2", "1", "3", "5"]);
        assert_eq!(view.total_matches, 4);
    }

    #[test]
    fn test_at_risk_truncates_but_reports_full_count() {
        let records = (0..600)
            .map(|i| create_test_record(i, "UK", false, 0.5 + (i % 50) as f64 / 100.0))
            .collect();

        let view = at_risk_customers(&dataset(records), 0.5, DISPLAY_LIMIT);

        assert_eq!(view.total_matches, 600);
        assert_eq!(view.customers.len(), DISPLAY_LIMIT);
        assert!(view.is_truncated());
    }

    #[test]
    fn test_at_risk_monotonic_in_threshold() {
        let data = mixed_dataset();
        let thresholds = [0.0, 0.1, 0.25, 0.5, 0.5, 0.75, 0.95, 1.0];

        let counts: Vec<usize> = thresholds
            .iter()
            .map(|t| at_risk_customers(&data, *t, DISPLAY_LIMIT).total_matches)
            .collect();

        for pair in counts.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn test_at_risk_empty_result() {
        let records = vec![create_test_record(1, "UK", false, 0.1)];
        let view = at_risk_customers(&dataset(records), 0.9, DISPLAY_LIMIT);

        assert_eq!(view.total_matches, 0);
        assert!(view.customers.is_empty());
        assert!(!view.is_truncated());
    }

    #[test]
    fn test_clamp_threshold() {
        assert_eq!(clamp_threshold(-0.5), 0.0);
        assert_eq!(clamp_threshold(1.5), 1.0);
        assert_eq!(clamp_threshold(0.42), 0.42);
        assert_eq!(clamp_threshold(f64::NAN), 0.0);

        let data = mixed_dataset();
        assert_eq!(
            at_risk_customers(&data, 7.0, DISPLAY_LIMIT),
            at_risk_customers(&data, 1.0, DISPLAY_LIMIT)
        );
    }

    #[test]
    fn test_queries_are_idempotent() {
        let data = mixed_dataset();

        assert_eq!(overview_metrics(&data), overview_metrics(&data));
        assert_eq!(churn_by_country(&data), churn_by_country(&data));
        assert_eq!(
            at_risk_customers(&data, 0.35, DISPLAY_LIMIT),
            at_risk_customers(&data, 0.35, DISPLAY_LIMIT)
        );
    }
}
