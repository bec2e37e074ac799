//! Integration tests for the transaction analytics pipeline.
//!
//! These tests run uploads end to end: load, filter, aggregate, report and
//! export, using the CSV fixtures.

use chrono::NaiveDate;
use merchant_analytics::{
    AnalyticsConfig, AnalyticsError, Dataset, FilterCriteria, GroupKey, LoadWarning, Measure,
    MetricSummary, Session, SessionRegistry, fit_top_cards, group_by, load, load_file,
    top_groups, top_n,
};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture(filename: &str) -> Dataset {
    load_file(fixtures_path().join(filename), &AnalyticsConfig::default())
        .expect("Failed to load fixture")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn export_to_bytes(dataset: &Dataset, criteria: &FilterCriteria) -> Vec<u8> {
    let mut out = Vec::new();
    dataset.filter(criteria).write_csv(&mut out).expect("Export failed");
    out
}

// ============================================================================
// Ingestion
// ============================================================================

#[test]
fn test_load_full_fixture() {
    let dataset = load_fixture("transactions.csv");

    assert_eq!(dataset.len(), 10);
    assert!(dataset.has_status());
    assert!(dataset.has_dates());
    assert_eq!(dataset.fingerprint().len(), 64);

    let records = dataset.records();
    assert_eq!(records[0].location.as_deref(), Some("LAGOS"));
    assert_eq!(records[2].location.as_deref(), Some("ABUJA"));
    assert_eq!(records[4].location, None);
    assert_eq!(records[6].location.as_deref(), Some("PH"));

    assert_eq!(records[3].success, 1, "SUCCESS is case-insensitive");
    assert_eq!(records[1].success, 0);

    assert_eq!(records[6].total_amount, None);
    assert_eq!(records[7].transaction_date, None, "empty date is missing");
    assert_eq!(records[0].transaction_date, Some(date(2024, 3, 1)));
}

#[test]
fn test_load_reports_unreadable_amount() {
    let dataset = load_fixture("transactions.csv");
    assert_eq!(
        dataset.warnings(),
        &[LoadWarning::MissingValue {
            column: "total_amount".to_string(),
            row: 6,
            value: "n/a".to_string(),
        }]
    );
}

#[test]
fn test_load_missing_required_columns() {
    let err = load_file(
        fixtures_path().join("missing_columns.csv"),
        &AnalyticsConfig::default(),
    )
    .unwrap_err();

    assert!(matches!(err, AnalyticsError::MalformedInput(_)));
    let msg = err.to_string();
    assert!(msg.contains("masked_card_no"));
    assert!(msg.contains("total_amount"));
}

#[test]
fn test_load_unparseable_date_fails_whole_load() {
    let csv = "merchant_name,device_name,masked_card_no,occurrences,total_amount,transaction_date\n\
               A,POS,C1,1,100,2024-01-01\n\
               B,POS,C2,1,200,yesterday\n";
    let err = load(csv.as_bytes(), &AnalyticsConfig::default()).unwrap_err();
    assert_eq!(err.error_code(), "MALFORMED_INPUT");
    assert!(err.to_string().contains("yesterday"));
}

#[test]
fn test_occurrences_near_u64_max_do_not_overflow() {
    let csv = "merchant_name,device_name,masked_card_no,occurrences,total_amount\n\
               A,D,C1,18446744073709551615,10\n\
               B,D,C2,5,20\n\
               C,D,C3,1e19,30\n";
    let dataset = load(csv.as_bytes(), &AnalyticsConfig::default()).unwrap();
    assert!(dataset.warnings().is_empty());

    let summary = dataset.metrics(&AnalyticsConfig::default());
    assert_eq!(summary.total_transactions, u64::MAX);
    assert_eq!(summary.total_amount, 60.0);

    let cards = top_groups(&dataset, GroupKey::Card, Measure::Occurrences, 2);
    assert_eq!(cards[0].key, "C1");
    assert_eq!(cards[1].key, "C3");
}

#[test]
fn test_load_missing_file_is_io_error() {
    let err = load_file(
        fixtures_path().join("does_not_exist.csv"),
        &AnalyticsConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.error_code(), "IO_ERROR");
}

#[test]
fn test_custom_date_format() {
    let csv = "merchant_name,device_name,masked_card_no,occurrences,total_amount,transaction_date\n\
               A,POS,C1,1,100,03/15/2024\n";
    let config = AnalyticsConfig::builder()
        .date_formats(["%m/%d/%Y"])
        .build()
        .unwrap();
    let dataset = load(csv.as_bytes(), &config).unwrap();
    assert_eq!(dataset.records()[0].transaction_date, Some(date(2024, 3, 15)));

    // The default formats do not accept it.
    assert!(load(csv.as_bytes(), &AnalyticsConfig::default()).is_err());
}

// ============================================================================
// Bad Amount Scenario
// ============================================================================

#[test]
fn test_bad_amount_row_counts_but_does_not_sum() {
    let dataset = load_fixture("required_only.csv");

    assert!(!dataset.has_status());
    assert_eq!(dataset.len(), 3);

    let summary = dataset.metrics(&AnalyticsConfig::default());
    assert_eq!(summary.record_count, 3);
    assert_eq!(summary.total_amount, 150.0);
    assert_eq!(summary.success_rate, None);
    assert_eq!(summary.missing_amount_count, 1);

    let merchants = group_by(&dataset, GroupKey::Merchant);
    let a = merchants.iter().find(|g| g.key == "A").unwrap();
    assert_eq!(a.total_amount, 150.0);
    let b = merchants.iter().find(|g| g.key == "B").unwrap();
    assert_eq!(b.total_amount, 0.0);
    assert_eq!(b.record_count, 1);
}

// ============================================================================
// Metrics
// ============================================================================

#[test]
fn test_full_fixture_metrics() {
    let dataset = load_fixture("transactions.csv");
    let summary = dataset.metrics(&AnalyticsConfig::default());

    assert_eq!(summary.record_count, 10);
    assert_eq!(summary.total_transactions, 27);
    assert!((summary.total_amount - 28750.5).abs() < 1e-9);
    assert!((summary.avg_transaction_value - 28750.5 / 27.0).abs() < 1e-9);
    assert_eq!(summary.success_rate, Some(80.0));
    assert_eq!(summary.distinct_merchants, 5);
    assert_eq!(summary.distinct_devices, 3);
    assert_eq!(summary.distinct_cards, 6);
    // 5000 is not strictly above the threshold
    assert_eq!(summary.high_value_count, 2);
    assert_eq!(summary.zero_amount_count, 1);
    assert_eq!(summary.max_amount, Some(12000.0));
    assert_eq!(summary.min_amount, Some(0.0));
    assert_eq!(summary.max_occurrences, Some(6));
}

#[test]
fn test_threshold_is_configurable() {
    let dataset = load_fixture("transactions.csv");
    let config = AnalyticsConfig::builder()
        .high_value_threshold(1000.0)
        .build()
        .unwrap();
    assert_eq!(dataset.metrics(&config).high_value_count, 5);
}

// ============================================================================
// Filtering
// ============================================================================

#[test]
fn test_unrestricted_filter_keeps_everything() {
    let dataset = load_fixture("transactions.csv");
    let criteria = FilterCriteria::new();
    assert!(criteria.is_unrestricted());

    let view = dataset.filter(&criteria);
    assert_eq!(view.len(), dataset.len());

    let config = AnalyticsConfig::default();
    assert_eq!(view.metrics(&config), dataset.metrics(&config));
}

#[test]
fn test_amount_range_is_inclusive() {
    let dataset = load_fixture("transactions.csv");
    let view = dataset.filter(&FilterCriteria::new().amount_between(800.0, 5000.0));

    let mut amounts: Vec<f64> = view.records().filter_map(|r| r.total_amount).collect();
    amounts.sort_by(f64::total_cmp);
    assert_eq!(amounts, vec![800.0, 1200.5, 2500.0, 5000.0]);
    assert_eq!(view.len(), 4, "missing amount fails an active range");
}

#[test]
fn test_date_range_skips_undated_rows() {
    let dataset = load_fixture("transactions.csv");
    let view =
        dataset.filter(&FilterCriteria::new().date_between(date(2024, 3, 2), date(2024, 3, 3)));
    assert_eq!(view.indices(), &[2, 3, 4, 5]);
}

#[test]
fn test_min_occurrences() {
    let dataset = load_fixture("transactions.csv");
    let view = dataset.filter(&FilterCriteria::new().min_occurrences(3));
    assert_eq!(view.len(), 4);
    assert!(view.records().all(|r| r.occurrences_or_zero() >= 3));
}

#[test]
fn test_predicates_are_anded() {
    let dataset = load_fixture("transactions.csv");
    let criteria = FilterCriteria::new().devices(["POS"]).min_amount(1000.0);
    let view = dataset.filter(&criteria);

    assert_eq!(view.indices(), &[0, 2, 8]);
    for record in view.records() {
        assert!(criteria.matches(record));
    }
}

#[test]
fn test_filtered_totals_never_exceed_overall() {
    let dataset = load_fixture("transactions.csv");
    let config = AnalyticsConfig::default();
    let overall = dataset.metrics(&config);

    let selections = [
        FilterCriteria::new().merchants(["Shoprite LAGOS"]),
        FilterCriteria::new().devices(["WEB", "MOBILE"]),
        FilterCriteria::new().min_occurrences(2).max_amount(3000.0),
        FilterCriteria::new().merchants(["Nobody"]),
    ];
    for criteria in &selections {
        let filtered = dataset.filter(criteria).metrics(&config);
        assert!(filtered.record_count <= overall.record_count);
        assert!(filtered.total_amount <= overall.total_amount);
        assert!(filtered.total_transactions <= overall.total_transactions);
    }
}

#[test]
fn test_empty_result_is_a_warning_not_an_error() {
    let dataset = load_fixture("transactions.csv");
    let view = dataset.filter(&FilterCriteria::new().merchants(["Nobody"]));

    assert!(view.is_empty());
    assert_eq!(view.warnings(), vec![LoadWarning::EmptyResult]);
    assert_eq!(
        view.metrics(&AnalyticsConfig::default()),
        MetricSummary {
            success_rate: Some(0.0),
            ..MetricSummary::default()
        }
    );
}

#[test]
fn test_filter_criteria_from_json() {
    let dataset = load_fixture("transactions.csv");
    let criteria: FilterCriteria = serde_json::from_str(
        r#"{"merchants": ["Jumia Online"], "start_date": "2024-03-04"}"#,
    )
    .unwrap();
    let view = dataset.filter(&criteria);
    assert_eq!(view.indices(), &[9]);
}

#[test]
fn test_filter_options() {
    let dataset = load_fixture("transactions.csv");
    assert_eq!(
        dataset.merchant_options(),
        vec![
            "Shoprite LAGOS",
            "Chicken Republic ABUJA",
            "Jumia Online",
            "Total Energies PH",
            "Filmhouse Cinemas",
        ]
    );
    assert_eq!(dataset.device_options(), vec!["POS", "WEB", "MOBILE"]);
    assert_eq!(dataset.date_bounds(), Some((date(2024, 3, 1), date(2024, 3, 5))));
    assert_eq!(dataset.amount_bounds(), Some((0.0, 12000.0)));
}

// ============================================================================
// Rankings
// ============================================================================

#[test]
fn test_top_merchants() {
    let dataset = load_fixture("transactions.csv");

    let by_transactions = top_groups(&dataset, GroupKey::Merchant, Measure::Occurrences, 3);
    let keys: Vec<&str> = by_transactions.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, vec!["Shoprite LAGOS", "Jumia Online", "Chicken Republic ABUJA"]);
    assert_eq!(by_transactions[0].occurrences, 12);

    let by_amount = top_groups(&dataset, GroupKey::Merchant, Measure::TotalAmount, 10);
    let keys: Vec<&str> = by_amount.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "Jumia Online",
            "Chicken Republic ABUJA",
            "Shoprite LAGOS",
            "Filmhouse Cinemas",
            "Total Energies PH",
        ]
    );
}

#[test]
fn test_top_n_properties() {
    let dataset = load_fixture("transactions.csv");
    let groups = group_by(&dataset, GroupKey::Card);
    let group_count = groups.len();

    for n in [0, 1, 3, 100] {
        let top = top_n(groups.clone(), Measure::TotalAmount, n);
        assert_eq!(top.len(), n.min(group_count));
        assert!(
            top.windows(2)
                .all(|w| w[0].value(Measure::TotalAmount) >= w[1].value(Measure::TotalAmount))
        );
        assert_eq!(top_n(top.clone(), Measure::TotalAmount, n), top);
    }
}

#[test]
fn test_card_regression_on_fixture() {
    let dataset = load_fixture("transactions.csv");
    let fit = fit_top_cards(&dataset, 10).unwrap();

    assert_eq!(fit.n_samples, 6);
    assert_eq!(fit.cards[0], "5399****1111");
    assert!(fit.slope.is_finite());
    assert!((0.0..=1.0).contains(&fit.r_squared));
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn test_export_round_trip() {
    let dataset = load_fixture("transactions.csv");
    let criteria = FilterCriteria::new().devices(["POS", "MOBILE"]);
    let view = dataset.filter(&criteria);

    let bytes = export_to_bytes(&dataset, &criteria);
    let reloaded = load(&bytes, &AnalyticsConfig::default()).unwrap();

    let expected: Vec<_> = view.records().cloned().collect();
    assert_eq!(reloaded.records(), expected.as_slice());
    assert_eq!(
        reloaded.metrics(&AnalyticsConfig::default()),
        view.metrics(&AnalyticsConfig::default())
    );
}

#[test]
fn test_export_keeps_original_text() {
    let dataset = load_fixture("transactions.csv");
    let bytes = export_to_bytes(&dataset, &FilterCriteria::new().merchants(["Total Energies PH"]));
    let text = String::from_utf8(bytes).unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "merchant_name,device_name,masked_card_no,occurrences,total_amount,status,transaction_date"
    );
    assert_eq!(lines[1], "Total Energies PH,POS,4187****5555,2,n/a,Success,2024-03-04");
    assert_eq!(lines.len(), 2);
}

#[test]
fn test_export_empty_view_writes_header_only() {
    let dataset = load_fixture("required_only.csv");
    let bytes = export_to_bytes(&dataset, &FilterCriteria::new().merchants(["Nobody"]));
    let text = String::from_utf8(bytes).unwrap();
    assert_eq!(text.lines().count(), 1);
}

// ============================================================================
// Session & Report
// ============================================================================

#[test]
fn test_session_end_to_end() {
    let bytes = std::fs::read(fixtures_path().join("transactions.csv")).unwrap();
    let mut session = Session::new(AnalyticsConfig::default());

    assert_eq!(
        session.report().unwrap_err().error_code(),
        "NO_DATA_LOADED"
    );

    session.upload(&bytes).unwrap();
    session.set_filters(FilterCriteria::new().merchants(["Jumia Online"]));
    let report = session.report().unwrap();

    assert_eq!(report.overall.record_count, 10);
    assert_eq!(report.filtered.record_count, 3);
    assert_eq!(report.filtered.total_amount, 17000.0);
    assert_eq!(report.top_merchants_by_amount.len(), 1);
    assert_eq!(report.device_usage[0].key, "WEB");
    assert_eq!(report.daily_totals.len(), 2);
    assert_eq!(report.amount_histogram.iter().map(|b| b.count).sum::<usize>(), 3);
    let largest: Vec<Option<f64>> =
        report.largest_transactions.iter().map(|r| r.total_amount).collect();
    assert_eq!(largest, vec![Some(12000.0), Some(5000.0), Some(0.0)]);

    // Same bytes again: served from the session memo.
    session.upload(&bytes).unwrap();
    assert_eq!(session.cached_uploads(), 1);
}

#[test]
fn test_registry_keeps_uploads_apart() {
    let full = std::fs::read(fixtures_path().join("transactions.csv")).unwrap();
    let small = std::fs::read(fixtures_path().join("required_only.csv")).unwrap();

    let registry = SessionRegistry::new(AnalyticsConfig::default());
    registry.open("first");
    registry.open("second");

    registry
        .with_session_mut("first", |s| s.upload(&full).map(|d| d.len()))
        .unwrap()
        .unwrap();
    registry
        .with_session_mut("second", |s| s.upload(&small).map(|d| d.len()))
        .unwrap()
        .unwrap();

    let first_len = registry
        .with_session("first", |s| s.dataset().map(|d| d.len()).unwrap())
        .unwrap();
    let second_len = registry
        .with_session("second", |s| s.dataset().map(|d| d.len()).unwrap())
        .unwrap();
    assert_eq!(first_len, 10);
    assert_eq!(second_len, 3);
}
