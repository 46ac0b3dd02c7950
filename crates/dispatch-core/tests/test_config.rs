use dispatch_core::config::{BackoffStrategy, DispatchConfig, MAX_DEDUP_WINDOW_MINUTES};
use dispatch_core::{InMemoryLetterStore, LetterService, ReportFormat};
use chrono::NaiveTime;
use std::path::PathBuf;
use std::sync::Arc;

#[test]
fn test_minimal_config_uses_defaults() {
    let json = r#"{
        "transfer": {
            "upload_dir": "/mnt/vendor/to_print",
            "report_dir": "/mnt/vendor/reports"
        }
    }"#;

    let config = DispatchConfig::from_json_str(json).expect("Failed to parse config");

    assert_eq!(config.transfer.upload_dir, PathBuf::from("/mnt/vendor/to_print"));
    assert_eq!(config.transfer.max_attempts, 3);
    assert_eq!(config.transfer.timeout_secs, 30);
    assert_eq!(config.transfer.backoff.strategy, BackoffStrategy::Exponential);
    assert!(config.transfer.downtime.is_none());

    assert_eq!(config.reports.format, ReportFormat::RowFilename);
    assert_eq!(config.reports.extension, "csv");
    assert!(config.reports.delete_processed);

    assert_eq!(config.dedup.window_minutes, 60);
    assert_eq!(config.sla.business_days, 2);
    assert_eq!(config.sla.cutoff_time, NaiveTime::from_hms_opt(16, 0, 0).unwrap());
    assert_eq!(config.holidays.division, "england-and-wales");
    assert_eq!(config.storage.data_dir, PathBuf::from("/data/letters"));
}

#[test]
fn test_full_config_with_aliases() {
    let json = r#"{
        "transfer": {
            "upload_path": "/upload",
            "report_path": "/reports",
            "timeout_secs": 10,
            "max_attempts": 5,
            "backoff": { "strategy": "fixed", "initial_delay_ms": 250 },
            "max_letters_per_cycle": 50,
            "downtime": { "from": "16:00:00", "to": "17:00:00" }
        },
        "reports": { "format": "report_filename", "extension": "txt", "delete_processed": false },
        "dedup": { "window_minutes": 15 },
        "sla": { "business_days": 3, "cutoff_time": "12:30:00" },
        "holidays": { "base_url": "http://localhost:9000/holidays.json", "division": "scotland" },
        "schedule": { "upload_interval_secs": 60 },
        "storage": { "data_dir": "/tmp/letters" }
    }"#;

    let config = DispatchConfig::from_json_str(json).expect("Failed to parse config");

    assert_eq!(config.transfer.upload_dir, PathBuf::from("/upload"), "upload_path should map to upload_dir");
    assert_eq!(config.transfer.backoff.strategy, BackoffStrategy::Fixed);
    assert_eq!(config.transfer.backoff.initial_delay_ms, 250);
    assert_eq!(config.transfer.backoff.max_delay_ms, 30_000);
    let downtime = config.transfer.downtime.expect("downtime window");
    assert!(downtime.contains(NaiveTime::from_hms_opt(16, 30, 0).unwrap()));

    assert_eq!(config.reports.format, ReportFormat::ReportFilename);
    assert!(!config.reports.delete_processed);
    assert_eq!(config.reports.date_column, "Date");
    assert_eq!(config.dedup.window_minutes, 15);
    assert_eq!(config.sla.cutoff_time, NaiveTime::from_hms_opt(12, 30, 0).unwrap());
    assert_eq!(config.holidays.url, "http://localhost:9000/holidays.json");
    assert_eq!(config.schedule.upload_interval_secs, 60);
    assert_eq!(config.schedule.escalation_interval_secs, 86_400);
}

#[test]
fn test_missing_transfer_section_is_rejected() {
    let result = DispatchConfig::from_json_str("{}");
    assert!(result.is_err());
}

#[test]
fn test_zero_attempts_is_rejected() {
    let json = r#"{ "transfer": { "upload_dir": "/a", "report_dir": "/b", "max_attempts": 0 } }"#;
    let err = DispatchConfig::from_json_str(json).unwrap_err();
    assert!(err.to_string().contains("max_attempts"));
}

#[test]
fn test_zero_schedule_interval_is_rejected() {
    for field in ["upload_interval_secs", "reconciliation_interval_secs", "escalation_interval_secs"] {
        let json = format!(
            r#"{{ "transfer": {{ "upload_dir": "/a", "report_dir": "/b" }}, "schedule": {{ "{}": 0 }} }}"#,
            field
        );
        let err = DispatchConfig::from_json_str(&json).unwrap_err();
        assert!(err.to_string().contains(field), "{} = 0 accepted", field);
    }
}

#[test]
fn test_dedup_window_out_of_range_is_rejected() {
    for window in [i64::MAX, MAX_DEDUP_WINDOW_MINUTES + 1, -1] {
        let json = format!(
            r#"{{ "transfer": {{ "upload_dir": "/a", "report_dir": "/b" }}, "dedup": {{ "window_minutes": {} }} }}"#,
            window
        );
        assert!(DispatchConfig::from_json_str(&json).is_err(), "window {} accepted", window);
    }

    let json = format!(
        r#"{{ "transfer": {{ "upload_dir": "/a", "report_dir": "/b" }}, "dedup": {{ "window_minutes": {} }} }}"#,
        MAX_DEDUP_WINDOW_MINUTES
    );
    let config = DispatchConfig::from_json_str(&json).unwrap();
    assert!(LetterService::new(Arc::new(InMemoryLetterStore::new()), config.dedup.window_minutes).is_ok());
}

#[test]
fn test_zero_letters_per_cycle_is_rejected() {
    let json = r#"{ "transfer": { "upload_dir": "/a", "report_dir": "/b", "max_letters_per_cycle": 0 } }"#;
    let err = DispatchConfig::from_json_str(json).unwrap_err();
    assert!(err.to_string().contains("max_letters_per_cycle"));
}

#[test]
fn test_shared_upload_and_report_dir_is_rejected() {
    let json = r#"{ "transfer": { "upload_dir": "/same", "report_dir": "/same" } }"#;
    assert!(DispatchConfig::from_json_str(json).is_err());
}

#[test]
fn test_downtime_window_wrapping_midnight() {
    let json = r#"{
        "transfer": {
            "upload_dir": "/a",
            "report_dir": "/b",
            "downtime": { "from": "23:00:00", "to": "01:00:00" }
        }
    }"#;
    let window = DispatchConfig::from_json_str(json).unwrap().transfer.downtime.unwrap();

    assert!(window.contains(NaiveTime::from_hms_opt(23, 30, 0).unwrap()));
    assert!(window.contains(NaiveTime::from_hms_opt(0, 30, 0).unwrap()));
    assert!(!window.contains(NaiveTime::from_hms_opt(1, 0, 0).unwrap()));
    assert!(!window.contains(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
}

#[test]
fn test_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dispatch.json");
    std::fs::write(&path, r#"{ "transfer": { "upload_dir": "/a", "report_dir": "/b" } }"#).unwrap();

    let config = DispatchConfig::from_file(&path).unwrap();
    assert_eq!(config.transfer.report_dir, PathBuf::from("/b"));

    assert!(DispatchConfig::from_file(dir.path().join("missing.json")).is_err());
}
