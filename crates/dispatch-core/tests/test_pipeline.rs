use chrono::{Duration, Utc};
use dispatch_core::config::{SlaConfig, TransferConfig};
use dispatch_core::{
    EscalationScanner, FileLetterStore, InMemoryLetterStore, LetterService, LetterStore, LocalDirectoryChannel,
    PipelineTasks, ReportParser, ReportReconciler, StaticHolidays, SubmissionOutcome, SubmitLetter, TaskRun,
    TransferGateway,
};
use dispatch_types::{Letter, LetterStatus, PdfDoc};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

fn make_pdf(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let pages_id = doc.new_object_id();
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", text);
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        "Contents" => content_id,
    });
    let kids: Vec<Object> = vec![page_id.into()];
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

struct Harness {
    _dir: TempDir,
    upload_dir: PathBuf,
    report_dir: PathBuf,
    store: Arc<dyn LetterStore>,
    service: LetterService,
    tasks: PipelineTasks,
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn harness(store: Arc<dyn LetterStore>, dir: TempDir) -> Harness {
    init_logging();
    let upload_dir = dir.path().join("to_print");
    let report_dir = dir.path().join("reports");
    std::fs::create_dir_all(&upload_dir).unwrap();
    std::fs::create_dir_all(&report_dir).unwrap();

    let config: TransferConfig = serde_json::from_value(serde_json::json!({
        "upload_dir": upload_dir,
        "report_dir": report_dir,
        "timeout_secs": 5,
        "max_attempts": 2,
        "backoff": { "strategy": "fixed", "initial_delay_ms": 0 }
    }))
    .unwrap();

    let channel = Arc::new(LocalDirectoryChannel::new(&upload_dir, &report_dir, "csv"));
    let gateway = TransferGateway::new(channel.clone(), store.clone(), &config);
    let reconciler = ReportReconciler::new(channel, store.clone(), ReportParser::default(), &config, true);
    let scanner = EscalationScanner::new(store.clone(), Arc::new(StaticHolidays::new(Vec::new())), SlaConfig::default());

    Harness {
        _dir: dir,
        upload_dir,
        report_dir,
        store: store.clone(),
        service: LetterService::new(store, 60).unwrap(),
        tasks: PipelineTasks::new(Arc::new(gateway), Arc::new(reconciler), Arc::new(scanner)),
    }
}

fn request(service: &str, text: &str) -> SubmitLetter {
    SubmitLetter {
        letter_type: "claim_form".to_string(),
        service: service.to_string(),
        documents: vec![PdfDoc::new("letter.pdf", make_pdf(text))],
        additional_data: None,
        copies: None,
    }
}

fn uploaded_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn write_report(dir: &Path, name: &str, file_names: &[&str]) {
    let mut csv = String::from("Date,Time,Filename\n");
    for file_name in file_names {
        csv.push_str(&format!("2024-01-09,09:15,{}\n", file_name));
    }
    std::fs::write(dir.join(name), csv).unwrap();
}

fn completed<T>(run: TaskRun<T>) -> T {
    match run {
        TaskRun::Completed(value) => value,
        TaskRun::AlreadyRunning => panic!("task unexpectedly already running"),
    }
}

#[tokio::test]
async fn test_letter_goes_from_submission_to_posted() {
    let h = harness(Arc::new(InMemoryLetterStore::new()), TempDir::new().unwrap());

    let outcome = h.service.submit(request("cmc", "Dear Sir")).await.unwrap();
    let id = match outcome {
        SubmissionOutcome::Created(id) => id,
        other => panic!("expected a new letter, got {:?}", other),
    };
    assert_eq!(h.store.get(id).await.unwrap().unwrap().status, LetterStatus::Validated);

    let cycle = completed(h.tasks.run_upload().await.unwrap());
    assert_eq!(cycle.uploaded_count(), 1);

    let files = uploaded_files(&h.upload_dir);
    assert_eq!(files.len(), 1);
    let archive_name = &files[0];
    assert!(archive_name.starts_with("claim_form_cmc_"));
    assert!(archive_name.ends_with(&format!("{}.zip", id)));

    let mut archive = zip::ZipArchive::new(std::fs::File::open(h.upload_dir.join(archive_name)).unwrap()).unwrap();
    assert_eq!(archive.len(), 1);
    let mut entry = archive.by_index(0).unwrap();
    assert!(entry.name().ends_with(".pdf"));
    let mut pdf = Vec::new();
    entry.read_to_end(&mut pdf).unwrap();
    assert!(pdf.starts_with(b"%PDF"));

    let letter = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(letter.status, LetterStatus::AwaitingConfirmation);
    assert!(letter.sent_to_print_at.is_some());
    assert!(letter.file_content.is_none(), "content should be dropped once uploaded");

    let stem = archive_name.trim_end_matches(".zip").to_string();
    write_report(&h.report_dir, "report_1.csv", &[&format!("{}.pdf", stem)]);

    let summary = completed(h.tasks.run_reconciliation().await.unwrap());
    assert_eq!(summary.reports_processed, 1);
    assert_eq!(summary.letters_posted, 1);
    assert_eq!(summary.reports_deleted, 1);
    assert!(!h.report_dir.join("report_1.csv").exists());

    let status = h.service.status(id).await.unwrap().unwrap();
    assert_eq!(status.status, LetterStatus::Posted);
    assert!(status.printed_at.is_some());

    // Nothing left to do on a second pass
    let again = completed(h.tasks.run_reconciliation().await.unwrap());
    assert_eq!(again.reports_processed, 0);
    let upload_again = completed(h.tasks.run_upload().await.unwrap());
    assert_eq!(upload_again.outcomes.len(), 0);
}

#[tokio::test]
async fn test_replayed_report_does_not_change_posted_letters() {
    let h = harness(Arc::new(InMemoryLetterStore::new()), TempDir::new().unwrap());

    let id = h.service.submit(request("cmc", "Replay")).await.unwrap().id();
    completed(h.tasks.run_upload().await.unwrap());
    let stem = uploaded_files(&h.upload_dir)[0].trim_end_matches(".zip").to_string();

    write_report(&h.report_dir, "first.csv", &[&stem]);
    completed(h.tasks.run_reconciliation().await.unwrap());
    let printed_at = h.store.get(id).await.unwrap().unwrap().printed_at;

    write_report(&h.report_dir, "second.csv", &[&stem]);
    let summary = completed(h.tasks.run_reconciliation().await.unwrap());
    assert_eq!(summary.letters_posted, 0);

    let letter = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(letter.status, LetterStatus::Posted);
    assert_eq!(letter.printed_at, printed_at);
}

#[tokio::test]
async fn test_unconfirmed_letter_is_escalated() {
    let h = harness(Arc::new(InMemoryLetterStore::new()), TempDir::new().unwrap());

    let id = h.service.submit(request("probate", "Late")).await.unwrap().id();
    completed(h.tasks.run_upload().await.unwrap());

    let nothing_yet = completed(h.tasks.run_escalation().await.unwrap());
    assert!(nothing_yet.is_empty());

    // Scanning with a clock well past the SLA picks the letter up
    let scanner = EscalationScanner::new(
        h.store.clone(),
        Arc::new(StaticHolidays::new(Vec::new())),
        SlaConfig::default(),
    );
    let stale = scanner.scan(Utc::now() + Duration::days(10)).await.unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].id, id);
    assert_eq!(stale[0].service, "probate");
}

#[tokio::test]
async fn test_unreachable_destination_leaves_letters_validated() {
    let h = harness(Arc::new(InMemoryLetterStore::new()), TempDir::new().unwrap());
    let id = h.service.submit(request("cmc", "Offline")).await.unwrap().id();

    std::fs::remove_dir_all(&h.upload_dir).unwrap();

    let cycle = completed(h.tasks.run_upload().await.unwrap());
    assert!(cycle.was_skipped());
    assert_eq!(h.store.get(id).await.unwrap().unwrap().status, LetterStatus::Validated);
}

#[tokio::test]
async fn test_letter_type_cannot_escape_upload_dir() {
    let h = harness(Arc::new(InMemoryLetterStore::new()), TempDir::new().unwrap());

    let mut letter = Letter::new("../../escaped", "cmc", "checksum", make_pdf("Escape"));
    letter.status = LetterStatus::Validated;
    let id = letter.id;
    h.store.insert(letter).await.unwrap();

    let cycle = completed(h.tasks.run_upload().await.unwrap());

    assert_eq!(cycle.failed_ids(), vec![id]);
    assert_eq!(h.store.get(id).await.unwrap().unwrap().status, LetterStatus::FailedToUpload);
    assert!(uploaded_files(&h.upload_dir).is_empty());
    let root = h.upload_dir.parent().unwrap();
    assert_eq!(uploaded_files(root), vec!["reports".to_string(), "to_print".to_string()]);
}

#[tokio::test]
async fn test_file_store_survives_restart_mid_pipeline() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("letters");

    let id: Uuid = {
        let store = Arc::new(FileLetterStore::new(&data_dir).unwrap());
        let h = harness(store, TempDir::new().unwrap());
        let id = h.service.submit(request("cmc", "Persisted")).await.unwrap().id();
        completed(h.tasks.run_upload().await.unwrap());
        id
    };

    let reopened = FileLetterStore::new(&data_dir).unwrap();
    let letter = reopened.get(id).await.unwrap().expect("letter should be persisted");
    assert_eq!(letter.status, LetterStatus::AwaitingConfirmation);

    let awaiting = reopened.find_by_status(LetterStatus::AwaitingConfirmation).await.unwrap();
    assert_eq!(awaiting.len(), 1);
}
