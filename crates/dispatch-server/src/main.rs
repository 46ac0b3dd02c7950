//! Letter dispatch service executable
//!
//! Runs the upload, reconciliation and escalation schedules, or a single
//! task or submission from the command line.

mod scheduler;

use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use dispatch_core::{
    BankHolidaysClient, DispatchConfig, EscalationScanner, FileLetterStore, InMemoryLetterStore, LetterService,
    LetterStore, LocalDirectoryChannel, PipelineTasks, ReportParser, ReportReconciler, SubmissionOutcome,
    SubmitLetter, TransferGateway,
};
use dispatch_types::PdfDoc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with INFO as default if RUST_LOG not set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("dispatch-server")
        .version("1.0.0")
        .about("Letter dispatch and print reconciliation service")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/app/config/dispatch.json"),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Letter store directory, overrides storage.data_dir"),
        )
        .arg(
            Arg::new("in-memory")
                .long("in-memory")
                .help("Keep letters in memory only")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("run-once")
                .long("run-once")
                .value_name("TASK")
                .help("Run one task and exit: upload, reports or escalation"),
        )
        .arg(
            Arg::new("submit")
                .long("submit")
                .value_name("PDF")
                .num_args(1..)
                .help("Submit the given PDF files as one letter")
                .requires("service"),
        )
        .arg(
            Arg::new("service")
                .long("service")
                .value_name("NAME")
                .help("Originating service of a submitted letter"),
        )
        .arg(
            Arg::new("letter-type")
                .long("letter-type")
                .value_name("TYPE")
                .help("Type of a submitted letter")
                .default_value("letter"),
        )
        .arg(
            Arg::new("status")
                .long("status")
                .value_name("ID")
                .help("Print the status of a letter"),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .context("config path is required")?;
    let mut config = DispatchConfig::from_file(config_path)?;
    log::info!("Loaded configuration from {}", config_path);

    if let Some(data_dir) = matches.get_one::<String>("data-dir") {
        config.storage.data_dir = PathBuf::from(data_dir);
    }

    let store: Arc<dyn LetterStore> = if matches.get_flag("in-memory") {
        log::warn!("Using in-memory letter store, letters are lost on exit");
        Arc::new(InMemoryLetterStore::new())
    } else {
        let store = FileLetterStore::new(&config.storage.data_dir)?;
        log::info!("Using letter store at {}", config.storage.data_dir.display());
        Arc::new(store)
    };

    if let Some(files) = matches.get_many::<String>("submit") {
        let service = matches.get_one::<String>("service").context("--service is required")?;
        let letter_type = matches
            .get_one::<String>("letter-type")
            .context("--letter-type is required")?;
        let files: Vec<&String> = files.collect();
        return submit(&config, store, letter_type, service, &files).await;
    }

    if let Some(id) = matches.get_one::<String>("status") {
        let id = Uuid::parse_str(id).with_context(|| format!("Invalid letter id '{}'", id))?;
        let service = LetterService::new(store, config.dedup.window_minutes)?;
        match service.status(id).await? {
            Some(view) => println!("{}", serde_json::to_string_pretty(&view)?),
            None => anyhow::bail!("Letter {} not found", id),
        }
        return Ok(());
    }

    let tasks = Arc::new(build_tasks(&config, store)?);
    log::info!("Initialized transfer gateway, reconciler and escalation scanner");

    if let Some(task) = matches.get_one::<String>("run-once") {
        let kind = scheduler::parse_task_kind(task).with_context(|| format!("Unknown task '{}'", task))?;
        log::info!("Running {} once", kind);
        return scheduler::run_task(&tasks, kind).await;
    }

    scheduler::run_all(tasks, &config.schedule).await
}

fn build_tasks(config: &DispatchConfig, store: Arc<dyn LetterStore>) -> anyhow::Result<PipelineTasks> {
    let channel = Arc::new(LocalDirectoryChannel::new(
        &config.transfer.upload_dir,
        &config.transfer.report_dir,
        config.reports.extension.clone(),
    ));
    let holidays = Arc::new(BankHolidaysClient::new(config.holidays.clone())?);

    let gateway = TransferGateway::new(channel.clone(), store.clone(), &config.transfer);
    let reconciler = ReportReconciler::new(
        channel,
        store.clone(),
        ReportParser::from_config(&config.reports),
        &config.transfer,
        config.reports.delete_processed,
    );
    let scanner = EscalationScanner::new(store, holidays, config.sla.clone());

    Ok(PipelineTasks::new(Arc::new(gateway), Arc::new(reconciler), Arc::new(scanner)))
}

async fn submit(
    config: &DispatchConfig,
    store: Arc<dyn LetterStore>,
    letter_type: &str,
    service: &str,
    files: &[&String],
) -> anyhow::Result<()> {
    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        documents.push(read_document(Path::new(file.as_str()))?);
    }

    let letter_service = LetterService::new(store, config.dedup.window_minutes)?;
    let outcome = letter_service
        .submit(SubmitLetter {
            letter_type: letter_type.to_string(),
            service: service.to_string(),
            documents,
            additional_data: None,
            copies: None,
        })
        .await?;

    match outcome {
        SubmissionOutcome::Created(id) => log::info!("Created letter {}", id),
        SubmissionOutcome::Duplicate(id) => log::info!("Duplicate of letter {}, not created again", id),
    }
    println!("{}", outcome.id());
    Ok(())
}

fn read_document(path: &Path) -> anyhow::Result<PdfDoc> {
    let content = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name {}", path.display()))?;
    Ok(PdfDoc::new(filename, content))
}
