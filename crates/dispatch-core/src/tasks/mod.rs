//! Independently triggered pipeline tasks, each guarded against overlapping runs

pub mod single_flight;

pub use single_flight::{SingleFlight, SingleFlightPermit};

use crate::error::Result;
use crate::reports::{ReconciliationSummary, ReportReconciler};
use crate::sla::{EscalationScanner, StaleLetter};
use crate::transfer::{TransferGateway, UploadCycleReport};
use chrono::Utc;
use log::info;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Upload,
    Reconciliation,
    Escalation,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Upload => "upload",
            Self::Reconciliation => "reconciliation",
            Self::Escalation => "escalation",
        };
        f.write_str(name)
    }
}

/// Outcome of triggering a task
#[derive(Debug)]
pub enum TaskRun<T> {
    Completed(T),
    /// A previous run of the same task had not finished
    AlreadyRunning,
}

pub struct PipelineTasks {
    gateway: Arc<TransferGateway>,
    reconciler: Arc<ReportReconciler>,
    scanner: Arc<EscalationScanner>,
    upload_guard: SingleFlight,
    reconciliation_guard: SingleFlight,
    escalation_guard: SingleFlight,
}

impl PipelineTasks {
    pub fn new(gateway: Arc<TransferGateway>, reconciler: Arc<ReportReconciler>, scanner: Arc<EscalationScanner>) -> Self {
        Self {
            gateway,
            reconciler,
            scanner,
            upload_guard: SingleFlight::new(TaskKind::Upload),
            reconciliation_guard: SingleFlight::new(TaskKind::Reconciliation),
            escalation_guard: SingleFlight::new(TaskKind::Escalation),
        }
    }

    pub async fn run_upload(&self) -> Result<TaskRun<UploadCycleReport>> {
        guarded(&self.upload_guard, self.gateway.run_upload_cycle()).await
    }

    pub async fn run_reconciliation(&self) -> Result<TaskRun<ReconciliationSummary>> {
        guarded(&self.reconciliation_guard, self.reconciler.run_reconciliation_cycle()).await
    }

    pub async fn run_escalation(&self) -> Result<TaskRun<Vec<StaleLetter>>> {
        guarded(&self.escalation_guard, self.scanner.scan(Utc::now())).await
    }
}

async fn guarded<T, F>(guard: &SingleFlight, run: F) -> Result<TaskRun<T>>
where
    F: Future<Output = Result<T>>,
{
    let Some(_permit) = guard.try_acquire() else {
        info!("Skipping {} run, previous run still in progress", guard.kind());
        return Ok(TaskRun::AlreadyRunning);
    };

    run.await.map(TaskRun::Completed)
}
