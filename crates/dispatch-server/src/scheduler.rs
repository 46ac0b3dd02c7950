//! Periodic triggering of the pipeline tasks

use dispatch_core::config::ScheduleConfig;
use dispatch_core::tasks::{PipelineTasks, TaskKind, TaskRun};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Run one task to completion. The tasks log their own outcomes.
pub async fn run_task(tasks: &PipelineTasks, kind: TaskKind) -> anyhow::Result<()> {
    match kind {
        TaskKind::Upload => {
            tasks.run_upload().await?;
        }
        TaskKind::Reconciliation => {
            tasks.run_reconciliation().await?;
        }
        TaskKind::Escalation => {
            if let TaskRun::Completed(stale) = tasks.run_escalation().await? {
                if !stale.is_empty() {
                    let ids: Vec<_> = stale.iter().map(|letter| letter.id).collect();
                    log::error!("{} letter(s) past the print SLA: {:?}", ids.len(), ids);
                }
            }
        }
    }
    Ok(())
}

/// Trigger `kind` every `period`. Each tick runs in its own task, so a slow
/// run does not delay the ticker; overlapping runs are refused by the task guard.
pub async fn run_periodically(tasks: Arc<PipelineTasks>, kind: TaskKind, period: Duration) {
    log::info!("Scheduling {} every {}s", kind, period.as_secs());

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let tasks = tasks.clone();
        tokio::spawn(async move {
            if let Err(e) = run_task(&tasks, kind).await {
                log::error!("{} run failed: {}", kind, e);
            }
        });
    }
}

/// Run all three schedules until one of them stops or the process is interrupted
pub async fn run_all(tasks: Arc<PipelineTasks>, schedule: &ScheduleConfig) -> anyhow::Result<()> {
    let upload_handle = tokio::spawn(run_periodically(
        tasks.clone(),
        TaskKind::Upload,
        Duration::from_secs(schedule.upload_interval_secs),
    ));
    let reconciliation_handle = tokio::spawn(run_periodically(
        tasks.clone(),
        TaskKind::Reconciliation,
        Duration::from_secs(schedule.reconciliation_interval_secs),
    ));
    let escalation_handle = tokio::spawn(run_periodically(
        tasks,
        TaskKind::Escalation,
        Duration::from_secs(schedule.escalation_interval_secs),
    ));

    tokio::select! {
        result = upload_handle => {
            anyhow::bail!("Upload schedule stopped: {:?}", result);
        }
        result = reconciliation_handle => {
            anyhow::bail!("Reconciliation schedule stopped: {:?}", result);
        }
        result = escalation_handle => {
            anyhow::bail!("Escalation schedule stopped: {:?}", result);
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Shutdown requested");
        }
    }

    Ok(())
}

pub fn parse_task_kind(name: &str) -> Option<TaskKind> {
    match name {
        "upload" => Some(TaskKind::Upload),
        "reports" | "reconciliation" => Some(TaskKind::Reconciliation),
        "escalation" | "sla" => Some(TaskKind::Escalation),
        _ => None,
    }
}
