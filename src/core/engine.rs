use crate::config::descriptor::LocationOverride;
use crate::config::job::{LoadStep, SaveStep, TransferJob};
use crate::core::pipeline::TransferPipeline;
use crate::domain::ports::Backends;
use crate::utils::error::Result;
use crate::utils::monitor::TransferMonitor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub records_loaded: usize,
    pub destination: String,
    /// Rows reported by the database for relational targets.
    pub rows_written: Option<u64>,
}

/// Runs a [`TransferJob`]: one load, then one save.
pub struct TransferEngine<'a, B: Backends> {
    backends: &'a B,
    monitor: TransferMonitor,
}

impl<'a, B: Backends> TransferEngine<'a, B> {
    pub fn new(backends: &'a B) -> Self {
        Self::new_with_monitoring(backends, false)
    }

    pub fn new_with_monitoring(backends: &'a B, monitor_enabled: bool) -> Self {
        Self {
            backends,
            monitor: TransferMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&mut self, job: &TransferJob) -> Result<TransferReport> {
        tracing::info!(job = %job.name, "starting transfer");
        let mut pipeline = TransferPipeline::new(self.backends, job.descriptor.clone());

        let records_loaded = match &job.load {
            LoadStep::Blob { format } => {
                pipeline
                    .load_from(&LocationOverride::none(), *format)
                    .await?
                    .len()
            }
            LoadStep::Relational => pipeline.load_from_relational(None).await?.len(),
        };
        self.monitor.log_phase("load", records_loaded);

        let report = match &job.save {
            SaveStep::Blob { format } => {
                let location = pipeline
                    .save_to(&LocationOverride::none(), *format)
                    .await?;
                TransferReport {
                    records_loaded,
                    destination: location.to_string(),
                    rows_written: None,
                }
            }
            SaveStep::Relational { policy } => {
                let rows = pipeline.save_to_relational(policy).await?;
                TransferReport {
                    records_loaded,
                    destination: format!(
                        "{}.{} ({})",
                        job.descriptor.target.schema.as_deref().unwrap_or_default(),
                        job.descriptor.target.table.as_deref().unwrap_or_default(),
                        policy.name()
                    ),
                    rows_written: Some(rows),
                }
            }
        };
        self.monitor.log_phase("save", records_loaded);

        tracing::info!(
            job = %job.name,
            records = report.records_loaded,
            destination = %report.destination,
            "transfer finished"
        );
        Ok(report)
    }
}
