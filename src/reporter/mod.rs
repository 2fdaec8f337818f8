
use std::collections::BTreeMap;

use chrono::Utc;
use log::{debug, warn};

use crate::config::{ReporterConfig, SamplingOptions};
use crate::error::{Result, StatusError};
use crate::metrics::{MetricsProvider, Report, Sample, SysinfoMetrics};
use crate::registry::{NodeClient, NodeRegistry, RosMaster, RosNodeClient};

/// Snapshots of CPU and memory usage for the machine and for every node the
/// registry knows about.
///
/// All work is sequential: with N nodes a report costs N lookups plus N
/// sampling windows. Nothing is cached between calls.
pub struct StatusReporter {
    registry: Box<dyn NodeRegistry>,
    nodes: Box<dyn NodeClient>,
    metrics: Box<dyn MetricsProvider>,
    config: ReporterConfig,
}

impl StatusReporter {
    pub fn new(
        registry: Box<dyn NodeRegistry>,
        nodes: Box<dyn NodeClient>,
        metrics: Box<dyn MetricsProvider>,
        config: ReporterConfig,
    ) -> Self {
        StatusReporter {
            registry,
            nodes,
            metrics,
            config,
        }
    }

    /// Reporter wired to the ROS master in `config` and to `sysinfo`.
    pub fn connect(config: ReporterConfig) -> Result<Self> {
        let metrics = SysinfoMetrics::new()?;
        Ok(StatusReporter::new(
            Box::new(RosMaster::from_config(&config)),
            Box::new(RosNodeClient::from_config(&config)),
            Box::new(metrics),
            config,
        ))
    }

    pub async fn full_report(&self, options: SamplingOptions) -> Result<Report> {
        let memory = self.metrics.system_memory()?;
        let mem_percent = memory.used_percent().ok_or_else(|| {
            StatusError::MetricsUnavailable("total memory reported as zero".to_string())
        })?;
        let cpu_percent = self
            .metrics
            .system_cpu_percent(options.sampling_window)
            .await?;

        let (nodes, errors) = if self.config.isolate_failures {
            self.all_nodes_stat_isolated(options).await?
        } else {
            (self.all_nodes_stat(options).await?, BTreeMap::new())
        };

        Ok(Report {
            captured_at: Utc::now(),
            cpu_percent,
            mem_percent,
            nodes,
            errors,
        })
    }

    /// Samples every registered node. The first failure aborts the call.
    pub async fn all_nodes_stat(&self, options: SamplingOptions) -> Result<BTreeMap<String, Sample>> {
        let mut stats = BTreeMap::new();
        for (name, pid) in self.node_pids().await? {
            let sample = self.pid_stat(pid, options).await?;
            stats.insert(name, sample);
        }
        Ok(stats)
    }

    /// Like `all_nodes_stat`, but a node that cannot be resolved or sampled
    /// lands in the second map instead of failing the batch. Listing the
    /// registered names can still fail the whole call.
    pub async fn all_nodes_stat_isolated(
        &self,
        options: SamplingOptions,
    ) -> Result<(BTreeMap<String, Sample>, BTreeMap<String, String>)> {
        let mut stats = BTreeMap::new();
        let mut errors = BTreeMap::new();
        for name in self.node_names().await? {
            match self.node_stat(&name, options).await {
                Ok(sample) => {
                    stats.insert(name, sample);
                }
                Err(err) => {
                    warn!("skipping node {}: {}", name, err);
                    errors.insert(name, err.to_string());
                }
            }
        }
        Ok((stats, errors))
    }

    pub async fn node_stat(&self, name: &str, options: SamplingOptions) -> Result<Sample> {
        let pid = self.get_pid(name).await?;
        self.pid_stat(pid, options).await
    }

    /// CPU is divided by the logical CPU count, so a process saturating one
    /// core on a 4-core machine reads 25.
    pub async fn pid_stat(&self, pid: u32, options: SamplingOptions) -> Result<Sample> {
        let raw_cpu = self
            .metrics
            .process_cpu_percent(pid, options.sampling_window)
            .await?;
        let cores = self.metrics.logical_cpu_count().max(1);
        let mem_percent = self.metrics.process_memory_percent(pid)?;

        Ok(Sample {
            cpu_percent: raw_cpu / cores as f64,
            mem_percent,
        })
    }

    pub async fn node_pids(&self) -> Result<BTreeMap<String, u32>> {
        let mut pids = BTreeMap::new();
        for name in self.node_names().await? {
            let pid = self.get_pid(&name).await?;
            pids.insert(name, pid);
        }
        Ok(pids)
    }

    pub async fn node_names(&self) -> Result<Vec<String>> {
        Ok(self.registry.node_names().await?)
    }

    pub async fn get_pid(&self, name: &str) -> Result<u32> {
        let uri = self
            .registry
            .lookup_node(name)
            .await
            .map_err(|err| StatusError::lookup(name, err))?;
        let pid = self
            .nodes
            .get_pid(&uri)
            .await
            .map_err(|err| StatusError::lookup(name, format!("{} ({})", err, uri)))?;
        debug!("node {} at {} has pid {}", name, uri, pid);
        Ok(pid)
    }
}
