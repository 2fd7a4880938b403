//! 运行控制
//!
//! 运行到 horizon（或事件队列为空），随后写出流统计并关闭所有观测文件。

use std::fs::File;
use std::io::{BufWriter, Write};

use tracing::info;

use super::build::Scenario;
use crate::app::AppId;
use crate::error::{BuildStep, ScenarioError};
use crate::monitor::FlowMonitorReport;
use crate::net::Stats;
use crate::sim::RunOutcome;
use crate::trace::TraceArtifact;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub flows: FlowMonitorReport,
    pub sink_rx_bytes: u64,
    pub source_tx_bytes: u64,
    pub stats: Stats,
    pub artifacts: Vec<TraceArtifact>,
}

impl Scenario {
    /// 唯一的阻塞调用
    pub fn run(self) -> Result<RunSummary, ScenarioError> {
        let Scenario {
            cfg,
            mut sim,
            mut world,
            installed,
            ..
        } = self;

        let outcome = sim.run_until(cfg.horizon, &mut world);
        let net = &mut world.net;
        let flows = net.monitor().report();

        let mut artifacts = net.take_instrumentation().finish()?;
        if let Some(path) = cfg.artifacts.path(".flowmon.json") {
            let artifact_err = |source: std::io::Error| ScenarioError::Artifact {
                step: BuildStep::Run,
                path: path.clone(),
                source,
            };
            let mut out = BufWriter::new(File::create(&path).map_err(artifact_err)?);
            flows.write_json(&mut out)?;
            out.flush().map_err(artifact_err)?;
            artifacts.push(TraceArtifact {
                path,
                records: flows.flows.len() as u64,
            });
        }

        let sink_rx_bytes = match installed.sink {
            AppId::Sink(i) => net.apps().sink(i).map_or(0, |s| s.total_rx()),
            AppId::Source(_) => 0,
        };
        let source_tx_bytes = match installed.source {
            AppId::Source(i) => net.apps().source(i).map_or(0, |s| s.total_tx()),
            AppId::Sink(_) => 0,
        };
        info!(
            reason = ?outcome.reason,
            events = outcome.events,
            sink_rx_bytes,
            source_tx_bytes,
            flows = flows.flows.len(),
            "🏁 场景运行结束"
        );

        Ok(RunSummary {
            outcome,
            flows,
            sink_rx_bytes,
            source_tx_bytes,
            stats: net.stats.clone(),
            artifacts,
        })
    }
}
