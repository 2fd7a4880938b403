//! 有线 / 无线混合局域网场景
//!
//! 4 台有线主机经两台交换机、一台路由器接到一个 802.11 小区，
//! 最后一个移动站点向第 4 台有线主机发送一条 TCP On/Off 流。
//! 产物写到当前目录：`hybrid-lan.tr`、两个 `.pcap`、`hybrid-lan.flowmon.json`。

use std::process::ExitCode;

use clap::{ArgAction, Parser};
use hybridnet_rs::plan::TopologyCounts;
use hybridnet_rs::scenario::{ArtifactConfig, Scenario, ScenarioConfig};

#[derive(Debug, Parser)]
#[command(name = "hybrid_lan", about = "有线 / 无线混合局域网：站点 -> 有线主机单流")]
struct Args {
    /// 有线主机数量
    #[arg(long = "nCsma", default_value_t = 4)]
    n_csma: usize,
    /// 移动站点数量
    #[arg(long = "nWifi", default_value_t = 5)]
    n_wifi: usize,
    /// 输出应用层日志
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "info".to_string()
    } else {
        "info,hybridnet_rs::app=warn".to_string()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let cfg = ScenarioConfig {
        counts: TopologyCounts {
            wired_hosts: args.n_csma,
            stations: args.n_wifi,
        },
        artifacts: ArtifactConfig::current_dir(),
        ..ScenarioConfig::default()
    };

    let summary = match Scenario::build(cfg).and_then(Scenario::run) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "sink_rx_bytes={} source_tx_bytes={} flows={} events={}",
        summary.sink_rx_bytes,
        summary.source_tx_bytes,
        summary.flows.flows.len(),
        summary.outcome.events
    );
    for artifact in &summary.artifacts {
        println!("artifact {} ({} records)", artifact.path.display(), artifact.records);
    }
    ExitCode::SUCCESS
}
