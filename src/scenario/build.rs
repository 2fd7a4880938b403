//! 场景构建
//!
//! 依次执行各个规划步骤，任何一步失败都带着步骤名返回；全部成功后实例化网络、
//! 挂上观测输出并安装流量应用。这一阶段不推进仿真时间。

use std::path::PathBuf;

use tracing::{debug, info};

use super::config::ScenarioConfig;
use crate::app::InstalledFlow;
use crate::error::{BuildStep, ConfigError, ScenarioError};
use crate::net::{DeviceId, NetWorld, Network};
use crate::plan::{
    FlowPlan, GlobalRoutes, SubnetPlan, TopologyPlan, bridge_switches, build_topology,
    build_wireless_cell, plan_addresses, plan_flow, populate_routing_tables,
};
use crate::sim::Simulator;
use crate::trace::{AsciiTrace, CaptureMode, Instrumentation, PcapCapture};

/// 全部规划步骤的结果
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioPlan {
    pub topology: TopologyPlan,
    pub subnets: SubnetPlan,
    pub routes: GlobalRoutes,
    pub flow: FlowPlan,
}

/// 只做规划，不实例化网络
pub fn plan_scenario(cfg: &ScenarioConfig) -> Result<ScenarioPlan, ScenarioError> {
    let mut topology = build_topology(&cfg.counts, &cfg.csma, cfg.switch_b_members)
        .map_err(ScenarioError::config(BuildStep::Topology))?;
    bridge_switches(&mut topology).map_err(ScenarioError::config(BuildStep::Bridging))?;
    build_wireless_cell(&mut topology, &cfg.wifi, &cfg.mobility)
        .map_err(ScenarioError::config(BuildStep::WirelessCell))?;
    let subnets = plan_addresses(&mut topology, &cfg.addressing)
        .map_err(ScenarioError::config(BuildStep::Addressing))?;
    let routes = populate_routing_tables(&topology, &subnets)
        .map_err(ScenarioError::config(BuildStep::Routing))?;
    let flow = plan_flow(&topology, &subnets, &cfg.flow)
        .map_err(ScenarioError::config(BuildStep::FlowDriver))?;

    let last_stop = flow.sink.window.stop.max(flow.source.window.stop);
    if cfg.horizon < last_stop {
        return Err(ScenarioError::Config {
            step: BuildStep::Run,
            source: ConfigError::HorizonBeforeStop {
                horizon: cfg.horizon,
                stop: last_stop,
            },
        });
    }

    debug!(
        nodes = topology.nodes.len(),
        devices = topology.devices.len(),
        subnets = subnets.entries.len(),
        "场景规划完成"
    );
    Ok(ScenarioPlan {
        topology,
        subnets,
        routes,
        flow,
    })
}

/// 构建完成、等待运行的场景
pub struct Scenario {
    pub(crate) cfg: ScenarioConfig,
    pub(crate) plan: ScenarioPlan,
    pub(crate) sim: Simulator,
    pub(crate) world: NetWorld,
    pub(crate) installed: InstalledFlow,
}

impl Scenario {
    pub fn build(cfg: ScenarioConfig) -> Result<Self, ScenarioError> {
        let plan = plan_scenario(&cfg)?;

        let mut net = Network::from_plan(&plan.topology, &plan.subnets, plan.routes.clone(), cfg.seed);
        net.tcp.set_config(cfg.tcp.clone());
        net.set_instrumentation(instrument(&cfg, &plan)?);

        let mut sim = Simulator::default();
        net.start(&mut sim);
        let installed = net.install_flow(&plan.flow, &mut sim);

        info!(
            wired_hosts = cfg.counts.wired_hosts,
            stations = cfg.counts.stations,
            horizon = %cfg.horizon,
            "🧩 场景构建完成"
        );
        Ok(Self {
            cfg,
            plan,
            sim,
            world: NetWorld::new(net),
            installed,
        })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.cfg
    }

    pub fn plan(&self) -> &ScenarioPlan {
        &self.plan
    }

    pub fn network(&self) -> &Network {
        &self.world.net
    }

    pub fn installed(&self) -> InstalledFlow {
        self.installed
    }
}

/// `<prefix>-<node>-<device 在节点上的下标>.pcap`
fn pcap_path(cfg: &ScenarioConfig, topo: &TopologyPlan, dev: DeviceId) -> Option<PathBuf> {
    let owner = topo.device(dev).node;
    let index = topo
        .node(owner)
        .devices
        .iter()
        .position(|&d| d == dev)
        .unwrap_or(0);
    cfg.artifacts.path(&format!("-{}-{}.pcap", owner.0, index))
}

/// 路由器的有线局域网网卡混杂抓包，接入点的无线网卡非混杂抓包，有线设备写 ASCII 跟踪
fn instrument(cfg: &ScenarioConfig, plan: &ScenarioPlan) -> Result<Instrumentation, ScenarioError> {
    let Some(tr) = cfg.artifacts.path(".tr") else {
        return Ok(Instrumentation::default());
    };
    let topo = &plan.topology;
    let ascii = AsciiTrace::create(&tr).map_err(|source| ScenarioError::Artifact {
        step: BuildStep::Instrumentation,
        path: tr.clone(),
        source,
    })?;
    let mut instr = Instrumentation::default().with_ascii(ascii);

    let router = topo.groups.router;
    let targets = [
        (
            topo.device_on(router, &topo.segments.lan),
            CaptureMode::Promiscuous,
        ),
        (
            topo.cell.as_ref().map(|c| c.access_point),
            CaptureMode::Host,
        ),
    ];
    for (dev, mode) in targets {
        let Some(dev) = dev else { continue };
        let Some(path) = pcap_path(cfg, topo, dev) else {
            continue;
        };
        let capture =
            PcapCapture::create(&path, dev, mode).map_err(|source| ScenarioError::Pcap {
                step: BuildStep::Instrumentation,
                path: path.clone(),
                source,
            })?;
        instr = instr.with_pcap(capture);
    }
    Ok(instr)
}
