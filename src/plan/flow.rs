//! 流量规划
//!
//! 一条 TCP 流：有线主机上的接收端，移动站点上的 On/Off 发送端。
//! 端点用具名策略选取，端点地址必须来自地址规划。

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::error::ConfigError;
use crate::net::NodeId;
use crate::sim::SimTime;

use super::addressing::{SubnetKind, SubnetPlan};
use super::topology::TopologyPlan;

/// 应用的活跃区间 [start, stop]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveWindow {
    pub start: SimTime,
    pub stop: SimTime,
}

impl ActiveWindow {
    pub fn new(start: SimTime, stop: SimTime) -> Self {
        Self { start, stop }
    }

    pub fn contains(&self, other: &ActiveWindow) -> bool {
        self.start <= other.start && other.stop <= self.stop
    }
}

/// 接收端所在主机
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkHost {
    /// 按创建顺序的第 i 台有线主机
    Index(usize),
    Last,
}

impl Default for SinkHost {
    fn default() -> Self {
        SinkHost::Index(3)
    }
}

/// 发送端所在站点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceStation {
    /// 最后创建的站点
    #[default]
    Last,
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnOffTiming {
    pub data_rate_bps: u64,
    pub on_time: SimTime,
    pub off_time: SimTime,
}

impl Default for OnOffTiming {
    fn default() -> Self {
        Self {
            data_rate_bps: 500_000,
            on_time: SimTime::from_secs(1),
            off_time: SimTime::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowConfig {
    pub sink_host: SinkHost,
    pub source_station: SourceStation,
    pub port: u16,
    pub payload_size: u32,
    pub max_bytes: u64,
    pub sink_window: ActiveWindow,
    pub source_window: ActiveWindow,
    pub timing: OnOffTiming,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            sink_host: SinkHost::default(),
            source_station: SourceStation::default(),
            port: 50,
            payload_size: 1024,
            max_bytes: 102_400,
            sink_window: ActiveWindow::new(SimTime::from_secs(1), SimTime::from_secs(360)),
            source_window: ActiveWindow::new(SimTime::from_secs(2), SimTime::from_secs(360)),
            timing: OnOffTiming::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkEndpoint {
    pub node: NodeId,
    pub local: SocketAddrV4,
    pub window: ActiveWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceEndpoint {
    pub node: NodeId,
    pub local_addr: Ipv4Addr,
    pub remote: SocketAddrV4,
    pub payload_size: u32,
    pub max_bytes: u64,
    pub window: ActiveWindow,
    pub timing: OnOffTiming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowPlan {
    pub sink: SinkEndpoint,
    pub source: SourceEndpoint,
}

fn check_window(what: &'static str, w: &ActiveWindow) -> Result<(), ConfigError> {
    if w.start >= w.stop {
        return Err(ConfigError::EmptyInterval {
            what,
            start: w.start,
            stop: w.stop,
        });
    }
    Ok(())
}

/// 选定端点并绑定地址
pub fn plan_flow(
    topo: &TopologyPlan,
    subnets: &SubnetPlan,
    cfg: &FlowConfig,
) -> Result<FlowPlan, ConfigError> {
    if cfg.port == 0 {
        return Err(ConfigError::ZeroValue { what: "sink port" });
    }
    if cfg.payload_size == 0 {
        return Err(ConfigError::ZeroValue {
            what: "payload size",
        });
    }
    if cfg.max_bytes == 0 {
        return Err(ConfigError::ZeroValue { what: "byte budget" });
    }
    if cfg.timing.data_rate_bps == 0 {
        return Err(ConfigError::ZeroValue {
            what: "source data rate",
        });
    }
    check_window("sink", &cfg.sink_window)?;
    check_window("source", &cfg.source_window)?;
    if !cfg.sink_window.contains(&cfg.source_window) {
        return Err(ConfigError::SinkDoesNotCoverSource {
            sink_start: cfg.sink_window.start,
            sink_stop: cfg.sink_window.stop,
            source_start: cfg.source_window.start,
            source_stop: cfg.source_window.stop,
        });
    }

    let hosts = &topo.groups.hosts;
    let sink_node = match cfg.sink_host {
        SinkHost::Index(i) => hosts.get(i).copied().ok_or(ConfigError::InvalidTopologyIndex {
            group: "wired hosts",
            index: i,
            len: hosts.len(),
        })?,
        SinkHost::Last => hosts.last().copied().ok_or(ConfigError::InvalidCount {
            what: "wired hosts",
            got: 0,
            min: 1,
        })?,
    };

    let stations = &topo.groups.stations;
    if stations.is_empty() {
        return Err(ConfigError::NoSourceStation);
    }
    let source_node = match cfg.source_station {
        SourceStation::Last => stations[stations.len() - 1],
        SourceStation::Index(i) => {
            stations
                .get(i)
                .copied()
                .ok_or(ConfigError::InvalidTopologyIndex {
                    group: "stations",
                    index: i,
                    len: stations.len(),
                })?
        }
    };

    let sink_addr = endpoint_addr(topo, subnets, SubnetKind::WiredLan, "sink", sink_node)?;
    let source_addr = endpoint_addr(topo, subnets, SubnetKind::Wireless, "source", source_node)?;

    let sink_local = SocketAddrV4::new(sink_addr, cfg.port);
    Ok(FlowPlan {
        sink: SinkEndpoint {
            node: sink_node,
            local: sink_local,
            window: cfg.sink_window,
        },
        source: SourceEndpoint {
            node: source_node,
            local_addr: source_addr,
            remote: sink_local,
            payload_size: cfg.payload_size,
            max_bytes: cfg.max_bytes,
            window: cfg.source_window,
            timing: cfg.timing,
        },
    })
}

fn endpoint_addr(
    topo: &TopologyPlan,
    subnets: &SubnetPlan,
    kind: SubnetKind,
    endpoint: &'static str,
    node: NodeId,
) -> Result<Ipv4Addr, ConfigError> {
    let dangling = |net| ConfigError::DanglingEndpoint {
        endpoint,
        node,
        net,
    };
    let Some(entry) = subnets.entry(kind) else {
        return Err(dangling(Ipv4Addr::UNSPECIFIED.into()));
    };
    topo.device_on(node, &entry.devices)
        .and_then(|dev| entry.address_of(dev))
        .ok_or_else(|| dangling(entry.net))
}
