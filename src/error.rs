//! 错误类型
//!
//! 配置阶段的错误全部在仿真开始前检测并返回；运行期的协议问题只体现在统计里。

use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use ipnet::Ipv4Net;
use thiserror::Error;

use crate::net::{DeviceId, NodeId};
use crate::sim::SimTime;

/// 配置错误（拓扑/桥接/地址/流量规划阶段）
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{what} must be at least {min}, got {got}")]
    InvalidCount {
        what: &'static str,
        got: usize,
        min: usize,
    },

    #[error("index {index} is out of range for {group} ({len} available)")]
    InvalidTopologyIndex {
        group: &'static str,
        index: usize,
        len: usize,
    },

    #[error("node {node:?} is not a switch and cannot carry a bridge")]
    NotASwitch { node: NodeId },

    #[error("bridge on {node:?} needs at least one port")]
    EmptyBridge { node: NodeId },

    #[error("device {device:?} belongs to {owner:?}, not to bridge node {node:?}")]
    ForeignBridgePort {
        node: NodeId,
        device: DeviceId,
        owner: NodeId,
    },

    #[error("device {device:?} carries address {addr}; it cannot be bridged")]
    BridgeOnAddressedDevice { device: DeviceId, addr: Ipv4Addr },

    #[error("device {device:?} is already a port of the bridge on {bridge:?}")]
    AlreadyBridged { device: DeviceId, bridge: NodeId },

    #[error("device {device:?} is not attached to a wired segment")]
    NotWired { device: DeviceId },

    #[error("wireless cell already exists on medium {medium}")]
    WirelessCellExists { medium: usize },

    #[error("subnet {net} uses /{got} but the plan requires /{expected}")]
    MismatchedMask { net: Ipv4Net, got: u8, expected: u8 },

    #[error("subnets {a} and {b} overlap")]
    OverlappingSubnets { a: Ipv4Net, b: Ipv4Net },

    #[error("subnet {net} has no room for {needed} addresses")]
    AddressSpaceExhausted { net: Ipv4Net, needed: usize },

    #[error("device {device:?} is already addressed as {addr}")]
    DeviceAlreadyAddressed { device: DeviceId, addr: Ipv4Addr },

    #[error("device {device:?} is a bridge port and cannot carry an address")]
    AddressOnBridgedDevice { device: DeviceId },

    #[error("routing needs an addressed topology, but subnet plan is empty")]
    NothingToRoute,

    #[error("no mobile station exists to host the traffic source")]
    NoSourceStation,

    #[error("{endpoint} endpoint on {node:?} has no address in {net}")]
    DanglingEndpoint {
        endpoint: &'static str,
        node: NodeId,
        net: Ipv4Net,
    },

    #[error("{what} must be non-zero")]
    ZeroValue { what: &'static str },

    #[error("{what} interval [{start}, {stop}] is empty")]
    EmptyInterval {
        what: &'static str,
        start: SimTime,
        stop: SimTime,
    },

    #[error(
        "sink interval [{sink_start}, {sink_stop}] must contain source interval [{source_start}, {source_stop}]"
    )]
    SinkDoesNotCoverSource {
        sink_start: SimTime,
        sink_stop: SimTime,
        source_start: SimTime,
        source_stop: SimTime,
    },

    #[error("horizon {horizon} ends before application stop time {stop}")]
    HorizonBeforeStop { horizon: SimTime, stop: SimTime },
}

/// 构建步骤（用于在错误信息里指出失败的规划阶段）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    Topology,
    Bridging,
    WirelessCell,
    Addressing,
    Routing,
    FlowDriver,
    Instrumentation,
    Run,
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStep::Topology => "topology",
            BuildStep::Bridging => "bridging",
            BuildStep::WirelessCell => "wireless cell",
            BuildStep::Addressing => "addressing",
            BuildStep::Routing => "routing",
            BuildStep::FlowDriver => "flow driver",
            BuildStep::Instrumentation => "instrumentation",
            BuildStep::Run => "run",
        };
        f.write_str(name)
    }
}

/// 场景级错误：规划失败或产物写出失败
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("{step} failed: {source}")]
    Config {
        step: BuildStep,
        #[source]
        source: ConfigError,
    },

    #[error("{step} failed: cannot write {}: {source}", path.display())]
    Artifact {
        step: BuildStep,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} failed: pcap capture {}: {source}", path.display())]
    Pcap {
        step: BuildStep,
        path: PathBuf,
        #[source]
        source: pcap_file::PcapError,
    },

    #[error("run failed: cannot serialize flow statistics: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ScenarioError {
    pub fn config(step: BuildStep) -> impl FnOnce(ConfigError) -> ScenarioError {
        move |source| ScenarioError::Config { step, source }
    }

    /// 失败的构建步骤
    pub fn step(&self) -> BuildStep {
        match self {
            ScenarioError::Config { step, .. }
            | ScenarioError::Artifact { step, .. }
            | ScenarioError::Pcap { step, .. } => *step,
            ScenarioError::Serialize(_) => BuildStep::Run,
        }
    }
}
