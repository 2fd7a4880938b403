//! 场景规划
//!
//! 拓扑 → 网桥 → 无线小区 → 地址 → 路由 → 流量，每一步接收上一步的规划并返回新的规划或错误，
//! 整个过程不推进仿真时间。

mod addressing;
mod bridge;
mod flow;
mod routing;
mod topology;
mod wireless;

pub use addressing::{
    AddressingConfig, Ipv4AddressAllocator, SubnetEntry, SubnetKind, SubnetPlan, plan_addresses,
};
pub use bridge::{BridgeRole, bridge_switches, configure_bridge};
pub use flow::{
    ActiveWindow, FlowConfig, FlowPlan, OnOffTiming, SinkEndpoint, SinkHost, SourceEndpoint,
    SourceStation, plan_flow,
};
pub use routing::{GlobalRoutes, Route, populate_routing_tables};
pub use topology::{
    DeviceSpec, MediumSpec, NodeGroups, NodeSpec, SegmentMembership, TopologyCounts, TopologyPlan,
    WiredSegments, build_topology,
};
pub use wireless::{WifiCellConfig, WirelessCell, build_wireless_cell};
