mod bridge;
mod mobility;
mod packet;
mod routing_table;
mod simulator;
mod tcp;
mod wifi_mac;
mod wireless;

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::mobility::MobilityConfig;
use crate::net::CsmaChannelConfig;
use crate::plan::{
    AddressingConfig, SegmentMembership, SubnetPlan, TopologyCounts, TopologyPlan, WifiCellConfig,
    bridge_switches, build_topology, build_wireless_cell, plan_addresses,
};

fn counts(wired_hosts: usize, stations: usize) -> TopologyCounts {
    TopologyCounts {
        wired_hosts,
        stations,
    }
}

/// 拓扑 + 网桥 + 无线小区
fn cell_plan(wired_hosts: usize, stations: usize) -> TopologyPlan {
    let mut plan = build_topology(
        &counts(wired_hosts, stations),
        &CsmaChannelConfig::default(),
        SegmentMembership::AllMembers,
    )
    .expect("topology");
    bridge_switches(&mut plan).expect("bridges");
    build_wireless_cell(&mut plan, &WifiCellConfig::default(), &MobilityConfig::default())
        .expect("wireless cell");
    plan
}

/// 完成地址规划的拓扑
fn addressed_plan(wired_hosts: usize, stations: usize) -> (TopologyPlan, SubnetPlan) {
    let mut plan = cell_plan(wired_hosts, stations);
    let subnets = plan_addresses(&mut plan, &AddressingConfig::default()).expect("addresses");
    (plan, subnets)
}

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "hybridnet-rs-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}
