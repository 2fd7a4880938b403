//! 无线小区
//!
//! 一个共享的无线信道，接入点一块 AP 网卡，每个站点一块 STA 网卡，全部绑定同一个 SSID。
//! 站点按网格摆放并随机游走，接入点占下一个格点并保持静止。

use tracing::debug;

use crate::error::ConfigError;
use crate::mobility::{
    GridPositionAllocator, MobilityAssignment, MobilityConfig, MobilityModelSpec,
};
use crate::net::{ChannelId, ChannelKind, DeviceId, DeviceKind, WifiMacConfig, WifiMacRole};
use crate::sim::SimTime;

use super::topology::TopologyPlan;

#[derive(Debug, Clone, PartialEq)]
pub struct WifiCellConfig {
    pub mac: WifiMacConfig,
    pub channel_delay: SimTime,
}

impl Default for WifiCellConfig {
    fn default() -> Self {
        Self {
            mac: WifiMacConfig::default(),
            channel_delay: SimTime::from_nanos(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WirelessCell {
    pub medium: ChannelId,
    /// 站点网卡，按站点创建顺序
    pub stations: Vec<DeviceId>,
    pub access_point: DeviceId,
    pub mac: WifiMacConfig,
}

impl WirelessCell {
    pub fn ssid(&self) -> &str {
        &self.mac.ssid
    }
}

/// 建立无线小区并写入 `plan.cell` 与 `plan.mobility`
pub fn build_wireless_cell(
    plan: &mut TopologyPlan,
    cfg: &WifiCellConfig,
    mobility: &MobilityConfig,
) -> Result<WirelessCell, ConfigError> {
    if let Some(cell) = &plan.cell {
        return Err(ConfigError::WirelessCellExists {
            medium: cell.medium.0,
        });
    }
    if cfg.mac.ssid.is_empty() {
        return Err(ConfigError::ZeroValue { what: "SSID length" });
    }

    let medium = plan.add_medium(ChannelKind::Wifi {
        delay: cfg.channel_delay,
    });
    let station_nodes = plan.groups.stations.clone();
    let stations: Vec<DeviceId> = station_nodes
        .iter()
        .map(|&sta| plan.add_device(sta, medium, DeviceKind::Wifi(WifiMacRole::Station)))
        .collect();
    let ap_node = plan.groups.access_point;
    let access_point =
        plan.add_device(ap_node, medium, DeviceKind::Wifi(WifiMacRole::AccessPoint));

    let mut grid = GridPositionAllocator::new(mobility.grid, station_nodes.len());
    for &sta in &station_nodes {
        plan.mobility.push(MobilityAssignment {
            node: sta,
            initial: grid.next_position(),
            model: MobilityModelSpec::RandomWalk2d(mobility.walk),
        });
    }
    plan.mobility.push(MobilityAssignment {
        node: ap_node,
        initial: grid.next_position(),
        model: MobilityModelSpec::ConstantPosition,
    });

    let cell = WirelessCell {
        medium,
        stations,
        access_point,
        mac: cfg.mac.clone(),
    };
    debug!(
        ssid = %cell.ssid(),
        stations = cell.stations.len(),
        "📡 无线小区已建立"
    );
    plan.cell = Some(cell.clone());
    Ok(cell)
}
