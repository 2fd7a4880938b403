//! 设备（网卡）
//!
//! 设备是节点接入某个信道的端点。设备种类与二/三层角色都是带标签的枚举：
//! 一个设备要么是网桥端口，要么携带地址，二者在类型上互斥。

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use super::id::{ChannelId, DeviceId, NodeId};
use crate::queue::{DropTailQueue, mem_from_pkt};

/// CSMA 设备默认队列长度（包）
pub const CSMA_QUEUE_PKTS: u64 = 100;
/// 无线 MAC 队列默认长度（包）
pub const WIFI_QUEUE_PKTS: u64 = 500;

/// 无线 MAC 角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WifiMacRole {
    Station,
    AccessPoint,
}

/// 设备种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// 有线 CSMA 网卡
    Csma,
    /// 无线网卡
    Wifi(WifiMacRole),
}

impl DeviceKind {
    pub fn is_wired(self) -> bool {
        matches!(self, DeviceKind::Csma)
    }

    /// 二层封装开销（字节）
    pub fn l2_overhead(self) -> u32 {
        match self {
            // Ethernet header + FCS
            DeviceKind::Csma => 18,
            // 802.11 MAC header + LLC/SNAP + FCS
            DeviceKind::Wifi(_) => 36,
        }
    }
}

/// 设备的二/三层角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    /// 尚未桥接也未分配地址
    Unassigned,
    /// 网桥端口：透明转发，不携带地址
    BridgePort { bridge: NodeId },
    /// 携带 IPv4 地址
    Addressed { addr: Ipv4Addr, net: Ipv4Net },
}

impl DeviceRole {
    pub fn addr(&self) -> Option<Ipv4Addr> {
        match self {
            DeviceRole::Addressed { addr, .. } => Some(*addr),
            DeviceRole::Unassigned | DeviceRole::BridgePort { .. } => None,
        }
    }

    pub fn bridge(&self) -> Option<NodeId> {
        match self {
            DeviceRole::BridgePort { bridge } => Some(*bridge),
            DeviceRole::Unassigned | DeviceRole::Addressed { .. } => None,
        }
    }
}

/// 运行时设备
#[derive(Debug)]
pub struct Device {
    pub id: DeviceId,
    pub node: NodeId,
    pub channel: ChannelId,
    pub kind: DeviceKind,
    pub role: DeviceRole,
    /// 发送队列
    pub queue: DropTailQueue,
    /// 正在信道上发送一帧
    pub tx_busy: bool,
}

impl Device {
    pub fn new(
        id: DeviceId,
        node: NodeId,
        channel: ChannelId,
        kind: DeviceKind,
        role: DeviceRole,
    ) -> Self {
        let cap = match kind {
            DeviceKind::Csma => mem_from_pkt(CSMA_QUEUE_PKTS),
            DeviceKind::Wifi(_) => mem_from_pkt(WIFI_QUEUE_PKTS),
        };
        Self {
            id,
            node,
            channel,
            kind,
            role,
            queue: DropTailQueue::new(cap),
            tx_busy: false,
        }
    }

    pub fn addr(&self) -> Option<Ipv4Addr> {
        self.role.addr()
    }
}
