//! 地址规划
//!
//! 固定三个子网：
//! 1. 骨干网：交换机 A 上的路由器与接入点；
//! 2. 有线局域网：交换机 B 上的路由器与主机；
//! 3. 无线网：站点（按创建顺序），最后是接入点的无线网卡。
//!
//! 子网数量与主机、站点数量无关。

use std::net::Ipv4Addr;

use ipnet::{Ipv4AddrRange, Ipv4Net};
use tracing::debug;

use crate::error::ConfigError;
use crate::net::{DeviceId, DeviceRole};

use super::topology::TopologyPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressingConfig {
    pub backbone: Ipv4Net,
    pub wired_lan: Ipv4Net,
    pub wireless: Ipv4Net,
}

impl Default for AddressingConfig {
    fn default() -> Self {
        Self {
            backbone: Ipv4Net::new(Ipv4Addr::new(10, 1, 1, 0), 24).expect("valid prefix"),
            wired_lan: Ipv4Net::new(Ipv4Addr::new(10, 1, 2, 0), 24).expect("valid prefix"),
            wireless: Ipv4Net::new(Ipv4Addr::new(10, 1, 3, 0), 24).expect("valid prefix"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubnetKind {
    Backbone,
    WiredLan,
    Wireless,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetEntry {
    pub kind: SubnetKind,
    pub net: Ipv4Net,
    pub devices: Vec<DeviceId>,
    /// 与 `devices` 一一对应
    pub addresses: Vec<Ipv4Addr>,
}

impl SubnetEntry {
    pub fn address_of(&self, dev: DeviceId) -> Option<Ipv4Addr> {
        self.devices
            .iter()
            .position(|&d| d == dev)
            .map(|i| self.addresses[i])
    }
}

/// 子网规划：按骨干、有线、无线的顺序排列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetPlan {
    pub entries: Vec<SubnetEntry>,
}

impl SubnetPlan {
    pub fn entry(&self, kind: SubnetKind) -> Option<&SubnetEntry> {
        self.entries.iter().find(|e| e.kind == kind)
    }

    pub fn address_of(&self, dev: DeviceId) -> Option<Ipv4Addr> {
        self.entries.iter().find_map(|e| e.address_of(dev))
    }

    /// 包含 `addr` 的子网
    pub fn subnet_of(&self, addr: Ipv4Addr) -> Option<&SubnetEntry> {
        self.entries.iter().find(|e| e.net.contains(&addr))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.devices.is_empty())
    }
}

/// 在一个前缀内按顺序分配主机地址
#[derive(Debug, Clone)]
pub struct Ipv4AddressAllocator {
    net: Ipv4Net,
    hosts: Ipv4AddrRange,
}

impl Ipv4AddressAllocator {
    pub fn new(net: Ipv4Net) -> Self {
        let net = net.trunc();
        Self {
            net,
            hosts: net.hosts(),
        }
    }

    pub fn net(&self) -> Ipv4Net {
        self.net
    }

    pub fn assign(&mut self) -> Result<Ipv4Addr, ConfigError> {
        self.hosts.next().ok_or(ConfigError::AddressSpaceExhausted {
            net: self.net,
            needed: 1,
        })
    }
}

/// 给三组设备分配地址，并把设备角色改为 `Addressed`
///
/// 所有检查都在写回规划之前完成。
pub fn plan_addresses(
    plan: &mut TopologyPlan,
    cfg: &AddressingConfig,
) -> Result<SubnetPlan, ConfigError> {
    let nets = [
        (SubnetKind::Backbone, cfg.backbone.trunc()),
        (SubnetKind::WiredLan, cfg.wired_lan.trunc()),
        (SubnetKind::Wireless, cfg.wireless.trunc()),
    ];
    let expected = cfg.backbone.prefix_len();
    for (_, net) in &nets[1..] {
        if net.prefix_len() != expected {
            return Err(ConfigError::MismatchedMask {
                net: *net,
                got: net.prefix_len(),
                expected,
            });
        }
    }
    for (i, (_, a)) in nets.iter().enumerate() {
        for (_, b) in &nets[i + 1..] {
            if a.contains(&b.network()) || b.contains(&a.network()) {
                return Err(ConfigError::OverlappingSubnets { a: *a, b: *b });
            }
        }
    }

    let wireless: Vec<DeviceId> = match &plan.cell {
        Some(cell) => cell
            .stations
            .iter()
            .copied()
            .chain(std::iter::once(cell.access_point))
            .collect(),
        None => Vec::new(),
    };
    let groups = [
        plan.segments.backbone.clone(),
        plan.segments.lan.clone(),
        wireless,
    ];

    for ((_, net), devices) in nets.iter().zip(&groups) {
        let room = net.hosts().count();
        if devices.len() > room {
            return Err(ConfigError::AddressSpaceExhausted {
                net: *net,
                needed: devices.len(),
            });
        }
        for &dev in devices {
            match plan.device(dev).role {
                DeviceRole::BridgePort { .. } => {
                    return Err(ConfigError::AddressOnBridgedDevice { device: dev });
                }
                DeviceRole::Addressed { addr, .. } => {
                    return Err(ConfigError::DeviceAlreadyAddressed { device: dev, addr });
                }
                DeviceRole::Unassigned => {}
            }
        }
    }

    let mut entries = Vec::with_capacity(nets.len());
    for ((kind, net), devices) in nets.into_iter().zip(groups) {
        let mut alloc = Ipv4AddressAllocator::new(net);
        let mut addresses = Vec::with_capacity(devices.len());
        for &dev in &devices {
            let addr = alloc.assign()?;
            plan.device_mut(dev).role = DeviceRole::Addressed { addr, net };
            addresses.push(addr);
        }
        debug!(kind = ?kind, net = %net, devices = devices.len(), "分配子网地址");
        entries.push(SubnetEntry {
            kind,
            net,
            devices,
            addresses,
        });
    }
    Ok(SubnetPlan { entries })
}
