//! 拓扑构建
//!
//! 创建顺序固定：`n` 台有线主机、交换机 A（骨干侧）、交换机 B（局域网侧）、路由器、接入点、`m` 个移动站点。
//! 路由器与每台主机各有一条 CSMA 段连到交换机 B（路由器在前），路由器与接入点各有一条 CSMA 段连到交换机 A。

use crate::error::ConfigError;
use crate::mobility::MobilityAssignment;
use crate::net::{
    ChannelId, ChannelKind, CsmaChannelConfig, DeviceId, DeviceKind, DeviceRole, NodeId, NodeRole,
};

use super::bridge::BridgeRole;
use super::wireless::WirelessCell;

/// 节点数量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyCounts {
    pub wired_hosts: usize,
    pub stations: usize,
}

impl Default for TopologyCounts {
    fn default() -> Self {
        Self {
            wired_hosts: 4,
            stations: 5,
        }
    }
}

/// 交换机 B 一侧的成员策略（成员序列为：路由器，然后按创建顺序的主机）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentMembership {
    /// 路由器与所有主机
    #[default]
    AllMembers,
    /// 只连前 `k` 个成员
    Leading(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub id: NodeId,
    pub name: String,
    pub role: NodeRole,
    pub devices: Vec<DeviceId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSpec {
    pub id: DeviceId,
    pub node: NodeId,
    pub medium: ChannelId,
    pub kind: DeviceKind,
    pub role: DeviceRole,
}

/// 传输介质：两端的 CSMA 段，或整个无线小区共享的信道
#[derive(Debug, Clone, PartialEq)]
pub struct MediumSpec {
    pub id: ChannelId,
    pub kind: ChannelKind,
    pub devices: Vec<DeviceId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeGroups {
    pub hosts: Vec<NodeId>,
    pub switch_a: NodeId,
    pub switch_b: NodeId,
    pub router: NodeId,
    pub access_point: NodeId,
    pub stations: Vec<NodeId>,
}

/// 有线段两端的设备，按连接顺序排列（路由器在前）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WiredSegments {
    /// 路由器、接入点连到交换机 A 的设备
    pub backbone: Vec<DeviceId>,
    /// 交换机 A 上与 `backbone` 一一对应的端口
    pub switch_a_ports: Vec<DeviceId>,
    /// 路由器、主机连到交换机 B 的设备
    pub lan: Vec<DeviceId>,
    /// 交换机 B 上与 `lan` 一一对应的端口
    pub switch_b_ports: Vec<DeviceId>,
}

/// 拓扑规划：在各个构建步骤之间显式传递
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyPlan {
    pub nodes: Vec<NodeSpec>,
    pub devices: Vec<DeviceSpec>,
    pub media: Vec<MediumSpec>,
    pub groups: NodeGroups,
    pub segments: WiredSegments,
    pub bridges: Vec<BridgeRole>,
    pub cell: Option<WirelessCell>,
    pub mobility: Vec<MobilityAssignment>,
}

impl TopologyPlan {
    pub fn node(&self, id: NodeId) -> &NodeSpec {
        &self.nodes[id.0]
    }

    pub fn device(&self, id: DeviceId) -> &DeviceSpec {
        &self.devices[id.0]
    }

    pub fn medium(&self, id: ChannelId) -> &MediumSpec {
        &self.media[id.0]
    }

    pub(crate) fn device_mut(&mut self, id: DeviceId) -> &mut DeviceSpec {
        &mut self.devices[id.0]
    }

    pub fn role_of(&self, node: NodeId) -> NodeRole {
        self.nodes[node.0].role
    }

    /// 越界时返回 `InvalidTopologyIndex`
    pub fn checked_node(&self, id: NodeId) -> Result<&NodeSpec, ConfigError> {
        self.nodes.get(id.0).ok_or(ConfigError::InvalidTopologyIndex {
            group: "nodes",
            index: id.0,
            len: self.nodes.len(),
        })
    }

    /// 越界时返回 `InvalidTopologyIndex`
    pub fn checked_device(&self, id: DeviceId) -> Result<&DeviceSpec, ConfigError> {
        self.devices.get(id.0).ok_or(ConfigError::InvalidTopologyIndex {
            group: "devices",
            index: id.0,
            len: self.devices.len(),
        })
    }

    /// 节点在给定介质集合中的设备
    pub fn device_on(&self, node: NodeId, devices: &[DeviceId]) -> Option<DeviceId> {
        devices.iter().copied().find(|&d| self.devices[d.0].node == node)
    }

    pub fn bridged_devices(&self) -> impl Iterator<Item = &DeviceSpec> {
        self.devices
            .iter()
            .filter(|d| matches!(d.role, DeviceRole::BridgePort { .. }))
    }

    pub fn addressed_devices(&self) -> impl Iterator<Item = &DeviceSpec> {
        self.devices
            .iter()
            .filter(|d| matches!(d.role, DeviceRole::Addressed { .. }))
    }

    pub(crate) fn add_node(&mut self, name: String, role: NodeRole) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeSpec {
            id,
            name,
            role,
            devices: Vec::new(),
        });
        id
    }

    pub(crate) fn add_medium(&mut self, kind: ChannelKind) -> ChannelId {
        let id = ChannelId(self.media.len());
        self.media.push(MediumSpec {
            id,
            kind,
            devices: Vec::new(),
        });
        id
    }

    pub(crate) fn add_device(&mut self, node: NodeId, medium: ChannelId, kind: DeviceKind) -> DeviceId {
        let id = DeviceId(self.devices.len());
        self.devices.push(DeviceSpec {
            id,
            node,
            medium,
            kind,
            role: DeviceRole::Unassigned,
        });
        self.nodes[node.0].devices.push(id);
        self.media[medium.0].devices.push(id);
        id
    }

    /// 新建一条 CSMA 段连接两个节点，返回 (a 侧设备, b 侧设备)
    pub(crate) fn connect_csma(
        &mut self,
        a: NodeId,
        b: NodeId,
        cfg: &CsmaChannelConfig,
    ) -> (DeviceId, DeviceId) {
        let medium = self.add_medium(ChannelKind::Csma(*cfg));
        let da = self.add_device(a, medium, DeviceKind::Csma);
        let db = self.add_device(b, medium, DeviceKind::Csma);
        (da, db)
    }
}

/// 按数量与链路属性构建拓扑
pub fn build_topology(
    counts: &TopologyCounts,
    csma: &CsmaChannelConfig,
    membership: SegmentMembership,
) -> Result<TopologyPlan, ConfigError> {
    if counts.wired_hosts == 0 {
        return Err(ConfigError::InvalidCount {
            what: "wired hosts",
            got: 0,
            min: 1,
        });
    }
    if csma.data_rate_bps == 0 {
        return Err(ConfigError::ZeroValue {
            what: "CSMA data rate",
        });
    }
    let members = counts.wired_hosts + 1;
    let lan_members = match membership {
        SegmentMembership::AllMembers => members,
        SegmentMembership::Leading(0) => {
            return Err(ConfigError::InvalidCount {
                what: "switch B members",
                got: 0,
                min: 1,
            });
        }
        SegmentMembership::Leading(k) if k > members => {
            return Err(ConfigError::InvalidTopologyIndex {
                group: "router and wired hosts",
                index: k - 1,
                len: members,
            });
        }
        SegmentMembership::Leading(k) => k,
    };

    let mut plan = TopologyPlan {
        nodes: Vec::new(),
        devices: Vec::new(),
        media: Vec::new(),
        groups: NodeGroups {
            hosts: Vec::new(),
            switch_a: NodeId(0),
            switch_b: NodeId(0),
            router: NodeId(0),
            access_point: NodeId(0),
            stations: Vec::new(),
        },
        segments: WiredSegments::default(),
        bridges: Vec::new(),
        cell: None,
        mobility: Vec::new(),
    };

    let hosts: Vec<NodeId> = (0..counts.wired_hosts)
        .map(|i| plan.add_node(format!("host{i}"), NodeRole::Host))
        .collect();
    let switch_a = plan.add_node("switch-a".to_string(), NodeRole::Switch);
    let switch_b = plan.add_node("switch-b".to_string(), NodeRole::Switch);
    let router = plan.add_node("router".to_string(), NodeRole::Router);
    let access_point = plan.add_node("ap".to_string(), NodeRole::AccessPoint);
    let stations: Vec<NodeId> = (0..counts.stations)
        .map(|i| plan.add_node(format!("sta{i}"), NodeRole::Station))
        .collect();

    let lan_side: Vec<NodeId> = std::iter::once(router)
        .chain(hosts.iter().copied())
        .take(lan_members)
        .collect();
    for node in lan_side {
        let (dev, port) = plan.connect_csma(node, switch_b, csma);
        plan.segments.lan.push(dev);
        plan.segments.switch_b_ports.push(port);
    }
    for node in [router, access_point] {
        let (dev, port) = plan.connect_csma(node, switch_a, csma);
        plan.segments.backbone.push(dev);
        plan.segments.switch_a_ports.push(port);
    }

    plan.groups = NodeGroups {
        hosts,
        switch_a,
        switch_b,
        router,
        access_point,
        stations,
    };
    Ok(plan)
}
