//! 节点类型
//!
//! 节点角色是一个封闭集合：主机、交换机、路由器、接入点、移动站点。
//! 下游组件按角色穷举匹配，不再通过字符串类型名分派。

use super::id::{DeviceId, NodeId};

/// 节点角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    /// 有线主机
    Host,
    /// 二层交换机（透明网桥，不收发 IP 流量）
    Switch,
    /// 路由器
    Router,
    /// 无线接入点（同时连在有线骨干上）
    AccessPoint,
    /// 移动站点
    Station,
}

impl NodeRole {
    /// 该角色是否安装 IP 协议栈
    pub fn has_ip_stack(self) -> bool {
        match self {
            NodeRole::Switch => false,
            NodeRole::Host | NodeRole::Router | NodeRole::AccessPoint | NodeRole::Station => true,
        }
    }

    /// 节点名前缀
    pub fn name_prefix(self) -> &'static str {
        match self {
            NodeRole::Host => "host",
            NodeRole::Switch => "switch",
            NodeRole::Router => "router",
            NodeRole::AccessPoint => "ap",
            NodeRole::Station => "sta",
        }
    }
}

/// 运行时节点
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    name: String,
    role: NodeRole,
    devices: Vec<DeviceId>,
}

impl Node {
    pub fn new(id: NodeId, name: impl Into<String>, role: NodeRole) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            devices: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn devices(&self) -> &[DeviceId] {
        &self.devices
    }

    pub(crate) fn attach(&mut self, dev: DeviceId) {
        self.devices.push(dev);
    }
}
