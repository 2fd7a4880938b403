//! 全局路由
//!
//! 共享一个子网的节点在三层上相邻。先用最短跳数路由表算出下一跳，
//! 再为每个携带地址的节点、每个子网生成一条路由：
//! 直连子网没有网关；其它子网的网关是下一跳在双方共享子网上的地址。

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use tracing::debug;

use crate::error::ConfigError;
use crate::net::{DeviceId, NodeId, RoutingTable};

use super::addressing::{SubnetEntry, SubnetPlan};
use super::topology::TopologyPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub net: Ipv4Net,
    pub egress: DeviceId,
    /// None 表示直连
    pub gateway: Option<Ipv4Addr>,
    /// 到该子网最近成员的跳数
    pub metric: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalRoutes {
    tables: BTreeMap<NodeId, Vec<Route>>,
}

impl GlobalRoutes {
    pub fn table(&self, node: NodeId) -> &[Route] {
        self.tables.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 最长前缀匹配，前缀相同取 metric 最小者
    pub fn lookup(&self, node: NodeId, dst: Ipv4Addr) -> Option<&Route> {
        self.table(node)
            .iter()
            .filter(|r| r.net.contains(&dst))
            .min_by_key(|r| (std::cmp::Reverse(r.net.prefix_len()), r.metric))
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(Vec::is_empty)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.tables.keys().copied()
    }
}

/// 节点在该子网上的设备与地址
fn member_of(topo: &TopologyPlan, entry: &SubnetEntry, node: NodeId) -> Option<(DeviceId, Ipv4Addr)> {
    entry
        .devices
        .iter()
        .zip(&entry.addresses)
        .find(|(d, _)| topo.device(**d).node == node)
        .map(|(&d, &a)| (d, a))
}

/// 计算所有携带地址节点的路由表。纯函数，重复调用结果相同。
pub fn populate_routing_tables(
    topo: &TopologyPlan,
    subnets: &SubnetPlan,
) -> Result<GlobalRoutes, ConfigError> {
    if subnets.is_empty() {
        return Err(ConfigError::NothingToRoute);
    }

    let n = topo.nodes.len();
    let mut adj: Vec<Vec<NodeId>> = vec![Vec::new(); n];
    let members: Vec<Vec<NodeId>> = subnets
        .entries
        .iter()
        .map(|e| {
            let mut nodes: Vec<NodeId> = e.devices.iter().map(|&d| topo.device(d).node).collect();
            nodes.sort();
            nodes.dedup();
            nodes
        })
        .collect();
    for group in &members {
        for &a in group {
            for &b in group {
                if a != b && !adj[a.0].contains(&b) {
                    adj[a.0].push(b);
                }
            }
        }
    }
    let bfs = RoutingTable::from_adjacency(&adj);

    let mut routed: Vec<NodeId> = members.iter().flatten().copied().collect();
    routed.sort();
    routed.dedup();

    let mut tables = BTreeMap::new();
    for &node in &routed {
        let mut routes = Vec::new();
        for (entry, group) in subnets.entries.iter().zip(&members) {
            if group.is_empty() {
                continue;
            }
            if let Some((egress, _)) = member_of(topo, entry, node) {
                routes.push(Route {
                    net: entry.net,
                    egress,
                    gateway: None,
                    metric: 0,
                });
                continue;
            }
            // 最近的子网成员，跳数相同取编号最小
            let Some((target, metric)) = group
                .iter()
                .filter_map(|&m| bfs.distance(node, m).map(|d| (m, d)))
                .min_by_key(|&(m, d)| (d, m))
            else {
                continue;
            };
            let Some(next) = bfs.next_hop(node, target) else {
                continue;
            };
            let via = subnets.entries.iter().find_map(|shared| {
                let (egress, _) = member_of(topo, shared, node)?;
                let (_, gw) = member_of(topo, shared, next)?;
                Some((egress, gw))
            });
            if let Some((egress, gateway)) = via {
                routes.push(Route {
                    net: entry.net,
                    egress,
                    gateway: Some(gateway),
                    metric,
                });
            }
        }
        debug!(node = ?node, routes = routes.len(), "生成路由表");
        tables.insert(node, routes);
    }
    Ok(GlobalRoutes { tables })
}
