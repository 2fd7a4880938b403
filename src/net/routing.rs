//! 最短跳数路由表
//!
//! 对一个无向邻接表，为每个 (from, dst) 计算最短跳数以及确定性的下一跳：
//! 多条等价最短路径时取编号最小的邻居，保证同样的拓扑总是得到同样的路由。

use std::collections::{HashMap, VecDeque};

use super::id::NodeId;

#[derive(Debug, Default, Clone)]
pub struct RoutingTable {
    /// (from, dst) -> 下一跳
    next_hop: HashMap<(NodeId, NodeId), NodeId>,
    /// (from, dst) -> 跳数
    distance: HashMap<(NodeId, NodeId), u32>,
}

impl RoutingTable {
    /// 基于邻接表构建路由表。`adj[v]` 为 `v` 的所有邻居。
    pub fn from_adjacency(adj: &[Vec<NodeId>]) -> Self {
        let n = adj.len();
        let mut table = RoutingTable::default();

        // 对每个 dst 做一次 BFS 得到 dist[*]，
        // 然后对每个 from 选 dist[next] = dist[from] - 1 的最小编号邻居。
        let mut dist: Vec<u32> = vec![u32::MAX; n];
        let mut q: VecDeque<usize> = VecDeque::new();

        for dst_idx in 0..n {
            dist.fill(u32::MAX);
            q.clear();
            dist[dst_idx] = 0;
            q.push_back(dst_idx);

            while let Some(v) = q.pop_front() {
                let dv = dist[v];
                for &nb in &adj[v] {
                    if nb.0 < n && dist[nb.0] == u32::MAX {
                        dist[nb.0] = dv + 1;
                        q.push_back(nb.0);
                    }
                }
            }

            let dst = NodeId(dst_idx);
            for from_idx in 0..n {
                let df = dist[from_idx];
                if from_idx == dst_idx || df == u32::MAX {
                    continue;
                }
                let best = adj[from_idx]
                    .iter()
                    .copied()
                    .filter(|nb| nb.0 < n && dist[nb.0] == df - 1)
                    .min();
                if let Some(nh) = best {
                    table.next_hop.insert((NodeId(from_idx), dst), nh);
                    table.distance.insert((NodeId(from_idx), dst), df);
                }
            }
        }

        table
    }

    /// (from, dst) 的下一跳；from == dst 或不可达时为 None
    pub fn next_hop(&self, from: NodeId, dst: NodeId) -> Option<NodeId> {
        self.next_hop.get(&(from, dst)).copied()
    }

    /// (from, dst) 的跳数；from == dst 时为 0
    pub fn distance(&self, from: NodeId, dst: NodeId) -> Option<u32> {
        if from == dst {
            return Some(0);
        }
        self.distance.get(&(from, dst)).copied()
    }
}
