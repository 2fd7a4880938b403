use crate::net::{NodeId, RoutingTable};

fn undirected(n: usize, edges: &[(usize, usize)]) -> Vec<Vec<NodeId>> {
    let mut adj = vec![Vec::new(); n];
    for &(a, b) in edges {
        adj[a].push(NodeId(b));
        adj[b].push(NodeId(a));
    }
    adj
}

#[test]
fn routing_table_prefers_lowest_numbered_neighbor_on_equal_cost_paths() {
    // 菱形：0-1-3 与 0-2-3
    let adj = undirected(4, &[(0, 2), (0, 1), (1, 3), (2, 3)]);
    let rt = RoutingTable::from_adjacency(&adj);

    assert_eq!(rt.next_hop(NodeId(0), NodeId(3)), Some(NodeId(1)));
    assert_eq!(rt.next_hop(NodeId(3), NodeId(0)), Some(NodeId(1)));
    assert_eq!(rt.distance(NodeId(0), NodeId(3)), Some(2));
    assert_eq!(rt.next_hop(NodeId(1), NodeId(3)), Some(NodeId(3)));
}

#[test]
fn routing_table_reports_zero_distance_to_self_and_no_next_hop() {
    let adj = undirected(2, &[(0, 1)]);
    let rt = RoutingTable::from_adjacency(&adj);

    assert_eq!(rt.distance(NodeId(0), NodeId(0)), Some(0));
    assert_eq!(rt.next_hop(NodeId(0), NodeId(0)), None);
}

#[test]
fn routing_table_leaves_disconnected_pairs_unroutable() {
    let adj = undirected(4, &[(0, 1), (2, 3)]);
    let rt = RoutingTable::from_adjacency(&adj);

    assert_eq!(rt.next_hop(NodeId(0), NodeId(3)), None);
    assert_eq!(rt.distance(NodeId(0), NodeId(3)), None);
    assert_eq!(rt.distance(NodeId(2), NodeId(3)), Some(1));
}

#[test]
fn routing_table_follows_a_chain_hop_by_hop() {
    // 站点 - AP - 路由器 - 主机
    let adj = undirected(4, &[(0, 1), (1, 2), (2, 3)]);
    let rt = RoutingTable::from_adjacency(&adj);

    let mut at = NodeId(0);
    let mut path = vec![at];
    while let Some(next) = rt.next_hop(at, NodeId(3)) {
        path.push(next);
        at = next;
    }
    assert_eq!(path, vec![NodeId(0), NodeId(1), NodeId(2), NodeId(3)]);
}
