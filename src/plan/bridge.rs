//! 网桥配置
//!
//! 把交换机的端口标记为网桥端口。端口一旦桥接就不能再分配地址，反之亦然。

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::ConfigError;
use crate::net::{DeviceId, DeviceRole, NodeId, NodeRole};

use super::topology::TopologyPlan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRole {
    pub node: NodeId,
    pub ports: Vec<DeviceId>,
}

/// 在交换机 `node` 上用 `ports` 组成一个网桥
///
/// 所有检查都在修改规划之前完成，出错时规划保持不变。
pub fn configure_bridge(
    plan: &mut TopologyPlan,
    node: NodeId,
    ports: &[DeviceId],
) -> Result<(), ConfigError> {
    if plan.checked_node(node)?.role != NodeRole::Switch {
        return Err(ConfigError::NotASwitch { node });
    }
    if ports.is_empty() {
        return Err(ConfigError::EmptyBridge { node });
    }
    let mut seen = BTreeSet::new();
    for &port in ports {
        let dev = plan.checked_device(port)?;
        if dev.node != node {
            return Err(ConfigError::ForeignBridgePort {
                node,
                device: port,
                owner: dev.node,
            });
        }
        if !dev.kind.is_wired() {
            return Err(ConfigError::NotWired { device: port });
        }
        match dev.role {
            DeviceRole::Addressed { addr, .. } => {
                return Err(ConfigError::BridgeOnAddressedDevice { device: port, addr });
            }
            DeviceRole::BridgePort { bridge } => {
                return Err(ConfigError::AlreadyBridged {
                    device: port,
                    bridge,
                });
            }
            DeviceRole::Unassigned => {}
        }
        if !seen.insert(port) {
            return Err(ConfigError::AlreadyBridged {
                device: port,
                bridge: node,
            });
        }
    }

    for &port in ports {
        plan.device_mut(port).role = DeviceRole::BridgePort { bridge: node };
    }
    plan.bridges.push(BridgeRole {
        node,
        ports: ports.to_vec(),
    });
    debug!(node = ?node, ports = ports.len(), "配置网桥");
    Ok(())
}

/// 两台交换机各自把面向路由器 / 主机 / 接入点的端口桥接起来
pub fn bridge_switches(plan: &mut TopologyPlan) -> Result<(), ConfigError> {
    let switch_b = plan.groups.switch_b;
    let ports_b = plan.segments.switch_b_ports.clone();
    configure_bridge(plan, switch_b, &ports_b)?;

    let switch_a = plan.groups.switch_a;
    let ports_a = plan.segments.switch_a_ports.clone();
    configure_bridge(plan, switch_a, &ports_a)
}
