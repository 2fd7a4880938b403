use std::collections::BTreeSet;

use crate::error::ConfigError;
use crate::net::{CsmaChannelConfig, DeviceId, DeviceRole};
use crate::plan::{AddressingConfig, SegmentMembership, build_topology, configure_bridge, plan_addresses};

use super::{addressed_plan, counts};

fn fresh() -> crate::plan::TopologyPlan {
    build_topology(
        &counts(4, 5),
        &CsmaChannelConfig::default(),
        SegmentMembership::AllMembers,
    )
    .expect("topology")
}

#[test]
fn bridge_marks_ports_and_records_role() {
    let mut plan = fresh();
    let sw = plan.groups.switch_b;
    let ports = plan.segments.switch_b_ports.clone();
    configure_bridge(&mut plan, sw, &ports).expect("bridge");

    assert_eq!(plan.bridges.len(), 1);
    assert_eq!(plan.bridges[0].node, sw);
    assert_eq!(plan.bridges[0].ports, ports);
    for p in ports {
        assert_eq!(plan.device(p).role, DeviceRole::BridgePort { bridge: sw });
    }
}

#[test]
fn bridge_rejects_non_switch_node() {
    let mut plan = fresh();
    let router = plan.groups.router;
    let dev = plan.segments.lan[0];
    assert_eq!(
        configure_bridge(&mut plan, router, &[dev]),
        Err(ConfigError::NotASwitch { node: router })
    );
}

#[test]
fn bridge_rejects_empty_port_set() {
    let mut plan = fresh();
    let sw = plan.groups.switch_a;
    assert_eq!(
        configure_bridge(&mut plan, sw, &[]),
        Err(ConfigError::EmptyBridge { node: sw })
    );
}

#[test]
fn bridge_rejects_port_of_another_node_and_leaves_plan_untouched() {
    let mut plan = fresh();
    let sw = plan.groups.switch_b;
    let mut ports = plan.segments.switch_b_ports.clone();
    let foreign = plan.segments.lan[1];
    ports.push(foreign);

    let err = configure_bridge(&mut plan, sw, &ports).expect_err("foreign port");
    assert!(matches!(err, ConfigError::ForeignBridgePort { device, .. } if device == foreign));
    assert!(plan.bridges.is_empty());
    assert_eq!(plan.bridged_devices().count(), 0);
}

#[test]
fn bridge_rejects_port_already_in_a_bridge() {
    let mut plan = fresh();
    let sw = plan.groups.switch_b;
    let ports = plan.segments.switch_b_ports.clone();
    configure_bridge(&mut plan, sw, &ports[..2]).expect("first bridge");

    let err = configure_bridge(&mut plan, sw, &ports[1..]).expect_err("overlap");
    assert_eq!(
        err,
        ConfigError::AlreadyBridged {
            device: ports[1],
            bridge: sw,
        }
    );

    let dup = [ports[3], ports[3]];
    assert!(matches!(
        configure_bridge(&mut plan, sw, &dup),
        Err(ConfigError::AlreadyBridged { .. })
    ));
}

#[test]
fn bridge_rejects_addressed_device() {
    let mut plan = fresh();
    // 先给交换机 B 的端口分地址（错误用法），再尝试桥接
    let sw = plan.groups.switch_b;
    let port = plan.segments.switch_b_ports[0];
    let net = AddressingConfig::default().wired_lan;
    let addr = net.hosts().next().expect("host");
    plan.devices[port.0].role = DeviceRole::Addressed { addr, net };

    assert_eq!(
        configure_bridge(&mut plan, sw, &[port]),
        Err(ConfigError::BridgeOnAddressedDevice { device: port, addr })
    );
}

#[test]
fn addressing_a_bridged_port_is_rejected() {
    let mut plan = fresh();
    let sw = plan.groups.switch_a;
    let router_dev = plan.segments.backbone[0];
    plan.devices[router_dev.0].role = DeviceRole::BridgePort { bridge: sw };

    assert_eq!(
        plan_addresses(&mut plan, &AddressingConfig::default()),
        Err(ConfigError::AddressOnBridgedDevice { device: router_dev })
    );
    assert_eq!(plan.addressed_devices().count(), 0);
}

#[test]
fn bridged_and_addressed_devices_are_disjoint() {
    for (hosts, stations) in [(1, 1), (4, 5), (7, 2)] {
        let (plan, _) = addressed_plan(hosts, stations);
        let bridged: BTreeSet<DeviceId> = plan.bridged_devices().map(|d| d.id).collect();
        let addressed: BTreeSet<DeviceId> = plan.addressed_devices().map(|d| d.id).collect();
        assert!(!bridged.is_empty());
        assert!(!addressed.is_empty());
        assert!(bridged.is_disjoint(&addressed));
        assert_eq!(bridged.len() + addressed.len(), plan.devices.len());
    }
}

#[test]
fn bridge_rejects_unknown_node_and_device() {
    let mut plan = fresh();
    let before = plan.clone();
    let nodes = plan.nodes.len();
    let devices = plan.devices.len();

    assert_eq!(
        configure_bridge(&mut plan, crate::net::NodeId(nodes + 5), &[DeviceId(0)]),
        Err(ConfigError::InvalidTopologyIndex {
            group: "nodes",
            index: nodes + 5,
            len: nodes,
        })
    );
    let sw = plan.groups.switch_b;
    let mut ports = plan.segments.switch_b_ports.clone();
    ports.push(DeviceId(devices));
    assert_eq!(
        configure_bridge(&mut plan, sw, &ports),
        Err(ConfigError::InvalidTopologyIndex {
            group: "devices",
            index: devices,
            len: devices,
        })
    );
    // 出错时规划不变
    assert_eq!(plan, before);
}
