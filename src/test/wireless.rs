use crate::error::ConfigError;
use crate::mobility::{MobilityConfig, MobilityModelSpec, Vector2};
use crate::net::{ChannelKind, DeviceKind, NodeId, WifiMacRole};
use crate::plan::{WifiCellConfig, build_wireless_cell};
use crate::sim::SimTime;

use super::cell_plan;

#[test]
fn wireless_cell_installs_station_and_ap_devices_on_one_medium() {
    let plan = cell_plan(4, 5);
    let cell = plan.cell.as_ref().expect("cell");

    assert_eq!(cell.ssid(), "ns-3-ssid");
    assert_eq!(cell.stations.len(), 5);
    assert_eq!(
        plan.medium(cell.medium).kind,
        ChannelKind::Wifi {
            delay: SimTime::from_nanos(100)
        }
    );
    assert_eq!(plan.medium(cell.medium).devices.len(), 6);
    for (&dev, &node) in cell.stations.iter().zip(&plan.groups.stations) {
        let device = plan.device(dev);
        assert_eq!(device.node, node);
        assert_eq!(device.kind, DeviceKind::Wifi(WifiMacRole::Station));
        assert_eq!(device.medium, cell.medium);
    }
    let ap = plan.device(cell.access_point);
    assert_eq!(ap.node, plan.groups.access_point);
    assert_eq!(ap.kind, DeviceKind::Wifi(WifiMacRole::AccessPoint));
}

#[test]
fn stations_walk_from_grid_slots_and_ap_stays_on_the_next_slot() {
    let plan = cell_plan(4, 5);
    assert_eq!(plan.mobility.len(), 6);

    // 网格宽度 5 + 10 = 15，所有点都在第一行
    for (i, a) in plan.mobility[..5].iter().enumerate() {
        assert_eq!(a.node, NodeId(8 + i));
        assert_eq!(a.initial, Vector2::new(5.0 * i as f64, 0.0));
        assert!(matches!(a.model, MobilityModelSpec::RandomWalk2d(_)));
    }
    let ap = &plan.mobility[5];
    assert_eq!(ap.node, plan.groups.access_point);
    assert_eq!(ap.initial, Vector2::new(25.0, 0.0));
    assert_eq!(ap.model, MobilityModelSpec::ConstantPosition);
}

#[test]
fn wireless_cell_without_stations_still_has_an_access_point() {
    let plan = cell_plan(4, 0);
    let cell = plan.cell.as_ref().expect("cell");
    assert!(cell.stations.is_empty());
    assert_eq!(plan.medium(cell.medium).devices, vec![cell.access_point]);
    assert_eq!(plan.mobility.len(), 1);
}

#[test]
fn building_the_cell_twice_is_rejected() {
    let mut plan = cell_plan(4, 5);
    let medium = plan.cell.as_ref().expect("cell").medium;
    let devices = plan.devices.len();

    let err = build_wireless_cell(&mut plan, &WifiCellConfig::default(), &MobilityConfig::default())
        .expect_err("second cell");
    assert_eq!(err, ConfigError::WirelessCellExists { medium: medium.0 });
    assert_eq!(plan.devices.len(), devices);
}
