use crate::net::wifi::OFDM_RATES_BPS;
use crate::net::{DeviceId, MgmtFrame, RateControl, StaState, WifiMac, WifiMacConfig};

const AP: DeviceId = DeviceId(19);
const STA: DeviceId = DeviceId(14);

fn mac(cfg: WifiMacConfig) -> WifiMac {
    let stations: Vec<DeviceId> = (14..19).map(DeviceId).collect();
    WifiMac::new(cfg, AP, &stations)
}

fn associate(mac: &mut WifiMac, sta: DeviceId) {
    let ssid = match mac.on_beacon_heard(sta, "ns-3-ssid") {
        Some(MgmtFrame::AssocRequest { ssid }) => ssid,
        other => panic!("expected AssocRequest, got {other:?}"),
    };
    let MgmtFrame::AssocResponse { accepted } = mac.on_assoc_request(sta, &ssid) else {
        panic!("expected AssocResponse");
    };
    mac.on_assoc_response(sta, accepted);
}

#[test]
fn beacon_request_response_associates_a_station() {
    let mut mac = mac(WifiMacConfig::default());
    assert_eq!(mac.station_state(STA), Some(StaState::Unassociated));
    assert!(!mac.can_send(STA, AP));

    let req = mac.on_beacon_heard(STA, "ns-3-ssid");
    assert_eq!(
        req,
        Some(MgmtFrame::AssocRequest {
            ssid: "ns-3-ssid".to_string()
        })
    );
    assert_eq!(mac.station_state(STA), Some(StaState::Associating));
    assert!(!mac.can_send(STA, AP), "关联完成前不能发送数据");

    let resp = mac.on_assoc_request(STA, "ns-3-ssid");
    assert_eq!(resp, MgmtFrame::AssocResponse { accepted: true });
    assert!(mac.can_send(AP, STA));
    mac.on_assoc_response(STA, true);

    assert_eq!(mac.station_state(STA), Some(StaState::Associated));
    assert_eq!(mac.association_count(STA), 1);
    assert!(mac.can_send(STA, AP));
    // 站点之间不直接通信
    assert!(!mac.can_send(STA, DeviceId(15)));
    // 已关联时 beacon 只清零错过计数
    assert_eq!(mac.on_beacon_heard(STA, "ns-3-ssid"), None);
}

#[test]
fn foreign_ssid_is_ignored() {
    let mut mac = mac(WifiMacConfig::default());
    assert_eq!(mac.on_beacon_heard(STA, "other"), None);
    assert_eq!(mac.station_state(STA), Some(StaState::Unassociated));
    assert_eq!(
        mac.on_assoc_request(STA, "other"),
        MgmtFrame::AssocResponse { accepted: false }
    );
    assert!(!mac.can_send(AP, STA));
    // AP 不接受未知设备
    assert_eq!(
        mac.on_assoc_request(DeviceId(3), "ns-3-ssid"),
        MgmtFrame::AssocResponse { accepted: false }
    );
}

#[test]
fn unsolicited_response_does_not_associate() {
    let mut mac = mac(WifiMacConfig::default());
    mac.on_assoc_response(STA, true);
    assert_eq!(mac.station_state(STA), Some(StaState::Unassociated));
    assert_eq!(mac.association_count(STA), 0);
}

#[test]
fn missed_beacons_drop_the_association() {
    let mut mac = mac(WifiMacConfig::default());
    associate(&mut mac, STA);

    for _ in 0..9 {
        mac.on_beacon_missed(STA);
    }
    assert_eq!(mac.station_state(STA), Some(StaState::Associated));
    mac.on_beacon_missed(STA);
    assert_eq!(mac.station_state(STA), Some(StaState::Unassociated));
    assert!(!mac.can_send(STA, AP));

    // 回到覆盖范围后重新关联
    associate(&mut mac, STA);
    assert_eq!(mac.station_state(STA), Some(StaState::Associated));
    assert_eq!(mac.association_count(STA), 2);
}

#[test]
fn heard_beacon_resets_the_missed_counter() {
    let mut mac = mac(WifiMacConfig::default());
    associate(&mut mac, STA);
    for _ in 0..9 {
        mac.on_beacon_missed(STA);
    }
    assert_eq!(mac.on_beacon_heard(STA, "ns-3-ssid"), None);
    for _ in 0..9 {
        mac.on_beacon_missed(STA);
    }
    assert_eq!(mac.station_state(STA), Some(StaState::Associated));
}

#[test]
fn active_probing_sends_request_without_beacon() {
    let mut passive = mac(WifiMacConfig::default());
    assert_eq!(passive.start_probe(STA), None);

    let mut active = mac(WifiMacConfig {
        active_probing: true,
        ..WifiMacConfig::default()
    });
    assert!(matches!(
        active.start_probe(STA),
        Some(MgmtFrame::AssocRequest { .. })
    ));
    assert_eq!(active.station_state(STA), Some(StaState::Associating));
    assert_eq!(active.start_probe(AP), None);
}

#[test]
fn aarf_climbs_after_ten_successes_and_falls_back_on_failure() {
    let mut mac = mac(WifiMacConfig::default());
    assert_eq!(mac.data_rate(STA, AP), OFDM_RATES_BPS[0]);

    for _ in 0..9 {
        mac.report_tx(STA, AP, true);
    }
    assert_eq!(mac.data_rate(STA, AP), 6_000_000);
    mac.report_tx(STA, AP, true);
    assert_eq!(mac.data_rate(STA, AP), 9_000_000);
    // 反方向有独立的速率状态
    assert_eq!(mac.data_rate(AP, STA), 6_000_000);

    // 刚升速就失败：回退一档
    mac.report_tx(STA, AP, false);
    assert_eq!(mac.data_rate(STA, AP), 6_000_000);

    // 升速门限已加倍，10 次成功不够
    for _ in 0..10 {
        mac.report_tx(STA, AP, true);
    }
    assert_eq!(mac.data_rate(STA, AP), 6_000_000);
    for _ in 0..10 {
        mac.report_tx(STA, AP, true);
    }
    assert_eq!(mac.data_rate(STA, AP), 9_000_000);
}

#[test]
fn aarf_never_exceeds_the_top_rate() {
    let mut mac = mac(WifiMacConfig::default());
    for _ in 0..1000 {
        mac.report_tx(AP, STA, true);
    }
    assert_eq!(mac.data_rate(AP, STA), 54_000_000);
}

#[test]
fn constant_rate_ignores_reports() {
    let mut mac = mac(WifiMacConfig {
        rate_control: RateControl::Constant {
            rate_bps: 24_000_000,
        },
        ..WifiMacConfig::default()
    });
    for _ in 0..50 {
        mac.report_tx(STA, AP, true);
    }
    mac.report_tx(STA, AP, false);
    assert_eq!(mac.data_rate(STA, AP), 24_000_000);
    assert_eq!(mac.basic_rate(), 6_000_000);
}
