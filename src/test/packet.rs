use std::net::{Ipv4Addr, SocketAddrV4};

use crate::net::{
    DeviceId, DeviceKind, Frame, FrameDst, IPV4_TCP_HEADER_BYTES, MgmtFrame, Packet, TcpSegment,
    WifiMacRole,
};

fn sock(last: u8, port: u16) -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::new(10, 1, 2, last), port)
}

#[test]
fn tcp_packet_size_counts_payload_only_for_data_segments() {
    let data = Packet::tcp(1, sock(1, 49153), sock(4, 50), TcpSegment::Data { seq: 0, len: 536 });
    assert_eq!(data.payload_bytes, 536);
    assert_eq!(data.size_bytes(), 536 + IPV4_TCP_HEADER_BYTES);

    let ack = Packet::tcp(2, sock(4, 50), sock(1, 49153), TcpSegment::Ack { ack: 536 });
    assert_eq!(ack.payload_bytes, 0);
    assert_eq!(ack.size_bytes(), IPV4_TCP_HEADER_BYTES);
}

#[test]
fn frame_size_adds_link_layer_overhead() {
    let pkt = Packet::tcp(1, sock(1, 49153), sock(4, 50), TcpSegment::Syn);
    let wired = Frame::ip(DeviceId(0), DeviceId(1), pkt.clone(), DeviceKind::Csma.l2_overhead());
    let wireless = Frame::ip(
        DeviceId(2),
        DeviceId(3),
        pkt,
        DeviceKind::Wifi(WifiMacRole::Station).l2_overhead(),
    );
    assert_eq!(wired.size_bytes(), 40 + 18);
    assert_eq!(wireless.size_bytes(), 40 + 36);
}

#[test]
fn management_frames_carry_no_ip_packet() {
    let beacon = Frame::mgmt(
        DeviceId(9),
        FrameDst::Broadcast,
        MgmtFrame::Beacon {
            ssid: "lab".to_string(),
        },
        36,
    );
    assert!(beacon.packet().is_none());
    assert!(beacon.is_beacon());
    assert_eq!(beacon.size_bytes(), 48 + 3 + 36);

    let resp = Frame::mgmt(
        DeviceId(9),
        FrameDst::Unicast(DeviceId(1)),
        MgmtFrame::AssocResponse { accepted: true },
        36,
    );
    assert!(!resp.is_beacon());
}

#[test]
fn frame_display_summarizes_addresses_and_segment() {
    let pkt = Packet::tcp(7, sock(1, 49153), sock(4, 50), TcpSegment::Data { seq: 1024, len: 512 });
    let text = Frame::ip(DeviceId(0), DeviceId(1), pkt, 18).to_string();
    assert!(text.contains("10.1.2.1:49153 > 10.1.2.4:50"), "{text}");
    assert!(text.contains("Seq=1024 Len=512"), "{text}");
    assert!(text.starts_with("L2 (dev0 > dev1 size 570)"), "{text}");
}
