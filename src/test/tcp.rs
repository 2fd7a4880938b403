use std::net::{Ipv4Addr, SocketAddrV4};

use crate::net::{NetApi, NodeId, Packet, TcpSegment};
use crate::proto::{TcpConfig, TcpNotice, TcpStack, TcpState};
use crate::sim::{SimTime, Simulator};

/// 只记录发出的报文，不做任何转发
#[derive(Default)]
struct CaptureNet {
    next_uid: u64,
    sent: Vec<(NodeId, Packet)>,
}

impl NetApi for CaptureNet {
    fn next_packet_uid(&mut self) -> u64 {
        self.next_uid += 1;
        self.next_uid
    }

    fn originate(&mut self, from: NodeId, pkt: Packet, _sim: &mut Simulator) {
        self.sent.push((from, pkt));
    }
}

impl CaptureNet {
    fn drain(&mut self) -> Vec<(NodeId, Packet)> {
        std::mem::take(&mut self.sent)
    }
}

const CLIENT: NodeId = NodeId(10);
const SERVER: NodeId = NodeId(3);

fn server_addr() -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::new(10, 1, 2, 5), 50)
}

fn client_ip() -> Ipv4Addr {
    Ipv4Addr::new(10, 1, 3, 5)
}

/// 在同一个栈上把两端的报文互相投递，直到没有新报文
fn pump(stack: &mut TcpStack, sim: &mut Simulator, net: &mut CaptureNet) -> Vec<TcpNotice> {
    let mut notices = Vec::new();
    loop {
        let batch = net.drain();
        if batch.is_empty() {
            return notices;
        }
        for (from, pkt) in batch {
            let to = if from == CLIENT { SERVER } else { CLIENT };
            notices.extend(stack.on_packet(to, pkt, sim, net));
        }
    }
}

#[test]
fn connect_completes_three_way_handshake_with_listener() {
    let mut stack = TcpStack::default();
    let mut sim = Simulator::default();
    let mut net = CaptureNet::default();
    stack.listen(server_addr());

    let id = stack.connect(CLIENT, client_ip(), server_addr(), &mut sim, &mut net);
    assert_eq!(net.sent.len(), 1);
    assert_eq!(net.sent[0].1.segment, TcpSegment::Syn);
    assert_eq!(net.sent[0].1.src.port(), crate::proto::tcp::EPHEMERAL_PORT_START);

    let notices = pump(&mut stack, &mut sim, &mut net);
    assert_eq!(notices, vec![TcpNotice::Established { conn: id, node: CLIENT }]);
    assert_eq!(stack.get(id).expect("conn").state(), TcpState::Established);
    assert!(
        stack
            .connections()
            .filter(|c| c.node == SERVER)
            .all(|c| c.state() == TcpState::Established)
    );
}

#[test]
fn written_bytes_are_segmented_at_mss_and_fully_acknowledged() {
    let mut stack = TcpStack::default();
    let mut sim = Simulator::default();
    let mut net = CaptureNet::default();
    stack.listen(server_addr());
    let id = stack.connect(CLIENT, client_ip(), server_addr(), &mut sim, &mut net);
    pump(&mut stack, &mut sim, &mut net);

    stack.write(id, 1024, &mut sim, &mut net);
    let lens: Vec<u32> = net
        .sent
        .iter()
        .filter_map(|(_, p)| match p.segment {
            TcpSegment::Data { len, .. } => Some(len),
            _ => None,
        })
        .collect();
    assert_eq!(lens, vec![536, 488]);

    let notices = pump(&mut stack, &mut sim, &mut net);
    let received: u64 = notices
        .iter()
        .map(|n| match n {
            TcpNotice::Received { local, bytes, .. } => {
                assert_eq!(*local, server_addr());
                *bytes
            }
            _ => 0,
        })
        .sum();
    assert_eq!(received, 1024);
    assert_eq!(stack.get(id).expect("conn").bytes_acked(), 1024);
}

#[test]
fn out_of_order_data_is_delivered_once_the_gap_fills() {
    let mut stack = TcpStack::default();
    let mut sim = Simulator::default();
    let mut net = CaptureNet::default();
    stack.listen(server_addr());
    let id = stack.connect(CLIENT, client_ip(), server_addr(), &mut sim, &mut net);
    pump(&mut stack, &mut sim, &mut net);

    stack.write(id, 1072, &mut sim, &mut net);
    let mut data = net.drain();
    assert_eq!(data.len(), 2);
    data.reverse();

    let (_, second) = data.remove(0);
    let early = stack.on_packet(SERVER, second, &mut sim, &mut net);
    assert!(early.is_empty());

    let (_, first) = data.remove(0);
    let late = stack.on_packet(SERVER, first, &mut sim, &mut net);
    assert!(matches!(
        late.as_slice(),
        [TcpNotice::Received { bytes: 1072, .. }]
    ));
}

#[test]
fn syn_retransmits_with_backoff_then_fails() {
    let cfg = TcpConfig {
        syn_retries: 2,
        ..TcpConfig::default()
    };
    let mut stack = TcpStack::new(cfg);
    let mut sim = Simulator::default();
    let mut net = CaptureNet::default();

    let id = stack.connect(CLIENT, client_ip(), server_addr(), &mut sim, &mut net);
    assert_eq!(stack.get(id).expect("conn").rto(), SimTime::from_secs(1));

    // 每次 arm 都会推进 epoch：首个 RTO 的 epoch 为 1
    assert!(stack.on_rto(id, 1, &mut sim, &mut net).is_empty());
    assert_eq!(stack.get(id).expect("conn").rto(), SimTime::from_secs(2));
    // 过期的 epoch 被忽略
    assert!(stack.on_rto(id, 1, &mut sim, &mut net).is_empty());
    assert_eq!(stack.get(id).expect("conn").rto(), SimTime::from_secs(2));

    assert!(stack.on_rto(id, 2, &mut sim, &mut net).is_empty());
    let notices = stack.on_rto(id, 3, &mut sim, &mut net);
    assert_eq!(notices, vec![TcpNotice::ConnectFailed { conn: id, node: CLIENT }]);
    assert_eq!(stack.get(id).expect("conn").state(), TcpState::Failed);

    let syns = net
        .sent
        .iter()
        .filter(|(_, p)| p.segment == TcpSegment::Syn)
        .count();
    assert_eq!(syns, 3);
}

#[test]
fn syn_to_a_closed_port_is_ignored() {
    let mut stack = TcpStack::default();
    let mut sim = Simulator::default();
    let mut net = CaptureNet::default();

    stack.connect(CLIENT, client_ip(), server_addr(), &mut sim, &mut net);
    let notices = pump(&mut stack, &mut sim, &mut net);
    assert!(notices.is_empty());
    assert_eq!(stack.connections().count(), 1);
}
