//! 网络运行时
//!
//! `Network` 持有节点、设备、信道、路由、地址解析表、网桥转发表、无线 MAC、移动性、
//! TCP 栈、应用与观测组件。帧的生命周期：
//!
//! 入队（`+`）→ 出队并开始序列化（`-`）→ 传播 → 接收设备按节点角色分派（`r`）。
//! 交换机只做二层转发；其余节点按目的地址本地交付或继续三层转发。

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

use tracing::{debug, info, trace, warn};

use super::channel::{Channel, ChannelKind, tx_time};
use super::deliver_frame::DeliverFrame;
use super::device::{Device, DeviceKind};
use super::device_ready::DeviceReady;
use super::id::{ChannelId, DeviceId, NodeId};
use super::node::{Node, NodeRole};
use super::packet::{Frame, FrameBody, FrameDst, MgmtFrame, Packet};
use super::stats::{DropReason, Stats};
use super::wifi::{Beacon, WIFI_PHY_OVERHEAD, WifiMac};
use crate::app::Applications;
use crate::mobility::MobilityRegistry;
use crate::monitor::FlowMonitor;
use crate::plan::{GlobalRoutes, SubnetPlan, TopologyPlan};
use crate::proto::tcp::TcpStack;
use crate::queue::FrameQueue;
use crate::sim::{SimTime, Simulator};
use crate::trace::{Instrumentation, TraceKind, TracePoint};

/// 网络
pub struct Network {
    nodes: Vec<Node>,
    devices: Vec<Device>,
    channels: Vec<Channel>,
    routes: GlobalRoutes,
    /// 地址 -> 持有该地址的设备
    neighbors: HashMap<Ipv4Addr, DeviceId>,
    /// (网桥节点, 目标设备) -> 出端口
    fdb: HashMap<(NodeId, DeviceId), DeviceId>,
    pub(crate) wifi: Option<WifiMac>,
    pub(crate) mobility: MobilityRegistry,
    pub(crate) tcp: TcpStack,
    pub(crate) apps: Applications,
    pub(crate) monitor: FlowMonitor,
    pub(crate) instr: Instrumentation,
    next_uid: u64,
    pub stats: Stats,
}

impl Network {
    /// 根据规划结果实例化网络
    pub fn from_plan(
        topo: &TopologyPlan,
        subnets: &SubnetPlan,
        routes: GlobalRoutes,
        seed: u64,
    ) -> Self {
        let mut nodes: Vec<Node> = topo
            .nodes
            .iter()
            .map(|n| Node::new(n.id, n.name.clone(), n.role))
            .collect();
        let devices: Vec<Device> = topo
            .devices
            .iter()
            .map(|d| {
                nodes[d.node.0].attach(d.id);
                Device::new(d.id, d.node, d.medium, d.kind, d.role)
            })
            .collect();
        let channels: Vec<Channel> = topo
            .media
            .iter()
            .map(|m| Channel::new(m.id, m.kind, m.devices.clone()))
            .collect();

        let mut neighbors = HashMap::new();
        for entry in &subnets.entries {
            for (&dev, &addr) in entry.devices.iter().zip(&entry.addresses) {
                neighbors.insert(addr, dev);
            }
        }

        let fdb = build_fdb(&nodes, &devices, &channels);
        let wifi = topo
            .cell
            .as_ref()
            .map(|cell| WifiMac::new(cell.mac.clone(), cell.access_point, &cell.stations));

        info!(
            nodes = nodes.len(),
            devices = devices.len(),
            channels = channels.len(),
            fdb_entries = fdb.len(),
            "🏗️  网络实例化完成"
        );

        Self {
            nodes,
            devices,
            channels,
            routes,
            neighbors,
            fdb,
            wifi,
            mobility: MobilityRegistry::new(&topo.mobility, seed),
            tcp: TcpStack::default(),
            apps: Applications::default(),
            monitor: FlowMonitor::default(),
            instr: Instrumentation::default(),
            next_uid: 0,
            stats: Stats::default(),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device(&self, id: DeviceId) -> &Device {
        &self.devices[id.0]
    }

    pub fn channel(&self, id: ChannelId) -> &Channel {
        &self.channels[id.0]
    }

    pub fn routes(&self) -> &GlobalRoutes {
        &self.routes
    }

    pub fn wifi(&self) -> Option<&WifiMac> {
        self.wifi.as_ref()
    }

    pub fn monitor(&self) -> &FlowMonitor {
        &self.monitor
    }

    pub fn apps(&self) -> &Applications {
        &self.apps
    }

    pub fn tcp(&self) -> &TcpStack {
        &self.tcp
    }

    /// 网桥 `bridge` 去往 `target` 的出端口
    pub fn bridge_port_towards(&self, bridge: NodeId, target: DeviceId) -> Option<DeviceId> {
        self.fdb.get(&(bridge, target)).copied()
    }

    pub fn set_instrumentation(&mut self, instr: Instrumentation) {
        self.instr = instr;
    }

    pub fn take_instrumentation(&mut self) -> Instrumentation {
        std::mem::take(&mut self.instr)
    }

    pub fn next_packet_uid(&mut self) -> u64 {
        let uid = self.next_uid;
        self.next_uid = self.next_uid.wrapping_add(1);
        uid
    }

    /// 节点是否持有该地址
    pub fn is_local(&self, node: NodeId, addr: Ipv4Addr) -> bool {
        self.nodes[node.0]
            .devices()
            .iter()
            .any(|&d| self.devices[d.0].addr() == Some(addr))
    }

    /// 启动后台行为：AP 周期 beacon；开启 active probing 时站点立即发起关联
    pub fn start(&mut self, sim: &mut Simulator) {
        let Some(mac) = self.wifi.as_mut() else {
            return;
        };
        let ap = mac.access_point();
        let stations: Vec<DeviceId> = self
            .devices
            .iter()
            .filter(|d| mac.is_station(d.id))
            .map(|d| d.id)
            .collect();
        let probes: Vec<(DeviceId, MgmtFrame)> = stations
            .into_iter()
            .filter_map(|sta| mac.start_probe(sta).map(|req| (sta, req)))
            .collect();
        sim.schedule(SimTime::ZERO, Beacon { ap });
        for (sta, req) in probes {
            self.send_mgmt(sta, FrameDst::Unicast(ap), req, sim);
        }
    }

    /// 本地生成的报文进入 IP 层
    #[tracing::instrument(level = "trace", skip(self, sim), fields(uid = pkt.uid, from = ?from))]
    pub fn originate(&mut self, from: NodeId, pkt: Packet, sim: &mut Simulator) {
        self.monitor.record_tx(&pkt, sim.now());
        self.send_ip(from, pkt, sim);
    }

    /// 查路由、解析下一跳，把报文封装成帧放进出口设备队列
    fn send_ip(&mut self, at: NodeId, pkt: Packet, sim: &mut Simulator) {
        let dst = *pkt.dst.ip();
        let Some(route) = self.routes.lookup(at, dst) else {
            self.drop_packet(at, pkt, DropReason::NoRoute, sim.now());
            return;
        };
        let egress = route.egress;
        let next_ip = route.gateway.unwrap_or(dst);
        let Some(&target) = self.neighbors.get(&next_ip) else {
            self.drop_packet(at, pkt, DropReason::Unresolved, sim.now());
            return;
        };

        let kind = self.devices[egress.0].kind;
        if let DeviceKind::Wifi(_) = kind {
            let associated = self
                .wifi
                .as_ref()
                .is_some_and(|mac| mac.can_send(egress, target));
            if !associated {
                self.drop_packet(at, pkt, DropReason::NotAssociated, sim.now());
                return;
            }
        }
        trace!(egress = ?egress, target = ?target, next_ip = %next_ip, "三层转发");
        let frame = Frame::ip(egress, target, pkt, kind.l2_overhead());
        self.enqueue(egress, frame, sim);
    }

    /// 发送无线管理帧（不做关联检查）
    pub(crate) fn send_mgmt(
        &mut self,
        dev: DeviceId,
        dst: FrameDst,
        mgmt: MgmtFrame,
        sim: &mut Simulator,
    ) {
        let overhead = self.devices[dev.0].kind.l2_overhead();
        let frame = Frame::mgmt(dev, dst, mgmt, overhead);
        self.enqueue(dev, frame, sim);
    }

    fn enqueue(&mut self, dev: DeviceId, frame: Frame, sim: &mut Simulator) {
        let now = sim.now();
        if !self.devices[dev.0].queue.has_room(frame.size_bytes() as u64) {
            self.drop_frame(dev, frame, DropReason::QueueFull, now);
            return;
        }
        self.record(TraceKind::Enqueue, dev, &frame, now);
        if let Err(frame) = self.devices[dev.0].queue.enqueue(frame) {
            self.drop_frame(dev, frame, DropReason::QueueFull, now);
            return;
        }
        self.try_transmit(dev, sim);
    }

    /// 设备空闲时取出队首帧开始发送
    fn try_transmit(&mut self, dev: DeviceId, sim: &mut Simulator) {
        let d = &mut self.devices[dev.0];
        if d.tx_busy {
            return;
        }
        let Some(frame) = d.queue.dequeue() else {
            return;
        };
        let kind = d.kind;
        self.record(TraceKind::Dequeue, dev, &frame, sim.now());
        match kind {
            DeviceKind::Csma => self.transmit_csma(dev, frame, sim),
            DeviceKind::Wifi(_) => self.transmit_wifi(dev, frame, sim),
        }
    }

    fn transmit_csma(&mut self, dev: DeviceId, frame: Frame, sim: &mut Simulator) {
        let ch_id = self.devices[dev.0].channel;
        let ch = &mut self.channels[ch_id.0];
        let ChannelKind::Csma(cfg) = ch.kind else {
            warn!(dev = ?dev, "CSMA 设备挂在非 CSMA 信道上");
            return;
        };
        let now = sim.now();
        let start = now.max(ch.busy_until);
        let depart = start.saturating_add(tx_time(frame.size_bytes(), cfg.data_rate_bps));
        ch.busy_until = depart;
        let peer = ch.peer_of(dev);
        let arrive = depart.saturating_add(cfg.delay);

        trace!(start = ?start, depart = ?depart, arrive = ?arrive, "CSMA 发送");
        self.devices[dev.0].tx_busy = true;
        sim.schedule(depart, DeviceReady { dev });
        if let Some(to) = peer {
            sim.schedule(arrive, DeliverFrame { to, frame });
        }
    }

    fn transmit_wifi(&mut self, dev: DeviceId, frame: Frame, sim: &mut Simulator) {
        let ch_id = self.devices[dev.0].channel;
        let delay = self.channels[ch_id.0].kind.delay();
        let start = sim.now().max(self.channels[ch_id.0].busy_until);
        let from_node = self.devices[dev.0].node;
        let Some(mac) = self.wifi.as_ref() else {
            return;
        };
        let range = mac.config().range_m;
        let retry_limit = mac.config().retry_limit;

        match frame.dst {
            FrameDst::Broadcast => {
                let rate = mac.basic_rate();
                let end = start
                    .saturating_add(tx_time(frame.size_bytes(), rate))
                    .saturating_add(WIFI_PHY_OVERHEAD);
                self.channels[ch_id.0].busy_until = end;
                self.devices[dev.0].tx_busy = true;
                sim.schedule(end, DeviceReady { dev });

                let peers: Vec<DeviceId> = self.channels[ch_id.0]
                    .devices
                    .iter()
                    .copied()
                    .filter(|&d| d != dev)
                    .collect();
                for to in peers {
                    let to_node = self.devices[to.0].node;
                    let dist = self.mobility.distance(from_node, to_node, start);
                    if dist <= range {
                        sim.schedule(
                            end.saturating_add(delay),
                            DeliverFrame {
                                to,
                                frame: frame.clone(),
                            },
                        );
                    } else if frame.is_beacon()
                        && let Some(mac) = self.wifi.as_mut()
                    {
                        mac.on_beacon_missed(to);
                    }
                }
            }
            FrameDst::Unicast(to) => {
                let rate = match frame.body {
                    FrameBody::Ip(_) => mac.data_rate(dev, to),
                    FrameBody::Mgmt(_) => mac.basic_rate(),
                };
                let once = tx_time(frame.size_bytes(), rate).saturating_add(WIFI_PHY_OVERHEAD);
                let to_node = self.devices[to.0].node;
                let dist = self.mobility.distance(from_node, to_node, start);
                let ok = dist <= range;
                let is_data = matches!(frame.body, FrameBody::Ip(_));
                if let Some(mac) = self.wifi.as_mut()
                    && is_data
                {
                    mac.report_tx(dev, to, ok);
                }

                let busy = if ok {
                    once
                } else {
                    SimTime(once.0.saturating_mul(retry_limit as u64 + 1))
                };
                let end = start.saturating_add(busy);
                self.channels[ch_id.0].busy_until = end;
                self.devices[dev.0].tx_busy = true;
                sim.schedule(end, DeviceReady { dev });

                if ok {
                    trace!(rate_bps = rate, dist, "无线单播发送");
                    sim.schedule(end.saturating_add(delay), DeliverFrame { to, frame });
                } else {
                    debug!(from = ?dev, to = ?to, dist, range, "📡 无线单播超出范围，重传耗尽");
                    self.stats.wifi_tx_failures += 1;
                    self.drop_frame(dev, frame, DropReason::RetryLimit, end);
                }
            }
        }
    }

    pub(crate) fn on_device_ready(&mut self, dev: DeviceId, sim: &mut Simulator) {
        self.devices[dev.0].tx_busy = false;
        self.try_transmit(dev, sim);
    }

    /// 设备收到一帧：按节点角色分派
    pub(crate) fn on_frame(&mut self, to: DeviceId, frame: Frame, sim: &mut Simulator) {
        let node = self.devices[to.0].node;
        self.record(TraceKind::Receive, to, &frame, sim.now());
        match self.nodes[node.0].role() {
            NodeRole::Switch => self.relay(node, to, frame, sim),
            NodeRole::Host | NodeRole::Router | NodeRole::AccessPoint | NodeRole::Station => {
                if let FrameDst::Unicast(d) = frame.dst
                    && d != to
                {
                    trace!(to = ?to, dst = ?d, "丢弃目的不是本设备的帧");
                    return;
                }
                let src = frame.src;
                match frame.body {
                    FrameBody::Ip(pkt) => self.on_ip(node, pkt, sim),
                    FrameBody::Mgmt(m) => self.on_mgmt(to, src, m, sim),
                }
            }
        }
    }

    /// 网桥：按静态转发表转发单播，广播泛洪到其余端口
    fn relay(&mut self, bridge: NodeId, in_port: DeviceId, frame: Frame, sim: &mut Simulator) {
        self.stats.relayed_frames += 1;
        match frame.dst {
            FrameDst::Unicast(target) => match self.fdb.get(&(bridge, target)).copied() {
                Some(out) if out != in_port => self.enqueue(out, frame, sim),
                Some(_) => trace!(bridge = ?bridge, "目标在入端口一侧，不转发"),
                None => debug!(bridge = ?bridge, target = ?target, "转发表中没有目标设备"),
            },
            FrameDst::Broadcast => {
                let ports: Vec<DeviceId> = self.nodes[bridge.0]
                    .devices()
                    .iter()
                    .copied()
                    .filter(|&p| p != in_port && self.devices[p.0].role.bridge() == Some(bridge))
                    .collect();
                for p in ports {
                    self.enqueue(p, frame.clone(), sim);
                }
            }
        }
    }

    fn on_ip(&mut self, node: NodeId, mut pkt: Packet, sim: &mut Simulator) {
        let now = sim.now();
        if self.is_local(node, *pkt.dst.ip()) {
            self.monitor.record_rx(&pkt, now);
            self.stats.delivered_pkts += 1;
            self.stats.delivered_bytes += pkt.size_bytes() as u64;
            trace!(uid = pkt.uid, node = ?node, "✅ 报文送达");
            let notices = self.with_tcp(|tcp, net| tcp.on_packet(node, pkt, sim, net));
            self.dispatch_tcp_notices(notices, sim);
            return;
        }

        if pkt.ttl <= 1 {
            self.drop_packet(node, pkt, DropReason::TtlExpired, now);
            return;
        }
        pkt.ttl -= 1;
        self.monitor.record_forward(&pkt, now);
        self.send_ip(node, pkt, sim);
    }

    fn on_mgmt(&mut self, dev: DeviceId, from: DeviceId, mgmt: MgmtFrame, sim: &mut Simulator) {
        let Some(mac) = self.wifi.as_mut() else {
            return;
        };
        let reply = match mgmt {
            MgmtFrame::Beacon { ssid } => mac.on_beacon_heard(dev, &ssid),
            MgmtFrame::AssocRequest { ssid } => Some(mac.on_assoc_request(from, &ssid)),
            MgmtFrame::AssocResponse { accepted } => {
                mac.on_assoc_response(dev, accepted);
                None
            }
        };
        if let Some(reply) = reply {
            self.send_mgmt(dev, FrameDst::Unicast(from), reply, sim);
        }
    }

    fn drop_frame(&mut self, dev: DeviceId, frame: Frame, reason: DropReason, now: SimTime) {
        self.record(TraceKind::Drop, dev, &frame, now);
        self.stats.dropped_pkts += 1;
        self.stats.dropped_bytes += frame.size_bytes() as u64;
        if let FrameBody::Ip(pkt) = &frame.body {
            self.monitor.record_drop(pkt, reason, now);
        }
        debug!(dev = ?dev, reason = ?reason, "🗑️  丢弃帧");
    }

    fn drop_packet(&mut self, at: NodeId, pkt: Packet, reason: DropReason, now: SimTime) {
        self.stats.dropped_pkts += 1;
        self.stats.dropped_bytes += pkt.size_bytes() as u64;
        self.monitor.record_drop(&pkt, reason, now);
        debug!(node = ?at, uid = pkt.uid, reason = ?reason, "🗑️  丢弃报文");
    }

    fn record(&mut self, kind: TraceKind, dev: DeviceId, frame: &Frame, now: SimTime) {
        if !self.instr.is_active() {
            return;
        }
        let d = &self.devices[dev.0];
        let index = self.nodes[d.node.0]
            .devices()
            .iter()
            .position(|&x| x == dev)
            .unwrap_or(0);
        let point = TracePoint {
            node: d.node,
            dev,
            index,
            wired: d.kind.is_wired(),
        };
        self.instr.record(kind, now, point, frame);
    }
}

/// 为每个网桥计算静态转发表：从每个端口出发，穿过其它网桥，记录能到达的终端设备
fn build_fdb(
    nodes: &[Node],
    devices: &[Device],
    channels: &[Channel],
) -> HashMap<(NodeId, DeviceId), DeviceId> {
    let mut fdb = HashMap::new();
    for bridge in nodes.iter().filter(|n| n.role() == NodeRole::Switch) {
        let bid = bridge.id();
        let ports = bridge
            .devices()
            .iter()
            .copied()
            .filter(|&p| devices[p.0].role.bridge() == Some(bid));
        for port in ports {
            let mut visited: HashSet<DeviceId> = HashSet::from([port]);
            let mut stack = vec![port];
            while let Some(d) = stack.pop() {
                let ch = &channels[devices[d.0].channel.0];
                for &peer in &ch.devices {
                    if !visited.insert(peer) {
                        continue;
                    }
                    match devices[peer.0].role.bridge() {
                        Some(other) if other != bid => {
                            for &q in nodes[other.0].devices() {
                                if devices[q.0].role.bridge() == Some(other) && visited.insert(q) {
                                    stack.push(q);
                                }
                            }
                        }
                        Some(_) => {}
                        None => {
                            fdb.insert((bid, peer), port);
                        }
                    }
                }
            }
        }
    }
    fdb
}
