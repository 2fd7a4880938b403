//! TCP（简化版）协议实现
//!
//! 支持场景所需的功能：
//! - 三次握手（SYN 超时重传，超过 `syn_retries` 次后连接失败）
//! - Reno 风格的拥塞控制（慢启动 + AIMD，含 3 dupACK 快速重传 / 快速恢复）
//! - RFC 6298 RTT 估计与 RTO（Karn 规则：重传段不采样），超时指数退避并回退到 go-back-N
//! - 接收端乱序缓存 + 累计 ACK
//! - 发送受应用写入量限制（`write`）
//!
//! 不实现窗口通告、选择确认、连接关闭与延迟 ACK。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::{Ipv4Addr, SocketAddrV4};

use tracing::{debug, info, trace, warn};

use crate::net::{NetApi, NodeId, Packet, TcpSegment, with_tcp_stack};
use crate::sim::{Event, SimTime, Simulator, World};

/// 一个 TCP 连接的唯一标识
pub type TcpConnId = u64;

/// 主动连接使用的第一个临时端口
pub const EPHEMERAL_PORT_START: u16 = 49153;

#[derive(Debug, Clone, PartialEq)]
pub struct TcpConfig {
    /// MSS（数据段载荷大小，字节）
    pub mss: u32,
    /// 初始 cwnd（段数）
    pub init_cwnd_segments: u32,
    /// 初始 ssthresh（字节）
    pub init_ssthresh_bytes: u64,
    /// 初始 RTO
    pub init_rto: SimTime,
    pub min_rto: SimTime,
    /// 最大 RTO（用于退避上限）
    pub max_rto: SimTime,
    /// 时钟粒度 G
    pub clock_granularity: SimTime,
    /// SYN 最多重传次数
    pub syn_retries: u32,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            mss: 536,
            init_cwnd_segments: 10,
            init_ssthresh_bytes: 65_535,
            init_rto: SimTime::from_secs(1),
            min_rto: SimTime::from_secs(1),
            max_rto: SimTime::from_secs(60),
            clock_granularity: SimTime::from_millis(1),
            syn_retries: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpState {
    SynSent,
    SynReceived,
    Established,
    Failed,
}

/// 交给应用层的连接事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TcpNotice {
    /// 主动连接完成握手
    Established { conn: TcpConnId, node: NodeId },
    /// 主动连接握手失败
    ConnectFailed { conn: TcpConnId, node: NodeId },
    /// 有新的按序数据交付
    Received {
        conn: TcpConnId,
        node: NodeId,
        local: SocketAddrV4,
        remote: SocketAddrV4,
        bytes: u64,
    },
}

#[derive(Debug, Clone)]
pub struct TcpConn {
    pub id: TcpConnId,
    pub node: NodeId,
    pub local: SocketAddrV4,
    pub remote: SocketAddrV4,
    state: TcpState,

    // sender
    written: u64,
    next_seq: u64,
    high_tx: u64,
    last_acked: u64,
    cwnd_bytes: u64,
    ssthresh_bytes: u64,
    dup_acks: u32,
    /// 快速恢复的退出点
    recover: Option<u64>,
    rto: SimTime,
    srtt: Option<f64>,
    rttvar: f64,
    /// (段末尾序号, 发送时刻)
    rtt_probe: Option<(u64, SimTime)>,
    rto_epoch: u64,
    rto_armed: bool,
    syn_sent: u32,
    retransmits: u64,

    // receiver
    rcv_nxt: u64,
    ooo: BTreeMap<u64, u32>,
}

impl TcpConn {
    fn new(
        id: TcpConnId,
        node: NodeId,
        local: SocketAddrV4,
        remote: SocketAddrV4,
        state: TcpState,
        cfg: &TcpConfig,
    ) -> Self {
        let mss = cfg.mss as u64;
        Self {
            id,
            node,
            local,
            remote,
            state,
            written: 0,
            next_seq: 0,
            high_tx: 0,
            last_acked: 0,
            cwnd_bytes: mss.saturating_mul(cfg.init_cwnd_segments as u64).max(mss),
            ssthresh_bytes: cfg.init_ssthresh_bytes.max(2 * mss),
            dup_acks: 0,
            recover: None,
            rto: cfg.init_rto,
            srtt: None,
            rttvar: 0.0,
            rtt_probe: None,
            rto_epoch: 0,
            rto_armed: false,
            syn_sent: 0,
            retransmits: 0,
            rcv_nxt: 0,
            ooo: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> TcpState {
        self.state
    }

    pub fn bytes_acked(&self) -> u64 {
        self.last_acked
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn bytes_received(&self) -> u64 {
        self.rcv_nxt
    }

    pub fn cwnd_bytes(&self) -> u64 {
        self.cwnd_bytes
    }

    pub fn rto(&self) -> SimTime {
        self.rto
    }

    pub fn retransmits(&self) -> u64 {
        self.retransmits
    }

    fn flight(&self) -> u64 {
        self.next_seq.saturating_sub(self.last_acked)
    }

    /// RFC 6298 更新 srtt / rttvar / rto
    fn sample_rtt(&mut self, r: SimTime, cfg: &TcpConfig) {
        let r = r.as_secs_f64();
        match self.srtt {
            None => {
                self.srtt = Some(r);
                self.rttvar = r / 2.0;
            }
            Some(srtt) => {
                self.rttvar = 0.75 * self.rttvar + 0.25 * (srtt - r).abs();
                self.srtt = Some(0.875 * srtt + 0.125 * r);
            }
        }
        let srtt = self.srtt.unwrap_or(r);
        let g = cfg.clock_granularity.as_secs_f64();
        let rto = SimTime::from_secs_f64(srtt + g.max(4.0 * self.rttvar));
        self.rto = rto.max(cfg.min_rto).min(cfg.max_rto);
    }
}

#[derive(Debug)]
pub struct TcpStack {
    cfg: TcpConfig,
    conns: HashMap<TcpConnId, TcpConn>,
    /// (local, remote) -> 连接
    by_tuple: HashMap<(SocketAddrV4, SocketAddrV4), TcpConnId>,
    listeners: HashSet<SocketAddrV4>,
    next_id: TcpConnId,
    next_port: u16,
}

impl Default for TcpStack {
    fn default() -> Self {
        Self::new(TcpConfig::default())
    }
}

impl TcpStack {
    pub fn new(cfg: TcpConfig) -> Self {
        Self {
            cfg,
            conns: HashMap::new(),
            by_tuple: HashMap::new(),
            listeners: HashSet::new(),
            next_id: 1,
            next_port: EPHEMERAL_PORT_START,
        }
    }

    pub fn config(&self) -> &TcpConfig {
        &self.cfg
    }

    pub fn set_config(&mut self, cfg: TcpConfig) {
        self.cfg = cfg;
    }

    pub fn get(&self, id: TcpConnId) -> Option<&TcpConn> {
        self.conns.get(&id)
    }

    pub fn connections(&self) -> impl Iterator<Item = &TcpConn> {
        self.conns.values()
    }

    pub fn listen(&mut self, addr: SocketAddrV4) {
        self.listeners.insert(addr);
    }

    /// 停止接受新连接（已建立的连接不受影响）
    pub fn unlisten(&mut self, addr: SocketAddrV4) {
        self.listeners.remove(&addr);
    }

    pub fn is_listening(&self, addr: SocketAddrV4) -> bool {
        self.listeners.contains(&addr)
    }

    fn alloc_port(&mut self) -> u16 {
        let port = self.next_port;
        self.next_port = if self.next_port == u16::MAX {
            EPHEMERAL_PORT_START
        } else {
            self.next_port + 1
        };
        port
    }

    fn send_segment(conn: &TcpConn, seg: TcpSegment, sim: &mut Simulator, net: &mut dyn NetApi) {
        let uid = net.next_packet_uid();
        let pkt = Packet::tcp(uid, conn.local, conn.remote, seg);
        net.originate(conn.node, pkt, sim);
    }

    fn arm_rto(conn: &mut TcpConn, sim: &mut Simulator) {
        conn.rto_epoch = conn.rto_epoch.wrapping_add(1);
        conn.rto_armed = true;
        sim.schedule_in(
            conn.rto,
            TcpRto {
                conn_id: conn.id,
                epoch: conn.rto_epoch,
            },
        );
    }

    fn cancel_rto(conn: &mut TcpConn) {
        conn.rto_epoch = conn.rto_epoch.wrapping_add(1);
        conn.rto_armed = false;
    }

    /// 主动打开连接：分配临时端口并发送 SYN
    #[tracing::instrument(level = "debug", skip(self, sim, net))]
    pub fn connect(
        &mut self,
        node: NodeId,
        local_ip: Ipv4Addr,
        remote: SocketAddrV4,
        sim: &mut Simulator,
        net: &mut dyn NetApi,
    ) -> TcpConnId {
        let id = self.next_id;
        self.next_id += 1;
        let local = SocketAddrV4::new(local_ip, self.alloc_port());
        let mut conn = TcpConn::new(id, node, local, remote, TcpState::SynSent, &self.cfg);
        conn.syn_sent = 1;
        Self::send_segment(&conn, TcpSegment::Syn, sim, net);
        Self::arm_rto(&mut conn, sim);
        debug!(conn = id, %local, %remote, "发送 SYN");
        self.by_tuple.insert((local, remote), id);
        self.conns.insert(id, conn);
        id
    }

    /// 应用写入 `bytes` 字节；连接未建立时先缓存
    pub fn write(&mut self, id: TcpConnId, bytes: u64, sim: &mut Simulator, net: &mut dyn NetApi) {
        let Some(conn) = self.conns.get_mut(&id) else {
            return;
        };
        if conn.state == TcpState::Failed {
            return;
        }
        conn.written = conn.written.saturating_add(bytes);
        if conn.state == TcpState::Established {
            Self::send_data_if_possible(conn, &self.cfg, sim, net);
        }
    }

    fn send_data_if_possible(
        conn: &mut TcpConn,
        cfg: &TcpConfig,
        sim: &mut Simulator,
        net: &mut dyn NetApi,
    ) {
        let mss = cfg.mss as u64;
        while conn.next_seq < conn.written {
            let flight = conn.flight();
            if flight >= conn.cwnd_bytes {
                break;
            }
            let len = mss
                .min(conn.written - conn.next_seq)
                .min(conn.cwnd_bytes - flight) as u32;
            if len == 0 {
                break;
            }
            let seq = conn.next_seq;
            let retrans = seq < conn.high_tx;
            Self::send_segment(conn, TcpSegment::Data { seq, len }, sim, net);
            conn.next_seq += len as u64;
            conn.high_tx = conn.high_tx.max(conn.next_seq);
            if retrans {
                conn.retransmits += 1;
            } else if conn.rtt_probe.is_none() {
                conn.rtt_probe = Some((conn.next_seq, sim.now()));
            }
            if !conn.rto_armed {
                Self::arm_rto(conn, sim);
            }
            trace!(conn = conn.id, seq, len, cwnd = conn.cwnd_bytes, "发送数据段");
        }
    }

    fn retransmit_head(conn: &mut TcpConn, cfg: &TcpConfig, sim: &mut Simulator, net: &mut dyn NetApi) {
        let outstanding = conn.high_tx.saturating_sub(conn.last_acked);
        let len = (cfg.mss as u64).min(outstanding) as u32;
        if len == 0 {
            return;
        }
        let seq = conn.last_acked;
        Self::send_segment(conn, TcpSegment::Data { seq, len }, sim, net);
        conn.retransmits += 1;
        // Karn：重传后放弃当前 RTT 采样
        conn.rtt_probe = None;
    }

    /// 处理一个发往本节点的 TCP 报文
    pub fn on_packet(
        &mut self,
        node: NodeId,
        pkt: Packet,
        sim: &mut Simulator,
        net: &mut dyn NetApi,
    ) -> Vec<TcpNotice> {
        let mut notices = Vec::new();
        let key = (pkt.dst, pkt.src);
        let Some(&id) = self.by_tuple.get(&key) else {
            if pkt.segment == TcpSegment::Syn && self.listeners.contains(&pkt.dst) {
                self.accept(node, pkt.dst, pkt.src, sim, net);
            } else {
                debug!(node = ?node, dst = %pkt.dst, seg = ?pkt.segment, "没有匹配的连接，丢弃段");
            }
            return notices;
        };
        let cfg = &self.cfg;
        let Some(conn) = self.conns.get_mut(&id) else {
            return notices;
        };

        match (conn.state, pkt.segment) {
            (TcpState::Failed, _) => {}
            (TcpState::SynSent, TcpSegment::SynAck) => {
                conn.state = TcpState::Established;
                Self::cancel_rto(conn);
                Self::send_segment(conn, TcpSegment::HandshakeAck, sim, net);
                info!(conn = id, local = %conn.local, remote = %conn.remote, "🤝 TCP 连接建立");
                notices.push(TcpNotice::Established { conn: id, node });
                Self::send_data_if_possible(conn, cfg, sim, net);
            }
            (TcpState::SynSent, _) => {}
            (TcpState::SynReceived, TcpSegment::Syn) | (TcpState::Established, TcpSegment::Syn) => {
                // 对端没收到 SYN|ACK，重发
                Self::send_segment(conn, TcpSegment::SynAck, sim, net);
            }
            (TcpState::Established, TcpSegment::SynAck) => {
                Self::send_segment(conn, TcpSegment::HandshakeAck, sim, net);
            }
            (TcpState::SynReceived, TcpSegment::HandshakeAck) => {
                conn.state = TcpState::Established;
            }
            (TcpState::SynReceived | TcpState::Established, TcpSegment::Data { seq, len }) => {
                conn.state = TcpState::Established;
                let before = conn.rcv_nxt;
                Self::receive_data(conn, seq, len);
                let ack = conn.rcv_nxt;
                Self::send_segment(conn, TcpSegment::Ack { ack }, sim, net);
                if ack > before {
                    notices.push(TcpNotice::Received {
                        conn: id,
                        node,
                        local: conn.local,
                        remote: conn.remote,
                        bytes: ack - before,
                    });
                }
            }
            (TcpState::Established, TcpSegment::Ack { ack }) => {
                Self::on_ack(conn, cfg, ack, sim, net);
            }
            (TcpState::SynReceived, _) | (TcpState::Established, _) => {}
        }
        notices
    }

    fn accept(
        &mut self,
        node: NodeId,
        local: SocketAddrV4,
        remote: SocketAddrV4,
        sim: &mut Simulator,
        net: &mut dyn NetApi,
    ) {
        let id = self.next_id;
        self.next_id += 1;
        let conn = TcpConn::new(id, node, local, remote, TcpState::SynReceived, &self.cfg);
        Self::send_segment(&conn, TcpSegment::SynAck, sim, net);
        debug!(conn = id, %local, %remote, "接受连接，发送 SYN|ACK");
        self.by_tuple.insert((local, remote), id);
        self.conns.insert(id, conn);
    }

    fn receive_data(conn: &mut TcpConn, seq: u64, len: u32) {
        let end = seq + len as u64;
        if end <= conn.rcv_nxt {
            return;
        }
        if seq > conn.rcv_nxt {
            let e = conn.ooo.entry(seq).or_insert(0);
            *e = (*e).max(len);
            return;
        }
        conn.rcv_nxt = end;
        while let Some((&s, &l)) = conn.ooo.first_key_value() {
            if s > conn.rcv_nxt {
                break;
            }
            conn.rcv_nxt = conn.rcv_nxt.max(s + l as u64);
            conn.ooo.pop_first();
        }
    }

    fn on_ack(conn: &mut TcpConn, cfg: &TcpConfig, ack: u64, sim: &mut Simulator, net: &mut dyn NetApi) {
        let mss = cfg.mss as u64;
        if ack > conn.last_acked && ack <= conn.high_tx {
            let newly = ack - conn.last_acked;
            conn.last_acked = ack;
            conn.next_seq = conn.next_seq.max(ack);
            conn.dup_acks = 0;

            if let Some((end, sent_at)) = conn.rtt_probe
                && ack >= end
            {
                conn.sample_rtt(sim.now().saturating_sub(sent_at), cfg);
                conn.rtt_probe = None;
            }

            match conn.recover {
                Some(recover) if ack >= recover => {
                    conn.cwnd_bytes = conn.ssthresh_bytes;
                    conn.recover = None;
                }
                Some(_) => {
                    // 部分确认：继续重传下一个缺口
                    Self::retransmit_head(conn, cfg, sim, net);
                    conn.cwnd_bytes = conn.cwnd_bytes.saturating_sub(newly).saturating_add(mss);
                }
                None if conn.cwnd_bytes < conn.ssthresh_bytes => {
                    conn.cwnd_bytes = conn.cwnd_bytes.saturating_add(newly.min(mss));
                }
                None => {
                    let inc = (mss.saturating_mul(mss) / conn.cwnd_bytes.max(1)).max(1);
                    conn.cwnd_bytes = conn.cwnd_bytes.saturating_add(inc);
                }
            }

            if conn.last_acked >= conn.high_tx {
                Self::cancel_rto(conn);
            } else {
                Self::arm_rto(conn, sim);
            }
            Self::send_data_if_possible(conn, cfg, sim, net);
        } else if ack == conn.last_acked && conn.high_tx > conn.last_acked {
            conn.dup_acks += 1;
            if conn.dup_acks == 3 && conn.recover.is_none() {
                conn.ssthresh_bytes = (conn.flight() / 2).max(2 * mss);
                conn.cwnd_bytes = conn.ssthresh_bytes.saturating_add(3 * mss);
                conn.recover = Some(conn.high_tx);
                debug!(conn = conn.id, seq = conn.last_acked, "3 dupACK，快速重传");
                Self::retransmit_head(conn, cfg, sim, net);
            } else if conn.dup_acks > 3 && conn.recover.is_some() {
                conn.cwnd_bytes = conn.cwnd_bytes.saturating_add(mss);
                Self::send_data_if_possible(conn, cfg, sim, net);
            }
        }
    }

    /// RTO 到期
    pub fn on_rto(
        &mut self,
        conn_id: TcpConnId,
        epoch: u64,
        sim: &mut Simulator,
        net: &mut dyn NetApi,
    ) -> Vec<TcpNotice> {
        let mut notices = Vec::new();
        let cfg = &self.cfg;
        let Some(conn) = self.conns.get_mut(&conn_id) else {
            return notices;
        };
        if !conn.rto_armed || conn.rto_epoch != epoch {
            return notices;
        }
        conn.rto_armed = false;
        conn.rto = SimTime(conn.rto.0.saturating_mul(2)).min(cfg.max_rto);

        match conn.state {
            TcpState::SynSent => {
                if conn.syn_sent > cfg.syn_retries {
                    conn.state = TcpState::Failed;
                    warn!(conn = conn_id, remote = %conn.remote, "❌ TCP 连接失败：SYN 重传耗尽");
                    notices.push(TcpNotice::ConnectFailed {
                        conn: conn_id,
                        node: conn.node,
                    });
                } else {
                    conn.syn_sent += 1;
                    Self::send_segment(conn, TcpSegment::Syn, sim, net);
                    Self::arm_rto(conn, sim);
                }
            }
            TcpState::Established if conn.high_tx > conn.last_acked => {
                let mss = cfg.mss as u64;
                conn.ssthresh_bytes = (conn.flight() / 2).max(2 * mss);
                conn.cwnd_bytes = mss;
                conn.dup_acks = 0;
                conn.recover = None;
                conn.rtt_probe = None;
                conn.next_seq = conn.last_acked;
                debug!(conn = conn_id, seq = conn.last_acked, rto = %conn.rto, "⏰ RTO 超时重传");
                Self::send_data_if_possible(conn, cfg, sim, net);
            }
            TcpState::SynReceived | TcpState::Established | TcpState::Failed => {}
        }
        notices
    }
}

/// TCP RTO 事件：epoch 与连接当前计时器一致时才生效
#[derive(Debug)]
pub struct TcpRto {
    pub conn_id: TcpConnId,
    pub epoch: u64,
}

impl Event for TcpRto {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let TcpRto { conn_id, epoch } = *self;
        with_tcp_stack(world, sim, |tcp, sim, net| tcp.on_rto(conn_id, epoch, sim, net));
    }
}
