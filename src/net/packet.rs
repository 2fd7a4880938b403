//! 数据包与帧
//!
//! `Packet` 是三层 IPv4 报文（只承载 TCP 段），`Frame` 是在某个信道上传输的二层帧，
//! 可以承载 IP 报文，也可以是无线管理帧（beacon / 关联请求 / 关联响应）。

use std::fmt;
use std::net::SocketAddrV4;

use super::id::DeviceId;

/// IPv4 + TCP 头部（无选项）
pub const IPV4_TCP_HEADER_BYTES: u32 = 40;
/// 新报文的初始 TTL
pub const DEFAULT_TTL: u8 = 64;
/// IP 协议号：TCP
pub const PROTO_TCP: u8 = 6;

/// TCP 段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpSegment {
    Syn,
    SynAck,
    /// 三次握手的最后一个 ACK
    HandshakeAck,
    Data { seq: u64, len: u32 },
    Ack { ack: u64 },
}

impl TcpSegment {
    fn label(&self) -> String {
        match self {
            TcpSegment::Syn => "[SYN]".to_string(),
            TcpSegment::SynAck => "[SYN|ACK]".to_string(),
            TcpSegment::HandshakeAck => "[ACK]".to_string(),
            TcpSegment::Data { seq, len } => format!("[ACK] Seq={seq} Len={len}"),
            TcpSegment::Ack { ack } => format!("[ACK] Ack={ack}"),
        }
    }
}

/// IPv4 报文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// 全局唯一编号（流量监控用它跟踪在途报文）
    pub uid: u64,
    pub src: SocketAddrV4,
    pub dst: SocketAddrV4,
    pub segment: TcpSegment,
    /// TCP 载荷字节数
    pub payload_bytes: u32,
    pub ttl: u8,
}

impl Packet {
    pub fn tcp(uid: u64, src: SocketAddrV4, dst: SocketAddrV4, segment: TcpSegment) -> Self {
        let payload_bytes = match segment {
            TcpSegment::Data { len, .. } => len,
            _ => 0,
        };
        Self {
            uid,
            src,
            dst,
            segment,
            payload_bytes,
            ttl: DEFAULT_TTL,
        }
    }

    /// IP 报文总长度
    pub fn size_bytes(&self) -> u32 {
        self.payload_bytes.saturating_add(IPV4_TCP_HEADER_BYTES)
    }

    pub fn protocol(&self) -> u8 {
        PROTO_TCP
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IPv4 (ttl {} protocol {} size {}) {} > {} TCP {}",
            self.ttl,
            self.protocol(),
            self.size_bytes(),
            self.src,
            self.dst,
            self.segment.label()
        )
    }
}

/// 无线管理帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MgmtFrame {
    Beacon { ssid: String },
    AssocRequest { ssid: String },
    AssocResponse { accepted: bool },
}

impl MgmtFrame {
    /// 帧体大小（近似）
    pub fn body_bytes(&self) -> u32 {
        match self {
            MgmtFrame::Beacon { ssid } => 48 + ssid.len() as u32,
            MgmtFrame::AssocRequest { ssid } => 28 + ssid.len() as u32,
            MgmtFrame::AssocResponse { .. } => 24,
        }
    }
}

/// 帧载荷
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    Ip(Packet),
    Mgmt(MgmtFrame),
}

/// 帧的二层目的地
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDst {
    Unicast(DeviceId),
    Broadcast,
}

/// 二层帧
///
/// `src` 是最初发出该帧的设备；网桥转发时保持不变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub src: DeviceId,
    pub dst: FrameDst,
    pub body: FrameBody,
    pub l2_overhead: u32,
}

impl Frame {
    pub fn ip(src: DeviceId, dst: DeviceId, pkt: Packet, l2_overhead: u32) -> Self {
        Self {
            src,
            dst: FrameDst::Unicast(dst),
            body: FrameBody::Ip(pkt),
            l2_overhead,
        }
    }

    pub fn mgmt(src: DeviceId, dst: FrameDst, mgmt: MgmtFrame, l2_overhead: u32) -> Self {
        Self {
            src,
            dst,
            body: FrameBody::Mgmt(mgmt),
            l2_overhead,
        }
    }

    /// 帧在信道上占用的总字节数
    pub fn size_bytes(&self) -> u32 {
        let body = match &self.body {
            FrameBody::Ip(pkt) => pkt.size_bytes(),
            FrameBody::Mgmt(m) => m.body_bytes(),
        };
        body.saturating_add(self.l2_overhead)
    }

    pub fn packet(&self) -> Option<&Packet> {
        match &self.body {
            FrameBody::Ip(pkt) => Some(pkt),
            FrameBody::Mgmt(_) => None,
        }
    }

    pub fn is_beacon(&self) -> bool {
        matches!(self.body, FrameBody::Mgmt(MgmtFrame::Beacon { .. }))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dst = match self.dst {
            FrameDst::Unicast(d) => format!("dev{}", d.0),
            FrameDst::Broadcast => "ff:ff:ff:ff:ff:ff".to_string(),
        };
        write!(f, "L2 (dev{} > {} size {}) ", self.src.0, dst, self.size_bytes())?;
        match &self.body {
            FrameBody::Ip(pkt) => write!(f, "{pkt}"),
            FrameBody::Mgmt(m) => write!(f, "Mgmt {m:?}"),
        }
    }
}
