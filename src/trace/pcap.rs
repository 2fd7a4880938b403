//! pcapng 抓包
//!
//! 每个被抓包的设备一个文件，链路类型为 `DataLink::IPV4`：只记录承载 IP 的帧，
//! 由 `pnet_packet` 按报文内容合成 IPv4 + TCP 头（载荷填零）。

use std::fs::File;
use std::io::{BufWriter, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pcap_file::pcapng::PcapNgWriter;
use pcap_file::pcapng::blocks::enhanced_packet::EnhancedPacketBlock;
use pcap_file::pcapng::blocks::interface_description::InterfaceDescriptionBlock;
use pcap_file::pcapng::blocks::section_header::SectionHeaderBlock;
use pcap_file::{DataLink, Endianness, PcapError};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::{self, MutableIpv4Packet};
use pnet_packet::tcp::{self, MutableTcpPacket, TcpFlags};
use tracing::warn;

use crate::net::{DeviceId, Frame, FrameDst, Packet, TcpSegment};
use crate::sim::SimTime;

/// 抓包模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// 记录设备看到的所有帧
    Promiscuous,
    /// 只记录本设备发出或发往本设备（含广播）的帧
    Host,
}

pub struct PcapCapture {
    dev: DeviceId,
    mode: CaptureMode,
    path: PathBuf,
    writer: PcapNgWriter<BufWriter<File>>,
    packets: u64,
    error: Option<PcapError>,
}

impl std::fmt::Debug for PcapCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcapCapture")
            .field("dev", &self.dev)
            .field("mode", &self.mode)
            .field("path", &self.path)
            .field("packets", &self.packets)
            .finish()
    }
}

impl PcapCapture {
    pub fn create(path: impl AsRef<Path>, dev: DeviceId, mode: CaptureMode) -> Result<Self, PcapError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(PcapError::IoError)?;
        let mut writer = PcapNgWriter::with_section_header(
            BufWriter::new(file),
            SectionHeaderBlock {
                endianness: Endianness::Big,
                major_version: 1,
                minor_version: 0,
                section_length: 0,
                options: vec![],
            },
        )?;
        writer.write_pcapng_block(InterfaceDescriptionBlock {
            linktype: DataLink::IPV4,
            snaplen: 65535,
            options: vec![],
        })?;
        Ok(Self {
            dev,
            mode,
            path,
            writer,
            packets: 0,
            error: None,
        })
    }

    pub fn device(&self) -> DeviceId {
        self.dev
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn capture(&mut self, now: SimTime, frame: &Frame) {
        if self.error.is_some() {
            return;
        }
        if self.mode == CaptureMode::Host {
            let mine = frame.src == self.dev
                || matches!(frame.dst, FrameDst::Unicast(d) if d == self.dev)
                || frame.dst == FrameDst::Broadcast;
            if !mine {
                return;
            }
        }
        let Some(pkt) = frame.packet() else {
            return;
        };
        let data = synthesize_ipv4(pkt);
        let block = EnhancedPacketBlock {
            interface_id: 0,
            timestamp: pcapng_timestamp(now),
            original_len: data.len() as u32,
            data: data.into(),
            options: Vec::new(),
        };
        match self.writer.write_pcapng_block(block) {
            Ok(_) => self.packets += 1,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "pcap 写入失败");
                self.error = Some(e);
            }
        }
    }

    /// 刷新文件，返回记录的报文数或第一次写入错误
    pub fn finish(mut self) -> Result<u64, PcapError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.writer.get_mut().flush().map_err(PcapError::IoError)?;
        Ok(self.packets)
    }
}

/// 接口描述块没有声明时间精度时按微秒解读，而写入器按纳秒编码，这里先缩小 1000 倍
fn pcapng_timestamp(now: SimTime) -> Duration {
    Duration::from_nanos(now.as_nanos() / 1000)
}

/// 按报文内容合成 IPv4 + TCP 头，载荷填零
pub fn synthesize_ipv4(pkt: &Packet) -> Vec<u8> {
    let src: Ipv4Addr = *pkt.src.ip();
    let dst: Ipv4Addr = *pkt.dst.ip();
    let tcp_len = 20 + pkt.payload_bytes as usize;
    let total = 20 + tcp_len;
    let mut buffer = vec![0u8; total];

    let (seq, ack, flags) = match pkt.segment {
        TcpSegment::Syn => (0, 0, TcpFlags::SYN),
        TcpSegment::SynAck => (0, 1, TcpFlags::SYN | TcpFlags::ACK),
        TcpSegment::HandshakeAck => (1, 1, TcpFlags::ACK),
        TcpSegment::Data { seq, .. } => ((seq as u32).wrapping_add(1), 1, TcpFlags::ACK | TcpFlags::PSH),
        TcpSegment::Ack { ack } => (1, (ack as u32).wrapping_add(1), TcpFlags::ACK),
    };

    if let Some(mut tcp_writer) = MutableTcpPacket::new(&mut buffer[20..]) {
        tcp_writer.set_source(pkt.src.port());
        tcp_writer.set_destination(pkt.dst.port());
        tcp_writer.set_sequence(seq);
        tcp_writer.set_acknowledgement(ack);
        tcp_writer.set_data_offset(5);
        tcp_writer.set_flags(flags);
        tcp_writer.set_window(65535);
        let checksum = tcp::ipv4_checksum(&tcp_writer.to_immutable(), &src, &dst);
        tcp_writer.set_checksum(checksum);
    }

    if let Some(mut ip_writer) = MutableIpv4Packet::new(&mut buffer) {
        ip_writer.set_version(4);
        ip_writer.set_header_length(5);
        ip_writer.set_total_length(total as u16);
        ip_writer.set_identification((pkt.uid & 0xffff) as u16);
        ip_writer.set_flags(0b010);
        ip_writer.set_ttl(pkt.ttl);
        ip_writer.set_next_level_protocol(IpNextHeaderProtocols::Tcp);
        ip_writer.set_source(src);
        ip_writer.set_destination(dst);
        let checksum = ipv4::checksum(&ip_writer.to_immutable());
        ip_writer.set_checksum(checksum);
    }

    buffer
}
