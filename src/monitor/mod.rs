//! 流量监控
//!
//! 按五元组把 IP 报文归类为流，记录每条流的发送 / 转发 / 接收 / 丢弃。
//! 监控器是被动的：它只被网络层调用，从不调度事件，也不修改网络读取的状态。
//!
//! 计数约定：
//! - 发送在源节点记一次（每个报文 uid 一次，重传是新报文）；
//! - 只有被跟踪的在途报文才会记接收，因此每条流的接收数不超过发送数；
//! - 在途时间超过 `max_per_hop_delay` 的报文在检查时记为丢失。

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::net::Ipv4Addr;

use serde::Serialize;
use tracing::debug;

use crate::net::{DropReason, Packet};
use crate::sim::SimTime;

/// 流标识，从 1 开始
pub type FlowId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FiveTuple {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
    pub src_port: u16,
    pub dst_port: u16,
}

impl FiveTuple {
    pub fn of(pkt: &Packet) -> Self {
        Self {
            src: *pkt.src.ip(),
            dst: *pkt.dst.ip(),
            protocol: pkt.protocol(),
            src_port: pkt.src.port(),
            dst_port: pkt.dst.port(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropCount {
    pub packets: u64,
    pub bytes: u64,
}

/// 单条流的统计
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowStats {
    pub time_first_tx: Option<SimTime>,
    pub time_last_tx: Option<SimTime>,
    pub time_first_rx: Option<SimTime>,
    pub time_last_rx: Option<SimTime>,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub lost_packets: u64,
    pub times_forwarded: u64,
    pub delay_sum: SimTime,
    pub jitter_sum: SimTime,
    pub last_delay: Option<SimTime>,
    pub drops: BTreeMap<DropReason, DropCount>,
}

impl FlowStats {
    pub fn mean_delay(&self) -> Option<f64> {
        (self.rx_packets > 0).then(|| self.delay_sum.as_secs_f64() / self.rx_packets as f64)
    }

    pub fn mean_jitter(&self) -> Option<f64> {
        (self.rx_packets > 1)
            .then(|| self.jitter_sum.as_secs_f64() / (self.rx_packets - 1) as f64)
    }

    /// 接收吞吐（bps），按首末接收时间计算
    pub fn rx_throughput_bps(&self) -> Option<f64> {
        let (Some(first), Some(last)) = (self.time_first_rx, self.time_last_rx) else {
            return None;
        };
        let secs = last.saturating_sub(first).as_secs_f64();
        (secs > 0.0).then(|| self.rx_bytes as f64 * 8.0 / secs)
    }
}

#[derive(Debug, Clone, Copy)]
struct TrackedPacket {
    flow: FlowId,
    first_seen: SimTime,
    last_seen: SimTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowRecord {
    pub flow_id: FlowId,
    pub five_tuple: FiveTuple,
    pub stats: FlowStats,
    pub mean_delay_s: Option<f64>,
    pub mean_jitter_s: Option<f64>,
    pub rx_throughput_bps: Option<f64>,
}

/// 序列化输出
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowMonitorReport {
    pub max_per_hop_delay: SimTime,
    pub flows: Vec<FlowRecord>,
}

impl FlowMonitorReport {
    pub fn flow(&self, tuple: &FiveTuple) -> Option<&FlowRecord> {
        self.flows.iter().find(|f| &f.five_tuple == tuple)
    }

    pub fn write_json<W: Write>(&self, out: W) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(out, self)
    }
}

#[derive(Debug)]
pub struct FlowMonitor {
    classifier: BTreeMap<FiveTuple, FlowId>,
    flows: BTreeMap<FlowId, FlowStats>,
    in_flight: HashMap<u64, TrackedPacket>,
    max_per_hop_delay: SimTime,
}

impl Default for FlowMonitor {
    fn default() -> Self {
        Self::new(SimTime::from_secs(10))
    }
}

impl FlowMonitor {
    pub fn new(max_per_hop_delay: SimTime) -> Self {
        Self {
            classifier: BTreeMap::new(),
            flows: BTreeMap::new(),
            in_flight: HashMap::new(),
            max_per_hop_delay,
        }
    }

    fn classify(&mut self, pkt: &Packet) -> FlowId {
        let next = self.classifier.len() as FlowId + 1;
        *self.classifier.entry(FiveTuple::of(pkt)).or_insert(next)
    }

    pub fn flow_id(&self, tuple: &FiveTuple) -> Option<FlowId> {
        self.classifier.get(tuple).copied()
    }

    pub fn stats(&self, flow: FlowId) -> Option<&FlowStats> {
        self.flows.get(&flow)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// 源节点发出报文
    pub fn record_tx(&mut self, pkt: &Packet, now: SimTime) {
        let flow = self.classify(pkt);
        let st = self.flows.entry(flow).or_default();
        st.time_first_tx.get_or_insert(now);
        st.time_last_tx = Some(now);
        st.tx_packets += 1;
        st.tx_bytes += pkt.size_bytes() as u64;
        self.in_flight.insert(
            pkt.uid,
            TrackedPacket {
                flow,
                first_seen: now,
                last_seen: now,
            },
        );
    }

    /// 中间节点转发报文
    pub fn record_forward(&mut self, pkt: &Packet, now: SimTime) {
        let Some(tp) = self.in_flight.get_mut(&pkt.uid) else {
            return;
        };
        tp.last_seen = now;
        if let Some(st) = self.flows.get_mut(&tp.flow) {
            st.times_forwarded += 1;
        }
    }

    /// 目的节点收到报文
    pub fn record_rx(&mut self, pkt: &Packet, now: SimTime) {
        let Some(tp) = self.in_flight.remove(&pkt.uid) else {
            return;
        };
        let Some(st) = self.flows.get_mut(&tp.flow) else {
            return;
        };
        let delay = now.saturating_sub(tp.first_seen);
        st.time_first_rx.get_or_insert(now);
        st.time_last_rx = Some(now);
        st.rx_packets += 1;
        st.rx_bytes += pkt.size_bytes() as u64;
        st.delay_sum = st.delay_sum.saturating_add(delay);
        if let Some(last) = st.last_delay {
            let jitter = if delay > last {
                delay.saturating_sub(last)
            } else {
                last.saturating_sub(delay)
            };
            st.jitter_sum = st.jitter_sum.saturating_add(jitter);
        }
        st.last_delay = Some(delay);
    }

    /// 报文被丢弃
    pub fn record_drop(&mut self, pkt: &Packet, reason: DropReason, _now: SimTime) {
        let Some(tp) = self.in_flight.remove(&pkt.uid) else {
            return;
        };
        if let Some(st) = self.flows.get_mut(&tp.flow) {
            let c = st.drops.entry(reason).or_default();
            c.packets += 1;
            c.bytes += pkt.size_bytes() as u64;
        }
    }

    /// 把在途超时的报文记为丢失
    pub fn check_for_lost_packets(&mut self, now: SimTime) {
        let max = self.max_per_hop_delay;
        let mut lost = 0u64;
        let flows = &mut self.flows;
        self.in_flight.retain(|_, tp| {
            if now.saturating_sub(tp.last_seen) > max {
                if let Some(st) = flows.get_mut(&tp.flow) {
                    st.lost_packets += 1;
                }
                lost += 1;
                false
            } else {
                true
            }
        });
        if lost > 0 {
            debug!(lost, now = %now, "流量监控：在途报文超时记为丢失");
        }
    }

    pub fn report(&self) -> FlowMonitorReport {
        let mut flows: Vec<FlowRecord> = self
            .classifier
            .iter()
            .filter_map(|(tuple, &id)| {
                let stats = self.flows.get(&id)?.clone();
                Some(FlowRecord {
                    flow_id: id,
                    five_tuple: *tuple,
                    mean_delay_s: stats.mean_delay(),
                    mean_jitter_s: stats.mean_jitter(),
                    rx_throughput_bps: stats.rx_throughput_bps(),
                    stats,
                })
            })
            .collect();
        flows.sort_by_key(|f| f.flow_id);
        FlowMonitorReport {
            max_per_hop_delay: self.max_per_hop_delay,
            flows,
        }
    }
}
