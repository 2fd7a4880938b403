//! 信道（有线 CSMA 段 / 无线介质）
//!
//! 信道是半双工的：同一时刻只能有一帧在上面序列化，`busy_until` 记录当前这帧发完的时刻。

use super::id::{ChannelId, DeviceId};
use crate::sim::SimTime;

/// CSMA 段属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsmaChannelConfig {
    pub data_rate_bps: u64,
    pub delay: SimTime,
}

impl Default for CsmaChannelConfig {
    fn default() -> Self {
        Self {
            data_rate_bps: 100_000_000,
            delay: SimTime::from_nanos(1000),
        }
    }
}

/// 信道种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Csma(CsmaChannelConfig),
    Wifi { delay: SimTime },
}

impl ChannelKind {
    pub fn delay(&self) -> SimTime {
        match self {
            ChannelKind::Csma(cfg) => cfg.delay,
            ChannelKind::Wifi { delay } => *delay,
        }
    }
}

/// 运行时信道
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: ChannelId,
    pub kind: ChannelKind,
    pub devices: Vec<DeviceId>,
    pub busy_until: SimTime,
}

impl Channel {
    pub fn new(id: ChannelId, kind: ChannelKind, devices: Vec<DeviceId>) -> Self {
        Self {
            id,
            kind,
            devices,
            busy_until: SimTime::ZERO,
        }
    }

    /// 点到点段上 `dev` 的对端
    pub fn peer_of(&self, dev: DeviceId) -> Option<DeviceId> {
        self.devices.iter().copied().find(|&d| d != dev)
    }
}

/// 以 `rate_bps` 发送 `bytes` 字节所需的时间（向上取整到纳秒）
pub fn tx_time(bytes: u32, rate_bps: u64) -> SimTime {
    if rate_bps == 0 {
        return SimTime(u64::MAX / 4);
    }
    let bits = (bytes as u128).saturating_mul(8);
    let nanos = (bits.saturating_mul(1_000_000_000u128) + (rate_bps as u128 - 1)) / rate_bps as u128;
    SimTime(nanos.min(u64::MAX as u128) as u64)
}
