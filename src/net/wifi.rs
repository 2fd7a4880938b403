//! 802.11 基础设施模式 MAC（简化）
//!
//! - AP 周期性广播 beacon；
//! - 站点听到匹配 SSID 的 beacon 后发送关联请求，AP 回复关联响应；
//! - 只有已关联的站点才与 AP 交换数据帧；
//! - 连续错过 `max_missed_beacons` 个 beacon 的站点退回未关联状态；
//! - 单播帧速率由 AARF 或固定速率决定，超出 `range_m` 的单播帧在重传 `retry_limit` 次后丢弃。
//!
//! 不建模传播物理与冲突退避，可达性只看两点距离。

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, warn};

use super::id::DeviceId;
use super::net_world::NetWorld;
use super::packet::{FrameDst, MgmtFrame};
use crate::sim::{Event, SimTime, Simulator, World};

/// 802.11a OFDM 速率集合（bps，升序）
pub const OFDM_RATES_BPS: [u64; 8] = [
    6_000_000, 9_000_000, 12_000_000, 18_000_000, 24_000_000, 36_000_000, 48_000_000, 54_000_000,
];

/// PLCP 前导 + 帧间隔的固定开销
pub const WIFI_PHY_OVERHEAD: SimTime = SimTime(20_000 + 34_000);

/// 速率控制策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateControl {
    Aarf,
    Constant { rate_bps: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WifiMacConfig {
    pub ssid: String,
    /// 站点是否在启动时不等 beacon 直接发起关联
    pub active_probing: bool,
    pub rate_control: RateControl,
    /// 两点之间可以通信的最大距离（米）
    pub range_m: f64,
    pub beacon_interval: SimTime,
    pub max_missed_beacons: u32,
    pub retry_limit: u32,
}

impl Default for WifiMacConfig {
    fn default() -> Self {
        Self {
            ssid: "ns-3-ssid".to_string(),
            active_probing: false,
            rate_control: RateControl::Aarf,
            range_m: 120.0,
            beacon_interval: SimTime::from_micros(102_400),
            max_missed_beacons: 10,
            retry_limit: 7,
        }
    }
}

/// 站点关联状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaState {
    Unassociated,
    Associating,
    Associated,
}

const AARF_MIN_SUCCESS_THRESHOLD: u32 = 10;
const AARF_MAX_SUCCESS_THRESHOLD: u32 = 60;
const AARF_MIN_TIMER_THRESHOLD: u32 = 15;

/// AARF 速率自适应（每个 (发送方, 接收方) 一份状态）
#[derive(Debug, Clone)]
pub struct Aarf {
    rate_idx: usize,
    success: u32,
    failed: u32,
    retry: u32,
    timer: u32,
    success_threshold: u32,
    timer_threshold: u32,
    recovery: bool,
}

impl Default for Aarf {
    fn default() -> Self {
        Self {
            rate_idx: 0,
            success: 0,
            failed: 0,
            retry: 0,
            timer: 0,
            success_threshold: AARF_MIN_SUCCESS_THRESHOLD,
            timer_threshold: AARF_MIN_TIMER_THRESHOLD,
            recovery: false,
        }
    }
}

impl Aarf {
    pub fn rate_bps(&self) -> u64 {
        OFDM_RATES_BPS[self.rate_idx]
    }

    pub fn report_ok(&mut self) {
        self.success += 1;
        self.failed = 0;
        self.recovery = false;
        self.retry = 0;
        self.timer += 1;
        if (self.success >= self.success_threshold || self.timer >= self.timer_threshold)
            && self.rate_idx + 1 < OFDM_RATES_BPS.len()
        {
            self.rate_idx += 1;
            self.timer = 0;
            self.success = 0;
            self.recovery = true;
        }
    }

    pub fn report_failed(&mut self) {
        self.timer += 1;
        self.failed += 1;
        self.retry += 1;
        self.success = 0;
        if self.recovery {
            // 刚升速就失败：回退并加倍升速门限
            if self.retry == 1 {
                self.success_threshold =
                    (self.success_threshold * 2).min(AARF_MAX_SUCCESS_THRESHOLD);
                self.timer_threshold = (self.timer_threshold * 2).max(AARF_MIN_SUCCESS_THRESHOLD);
                self.rate_idx = self.rate_idx.saturating_sub(1);
            }
            self.timer = 0;
        } else {
            // 连续两次失败降一档
            if (self.retry - 1) % 2 == 1 {
                self.timer_threshold = AARF_MIN_TIMER_THRESHOLD;
                self.success_threshold = AARF_MIN_SUCCESS_THRESHOLD;
                self.rate_idx = self.rate_idx.saturating_sub(1);
            }
            if self.retry >= 2 {
                self.timer = 0;
            }
        }
    }

    /// 一帧最终放弃后清零重试计数
    pub fn report_final_failed(&mut self) {
        self.retry = 0;
    }
}

#[derive(Debug, Clone)]
struct StationMac {
    state: StaState,
    missed: u32,
    associations: u32,
}

/// 整个无线小区的 MAC 状态
#[derive(Debug)]
pub struct WifiMac {
    cfg: WifiMacConfig,
    ap: DeviceId,
    stations: HashMap<DeviceId, StationMac>,
    /// AP 侧记录的已关联站点
    associated: BTreeSet<DeviceId>,
    aarf: HashMap<(DeviceId, DeviceId), Aarf>,
}

impl WifiMac {
    pub fn new(cfg: WifiMacConfig, ap: DeviceId, stations: &[DeviceId]) -> Self {
        let stations = stations
            .iter()
            .map(|&d| {
                (
                    d,
                    StationMac {
                        state: StaState::Unassociated,
                        missed: 0,
                        associations: 0,
                    },
                )
            })
            .collect();
        Self {
            cfg,
            ap,
            stations,
            associated: BTreeSet::new(),
            aarf: HashMap::new(),
        }
    }

    pub fn config(&self) -> &WifiMacConfig {
        &self.cfg
    }

    pub fn access_point(&self) -> DeviceId {
        self.ap
    }

    pub fn station_state(&self, sta: DeviceId) -> Option<StaState> {
        self.stations.get(&sta).map(|s| s.state)
    }

    /// 站点成功关联的次数（含重新关联）
    pub fn association_count(&self, sta: DeviceId) -> u32 {
        self.stations.get(&sta).map_or(0, |s| s.associations)
    }

    pub fn is_station(&self, dev: DeviceId) -> bool {
        self.stations.contains_key(&dev)
    }

    /// 数据帧能否从 `from` 发往 `to`
    pub fn can_send(&self, from: DeviceId, to: DeviceId) -> bool {
        if from == self.ap {
            return self.associated.contains(&to);
        }
        to == self.ap && self.station_state(from) == Some(StaState::Associated)
    }

    /// 单播数据帧的发送速率
    pub fn data_rate(&self, from: DeviceId, to: DeviceId) -> u64 {
        match self.cfg.rate_control {
            RateControl::Constant { rate_bps } => rate_bps,
            RateControl::Aarf => self
                .aarf
                .get(&(from, to))
                .map_or(OFDM_RATES_BPS[0], Aarf::rate_bps),
        }
    }

    /// 广播与管理帧使用的基本速率
    pub fn basic_rate(&self) -> u64 {
        OFDM_RATES_BPS[0]
    }

    /// 上报一次单播数据帧的结果；`ok == false` 表示所有重传都失败
    pub fn report_tx(&mut self, from: DeviceId, to: DeviceId, ok: bool) {
        if !matches!(self.cfg.rate_control, RateControl::Aarf) {
            return;
        }
        let retry_limit = self.cfg.retry_limit;
        let st = self.aarf.entry((from, to)).or_default();
        if ok {
            st.report_ok();
        } else {
            for _ in 0..=retry_limit {
                st.report_failed();
            }
            st.report_final_failed();
        }
    }

    /// 站点启动时的主动关联（仅在 active_probing 时返回请求）
    pub fn start_probe(&mut self, sta: DeviceId) -> Option<MgmtFrame> {
        if !self.cfg.active_probing {
            return None;
        }
        let st = self.stations.get_mut(&sta)?;
        st.state = StaState::Associating;
        Some(MgmtFrame::AssocRequest {
            ssid: self.cfg.ssid.clone(),
        })
    }

    /// 站点听到 beacon；需要（重新）发起关联时返回关联请求
    pub fn on_beacon_heard(&mut self, sta: DeviceId, ssid: &str) -> Option<MgmtFrame> {
        if ssid != self.cfg.ssid {
            return None;
        }
        let st = self.stations.get_mut(&sta)?;
        st.missed = 0;
        match st.state {
            StaState::Associated => None,
            StaState::Unassociated | StaState::Associating => {
                st.state = StaState::Associating;
                Some(MgmtFrame::AssocRequest {
                    ssid: self.cfg.ssid.clone(),
                })
            }
        }
    }

    /// 站点错过一个 beacon
    pub fn on_beacon_missed(&mut self, sta: DeviceId) {
        let max = self.cfg.max_missed_beacons;
        let Some(st) = self.stations.get_mut(&sta) else {
            return;
        };
        st.missed = st.missed.saturating_add(1);
        if st.missed >= max && st.state != StaState::Unassociated {
            warn!(sta = ?sta, missed = st.missed, "📴 站点丢失关联");
            st.state = StaState::Unassociated;
        }
    }

    /// AP 收到关联请求，返回关联响应
    pub fn on_assoc_request(&mut self, sta: DeviceId, ssid: &str) -> MgmtFrame {
        let accepted = ssid == self.cfg.ssid && self.stations.contains_key(&sta);
        if accepted {
            self.associated.insert(sta);
        }
        debug!(sta = ?sta, accepted, "AP 处理关联请求");
        MgmtFrame::AssocResponse { accepted }
    }

    /// 站点收到关联响应
    pub fn on_assoc_response(&mut self, sta: DeviceId, accepted: bool) {
        let Some(st) = self.stations.get_mut(&sta) else {
            return;
        };
        if accepted && st.state == StaState::Associating {
            st.state = StaState::Associated;
            st.missed = 0;
            st.associations += 1;
            info!(sta = ?sta, "📶 站点完成关联");
        }
    }
}

/// 事件：AP 发送 beacon，并调度下一个
#[derive(Debug)]
pub struct Beacon {
    pub ap: DeviceId,
}

impl Event for Beacon {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let Beacon { ap } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");
        let Some(mac) = w.net.wifi.as_ref() else {
            return;
        };
        let ssid = mac.config().ssid.clone();
        let interval = mac.config().beacon_interval;
        w.net
            .send_mgmt(ap, FrameDst::Broadcast, MgmtFrame::Beacon { ssid }, sim);
        sim.schedule_in(interval, Beacon { ap });
    }
}
