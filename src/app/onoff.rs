//! On/Off 发送端应用
//!
//! 连接建立后先进入 off 周期；on 周期里每 `payload_size * 8 / data_rate` 写一个数据块。
//! 每次切换都会递增 epoch，旧 epoch 的定时事件到期后直接忽略。

use std::net::{Ipv4Addr, SocketAddrV4};

use tracing::{info, warn};

use super::net_of;
use crate::net::{Network, NodeId};
use crate::plan::{ActiveWindow, OnOffTiming, SourceEndpoint};
use crate::proto::tcp::TcpConnId;
use crate::sim::{Event, SimTime, Simulator, World};

#[derive(Debug, Clone)]
pub struct OnOffSource {
    pub node: NodeId,
    pub local_addr: Ipv4Addr,
    pub remote: SocketAddrV4,
    pub payload_size: u32,
    pub max_bytes: u64,
    pub window: ActiveWindow,
    pub timing: OnOffTiming,
    conn: Option<TcpConnId>,
    running: bool,
    connected: bool,
    failed: bool,
    sending: bool,
    epoch: u64,
    total_tx: u64,
}

impl OnOffSource {
    pub fn new(ep: &SourceEndpoint) -> Self {
        Self {
            node: ep.node,
            local_addr: ep.local_addr,
            remote: ep.remote,
            payload_size: ep.payload_size,
            max_bytes: ep.max_bytes,
            window: ep.window,
            timing: ep.timing,
            conn: None,
            running: false,
            connected: false,
            failed: false,
            sending: false,
            epoch: 0,
            total_tx: 0,
        }
    }

    /// 已写入 TCP 的字节数
    pub fn total_tx(&self) -> u64 {
        self.total_tx
    }

    pub fn connection(&self) -> Option<TcpConnId> {
        self.conn
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// 两个数据块之间的间隔
    pub fn send_interval(&self) -> SimTime {
        let bits = self.payload_size as u128 * 8;
        let rate = self.timing.data_rate_bps.max(1) as u128;
        SimTime((bits * 1_000_000_000 / rate).min(u64::MAX as u128) as u64)
    }

    fn budget_left(&self) -> u64 {
        self.max_bytes.saturating_sub(self.total_tx)
    }
}

impl Network {
    pub(crate) fn start_source(&mut self, idx: usize, sim: &mut Simulator) {
        let Some(src) = self.apps.sources.get_mut(idx) else {
            return;
        };
        if src.running || src.conn.is_some() {
            return;
        }
        src.running = true;
        let (node, local_addr, remote) = (src.node, src.local_addr, src.remote);
        let conn = self.with_tcp(|tcp, net| tcp.connect(node, local_addr, remote, sim, net));
        if let Some(src) = self.apps.sources.get_mut(idx) {
            src.conn = Some(conn);
        }
        info!(target: "hybridnet_rs::app", %remote, conn, "OnOffSource 发起连接");
    }

    pub(crate) fn stop_source(&mut self, idx: usize) {
        let Some(src) = self.apps.sources.get_mut(idx) else {
            return;
        };
        src.running = false;
        src.sending = false;
        src.epoch += 1;
        info!(target: "hybridnet_rs::app", total_tx = src.total_tx, "OnOffSource 停止");
    }

    pub(crate) fn on_source_connected(&mut self, conn: TcpConnId, sim: &mut Simulator) {
        let Some((idx, src)) = self
            .apps
            .sources
            .iter_mut()
            .enumerate()
            .find(|(_, s)| s.conn == Some(conn))
        else {
            return;
        };
        src.connected = true;
        if !src.running {
            return;
        }
        src.epoch += 1;
        sim.schedule_in(
            src.timing.off_time,
            OnOffToggle {
                app: idx,
                epoch: src.epoch,
                on: true,
            },
        );
    }

    pub(crate) fn on_source_failed(&mut self, conn: TcpConnId) {
        for src in self.apps.sources.iter_mut().filter(|s| s.conn == Some(conn)) {
            src.failed = true;
            src.running = false;
            warn!(remote = %src.remote, "OnOffSource 连接失败，不再重连");
        }
    }

    fn on_toggle(&mut self, idx: usize, epoch: u64, on: bool, sim: &mut Simulator) {
        let Some(src) = self.apps.sources.get_mut(idx) else {
            return;
        };
        if !src.running || src.epoch != epoch {
            return;
        }
        if on {
            src.sending = true;
            let interval = src.send_interval();
            sim.schedule_in(interval, OnOffSend { app: idx, epoch });
            sim.schedule_in(
                src.timing.on_time,
                OnOffToggle {
                    app: idx,
                    epoch,
                    on: false,
                },
            );
        } else {
            src.sending = false;
            src.epoch += 1;
            sim.schedule_in(
                src.timing.off_time,
                OnOffToggle {
                    app: idx,
                    epoch: src.epoch,
                    on: true,
                },
            );
        }
    }

    fn on_send(&mut self, idx: usize, epoch: u64, sim: &mut Simulator) {
        let Some(src) = self.apps.sources.get_mut(idx) else {
            return;
        };
        if !src.running || !src.sending || src.epoch != epoch {
            return;
        }
        let chunk = (src.payload_size as u64).min(src.budget_left());
        let Some(conn) = src.conn.filter(|_| chunk > 0) else {
            return;
        };
        src.total_tx += chunk;
        let more = src.budget_left() > 0;
        let interval = src.send_interval();
        let total_tx = src.total_tx;

        self.with_tcp(|tcp, net| tcp.write(conn, chunk, sim, net));
        info!(target: "hybridnet_rs::app", t = %sim.now(), chunk, total_tx, "OnOffSource 写入数据");
        if more {
            sim.schedule_in(interval, OnOffSend { app: idx, epoch });
        }
    }
}

/// 事件：切换 on / off
#[derive(Debug)]
pub struct OnOffToggle {
    pub app: usize,
    pub epoch: u64,
    pub on: bool,
}

impl Event for OnOffToggle {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let OnOffToggle { app, epoch, on } = *self;
        net_of(world).on_toggle(app, epoch, on, sim);
    }
}

/// 事件：写一个数据块
#[derive(Debug)]
pub struct OnOffSend {
    pub app: usize,
    pub epoch: u64,
}

impl Event for OnOffSend {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let OnOffSend { app, epoch } = *self;
        net_of(world).on_send(app, epoch, sim);
    }
}
