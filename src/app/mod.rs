//! 应用层
//!
//! - `PacketSink`：在启动时监听本地地址，统计收到的字节；
//! - `OnOffSource`：建立一条 TCP 连接，交替进入 off / on 周期，on 期间按恒定速率写入固定大小的数据块，
//!   直到写满字节预算或到达停止时间。连接失败后不重连。
//!
//! 应用的状态机以 `impl Network` 的形式挂在网络上，由事件驱动。

mod onoff;
mod sink;

pub use onoff::{OnOffSend, OnOffSource, OnOffToggle};
pub use sink::PacketSink;

use tracing::info;

use crate::net::{NetWorld, Network};
use crate::plan::FlowPlan;
use crate::proto::tcp::TcpNotice;
use crate::sim::{Event, Simulator, World};

/// 应用标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppId {
    Sink(usize),
    Source(usize),
}

#[derive(Debug, Default)]
pub struct Applications {
    pub(crate) sinks: Vec<PacketSink>,
    pub(crate) sources: Vec<OnOffSource>,
}

impl Applications {
    pub fn sinks(&self) -> &[PacketSink] {
        &self.sinks
    }

    pub fn sources(&self) -> &[OnOffSource] {
        &self.sources
    }

    pub fn sink(&self, idx: usize) -> Option<&PacketSink> {
        self.sinks.get(idx)
    }

    pub fn source(&self, idx: usize) -> Option<&OnOffSource> {
        self.sources.get(idx)
    }
}

/// 已安装的一对应用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstalledFlow {
    pub sink: AppId,
    pub source: AppId,
}

impl Network {
    /// 按流量规划安装接收端与发送端，并调度它们的启动 / 停止
    pub fn install_flow(&mut self, flow: &FlowPlan, sim: &mut Simulator) -> InstalledFlow {
        let sink_idx = self.apps.sinks.len();
        self.apps.sinks.push(PacketSink::new(&flow.sink));
        let src_idx = self.apps.sources.len();
        self.apps.sources.push(OnOffSource::new(&flow.source));

        let sink = AppId::Sink(sink_idx);
        let source = AppId::Source(src_idx);
        sim.schedule(flow.sink.window.start, AppStart { app: sink });
        sim.schedule(flow.sink.window.stop, AppStop { app: sink });
        sim.schedule(flow.source.window.start, AppStart { app: source });
        sim.schedule(flow.source.window.stop, AppStop { app: source });
        info!(
            sink = %flow.sink.local,
            source = ?flow.source.node,
            max_bytes = flow.source.max_bytes,
            "📦 安装流量应用"
        );
        InstalledFlow { sink, source }
    }

    pub(crate) fn start_app(&mut self, app: AppId, sim: &mut Simulator) {
        match app {
            AppId::Sink(i) => self.start_sink(i),
            AppId::Source(i) => self.start_source(i, sim),
        }
    }

    pub(crate) fn stop_app(&mut self, app: AppId) {
        match app {
            AppId::Sink(i) => self.stop_sink(i),
            AppId::Source(i) => self.stop_source(i),
        }
    }

    /// 把 TCP 通知分发给对应的应用
    pub(crate) fn dispatch_tcp_notices(&mut self, notices: Vec<TcpNotice>, sim: &mut Simulator) {
        for notice in notices {
            match notice {
                TcpNotice::Established { conn, .. } => self.on_source_connected(conn, sim),
                TcpNotice::ConnectFailed { conn, .. } => self.on_source_failed(conn),
                TcpNotice::Received { local, bytes, .. } => self.on_sink_rx(local, bytes, sim),
            }
        }
    }
}

fn net_of(world: &mut dyn World) -> &mut Network {
    &mut world
        .as_any_mut()
        .downcast_mut::<NetWorld>()
        .expect("world must be NetWorld")
        .net
}

/// 事件：启动应用
#[derive(Debug)]
pub struct AppStart {
    pub app: AppId,
}

impl Event for AppStart {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        net_of(world).start_app(self.app, sim);
    }
}

/// 事件：停止应用
#[derive(Debug)]
pub struct AppStop {
    pub app: AppId,
}

impl Event for AppStop {
    fn execute(self: Box<Self>, _sim: &mut Simulator, world: &mut dyn World) {
        net_of(world).stop_app(self.app);
    }
}
