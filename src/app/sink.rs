//! 接收端应用

use std::net::SocketAddrV4;

use tracing::info;

use crate::net::{NodeId, Network};
use crate::plan::{ActiveWindow, SinkEndpoint};
use crate::sim::{SimTime, Simulator};

#[derive(Debug, Clone)]
pub struct PacketSink {
    pub node: NodeId,
    pub local: SocketAddrV4,
    pub window: ActiveWindow,
    listening: bool,
    total_rx: u64,
    first_rx: Option<SimTime>,
    last_rx: Option<SimTime>,
}

impl PacketSink {
    pub fn new(ep: &SinkEndpoint) -> Self {
        Self {
            node: ep.node,
            local: ep.local,
            window: ep.window,
            listening: false,
            total_rx: 0,
            first_rx: None,
            last_rx: None,
        }
    }

    /// 累计收到的字节数
    pub fn total_rx(&self) -> u64 {
        self.total_rx
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn first_rx(&self) -> Option<SimTime> {
        self.first_rx
    }

    pub fn last_rx(&self) -> Option<SimTime> {
        self.last_rx
    }
}

impl Network {
    pub(crate) fn start_sink(&mut self, idx: usize) {
        let Some(sink) = self.apps.sinks.get_mut(idx) else {
            return;
        };
        sink.listening = true;
        self.tcp.listen(sink.local);
        info!(target: "hybridnet_rs::app", local = %sink.local, "PacketSink 开始监听");
    }

    pub(crate) fn stop_sink(&mut self, idx: usize) {
        let Some(sink) = self.apps.sinks.get_mut(idx) else {
            return;
        };
        sink.listening = false;
        self.tcp.unlisten(sink.local);
        info!(target: "hybridnet_rs::app", local = %sink.local, total_rx = sink.total_rx, "PacketSink 停止");
    }

    pub(crate) fn on_sink_rx(&mut self, local: SocketAddrV4, bytes: u64, sim: &Simulator) {
        let now = sim.now();
        for sink in self.apps.sinks.iter_mut().filter(|s| s.local == local && s.listening) {
            sink.total_rx += bytes;
            sink.first_rx.get_or_insert(now);
            sink.last_rx = Some(now);
            info!(
                target: "hybridnet_rs::app",
                t = %now,
                bytes,
                total_rx = sink.total_rx,
                "PacketSink 收到数据"
            );
        }
    }
}
