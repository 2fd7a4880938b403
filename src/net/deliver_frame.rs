//! 帧到达事件
//!
//! 帧在信道上传播完毕后交给接收设备。

use super::id::DeviceId;
use super::net_world::NetWorld;
use super::packet::Frame;
use crate::sim::{Event, Simulator, World};
use tracing::trace;

/// 事件：把一帧交给某个设备处理。
#[derive(Debug)]
pub struct DeliverFrame {
    pub to: DeviceId,
    pub frame: Frame,
}

impl Event for DeliverFrame {
    #[tracing::instrument(level = "trace", skip(self, sim, world), fields(to = ?self.to, src = ?self.frame.src))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DeliverFrame { to, frame } = *self;
        trace!(now = ?sim.now(), size = frame.size_bytes(), "📨 帧到达设备");

        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");
        w.net.on_frame(to, frame, sim);
    }
}
