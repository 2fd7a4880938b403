//! 设备就绪事件（用于驱动队列出队）

use super::id::DeviceId;
use super::net_world::NetWorld;
use crate::sim::{Event, Simulator, World};

/// 事件：设备完成一次序列化发送后，在发送结束时刻触发，尝试发送队列中的下一帧。
#[derive(Debug)]
pub struct DeviceReady {
    pub dev: DeviceId,
}

impl Event for DeviceReady {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DeviceReady { dev } = *self;
        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");
        w.net.on_device_ready(dev, sim);
    }
}
