//! 网络世界实现
//!
//! 定义网络仿真的世界（World）实现，持有网络。

use super::network::Network;
use crate::sim::{Simulator, World};
use std::any::Any;

/// 一个默认的网络世界实现：持有 Network。
pub struct NetWorld {
    pub net: Network,
}

impl NetWorld {
    pub fn new(net: Network) -> Self {
        Self { net }
    }
}

impl World for NetWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    /// 仿真结束时把超时未到达的在途报文记为丢失
    fn on_finish(&mut self, sim: &Simulator) {
        self.net.monitor.check_for_lost_packets(sim.now());
    }
}
