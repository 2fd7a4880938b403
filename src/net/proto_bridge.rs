//! Helpers for accessing the TCP stack from the simulation world.

use crate::proto::tcp::{TcpNotice, TcpStack};
use crate::sim::{Simulator, World};

use super::{NetApi, NetWorld, Network};

impl Network {
    /// 临时取出 TCP 栈，规避同时借用 `self` 与 `self.tcp`
    pub(crate) fn with_tcp<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut TcpStack, &mut Network) -> R,
    {
        let mut tcp = std::mem::take(&mut self.tcp);
        let result = f(&mut tcp, self);
        self.tcp = tcp;
        result
    }
}

/// 在事件里驱动 TCP 栈，并把产生的通知交给应用层。
///
/// 通知在 TCP 栈放回之后才分发，应用层可以在回调里继续写数据。
pub(crate) fn with_tcp_stack<F>(world: &mut dyn World, sim: &mut Simulator, f: F)
where
    F: FnOnce(&mut TcpStack, &mut Simulator, &mut dyn NetApi) -> Vec<TcpNotice>,
{
    let w = world
        .as_any_mut()
        .downcast_mut::<NetWorld>()
        .expect("world must be NetWorld");
    let notices = w.net.with_tcp(|tcp, net| f(tcp, sim, net));
    w.net.dispatch_tcp_notices(notices, sim);
}
