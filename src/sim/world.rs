//! 世界 trait
//!
//! 定义仿真世界接口。

use super::simulator::Simulator;
use std::any::Any;

/// 仿真世界：由业务层实现（例如网络拓扑/统计等）。
pub trait World: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// 每执行完一个事件后回调。
    fn on_tick(&mut self, _sim: &mut Simulator) {}

    /// 事件循环终止（到达 horizon 或队列为空）后回调一次。
    fn on_finish(&mut self, _sim: &Simulator) {}
}
