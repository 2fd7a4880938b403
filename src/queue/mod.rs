//! 队列策略（Queue disciplines）
//!
//! 每个设备持有一个发送队列。目前只有 DropTail（尾丢弃），容量以字节计。

use crate::net::Frame;

mod drop_tail;

pub use drop_tail::DropTailQueue;

/// 换算包数到字节容量时使用的单包大小
pub const DEFAULT_PKT_BYTES: u64 = 1500;

pub fn mem_from_pkt(pkts: u64) -> u64 {
    pkts.saturating_mul(DEFAULT_PKT_BYTES)
}

/// 帧队列抽象
pub trait FrameQueue: std::fmt::Debug {
    /// 入队：成功返回 Ok；若被丢弃则返回 Err(frame)
    fn enqueue(&mut self, frame: Frame) -> Result<(), Frame>;
    /// 出队：按队列策略返回下一帧
    fn dequeue(&mut self) -> Option<Frame>;
    /// 再放入 `bytes` 字节是否不会溢出
    fn has_room(&self, bytes: u64) -> bool;

    fn len(&self) -> usize;
    fn bytes(&self) -> u64;
    fn capacity_bytes(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
