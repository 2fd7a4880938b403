//! 统计信息
//!
//! 定义网络仿真统计数据结构与丢包原因。

use serde::Serialize;

/// 丢包原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// 设备发送队列已满（DropTail）
    QueueFull,
    /// 路由表里找不到目的地址
    NoRoute,
    /// 下一跳地址无法解析到设备
    Unresolved,
    /// 无线站点未关联（或 AP 侧目标未关联）
    NotAssociated,
    /// 无线单播超过重传上限
    RetryLimit,
    /// TTL 耗尽
    TtlExpired,
}

/// 网络统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub delivered_pkts: u64,
    pub delivered_bytes: u64,
    pub dropped_pkts: u64,
    pub dropped_bytes: u64,
    /// 网桥转发的帧数
    pub relayed_frames: u64,
    /// 无线单播失败（重传耗尽）次数，含管理帧
    pub wifi_tx_failures: u64,
}
