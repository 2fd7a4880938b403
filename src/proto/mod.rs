//! 传输层/协议模块
//!
//! 包含 TCP 的简化实现（用于仿真实验）。段类型定义在 `net::packet`。

pub mod tcp;

pub use tcp::{TcpConfig, TcpConnId, TcpNotice, TcpStack, TcpState};
