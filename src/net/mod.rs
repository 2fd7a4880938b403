//! 网络模拟模块
//!
//! 此模块包含网络模拟的运行时组件：节点、设备、信道、帧转发、无线 MAC 与路由。

// 子模块声明
mod api;
mod channel;
mod deliver_frame;
mod device;
mod device_ready;
mod id;
mod net_world;
mod network;
mod node;
mod packet;
mod proto_bridge;
mod routing;
mod stats;
pub mod wifi;

// 重新导出公共接口
pub use api::NetApi;
pub use channel::{Channel, ChannelKind, CsmaChannelConfig, tx_time};
pub use deliver_frame::DeliverFrame;
pub use device::{CSMA_QUEUE_PKTS, Device, DeviceKind, DeviceRole, WIFI_QUEUE_PKTS, WifiMacRole};
pub use device_ready::DeviceReady;
pub use id::{ChannelId, DeviceId, NodeId};
pub use net_world::NetWorld;
pub use network::Network;
pub use node::{Node, NodeRole};
pub use packet::{
    DEFAULT_TTL, Frame, FrameBody, FrameDst, IPV4_TCP_HEADER_BYTES, MgmtFrame, PROTO_TCP, Packet,
    TcpSegment,
};
pub(crate) use proto_bridge::with_tcp_stack;
pub use routing::RoutingTable;
pub use stats::{DropReason, Stats};
pub use wifi::{RateControl, StaState, WifiMac, WifiMacConfig};
