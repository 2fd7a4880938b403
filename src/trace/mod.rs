//! 观测输出：ASCII 事件跟踪与 pcap 抓包
//!
//! `Instrumentation` 是被动的：它只读取帧内容并写文件，从不调度事件或修改网络状态。
//! 写文件时遇到的第一个错误会被保留，在 `finish` 时返回。

mod ascii;
mod pcap;

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

pub use ascii::{AsciiTrace, TraceKind};
pub use pcap::{CaptureMode, PcapCapture, synthesize_ipv4};

use crate::error::{BuildStep, ScenarioError};
use crate::net::{DeviceId, Frame, NodeId};
use crate::sim::SimTime;

/// 帧经过的观测点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracePoint {
    pub node: NodeId,
    pub dev: DeviceId,
    /// 设备在节点设备列表中的下标
    pub index: usize,
    pub wired: bool,
}

/// 写出的观测文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceArtifact {
    pub path: PathBuf,
    pub records: u64,
}

#[derive(Debug, Default)]
pub struct Instrumentation {
    ascii: Option<AsciiTrace<BufWriter<File>>>,
    pcaps: Vec<PcapCapture>,
}

impl Instrumentation {
    pub fn with_ascii(mut self, trace: AsciiTrace<BufWriter<File>>) -> Self {
        self.ascii = Some(trace);
        self
    }

    pub fn with_pcap(mut self, capture: PcapCapture) -> Self {
        self.pcaps.push(capture);
        self
    }

    pub fn is_active(&self) -> bool {
        self.ascii.is_some() || !self.pcaps.is_empty()
    }

    /// 有线设备上的事件写入 ASCII 跟踪；发送（出队）与接收写入对应设备的抓包
    pub fn record(&mut self, kind: TraceKind, now: SimTime, at: TracePoint, frame: &Frame) {
        if at.wired
            && let Some(ascii) = self.ascii.as_mut()
        {
            ascii.record(kind, now, at, frame);
        }
        if matches!(kind, TraceKind::Dequeue | TraceKind::Receive) {
            for cap in self.pcaps.iter_mut().filter(|c| c.device() == at.dev) {
                cap.capture(now, frame);
            }
        }
    }

    /// 刷新并关闭所有文件
    pub fn finish(self) -> Result<Vec<TraceArtifact>, ScenarioError> {
        let mut out = Vec::new();
        if let Some(ascii) = self.ascii {
            let path = ascii.path().to_path_buf();
            let records = ascii.finish().map_err(|source| ScenarioError::Artifact {
                step: BuildStep::Instrumentation,
                path: path.clone(),
                source,
            })?;
            out.push(TraceArtifact { path, records });
        }
        for cap in self.pcaps {
            let path = cap.path().to_path_buf();
            let records = cap.finish().map_err(|source| ScenarioError::Pcap {
                step: BuildStep::Instrumentation,
                path: path.clone(),
                source,
            })?;
            out.push(TraceArtifact { path, records });
        }
        Ok(out)
    }
}
