//! 场景配置
//!
//! 每个构建步骤一个强类型配置，默认值即 4 台有线主机 / 5 个站点的参考场景。

use std::path::PathBuf;

use crate::mobility::MobilityConfig;
use crate::net::CsmaChannelConfig;
use crate::plan::{AddressingConfig, FlowConfig, SegmentMembership, TopologyCounts, WifiCellConfig};
use crate::proto::TcpConfig;
use crate::sim::SimTime;

/// 产物输出位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactConfig {
    /// None 时不写任何文件
    pub output_dir: Option<PathBuf>,
    pub prefix: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            prefix: "hybrid-lan".to_string(),
        }
    }
}

impl ArtifactConfig {
    /// 写到当前目录
    pub fn current_dir() -> Self {
        Self {
            output_dir: Some(PathBuf::from(".")),
            ..Self::default()
        }
    }

    pub(crate) fn path(&self, suffix: &str) -> Option<PathBuf> {
        self.output_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}{suffix}", self.prefix)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub counts: TopologyCounts,
    pub csma: CsmaChannelConfig,
    pub switch_b_members: SegmentMembership,
    pub wifi: WifiCellConfig,
    pub mobility: MobilityConfig,
    pub addressing: AddressingConfig,
    pub flow: FlowConfig,
    pub tcp: TcpConfig,
    pub horizon: SimTime,
    pub seed: u64,
    pub artifacts: ArtifactConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            counts: TopologyCounts::default(),
            csma: CsmaChannelConfig::default(),
            switch_b_members: SegmentMembership::default(),
            wifi: WifiCellConfig::default(),
            mobility: MobilityConfig::default(),
            addressing: AddressingConfig::default(),
            flow: FlowConfig::default(),
            tcp: TcpConfig::default(),
            horizon: SimTime::from_secs(360),
            seed: 1,
            artifacts: ArtifactConfig::default(),
        }
    }
}
