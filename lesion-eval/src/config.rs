//! 评估配置.

use crate::components::Connectivity;
use crate::matching::IouThreshold;
use crate::metrics::VolumeUnit;

#[cfg(feature = "serde")]
use serde::Serialize;

/// 批量评估中单个病例失败时的处理策略.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum FailurePolicy {
    /// 跳过失败病例并记录, 继续处理其余病例.
    #[default]
    Skip,

    /// 遇到失败病例立即中止整个批次.
    FailFast,
}

/// 单个病例 (及批量) 评估的全部可调参数.
///
/// 默认值: 任意非零重叠即匹配, 26-邻接, 微升, 跳过失败病例, ISBI 2015 评分重加权.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EvalConfig {
    /// 病灶匹配 IoU 阈值.
    pub iou_threshold: IouThreshold,

    /// 连通分量提取的邻接规则.
    pub connectivity: Connectivity,

    /// 报告物理体积时使用的单位.
    pub unit: VolumeUnit,

    /// 批量评估失败策略.
    pub failure_policy: FailurePolicy,

    /// ISBI 2015 评分是否重加权到 `[0, 1]`.
    pub reweight_isbi: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            iou_threshold: IouThreshold::default(),
            connectivity: Connectivity::default(),
            unit: VolumeUnit::default(),
            failure_policy: FailurePolicy::default(),
            reweight_isbi: true,
        }
    }
}

impl EvalConfig {
    /// 以默认参数构造.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 替换 IoU 阈值.
    #[inline]
    pub fn with_iou_threshold(mut self, threshold: IouThreshold) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// 替换邻接规则.
    #[inline]
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// 替换体积单位.
    #[inline]
    pub fn with_unit(mut self, unit: VolumeUnit) -> Self {
        self.unit = unit;
        self
    }

    /// 替换失败策略.
    #[inline]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// 设置 ISBI 2015 评分是否重加权.
    #[inline]
    pub fn with_reweight_isbi(mut self, reweight: bool) -> Self {
        self.reweight_isbi = reweight;
        self
    }
}
