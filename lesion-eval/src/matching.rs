//! 病灶匹配.
//!
//! 对每一对 (预测病灶, 真值病灶) 计算 IoU. 某个真值病灶只要与任意一个预测病灶的
//! IoU 不低于阈值即视为检出 (detected), 否则为漏检 (missed). 对称地,
//! 预测病灶只要与任意一个真值病灶满足条件即为确认 (confirmed), 否则为虚警 (spurious).
//!
//! # 注意
//!
//! 这不是一一对应的二分图匹配: 一个预测病灶可以同时确认多个真值病灶, 反之亦然.

use crate::components::LabelMap;
use crate::consts::DEFAULT_IOU_THRESHOLD;
use crate::{EvalError, ThresholdError, VoxelGeometry};
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::Serialize;

/// 病灶匹配 IoU 阈值. 取值范围为 `[0, 1]`.
///
/// 阈值为 0 时, 任意非零重叠都满足条件 (没有重叠的分量对不参与判断).
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct IouThreshold(f64);

impl Default for IouThreshold {
    #[inline]
    fn default() -> Self {
        Self(DEFAULT_IOU_THRESHOLD)
    }
}

impl IouThreshold {
    /// 创建阈值. 不在 `[0, 1]` 范围内 (包括 NaN) 时返回错误.
    pub fn new(value: f64) -> Result<Self, ThresholdError> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ThresholdError(value))
        }
    }

    /// 阈值数值.
    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }

    /// 有重叠的分量对, 其 IoU 是否满足阈值?
    #[inline]
    pub fn accepts(self, iou: f64) -> bool {
        iou >= self.0
    }
}

impl TryFrom<f64> for IouThreshold {
    type Error = ThresholdError;

    #[inline]
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// 有重叠的一对病灶.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OverlapPair {
    /// 预测病灶编号.
    pub pred_id: u32,

    /// 真值病灶编号.
    pub truth_id: u32,

    /// 交集体素个数, 总是大于零.
    pub intersection: usize,

    /// 并集体素个数.
    pub union: usize,
}

impl OverlapPair {
    /// 这一对病灶的 IoU.
    #[inline]
    pub fn iou(&self) -> f64 {
        self.intersection as f64 / self.union as f64
    }
}

/// 计算所有存在重叠的病灶对. 结果按 `(pred_id, truth_id)` 升序排列.
///
/// 形状不一致时返回 [`EvalError::ShapeMismatch`].
pub fn overlap_pairs(pred: &LabelMap, truth: &LabelMap) -> Result<Vec<OverlapPair>, EvalError> {
    if pred.shape() != truth.shape() {
        return Err(EvalError::ShapeMismatch(pred.shape(), truth.shape()));
    }

    // 只需遍历病灶体素较少的一侧.
    let mut inter: BTreeMap<(u32, u32), usize> = BTreeMap::new();
    if pred.positive_count() <= truth.positive_count() {
        for c in pred.components() {
            for v in c.voxels() {
                let t = truth[*v];
                if t != 0 {
                    *inter.entry((c.id(), t)).or_insert(0) += 1;
                }
            }
        }
    } else {
        for c in truth.components() {
            for v in c.voxels() {
                let p = pred[*v];
                if p != 0 {
                    *inter.entry((p, c.id())).or_insert(0) += 1;
                }
            }
        }
    }

    let size = |map: &LabelMap, id: u32| map.component(id).map_or(0, |c| c.voxel_count());
    Ok(inter
        .into_iter()
        .map(|((pred_id, truth_id), intersection)| OverlapPair {
            pred_id,
            truth_id,
            intersection,
            union: size(pred, pred_id) + size(truth, truth_id) - intersection,
        })
        .collect())
}

/// 一个病例的病灶匹配结果.
///
/// 所有编号列表均升序.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct MatchOutcome {
    /// 使用的阈值.
    pub threshold: IouThreshold,

    /// 所有存在重叠的病灶对.
    pub pairs: Vec<OverlapPair>,

    /// 被检出的真值病灶.
    pub detected: Vec<u32>,

    /// 漏检的真值病灶.
    pub missed: Vec<u32>,

    /// 被确认的预测病灶.
    pub confirmed: Vec<u32>,

    /// 虚警预测病灶.
    pub spurious: Vec<u32>,
}

impl MatchOutcome {
    /// 真值病灶个数.
    #[inline]
    pub fn truth_count(&self) -> usize {
        self.detected.len() + self.missed.len()
    }

    /// 预测病灶个数.
    #[inline]
    pub fn pred_count(&self) -> usize {
        self.confirmed.len() + self.spurious.len()
    }

    /// 病灶真阳性率 (lesion-wise TPR), 即检出真值病灶占比.
    ///
    /// 没有真值病灶时该指标不适用, 返回 `None`.
    pub fn ltpr(&self) -> Option<f64> {
        match self.truth_count() {
            0 => None,
            n => Some(self.detected.len() as f64 / n as f64),
        }
    }

    /// 病灶假发现率 (lesion-wise FDR), 即虚警预测病灶占比.
    ///
    /// 没有预测病灶时为 0.
    pub fn lfdr(&self) -> f64 {
        match self.pred_count() {
            0 => 0.0,
            n => self.spurious.len() as f64 / n as f64,
        }
    }
}

/// 匹配两张标签图中的病灶.
pub fn match_lesions(
    pred: &LabelMap,
    truth: &LabelMap,
    threshold: IouThreshold,
) -> Result<MatchOutcome, EvalError> {
    let pairs = overlap_pairs(pred, truth)?;

    let mut pred_hit = vec![false; pred.count()];
    let mut truth_hit = vec![false; truth.count()];
    for pair in pairs.iter().filter(|p| threshold.accepts(p.iou())) {
        pred_hit[pair.pred_id as usize - 1] = true;
        truth_hit[pair.truth_id as usize - 1] = true;
    }

    let (confirmed, spurious) = split_ids(&pred_hit);
    let (detected, missed) = split_ids(&truth_hit);

    log::trace!(
        "matched lesions: {} / {} truth detected, {} / {} prediction confirmed",
        detected.len(),
        truth.count(),
        confirmed.len(),
        pred.count()
    );

    Ok(MatchOutcome {
        threshold,
        pairs,
        detected,
        missed,
        confirmed,
        spurious,
    })
}

fn split_ids(hit: &[bool]) -> (Vec<u32>, Vec<u32>) {
    (1..=hit.len() as u32).partition(|id| hit[*id as usize - 1])
}
