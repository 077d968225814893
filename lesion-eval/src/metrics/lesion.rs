//! 逐病灶报告.
//!
//! 以单个真值病灶为单位, 将其与所有和它有重叠的预测病灶的并集比较.

use super::overlap::OverlapCounts;
use super::volume::{physical_volume, VolumeUnit};
use crate::components::LabelMap;
use crate::matching::MatchOutcome;

#[cfg(feature = "serde")]
use serde::Serialize;

/// 单个真值病灶的评估结果.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct LesionReport {
    /// 真值病灶编号.
    pub id: u32,

    /// 病灶重心 (体素坐标, `z, h, w`).
    pub centroid: [f64; 3],

    /// 病灶体素个数.
    pub voxels: usize,

    /// 病灶体积.
    pub volume: f64,

    /// 是否被检出.
    pub detected: bool,

    /// 与重叠预测病灶并集的 Dice.
    pub dice: f64,

    /// 与重叠预测病灶并集的 IoU.
    pub iou: f64,

    /// 重叠预测病灶并集的阳性预测值.
    pub ppv: f64,

    /// 真值病灶被覆盖的比例.
    pub tpr: f64,

    /// 重叠预测病灶并集与该病灶的绝对体积差.
    pub avd: f64,
}

/// 为每个真值病灶生成报告, 按编号排列.
///
/// 没有任何预测病灶与之重叠时, 该病灶的 Dice, IoU, PPV, TPR, AVD 均为 0.
pub(crate) fn lesion_reports(
    pred: &LabelMap,
    truth: &LabelMap,
    outcome: &MatchOutcome,
    voxel: Option<f64>,
    unit: VolumeUnit,
) -> Vec<LesionReport> {
    truth
        .components()
        .iter()
        .map(|c| {
            let id = c.id();
            let (pred_size, intersection) = outcome
                .pairs
                .iter()
                .filter(|p| p.truth_id == id)
                .fold((0, 0), |(size, inter), p| {
                    let s = pred.component(p.pred_id).map_or(0, |pc| pc.voxel_count());
                    (size + s, inter + p.intersection)
                });
            let counts = OverlapCounts {
                pred: pred_size,
                truth: c.voxel_count(),
                intersection,
            };
            let (dice, iou, ppv, tpr, avd) = if intersection > 0 {
                (
                    counts.dice(),
                    counts.iou(),
                    counts.ppv().unwrap_or(0.0),
                    counts.tpr().unwrap_or(0.0),
                    counts.avd().unwrap_or(0.0),
                )
            } else {
                (0.0, 0.0, 0.0, 0.0, 0.0)
            };

            LesionReport {
                id,
                centroid: c.centroid(),
                voxels: c.voxel_count(),
                volume: physical_volume(c.voxel_count(), voxel, unit),
                detected: outcome.detected.binary_search(&id).is_ok(),
                dice,
                iou,
                ppv,
                tpr,
                avd,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::metrics::evaluate_case_detailed;
    use crate::{EvalConfig, LesionMask};

    #[test]
    fn test_lesion_reports() {
        // 真值: 两个病灶. 预测: 覆盖第一个病灶的一半, 并多出一个体素.
        let truth = [(0, 0, 0), (0, 0, 1), (0, 3, 3)];
        let pred = [(0, 0, 1), (0, 0, 2)];
        let t = LesionMask::from_positions((1, 4, 4), truth, Some([1.0, 2.0, 2.0]));
        let p = LesionMask::from_positions((1, 4, 4), pred, Some([1.0, 2.0, 2.0]));

        let (report, lesions) = evaluate_case_detailed("c", &p, &t, &EvalConfig::default()).unwrap();
        assert_eq!(report.truth_count, 2);
        assert_eq!(lesions.len(), 2);

        let first = &lesions[0];
        assert_eq!(first.id, 1);
        assert!(first.detected);
        assert_eq!(first.voxels, 2);
        assert_eq!(first.volume, 8.0);
        assert_eq!(first.centroid, [0.0, 0.0, 0.5]);
        assert_eq!(first.dice, 0.5);
        assert_eq!(first.ppv, 0.5);
        assert_eq!(first.tpr, 0.5);
        assert_eq!(first.avd, 0.0);

        let second = &lesions[1];
        assert!(!second.detected);
        assert_eq!(second.dice, 0.0);
        assert_eq!(second.iou, 0.0);
        assert_eq!(second.ppv, 0.0);
        assert_eq!(second.tpr, 0.0);
        assert_eq!(second.avd, 0.0);
    }
}
