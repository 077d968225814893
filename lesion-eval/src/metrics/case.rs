//! 单个病例评估.

use super::lesion::{lesion_reports, LesionReport};
use super::overlap::OverlapCounts;
use super::volume::{physical_volume, VolumeUnit};
use crate::components::LabelMap;
use crate::consts::ISBI15_REWEIGHT;
use crate::data::spacing_eq;
use crate::matching::{match_lesions, MatchOutcome};
use crate::{EvalConfig, EvalError, LesionMask, Spacing, VoxelGeometry};

#[cfg(feature = "serde")]
use serde::Serialize;

/// 单个病例的全部评估结果. 创建后不再修改.
///
/// 所有 `Option` 字段中 `None` 代表该指标不适用 (分母为零).
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct CaseReport {
    /// 病例标识.
    pub case_id: String,

    /// 体素计数.
    pub counts: OverlapCounts,

    /// 整体 Dice.
    pub dice: f64,

    /// 整体 IoU.
    pub iou: f64,

    /// 整体阳性预测值.
    pub ppv: Option<f64>,

    /// 整体体素真阳性率.
    pub tpr: Option<f64>,

    /// 绝对体积差.
    pub avd: Option<f64>,

    /// 病灶真阳性率.
    pub ltpr: Option<f64>,

    /// 病灶假发现率.
    pub lfdr: f64,

    /// ISBI 2015 评分.
    pub isbi15: Option<f64>,

    /// 预测病灶个数.
    pub pred_count: usize,

    /// 真值病灶个数.
    pub truth_count: usize,

    /// 预测病灶总体积.
    pub pred_volume: f64,

    /// 真值病灶总体积.
    pub truth_volume: f64,

    /// 每个预测病灶的体积, 按病灶编号排列.
    pub pred_lesion_volumes: Vec<f64>,

    /// 每个真值病灶的体积, 按病灶编号排列.
    pub truth_lesion_volumes: Vec<f64>,

    /// 评估使用的体素分辨率. 为 `None` 时体积为体素个数.
    pub spacing: Option<Spacing>,

    /// 体积单位.
    pub unit: VolumeUnit,

    /// 病灶匹配结果.
    pub outcome: MatchOutcome,
}

impl CaseReport {
    /// 体积是否以物理单位给出 (否则为体素个数)?
    #[inline]
    pub fn has_physical_volume(&self) -> bool {
        self.spacing.is_some()
    }
}

/// ISBI 2015 病灶分割挑战评分 (不含体积相关性项).
///
/// `Dice/8 + PPV/8 + (1 - LFDR)/4 + LTPR/4`, `reweighted` 时乘以 `4/3`.
/// 任一输入不适用时返回 `None`.
pub fn isbi15_score(
    dice: f64,
    ppv: Option<f64>,
    lfdr: f64,
    ltpr: Option<f64>,
    reweighted: bool,
) -> Option<f64> {
    let score = dice / 8.0 + ppv? / 8.0 + (1.0 - lfdr) / 4.0 + ltpr? / 4.0;
    Some(if reweighted {
        score * ISBI15_REWEIGHT
    } else {
        score
    })
}

/// 检查两个体积可以比较, 并确定评估使用的分辨率.
///
/// 一侧缺少分辨率时使用另一侧的分辨率.
fn resolve_geometry(pred: &LesionMask, truth: &LesionMask) -> Result<Option<Spacing>, EvalError> {
    if pred.shape() != truth.shape() {
        return Err(EvalError::ShapeMismatch(pred.shape(), truth.shape()));
    }
    match (pred.spacing(), truth.spacing()) {
        (Some(p), Some(t)) if !spacing_eq(&p, &t) => Err(EvalError::SpacingMismatch(p, t)),
        (p, t) => Ok(t.or(p)),
    }
}

/// 评估单个病例.
///
/// # 注意
///
/// 形状不一致, 或双方都带有分辨率但不一致时返回错误.
pub fn evaluate_case(
    case_id: &str,
    pred: &LesionMask,
    truth: &LesionMask,
    config: &EvalConfig,
) -> Result<CaseReport, EvalError> {
    let (report, _, _) = evaluate_inner(case_id, pred, truth, config)?;
    Ok(report)
}

/// 评估单个病例, 并额外给出以真值病灶为单位的逐病灶报告.
pub fn evaluate_case_detailed(
    case_id: &str,
    pred: &LesionMask,
    truth: &LesionMask,
    config: &EvalConfig,
) -> Result<(CaseReport, Vec<LesionReport>), EvalError> {
    let (report, pred_map, truth_map) = evaluate_inner(case_id, pred, truth, config)?;
    let voxel = report.spacing.map(|s| s.iter().product());
    let lesions = lesion_reports(&pred_map, &truth_map, &report.outcome, voxel, config.unit);
    Ok((report, lesions))
}

fn evaluate_inner(
    case_id: &str,
    pred: &LesionMask,
    truth: &LesionMask,
    config: &EvalConfig,
) -> Result<(CaseReport, LabelMap, LabelMap), EvalError> {
    let spacing = resolve_geometry(pred, truth)?;
    let voxel: Option<f64> = spacing.map(|s| s.iter().product());
    let unit = config.unit;

    let counts = OverlapCounts::between(pred, truth)?;
    let pred_map = LabelMap::extract(pred, config.connectivity);
    let truth_map = LabelMap::extract(truth, config.connectivity);
    let outcome = match_lesions(&pred_map, &truth_map, config.iou_threshold)?;

    let lesion_volumes = |map: &LabelMap| -> Vec<f64> {
        map.components()
            .iter()
            .map(|c| physical_volume(c.voxel_count(), voxel, unit))
            .collect()
    };

    let dice = counts.dice();
    let ppv = counts.ppv();
    let ltpr = outcome.ltpr();
    let lfdr = outcome.lfdr();

    let report = CaseReport {
        case_id: case_id.to_owned(),
        counts,
        dice,
        iou: counts.iou(),
        ppv,
        tpr: counts.tpr(),
        avd: counts.avd(),
        ltpr,
        lfdr,
        isbi15: isbi15_score(dice, ppv, lfdr, ltpr, config.reweight_isbi),
        pred_count: pred_map.count(),
        truth_count: truth_map.count(),
        pred_volume: physical_volume(counts.pred, voxel, unit),
        truth_volume: physical_volume(counts.truth, voxel, unit),
        pred_lesion_volumes: lesion_volumes(&pred_map),
        truth_lesion_volumes: lesion_volumes(&truth_map),
        spacing,
        unit,
        outcome,
    };

    log::debug!(
        "case `{}`: dice = {:.4}, lesions (pred, truth) = ({}, {})",
        report.case_id,
        report.dice,
        report.pred_count,
        report.truth_count
    );

    Ok((report, pred_map, truth_map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Connectivity;
    use crate::matching::IouThreshold;
    use crate::Idx3d;

    const SHAPE: Idx3d = (6, 6, 6);

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn eval(pred: &[Idx3d], truth: &[Idx3d]) -> CaseReport {
        let p = LesionMask::from_positions(SHAPE, pred.iter().copied(), None);
        let t = LesionMask::from_positions(SHAPE, truth.iter().copied(), None);
        evaluate_case("case", &p, &t, &EvalConfig::default()).unwrap()
    }

    #[test]
    fn test_partial_detection() {
        let r = eval(&[(0, 0, 0)], &[(0, 0, 0), (5, 5, 5)]);
        assert_eq!(r.truth_count, 2);
        assert_eq!(r.pred_count, 1);
        assert_eq!(r.ltpr, Some(0.5));
        assert_eq!(r.lfdr, 0.0);
        assert!(f64_eq(r.dice, 2.0 / 3.0));
        assert!(f64_eq(r.iou, 0.5));
        assert_eq!(r.ppv, Some(1.0));
        assert_eq!(r.tpr, Some(0.5));
        assert_eq!(r.pred_volume, 1.0);
        assert_eq!(r.truth_lesion_volumes, vec![1.0, 1.0]);
    }

    #[test]
    fn test_single_spurious() {
        let r = eval(&[(3, 3, 3)], &[(0, 0, 0)]);
        assert_eq!(r.outcome.spurious, vec![1]);
        assert_eq!(r.lfdr, 1.0);
        assert_eq!(r.ltpr, Some(0.0));
    }

    #[test]
    fn test_both_empty() {
        let r = eval(&[], &[]);
        assert_eq!(r.dice, 1.0);
        assert_eq!(r.iou, 1.0);
        assert_eq!(r.ltpr, None);
        assert_eq!(r.lfdr, 0.0);
        assert_eq!(r.isbi15, None);
        assert_eq!(r.ppv, None);
    }

    #[test]
    fn test_isbi15() {
        assert_eq!(isbi15_score(1.0, Some(1.0), 0.0, Some(1.0), false), Some(0.75));
        assert!(f64_eq(
            isbi15_score(1.0, Some(1.0), 0.0, Some(1.0), true).unwrap(),
            1.0
        ));
        assert_eq!(isbi15_score(1.0, None, 0.0, Some(1.0), true), None);
        assert_eq!(isbi15_score(1.0, Some(1.0), 0.0, None, true), None);
    }

    #[test]
    fn test_spacing_and_units() {
        let p = LesionMask::from_positions(SHAPE, [(0, 0, 0), (0, 0, 1)], Some([2.0, 1.0, 0.5]));
        let t = LesionMask::from_positions(SHAPE, [(0, 0, 0)], None);
        let config = EvalConfig::default().with_unit(VolumeUnit::Millilitre);
        let r = evaluate_case("c", &p, &t, &config).unwrap();
        assert_eq!(r.spacing, Some([2.0, 1.0, 0.5]));
        assert!(f64_eq(r.pred_volume, 2.0e-3));
        assert!(f64_eq(r.truth_volume, 1.0e-3));
        assert!(r.has_physical_volume());
    }

    #[test]
    fn test_mismatch_errors() {
        let p = LesionMask::empty(SHAPE, Some([1.0, 1.0, 1.0]));
        let t = LesionMask::empty(SHAPE, Some([2.0, 1.0, 1.0]));
        let config = EvalConfig::default();
        assert!(matches!(
            evaluate_case("c", &p, &t, &config),
            Err(EvalError::SpacingMismatch(..))
        ));

        let t = LesionMask::empty((6, 6, 5), None);
        assert!(matches!(
            evaluate_case("c", &p, &t, &config),
            Err(EvalError::ShapeMismatch(..))
        ));
    }

    #[test]
    fn test_threshold_and_connectivity_config() {
        let pred = [(0, 0, 0), (1, 1, 1)];
        let truth = [(0, 0, 0)];
        let p = LesionMask::from_positions(SHAPE, pred, None);
        let t = LesionMask::from_positions(SHAPE, truth, None);

        let face = EvalConfig::default().with_connectivity(Connectivity::Face);
        let r = evaluate_case("c", &p, &t, &face).unwrap();
        assert_eq!(r.pred_count, 2);
        assert_eq!(r.lfdr, 0.5);

        // 26-邻接下为一个病灶, IoU = 1/2.
        let strict = EvalConfig::default().with_iou_threshold(IouThreshold::new(0.6).unwrap());
        let r = evaluate_case("c", &p, &t, &strict).unwrap();
        assert_eq!(r.pred_count, 1);
        assert_eq!(r.ltpr, Some(0.0));
    }
}
