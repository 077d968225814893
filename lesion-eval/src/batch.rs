//! 批量评估与汇总.
//!
//! 每个病例是独立的纯计算任务. 汇总统计 [`BatchSummary`] 是可交换、可结合的归约,
//! 任意分组、任意顺序合并的结果都相同.

use crate::dataset::CasePaths;
use crate::metrics::{evaluate_case, CaseReport};
use crate::{BatchError, EvalConfig, EvalError, FailurePolicy, VolumeSource};
use ordered_float::OrderedFloat;
use std::ops::Add;

#[cfg(feature = "serde")]
use serde::Serialize;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;
    }
}

/// 成对样本 `(x, y)` 的均值与中心二阶矩累加器.
///
/// 合并使用成对更新公式 (Chan et al.), 不保存原始矩, 数值较大且彼此接近时不会丢失精度.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PairedMoments {
    n: usize,
    mean_x: f64,
    mean_y: f64,
    m2_x: f64,
    m2_y: f64,
    c_xy: f64,
}

impl PairedMoments {
    /// 由单个样本创建.
    #[inline]
    pub fn from_pair(x: f64, y: f64) -> Self {
        Self {
            n: 1,
            mean_x: x,
            mean_y: y,
            ..Self::default()
        }
    }

    /// 合并两个累加器.
    pub fn merge(self, rhs: Self) -> Self {
        if self.n == 0 {
            return rhs;
        }
        if rhs.n == 0 {
            return self;
        }
        let (na, nb) = (self.n as f64, rhs.n as f64);
        let n = na + nb;
        let dx = rhs.mean_x - self.mean_x;
        let dy = rhs.mean_y - self.mean_y;
        let w = na * nb / n;
        Self {
            n: self.n + rhs.n,
            mean_x: self.mean_x + dx * nb / n,
            mean_y: self.mean_y + dy * nb / n,
            m2_x: self.m2_x + rhs.m2_x + dx * dx * w,
            m2_y: self.m2_y + rhs.m2_y + dy * dy * w,
            c_xy: self.c_xy + rhs.c_xy + dx * dy * w,
        }
    }

    /// 样本个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.n
    }

    /// 是否没有样本?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Pearson 相关系数.
    ///
    /// 样本少于 2 个, 或任一序列方差为零时返回 `None`.
    pub fn pearson(&self) -> Option<f64> {
        if self.n < 2 || self.m2_x == 0.0 || self.m2_y == 0.0 {
            return None;
        }
        Some((self.c_xy / (self.m2_x * self.m2_y).sqrt()).clamp(-1.0, 1.0))
    }
}

impl Add for PairedMoments {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        self.merge(rhs)
    }
}

/// 一批病例的汇总统计.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BatchSummary {
    /// (预测总体积, 真值总体积).
    pub volumes: PairedMoments,

    /// (预测病灶个数, 真值病灶个数).
    pub counts: PairedMoments,
}

impl BatchSummary {
    /// 由单个病例报告创建.
    pub fn from_report(report: &CaseReport) -> Self {
        Self {
            volumes: PairedMoments::from_pair(report.pred_volume, report.truth_volume),
            counts: PairedMoments::from_pair(report.pred_count as f64, report.truth_count as f64),
        }
    }

    /// 合并两个汇总.
    #[inline]
    pub fn merge(self, rhs: Self) -> Self {
        Self {
            volumes: self.volumes + rhs.volumes,
            counts: self.counts + rhs.counts,
        }
    }

    /// 参与汇总的病例个数.
    #[inline]
    pub fn cases(&self) -> usize {
        self.volumes.len()
    }

    /// 预测与真值总体积的 Pearson 相关系数.
    #[inline]
    pub fn volume_correlation(&self) -> Option<f64> {
        self.volumes.pearson()
    }

    /// 预测与真值病灶个数的 Pearson 相关系数.
    #[inline]
    pub fn count_correlation(&self) -> Option<f64> {
        self.counts.pearson()
    }
}

impl<'a> FromIterator<&'a CaseReport> for BatchSummary {
    fn from_iter<T: IntoIterator<Item = &'a CaseReport>>(iter: T) -> Self {
        iter.into_iter()
            .map(Self::from_report)
            .fold(Self::default(), Self::merge)
    }
}

/// 一列指标的描述统计.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SummaryStatistics {
    /// 均值.
    pub avg: f64,
    /// 总体标准差.
    pub std: f64,
    /// 最小值.
    pub min: f64,
    /// 25% 分位数.
    pub q25: f64,
    /// 中位数.
    pub median: f64,
    /// 75% 分位数.
    pub q75: f64,
    /// 最大值.
    pub max: f64,
}

impl SummaryStatistics {
    /// 计算所有有限值的描述统计. 分位数使用线性插值.
    ///
    /// 没有有限值时返回 `None`.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        let mut v: Vec<OrderedFloat<f64>> = values
            .into_iter()
            .filter(|x| x.is_finite())
            .map(OrderedFloat)
            .collect();
        if v.is_empty() {
            return None;
        }
        v.sort_unstable();
        let v: Vec<f64> = v.into_iter().map(|x| x.0).collect();

        let n = v.len() as f64;
        let avg = v.iter().sum::<f64>() / n;
        let std = (v.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / n).sqrt();
        let quantile = |q: f64| {
            let pos = q * (v.len() - 1) as f64;
            let (lo, hi) = (pos.floor() as usize, pos.ceil() as usize);
            v[lo] + (v[hi] - v[lo]) * (pos - lo as f64)
        };

        Some(Self {
            avg,
            std,
            min: v[0],
            q25: quantile(0.25),
            median: quantile(0.5),
            q75: quantile(0.75),
            max: v[v.len() - 1],
        })
    }

    /// 依次为 Avg, Std, Min, 25%, 50%, 75%, Max. 与 [`crate::consts::SUMMARY_LABELS`] 对应.
    #[inline]
    pub fn values(&self) -> [f64; 7] {
        [
            self.avg,
            self.std,
            self.min,
            self.q25,
            self.median,
            self.q75,
            self.max,
        ]
    }
}

/// 被跳过的病例.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseFailure {
    /// 病例标识.
    pub case_id: String,

    /// 失败原因.
    pub reason: String,
}

/// 批量评估结果.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Clone, Debug, Default)]
pub struct BatchOutcome {
    /// 成功病例的报告, 与输入顺序一致.
    pub reports: Vec<CaseReport>,

    /// 被跳过的病例, 与输入顺序一致.
    pub failures: Vec<CaseFailure>,

    /// 成功病例的汇总.
    pub summary: BatchSummary,
}

impl BatchOutcome {
    /// 由已完成的报告和失败记录构造, 并计算汇总.
    pub fn new(reports: Vec<CaseReport>, failures: Vec<CaseFailure>) -> Self {
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                let summary = reports
                    .par_iter()
                    .map(BatchSummary::from_report)
                    .reduce(BatchSummary::default, BatchSummary::merge);
            } else {
                let summary = reports.iter().collect::<BatchSummary>();
            }
        }
        Self {
            reports,
            failures,
            summary,
        }
    }

    /// 对某一列指标计算描述统计, 跳过不适用的值.
    pub fn statistics<F>(&self, column: F) -> Option<SummaryStatistics>
    where
        F: Fn(&CaseReport) -> Option<f64>,
    {
        SummaryStatistics::from_values(self.reports.iter().filter_map(column))
    }
}

fn evaluate_one<S: VolumeSource>(
    case: &CasePaths,
    source: &S,
    config: &EvalConfig,
) -> Result<CaseReport, EvalError> {
    let pred = source.load(&case.pred)?;
    let truth = source.load(&case.truth)?;
    evaluate_case(&case.id, &pred, &truth, config)
}

/// 批量评估.
///
/// 开启 `rayon` feature 时每个病例在线程池中并行评估. 报告顺序与 `cases` 一致.
///
/// # 注意
///
/// 1. [`FailurePolicy::Skip`] 下失败病例被记录到 [`BatchOutcome::failures`], 不会返回错误.
/// 2. [`FailurePolicy::FailFast`] 下遇到失败病例立即返回错误. 并行时返回的不一定是
///   输入顺序中第一个失败的病例.
pub fn evaluate_batch<S>(
    cases: &[CasePaths],
    source: &S,
    config: &EvalConfig,
) -> Result<BatchOutcome, BatchError>
where
    S: VolumeSource + Sync,
{
    let run = |case: &CasePaths| {
        evaluate_one(case, source, config).map_err(|e| BatchError::CaseFailed(case.id.clone(), e))
    };

    let outcome = match config.failure_policy {
        FailurePolicy::FailFast => {
            cfg_if::cfg_if! {
                if #[cfg(feature = "rayon")] {
                    let reports = cases.par_iter().map(run).collect::<Result<Vec<_>, _>>()?;
                } else {
                    let reports = cases.iter().map(run).collect::<Result<Vec<_>, _>>()?;
                }
            }
            BatchOutcome::new(reports, Vec::new())
        }
        FailurePolicy::Skip => {
            cfg_if::cfg_if! {
                if #[cfg(feature = "rayon")] {
                    let results: Vec<_> = cases.par_iter().map(run).collect();
                } else {
                    let results: Vec<_> = cases.iter().map(run).collect();
                }
            }
            let mut reports = Vec::with_capacity(results.len());
            let mut failures = Vec::new();
            for r in results {
                match r {
                    Ok(report) => reports.push(report),
                    Err(BatchError::CaseFailed(case_id, e)) => {
                        log::warn!("skipping case `{case_id}`: {e}");
                        failures.push(CaseFailure {
                            case_id,
                            reason: e.to_string(),
                        });
                    }
                }
            }
            BatchOutcome::new(reports, failures)
        }
    };

    log::info!(
        "evaluated {} case(s), {} failed",
        outcome.reports.len(),
        outcome.failures.len()
    );
    Ok(outcome)
}
