//! 整体体积重叠指标. 直接由两个原始二值体积计算, 不依赖连通分量提取.

use crate::{EvalError, LesionMask, VoxelGeometry};

#[cfg(feature = "serde")]
use serde::Serialize;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use ndarray::Axis;
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 预测 `P` 与真值 `T` 的体素计数.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct OverlapCounts {
    /// `|P|`.
    pub pred: usize,

    /// `|T|`.
    pub truth: usize,

    /// `|P ∩ T|`.
    pub intersection: usize,
}

impl std::ops::Add for OverlapCounts {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            pred: self.pred + rhs.pred,
            truth: self.truth + rhs.truth,
            intersection: self.intersection + rhs.intersection,
        }
    }
}

impl OverlapCounts {
    /// 统计两个体积的体素计数. 开启 `rayon` feature 时按切片并行.
    ///
    /// 形状不一致时返回 [`EvalError::ShapeMismatch`].
    pub fn between(pred: &LesionMask, truth: &LesionMask) -> Result<Self, EvalError> {
        if pred.shape() != truth.shape() {
            return Err(EvalError::ShapeMismatch(pred.shape(), truth.shape()));
        }

        let count = |p: bool, t: bool| Self {
            pred: p as usize,
            truth: t as usize,
            intersection: (p && t) as usize,
        };

        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                let (p, t) = (pred.data(), truth.data());
                Ok(p.axis_iter(Axis(0))
                    .into_par_iter()
                    .zip(t.axis_iter(Axis(0)).into_par_iter())
                    .map(|(ps, ts)| {
                        ps.iter()
                            .zip(ts.iter())
                            .fold(Self::default(), |acc, (p, t)| acc + count(*p, *t))
                    })
                    .reduce(Self::default, |a, b| a + b))
            } else {
                Ok(pred
                    .data()
                    .iter()
                    .zip(truth.data().iter())
                    .fold(Self::default(), |acc, (p, t)| acc + count(*p, *t)))
            }
        }
    }

    /// `|P ∪ T|`.
    #[inline]
    pub fn union(&self) -> usize {
        self.pred + self.truth - self.intersection
    }

    /// Dice 系数 `2|P∩T| / (|P| + |T|)`. 两者皆空时为 1.
    pub fn dice(&self) -> f64 {
        match self.pred + self.truth {
            0 => 1.0,
            s => 2.0 * self.intersection as f64 / s as f64,
        }
    }

    /// IoU (Jaccard) `|P∩T| / |P∪T|`. 两者皆空时为 1.
    pub fn iou(&self) -> f64 {
        match self.union() {
            0 => 1.0,
            u => self.intersection as f64 / u as f64,
        }
    }

    /// 阳性预测值 (precision) `|P∩T| / |P|`. 预测为空时不适用.
    #[inline]
    pub fn ppv(&self) -> Option<f64> {
        ratio(self.intersection, self.pred)
    }

    /// 体素真阳性率 (sensitivity) `|P∩T| / |T|`. 真值为空时不适用.
    #[inline]
    pub fn tpr(&self) -> Option<f64> {
        ratio(self.intersection, self.truth)
    }

    /// 绝对体积差 `||P| - |T|| / |T|`. 真值为空时不适用.
    #[inline]
    pub fn avd(&self) -> Option<f64> {
        ratio(self.pred.abs_diff(self.truth), self.truth)
    }
}

#[inline]
fn ratio(num: usize, den: usize) -> Option<f64> {
    (den != 0).then(|| num as f64 / den as f64)
}
