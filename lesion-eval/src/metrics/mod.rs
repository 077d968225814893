//! 指标计算.
//!
//! # 注意
//!
//! 退化情况按照以下约定处理, 而不是报错:
//!
//! 1. 预测与真值均为空时, Dice 和 IoU 为 1.
//! 2. 没有真值病灶时, LTPR 不适用 (`None`).
//! 3. 没有预测病灶时, LFDR 为 0.
//! 4. PPV, TPR, AVD 在分母为零时不适用.
//! 5. 批量相关系数在病例数少于 2 或任一序列方差为零时不适用.

mod case;
mod lesion;
mod overlap;
mod volume;

pub use case::{evaluate_case, evaluate_case_detailed, isbi15_score, CaseReport};
pub use lesion::LesionReport;
pub use overlap::OverlapCounts;
pub use volume::{physical_volume, ParseUnitError, VolumeUnit};
