//! 常用类型与函数.

pub use crate::batch::{evaluate_batch, BatchOutcome, BatchSummary, CaseFailure, SummaryStatistics};
pub use crate::components::{Connectivity, LabelMap, LesionComponent};
pub use crate::dataset::{pair_by_order, pair_by_stem, read_case_list, CasePaths};
pub use crate::matching::{match_lesions, IouThreshold, MatchOutcome, OverlapPair};
pub use crate::metrics::{
    evaluate_case, evaluate_case_detailed, CaseReport, LesionReport, OverlapCounts, VolumeUnit,
};
pub use crate::{
    EvalConfig, EvalError, FailurePolicy, FileSource, Idx3d, LesionMask, LoadError, Spacing,
    VolumeSource, VoxelGeometry,
};
