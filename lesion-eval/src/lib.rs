#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 评估 3D 病灶分割预测 (prediction) 与真值标签 (truth) 之间的吻合程度.
//!
//! 该 crate 只负责评估已有的分割结果, 不进行分割.
//!
//! # 注意
//!
//! 1. 分母在结构上为零的指标 (空体积的 Dice, 无真值病灶时的 LTPR 等)
//!   不会报错, 而是按照固定约定处理. 约定见 [`metrics`] 和 [`matching`].
//! 2. 预测与真值形状不一致是该病例的致命错误. 批量模式下该病例被跳过并记录.
//! 3. 同一体积内病灶编号按照光栅扫描顺序 (z, h, w 升序) 确定, 多次运行结果一致.
//!
//! # 功能
//!
//! ### 病灶二值体积与加载 ✅
//!
//! 支持 nifti (`.nii`, `.nii.gz`) 和 npy 格式, 统一转换为 `(z, h, w)` 布局.
//!
//! 实现位于 `lesion-eval/src/data`.
//!
//! ### 三维连通分量提取 ✅
//!
//! 迭代式 BFS, 默认 26-邻接. 不会因体积过大导致栈溢出.
//!
//! 实现位于 `lesion-eval/src/components.rs`.
//!
//! ### 病灶匹配 ✅
//!
//! 以分量对的 IoU 判定检出 (detected) / 漏检 (missed) 与
//! 确认 (confirmed) / 虚警 (spurious). 不是一一对应的二分图匹配.
//!
//! 实现位于 `lesion-eval/src/matching.rs`.
//!
//! ### 指标计算 ✅
//!
//! Dice, IoU, PPV, TPR, AVD, LTPR, LFDR, ISBI 2015 评分, 病灶体积.
//! 另外提供以单个真值病灶为单位的逐病灶报告.
//!
//! 实现位于 `lesion-eval/src/metrics`.
//!
//! ### 批量评估与汇总 ✅
//!
//! 每个病例是独立任务 (开启 `rayon` feature 时并行). 汇总统计是可交换、
//! 可结合的归约, 因此可以增量或并行计算.
//!
//! 实现位于 `lesion-eval/src/batch.rs`.
//!
//! ### 病例发现 ✅
//!
//! 按文件名主干配对预测与真值文件, 或读取 `pred,truth` 两列的 csv 列表.
//!
//! 实现位于 `lesion-eval/src/dataset`.

/// 三维索引 `(z, h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 单个体素在 `(z, h, w)` 三个方向上的物理分辨率, 以毫米为单位.
pub type Spacing = [f64; 3];

/// 病灶二值体积.
mod data;

pub use data::{FileSource, LesionMask, VolumeFormat, VolumeSource, VoxelGeometry};

mod error;

pub use error::{BatchError, EvalError, LoadError, PairingError, ThresholdError};

pub mod consts;

mod config;

pub use config::{EvalConfig, FailurePolicy};

pub mod components;

pub mod matching;

pub mod metrics;

pub mod batch;

pub mod dataset;
pub mod prelude;
