//! 运行时错误.
//!
//! 指标分母为零等退化情况不属于错误, 它们按约定处理, 不会出现在这里.

use crate::{Idx3d, Spacing};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 加载体积文件时的错误.
#[derive(Debug, Error)]
pub enum LoadError {
    /// 底层 I/O 错误. 第一个参数是出错的文件路径.
    #[error("I/O error on {0:?}: {1}")]
    Io(PathBuf, #[source] io::Error),

    /// nifti 文件解析错误.
    #[error("failed to read nifti volume: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// npy 文件解析错误.
    #[error("failed to read npy volume: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),

    /// 不支持的文件扩展名.
    #[error("unsupported volume file: {0:?}")]
    UnsupportedFormat(PathBuf),

    /// 数据无法解释为 3D 体积. 参数为原始数据形状.
    #[error("expected a 3D volume, got shape {0:?}")]
    UnsupportedDimensionality(Vec<usize>),
}

/// 单个病例评估错误. 对该病例是致命的.
#[derive(Debug, Error)]
pub enum EvalError {
    /// 预测与真值形状不一致. 依次为预测形状和真值形状.
    #[error("shape mismatch: prediction {0:?} vs truth {1:?}")]
    ShapeMismatch(Idx3d, Idx3d),

    /// 预测与真值的体素分辨率不一致. 依次为预测分辨率和真值分辨率.
    #[error("voxel spacing mismatch: prediction {0:?} vs truth {1:?}")]
    SpacingMismatch(Spacing, Spacing),

    /// 加载错误.
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// 批量评估在 fail-fast 模式下的错误.
#[derive(Debug, Error)]
pub enum BatchError {
    /// 某个病例失败. 第一个参数为病例标识.
    #[error("case `{0}` failed: {1}")]
    CaseFailed(String, #[source] EvalError),
}

/// 病灶 IoU 阈值不在 `[0, 1]` 范围内.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("IoU threshold must lie in [0, 1], got {0}")]
pub struct ThresholdError(pub f64);

/// 病例发现与配对错误.
#[derive(Debug, Error)]
pub enum PairingError {
    /// 路径不是目录.
    #[error("{0:?} is not a valid path to a directory")]
    NotADirectory(PathBuf),

    /// 底层 I/O 错误.
    #[error("I/O error on {0:?}: {1}")]
    Io(PathBuf, #[source] io::Error),

    /// 同一目录下存在多个主干相同的体积文件.
    #[error("duplicate volume stem `{0}` in {1:?}")]
    DuplicateStem(String, PathBuf),

    /// 按顺序配对时, 两侧文件个数不一致或为零. 依次为预测个数和真值个数.
    #[error(
        "number of prediction and truth images must be equal and non-zero \
         (# pred = {0}; # truth = {1})"
    )]
    CountMismatch(usize, usize),

    /// 没有找到任何一对预测/真值文件.
    #[error("no prediction/truth pairs found")]
    NoPairs,

    /// 病例列表格式错误. 第二个参数为具体原因.
    #[error("malformed case list {0:?}: {1}")]
    CaseList(PathBuf, String),
}
