//! 对 `lesion-eval::dataset` 的更一层封装. 从命令行参数或环境变量确定病例来源.

use lesion_eval::dataset::{self, CasePaths};
use lesion_eval::PairingError;
use std::env;
use std::path::{Path, PathBuf};

/// 预测目录环境变量.
pub const PRED_DIR_VAR: &str = "LESION_PRED_DIR";

/// 真值目录环境变量.
pub const TRUTH_DIR_VAR: &str = "LESION_TRUTH_DIR";

/// 获取目录.
///
/// 1. 若 `arg` 非空, 则返回其值;
/// 2. 否则, 若环境变量 `var` 非空, 则返回其值;
/// 3. 否则返回 `None`.
pub fn dir_from_arg_or_env(arg: Option<&Path>, var: &str) -> Option<PathBuf> {
    if let Some(d) = arg {
        return Some(d.to_owned());
    }
    env::var_os(var)
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
}

/// 获取预测目录, 环境变量为 `$LESION_PRED_DIR`.
#[inline]
pub fn pred_dir_from_arg_or_env(arg: Option<&Path>) -> Option<PathBuf> {
    dir_from_arg_or_env(arg, PRED_DIR_VAR)
}

/// 获取真值目录, 环境变量为 `$LESION_TRUTH_DIR`.
#[inline]
pub fn truth_dir_from_arg_or_env(arg: Option<&Path>) -> Option<PathBuf> {
    dir_from_arg_or_env(arg, TRUTH_DIR_VAR)
}

/// 病例来源.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaseInput {
    /// 预测目录与真值目录. `by_order` 为真时按排序后的顺序配对, 否则按文件名主干配对.
    Dirs {
        /// 预测目录.
        pred: PathBuf,
        /// 真值目录.
        truth: PathBuf,
        /// 是否按顺序配对.
        by_order: bool,
    },

    /// csv 病例列表.
    List(PathBuf),
}

impl CaseInput {
    /// 收集病例.
    pub fn cases(&self) -> Result<Vec<CasePaths>, PairingError> {
        match self {
            Self::Dirs {
                pred,
                truth,
                by_order: true,
            } => dataset::pair_by_order(pred, truth),
            Self::Dirs { pred, truth, .. } => dataset::pair_by_stem(pred, truth),
            Self::List(path) => dataset::read_case_list(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_wins() {
        let d = dir_from_arg_or_env(Some(Path::new("/x")), "LESION_EVAL_UNSET_TEST_VAR");
        assert_eq!(d, Some(PathBuf::from("/x")));
        assert_eq!(dir_from_arg_or_env(None, "LESION_EVAL_UNSET_TEST_VAR"), None);
    }
}
