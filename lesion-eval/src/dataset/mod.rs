//! 病例发现与加载.
//!
//! 将预测目录与真值目录中的体积文件配对成病例.

use std::path::{Path, PathBuf};

mod pairing;

pub use pairing::{discover_volumes, pair_by_order, pair_by_stem, read_case_list};

/// 一个病例的预测与真值文件路径.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CasePaths {
    /// 病例标识, 通常是文件名主干.
    pub id: String,

    /// 预测体积路径.
    pub pred: PathBuf,

    /// 真值体积路径.
    pub truth: PathBuf,
}

impl CasePaths {
    /// 以预测文件名主干作为标识创建病例.
    pub fn from_paths<P: Into<PathBuf>, T: Into<PathBuf>>(pred: P, truth: T) -> Self {
        let pred = pred.into();
        let (_, id, _) = split_filename(&pred);
        Self {
            id,
            pred,
            truth: truth.into(),
        }
    }
}

/// 将路径拆分为 `(目录, 主干, 扩展名)`. 扩展名不含前导 `.`.
///
/// `.nii.gz` 视为一个整体扩展名. 扩展名保持原始大小写.
pub fn split_filename<P: AsRef<Path>>(path: P) -> (PathBuf, String, String) {
    let path = path.as_ref();
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let lower = name.to_ascii_lowercase();
    let suffix = format!(".{}", crate::consts::ext::NII_GZ);
    let split_at = if lower.ends_with(&suffix) && lower.len() > suffix.len() {
        Some(name.len() - suffix.len())
    } else {
        name.rfind('.').filter(|i| *i > 0)
    };

    match split_at {
        Some(i) => (dir, name[..i].to_owned(), name[i + 1..].to_owned()),
        None => (dir, name, String::new()),
    }
}
