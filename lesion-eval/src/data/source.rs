//! 体积数据来源.

use super::LesionMask;
use crate::consts::ext;
use crate::LoadError;
use std::path::Path;

/// 支持的体积文件格式.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum VolumeFormat {
    /// `.nii` 或 `.nii.gz`.
    Nifti,

    /// `.npy`.
    Npy,
}

impl VolumeFormat {
    /// 根据文件扩展名 (不区分大小写) 判断格式. 不支持时返回 `None`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let name = path.as_ref().file_name()?.to_str()?.to_ascii_lowercase();
        ext::VOLUMES
            .iter()
            .find(|e| {
                name.strip_suffix(*e)
                    .and_then(|s| s.strip_suffix('.'))
                    .is_some_and(|stem| !stem.is_empty())
            })
            .map(|e| match *e {
                ext::NPY => Self::Npy,
                _ => Self::Nifti,
            })
    }
}

/// 病灶体积的加载方式.
///
/// 批量评估只通过该 trait 获取体积, 便于在测试中替换为内存数据.
pub trait VolumeSource {
    /// 加载 `path` 对应的体积.
    fn load(&self, path: &Path) -> Result<LesionMask, LoadError>;
}

/// 从文件系统加载体积, 格式由扩展名决定.
#[derive(Copy, Clone, Debug, Default)]
pub struct FileSource;

impl VolumeSource for FileSource {
    #[inline]
    fn load(&self, path: &Path) -> Result<LesionMask, LoadError> {
        LesionMask::open(path)
    }
}

impl<F> VolumeSource for F
where
    F: Fn(&Path) -> Result<LesionMask, LoadError>,
{
    #[inline]
    fn load(&self, path: &Path) -> Result<LesionMask, LoadError> {
        self(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(VolumeFormat::from_path("a/b/case.nii.gz"), Some(VolumeFormat::Nifti));
        assert_eq!(VolumeFormat::from_path("case.NII"), Some(VolumeFormat::Nifti));
        assert_eq!(VolumeFormat::from_path("case.npy"), Some(VolumeFormat::Npy));
        assert_eq!(VolumeFormat::from_path("case.nii.gz.bak"), None);
        assert_eq!(VolumeFormat::from_path(".npy"), None);
        assert_eq!(VolumeFormat::from_path("case.mha"), None);
    }

    #[test]
    fn test_closure_source() {
        let source = |_: &Path| Ok(LesionMask::empty((1, 2, 3), None));
        let mask = source.load(Path::new("anything")).unwrap();
        assert_eq!(mask.positive_count(), 0);
    }
}
