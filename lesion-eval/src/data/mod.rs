use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, ArrayBase, ArrayD, ArrayView, ArrayViewD, Data, Ix3};
use ndarray_npy::{ReadNpyError, ReadNpyExt, ReadableElement};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use num::Zero;

use crate::consts::SPACING_REL_TOLERANCE;
use crate::{Idx3d, LoadError, Spacing};

mod source;

pub use source::{FileSource, VolumeFormat, VolumeSource};

/// 三维体素网格的几何属性和部分通用操作.
///
/// 所有形状和分辨率均按 `(z, h, w)` 顺序给出.
pub trait VoxelGeometry {
    /// 获取数据形状大小.
    fn shape(&self) -> Idx3d;

    /// 获取单个体素分辨率. 以毫米为单位, 分别代表空间 (相邻切片方向),
    /// 高 (自然图像的垂直方向), 宽 (自然图像的水平方向).
    ///
    /// 数据源不提供分辨率时返回 `None`.
    fn spacing(&self) -> Option<Spacing>;

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 获取体素的实际体积值, 以立方毫米 (即微升) 为单位.
    /// 没有分辨率信息时返回 `None`.
    #[inline]
    fn voxel(&self) -> Option<f64> {
        self.spacing().map(|s| s.iter().product())
    }
}

/// 判断两个分辨率是否在相对误差范围内一致.
pub(crate) fn spacing_eq(a: &Spacing, b: &Spacing) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| (x - y).abs() <= SPACING_REL_TOLERANCE * x.abs().max(y.abs()))
}

/// 病灶二值体积. `true` 代表病灶体素 (前景).
///
/// 数据以 `(z, h, w)` 行优先布局保存. 体积创建后不可修改.
#[derive(Debug, Clone, PartialEq)]
pub struct LesionMask {
    data: Array3<bool>,
    spacing: Option<Spacing>,
}

impl VoxelGeometry for LesionMask {
    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    #[inline]
    fn spacing(&self) -> Option<Spacing> {
        self.spacing
    }
}

impl Index<Idx3d> for LesionMask {
    type Output = bool;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl LesionMask {
    /// 根据二值数据和可选分辨率直接创建.
    ///
    /// 非行优先布局的数据会被复制为行优先布局.
    pub fn new(data: Array3<bool>, spacing: Option<Spacing>) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };
        debug_assert!(data.is_standard_layout());
        Self { data, spacing }
    }

    /// 从任意数值标签数组创建. 值大于零的体素视为病灶.
    ///
    /// NaN 视为背景.
    pub fn from_labels<A, S>(labels: &ArrayBase<S, Ix3>, spacing: Option<Spacing>) -> Self
    where
        A: Copy + PartialOrd + Zero,
        S: Data<Elem = A>,
    {
        let zero = A::zero();
        Self::new(labels.map(|v| *v > zero), spacing)
    }

    /// 创建形状为 `shape` 的全背景体积.
    #[inline]
    pub fn empty(shape: Idx3d, spacing: Option<Spacing>) -> Self {
        Self::new(Array3::from_elem(shape, false), spacing)
    }

    /// 创建形状为 `shape` 的体积, 并将 `it` 给出的所有位置标记为病灶.
    ///
    /// 如果存在越界索引, 则程序 panic.
    pub fn from_positions<I: IntoIterator<Item = Idx3d>>(
        shape: Idx3d,
        it: I,
        spacing: Option<Spacing>,
    ) -> Self {
        let mut data = Array3::from_elem(shape, false);
        for pos in it.into_iter() {
            data[pos] = true;
        }
        Self { data, spacing }
    }

    /// 打开体积文件. 根据扩展名选择 nifti 或 npy 格式.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        match VolumeFormat::from_path(path) {
            Some(VolumeFormat::Nifti) => Self::open_nifti(path),
            Some(VolumeFormat::Npy) => Self::open_npy(path),
            None => Err(LoadError::UnsupportedFormat(path.to_owned())),
        }
    }

    /// 打开 nii 文件格式的 3D 标签. 体素值大于零即为病灶.
    ///
    /// nifti 数据以 `[W, H, z]` 列优先组织, 加载后转换成 `(z, H, W)`.
    /// 末尾长度为 1 的维度会被去掉; 2D 图像视为只有一层切片的体积.
    pub fn open_nifti<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let spacing = spacing_from_header(obj.header());
        let raw = obj.into_volume().into_ndarray::<f32>()?;
        let shape = squeeze_nifti_shape(raw.shape())?;

        // [W, H, z, ...] -> [..., z, H, W].
        // 反转全部轴后按逻辑顺序迭代即为 (z, H, W) 行优先顺序.
        let raw = raw.reversed_axes();
        let data: Vec<bool> = raw.iter().map(|v| *v > 0.0).collect();
        let data = Array3::from_shape_vec(shape, data)
            .map_err(|_| LoadError::UnsupportedDimensionality(raw.shape().to_vec()))?;

        Ok(Self { data, spacing })
    }

    /// 打开 npy 文件格式的 3D 标签. 数组按 `(z, h, w)` 解释, 不携带分辨率信息.
    ///
    /// 支持 `bool`, 有符号和无符号整数, 以及 `f32`/`f64` 元素. 数值大于零即为病灶.
    pub fn open_npy<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| LoadError::Io(path.to_owned(), e))?;

        if let Some(arr) = read_npy_as::<bool>(&bytes)? {
            return npy_to_mask(arr.view(), |v| *v);
        }
        macro_rules! try_numeric {
            ($($t:ty),+) => {$(
                if let Some(arr) = read_npy_as::<$t>(&bytes)? {
                    return npy_to_mask(arr.view(), |v| *v > <$t>::zero());
                }
            )+};
        }
        try_numeric!(u8, i8, u16, i16, u32, i32, u64, i64, f32);

        let arr = ArrayD::<f64>::read_npy(bytes.as_slice())?;
        npy_to_mask(arr.view(), |v| *v > 0.0)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, bool, Ix3> {
        self.data.view()
    }

    /// 获取病灶体素个数.
    #[inline]
    pub fn positive_count(&self) -> usize {
        self.data.iter().filter(|p| **p).count()
    }

}

/// 从 nifti header 读取 `(z, h, w)` 分辨率. 任一分量非正或非有限时返回 `None`.
fn spacing_from_header(header: &NiftiHeader) -> Option<Spacing> {
    // [_, W, H, z, ...].
    let [_, w, h, z, ..] = header.pixdim;
    let s = [z as f64, h as f64, w as f64];
    s.iter().all(|v| v.is_finite() && *v > 0.0).then_some(s)
}

/// 将 nifti 原始形状 `[W, H, z, ...]` 转换为 `(z, H, W)`.
fn squeeze_nifti_shape(dims: &[usize]) -> Result<Idx3d, LoadError> {
    if dims.is_empty() || dims.iter().skip(3).any(|d| *d != 1) {
        return Err(LoadError::UnsupportedDimensionality(dims.to_vec()));
    }
    let d = |i: usize| dims.get(i).copied().unwrap_or(1);
    Ok((d(2), d(1), d(0)))
}

/// 将 npy 原始形状转换为 `(z, h, w)`. 前导长度为 1 的维度会被去掉, 2D 数组视为单层.
fn squeeze_npy_shape(dims: &[usize]) -> Result<Idx3d, LoadError> {
    match *dims {
        [h, w] => Ok((1, h, w)),
        [z, h, w] => Ok((z, h, w)),
        [ref lead @ .., z, h, w] if lead.iter().all(|d| *d == 1) => Ok((z, h, w)),
        _ => Err(LoadError::UnsupportedDimensionality(dims.to_vec())),
    }
}

/// 按元素类型 `A` 解析 npy 数据. 类型描述不符时返回 `Ok(None)`.
fn read_npy_as<A: ReadableElement>(bytes: &[u8]) -> Result<Option<ArrayD<A>>, ReadNpyError> {
    match ArrayD::<A>::read_npy(bytes) {
        Ok(arr) => Ok(Some(arr)),
        Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn npy_to_mask<A, F>(arr: ArrayViewD<'_, A>, positive: F) -> Result<LesionMask, LoadError>
where
    F: Fn(&A) -> bool,
{
    let shape = squeeze_npy_shape(arr.shape())?;
    let data: Vec<bool> = arr.iter().map(positive).collect();
    let data = Array3::from_shape_vec(shape, data)
        .map_err(|_| LoadError::UnsupportedDimensionality(arr.shape().to_vec()))?;
    Ok(LesionMask {
        data,
        spacing: None,
    })
}
