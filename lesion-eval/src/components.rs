//! 三维连通分量 (病灶) 提取.
//!
//! 每个连通分量视为一个病灶. 编号从 1 开始, 按照每个分量第一个被扫描到的体素
//! 在光栅扫描 (z, h, w 升序) 中的顺序分配. 背景编号为 0.

use crate::{Idx3d, LesionMask, Spacing, VoxelGeometry};
use ndarray::{Array3, ArrayView3};
use std::collections::VecDeque;
use std::ops::Index;

#[cfg(feature = "serde")]
use serde::Serialize;

/// 邻接规则.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Connectivity {
    /// 6-邻接, 仅共面体素相邻.
    Face,

    /// 26-邻接, 共面、共棱、共顶点体素都相邻.
    #[default]
    Full,
}

const fn full_offsets() -> [(isize, isize, isize); 26] {
    let mut ans = [(0, 0, 0); 26];
    let mut i = 0;
    let mut dz = -1;
    while dz <= 1 {
        let mut dh = -1;
        while dh <= 1 {
            let mut dw = -1;
            while dw <= 1 {
                if dz != 0 || dh != 0 || dw != 0 {
                    ans[i] = (dz, dh, dw);
                    i += 1;
                }
                dw += 1;
            }
            dh += 1;
        }
        dz += 1;
    }
    ans
}

const FACE_OFFSETS: [(isize, isize, isize); 6] = [
    (-1, 0, 0),
    (1, 0, 0),
    (0, -1, 0),
    (0, 1, 0),
    (0, 0, -1),
    (0, 0, 1),
];

const FULL_OFFSETS: [(isize, isize, isize); 26] = full_offsets();

impl Connectivity {
    /// 相邻体素的坐标偏移量.
    #[inline]
    pub fn offsets(self) -> &'static [(isize, isize, isize)] {
        match self {
            Self::Face => &FACE_OFFSETS,
            Self::Full => &FULL_OFFSETS,
        }
    }
}

/// 单个病灶.
#[derive(Debug, Clone, PartialEq)]
pub struct LesionComponent {
    id: u32,
    voxels: Vec<Idx3d>,
    bbox: (Idx3d, Idx3d),
}

impl LesionComponent {
    fn new(id: u32, mut voxels: Vec<Idx3d>) -> Self {
        debug_assert!(!voxels.is_empty());
        voxels.sort_unstable();
        let first = voxels[0];
        let bbox = voxels.iter().fold((first, first), |(lo, hi), &(z, h, w)| {
            (
                (lo.0.min(z), lo.1.min(h), lo.2.min(w)),
                (hi.0.max(z), hi.1.max(h), hi.2.max(w)),
            )
        });
        Self { id, voxels, bbox }
    }

    /// 病灶编号, 从 1 开始.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 病灶所有体素, 按光栅扫描顺序排列.
    #[inline]
    pub fn voxels(&self) -> &[Idx3d] {
        &self.voxels
    }

    /// 病灶体素个数. 总是大于零.
    #[inline]
    pub fn voxel_count(&self) -> usize {
        self.voxels.len()
    }

    /// 轴对齐包围盒, 依次为最小和最大下标 (均包含).
    #[inline]
    pub fn bbox(&self) -> (Idx3d, Idx3d) {
        self.bbox
    }

    /// 病灶重心 (体素坐标).
    pub fn centroid(&self) -> [f64; 3] {
        let n = self.voxels.len() as f64;
        let (z, h, w) = self.voxels.iter().fold((0.0, 0.0, 0.0), |(a, b, c), &(z, h, w)| {
            (a + z as f64, b + h as f64, c + w as f64)
        });
        [z / n, h / n, w / n]
    }
}

/// 连通分量标签图. 每个体素存储其所属病灶编号, 背景为 0.
///
/// # 注意
///
/// 1. 病灶体素与各分量之间是划分关系: 每个病灶体素恰好属于一个分量.
/// 2. 编号连续, 即 `1..=count()`.
#[derive(Debug, Clone)]
pub struct LabelMap {
    labels: Array3<u32>,
    components: Vec<LesionComponent>,
    spacing: Option<Spacing>,
}

impl VoxelGeometry for LabelMap {
    #[inline]
    fn shape(&self) -> Idx3d {
        self.labels.dim()
    }

    #[inline]
    fn spacing(&self) -> Option<Spacing> {
        self.spacing
    }
}

impl Index<Idx3d> for LabelMap {
    type Output = u32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.labels[index]
    }
}

impl LabelMap {
    /// 提取 `mask` 的所有连通分量.
    ///
    /// 使用迭代式 BFS, 时间复杂度与体素个数线性相关.
    pub fn extract(mask: &LesionMask, connectivity: Connectivity) -> Self {
        let shape = mask.shape();
        let data = mask.data();
        let offsets = connectivity.offsets();
        let mut labels = Array3::<u32>::zeros(shape);
        let mut components = Vec::new();
        let mut bfs_q = VecDeque::with_capacity(64);

        for (pos, &p) in data.indexed_iter() {
            if !p || labels[pos] != 0 {
                continue;
            }
            let id = components.len() as u32 + 1;
            let mut voxels = Vec::with_capacity(16);
            labels[pos] = id;
            bfs_q.push_back(pos);

            while let Some(cur @ (z, h, w)) = bfs_q.pop_front() {
                voxels.push(cur);
                for &(dz, dh, dw) in offsets {
                    let next = (
                        z.wrapping_add_signed(dz),
                        h.wrapping_add_signed(dh),
                        w.wrapping_add_signed(dw),
                    );
                    if mask.check(&next) && data[next] && labels[next] == 0 {
                        labels[next] = id;
                        bfs_q.push_back(next);
                    }
                }
            }
            components.push(LesionComponent::new(id, voxels));
        }

        Self {
            labels,
            components,
            spacing: mask.spacing(),
        }
    }

    /// 所有病灶, 按编号升序.
    #[inline]
    pub fn components(&self) -> &[LesionComponent] {
        &self.components
    }

    /// 病灶个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.components.len()
    }

    /// 根据编号获取病灶. 编号不存在时返回 `None`.
    #[inline]
    pub fn component(&self, id: u32) -> Option<&LesionComponent> {
        let idx = (id as usize).checked_sub(1)?;
        self.components.get(idx)
    }

    /// 病灶体素总数.
    #[inline]
    pub fn positive_count(&self) -> usize {
        self.components.iter().map(|c| c.voxel_count()).sum()
    }

    /// 标签数据的只读视图.
    #[inline]
    pub fn labels(&self) -> ArrayView3<'_, u32> {
        self.labels.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_of(shape: Idx3d, pos: &[Idx3d], conn: Connectivity) -> LabelMap {
        let mask = LesionMask::from_positions(shape, pos.iter().copied(), None);
        LabelMap::extract(&mask, conn)
    }

    #[test]
    fn test_offsets() {
        assert_eq!(Connectivity::Face.offsets().len(), 6);
        assert_eq!(Connectivity::Full.offsets().len(), 26);
        assert!(!Connectivity::Full.offsets().contains(&(0, 0, 0)));
    }

    #[test]
    fn test_empty() {
        let map = map_of((3, 3, 3), &[], Connectivity::Full);
        assert_eq!(map.count(), 0);
        assert_eq!(map.positive_count(), 0);
        assert!(map.component(1).is_none());
    }

    #[test]
    fn test_single_voxel() {
        let map = map_of((3, 3, 3), &[(1, 1, 1)], Connectivity::Full);
        assert_eq!(map.count(), 1);
        let c = map.component(1).unwrap();
        assert_eq!(c.voxel_count(), 1);
        assert_eq!(c.bbox(), ((1, 1, 1), (1, 1, 1)));
        assert_eq!(c.centroid(), [1.0, 1.0, 1.0]);
        assert_eq!(map[(1, 1, 1)], 1);
        assert!(map.component(0).is_none());
    }

    #[test]
    fn test_diagonal_connectivity() {
        let pos = [(0, 0, 0), (1, 1, 1)];
        assert_eq!(map_of((2, 2, 2), &pos, Connectivity::Full).count(), 1);
        assert_eq!(map_of((2, 2, 2), &pos, Connectivity::Face).count(), 2);
    }

    #[test]
    fn test_raster_order_ids() {
        // 第二个分量的首个体素在 z = 0 上更靠后.
        let pos = [(1, 0, 0), (0, 0, 4), (0, 0, 0), (0, 1, 0)];
        let map = map_of((2, 2, 5), &pos, Connectivity::Face);
        assert_eq!(map.count(), 2);
        assert_eq!(map.component(1).unwrap().voxels(), &[(0, 0, 0), (0, 1, 0), (1, 0, 0)]);
        assert_eq!(map.component(2).unwrap().voxels(), &[(0, 0, 4)]);
    }

    #[test]
    fn test_partition() {
        let pos: Vec<Idx3d> = (0..4)
            .flat_map(|z| (0..5).flat_map(move |h| (0..6).map(move |w| (z, h, w))))
            .filter(|(z, h, w)| (z * 7 + h * 3 + w * 5) % 4 == 0)
            .collect();

        for connectivity in [Connectivity::Face, Connectivity::Full] {
            let map = map_of((4, 5, 6), &pos, connectivity);
            assert_eq!(map.positive_count(), pos.len());

            let mut seen = std::collections::HashSet::new();
            for c in map.components() {
                for v in c.voxels() {
                    assert_eq!(map[*v], c.id());
                    assert!(seen.insert(*v), "{v:?} listed twice");
                }
            }
            assert_eq!(seen.len(), pos.len());
            let labelled = map.labels().iter().filter(|l| **l != 0).count();
            assert_eq!(labelled, pos.len());
        }
    }
}
