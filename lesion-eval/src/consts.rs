//! 通用常量.

/// 文件扩展名 (小写, 不含前导 `.`).
pub mod ext {
    /// 未压缩 nifti 文件.
    pub const NII: &str = "nii";

    /// gzip 压缩的 nifti 文件. 视为一个整体扩展名.
    pub const NII_GZ: &str = "nii.gz";

    /// numpy 数组文件.
    pub const NPY: &str = "npy";

    /// 所有可作为体积加载的扩展名. 长扩展名在前, 便于后缀匹配.
    pub const VOLUMES: [&str; 3] = [NII_GZ, NII, NPY];
}

/// 未配置阈值时的默认病灶 IoU 阈值.
///
/// 取 0 时, 任意非零重叠即视为匹配.
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.0;

/// ISBI 2015 评分的重加权系数. 使不含体积相关性的评分落在 `[0, 1]` 区间.
pub const ISBI15_REWEIGHT: f64 = 4.0 / 3.0;

/// 两个体积分辨率被视为一致时允许的最大相对误差.
pub const SPACING_REL_TOLERANCE: f64 = 1e-4;

/// 汇总统计行的标签. 依次为均值, 总体标准差, 最小值, 三个四分位数和最大值.
pub const SUMMARY_LABELS: [&str; 7] = ["Avg", "Std", "Min", "25%", "50%", "75%", "Max"];

/// 汇总行 (批量相关系数所在行) 的病例标签.
pub const AGGREGATE_LABEL: &str = "aggregate";

/// 报表中 "不适用" 指标的占位文本.
pub const NOT_APPLICABLE: &str = "n/a";
