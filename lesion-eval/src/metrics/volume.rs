//! 病灶物理体积单位.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::Serialize;

/// 报告体积时使用的单位.
///
/// 体素分辨率以毫米为单位, 单个体素体积以立方毫米 (即微升) 计.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum VolumeUnit {
    /// 微升 (立方毫米).
    #[default]
    Microlitre,

    /// 毫升.
    Millilitre,

    /// 升.
    Litre,
}

impl VolumeUnit {
    /// 将微升换算为该单位的系数.
    #[inline]
    pub fn scale(self) -> f64 {
        match self {
            Self::Microlitre => 1.0,
            Self::Millilitre => 1e-3,
            Self::Litre => 1e-6,
        }
    }

    /// 单位缩写.
    #[inline]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Microlitre => "uL",
            Self::Millilitre => "mL",
            Self::Litre => "L",
        }
    }
}

impl fmt::Display for VolumeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// 无法识别的体积单位.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown volume unit `{0}` (expected one of: microliter, milliliter, liter)")]
pub struct ParseUnitError(pub String);

impl FromStr for VolumeUnit {
    type Err = ParseUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "micro" | "microliter" | "microlitre" | "ul" => Ok(Self::Microlitre),
            "milli" | "milliliter" | "millilitre" | "ml" => Ok(Self::Millilitre),
            "liter" | "litre" | "l" => Ok(Self::Litre),
            _ => Err(ParseUnitError(s.to_owned())),
        }
    }
}

/// 将体素个数换算为体积.
///
/// `voxel` 为单个体素的体积 (微升). 为 `None` 时直接返回体素个数, 此时不使用 `unit`.
#[inline]
pub fn physical_volume(voxels: usize, voxel: Option<f64>, unit: VolumeUnit) -> f64 {
    match voxel {
        Some(v) => voxels as f64 * v * unit.scale(),
        None => voxels as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("ML".parse::<VolumeUnit>(), Ok(VolumeUnit::Millilitre));
        assert_eq!("microliter".parse::<VolumeUnit>(), Ok(VolumeUnit::Microlitre));
        assert_eq!(" litre ".parse::<VolumeUnit>(), Ok(VolumeUnit::Litre));
        assert!("gallon".parse::<VolumeUnit>().is_err());
        assert_eq!(VolumeUnit::Millilitre.to_string(), "mL");
    }

    #[test]
    fn test_physical_volume() {
        assert_eq!(physical_volume(10, None, VolumeUnit::Litre), 10.0);
        assert_eq!(physical_volume(10, Some(2.0), VolumeUnit::Microlitre), 20.0);
        assert!((physical_volume(1000, Some(0.5), VolumeUnit::Millilitre) - 0.5).abs() < 1e-12);
    }
}
