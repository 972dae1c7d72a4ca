//! 有理数类型, 用于时间基 (time_base)、宽高比等场景.

use std::fmt;

/// 有理数, 由分子和分母组成
///
/// 默认值为 [`Rational::UNDEFINED`].
///
/// 用于表示时间基、采样宽高比 (SAR) 与显示宽高比 (DAR).
/// 例如: 时间基 1/90000 表示 90kHz 时钟, SAR 12/11 表示 PAL 4:3 像素.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rational {
    /// 分子
    pub num: i32,
    /// 分母
    pub den: i32,
}

impl Rational {
    /// 创建新的有理数
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 未定义 (分母为 0)
    pub const UNDEFINED: Self = Self { num: 0, den: 0 };

    /// 常用时间基: 90kHz (MPEG 系统时钟)
    pub const MPEG_90K: Self = Self { num: 1, den: 90_000 };

    /// 判断是否有效 (分母不为 0)
    pub const fn is_valid(&self) -> bool {
        self.den != 0
    }

    /// 转换为 f64 浮点数
    ///
    /// 如果分母为 0, 返回 `f64::NAN`.
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return f64::NAN;
        }
        f64::from(self.num) / f64::from(self.den)
    }

    /// 由 64 位无符号分子分母构造并约分
    ///
    /// 约分后仍超出 i32 范围或分母为 0 时返回 `None`.
    pub fn from_u64_reduced(num: u64, den: u64) -> Option<Self> {
        if den == 0 {
            return None;
        }
        let g = gcd(num, den).max(1);
        let num = i32::try_from(num / g).ok()?;
        let den = i32::try_from(den / g).ok()?;
        Some(Self { num, den })
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// 求最大公约数 (欧几里得算法)
fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rational_to_float() {
        let r = Rational::new(1, 4);
        assert!((r.to_f64() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rational_invalid_value() {
        let r = Rational::UNDEFINED;
        assert!(!r.is_valid());
        assert!(r.to_f64().is_nan());
    }

    #[test]
    fn test_rational_display() {
        let r = Rational::new(16, 9);
        assert_eq!(format!("{r}"), "16/9");
    }

    #[test]
    fn test_from_u64_reduced() {
        // 1920x1080, SAR 1:1 → 16:9
        assert_eq!(
            Rational::from_u64_reduced(1920, 1080),
            Some(Rational::new(16, 9))
        );
        assert_eq!(Rational::from_u64_reduced(1, 0), None);
        assert_eq!(Rational::from_u64_reduced(u64::MAX, 1), None);
    }
}
