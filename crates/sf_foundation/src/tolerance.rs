// crates/sf_foundation/src/tolerance.rs

//! 数值容差
//!
//! 集中定义河网计算中使用的阈值。近零体积、近零宽度属于正常物理状态
//! （干河段或基岩裸露），由调用方在局部返回零结果，不报告错误。

/// 局部可侵蚀体积的近零阈值 [m³]
///
/// 活动层体积不超过该值时，输沙能力公式改用上游旁路分布。
pub const SEDIMENT_VOLUME_EPS: f64 = 1e-9;

/// 次表层是否仍有泥沙的判断阈值 [m³/m²]
pub const SUBSURFACE_VOLUME_EPS: f64 = 1e-7;

/// 泥沙体积是否视为空
#[inline]
pub fn is_empty_volume(volume: f64) -> bool {
    volume <= SEDIMENT_VOLUME_EPS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_volume_threshold() {
        assert!(is_empty_volume(0.0));
        assert!(is_empty_volume(1e-9));
        assert!(!is_empty_volume(2e-9));
    }

    #[test]
    fn test_subsurface_threshold_above_sediment_threshold() {
        assert!(SUBSURFACE_VOLUME_EPS > SEDIMENT_VOLUME_EPS);
    }
}
