// crates/sf_physics/src/grains.rs

//! 分级泥沙体积向量
//!
//! `Grains` 记录 (泥沙种类, 粒径分级) → 体积 的映射。粒径分级列表在整个
//! 模拟中共享（见 [`OverallParameters`](crate::parameters::OverallParameters)），
//! 因此 `Grains` 本身只保存体积，粒径作为参数传入查询函数。
//!
//! # 不变量
//!
//! - 体积永远非负
//! - 形状（种类列表 × 分级数）构造后不变，不同形状之间的运算属于编程错误
//! - 乘以负数属于编程错误，不是领域操作
//!
//! # 使用示例
//!
//! ```
//! use sf_physics::grains::{GrainKind, Grains};
//!
//! let mut a = Grains::from_fractions(GrainKind::Normal, vec![1.0, 2.0, 1.0]);
//! let b = Grains::from_fractions(GrainKind::Normal, vec![0.5, 5.0, 0.0]);
//! let removed = a.subtract(&b);
//! assert_eq!(removed.overall_volume(), 2.5);
//! assert_eq!(a.overall_volume(), 1.5);
//! ```

use serde::{Deserialize, Serialize};
use sf_foundation::{ensure, require, SfError, SfResult};
use std::ops::{Add, AddAssign, Mul, MulAssign};

/// 泥沙种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GrainKind {
    /// 普通砂砾
    Normal,
    /// 鱼卵（随泥沙一起输运的示踪物）
    FishEggs,
}

impl GrainKind {
    /// 名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "NormalGrains",
            Self::FishEggs => "FishEggs",
        }
    }
}

/// 分级泥沙体积向量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grains {
    kinds: Vec<GrainKind>,
    n_fractions: usize,
    /// 按种类分块存储：`volumes[k * n_fractions + i]`
    volumes: Vec<f64>,
}

impl Grains {
    // ========================================================================
    // 构造
    // ========================================================================

    /// 创建全零向量
    pub fn zeros(kinds: &[GrainKind], n_fractions: usize) -> Self {
        assert!(!kinds.is_empty(), "Grains 至少需要一个泥沙种类");
        let mut kinds = kinds.to_vec();
        kinds.sort();
        kinds.dedup();
        Self {
            volumes: vec![0.0; kinds.len() * n_fractions],
            kinds,
            n_fractions,
        }
    }

    /// 创建与 `other` 同形状的全零向量
    pub fn zeros_like(other: &Grains) -> Self {
        Self::zeros(&other.kinds, other.n_fractions)
    }

    /// 由单一种类的分级体积创建
    ///
    /// 负值或非有限值会被钳制为零；需要报错时使用 [`Grains::try_from_kind_volumes`]。
    pub fn from_fractions(kind: GrainKind, volumes: Vec<f64>) -> Self {
        let volumes = volumes
            .into_iter()
            .map(|v| if v.is_finite() && v > 0.0 { v } else { 0.0 })
            .collect::<Vec<_>>();
        Self {
            kinds: vec![kind],
            n_fractions: volumes.len(),
            volumes,
        }
    }

    /// 由多个种类的分级体积创建，负值报错
    pub fn try_from_kind_volumes(entries: &[(GrainKind, Vec<f64>)]) -> SfResult<Self> {
        ensure!(!entries.is_empty(), SfError::config("Grains 至少需要一个泥沙种类"));
        let n = entries[0].1.len();
        let kinds: Vec<GrainKind> = entries.iter().map(|(k, _)| *k).collect();
        let mut result = Self::zeros(&kinds, n);
        ensure!(
            result.kinds.len() == entries.len(),
            SfError::config("Grains 中泥沙种类重复")
        );
        for (kind, vols) in entries {
            SfError::check_size("grain fractions", n, vols.len())?;
            for (i, &v) in vols.iter().enumerate() {
                result.set(*kind, i, v)?;
            }
        }
        Ok(result)
    }

    // ========================================================================
    // 形状
    // ========================================================================

    /// 泥沙种类列表（有序）
    #[inline]
    pub fn kinds(&self) -> &[GrainKind] {
        &self.kinds
    }

    /// 粒径分级数
    #[inline]
    pub fn n_fractions(&self) -> usize {
        self.n_fractions
    }

    /// 检查外部输入（如反序列化）得到的向量：形状自洽且体积非负有限
    pub fn validate(&self) -> SfResult<()> {
        ensure!(!self.kinds.is_empty(), SfError::config("Grains 至少需要一个泥沙种类"));
        ensure!(
            self.kinds.windows(2).all(|w| w[0] < w[1]),
            SfError::config("Grains 中泥沙种类重复或未排序")
        );
        SfError::check_size(
            "grain volumes",
            self.kinds.len() * self.n_fractions,
            self.volumes.len(),
        )?;
        for &v in &self.volumes {
            ensure!(
                v.is_finite() && v >= 0.0,
                SfError::invalid_config("grain volume", v, "体积必须为非负有限值")
            );
        }
        Ok(())
    }

    /// 形状是否相同
    #[inline]
    pub fn matches(&self, other: &Grains) -> bool {
        self.n_fractions == other.n_fractions && self.kinds == other.kinds
    }

    #[inline]
    fn assert_matching(&self, other: &Grains) {
        assert!(
            self.matches(other),
            "Grains 形状不匹配: {:?}x{} vs {:?}x{}",
            self.kinds,
            self.n_fractions,
            other.kinds,
            other.n_fractions
        );
    }

    fn kind_offset(&self, kind: GrainKind) -> Option<usize> {
        self.kinds
            .iter()
            .position(|&k| k == kind)
            .map(|p| p * self.n_fractions)
    }

    // ========================================================================
    // 分量访问
    // ========================================================================

    /// 读取单个分量，不存在的种类返回 0
    pub fn get(&self, kind: GrainKind, fraction: usize) -> f64 {
        match self.kind_offset(kind) {
            Some(offset) if fraction < self.n_fractions => self.volumes[offset + fraction],
            _ => 0.0,
        }
    }

    /// 设置单个分量
    pub fn set(&mut self, kind: GrainKind, fraction: usize, volume: f64) -> SfResult<()> {
        ensure!(
            volume.is_finite() && volume >= 0.0,
            SfError::invalid_config("grain volume", volume, "体积不能为负")
        );
        SfError::check_index("grain fraction", fraction, self.n_fractions)?;
        let offset = require!(
            self.kind_offset(kind),
            SfError::not_found(format!("泥沙种类 {}", kind.name()))
        );
        self.volumes[offset + fraction] = volume;
        Ok(())
    }

    /// 某一种类的分级体积
    pub fn kind_volumes(&self, kind: GrainKind) -> &[f64] {
        match self.kind_offset(kind) {
            Some(offset) => &self.volumes[offset..offset + self.n_fractions],
            None => &[],
        }
    }

    /// 全部分量清零
    pub fn zero_fractions(&mut self) {
        self.volumes.iter_mut().for_each(|v| *v = 0.0);
    }

    /// 是否全部为零
    pub fn is_zero(&self) -> bool {
        self.volumes.iter().all(|&v| v == 0.0)
    }

    // ========================================================================
    // 体积查询
    // ========================================================================

    /// 总体积
    pub fn overall_volume(&self) -> f64 {
        self.volumes.iter().sum()
    }

    /// 各分级体积（对种类求和）
    pub fn overall_fractional_abundance(&self) -> Vec<f64> {
        let mut result = vec![0.0; self.n_fractions];
        for chunk in self.volumes.chunks(self.n_fractions.max(1)) {
            for (r, &v) in result.iter_mut().zip(chunk) {
                *r += v;
            }
        }
        result
    }

    /// 累计分级体积（未归一化）
    pub fn overall_cumulative_abundance(&self) -> Vec<f64> {
        let mut acc = 0.0;
        self.overall_fractional_abundance()
            .into_iter()
            .map(|v| {
                acc += v;
                acc
            })
            .collect()
    }

    /// 粒径在 [d1, d2] 区间内（端点包含，顺序无关）的体积
    pub fn volume_within_diameter_range(&self, diameters: &[f64], d1: f64, d2: f64) -> f64 {
        debug_assert_eq!(diameters.len(), self.n_fractions);
        let (lo, hi) = if d1 <= d2 { (d1, d2) } else { (d2, d1) };
        diameters
            .iter()
            .zip(self.overall_fractional_abundance())
            .filter(|(&d, _)| d >= lo && d <= hi)
            .map(|(_, v)| v)
            .sum()
    }

    // ========================================================================
    // 粒径统计
    // ========================================================================

    /// 百分位粒径
    ///
    /// 在累计分级曲线上做对数线性插值；总体积为零时返回 `None`。
    /// `percentile` 取值 0–100。
    pub fn percentile_diameter(&self, diameters: &[f64], percentile: f64) -> Option<f64> {
        percentile_diameter_of(diameters, &self.overall_fractional_abundance(), percentile)
    }

    /// 算术平均粒径
    pub fn arithmetic_mean_diameter(&self, diameters: &[f64]) -> Option<f64> {
        let abundance = self.overall_fractional_abundance();
        let total: f64 = abundance.iter().sum();
        if total <= 0.0 {
            return None;
        }
        Some(
            diameters
                .iter()
                .zip(&abundance)
                .map(|(d, a)| d * a / total)
                .sum(),
        )
    }

    /// 几何平均粒径
    pub fn geometric_mean_diameter(&self, diameters: &[f64]) -> Option<f64> {
        let abundance = self.overall_fractional_abundance();
        let total: f64 = abundance.iter().sum();
        if total <= 0.0 {
            return None;
        }
        Some(
            diameters
                .iter()
                .zip(&abundance)
                .map(|(d, a)| d.powf(a / total))
                .product(),
        )
    }

    // ========================================================================
    // 运算
    // ========================================================================

    /// 逐分量钳制减法，返回实际减去的量
    ///
    /// 每个分量最多减到零，因此返回值可能小于 `other`。
    pub fn subtract(&mut self, other: &Grains) -> Grains {
        self.assert_matching(other);
        let mut removed = Grains::zeros_like(self);
        for ((v, &o), r) in self
            .volumes
            .iter_mut()
            .zip(&other.volumes)
            .zip(removed.volumes.iter_mut())
        {
            let amount = o.max(0.0).min(*v);
            *v -= amount;
            *r = amount;
        }
        removed
    }

    /// 不修改自身，返回 `subtract` 会实际减去的量
    pub fn potential_subtraction(&self, other: &Grains) -> Grains {
        self.assert_matching(other);
        let mut result = Grains::zeros_like(self);
        for ((r, &v), &o) in result.volumes.iter_mut().zip(&self.volumes).zip(&other.volumes) {
            *r = o.max(0.0).min(v);
        }
        result
    }

    /// 按给定分级体积分配，种类比例取自 `base`
    ///
    /// 某分级在 `base` 中总量为零时，该分级的体积在各种类之间平均分配。
    pub fn distribute_fractional_abundance(abundance: &[f64], base: &Grains) -> SfResult<Grains> {
        SfError::check_size("fractional abundance", base.n_fractions, abundance.len())?;
        let overall = base.overall_fractional_abundance();
        let share_equal = 1.0 / base.kinds.len() as f64;
        let mut result = base.clone();
        for (k, _) in base.kinds.iter().enumerate() {
            for (i, &input) in abundance.iter().enumerate() {
                let idx = k * base.n_fractions + i;
                let value = if overall[i] == 0.0 {
                    input * share_equal
                } else {
                    input * base.volumes[idx] / overall[i]
                };
                ensure!(
                    value.is_finite() && value >= 0.0,
                    SfError::invalid_config("fractional abundance", input, "体积不能为负")
                );
                result.volumes[idx] = value;
            }
        }
        Ok(result)
    }

    /// 线性插值：`t` 在 (0, 1) 之外时分别返回端点
    pub fn interpolate_linearly(first: &Grains, second: &Grains, t: f64) -> Grains {
        if t <= 0.0 {
            return first.clone();
        }
        if t >= 1.0 {
            return second.clone();
        }
        first.assert_matching(second);
        let mut result = first.clone();
        for (r, &s) in result.volumes.iter_mut().zip(&second.volumes) {
            *r += (s - *r) * t;
        }
        result
    }
}

/// 由分级体积计算百分位粒径
///
/// 找到归一化累计体积首次不小于 `percentile / 100` 的分级；若为第一个分级
/// 直接返回其粒径，否则在相邻两级之间做对数线性插值。
pub fn percentile_diameter_of(diameters: &[f64], abundance: &[f64], percentile: f64) -> Option<f64> {
    debug_assert_eq!(diameters.len(), abundance.len());
    let total: f64 = abundance.iter().sum();
    if !(total > 0.0) || diameters.is_empty() {
        return None;
    }
    let rank = percentile * 0.01;
    let mut cumulative = Vec::with_capacity(abundance.len());
    let mut acc = 0.0;
    for &a in abundance {
        acc += a;
        cumulative.push(acc / total);
    }
    let upper = cumulative
        .iter()
        .position(|&c| c >= rank)
        .unwrap_or(cumulative.len() - 1);
    if upper == 0 {
        return Some(diameters[0]);
    }
    let lower = upper - 1;
    let (d_lo, d_hi) = (diameters[lower], diameters[upper]);
    let (c_lo, c_hi) = (cumulative[lower], cumulative[upper]);
    let log_d = d_lo.ln() + (d_hi.ln() - d_lo.ln()) * (rank - c_lo) / (c_hi - c_lo);
    Some(log_d.exp())
}

// ============================================================================
// 运算符
// ============================================================================

impl AddAssign<&Grains> for Grains {
    fn add_assign(&mut self, rhs: &Grains) {
        self.assert_matching(rhs);
        for (v, &r) in self.volumes.iter_mut().zip(&rhs.volumes) {
            *v += r;
        }
    }
}

impl AddAssign<Grains> for Grains {
    fn add_assign(&mut self, rhs: Grains) {
        *self += &rhs;
    }
}

impl Add<&Grains> for Grains {
    type Output = Grains;

    fn add(mut self, rhs: &Grains) -> Grains {
        self += rhs;
        self
    }
}

impl Add<&Grains> for &Grains {
    type Output = Grains;

    fn add(self, rhs: &Grains) -> Grains {
        self.clone() + rhs
    }
}

impl MulAssign<f64> for Grains {
    fn mul_assign(&mut self, factor: f64) {
        assert!(factor >= 0.0, "Grains 不能乘以负数: {}", factor);
        for v in &mut self.volumes {
            *v *= factor;
        }
    }
}

impl Mul<f64> for Grains {
    type Output = Grains;

    fn mul(mut self, factor: f64) -> Grains {
        self *= factor;
        self
    }
}

impl Mul<f64> for &Grains {
    type Output = Grains;

    fn mul(self, factor: f64) -> Grains {
        self.clone() * factor
    }
}
