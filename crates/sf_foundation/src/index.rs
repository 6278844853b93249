// crates/sf_foundation/src/index.rs

//! 强类型索引系统
//!
//! 使用泛型 `Idx<T>` 实现类型安全的 Arena 索引。河段之间的上下游关系
//! 全部以索引表示，不持有引用，因此 Arena 重建后旧索引只需重新校验。
//!
//! # 设计目标
//!
//! 1. **类型安全**: 编译期区分河段索引与其它索引
//! 2. **零开销**: 与 u32 相同的内存布局
//! 3. **可校验**: `INVALID` 哨兵值与 `is_valid` 检查
//!
//! # 示例
//!
//! ```
//! use sf_foundation::index::ReachIndex;
//!
//! let idx = ReachIndex::from_usize(3);
//! assert!(idx.is_valid());
//! assert_eq!(idx.as_usize(), 3);
//! assert!(!ReachIndex::INVALID.is_valid());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// 无效索引标记
pub const INVALID_INDEX: u32 = u32::MAX;

// ============================================================================
// 标记类型 (Phantom Types)
// ============================================================================

/// 河段索引标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReachTag;

// ============================================================================
// 泛型索引类型
// ============================================================================

/// 泛型 Arena 索引
///
/// 使用 Phantom Type `T` 区分不同类型的索引，避免误用。
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Idx<T> {
    index: u32,
    #[serde(skip)]
    _marker: PhantomData<fn() -> T>,
}

// 手动实现 Copy 和 Clone，因为 PhantomData<T> 的 Copy 需要 T: Copy
impl<T> Copy for Idx<T> {}

impl<T> Clone for Idx<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Idx<T> {
    /// 无效索引常量
    pub const INVALID: Self = Self::from_raw(INVALID_INDEX);

    /// 从原始 u32 创建
    #[inline]
    pub const fn from_raw(index: u32) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// 从 usize 创建
    #[inline]
    pub fn from_usize(index: usize) -> Self {
        debug_assert!(index < INVALID_INDEX as usize, "索引超出 u32 范围");
        Self::from_raw(index as u32)
    }

    /// 获取索引值
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// 获取索引值（usize）
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.index as usize
    }

    /// 判断索引是否有效
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.index != INVALID_INDEX
    }

    /// 转换为 `Option<usize>`
    #[inline]
    pub fn to_option(self) -> Option<usize> {
        self.is_valid().then_some(self.as_usize())
    }
}

// ============================================================================
// Trait 实现
// ============================================================================

impl<T> Default for Idx<T> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<T> PartialEq for Idx<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Idx<T> {}

impl<T> PartialOrd for Idx<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Idx<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}

impl<T> Hash for Idx<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Idx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Idx({})", self.index)
        } else {
            write!(f, "Idx(INVALID)")
        }
    }
}

impl<T> fmt::Display for Idx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.index)
        } else {
            write!(f, "INVALID")
        }
    }
}

impl<T> From<usize> for Idx<T> {
    #[inline]
    fn from(index: usize) -> Self {
        Self::from_usize(index)
    }
}

impl<T> From<Idx<T>> for usize {
    #[inline]
    fn from(idx: Idx<T>) -> usize {
        idx.as_usize()
    }
}

// ============================================================================
// 类型别名
// ============================================================================

/// 河段索引（河网 Arena 中的位置，不是用户河段编号）
pub type ReachIndex = Idx<ReachTag>;

/// 创建河段索引
#[inline]
pub const fn reach(index: u32) -> ReachIndex {
    ReachIndex::from_raw(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_default() {
        let idx: ReachIndex = Default::default();
        assert!(!idx.is_valid());
        assert_eq!(idx.to_option(), None);
    }

    #[test]
    fn test_ordering_follows_position() {
        let a = reach(1);
        let b = reach(4);
        assert!(a < b);
        assert_eq!(usize::from(b), 4);
    }

    #[test]
    fn test_serde_transparent() {
        let idx = reach(7);
        let json = serde_json::to_string(&idx).unwrap();
        assert_eq!(json, "7");
        let back: ReachIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back, idx);
    }
}
