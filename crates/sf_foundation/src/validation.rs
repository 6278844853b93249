// crates/sf_foundation/src/validation.rs

//! 运行时验证工具
//!
//! 提供验证报告和错误/警告类型。河网构造时一次性收集全部拓扑问题，
//! 再统一转换为 [`SfError::Topology`]。
//!
//! # 示例
//!
//! ```
//! use sf_foundation::validation::{ValidationReport, ValidationError};
//!
//! let mut report = ValidationReport::new();
//! report.add_error(ValidationError::DanglingLink { reach_id: 3, target: 9 });
//! assert!(report.has_errors());
//! assert!(report.into_result().is_err());
//! ```

use crate::error::{SfError, SfResult};
use std::fmt;

/// 验证报告
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// 错误列表
    pub errors: Vec<ValidationError>,
    /// 警告列表
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    /// 创建空的验证报告
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加错误
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// 添加警告
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// 是否有错误
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// 是否有警告
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// 是否通过（无错误）
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    /// 合并另一个报告
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// 有错误时转换为拓扑错误
    pub fn into_result(self) -> SfResult<Vec<ValidationWarning>> {
        if self.has_errors() {
            let message = self
                .errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SfError::topology(message));
        }
        Ok(self.warnings)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "验证报告:")?;
        writeln!(f, "  错误: {} 个", self.errors.len())?;
        writeln!(f, "  警告: {} 个", self.warnings.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, err)?;
        }
        for (i, warn) in self.warnings.iter().enumerate() {
            writeln!(f, "  W{}. {}", i + 1, warn)?;
        }
        Ok(())
    }
}

/// 验证错误类型
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// 河网为空
    EmptyNetwork,
    /// 河段编号重复
    DuplicateId {
        /// 重复的河段编号
        reach_id: i64,
    },
    /// 下游链接指向不存在的河段
    DanglingLink {
        /// 河段编号
        reach_id: i64,
        /// 不存在的目标编号
        target: i64,
    },
    /// 下游链接指向自身
    SelfLink {
        /// 河段编号
        reach_id: i64,
    },
    /// 下游出口数量不是一个
    DownstreamMarginCount {
        /// 实际数量
        count: usize,
    },
    /// 下游链无法在有限步内到达出口（存在环）
    UnterminatedChain {
        /// 链起点河段编号
        reach_id: i64,
    },
    /// 非有限数值
    NonFinite {
        /// 字段名称
        field: &'static str,
        /// 河段编号
        reach_id: i64,
        /// 数值
        value: f64,
    },
    /// 数据超出范围
    OutOfRange {
        /// 字段名称
        field: &'static str,
        /// 河段编号
        reach_id: i64,
        /// 实际值
        value: f64,
        /// 下界
        min: f64,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyNetwork => write!(f, "河网不含任何河段"),
            Self::DuplicateId { reach_id } => write!(f, "河段编号 {} 重复", reach_id),
            Self::DanglingLink { reach_id, target } => {
                write!(f, "河段 {} 的下游河段 {} 不存在", reach_id, target)
            }
            Self::SelfLink { reach_id } => write!(f, "河段 {} 的下游指向自身", reach_id),
            Self::DownstreamMarginCount { count } => {
                write!(f, "需要恰好一个下游出口, 实际 {} 个", count)
            }
            Self::UnterminatedChain { reach_id } => {
                write!(f, "从河段 {} 出发的下游链无法到达出口", reach_id)
            }
            Self::NonFinite {
                field,
                reach_id,
                value,
            } => write!(f, "河段 {} 的 {} 不是有限值: {}", reach_id, field, value),
            Self::OutOfRange {
                field,
                reach_id,
                value,
                min,
            } => write!(f, "河段 {} 的 {}={} 小于下界 {}", reach_id, field, value, min),
        }
    }
}

/// 验证警告类型
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationWarning {
    /// 河段编号沿下游方向不单调递增
    NonMonotonicNumbering {
        /// 上游河段编号
        upstream_id: i64,
        /// 下游河段编号
        downstream_id: i64,
    },
    /// 河段没有泥沙
    EmptyStrata {
        /// 河段编号
        reach_id: i64,
    },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonMonotonicNumbering {
                upstream_id,
                downstream_id,
            } => write!(
                f,
                "河段编号不单调: 上游 {} 流入下游 {}",
                upstream_id, downstream_id
            ),
            Self::EmptyStrata { reach_id } => write!(f, "河段 {} 初始无泥沙", reach_id),
        }
    }
}
