//! 客群引擎错误类型

use thiserror::Error;
use uuid::Uuid;

/// 规则校验错误
///
/// 只在规则构造（含建议校验）时产生，不会泄露出部分构造的规则。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("字段不存在: {0}")]
    UnknownField(String),

    #[error("无效的操作符: {operator} 不支持类型 {value_type}")]
    UnknownOperator {
        operator: String,
        value_type: String,
    },

    #[error("类型不匹配: 字段 {field} 期望 {expected}, 实际 {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("选项不在允许范围内: 字段 {field} 不接受 '{value}'")]
    OptionNotAllowed { field: String, value: String },

    #[error("无效的日期区间: {start} 晚于 {end}")]
    InvalidRange { start: String, end: String },

    #[error("数值必须是有限数: 字段 {0}")]
    NonFiniteNumber(String),

    #[error("建议条目格式错误: {0}")]
    MalformedCandidate(String),

    #[error("字段重复定义: {0}")]
    DuplicateField(String),

    #[error("字段 {0} 的选项定义无效")]
    InvalidOptions(String),

    #[error("注册表至少需要一个字段")]
    EmptyRegistry,

    #[error("规则列表不能为空")]
    EmptyExpression,

    #[error("组合符数量不匹配: {rules} 条规则需要 {expected} 个组合符, 实际 {actual}")]
    CombinatorMismatch {
        rules: usize,
        expected: usize,
        actual: usize,
    },
}

/// 客群引擎错误
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("规则校验失败: {0}")]
    Validation(#[from] ValidationError),

    #[error("不能删除最后一条规则")]
    CannotRemoveLastRule,

    #[error("组合符下标越界: index={index}, 规则数={len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("规则未找到: {0}")]
    RuleNotFound(Uuid),

    #[error("缺少必填字段: {0}")]
    MissingField(&'static str),

    #[error("客群未找到: id={id}")]
    NotFound { id: String },

    #[error("规则建议不可用: {0}")]
    SuggestionUnavailable(String),

    #[error("持久化失败: {0}")]
    Persistence(String),

    #[error("客户数据读取失败: {0}")]
    Population(String),

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),
}

impl SegmentError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::CannotRemoveLastRule => "CANNOT_REMOVE_LAST_RULE",
            Self::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::SuggestionUnavailable(_) => "SUGGESTION_UNAVAILABLE",
            Self::Persistence(_) => "PERSISTENCE_FAILURE",
            Self::Population(_) => "POPULATION_UNAVAILABLE",
            Self::Json(_) => "JSON_ERROR",
        }
    }

    /// 是否为结构性错误（编辑操作被拒绝，状态未改变）
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::CannotRemoveLastRule | Self::IndexOutOfRange { .. } | Self::RuleNotFound(_)
        )
    }

    /// 是否可由调用方重试
    ///
    /// 持久化失败直接上报，不在引擎内重试，也不标记为可重试。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SuggestionUnavailable(_) | Self::Population(_))
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }
}

pub type Result<T> = std::result::Result<T, SegmentError>;
