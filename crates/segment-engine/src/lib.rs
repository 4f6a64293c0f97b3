//! CRM 客群规则引擎
//!
//! 提供客群筛选规则的完整能力，支持：
//! - 字段/操作符注册表与类型化规则
//! - 规则表达式编辑（AND/OR 从左到右折叠，无优先级）
//! - 谓词编译与客群人数精确计算
//! - 外部规则建议的校验与兜底
//! - 客群生命周期管理与过期重算结果丢弃

pub mod audience;
pub mod cli;
pub mod compiler;
pub mod editor;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod lifecycle;
pub mod models;
pub mod operators;
pub mod registry;
pub mod rule;
pub mod store;
pub mod suggestion;

pub use audience::{AudienceState, AudienceStatus, AudienceTracker};
pub use compiler::{CompiledPredicate, EvaluationTrace, compile};
pub use editor::SegmentEditor;
pub use error::{Result, SegmentError, ValidationError};
pub use evaluator::AudienceEvaluator;
pub use expression::Expression;
pub use lifecycle::{SegmentDraft, SegmentManager};
pub use models::{
    CustomerRecord, ExpressionDocument, FieldValue, RuleValue, Segment, SegmentDocument, WireRule,
};
pub use operators::{Combinator, Operator};
pub use registry::{FieldDescriptor, FieldRegistry, OperatorDescriptor, ValueType};
pub use rule::{Rule, RuleId, RuleMutation};
pub use store::{CustomerSource, MemoryCustomerSource, MemorySegmentStore, SegmentStore};
pub use suggestion::{RuleAssistant, SuggestionProvider, SuggestionValidator, ValidationReport};
