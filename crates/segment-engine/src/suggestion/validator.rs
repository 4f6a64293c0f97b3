//! 建议规则校验
//!
//! 外部建议是完全不可信的数据。每个候选条目都通过规则构造重新校验，
//! 非法条目被丢弃而不是让整批失败；没有合法条目时返回兜底表达式。

use crate::error::{Result, SegmentError, ValidationError};
use crate::expression::Expression;
use crate::models::WireRule;
use crate::registry::FieldRegistry;
use crate::rule::Rule;
use serde_json::Value;
use tracing::{debug, warn};

/// 从自由文本中截取第一个 `[` 到最后一个 `]` 之间的 JSON 数组
pub fn extract_candidates(raw: &str) -> Result<Vec<Value>> {
    let (Some(start), Some(end)) = (raw.find('['), raw.rfind(']')) else {
        return Err(SegmentError::SuggestionUnavailable(
            "响应中没有 JSON 数组".to_string(),
        ));
    };
    if end < start {
        return Err(SegmentError::SuggestionUnavailable(
            "响应中没有 JSON 数组".to_string(),
        ));
    }

    serde_json::from_str(&raw[start..=end])
        .map_err(|e| SegmentError::SuggestionUnavailable(format!("JSON 数组解析失败: {e}")))
}

/// 校验结果
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub expression: Expression,
    pub accepted: usize,
    /// 被丢弃的候选（下标，原因）
    pub rejected: Vec<(usize, ValidationError)>,
    /// 是否使用了兜底表达式
    pub fell_back: bool,
}

/// 建议规则校验器
pub struct SuggestionValidator<'a> {
    registry: &'a FieldRegistry,
}

impl<'a> SuggestionValidator<'a> {
    pub fn new(registry: &'a FieldRegistry) -> Self {
        Self { registry }
    }

    /// 校验候选列表并返回表达式（永不为空）
    pub fn validate(&self, candidates: &[Value]) -> Expression {
        self.validate_with_report(candidates).expression
    }

    pub fn validate_with_report(&self, candidates: &[Value]) -> ValidationReport {
        let mut rules = Vec::with_capacity(candidates.len());
        let mut rejected = Vec::new();

        for (index, candidate) in candidates.iter().enumerate() {
            match self.candidate_rule(candidate) {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    warn!(index, error = %e, "丢弃非法的建议规则");
                    rejected.push((index, e));
                }
            }
        }

        let accepted = rules.len();
        let (expression, fell_back) = match Expression::from_rules(rules) {
            Ok(expression) => (expression, false),
            Err(_) => (Expression::fallback(self.registry), true),
        };

        debug!(accepted, rejected = rejected.len(), fell_back, "建议规则校验完成");

        ValidationReport {
            expression,
            accepted,
            rejected,
            fell_back,
        }
    }

    /// 只读取 field / operator / value 三个键，其余内容忽略
    fn candidate_rule(&self, candidate: &Value) -> std::result::Result<Rule, ValidationError> {
        let obj = candidate
            .as_object()
            .ok_or_else(|| ValidationError::MalformedCandidate("条目不是对象".to_string()))?;

        let text = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ValidationError::MalformedCandidate(format!("缺少字符串字段 {key}")))
        };

        let wire = WireRule {
            field: text("field")?,
            operator: text("operator")?,
            value: obj
                .get("value")
                .cloned()
                .ok_or_else(|| ValidationError::MalformedCandidate("缺少 value".to_string()))?,
        };

        Rule::from_wire(self.registry, &wire)
    }
}
