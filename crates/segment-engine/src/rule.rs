//! 规则模型
//!
//! 单条筛选条件（字段、操作符、类型化的值）。规则只能通过注册表校验后构造，
//! 外部无法观察到字段、操作符与值不匹配的中间状态。

use crate::error::ValidationError;
use crate::models::{RuleValue, WireRule};
use crate::operators::Operator;
use crate::registry::{FieldDescriptor, FieldRegistry, ValueType};
use std::fmt;
use uuid::Uuid;

/// 规则标识，跨编辑保持稳定
pub type RuleId = Uuid;

/// 筛选规则
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    id: RuleId,
    field_id: String,
    value_type: ValueType,
    operator: Operator,
    value: RuleValue,
}

/// 对单条规则的修改
#[derive(Debug, Clone, PartialEq)]
pub enum RuleMutation {
    /// 切换字段，操作符与值重置为新类型的默认值
    Field(String),
    /// 切换操作符（必须属于当前字段类型）
    Operator(String),
    Value(RuleValue),
}

impl Rule {
    /// 构造并校验规则
    ///
    /// 校验：字段存在；操作符属于字段类型；值类型匹配字段类型
    /// （Select 必须是 options 之一，between 必须 start <= end）。
    pub fn new(
        registry: &FieldRegistry,
        field_id: &str,
        operator_id: &str,
        value: RuleValue,
    ) -> Result<Self, ValidationError> {
        let field = registry.field(field_id)?;
        let operator = registry.operator(field.value_type, operator_id)?;
        Self::build(field, operator, value)
    }

    /// 从持久化格式（或不可信的外部输入）重建规则
    pub fn from_wire(registry: &FieldRegistry, wire: &WireRule) -> Result<Self, ValidationError> {
        let field = registry.field(&wire.field)?;
        let operator = registry.operator(field.value_type, &wire.operator)?;
        let value = RuleValue::from_json(field, operator.is_range(), &wire.value)?;
        Self::build(field, operator, value)
    }

    /// 字段的默认规则（默认操作符 + 默认值）
    pub fn default_for(registry: &FieldRegistry, field_id: &str) -> Result<Self, ValidationError> {
        let field = registry.field(field_id)?;
        Ok(Self::defaults(registry, field))
    }

    /// 兜底规则：Number 字段 gt 0
    pub fn fallback(registry: &FieldRegistry) -> Self {
        let field = registry.fallback_field();
        match field.value_type {
            ValueType::Number => Self::unchecked(field, Operator::Gt, RuleValue::Number(0.0)),
            _ => Self::defaults(registry, field),
        }
    }

    pub fn id(&self) -> RuleId {
        self.id
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &RuleValue {
        &self.value
    }

    /// 切换字段
    ///
    /// 字段变化总是让原有的操作符/值失效：操作符重置为新类型的默认操作符，
    /// 值重置为新类型的默认值。规则 ID 保持不变。
    pub fn set_field(
        &mut self,
        registry: &FieldRegistry,
        field_id: &str,
    ) -> Result<(), ValidationError> {
        let field = registry.field(field_id)?;
        let reset = Self::defaults(registry, field);

        self.field_id = reset.field_id;
        self.value_type = reset.value_type;
        self.operator = reset.operator;
        self.value = reset.value;
        Ok(())
    }

    /// 切换操作符
    ///
    /// 在单个日期与日期区间之间切换时，值随之转换：
    /// 单日 d 变为 [d, d]，区间 [s, e] 变为 s。
    pub fn set_operator(
        &mut self,
        registry: &FieldRegistry,
        operator_id: &str,
    ) -> Result<(), ValidationError> {
        let operator = registry.operator(self.value_type, operator_id)?;

        let value = match (&self.value, operator.is_range()) {
            (RuleValue::Date(d), true) => RuleValue::DateRange { start: *d, end: *d },
            (RuleValue::DateRange { start, .. }, false) => RuleValue::Date(*start),
            (value, _) => value.clone(),
        };

        self.operator = operator;
        self.value = value;
        Ok(())
    }

    /// 设置值，校验失败时规则保持不变
    pub fn set_value(
        &mut self,
        registry: &FieldRegistry,
        value: RuleValue,
    ) -> Result<(), ValidationError> {
        let field = registry.field(&self.field_id)?;
        validate_value(field, self.operator, &value)?;
        self.value = value;
        Ok(())
    }

    /// 应用修改，失败时规则保持不变
    pub fn apply(
        &mut self,
        registry: &FieldRegistry,
        mutation: RuleMutation,
    ) -> Result<(), ValidationError> {
        match mutation {
            RuleMutation::Field(field_id) => self.set_field(registry, &field_id),
            RuleMutation::Operator(operator_id) => self.set_operator(registry, &operator_id),
            RuleMutation::Value(value) => self.set_value(registry, value),
        }
    }

    /// 转换为持久化格式
    pub fn to_wire(&self) -> WireRule {
        WireRule {
            field: self.field_id.clone(),
            operator: self.operator.id().to_string(),
            value: self.value.to_json(),
        }
    }

    fn build(
        field: &FieldDescriptor,
        operator: Operator,
        value: RuleValue,
    ) -> Result<Self, ValidationError> {
        validate_value(field, operator, &value)?;
        Ok(Self::unchecked(field, operator, value))
    }

    fn defaults(registry: &FieldRegistry, field: &FieldDescriptor) -> Self {
        Self::unchecked(
            field,
            registry.default_operator(field.value_type),
            registry.default_value(field.value_type, &field.options),
        )
    }

    fn unchecked(field: &FieldDescriptor, operator: Operator, value: RuleValue) -> Self {
        Self {
            id: Uuid::new_v4(),
            field_id: field.id.clone(),
            value_type: field.value_type,
            operator,
            value,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field_id, self.operator, self.value)
    }
}

/// 校验值与字段类型、操作符的兼容性
fn validate_value(
    field: &FieldDescriptor,
    operator: Operator,
    value: &RuleValue,
) -> Result<(), ValidationError> {
    let mismatch = |expected: &str| ValidationError::TypeMismatch {
        field: field.id.clone(),
        expected: expected.to_string(),
        actual: value.type_name().to_string(),
    };

    match (field.value_type, value) {
        (ValueType::Number, RuleValue::Number(n)) => {
            if !n.is_finite() {
                return Err(ValidationError::NonFiniteNumber(field.id.clone()));
            }
        }
        (ValueType::Number, _) => return Err(mismatch("number")),

        (ValueType::Date, RuleValue::DateRange { start, end }) if operator.is_range() => {
            if start > end {
                return Err(ValidationError::InvalidRange {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
        }
        (ValueType::Date, _) if operator.is_range() => return Err(mismatch("date range")),
        (ValueType::Date, RuleValue::Date(_)) => {}
        (ValueType::Date, _) => return Err(mismatch("date")),

        (ValueType::Text, RuleValue::Text(_)) => {}
        (ValueType::Text, _) => return Err(mismatch("string")),

        (ValueType::Select, RuleValue::Text(s)) => {
            if !field.options.iter().any(|o| o == s) {
                return Err(ValidationError::OptionNotAllowed {
                    field: field.id.clone(),
                    value: s.clone(),
                });
            }
        }
        (ValueType::Select, _) => return Err(mismatch("option")),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_new_valid_rules() {
        let registry = FieldRegistry::standard();

        let rule = Rule::new(&registry, "spend", "gt", RuleValue::Number(10000.0)).unwrap();
        assert_eq!(rule.field_id(), "spend");
        assert_eq!(rule.operator(), Operator::Gt);
        assert_eq!(rule.value_type(), ValueType::Number);

        assert!(Rule::new(&registry, "status", "neq", RuleValue::Text("Inactive".into())).is_ok());
        assert!(
            Rule::new(&registry, "company", "contains", RuleValue::Text("acme".into())).is_ok()
        );
        assert!(Rule::new(
            &registry,
            "createdAt",
            "between",
            RuleValue::DateRange {
                start: date(2025, 1, 1),
                end: date(2025, 1, 1)
            }
        )
        .is_ok());
    }

    #[test]
    fn test_new_rejects_invalid_rules() {
        let registry = FieldRegistry::standard();

        assert_eq!(
            Rule::new(&registry, "age", "gt", RuleValue::Number(1.0)).unwrap_err(),
            ValidationError::UnknownField("age".to_string())
        );
        assert!(matches!(
            Rule::new(&registry, "spend", "contains", RuleValue::Number(1.0)),
            Err(ValidationError::UnknownOperator { .. })
        ));
        assert!(matches!(
            Rule::new(&registry, "spend", "gt", RuleValue::Text("1000".into())),
            Err(ValidationError::TypeMismatch { .. })
        ));
        assert_eq!(
            Rule::new(&registry, "spend", "gt", RuleValue::Number(f64::NAN)).unwrap_err(),
            ValidationError::NonFiniteNumber("spend".to_string())
        );
        assert!(matches!(
            Rule::new(&registry, "status", "eq", RuleValue::Text("active".into())),
            Err(ValidationError::OptionNotAllowed { .. })
        ));
        assert!(matches!(
            Rule::new(
                &registry,
                "lastPurchase",
                "between",
                RuleValue::DateRange {
                    start: date(2025, 3, 1),
                    end: date(2025, 1, 1)
                }
            ),
            Err(ValidationError::InvalidRange { .. })
        ));
        assert!(matches!(
            Rule::new(&registry, "lastPurchase", "between", RuleValue::Date(date(2025, 3, 1))),
            Err(ValidationError::TypeMismatch { .. })
        ));
        assert!(matches!(
            Rule::new(
                &registry,
                "lastPurchase",
                "before",
                RuleValue::DateRange {
                    start: date(2025, 1, 1),
                    end: date(2025, 3, 1)
                }
            ),
            Err(ValidationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_set_field_resets_operator_and_value() {
        let registry = FieldRegistry::standard();
        let mut rule = Rule::new(&registry, "spend", "gt", RuleValue::Number(500.0)).unwrap();
        let id = rule.id();

        rule.set_field(&registry, "status").unwrap();

        assert_eq!(rule.id(), id);
        assert_eq!(rule.field_id(), "status");
        assert_eq!(rule.operator(), Operator::Eq);
        assert_eq!(rule.value(), &RuleValue::Text("Active".to_string()));

        rule.set_field(&registry, "company").unwrap();
        assert_eq!(rule.value(), &RuleValue::Text(String::new()));

        rule.set_field(&registry, "orders").unwrap();
        assert_eq!(rule.operator(), Operator::Eq);
        assert_eq!(rule.value(), &RuleValue::Number(0.0));
    }

    #[test]
    fn test_set_field_unknown_leaves_rule_untouched() {
        let registry = FieldRegistry::standard();
        let mut rule = Rule::new(&registry, "spend", "gt", RuleValue::Number(500.0)).unwrap();
        let before = rule.clone();

        assert!(rule.set_field(&registry, "age").is_err());
        assert_eq!(rule, before);
    }

    #[test]
    fn test_set_operator_converts_dates() {
        let registry = FieldRegistry::standard();
        let mut rule = Rule::new(
            &registry,
            "lastPurchase",
            "before",
            RuleValue::Date(date(2025, 2, 1)),
        )
        .unwrap();

        rule.set_operator(&registry, "between").unwrap();
        assert_eq!(
            rule.value(),
            &RuleValue::DateRange {
                start: date(2025, 2, 1),
                end: date(2025, 2, 1)
            }
        );

        rule.set_operator(&registry, "after").unwrap();
        assert_eq!(rule.value(), &RuleValue::Date(date(2025, 2, 1)));

        assert!(rule.set_operator(&registry, "gt").is_err());
        assert_eq!(rule.operator(), Operator::After);
    }

    #[test]
    fn test_set_value_validates() {
        let registry = FieldRegistry::standard();
        let mut rule =
            Rule::new(&registry, "status", "eq", RuleValue::Text("Active".into())).unwrap();

        let gold = RuleMutation::Value(RuleValue::Text("Gold".into()));
        assert!(rule.apply(&registry, gold).is_err());
        assert_eq!(rule.value(), &RuleValue::Text("Active".to_string()));

        rule.apply(&registry, RuleMutation::Value(RuleValue::Text("Inactive".into())))
            .unwrap();
        assert_eq!(rule.value(), &RuleValue::Text("Inactive".to_string()));
    }

    #[test]
    fn test_from_wire() {
        let registry = FieldRegistry::standard();
        let wire = WireRule {
            field: "createdAt".to_string(),
            operator: "between".to_string(),
            value: json!(["2025-01-01", "2025-03-31"]),
        };

        let rule = Rule::from_wire(&registry, &wire).unwrap();
        assert_eq!(rule.operator(), Operator::Between);
        assert_eq!(rule.to_wire(), wire);
    }

    #[test]
    fn test_fallback_rule() {
        let registry = FieldRegistry::standard();
        let rule = Rule::fallback(&registry);
        assert_eq!(rule.to_string(), "spend gt 0");
    }
}
