//! 字段与操作符注册表
//!
//! 描述可用于筛选的客户字段、字段值类型，以及每种类型合法的操作符。
//! 注册表在进程启动时确定，之后只读。

use crate::error::ValidationError;
use crate::models::RuleValue;
use crate::operators::Operator;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// 字段值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Number,
    Date,
    Text,
    Select,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Date => "date",
            Self::Text => "text",
            Self::Select => "select",
        }
    }

    /// 该类型合法的操作符（有序，第一个为默认操作符）
    pub fn operators(&self) -> &'static [OperatorDescriptor] {
        match self {
            Self::Number => NUMBER_OPERATORS,
            Self::Date => DATE_OPERATORS,
            Self::Text => TEXT_OPERATORS,
            Self::Select => SELECT_OPERATORS,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 操作符描述
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperatorDescriptor {
    pub operator: Operator,
    pub label: &'static str,
}

const fn op(operator: Operator, label: &'static str) -> OperatorDescriptor {
    OperatorDescriptor { operator, label }
}

const NUMBER_OPERATORS: &[OperatorDescriptor] = &[
    op(Operator::Eq, "="),
    op(Operator::Gt, ">"),
    op(Operator::Lt, "<"),
    op(Operator::Gte, ">="),
    op(Operator::Lte, "<="),
];

const DATE_OPERATORS: &[OperatorDescriptor] = &[
    op(Operator::Before, "Before"),
    op(Operator::After, "After"),
    op(Operator::Between, "Between"),
];

const TEXT_OPERATORS: &[OperatorDescriptor] = &[
    op(Operator::Eq, "Equals"),
    op(Operator::Contains, "Contains"),
    op(Operator::StartsWith, "Starts with"),
    op(Operator::EndsWith, "Ends with"),
];

const SELECT_OPERATORS: &[OperatorDescriptor] =
    &[op(Operator::Eq, "Is"), op(Operator::Neq, "Is not")];

/// 字段描述
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub id: String,
    /// 仅用于展示，不参与评估
    pub label: String,
    pub value_type: ValueType,
    /// 仅 Select 类型非空
    pub options: Vec<String>,
}

impl FieldDescriptor {
    pub fn number(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::scalar(id, label, ValueType::Number)
    }

    pub fn date(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::scalar(id, label, ValueType::Date)
    }

    pub fn text(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::scalar(id, label, ValueType::Text)
    }

    pub fn select<I, S>(id: impl Into<String>, label: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            label: label.into(),
            value_type: ValueType::Select,
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    fn scalar(id: impl Into<String>, label: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            value_type,
            options: Vec::new(),
        }
    }
}

/// 字段注册表
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    fields: Vec<FieldDescriptor>,
}

impl FieldRegistry {
    /// 创建注册表
    ///
    /// 校验字段 ID 唯一，且 options 当且仅当 Select 类型时非空。
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self, ValidationError> {
        if fields.is_empty() {
            return Err(ValidationError::EmptyRegistry);
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.id.as_str()) {
                return Err(ValidationError::DuplicateField(field.id.clone()));
            }

            let is_select = field.value_type == ValueType::Select;
            if is_select == field.options.is_empty() {
                return Err(ValidationError::InvalidOptions(field.id.clone()));
            }
        }

        Ok(Self { fields })
    }

    /// CRM 客户的标准筛选字段
    pub fn standard() -> Self {
        Self {
            fields: vec![
                FieldDescriptor::number("spend", "Total Spend"),
                FieldDescriptor::number("orders", "Number of Orders"),
                FieldDescriptor::date("lastPurchase", "Last Purchase Date"),
                FieldDescriptor::date("createdAt", "Created Date"),
                FieldDescriptor::select("status", "Customer Status", ["Active", "Inactive"]),
                FieldDescriptor::text("company", "Company"),
            ],
        }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// 按 ID 查找字段
    pub fn field(&self, id: &str) -> Result<&FieldDescriptor, ValidationError> {
        self.fields
            .iter()
            .find(|f| f.id == id)
            .ok_or_else(|| ValidationError::UnknownField(id.to_string()))
    }

    /// 按值类型分组的字段（组内保持注册顺序）
    pub fn fields_by_type(&self) -> BTreeMap<ValueType, Vec<&FieldDescriptor>> {
        let mut grouped: BTreeMap<ValueType, Vec<&FieldDescriptor>> = BTreeMap::new();
        for field in &self.fields {
            grouped.entry(field.value_type).or_default().push(field);
        }
        grouped
    }

    pub fn operators_for(&self, value_type: ValueType) -> &'static [OperatorDescriptor] {
        value_type.operators()
    }

    /// 解析操作符 ID，并确认其属于该类型的操作符组
    pub fn operator(&self, value_type: ValueType, id: &str) -> Result<Operator, ValidationError> {
        let unknown = || ValidationError::UnknownOperator {
            operator: id.to_string(),
            value_type: value_type.to_string(),
        };

        let operator: Operator = id.parse().map_err(|_| unknown())?;
        if self.allows(value_type, operator) {
            Ok(operator)
        } else {
            Err(unknown())
        }
    }

    pub fn allows(&self, value_type: ValueType, operator: Operator) -> bool {
        value_type.operators().iter().any(|d| d.operator == operator)
    }

    pub fn default_operator(&self, value_type: ValueType) -> Operator {
        value_type.operators()[0].operator
    }

    /// 类型默认值：0 / 今天 / 空字符串 / 第一个选项
    pub fn default_value(&self, value_type: ValueType, options: &[String]) -> RuleValue {
        self.default_value_on(value_type, options, Utc::now().date_naive())
    }

    pub fn default_value_on(
        &self,
        value_type: ValueType,
        options: &[String],
        today: NaiveDate,
    ) -> RuleValue {
        match value_type {
            ValueType::Number => RuleValue::Number(0.0),
            ValueType::Date => RuleValue::Date(today),
            ValueType::Text => RuleValue::Text(String::new()),
            ValueType::Select => RuleValue::Text(options.first().cloned().unwrap_or_default()),
        }
    }

    /// 兜底规则使用的字段：第一个 Number 字段，没有时取第一个字段
    pub fn fallback_field(&self) -> &FieldDescriptor {
        self.fields
            .iter()
            .find(|f| f.value_type == ValueType::Number)
            .unwrap_or(&self.fields[0])
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
