//! 客群引擎领域模型

use crate::error::{Result, ValidationError};
use crate::expression::Expression;
use crate::operators::Combinator;
use crate::registry::{FieldDescriptor, FieldRegistry, ValueType};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;

/// 规则字面值
///
/// Select 字段的值使用 `Text`，由注册表中的 options 约束取值。
#[derive(Debug, Clone, PartialEq)]
pub enum RuleValue {
    Number(f64),
    Date(NaiveDate),
    /// between 的闭区间 [start, end]
    DateRange { start: NaiveDate, end: NaiveDate },
    Text(String),
}

impl RuleValue {
    /// 从不可信的 JSON 值按字段类型重建字面值
    ///
    /// 只依据注册表中的字段类型解释输入，不信任输入自带的类型。
    /// 数值字段接受数字或可解析为数字的字符串。
    pub fn from_json(
        field: &FieldDescriptor,
        range: bool,
        value: &Value,
    ) -> std::result::Result<Self, ValidationError> {
        let mismatch = |expected: &str| ValidationError::TypeMismatch {
            field: field.id.clone(),
            expected: expected.to_string(),
            actual: json_type_name(value).to_string(),
        };

        match field.value_type {
            ValueType::Number => match value {
                Value::Number(n) => n.as_f64().map(Self::Number).ok_or_else(|| mismatch("number")),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Self::Number)
                    .map_err(|_| mismatch("number")),
                _ => Err(mismatch("number")),
            },
            ValueType::Date if range => {
                let arr = value
                    .as_array()
                    .filter(|arr| arr.len() == 2)
                    .ok_or_else(|| mismatch("[start, end] date array"))?;
                let start = arr[0]
                    .as_str()
                    .and_then(parse_date)
                    .ok_or_else(|| mismatch("date"))?;
                let end = arr[1]
                    .as_str()
                    .and_then(parse_date)
                    .ok_or_else(|| mismatch("date"))?;
                Ok(Self::DateRange { start, end })
            }
            ValueType::Date => value
                .as_str()
                .and_then(parse_date)
                .map(Self::Date)
                .ok_or_else(|| mismatch("date")),
            ValueType::Text | ValueType::Select => value
                .as_str()
                .map(|s| Self::Text(s.to_string()))
                .ok_or_else(|| mismatch("string")),
        }
    }

    /// 转换为持久化使用的 JSON 值
    pub fn to_json(&self) -> Value {
        match self {
            Self::Number(n) => json!(n),
            Self::Date(d) => json!(format_date(*d)),
            Self::DateRange { start, end } => json!([format_date(*start), format_date(*end)]),
            Self::Text(s) => json!(s),
        }
    }

    /// 值的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Date(_) => "date",
            Self::DateRange { .. } => "date range",
            Self::Text(_) => "string",
        }
    }
}

impl Serialize for RuleValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for RuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Date(d) => write!(f, "{}", format_date(*d)),
            Self::DateRange { start, end } => {
                write!(f, "[{}, {}]", format_date(*start), format_date(*end))
            }
            Self::Text(s) => write!(f, "'{}'", s),
        }
    }
}

/// 客户记录中的字段值
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

/// 客户记录 - 提供给评估器的数据
///
/// 字段 ID 到类型化值的扁平映射。缺失的字段会使引用它的规则评估为 false。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerRecord {
    id: Option<String>,
    fields: HashMap<String, FieldValue>,
}

impl CustomerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_number(mut self, field: impl Into<String>, value: f64) -> Self {
        self.fields.insert(field.into(), FieldValue::Number(value));
        self
    }

    pub fn with_date(mut self, field: impl Into<String>, value: NaiveDate) -> Self {
        self.fields.insert(field.into(), FieldValue::Date(value));
        self
    }

    pub fn with_text(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), FieldValue::Text(value.into()));
        self
    }

    /// 从存储中的客户文档构建记录
    ///
    /// 只提取注册表中已知的字段，并按字段类型转换。无法转换的值视为缺失。
    /// 日期支持 `YYYY-MM-DD` 与 RFC 3339 时间戳。
    pub fn from_document(doc: &Value, registry: &FieldRegistry) -> Self {
        let mut record = Self::new();

        let Some(map) = doc.as_object() else {
            return record;
        };

        record.id = map
            .get("_id")
            .or_else(|| map.get("id"))
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        for field in registry.fields() {
            let Some(raw) = map.get(&field.id) else {
                continue;
            };

            let value = match field.value_type {
                ValueType::Number => match raw {
                    Value::Number(n) => n.as_f64().map(FieldValue::Number),
                    Value::String(s) => s.trim().parse().ok().map(FieldValue::Number),
                    _ => None,
                },
                ValueType::Date => raw.as_str().and_then(parse_date).map(FieldValue::Date),
                ValueType::Text | ValueType::Select => {
                    raw.as_str().map(|s| FieldValue::Text(s.to_string()))
                }
            };

            if let Some(value) = value {
                record.fields.insert(field.id.clone(), value);
            }
        }

        record
    }

    /// 从 JSON 数组批量构建客户记录
    pub fn from_documents(docs: &Value, registry: &FieldRegistry) -> Vec<Self> {
        docs.as_array()
            .map(|arr| arr.iter().map(|doc| Self::from_document(doc, registry)).collect())
            .unwrap_or_default()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// 获取字段值
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// 持久化格式中的单条规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRule {
    pub field: String,
    pub operator: String,
    pub value: Value,
}

/// 持久化格式中的规则表达式
///
/// `combinators` 缺失时（旧格式文档）按全部 AND 解释。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionDocument {
    pub rules: Vec<WireRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combinators: Option<Vec<Combinator>>,
}

/// 客群
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: String,
    pub name: String,
    pub description: String,
    pub expression: Expression,
    /// 最近一次计算的客群人数，始终对应当前存储的 expression
    pub customer_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Segment {
    /// 转换为持久化文档
    pub fn to_document(&self) -> SegmentDocument {
        SegmentDocument {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            expression: self.expression.to_document(),
            customer_count: self.customer_count,
            created_at: self.created_at,
            last_updated: self.last_updated,
        }
    }

    /// 从持久化文档重建客群，规则按注册表重新校验
    pub fn from_document(doc: SegmentDocument, registry: &FieldRegistry) -> Result<Self> {
        let expression = Expression::from_document(&doc.expression, registry)?;

        Ok(Self {
            id: doc.id,
            name: doc.name,
            description: doc.description,
            expression,
            customer_count: doc.customer_count,
            created_at: doc.created_at,
            last_updated: doc.last_updated,
        })
    }
}

/// 客群持久化文档
///
/// 字段名是其他协作方依赖的外部约定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentDocument {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub expression: ExpressionDocument,
    #[serde(default)]
    pub customer_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// 解析日期（`YYYY-MM-DD` 或 RFC 3339，后者取 UTC 日期部分）
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).date_naive())
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
