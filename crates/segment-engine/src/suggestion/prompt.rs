//! 规则建议提示词

use crate::error::{Result, SegmentError};
use crate::registry::{FieldRegistry, ValueType};
use serde::Serialize;
use std::collections::BTreeMap;

/// 提示词中的可用字段
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogField {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub options: Vec<String>,
}

/// 提供给建议服务的字段与操作符清单
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionCatalog {
    pub fields: Vec<CatalogField>,
    /// 值类型 -> 操作符 ID 列表
    pub operators: BTreeMap<ValueType, Vec<&'static str>>,
}

impl SuggestionCatalog {
    pub fn from_registry(registry: &FieldRegistry) -> Self {
        let fields = registry
            .fields()
            .iter()
            .map(|f| CatalogField {
                id: f.id.clone(),
                label: f.label.clone(),
                value_type: f.value_type,
                options: f.options.clone(),
            })
            .collect();

        let operators = [ValueType::Number, ValueType::Date, ValueType::Text, ValueType::Select]
            .into_iter()
            .map(|vt| {
                let ids = registry.operators_for(vt).iter().map(|d| d.operator.id()).collect();
                (vt, ids)
            })
            .collect();

        Self { fields, operators }
    }
}

/// 构建提示词
///
/// 空白请求直接拒绝，不会发起建议调用。
pub fn build_prompt(request: &str, catalog: &SuggestionCatalog) -> Result<String> {
    let request = request.trim();
    if request.is_empty() {
        return Err(SegmentError::MissingField("prompt"));
    }

    let fields = serde_json::to_string(&catalog.fields)?;
    let operators = serde_json::to_string(&catalog.operators)?;

    Ok(format!(
        "Create customer segmentation rules based on: \"{request}\"\n\
         \n\
         Available fields: {fields}\n\
         Available operators: {operators}\n\
         \n\
         Return ONLY a JSON array of rules in this format:\n\
         [{{\n  \"field\": \"field_id\",\n  \"operator\": \"operator_id\",\n  \
         \"value\": \"appropriate_value\"\n}}]\n"
    ))
}
