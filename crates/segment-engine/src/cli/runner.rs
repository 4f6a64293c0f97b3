//! 命令执行器
//!
//! 将命令行参数转化为对引擎的调用，结果以 JSON 输出到 stdout。

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use tracing::info;

use crm_shared::config::AppConfig;

use crate::compiler::compile;
use crate::evaluator::AudienceEvaluator;
use crate::expression::Expression;
use crate::models::{CustomerRecord, ExpressionDocument};
use crate::registry::{FieldRegistry, ValueType};
use crate::suggestion::{GenerativeTextProvider, RuleAssistant};

/// 命令执行器
pub struct CommandRunner {
    config: AppConfig,
    registry: Arc<FieldRegistry>,
}

impl CommandRunner {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: Arc::new(FieldRegistry::standard()),
        }
    }

    /// 执行 fields 命令
    pub fn run_fields(&self) -> Result<()> {
        let operators: serde_json::Map<String, Value> = [
            ValueType::Number,
            ValueType::Date,
            ValueType::Text,
            ValueType::Select,
        ]
        .into_iter()
        .map(|vt| (vt.to_string(), json!(self.registry.operators_for(vt))))
        .collect();

        print_json(&json!({
            "fields": self.registry.fields(),
            "operators": operators,
        }))
    }

    /// 执行 count 命令
    pub fn run_count(
        &self,
        customers: Option<&str>,
        segment: &str,
        explain: Option<&str>,
    ) -> Result<()> {
        let population = self.load_population(customers)?;
        let expression = self.load_expression(Path::new(segment))?;

        let predicate = compile(&expression);
        let count = AudienceEvaluator::count(&predicate, &population);
        info!(count, population = population.len(), "客群人数计算完成");

        let mut output = json!({
            "expression": expression.to_string(),
            "population": population.len(),
            "customerCount": count,
        });

        if let Some(customer_id) = explain {
            let Some(record) = population.iter().find(|r| r.id() == Some(customer_id)) else {
                bail!("客户不存在: {customer_id}");
            };
            let trace = predicate.explain(record);
            output["explain"] = json!({
                "customerId": customer_id,
                "matched": trace.matched,
                "ruleOutcomes": trace.rule_outcomes,
                "trace": trace.trace,
            });
        }

        print_json(&output)
    }

    /// 执行 suggest 命令
    pub async fn run_suggest(&self, customers: Option<&str>, prompt: &str) -> Result<()> {
        let population = self.load_population(customers)?;

        let provider = GenerativeTextProvider::new(&self.config.suggestion)?;
        let assistant = RuleAssistant::new(self.registry.clone(), Arc::new(provider));
        let report = assistant.suggest_expression(prompt).await?;

        let count = AudienceEvaluator::count(&compile(&report.expression), &population);

        let rejected: Vec<Value> = report
            .rejected
            .iter()
            .map(|(index, e)| json!({ "index": index, "reason": e.to_string() }))
            .collect();

        print_json(&json!({
            "expression": report.expression.to_string(),
            "document": report.expression.to_document(),
            "fellBack": report.fell_back,
            "rejected": rejected,
            "customerCount": count,
        }))
    }

    fn load_population(&self, path: Option<&str>) -> Result<Vec<CustomerRecord>> {
        let Some(path) = path.or(self.config.segment.population_path.as_deref()) else {
            bail!("未指定客户数据文件 (--customers 或 segment.population_path)");
        };

        let content =
            fs::read_to_string(path).with_context(|| format!("读取客户数据失败: {path}"))?;
        let docs: Value = serde_json::from_str(&content)
            .with_context(|| format!("客户数据不是合法 JSON: {path}"))?;
        if !docs.is_array() {
            bail!("客户数据必须是 JSON 数组: {path}");
        }

        let records = CustomerRecord::from_documents(&docs, &self.registry);
        info!(path, count = records.len(), "客户数据已加载");
        Ok(records)
    }

    fn load_expression(&self, path: &Path) -> Result<Expression> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取客群文档失败: {}", path.display()))?;
        let doc: ExpressionDocument = serde_json::from_str(&content)
            .with_context(|| format!("客群文档格式错误: {}", path.display()))?;

        Expression::from_document(&doc, &self.registry)
            .with_context(|| format!("客群规则无效: {}", path.display()))
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
