//! 自然语言规则建议
//!
//! 提示词构建、远程建议调用、响应解析与校验。建议不可用时回退到兜底表达式，
//! 不会中断编辑会话。

pub mod prompt;
pub mod provider;
pub mod validator;

pub use prompt::{SuggestionCatalog, build_prompt};
pub use provider::{GenerativeTextProvider, SuggestionProvider};
pub use validator::{SuggestionValidator, ValidationReport, extract_candidates};

use crate::error::{Result, SegmentError};
use crate::expression::Expression;
use crate::registry::FieldRegistry;
use crm_shared::observability::metrics::record_suggestion;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 规则建议助手
pub struct RuleAssistant {
    registry: Arc<FieldRegistry>,
    provider: Arc<dyn SuggestionProvider>,
    catalog: SuggestionCatalog,
}

impl RuleAssistant {
    pub fn new(registry: Arc<FieldRegistry>, provider: Arc<dyn SuggestionProvider>) -> Self {
        let catalog = SuggestionCatalog::from_registry(&registry);
        Self {
            registry,
            provider,
            catalog,
        }
    }

    pub fn catalog(&self) -> &SuggestionCatalog {
        &self.catalog
    }

    /// 根据自然语言请求生成表达式
    ///
    /// 只有空请求会返回错误；建议服务失败或响应无法解析时返回兜底表达式。
    #[instrument(skip(self))]
    pub async fn suggest_expression(&self, request: &str) -> Result<ValidationReport> {
        if request.trim().is_empty() {
            return Err(SegmentError::MissingField("prompt"));
        }

        let candidates = match self.provider.suggest(request, &self.catalog).await {
            Ok(raw) => extract_candidates(&raw),
            Err(e) => Err(e),
        };

        let report = match candidates {
            Ok(candidates) => {
                SuggestionValidator::new(&self.registry).validate_with_report(&candidates)
            }
            Err(e) => {
                warn!(error = %e, "规则建议不可用，使用默认规则");
                ValidationReport {
                    expression: Expression::fallback(&self.registry),
                    accepted: 0,
                    rejected: Vec::new(),
                    fell_back: true,
                }
            }
        };

        let outcome = if report.fell_back {
            "fallback"
        } else if report.rejected.is_empty() {
            "accepted"
        } else {
            "partial"
        };
        record_suggestion(outcome);
        info!(outcome, rules = report.expression.len(), "规则建议已生成");

        Ok(report)
    }
}
