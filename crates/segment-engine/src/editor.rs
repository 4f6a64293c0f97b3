//! 客群编辑会话
//!
//! 一个会话独占自己的草稿，所有编辑按顺序依次生效。
//! 每次被接受的表达式编辑都会发起一次人数重算，只有最新一次的结果会被观察到。
//! 重算通过 `tokio::spawn` 执行，`new` 与各表达式编辑方法必须在 tokio 运行时中调用。

use crate::audience::{AudienceState, AudienceTracker};
use crate::error::Result;
use crate::expression::Expression;
use crate::lifecycle::{SegmentDraft, SegmentManager};
use crate::models::Segment;
use crate::operators::Combinator;
use crate::rule::{Rule, RuleId, RuleMutation};
use crate::suggestion::{RuleAssistant, ValidationReport};
use std::sync::Arc;
use tracing::debug;

/// 客群编辑器
pub struct SegmentEditor {
    manager: Arc<SegmentManager>,
    /// 首次保存前为 None
    segment_id: Option<String>,
    name: String,
    description: String,
    expression: Expression,
    audience: AudienceTracker,
}

impl SegmentEditor {
    /// 新建草稿，使用默认表达式并立即计算人数
    ///
    /// # Panics
    ///
    /// 不在 tokio 运行时中调用时 panic（首次重算需要 spawn）。
    pub fn new(manager: Arc<SegmentManager>) -> Self {
        let expression = Expression::fallback(manager.registry());
        let editor = Self {
            manager,
            segment_id: None,
            name: String::new(),
            description: String::new(),
            expression,
            audience: AudienceTracker::new(),
        };
        editor.recompute();
        editor
    }

    /// 打开已保存的客群，人数取存储中的值
    pub async fn open(manager: Arc<SegmentManager>, id: &str) -> Result<Self> {
        let segment = manager.get(id).await?;
        Ok(Self {
            manager,
            segment_id: Some(segment.id),
            name: segment.name,
            description: segment.description,
            expression: segment.expression,
            audience: AudienceTracker::with_count(segment.customer_count),
        })
    }

    pub fn segment_id(&self) -> Option<&str> {
        self.segment_id.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// 追加一条默认规则，返回其 ID
    pub fn append_rule(&mut self) -> RuleId {
        let rule = Rule::fallback(self.manager.registry());
        let id = rule.id();
        self.push_rule(rule);
        id
    }

    /// 追加规则并发起重算，需在 tokio 运行时中调用
    pub fn push_rule(&mut self, rule: Rule) {
        self.expression.append(rule);
        self.recompute();
    }

    pub fn remove_rule(&mut self, id: RuleId) -> Result<()> {
        self.expression.remove(id)?;
        self.recompute();
        Ok(())
    }

    pub fn update_rule(&mut self, id: RuleId, mutation: RuleMutation) -> Result<()> {
        let registry = Arc::clone(self.manager.registry());
        self.expression.update_rule(&registry, id, mutation)?;
        self.recompute();
        Ok(())
    }

    pub fn set_combinator(&mut self, index: usize, combinator: Combinator) -> Result<()> {
        self.expression.set_combinator(index, combinator)?;
        self.recompute();
        Ok(())
    }

    pub fn replace_expression(&mut self, expression: Expression) {
        self.expression = expression;
        self.recompute();
    }

    /// 用建议结果替换整个表达式
    ///
    /// 建议服务不可用时同样会得到兜底表达式；只有空请求会返回错误且不改变草稿。
    pub async fn apply_suggestion(
        &mut self,
        assistant: &RuleAssistant,
        request: &str,
    ) -> Result<ValidationReport> {
        let report = assistant.suggest_expression(request).await?;
        self.replace_expression(report.expression.clone());
        Ok(report)
    }

    /// 当前人数状态（可能仍在计算中）
    pub fn audience(&self) -> AudienceState {
        self.audience.current()
    }

    /// 等待最近一次重算结束
    pub async fn settled_audience(&self) -> AudienceState {
        self.audience.settled().await
    }

    pub fn audience_tracker(&self) -> &AudienceTracker {
        &self.audience
    }

    /// 保存草稿：首次保存创建客群，之后更新
    ///
    /// 失败时草稿与已知人数保持不变，可以修改后再次保存。
    pub async fn save(&mut self) -> Result<Segment> {
        let draft = SegmentDraft::new(&self.name, &self.description, self.expression.clone());

        let segment = match &self.segment_id {
            Some(id) => self.manager.update(id, &draft).await?,
            None => self.manager.create(&draft).await?,
        };

        self.segment_id = Some(segment.id.clone());
        self.name = segment.name.clone();
        self.description = segment.description.clone();
        Ok(segment)
    }

    fn recompute(&self) {
        let manager = Arc::clone(&self.manager);
        let expression = self.expression.clone();
        let generation = self
            .audience
            .issue(async move { manager.compute_audience(&expression).await });
        debug!(generation, "已发起人数重算");
    }
}
