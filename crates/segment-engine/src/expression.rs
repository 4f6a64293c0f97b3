//! 规则表达式
//!
//! 有序的规则列表，相邻两条规则之间由一个组合符连接：
//! `[r0, r1, ..., rn]` 对应 `[c0, ..., c(n-1)]`，`ci` 连接 `ri` 与 `r(i+1)`。
//! 规则数始终 >= 1，组合符数始终等于规则数 - 1。所有编辑操作要么整体成功，
//! 要么不改变表达式。

use crate::error::{Result, SegmentError, ValidationError};
use crate::models::ExpressionDocument;
use crate::operators::Combinator;
use crate::registry::FieldRegistry;
use crate::rule::{Rule, RuleId, RuleMutation};
use std::fmt;

/// 规则表达式
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    rules: Vec<Rule>,
    combinators: Vec<Combinator>,
}

impl Expression {
    /// 单条规则的表达式
    pub fn new(rule: Rule) -> Self {
        Self {
            rules: vec![rule],
            combinators: Vec::new(),
        }
    }

    /// 默认表达式：单条兜底规则（Number 字段 gt 0）
    pub fn fallback(registry: &FieldRegistry) -> Self {
        Self::new(Rule::fallback(registry))
    }

    /// 由规则列表构建，组合符统一为 AND
    pub fn from_rules(rules: Vec<Rule>) -> std::result::Result<Self, ValidationError> {
        if rules.is_empty() {
            return Err(ValidationError::EmptyExpression);
        }
        let combinators = vec![Combinator::And; rules.len() - 1];
        Ok(Self { rules, combinators })
    }

    /// 由规则与组合符构建，校验长度关系
    pub fn from_parts(
        rules: Vec<Rule>,
        combinators: Vec<Combinator>,
    ) -> std::result::Result<Self, ValidationError> {
        if rules.is_empty() {
            return Err(ValidationError::EmptyExpression);
        }
        if combinators.len() != rules.len() - 1 {
            return Err(ValidationError::CombinatorMismatch {
                rules: rules.len(),
                expected: rules.len() - 1,
                actual: combinators.len(),
            });
        }
        Ok(Self { rules, combinators })
    }

    /// 从持久化文档重建，每条规则按注册表重新校验
    pub fn from_document(doc: &ExpressionDocument, registry: &FieldRegistry) -> Result<Self> {
        let rules = doc
            .rules
            .iter()
            .map(|wire| Rule::from_wire(registry, wire))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let expression = match &doc.combinators {
            Some(combinators) => Self::from_parts(rules, combinators.clone())?,
            None => Self::from_rules(rules)?,
        };
        Ok(expression)
    }

    /// 转换为持久化文档（组合符逐对保存）
    pub fn to_document(&self) -> ExpressionDocument {
        ExpressionDocument {
            rules: self.rules.iter().map(Rule::to_wire).collect(),
            combinators: Some(self.combinators.clone()),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn combinators(&self) -> &[Combinator] {
        &self.combinators
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 表达式至少包含一条规则，恒为 false
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id() == id)
    }

    fn position(&self, id: RuleId) -> Result<usize> {
        self.rules
            .iter()
            .position(|r| r.id() == id)
            .ok_or(SegmentError::RuleNotFound(id))
    }

    /// 追加规则，非空时同时追加一个默认 AND 组合符
    pub fn append(&mut self, rule: Rule) {
        if !self.rules.is_empty() {
            self.combinators.push(Combinator::And);
        }
        self.rules.push(rule);
    }

    /// 删除规则
    ///
    /// 同时删除紧邻其前的组合符；删除的是首条规则时删除其后的组合符。
    pub fn remove(&mut self, id: RuleId) -> Result<Rule> {
        let index = self.position(id)?;
        if self.rules.len() == 1 {
            return Err(SegmentError::CannotRemoveLastRule);
        }

        let combinator_index = index.saturating_sub(1);
        self.combinators.remove(combinator_index);
        Ok(self.rules.remove(index))
    }

    /// 修改规则的字段、操作符或值，组合符不受影响
    pub fn update_rule(
        &mut self,
        registry: &FieldRegistry,
        id: RuleId,
        mutation: RuleMutation,
    ) -> Result<()> {
        let index = self.position(id)?;
        self.rules[index].apply(registry, mutation)?;
        Ok(())
    }

    /// 设置第 index 个组合符，index 必须在 [0, len - 2] 内
    pub fn set_combinator(&mut self, index: usize, combinator: Combinator) -> Result<()> {
        match self.combinators.get_mut(index) {
            Some(slot) => {
                *slot = combinator;
                Ok(())
            }
            None => Err(SegmentError::IndexOutOfRange {
                index,
                len: self.rules.len(),
            }),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", self.combinators[i - 1])?;
            }
            write!(f, "{}", rule)?;
        }
        Ok(())
    }
}
