//! 谓词编译器
//!
//! 将规则表达式编译成针对单个客户记录的纯函数。组合符严格从左到右折叠，
//! 没有运算符优先级：`r0 c0 r1 c1 r2` 按 `((r0 c0 r1) c1 r2)` 求值。

use crate::evaluator::{ConditionEvaluator, ConditionTest};
use crate::expression::Expression;
use crate::models::{CustomerRecord, RuleValue};
use crate::operators::{Combinator, Operator};
use crate::registry::ValueType;
use crate::rule::Rule;
use std::collections::HashSet;

/// 编译后的单条规则
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    field: String,
    test: ConditionTest,
    label: String,
}

impl CompiledCondition {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn test(&self) -> &ConditionTest {
        &self.test
    }

    #[inline]
    pub fn matches(&self, record: &CustomerRecord) -> bool {
        ConditionEvaluator::evaluate(record.get(&self.field), &self.test)
    }
}

/// 编译后的谓词
#[derive(Debug, Clone)]
pub struct CompiledPredicate {
    conditions: Vec<CompiledCondition>,
    combinators: Vec<Combinator>,
    /// 谓词中使用的所有字段
    pub required_fields: HashSet<String>,
}

/// 单条记录的评估追踪
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationTrace {
    pub matched: bool,
    /// 每条规则各自的结果（按规则顺序）
    pub rule_outcomes: Vec<bool>,
    pub trace: Vec<String>,
}

impl CompiledPredicate {
    pub fn conditions(&self) -> &[CompiledCondition] {
        &self.conditions
    }

    /// 判断记录是否满足谓词
    ///
    /// 左折叠中累计值已能决定结果时跳过右侧规则（AND 遇 false、OR 遇 true）。
    pub fn matches(&self, record: &CustomerRecord) -> bool {
        let mut acc = self.conditions[0].matches(record);

        for (combinator, condition) in self.combinators.iter().zip(&self.conditions[1..]) {
            acc = match combinator {
                Combinator::And if !acc => false,
                Combinator::Or if acc => true,
                _ => condition.matches(record),
            };
        }

        acc
    }

    /// 评估记录并记录每一步
    pub fn explain(&self, record: &CustomerRecord) -> EvaluationTrace {
        let rule_outcomes: Vec<bool> = self.conditions.iter().map(|c| c.matches(record)).collect();
        let mut trace = Vec::with_capacity(rule_outcomes.len() * 2);

        let mut acc = rule_outcomes[0];
        trace.push(format!("[0] {} => {}", self.conditions[0].label, outcome(acc)));

        for (i, combinator) in self.combinators.iter().enumerate() {
            let right = rule_outcomes[i + 1];
            trace.push(format!(
                "[{}] {} => {}",
                i + 1,
                self.conditions[i + 1].label,
                outcome(right)
            ));

            let folded = combinator.apply(acc, right);
            trace.push(format!(
                "fold: {} {} {} => {}",
                outcome(acc),
                combinator,
                outcome(right),
                outcome(folded)
            ));
            acc = folded;
        }

        EvaluationTrace {
            matched: acc,
            rule_outcomes,
            trace,
        }
    }

    /// 转换为闭包形式的谓词
    pub fn into_fn(self) -> impl Fn(&CustomerRecord) -> bool + Send + Sync {
        move |record| self.matches(record)
    }
}

fn outcome(matched: bool) -> &'static str {
    if matched { "MATCHED" } else { "NOT_MATCHED" }
}

/// 编译表达式
///
/// 表达式中的规则在构造时已完成校验，编译不会失败。
pub fn compile(expression: &Expression) -> CompiledPredicate {
    let conditions: Vec<CompiledCondition> = expression.rules().iter().map(compile_rule).collect();
    let required_fields = conditions.iter().map(|c| c.field.clone()).collect();

    CompiledPredicate {
        conditions,
        combinators: expression.combinators().to_vec(),
        required_fields,
    }
}

fn compile_rule(rule: &Rule) -> CompiledCondition {
    CompiledCondition {
        field: rule.field_id().to_string(),
        test: condition_test(rule.value_type(), rule.operator(), rule.value()),
        label: rule.to_string(),
    }
}

/// 按字段类型确定操作符语义
fn condition_test(value_type: ValueType, operator: Operator, value: &RuleValue) -> ConditionTest {
    match (value_type, operator, value) {
        (ValueType::Number, op, RuleValue::Number(n)) => match op {
            Operator::Gt => ConditionTest::NumberGt(*n),
            Operator::Gte => ConditionTest::NumberGte(*n),
            Operator::Lt => ConditionTest::NumberLt(*n),
            Operator::Lte => ConditionTest::NumberLte(*n),
            _ => ConditionTest::NumberEq(*n),
        },
        (ValueType::Date, Operator::Between, RuleValue::DateRange { start, end }) => {
            ConditionTest::DateBetween {
                start: *start,
                end: *end,
            }
        }
        (ValueType::Date, Operator::After, RuleValue::Date(d)) => ConditionTest::DateAfter(*d),
        (ValueType::Date, _, RuleValue::Date(d)) => ConditionTest::DateBefore(*d),
        (ValueType::Text, op, RuleValue::Text(s)) => {
            let needle = s.to_lowercase();
            match op {
                Operator::Contains => ConditionTest::TextContains(needle),
                Operator::StartsWith => ConditionTest::TextStartsWith(needle),
                Operator::EndsWith => ConditionTest::TextEndsWith(needle),
                _ => ConditionTest::TextEq(needle),
            }
        }
        (ValueType::Select, Operator::Neq, RuleValue::Text(s)) => {
            ConditionTest::SelectNeq(s.clone())
        }
        (ValueType::Select, _, RuleValue::Text(s)) => ConditionTest::SelectEq(s.clone()),
        // Rule 构造保证类型组合合法，这里不会到达
        (_, _, other) => unreachable!("规则值类型与字段类型不一致: {:?}", other),
    }
}
