//! 条件评估器与客群人数计算
//!
//! 实现各操作符在不同值类型下的比较语义，以及对整个客户群体的精确计数。

use crate::compiler::CompiledPredicate;
use crate::models::{CustomerRecord, FieldValue};
use chrono::NaiveDate;
use std::time::Instant;
use tracing::debug;

/// 编译后的单条件测试
///
/// Text 类测试的期望值在编译时已转为小写。
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionTest {
    NumberEq(f64),
    NumberGt(f64),
    NumberGte(f64),
    NumberLt(f64),
    NumberLte(f64),
    DateBefore(NaiveDate),
    DateAfter(NaiveDate),
    DateBetween { start: NaiveDate, end: NaiveDate },
    TextEq(String),
    TextContains(String),
    TextStartsWith(String),
    TextEndsWith(String),
    SelectEq(String),
    SelectNeq(String),
}

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件
    ///
    /// 字段缺失或类型不符时返回 false，而不是报错：
    /// 缺少被筛选属性的客户会被引用该属性的任何规则排除。
    pub fn evaluate(field_value: Option<&FieldValue>, test: &ConditionTest) -> bool {
        let Some(field_value) = field_value else {
            return false;
        };

        match (test, field_value) {
            (ConditionTest::NumberEq(rhs), FieldValue::Number(lhs)) => lhs == rhs,
            (ConditionTest::NumberGt(rhs), FieldValue::Number(lhs)) => lhs > rhs,
            (ConditionTest::NumberGte(rhs), FieldValue::Number(lhs)) => lhs >= rhs,
            (ConditionTest::NumberLt(rhs), FieldValue::Number(lhs)) => lhs < rhs,
            (ConditionTest::NumberLte(rhs), FieldValue::Number(lhs)) => lhs <= rhs,

            (ConditionTest::DateBefore(rhs), FieldValue::Date(lhs)) => lhs < rhs,
            (ConditionTest::DateAfter(rhs), FieldValue::Date(lhs)) => lhs > rhs,
            (ConditionTest::DateBetween { start, end }, FieldValue::Date(lhs)) => {
                lhs >= start && lhs <= end
            }

            (ConditionTest::TextEq(needle), FieldValue::Text(haystack)) => {
                haystack.to_lowercase() == *needle
            }
            (ConditionTest::TextContains(needle), FieldValue::Text(haystack)) => {
                haystack.to_lowercase().contains(needle.as_str())
            }
            (ConditionTest::TextStartsWith(needle), FieldValue::Text(haystack)) => {
                haystack.to_lowercase().starts_with(needle.as_str())
            }
            (ConditionTest::TextEndsWith(needle), FieldValue::Text(haystack)) => {
                haystack.to_lowercase().ends_with(needle.as_str())
            }

            (ConditionTest::SelectEq(expected), FieldValue::Text(actual)) => actual == expected,
            (ConditionTest::SelectNeq(expected), FieldValue::Text(actual)) => actual != expected,

            _ => false,
        }
    }
}

/// 客群人数评估器
pub struct AudienceEvaluator;

impl AudienceEvaluator {
    /// 返回满足谓词的客户数量
    ///
    /// 对整个群体做一次完整遍历，结果确定，不采样。
    pub fn count(predicate: &CompiledPredicate, population: &[CustomerRecord]) -> u64 {
        let start = Instant::now();

        let count = population.iter().filter(|r| predicate.matches(r)).count() as u64;

        let elapsed = start.elapsed();
        crm_shared::observability::metrics::record_audience_evaluation(
            population.len(),
            elapsed.as_secs_f64(),
        );
        debug!(
            population = population.len(),
            matched = count,
            elapsed_us = elapsed.as_micros() as u64,
            "客群人数计算完成"
        );

        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn num(v: f64) -> FieldValue {
        FieldValue::Number(v)
    }

    fn text(v: &str) -> FieldValue {
        FieldValue::Text(v.to_string())
    }

    #[test]
    fn test_numeric_comparisons() {
        assert!(ConditionEvaluator::evaluate(Some(&num(100.0)), &ConditionTest::NumberGt(50.0)));
        assert!(!ConditionEvaluator::evaluate(Some(&num(100.0)), &ConditionTest::NumberGt(100.0)));
        assert!(ConditionEvaluator::evaluate(Some(&num(100.0)), &ConditionTest::NumberGte(100.0)));
        assert!(ConditionEvaluator::evaluate(Some(&num(50.0)), &ConditionTest::NumberLt(100.0)));
        assert!(ConditionEvaluator::evaluate(Some(&num(100.0)), &ConditionTest::NumberLte(100.0)));
        assert!(ConditionEvaluator::evaluate(Some(&num(15.0)), &ConditionTest::NumberEq(15.0)));
        assert!(!ConditionEvaluator::evaluate(Some(&num(15.5)), &ConditionTest::NumberEq(15.0)));
    }

    #[test]
    fn test_number_eq_is_exact() {
        assert!(!ConditionEvaluator::evaluate(Some(&num(1e-17)), &ConditionTest::NumberEq(0.0)));
        assert!(!ConditionEvaluator::evaluate(Some(&num(-1e-300)), &ConditionTest::NumberEq(0.0)));
        assert!(ConditionEvaluator::evaluate(Some(&num(-0.0)), &ConditionTest::NumberEq(0.0)));
    }

    #[test]
    fn test_date_comparisons_are_strict() {
        let d = date(2025, 2, 1);
        let same_day = FieldValue::Date(d);
        assert!(!ConditionEvaluator::evaluate(Some(&same_day), &ConditionTest::DateBefore(d)));
        assert!(!ConditionEvaluator::evaluate(Some(&same_day), &ConditionTest::DateAfter(d)));
        assert!(ConditionEvaluator::evaluate(
            Some(&FieldValue::Date(date(2025, 1, 31))),
            &ConditionTest::DateBefore(d)
        ));
        assert!(ConditionEvaluator::evaluate(
            Some(&FieldValue::Date(date(2025, 2, 2))),
            &ConditionTest::DateAfter(d)
        ));
    }

    #[test]
    fn test_between_is_inclusive() {
        let test = ConditionTest::DateBetween {
            start: date(2025, 1, 1),
            end: date(2025, 1, 31),
        };
        assert!(ConditionEvaluator::evaluate(Some(&FieldValue::Date(date(2025, 1, 1))), &test));
        assert!(ConditionEvaluator::evaluate(Some(&FieldValue::Date(date(2025, 1, 31))), &test));
        assert!(!ConditionEvaluator::evaluate(Some(&FieldValue::Date(date(2025, 2, 1))), &test));
        assert!(!ConditionEvaluator::evaluate(Some(&FieldValue::Date(date(2024, 12, 31))), &test));
    }

    #[test]
    fn test_text_is_case_insensitive() {
        assert!(ConditionEvaluator::evaluate(
            Some(&text("Acme Corp")),
            &ConditionTest::TextEq("acme corp".to_string())
        ));
        assert!(ConditionEvaluator::evaluate(
            Some(&text("Acme Corp")),
            &ConditionTest::TextContains("me co".to_string())
        ));
        assert!(ConditionEvaluator::evaluate(
            Some(&text("Acme Corp")),
            &ConditionTest::TextStartsWith("acme".to_string())
        ));
        assert!(ConditionEvaluator::evaluate(
            Some(&text("Acme Corp")),
            &ConditionTest::TextEndsWith("corp".to_string())
        ));
        assert!(!ConditionEvaluator::evaluate(
            Some(&text("Acme Corp")),
            &ConditionTest::TextEq("acme".to_string())
        ));
    }

    #[test]
    fn test_select_is_exact() {
        assert!(ConditionEvaluator::evaluate(
            Some(&text("Active")),
            &ConditionTest::SelectEq("Active".to_string())
        ));
        assert!(!ConditionEvaluator::evaluate(
            Some(&text("active")),
            &ConditionTest::SelectEq("Active".to_string())
        ));
        assert!(ConditionEvaluator::evaluate(
            Some(&text("Inactive")),
            &ConditionTest::SelectNeq("Active".to_string())
        ));
    }

    #[test]
    fn test_missing_field() {
        assert!(!ConditionEvaluator::evaluate(None, &ConditionTest::NumberGt(0.0)));
        // 缺失字段对否定型操作符同样为 false
        assert!(!ConditionEvaluator::evaluate(
            None,
            &ConditionTest::SelectNeq("Active".to_string())
        ));
    }

    #[test]
    fn test_type_mismatch_is_false() {
        assert!(!ConditionEvaluator::evaluate(Some(&text("100")), &ConditionTest::NumberGt(50.0)));
        assert!(!ConditionEvaluator::evaluate(
            Some(&num(1.0)),
            &ConditionTest::DateBefore(date(2025, 1, 1))
        ));
    }
}
