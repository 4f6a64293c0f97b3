//! 表达式结构不变量的属性测试

use proptest::prelude::*;
use segment_engine::{
    Combinator, CustomerRecord, Expression, FieldRegistry, Rule, RuleMutation, RuleValue,
    ValueType, compile,
};

#[derive(Debug, Clone)]
enum Edit {
    Append(f64),
    Remove(usize),
    SetCombinator(usize, bool),
    ChangeField(usize, usize),
}

fn arb_edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0.0f64..50000.0).prop_map(Edit::Append),
        any::<usize>().prop_map(Edit::Remove),
        (any::<usize>(), any::<bool>()).prop_map(|(i, or)| Edit::SetCombinator(i, or)),
        (any::<usize>(), any::<usize>()).prop_map(|(i, f)| Edit::ChangeField(i, f)),
    ]
}

fn apply(expr: &mut Expression, registry: &FieldRegistry, edit: &Edit) {
    let len = expr.len();
    match edit {
        Edit::Append(value) => {
            let rule = Rule::new(registry, "spend", "gt", RuleValue::Number(*value)).unwrap();
            expr.append(rule);
        }
        Edit::Remove(i) => {
            let id = expr.rules()[i % len].id();
            let result = expr.remove(id);
            assert_eq!(result.is_err(), len == 1);
        }
        Edit::SetCombinator(i, or) => {
            let combinator = if *or { Combinator::Or } else { Combinator::And };
            let _ = expr.set_combinator(i % (len + 1), combinator);
        }
        Edit::ChangeField(i, f) => {
            let id = expr.rules()[i % len].id();
            let field = &registry.fields()[f % registry.fields().len()];
            expr.update_rule(registry, id, RuleMutation::Field(field.id.clone()))
                .unwrap();
        }
    }
}

fn arb_spend_rule_values() -> impl Strategy<Value = Vec<(f64, bool)>> {
    prop::collection::vec((0.0f64..30000.0, any::<bool>()), 1..6)
}

proptest! {
    /// 任意编辑序列后：规则数 >= 1，组合符数 = 规则数 - 1
    #[test]
    fn combinator_count_tracks_rule_count(edits in prop::collection::vec(arb_edit(), 0..40)) {
        let registry = FieldRegistry::standard();
        let mut expr = Expression::fallback(&registry);

        for edit in &edits {
            apply(&mut expr, &registry, edit);
            prop_assert!(expr.len() >= 1);
            prop_assert_eq!(expr.combinators().len(), expr.len() - 1);
        }
    }

    /// 任意编辑序列后：每条规则的操作符都属于其字段类型的操作符组
    #[test]
    fn operators_stay_in_field_group(edits in prop::collection::vec(arb_edit(), 0..40)) {
        let registry = FieldRegistry::standard();
        let mut expr = Expression::fallback(&registry);

        for edit in &edits {
            apply(&mut expr, &registry, edit);
        }

        for rule in expr.rules() {
            let field = registry.field(rule.field_id()).unwrap();
            prop_assert_eq!(field.value_type, rule.value_type());
            prop_assert!(registry.allows(field.value_type, rule.operator()));
        }
    }

    /// 谓词结果等于逐条规则结果的左折叠
    #[test]
    fn predicate_is_left_fold(rules in arb_spend_rule_values(), spend in 0.0f64..30000.0) {
        let registry = FieldRegistry::standard();
        let built: Vec<Rule> = rules
            .iter()
            .map(|(v, _)| Rule::new(&registry, "spend", "gt", RuleValue::Number(*v)).unwrap())
            .collect();
        let combinators: Vec<Combinator> = rules
            .iter()
            .skip(1)
            .map(|(_, or)| if *or { Combinator::Or } else { Combinator::And })
            .collect();
        let expr = Expression::from_parts(built, combinators.clone()).unwrap();

        let record = CustomerRecord::new().with_number("spend", spend);
        let outcomes: Vec<bool> = rules.iter().map(|(v, _)| spend > *v).collect();
        let expected = combinators
            .iter()
            .zip(&outcomes[1..])
            .fold(outcomes[0], |acc, (c, r)| c.apply(acc, *r));

        let predicate = compile(&expr);
        prop_assert_eq!(predicate.matches(&record), expected);
        prop_assert_eq!(predicate.explain(&record).matched, expected);
    }
}

#[test]
fn standard_registry_covers_every_value_type() {
    let registry = FieldRegistry::standard();
    let grouped = registry.fields_by_type();
    for vt in [ValueType::Number, ValueType::Date, ValueType::Text, ValueType::Select] {
        assert!(grouped.contains_key(&vt), "missing {vt}");
    }
}
