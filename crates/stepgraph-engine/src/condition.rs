//! Condition evaluation against run state.
//!
//! Evaluation is total: a missing field reads as `null`, and comparisons
//! between values that have no ordering evaluate to `false`. A malformed
//! condition can therefore steer traversal, but never abort it.

use std::cmp::Ordering;

use serde_json::Value;

use stepgraph_core::types::State;
use stepgraph_core::{Condition, Operator};

/// Evaluate `condition` against `state`.
pub fn evaluate(condition: &Condition, state: &State) -> bool {
    let actual = state.get(&condition.field).unwrap_or(&Value::Null);
    let expected = &condition.value;

    match condition.operator {
        Operator::Eq => values_equal(actual, expected),
        Operator::Ne => !values_equal(actual, expected),
        Operator::Gt => compare(actual, expected) == Some(Ordering::Greater),
        Operator::Lt => compare(actual, expected) == Some(Ordering::Less),
        Operator::Gte => matches!(
            compare(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lte => matches!(
            compare(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}

/// Equality with numeric coercion: `3` equals `3.0`, and booleans count as
/// `0` / `1` against numbers. Arrays and objects compare element-wise with
/// the same rule.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => x.compare(y) == Some(Ordering::Equal),
            _ => a == b,
        },
    }
}

/// Ordering between two values of comparable kinds.
///
/// Numbers and booleans compare numerically (exactly, even between integers
/// and floats), strings lexicographically, arrays element by element.
/// Anything else, `null` and objects included, has no ordering.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Array(x), Value::Array(y)) => {
            for (x, y) in x.iter().zip(y) {
                if !values_equal(x, y) {
                    return compare(x, y);
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        _ => numeric(a)?.compare(numeric(b)?),
    }
}

#[derive(Debug, Clone, Copy)]
enum Numeric {
    Int(i128),
    Float(f64),
}

fn numeric(value: &Value) -> Option<Numeric> {
    match value {
        Value::Bool(b) => Some(Numeric::Int(i128::from(*b))),
        Value::Number(n) => n
            .as_i64()
            .map(|i| Numeric::Int(i128::from(i)))
            .or_else(|| n.as_u64().map(|u| Numeric::Int(i128::from(u))))
            .or_else(|| n.as_f64().map(Numeric::Float)),
        _ => None,
    }
}

impl Numeric {
    fn compare(self, other: Numeric) -> Option<Ordering> {
        match (self, other) {
            (Numeric::Int(x), Numeric::Int(y)) => Some(x.cmp(&y)),
            (Numeric::Float(x), Numeric::Float(y)) => x.partial_cmp(&y),
            (Numeric::Int(x), Numeric::Float(y)) => int_vs_float(x, y),
            (Numeric::Float(x), Numeric::Int(y)) => int_vs_float(y, x).map(Ordering::reverse),
        }
    }
}

/// Exact comparison of an integer against a float, without rounding the
/// integer through `f64`.
fn int_vs_float(int: i128, float: f64) -> Option<Ordering> {
    // 2^127; every i64/u64 lies strictly inside (-LIMIT, LIMIT).
    const LIMIT: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

    if float.is_nan() {
        return None;
    }
    if float >= LIMIT {
        return Some(Ordering::Less);
    }
    if float < -LIMIT {
        return Some(Ordering::Greater);
    }

    let whole = float.trunc();
    // `whole` is integral and in range, so the cast is exact.
    match int.cmp(&(whole as i128)) {
        Ordering::Equal => 0.0f64.partial_cmp(&(float - whole)),
        ord => Some(ord),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(pairs: &[(&str, Value)]) -> State {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn cond(op: Operator, value: Value) -> Condition {
        Condition::new("x", op, value)
    }

    #[test]
    fn test_numeric_operators() {
        let s = state(&[("x", json!(5))]);
        assert!(evaluate(&cond(Operator::Eq, json!(5)), &s));
        assert!(evaluate(&cond(Operator::Ne, json!(4)), &s));
        assert!(evaluate(&cond(Operator::Gt, json!(4)), &s));
        assert!(!evaluate(&cond(Operator::Gt, json!(5)), &s));
        assert!(evaluate(&cond(Operator::Gte, json!(5)), &s));
        assert!(evaluate(&cond(Operator::Lt, json!(5.5)), &s));
        assert!(evaluate(&cond(Operator::Lte, json!(5)), &s));
        assert!(!evaluate(&cond(Operator::Lte, json!(4.99)), &s));
    }

    #[test]
    fn test_integer_and_float_are_equal() {
        let s = state(&[("x", json!(3))]);
        assert!(evaluate(&cond(Operator::Eq, json!(3.0)), &s));
        assert!(!evaluate(&cond(Operator::Ne, json!(3.0)), &s));
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        let s = state(&[("x", json!(u64::MAX))]);
        assert!(evaluate(&cond(Operator::Gt, json!(u64::MAX - 1)), &s));
        let s = state(&[("x", json!(i64::MIN))]);
        assert!(evaluate(&cond(Operator::Lt, json!(i64::MIN + 1)), &s));
    }

    #[test]
    fn test_string_operators() {
        let s = state(&[("x", json!("beta"))]);
        assert!(evaluate(&cond(Operator::Eq, json!("beta")), &s));
        assert!(evaluate(&cond(Operator::Gt, json!("alpha")), &s));
        assert!(evaluate(&cond(Operator::Lt, json!("gamma")), &s));
    }

    #[test]
    fn test_type_mismatch_is_false() {
        let s = state(&[("x", json!("high"))]);
        assert!(!evaluate(&cond(Operator::Gt, json!(10)), &s));
        assert!(!evaluate(&cond(Operator::Lt, json!(10)), &s));
        assert!(!evaluate(&cond(Operator::Gte, json!(10)), &s));
        assert!(!evaluate(&cond(Operator::Lte, json!(10)), &s));
        // Equality across types is well defined: simply unequal.
        assert!(!evaluate(&cond(Operator::Eq, json!(10)), &s));
        assert!(evaluate(&cond(Operator::Ne, json!(10)), &s));
    }

    #[test]
    fn test_missing_field_reads_as_null() {
        let s = State::new();
        assert!(evaluate(&cond(Operator::Eq, Value::Null), &s));
        assert!(evaluate(&cond(Operator::Ne, json!(1)), &s));
        assert!(!evaluate(&cond(Operator::Eq, json!(1)), &s));
        assert!(!evaluate(&cond(Operator::Lt, json!(70)), &s));
        assert!(!evaluate(&cond(Operator::Gte, json!(70)), &s));
    }

    #[test]
    fn test_structured_values() {
        let s = state(&[("x", json!({"a": [1, 2]}))]);
        assert!(evaluate(&cond(Operator::Eq, json!({"a": [1, 2]})), &s));
        assert!(!evaluate(&cond(Operator::Gt, json!({"a": [1]})), &s));
    }

    #[test]
    fn test_booleans() {
        let s = state(&[("x", json!(true))]);
        assert!(evaluate(&cond(Operator::Eq, json!(true)), &s));
        assert!(evaluate(&cond(Operator::Gt, json!(false)), &s));
        assert!(!evaluate(&cond(Operator::Eq, json!("true")), &s));
    }

    #[test]
    fn test_booleans_count_as_zero_and_one() {
        let s = state(&[("x", json!(true))]);
        assert!(evaluate(&cond(Operator::Eq, json!(1)), &s));
        assert!(evaluate(&cond(Operator::Eq, json!(1.0)), &s));
        assert!(evaluate(&cond(Operator::Gt, json!(0)), &s));
        assert!(evaluate(&cond(Operator::Lt, json!(1.5)), &s));
        assert!(!evaluate(&cond(Operator::Eq, json!(2)), &s));

        let s = state(&[("x", json!(0))]);
        assert!(evaluate(&cond(Operator::Eq, json!(false)), &s));
        assert!(evaluate(&cond(Operator::Lt, json!(true)), &s));
    }

    #[test]
    fn test_nested_equality_coerces_numbers() {
        let s = state(&[("x", json!({"a": 3, "b": [1, true]}))]);
        assert!(evaluate(&cond(Operator::Eq, json!({"a": 3.0, "b": [1.0, 1]})), &s));
        assert!(!evaluate(&cond(Operator::Eq, json!({"a": 3.5, "b": [1, true]})), &s));
        assert!(!evaluate(&cond(Operator::Eq, json!({"a": 3})), &s));
        assert!(evaluate(&cond(Operator::Ne, json!({"a": 3, "c": [1, true]})), &s));
    }

    #[test]
    fn test_integer_against_float_is_exact() {
        // 2^53 + 1 has no f64 representation; it must not round onto 2^53.
        let s = state(&[("x", json!(9_007_199_254_740_993_i64))]);
        assert!(!evaluate(&cond(Operator::Eq, json!(9_007_199_254_740_992.0)), &s));
        assert!(evaluate(&cond(Operator::Gt, json!(9_007_199_254_740_992.0)), &s));
        assert!(evaluate(&cond(Operator::Ne, json!(9_007_199_254_740_992.0)), &s));

        let s = state(&[("x", json!(u64::MAX))]);
        assert!(evaluate(&cond(Operator::Lt, json!(1e30)), &s));
        assert!(evaluate(&cond(Operator::Gt, json!(-1e300)), &s));

        let s = state(&[("x", json!(-3))]);
        assert!(evaluate(&cond(Operator::Lt, json!(-2.5)), &s));
        assert!(evaluate(&cond(Operator::Gt, json!(-3.5)), &s));
        assert!(evaluate(&cond(Operator::Gte, json!(-3.0)), &s));
    }

    #[test]
    fn test_arrays_order_element_wise() {
        let s = state(&[("x", json!([1, 2]))]);
        assert!(evaluate(&cond(Operator::Lt, json!([1, 3])), &s));
        assert!(evaluate(&cond(Operator::Gt, json!([1])), &s));
        assert!(evaluate(&cond(Operator::Lte, json!([1.0, 2.0])), &s));
        assert!(!evaluate(&cond(Operator::Lt, json!([1, "a"])), &s));
    }
}
