use serde_json::Value;
use tracing::warn;

use crate::models::workflow::{ConditionClause, Operator};

/// Evaluates a workflow's condition clauses against the trigger data.
///
/// Clauses are ANDed in order with a short-circuit on the first
/// unsatisfied clause; an empty list is vacuously satisfied. Pure and
/// side-effect free, so safe to call concurrently.
pub fn evaluate_conditions(conditions: &[ConditionClause], data: &Value) -> bool {
    for clause in conditions {
        let field_value = resolve_path(data, &clause.field);
        let met = match clause.operator {
            Operator::Equals => loosely_equal(&field_value, &clause.value),
            Operator::NotEquals => !loosely_equal(&field_value, &clause.value),
            Operator::GreaterThan => compare_order(&field_value, &clause.value, Ordering::Greater),
            Operator::LessThan => compare_order(&field_value, &clause.value, Ordering::Less),
            Operator::Contains => {
                coerce_string(&field_value).contains(&coerce_string(&clause.value))
            }
            Operator::In => clause
                .value
                .as_array()
                .is_some_and(|options| options.iter().any(|v| loosely_equal(v, &field_value))),
            Operator::Unknown => {
                // Fail-open on purpose: an operator this version does not
                // recognize must not silently disable the workflow.
                warn!(field = %clause.field, "Unknown condition operator; treating clause as satisfied");
                true
            }
        };
        if !met {
            return false;
        }
    }
    true
}

/// Dot-path traversal into the trigger data. A missing segment resolves to
/// `Null`, which then participates in the operator semantics like any other
/// value.
fn resolve_path(data: &Value, path: &str) -> Value {
    let mut current = data;
    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }
        let next = match current {
            Value::Object(map) => map.get(part),
            Value::Array(arr) => part.parse::<usize>().ok().and_then(|idx| arr.get(idx)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Value::Null,
        }
    }
    current.clone()
}

/// Loose equality in the spirit of the dynamic comparison the workflow
/// format was designed around: numbers, numeric strings and bools
/// cross-compare through f64 coercion, everything else through string
/// coercion.
fn loosely_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Null, Value::Null) => true,
        _ => {
            if left == right {
                return true;
            }
            if let (Some(a), Some(b)) = (value_as_f64(left), value_as_f64(right)) {
                return a == b;
            }
            match (left, right) {
                (Value::Null, _) | (_, Value::Null) => false,
                _ => coerce_string(left) == coerce_string(right),
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Ordering {
    Greater,
    Less,
}

fn compare_order(left: &Value, right: &Value, ordering: Ordering) -> bool {
    if let (Some(a), Some(b)) = (value_as_f64(left), value_as_f64(right)) {
        return match ordering {
            Ordering::Greater => a > b,
            Ordering::Less => a < b,
        };
    }
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return match ordering {
            Ordering::Greater => a > b,
            Ordering::Less => a < b,
        };
    }
    false
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(true) => Some(1.0),
        Value::Bool(false) => Some(0.0),
        _ => None,
    }
}

/// String coercion used by `contains`: arrays join their elements with `,`,
/// null coerces to the empty string.
fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(coerce_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}
