//! Declarative predicate filtering for queries
//!
//! Filters documents strictly according to predicates.
//! No type coercion between document values, exact match only.
//! Operands are either literals or parameters bound in the query context;
//! parameters arrive as strings from path segments and are parsed into the
//! declared type before comparison.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::binder::Document;

use super::context::QueryContext;
use super::errors::{FilterError, FilterResult};

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    /// Equal
    Eq,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
}

/// Declared type of a bound parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// Compared as a string
    #[default]
    String,
    /// Parsed as a JSON number
    Number,
    /// Parsed as `true` / `false`
    Bool,
}

impl ParamKind {
    fn label(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Bool => "bool",
        }
    }
}

/// Right-hand side of a predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    /// Value taken from the query context
    Param {
        /// Parameter name
        param: String,
        /// Declared type
        #[serde(default, rename = "type")]
        kind: ParamKind,
    },
    /// Fixed value
    Literal {
        /// The value
        value: Value,
    },
}

/// A single field comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Top-level field name
    pub field: String,
    /// Operator
    pub op: CompareOp,
    /// Right-hand side
    #[serde(flatten)]
    pub operand: Operand,
}

impl Predicate {
    /// Compare a field against a literal
    pub fn literal(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            operand: Operand::Literal {
                value: value.into(),
            },
        }
    }

    /// Compare a field against a bound parameter
    pub fn param(field: impl Into<String>, op: CompareOp, param: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            field: field.into(),
            op,
            operand: Operand::Param {
                param: param.into(),
                kind,
            },
        }
    }
}

/// Evaluates predicates against documents
pub struct PredicateFilter;

impl PredicateFilter {
    /// Checks if a document matches all predicates (AND semantics)
    pub fn matches(document: &Document, predicates: &[Predicate], ctx: &QueryContext) -> FilterResult<bool> {
        for predicate in predicates {
            if !Self::matches_predicate(document, predicate, ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Checks if a document matches a single predicate
    fn matches_predicate(document: &Document, predicate: &Predicate, ctx: &QueryContext) -> FilterResult<bool> {
        let bound = Self::resolve(&predicate.operand, ctx)?;

        let field_value = match document.get(&predicate.field) {
            Some(v) => v,
            None => return Ok(false), // Missing field = no match
        };

        // Null values never match
        if field_value.is_null() {
            return Ok(false);
        }

        let matched = match predicate.op {
            CompareOp::Eq => match (field_value, &bound) {
                (Value::Number(_), Value::Number(_)) => {
                    Self::compare(field_value, &bound) == Some(Ordering::Equal)
                }
                _ => field_value == &bound,
            },
            CompareOp::Gt => Self::compare(field_value, &bound) == Some(Ordering::Greater),
            CompareOp::Gte => matches!(
                Self::compare(field_value, &bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            CompareOp::Lt => Self::compare(field_value, &bound) == Some(Ordering::Less),
            CompareOp::Lte => matches!(
                Self::compare(field_value, &bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
        };
        Ok(matched)
    }

    /// Ordering between two values of the same kind (numbers or strings only)
    fn compare(actual: &Value, bound: &Value) -> Option<Ordering> {
        match (actual, bound) {
            (Value::Number(a), Value::Number(b)) => {
                if let (Some(ai), Some(bi)) = (a.as_i64(), b.as_i64()) {
                    return Some(ai.cmp(&bi));
                }
                a.as_f64()?.partial_cmp(&b.as_f64()?)
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Resolve an operand to a concrete value
    fn resolve(operand: &Operand, ctx: &QueryContext) -> FilterResult<Value> {
        match operand {
            Operand::Literal { value } => Ok(value.clone()),
            Operand::Param { param, kind } => {
                let raw = ctx
                    .param(param)
                    .ok_or_else(|| FilterError::MissingParam(param.clone()))?;
                Self::coerce_param(param, raw, *kind)
            }
        }
    }

    fn coerce_param(param: &str, raw: &Value, kind: ParamKind) -> FilterResult<Value> {
        let mismatch = || FilterError::ParamType {
            param: param.to_string(),
            expected: kind.label(),
        };
        match (kind, raw) {
            (ParamKind::String, Value::String(_))
            | (ParamKind::Number, Value::Number(_))
            | (ParamKind::Bool, Value::Bool(_)) => Ok(raw.clone()),
            (ParamKind::Number, Value::String(s)) => {
                if let Ok(i) = s.parse::<i64>() {
                    return Ok(Value::from(i));
                }
                s.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(mismatch)
            }
            (ParamKind::Bool, Value::String(s)) => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order() -> Document {
        Document::from_value(json!({
            "id": "o-1",
            "customer": "c-7",
            "total": 120,
            "rush": true,
            "note": null
        }))
        .unwrap()
    }

    fn ctx(params: Value) -> QueryContext {
        QueryContext::new(Document::from_value(params).unwrap())
    }

    #[test]
    fn test_literal_equality() {
        let p = vec![Predicate::literal("customer", CompareOp::Eq, "c-7")];
        assert!(PredicateFilter::matches(&order(), &p, &ctx(json!({}))).unwrap());

        let p = vec![Predicate::literal("customer", CompareOp::Eq, "c-8")];
        assert!(!PredicateFilter::matches(&order(), &p, &ctx(json!({}))).unwrap());
    }

    #[test]
    fn test_missing_and_null_never_match() {
        let p = vec![Predicate::literal("absent", CompareOp::Eq, 1)];
        assert!(!PredicateFilter::matches(&order(), &p, &ctx(json!({}))).unwrap());

        let p = vec![Predicate::literal("note", CompareOp::Eq, Value::Null)];
        assert!(!PredicateFilter::matches(&order(), &p, &ctx(json!({}))).unwrap());
    }

    #[test]
    fn test_no_type_coercion_between_values() {
        let p = vec![Predicate::literal("total", CompareOp::Eq, "120")];
        assert!(!PredicateFilter::matches(&order(), &p, &ctx(json!({}))).unwrap());
        let p = vec![Predicate::literal("total", CompareOp::Gt, "100")];
        assert!(!PredicateFilter::matches(&order(), &p, &ctx(json!({}))).unwrap());
    }

    #[test]
    fn test_numeric_equality_ignores_representation() {
        let c = ctx(json!({ "amount": 120.0 }));
        let p = vec![Predicate::literal("total", CompareOp::Eq, 120.0)];
        assert!(PredicateFilter::matches(&order(), &p, &c).unwrap());

        let p = vec![Predicate::param("total", CompareOp::Eq, "amount", ParamKind::Number)];
        assert!(PredicateFilter::matches(&order(), &p, &c).unwrap());

        let p = vec![Predicate::literal("total", CompareOp::Eq, 120.5)];
        assert!(!PredicateFilter::matches(&order(), &p, &c).unwrap());
    }

    #[test]
    fn test_range_operators() {
        let c = ctx(json!({}));
        let check = |op, v: i64| {
            PredicateFilter::matches(&order(), &[Predicate::literal("total", op, v)], &c).unwrap()
        };
        assert!(check(CompareOp::Gt, 100));
        assert!(!check(CompareOp::Gt, 120));
        assert!(check(CompareOp::Gte, 120));
        assert!(check(CompareOp::Lt, 121));
        assert!(!check(CompareOp::Lt, 120));
        assert!(check(CompareOp::Lte, 120));
    }

    #[test]
    fn test_param_binding_with_parse() {
        let p = vec![
            Predicate::param("customer", CompareOp::Eq, "customer", ParamKind::String),
            Predicate::param("total", CompareOp::Gte, "min", ParamKind::Number),
            Predicate::param("rush", CompareOp::Eq, "rush", ParamKind::Bool),
        ];
        let c = ctx(json!({"customer": "c-7", "min": "100", "rush": "true"}));
        assert!(PredicateFilter::matches(&order(), &p, &c).unwrap());

        let c = ctx(json!({"customer": "c-7", "min": "150.5", "rush": "true"}));
        assert!(!PredicateFilter::matches(&order(), &p, &c).unwrap());
    }

    #[test]
    fn test_missing_param_is_failure() {
        let p = vec![Predicate::param("customer", CompareOp::Eq, "customer", ParamKind::String)];
        let err = PredicateFilter::matches(&order(), &p, &ctx(json!({}))).unwrap_err();
        assert_eq!(err, FilterError::MissingParam("customer".into()));
    }

    #[test]
    fn test_bad_param_type_is_failure() {
        let p = vec![Predicate::param("total", CompareOp::Gt, "min", ParamKind::Number)];
        let err = PredicateFilter::matches(&order(), &p, &ctx(json!({"min": "lots"}))).unwrap_err();
        assert!(matches!(err, FilterError::ParamType { expected: "number", .. }));
    }

    #[test]
    fn test_predicate_from_config_json() {
        let literal: Predicate =
            serde_json::from_value(json!({"field": "total", "op": "gt", "value": 5})).unwrap();
        assert_eq!(literal, Predicate::literal("total", CompareOp::Gt, 5));

        let param: Predicate = serde_json::from_value(
            json!({"field": "total", "op": "lte", "param": "max", "type": "number"}),
        )
        .unwrap();
        assert_eq!(param, Predicate::param("total", CompareOp::Lte, "max", ParamKind::Number));
    }
}
