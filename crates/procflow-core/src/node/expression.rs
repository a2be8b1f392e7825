//! Embedded expression evaluation for script and conditional nodes.
//!
//! [`ExpressionEvaluator`] is the narrow capability the executors depend on.
//! [`JexlEvaluator`] implements it with `jexl_eval` and a small set of
//! transforms.
//!
//! Node inputs are always passed as context objects, NEVER interpolated into
//! expression strings.

use procflow_types::graph::Node;
use serde_json::{Value, json};

use super::DependencyResults;

/// Errors that can occur during expression evaluation.
#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    #[error("Expression evaluation failed: {0}")]
    EvalFailed(String),

    #[error("Invalid context: {0}")]
    InvalidContext(String),
}

/// Evaluate an expression against a JSON context object.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, context: &Value) -> Result<Value, ExpressionError>;
}

/// JEXL evaluator with standard transforms registered.
///
/// `jexl_eval::Evaluator` holds non-`Send` transform closures, so one is
/// built per evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct JexlEvaluator;

impl JexlEvaluator {
    pub fn new() -> Self {
        Self
    }

    fn evaluator() -> jexl_eval::Evaluator<'static> {
        jexl_eval::Evaluator::new()
            .with_transform("lower", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.to_lowercase()))
            })
            .with_transform("upper", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.to_uppercase()))
            })
            .with_transform("trim", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.trim()))
            })
            .with_transform("length", |args: &[Value]| {
                let len = match args.first() {
                    Some(Value::String(s)) => s.len(),
                    Some(Value::Array(a)) => a.len(),
                    Some(Value::Object(o)) => o.len(),
                    _ => 0,
                };
                Ok(json!(len as f64))
            })
            // Property values are strings; `props.limit|number` lifts them.
            .with_transform("number", |args: &[Value]| {
                let n = match args.first() {
                    Some(Value::Number(n)) => n.as_f64(),
                    Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
                    Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
                    _ => None,
                };
                Ok(n.map_or(Value::Null, |n| json!(n)))
            })
            .with_transform("abs", |args: &[Value]| {
                let n = args.first().and_then(Value::as_f64).unwrap_or(0.0);
                Ok(json!(n.abs()))
            })
    }
}

impl ExpressionEvaluator for JexlEvaluator {
    fn evaluate(&self, expression: &str, context: &Value) -> Result<Value, ExpressionError> {
        if !context.is_object() {
            return Err(ExpressionError::InvalidContext(
                "context must be a JSON object".to_string(),
            ));
        }

        Self::evaluator()
            .eval_in_context(expression, context)
            .map_err(|e| ExpressionError::EvalFailed(e.to_string()))
    }
}

/// Build the context an expression evaluates against.
///
/// Shape:
/// ```json
/// {
///   "deps": { "<node_id>": <result>, ... },
///   "props": { "<key>": "<value>", ... },
///   "node": { "id": "...", "name": "..." }
/// }
/// ```
pub fn expression_context(node: &Node, deps: &DependencyResults) -> Value {
    json!({
        "deps": deps.to_json(),
        "props": node.properties,
        "node": {
            "id": node.id,
            "name": node.name,
        }
    })
}

/// Conditional-node truthiness: booleans pass through, numbers are true when
/// non-zero, strings when non-empty. Everything else is false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}
