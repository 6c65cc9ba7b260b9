// Subscription filter-policy matching (§4.2, §9 Design Notes). Compiled once
// at subscribe time into a small AST instead of being re-parsed against
// `serde_json::Value` on every publish.

use crate::error::{BusError, Result};
use crate::model::MessageAttributes;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Predicate {
    Exact(Value),
    Exists,
    DoesNotExist,
    AnythingBut(Vec<Value>),
    Prefix(String),
    Numeric(NumericCmp, f64),
}

#[derive(Debug, Clone, Copy)]
enum NumericCmp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone)]
pub struct CompiledFilterPolicy {
    // attribute name -> any-of predicate list; a message passes the
    // attribute if it satisfies at least one predicate, and passes the
    // policy if every attribute's predicate list is satisfied (§4.2 step 1).
    per_attribute: HashMap<String, Vec<Predicate>>,
}

impl CompiledFilterPolicy {
    pub fn compile(policy_json: &str) -> Result<Self> {
        let parsed: Value = serde_json::from_str(policy_json)
            .map_err(|e| BusError::InvalidParameter(format!("invalid filter policy: {e}")))?;
        let object = parsed
            .as_object()
            .ok_or_else(|| BusError::InvalidParameter("filter policy must be a JSON object".into()))?;

        let mut per_attribute = HashMap::new();
        for (key, value) in object {
            let rules = value.as_array().ok_or_else(|| {
                BusError::InvalidParameter(format!(
                    "filter policy attribute '{key}' must map to an array"
                ))
            })?;
            let mut predicates = Vec::with_capacity(rules.len());
            for rule in rules {
                predicates.push(compile_rule(rule)?);
            }
            per_attribute.insert(key.clone(), predicates);
        }
        Ok(Self { per_attribute })
    }

    /// A message passes when every top-level attribute named in the policy
    /// matches (§4.2 step 1).
    pub fn matches(&self, attributes: &MessageAttributes) -> bool {
        self.per_attribute.iter().all(|(name, predicates)| {
            let present = attributes.get(name);
            predicates.iter().any(|p| predicate_matches(p, present))
        })
    }
}

fn compile_rule(rule: &Value) -> Result<Predicate> {
    if let Some(object) = rule.as_object() {
        if let Some(Value::Bool(true)) = object.get("exists") {
            return Ok(Predicate::Exists);
        }
        if let Some(Value::Bool(false)) = object.get("exists") {
            return Ok(Predicate::DoesNotExist);
        }
        if let Some(anything_but) = object.get("anything-but") {
            let values = anything_but
                .as_array()
                .cloned()
                .unwrap_or_else(|| vec![anything_but.clone()]);
            return Ok(Predicate::AnythingBut(values));
        }
        if let Some(Value::String(prefix)) = object.get("prefix") {
            return Ok(Predicate::Prefix(prefix.clone()));
        }
        if let Some(numeric) = object.get("numeric") {
            return compile_numeric(numeric);
        }
        return Err(BusError::InvalidParameter(format!(
            "unsupported filter policy rule: {rule}"
        )));
    }
    Ok(Predicate::Exact(rule.clone()))
}

fn compile_numeric(numeric: &Value) -> Result<Predicate> {
    let tokens = numeric
        .as_array()
        .ok_or_else(|| BusError::InvalidParameter("numeric rule must be an array".into()))?;
    if tokens.len() != 2 {
        return Err(BusError::InvalidParameter(
            "numeric rule must be [operator, value]".into(),
        ));
    }
    let op = tokens[0]
        .as_str()
        .ok_or_else(|| BusError::InvalidParameter("numeric operator must be a string".into()))?;
    let value = tokens[1]
        .as_f64()
        .ok_or_else(|| BusError::InvalidParameter("numeric operand must be a number".into()))?;
    let cmp = match op {
        "=" => NumericCmp::Eq,
        "<" => NumericCmp::Lt,
        "<=" => NumericCmp::Lte,
        ">" => NumericCmp::Gt,
        ">=" => NumericCmp::Gte,
        other => {
            return Err(BusError::InvalidParameter(format!(
                "unsupported numeric operator: {other}"
            )))
        }
    };
    Ok(Predicate::Numeric(cmp, value))
}

fn predicate_matches(
    predicate: &Predicate,
    attribute: Option<&crate::model::MessageAttributeValue>,
) -> bool {
    match predicate {
        Predicate::Exists => attribute.is_some(),
        Predicate::DoesNotExist => attribute.is_none(),
        Predicate::Exact(expected) => attribute
            .and_then(|a| a.string_value.as_ref())
            .map(|v| value_matches_string(expected, v))
            .unwrap_or(false),
        Predicate::AnythingBut(excluded) => match attribute.and_then(|a| a.string_value.as_ref()) {
            Some(v) => !excluded.iter().any(|e| value_matches_string(e, v)),
            None => false,
        },
        Predicate::Prefix(prefix) => attribute
            .and_then(|a| a.string_value.as_ref())
            .map(|v| v.starts_with(prefix.as_str()))
            .unwrap_or(false),
        Predicate::Numeric(cmp, expected) => attribute
            .and_then(|a| a.string_value.as_ref())
            .and_then(|v| v.parse::<f64>().ok())
            .map(|actual| match cmp {
                NumericCmp::Eq => (actual - expected).abs() < f64::EPSILON,
                NumericCmp::Lt => actual < *expected,
                NumericCmp::Lte => actual <= *expected,
                NumericCmp::Gt => actual > *expected,
                NumericCmp::Gte => actual >= *expected,
            })
            .unwrap_or(false),
    }
}

fn value_matches_string(expected: &Value, actual: &str) -> bool {
    match expected {
        Value::String(s) => s == actual,
        Value::Number(n) => n.to_string() == actual,
        Value::Bool(b) => b.to_string() == actual,
        _ => false,
    }
}
