//! Filter expressions for enumeration endpoints.
//!
//! The wire form is a flat list mixing `"and"` / `"or"` literals with
//! `[key, op, value]` tuples. It is parsed into a disjunction of
//! conjunctions before evaluation, which makes the empty-filter and
//! trailing-`or` cases explicit: an empty conjunction matches everything.

use crate::error::{Error, Result};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    NotContains,
}

impl FilterOp {
    pub fn parse(text: &str) -> Result<FilterOp> {
        match text {
            "=" | "==" => Ok(FilterOp::Eq),
            "!=" => Ok(FilterOp::Ne),
            "<" => Ok(FilterOp::Lt),
            "<=" => Ok(FilterOp::Le),
            ">" => Ok(FilterOp::Gt),
            ">=" => Ok(FilterOp::Ge),
            ":" => Ok(FilterOp::Contains),
            "!:" => Ok(FilterOp::NotContains),
            other => Err(Error::Internal(format!(
                "Invalid filter operator: '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterCondition {
    pub key: String,
    pub op: FilterOp,
    pub value: Value,
}

/// A parsed filter: any conjunction matching admits the record.
#[derive(Debug, Clone, Default)]
pub struct FilterExpr {
    groups: Vec<Vec<FilterCondition>>,
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numeric interpretation used by the ordering operators. Hex strings count
/// as numbers so address fields order correctly.
fn as_number(value: &Value) -> Option<f64> {
    if let Some(n) = value.as_f64() {
        return Some(n);
    }
    let text = value.as_str()?.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok().map(|v| v as f64);
    }
    text.parse::<f64>().ok()
}

impl FilterCondition {
    fn parse(tuple: &[Value]) -> Result<FilterCondition> {
        if tuple.len() != 3 {
            return Err(Error::Internal(format!(
                "Filter tuple must have 3 elements, got {}",
                tuple.len()
            )));
        }
        let key = tuple[0]
            .as_str()
            .ok_or_else(|| Error::Internal("Filter key must be a string".to_string()))?
            .to_string();
        let op = FilterOp::parse(
            tuple[1]
                .as_str()
                .ok_or_else(|| Error::Internal("Filter operator must be a string".to_string()))?,
        )?;
        Ok(FilterCondition {
            key,
            op,
            value: tuple[2].clone(),
        })
    }

    fn matches(&self, record: &Value) -> bool {
        let Some(field) = record.get(&self.key) else {
            return false;
        };

        match self.op {
            FilterOp::Eq | FilterOp::Ne => {
                let equal = match (as_number(field), as_number(&self.value)) {
                    (Some(a), Some(b)) => a == b,
                    _ => stringify(field) == stringify(&self.value),
                };
                (self.op == FilterOp::Eq) == equal
            }
            FilterOp::Lt | FilterOp::Le | FilterOp::Gt | FilterOp::Ge => {
                let ordering = match (as_number(field), as_number(&self.value)) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => Some(stringify(field).cmp(&stringify(&self.value))),
                };
                let Some(ordering) = ordering else {
                    return false;
                };
                match self.op {
                    FilterOp::Lt => ordering.is_lt(),
                    FilterOp::Le => ordering.is_le(),
                    FilterOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }
            }
            FilterOp::Contains | FilterOp::NotContains => {
                let haystack = stringify(field).to_lowercase();
                let needle = stringify(&self.value).to_lowercase();
                (self.op == FilterOp::Contains) == haystack.contains(&needle)
            }
        }
    }
}

impl FilterExpr {
    /// Parse the flat wire list. `"and"` separates conditions within a
    /// conjunction; `"or"` closes a conjunction and starts the next.
    pub fn parse(segments: &[Value]) -> Result<FilterExpr> {
        let mut groups = Vec::new();
        let mut current = Vec::new();

        for segment in segments {
            match segment {
                Value::String(word) if word == "and" => {}
                Value::String(word) if word == "or" => {
                    groups.push(std::mem::take(&mut current));
                }
                Value::Array(tuple) => current.push(FilterCondition::parse(tuple)?),
                other => {
                    return Err(Error::Internal(format!(
                        "Invalid filter segment: {}",
                        other
                    )))
                }
            }
        }
        groups.push(current);

        Ok(FilterExpr { groups })
    }

    /// True for the empty filter, which admits every record.
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.is_empty())
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.groups
            .iter()
            .any(|group| group.iter().all(|condition| condition.matches(record)))
    }

    /// Filter `records`, keeping input order. Each record is considered
    /// once, so the result is already the de-duplicated union.
    pub fn apply(&self, records: Vec<Value>) -> Vec<Value> {
        if self.is_empty() {
            return records;
        }
        records
            .into_iter()
            .filter(|record| self.matches(record))
            .collect()
    }
}
