//! Security filter expression trees
//!
//! A [`SecurityFilter`] is a small boolean predicate tree. It is built once per
//! repository and request, never edited in place, and only ever grows by being
//! wrapped in another combinator. The same tree is rendered into the backend's
//! filter DSL and can be evaluated directly against a JSON document, which is
//! how the in-memory backend and the tests check what a filter admits.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Boolean filter expression over document fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SecurityFilter {
    /// All children must match. An empty conjunction matches everything.
    And(Vec<SecurityFilter>),

    /// At least one child must match. An empty disjunction matches nothing.
    Or(Vec<SecurityFilter>),

    /// The child must not match
    Not(Box<SecurityFilter>),

    /// Field equals value
    Term { field: String, value: Value },

    /// Field equals one of the values
    Terms { field: String, values: Vec<Value> },
}

impl SecurityFilter {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        SecurityFilter::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn terms<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        SecurityFilter::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn and(children: Vec<SecurityFilter>) -> Self {
        SecurityFilter::And(children)
    }

    pub fn or(children: Vec<SecurityFilter>) -> Self {
        SecurityFilter::Or(children)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: SecurityFilter) -> Self {
        SecurityFilter::Not(Box::new(child))
    }

    /// Conjoin `self` with another clause.
    ///
    /// Conjunctions are flattened so the rendered tree stays shallow.
    pub fn and_also(self, other: SecurityFilter) -> Self {
        match self {
            SecurityFilter::And(mut children) => {
                children.push(other);
                SecurityFilter::And(children)
            }
            single => SecurityFilter::And(vec![single, other]),
        }
    }

    /// Render into the backend filter DSL
    pub fn to_dsl(&self) -> Value {
        match self {
            SecurityFilter::And(children) => {
                json!({ "and": children.iter().map(Self::to_dsl).collect::<Vec<_>>() })
            }
            SecurityFilter::Or(children) => {
                json!({ "or": children.iter().map(Self::to_dsl).collect::<Vec<_>>() })
            }
            SecurityFilter::Not(child) => json!({ "not": child.to_dsl() }),
            SecurityFilter::Term { field, value } => json!({ "term": { field.as_str(): value } }),
            SecurityFilter::Terms { field, values } => {
                json!({ "terms": { field.as_str(): values } })
            }
        }
    }

    /// Parse the filter DSL produced by [`SecurityFilter::to_dsl`].
    ///
    /// Returns `None` for any construct outside the five supported clauses.
    pub fn from_dsl(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        if map.len() != 1 {
            return None;
        }
        let (kind, body) = map.iter().next()?;

        match kind.as_str() {
            "and" | "or" => {
                let children = body
                    .as_array()?
                    .iter()
                    .map(Self::from_dsl)
                    .collect::<Option<Vec<_>>>()?;
                Some(if kind == "and" {
                    SecurityFilter::And(children)
                } else {
                    SecurityFilter::Or(children)
                })
            }
            "not" => Some(SecurityFilter::not(Self::from_dsl(body)?)),
            "term" => {
                let (field, value) = single_entry(body)?;
                Some(SecurityFilter::term(field.clone(), value.clone()))
            }
            "terms" => {
                let (field, values) = single_entry(body)?;
                Some(SecurityFilter::Terms {
                    field: field.clone(),
                    values: values.as_array()?.clone(),
                })
            }
            _ => None,
        }
    }

    /// Evaluate the filter against a document.
    ///
    /// Field paths are dotted (`task.stage`). When a path crosses an array,
    /// every element is visited and the leaf matches if any value does.
    /// A missing field never satisfies a term.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            SecurityFilter::And(children) => children.iter().all(|c| c.matches(doc)),
            SecurityFilter::Or(children) => children.iter().any(|c| c.matches(doc)),
            SecurityFilter::Not(child) => !child.matches(doc),
            SecurityFilter::Term { field, value } => {
                field_values(doc, field).into_iter().any(|v| v == value)
            }
            SecurityFilter::Terms { field, values } => field_values(doc, field)
                .into_iter()
                .any(|v| values.iter().any(|candidate| candidate == v)),
        }
    }
}

fn single_entry(value: &Value) -> Option<(&String, &Value)> {
    let map = value.as_object()?;
    if map.len() == 1 {
        map.iter().next()
    } else {
        None
    }
}

/// Collect the leaf values found at a dotted path, flattening arrays
pub(crate) fn field_values<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(child) = map.get(segment) {
                        next.push(child);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Some(child) = item.as_object().and_then(|m| m.get(segment)) {
                            next.push(child);
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }

    let mut leaves = Vec::new();
    for value in current {
        match value {
            Value::Array(items) => leaves.extend(items.iter()),
            other => leaves.push(other),
        }
    }
    leaves
}
