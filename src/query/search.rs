//! Structured search queries
//!
//! Client queries arrive as a small Mongo-like JSON subset and are parsed into
//! a typed [`SearchQuery`] before any storage backend sees them:
//!
//! ```text
//! { "$or": [ { "properties.region": "eu" },
//!            { "country": { "$in": ["CA", "US"] }, "type": "RDPC" } ] }
//! ```
//!
//! A query is a disjunction of filters, a filter is a conjunction of
//! conditions, and a condition is membership of one path in a list of
//! accepted scalars.

use crate::error::{RegistryError, Result};
use serde_json::{Map, Number, Value};

pub const INVALID_QUERY_MESSAGE: &str = "body should be a valid filter query";

const PROPERTIES_PREFIX: &str = "properties.";

/// Top-level record fields that can be searched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    CenterId,
    Country,
    Name,
    Type,
    Organization,
    StorageType,
    ContactEmail,
    SongUrl,
    ScoreUrl,
}

impl RecordField {
    pub const ALL: [RecordField; 9] = [
        RecordField::CenterId,
        RecordField::Country,
        RecordField::Name,
        RecordField::Type,
        RecordField::Organization,
        RecordField::StorageType,
        RecordField::ContactEmail,
        RecordField::SongUrl,
        RecordField::ScoreUrl,
    ];

    /// Field name as stored in documents
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordField::CenterId => "centerId",
            RecordField::Country => "country",
            RecordField::Name => "name",
            RecordField::Type => "type",
            RecordField::Organization => "organization",
            RecordField::StorageType => "storageType",
            RecordField::ContactEmail => "contactEmail",
            RecordField::SongUrl => "songUrl",
            RecordField::ScoreUrl => "scoreUrl",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPath {
    Record(RecordField),
    Property(String),
}

impl FieldPath {
    /// `properties.<key>` addresses a property; the rest of the path is the
    /// key, dots included, since the bag is never nested.
    pub fn parse(path: &str) -> Result<Self> {
        if let Some(key) = path.strip_prefix(PROPERTIES_PREFIX) {
            return Ok(Self::property(key));
        }

        RecordField::parse(path)
            .map(FieldPath::Record)
            .ok_or_else(|| RegistryError::invalid_argument(format!("Unknown search field: {}", path)))
    }

    pub fn property(key: impl Into<String>) -> Self {
        FieldPath::Property(key.into())
    }

    /// Look up the value at this path in a stored document
    pub fn lookup<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        match self {
            FieldPath::Record(field) => doc.get(field.as_str()),
            FieldPath::Property(key) => doc.get("properties").and_then(|props| props.get(key)),
        }
    }
}

/// A value a condition can accept
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Number(Number),
    Bool(bool),
}

impl Scalar {
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(Scalar::Text(s)),
            Value::Number(n) => Ok(Scalar::Number(n)),
            Value::Bool(b) => Ok(Scalar::Bool(b)),
            other => Err(RegistryError::invalid_argument(format!(
                "Search values must be strings, numbers or booleans, got: {}",
                other
            ))),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Text(s) => Value::String(s.clone()),
            Scalar::Number(n) => Value::Number(n.clone()),
            Scalar::Bool(b) => Value::Bool(*b),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Scalar::Text(expected), Value::String(actual)) => expected == actual,
            (Scalar::Number(expected), Value::Number(actual)) => {
                match (expected.as_f64(), actual.as_f64()) {
                    (Some(a), Some(b)) => a == b,
                    _ => expected == actual,
                }
            }
            (Scalar::Bool(expected), Value::Bool(actual)) => expected == actual,
            _ => false,
        }
    }
}

/// Membership of the value at `path` in `accepted`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub path: FieldPath,
    pub accepted: Vec<Scalar>,
}

impl Condition {
    pub fn new(path: FieldPath, accepted: Vec<Scalar>) -> Self {
        Self { path, accepted }
    }

    /// True when the document value equals an accepted scalar, or is a list
    /// containing one.
    pub fn matches(&self, doc: &Value) -> bool {
        match self.path.lookup(doc) {
            Some(Value::Array(items)) => items
                .iter()
                .any(|item| self.accepted.iter().any(|scalar| scalar.matches(item))),
            Some(value) => self.accepted.iter().any(|scalar| scalar.matches(value)),
            None => false,
        }
    }
}

/// Conjunction of conditions. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn matches(&self, doc: &Value) -> bool {
        self.conditions.iter().all(|condition| condition.matches(doc))
    }
}

/// Disjunction of filters. A query without branches matches nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub branches: Vec<Filter>,
}

impl SearchQuery {
    /// Query matching every document
    pub fn all() -> Self {
        Self {
            branches: vec![Filter::default()],
        }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.branches.iter().any(|filter| filter.matches(doc))
    }

    /// Parse an advanced search body.
    pub fn parse(query: Option<Value>) -> Result<Self> {
        let mut clause = expect_object(query)?;

        let or_branches = match clause.remove("$or") {
            Some(Value::Array(branches)) if !branches.is_empty() => Some(branches),
            Some(_) => {
                return Err(RegistryError::invalid_argument(
                    "$or must be a non-empty array of clauses",
                ))
            }
            None => None,
        };

        let base = parse_clause(clause)?;

        let branches = match or_branches {
            None => vec![base],
            Some(branches) => branches
                .into_iter()
                .map(|branch| {
                    let branch = match branch {
                        Value::Object(map) => parse_clause(map)?,
                        _ => {
                            return Err(RegistryError::invalid_argument(
                                "$or clauses must be objects",
                            ))
                        }
                    };
                    let mut conditions = base.conditions.clone();
                    conditions.extend(branch.conditions);
                    Ok(Filter { conditions })
                })
                .collect::<Result<Vec<_>>>()?,
        };

        Ok(Self { branches })
    }

    /// Parse a property search body: `propertyKey -> value | [values]`, any
    /// of which may match.
    pub fn parse_properties(query: Option<Value>) -> Result<Self> {
        let map = expect_object(query)?;
        if map.is_empty() {
            return Err(RegistryError::invalid_argument(
                "At least one property constraint is required",
            ));
        }

        let branches = map
            .into_iter()
            .map(|(key, value)| {
                let path = FieldPath::property(key);
                let accepted = match value {
                    Value::Array(items) => items
                        .into_iter()
                        .map(Scalar::from_json)
                        .collect::<Result<Vec<_>>>()?,
                    scalar => vec![Scalar::from_json(scalar)?],
                };
                Ok(Filter {
                    conditions: vec![Condition::new(path, accepted)],
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { branches })
    }
}

impl From<Filter> for SearchQuery {
    fn from(filter: Filter) -> Self {
        Self {
            branches: vec![filter],
        }
    }
}

fn expect_object(query: Option<Value>) -> Result<Map<String, Value>> {
    match query {
        Some(Value::Object(map)) => Ok(map),
        _ => Err(RegistryError::invalid_argument(INVALID_QUERY_MESSAGE)),
    }
}

fn parse_clause(clause: Map<String, Value>) -> Result<Filter> {
    let conditions = clause
        .into_iter()
        .map(|(key, value)| {
            if key.starts_with('$') {
                return Err(RegistryError::invalid_argument(format!(
                    "Unsupported query operator: {}",
                    key
                )));
            }
            let path = FieldPath::parse(&key)?;
            let accepted = parse_operand(&key, value)?;
            Ok(Condition::new(path, accepted))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Filter { conditions })
}

fn parse_operand(key: &str, value: Value) -> Result<Vec<Scalar>> {
    match value {
        Value::Object(ops) => {
            if ops.len() != 1 {
                return Err(RegistryError::invalid_argument(format!(
                    "Condition on '{}' must use exactly one of $eq or $in",
                    key
                )));
            }
            let mut ops = ops.into_iter();
            match ops.next() {
                Some((op, operand)) if op == "$eq" => Ok(vec![Scalar::from_json(operand)?]),
                Some((op, Value::Array(items))) if op == "$in" => {
                    items.into_iter().map(Scalar::from_json).collect()
                }
                Some((op, _)) if op == "$in" => Err(RegistryError::invalid_argument(format!(
                    "$in on '{}' requires an array",
                    key
                ))),
                Some((op, _)) => Err(RegistryError::invalid_argument(format!(
                    "Unsupported query operator: {}",
                    op
                ))),
                None => Err(RegistryError::invalid_argument(INVALID_QUERY_MESSAGE)),
            }
        }
        Value::Array(_) => Err(RegistryError::invalid_argument(format!(
            "Use $in to match '{}' against a list of values",
            key
        ))),
        scalar => Ok(vec![Scalar::from_json(scalar)?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(s: &str) -> Scalar {
        Scalar::Text(s.to_string())
    }

    fn invalid_message(result: Result<SearchQuery>) -> String {
        match result {
            Err(RegistryError::InvalidArgument { message }) => message,
            other => panic!("expected InvalidArgument, got {:?}", other),
        }
    }

    #[test]
    fn test_null_or_missing_query_rejected() {
        assert_eq!(invalid_message(SearchQuery::parse(None)), INVALID_QUERY_MESSAGE);
        assert_eq!(
            invalid_message(SearchQuery::parse(Some(Value::Null))),
            INVALID_QUERY_MESSAGE
        );
        assert_eq!(
            invalid_message(SearchQuery::parse_properties(Some(json!("region")))),
            INVALID_QUERY_MESSAGE
        );
    }

    #[test]
    fn test_empty_clause_matches_everything() {
        let query = SearchQuery::parse(Some(json!({}))).unwrap();
        assert_eq!(query, SearchQuery::all());
        assert!(query.matches(&json!({"centerId": "X"})));
    }

    #[test]
    fn test_parse_single_clause() {
        let query = SearchQuery::parse(Some(json!({
            "country": "CA",
            "properties.tier": {"$in": [1, 2]}
        })))
        .unwrap();

        assert_eq!(query.branches.len(), 1);
        let conditions = &query.branches[0].conditions;
        assert_eq!(conditions.len(), 2);
        assert!(conditions.contains(&Condition::new(
            FieldPath::Record(RecordField::Country),
            vec![text("CA")]
        )));
        assert!(conditions.contains(&Condition::new(
            FieldPath::Property("tier".to_string()),
            vec![Scalar::Number(1.into()), Scalar::Number(2.into())]
        )));
    }

    #[test]
    fn test_or_branches_share_base_conditions() {
        let query = SearchQuery::parse(Some(json!({
            "type": "RDPC",
            "$or": [{"country": "CA"}, {"properties.region": {"$eq": "eu"}}]
        })))
        .unwrap();

        assert_eq!(query.branches.len(), 2);
        for branch in &query.branches {
            assert_eq!(branch.conditions.len(), 2);
            assert_eq!(branch.conditions[0].path, FieldPath::Record(RecordField::Type));
        }
    }

    #[test]
    fn test_rejects_unsafe_shapes() {
        let cases = vec![
            json!({"$where": "sleep(1000)"}),
            json!({"country": {"$regex": ".*"}}),
            json!({"country": {"$eq": "CA", "$in": ["US"]}}),
            json!({"country": {"$in": "CA"}}),
            json!({"country": ["CA"]}),
            json!({"country": null}),
            json!({"country": {"$eq": {"nested": true}}}),
            json!({"url": "https://x"}),
            json!({"$or": []}),
            json!({"$or": [1]}),
        ];

        for case in cases {
            assert!(
                matches!(
                    SearchQuery::parse(Some(case.clone())),
                    Err(RegistryError::InvalidArgument { .. })
                ),
                "{} should be rejected",
                case
            );
        }
    }

    #[test]
    fn test_parse_properties_is_disjunction() {
        let query = SearchQuery::parse_properties(Some(json!({
            "region": "eu",
            "zones": ["a", "b"]
        })))
        .unwrap();

        assert_eq!(query.branches.len(), 2);

        let eu = json!({"properties": {"region": "eu"}});
        let zone_b = json!({"properties": {"region": "us", "zones": ["b", "c"]}});
        let neither = json!({"properties": {"region": "us", "zones": ["c"]}});
        assert!(query.matches(&eu));
        assert!(query.matches(&zone_b));
        assert!(!query.matches(&neither));
    }

    #[test]
    fn test_parse_properties_requires_constraints() {
        assert!(SearchQuery::parse_properties(Some(json!({}))).is_err());
        assert!(SearchQuery::parse_properties(Some(json!({"a": [{"b": 1}]}))).is_err());
    }

    #[test]
    fn test_property_keys_are_taken_verbatim() {
        let query = SearchQuery::parse(Some(json!({"properties.storage.region": "eu"}))).unwrap();
        assert_eq!(
            query.branches[0].conditions[0].path,
            FieldPath::Property("storage.region".to_string())
        );

        let doc = json!({"properties": {"storage.region": "eu", "bad key": true}});
        assert!(query.matches(&doc));

        let by_properties =
            SearchQuery::parse_properties(Some(json!({"bad key": true, "storage.region": "us"})))
                .unwrap();
        assert!(by_properties.matches(&doc));
    }

    #[test]
    fn test_condition_matching() {
        let doc = json!({
            "country": "CA",
            "properties": {"tier": 1, "public": true, "zones": ["a", "b"]}
        });

        let tier = Condition::new(FieldPath::Property("tier".to_string()), vec![Scalar::Number(1.into())]);
        assert!(tier.matches(&doc));

        let tier_float = Condition::new(
            FieldPath::Property("tier".to_string()),
            vec![Scalar::Number(Number::from_f64(1.0).unwrap())],
        );
        assert!(tier_float.matches(&doc));

        let public = Condition::new(FieldPath::Property("public".to_string()), vec![Scalar::Bool(false)]);
        assert!(!public.matches(&doc));

        let zone = Condition::new(FieldPath::Property("zones".to_string()), vec![text("b")]);
        assert!(zone.matches(&doc));

        let missing = Condition::new(FieldPath::Property("absent".to_string()), vec![text("x")]);
        assert!(!missing.matches(&doc));

        let none_accepted = Condition::new(FieldPath::Record(RecordField::Country), vec![]);
        assert!(!none_accepted.matches(&doc));
    }

    #[test]
    fn test_query_without_branches_matches_nothing() {
        let query = SearchQuery { branches: vec![] };
        assert!(!query.matches(&json!({"country": "CA"})));
    }
}
