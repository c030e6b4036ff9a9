use crate::query::search::{Condition, FieldPath, Filter, RecordField, Scalar};
use serde::Deserialize;

/// List-valued filters accepted by `get_many`
///
/// Fields are ANDed; each list is a membership test. Absent or empty lists
/// impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilters {
    pub country: Option<Vec<String>>,
    pub name: Option<Vec<String>>,
    #[serde(rename = "type")]
    pub center_type: Option<Vec<String>>,
    pub center_id: Option<Vec<String>>,
}

impl QueryFilters {
    pub fn to_filter(&self) -> Filter {
        let fields = [
            (RecordField::Country, &self.country),
            (RecordField::Name, &self.name),
            (RecordField::Type, &self.center_type),
            (RecordField::CenterId, &self.center_id),
        ];

        let conditions = fields
            .into_iter()
            .filter_map(|(field, values)| match values {
                Some(values) if !values.is_empty() => Some(Condition::new(
                    FieldPath::Record(field),
                    values.iter().cloned().map(Scalar::Text).collect(),
                )),
                _ => None,
            })
            .collect();

        Filter { conditions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_filters_impose_nothing() {
        assert!(QueryFilters::default().to_filter().conditions.is_empty());

        let filters = QueryFilters {
            country: Some(vec![]),
            name: Some(vec![]),
            ..Default::default()
        };
        assert!(filters.to_filter().conditions.is_empty());
    }

    #[test]
    fn test_each_list_becomes_membership() {
        let filters = QueryFilters {
            country: Some(vec!["CA".to_string(), "US".to_string()]),
            center_id: Some(vec!["CA-TORONTO".to_string()]),
            ..Default::default()
        };

        let filter = filters.to_filter();
        assert_eq!(
            filter.conditions,
            vec![
                Condition::new(
                    FieldPath::Record(RecordField::Country),
                    vec![Scalar::Text("CA".to_string()), Scalar::Text("US".to_string())]
                ),
                Condition::new(
                    FieldPath::Record(RecordField::CenterId),
                    vec![Scalar::Text("CA-TORONTO".to_string())]
                ),
            ]
        );
    }

    #[test]
    fn test_country_filter_constrains_country() {
        let filter = QueryFilters {
            country: Some(vec!["CA".to_string()]),
            ..Default::default()
        }
        .to_filter();

        assert!(filter.matches(&json!({"centerId": "A", "country": "CA"})));
        assert!(!filter.matches(&json!({"centerId": "B", "country": "US"})));
    }

    #[test]
    fn test_deserialize_type_field() {
        let filters: QueryFilters = serde_json::from_value(json!({"type": ["RDPC"]})).unwrap();
        assert_eq!(filters.center_type, Some(vec!["RDPC".to_string()]));
    }
}
