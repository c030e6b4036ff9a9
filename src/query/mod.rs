//! Query-filter translation
//!
//! Both the list-valued `get_many` filters and client search bodies end up as
//! a [`SearchQuery`], which each storage backend evaluates natively.

mod filters;
mod search;

pub use filters::QueryFilters;
pub use search::{
    Condition, FieldPath, Filter, RecordField, Scalar, SearchQuery, INVALID_QUERY_MESSAGE,
};
