//! Datacenter records and their validation

mod properties;
mod record;

pub use properties::{parse_properties, Properties, PropertyValue, INVALID_PROPERTIES_MESSAGE};
pub use record::{DatacenterInput, DatacenterRecord};

#[cfg(test)]
pub(crate) use record::fixtures;
