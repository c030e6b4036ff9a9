use crate::error::{RegistryError, Result};
use crate::model::properties::{parse_properties, Properties};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A validated datacenter record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterRecord {
    pub center_id: String,
    pub country: String,
    pub name: String,
    #[serde(rename = "type")]
    pub center_type: String,
    pub organization: String,
    pub storage_type: String,
    pub contact_email: String,
    pub song_url: String,
    pub score_url: String,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

/// Unvalidated record as submitted by a client.
///
/// Every field is optional so that validation decides what is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterInput {
    pub center_id: Option<String>,
    pub country: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub center_type: Option<String>,
    pub organization: Option<String>,
    pub storage_type: Option<String>,
    pub contact_email: Option<String>,
    pub song_url: Option<String>,
    pub score_url: Option<String>,
    pub properties: Option<Map<String, Value>>,
}

impl DatacenterRecord {
    /// Required fields in validation order
    fn required_fields(&self) -> [(&'static str, &str); 9] {
        [
            ("centerId", self.center_id.as_str()),
            ("country", self.country.as_str()),
            ("name", self.name.as_str()),
            ("type", self.center_type.as_str()),
            ("organization", self.organization.as_str()),
            ("storageType", self.storage_type.as_str()),
            ("songUrl", self.song_url.as_str()),
            ("scoreUrl", self.score_url.as_str()),
            ("contactEmail", self.contact_email.as_str()),
        ]
    }

    /// Reject the record if any required field is empty, naming the first one.
    pub fn validate(&self) -> Result<()> {
        match self.required_fields().iter().find(|(_, value)| value.is_empty()) {
            Some((field, _)) => Err(RegistryError::invalid_argument(format!("{} is missing", field))),
            None => Ok(()),
        }
    }
}

impl TryFrom<DatacenterInput> for DatacenterRecord {
    type Error = RegistryError;

    fn try_from(input: DatacenterInput) -> Result<Self> {
        let mut record = DatacenterRecord {
            center_id: input.center_id.unwrap_or_default(),
            country: input.country.unwrap_or_default(),
            name: input.name.unwrap_or_default(),
            center_type: input.center_type.unwrap_or_default(),
            organization: input.organization.unwrap_or_default(),
            storage_type: input.storage_type.unwrap_or_default(),
            contact_email: input.contact_email.unwrap_or_default(),
            song_url: input.song_url.unwrap_or_default(),
            score_url: input.score_url.unwrap_or_default(),
            properties: Properties::new(),
        };
        record.validate()?;

        if let Some(raw) = input.properties {
            record.properties = parse_properties(raw)?;
        }

        Ok(record)
    }
}

impl From<DatacenterRecord> for DatacenterInput {
    fn from(record: DatacenterRecord) -> Self {
        let properties = if record.properties.is_empty() {
            None
        } else {
            Some(
                record
                    .properties
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            )
        };

        DatacenterInput {
            center_id: Some(record.center_id),
            country: Some(record.country),
            name: Some(record.name),
            center_type: Some(record.center_type),
            organization: Some(record.organization),
            storage_type: Some(record.storage_type),
            contact_email: Some(record.contact_email),
            song_url: Some(record.song_url),
            score_url: Some(record.score_url),
            properties,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn record(center_id: &str, country: &str) -> DatacenterRecord {
        DatacenterRecord {
            center_id: center_id.to_string(),
            country: country.to_string(),
            name: format!("{} datacenter", center_id),
            center_type: "RDPC".to_string(),
            organization: "OICR".to_string(),
            storage_type: "S3".to_string(),
            contact_email: "ops@example.org".to_string(),
            song_url: format!("https://song.{}.example.org", center_id.to_lowercase()),
            score_url: format!("https://score.{}.example.org", center_id.to_lowercase()),
            properties: Properties::new(),
        }
    }

    pub fn input(center_id: &str, country: &str) -> DatacenterInput {
        record(center_id, country).into()
    }
}
