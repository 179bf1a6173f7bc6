//! Table entity encoding.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use feedtable_core::{NormalizedRecord, StorageKey};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// A typed entity property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityProperty {
    String(String),
    DateTime(DateTime<Utc>),
}

/// One entity as sent to the store: its key plus named properties.
///
/// Serializes to the store's JSON entity format, e.g.
///
/// ```json
/// {
///   "PartitionKey": "id",
///   "RowKey": "1700000000000-0000000000",
///   "Date": "2006-01-02T22:04:05Z",
///   "Date@odata.type": "Edm.DateTime",
///   "Description": "<p>...</p>",
///   "Title": "..."
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntity {
    pub key: StorageKey,
    pub properties: BTreeMap<String, EntityProperty>,
}

impl StorageEntity {
    /// Builds the entity for a normalized record under the given key.
    #[must_use]
    pub fn from_record(record: &NormalizedRecord, key: StorageKey) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(
            "Title".to_string(),
            EntityProperty::String(record.title.clone()),
        );
        properties.insert(
            "Description".to_string(),
            EntityProperty::String(record.description.clone()),
        );
        properties.insert(
            "Date".to_string(),
            EntityProperty::DateTime(record.publish_timestamp),
        );
        Self { key, properties }
    }
}

impl Serialize for StorageEntity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let annotations = self
            .properties
            .values()
            .filter(|p| matches!(p, EntityProperty::DateTime(_)))
            .count();
        let mut map = serializer.serialize_map(Some(2 + self.properties.len() + annotations))?;
        map.serialize_entry("PartitionKey", &self.key.partition_key)?;
        map.serialize_entry("RowKey", &self.key.row_key)?;
        for (name, value) in &self.properties {
            match value {
                EntityProperty::String(s) => map.serialize_entry(name, s)?,
                EntityProperty::DateTime(dt) => {
                    map.serialize_entry(name, &dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))?;
                    map.serialize_entry(&format!("{name}@odata.type"), "Edm.DateTime")?;
                }
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample() -> StorageEntity {
        let record = NormalizedRecord {
            title: "First headline".to_string(),
            publish_timestamp: Utc.with_ymd_and_hms(2006, 1, 2, 22, 4, 5).unwrap(),
            description: "<p>Body</p>".to_string(),
            source_id: "article-1".to_string(),
        };
        StorageEntity::from_record(
            &record,
            StorageKey {
                partition_key: "id".to_string(),
                row_key: "0000000000001-0000000000".to_string(),
            },
        )
    }

    #[test]
    fn serializes_keys_and_named_properties() {
        let json = serde_json::to_value(sample()).expect("serialize");
        assert_eq!(json["PartitionKey"], "id");
        assert_eq!(json["RowKey"], "0000000000001-0000000000");
        assert_eq!(json["Title"], "First headline");
        assert_eq!(json["Description"], "<p>Body</p>");
    }

    #[test]
    fn date_is_annotated_as_edm_datetime() {
        let json = serde_json::to_value(sample()).expect("serialize");
        assert_eq!(json["Date"], "2006-01-02T22:04:05Z");
        assert_eq!(json["Date@odata.type"], "Edm.DateTime");
    }

    #[test]
    fn string_properties_carry_no_annotation() {
        let json = serde_json::to_value(sample()).expect("serialize");
        let obj = json.as_object().expect("object");
        assert_eq!(obj.len(), 6);
        assert!(!obj.contains_key("Title@odata.type"));
    }
}
