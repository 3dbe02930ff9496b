//! The persisted record shape
//!
//! Every record carries four stamped fields next to the caller's own:
//!
//! | Field | Set by | Changes |
//! |-------|--------|---------|
//! | `id` | creation | never |
//! | `revision` | creation (1) | +1 per successful update |
//! | `createdAt` | creation | never |
//! | `updatedAt` | update | every successful update |
//!
//! Caller-supplied attributes can never override stamped fields: keys with
//! those names are dropped when attributes are merged in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-owned record fields.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Field names reserved for stamped values.
pub const RESERVED_FIELDS: [&str; 4] = ["id", "revision", "createdAt", "updatedAt"];

/// A stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Globally unique identifier, immutable after creation
    pub id: String,
    /// Optimistic concurrency revision, starts at 1
    pub revision: u64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last successful update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Caller fields
    #[serde(flatten)]
    pub fields: Attributes,
}

impl Record {
    /// Create a first-revision record.
    ///
    /// Reserved keys in `attributes` are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Utc;
    /// use seqdb_core::{Attributes, Record};
    /// use serde_json::json;
    ///
    /// let mut attrs = Attributes::new();
    /// attrs.insert("name".into(), json!("x"));
    /// attrs.insert("revision".into(), json!(99));
    ///
    /// let record = Record::create("id-1", Utc::now(), attrs);
    /// assert_eq!(record.revision, 1);
    /// assert_eq!(record.get("name"), Some(&json!("x")));
    /// assert_eq!(record.get("revision"), None);
    /// ```
    pub fn create(id: impl Into<String>, created_at: DateTime<Utc>, attributes: Attributes) -> Self {
        Record {
            id: id.into(),
            revision: 1,
            created_at,
            updated_at: None,
            fields: strip_reserved(attributes),
        }
    }

    /// Produce the next revision of this record.
    ///
    /// `attributes` are merged over the current fields (reserved keys
    /// ignored); `revision` and `updatedAt` are replaced, `id` and
    /// `createdAt` are kept.
    pub fn merged(&self, attributes: Attributes, revision: u64, updated_at: DateTime<Utc>) -> Self {
        let mut fields = self.fields.clone();
        fields.extend(strip_reserved(attributes));
        Record {
            id: self.id.clone(),
            revision,
            created_at: self.created_at,
            updated_at: Some(updated_at),
            fields,
        }
    }

    /// Get a caller field.
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.fields.get(field)
    }

    /// Render the record in its persisted JSON shape.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = self.fields.clone();
        object.insert("id".into(), self.id.clone().into());
        object.insert("revision".into(), self.revision.into());
        object.insert("createdAt".into(), self.created_at.to_rfc3339().into());
        if let Some(updated_at) = self.updated_at {
            object.insert("updatedAt".into(), updated_at.to_rfc3339().into());
        }
        serde_json::Value::Object(object)
    }
}

fn strip_reserved(mut attributes: Attributes) -> Attributes {
    for field in RESERVED_FIELDS {
        attributes.remove(field);
    }
    attributes
}
