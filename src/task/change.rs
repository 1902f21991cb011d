//! Change records delivered by the task store's change feed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::{Image, TASK_ID_ATTR};

/// Kind of mutation a change record describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    Insert,
    Modify,
    Remove,
    /// Anything the feed sends that we don't know about.
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Insert => "INSERT",
            Self::Modify => "MODIFY",
            Self::Remove => "REMOVE",
            Self::Other(s) => s,
        }
    }

    /// Only inserts and modifications drive reconciliation.
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::Insert | Self::Modify)
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "INSERT" => Self::Insert,
            "MODIFY" => Self::Modify,
            "REMOVE" => Self::Remove,
            _ => Self::Other(value),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Before/after snapshots carried by a change record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamImages {
    #[serde(rename = "NewImage", default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<Image>,
    #[serde(rename = "OldImage", default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<Image>,
}

/// One task mutation as delivered by the change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Feed-assigned identifier, used only in diagnostics.
    #[serde(rename = "eventID", default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(rename = "eventName")]
    pub event_kind: EventKind,
    #[serde(rename = "dynamodb", default)]
    pub images: StreamImages,
}

impl ChangeRecord {
    pub fn new(event_kind: EventKind, old_image: Option<Image>, new_image: Option<Image>) -> Self {
        Self {
            event_id: None,
            event_kind,
            images: StreamImages {
                new_image,
                old_image,
            },
        }
    }

    pub fn insert(new_image: Image) -> Self {
        Self::new(EventKind::Insert, None, Some(new_image))
    }

    pub fn modify(old_image: Image, new_image: Image) -> Self {
        Self::new(EventKind::Modify, Some(old_image), Some(new_image))
    }

    pub fn new_image(&self) -> Option<&Image> {
        self.images.new_image.as_ref()
    }

    pub fn old_image(&self) -> Option<&Image> {
        self.images.old_image.as_ref()
    }
}

/// A feed entry that could not be read as a [`ChangeRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    pub event_id: Option<String>,
    /// Best-effort key, read straight from the raw entry.
    pub task_id: Option<String>,
    pub message: String,
}

impl MalformedRecord {
    fn from_raw(raw: &Value, error: serde_json::Error) -> Self {
        let task_id = ["/dynamodb/NewImage", "/dynamodb/OldImage"]
            .iter()
            .filter_map(|image| raw.pointer(&format!("{}/{}/S", image, TASK_ID_ATTR)))
            .filter_map(Value::as_str)
            .find(|id| !id.is_empty())
            .map(str::to_string);

        Self {
            event_id: raw.get("eventID").and_then(Value::as_str).map(str::to_string),
            task_id,
            message: error.to_string(),
        }
    }
}

/// Read one raw feed entry.
pub fn parse_record(raw: &Value) -> Result<ChangeRecord, MalformedRecord> {
    ChangeRecord::deserialize(raw).map_err(|e| MalformedRecord::from_raw(raw, e))
}

/// A batch of change records, as POSTed by the feed.
///
/// Entries stay raw until [`ChangeBatch::parse_records`] so a single bad
/// entry cannot reject the whole batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<Value>,
}

impl ChangeBatch {
    /// Parse every entry independently, in order.
    pub fn parse_records(&self) -> Vec<Result<ChangeRecord, MalformedRecord>> {
        self.records.iter().map(parse_record).collect()
    }
}
