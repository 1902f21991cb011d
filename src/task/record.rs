//! Typed task attributes and the task shape derived from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// The only status value that keeps a reminder alive. Compared exactly.
pub const ACTIVE_STATUS: &str = "active";

/// Title used when a task carries none.
pub const DEFAULT_TITLE: &str = "Untitled";

pub const TASK_ID_ATTR: &str = "taskId";
pub const STATUS_ATTR: &str = "status";
pub const DEADLINE_ATTR: &str = "deadline";
pub const ASSIGNEE_ATTR: &str = "assigneeId";
pub const TITLE_ATTR: &str = "title";

/// A single typed attribute value, in the `{"S": "..."}` wire form used by
/// the change feed and the task store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    String(String),
    /// Numbers are kept as their decimal text.
    #[serde(rename = "N")]
    Number(String),
    /// Binary values are kept base64-encoded.
    #[serde(rename = "B")]
    Binary(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "SS")]
    StringSet(Vec<String>),
    #[serde(rename = "NS")]
    NumberSet(Vec<String>),
    #[serde(rename = "BS")]
    BinarySet(Vec<String>),
    #[serde(rename = "L")]
    List(Vec<AttributeValue>),
    #[serde(rename = "M")]
    Map(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    /// Create a string attribute.
    pub fn string(value: impl Into<String>) -> Self {
        AttributeValue::String(value.into())
    }

    /// The string payload, if this is a string attribute.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value in its typed wire form, e.g. `{"N": "3"}`.
    pub fn to_typed_json(&self) -> Value {
        match self {
            AttributeValue::String(s) => json!({ "S": s }),
            AttributeValue::Number(n) => json!({ "N": n }),
            AttributeValue::Binary(b) => json!({ "B": b }),
            AttributeValue::Bool(b) => json!({ "BOOL": b }),
            AttributeValue::Null(n) => json!({ "NULL": n }),
            AttributeValue::StringSet(items) => json!({ "SS": items }),
            AttributeValue::NumberSet(items) => json!({ "NS": items }),
            AttributeValue::BinarySet(items) => json!({ "BS": items }),
            AttributeValue::List(items) => {
                let items: Vec<Value> = items.iter().map(|v| v.to_typed_json()).collect();
                json!({ "L": items })
            }
            AttributeValue::Map(entries) => {
                let entries: serde_json::Map<String, Value> = entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_typed_json()))
                    .collect();
                json!({ "M": entries })
            }
        }
    }
}

/// A snapshot of a task: attribute name to typed value.
pub type Image = BTreeMap<String, AttributeValue>;

/// Read a string attribute from an image.
pub fn string_attr<'a>(image: &'a Image, key: &str) -> Option<&'a str> {
    image.get(key).and_then(AttributeValue::as_str)
}

/// Build an image whose attributes are all strings.
pub fn image_from_strings<I, K, V>(pairs: I) -> Image
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), AttributeValue::String(v.into())))
        .collect()
}

/// Whether a status value keeps a reminder alive.
pub fn is_active_status(status: Option<&str>) -> bool {
    status == Some(ACTIVE_STATUS)
}

/// The reminder-relevant view of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub task_id: String,
    pub status: Option<String>,
    pub deadline: Option<String>,
    pub assignee_id: Option<String>,
    pub title: Option<String>,
    /// Every attribute of the record, including the ones above.
    pub attributes: Image,
}

impl Task {
    /// Extract a task from an image. Returns `None` when `taskId` is missing
    /// or empty, since there is nothing to key on. Empty string fields are
    /// treated as absent. The id is kept byte for byte.
    pub fn from_image(image: &Image) -> Option<Self> {
        let task_id = string_attr(image, TASK_ID_ATTR).filter(|id| !id.is_empty())?;
        let owned = |key: &str| {
            string_attr(image, key)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            task_id: task_id.to_string(),
            status: owned(STATUS_ATTR),
            deadline: owned(DEADLINE_ATTR),
            assignee_id: owned(ASSIGNEE_ATTR),
            title: owned(TITLE_ATTR),
            attributes: image.clone(),
        })
    }

    pub fn is_active(&self) -> bool {
        is_active_status(self.status.as_deref())
    }

    /// The task title, or [`DEFAULT_TITLE`] when absent.
    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }
}
