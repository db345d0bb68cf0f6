/// Chat message model and its wire-record codec.
///
/// Records in the remote collection are JSON objects with four nullable
/// fields. Exactly one of `text` or `image_url` carries the content of a
/// finished message; placeholder records hold the configured loading
/// sentinel in `image_url` until their upload completes.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HearthError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Body of a text message
    pub text: Option<String>,

    /// Author display name
    pub name: Option<String>,

    /// Author avatar URL
    #[serde(rename = "photoUrl")]
    pub photo_url: Option<String>,

    /// Image content URL, or the loading sentinel while the upload runs
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
}

impl Message {
    /// Text message from user input plus author fields
    pub fn text(content: impl Into<String>, name: Option<String>, photo_url: Option<String>) -> Self {
        Self {
            text: Some(content.into()),
            name,
            photo_url,
            image_url: None,
        }
    }

    /// Placeholder written before an image upload starts
    pub fn placeholder(name: Option<String>, photo_url: Option<String>, loading_url: &str) -> Self {
        Self {
            text: None,
            name,
            photo_url,
            image_url: Some(loading_url.to_string()),
        }
    }

    /// Final image message carrying the resolved public URL
    pub fn image(url: impl Into<String>, name: Option<String>, photo_url: Option<String>) -> Self {
        Self {
            text: None,
            name,
            photo_url,
            image_url: Some(url.into()),
        }
    }

    /// True while this record still carries the given loading sentinel
    pub fn is_placeholder(&self, loading_url: &str) -> bool {
        self.image_url.as_deref() == Some(loading_url)
    }

    /// Decode one raw record. The key only provides error context; it is
    /// not part of the message itself.
    pub fn from_value(key: &str, value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| HearthError::Decode(format!("record {}: {}", key, e)))
    }

    /// Encode to the raw record schema. Absent fields serialize as
    /// explicit nulls so readers in other stacks see every column.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "text": self.text,
            "name": self.name,
            "photoUrl": self.photo_url,
            "imageUrl": self.image_url,
        })
    }
}
