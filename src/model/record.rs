//! Content records that can reference blobs
//!
//! Only the fields that may carry an upload URL are modelled; everything
//! else in these documents is ignored on read.

use serde::Deserialize;

/// Entry of `posts:index`
#[derive(Clone, Debug, Deserialize)]
pub struct PostSummary {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub cover: Option<String>,
}

/// Full post stored under `post:<id>`
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub content: Option<String>,
}

/// Entry of `nav:links`
#[derive(Clone, Debug, Deserialize)]
pub struct NavLink {
    #[serde(default)]
    pub image: Option<String>,
}

// Post ids are strings, but hand-edited indexes sometimes hold numbers
fn id_string<'de, D>(de: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(de)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "post id must be a string, got {}",
            other
        ))),
    }
}
