use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub storage_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub person_tag: Option<String>,
    pub created: i64,
}

impl Photo {
    pub fn summary(&self) -> PhotoSummary {
        PhotoSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            created: self.created,
        }
    }
}

/// Photo fields attached to matches, clusters and assignment results.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoSummary {
    pub id: String,
    pub name: String,
    pub thumbnail_url: Option<String>,
    pub created: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PhotoForAdd {
    pub name: String,
    pub storage_ref: String,
    pub mime_type: Option<String>,
    pub thumbnail_url: Option<String>,
    pub person_tag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PhotoForInsert {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub storage_ref: String,
    pub mime_type: Option<String>,
    pub thumbnail_url: Option<String>,
    pub person_tag: Option<String>,
    pub created: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PhotoForUpdate {
    /// Manual primary person, an empty string clears it
    pub person: Option<String>,
    pub name: Option<String>,
    pub thumbnail_url: Option<String>,
}
