use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub name: String,
    pub created: i64,
}

impl Person {
    /// Key used for case insensitive lookups
    pub fn name_key(name: &str) -> String {
        name.to_lowercase()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PersonRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct PersonForInsert {
    pub id: String,
    pub name: String,
    pub created: i64,
}
