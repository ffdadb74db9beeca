use serde::{Deserialize, Serialize};

use super::error::{Error, Result};

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub enum ConnectedUser {
    Server(ServerUser),
    Anonymous,
}

impl ConnectedUser {
    pub fn check_registered(&self) -> Result<ServerUser> {
        if let ConnectedUser::Server(user) = &self {
            Ok(user.clone())
        } else {
            Err(Error::NotServerConnected)
        }
    }

    pub fn user_id(&self) -> Result<String> {
        if let ConnectedUser::Server(user) = &self {
            Ok(user.id.clone())
        } else {
            Err(Error::NotServerConnected)
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerUser {
    pub id: String,
}

impl ServerUser {
    pub fn new(id: &str) -> Self {
        ServerUser { id: id.to_string() }
    }
}
