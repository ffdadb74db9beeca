use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;

use crate::{domain::photo::Photo, model::error::{Error, Result}};

/// Gives access to the original bytes of a photo.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn get_image(&self, photo: &Photo) -> Result<Vec<u8>>;
}

/// Reads `storage_ref` below a local root, or downloads it when it is an http(s) url.
pub struct StorageImageSource {
    root: PathBuf,
    client: Client,
}

impl StorageImageSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root, client: Client::new() }
    }

    fn local_path(&self, storage_ref: &str) -> Result<PathBuf> {
        let relative = Path::new(storage_ref.trim_start_matches('/'));
        if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(Error::InvalidStorageRef(storage_ref.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ImageSource for StorageImageSource {
    async fn get_image(&self, photo: &Photo) -> Result<Vec<u8>> {
        let storage_ref = photo.storage_ref.as_str();
        if storage_ref.starts_with("http://") || storage_ref.starts_with("https://") {
            let response = self.client.get(storage_ref).send().await?.error_for_status()?;
            let bytes = response.bytes().await?;
            return Ok(bytes.to_vec());
        }
        let path = self.local_path(storage_ref)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Err(Error::FileNotFound(path.to_string_lossy().to_string())),
            Err(error) => Err(error.into()),
        }
    }
}
