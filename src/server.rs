use std::{env, path::{Path, PathBuf}};
use tokio::{fs::{create_dir_all, read_to_string, File}, io::AsyncWriteExt};
use serde::{Deserialize, Serialize};
use nanoid::nanoid;
use clap::Parser;
use crate::{error::Error, Result};


const ENV_DIR: &str = "FACETRAIL_DIR";
const ENV_PORT: &str = "FACETRAIL_PORT";
const ENV_SECRET: &str = "FACETRAIL_SECRET";
const ENV_MODELS: &str = "FACETRAIL_MODELS";
const ENV_IMAGES: &str = "FACETRAIL_IMAGES";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    pub token_secret: Option<String>,
    pub models_dir: Option<PathBuf>,
    pub images_dir: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub faces: FaceSettings,
}

/// Tuning of the face engine
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FaceSettings {
    pub similarity_threshold: f32,
    pub cluster_threshold: f32,
    pub auto_assign_threshold: f32,
    /// Max tasks in flight for batch operations
    pub concurrency: usize,
    pub person_cache_size: usize,
    pub min_detection_confidence: f32,
}

impl Default for FaceSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            cluster_threshold: 0.6,
            auto_assign_threshold: 0.48,
            concurrency: 4,
            person_cache_size: 256,
            min_detection_confidence: 0.5,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            token_secret: None,
            models_dir: None,
            images_dir: None,
            log_level: default_log_level(),
            faces: FaceSettings::default(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Local data directory holding config.json and the database
    #[arg(short, long)]
    pub dir: Option<String>,

    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory holding the ONNX face models
    #[arg(short, long)]
    pub models: Option<String>,

    /// Root for relative photo storage references
    #[arg(short, long)]
    pub images: Option<String>,
}

/// Configuration resolved at start and passed down
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub local_path: PathBuf,
    pub config: ServerConfig,
    /// A token secret was created and written to config.json on this start
    pub secret_generated: bool,
}

impl LoadedConfig {
    pub fn models_path(&self) -> PathBuf {
        self.config.models_dir.clone().unwrap_or_else(|| self.local_path.join("models"))
    }

    pub fn images_path(&self) -> PathBuf {
        self.config.images_dir.clone().unwrap_or_else(|| self.local_path.join("images"))
    }

    pub fn database_path(&self) -> PathBuf {
        self.local_path.join("dbs").join("database.db")
    }

    pub fn token_secret(&self) -> Result<String> {
        self.config.token_secret.clone().ok_or(Error::AuthFail)
    }
}

pub async fn initialize_config(args: &Args) -> Result<LoadedConfig> {
    let local_path = get_server_local_path(args).await?;
    let mut config = get_raw_config(&local_path).await?;
    apply_overrides(&mut config, args, |key| env::var(key).ok());

    let secret_generated = config.token_secret.is_none();
    if secret_generated {
        let mut persisted = get_raw_config(&local_path).await?;
        let secret = nanoid!(48);
        persisted.token_secret = Some(secret.clone());
        update_config(&local_path, &persisted).await?;
        config.token_secret = Some(secret);
    }

    Ok(LoadedConfig { local_path, config, secret_generated })
}

pub async fn get_server_local_path(args: &Args) -> Result<PathBuf> {
    let dir_path = if let Some(argdir) = &args.dir {
        PathBuf::from(argdir)
    } else if let Ok(val) = env::var(ENV_DIR) {
        PathBuf::from(&val)
    } else {
        let Some(mut dir_path) = dirs::config_local_dir() else { return Err(Error::ServerUnableToAccessServerLocalFolder); };
        dir_path.push("facetrail");
        dir_path
    };

    let Ok(_) = create_dir_all(&dir_path).await else { return Err(Error::ServerUnableToAccessServerLocalFolder); };

    Ok(dir_path)
}

/// Environment wins over the file, command line wins over both
pub fn apply_overrides<F>(config: &mut ServerConfig, args: &Args, lookup: F) where F: Fn(&str) -> Option<String> {
    if let Some(port) = lookup(ENV_PORT).and_then(|p| p.parse::<u16>().ok()) {
        config.port = port;
    }
    if let Some(secret) = lookup(ENV_SECRET).filter(|s| !s.is_empty()) {
        config.token_secret = Some(secret);
    }
    if let Some(models) = lookup(ENV_MODELS) {
        config.models_dir = Some(PathBuf::from(models));
    }
    if let Some(images) = lookup(ENV_IMAGES) {
        config.images_dir = Some(PathBuf::from(images));
    }

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(models) = &args.models {
        config.models_dir = Some(PathBuf::from(models));
    }
    if let Some(images) = &args.images {
        config.images_dir = Some(PathBuf::from(images));
    }
}

pub fn parse_config(data: &str) -> Result<ServerConfig> {
    let Ok(config) = serde_json::from_str::<ServerConfig>(data) else { return Err(Error::ServerMalformatedConfigFile); };
    Ok(config)
}

pub async fn get_raw_config(local_path: &Path) -> Result<ServerConfig> {
    let dir_path = local_path.join("config.json");

    if let Ok(data) = read_to_string(&dir_path).await {
        parse_config(&data)
    } else {
        let new_config = ServerConfig::default();
        update_config(local_path, &new_config).await?;
        Ok(new_config)
    }
}

pub async fn update_config(local_path: &Path, config: &ServerConfig) -> Result<()> {
    let dir_path = local_path.join("config.json");
    let new_config_string = serde_json::to_string_pretty(config)?;
    let Ok(mut file) = File::create(dir_path).await else { return Err(Error::ServerUnableToAccessServerLocalFolder); };
    file.write_all(new_config_string.as_bytes()).await?;
    Ok(())
}
