use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

use crate::upload::{parse_size, Limits};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Upload policy and server limits. Zero and empty values mean "not set".
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UploadConfig {
    pub upload_dir: PathBuf,
    pub create_upload_dir: bool,
    pub temp_dir: PathBuf,
    #[validate(length(min = 1, message = "upload_max_filesize must not be empty"))]
    pub upload_max_filesize: String,
    #[validate(length(min = 1, message = "post_max_size must not be empty"))]
    pub post_max_size: String,
    pub max_file_size: u64,
    pub max_total_size: u64,
    #[validate(range(max = 10000, message = "max_files must not exceed 10000"))]
    pub max_files: usize,
    #[validate(length(max = 256, message = "Too many allowed mime types"))]
    pub allowed_mime_types: Vec<String>,
    pub allow_overwrite: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            create_upload_dir: true,
            temp_dir: PathBuf::from("./temp"),
            upload_max_filesize: "2M".to_string(),
            post_max_size: "8M".to_string(),
            max_file_size: 0,
            max_total_size: 0,
            max_files: 1,
            allowed_mime_types: Vec::new(),
            allow_overwrite: false,
        }
    }
}

impl UploadConfig {
    /// Server limits described by the shorthand settings.
    pub fn limits(&self) -> Result<Limits, ConfigError> {
        let parse = |value: &str| parse_size(value).map_err(|e| ConfigError::Message(e.to_string()));

        Ok(Limits {
            upload_max_filesize: parse(&self.upload_max_filesize)?,
            post_max_size: parse(&self.post_max_size)?,
        })
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?);

        if std::path::Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder.add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("uploads.allowed_mime_types")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        if self.uploads.temp_dir.as_os_str().is_empty() {
            return Err(ConfigError::Message(
                "Temp dir cannot be empty".to_string(),
            ));
        }

        Validate::validate(&self.uploads)
            .map_err(|e| ConfigError::Message(format!("Invalid upload settings: {}", e)))?;

        let limits = self.uploads.limits()?;

        if let (Some(upload), Some(post)) = (limits.upload_max_filesize, limits.post_max_size) {
            if upload > post {
                tracing::warn!("upload_max_filesize is larger than post_max_size; large files will be rejected as a whole request");
            }
        }

        if self.uploads.max_file_size > 0 && self.uploads.max_total_size > 0
            && self.uploads.max_file_size > self.uploads.max_total_size
        {
            return Err(ConfigError::Message(
                "max_file_size cannot be larger than max_total_size".to_string(),
            ));
        }

        Ok(())
    }

    pub fn create_directories(&self) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(&self.uploads.temp_dir)?;
        if self.uploads.create_upload_dir && !self.uploads.upload_dir.as_os_str().is_empty() {
            std::fs::create_dir_all(&self.uploads.upload_dir)?;
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
