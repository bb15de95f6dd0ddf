use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config/chat.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Local(LocalConfig),
    Firebase(FirebaseConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Local(LocalConfig::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub database_path: String,
    pub media_dir: String,
    /// How often listeners re-read the database for writes made by other
    /// processes sharing the same file.
    pub poll_interval_ms: u64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            database_path: "data/chat.db".to_string(),
            media_dir: "data/media".to_string(),
            poll_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirebaseConfig {
    pub project_id: String,
    pub api_key: String,
    /// e.g. `https://<project>-default-rtdb.firebaseio.com`
    pub database_url: String,
    /// e.g. `<project>.appspot.com`
    pub storage_bucket: String,
    /// Service-account key used to mint push credentials.
    #[serde(default)]
    pub service_account_path: Option<String>,
    /// Push registration of this device, needed for topic subscriptions.
    #[serde(default)]
    pub registration_token: Option<String>,
    #[serde(default)]
    pub endpoints: FirebaseEndpoints,
}

/// Service roots; overridable for emulators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirebaseEndpoints {
    pub identity_toolkit: String,
    pub secure_token: String,
    pub storage: String,
    pub fcm: String,
    pub iid: String,
}

impl Default for FirebaseEndpoints {
    fn default() -> Self {
        Self {
            identity_toolkit: "https://identitytoolkit.googleapis.com".to_string(),
            secure_token: "https://securetoken.googleapis.com".to_string(),
            storage: "https://firebasestorage.googleapis.com".to_string(),
            fcm: "https://fcm.googleapis.com".to_string(),
            iid: "https://iid.googleapis.com".to_string(),
        }
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    let mut config = match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    };

    apply_env_overrides(&mut config, |name| env::var(name).ok());
    config
}

/// Environment (and `.env`) values win over the file. Any `FIREBASE_*`
/// variable switches a local config over to Firebase.
pub fn apply_env_overrides<F>(config: &mut AppConfig, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    let firebase_vars = [
        "FIREBASE_PROJECT_ID",
        "FIREBASE_API_KEY",
        "FIREBASE_DATABASE_URL",
        "FIREBASE_STORAGE_BUCKET",
    ];
    if firebase_vars.iter().any(|name| var(name).is_some()) {
        if let BackendConfig::Local(_) = config.backend {
            config.backend = BackendConfig::Firebase(FirebaseConfig::default());
        }
    }

    match &mut config.backend {
        BackendConfig::Local(local) => {
            if let Some(dir) = var("CHAT_DATA_DIR") {
                local.database_path = format!("{dir}/chat.db");
                local.media_dir = format!("{dir}/media");
            }
        }
        BackendConfig::Firebase(firebase) => {
            let fields: [(&str, &mut String); 4] = [
                ("FIREBASE_PROJECT_ID", &mut firebase.project_id),
                ("FIREBASE_API_KEY", &mut firebase.api_key),
                ("FIREBASE_DATABASE_URL", &mut firebase.database_url),
                ("FIREBASE_STORAGE_BUCKET", &mut firebase.storage_bucket),
            ];
            for (name, field) in fields {
                if let Some(value) = var(name) {
                    *field = value;
                }
            }
            if let Some(path) = var("FIREBASE_SERVICE_ACCOUNT") {
                firebase.service_account_path = Some(path);
            }
            if let Some(token) = var("FCM_REGISTRATION_TOKEN") {
                firebase.registration_token = Some(token);
            }
        }
    }
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}
