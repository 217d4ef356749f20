use std::path::PathBuf;

const RELAY_CONFIG: &str = "RELAY_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "./config.json";

pub fn get_default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

pub fn get_config_path() -> PathBuf {
    let path_from_env = std::env::var(RELAY_CONFIG);
    path_from_env
        .ok()
        .filter(|path| !path.trim().is_empty())
        .map_or_else(get_default_config_path, PathBuf::from)
}

const RELAY_ADMIN: &str = "RELAY_ADMIN";

const DEFAULT_ADMIN: &str = "console";

/// Name announced when the console triggers a reload.
pub fn get_admin_name() -> String {
    let admin_from_env = std::env::var(RELAY_ADMIN);
    admin_from_env.unwrap_or_else(|_| DEFAULT_ADMIN.to_string())
}
