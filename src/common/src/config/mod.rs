use std::path::Path;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Connection settings for the upload store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// MongoDB connection string
    pub dsn: String,
    /// Logical database holding the envelope collections
    pub database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: String::from("mongodb://localhost:27017"),
            database: String::from("file-upload"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Configuration {
    /// Load configuration from defaults, `envelope-maintenance.toml`, and
    /// `ENVELOPE_MAINT__`-prefixed environment variables, in that order of
    /// precedence (later wins).
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file("envelope-maintenance.toml"))
            .merge(Env::prefixed("ENVELOPE_MAINT__").split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    /// Load configuration from an explicit TOML file, still honoring
    /// environment overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("ENVELOPE_MAINT__").split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration_targets_local_upload_store() {
        let config = Configuration::default();

        assert_eq!(config.database.dsn, "mongodb://localhost:27017");
        assert_eq!(config.database.database, "file-upload");
    }

    #[test]
    fn test_env_overrides_database_settings() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("ENVELOPE_MAINT__DATABASE__DSN", "mongodb://db0:27017");
            jail.set_env("ENVELOPE_MAINT__DATABASE__DATABASE", "file-upload-staging");

            let config = Configuration::load().expect("load configuration");
            assert_eq!(config.database.dsn, "mongodb://db0:27017");
            assert_eq!(config.database.database, "file-upload-staging");
            Ok(())
        });
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "envelope-maintenance.toml",
                r#"
                [database]
                dsn = "mongodb://replica0:27017,replica1:27017"
                database = "file-upload"
                "#,
            )?;

            let config = Configuration::load().expect("load configuration");
            assert_eq!(config.database.dsn, "mongodb://replica0:27017,replica1:27017");
            Ok(())
        });
    }
}
