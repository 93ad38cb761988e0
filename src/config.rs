use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr};

use log::{info, warn};
use redis::aio::MultiplexedConnection;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::{
    error::{Error, QueryError},
    renderer::{ExportFormat, PdfFont},
};

pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub max_connections: u32,
    pub export: ExportSettings,
}

/// Settings the shopping-list export reads on every request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub default_format: ExportFormat,
    pub font: PdfFont,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            default_format: ExportFormat::Pdf,
            font: PdfFont::Builtin,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        let font = match var("SHOPPING_LIST_FONT") {
            Some(path) => PdfFont::External(PathBuf::from(path)),
            None => {
                info!("SHOPPING_LIST_FONT not set, using builtin Helvetica");
                PdfFont::Builtin
            }
        };

        Ok(Self {
            database_url: try_load("DATABASE_URL", "postgres://postgres@localhost/foodgram")?,
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1/")?,
            jwt_secret: load_secret("JWT_SECRET")?,
            max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
            export: ExportSettings {
                default_format: try_load("SHOPPING_LIST_FORMAT", "pdf")?,
                font,
            },
        })
    }

    /// Opens the database pool and the cache connection.
    pub async fn connect(&self) -> Result<(Pool<Postgres>, MultiplexedConnection), Error> {
        let pool = self.connect_database().await?;
        let cache = self.connect_cache().await?;
        Ok((pool, cache))
    }

    pub async fn connect_database(&self) -> Result<Pool<Postgres>, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.database_url)
            .await
            .map_err(QueryError::from)?;

        info!("Connected to database");
        Ok(pool)
    }

    pub async fn connect_cache(&self) -> Result<MultiplexedConnection, Error> {
        let client = redis::Client::open(self.redis_url.as_str())?;
        let connection = client.get_multiplexed_async_connection().await?;

        info!("Connected to cache");
        Ok(connection)
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, Error>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            Error::Config(format!("Invalid {key} value: {e}"))
        })
}

/// Reads a secret from the environment, falling back to a docker secret file.
fn load_secret(secret_name: &str) -> Result<String, Error> {
    if let Some(secret) = var(secret_name) {
        return Ok(secret);
    }

    let path = format!("/run/secrets/{secret_name}");
    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
            Error::Config(format!("{secret_name} is not set"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_load_falls_back_to_default() {
        let value: u32 = try_load("FOODGRAM_TEST_UNSET_VARIABLE", "7").unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn try_load_rejects_unparseable_default() {
        let result: Result<u32, Error> = try_load("FOODGRAM_TEST_UNSET_VARIABLE", "seven");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn export_settings_default_to_pdf_with_builtin_font() {
        let settings = ExportSettings::default();
        assert_eq!(settings.default_format, ExportFormat::Pdf);
        assert_eq!(settings.font, PdfFont::Builtin);
    }
}
