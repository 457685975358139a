use anyhow::{Context, Result, anyhow};
use platform_authz::roles::{DEFAULT_ROLE, parse_role};
use platform_db::DatabaseSettings;
use platform_obs::ObsConfig;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub default_role: String,
    pub obs: ObsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let default_role = match std::env::var("DEFAULT_ROLE") {
            Ok(raw) if !raw.trim().is_empty() => {
                parse_role(&raw).map_err(|reason| anyhow!("DEFAULT_ROLE {reason}"))?
            }
            _ => DEFAULT_ROLE.to_string(),
        };

        let obs = ObsConfig::from_env().context("invalid LOG_FORMAT")?;

        Ok(Self {
            database: DatabaseSettings::from_env(),
            default_role,
            obs,
        })
    }
}
