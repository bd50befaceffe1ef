//! Process configuration read from the environment (after `.env` is loaded)

use std::time::Duration;

use crate::services::crop_service::QuantityPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthBackend {
    Firebase { api_key: String, cache_ttl: Duration },
    /// `token:email` pairs
    Static { tokens: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    pub store: StoreBackend,
    pub auth: AuthBackend,
    pub quantity_policy: QuantityPolicy,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes `std::env::var`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port: u16 = match get("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                message: format!("'{}' is not a port number", raw),
            })?,
            None => 3000,
        };

        let store = match get("STORE").as_deref().unwrap_or("postgres") {
            "postgres" => StoreBackend::Postgres {
                database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            },
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    key: "STORE",
                    message: format!("unknown store '{}'", other),
                });
            }
        };

        let auth = match get("AUTH_PROVIDER").as_deref().unwrap_or("firebase") {
            "firebase" => {
                let cache_ttl: u64 = match get("AUTH_CACHE_TTL_SECS") {
                    Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                        key: "AUTH_CACHE_TTL_SECS",
                        message: format!("'{}' is not a number of seconds", raw),
                    })?,
                    None => 300,
                };
                AuthBackend::Firebase {
                    api_key: get("FIREBASE_API_KEY")
                        .ok_or(ConfigError::Missing("FIREBASE_API_KEY"))?,
                    cache_ttl: Duration::from_secs(cache_ttl),
                }
            }
            "static" => AuthBackend::Static {
                tokens: get("AUTH_STATIC_TOKENS")
                    .ok_or(ConfigError::Missing("AUTH_STATIC_TOKENS"))?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "AUTH_PROVIDER",
                    message: format!("unknown provider '{}'", other),
                });
            }
        };

        let quantity_policy: QuantityPolicy = match get("QUANTITY_POLICY") {
            Some(raw) => raw.parse().map_err(|message| ConfigError::Invalid {
                key: "QUANTITY_POLICY",
                message,
            })?,
            None => QuantityPolicy::default(),
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            store,
            auth,
            quantity_policy,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/agronet"),
            ("FIREBASE_API_KEY", "key"),
        ])
        .unwrap();

        assert_eq!(config.listen_addr(), "0.0.0.0:3000");
        assert_eq!(config.quantity_policy, QuantityPolicy::Saturate);
        assert_eq!(
            config.auth,
            AuthBackend::Firebase {
                api_key: "key".to_string(),
                cache_ttl: Duration::from_secs(300),
            }
        );
    }

    #[test]
    fn test_memory_store_with_static_auth() {
        let config = config(&[
            ("STORE", "memory"),
            ("AUTH_PROVIDER", "static"),
            ("AUTH_STATIC_TOKENS", "t:a@example.com"),
            ("PORT", "8080"),
            ("QUANTITY_POLICY", "reject"),
        ])
        .unwrap();

        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.port, 8080);
        assert_eq!(config.quantity_policy, QuantityPolicy::RejectIfInsufficient);
    }

    #[test]
    fn test_missing_and_invalid_values() {
        assert!(matches!(
            config(&[("FIREBASE_API_KEY", "key")]),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
        assert!(matches!(
            config(&[
                ("STORE", "memory"),
                ("AUTH_PROVIDER", "static"),
                ("AUTH_STATIC_TOKENS", "t:a"),
                ("PORT", "http"),
            ]),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));
        assert!(matches!(
            config(&[("STORE", "mongo")]),
            Err(ConfigError::Invalid { key: "STORE", .. })
        ));
    }
}
