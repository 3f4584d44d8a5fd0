//! Collection options
//!
//! Options are built once at process start and shared read-only. They can be
//! constructed in code, deserialized, or loaded from environment variables
//! with [`CollectionOptions::from_env`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::ConfigError;
use crate::record::Record;

/// Environment used when none is configured.
pub const DEFAULT_ENVIRONMENT: &str = "Development";

/// Cache lifetime for types that do not declare one.
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(60);

/// How the default-value decorator treats audit fields that already hold a
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditPolicy {
    /// Always write actor and timestamps.
    #[default]
    Overwrite,
    /// Keep values that are already set (bulk imports of historical data).
    PreserveExisting,
}

/// Connection descriptor for a document-store backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStoreOptions {
    /// Logical database name.
    pub database_name: String,
    /// Store location, e.g. `mongodb://localhost:27017`.
    pub connection_string: String,
    /// Append `-{environment}` to the database name.
    pub environment_suffix: bool,
    /// Environment qualifier; `None` reads `VELLUM_ENVIRONMENT`.
    pub environment: Option<String>,
}

impl DocumentStoreOptions {
    pub fn new(database_name: impl Into<String>, connection_string: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            connection_string: connection_string.into(),
            environment_suffix: true,
            environment: None,
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_environment_suffix(mut self, enabled: bool) -> Self {
        self.environment_suffix = enabled;
        self
    }

    /// Resolved environment qualifier.
    pub fn environment(&self) -> String {
        self.environment
            .clone()
            .or_else(|| std::env::var("VELLUM_ENVIRONMENT").ok())
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
    }

    /// Database name including the environment suffix when enabled.
    pub fn full_database_name(&self) -> String {
        if self.environment_suffix {
            format!("{}-{}", self.database_name, self.environment())
        } else {
            self.database_name.clone()
        }
    }

    /// Check the fields a document backend cannot work without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "database_name".to_string(),
            });
        }
        if self.connection_string.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "connection_string".to_string(),
            });
        }
        Ok(())
    }
}

/// Which backend the options describe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BackendOptions {
    /// Non-persistent, process-local store for tests and demos.
    InMemory,
    /// External document database.
    Document(DocumentStoreOptions),
}

impl BackendOptions {
    /// Backend kind as reported by stores.
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendOptions::InMemory => BackendKind::InMemory,
            BackendOptions::Document(_) => BackendKind::Document,
        }
    }
}

/// Backend kind tag, compared against the store at registry construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    InMemory,
    Document,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::InMemory => write!(f, "in-memory"),
            BackendKind::Document => write!(f, "document"),
        }
    }
}

/// Options shared by every pipeline a registry builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionOptions {
    pub backend: BackendOptions,
    /// Entity type names whose cached entries never expire.
    pub never_evict: BTreeSet<String>,
    /// Wrap pipelines in the timing decorator.
    pub time_logging_enabled: bool,
    /// Disable soft-delete scoping on reads (administrative access).
    pub include_deleted: bool,
    pub audit_policy: AuditPolicy,
    /// Cache lifetime for types without their own declaration.
    #[serde(with = "duration_secs")]
    pub default_cache_duration: Duration,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            backend: BackendOptions::InMemory,
            never_evict: BTreeSet::new(),
            time_logging_enabled: false,
            include_deleted: false,
            audit_policy: AuditPolicy::Overwrite,
            default_cache_duration: DEFAULT_CACHE_DURATION,
        }
    }
}

impl CollectionOptions {
    /// Options for the in-memory backend.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Options for a document-store backend.
    pub fn document(database_name: impl Into<String>, connection_string: impl Into<String>) -> Self {
        Self {
            backend: BackendOptions::Document(DocumentStoreOptions::new(
                database_name,
                connection_string,
            )),
            ..Self::default()
        }
    }

    /// Retain cached entries of `T` for the lifetime of the process.
    pub fn never_evict<T: Record>(mut self) -> Self {
        self.never_evict.insert(T::collection_name().to_string());
        self
    }

    pub fn with_never_evict_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.never_evict.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_time_logging(mut self, enabled: bool) -> Self {
        self.time_logging_enabled = enabled;
        self
    }

    pub fn with_include_deleted(mut self, enabled: bool) -> Self {
        self.include_deleted = enabled;
        self
    }

    pub fn with_audit_policy(mut self, policy: AuditPolicy) -> Self {
        self.audit_policy = policy;
        self
    }

    pub fn with_default_cache_duration(mut self, duration: Duration) -> Self {
        self.default_cache_duration = duration;
        self
    }

    /// Whether cached entries of `T` never expire.
    pub fn is_never_evict<T: Record>(&self) -> bool {
        self.never_evict.contains(T::collection_name())
    }

    /// Cache lifetime for `T`.
    pub fn cache_duration_for<T: Record>(&self) -> Duration {
        T::cache_duration().unwrap_or(self.default_cache_duration)
    }

    /// Build options from environment variables.
    ///
    /// Environment variables:
    /// - `VELLUM_DATABASE_NAME` / `VELLUM_CONNECTION_STRING`: document backend
    ///   (both unset = in-memory backend)
    /// - `VELLUM_ENVIRONMENT_SUFFIX`: "true" or "false" (default: true)
    /// - `VELLUM_NEVER_EVICT`: comma-separated entity type names
    /// - `VELLUM_TIME_LOGGING`: "true" or "false" (default: false)
    /// - `VELLUM_INCLUDE_DELETED`: "true" or "false" (default: false)
    /// - `VELLUM_PRESERVE_AUDIT_FIELDS`: "true" or "false" (default: false)
    /// - `VELLUM_CACHE_SECONDS`: default cache lifetime (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_name = std::env::var("VELLUM_DATABASE_NAME").ok();
        let connection_string = std::env::var("VELLUM_CONNECTION_STRING").ok();

        let backend = match (database_name, connection_string) {
            (None, None) => BackendOptions::InMemory,
            (database_name, connection_string) => {
                let options = DocumentStoreOptions::new(
                    database_name.unwrap_or_default(),
                    connection_string.unwrap_or_default(),
                )
                .with_environment_suffix(env_flag("VELLUM_ENVIRONMENT_SUFFIX", true));
                options.validate()?;
                BackendOptions::Document(options)
            }
        };

        let never_evict = std::env::var("VELLUM_NEVER_EVICT")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let default_cache_duration = match std::env::var("VELLUM_CACHE_SECONDS") {
            Ok(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    field: "VELLUM_CACHE_SECONDS".to_string(),
                    value: raw.clone(),
                    reason: "must be a whole number of seconds".to_string(),
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => DEFAULT_CACHE_DURATION,
        };

        let audit_policy = if env_flag("VELLUM_PRESERVE_AUDIT_FIELDS", false) {
            AuditPolicy::PreserveExisting
        } else {
            AuditPolicy::Overwrite
        };

        Ok(Self {
            backend,
            never_evict,
            time_logging_enabled: env_flag("VELLUM_TIME_LOGGING", false),
            include_deleted: env_flag("VELLUM_INCLUDE_DELETED", false),
            audit_policy,
            default_cache_duration,
        })
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.trim().to_lowercase().as_str(), "true" | "1"))
        .unwrap_or(default)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordMeta;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Country {
        #[serde(flatten)]
        meta: RecordMeta,
        code: String,
    }

    impl Record for Country {
        fn collection_name() -> &'static str {
            "Country"
        }

        fn meta(&self) -> &RecordMeta {
            &self.meta
        }

        fn meta_mut(&mut self) -> &mut RecordMeta {
            &mut self.meta
        }

        fn cache_duration() -> Option<Duration> {
            Some(Duration::from_secs(3600))
        }
    }

    #[test]
    fn test_default_options() {
        let options = CollectionOptions::default();
        assert_eq!(options.backend, BackendOptions::InMemory);
        assert!(options.never_evict.is_empty());
        assert!(!options.time_logging_enabled);
        assert!(!options.include_deleted);
        assert_eq!(options.audit_policy, AuditPolicy::Overwrite);
        assert_eq!(options.default_cache_duration, DEFAULT_CACHE_DURATION);
    }

    #[test]
    fn test_never_evict_by_type() {
        let options = CollectionOptions::in_memory().never_evict::<Country>();
        assert!(options.is_never_evict::<Country>());
        assert!(options.never_evict.contains("Country"));
    }

    #[test]
    fn test_cache_duration_for_prefers_declaration() {
        let options = CollectionOptions::in_memory()
            .with_default_cache_duration(Duration::from_secs(5));
        assert_eq!(options.cache_duration_for::<Country>(), Duration::from_secs(3600));
    }

    #[test]
    fn test_full_database_name() {
        let options = DocumentStoreOptions::new("Example", "mongodb://localhost:27017")
            .with_environment("Staging");
        assert_eq!(options.full_database_name(), "Example-Staging");

        let options = options.with_environment_suffix(false);
        assert_eq!(options.full_database_name(), "Example");
    }

    #[test]
    fn test_validate_missing_fields() {
        let options = DocumentStoreOptions::new("", "mongodb://localhost");
        assert_eq!(
            options.validate(),
            Err(ConfigError::MissingRequired {
                field: "database_name".to_string()
            })
        );

        let options = DocumentStoreOptions::new("Example", " ");
        assert!(matches!(
            options.validate(),
            Err(ConfigError::MissingRequired { field }) if field == "connection_string"
        ));
    }

    #[test]
    fn test_backend_kind() {
        assert_eq!(BackendOptions::InMemory.kind(), BackendKind::InMemory);
        let document = CollectionOptions::document("Example", "mongodb://localhost");
        assert_eq!(document.backend.kind(), BackendKind::Document);
        assert_eq!(BackendKind::Document.to_string(), "document");
    }

    #[test]
    fn test_options_serde_roundtrip_shape() {
        let options = CollectionOptions::document("Example", "mongodb://localhost")
            .with_default_cache_duration(Duration::from_secs(30));
        let encoded = serde_json::to_value(&options).unwrap();
        assert_eq!(encoded["backend"]["kind"], "document");
        assert_eq!(encoded["default_cache_duration"], 30);

        let decoded: CollectionOptions = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, options);
    }

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_from_env() {
        let _db = EnvVarGuard::set("VELLUM_DATABASE_NAME", Some("Example"));
        let _conn = EnvVarGuard::set("VELLUM_CONNECTION_STRING", Some("mongodb://db:27017"));
        let _suffix = EnvVarGuard::set("VELLUM_ENVIRONMENT_SUFFIX", Some("false"));
        let _evict = EnvVarGuard::set("VELLUM_NEVER_EVICT", Some("Country, Currency,"));
        let _timing = EnvVarGuard::set("VELLUM_TIME_LOGGING", Some("1"));
        let _deleted = EnvVarGuard::set("VELLUM_INCLUDE_DELETED", None);
        let _preserve = EnvVarGuard::set("VELLUM_PRESERVE_AUDIT_FIELDS", Some("true"));
        let _cache = EnvVarGuard::set("VELLUM_CACHE_SECONDS", Some("15"));

        let options = CollectionOptions::from_env().unwrap();
        match &options.backend {
            BackendOptions::Document(document) => {
                assert_eq!(document.full_database_name(), "Example");
                assert_eq!(document.connection_string, "mongodb://db:27017");
            }
            other => panic!("expected document backend, got {:?}", other),
        }
        assert_eq!(options.never_evict.len(), 2);
        assert!(options.never_evict.contains("Currency"));
        assert!(options.time_logging_enabled);
        assert!(!options.include_deleted);
        assert_eq!(options.audit_policy, AuditPolicy::PreserveExisting);
        assert_eq!(options.default_cache_duration, Duration::from_secs(15));

        let _bad = EnvVarGuard::set("VELLUM_CACHE_SECONDS", Some("soon"));
        assert!(matches!(
            CollectionOptions::from_env(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
