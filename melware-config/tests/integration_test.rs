//! Integration tests for melware-config

use melware_config::*;
use std::io::Write;
use std::time::Duration;
use temp_env::with_vars;

#[test]
fn test_default_config_validation() {
    let config = MelwareConfig::default();
    assert!(config.validate_all().is_ok());
    assert!(config.jwt.is_none());
    assert!(config.favicon.is_none());
}

#[test]
fn test_config_loader_from_env() {
    let vars = vec![
        ("MELWARE_CORS_ALLOW_ORIGINS", Some("http://google.com, https://github.com")),
        ("MELWARE_JWT_SECRET", Some("env-secret")),
        ("MELWARE_LOG_LEVEL", Some("debug")),
        ("MELWARE_CACHE_DEFAULT_TTL", Some("90")),
        ("MELWARE_SESSION_COOKIE_NAME", Some("sid")),
        ("MELWARE_SESSION_SECRET", Some("an-environment-session-secret-0123")),
    ];

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();

        assert_eq!(config.cors.allow_origins, vec!["http://google.com", "https://github.com"]);
        assert_eq!(config.jwt.as_ref().unwrap().secret, "env-secret");
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.cache.default_ttl, Duration::from_secs(90));
        assert_eq!(config.session.cookie_name, "sid");
        assert_eq!(config.session.secret.as_deref(), Some("an-environment-session-secret-0123"));
    });
}

#[test]
fn test_invalid_env_value_is_reported() {
    with_vars(vec![("MELWARE_LOG_LEVEL", Some("loud"))], || {
        let result = ConfigLoader::new().from_env();
        assert!(matches!(result, Err(ConfigError::EnvError(_))));
    });
}

#[test]
fn test_redis_backend_from_env_requires_url() {
    with_vars(
        vec![("MELWARE_CACHE_BACKEND", Some("redis")), ("MELWARE_REDIS_URL", None::<&str>)],
        || {
            let result = ConfigLoader::new().from_env();
            assert!(matches!(result, Err(ConfigError::DomainError { ref domain, .. }) if domain == "cache"));
        },
    );
}

#[test]
fn test_yaml_config_serialization() {
    let config = MelwareConfig::default();
    let yaml = serde_yaml::to_string(&config).unwrap();

    let parsed: MelwareConfig = serde_yaml::from_str(&yaml).unwrap();
    assert!(parsed.validate_all().is_ok());
    assert_eq!(parsed.cors, config.cors);
}

#[test]
fn test_comprehensive_config_file() {
    let yaml = r#"
cors:
  allow_origins: ["http://google.com"]
  allow_methods: [" GeT ", "post"]
  expose_headers: ["x-user"]
  allow_credentials: false
  max_age: 43200

jwt:
  realm: melware
  secret: "file-secret"
  timeout: 1800
  max_refresh: 3600
  token_lookup: "cookie:jwt"

session:
  cookie_name: app_session
  max_age: 3600
  secure: true

cache:
  backend: in_memory
  key_prefix: pages
  default_ttl: 120

compression:
  level: fastest

favicon:
  path: static/favicon.ico

logging:
  level: warn
  format: json
"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let config = with_vars(vec![("MELWARE_JWT_SECRET", None::<&str>)], || {
        ConfigLoader::new().from_file(file.path()).unwrap()
    });

    assert_eq!(config.cors.allow_origins, vec!["http://google.com"]);
    assert_eq!(config.cors.max_age, Duration::from_secs(43200));

    let jwt = config.jwt.unwrap();
    assert_eq!(jwt.realm, "melware");
    assert_eq!(jwt.timeout, Duration::from_secs(1800));
    assert_eq!(jwt.token_lookup_parts(), Some(("cookie", "jwt")));

    assert_eq!(config.session.cookie_name, "app_session");
    assert!(config.session.secure);
    assert_eq!(config.cache.key_prefix, "pages");
    assert_eq!(config.compression.level, CompressionLevel::Fastest);
    assert_eq!(config.favicon.unwrap().max_age, Duration::from_secs(31_536_000));
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_invalid_jwt_section_fails_validation() {
    let yaml = r#"
jwt:
  secret: ""
"#;
    let result = with_vars(vec![("MELWARE_JWT_SECRET", None::<&str>)], || ConfigLoader::new().from_yaml(yaml));
    assert!(matches!(result, Err(ConfigError::DomainError { ref domain, .. }) if domain == "jwt"));
}

#[test]
fn test_missing_file() {
    let result = ConfigLoader::new().from_file("/definitely/not/here.yaml");
    assert!(matches!(result, Err(ConfigError::FileReadError(_))));
}

#[test]
fn test_sample_generation() {
    let sample = MelwareConfig::generate_sample();
    assert!(sample.contains("cors"));
    assert!(sample.contains("allow_origins"));
}
