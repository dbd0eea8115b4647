// tests/config_load.rs
use feedhook::config::{resolve_cache_path, Config, DEFAULT_CACHE_PATH, ENV_CACHE_PATH, ENV_CONFIG_PATH};
use feedhook::error::ConfigError;
use serde_json::json;
use std::{env, fs, path::PathBuf};

#[test]
fn loads_yaml_toml_and_json_by_extension() {
    let dir = tempfile::tempdir().unwrap();

    let p_yaml = dir.path().join("config.yaml");
    fs::write(
        &p_yaml,
        "webhook: https://hook.test/1\nsources:\n  a:\n    feed: https://a.test/rss\n",
    )
    .unwrap();
    let cfg = Config::load_from(&p_yaml).unwrap();
    assert_eq!(cfg.sources[0].name, "a");
    assert_eq!(cfg.sources[0].id, json!("id"));

    let p_toml = dir.path().join("config.toml");
    fs::write(
        &p_toml,
        "webhook = \"https://hook.test/2\"\n[sources.b]\nfeed = \"https://b.test/rss\"\nid = \"$entry.link\"\n",
    )
    .unwrap();
    let cfg = Config::load_from(&p_toml).unwrap();
    assert_eq!(cfg.source("b").unwrap().id, json!("$entry.link"));

    let p_json = dir.path().join("config.json");
    fs::write(
        &p_json,
        r#"{"webhook":"https://hook.test/3","sources":{"c":{"feed":"https://c.test/rss","embed":{"colour":1}}}}"#,
    )
    .unwrap();
    let cfg = Config::load_from(&p_json).unwrap();
    assert_eq!(cfg.source("c").unwrap().embed.colour(), Some(&json!(1)));
}

#[test]
fn unreadable_and_invalid_files_are_config_errors() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("nope.yaml");
    assert!(matches!(
        Config::load_from(&missing),
        Err(ConfigError::Read { .. })
    ));

    let broken = dir.path().join("broken.yaml");
    fs::write(&broken, "webhook: [unterminated\n").unwrap();
    assert!(matches!(
        Config::load_from(&broken),
        Err(ConfigError::Parse { .. })
    ));

    let empty_hook = dir.path().join("empty.yaml");
    fs::write(&empty_hook, "webhook: ''\nsources: {}\n").unwrap();
    assert!(matches!(
        Config::load_from(&empty_hook),
        Err(ConfigError::Invalid(_))
    ));
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Isolate CWD so the test never reads a real config from the repo
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_CONFIG_PATH);
    env::remove_var(ENV_CACHE_PATH);

    // 1) Nothing anywhere → error
    assert!(Config::load_default().is_err());
    assert_eq!(resolve_cache_path(), PathBuf::from(DEFAULT_CACHE_PATH));

    // 2) ./config.yaml fallback
    fs::write(
        tmp.path().join("config.yaml"),
        "webhook: https://hook.test/cwd\nsources: {}\n",
    )
    .unwrap();
    assert_eq!(Config::load_default().unwrap().webhook, "https://hook.test/cwd");

    // 3) Env wins
    let p_env = tmp.path().join("other.json");
    fs::write(&p_env, r#"{"webhook":"https://hook.test/env","sources":{}}"#).unwrap();
    env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
    assert_eq!(Config::load_default().unwrap().webhook, "https://hook.test/env");

    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.yaml").display().to_string());
    assert!(matches!(Config::load_default(), Err(ConfigError::Invalid(_))));
    env::remove_var(ENV_CONFIG_PATH);

    env::set_var(ENV_CACHE_PATH, "/var/lib/feedhook/cursors.json");
    assert_eq!(resolve_cache_path(), PathBuf::from("/var/lib/feedhook/cursors.json"));
    env::remove_var(ENV_CACHE_PATH);

    env::set_current_dir(&old).unwrap();
}
