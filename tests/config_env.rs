// tests/config_env.rs
//
// Config discovery: $AVDEALS_CONFIG_PATH, then config/avdeals.toml, then defaults.
// Every test mutates process env / CWD, so they are serialized.

use std::{env, fs};

use av_deals::config::{
    AppConfig, ENV_CACHE_CLEAR_SECS, ENV_CHROME_EXECUTABLE, ENV_CONFIG_PATH,
    ENV_SELECTOR_TIMEOUT_MS, ENV_VERIFY_BATCH,
};
use serial_test::serial;

struct CwdGuard(std::path::PathBuf);

impl Drop for CwdGuard {
    fn drop(&mut self) {
        let _ = env::set_current_dir(&self.0);
    }
}

fn isolate() -> (tempfile::TempDir, CwdGuard) {
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    for key in [
        ENV_CONFIG_PATH,
        ENV_VERIFY_BATCH,
        ENV_CACHE_CLEAR_SECS,
        ENV_SELECTOR_TIMEOUT_MS,
        ENV_CHROME_EXECUTABLE,
    ] {
        env::remove_var(key);
    }
    (tmp, CwdGuard(old))
}

#[serial]
#[test]
fn no_file_gives_defaults() {
    let (_tmp, _cwd) = isolate();
    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg, AppConfig::default());
}

#[serial]
#[test]
fn default_path_is_used_when_present() {
    let (tmp, _cwd) = isolate();
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join("config/avdeals.toml"),
        "sources = [\"ebay\"]\nreddit_max_listings = 5\n",
    )
    .unwrap();

    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.sources, vec!["ebay"]);
    assert_eq!(cfg.reddit_max_listings, 5);
}

#[serial]
#[test]
fn env_path_wins_and_env_overrides_apply() {
    let (tmp, _cwd) = isolate();
    let p = tmp.path().join("custom.toml");
    fs::write(
        &p,
        r#"
        sources = ["mart"]
        verify_batch_size = 3

        [[remote]]
        name = "eu"
        base_url = "http://10.0.0.5:8000"
        endpoint = "/api/ebay"
        "#,
    )
    .unwrap();
    env::set_var(ENV_CONFIG_PATH, p.display().to_string());
    env::set_var(ENV_VERIFY_BATCH, "7");

    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.sources, vec!["mart"]);
    assert_eq!(cfg.verify_batch_size, 7);
    assert_eq!(cfg.remote.len(), 1);
    assert_eq!(cfg.remote[0].endpoint, "/api/ebay");

    env::remove_var(ENV_CONFIG_PATH);
    env::remove_var(ENV_VERIFY_BATCH);
}

#[serial]
#[test]
fn env_path_must_exist() {
    let (_tmp, _cwd) = isolate();
    env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
    assert!(AppConfig::load_default().is_err());
    env::remove_var(ENV_CONFIG_PATH);
}

#[tokio::test]
async fn unknown_source_name_fails_registry() {
    let cfg = AppConfig::from_toml_str(r#"sources = ["ebay", "craigslist"]"#).unwrap();
    let launcher = std::sync::Arc::new(av_deals::browser::FixtureLauncher::new());
    let err = match av_deals::sources::SourceRegistry::from_config(&cfg, launcher) {
        Ok(_) => panic!("craigslist is not a known source"),
        Err(e) => e,
    };
    assert!(err.to_string().contains("craigslist"));
}
