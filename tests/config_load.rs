// tests/config_load.rs
use std::{env, fs};

use qst_broadcast::config::{QstConfig, QstEntry, DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH};
use qst_broadcast::QstError;

const SAMPLE: &str = r#"
[settings]
callsign = "w1aw"
qst_size_limit = 512

[qst.beacon]
type = "Text"
freq = "30"
content = "QRV on 146.52"

[qst.alerts]
type = "CAP"
freq = ":05"
content = "https://alerts.example.org/cap.xml"
port = "VHF"
"#;

#[test]
fn explicit_path_wins() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("qst.toml");
    fs::write(&p, SAMPLE).unwrap();

    let cfg = QstConfig::load(Some(&p)).unwrap();
    assert_eq!(cfg.settings.callsign, "W1AW");
    assert_eq!(cfg.settings.qst_size_limit, 512);
    assert_eq!(cfg.qst.len(), 2);
    assert_eq!(cfg.entry("alerts").unwrap().port.as_str(), "VHF");

    let missing = dir.path().join("missing.toml");
    assert!(QstConfig::load(Some(&missing)).is_err());
}

#[test]
fn save_then_load_keeps_entries() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("nested").join("qst.toml");

    let mut cfg = QstConfig::from_toml_str(SAMPLE).unwrap();
    cfg.upsert(
        "wx",
        QstEntry {
            kind: "OpenWeather".into(),
            freq: ":00".into(),
            content: "Current/Portland,US".into(),
            port: "all".into(),
            enabled: false,
        },
    );
    assert!(cfg.remove("beacon").is_some());
    cfg.save_to(&p).unwrap();

    let back = QstConfig::load_from(&p).unwrap();
    assert_eq!(back.qst.len(), 2);
    let wx = back.entry("wx").unwrap();
    assert!(wx.enabled);
    assert_eq!(wx.content, "Current/Portland,US");
    assert!(matches!(back.entry("beacon"), Err(QstError::UnknownEntry(_))));
}

#[test]
fn broken_toml_is_an_error() {
    assert!(QstConfig::from_toml_str("[qst.x]\ntype = ").is_err());
    // `type` is required.
    assert!(QstConfig::from_toml_str("[qst.x]\nfreq = \"5\"").is_err());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Keep the repo's own config/ out of the way.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_CONFIG_PATH);

    // 1) Nothing anywhere: empty config.
    let cfg = QstConfig::load(None).unwrap();
    assert!(cfg.qst.is_empty());

    // 2) Fallback file under ./config/
    let fallback = tmp.path().join(DEFAULT_CONFIG_PATH);
    fs::create_dir_all(fallback.parent().unwrap()).unwrap();
    fs::write(&fallback, SAMPLE).unwrap();
    let cfg = QstConfig::load(None).unwrap();
    assert_eq!(cfg.qst.len(), 2);

    // 3) Env var takes precedence.
    let p_env = tmp.path().join("other.toml");
    fs::write(&p_env, "[qst.only]\ntype = \"Text\"\ncontent = \"hi\"\n").unwrap();
    env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
    let cfg = QstConfig::load(None).unwrap();
    assert_eq!(cfg.qst.keys().collect::<Vec<_>>(), vec!["only"]);

    // 4) Env var pointing nowhere is an error, not a silent fallback.
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("nope.toml").display().to_string());
    assert!(QstConfig::load(None).is_err());
    env::remove_var(ENV_CONFIG_PATH);

    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn openweather_key_can_come_from_env() {
    env::set_var("OPENWEATHER_APPID", "from-env");
    let cfg = QstConfig::from_toml_str("[settings]\nqst_owappid = \"ENV\"\n").unwrap();
    assert_eq!(cfg.settings.qst_owappid, "from-env");
    env::remove_var("OPENWEATHER_APPID");
}
