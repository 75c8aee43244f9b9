// tests/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use qst_broadcast::config::{QstConfig, QstPort};
use qst_broadcast::qst::net::StaticFetcher;
use qst_broadcast::{schedule_from_config, spawn_scheduler, Capabilities, Frequency};
use tokio::sync::mpsc;

mod common;

const CONFIG: &str = r#"
[qst.beacon]
type = "Text"
freq = "1"
content = "CQ CQ de N0CALL"
port = "VHF"

[qst.hourly]
type = "Text"
freq = ":15"
content = "hourly"

[qst.off]
type = "Text"
freq = "1"
content = "never"
enabled = false

[qst.bogus]
type = "Telex"
content = "x"

[qst.badfreq]
type = "Text"
freq = "soon"
content = "x"
"#;

#[tokio::test]
async fn only_valid_enabled_entries_are_scheduled() {
    let cfg = QstConfig::from_toml_str(CONFIG).unwrap();
    let ctx = common::context(Arc::new(StaticFetcher::new("")));
    let scheduled = schedule_from_config(&cfg, Capabilities::all(), &ctx);

    let keys: Vec<&str> = scheduled.iter().map(|s| s.source.key()).collect();
    assert_eq!(keys, vec!["beacon", "hourly"]);
    assert_eq!(scheduled[0].frequency, Frequency::Every(1));
    assert_eq!(scheduled[0].port, QstPort::Named("VHF".into()));
    assert_eq!(scheduled[1].frequency, Frequency::AtMinute(15));
    assert_eq!(scheduled[1].port, QstPort::All);
}

#[tokio::test(start_paused = true)]
async fn interval_entries_fire_repeatedly() {
    let cfg = QstConfig::from_toml_str(
        "[qst.beacon]\ntype = \"Text\"\nfreq = \"1\"\ncontent = \"CQ\"\n",
    )
    .unwrap();
    let ctx = common::context(Arc::new(StaticFetcher::new("")));
    let scheduled = schedule_from_config(&cfg, Capabilities::all(), &ctx);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handles = spawn_scheduler(scheduled, tx);

    // Nothing at startup.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(rx.try_recv().is_err());

    let first = rx.recv().await.unwrap();
    assert_eq!(first.text, "[QST] CQ");
    assert_eq!(first.key, "beacon");
    let second = rx.recv().await.unwrap();
    assert_eq!(second.text, "[QST] CQ");

    for h in handles {
        h.abort();
    }
}
