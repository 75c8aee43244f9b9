// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use qst_broadcast::config::Settings;
use qst_broadcast::position::{Fix, StaticFixProvider, StaticStations, StationPoint};
use qst_broadcast::qst::net::StaticFetcher;
use qst_broadcast::ProducerContext;

pub fn context(fetcher: Arc<StaticFetcher>) -> ProducerContext {
    context_with(fetcher, Settings::default(), None, vec![])
}

pub fn context_with(
    fetcher: Arc<StaticFetcher>,
    settings: Settings,
    fix: Option<Fix>,
    stations: Vec<StationPoint>,
) -> ProducerContext {
    ProducerContext {
        settings: Arc::new(settings),
        fetcher,
        fixes: Arc::new(StaticFixProvider::new(fix)),
        stations: Arc::new(StaticStations::new(stations)),
    }
}

/// Poll until the source's background task has finished.
pub async fn wait_idle(source: &qst_broadcast::QstSource) {
    for _ in 0..200 {
        if !source.is_busy() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("source {} stayed busy", source.key());
}
