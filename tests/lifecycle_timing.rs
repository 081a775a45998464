// Timing properties of background loading seen through the service.

use std::sync::Arc;
use std::time::{Duration, Instant};

use indictrans_serve::model::{StubLoader, StubModel};
use indictrans_serve::translate::cache::CacheKey;
use indictrans_serve::{ModelError, ModelPhase, ServiceConfig, TranslateError};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{harness_with, slow_loader, test_config};

#[test]
fn cache_hits_are_served_while_the_model_loads() {
    let h = harness_with(slow_loader(Duration::from_millis(500)), test_config());
    let key = CacheKey::fingerprint("en", "hi", "warm entry");
    h.service.cache().put(key, "गर्म".into());
    h.service.core().lifecycle().start().unwrap();

    let started = Instant::now();
    let out = h
        .service
        .translate(&h.service.request("warm entry", "en", "hi"))
        .unwrap();

    assert!(out.cached);
    assert_eq!(out.translated_text, "गर्म");
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(h.service.state().phase, ModelPhase::Loading);
}

#[test]
fn load_past_its_timeout_fails_distinctly() {
    let config = ServiceConfig {
        load_timeout_secs: 1,
        ..test_config()
    };
    let h = harness_with(slow_loader(Duration::from_millis(1500)), config);

    let started = Instant::now();
    let err = h
        .service
        .translate(&h.service.request("hello", "en", "hi"))
        .unwrap_err();

    assert!(matches!(err, TranslateError::ModelTimeout(_)));
    assert!(started.elapsed() < Duration::from_millis(1400));
    assert_eq!(h.service.state().phase, ModelPhase::Failed);
}

#[test]
fn failed_load_is_not_retried_until_reload() {
    let loader = StubLoader::new(StubModel::new())
        .failing_with(ModelError::Init("cuda unavailable".into()));
    let h = harness_with(loader, test_config());

    for _ in 0..3 {
        let err = h
            .service
            .translate(&h.service.request("hello", "en", "hi"))
            .unwrap_err();
        assert!(matches!(err, TranslateError::ModelLoad(_)));
    }
    assert_eq!(h.loader.load_calls(), 1);

    h.service.reload().unwrap();
    let _ = h.service.translate(&h.service.request("hello", "en", "hi"));
    assert_eq!(h.loader.load_calls(), 2);
}

#[test]
fn concurrent_blocking_callers_wait_for_one_load() {
    let h = harness_with(slow_loader(Duration::from_millis(200)), test_config());

    let threads: Vec<_> = (0..6)
        .map(|n| {
            let service = Arc::clone(&h.service);
            std::thread::spawn(move || {
                service
                    .translate(&service.request(format!("Line {n}."), "en", "hi"))
                    .map(|o| o.translated_text)
            })
        })
        .collect();

    for (n, t) in threads.into_iter().enumerate() {
        assert_eq!(t.join().unwrap().unwrap(), format!("[hi] Line {n}."));
    }
    assert_eq!(h.loader.load_calls(), 1);
    assert!(h.service.state().last_used_ms.is_some());
}
