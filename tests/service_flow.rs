// End-to-end behavior of the service boundary over a stub model.

use std::sync::Arc;
use std::time::Duration;

use indictrans_serve::model::{PlaceholderLoader, StubLoader, StubModel};
use indictrans_serve::translate::cache::CacheKey;
use indictrans_serve::{ModelPhase, ServiceConfig, TranslateError, TranslationService};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{harness, harness_with, slow_loader, test_config, write_model_dir};

#[test]
fn translates_and_populates_cache_under_fingerprint() {
    let h = harness(StubModel::new().with_mapping("Hello, how are you?", "नमस्ते, आप कैसे हैं?"));

    let out = h
        .service
        .translate(&h.service.request("Hello, how are you?", "en", "hi"))
        .unwrap();

    assert_eq!(out.translated_text, "नमस्ते, आप कैसे हैं?");
    assert!(!out.cached);
    let key = CacheKey::fingerprint("en", "hi", "Hello, how are you?");
    assert_eq!(
        h.service.cache().peek(&key).as_deref(),
        Some("नमस्ते, आप कैसे हैं?")
    );
    assert_eq!(h.service.state().phase, ModelPhase::Ready);
}

#[test]
fn multi_sentence_text_keeps_order() {
    let h = harness(
        StubModel::new()
            .with_mapping("First one.", "A")
            .with_mapping("Second one?", "B")
            .with_mapping("Third", "C"),
    );

    let out = h
        .service
        .translate(&h.service.request("First one.   Second one?\nThird", "en", "hi"))
        .unwrap();

    assert_eq!(out.translated_text, "A B C");
    assert_eq!(h.model.translate_calls(), 3);
}

#[test]
fn language_pair_is_part_of_the_cache_key() {
    let h = harness(StubModel::new());
    let a = h.service.translate(&h.service.request("Same.", "en", "hi")).unwrap();
    let b = h.service.translate(&h.service.request("Same.", "en", "ta")).unwrap();

    assert!(!b.cached);
    assert_ne!(a.translated_text, b.translated_text);
    assert_eq!(h.service.cache().len(), 2);
}

#[test]
fn cache_capacity_bounds_entries() {
    let config = ServiceConfig {
        cache_size: 2,
        ..test_config()
    };
    let h = harness_with(StubLoader::new(StubModel::new()), config);

    for text in ["one.", "two.", "three."] {
        h.service.translate(&h.service.request(text, "en", "hi")).unwrap();
    }

    assert_eq!(h.service.cache().len(), 2);
    assert!(h
        .service
        .cache()
        .peek(&CacheKey::fingerprint("en", "hi", "one."))
        .is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_async_requests_share_one_load() {
    let h = harness_with(slow_loader(Duration::from_millis(200)), test_config());

    let tasks: Vec<_> = (0..8)
        .map(|n| {
            let service = Arc::clone(&h.service);
            tokio::spawn(async move {
                let req = service.request(format!("Sentence {n}."), "en", "hi");
                service.translate_async(req).await
            })
        })
        .collect();

    for (n, task) in tasks.into_iter().enumerate() {
        let out = task.await.unwrap().unwrap();
        assert_eq!(out.translated_text, format!("[hi] Sentence {n}."));
    }
    assert_eq!(h.loader.load_calls(), 1);
}

#[tokio::test]
async fn async_readiness_bound_reports_timeout() {
    let h = harness_with(slow_loader(Duration::from_millis(500)), test_config());

    let err = h
        .service
        .translate_async_with_timeout(
            h.service.request("hello", "en", "hi"),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TranslateError::ModelTimeout(_)));
    assert!(err.is_retryable());
    assert_eq!(h.service.state().phase, ModelPhase::Loading);
}

#[test]
fn shutdown_during_load_releases_waiters() {
    let h = harness_with(slow_loader(Duration::from_millis(400)), test_config());

    let waiter = {
        let service = Arc::clone(&h.service);
        std::thread::spawn(move || service.translate(&service.request("hello", "en", "hi")))
    };
    std::thread::sleep(Duration::from_millis(50));
    h.service.shutdown();

    assert!(matches!(
        waiter.join().unwrap(),
        Err(TranslateError::ServiceUnavailable)
    ));
    let state = h.service.state();
    assert!(state.shutdown_requested);
    assert_eq!(state.phase, ModelPhase::ShutDown);
}

#[test]
fn placeholder_backend_loads_from_a_model_dir() {
    let dir = tempfile::tempdir().unwrap();
    write_model_dir(dir.path(), "▁the\n▁of\n");
    let config = ServiceConfig {
        model_dir: dir.path().to_path_buf(),
        ..test_config()
    };

    let service = TranslationService::start(&config, Arc::new(PlaceholderLoader)).unwrap();
    let out = service
        .translate(&service.request("Good night.", "en", "bn"))
        .unwrap();

    assert_eq!(out.translated_text, "[Translated from en to bn]: Good night.");
}

#[test]
fn missing_artifacts_surface_as_model_load() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig {
        model_dir: dir.path().to_path_buf(),
        ..test_config()
    };

    let service = TranslationService::start(&config, Arc::new(PlaceholderLoader)).unwrap();
    let err = service
        .translate(&service.request("hello", "en", "hi"))
        .unwrap_err();

    assert!(matches!(err, TranslateError::ModelLoad(_)));
    assert_eq!(err.status_code(), 503);
    assert_eq!(service.state().phase, ModelPhase::Failed);
}

#[test]
fn panicking_loader_is_reported_as_load_failure_immediately() {
    let h = harness_with(StubLoader::new(StubModel::new()).panicking(), test_config());

    let started = std::time::Instant::now();
    let err = h
        .service
        .translate(&h.service.request("hello", "en", "hi"))
        .unwrap_err();

    assert!(matches!(err, TranslateError::ModelLoad(_)));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(h.service.state().phase, ModelPhase::Failed);
}

#[test]
fn oversized_timeout_is_rejected_at_construction() {
    let config = ServiceConfig {
        load_timeout_secs: u64::MAX,
        ..test_config()
    };
    let loader = Arc::new(StubLoader::new(StubModel::new()));
    assert!(TranslationService::lazy(&config, loader).is_err());
}
