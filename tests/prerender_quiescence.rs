//! End-to-end prerender quiescence: a render scheduler waits on the cache
//! signal while tracked imports and instrumented loaders settle.

use std::sync::Arc;

use parking_lot::Mutex;
use prerender_track::test_utils::{Deferred, block_on, init_test_logging, poll_once};
use prerender_track::{
    CacheSignal, Completion, Instrumenter, LoadResult, LoaderOutput, LoaderTable, ModuleExports,
    TrackedImport, TrackingConfig, WorkUnit, track_dynamic_import,
};
use prerender_track::{test_complete, test_phase, test_section};
use proptest::prelude::*;

#[test]
fn scheduler_waits_for_awaited_imports() {
    init_test_logging();
    test_phase!("scheduler_waits_for_awaited_imports");
    let signal = CacheSignal::new_shared();
    let (layout, resolve_layout) = Deferred::<&'static str>::new();
    let (page, resolve_page) = Deferred::<&'static str>::new();

    let mut render = Box::pin(WorkUnit::prerender(signal.handle()).scope(async move {
        let layout = track_dynamic_import(layout);
        let page = track_dynamic_import(page);
        let (layout, page) = futures_lite::future::zip(layout, page).await;
        format!("{layout}/{page}")
    }));

    test_section!("first poll registers both imports");
    assert!(poll_once(&mut render).is_none());
    assert_eq!(signal.pending_reads(), 2);

    let mut ready = Box::pin(signal.cache_ready());
    assert!(poll_once(&mut ready).is_none());

    test_section!("settle in reverse order");
    resolve_page.resolve("page");
    assert!(poll_once(&mut render).is_none());
    assert_eq!(signal.pending_reads(), 1);
    assert!(poll_once(&mut ready).is_none());

    resolve_layout.resolve("layout");
    assert_eq!(poll_once(&mut render).as_deref(), Some("layout/page"));
    assert!(poll_once(&mut ready).is_some());
    assert_eq!(signal.total_reads(), 2);
    test_complete!("scheduler_waits_for_awaited_imports");
}

#[test]
fn unawaited_prefetch_holds_the_barrier() {
    init_test_logging();
    let signal = CacheSignal::new_shared();
    let (chunk, resolve_chunk) = Deferred::<u32>::new();
    let prefetched: Arc<Mutex<Option<TrackedImport<Deferred<u32>>>>> = Arc::default();

    let slot = Arc::clone(&prefetched);
    let render = WorkUnit::prerender(signal.handle()).scope(async move {
        // Started during render, never awaited by it.
        *slot.lock() = Some(track_dynamic_import(chunk));
        "shell"
    });
    assert_eq!(block_on(render), "shell");
    assert_eq!(signal.pending_reads(), 1, "render finished, load did not");

    let mut ready = Box::pin(signal.cache_ready());
    assert!(poll_once(&mut ready).is_none());

    resolve_chunk.resolve(11);
    let mut load = prefetched.lock().take().expect("prefetch started");
    assert_eq!(poll_once(&mut load), Some(11));
    assert!(poll_once(&mut ready).is_some());
}

#[test]
fn rejected_import_releases_the_barrier() {
    init_test_logging();
    let signal = CacheSignal::new_shared();
    let (chunk, resolve_chunk) = Deferred::<Result<(), String>>::new();

    let render = WorkUnit::prerender(signal.handle()).scope(async move {
        track_dynamic_import(chunk).await.map_err(|e| format!("render: {e}"))
    });
    resolve_chunk.resolve(Err("chunk 404".to_owned()));
    assert_eq!(block_on(render), Err("render: chunk 404".to_owned()));
    assert!(signal.is_quiescent());
    assert_eq!(signal.total_reads(), 1);
}

#[test]
fn import_settled_on_another_thread() {
    init_test_logging();
    let signal = CacheSignal::new_shared();
    let (chunk, resolve_chunk) = Deferred::<u8>::new();
    let tracked = WorkUnit::prerender(signal.handle()).run(|| track_dynamic_import(chunk));

    let worker = std::thread::spawn(move || block_on(tracked));
    resolve_chunk.resolve(3);
    assert_eq!(worker.join().expect("worker"), 3);
    block_on(signal.cache_ready());
    assert!(signal.is_quiescent());
}

#[test]
fn instrumented_loaders_count_during_prerender_only() {
    init_test_logging();
    test_phase!("instrumented_loaders_count_during_prerender_only");
    let signal = CacheSignal::new_shared();
    let (chunk, resolve_chunk) = Deferred::<LoadResult>::new();
    let pending_chunk = Arc::new(Mutex::new(Some(chunk)));

    let mut loaders = LoaderTable::new();
    let source = Arc::clone(&pending_chunk);
    loaders.register("__turbopack_load__", move |_: &str| -> LoaderOutput {
        match source.lock().take() {
            Some(chunk) => Completion::Pending(Box::pin(chunk)),
            None => Completion::Ready(Ok(Arc::new(()) as ModuleExports)),
        }
    });
    loaders.register("__webpack_require__", |_: &str| -> LoaderOutput {
        Completion::Ready(Ok(Arc::new("sync") as ModuleExports))
    });

    let config = TrackingConfig::from_json_str(
        r#"{ "instrumentedGlobals": ["__turbopack_load__", "__webpack_require__"] }"#,
    )
    .expect("config");
    let report = Instrumenter::new(config).expect("valid").instrument(&mut loaders);
    assert_eq!(report.wrapped.len(), 2);

    test_section!("synchronous require is not counted");
    let unit = WorkUnit::prerender(signal.handle());
    let module = unit
        .run(|| loaders.load("__webpack_require__", "react"))
        .expect("registered");
    assert!(!module.is_pending());
    assert_eq!(signal.total_reads(), 0);

    test_section!("chunk load is counted until it settles");
    let load = unit
        .run(|| loaders.load("__turbopack_load__", "app/page.js"))
        .expect("registered")
        .pending()
        .expect("chunk in flight");
    assert_eq!(signal.pending_reads(), 1);

    resolve_chunk.resolve(Ok(Arc::new(42_u32) as ModuleExports));
    let exports = block_on(load).expect("loaded");
    assert_eq!(exports.downcast_ref::<u32>(), Some(&42));
    assert!(signal.is_quiescent());

    test_section!("outside a prerender the wrapper is inert");
    let outside = loaders.load("__turbopack_load__", "other.js").expect("registered");
    assert!(!outside.is_pending());
    assert_eq!(signal.total_reads(), 1);
    test_complete!("instrumented_loaders_count_during_prerender_only");
}

proptest! {
    #[test]
    fn any_settlement_order_returns_counter_to_zero(
        order in (1_usize..8).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
    ) {
        init_test_logging();
        let signal = CacheSignal::new_shared();
        let unit = WorkUnit::prerender(signal.handle());

        let mut resolvers = Vec::new();
        let mut imports = Vec::new();
        unit.run(|| {
            for _ in 0..order.len() {
                let (import, resolver) = Deferred::<usize>::new();
                resolvers.push(Some(resolver));
                imports.push(track_dynamic_import(import));
            }
        });
        prop_assert_eq!(signal.pending_reads(), order.len());

        for (settled, &index) in order.iter().enumerate() {
            let resolver = resolvers[index].take().expect("settled once");
            resolver.resolve(index);
            prop_assert_eq!(poll_once(&mut imports[index]), Some(index));
            prop_assert_eq!(signal.pending_reads(), order.len() - settled - 1);
        }

        // Every import gave its lease back on completion.
        for import in &imports {
            prop_assert!(!import.is_tracking());
        }
        prop_assert!(signal.is_quiescent());
        prop_assert_eq!(signal.total_reads(), order.len() as u64);
    }
}
