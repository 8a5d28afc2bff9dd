use fabrica_watch::{
    EmitContext, Level, LocalSwitchSource, MemoryEventSink, PayloadType, SinkOptions, SwitchDef,
    SwitchError, SwitchSource, WatchLayer, WatchSink,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::prelude::*;

fn start(default_level: Level) -> (WatchSink<MemoryEventSink>, MemoryEventSink, Arc<dyn SwitchSource>) {
    let sink = MemoryEventSink::new();
    let switches: Arc<dyn SwitchSource> =
        Arc::new(LocalSwitchSource::with_switches(default_level, &[]).unwrap());
    let options = SinkOptions {
        domain: "orders".to_string(),
        flush_interval: Duration::from_millis(5),
        ..Default::default()
    };
    let watch = WatchSink::start(options, sink.clone(), Arc::clone(&switches)).unwrap();
    (watch, sink, switches)
}

#[derive(Debug, thiserror::Error)]
#[error("card declined")]
struct Declined;

#[derive(Debug, thiserror::Error)]
#[error("checkout failed")]
struct CheckoutFailed(#[source] Declined);

#[tokio::test]
async fn test_blank_category_is_rejected() {
    let (watch, _sink, _switches) = start(Level::Trace);
    assert!(matches!(
        watch.logger("  ", EmitContext::default()),
        Err(SwitchError::BlankCategory)
    ));
    watch.shutdown().await;
}

#[tokio::test]
async fn test_method_tracer_emits_paired_records() {
    let (watch, sink, _switches) = start(Level::Trace);
    let logger = watch
        .logger("Orders.Checkout", EmitContext::new("corr-9"))
        .unwrap();

    {
        let mut tracer = logger.enter_method("submit");
        tokio::time::sleep(Duration::from_millis(5)).await;
        tracer.finish();
        assert!(tracer.is_finished());
        // Dropping after finish must not emit again
    }
    watch.shutdown().await;

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].title, "Entering submit");
    assert_eq!(events[0].nesting, 1);
    assert_eq!(events[0].severity(), Level::Trace);

    assert!(events[1].title.starts_with("Exiting submit ("));
    assert!(events[1].title.ends_with(" ms)"));
    assert_eq!(events[1].nesting, -1);
    assert_eq!(events[1].payload_kind(), PayloadType::Json);
    assert_eq!(events[1].correlation_id, "corr-9");

    let payload: serde_json::Value = serde_json::from_str(&events[1].payload).unwrap();
    assert_eq!(payload["method"], "submit");
    assert!(payload["elapsed_ms"].as_f64().unwrap() >= 5.0);
}

#[tokio::test]
async fn test_method_tracer_finishes_on_drop() {
    let (watch, sink, _switches) = start(Level::Trace);
    let logger = watch.logger("Orders", EmitContext::default()).unwrap();

    drop(logger.enter_method("reserve"));
    watch.shutdown().await;

    let titles: Vec<_> = sink.events().into_iter().map(|e| e.title).collect();
    assert_eq!(titles.len(), 2);
    assert!(titles[1].starts_with("Exiting reserve"));
}

#[tokio::test]
async fn test_method_tracer_silent_when_trace_disabled() {
    let (watch, sink, _switches) = start(Level::Info);
    let logger = watch.logger("Orders", EmitContext::default()).unwrap();

    let tracer = logger.enter_method("quiet");
    drop(tracer);
    logger.info("visible");
    watch.shutdown().await;

    let titles: Vec<_> = sink.events().into_iter().map(|e| e.title).collect();
    assert_eq!(titles, vec!["visible"]);
}

#[tokio::test]
async fn test_exit_record_checks_switch_at_exit_time() {
    let (watch, sink, switches) = start(Level::Trace);
    let logger = watch.logger("Orders.Checkout", EmitContext::default()).unwrap();

    let tracer = logger.enter_method("pay");
    switches
        .update(&[SwitchDef::new("Orders", Level::Info)])
        .unwrap();
    drop(tracer);
    watch.shutdown().await;

    let titles: Vec<_> = sink.events().into_iter().map(|e| e.title).collect();
    assert_eq!(titles, vec!["Entering pay"]);
}

#[tokio::test]
async fn test_error_and_object_payloads() {
    let (watch, sink, _switches) = start(Level::Trace);
    let logger = watch.logger("Orders.Checkout", EmitContext::default()).unwrap();

    logger.error_with("checkout aborted", &CheckoutFailed(Declined));
    logger.object(
        Level::Info,
        "cart",
        &serde_json::json!({ "items": 3, "total": "12.50" }),
    );
    watch.shutdown().await;

    let events = sink.events();
    assert_eq!(events.len(), 2);

    assert_eq!(events[0].payload_kind(), PayloadType::Text);
    assert!(events[0].payload.contains("checkout failed"));
    assert!(events[0].payload.contains("Caused by: card declined"));
    assert!(events[0]
        .error_type
        .as_deref()
        .unwrap()
        .ends_with("CheckoutFailed"));

    assert_eq!(events[1].payload_kind(), PayloadType::Json);
    let payload: serde_json::Value = serde_json::from_str(&events[1].payload).unwrap();
    assert_eq!(payload["items"], 3);
}

#[tokio::test]
async fn test_with_context_keeps_category() {
    let (watch, sink, _switches) = start(Level::Trace);
    let logger = watch.logger("Orders", EmitContext::default()).unwrap();
    let tenant_logger = logger.with_context(EmitContext::new("req-1").with_subject("user-5"));

    tenant_logger.warning("limit reached");
    watch.shutdown().await;

    let events = sink.events();
    assert_eq!(tenant_logger.category(), "Orders");
    assert_eq!(events[0].category, "Orders");
    assert_eq!(events[0].correlation_id, "req-1");
    assert_eq!(events[0].subject, "user-5");
}

#[tokio::test]
async fn test_tracing_events_are_bridged() {
    let (watch, sink, switches) = start(Level::Warning);
    switches
        .update(&[SwitchDef::new("billing", Level::Info)])
        .unwrap();

    let layer = WatchLayer::with_context(watch.emitter(), EmitContext::new("bridge"));
    let subscriber = tracing_subscriber::registry().with(layer);
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(target: "billing::invoice", invoice = 7, paid = true, "Invoice issued");
        tracing::debug!(target: "billing::invoice", "below switch level");
        tracing::info!(target: "shipping", "below default level");
        tracing::error!(target: "fabrica_watch::sink", "internal diagnostics");
    });
    watch.shutdown().await;

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].category, "billing.invoice");
    assert_eq!(events[0].title, "Invoice issued");
    assert_eq!(events[0].correlation_id, "bridge");
    assert_eq!(events[0].severity(), Level::Info);

    let payload: serde_json::Value = serde_json::from_str(&events[0].payload).unwrap();
    assert_eq!(payload["invoice"], 7);
    assert_eq!(payload["paid"], true);
}
