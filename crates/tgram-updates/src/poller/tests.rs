//! Tests for the long-polling loop, driven by a scripted `BotApi`.

use super::*;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tgram_core::error::TgramError;
use tgram_core::types::ResponseParameters;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Scripted API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Call {
    method: String,
    params: Value,
    at: Instant,
}

impl Call {
    fn offset(&self) -> i64 {
        self.params["offset"].as_i64().unwrap_or(0)
    }
}

/// Answers calls from a queue. Once the queue is empty, calls hang like an
/// idle long poll.
struct MockApi {
    responses: Mutex<VecDeque<Result<Value, TgramError>>>,
    calls: Mutex<Vec<Call>>,
}

impl MockApi {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn push_updates(&self, ids: &[i64]) {
        let batch: Vec<Value> = ids.iter().map(|id| message_update(*id)).collect();
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(Value::Array(batch)));
    }

    fn push_ok(&self, value: Value) {
        self.responses.lock().unwrap().push_back(Ok(value));
    }

    fn push_err(&self, err: TgramError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    fn fetches(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == "getUpdates")
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BotApi for MockApi {
    async fn call(&self, method: &str, params: Value) -> Result<Value, TgramError> {
        self.calls.lock().unwrap().push(Call {
            method: method.to_string(),
            params,
            at: Instant::now(),
        });
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => std::future::pending().await,
        }
    }
}

fn message_update(id: i64) -> Value {
    json!({
        "update_id": id,
        "message": {
            "message_id": id,
            "date": 1_700_000_000,
            "chat": {"id": 100, "type": "private"},
            "text": format!("message {id}"),
        }
    })
}

fn transient() -> TgramError {
    TgramError::Http("connection reset".into())
}

fn config_at(offset: i64) -> PollerConfig {
    PollerConfig {
        params: GetUpdatesParams {
            offset,
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn wait_for_fetches(api: &MockApi, n: usize) {
    for _ in 0..1000 {
        if api.fetches().len() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {n} fetches, saw {}", api.fetches().len());
}

async fn recv_ids(stream: &mut UpdateStream, n: usize) -> Vec<i64> {
    let mut ids = Vec::new();
    for _ in 0..n {
        ids.push(stream.recv().await.expect("stream ended early").update_id);
    }
    ids
}

// ---------------------------------------------------------------------------
// Cursor and ordering
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_batch_delivered_in_order_and_cursor_advances() {
    let api = MockApi::new();
    api.push_updates(&[5, 6, 7]);

    let poller = Poller::new(api.clone(), config_at(5));
    let cursor = poller.cursor();
    let mut stream = poller.start();

    assert_eq!(recv_ids(&mut stream, 3).await, vec![5, 6, 7]);

    wait_for_fetches(&api, 2).await;
    let fetches = api.fetches();
    assert_eq!(fetches[0].offset(), 5);
    assert_eq!(fetches[1].offset(), 8, "next fetch must acknowledge the batch");
    assert_eq!(cursor.get(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_batch_is_sorted() {
    let api = MockApi::new();
    api.push_updates(&[3, 1, 2]);

    let mut stream = Poller::new(api.clone(), config_at(0)).start();
    assert_eq!(recv_ids(&mut stream, 3).await, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_delivered_update_deep_equals_wire_payload() {
    let api = MockApi::new();
    api.push_updates(&[42]);

    let mut stream = Poller::new(api.clone(), config_at(0)).start();
    let update = stream.recv().await.unwrap();
    let expected: Update = serde_json::from_value(message_update(42)).unwrap();
    assert_eq!(update, expected);
}

#[tokio::test(start_paused = true)]
async fn test_stale_updates_are_filtered() {
    let api = MockApi::new();
    api.push_updates(&[8, 9, 10, 11]);
    api.push_updates(&[5, 12]);

    let poller = Poller::new(api.clone(), config_at(10));
    let cursor = poller.cursor();
    let mut stream = poller.start();

    assert_eq!(recv_ids(&mut stream, 3).await, vec![10, 11, 12]);

    wait_for_fetches(&api, 3).await;
    let offsets: Vec<i64> = api.fetches().iter().map(Call::offset).collect();
    assert_eq!(offsets, vec![10, 12, 13]);
    assert_eq!(cursor.get(), 13, "stale id must not move the cursor back");
    assert!(stream.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_parameters_on_the_wire() {
    let api = MockApi::new();
    let config = PollerConfig {
        params: GetUpdatesParams {
            offset: 0,
            limit: 10,
            timeout: 30,
            allowed_updates: vec!["message".into(), "callback_query".into()],
        },
        ..Default::default()
    };

    let _stream = Poller::new(api.clone(), config).start();
    wait_for_fetches(&api, 1).await;

    assert_eq!(
        api.fetches()[0].params,
        json!({"limit": 10, "timeout": 30, "allowed_updates": ["message", "callback_query"]})
    );
}

// ---------------------------------------------------------------------------
// Retry behaviour
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_retries_with_fixed_backoff_until_success() {
    let api = MockApi::new();
    for _ in 0..3 {
        api.push_err(transient());
    }
    api.push_updates(&[1]);

    let poller = Poller::new(api.clone(), config_at(0));
    let cursor = poller.cursor();
    let mut stream = poller.start();

    assert_eq!(stream.recv().await.unwrap().update_id, 1);
    assert_eq!(cursor.get(), 2);

    let fetches = api.fetches();
    let at_initial_offset: Vec<&Call> = fetches.iter().filter(|c| c.offset() == 0).collect();
    assert_eq!(at_initial_offset.len(), 4, "3 failures + 1 success");
    for pair in at_initial_offset.windows(2) {
        assert!(pair[1].at - pair[0].at >= Duration::from_secs(3));
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_overrides_backoff() {
    let api = MockApi::new();
    api.push_err(TgramError::Api {
        code: 429,
        description: "Too Many Requests: retry after 7".into(),
        parameters: Some(ResponseParameters {
            migrate_to_chat_id: None,
            retry_after: Some(7),
        }),
    });
    api.push_updates(&[1]);

    let mut stream = Poller::new(api.clone(), config_at(0)).start();
    assert_eq!(stream.recv().await.unwrap().update_id, 1);

    let fetches = api.fetches();
    assert!(fetches[1].at - fetches[0].at >= Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_exponential_backoff_grows_and_resets() {
    let api = MockApi::new();
    api.push_err(transient());
    api.push_err(transient());
    api.push_err(transient());
    api.push_updates(&[1]);
    api.push_err(transient());
    api.push_updates(&[2]);

    let config = PollerConfig {
        backoff: Backoff::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
        },
        ..config_at(0)
    };
    let mut stream = Poller::new(api.clone(), config).start();
    assert_eq!(recv_ids(&mut stream, 2).await, vec![1, 2]);

    let at: Vec<Instant> = api.fetches().iter().map(|c| c.at).collect();
    let gaps: Vec<u64> = at.windows(2).map(|w| (w[1] - w[0]).as_secs()).collect();
    // 1s, 2s, 4s, then success (no wait), then back to 1s.
    assert_eq!(&gaps[..5], &[1, 2, 4, 0, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_retries() {
    let api = MockApi::new();
    for _ in 0..3 {
        api.push_err(transient());
    }

    let config = PollerConfig {
        max_retries: Some(2),
        ..config_at(0)
    };
    let mut stream = Poller::new(api.clone(), config).start();

    assert!(stream.recv().await.is_none(), "stream must end");
    assert_eq!(api.fetches().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_never_sent_on_the_stream() {
    let api = MockApi::new();
    api.push_err(TgramError::Api {
        code: 502,
        description: "Bad Gateway".into(),
        parameters: None,
    });
    api.push_updates(&[9]);

    let mut stream = Poller::new(api.clone(), config_at(0)).start();
    assert_eq!(stream.recv().await.unwrap().update_id, 9);
    assert!(stream.try_recv().is_none());
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_shutdown_ends_stream_during_long_poll() {
    let api = MockApi::new();
    let mut stream = Poller::new(api.clone(), config_at(0)).start();
    wait_for_fetches(&api, 1).await;

    stream.shutdown();
    assert!(stream.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_backoff() {
    let api = MockApi::new();
    api.push_err(transient());
    let config = PollerConfig {
        backoff: Backoff::Fixed(Duration::from_secs(3600)),
        ..config_at(0)
    };

    let mut stream = Poller::new(api.clone(), config).start();
    wait_for_fetches(&api, 1).await;

    let stopper = stream.stopper();
    stopper.trigger();
    assert!(stream.recv().await.is_none());
    assert_eq!(api.fetches().len(), 1, "no retry after shutdown");
}

#[tokio::test(start_paused = true)]
async fn test_buffered_updates_survive_shutdown() {
    let api = MockApi::new();
    api.push_updates(&[1, 2]);

    let mut stream = Poller::new(api.clone(), config_at(0)).start();
    wait_for_fetches(&api, 2).await;

    stream.shutdown();
    assert_eq!(recv_ids(&mut stream, 2).await, vec![1, 2]);
    assert!(stream.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_stream_stops_poller() {
    let api = MockApi::new();
    let stream = Poller::new(api.clone(), config_at(0)).start();
    wait_for_fetches(&api, 1).await;

    drop(stream);
    for _ in 0..100 {
        if Arc::strong_count(&api) == 1 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("poller task still holds the api after the stream was dropped");
}

#[tokio::test(start_paused = true)]
async fn test_clear_webhook_before_first_fetch() {
    let api = MockApi::new();
    api.push_ok(json!(true));
    api.push_updates(&[1]);

    let config = PollerConfig {
        clear_webhook: true,
        ..config_at(0)
    };
    let mut stream = Poller::new(api.clone(), config).start();
    assert_eq!(stream.recv().await.unwrap().update_id, 1);

    let calls = api.calls.lock().unwrap();
    assert_eq!(calls[0].method, "deleteWebhook");
    assert_eq!(calls[1].method, "getUpdates");
}

#[test]
fn test_config_from_polling_section() {
    let polling = PollingConfig {
        offset: 7,
        limit: 20,
        max_retries: 0,
        ..Default::default()
    };
    let config = PollerConfig::from(&polling);
    assert_eq!(config.params.offset, 7);
    assert_eq!(config.params.limit, 20);
    assert_eq!(config.max_retries, None, "0 means retry forever");
    assert_eq!(config.backoff, Backoff::Fixed(Duration::from_secs(3)));

    let bounded = PollingConfig {
        max_retries: 5,
        ..Default::default()
    };
    assert_eq!(PollerConfig::from(&bounded).max_retries, Some(5));
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_limit_is_clamped() {
    let api = MockApi::new();
    let config = PollerConfig {
        params: GetUpdatesParams {
            limit: 0,
            ..Default::default()
        },
        ..Default::default()
    };
    let _stream = Poller::new(api.clone(), config).start();
    wait_for_fetches(&api, 1).await;
    assert_eq!(api.fetches()[0].params, json!({"limit": 1, "timeout": 60}));

    let api = MockApi::new();
    let config = PollerConfig {
        params: GetUpdatesParams {
            limit: 500,
            ..Default::default()
        },
        ..Default::default()
    };
    let _stream = Poller::new(api.clone(), config).start();
    wait_for_fetches(&api, 1).await;
    assert_eq!(
        api.fetches()[0].params,
        json!({"timeout": 60}),
        "clamped to the server default, which is omitted"
    );
}
