use serde_json::{json, Value};
use ssvep_control::{ControlHandle, ControlServer, TimeSeriesStore};
use ssvep_core::{DisplayPhase, Event, ExternalSeries, Task};
use ssvep_engine::EngineContext;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(handle: &ControlHandle) -> Self {
        let stream = TcpStream::connect(handle.local_addr()).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn send_raw(&mut self, line: &str) -> Option<Value> {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        let reply = self.lines.next_line().await.unwrap()?;
        Some(serde_json::from_str(&reply).unwrap())
    }

    async fn send(&mut self, msg: Value) -> Value {
        self.send_raw(&msg.to_string()).await.expect("reply")
    }
}

fn start() -> (Arc<EngineContext>, ControlHandle) {
    let ctx = Arc::new(EngineContext::default());
    let store: HashMap<String, ExternalSeries> = HashMap::from([(
        "alpha".to_string(),
        ExternalSeries::from_iter([("A".to_string(), vec![0.25, 0.5])]),
    )]);
    let store: Arc<dyn TimeSeriesStore> = Arc::new(store);
    let handle = ControlServer::new(Arc::clone(&ctx), store)
        .with_ctrl_c(false)
        .spawn("127.0.0.1:0")
        .unwrap();
    (ctx, handle)
}

fn start_command(time_series: &str) -> Value {
    json!({
        "type": "StartSSVEP",
        "resolution_x": 800,
        "resolution_y": 600,
        "repeats": 1,
        "cue": "A",
        "patch_layout_text": "0,A,100,100,50,50,10.0,0.0",
        "time_series": time_series,
        "head_length": 1,
        "body_length": 2,
        "tail_length": 1
    })
}

#[tokio::test]
async fn test_idle_status() {
    let (_ctx, handle) = start();
    let mut client = Client::connect(&handle).await;

    let status = client.send(json!({"type": "CheckoutDisplayStatus"})).await;
    assert_eq!(status["currentTask"], "IDLE");
    assert_eq!(status["total"], "N/A");
    assert_eq!(status["tasksInBuffer"], 0);
    assert!(status["passed"].is_number());
    assert_eq!(status["eventBuffer"], "");
}

#[tokio::test]
async fn test_start_enqueues_resolved_command() {
    let (ctx, handle) = start();
    let mut client = Client::connect(&handle).await;

    assert_eq!(client.send(start_command("alpha")).await, "OK");
    let status = client.send(json!({"type": "CheckoutDisplayStatus"})).await;
    assert_eq!(status["tasksInBuffer"], 1);

    match ctx.tasks.pop_if_any() {
        Some(Task::StartSsvep(cmd)) => {
            assert_eq!(cmd.resolved_series.get("A"), Some(&[0.25, 0.5][..]));
            assert_eq!(cmd.repeats, Some(1));
        }
        other => panic!("unexpected task {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_table_is_rejected_and_connection_survives() {
    let (ctx, handle) = start();
    let mut client = Client::connect(&handle).await;

    let reply = client.send(start_command("missing")).await;
    assert!(reply["error"]
        .as_str()
        .unwrap()
        .contains("unknown time-series table"));
    assert!(reply["suggestion"].is_string());
    assert!(ctx.tasks.is_empty());

    let status = client.send(json!({"type": "CheckoutDisplayStatus"})).await;
    assert_eq!(status["currentTask"], "IDLE");
}

#[tokio::test]
async fn test_malformed_message_closes_only_that_connection() {
    let (_ctx, handle) = start();
    let mut bad = Client::connect(&handle).await;
    let mut good = Client::connect(&handle).await;

    let reply = bad.send_raw("{\"type\":\"Reboot\"}").await.expect("error reply");
    assert!(reply["error"].as_str().unwrap().contains("malformed message"));
    assert!(bad.lines.next_line().await.unwrap_or(None).is_none());

    let status = good.send(json!({"type": "CheckoutDisplayStatus"})).await;
    assert_eq!(status["currentTask"], "IDLE");
}

#[tokio::test]
async fn test_set_prompt_posts_to_mailbox() {
    let (ctx, handle) = start();
    let mut client = Client::connect(&handle).await;

    let reply = client
        .send(json!({"type": "SetPrompt", "prompt": "Look at the cue"}))
        .await;
    assert_eq!(reply, "OK");
    assert_eq!(ctx.prompt.latest().as_deref(), Some("Look at the cue"));
    assert!(ctx.tasks.is_empty());
}

#[tokio::test]
async fn test_profile_values_become_text() {
    let (ctx, handle) = start();
    let mut client = Client::connect(&handle).await;

    let reply = client
        .send(json!({"type": "SetUserProfile", "profile": {"name": "Ada", "age": 36}}))
        .await;
    assert_eq!(reply, "OK");
    let profile = ctx.profile.latest().expect("profile posted");
    assert_eq!(profile["name"], "Ada");
    assert_eq!(profile["age"], "36");
    assert!(ctx.tasks.is_empty());
}

#[tokio::test]
async fn test_event_buffer_is_popped_once() {
    let (ctx, handle) = start();
    {
        let mut log = ctx.events();
        log.begin_run();
        log.record(Event::DisplayPhaseEntered {
            phase: DisplayPhase::Head,
            trial: 0,
            cue: Some("A".into()),
            elapsed: 0.0,
        });
        log.record(Event::KeyPressed {
            key: "A".into(),
            elapsed: 0.5,
        });
        log.finish_run();
    }
    let mut client = Client::connect(&handle).await;

    let first = client.send(json!({"type": "CheckoutDisplayStatus"})).await;
    assert_eq!(first["eventBuffer"], "displayHead\t0\tA\t0.0000\nkeyPress\tA\t0.5000");
    let second = client.send(json!({"type": "CheckoutDisplayStatus"})).await;
    assert_eq!(second["eventBuffer"], "");
}

#[tokio::test]
async fn test_tasks_keep_arrival_order_across_connections() {
    let (ctx, handle) = start();
    let mut first = Client::connect(&handle).await;
    let mut second = Client::connect(&handle).await;

    let mut third = Client::connect(&handle).await;

    for (client, repeats) in [(&mut first, 1), (&mut second, 2), (&mut third, 3)] {
        let mut cmd = start_command("alpha");
        cmd["repeats"] = json!(repeats);
        assert_eq!(client.send(cmd).await, "OK");
    }

    let order: Vec<Option<usize>> = std::iter::from_fn(|| ctx.tasks.pop_if_any())
        .map(|Task::StartSsvep(cmd)| cmd.repeats)
        .collect();
    assert_eq!(order, [Some(1), Some(2), Some(3)]);
}

#[tokio::test]
async fn test_shutdown_closes_listener() {
    let (_ctx, mut handle) = start();
    let addr = handle.local_addr();
    handle.shutdown();
    handle.shutdown();
    assert!(TcpStream::connect(addr).await.is_err());
}
