//! Client calls against a live server on loopback.

use std::time::{Duration, Instant};

use rpconnect_client::{ClientError, FaultKind, RpcClient};
use rpconnect_server::{Arguments, Fault, RpcServer, ServerConfig};
use serde_json::{Map, Value, json};

fn add(args: Arguments) -> Result<i64, Fault> {
    args.check_signature(&["a", "b"])?;
    Ok(args.arg::<i64>(0, "a")? + args.arg::<i64>(1, "b")?)
}

async fn start_server() -> RpcClient {
    let config = ServerConfig::new(([127, 0, 0, 1], 0)).with_backlog(64);
    let mut server = RpcServer::bind(config).unwrap();
    server
        .register_fn(add)
        .unwrap()
        .register("boom", |_| Err::<Value, _>(Fault::value("boom")))
        .register("explode", |_| -> Result<Value, Fault> { panic!("kaboom") })
        .register("divide", |_| {
            Err::<Value, _>(Fault::new(
                FaultKind::Other("ZeroDivisionError".into()),
                "division by zero",
            ))
        })
        .register("slow", |_| {
            std::thread::sleep(Duration::from_millis(1500));
            Ok::<_, Fault>("slow")
        })
        .register_async("fast", |_| async { Ok::<_, Fault>("fast") })
        .register("pingpong", |args: Arguments| Ok::<_, Fault>(args.into_parts()));

    let port = server.local_addr().unwrap().port();
    tokio::spawn(server.run());

    RpcClient::new("127.0.0.1", port).with_timeout(Duration::from_secs(10))
}

#[tokio::test]
async fn add_returns_sum() {
    let client = start_server().await;
    let result = client.call("add", &[json!(2), json!(3)], &Map::new()).await.unwrap();
    assert_eq!(result, json!(5));
}

#[tokio::test]
async fn keyword_arguments_through_builder() {
    let client = start_server().await;
    let sum: i64 = client
        .request("add")
        .arg(2)
        .kwarg("b", 40)
        .send_as()
        .await
        .unwrap();
    assert_eq!(sum, 42);
}

#[tokio::test]
async fn unexpected_keyword_is_argument_fault() {
    let client = start_server().await;
    let err = client
        .request("add")
        .arg(1)
        .arg(2)
        .kwarg("c", 3)
        .send()
        .await
        .unwrap_err();
    assert_eq!(err.remote_fault().unwrap().kind(), &FaultKind::Argument);
}

#[tokio::test]
async fn missing_procedure_is_lookup_fault() {
    let client = start_server().await;
    let err = client.request("missing").send().await.unwrap_err();

    let fault = err.remote_fault().expect("remote fault");
    assert_eq!(fault.kind(), &FaultKind::Lookup);
    assert!(fault.message().contains("missing"));
}

#[tokio::test]
async fn procedure_fault_reaches_caller() {
    let client = start_server().await;
    let err = client.request("boom").send().await.unwrap_err();

    assert!(matches!(err, ClientError::Remote(_)));
    assert_eq!(err.remote_fault().unwrap().kind(), &FaultKind::Value);
    assert!(err.to_string().contains("boom"));
}

#[tokio::test]
async fn unknown_fault_kind_falls_back() {
    let client = start_server().await;
    let err = client.request("divide").send().await.unwrap_err();

    let fault = err.remote_fault().unwrap();
    assert!(fault.kind().is_unknown());
    assert_eq!(fault.to_string(), "ZeroDivisionError: division by zero");
}

#[tokio::test]
async fn server_survives_panicking_procedure() {
    let client = start_server().await;

    let err = client.request("explode").send().await.unwrap_err();
    let fault = err.remote_fault().unwrap();
    assert_eq!(fault.kind(), &FaultKind::Panic);
    assert_eq!(fault.message(), "kaboom");

    let sum = client.request("add").arg(1).arg(1).send().await.unwrap();
    assert_eq!(sum, json!(2));
}

#[tokio::test]
async fn arguments_roundtrip_unchanged() {
    let client = start_server().await;
    let mut kwargs = Map::new();
    kwargs.insert("nested".into(), json!({"list": [1, 2.5, null], "flag": false}));

    let result = client
        .call("pingpong", &[json!("text"), json!([1, [2, 3]])], &kwargs)
        .await
        .unwrap();
    assert_eq!(
        result,
        json!([["text", [1, [2, 3]]], {"nested": {"list": [1, 2.5, null], "flag": false}}])
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fast_call_is_not_blocked_by_slow_call() {
    let client = start_server().await;

    let slow_client = client.clone();
    let slow = tokio::spawn(async move { slow_client.request("slow").send().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    let fast = client.request("fast").send().await.unwrap();
    assert_eq!(fast, json!("fast"));
    assert!(started.elapsed() < Duration::from_millis(1000));

    assert_eq!(slow.await.unwrap().unwrap(), json!("slow"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_clients_get_their_own_replies() {
    let client = start_server().await;

    let calls: Vec<_> = (0..20)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move { client.request("add").arg(i).arg(i).send_as::<i64>().await })
        })
        .collect();

    for (i, handle) in calls.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap().unwrap(), 2 * i as i64);
    }
}

#[tokio::test]
async fn blocking_client_call() {
    let client = start_server().await;

    let result = tokio::task::spawn_blocking(move || {
        client.call_blocking("add", &[json!(2), json!(3)], &Map::new())
    })
    .await
    .unwrap()
    .unwrap();
    assert_eq!(result, json!(5));
}
