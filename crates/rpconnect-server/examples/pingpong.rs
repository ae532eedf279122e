//! Serves `pingpong`, which echoes its arguments back, and `add`.
//!
//! Run with `cargo run -p rpconnect-server --example pingpong` and call it
//! from any rpconnect client on port 23000.

use rpconnect_server::tracing::{TracingConfig, init_tracing};
use rpconnect_server::{Arguments, Fault, RpcServer, ServerConfig};
use serde_json::{Map, Value};

fn pingpong(args: Arguments) -> Result<(Vec<Value>, Map<String, Value>), Fault> {
    Ok(args.into_parts())
}

fn add(args: Arguments) -> Result<f64, Fault> {
    args.check_signature(&["a", "b"])?;
    Ok(args.arg::<f64>(0, "a")? + args.arg::<f64>(1, "b")?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(TracingConfig::default().with_connection_spans(true))?;

    let mut server = RpcServer::bind(ServerConfig::default())?;
    server.register_fn(add)?.register_fn(pingpong)?;
    server
        .run_until_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
