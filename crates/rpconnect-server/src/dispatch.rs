//! Resolves a request to a registered procedure and invokes it.

use serde_json::Value;
use tracing::debug;

use rpconnect_protocol::{Fault, Request};

use crate::registry::{Arguments, Registry};

/// Invokes the procedure named by `request`.
///
/// Returns a lookup fault for unregistered names. Faults raised by the
/// procedure are returned unchanged, and panics are not caught here.
pub async fn dispatch(registry: &Registry, request: Request) -> Result<Value, Fault> {
    let Request { name, args, kwargs } = request;

    let procedure = registry.get(&name).ok_or_else(|| Fault::lookup(&name))?;
    debug!(
        procedure = %name,
        positional = args.len(),
        keywords = kwargs.len(),
        "Dispatching call"
    );

    procedure.call(Arguments::new(args, kwargs)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpconnect_protocol::FaultKind;
    use serde_json::{Map, json};

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register("add", |args: Arguments| {
                Ok::<_, Fault>(args.arg::<i64>(0, "a")? + args.arg::<i64>(1, "b")?)
            })
            .register("boom", |_| Err::<Value, _>(Fault::application("boom")));
        registry
    }

    #[tokio::test]
    async fn dispatch_add() {
        let request = Request::new("add", vec![json!(2), json!(3)], Map::new());
        assert_eq!(dispatch(&registry(), request).await.unwrap(), json!(5));
    }

    #[tokio::test]
    async fn dispatch_with_keyword_arguments() {
        let mut kwargs = Map::new();
        kwargs.insert("b".into(), json!(40));
        let request = Request::new("add", vec![json!(2)], kwargs);
        assert_eq!(dispatch(&registry(), request).await.unwrap(), json!(42));
    }

    #[tokio::test]
    async fn dispatch_missing_name() {
        let request = Request::new("missing", vec![], Map::new());
        let fault = dispatch(&registry(), request).await.unwrap_err();
        assert_eq!(fault.kind(), &FaultKind::Lookup);
        assert!(fault.message().contains("missing"));
    }

    #[tokio::test]
    async fn dispatch_propagates_procedure_fault() {
        let request = Request::new("boom", vec![], Map::new());
        let fault = dispatch(&registry(), request).await.unwrap_err();
        assert_eq!(fault, Fault::application("boom"));
    }
}
