//! Registration table mapping procedure names to callables.
//!
//! The table is filled before the server starts serving and is shared
//! read-only with every connection task afterwards.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use rpconnect_protocol::Fault;

use crate::error::{ServerError, ServerResult};

/// Future returned by [`Procedure::call`].
pub type ProcedureFuture = Pin<Box<dyn Future<Output = Result<Value, Fault>> + Send>>;

/// A callable that can be invoked by name.
pub trait Procedure: Send + Sync + 'static {
    /// Invokes the procedure with the call's arguments.
    fn call(&self, args: Arguments) -> ProcedureFuture;
}

/// Positional and keyword arguments of a call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    args: Vec<Value>,
    kwargs: Map<String, Value>,
}

impl Arguments {
    /// Creates an argument set.
    pub fn new(args: Vec<Value>, kwargs: Map<String, Value>) -> Self {
        Self { args, kwargs }
    }

    /// Returns the positional arguments.
    pub fn positional(&self) -> &[Value] {
        &self.args
    }

    /// Returns the keyword arguments.
    pub fn keywords(&self) -> &Map<String, Value> {
        &self.kwargs
    }

    /// Returns the total number of arguments.
    pub fn len(&self) -> usize {
        self.args.len() + self.kwargs.len()
    }

    /// Returns true if no arguments were passed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetches a required parameter by position, or by keyword if fewer
    /// positional arguments were passed.
    pub fn arg<T: DeserializeOwned>(&self, index: usize, name: &str) -> Result<T, Fault> {
        self.optional(index, name)?
            .ok_or_else(|| Fault::argument(format!("missing required argument '{name}'")))
    }

    /// Fetches an optional parameter by position or keyword.
    pub fn optional<T: DeserializeOwned>(
        &self,
        index: usize,
        name: &str,
    ) -> Result<Option<T>, Fault> {
        let value = match (self.args.get(index), self.kwargs.get(name)) {
            (Some(_), Some(_)) => {
                return Err(Fault::argument(format!(
                    "got multiple values for argument '{name}'"
                )));
            }
            (Some(value), None) | (None, Some(value)) => value,
            (None, None) => return Ok(None),
        };

        T::deserialize(value)
            .map(Some)
            .map_err(|e| Fault::argument(format!("invalid value for argument '{name}': {e}")))
    }

    /// Rejects positional arguments beyond `params` and keywords not named in it.
    pub fn check_signature(&self, params: &[&str]) -> Result<(), Fault> {
        if self.args.len() > params.len() {
            return Err(Fault::argument(format!(
                "takes {} positional arguments but {} were given",
                params.len(),
                self.args.len()
            )));
        }
        if let Some(key) = self.kwargs.keys().find(|k| !params.contains(&k.as_str())) {
            return Err(Fault::argument(format!(
                "got an unexpected keyword argument '{key}'"
            )));
        }
        Ok(())
    }

    /// Splits into positional and keyword arguments.
    pub fn into_parts(self) -> (Vec<Value>, Map<String, Value>) {
        (self.args, self.kwargs)
    }
}

fn to_content<T: Serialize>(value: T) -> Result<Value, Fault> {
    serde_json::to_value(value)
        .map_err(|e| Fault::application(format!("return value is not serializable: {e}")))
}

/// Synchronous closure run on the blocking thread pool.
struct BlockingFn<F>(Arc<F>);

impl<F, T> Procedure for BlockingFn<F>
where
    F: Fn(Arguments) -> Result<T, Fault> + Send + Sync + 'static,
    T: Serialize + 'static,
{
    fn call(&self, args: Arguments) -> ProcedureFuture {
        let f = Arc::clone(&self.0);
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || f(args).and_then(to_content)).await {
                Ok(outcome) => outcome,
                // Re-raise so the connection handler reports it like any other panic.
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => Err(Fault::application(format!("procedure was cancelled: {e}"))),
            }
        })
    }
}

/// Async closure polled on the connection's own task.
struct AsyncFn<F>(F);

impl<F, Fut, T> Procedure for AsyncFn<F>
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, Fault>> + Send + 'static,
    T: Serialize + 'static,
{
    fn call(&self, args: Arguments) -> ProcedureFuture {
        let fut = (self.0)(args);
        Box::pin(async move { to_content(fut.await?) })
    }
}

/// Derives a procedure name from a function item's type name.
///
/// Closures, fn pointers and generic instantiations have no usable
/// identifier and yield `None`.
fn procedure_name<F>() -> Option<&'static str> {
    let name = std::any::type_name::<F>().rsplit("::").next()?;
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    valid.then_some(name)
}

/// Maps procedure names to callables.
#[derive(Default)]
pub struct Registry {
    procedures: HashMap<String, Arc<dyn Procedure>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("procedures", &self.names())
            .finish()
    }
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a blocking callable under `name`.
    ///
    /// Each call runs on tokio's blocking pool, so a slow procedure never
    /// holds up other connections. A later registration under the same name
    /// replaces the earlier one.
    pub fn register<F, T>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Arguments) -> Result<T, Fault> + Send + Sync + 'static,
        T: Serialize + 'static,
    {
        self.register_procedure(name, BlockingFn(Arc::new(f)))
    }

    /// Registers an async callable under `name`.
    pub fn register_async<F, Fut, T>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Fault>> + Send + 'static,
        T: Serialize + 'static,
    {
        self.register_procedure(name, AsyncFn(f))
    }

    /// Registers a blocking function under its own identifier.
    ///
    /// `registry.register_fn(add)` registers `add` as `"add"`. Closures have
    /// no identifier and are rejected.
    pub fn register_fn<F, T>(&mut self, f: F) -> ServerResult<&mut Self>
    where
        F: Fn(Arguments) -> Result<T, Fault> + Send + Sync + 'static,
        T: Serialize + 'static,
    {
        let name = procedure_name::<F>()
            .ok_or_else(|| ServerError::unnamed_procedure(std::any::type_name::<F>()))?;
        Ok(self.register(name, f))
    }

    /// Registers any [`Procedure`] implementation under `name`.
    pub fn register_procedure(
        &mut self,
        name: impl Into<String>,
        procedure: impl Procedure,
    ) -> &mut Self {
        let name = name.into();
        if self
            .procedures
            .insert(name.clone(), Arc::new(procedure))
            .is_some()
        {
            warn!(procedure = %name, "Replacing previously registered procedure");
        } else {
            debug!(procedure = %name, "Registered procedure");
        }
        self
    }

    /// Looks up a procedure by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Procedure>> {
        self.procedures.get(name)
    }

    /// Returns true if a procedure is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    /// Returns the registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.procedures.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered procedures.
    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}
