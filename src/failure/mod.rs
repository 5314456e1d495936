//! Remote failures: the `_failure` record marshaled in RPC replies, and the
//! allow-listed reconstruction of that record into a local error value.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Wire shape of `_failure`: `{class, module, message, tb}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FailureRecord {
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "tb")]
    pub trace: Vec<String>,
}

impl FailureRecord {
    pub fn new(
        module: impl Into<String>,
        class: impl Into<String>,
        message: impl Into<String>,
        trace: Vec<String>,
    ) -> Self {
        Self {
            class: class.into(),
            module: module.into(),
            message: message.into(),
            trace,
        }
    }

    /// Describe a local error for the caller on the other side of the wire.
    ///
    /// The type path `a::b::Type` splits into module `a::b` and class `Type`;
    /// the trace lists the `source()` chain, outermost first.
    pub fn from_error<E: StdError + 'static>(err: &E) -> Self {
        let path = std::any::type_name::<E>();
        let path = path.split('<').next().unwrap_or(path);
        let (module, class) = match path.rsplit_once("::") {
            Some((module, class)) => (module, class),
            None => ("", path),
        };

        let mut trace = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push(format!("caused by: {cause}"));
            source = cause.source();
        }

        Self::new(module, class, err.to_string(), trace)
    }
}

/// Whether a remote failure was resolved to a registered local type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Reconstructed,
    Generic,
}

/// A failure raised in the peer process, re-raised locally.
///
/// Both forms carry the four raw fields. Display is `message` followed by the
/// trace lines, newline separated.
#[derive(Clone)]
pub struct RemoteFailure {
    module: String,
    class: String,
    message: String,
    trace: Vec<String>,
    kind: FailureKind,
    cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl RemoteFailure {
    pub fn generic(record: FailureRecord) -> Self {
        Self {
            module: record.module,
            class: record.class,
            message: record.message,
            trace: record.trace,
            kind: FailureKind::Generic,
            cause: None,
        }
    }

    fn reconstructed(record: FailureRecord, cause: Box<dyn StdError + Send + Sync>) -> Self {
        Self {
            kind: FailureKind::Reconstructed,
            cause: Some(Arc::from(cause)),
            ..Self::generic(record)
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn is_reconstructed(&self) -> bool {
        self.kind == FailureKind::Reconstructed
    }

    /// The locally constructed error, when the remote class was resolved.
    pub fn downcast_cause<T: StdError + 'static>(&self) -> Option<&T> {
        self.cause.as_deref()?.downcast_ref::<T>()
    }

    pub fn to_record(&self) -> FailureRecord {
        FailureRecord::new(
            self.module.clone(),
            self.class.clone(),
            self.message.clone(),
            self.trace.clone(),
        )
    }
}

impl fmt::Debug for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFailure")
            .field("module", &self.module)
            .field("class", &self.class)
            .field("message", &self.message)
            .field("trace", &self.trace)
            .field("kind", &self.kind)
            .finish()
    }
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        f.write_str("\n")?;
        f.write_str(&self.trace.join("\n"))
    }
}

impl StdError for RemoteFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

type FailureCtor = Arc<dyn Fn(&FailureRecord) -> Box<dyn StdError + Send + Sync> + Send + Sync>;

/// Static `(module, class)` → constructor table, populated at startup.
///
/// Unknown pairs are never loaded dynamically; they fall back to the generic
/// form.
#[derive(Clone, Default)]
pub struct FailureRegistry {
    ctors: HashMap<(String, String), FailureCtor>,
}

impl FailureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<E, F>(&mut self, module: &str, class: &str, build: F)
    where
        E: StdError + Send + Sync + 'static,
        F: Fn(&FailureRecord) -> E + Send + Sync + 'static,
    {
        let ctor: FailureCtor = Arc::new(
            move |record: &FailureRecord| -> Box<dyn StdError + Send + Sync> {
                Box::new(build(record))
            },
        );
        self.ctors
            .insert((module.to_string(), class.to_string()), ctor);
    }

    pub fn contains(&self, module: &str, class: &str) -> bool {
        self.ctors
            .contains_key(&(module.to_string(), class.to_string()))
    }

    pub fn len(&self) -> usize {
        self.ctors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ctors.is_empty()
    }

    /// Turn a decoded failure record into a local failure value.
    ///
    /// Only modules named in `allowed_modules` are looked up in the table.
    pub fn reconstruct(&self, record: FailureRecord, allowed_modules: &[String]) -> RemoteFailure {
        if !allowed_modules.iter().any(|m| *m == record.module) {
            return RemoteFailure::generic(record);
        }

        let key = (record.module.clone(), record.class.clone());
        match self.ctors.get(&key) {
            Some(ctor) => {
                let cause = ctor(&record);
                RemoteFailure::reconstructed(record, cause)
            }
            None => {
                warn!(
                    module = %record.module,
                    class = %record.class,
                    "can not deserialize remote exception; no constructor registered"
                );
                RemoteFailure::generic(record)
            }
        }
    }
}

impl fmt::Debug for FailureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.ctors.keys().collect();
        keys.sort();
        f.debug_struct("FailureRegistry")
            .field("registered", &keys)
            .finish()
    }
}
