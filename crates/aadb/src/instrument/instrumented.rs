use super::config::{AdapterOptions, BIND, PREPARE, ResolvedOptions};
use super::guard::{CallRecord, registry};
use super::hooks::CallInfo;
use super::render::render_call;
use crate::args::Arg;
use crate::awaitable::{Awaitable, BoxFuture, Settle, rejected};
use crate::driver::{CallbackHandle, Completion};
use crate::error::{AdapterError, AdapterResult};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// An awaitable facade over a callback-style driver handle.
///
/// Built by [`instrument`]. Cloning is cheap and every clone refers to the same
/// facade; instrumenting the same handle again also returns this facade.
#[derive(Clone)]
pub struct Instrumented {
    shared: Arc<Shared>,
}

pub(super) struct Shared {
    target: Arc<dyn CallbackHandle>,
    record: Arc<CallRecord>,
    options: Arc<ResolvedOptions>,
    methods: HashSet<String>,
    can_prepare: bool,
    type_name: String,
}

/// Instrument a handle.
///
/// The handle is registered by identity first; a handle that was already
/// instrumented gets its existing facade back and `options` is ignored.
/// Otherwise every method in `options.async_methods` that the handle supports
/// becomes awaitable, as does `prepare`.
pub fn instrument(target: Arc<dyn CallbackHandle>, options: AdapterOptions) -> Instrumented {
    let resolved = ResolvedOptions::resolve(options);
    let (facade, fresh) = attach(target, &resolved);
    if fresh {
        if let Some(inspect) = &resolved.options.inspect {
            inspect(&resolved.options);
        }
    }
    facade
}

/// Instrument a handle that may be missing.
///
/// Fails with [`AdapterError::InvalidArgument`] when no handle is supplied.
pub fn try_instrument(
    target: Option<Arc<dyn CallbackHandle>>,
    options: AdapterOptions,
) -> AdapterResult<Instrumented> {
    let target = target.ok_or_else(|| {
        AdapterError::invalid_argument("a database or statement handle is expected")
    })?;
    Ok(instrument(target, options))
}

/// Look up or build the facade for `target`. Returns whether it was newly processed.
fn attach(
    target: Arc<dyn CallbackHandle>,
    options: &Arc<ResolvedOptions>,
) -> (Instrumented, bool) {
    let mut registry = registry();
    let (processed, entry) = registry.claim(&target);

    if let Some(shared) = entry.facade.upgrade() {
        return (Instrumented { shared }, false);
    }

    // First instrumentation, or the previous facade was dropped while the handle
    // lived on. Either way the record is reused and the handle is wrapped once.
    let shared = Arc::new(Shared::new(
        target,
        Arc::clone(&entry.record),
        Arc::clone(options),
    ));
    entry.facade = Arc::downgrade(&shared);

    #[cfg(feature = "tracing")]
    tracing::trace!(
        target: "aadb",
        handle = %shared.type_name,
        methods = shared.methods.len(),
        reattached = processed,
        "instrumented handle"
    );

    (Instrumented { shared }, !processed)
}

impl Shared {
    fn new(
        target: Arc<dyn CallbackHandle>,
        record: Arc<CallRecord>,
        options: Arc<ResolvedOptions>,
    ) -> Self {
        let methods = options
            .options
            .async_methods
            .iter()
            .filter(|name| name.as_str() != PREPARE && target.has_method(name.as_str()))
            .cloned()
            .collect();
        let can_prepare = target.has_method(PREPARE);
        let type_name = target.type_name().to_string();
        Self {
            target,
            record,
            options,
            methods,
            can_prepare,
            type_name,
        }
    }

    /// Render the call for observers, keeping the bound-parameter context current.
    ///
    /// A traced `bind` stores the inherited context plus its arguments, replacing
    /// any earlier bind, before being rendered like every other call. An untraced
    /// `bind` leaves the context alone.
    fn record_call(&self, method: &str, args: &[Arg]) -> Option<String> {
        if !self.options.observes(method) {
            return None;
        }
        let mut params = self.record.params();
        if method == BIND {
            let bound = render_call(params.inherited.as_deref(), args);
            params.last_bound = Some(bound);
        }
        Some(render_call(params.prefix(), args))
    }

    fn invoke(self: Arc<Self>, method: String, args: Vec<Arg>) -> BoxFuture<Value> {
        let (settle, settled) = Settle::<Value>::channel(method.clone());
        let rendered = self.record_call(&method, &args);

        if let (Some(rendered), Some(trace)) = (&rendered, &self.options.options.trace) {
            trace.on_trace(&CallInfo::new(rendered, &method, &self.type_name));
        }

        let done = match (rendered, self.options.options.profile.clone()) {
            (Some(rendered), Some(profile)) => {
                let settle = settle.clone();
                let method = method.clone();
                let type_name = self.type_name.clone();
                let slow = self.options.options.slow_call_threshold;
                let start = Instant::now();
                Completion::new(move |err, value| match err {
                    Some(err) => settle.reject(err.into()),
                    None => {
                        let elapsed = start.elapsed();
                        let call = CallInfo::new(&rendered, &method, &type_name);
                        profile.on_profile(&call, elapsed);
                        if slow.is_some_and(|threshold| elapsed > threshold) {
                            profile.on_slow_call(&call, elapsed);
                        }
                        settle.resolve(value);
                    }
                })
            }
            _ => {
                let settle = settle.clone();
                Completion::new(move |err, value| match err {
                    Some(err) => settle.reject(err.into()),
                    None => settle.resolve(value),
                })
            }
        };

        if let Err(err) = self.target.call(&method, args, done) {
            settle.reject(err.into());
        }
        Box::pin(settled)
    }

    fn invoke_prepare(self: Arc<Self>, args: Vec<Arg>) -> BoxFuture<Instrumented> {
        let (settle, settled) = Settle::<()>::channel(PREPARE);
        let inherited = self
            .options
            .is_observed()
            .then(|| render_call(None, &args));

        let done = {
            let settle = settle.clone();
            Completion::new(move |err, _| match err {
                Some(err) => settle.reject(err.into()),
                None => settle.resolve(()),
            })
        };

        let statement = match self.target.prepare(args, done) {
            Ok(Some(statement)) => statement,
            Ok(None) => {
                return rejected(AdapterError::invalid_argument(format!(
                    "{}.prepare returned no statement",
                    self.type_name
                )));
            }
            Err(err) => return rejected(err.into()),
        };

        let (statement, _) = attach(statement, &self.options);
        if let Some(inherited) = inherited {
            statement.shared.record.set_inherited(inherited);
        }

        Box::pin(async move { settled.await.map(|()| statement) })
    }
}

impl Instrumented {
    /// Call an awaitable method by name.
    ///
    /// Methods that were not made awaitable (not configured, or not supported by
    /// the handle) reject with [`AdapterError::UnknownMethod`]. `prepare` goes
    /// through [`Instrumented::prepare`].
    pub fn call(&self, method: &str, args: Vec<Arg>) -> Awaitable<Value> {
        if !self.shared.methods.contains(method) {
            return Awaitable::ready(Err(AdapterError::UnknownMethod(format!(
                "{}.{method}",
                self.shared.type_name
            ))));
        }
        let shared = Arc::clone(&self.shared);
        let method = method.to_string();
        Awaitable::new(self.shared.options.options.mode, move || {
            shared.invoke(method, args)
        })
    }

    /// Prepare a statement. The statement is instrumented with the same options
    /// and remembers the rendered `prepare` arguments for its own traces.
    pub fn prepare(&self, args: Vec<Arg>) -> Awaitable<Instrumented> {
        if !self.shared.can_prepare {
            return Awaitable::ready(Err(AdapterError::UnknownMethod(format!(
                "{}.{PREPARE}",
                self.shared.type_name
            ))));
        }
        let shared = Arc::clone(&self.shared);
        Awaitable::new(self.shared.options.options.mode, move || {
            shared.invoke_prepare(args)
        })
    }

    pub fn run(&self, args: Vec<Arg>) -> Awaitable<Value> {
        self.call("run", args)
    }

    pub fn exec(&self, args: Vec<Arg>) -> Awaitable<Value> {
        self.call("exec", args)
    }

    pub fn get(&self, args: Vec<Arg>) -> Awaitable<Value> {
        self.call("get", args)
    }

    pub fn all(&self, args: Vec<Arg>) -> Awaitable<Value> {
        self.call("all", args)
    }

    /// Resolves with the driver's final result (typically the row count) after
    /// the row callback among `args` has seen every row.
    pub fn each(&self, args: Vec<Arg>) -> Awaitable<Value> {
        self.call("each", args)
    }

    pub fn map(&self, args: Vec<Arg>) -> Awaitable<Value> {
        self.call("map", args)
    }

    pub fn bind(&self, args: Vec<Arg>) -> Awaitable<Value> {
        self.call(BIND, args)
    }

    pub fn reset(&self) -> Awaitable<Value> {
        self.call("reset", Vec::new())
    }

    pub fn finalize(&self) -> Awaitable<Value> {
        self.call("finalize", Vec::new())
    }

    pub fn close(&self) -> Awaitable<Value> {
        self.call("close", Vec::new())
    }

    pub fn load_extension(&self, path: &str) -> Awaitable<Value> {
        self.call("loadExtension", vec![Arg::from(path)])
    }

    /// Whether `method` was made awaitable on this handle.
    pub fn is_awaitable(&self, method: &str) -> bool {
        if method == PREPARE {
            self.shared.can_prepare
        } else {
            self.shared.methods.contains(method)
        }
    }

    /// Type name of the wrapped handle.
    pub fn type_name(&self) -> &str {
        &self.shared.type_name
    }

    /// Get a reference to the wrapped handle, for callback-style access.
    pub fn inner(&self) -> &Arc<dyn CallbackHandle> {
        &self.shared.target
    }

    /// Rendered `prepare` arguments this handle inherited, if any.
    pub fn inherited_params(&self) -> Option<String> {
        self.shared.record.params().inherited.clone()
    }

    /// Rendered arguments of the most recent `bind`, if any.
    pub fn bound_params(&self) -> Option<String> {
        self.shared.record.params().last_bound.clone()
    }

    /// Whether two facades are the same instrumentation of the same handle.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.shared, &b.shared)
    }
}

impl fmt::Debug for Instrumented {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.shared.methods.iter().collect();
        methods.sort();
        f.debug_struct("Instrumented")
            .field("type_name", &self.shared.type_name)
            .field("methods", &methods)
            .field("can_prepare", &self.shared.can_prepare)
            .field("mode", &self.shared.options.options.mode)
            .finish()
    }
}
