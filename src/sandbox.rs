//! Embedded JavaScript sandbox glue, used to run a package's build script
//! (`zepofile.js`) and the CMake generator script.
//!
//! Backed by `rquickjs`, grounded in the fact that the original
//! implementation (`original_source/src/zepo/js_runtime`) itself embeds
//! QuickJS via `quickjs-libc`. `await_promise`/`try_await_promise` pump the
//! engine's job queue until a promise settles, mirroring the original's
//! `js_std_loop(ctx)`-before-await pattern
//! (`JSUtils.cpp::awaitPromise`/`loadESModule`) instead of relying on any
//! particular async-bridging feature of the binding. JSON marshalling
//! round-trips through the engine's own `JSON.parse`/`JSON.stringify`
//! globals plus `serde_json`, exactly as `js::pushCXXObject`/`js::toCXXObject`
//! do.

use std::path::Path;

use color_eyre::eyre::{eyre, Context as _, Result};
use rquickjs::{CatchResultExt, Context, Ctx, Function, Module, Object, Promise, Runtime, Value};
use rquickjs::promise::PromiseState;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ZepoError;

pub struct Sandbox {
    runtime: Runtime,
    pub context: Context,
}

impl Sandbox {
    pub fn new() -> Result<Self> {
        let runtime = Runtime::new().context("failed to start QuickJS runtime")?;
        let context = Context::full(&runtime).context("failed to create QuickJS context")?;
        Ok(Self { runtime, context })
    }

    /// Pumps the job queue once, matching `js_std_loop`'s drive of the
    /// microtask queue before a promise is expected to settle.
    fn drain_jobs(&self) {
        while matches!(self.runtime.execute_pending_job(), Ok(true)) {}
    }

    /// Unconditionally awaits a promise, draining pending jobs between polls.
    pub fn await_promise<'js>(&self, promise: Promise<'js>) -> Result<Value<'js>> {
        loop {
            match promise.state() {
                PromiseState::Pending => self.drain_jobs(),
                PromiseState::Resolved => {
                    return promise.result().map_err(|e| eyre!("promise resolved with an unreadable value: {e}"))
                }
                PromiseState::Rejected => {
                    let message = promise
                        .result::<Value>()
                        .map(|v| format!("{v:?}"))
                        .unwrap_or_else(|e| e.to_string());
                    return Err(ZepoError::Sandbox {
                        path: Path::new("<script>").to_path_buf(),
                        cause: message,
                    }
                    .into());
                }
            }
        }
    }

    /// Awaits `value` only if it is promise-like (mirrors `tryAwaitPromise`'s
    /// `"then"`-presence check); otherwise returns it unchanged.
    pub fn try_await_promise<'js>(&self, value: Value<'js>) -> Result<Value<'js>> {
        if let Some(promise) = value.as_promise() {
            let promise = promise.clone();
            return self.await_promise(promise);
        }
        Ok(value)
    }

    /// Loads and evaluates an ES module, draining pending top-level-await
    /// jobs, and returns its namespace object.
    pub fn load_module<'js>(&self, ctx: &Ctx<'js>, path: &Path) -> Result<Object<'js>> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let name = path.to_string_lossy().to_string();

        let module = Module::declare(ctx.clone(), name, source)
            .catch(ctx)
            .map_err(|e| module_error(path, &e))?;

        let (module, promise) = module.eval().catch(ctx).map_err(|e| module_error(path, &e))?;

        self.await_promise(promise)?;

        module
            .namespace()
            .catch(ctx)
            .map_err(|e| module_error(path, &e))
    }

    pub fn parse_json<'js>(&self, ctx: &Ctx<'js>, text: &str) -> Result<Value<'js>> {
        let json: Object = ctx.globals().get("JSON")?;
        let parse: Function = json.get("parse")?;
        parse.call((text.to_string(),)).catch(ctx).map_err(|e| eyre!("{e}"))
    }

    pub fn stringify_json<'js>(&self, ctx: &Ctx<'js>, value: Value<'js>) -> Result<String> {
        let json: Object = ctx.globals().get("JSON")?;
        let stringify: Function = json.get("stringify")?;
        stringify
            .call((value,))
            .catch(ctx)
            .map_err(|e| eyre!("{e}"))
    }

    /// Marshals a Rust value into the engine by round-tripping through
    /// `serde_json` and the engine's own `JSON.parse`.
    pub fn push_record<'js, T: Serialize>(&self, ctx: &Ctx<'js>, value: &T) -> Result<Value<'js>> {
        let text = serde_json::to_string(value)?;
        self.parse_json(ctx, &text)
    }

    /// Marshals an engine value back into Rust by round-tripping through the
    /// engine's own `JSON.stringify` and `serde_json`.
    pub fn to_record<'js, T: DeserializeOwned>(&self, ctx: &Ctx<'js>, value: Value<'js>) -> Result<T> {
        let text = self.stringify_json(ctx, value)?;
        serde_json::from_str(&text).map_err(Into::into)
    }
}

fn module_error(path: &Path, cause: &impl std::fmt::Display) -> color_eyre::Report {
    ZepoError::Sandbox {
        path: path.to_path_buf(),
        cause: cause.to_string(),
    }
    .into()
}
