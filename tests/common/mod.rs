//! Common test utilities for integration tests
//!
//! Scripted handlers, a manual clock, binding builders and logging setup
//! shared across the integration test files.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use areaflow::domain::ports::{
    ActionHandler, CheckOutcome, Clock, HandlerContext, HandlerError, ReactionHandler,
};
use areaflow::domain::models::{ActionInstance, Binding, HandlerKey, ReactionInstance};
use areaflow::services::{HandlerInfo, HandlerRegistry};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// A clock tests move by hand.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(start),
        })
    }

    pub fn set(&self, t: DateTime<Utc>) {
        *self.now.lock().unwrap() = t;
    }

    pub fn advance(&self, d: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += d;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Action that replays a script of results, then reports idle forever.
///
/// Every call records the state it was handed.
#[derive(Default)]
pub struct ScriptedAction {
    script: Mutex<VecDeque<Result<CheckOutcome, HandlerError>>>,
    seen_states: Mutex<Vec<Option<Value>>>,
}

impl ScriptedAction {
    pub fn new(script: Vec<Result<CheckOutcome, HandlerError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen_states: Mutex::new(Vec::new()),
        })
    }

    pub fn seen_states(&self) -> Vec<Option<Value>> {
        self.seen_states.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen_states.lock().unwrap().len()
    }
}

#[async_trait]
impl ActionHandler for ScriptedAction {
    async fn check(
        &self,
        _parameters: &Value,
        current_state: Option<&Value>,
        _ctx: &HandlerContext,
    ) -> Result<CheckOutcome, HandlerError> {
        self.seen_states.lock().unwrap().push(current_state.cloned());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(CheckOutcome::idle()))
    }
}

/// Action that always fires with a call counter as state.
#[derive(Default)]
pub struct AlwaysFire {
    calls: AtomicUsize,
}

impl AlwaysFire {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionHandler for AlwaysFire {
    async fn check(
        &self,
        _parameters: &Value,
        _current_state: Option<&Value>,
        _ctx: &HandlerContext,
    ) -> Result<CheckOutcome, HandlerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CheckOutcome::fire(json!({ "n": n })))
    }
}

/// Action whose check sleeps, tracking how many calls overlap.
pub struct SlowAction {
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: AtomicUsize,
}

impl SlowAction {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionHandler for SlowAction {
    async fn check(
        &self,
        _parameters: &Value,
        _current_state: Option<&Value>,
        _ctx: &HandlerContext,
    ) -> Result<CheckOutcome, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(CheckOutcome::idle())
    }
}

/// Action that panics.
pub struct PanickingAction;

#[async_trait]
impl ActionHandler for PanickingAction {
    async fn check(
        &self,
        _parameters: &Value,
        _current_state: Option<&Value>,
        _ctx: &HandlerContext,
    ) -> Result<CheckOutcome, HandlerError> {
        panic!("handler bug");
    }
}

/// Reaction whose execute sleeps before succeeding.
pub struct SlowReaction {
    delay: Duration,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl SlowReaction {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        })
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReactionHandler for SlowReaction {
    async fn execute(&self, _parameters: &Value, _ctx: &HandlerContext) -> Result<(), HandlerError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Reaction that counts executions and optionally fails.
#[derive(Default)]
pub struct RecordingReaction {
    fail: bool,
    calls: AtomicUsize,
    parameters: Mutex<Vec<Value>>,
}

impl RecordingReaction {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn parameters(&self) -> Vec<Value> {
        self.parameters.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReactionHandler for RecordingReaction {
    async fn execute(&self, parameters: &Value, _ctx: &HandlerContext) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.parameters.lock().unwrap().push(parameters.clone());
        if self.fail {
            Err(HandlerError::Upstream("reaction target returned 500".to_string()))
        } else {
            Ok(())
        }
    }
}

pub fn key(s: &str) -> HandlerKey {
    s.parse().unwrap()
}

/// An active binding with empty parameters.
pub fn binding(action: &str, reaction: &str) -> Binding {
    Binding::new(
        Uuid::new_v4(),
        format!("{action} -> {reaction}"),
        ActionInstance::new(&key(action), json!({})),
        ReactionInstance::new(&key(reaction), json!({})),
    )
}

/// Registry builder for tests.
#[derive(Default)]
pub struct TestRegistry {
    registry: HandlerRegistry,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action(mut self, k: &str, handler: Arc<dyn ActionHandler>) -> Self {
        self.registry
            .register_action(key(k), HandlerInfo::new(k, "test action"), handler)
            .unwrap();
        self
    }

    pub fn reaction(mut self, k: &str, handler: Arc<dyn ReactionHandler>) -> Self {
        self.registry
            .register_reaction(key(k), HandlerInfo::new(k, "test reaction"), handler)
            .unwrap();
        self
    }

    pub fn build(self) -> Arc<HandlerRegistry> {
        Arc::new(self.registry)
    }
}

/// Poll `predicate` every 10ms until it holds or `timeout` elapses.
pub async fn wait_for<F>(mut predicate: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}
