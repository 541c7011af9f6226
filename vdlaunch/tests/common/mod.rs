//! Recording features shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vdlaunch::pipeline::{Dependency, Feature, FeatureCtx};
use vdlaunch::{VdError, VdResult};

/// Ordered log of `setup:<name>`, `done:<name>` and `teardown:<name>` events.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: String) {
        self.0.lock().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Names with the given event prefix, in order.
    pub fn names(&self, prefix: &str) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    pub fn setups(&self) -> Vec<String> {
        self.names("setup:")
    }

    pub fn teardowns(&self) -> Vec<String> {
        self.names("teardown:")
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

/// Tracks how many setups run at the same time.
#[derive(Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Feature that records its lifecycle and can be told to misbehave.
///
/// On setup it looks up the capability of every enabled required dependency
/// and publishes its own name as a `String` capability.
pub struct Recorder {
    name: String,
    enabled: bool,
    deps: Vec<Dependency>,
    fail_setup: bool,
    fail_teardown: bool,
    delay: Option<Duration>,
    capability: Option<String>,
    cancel_on_setup: Option<CancellationToken>,
    gauge: Option<Arc<Gauge>>,
    journal: Journal,
}

impl Recorder {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            deps: Vec::new(),
            fail_setup: false,
            fail_teardown: false,
            delay: None,
            capability: Some(name.to_string()),
            cancel_on_setup: None,
            gauge: None,
            journal: journal.clone(),
        }
    }

    pub fn requires(mut self, dep: &str) -> Self {
        self.deps.push(Dependency::required(dep));
        self
    }

    pub fn wants(mut self, dep: &str) -> Self {
        self.deps.push(Dependency::optional(dep));
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn failing_setup(mut self) -> Self {
        self.fail_setup = true;
        self
    }

    pub fn failing_teardown(mut self) -> Self {
        self.fail_teardown = true;
        self
    }

    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.delay = Some(Duration::from_millis(ms));
        self
    }

    pub fn publishes_as(mut self, capability: &str) -> Self {
        self.capability = Some(capability.to_string());
        self
    }

    pub fn cancels(mut self, token: &CancellationToken) -> Self {
        self.cancel_on_setup = Some(token.clone());
        self
    }

    pub fn gauged(mut self, gauge: &Arc<Gauge>) -> Self {
        self.gauge = Some(Arc::clone(gauge));
        self
    }
}

#[async_trait]
impl Feature for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn dependencies(&self) -> Vec<Dependency> {
        self.deps.clone()
    }

    async fn setup(&self, ctx: &FeatureCtx) -> VdResult<()> {
        self.journal.record(format!("setup:{}", self.name));
        if let Some(gauge) = &self.gauge {
            gauge.enter();
        }

        if let Some(token) = &self.cancel_on_setup {
            token.cancel();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(gauge) = &self.gauge {
            gauge.leave();
        }

        for dep in self.deps.iter().filter(|d| d.is_required()) {
            ctx.lookup::<String>(dep.name())?;
        }

        if self.fail_setup {
            return Err(VdError::Feature(format!("{} refused to start", self.name)));
        }

        if let Some(capability) = &self.capability {
            ctx.publish(capability, self.name.clone())?;
        }
        self.journal.record(format!("done:{}", self.name));
        Ok(())
    }

    async fn teardown(&self) -> VdResult<()> {
        self.journal.record(format!("teardown:{}", self.name));
        if self.fail_teardown {
            return Err(VdError::Feature(format!("{} leaked", self.name)));
        }
        Ok(())
    }
}
