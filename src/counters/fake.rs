// Scripted counters for tests and demos.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{CounterFactory, CounterKind, CounterSource, MemoryGauge};
use crate::error::CounterError;
use crate::models::SystemResources;

/// Returns scripted readings in order; `None` entries fail the read. Once the script is
/// exhausted the last successful value repeats.
pub struct FakeCounter {
    instance: String,
    script: VecDeque<Option<f64>>,
    last: f64,
    delay: Option<Duration>,
    reads: Arc<AtomicUsize>,
    _handle: HandleGuard,
}

impl FakeCounter {
    fn scripted(instance: &str, script: Vec<Option<f64>>) -> Self {
        Self {
            instance: instance.to_string(),
            script: script.into(),
            last: 0.0,
            delay: None,
            reads: Arc::new(AtomicUsize::new(0)),
            _handle: HandleGuard(None),
        }
    }
}

impl CounterSource for FakeCounter {
    fn instance_name(&self) -> &str {
        &self.instance
    }

    fn next_value(&mut self) -> Result<f64, CounterError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        match self.script.pop_front() {
            Some(Some(v)) => {
                self.last = v;
                Ok(v)
            }
            Some(None) => Err(CounterError::Read {
                instance: self.instance.clone(),
                reason: "scripted failure".into(),
            }),
            None => Ok(self.last),
        }
    }
}

pub struct FakeMemoryGauge {
    script: VecDeque<Option<u64>>,
    last: u64,
    _handle: HandleGuard,
}

impl MemoryGauge for FakeMemoryGauge {
    fn used_bytes(&mut self) -> Result<u64, CounterError> {
        match self.script.pop_front() {
            Some(Some(v)) => {
                self.last = v;
                Ok(v)
            }
            Some(None) => Err(CounterError::Read {
                instance: super::TOTAL_INSTANCE.into(),
                reason: "scripted failure".into(),
            }),
            None => Ok(self.last),
        }
    }
}

/// Decrements the factory's open-handle count when a counter is dropped.
struct HandleGuard(Option<Arc<AtomicUsize>>);

impl Drop for HandleGuard {
    fn drop(&mut self) {
        if let Some(open) = &self.0 {
            open.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

/// Hands out `FakeCounter`s from per-(kind, instance) scripts. Unknown pairs fail creation.
pub struct FakeCounterFactory {
    scripts: Mutex<HashMap<(CounterKind, String), Vec<Option<f64>>>>,
    memory: Vec<Option<u64>>,
    resources: SystemResources,
    unavailable: HashSet<(CounterKind, String)>,
    stalls: HashMap<(CounterKind, String), Duration>,
    read_delay: Option<Duration>,
    open: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
}

impl FakeCounterFactory {
    pub fn new(resources: SystemResources) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            memory: Vec::new(),
            resources,
            unavailable: HashSet::new(),
            stalls: HashMap::new(),
            read_delay: None,
            open: Arc::new(AtomicUsize::new(0)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_counter(self, kind: CounterKind, instance: &str, values: &[f64]) -> Self {
        self.with_script(kind, instance, values.iter().copied().map(Some).collect())
    }

    pub fn with_script(self, kind: CounterKind, instance: &str, script: Vec<Option<f64>>) -> Self {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.insert((kind, instance.to_string()), script);
        }
        self
    }

    pub fn with_memory(mut self, used: &[u64]) -> Self {
        self.memory = used.iter().copied().map(Some).collect();
        self
    }

    pub fn with_memory_script(mut self, used: Vec<Option<u64>>) -> Self {
        self.memory = used;
        self
    }

    /// Creation of this counter fails with `Unavailable`.
    pub fn with_unavailable(mut self, kind: CounterKind, instance: &str) -> Self {
        self.unavailable.insert((kind, instance.to_string()));
        self
    }

    /// Every read of this one counter sleeps `delay`; overrides `with_read_delay`.
    pub fn with_stalled(mut self, kind: CounterKind, instance: &str, delay: Duration) -> Self {
        self.stalls.insert((kind, instance.to_string()), delay);
        self
    }

    /// Every read sleeps this long (exercises the sampler's read timeout).
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Counters and gauges created and not yet dropped.
    pub fn open_handles(&self) -> usize {
        self.open.load(Ordering::Relaxed)
    }

    /// Total reads across every counter this factory created.
    pub fn total_reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    fn guard(&self) -> HandleGuard {
        self.open.fetch_add(1, Ordering::Relaxed);
        HandleGuard(Some(self.open.clone()))
    }
}

impl CounterFactory for FakeCounterFactory {
    fn create_counter(
        &self,
        kind: CounterKind,
        instance: &str,
    ) -> Result<Box<dyn CounterSource>, CounterError> {
        let key = (kind, instance.to_string());
        if self.unavailable.contains(&key) {
            return Err(CounterError::Unavailable {
                counter: kind.to_string(),
                instance: instance.to_string(),
                reason: "scripted unavailable".into(),
            });
        }
        let script = self
            .scripts
            .lock()
            .ok()
            .and_then(|s| s.get(&key).cloned())
            .ok_or_else(|| CounterError::InstanceMissing {
                instance: instance.to_string(),
            })?;
        let mut counter = FakeCounter::scripted(instance, script);
        counter.delay = self.stalls.get(&key).copied().or(self.read_delay);
        counter.reads = self.reads.clone();
        counter._handle = self.guard();
        Ok(Box::new(counter))
    }

    fn create_memory_gauge(&self) -> Result<Box<dyn MemoryGauge>, CounterError> {
        Ok(Box::new(FakeMemoryGauge {
            script: self.memory.clone().into(),
            last: 0,
            _handle: self.guard(),
        }))
    }

    fn system_resources(&self) -> Result<SystemResources, CounterError> {
        Ok(self.resources)
    }
}
