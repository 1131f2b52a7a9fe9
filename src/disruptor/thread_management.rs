//! Thread management and CPU affinity
//!
//! Event processors only expose `run` and `halt`; this module is the optional
//! harness that runs each one on a named thread, optionally pinned to a core,
//! and halts and joins it when the handle goes away.

use crate::disruptor::{DisruptorError, EventProcessor, Result};
use core_affinity::CoreId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

static THREAD_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Thread settings for a processor thread
#[derive(Debug, Clone, Default)]
pub struct ThreadContext {
    /// CPU core affinity (optional)
    affinity: Option<CoreId>,
    /// Thread name (optional)
    name: Option<String>,
}

impl ThreadContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the thread to a CPU core
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidCoreId` if the core is not available on
    /// this machine.
    pub fn pin_at_core(mut self, core_id: usize) -> Result<Self> {
        if !get_available_cores().contains(&core_id) {
            return Err(DisruptorError::InvalidCoreId(core_id));
        }
        self.affinity = Some(CoreId { id: core_id });
        Ok(self)
    }

    pub fn thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The configured name, or a generated `processor-N`
    fn take_name(&mut self) -> String {
        self.name.take().unwrap_or_else(|| {
            let id = THREAD_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
            format!("processor-{id}")
        })
    }
}

/// Handle to an event processor running on its own thread
///
/// Dropping the handle halts the processor and joins the thread.
pub struct ProcessorThread {
    processor: Arc<dyn EventProcessor>,
    join_handle: Option<JoinHandle<Result<()>>>,
    thread_name: String,
}

impl ProcessorThread {
    /// Spawn a thread that calls `processor.run()`
    ///
    /// # Errors
    /// Returns `DisruptorError::Io` if the OS refuses to create the thread.
    pub fn spawn<P>(processor: Arc<P>, mut context: ThreadContext) -> Result<Self>
    where
        P: EventProcessor + 'static,
    {
        let processor: Arc<dyn EventProcessor> = processor;
        let thread_name = context.take_name();
        let affinity = context.affinity.take();

        let runner = Arc::clone(&processor);
        let name = thread_name.clone();
        let join_handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                set_affinity_if_defined(affinity, &name);
                runner.run()
            })?;

        debug!(thread = %thread_name, "spawned processor thread");
        Ok(Self {
            processor,
            join_handle: Some(join_handle),
            thread_name,
        })
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn processor(&self) -> &Arc<dyn EventProcessor> {
        &self.processor
    }

    /// Ask the processor to stop without waiting for it
    pub fn halt(&self) {
        self.processor.halt();
    }

    /// Wait for the processor thread to finish
    ///
    /// # Errors
    /// Returns the error `run` returned, or `DisruptorError::Handler` if the
    /// thread panicked.
    pub fn join(mut self) -> Result<()> {
        self.join_inner()
    }

    pub fn halt_and_join(self) -> Result<()> {
        self.halt();
        self.join()
    }

    /// Check if the thread is still running
    pub fn is_finished(&self) -> bool {
        !self
            .join_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn join_inner(&mut self) -> Result<()> {
        match self.join_handle.take() {
            Some(handle) => handle.join().map_err(|_| {
                DisruptorError::handler(format!(
                    "processor thread '{}' panicked",
                    self.thread_name
                ))
            })?,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ProcessorThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorThread")
            .field("thread_name", &self.thread_name)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Drop for ProcessorThread {
    fn drop(&mut self) {
        if self.join_handle.is_some() {
            self.processor.halt();
            if let Err(error) = self.join_inner() {
                warn!(thread = %self.thread_name, %error, "processor thread failed");
            }
        }
    }
}

fn set_affinity_if_defined(affinity: Option<CoreId>, thread_name: &str) {
    if let Some(core_id) = affinity {
        if core_affinity::set_for_current(core_id) {
            debug!(thread = thread_name, core = core_id.id, "pinned thread to core");
        } else {
            warn!(thread = thread_name, core = core_id.id, "could not pin thread to core");
        }
    }
}

/// Get available CPU core IDs
pub fn get_available_cores() -> Vec<usize> {
    core_affinity::get_core_ids()
        .unwrap_or_default()
        .iter()
        .map(|core| core.id)
        .collect()
}
