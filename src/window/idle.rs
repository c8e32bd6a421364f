//! Idle callback scheduling (`requestIdleCallback`)
//!
//! Callbacks wait in the pending list until the embedder starts an idle
//! period, then move to the runnable list. Each "idle-task" task invokes at
//! most one runnable callback, so other tasks can interleave with a long
//! backlog of idle work.

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::Window;
use crate::error::Result;
use crate::event_loop::{EventLoop, TaskSource};

/// An idle callback
#[derive(Clone)]
pub struct IdleRequestCallback(Rc<dyn Fn(&IdleDeadline) -> Result<()>>);

impl IdleRequestCallback {
    pub fn new(f: impl Fn(&IdleDeadline) -> Result<()> + 'static) -> Self {
        Self(Rc::new(f))
    }

    fn call(&self, deadline: &IdleDeadline) -> Result<()> {
        (self.0)(deadline)
    }
}

impl fmt::Debug for IdleRequestCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdleRequestCallback")
    }
}

/// Options accepted by `request_idle_callback`.
///
/// `timeout` is accepted but does not force scheduling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdleRequestOptions {
    pub timeout: Option<u32>,
}

/// Deadline handed to an idle callback
pub struct IdleDeadline {
    event_loop: Rc<EventLoop>,
}

impl IdleDeadline {
    pub fn new(event_loop: Rc<EventLoop>) -> Self {
        Self { event_loop }
    }

    /// Milliseconds left before the deadline, never negative
    pub fn time_remaining(&self) -> f64 {
        let remaining = self.event_loop.compute_deadline() - self.event_loop.current_time();
        remaining.max(0.0)
    }

    pub fn did_timeout(&self) -> bool {
        false
    }
}

impl fmt::Debug for IdleDeadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleDeadline")
            .field("time_remaining", &self.time_remaining())
            .finish()
    }
}

struct IdleEntry {
    handle: u32,
    callback: IdleRequestCallback,
}

/// The pending and runnable idle callback lists of one window
#[derive(Default)]
pub struct IdleScheduler {
    pending: VecDeque<IdleEntry>,
    runnable: VecDeque<IdleEntry>,
    last_handle: u32,
}

impl IdleScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback and return its handle (starting at 1).
    ///
    /// Handles are never reused, so a scheduler issues at most `u32::MAX`
    /// of them; the counter is not expected to reach that ceiling.
    pub fn request(&mut self, callback: IdleRequestCallback) -> u32 {
        self.last_handle += 1;
        let handle = self.last_handle;
        self.pending.push_back(IdleEntry { handle, callback });
        handle
    }

    /// Remove `handle` from both lists. Returns false if it was in neither.
    pub fn cancel(&mut self, handle: u32) -> bool {
        let before = self.pending.len() + self.runnable.len();
        self.pending.retain(|entry| entry.handle != handle);
        self.runnable.retain(|entry| entry.handle != handle);
        self.pending.len() + self.runnable.len() != before
    }

    /// Move every pending callback to the end of the runnable list.
    /// Returns whether anything is runnable.
    pub fn start_idle_period(&mut self) -> bool {
        self.runnable.extend(self.pending.drain(..));
        !self.runnable.is_empty()
    }

    /// Take the oldest runnable callback
    pub fn pop_runnable(&mut self) -> Option<(u32, IdleRequestCallback)> {
        self.runnable
            .pop_front()
            .map(|entry| (entry.handle, entry.callback))
    }

    pub fn pending_handles(&self) -> Vec<u32> {
        self.pending.iter().map(|entry| entry.handle).collect()
    }

    pub fn runnable_handles(&self) -> Vec<u32> {
        self.runnable.iter().map(|entry| entry.handle).collect()
    }

    pub fn has_runnable(&self) -> bool {
        !self.runnable.is_empty()
    }
}

impl fmt::Debug for IdleScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleScheduler")
            .field("pending", &self.pending_handles())
            .field("runnable", &self.runnable_handles())
            .field("last_handle", &self.last_handle)
            .finish()
    }
}

impl Window {
    pub fn request_idle_callback(
        &self,
        callback: IdleRequestCallback,
        options: IdleRequestOptions,
    ) -> u32 {
        let handle = self.idle_callbacks.borrow_mut().request(callback);
        trace!(
            target: "skylight::idle",
            window = self.id(),
            handle,
            timeout = ?options.timeout,
            "requested idle callback"
        );
        handle
    }

    /// Cancel an idle callback; unknown or already-run handles are ignored
    pub fn cancel_idle_callback(&self, handle: u32) {
        if self.idle_callbacks.borrow_mut().cancel(handle) {
            trace!(target: "skylight::idle", window = self.id(), handle, "cancelled idle callback");
        }
    }

    /// Signal the start of an idle period. The default deadline is measured
    /// from this point.
    pub fn start_idle_period(self: &Rc<Self>) {
        self.event_loop().begin_idle_period();
        let has_runnable = self.idle_callbacks.borrow_mut().start_idle_period();
        if has_runnable {
            self.queue_invoke_idle_callbacks();
        }
    }

    /// Handles of the callbacks waiting for the next idle period
    pub fn pending_idle_callbacks(&self) -> Vec<u32> {
        self.idle_callbacks.borrow().pending_handles()
    }

    /// Handles of the callbacks eligible to run in the current idle period
    pub fn runnable_idle_callbacks(&self) -> Vec<u32> {
        self.idle_callbacks.borrow().runnable_handles()
    }

    fn queue_invoke_idle_callbacks(self: &Rc<Self>) {
        let window = self.clone();
        self.event_loop()
            .queue_task(TaskSource::IdleTask, move || window.invoke_idle_callbacks());
    }

    fn invoke_idle_callbacks(self: &Rc<Self>) {
        let event_loop = self.event_loop();
        let deadline = event_loop.compute_deadline();
        if event_loop.current_time() >= deadline {
            trace!(target: "skylight::idle", window = self.id(), deadline, "idle period over");
            return;
        }

        // Released before the call: callbacks may request or cancel.
        let next = self.idle_callbacks.borrow_mut().pop_runnable();
        let Some((handle, callback)) = next else {
            return;
        };

        trace!(target: "skylight::idle", window = self.id(), handle, "invoking idle callback");
        let idle_deadline = IdleDeadline::new(event_loop.clone());
        if let Err(error) = callback.call(&idle_deadline) {
            self.report_exception(&error);
        }

        if self.idle_callbacks.borrow().has_runnable() {
            self.queue_invoke_idle_callbacks();
        }
    }
}
