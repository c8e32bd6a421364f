//! Animation frame callbacks (`requestAnimationFrame`)

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::Window;
use crate::error::Result;

/// An animation frame callback, invoked with the frame timestamp
#[derive(Clone)]
pub struct FrameRequestCallback(Rc<dyn Fn(f64) -> Result<()>>);

impl FrameRequestCallback {
    pub fn new(f: impl Fn(f64) -> Result<()> + 'static) -> Self {
        Self(Rc::new(f))
    }

    fn call(&self, now: f64) -> Result<()> {
        (self.0)(now)
    }
}

impl fmt::Debug for FrameRequestCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FrameRequestCallback")
    }
}

/// Registered animation frame callbacks, keyed by handle.
///
/// Handles increase monotonically, so key order is registration order.
#[derive(Default)]
pub struct AnimationFrameCallbackDriver {
    callbacks: BTreeMap<i32, FrameRequestCallback>,
    next_id: i32,
}

impl AnimationFrameCallbackDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback and return its handle.
    ///
    /// Handles are never reused, so a driver issues at most `i32::MAX` of
    /// them; the counter is not expected to reach that ceiling.
    pub fn add(&mut self, callback: FrameRequestCallback) -> i32 {
        self.next_id += 1;
        self.callbacks.insert(self.next_id, callback);
        self.next_id
    }

    pub fn remove(&mut self, handle: i32) -> bool {
        self.callbacks.remove(&handle).is_some()
    }

    pub fn has(&self, handle: i32) -> bool {
        self.callbacks.contains_key(&handle)
    }

    /// Handles registered right now, in registration order
    pub fn handles(&self) -> Vec<i32> {
        self.callbacks.keys().copied().collect()
    }

    fn take(&mut self, handle: i32) -> Option<FrameRequestCallback> {
        self.callbacks.remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl fmt::Debug for AnimationFrameCallbackDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationFrameCallbackDriver")
            .field("handles", &self.handles())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl Window {
    pub fn request_animation_frame(&self, callback: FrameRequestCallback) -> i32 {
        let handle = self.animation_frames.borrow_mut().add(callback);
        trace!(
            target: "skylight::animation",
            window = self.id(),
            handle,
            "requested animation frame"
        );
        handle
    }

    /// Cancel an animation frame callback; unknown handles are ignored
    pub fn cancel_animation_frame(&self, handle: i32) {
        self.animation_frames.borrow_mut().remove(handle);
    }

    /// Whether any animation frame callback is registered
    pub fn has_animation_frame_callbacks(&self) -> bool {
        !self.animation_frames.borrow().is_empty()
    }

    /// Run the callbacks registered before this tick with timestamp `now`.
    ///
    /// Callbacks registered during the tick run on the next one; callbacks
    /// cancelled by an earlier callback of the same tick are skipped.
    /// Returns the number of callbacks invoked.
    pub fn run_animation_frame_callbacks(&self, now: f64) -> usize {
        let snapshot = self.animation_frames.borrow().handles();

        let mut invoked = 0;
        for handle in snapshot {
            let callback = self.animation_frames.borrow_mut().take(handle);
            let Some(callback) = callback else {
                continue;
            };
            invoked += 1;
            if let Err(error) = callback.call(now) {
                self.report_exception(&error);
            }
        }

        trace!(target: "skylight::animation", window = self.id(), now, invoked, "frame tick");
        invoked
    }
}
