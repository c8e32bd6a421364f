//! Event Loop Implementation
//!
//! A single shared task queue with strict FIFO semantics. Every queued task
//! carries a source tag for diagnostics and filtering; the tag never changes
//! execution order. The loop also owns the virtual clock, the idle deadline
//! function and the termination nesting level consulted by `window.open`.

use crate::config::WindowConfig;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use tracing::{trace, warn};

/// Steps run by a task
pub type TaskSteps = Box<dyn FnOnce()>;

/// Task source tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskSource {
    /// Deferred `postMessage` delivery
    PostedMessage,
    /// "invoke idle callbacks" steps
    IdleTask,
    /// Navigation and history steps
    Navigation,
    /// User interaction events
    UserInteraction,
    /// Anything else
    Generic,
}

impl TaskSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskSource::PostedMessage => "posted-message",
            TaskSource::IdleTask => "idle-task",
            TaskSource::Navigation => "navigation",
            TaskSource::UserInteraction => "user-interaction",
            TaskSource::Generic => "generic",
        }
    }
}

impl fmt::Display for TaskSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued unit of work
pub struct Task {
    /// Unique task ID
    pub id: u64,
    /// Source tag
    pub source: TaskSource,
    steps: TaskSteps,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Result of draining the queue via `run_until_idle()`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Number of tasks that were dequeued and run
    pub tasks_run: usize,
    /// Whether the drain stopped because it hit `max_tasks_per_drain`
    pub budget_exhausted: bool,
}

/// Runtime statistics for the event loop
#[derive(Clone, Debug, Default)]
pub struct EventLoopStats {
    /// Total tasks queued
    pub total_tasks_queued: u64,
    /// Total tasks run
    pub total_tasks_run: u64,
    /// Tasks run, per source
    pub tasks_run_by_source: FxHashMap<TaskSource, u64>,
    /// Longest the queue has been
    pub max_queue_length: usize,
}

struct EventLoopState {
    /// Pending tasks, in queue order
    task_queue: VecDeque<Task>,
    /// Next task ID
    next_task_id: u64,
    /// Current virtual time in milliseconds
    virtual_time: f64,
    /// Deadline set by the embedder for the current idle period
    idle_deadline: Option<f64>,
    /// Virtual time at which the current idle period began
    idle_period_start: Option<f64>,
    /// Idle period length used when no explicit deadline is set
    max_idle_period: f64,
    /// Nonzero while unload/termination steps are running
    termination_nesting_level: u32,
    /// Starvation guard for `run_until_idle`
    max_tasks_per_drain: usize,
    stats: EventLoopStats,
}

/// The event loop shared by every window of an agent
pub struct EventLoop {
    state: RefCell<EventLoopState>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    /// Create a new event loop with default settings
    pub fn new() -> Self {
        Self::with_config(&WindowConfig::default())
    }

    /// Create an event loop using the scheduling settings of `config`
    pub fn with_config(config: &WindowConfig) -> Self {
        Self {
            state: RefCell::new(EventLoopState {
                task_queue: VecDeque::new(),
                next_task_id: 1,
                virtual_time: 0.0,
                idle_deadline: None,
                idle_period_start: None,
                max_idle_period: config.max_idle_period_ms,
                termination_nesting_level: 0,
                max_tasks_per_drain: config.max_tasks_per_drain,
                stats: EventLoopStats::default(),
            }),
        }
    }

    /// Get current virtual time
    pub fn current_time(&self) -> f64 {
        self.state.borrow().virtual_time
    }

    /// Advance virtual time
    pub fn advance_time(&self, ms: f64) {
        self.state.borrow_mut().virtual_time += ms;
    }

    /// Set (or clear) the deadline of the current idle period
    pub fn set_idle_deadline(&self, deadline: Option<f64>) {
        self.state.borrow_mut().idle_deadline = deadline;
    }

    /// Begin an idle period at the current time
    pub fn begin_idle_period(&self) {
        let mut state = self.state.borrow_mut();
        state.idle_period_start = Some(state.virtual_time);
    }

    /// The idle deadline function: the explicit deadline if the embedder set
    /// one, otherwise one maximum idle period after the current period began.
    /// Before any period has begun the deadline is one period from now.
    pub fn compute_deadline(&self) -> f64 {
        let state = self.state.borrow();
        if let Some(deadline) = state.idle_deadline {
            return deadline;
        }
        state.idle_period_start.unwrap_or(state.virtual_time) + state.max_idle_period
    }

    /// Current termination nesting level
    pub fn termination_nesting_level(&self) -> u32 {
        self.state.borrow().termination_nesting_level
    }

    /// Enter termination steps (unload, page hide, ...)
    pub fn increment_termination_nesting_level(&self) {
        self.state.borrow_mut().termination_nesting_level += 1;
    }

    /// Leave termination steps
    pub fn decrement_termination_nesting_level(&self) {
        let mut state = self.state.borrow_mut();
        state.termination_nesting_level = state.termination_nesting_level.saturating_sub(1);
    }

    /// Append a task to the end of the queue and return its ID
    pub fn queue_task(&self, source: TaskSource, steps: impl FnOnce() + 'static) -> u64 {
        let mut state = self.state.borrow_mut();
        let id = state.next_task_id;
        state.next_task_id += 1;

        state.task_queue.push_back(Task {
            id,
            source,
            steps: Box::new(steps),
        });
        state.stats.total_tasks_queued += 1;
        let len = state.task_queue.len();
        if len > state.stats.max_queue_length {
            state.stats.max_queue_length = len;
        }

        trace!(target: "skylight::event_loop", task = id, %source, "queued task");
        id
    }

    /// Check if the queue has any pending task
    pub fn has_pending_tasks(&self) -> bool {
        !self.state.borrow().task_queue.is_empty()
    }

    /// Number of pending tasks
    pub fn pending_task_count(&self) -> usize {
        self.state.borrow().task_queue.len()
    }

    /// Source tags of the pending tasks, in queue order
    pub fn pending_sources(&self) -> Vec<TaskSource> {
        self.state
            .borrow()
            .task_queue
            .iter()
            .map(|task| task.source)
            .collect()
    }

    /// Run the oldest pending task. Returns false if the queue was empty.
    ///
    /// The queue is not borrowed while the task runs, so task steps may
    /// queue further tasks.
    pub fn run_next_task(&self) -> bool {
        let task = self.state.borrow_mut().task_queue.pop_front();
        let Some(task) = task else {
            return false;
        };

        trace!(
            target: "skylight::event_loop",
            task = task.id,
            source = %task.source,
            "running task"
        );
        (task.steps)();

        let mut state = self.state.borrow_mut();
        state.stats.total_tasks_run += 1;
        *state.stats.tasks_run_by_source.entry(task.source).or_insert(0) += 1;
        true
    }

    /// Run tasks until the queue is empty or the drain budget is spent.
    /// Tasks queued while draining are run in the same drain.
    pub fn run_until_idle(&self) -> RunResult {
        let budget = self.state.borrow().max_tasks_per_drain;
        let mut result = RunResult::default();

        while self.run_next_task() {
            result.tasks_run += 1;
            if result.tasks_run >= budget && self.has_pending_tasks() {
                warn!(
                    target: "skylight::event_loop",
                    budget,
                    pending = self.pending_task_count(),
                    "stopped draining task queue after hitting the budget"
                );
                result.budget_exhausted = true;
                break;
            }
        }

        result
    }

    /// Drop every pending task
    pub fn clear(&self) {
        self.state.borrow_mut().task_queue.clear();
    }

    /// Snapshot of the runtime statistics
    pub fn stats(&self) -> EventLoopStats {
        self.state.borrow().stats.clone()
    }
}
