use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::bus::MessageBus;
use crate::clock::Clock;
use crate::component::ComponentRef;
use crate::message::{ListenerRef, Message, MessageRef, MessageStatus, MessageType};
use crate::rate::TickRate;
use crate::state::StateRef;

/// Lifecycle of an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Uninitialized,
    Running,
    Paused,
    Destroyed,
}

/// A stack change waiting for the transition step of the next tick.
enum Transition {
    Push(StateRef),
    Pop,
}

type PendingTransition = Rc<RefCell<Option<Transition>>>;

/// Cheap, clonable access to the parts of the engine that listeners and
/// components may touch while the engine is in the middle of a tick.
///
/// Stack changes made through a handle are deferred: both
/// [`queue_state_change`](Self::queue_state_change) and
/// [`queue_state_pop`](Self::queue_state_pop) fill the same single slot,
/// which the engine applies at the start of the next tick.
#[derive(Clone)]
pub struct EngineHandle {
    bus: MessageBus,
    pending: PendingTransition,
    timestamp: Rc<Cell<f64>>,
}

impl EngineHandle {
    /// Create a message stamped with the current engine time.
    pub fn message(&self, kind: MessageType) -> MessageRef {
        Message::new(kind, self.timestamp.get())
    }

    /// Engine time in seconds captured at the last tick.
    pub fn timestamp(&self) -> f64 {
        self.timestamp.get()
    }

    /// The engine's message bus.
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Queue `message` for delivery on the next flush.
    pub fn queue_message(&self, message: MessageRef) -> MessageStatus {
        self.bus.enqueue(message)
    }

    /// Deliver `message` immediately.
    pub fn trigger_message(&self, message: &MessageRef) -> MessageStatus {
        self.bus.dispatch_now(message)
    }

    /// Register `listener` for messages of `kind`.
    pub fn add_listener(&self, listener: ListenerRef, kind: MessageType) -> bool {
        self.bus.register_listener(listener, kind)
    }

    /// Register `listener` for every message.
    pub fn add_wildcard_listener(&self, listener: ListenerRef) -> bool {
        self.bus.register_wildcard_listener(listener)
    }

    /// Unregister `listener` from messages of `kind`.
    pub fn remove_listener(&self, listener: &ListenerRef, kind: MessageType) -> bool {
        self.bus.unregister_listener(listener, kind)
    }

    /// Unregister a wildcard listener.
    pub fn remove_wildcard_listener(&self, listener: &ListenerRef) -> bool {
        self.bus.unregister_wildcard_listener(listener)
    }

    /// Request `state` to become active on the next tick. A later request
    /// before that tick replaces this one.
    pub fn queue_state_change(&self, state: StateRef) {
        *self.pending.borrow_mut() = Some(Transition::Push(state));
    }

    /// Request the active state to be popped on the next tick. Shares the
    /// slot with [`queue_state_change`](Self::queue_state_change); the
    /// later request wins.
    pub fn queue_state_pop(&self) {
        *self.pending.borrow_mut() = Some(Transition::Pop);
    }
}

/// The frame-loop orchestrator.
///
/// Owns the clock, the message bus and the state stack, and sequences them
/// in [`tick`](Self::tick):
///
/// 1. advance the clock and cache timestamp and delta
/// 2. flush the message queue
/// 3. apply a queued state change or pop
/// 4. update the active state
/// 5. render the active state (then the overlay, if visible)
pub struct Engine {
    clock: Clock,
    timestamp: Rc<Cell<f64>>,
    delta: f64,
    status: EngineStatus,
    /// Top of the stack (last element) is the active state.
    states: Vec<StateRef>,
    pending: PendingTransition,
    bus: MessageBus,
    overlay: Option<ComponentRef>,
    tick_rate: TickRate,
    frames: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An uninitialized engine with an empty stack. Call
    /// [`start`](Self::start) before ticking.
    pub fn new() -> Self {
        Self {
            clock: Clock::new(),
            timestamp: Rc::new(Cell::new(0.0)),
            delta: 0.0,
            status: EngineStatus::Uninitialized,
            states: Vec::new(),
            pending: Rc::new(RefCell::new(None)),
            bus: MessageBus::new(),
            overlay: None,
            tick_rate: TickRate::default(),
            frames: 0,
        }
    }

    /// A handle sharing this engine's bus, pending-state slot and clock
    /// timestamp.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            bus: self.bus.clone(),
            pending: Rc::clone(&self.pending),
            timestamp: Rc::clone(&self.timestamp),
        }
    }

    /// Current lifecycle status.
    pub fn status(&self) -> EngineStatus {
        self.status
    }

    /// Reset the clock and begin running.
    pub fn start(&mut self) {
        if self.status == EngineStatus::Destroyed {
            tracing::warn!("start ignored: engine already cleaned up");
            return;
        }
        self.clock.start();
        self.timestamp.set(0.0);
        self.delta = 0.0;
        self.tick_rate.reset();
        self.status = EngineStatus::Running;
        tracing::info!("engine started");
    }

    /// Freeze engine time. Only honoured while running.
    pub fn pause(&mut self) {
        if self.status != EngineStatus::Running {
            tracing::debug!(status = ?self.status, "pause ignored");
            return;
        }
        self.clock.pause();
        self.status = EngineStatus::Paused;
        tracing::debug!("engine paused");
    }

    /// Resume engine time. Only honoured while paused.
    pub fn unpause(&mut self) {
        if self.status != EngineStatus::Paused {
            tracing::debug!(status = ?self.status, "unpause ignored");
            return;
        }
        self.clock.unpause();
        self.status = EngineStatus::Running;
        tracing::debug!("engine resumed");
    }

    /// Whether the engine is paused.
    pub fn is_paused(&self) -> bool {
        self.status == EngineStatus::Paused
    }

    /// Run one frame. Every step runs to completion; while paused the clock
    /// holds still, so the active state sees the last delta again.
    pub fn tick(&mut self) {
        if self.status == EngineStatus::Destroyed {
            return;
        }

        self.clock.tick();
        self.timestamp.set(self.clock.elapsed());
        self.delta = self.clock.last_delta();
        if self.status == EngineStatus::Running {
            self.tick_rate.record(self.timestamp.get());
        }

        if let Some(overlay) = &self.overlay {
            let mut overlay = overlay.borrow_mut();
            if !overlay.is_paused() {
                overlay.on_update(self.delta);
            }
        }

        self.bus.flush();

        let transition = self.pending.borrow_mut().take();
        match transition {
            Some(Transition::Push(next)) => self.push_state(next),
            Some(Transition::Pop) => self.pop_state(),
            None => {}
        }

        if let Some(state) = self.current_state() {
            state.borrow_mut().on_update(self.delta);
        }
        if let Some(state) = self.current_state() {
            state.borrow_mut().on_render(self.delta);
        }

        if let Some(overlay) = &self.overlay {
            let mut overlay = overlay.borrow_mut();
            if overlay.is_visible() {
                overlay.on_render();
            }
        }

        self.frames += 1;
    }

    /// Engine time in seconds captured at the last tick.
    pub fn timestamp(&self) -> f64 {
        self.timestamp.get()
    }

    /// Seconds between the last two running ticks.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Number of completed ticks.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Running ticks per second over the last second of engine time.
    pub fn tick_rate(&self) -> f64 {
        self.tick_rate.per_second()
    }

    /// The active state, if any.
    pub fn current_state(&self) -> Option<StateRef> {
        self.states.last().cloned()
    }

    /// Number of states on the stack.
    pub fn state_depth(&self) -> usize {
        self.states.len()
    }

    /// Exit the active state (if any), enter `state` and make it active.
    pub fn push_state(&mut self, state: StateRef) {
        if let Some(current) = self.states.last() {
            let mut current = current.borrow_mut();
            tracing::debug!(state = current.name(), "exiting state");
            current.exit();
        }
        {
            let mut next = state.borrow_mut();
            tracing::debug!(state = next.name(), depth = self.states.len() + 1, "entering state");
            next.enter();
        }
        self.states.push(state);
    }

    /// Exit and remove the active state. The state underneath becomes active
    /// without another `enter`. No-op on an empty stack.
    pub fn pop_state(&mut self) {
        if let Some(current) = self.states.pop() {
            let mut current = current.borrow_mut();
            tracing::debug!(state = current.name(), "popping state");
            current.exit();
        }
    }

    /// Request `state` to be pushed at the start of the next tick. Only the
    /// last request before that tick is applied.
    pub fn queue_state_change(&mut self, state: StateRef) {
        *self.pending.borrow_mut() = Some(Transition::Push(state));
    }

    /// Request the active state to be popped at the start of the next tick.
    /// Replaces any queued state change.
    pub fn queue_state_pop(&mut self) {
        *self.pending.borrow_mut() = Some(Transition::Pop);
    }

    /// Whether a state change or pop is waiting for the next tick.
    pub fn has_pending_state(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// Create a message stamped with the current engine time.
    pub fn message(&self, kind: MessageType) -> MessageRef {
        Message::new(kind, self.timestamp.get())
    }

    /// The engine's message bus.
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Queue `message` for delivery on the next tick.
    pub fn queue_message(&self, message: MessageRef) -> MessageStatus {
        self.bus.enqueue(message)
    }

    /// Deliver `message` immediately.
    pub fn trigger_message(&self, message: &MessageRef) -> MessageStatus {
        self.bus.dispatch_now(message)
    }

    /// Register `listener` for messages of `kind`. Rejects duplicates.
    pub fn add_listener(&self, listener: ListenerRef, kind: MessageType) -> bool {
        self.bus.register_listener(listener, kind)
    }

    /// Register `listener` for every message. Rejects duplicates.
    pub fn add_wildcard_listener(&self, listener: ListenerRef) -> bool {
        self.bus.register_wildcard_listener(listener)
    }

    /// Unregister `listener` from messages of `kind`.
    pub fn remove_listener(&self, listener: &ListenerRef, kind: MessageType) -> bool {
        self.bus.unregister_listener(listener, kind)
    }

    /// Unregister a wildcard listener.
    pub fn remove_wildcard_listener(&self, listener: &ListenerRef) -> bool {
        self.bus.unregister_wildcard_listener(listener)
    }

    /// Install a debug overlay, updated after the clock step and rendered
    /// after the active state while visible. Returns the previous overlay.
    pub fn set_overlay(&mut self, overlay: ComponentRef) -> Option<ComponentRef> {
        self.overlay.replace(overlay)
    }

    /// Remove and return the overlay.
    pub fn clear_overlay(&mut self) -> Option<ComponentRef> {
        self.overlay.take()
    }

    /// Shut down: exit every stacked state from the top down, then drop all
    /// states, the queued state change, listeners and queued messages.
    ///
    /// Terminal; later ticks do nothing.
    pub fn clean(&mut self) {
        if self.status == EngineStatus::Destroyed {
            return;
        }
        for state in self.states.iter().rev() {
            state.borrow_mut().exit();
        }
        self.states.clear();
        self.pending.borrow_mut().take();
        self.bus.clear();
        self.overlay = None;
        self.status = EngineStatus::Destroyed;
        tracing::info!(frames = self.frames, "engine cleaned up");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.clean();
    }
}
