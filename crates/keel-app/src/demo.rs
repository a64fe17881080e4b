//! A small two-state demo: a title screen that hands over to a bouncing-ball
//! scene after a countdown, which quits once enough bounces are scored.
//!
//! Rendering goes to the log; the point is to exercise the frame loop,
//! queued and triggered messages, and queued state changes.

use std::cell::Cell;
use std::rc::Rc;

use keel_core::{
    component, listener_fn, state, Component, ComponentFlags, ComponentRef, Engine, EngineHandle,
    Listener, Message, MessageRef, MessageStatus, MessageType, State, Systems,
};

pub const MSG_BEGIN: MessageType = 1;
pub const MSG_SCORE: MessageType = 2;
pub const MSG_QUIT: MessageType = 3;

/// Tunables for the demo scenario.
#[derive(Debug, Clone, Copy)]
pub struct DemoOptions {
    /// Seconds the title screen stays up before play begins.
    pub title_seconds: f64,
    /// Bounces needed before the demo asks to quit.
    pub target_score: u32,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            title_seconds: 1.0,
            target_score: 5,
        }
    }
}

/// Wire the demo into `engine`: listeners, the title state and the debug
/// overlay. Returns the flag set once a quit message is consumed.
pub fn install(engine: &mut Engine, options: DemoOptions) -> Rc<Cell<bool>> {
    let quit = Rc::new(Cell::new(false));
    let handle = engine.handle();

    let begin_handle = handle.clone();
    let began = Cell::new(false);
    let begin = listener_fn(move |_m: &MessageRef| {
        if began.replace(true) {
            return true;
        }
        begin_handle.queue_state_change(state(PlayState::new(begin_handle.clone())));
        true
    });

    let quit_flag = Rc::clone(&quit);
    let quitter = listener_fn(move |m: &MessageRef| {
        tracing::info!(at = m.timestamp(), "quit requested");
        quit_flag.set(true);
        true
    });

    let registered = [
        engine.add_listener(begin, MSG_BEGIN),
        engine.add_listener(
            Rc::new(Scoreboard::new(handle.clone(), options.target_score)),
            MSG_SCORE,
        ),
        engine.add_listener(quitter, MSG_QUIT),
        engine.add_wildcard_listener(listener_fn(|m: &MessageRef| {
            tracing::debug!(kind = m.kind(), at = m.timestamp(), "message seen");
            false
        })),
    ];
    debug_assert!(registered.iter().all(|ok| *ok));

    engine.set_overlay(component(StatsOverlay::default()));
    engine.push_state(state(TitleState::new(handle, options.title_seconds)));
    quit
}

/// Counts down and announces that play can begin.
struct Countdown {
    flags: ComponentFlags,
    handle: EngineHandle,
    remaining: f64,
    announced: bool,
}

impl Component for Countdown {
    fn on_update(&mut self, delta: f64) {
        if self.announced {
            return;
        }
        self.remaining -= delta;
        if self.remaining > 0.0 {
            return;
        }
        match self.handle.queue_message(self.handle.message(MSG_BEGIN)) {
            MessageStatus::Success => self.announced = true,
            status => tracing::warn!(%status, "could not announce begin"),
        }
    }

    fn on_render(&mut self) {}

    fn flags(&self) -> &ComponentFlags {
        &self.flags
    }

    fn flags_mut(&mut self) -> &mut ComponentFlags {
        &mut self.flags
    }
}

/// Title text.
struct Banner {
    flags: ComponentFlags,
    frames: u64,
}

impl Component for Banner {
    fn on_update(&mut self, _delta: f64) {}

    fn on_render(&mut self) {
        if self.frames == 0 {
            tracing::info!("KEEL :: press nothing, the demo plays itself");
        }
        self.frames += 1;
        tracing::trace!(frame = self.frames, "banner drawn");
    }

    fn flags(&self) -> &ComponentFlags {
        &self.flags
    }

    fn flags_mut(&mut self) -> &mut ComponentFlags {
        &mut self.flags
    }
}

struct TitleState {
    systems: Systems,
    handle: EngineHandle,
    seconds: f64,
}

impl TitleState {
    fn new(handle: EngineHandle, seconds: f64) -> Self {
        Self {
            systems: Systems::new(),
            handle,
            seconds,
        }
    }
}

impl State for TitleState {
    fn name(&self) -> &str {
        "title"
    }

    fn systems(&self) -> &Systems {
        &self.systems
    }

    fn enter(&mut self) {
        self.systems.push_update(component(Countdown {
            flags: ComponentFlags::default(),
            handle: self.handle.clone(),
            remaining: self.seconds,
            announced: false,
        }));
        self.systems.push_render(component(Banner {
            flags: ComponentFlags::default(),
            frames: 0,
        }));
    }

    fn exit(&mut self) {
        self.systems.clear();
    }
}

/// A ball bouncing between two walls; every wall hit scores a point.
pub struct Ball {
    flags: ComponentFlags,
    handle: EngineHandle,
    position: f64,
    velocity: f64,
    bounces: u32,
}

impl Ball {
    const WIDTH: f64 = 10.0;

    pub fn new(handle: EngineHandle, velocity: f64) -> Self {
        Self {
            flags: ComponentFlags::default(),
            handle,
            position: 0.0,
            velocity,
            bounces: 0,
        }
    }
}

impl Component for Ball {
    fn on_update(&mut self, delta: f64) {
        self.position += self.velocity * delta;
        // A large delta can cross the arena more than once.
        while !(0.0..=Self::WIDTH).contains(&self.position) {
            if self.position > Self::WIDTH {
                self.position = 2.0 * Self::WIDTH - self.position;
            } else {
                self.position = -self.position;
            }
            self.velocity = -self.velocity;
            self.bounces += 1;
            let score = Message::with_payload(MSG_SCORE, self.handle.timestamp(), self.bounces);
            let _ = self.handle.queue_message(score);
        }
    }

    fn on_render(&mut self) {
        let column = (self.position / Self::WIDTH * 20.0).round() as usize;
        tracing::trace!(ball = %format!("|{:>width$}", "o", width = column + 1), "ball drawn");
    }

    fn flags(&self) -> &ComponentFlags {
        &self.flags
    }

    fn flags_mut(&mut self) -> &mut ComponentFlags {
        &mut self.flags
    }
}

struct PlayState {
    systems: Systems,
    handle: EngineHandle,
    ball: Option<ComponentRef>,
}

impl PlayState {
    fn new(handle: EngineHandle) -> Self {
        Self {
            systems: Systems::new(),
            handle,
            ball: None,
        }
    }
}

impl State for PlayState {
    fn name(&self) -> &str {
        "play"
    }

    fn systems(&self) -> &Systems {
        &self.systems
    }

    fn enter(&mut self) {
        let ball = component(Ball::new(self.handle.clone(), 25.0));
        self.systems.push_both(Rc::clone(&ball));
        self.ball = Some(ball);
        tracing::info!("play begins");
    }

    fn exit(&mut self) {
        if let Some(ball) = self.ball.take() {
            self.systems.remove(&ball);
        }
    }
}

/// Tallies score messages and triggers a quit once the target is reached.
pub struct Scoreboard {
    handle: EngineHandle,
    target: u32,
    score: Cell<u32>,
}

impl Scoreboard {
    pub fn new(handle: EngineHandle, target: u32) -> Self {
        Self {
            handle,
            target,
            score: Cell::new(0),
        }
    }
}

impl Listener for Scoreboard {
    fn on_message(&self, message: &MessageRef) -> bool {
        let Some(&bounces) = message.payload::<u32>() else {
            return false;
        };
        self.score.set(bounces);
        tracing::info!(score = bounces, target = self.target, "bounce");
        if bounces >= self.target {
            let _ = self.handle.trigger_message(&self.handle.message(MSG_QUIT));
        }
        true
    }
}

/// Debug overlay reporting frames per second of engine time.
#[derive(Default)]
struct StatsOverlay {
    flags: ComponentFlags,
    frames: u32,
    window: f64,
    fps: f64,
}

impl Component for StatsOverlay {
    fn on_update(&mut self, delta: f64) {
        self.frames += 1;
        self.window += delta;
        if self.window >= 1.0 {
            self.fps = f64::from(self.frames) / self.window;
            self.frames = 0;
            self.window = 0.0;
        }
    }

    fn on_render(&mut self) {
        if self.frames == 0 && self.fps > 0.0 {
            tracing::info!(fps = %format!("{:.1}", self.fps), "overlay");
        }
    }

    fn flags(&self) -> &ComponentFlags {
        &self.flags
    }

    fn flags_mut(&mut self) -> &mut ComponentFlags {
        &mut self.flags
    }
}
