//! Frame-loop core for KEEL.
//!
//! This crate provides the pieces every KEEL application runs on: a
//! pause-aware clock, a typed message bus with immediate and queued
//! delivery, a stack of application states composed of update/render
//! components, and the [`Engine`](engine::Engine) that sequences them once
//! per tick. Logging setup lives here too.

pub mod bus;
pub mod clock;
pub mod component;
pub mod engine;
pub mod logging;
pub mod message;
pub mod rate;
pub mod state;

pub use bus::MessageBus;
pub use clock::Clock;
pub use component::{component, Component, ComponentFlags, ComponentRef};
pub use engine::{Engine, EngineHandle, EngineStatus};
pub use message::{
    listener_fn, Listener, ListenerRef, Message, MessageRef, MessageStatus, MessageType,
};
pub use rate::TickRate;
pub use state::{state, State, StateRef, Systems};
