use std::cell::RefCell;
use std::rc::Rc;

use crate::component::ComponentRef;

/// The two ordered component lists owned by a state.
///
/// Lists are append-only during composition. Do not add or remove
/// components from inside a component's own update or render call; the
/// lists are being iterated at that point and the component is borrowed.
#[derive(Default)]
pub struct Systems {
    update: Vec<ComponentRef>,
    render: Vec<ComponentRef>,
}

impl Systems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the update list.
    pub fn push_update(&mut self, component: ComponentRef) {
        self.update.push(component);
    }

    /// Append to the render list.
    pub fn push_render(&mut self, component: ComponentRef) {
        self.render.push(component);
    }

    /// Append to both lists.
    pub fn push_both(&mut self, component: ComponentRef) {
        self.update.push(Rc::clone(&component));
        self.render.push(component);
    }

    /// Remove every occurrence of `component` from both lists. Returns
    /// whether anything was removed.
    pub fn remove(&mut self, component: &ComponentRef) -> bool {
        let before = self.update.len() + self.render.len();
        self.update.retain(|c| !Rc::ptr_eq(c, component));
        self.render.retain(|c| !Rc::ptr_eq(c, component));
        before != self.update.len() + self.render.len()
    }

    /// Empty both lists.
    pub fn clear(&mut self) {
        self.update.clear();
        self.render.clear();
    }

    /// Number of components in the update list.
    pub fn update_len(&self) -> usize {
        self.update.len()
    }

    /// Number of components in the render list.
    pub fn render_len(&self) -> usize {
        self.render.len()
    }

    pub fn is_empty(&self) -> bool {
        self.update.is_empty() && self.render.is_empty()
    }

    /// Update every component in list order with the same `delta`.
    pub fn update(&self, delta: f64) {
        for component in &self.update {
            component.borrow_mut().on_update(delta);
        }
    }

    /// Render every component in list order.
    pub fn render(&self) {
        for component in &self.render {
            component.borrow_mut().on_render();
        }
    }
}

/// A mutually exclusive application state (title screen, gameplay, menu...).
///
/// The engine calls [`enter`](State::enter) exactly once when the state
/// becomes active and [`exit`](State::exit) exactly once when it stops being
/// active. `enter` is where a state composes its [`Systems`].
pub trait State {
    /// Name used in log output.
    fn name(&self) -> &str {
        "state"
    }

    /// Components run by the default update and render passes.
    fn systems(&self) -> &Systems;

    /// Called when the state becomes active. Compose [`Systems`] here.
    fn enter(&mut self);

    /// Called when the state is covered, popped or the engine shuts down.
    ///
    /// The default keeps the component lists, so a state uncovered by a pop
    /// keeps running with what it composed in `enter`.
    fn exit(&mut self) {}

    fn on_update(&mut self, delta: f64) {
        self.systems().update(delta);
    }

    fn on_render(&mut self, _delta: f64) {
        self.systems().render();
    }
}

/// Shared handle to a state on the engine's stack.
pub type StateRef = Rc<RefCell<dyn State>>;

/// Wrap a state in a shareable handle.
pub fn state<S: State + 'static>(state: S) -> StateRef {
    Rc::new(RefCell::new(state))
}
