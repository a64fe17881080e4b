use std::cell::RefCell;
use std::rc::Rc;

/// Pause and visibility flags carried by every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentFlags {
    pub paused: bool,
    pub visible: bool,
}

impl Default for ComponentFlags {
    fn default() -> Self {
        Self {
            paused: false,
            visible: true,
        }
    }
}

/// An update/render capability composed into a [`State`](crate::state::State).
///
/// The engine never looks inside a component: it only calls the two hooks
/// and reads the flags. Implementors embed a [`ComponentFlags`] and expose it
/// through [`flags`](Component::flags) / [`flags_mut`](Component::flags_mut);
/// the remaining flag methods have default implementations on top of those.
pub trait Component {
    /// Advance by `delta` seconds.
    fn on_update(&mut self, delta: f64);

    /// Draw the current frame.
    fn on_render(&mut self);

    fn flags(&self) -> &ComponentFlags;

    fn flags_mut(&mut self) -> &mut ComponentFlags;

    fn pause(&mut self) {
        self.flags_mut().paused = true;
    }

    fn unpause(&mut self) {
        self.flags_mut().paused = false;
    }

    fn is_paused(&self) -> bool {
        self.flags().paused
    }

    fn is_visible(&self) -> bool {
        self.flags().visible
    }

    fn set_visibility(&mut self, visible: bool) {
        self.flags_mut().visible = visible;
    }
}

/// Shared handle to a component. The same component may sit in both the
/// update and the render list of a state.
pub type ComponentRef = Rc<RefCell<dyn Component>>;

/// Wrap a component in a shareable handle.
pub fn component<C: Component + 'static>(component: C) -> ComponentRef {
    Rc::new(RefCell::new(component))
}
