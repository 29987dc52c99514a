//! Component capability traits and the component source
//!
//! Components expose capabilities by composition rather than inheritance:
//! an object implements whichever of [`Updateable`], [`Drawable`], and
//! [`Initializable`] apply, and registers the matching handles as one
//! [`Component`]. The [`Components`] set forwards each capability to the
//! frame driver's registries, so adds and removals are journaled and safe
//! to perform from inside an update or draw callback.

use crate::registry::{DrawRegistry, Handle, UpdateRegistry};
use cadence_core::{FrameTime, Result};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// An object that receives simulation updates from the frame driver.
pub trait Updateable {
    /// Called once per update step with the current time snapshot.
    fn update(&mut self, time: &FrameTime) -> Result<()>;

    /// Traversal priority among updateables; lower runs first. After
    /// changing this, notify the owning registry via `order_changed`.
    fn update_order(&self) -> i32 {
        0
    }

    /// Whether this object should receive updates at all. After changing
    /// this, notify the owning registry via `active_changed`.
    fn enabled(&self) -> bool {
        true
    }
}

/// An object that receives a draw pass from the frame driver.
pub trait Drawable {
    /// Called once per draw phase with the frame's aggregate time snapshot.
    fn draw(&mut self, time: &FrameTime) -> Result<()>;

    /// Traversal priority among drawables; lower draws first.
    fn draw_order(&self) -> i32 {
        0
    }

    /// Whether this object should be drawn at all.
    fn visible(&self) -> bool {
        true
    }
}

/// An object with one-time setup run before its first update.
pub trait Initializable {
    fn initialize(&mut self) -> Result<()>;
}

/// One registered object, as the set of capability handles it exposes.
///
/// An object implementing several capabilities registers the same `Rc`
/// coerced to each trait object.
#[derive(Clone, Default)]
pub struct Component {
    pub update: Option<Handle<dyn Updateable>>,
    pub draw: Option<Handle<dyn Drawable>>,
    pub init: Option<Handle<dyn Initializable>>,
}

impl Component {
    /// A component with only the updateable capability.
    pub fn updateable(handle: Handle<dyn Updateable>) -> Self {
        Self {
            update: Some(handle),
            ..Self::default()
        }
    }

    /// A component with only the drawable capability.
    pub fn drawable(handle: Handle<dyn Drawable>) -> Self {
        Self {
            draw: Some(handle),
            ..Self::default()
        }
    }

    /// Adds the drawable capability.
    pub fn and_drawable(mut self, handle: Handle<dyn Drawable>) -> Self {
        self.draw = Some(handle);
        self
    }

    /// Adds the initializable capability.
    pub fn and_init(mut self, handle: Handle<dyn Initializable>) -> Self {
        self.init = Some(handle);
        self
    }

    /// Whether both components refer to the same underlying handles.
    fn same_object(&self, other: &Component) -> bool {
        same_handle(&self.update, &other.update)
            && same_handle(&self.draw, &other.draw)
            && same_handle(&self.init, &other.init)
    }
}

fn same_handle<T: ?Sized>(a: &Option<Handle<T>>, b: &Option<Handle<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// The component source: the collection applications register objects with.
///
/// Adds and removals are forwarded to the update and draw registries as
/// journaled notifications, so they are safe mid-frame. Once the driver has
/// initialized, a component added later is initialized immediately; before
/// that, initialization is deferred until the driver starts and runs in
/// registration order.
pub struct Components {
    update_registry: Rc<UpdateRegistry>,
    draw_registry: Rc<DrawRegistry>,
    registered: RefCell<Vec<Component>>,
    initialized: Cell<bool>,
}

impl Components {
    pub(crate) fn new(update_registry: Rc<UpdateRegistry>, draw_registry: Rc<DrawRegistry>) -> Self {
        Self {
            update_registry,
            draw_registry,
            registered: RefCell::new(Vec::new()),
            initialized: Cell::new(false),
        }
    }

    /// Registers a component, forwarding each capability to its registry.
    pub fn add(&self, component: Component) -> Result<()> {
        if self.initialized.get() {
            if let Some(init) = &component.init {
                init.borrow_mut().initialize()?;
            }
        }
        if let Some(update) = &component.update {
            self.update_registry.add(update.clone());
        }
        if let Some(draw) = &component.draw {
            self.draw_registry.add(draw.clone());
        }
        self.registered.borrow_mut().push(component);
        Ok(())
    }

    /// Deregisters a component. Returns `false` if it was not registered.
    pub fn remove(&self, component: &Component) -> bool {
        let position = self
            .registered
            .borrow()
            .iter()
            .position(|c| c.same_object(component));
        let Some(position) = position else {
            return false;
        };
        let removed = self.registered.borrow_mut().remove(position);
        if let Some(update) = &removed.update {
            self.update_registry.remove(update);
        }
        if let Some(draw) = &removed.draw {
            self.draw_registry.remove(draw);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.registered.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.borrow().is_empty()
    }

    /// Runs deferred initialization for every registered component, in
    /// registration order, and switches to initialize-on-add from here on.
    pub(crate) fn initialize_all(&self) -> Result<()> {
        self.initialized.set(true);
        let pending: Vec<_> = self
            .registered
            .borrow()
            .iter()
            .filter_map(|c| c.init.clone())
            .collect();
        for init in pending {
            init.borrow_mut().initialize()?;
        }
        Ok(())
    }

    /// Teardown: unsubscribes every resident item from both registries,
    /// then discards all registrations.
    pub(crate) fn clear(&self) {
        self.update_registry.clear();
        self.draw_registry.clear();
        self.registered.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{update_active, update_key};
    use crate::platform::HeadlessPlatform;
    use crate::{GameLoop, SortedRegistry};

    #[derive(Default)]
    struct Probe {
        updates: u32,
        draws: u32,
        inits: u32,
    }

    impl Updateable for Probe {
        fn update(&mut self, _time: &FrameTime) -> Result<()> {
            self.updates += 1;
            Ok(())
        }
    }

    impl Drawable for Probe {
        fn draw(&mut self, _time: &FrameTime) -> Result<()> {
            self.draws += 1;
            Ok(())
        }
    }

    impl Initializable for Probe {
        fn initialize(&mut self) -> Result<()> {
            self.inits += 1;
            Ok(())
        }
    }

    fn components() -> Components {
        let game = GameLoop::new(HeadlessPlatform);
        Components::new(game.updateables().clone(), game.drawables().clone())
    }

    #[test]
    fn add_forwards_each_capability() {
        let set = components();
        let probe = Rc::new(RefCell::new(Probe::default()));
        let component = Component::updateable(probe.clone()).and_drawable(probe.clone());
        set.add(component).unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.update_registry.len(), 1);
        assert_eq!(set.draw_registry.len(), 1);
    }

    #[test]
    fn remove_tears_capabilities_out() {
        let set = components();
        let probe = Rc::new(RefCell::new(Probe::default()));
        let component = Component::updateable(probe.clone()).and_drawable(probe.clone());
        set.add(component.clone()).unwrap();

        assert!(set.remove(&component));
        assert!(set.is_empty());
        assert!(set.update_registry.is_empty());
        assert!(set.draw_registry.is_empty());
        assert!(!set.remove(&component));
    }

    #[test]
    fn initialization_defers_until_startup_then_runs_on_add() {
        let set = components();
        let early = Rc::new(RefCell::new(Probe::default()));
        set.add(Component::updateable(early.clone()).and_init(early.clone()))
            .unwrap();
        assert_eq!(early.borrow().inits, 0);

        set.initialize_all().unwrap();
        assert_eq!(early.borrow().inits, 1);

        let late = Rc::new(RefCell::new(Probe::default()));
        set.add(Component::updateable(late.clone()).and_init(late.clone()))
            .unwrap();
        assert_eq!(late.borrow().inits, 1);
    }

    #[test]
    fn update_only_component_leaves_draw_registry_alone() {
        let set = components();
        let probe = Rc::new(RefCell::new(Probe::default()));
        set.add(Component::updateable(probe)).unwrap();
        assert_eq!(set.update_registry.len(), 1);
        assert!(set.draw_registry.is_empty());
    }

    #[test]
    fn trait_object_registry_sorts_by_update_order() {
        struct Ordered(i32, Rc<RefCell<Vec<i32>>>);
        impl Updateable for Ordered {
            fn update(&mut self, _time: &FrameTime) -> Result<()> {
                self.1.borrow_mut().push(self.0);
                Ok(())
            }
            fn update_order(&self) -> i32 {
                self.0
            }
        }

        let reg: SortedRegistry<dyn Updateable> = SortedRegistry::new(update_key, update_active);
        let log = Rc::new(RefCell::new(Vec::new()));
        reg.add(Rc::new(RefCell::new(Ordered(3, log.clone()))));
        reg.add(Rc::new(RefCell::new(Ordered(1, log.clone()))));
        reg.add(Rc::new(RefCell::new(Ordered(2, log.clone()))));

        let time = FrameTime::zero();
        reg.for_each_active(|item| item.borrow_mut().update(&time))
            .unwrap();
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }
}
