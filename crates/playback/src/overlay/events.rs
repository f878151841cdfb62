use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::controls::Control;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Document,
    Window,
    Viewport,
    Canvas,
    Outline,
    Control(Control),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PointerDown,
    PointerMove,
    PointerUp,
    PointerLeave,
    PointerCancel,
    Wheel,
    KeyDown,
    Resize,
    FullscreenChange,
    Click,
    Change,
}

/// Which part of the overlay owns a listener. Scopes are torn down
/// independently of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Session,
    Drag,
    DrawInput,
    Stroke,
    Laser,
}

impl Scope {
    pub const ALL: [Scope; 5] = [
        Scope::Session,
        Scope::Drag,
        Scope::DrawInput,
        Scope::Stroke,
        Scope::Laser,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Listener {
    pub scope: Scope,
    pub target: Target,
    pub kind: EventKind,
}

type Table = RefCell<HashMap<Listener, usize>>;

/// Ledger of every live listener.
///
/// Binding returns a [`Subscription`]; dropping it removes exactly the listeners
/// it added, so teardown does not depend on remembering what was bound.
#[derive(Debug, Clone, Default)]
pub struct EventRegistry {
    table: Rc<Table>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(
        &self,
        scope: Scope,
        listeners: impl IntoIterator<Item = (Target, EventKind)>,
    ) -> Subscription {
        let listeners: Vec<Listener> = listeners
            .into_iter()
            .map(|(target, kind)| Listener {
                scope,
                target,
                kind,
            })
            .collect();
        let mut table = self.table.borrow_mut();
        for listener in &listeners {
            *table.entry(*listener).or_insert(0) += 1;
        }
        tracing::trace!(?scope, count = listeners.len(), "bound listeners");
        Subscription {
            table: Rc::downgrade(&self.table),
            listeners,
        }
    }

    pub fn count(&self, scope: Scope, target: Target, kind: EventKind) -> usize {
        self.table
            .borrow()
            .get(&Listener {
                scope,
                target,
                kind,
            })
            .copied()
            .unwrap_or(0)
    }

    pub fn is_bound(&self, scope: Scope, target: Target, kind: EventKind) -> bool {
        self.count(scope, target, kind) > 0
    }

    /// Scopes listening for `kind` on `target`, in [`Scope::ALL`] order.
    pub fn scopes_for(&self, target: Target, kind: EventKind) -> Vec<Scope> {
        Scope::ALL
            .into_iter()
            .filter(|scope| self.is_bound(*scope, target, kind))
            .collect()
    }

    /// Total number of live listeners across every scope.
    pub fn total(&self) -> usize {
        self.table.borrow().values().sum()
    }

    /// The largest number of times any single listener is bound.
    pub fn max_multiplicity(&self) -> usize {
        self.table.borrow().values().copied().max().unwrap_or(0)
    }
}

#[must_use = "listeners are unbound as soon as the subscription is dropped"]
#[derive(Debug)]
pub struct Subscription {
    table: Weak<Table>,
    listeners: Vec<Listener>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(table) = self.table.upgrade() else {
            return;
        };
        let mut table = table.borrow_mut();
        for listener in &self.listeners {
            if let Some(count) = table.get_mut(listener) {
                *count -= 1;
                if *count == 0 {
                    table.remove(listener);
                }
            }
        }
    }
}
