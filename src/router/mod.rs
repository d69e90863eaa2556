//! Routing of window-level commands to whichever view is current.
//!
//! The window layer never talks to a concrete view for these commands: it
//! dispatches an [`ActionId`] and the router forwards it to the single
//! active target through a fixed table of `(action, slot)` bindings.
//! Notifications travel back the same way, from the active target only.

mod find;

pub use find::{FindNotification, FindRouter, Searchable, SelectorRef};

use crate::data::LoadOutcome;
use crate::store::Settings;
use crate::tlog;

use std::cell::RefCell;
use std::rc::Weak;

/// Commands issued by the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionId {
    Reload,
    StopLoading,
    FollowSet,
    OptionsChanged,
    SelectAll,
    /// Emitted by the options overlay while it is open.
    OptionsEdited,
}

/// Entry points a command target exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Reload,
    StopLoading,
    SetFollow,
    ApplyConfiguration,
    SelectAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionArg {
    None,
    Flag(bool),
    Options(Settings),
}

/// View-to-window notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    LoadingProgressed(u8),
    LoadingFinished(LoadOutcome),
    FollowDisabled,
    LineNumberChanged(u64),
}

pub trait CommandTarget {
    fn invoke(&mut self, slot: Slot, arg: &ActionArg);
    fn take_notifications(&mut self) -> Vec<Notification>;
}

pub type TargetRef = Weak<RefCell<dyn CommandTarget>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(u64);

struct TransientBinding {
    id: BindingId,
    action: ActionId,
    slot: Slot,
    target: TargetRef,
}

#[derive(Default)]
pub struct CommandRouter {
    bindings: Vec<(ActionId, Slot)>,
    active: Option<TargetRef>,
    transient: Vec<TransientBinding>,
    next_binding: u64,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a permanent binding. Independent of any view; registered once.
    pub fn connect(&mut self, action: ActionId, slot: Slot) {
        if !self.bindings.contains(&(action, slot)) {
            self.bindings.push((action, slot));
        }
    }

    /// Swaps the active target. Notifications the new target queued while
    /// it was inactive are discarded.
    pub fn set_active_view(&mut self, target: Option<TargetRef>) {
        if let Some(rc) = target.as_ref().and_then(|t| t.upgrade()) {
            if let Ok(mut t) = rc.try_borrow_mut() {
                t.take_notifications();
            }
        }
        self.active = target;
    }

    pub fn has_active_view(&self) -> bool {
        self.active.as_ref().is_some_and(|t| t.strong_count() > 0)
    }

    /// Forwards `action` to the active target and to transient bindings.
    /// Returns how many slots were invoked; zero means it was dropped.
    pub fn dispatch(&mut self, action: ActionId, arg: ActionArg) -> usize {
        self.transient.retain(|b| b.target.strong_count() > 0);

        let mut delivered = 0;
        if let Some(target) = self.active.as_ref().and_then(|t| t.upgrade()) {
            for &(_, slot) in self.bindings.iter().filter(|(a, _)| *a == action) {
                match target.try_borrow_mut() {
                    Ok(mut t) => {
                        t.invoke(slot, &arg);
                        delivered += 1;
                    }
                    Err(_) => tlog!(warn, "{:?} dropped: active view busy", action),
                }
            }
        }

        for binding in self.transient.iter().filter(|b| b.action == action) {
            if let Some(target) = binding.target.upgrade() {
                if let Ok(mut t) = target.try_borrow_mut() {
                    t.invoke(binding.slot, &arg);
                    delivered += 1;
                }
            }
        }

        if delivered == 0 {
            tlog!(info, "{:?} dropped: no target", action);
        }
        delivered
    }

    /// Binds `action` to `slot` on the view active right now, outside the
    /// permanent table. Returns `None` when there is no active view.
    pub fn bind(&mut self, action: ActionId, slot: Slot) -> Option<BindingId> {
        let target = self.active.clone().filter(|t| t.strong_count() > 0)?;
        let id = BindingId(self.next_binding);
        self.next_binding += 1;
        self.transient.push(TransientBinding {
            id,
            action,
            slot,
            target,
        });
        Some(id)
    }

    pub fn unbind(&mut self, id: BindingId) -> bool {
        let before = self.transient.len();
        self.transient.retain(|b| b.id != id);
        self.transient.len() != before
    }

    /// Notifications queued by the active target since the last call.
    pub fn relay(&mut self) -> Vec<Notification> {
        let Some(target) = self.active.as_ref().and_then(|t| t.upgrade()) else {
            return Vec::new();
        };
        let notifications = match target.try_borrow_mut() {
            Ok(mut t) => t.take_notifications(),
            Err(_) => Vec::new(),
        };
        notifications
    }
}
