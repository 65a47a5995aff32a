//! Join barrier for a fan-out whose number of replies is only known while
//! dispatching.
//!
//! The dispatcher owns one slot until [`FanIn::seal`]; every [`Branch`] owns one
//! more. A branch releases its slot when completed or when dropped unanswered.
//! The finish callback runs exactly once, when the last slot is released or
//! when [`FanIn::finish_now`] cuts the wait short.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

type FinishFn<T> = Box<dyn FnOnce(T)>;

struct Shared<T> {
    label: String,
    pending: Cell<usize>,
    acc: RefCell<Option<T>>,
    on_finish: RefCell<Option<FinishFn<T>>>,
}

impl<T> Shared<T> {
    fn release(&self) {
        let left = self.pending.get().saturating_sub(1);
        self.pending.set(left);
        if left == 0 {
            self.finish();
        }
    }

    fn finish(&self) {
        let Some(on_finish) = self.on_finish.borrow_mut().take() else {
            return;
        };
        let Some(acc) = self.acc.borrow_mut().take() else {
            return;
        };
        on_finish(acc);
    }

    fn is_finished(&self) -> bool {
        self.on_finish.borrow().is_none()
    }
}

pub struct FanIn<T> {
    shared: Rc<Shared<T>>,
    sealed: bool,
}

impl<T: 'static> FanIn<T> {
    pub fn new(label: &str, acc: T, on_finish: impl FnOnce(T) + 'static) -> Self {
        Self {
            shared: Rc::new(Shared {
                label: label.to_string(),
                pending: Cell::new(1),
                acc: RefCell::new(Some(acc)),
                on_finish: RefCell::new(Some(Box::new(on_finish))),
            }),
            sealed: false,
        }
    }

    pub fn branch(&self) -> Branch<T> {
        self.shared.pending.set(self.shared.pending.get() + 1);
        Branch {
            shared: Some(Rc::clone(&self.shared)),
        }
    }

    /// Releases the dispatcher's slot. With no outstanding branch this finishes
    /// immediately, so a fan-out to nobody still completes once.
    pub fn seal(mut self) -> FinishHandle<T> {
        self.sealed = true;
        let handle = FinishHandle {
            shared: Rc::downgrade(&self.shared),
        };
        self.shared.release();
        handle
    }
}

impl<T> Drop for FanIn<T> {
    fn drop(&mut self) {
        if !self.sealed {
            self.shared.release();
        }
    }
}

pub struct Branch<T> {
    shared: Option<Rc<Shared<T>>>,
}

impl<T> Branch<T> {
    pub fn complete(mut self, fold: impl FnOnce(&mut T)) {
        if let Some(shared) = self.shared.take() {
            if let Some(acc) = shared.acc.borrow_mut().as_mut() {
                fold(acc);
            }
            shared.release();
        }
    }
}

impl<T> Drop for Branch<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            if !shared.is_finished() {
                tracing::debug!(fan_in = %shared.label, "branch released without reply");
            }
            shared.release();
        }
    }
}

pub struct FinishHandle<T> {
    shared: std::rc::Weak<Shared<T>>,
}

impl<T> FinishHandle<T> {
    pub fn finish_now(&self) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        if shared.is_finished() {
            return false;
        }
        tracing::warn!(
            fan_in = %shared.label,
            pending = shared.pending.get(),
            "finishing before all branches replied"
        );
        shared.finish();
        true
    }

    pub fn is_finished(&self) -> bool {
        self.shared
            .upgrade()
            .map(|shared| shared.is_finished())
            .unwrap_or(true)
    }
}
