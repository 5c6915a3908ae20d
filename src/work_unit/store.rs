//! Thread-local work-unit store.
//!
//! Entered units live on a per-thread stack; the innermost entry is the
//! current unit. [`WorkUnitGuard`] removes its own entry on drop, so guards
//! dropped out of order leave the rest of the stack intact.
//!
//! Async code must not hold a guard across an await point: another task
//! polled on the same thread would observe it. [`Scoped`] instead enters the
//! unit only for the duration of each poll of the wrapped future, which
//! gives task-local semantics on any executor.

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use pin_project::pin_project;

use super::WorkUnit;

struct StackEntry {
    id: u64,
    unit: WorkUnit,
}

thread_local! {
    static WORK_UNIT_STACK: RefCell<Vec<StackEntry>> = const { RefCell::new(Vec::new()) };
}

static NEXT_GUARD_ID: AtomicU64 = AtomicU64::new(1);

impl WorkUnit {
    /// Makes this unit current on this thread until the guard is dropped.
    #[must_use]
    pub fn enter(&self) -> WorkUnitGuard {
        let id = NEXT_GUARD_ID.fetch_add(1, Ordering::Relaxed);
        WORK_UNIT_STACK.with(|stack| {
            stack.borrow_mut().push(StackEntry {
                id,
                unit: self.clone(),
            });
        });
        WorkUnitGuard {
            id,
            _not_send: PhantomData,
        }
    }

    /// Returns a clone of the current unit, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        Self::with_current(|unit| unit.cloned())
    }

    /// Runs `f` with the current unit without cloning it.
    ///
    /// # Panics
    ///
    /// Panics if `f` enters or drops a unit on this thread.
    pub fn with_current<R>(f: impl FnOnce(Option<&Self>) -> R) -> R {
        WORK_UNIT_STACK.with(|stack| f(stack.borrow().last().map(|entry| &entry.unit)))
    }

    /// Runs `f` with this unit current.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        f()
    }

    /// Attaches this unit to `future`: it is current during every poll.
    pub fn scope<F: Future>(self, future: F) -> Scoped<F> {
        Scoped { unit: self, future }
    }
}

/// Guard for an entered work unit.
///
/// Not `Send`: the entry lives on the entering thread's stack.
#[derive(Debug)]
pub struct WorkUnitGuard {
    id: u64,
    _not_send: PhantomData<Rc<()>>,
}

impl Drop for WorkUnitGuard {
    fn drop(&mut self) {
        // `try_with`: the stack may already be gone during thread teardown.
        let _ = WORK_UNIT_STACK.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|entry| entry.id == self.id) {
                stack.remove(pos);
            }
        });
    }
}

/// Future returned by [`WorkUnit::scope`].
#[pin_project]
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Scoped<F> {
    unit: WorkUnit,
    #[pin]
    future: F,
}

impl<F> Scoped<F> {
    /// Returns the attached unit.
    pub fn unit(&self) -> &WorkUnit {
        &self.unit
    }
}

impl<F: Future> Future for Scoped<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<F::Output> {
        let this = self.project();
        let _guard = this.unit.enter();
        this.future.poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init_test_logging, poll_once, yield_now};
    use crate::work_unit::WorkUnitKind;

    fn current_kind() -> Option<WorkUnitKind> {
        WorkUnit::with_current(|unit| unit.map(WorkUnit::kind))
    }

    #[test]
    fn no_unit_outside_any_scope() {
        init_test_logging();
        assert!(WorkUnit::current().is_none());
    }

    #[test]
    fn enter_sets_current_and_restores_on_drop() {
        init_test_logging();
        {
            let _guard = WorkUnit::Request.enter();
            assert_eq!(current_kind(), Some(WorkUnitKind::Request));
        }
        assert_eq!(current_kind(), None);
    }

    #[test]
    fn nested_enter_restores_parent() {
        init_test_logging();
        let outer = WorkUnit::Request.enter();
        WorkUnit::Cache.run(|| {
            assert_eq!(current_kind(), Some(WorkUnitKind::Cache));
        });
        assert_eq!(current_kind(), Some(WorkUnitKind::Request));
        drop(outer);
        assert_eq!(current_kind(), None);
    }

    #[test]
    fn out_of_order_drop_preserves_top() {
        init_test_logging();
        let outer = WorkUnit::Request.enter();
        let middle = WorkUnit::Cache.enter();
        let inner = WorkUnit::PrerenderLegacy.enter();

        drop(middle);
        assert_eq!(current_kind(), Some(WorkUnitKind::PrerenderLegacy));
        drop(inner);
        assert_eq!(current_kind(), Some(WorkUnitKind::Request));
        drop(outer);
        assert_eq!(current_kind(), None);
    }

    #[test]
    fn scoped_future_sees_its_unit_on_every_poll() {
        init_test_logging();
        crate::test_phase!("scoped_future_sees_its_unit_on_every_poll");
        let mut task = Box::pin(WorkUnit::Cache.scope(async {
            let before = current_kind();
            yield_now().await;
            (before, current_kind())
        }));

        assert!(poll_once(&mut task).is_none());
        // Between polls the unit is not current on this thread.
        assert_eq!(current_kind(), None);

        let seen = poll_once(&mut task).expect("second poll completes");
        assert_eq!(
            seen,
            (Some(WorkUnitKind::Cache), Some(WorkUnitKind::Cache))
        );
        crate::test_complete!("scoped_future_sees_its_unit_on_every_poll");
    }

    #[test]
    fn interleaved_scoped_futures_do_not_leak_into_each_other() {
        init_test_logging();
        let mut a = Box::pin(WorkUnit::Request.scope(async {
            yield_now().await;
            current_kind()
        }));
        let mut b = Box::pin(WorkUnit::Cache.scope(async {
            yield_now().await;
            current_kind()
        }));

        assert!(poll_once(&mut a).is_none());
        assert!(poll_once(&mut b).is_none());
        assert_eq!(poll_once(&mut b), Some(Some(WorkUnitKind::Cache)));
        assert_eq!(poll_once(&mut a), Some(Some(WorkUnitKind::Request)));
    }

    #[test]
    fn scoped_exposes_unit() {
        let scoped = WorkUnit::Request.scope(async {});
        assert_eq!(scoped.unit().kind(), WorkUnitKind::Request);
    }
}
