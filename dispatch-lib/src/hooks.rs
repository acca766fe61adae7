// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Frame Hooks
//!
//! The host's frame loop owns a `FrameHooks` and calls `run` at each phase with the command buffer
//! it is recording.  Phases run in the host's order, usually `Transfer` before `Render`.
//!
//! Hooks run in registration order.  One-shot hooks are removed after they run, whether or not
//! they succeeded.  Repeating hooks stay until someone calls `remove` with their `HookHandle`.
//!
//! There are no threads here.  Each phase runs on whatever thread the host calls `run` from.

use ash::vk;

use crate::prelude::*;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// Pre-render transfer and compute pass.
    Transfer,
    /// Main render pass.
    #[default]
    Render,
}

/// Subscription to a registered hook.  Pass to `FrameHooks::remove` to cancel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookHandle(u64);

pub type HookFn = Box<dyn FnMut(vk::CommandBuffer) -> Result<(), ComputeError> + Send>;

struct Hook {
    handle: HookHandle,
    point: HookPoint,
    repeat: bool,
    callback: HookFn,
}

#[derive(Default)]
pub struct FrameHooks {
    hooks: Vec<Hook>,
    next: u64,
}

impl FrameHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, point: HookPoint, repeat: bool, callback: HookFn) -> HookHandle {
        let handle = HookHandle(self.next);
        self.next += 1;
        self.hooks.push(Hook {
            handle,
            point,
            repeat,
            callback,
        });
        handle
    }

    /// `false` if the hook already ran as a one-shot or was removed before.
    pub fn remove(&mut self, handle: HookHandle) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|h| h.handle != handle);
        self.hooks.len() != before
    }

    pub fn contains(&self, handle: HookHandle) -> bool {
        self.hooks.iter().any(|h| h.handle == handle)
    }

    /// Hooks registered at `point`.
    pub fn len(&self, point: HookPoint) -> usize {
        self.hooks.iter().filter(|h| h.point == point).count()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook registered at `point`, returning how many ran.  Stops at the first error.
    /// Hooks after the failing one stay registered and run next frame.
    pub fn run(&mut self, point: HookPoint, cb: vk::CommandBuffer) -> Result<usize, ComputeError> {
        let mut ran = 0;
        let mut i = 0;
        while i < self.hooks.len() {
            if self.hooks[i].point != point {
                i += 1;
                continue;
            }
            let result = (self.hooks[i].callback)(cb);
            ran += 1;
            if self.hooks[i].repeat {
                i += 1;
            } else {
                self.hooks.remove(i);
            }
            result?;
        }
        Ok(ran)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter(hits: &Arc<AtomicUsize>) -> HookFn {
        let hits = hits.clone();
        Box::new(move |_| {
            hits.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
    }

    #[test]
    fn test_one_shot_and_repeat() {
        let mut hooks = FrameHooks::new();
        let once = Arc::new(AtomicUsize::new(0));
        let every = Arc::new(AtomicUsize::new(0));
        let once_handle = hooks.add(HookPoint::Render, false, counter(&once));
        let every_handle = hooks.add(HookPoint::Render, true, counter(&every));

        let cb = vk::CommandBuffer::null();
        for _ in 0..3 {
            hooks.run(HookPoint::Render, cb).unwrap();
        }
        assert_eq!(once.load(Ordering::Relaxed), 1);
        assert_eq!(every.load(Ordering::Relaxed), 3);
        assert!(!hooks.contains(once_handle));
        assert!(!hooks.remove(once_handle));

        assert!(hooks.remove(every_handle));
        assert_eq!(hooks.run(HookPoint::Render, cb).unwrap(), 0);
        assert!(hooks.is_empty());
    }

    #[test]
    fn test_phases_are_separate() {
        let mut hooks = FrameHooks::new();
        let transfer = Arc::new(AtomicUsize::new(0));
        hooks.add(HookPoint::Transfer, true, counter(&transfer));
        assert_eq!(hooks.run(HookPoint::Render, vk::CommandBuffer::null()).unwrap(), 0);
        assert_eq!(hooks.run(HookPoint::Transfer, vk::CommandBuffer::null()).unwrap(), 1);
        assert_eq!(hooks.len(HookPoint::Transfer), 1);
        assert_eq!(hooks.len(HookPoint::Render), 0);
    }

    #[test]
    fn test_failed_one_shot_is_discarded() {
        let mut hooks = FrameHooks::new();
        let handle = hooks.add(
            HookPoint::Render,
            false,
            Box::new(|_| Err(ComputeError::InitializationFailed)),
        );
        assert!(hooks.run(HookPoint::Render, vk::CommandBuffer::null()).is_err());
        assert!(!hooks.contains(handle));
    }
}
