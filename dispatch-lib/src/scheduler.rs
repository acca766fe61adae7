// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Scheduler
//!
//! `begin_dispatch` turns a shared shader and a `DispatchInvocation` into a frame hook.  The hook
//! locks the shader, reads the push source if there is one, and records the dispatch into whatever
//! command buffer the phase is recording.

use std::sync::Arc;

use crate::compute::data::PushConstants;
use crate::prelude::*;

#[derive(bon::Builder, Clone, Debug)]
pub struct DispatchInvocation {
    /// Work group counts.
    pub groups: [u32; 3],
    /// Run once and unregister, or run every frame until removed.
    #[builder(default = true)]
    pub one_time: bool,
    #[builder(default)]
    pub hook: HookPoint,
    /// Read every time the hook runs.
    pub push: Option<PushSource>,
}

/// Register `invocation` of `shader` with `hooks`.  Creates the context's descriptor pool manager
/// if nothing has yet.
pub fn begin_dispatch(
    shader: &SharedComputeShader,
    hooks: &mut FrameHooks,
    invocation: DispatchInvocation,
) -> Result<HookHandle, ComputeError> {
    {
        let shader = shader.lock()?;
        shader.context().pools();
        if let Some(source) = &invocation.push {
            let bytes = source.data.snapshot()?;
            shader.check_push(&PushConstants::new(&bytes).at(source.offset))?;
        }
    }

    let DispatchInvocation {
        groups,
        one_time,
        hook,
        push,
    } = invocation;

    let shader = Arc::clone(shader);
    let handle = hooks.add(
        hook,
        !one_time,
        Box::new(move |cb| {
            let mut shader = shader.lock()?;
            match &push {
                Some(source) => {
                    let bytes = source.data.snapshot()?;
                    shader.dispatch(cb, groups, Some(PushConstants::new(&bytes).at(source.offset)))
                }
                None => shader.dispatch(cb, groups, None),
            }
        }),
    );
    log::debug!("scheduled dispatch {groups:?} at {hook:?}, one time: {one_time}, {handle:?}");
    Ok(handle)
}
