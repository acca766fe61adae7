// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Scene
//!
//! Two shaders scheduled every frame.  The image shader fills the target from a uniform buffer in
//! the transfer phase.  The push shader runs in the render phase with nothing but push constants.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use dispatch_lib::prelude::*;

use crate::Args;

/// Uniform block of the image shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct Params {
    resolution: [u32; 2],
    time: f32,
    frame: u32,
    color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct Pulse {
    time: f32,
    frame: u32,
    gain: f32,
    _pad: u32,
}

/// Local size of both shaders in x and y.
const LOCAL_SIZE: u32 = 16;
/// Nominal frame time for the synthetic clock.
const FRAME_SECONDS: f32 = 1.0 / 60.0;

pub struct Scene {
    image_shader: SharedComputeShader,
    push_shader: SharedComputeShader,
    params: HostData,
    params_index: BindingIndex,
    pulse: HostData,
    resolution: [u32; 2],
}

impl Scene {
    pub fn new<F>(
        context: &Arc<ComputeContext>,
        target: Arc<dyn Texture>,
        args: &Args,
        hooks: &mut FrameHooks,
        load: F,
    ) -> Result<Self, ComputeError>
    where
        F: Fn(Arc<ComputeContext>, &str) -> Result<ComputeShader, ComputeError>,
    {
        let resolution = [args.size, args.size];
        let params = HostData::from_pod(&Params {
            resolution,
            ..Default::default()
        });
        let pulse = HostData::from_pod(&Pulse::default());

        let mut image_shader = load(context.clone(), &args.image_shader)?;
        image_shader.add_target_image(target, 0)?;
        let params_index = image_shader.add_uniform_buffer(params.clone(), false)?;
        let image_shader = image_shader.into_shared();

        let mut push_shader = load(context.clone(), &args.push_shader)?;
        push_shader.setup_push_constant(std::mem::size_of::<Pulse>() as u32)?;
        let push_shader = push_shader.into_shared();

        let groups = [
            args.size.div_ceil(LOCAL_SIZE),
            args.size.div_ceil(LOCAL_SIZE),
            1,
        ];
        begin_dispatch(
            &image_shader,
            hooks,
            DispatchInvocation::builder()
                .groups(groups)
                .one_time(false)
                .hook(HookPoint::Transfer)
                .build(),
        )?;
        begin_dispatch(
            &push_shader,
            hooks,
            DispatchInvocation::builder()
                .groups(groups)
                .one_time(false)
                .push(PushSource::new(pulse.clone()))
                .build(),
        )?;

        Ok(Self {
            image_shader,
            push_shader,
            params,
            params_index,
            pulse,
            resolution,
        })
    }

    /// Write this frame's host data ahead of recording.
    pub fn advance(&self, frame: u32) -> Result<(), ComputeError> {
        let time = frame as f32 * FRAME_SECONDS;
        let phase = time * std::f32::consts::TAU;
        self.params.write_pod(&Params {
            resolution: self.resolution,
            time,
            frame,
            color: [phase.sin() * 0.5 + 0.5, phase.cos() * 0.5 + 0.5, 0.25, 1.0],
        })?;
        self.image_shader.lock()?.update(self.params_index)?;

        self.pulse.write_pod(&Pulse {
            time,
            frame,
            gain: 1.0 + 0.5 * phase.sin(),
            _pad: 0,
        })
    }

    /// Print the GPU time of both dispatches of the frame that just finished.
    pub fn report(&self, frame: u32) -> Result<(), ComputeError> {
        let image = self.image_shader.lock()?.timings()?;
        let push = self.push_shader.lock()?.timings()?;
        match (image, push) {
            (Some(image), Some(push)) => println!(
                "frame {frame}: image {:.3} ms, push {:.3} ms",
                image.elapsed_ms(),
                push.elapsed_ms()
            ),
            _ => log::info!("frame {frame}: timings not available"),
        }
        Ok(())
    }
}
