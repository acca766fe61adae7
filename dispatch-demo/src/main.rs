// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod frame;
mod scene;

use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use clap::Parser;

use dispatch_lib::assets::SPIRV_MAGIC;
use dispatch_lib::prelude::*;
use dispatch_lib::vulkan::image::{ExternalTexture, Image};
use dispatch_lib::vulkan::recording::RecordingDevice;

use crate::frame::Frame;
use crate::scene::Scene;

#[derive(Parser, Debug)]
struct Args {
    /// Shader writing the storage image from a uniform buffer
    #[arg(short, long, default_value = "fill.spv")]
    image_shader: String,
    /// Shader driven only by push constants
    #[arg(short, long, default_value = "pulse.spv")]
    push_shader: String,
    /// Width and height of the target image
    #[arg(short, long, default_value_t = 512)]
    size: u32,
    /// Frames to record and submit
    #[arg(short, long, default_value_t = 4)]
    frames: u32,
    /// Record against a fake device instead of a GPU
    #[arg(long)]
    dry_run: bool,
}

#[derive(thiserror::Error, Debug)]
enum DemoError {
    #[error("compute: {0}")]
    Compute(#[from] ComputeError),
    #[error("vulkan: {0}")]
    Vulkan(#[from] VulkanError),
}

const TARGET_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

fn main() -> Result<(), DemoError> {
    env_logger::init();
    let args = Args::parse();
    if args.dry_run {
        dry_run(&args)
    } else {
        run(&args)
    }
}

fn run(args: &Args) -> Result<(), DemoError> {
    let vk_context = Arc::new(VkContext::new()?);
    let context = Arc::new(ComputeContext::new(
        vk_context.clone(),
        ComputeConfig::from_env(),
    ));

    let extent = vk::Extent3D {
        width: args.size,
        height: args.size,
        depth: 1,
    };
    let image = Arc::new(Image::new(
        &vk_context,
        TextureKind::Texture2D,
        extent,
        TARGET_FORMAT,
        1,
        vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
    )?);
    let frame = Frame::new(&vk_context)?;

    let mut hooks = FrameHooks::new();
    let scene = Scene::new(&context, image.clone(), args, &mut hooks, |context, path| {
        ComputeShader::create(context, path)
    });

    // NOTE whatever happened, the GPU is idle after the last submission, so teardown may proceed
    let result = scene.and_then(|scene| {
        for n in 0..args.frames {
            scene.advance(n)?;
            let cb = frame.begin(&vk_context)?;
            hooks.run(HookPoint::Transfer, cb)?;
            hooks.run(HookPoint::Render, cb)?;
            frame.submit_and_wait(&vk_context)?;
            scene.report(n)?;
        }
        Ok(scene)
    });

    unsafe { vk_context.device.device_wait_idle().map_err(VulkanError::from)? };
    drop(hooks);
    let error = result.err();
    match Arc::try_unwrap(image) {
        Ok(image) => image.destroy(&vk_context),
        Err(_) => log::warn!("target image still shared at teardown, leaking it"),
    }
    frame.destroy(&vk_context);
    drop(context);
    vk_context.destroy();
    match error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Same frames with no GPU.  Useful for looking at the recorded command stream with
/// `RUST_LOG=debug`.
fn dry_run(args: &Args) -> Result<(), DemoError> {
    let device = Arc::new(RecordingDevice::new());
    let context = Arc::new(ComputeContext::new(
        device.clone(),
        ComputeConfig::from_env(),
    ));
    let texture = Arc::new(ExternalTexture::new(
        vk::Image::from_raw(1),
        TARGET_FORMAT,
        TextureKind::Texture2D,
    ));

    let mut hooks = FrameHooks::new();
    let scene = Scene::new(&context, texture, args, &mut hooks, |context, _| {
        ComputeShader::from_spirv(context, &[SPIRV_MAGIC])
    })?;

    let cb = vk::CommandBuffer::null();
    for n in 0..args.frames {
        scene.advance(n)?;
        hooks.run(HookPoint::Transfer, cb)?;
        hooks.run(HookPoint::Render, cb)?;
        // LIES a fixed 1000 tick dispatch
        device.set_timestamps(Some(vec![0, 1_000]));
        scene.report(n)?;
    }

    let commands = device.commands();
    println!(
        "recorded {} commands, {} dispatches",
        commands.len(),
        device.dispatches().len()
    );
    for call in commands {
        log::debug!("{call:?}");
    }
    Ok(())
}
