// Copyright 2026 The Dispatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use ash::vk::{self, Handle};
use dispatch_lib::prelude::*;
use dispatch_lib::vulkan::descriptors::WriteResource;
use dispatch_lib::vulkan::image::ExternalTexture;
use dispatch_lib::vulkan::recording::{Call, Failure, RecordingDevice};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Params {
    resolution: [f32; 2],
    time: f32,
    frame: u32,
    color: [f32; 4],
}

const SPIRV: [u32; 5] = [0x0723_0203, 0x0001_0000, 0, 1, 0];

fn setup() -> (Arc<RecordingDevice>, Arc<ComputeContext>) {
    setup_with(ComputeConfig::default())
}

fn setup_with(config: ComputeConfig) -> (Arc<RecordingDevice>, Arc<ComputeContext>) {
    let device = Arc::new(RecordingDevice::new().with_timestamp_period(1.0));
    let context = Arc::new(ComputeContext::new(device.clone(), config));
    (device, context)
}

fn target(raw: u64) -> Arc<dyn Texture> {
    Arc::new(ExternalTexture::new(
        vk::Image::from_raw(raw),
        vk::Format::R32G32B32A32_SFLOAT,
        TextureKind::Texture2D,
    ))
}

fn cb() -> vk::CommandBuffer {
    vk::CommandBuffer::from_raw(0xCB)
}

fn layout_bindings(device: &RecordingDevice) -> Vec<(u32, vk::DescriptorType)> {
    device
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::CreateDescriptorSetLayout { bindings, .. } => {
                Some(bindings.iter().map(|b| (b.binding, b.ty)).collect())
            }
            _ => None,
        })
        .unwrap()
}

fn pool_sizes(device: &RecordingDevice) -> Vec<(vk::DescriptorType, u32)> {
    device
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::CreateDescriptorPool { pool_sizes, .. } => Some(
                pool_sizes
                    .iter()
                    .map(|s| (s.ty, s.descriptor_count))
                    .collect(),
            ),
            _ => None,
        })
        .unwrap()
}

fn count(device: &RecordingDevice, pred: impl Fn(&Call) -> bool) -> usize {
    device.calls().iter().filter(|c| pred(c)).count()
}

fn descriptor_updates(device: &RecordingDevice) -> Vec<Vec<u32>> {
    device
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::UpdateDescriptorSets(writes) => {
                Some(writes.iter().map(|w| w.binding).collect())
            }
            _ => None,
        })
        .collect()
}

#[test]
fn binding_indices_follow_call_order() {
    let (_, context) = setup();
    for offset in [0, 2] {
        let mut shader = ComputeShader::from_spirv(context.clone(), &SPIRV).unwrap();
        shader.set_binding_offset(offset).unwrap();
        let a = shader.add_sampler(target(1)).unwrap();
        let b = shader.add_uniform_buffer(HostData::zeroed(16), true).unwrap();
        let c = shader.add_target_image(target(2), 0).unwrap();
        assert_eq!([a, b, c], [offset, offset + 1, offset + 2]);

        shader.dispatch(cb(), [1, 1, 1], None).unwrap();
        // stable after the pipeline exists
        assert!(shader.binding(b).unwrap().buffer().is_some());
        assert!(shader.binding(c).unwrap().image_view().is_some());
    }
}

#[test]
fn update_refreshes_only_dirty_binding() {
    let (device, context) = setup();
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    let first = HostData::zeroed(16);
    let second = HostData::zeroed(16);
    shader.add_target_image(target(1), 0).unwrap();
    let a = shader.add_uniform_buffer(first.clone(), false).unwrap();
    shader.add_uniform_buffer(second, false).unwrap();

    shader.dispatch(cb(), [8, 8, 1], None).unwrap();
    assert_eq!(descriptor_updates(&device), vec![vec![0, 1, 2]]);

    // nothing dirty, nothing written
    shader.dispatch(cb(), [8, 8, 1], None).unwrap();
    assert_eq!(descriptor_updates(&device).len(), 1);

    first.write(&[5; 16]).unwrap();
    shader.update(a).unwrap();
    device.clear();
    shader.dispatch(cb(), [8, 8, 1], None).unwrap();
    assert_eq!(descriptor_updates(&device), vec![vec![a]]);

    let buffer = shader.binding(a).unwrap().buffer().unwrap().buffer;
    assert_eq!(device.buffer_contents(buffer), Some(vec![5; 16]));
    let uploads = count(&device, |c| matches!(c, Call::WriteBuffer { .. }));
    assert_eq!(uploads, 1);
}

#[test]
fn pipeline_builds_once() {
    let (device, context) = setup();
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    shader.add_target_image(target(1), 0).unwrap();
    for _ in 0..5 {
        shader.dispatch(cb(), [4, 4, 1], None).unwrap();
    }
    assert_eq!(
        count(&device, |c| matches!(c, Call::CreateComputePipeline { .. })),
        1
    );
    assert_eq!(
        count(&device, |c| matches!(c, Call::CreatePipelineLayout { .. })),
        1
    );
    assert_eq!(
        count(&device, |c| matches!(c, Call::CreateDescriptorPool { .. })),
        1
    );
    assert_eq!(device.dispatches().len(), 5);
    assert_eq!(shader.state(), ShaderState::Ready);
}

#[test]
fn push_constants_pushed_verbatim() {
    let (device, context) = setup();
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    let uniform = HostData::from_bytes(&[3; 8]);
    shader.add_uniform_buffer(uniform, false).unwrap();
    shader.setup_push_constant(16).unwrap();

    let payload: Vec<u8> = (0..16).collect();
    shader
        .dispatch(cb(), [1, 1, 1], Some(PushConstants::new(&payload)))
        .unwrap();
    shader.dispatch(cb(), [1, 1, 1], None).unwrap();

    let pushes: Vec<(u32, Vec<u8>)> = device
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::PushConstants { offset, bytes, .. } => Some((offset, bytes)),
            _ => None,
        })
        .collect();
    assert_eq!(pushes, vec![(0, payload)]);

    // the second dispatch still binds the same set
    let binds: Vec<vk::DescriptorSet> = device
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::BindDescriptorSet { set, .. } => Some(set),
            _ => None,
        })
        .collect();
    assert_eq!(binds.len(), 2);
    assert_eq!(binds[0], binds[1]);
    assert_eq!(descriptor_updates(&device).len(), 1);
}

#[test]
fn storage_images_transition_before_first_use() {
    let (device, context) = setup();
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    shader.add_sampler(target(1)).unwrap();
    shader.add_target_image(target(2), 0).unwrap();
    shader.dispatch(cb(), [1, 1, 1], None).unwrap();
    shader.dispatch(cb(), [1, 1, 1], None).unwrap();

    let calls = device.calls();
    let first_dispatch = calls
        .iter()
        .position(|c| matches!(c, Call::Dispatch(_)))
        .unwrap();

    let transitions: Vec<(usize, vk::PipelineStageFlags, Vec<vk::Image>)> = calls
        .iter()
        .enumerate()
        .filter_map(|(i, c)| match c {
            Call::PipelineBarrier {
                dst_stage,
                barriers,
                ..
            } if barriers
                .iter()
                .all(|b| b.old_layout == vk::ImageLayout::UNDEFINED) =>
            {
                Some((i, *dst_stage, barriers.iter().map(|b| b.image).collect()))
            }
            _ => None,
        })
        .collect();

    // one transition, for the storage image only, before the first dispatch
    assert_eq!(transitions.len(), 1);
    let (at, dst_stage, images) = &transitions[0];
    assert!(*at < first_dispatch);
    assert_eq!(*dst_stage, vk::PipelineStageFlags::COMPUTE_SHADER);
    assert_eq!(images, &vec![vk::Image::from_raw(2)]);

    let Call::PipelineBarrier { barriers, .. } = &calls[*at] else {
        unreachable!()
    };
    assert_eq!(barriers[0].new_layout, vk::ImageLayout::GENERAL);
    assert!(barriers[0].dst_access.contains(vk::AccessFlags::SHADER_WRITE));
}

#[test]
fn release_barriers_follow_each_dispatch() {
    let (device, context) = setup();
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    shader.add_target_image(target(2), 0).unwrap();
    shader.dispatch(cb(), [1, 1, 1], None).unwrap();

    let Some(Call::PipelineBarrier {
        src_stage,
        barriers,
        ..
    }) = device.calls().last().cloned()
    else {
        panic!("dispatch should end with a barrier");
    };
    assert_eq!(src_stage, vk::PipelineStageFlags::COMPUTE_SHADER);
    assert_eq!(barriers[0].old_layout, vk::ImageLayout::GENERAL);
    assert_eq!(barriers[0].src_access, vk::AccessFlags::SHADER_WRITE);
    assert_eq!(
        barriers[0].dst_access,
        vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE
    );

    let (device, context) = setup_with(ComputeConfig {
        release_barriers: false,
        ..Default::default()
    });
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    shader.add_target_image(target(2), 0).unwrap();
    shader.dispatch(cb(), [1, 1, 1], None).unwrap();
    shader.dispatch(cb(), [1, 1, 1], None).unwrap();
    // only the first-use transition
    assert_eq!(
        count(&device, |c| matches!(c, Call::PipelineBarrier { .. })),
        1
    );
}

#[test]
fn image_and_uniform_scenario() {
    let (device, context) = setup();
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    let image: Arc<dyn Texture> = Arc::new(ExternalTexture::new(
        vk::Image::from_raw(0x512),
        vk::Format::R8G8B8A8_UNORM,
        TextureKind::Texture2D,
    ));
    let params = HostData::from_pod(&Params {
        resolution: [512.0, 512.0],
        time: 0.0,
        frame: 0,
        color: [1.0, 0.0, 0.5, 1.0],
    });
    assert_eq!(params.len(), 32);
    assert_eq!(shader.add_target_image(image, 0).unwrap(), 0);
    assert_eq!(shader.add_uniform_buffer(params, false).unwrap(), 1);

    shader.dispatch(cb(), [512 / 16, 512 / 16, 1], None).unwrap();

    assert_eq!(
        layout_bindings(&device),
        vec![
            (0, vk::DescriptorType::STORAGE_IMAGE),
            (1, vk::DescriptorType::UNIFORM_BUFFER)
        ]
    );
    assert_eq!(
        pool_sizes(&device),
        vec![
            (vk::DescriptorType::STORAGE_IMAGE, 1),
            (vk::DescriptorType::UNIFORM_BUFFER, 1)
        ]
    );
    assert_eq!(device.dispatches(), vec![[32, 32, 1]]);

    let view = device
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::CreateImageView {
                view_type, range, ..
            } => Some((view_type, range)),
            _ => None,
        })
        .unwrap();
    assert_eq!(view.0, vk::ImageViewType::TYPE_2D);
    assert_eq!(view.1.aspect_mask, vk::ImageAspectFlags::COLOR);
    assert_eq!(view.1.layer_count, 1);
}

#[test]
fn push_constant_only_scenario() {
    let (device, context) = setup();
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    shader.setup_push_constant(32).unwrap();
    let payload = bytemuck::bytes_of(&Params {
        resolution: [512.0, 512.0],
        time: 1.0,
        frame: 1,
        color: [0.0; 4],
    })
    .to_vec();
    shader
        .dispatch(cb(), [32, 32, 1], Some(PushConstants::new(&payload)))
        .unwrap();

    assert_eq!(
        count(&device, |c| matches!(c, Call::CreateUniformBuffer { .. })),
        0
    );
    let ranges = device
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::CreatePipelineLayout {
                push_constant_ranges,
                ..
            } => Some(push_constant_ranges),
            _ => None,
        })
        .unwrap();
    assert_eq!(ranges.len(), 1);
    assert_eq!(ranges[0].size, 32);
    assert_eq!(ranges[0].offset, 0);
    assert_eq!(ranges[0].stage_flags, vk::ShaderStageFlags::COMPUTE);
}

#[test]
fn uniform_contents_per_dispatch() {
    let (device, context) = setup();
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    shader.add_target_image(target(1), 0).unwrap();
    let data = HostData::from_bytes(&[1; 32]);
    let index = shader.add_uniform_buffer(data.clone(), false).unwrap();

    shader.dispatch(cb(), [1, 1, 1], None).unwrap();
    let buffer = shader.binding(index).unwrap().buffer().unwrap().buffer;
    assert_eq!(device.buffer_contents(buffer), Some(vec![1; 32]));

    // written without update: the GPU copy is untouched
    data.write(&[2; 32]).unwrap();
    shader.dispatch(cb(), [1, 1, 1], None).unwrap();
    assert_eq!(device.buffer_contents(buffer), Some(vec![1; 32]));

    shader.update(index).unwrap();
    shader.dispatch(cb(), [1, 1, 1], None).unwrap();
    assert_eq!(device.buffer_contents(buffer), Some(vec![2; 32]));
}

#[test]
fn dynamic_uniforms_bind_zero_offsets() {
    let (device, context) = setup();
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    shader.add_uniform_buffer(HostData::zeroed(16), true).unwrap();
    shader.add_uniform_buffer(HostData::zeroed(16), false).unwrap();
    shader.add_uniform_buffer(HostData::zeroed(16), true).unwrap();
    shader.dispatch(cb(), [1, 1, 1], None).unwrap();

    let offsets = device
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::BindDescriptorSet {
                dynamic_offsets, ..
            } => Some(dynamic_offsets),
            _ => None,
        })
        .unwrap();
    assert_eq!(offsets, vec![0, 0]);
    assert_eq!(
        pool_sizes(&device),
        vec![
            (vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, 2),
            (vk::DescriptorType::UNIFORM_BUFFER, 1)
        ]
    );
}

#[test]
fn update_texture_swaps_view_and_transitions() {
    let (device, context) = setup();
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    let index = shader.add_target_image(target(1), 0).unwrap();
    shader.dispatch(cb(), [1, 1, 1], None).unwrap();
    let old_view = shader.binding(index).unwrap().image_view().unwrap();

    device.clear();
    shader.update_texture(index, target(9)).unwrap();
    shader.dispatch(cb(), [1, 1, 1], None).unwrap();
    let new_view = shader.binding(index).unwrap().image_view().unwrap();
    assert_ne!(old_view, new_view);

    let writes = device.descriptor_writes();
    assert_eq!(writes.len(), 1);
    match writes[0].resource {
        WriteResource::Image(info) => assert_eq!(info.image_view, new_view),
        WriteResource::Buffer(_) => panic!("expected an image write"),
    }

    let transitioned = device.calls().iter().any(|c| match c {
        Call::PipelineBarrier { barriers, .. } => barriers.iter().any(|b| {
            b.image == vk::Image::from_raw(9) && b.old_layout == vk::ImageLayout::UNDEFINED
        }),
        _ => false,
    });
    assert!(transitioned);
    // the old view lives until the shader drops
    assert_eq!(
        count(&device, |c| matches!(c, Call::DestroyImageView(_))),
        0
    );
    drop(shader);
    assert!(
        device
            .calls()
            .iter()
            .any(|c| matches!(c, Call::DestroyImageView(v) if *v == old_view))
    );
}

#[test]
fn descriptor_pool_failure_is_fatal() {
    let (device, context) = setup_with(ComputeConfig {
        max_sets_per_pool: 1,
        ..Default::default()
    });
    device.fail(Failure::DescriptorPool);
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    shader.add_target_image(target(1), 0).unwrap();
    let result = shader.dispatch(cb(), [1, 1, 1], None);
    assert!(matches!(result, Err(ComputeError::Vulkan(_))));
    assert_eq!(shader.state(), ShaderState::Initializing);
}

#[test]
fn failed_initialization_cleans_up() {
    let (device, context) = setup();
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    shader.add_target_image(target(1), 0).unwrap();
    shader.add_uniform_buffer(HostData::zeroed(16), false).unwrap();
    device.fail(Failure::PipelineLayout);

    assert!(shader.dispatch(cb(), [1, 1, 1], None).is_err());
    // the shader module is all that remains
    assert_eq!(device.live_handles(), 1);
    assert!(matches!(
        shader.dispatch(cb(), [1, 1, 1], None),
        Err(ComputeError::InitializationFailed)
    ));
    assert!(device.dispatches().is_empty());
}

#[test]
fn scheduled_dispatches_repeat_until_removed() {
    let (device, context) = setup();
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    shader.add_target_image(target(1), 0).unwrap();
    shader.setup_push_constant(4).unwrap();
    let shader = shader.into_shared();
    let mut hooks = FrameHooks::new();

    let frame = HostData::zeroed(4);
    let repeating = begin_dispatch(
        &shader,
        &mut hooks,
        DispatchInvocation::builder()
            .groups([16, 16, 1])
            .one_time(false)
            .push(PushSource::new(frame.clone()))
            .build(),
    )
    .unwrap();
    begin_dispatch(
        &shader,
        &mut hooks,
        DispatchInvocation::builder()
            .groups([1, 1, 1])
            .hook(HookPoint::Transfer)
            .build(),
    )
    .unwrap();

    for n in 0u32..3 {
        frame.write_pod(&n).unwrap();
        hooks.run(HookPoint::Transfer, cb()).unwrap();
        hooks.run(HookPoint::Render, cb()).unwrap();
    }
    assert_eq!(
        device.dispatches(),
        vec![[1, 1, 1], [16, 16, 1], [16, 16, 1], [16, 16, 1]]
    );

    let pushed: Vec<Vec<u8>> = device
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::PushConstants { bytes, .. } => Some(bytes),
            _ => None,
        })
        .collect();
    assert_eq!(
        pushed,
        vec![
            0u32.to_ne_bytes().to_vec(),
            1u32.to_ne_bytes().to_vec(),
            2u32.to_ne_bytes().to_vec()
        ]
    );

    assert!(hooks.remove(repeating));
    hooks.run(HookPoint::Render, cb()).unwrap();
    assert_eq!(device.dispatches().len(), 4);
}

#[test]
fn timestamps_wrap_dispatch() {
    let (device, context) = setup();
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    shader.add_target_image(target(1), 0).unwrap();
    assert!(shader.timings().unwrap().is_none());
    shader.dispatch(cb(), [1, 1, 1], None).unwrap();

    let commands = device.commands();
    let position = |pred: &dyn Fn(&Call) -> bool| commands.iter().position(|c| pred(c)).unwrap();
    let reset = position(&|c: &Call| matches!(c, Call::ResetQueryPool { count: 2, .. }));
    let start = position(&|c: &Call| matches!(c, Call::WriteTimestamp { query: 0, .. }));
    let dispatch = position(&|c: &Call| matches!(c, Call::Dispatch(_)));
    let end = position(&|c: &Call| matches!(c, Call::WriteTimestamp { query: 1, .. }));
    assert!(reset < start && start < dispatch && dispatch < end);

    // not ready yet
    assert!(shader.timings().unwrap().is_none());
    device.set_timestamps(Some(vec![1_000, 1_500_000]));
    let timing = shader.timings().unwrap().unwrap();
    assert_eq!(timing.elapsed_ns(), 1_499_000.0);
    assert!(shader.query_timer().is_some());

    let (device, context) = setup_with(ComputeConfig {
        timestamps: false,
        ..Default::default()
    });
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    shader.dispatch(cb(), [1, 1, 1], None).unwrap();
    assert!(shader.query_timer().is_none());
    assert_eq!(
        count(&device, |c| matches!(c, Call::WriteTimestamp { .. })),
        0
    );
}

#[test]
fn timestamps_skipped_without_queue_support() {
    let device = Arc::new(RecordingDevice::new().without_timestamps());
    let context = Arc::new(ComputeContext::new(device.clone(), ComputeConfig::default()));
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    shader.add_target_image(target(1), 0).unwrap();
    shader.dispatch(cb(), [1, 1, 1], None).unwrap();
    shader.dispatch(cb(), [1, 1, 1], None).unwrap();
    assert!(shader.query_timer().is_none());
    assert!(shader.timings().unwrap().is_none());
    assert_eq!(
        count(&device, |c| matches!(
            c,
            Call::CreateTimestampPool { .. } | Call::WriteTimestamp { .. }
        )),
        0
    );
    assert_eq!(device.dispatches().len(), 2);
}

#[test]
fn back_to_back_dispatches_order_storage_writes() {
    let (device, context) = setup();
    let mut shader = ComputeShader::from_spirv(context, &SPIRV).unwrap();
    shader.add_target_image(target(3), 0).unwrap();
    shader.dispatch(cb(), [1, 1, 1], None).unwrap();
    shader.dispatch(cb(), [1, 1, 1], None).unwrap();

    let commands = device.commands();
    let dispatches: Vec<usize> = commands
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, Call::Dispatch(_)))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(dispatches.len(), 2);

    // the second dispatch writes the same image, so the first one's writes must be ordered
    // before both its reads and its writes
    let between: Vec<&Call> = commands[dispatches[0]..dispatches[1]].iter().collect();
    let ordered = between.iter().any(|c| match c {
        Call::PipelineBarrier {
            src_stage,
            dst_stage,
            barriers,
        } => {
            src_stage.contains(vk::PipelineStageFlags::COMPUTE_SHADER)
                && (dst_stage.contains(vk::PipelineStageFlags::COMPUTE_SHADER)
                    || dst_stage.contains(vk::PipelineStageFlags::ALL_COMMANDS))
                && barriers.iter().any(|b| {
                    b.image == vk::Image::from_raw(3)
                        && b.src_access.contains(vk::AccessFlags::SHADER_WRITE)
                        && (b.dst_access.contains(vk::AccessFlags::SHADER_WRITE)
                            || b.dst_access.contains(vk::AccessFlags::MEMORY_WRITE))
                        && (b.dst_access.contains(vk::AccessFlags::SHADER_READ)
                            || b.dst_access.contains(vk::AccessFlags::MEMORY_READ))
                })
        }
        _ => false,
    });
    assert!(ordered);
}

#[test]
fn shared_pool_manager_reused() {
    let (device, context) = setup();
    let mut first = ComputeShader::from_spirv(context.clone(), &SPIRV).unwrap();
    let mut second = ComputeShader::from_spirv(context.clone(), &SPIRV).unwrap();
    first.add_target_image(target(1), 0).unwrap();
    second.add_sampler(target(2)).unwrap();
    first.dispatch(cb(), [1, 1, 1], None).unwrap();
    second.dispatch(cb(), [1, 1, 1], None).unwrap();
    assert_eq!(context.pools().live_pools(), 2);
    drop(first);
    assert_eq!(context.pools().live_pools(), 1);
    drop(second);
    assert_eq!(context.pools().live_pools(), 0);
    assert_eq!(device.live_handles(), 0);
}
