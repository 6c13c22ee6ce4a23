//! Vulkan renderer and frame submission
//!
//! [`Renderer`] owns the GPU resource pools (meshes, textures, materials),
//! the passes and a ring of per-frame contexts. Each call to
//! [`Renderer::draw_frame`] runs one iteration of
//!
//! ```text
//! wait slot fence -> acquire image -> record passes -> submit -> present
//! ```
//!
//! and consumes the draw queues. Acquire timeouts and out-of-date swapchains
//! skip the frame instead of failing; the swapchain is rebuilt and the next
//! call tries again.
//!
//! Resources are freed synchronously: every free waits for the device to go
//! idle through a [`DeviceIdle`] guard first, so an in-flight frame can never
//! reference a destroyed buffer or image.

use super::draw::DrawQueues;
use super::error::{RenderError, RenderResult};
use super::frame::FrameRing;
use super::gpu::{GpuUpload, MaterialDesc, MaterialHandle, MeshHandle, TextureHandle};
use super::gpu_types::{FrameUniforms, GpuMaterial, GpuMesh, MAX_MATERIALS, MAX_TEXTURES};
use super::passes::{pbr::FALLBACK_MATERIAL, PassTargets, Passes, RecordContext};
use super::vulkan::descriptors::{write_buffer, write_images};
use super::vulkan::{
    Buffer, CommandPool, CommandRecorder, DescriptorPool, DescriptorSetLayout,
    DescriptorSetLayoutBuilder, DeviceIdle, FrameSync, Image, Sampler, Semaphore, Swapchain,
    Texture, VulkanContext, VulkanError,
};
use crate::assets::mesh_data::MeshData;
use crate::assets::texture_data::TextureData;
use crate::config::RendererConfig;
use crate::foundation::aabb::Aabb;
use crate::foundation::pool::{Handle, Pool};
use crate::foundation::time::Stopwatch;
use crate::window::Window;
use ash::vk;
use std::path::PathBuf;

/// How long to wait for a swapchain image before skipping the frame
pub const ACQUIRE_TIMEOUT_NS: u64 = 1_000_000_000;

const AMBIENT: [f32; 3] = [0.03, 0.03, 0.035];
const MATERIAL_STRIDE: vk::DeviceSize = std::mem::size_of::<GpuMaterial>() as vk::DeviceSize;

/// Result of one [`Renderer::draw_frame`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame reached the presentation engine
    Presented,
    /// Nothing was submitted; try again next tick
    Skipped,
}

struct FrameContext {
    cmd: CommandRecorder,
    sync: FrameSync,
    uniforms: Buffer,
    descriptor_set: vk::DescriptorSet,
}

/// The Vulkan renderer
///
/// Fields are declared in teardown order: everything created from the
/// device is dropped before [`VulkanContext`].
pub struct Renderer {
    passes: Passes,
    frames: Vec<FrameContext>,
    render_finished: Vec<Semaphore>,
    meshes: Pool<GpuMesh>,
    textures: Pool<Texture>,
    materials: Pool<MaterialDesc>,
    default_texture: TextureHandle,
    material_buffer: Buffer,
    sampler: Sampler,
    descriptor_pool: DescriptorPool,
    global_set: vk::DescriptorSet,
    global_layout: DescriptorSetLayout,
    frame_layout: DescriptorSetLayout,
    depth: Image,
    swapchain: Swapchain,
    commands: CommandPool,
    context: VulkanContext,
    ring: FrameRing,
    clear_color: [f32; 4],
    shader_dir: PathBuf,
    framebuffer_extent: vk::Extent2D,
    needs_resize: bool,
}

impl Renderer {
    /// Create the device, swapchain, shared descriptors and passes for `window`
    pub fn new(window: &Window, config: &RendererConfig, app_name: &str) -> RenderResult<Self> {
        let mut ring = FrameRing::default();
        ring.set_frames_in_flight(config.frames_in_flight)?;
        let frames_in_flight = ring.frames_in_flight();

        let context = VulkanContext::new(window, app_name, config.enable_validation)?;
        let device = context.device().clone();
        let commands = CommandPool::new(device.clone(), context.queue_families().graphics)?;

        let (width, height) = window.framebuffer_size();
        let framebuffer_extent = vk::Extent2D { width, height };
        let swapchain = Swapchain::new(&context, framebuffer_extent)?;
        let depth = Image::depth(&context, swapchain.extent())?;

        let global_builder = DescriptorSetLayoutBuilder::new()
            .binding(
                0,
                vk::DescriptorType::STORAGE_BUFFER,
                1,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            )
            .binding(
                1,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                MAX_TEXTURES as u32,
                vk::ShaderStageFlags::FRAGMENT,
            );
        let frame_builder = DescriptorSetLayoutBuilder::new().binding(
            0,
            vk::DescriptorType::UNIFORM_BUFFER,
            1,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        );
        let global_layout = global_builder.build(&device)?;
        let frame_layout = frame_builder.build(&device)?;

        let mut pool_sizes = global_builder.pool_sizes(1);
        pool_sizes.extend(frame_builder.pool_sizes(frames_in_flight as u32));
        let descriptor_pool =
            DescriptorPool::new(&device, 1 + frames_in_flight as u32, &pool_sizes)?;
        let global_set = descriptor_pool.allocate(&[global_layout.handle()])?[0];

        let sampler = Sampler::new(&context)?;
        let mut textures = Pool::with_capacity(MAX_TEXTURES);
        let white = Texture::upload(&context, &commands, &TextureData::solid_color(1, 1, [255; 4]))?;
        let white_view = white.view();
        let default_texture: TextureHandle = textures.allocate(white)?.cast();
        write_images(
            &device,
            global_set,
            1,
            0,
            &vec![white_view; MAX_TEXTURES],
            sampler.handle(),
        );

        let material_buffer = Buffer::host_visible(
            &context,
            vk::BufferUsageFlags::STORAGE_BUFFER,
            &vec![GpuMaterial::from(&MaterialDesc::default()); MAX_MATERIALS],
        )?;
        write_buffer(
            &device,
            global_set,
            0,
            vk::DescriptorType::STORAGE_BUFFER,
            material_buffer.handle(),
        );
        let mut materials = Pool::with_capacity(MAX_MATERIALS);
        let fallback = materials.allocate(MaterialDesc::default())?;
        debug_assert_eq!(u32::from(fallback.index()), FALLBACK_MATERIAL);

        let command_buffers = commands.allocate(frames_in_flight as u32)?;
        let frame_layouts = vec![frame_layout.handle(); frames_in_flight];
        let frame_sets = descriptor_pool.allocate(&frame_layouts)?;
        let mut frames = Vec::with_capacity(frames_in_flight);
        for (cmd, descriptor_set) in command_buffers.into_iter().zip(frame_sets) {
            let uniforms = Buffer::host_visible(
                &context,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                &[FrameUniforms::new(None, &[], AMBIENT)],
            )?;
            write_buffer(
                &device,
                descriptor_set,
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                uniforms.handle(),
            );
            frames.push(FrameContext {
                cmd: CommandRecorder::new(device.clone(), cmd),
                sync: FrameSync::new(&device)?,
                uniforms,
                descriptor_set,
            });
        }

        let render_finished = (0..swapchain.image_count())
            .map(|_| Semaphore::new(device.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let set_layouts = [global_layout.handle(), frame_layout.handle()];
        let passes = Passes::new(
            &device,
            &PassTargets {
                color_format: swapchain.format(),
                depth_format: depth.format(),
                set_layouts: &set_layouts,
                shader_dir: &config.shader_dir,
            },
        )?;

        ring.initialize()?;
        log::info!(
            "Renderer initialized: {}x{}, {} frames in flight, passes {:?}",
            swapchain.extent().width,
            swapchain.extent().height,
            frames_in_flight,
            passes.names()
        );

        Ok(Self {
            passes,
            frames,
            render_finished,
            meshes: Pool::new(),
            textures,
            materials,
            default_texture,
            material_buffer,
            sampler,
            descriptor_pool,
            global_set,
            global_layout,
            frame_layout,
            depth,
            swapchain,
            commands,
            context,
            ring,
            clear_color: config.clear_color,
            shader_dir: config.shader_dir.clone(),
            framebuffer_extent,
            needs_resize: false,
        })
    }

    /// Record, submit and present one frame from `queues`
    ///
    /// The queues are empty afterwards whatever the outcome.
    pub fn draw_frame(&mut self, queues: &mut DrawQueues) -> RenderResult<FrameOutcome> {
        queues.consume(|queues| self.render(queues))
    }

    fn render(&mut self, queues: &DrawQueues) -> RenderResult<FrameOutcome> {
        if self.needs_resize && !self.recreate_swapchain()? {
            return Ok(FrameOutcome::Skipped);
        }

        let slot = self.ring.current_slot();
        self.frames[slot].sync.in_flight.wait(u64::MAX)?;

        let acquired = self.swapchain.acquire_next_image(
            ACQUIRE_TIMEOUT_NS,
            self.frames[slot].sync.image_available.handle(),
        );
        let image_index = match acquired {
            Ok((index, suboptimal)) => {
                self.needs_resize |= suboptimal;
                index
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Swapchain out of date on acquire");
                self.needs_resize = true;
                self.recreate_swapchain()?;
                return Ok(FrameOutcome::Skipped);
            }
            Err(vk::Result::TIMEOUT | vk::Result::NOT_READY) => {
                log::warn!("No swapchain image within {} ms, skipping frame", ACQUIRE_TIMEOUT_NS / 1_000_000);
                return Ok(FrameOutcome::Skipped);
            }
            Err(e) => return Err(VulkanError::Api(e).into()),
        };

        self.ring.begin()?;
        if let Err(e) = self.record(slot, image_index, queues) {
            self.ring.skip();
            self.recover_frame_sync(slot);
            return Err(e);
        }
        if let Err(e) = self.submit(slot, image_index) {
            // the fence may already be reset, so the slot gets fresh sync objects
            self.ring.skip();
            self.recover_frame_sync(slot);
            return Err(e);
        }
        self.ring.submit()?;

        let presented = self.swapchain.present(
            self.context.present_queue(),
            image_index,
            self.render_finished[image_index as usize].handle(),
        );
        // The submission consumed the slot whether or not presentation worked.
        self.ring.present()?;
        match presented {
            Ok(false) => {}
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Swapchain suboptimal or out of date on present");
                self.needs_resize = true;
                self.recreate_swapchain()?;
                return Ok(FrameOutcome::Skipped);
            }
            Err(e) => return Err(VulkanError::Api(e).into()),
        }

        if self.needs_resize {
            self.recreate_swapchain()?;
        }
        Ok(FrameOutcome::Presented)
    }

    fn record(&mut self, slot: usize, image_index: u32, queues: &DrawQueues) -> RenderResult<()> {
        let frame = &self.frames[slot];
        frame.uniforms.write(
            0,
            &[FrameUniforms::new(queues.camera(), queues.lights(), AMBIENT)],
        )?;

        let cmd = &frame.cmd;
        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;

        let image = self.swapchain.image(image_index);
        let old_layout = self.swapchain.layout(image_index);
        cmd.transition_image(image, old_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)?;
        cmd.transition_image(
            self.depth.handle(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )?;

        let extent = self.swapchain.extent();
        cmd.begin_rendering(
            self.swapchain.image_view(image_index),
            self.depth.view(),
            extent,
            self.clear_color,
        );
        cmd.set_viewport_scissor(extent);

        let draws = self.passes.record(
            &RecordContext {
                cmd,
                descriptor_sets: [self.global_set, frame.descriptor_set],
                meshes: &self.meshes,
                textures: &self.textures,
                materials: &self.materials,
            },
            queues,
        );

        cmd.end_rendering();
        cmd.transition_image(
            image,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        )?;
        cmd.end()?;

        self.swapchain
            .set_layout(image_index, vk::ImageLayout::PRESENT_SRC_KHR);
        log::trace!(
            "Frame {} slot {} image {}: {} draws",
            self.ring.frame_index(),
            slot,
            image_index,
            draws
        );
        Ok(())
    }

    fn submit(&self, slot: usize, image_index: u32) -> RenderResult<()> {
        let frame = &self.frames[slot];
        let wait_semaphores = [frame.sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.cmd.handle()];
        let signal_semaphores = [self.render_finished[image_index as usize].handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        frame.sync.in_flight.reset()?;
        self.context
            .queue_submit(&[submit_info], frame.sync.in_flight.handle())?;
        Ok(())
    }

    /// An acquired image whose frame was never submitted leaves the
    /// acquire semaphore with a pending signal, and a failed submit may leave
    /// the fence unsignaled; replace the slot's sync objects once the device
    /// is idle.
    fn recover_frame_sync(&mut self, slot: usize) {
        let result = DeviceIdle::wait(self.context.device())
            .and_then(|_idle| FrameSync::new(self.context.device()));
        match result {
            Ok(sync) => self.frames[slot].sync = sync,
            Err(e) => log::error!("Could not reset sync objects of frame slot {}: {}", slot, e),
        }
        self.needs_resize = true;
    }

    /// Rebuild swapchain-sized objects; returns false while the window has no area
    fn recreate_swapchain(&mut self) -> RenderResult<bool> {
        let extent = self.framebuffer_extent;
        if extent.width == 0 || extent.height == 0 {
            return Ok(false);
        }

        let idle = DeviceIdle::wait(self.context.device())?;
        let old_format = self.swapchain.format();
        self.swapchain.recreate(&self.context, extent)?;
        self.depth = Image::depth(&self.context, self.swapchain.extent())?;

        if self.render_finished.len() != self.swapchain.image_count() {
            self.render_finished = (0..self.swapchain.image_count())
                .map(|_| Semaphore::new(idle.device().clone()))
                .collect::<Result<Vec<_>, _>>()?;
        }

        if self.swapchain.format() != old_format {
            log::info!("Swapchain format changed, rebuilding pipelines");
            let set_layouts = [self.global_layout.handle(), self.frame_layout.handle()];
            self.passes.reload(
                &idle,
                &PassTargets {
                    color_format: self.swapchain.format(),
                    depth_format: self.depth.format(),
                    set_layouts: &set_layouts,
                    shader_dir: &self.shader_dir,
                },
            );
        }

        self.needs_resize = false;
        Ok(true)
    }

    /// Record a new framebuffer size; the swapchain is rebuilt before the next frame
    pub fn resize(&mut self, width: u32, height: u32) {
        self.framebuffer_extent = vk::Extent2D { width, height };
        self.needs_resize = true;
    }

    /// Rebuild every pass pipeline from the shader directory
    ///
    /// Returns the names of passes that failed to rebuild; those stay disabled.
    pub fn reload_shaders(&mut self) -> RenderResult<Vec<&'static str>> {
        let stopwatch = Stopwatch::start_new();
        let idle = DeviceIdle::wait(self.context.device())?;
        let set_layouts = [self.global_layout.handle(), self.frame_layout.handle()];
        let failed = self.passes.reload(
            &idle,
            &PassTargets {
                color_format: self.swapchain.format(),
                depth_format: self.depth.format(),
                set_layouts: &set_layouts,
                shader_dir: &self.shader_dir,
            },
        );
        log::info!(
            "Shaders reloaded in {:.1} ms ({} failed)",
            stopwatch.elapsed_millis(),
            failed.len()
        );
        Ok(failed)
    }

    /// Block until the GPU finished all submitted work
    pub fn wait_idle(&self) -> RenderResult<()> {
        DeviceIdle::wait(self.context.device())?;
        Ok(())
    }

    /// Frame ring state
    pub fn frame_ring(&self) -> &FrameRing {
        &self.ring
    }

    /// Current swapchain extent
    pub fn extent(&self) -> (u32, u32) {
        let extent = self.swapchain.extent();
        (extent.width, extent.height)
    }

    /// Width over height of the swapchain
    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.extent();
        if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        }
    }

    /// Live GPU resource counts: meshes, textures, materials
    pub fn resource_counts(&self) -> (usize, usize, usize) {
        (self.meshes.len(), self.textures.len(), self.materials.len())
    }

    /// Drain the GPU and release every pooled resource
    ///
    /// Resource caches must have released their handles before this; whatever
    /// is still alive is reported as leaked.
    pub fn shutdown(&mut self) -> RenderResult<()> {
        let _idle = DeviceIdle::wait(self.context.device())?;
        let leaked_meshes = self.meshes.drain().len();
        // default texture and fallback material are owned by the renderer
        let leaked_textures = self.textures.drain().len().saturating_sub(1);
        let leaked_materials = self.materials.drain().len().saturating_sub(1);
        if leaked_meshes + leaked_textures + leaked_materials > 0 {
            log::warn!(
                "Renderer shutdown with live resources: {} meshes, {} textures, {} materials",
                leaked_meshes,
                leaked_textures,
                leaked_materials
            );
        }
        self.ring.reset();
        log::info!("Renderer shut down");
        Ok(())
    }

    fn write_material(&self, slot: u16, material: &MaterialDesc) -> RenderResult<()> {
        self.material_buffer.write(
            vk::DeviceSize::from(slot) * MATERIAL_STRIDE,
            &[GpuMaterial::from(material)],
        )?;
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.context.wait_idle() {
            log::error!("Device wait failed during renderer teardown: {}", e);
        }
    }
}

impl GpuUpload for Renderer {
    fn upload_mesh(&mut self, name: &str, data: &MeshData) -> RenderResult<MeshHandle> {
        if data.vertices.is_empty() || data.indices.is_empty() {
            return Err(RenderError::InvalidState {
                reason: format!("mesh {name} has no geometry"),
            });
        }
        let vertices = Buffer::device_local(
            &self.context,
            &self.commands,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            &data.vertices,
        )?;
        let indices = Buffer::device_local(
            &self.context,
            &self.commands,
            vk::BufferUsageFlags::INDEX_BUFFER,
            &data.indices,
        )?;
        let handle = self.meshes.allocate(GpuMesh {
            vertices,
            indices,
            index_count: data.indices.len() as u32,
            bounds: data.bounds(),
        })?;
        log::debug!(
            "Uploaded mesh {} ({} vertices, {} indices)",
            name,
            data.vertices.len(),
            data.indices.len()
        );
        Ok(handle.cast())
    }

    fn free_mesh(&mut self, mesh: MeshHandle) {
        if let Err(e) = DeviceIdle::wait(self.context.device()) {
            log::error!("free_mesh({:?}): device wait failed: {}", mesh, e);
        }
        if let Err(e) = self.meshes.free(mesh.cast()) {
            log::warn!("free_mesh({:?}): {}", mesh, e);
        }
    }

    fn mesh_bounds(&self, mesh: MeshHandle) -> Option<Aabb> {
        self.meshes.get(mesh.cast()).map(|m| m.bounds)
    }

    fn upload_texture(&mut self, name: &str, data: &TextureData) -> RenderResult<TextureHandle> {
        if self.textures.len() >= MAX_TEXTURES {
            return Err(RenderError::InvalidState {
                reason: format!("texture limit {MAX_TEXTURES} reached loading {name}"),
            });
        }
        let texture = Texture::upload(&self.context, &self.commands, data)?;
        let view = texture.view();
        let handle: Handle<Texture> = self.textures.allocate(texture)?;

        let _idle = DeviceIdle::wait(self.context.device())?;
        write_images(
            self.context.device(),
            self.global_set,
            1,
            u32::from(handle.index()),
            &[view],
            self.sampler.handle(),
        );
        log::debug!("Uploaded texture {} ({}x{})", name, data.width, data.height);
        Ok(handle.cast())
    }

    fn free_texture(&mut self, texture: TextureHandle) {
        if texture == self.default_texture {
            log::warn!("free_texture: the default texture is owned by the renderer");
            return;
        }
        if !self.textures.contains(texture.cast()) {
            log::warn!("free_texture({:?}): not a live texture", texture);
            return;
        }
        if let Err(e) = DeviceIdle::wait(self.context.device()) {
            log::error!("free_texture({:?}): device wait failed: {}", texture, e);
        }
        if let Some(white) = self.textures.get(self.default_texture.cast()) {
            write_images(
                self.context.device(),
                self.global_set,
                1,
                u32::from(texture.index()),
                &[white.view()],
                self.sampler.handle(),
            );
        }
        if let Err(e) = self.textures.free(texture.cast()) {
            log::warn!("free_texture({:?}): {}", texture, e);
        }
    }

    fn create_material(&mut self, material: &MaterialDesc) -> RenderResult<MaterialHandle> {
        if self.materials.len() >= MAX_MATERIALS {
            return Err(RenderError::InvalidState {
                reason: format!("material limit {MAX_MATERIALS} reached"),
            });
        }
        let handle = self.materials.allocate(*material)?;
        let _idle = DeviceIdle::wait(self.context.device())?;
        self.write_material(handle.index(), material)?;
        Ok(handle.cast())
    }

    fn free_material(&mut self, material: MaterialHandle) {
        if u32::from(material.index()) == FALLBACK_MATERIAL {
            log::warn!("free_material: the fallback material is owned by the renderer");
            return;
        }
        if let Err(e) = self.materials.free(material.cast()) {
            log::warn!("free_material({:?}): {}", material, e);
        }
    }
}
