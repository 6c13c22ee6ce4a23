//! Command pools and command buffer recording

use super::error::VulkanResult;
use crate::render::layout::{aspect_for, transition_for};
use ash::{vk, Device};

/// Command pool with resettable buffers
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool for `queue_family_index`
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);
        let command_pool = unsafe { device.create_command_pool(&create_info, None) }?;
        Ok(Self {
            device,
            command_pool,
        })
    }

    /// Allocate `count` primary command buffers
    pub fn allocate(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        Ok(unsafe { self.device.allocate_command_buffers(&alloc_info) }?)
    }

    /// Record with `record`, submit to `queue` and wait for completion
    ///
    /// Used for uploads; blocks until the queue is idle.
    pub fn one_time_submit<F>(&self, queue: vk::Queue, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&CommandRecorder) -> VulkanResult<()>,
    {
        let buffers = self.allocate(1)?;
        let recorder = CommandRecorder::new(self.device.clone(), buffers[0]);

        let result = recorder
            .begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
            .and_then(|()| record(&recorder))
            .and_then(|()| recorder.end())
            .and_then(|()| {
                let submit = vk::SubmitInfo::builder().command_buffers(&buffers).build();
                unsafe {
                    self.device.queue_submit(queue, &[submit], vk::Fence::null())?;
                    self.device.queue_wait_idle(queue)?;
                }
                Ok(())
            });

        unsafe { self.device.free_command_buffers(self.command_pool, &buffers) };
        result
    }

    /// Raw handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe { self.device.destroy_command_pool(self.command_pool, None) };
    }
}

/// Thin recording front-end over one command buffer
pub struct CommandRecorder {
    device: Device,
    command_buffer: vk::CommandBuffer,
}

impl CommandRecorder {
    /// Wrap an allocated command buffer
    pub fn new(device: Device, command_buffer: vk::CommandBuffer) -> Self {
        Self {
            device,
            command_buffer,
        }
    }

    /// Raw handle
    pub fn handle(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Reset and begin recording
    pub fn begin(&self, flags: vk::CommandBufferUsageFlags) -> VulkanResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(flags);
        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())?;
            self.device
                .begin_command_buffer(self.command_buffer, &begin_info)?;
        }
        Ok(())
    }

    /// Finish recording
    pub fn end(&self) -> VulkanResult<()> {
        unsafe { self.device.end_command_buffer(self.command_buffer) }?;
        Ok(())
    }

    /// Record the barrier that moves `image` from `old` to `new`
    ///
    /// Fails without recording anything when the pair has no known barrier.
    pub fn transition_image(
        &self,
        image: vk::Image,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) -> VulkanResult<()> {
        let transition = transition_for(old, new)?;
        let aspect = if old == vk::ImageLayout::UNDEFINED {
            aspect_for(new)
        } else {
            aspect_for(old)
        };
        let barrier = transition.barrier(image, aspect, 1);
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                transition.src_stage,
                transition.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
        Ok(())
    }

    /// Copy a whole buffer region
    pub fn copy_buffer(&self, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe {
            self.device
                .cmd_copy_buffer(self.command_buffer, src, dst, &[region]);
        }
    }

    /// Copy tightly packed pixels into mip 0 of a color image
    pub fn copy_buffer_to_image(&self, src: vk::Buffer, dst: vk::Image, extent: vk::Extent2D) {
        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D::default())
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .build();
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                self.command_buffer,
                src,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
    }

    /// Begin dynamic rendering into one color and one depth attachment
    pub fn begin_rendering(
        &self,
        color_view: vk::ImageView,
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) {
        let color_attachment = vk::RenderingAttachmentInfo::builder()
            .image_view(color_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            })
            .build();
        let depth_attachment = vk::RenderingAttachmentInfo::builder()
            .image_view(depth_view)
            .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });
        let color_attachments = [color_attachment];
        let rendering_info = vk::RenderingInfo::builder()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments)
            .depth_attachment(&depth_attachment);

        unsafe {
            self.device
                .cmd_begin_rendering(self.command_buffer, &rendering_info);
        }
    }

    /// End dynamic rendering
    pub fn end_rendering(&self) {
        unsafe { self.device.cmd_end_rendering(self.command_buffer) };
    }

    /// Full-target viewport and scissor
    pub fn set_viewport_scissor(&self, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        };
        unsafe {
            self.device
                .cmd_set_viewport(self.command_buffer, 0, &[viewport]);
            self.device.cmd_set_scissor(self.command_buffer, 0, &[scissor]);
        }
    }

    /// Bind a graphics pipeline
    pub fn bind_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    /// Bind descriptor sets starting at set 0
    pub fn bind_descriptor_sets(&self, layout: vk::PipelineLayout, sets: &[vk::DescriptorSet]) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                sets,
                &[],
            );
        }
    }

    /// Push a small per-draw block
    pub fn push_constants<T: bytemuck::Pod>(
        &self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        data: &T,
    ) {
        unsafe {
            self.device.cmd_push_constants(
                self.command_buffer,
                layout,
                stages,
                0,
                bytemuck::bytes_of(data),
            );
        }
    }

    /// Bind one vertex buffer at binding 0
    pub fn bind_vertex_buffer(&self, buffer: vk::Buffer) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(self.command_buffer, 0, &[buffer], &[0]);
        }
    }

    /// Bind a `u32` index buffer
    pub fn bind_index_buffer(&self, buffer: vk::Buffer) {
        unsafe {
            self.device.cmd_bind_index_buffer(
                self.command_buffer,
                buffer,
                0,
                vk::IndexType::UINT32,
            );
        }
    }

    /// Indexed draw of one instance
    pub fn draw_indexed(&self, index_count: u32) {
        unsafe {
            self.device
                .cmd_draw_indexed(self.command_buffer, index_count, 1, 0, 0, 0);
        }
    }

    /// Non-indexed draw of one instance
    pub fn draw(&self, vertex_count: u32) {
        unsafe {
            self.device
                .cmd_draw(self.command_buffer, vertex_count, 1, 0, 0);
        }
    }
}

impl std::fmt::Debug for CommandRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRecorder")
            .field("command_buffer", &self.command_buffer)
            .finish_non_exhaustive()
    }
}

