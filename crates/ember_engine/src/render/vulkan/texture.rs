//! Images, sampled textures and samplers

use super::buffer::{find_memory_type, Buffer};
use super::commands::CommandPool;
use super::context::VulkanContext;
use super::error::{VulkanError, VulkanResult};
use crate::assets::texture_data::TextureData;
use ash::{vk, Device};

/// 2D image with dedicated memory and a full view
pub struct Image {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    format: vk::Format,
    extent: vk::Extent2D,
    layout: vk::ImageLayout,
}

impl Image {
    /// Create a device-local image in `UNDEFINED` layout
    pub fn new(
        context: &VulkanContext,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> VulkanResult<Self> {
        if extent.width == 0 || extent.height == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: format!("image extent {}x{}", extent.width, extent.height),
            });
        }
        let device = context.device().clone();
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let image = unsafe { device.create_image(&image_info, None) }?;

        // From here on partially built objects are released by Drop.
        let mut result = Self {
            device,
            image,
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
            format,
            extent,
            layout: vk::ImageLayout::UNDEFINED,
        };

        let requirements = unsafe { result.device.get_image_memory_requirements(image) };
        let memory_type = find_memory_type(
            context.memory_properties(),
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        result.memory = unsafe { result.device.allocate_memory(&alloc_info, None) }?;
        unsafe { result.device.bind_image_memory(image, result.memory, 0) }?;

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        result.view = unsafe { result.device.create_image_view(&view_info, None) }?;
        Ok(result)
    }

    /// Depth attachment matching a swapchain extent
    pub fn depth(context: &VulkanContext, extent: vk::Extent2D) -> VulkanResult<Self> {
        let format = context.find_depth_format()?;
        Self::new(
            context,
            extent,
            format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
        )
    }

    /// Raw image
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Full view
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Pixel format
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Size in pixels
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Layout after all recorded transitions
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    /// Record the transition to `new` in `cmd` and track it
    pub fn transition(
        &mut self,
        cmd: &super::commands::CommandRecorder,
        new: vk::ImageLayout,
    ) -> VulkanResult<()> {
        cmd.transition_image(self.image, self.layout, new)?;
        self.layout = new;
        Ok(())
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.destroy_image_view(self.view, None);
            }
            self.device.destroy_image(self.image, None);
            if self.memory != vk::DeviceMemory::null() {
                self.device.free_memory(self.memory, None);
            }
        }
    }
}

/// Sampled RGBA8 texture
pub struct Texture {
    image: Image,
}

impl Texture {
    /// Upload `data` and leave the image in `SHADER_READ_ONLY_OPTIMAL`
    pub fn upload(
        context: &VulkanContext,
        commands: &CommandPool,
        data: &TextureData,
    ) -> VulkanResult<Self> {
        let expected = data.width as usize * data.height as usize * 4;
        if data.pixels.len() != expected {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "texture {}x{} has {} bytes, expected {} RGBA8 bytes",
                    data.width,
                    data.height,
                    data.pixels.len(),
                    expected
                ),
            });
        }

        let extent = vk::Extent2D {
            width: data.width,
            height: data.height,
        };
        let staging = Buffer::host_visible(context, vk::BufferUsageFlags::TRANSFER_SRC, &data.pixels)?;
        let mut image = Image::new(
            context,
            extent,
            vk::Format::R8G8B8A8_SRGB,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::ImageAspectFlags::COLOR,
        )?;

        commands.one_time_submit(context.graphics_queue(), |cmd| {
            image.transition(cmd, vk::ImageLayout::TRANSFER_DST_OPTIMAL)?;
            cmd.copy_buffer_to_image(staging.handle(), image.handle(), extent);
            image.transition(cmd, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
        })?;

        Ok(Self { image })
    }

    /// View bound in the texture array
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    /// Size in pixels
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

/// Linear, repeating sampler shared by all textures
pub struct Sampler {
    device: Device,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Create the sampler, using anisotropy when the device allows it
    pub fn new(context: &VulkanContext) -> VulkanResult<Self> {
        let device = context.device().clone();
        let max_anisotropy = context.properties().limits.max_sampler_anisotropy;
        let supported = unsafe {
            context
                .instance()
                .get_physical_device_features(context.physical_device())
        };
        let anisotropy = supported.sampler_anisotropy == vk::TRUE;

        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(anisotropy)
            .max_anisotropy(if anisotropy { max_anisotropy.min(16.0) } else { 1.0 })
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .min_lod(0.0)
            .max_lod(0.0);
        let sampler = unsafe { device.create_sampler(&create_info, None) }?;
        Ok(Self { device, sampler })
    }

    /// Raw handle
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe { self.device.destroy_sampler(self.sampler, None) };
    }
}
