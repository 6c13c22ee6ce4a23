//! Semaphores, fences and the per-frame sync bundle

use super::error::VulkanResult;
use ash::{vk, Device};

/// GPU-GPU signal between queue operations
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a binary semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { device.create_semaphore(&create_info, None) }?;
        Ok(Self { device, semaphore })
    }

    /// Raw handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { self.device.destroy_semaphore(self.semaphore, None) };
    }
}

/// CPU-visible completion signal
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signalled
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { device.create_fence(&create_info, None) }?;
        Ok(Self { device, fence })
    }

    /// Block until signalled or `timeout_ns` elapses
    pub fn wait(&self, timeout_ns: u64) -> VulkanResult<()> {
        unsafe { self.device.wait_for_fences(&[self.fence], true, timeout_ns) }?;
        Ok(())
    }

    /// Back to unsignalled
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence]) }?;
        Ok(())
    }

    /// Raw handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.destroy_fence(self.fence, None) };
    }
}

/// Sync objects owned by one frame slot
///
/// The render-finished semaphores live per swapchain image instead, since
/// presentation may still wait on one after the slot comes around again.
pub struct FrameSync {
    /// Signalled when the acquired image is ready to be rendered into
    pub image_available: Semaphore,
    /// Signalled when the slot's submission completed
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the bundle; the fence starts signalled so the first wait passes
    pub fn new(device: &Device) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device.clone(), true)?,
        })
    }
}
