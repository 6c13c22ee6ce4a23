//! Device idle guard

use super::error::VulkanResult;
use ash::Device;

/// Proof that the device had no pending work when it was acquired
///
/// Anything that destroys GPU objects an in-flight frame might still use
/// (pipeline rebuilds, resource eviction, teardown) takes a `&DeviceIdle`.
/// The guard borrows the device, so no frame can be submitted through the
/// same owner while it is alive.
pub struct DeviceIdle<'a> {
    device: &'a Device,
}

impl<'a> DeviceIdle<'a> {
    /// Block until the device is idle
    pub fn wait(device: &'a Device) -> VulkanResult<Self> {
        unsafe { device.device_wait_idle() }?;
        Ok(Self { device })
    }

    /// Device that is idle
    pub fn device(&self) -> &'a Device {
        self.device
    }
}

impl std::fmt::Debug for DeviceIdle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DeviceIdle")
    }
}
