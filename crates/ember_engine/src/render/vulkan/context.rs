//! Vulkan instance, device and queue setup
//!
//! [`VulkanContext`] owns everything that lives for the whole renderer
//! lifetime: the loader entry, the instance (plus the validation messenger
//! in debug builds), the window surface, the chosen physical device and the
//! logical device with its graphics and present queues.
//!
//! The device is created with Vulkan 1.3 `dynamic_rendering` enabled, so no
//! render pass or framebuffer objects exist anywhere in the renderer.

use super::error::{VulkanError, VulkanResult};
use crate::window::Window;
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use std::ffi::{CStr, CString};

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";
const ENGINE_NAME: &str = "Ember";

/// Queue family indices used by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    /// Family used for graphics and transfer work
    pub graphics: u32,
    /// Family that can present to the surface
    pub present: u32,
}

impl QueueFamilies {
    /// Distinct family indices, for queue creation
    pub fn unique(&self) -> Vec<u32> {
        let mut families = vec![self.graphics];
        if self.present != self.graphics {
            families.push(self.present);
        }
        families
    }
}

struct DebugMessenger {
    loader: DebugUtils,
    messenger: vk::DebugUtilsMessengerEXT,
}

/// Core Vulkan objects shared by every GPU resource
pub struct VulkanContext {
    _entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,
    surface_loader: Surface,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    queue_families: QueueFamilies,
    device: Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    swapchain_loader: SwapchainLoader,
}

impl VulkanContext {
    /// Create instance, surface and device for `window`
    pub fn new(window: &Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e}")))?;

        let instance = create_instance(&entry, window, app_name, enable_validation)?;

        let debug = if enable_validation {
            match create_debug_messenger(&entry, &instance) {
                Ok(debug) => Some(debug),
                Err(e) => {
                    log::warn!("Validation requested but debug messenger failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let surface_loader = Surface::new(&entry, &instance);
        let surface = window
            .create_vulkan_surface(instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;

        let (physical_device, queue_families) =
            select_physical_device(&instance, &surface_loader, surface)?;
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
        log::info!(
            "Using GPU {} (Vulkan {}.{}.{})",
            device_name.to_string_lossy(),
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );

        let device = create_logical_device(&instance, physical_device, &queue_families)?;
        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };
        let swapchain_loader = SwapchainLoader::new(&instance, &device);

        Ok(Self {
            _entry: entry,
            instance,
            debug,
            surface_loader,
            surface,
            physical_device,
            properties,
            memory_properties,
            queue_families,
            device,
            graphics_queue,
            present_queue,
            swapchain_loader,
        })
    }

    /// Logical device
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Instance
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Physical device
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Device properties and limits
    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    /// Memory heaps and types
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Queue families in use
    pub fn queue_families(&self) -> QueueFamilies {
        self.queue_families
    }

    /// Graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Surface the swapchain presents to
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Surface extension loader
    pub fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    /// Swapchain extension loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }

    /// Submit to the graphics queue, signaling `fence` on completion
    pub fn queue_submit(&self, submits: &[vk::SubmitInfo], fence: vk::Fence) -> VulkanResult<()> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submits, fence)?;
        }
        Ok(())
    }

    /// Block until the device has no pending work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// First depth format usable as an optimal-tiling attachment
    pub fn find_depth_format(&self) -> VulkanResult<vk::Format> {
        [
            vk::Format::D32_SFLOAT,
            vk::Format::D32_SFLOAT_S8_UINT,
            vk::Format::D24_UNORM_S8_UINT,
        ]
        .into_iter()
        .find(|&format| {
            let props = unsafe {
                self.instance
                    .get_physical_device_format_properties(self.physical_device, format)
            };
            props
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or_else(|| VulkanError::InitializationFailed("No supported depth format".to_string()))
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some(debug) = self.debug.take() {
                debug
                    .loader
                    .destroy_debug_utils_messenger(debug.messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        log::debug!("Vulkan context destroyed");
    }
}

fn create_instance(
    entry: &Entry,
    window: &Window,
    app_name: &str,
    enable_validation: bool,
) -> VulkanResult<Instance> {
    let to_cstring = |s: &str| {
        CString::new(s).map_err(|_| VulkanError::InitializationFailed(format!("Invalid name {s:?}")))
    };

    let app_name = to_cstring(app_name)?;
    let engine_name = to_cstring(ENGINE_NAME)?;
    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(&engine_name)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_3);

    let required = window
        .required_instance_extensions()
        .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
    let mut extension_names = required
        .iter()
        .map(|ext| to_cstring(ext))
        .collect::<VulkanResult<Vec<_>>>()?;
    if enable_validation {
        extension_names.push(DebugUtils::name().to_owned());
    }
    let extension_ptrs: Vec<*const std::os::raw::c_char> =
        extension_names.iter().map(|e| e.as_ptr()).collect();

    let layers = if enable_validation && validation_layer_available(entry) {
        vec![to_cstring(VALIDATION_LAYER)?]
    } else {
        if enable_validation {
            log::warn!("{} not installed, continuing without validation", VALIDATION_LAYER);
        }
        Vec::new()
    };
    let layer_ptrs: Vec<*const std::os::raw::c_char> = layers.iter().map(|l| l.as_ptr()).collect();

    let create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extension_ptrs)
        .enabled_layer_names(&layer_ptrs);

    let instance = unsafe { entry.create_instance(&create_info, None) }?;
    Ok(instance)
}

fn validation_layer_available(entry: &Entry) -> bool {
    entry
        .enumerate_instance_layer_properties()
        .map(|layers| {
            layers.iter().any(|layer| {
                let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
                name.to_bytes() == VALIDATION_LAYER.as_bytes()
            })
        })
        .unwrap_or(false)
}

fn create_debug_messenger(entry: &Entry, instance: &Instance) -> VulkanResult<DebugMessenger> {
    let loader = DebugUtils::new(entry, instance);
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }?;
    Ok(DebugMessenger { loader, messenger })
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

fn select_physical_device(
    instance: &Instance,
    surface_loader: &Surface,
    surface: vk::SurfaceKHR,
) -> VulkanResult<(vk::PhysicalDevice, QueueFamilies)> {
    let devices = unsafe { instance.enumerate_physical_devices() }?;

    let mut best: Option<(u32, vk::PhysicalDevice, QueueFamilies)> = None;
    for device in devices {
        let Some(families) = evaluate_device(instance, surface_loader, surface, device) else {
            continue;
        };
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let score = match properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 3,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
            _ => 1,
        };
        if best.map_or(true, |(best_score, _, _)| score > best_score) {
            best = Some((score, device, families));
        }
    }

    best.map(|(_, device, families)| (device, families))
        .ok_or_else(|| {
            VulkanError::InitializationFailed(
                "No GPU with Vulkan 1.3, graphics, present and swapchain support".to_string(),
            )
        })
}

fn evaluate_device(
    instance: &Instance,
    surface_loader: &Surface,
    surface: vk::SurfaceKHR,
    device: vk::PhysicalDevice,
) -> Option<QueueFamilies> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    if properties.api_version < vk::API_VERSION_1_3 {
        return None;
    }

    let extensions = unsafe { instance.enumerate_device_extension_properties(device) }.ok()?;
    let has_swapchain = extensions.iter().any(|ext| {
        let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
        name == SwapchainLoader::name()
    });
    if !has_swapchain {
        return None;
    }

    let queue_families =
        unsafe { instance.get_physical_device_queue_family_properties(device) };
    let mut graphics = None;
    let mut present = None;
    for (index, family) in queue_families.iter().enumerate() {
        let index = index as u32;
        if graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            graphics = Some(index);
        }
        let supports_present = unsafe {
            surface_loader.get_physical_device_surface_support(device, index, surface)
        }
        .unwrap_or(false);
        if present.is_none() && supports_present {
            present = Some(index);
        }
    }

    Some(QueueFamilies {
        graphics: graphics?,
        present: present?,
    })
}

fn create_logical_device(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    families: &QueueFamilies,
) -> VulkanResult<Device> {
    let priorities = [1.0_f32];
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&priorities)
                .build()
        })
        .collect();

    let supported = unsafe { instance.get_physical_device_features(physical_device) };
    let features = vk::PhysicalDeviceFeatures::builder()
        .sampler_anisotropy(supported.sampler_anisotropy == vk::TRUE)
        .fill_mode_non_solid(supported.fill_mode_non_solid == vk::TRUE);
    let mut features13 = vk::PhysicalDeviceVulkan13Features::builder()
        .dynamic_rendering(true)
        .synchronization2(true);

    let extension_ptrs = [SwapchainLoader::name().as_ptr()];

    let create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&extension_ptrs)
        .enabled_features(&features)
        .push_next(&mut features13);

    let device = unsafe { instance.create_device(physical_device, &create_info, None) }?;
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_families() {
        let shared = QueueFamilies { graphics: 0, present: 0 };
        assert_eq!(shared.unique(), vec![0]);

        let split = QueueFamilies { graphics: 0, present: 2 };
        assert_eq!(split.unique(), vec![0, 2]);
    }
}
