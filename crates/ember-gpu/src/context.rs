//! GPU context management.

use crate::capabilities::{
    select_first_suitable, DeviceCandidate, DeviceRequirements, QueueFamilyIndices,
};
use crate::error::{GpuError, Result};
use crate::instance::create_instance;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::sync::Arc;

/// Instance, surface, adapter and logical device for one window.
///
/// Created once at startup and immutable afterwards. Every other GPU
/// resource holds a clone of [`GpuContext::device`] and must be dropped
/// before the context.
pub struct GpuContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    device: Arc<ash::Device>,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    queue_families: QueueFamilyIndices,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    anisotropy_enabled: bool,
    device_name: String,
}

impl GpuContext {
    /// Get the Vulkan device handle.
    pub fn device(&self) -> &Arc<ash::Device> {
        &self.device
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get the surface extension loader.
    pub fn surface_loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }

    /// Get the presentation surface.
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Memory heaps and types of the selected adapter.
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Get the queue family indices.
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the presentation queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Whether the device was created with sampler anisotropy.
    pub fn anisotropy_enabled(&self) -> bool {
        self.anisotropy_enabled
    }

    /// Name of the selected adapter.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Query the format properties of the selected adapter.
    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        }
    }

    /// Query surface capabilities, formats and present modes.
    pub fn surface_support(&self) -> Result<SurfaceSupport> {
        unsafe {
            let capabilities = self
                .surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, self.surface)?;
            let formats = self
                .surface_loader
                .get_physical_device_surface_formats(self.physical_device, self.surface)?;
            let present_modes = self
                .surface_loader
                .get_physical_device_surface_present_modes(self.physical_device, self.surface)?;

            Ok(SurfaceSupport {
                capabilities,
                formats,
                present_modes,
            })
        }
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
        tracing::debug!("GPU context destroyed");
    }
}

/// Surface capabilities query result.
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
    require_anisotropy: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Ember".to_string(),
            enable_validation: cfg!(debug_assertions),
            require_anisotropy: true,
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Reject adapters without anisotropic sampling.
    pub fn require_anisotropy(mut self, require: bool) -> Self {
        self.require_anisotropy = require;
        self
    }

    /// Build the GPU context for a window.
    pub fn build<W>(self, window: &W) -> Result<GpuContext>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?
            .as_raw();
        let window_handle = window
            .window_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get window handle: {e}")))?
            .as_raw();

        // Load Vulkan entry point
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::DeviceCreation(format!("Failed to load Vulkan: {e}")))?;

        let instance =
            unsafe { create_instance(&entry, &self.app_name, display, self.enable_validation) }?;

        let surface = match unsafe {
            ash_window::create_surface(&entry, &instance, display, window_handle, None)
        } {
            Ok(surface) => surface,
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(GpuError::SurfaceCreation(e.to_string()));
            }
        };
        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        let requirements = DeviceRequirements {
            sampler_anisotropy: self.require_anisotropy,
            ..DeviceRequirements::default()
        };

        let selected =
            unsafe { select_and_create_device(&instance, &surface_loader, surface, &requirements) };
        let (candidate, queue_families, device) = match selected {
            Ok(selected) => selected,
            Err(e) => {
                unsafe {
                    surface_loader.destroy_surface(surface, None);
                    instance.destroy_instance(None);
                }
                return Err(e);
            }
        };

        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(candidate.physical_device) };

        tracing::info!("Selected GPU: {}", candidate.summary());
        tracing::debug!(
            "Queue families: graphics={}, present={}",
            queue_families.graphics,
            queue_families.present
        );

        Ok(GpuContext {
            entry,
            instance,
            surface_loader,
            surface,
            physical_device: candidate.physical_device,
            device: Arc::new(device),
            memory_properties,
            queue_families,
            graphics_queue,
            present_queue,
            anisotropy_enabled: candidate.sampler_anisotropy,
            device_name: candidate.name,
        })
    }
}

/// Enumerate adapters, pick the first suitable one and create its logical device.
///
/// # Safety
/// The instance and surface must be valid.
unsafe fn select_and_create_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    requirements: &DeviceRequirements,
) -> Result<(DeviceCandidate, QueueFamilyIndices, ash::Device)> {
    let physical_devices = unsafe { instance.enumerate_physical_devices()? };
    if physical_devices.is_empty() {
        return Err(GpuError::NoSuitableDevice);
    }

    let candidates = physical_devices
        .into_iter()
        .map(|pd| unsafe { DeviceCandidate::query(instance, surface_loader, surface, pd) })
        .collect::<Vec<_>>();

    let candidate = select_first_suitable(&candidates, requirements)?.clone();
    // Selection guarantees both families exist
    let queue_families = candidate
        .queue_families
        .ok_or(GpuError::NoSuitableDevice)?;
    let device = unsafe { create_device(instance, &candidate, queue_families, requirements) }?;

    Ok((candidate, queue_families, device))
}

/// Create the logical device.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    candidate: &DeviceCandidate,
    queue_families: QueueFamilyIndices,
    requirements: &DeviceRequirements,
) -> Result<ash::Device> {
    // One queue from each distinct family
    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extension_names: Vec<*const std::ffi::c_char> = requirements
        .extensions
        .iter()
        .map(|ext| ext.as_ptr())
        .collect();

    let features =
        vk::PhysicalDeviceFeatures::default().sampler_anisotropy(candidate.sampler_anisotropy);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    unsafe { instance.create_device(candidate.physical_device, &device_create_info, None) }
        .map_err(|e| GpuError::DeviceCreation(format!("Failed to create logical device: {e}")))
}
