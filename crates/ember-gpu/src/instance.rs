//! Vulkan instance creation.

use crate::error::{GpuError, Result};
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, CStr, CString};

const ENGINE_NAME: &CStr = c"Ember";

/// Validation layers to enable in debug builds.
pub fn validation_layers() -> Vec<&'static CStr> {
    vec![c"VK_LAYER_KHRONOS_validation"]
}

/// Instance extensions required to present to the given display.
pub fn required_instance_extensions(display: RawDisplayHandle) -> Result<Vec<*const c_char>> {
    let mut extensions = ash_window::enumerate_required_extensions(display)
        .map_err(|e| GpuError::DeviceCreation(format!("Window extensions unavailable: {e}")))?
        .to_vec();

    #[cfg(target_os = "macos")]
    {
        extensions.push(ash::khr::portability_enumeration::NAME.as_ptr());
        extensions.push(ash::khr::get_physical_device_properties2::NAME.as_ptr());
    }

    Ok(extensions)
}

/// Return the names in `required` that `available` does not contain.
pub fn missing_names<'a>(required: &[&'a CStr], available: &[&CStr]) -> Vec<&'a CStr> {
    required
        .iter()
        .filter(|name| !available.contains(name))
        .copied()
        .collect()
}

/// Fail with the names of requested layers that are not installed.
pub fn require_layers(requested: &[&CStr], available: &[&CStr]) -> Result<()> {
    let missing = missing_names(requested, available);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(GpuError::DeviceCreation(format!(
            "Validation layers requested, but not available: {missing:?}"
        )))
    }
}

/// Create a Vulkan instance.
///
/// Requesting validation without the layers installed is an error.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    display: RawDisplayHandle,
    enable_validation: bool,
) -> Result<ash::Instance> {
    let app_name = CString::new(app_name)
        .map_err(|e| GpuError::DeviceCreation(format!("Invalid application name: {e}")))?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(ENGINE_NAME)
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_3);

    let extension_names = required_instance_extensions(display)?;

    // Every window extension must be present, otherwise no surface can be made
    let available_extensions = unsafe { entry.enumerate_instance_extension_properties(None)? };
    let available_extension_names: Vec<&CStr> = available_extensions
        .iter()
        .map(|props| unsafe { CStr::from_ptr(props.extension_name.as_ptr()) })
        .collect();
    let required_extension_names: Vec<&CStr> = extension_names
        .iter()
        .map(|&ptr| unsafe { CStr::from_ptr(ptr) })
        .collect();
    let missing = missing_names(&required_extension_names, &available_extension_names);
    if !missing.is_empty() {
        return Err(GpuError::DeviceCreation(format!(
            "Instance does not support required extensions: {missing:?}"
        )));
    }

    let requested_layers = if enable_validation {
        validation_layers()
    } else {
        vec![]
    };

    let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };
    let available_layer_names: Vec<&CStr> = available_layers
        .iter()
        .map(|props| unsafe { CStr::from_ptr(props.layer_name.as_ptr()) })
        .collect();
    require_layers(&requested_layers, &available_layer_names)?;
    let layer_names: Vec<*const c_char> =
        requested_layers.iter().map(|layer| layer.as_ptr()).collect();

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(create_flags);

    let instance = unsafe { entry.create_instance(&create_info, None) }
        .map_err(|e| GpuError::DeviceCreation(format!("Failed to create instance: {e}")))?;

    tracing::debug!(
        "Instance created with {} extensions and {} layers",
        extension_names.len(),
        layer_names.len()
    );

    Ok(instance)
}
