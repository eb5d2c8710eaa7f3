//! Adapter capability detection and first-fit selection.
//!
//! Querying an adapter produces a plain [`DeviceCandidate`]; deciding whether
//! it is usable is a pure function over that value, so the policy can be
//! tested without a GPU.

use crate::error::{GpuError, Result};
use ash::vk;
use std::collections::HashSet;
use std::ffi::CStr;

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// Device extensions every adapter must expose.
pub fn required_device_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// What an adapter must provide to be selected.
#[derive(Debug, Clone)]
pub struct DeviceRequirements {
    pub extensions: Vec<&'static CStr>,
    pub sampler_anisotropy: bool,
}

impl Default for DeviceRequirements {
    fn default() -> Self {
        Self {
            extensions: required_device_extensions(),
            sampler_anisotropy: true,
        }
    }
}

/// Queue family indices for drawing and presenting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Whether drawing and presenting happen on the same family.
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Find a graphics-capable and a presentation-capable queue family.
///
/// A single family that does both is preferred. Otherwise the first graphics
/// family and the first presenting family are used. Returns `None` when
/// either is missing.
pub fn find_queue_families(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: impl FnMut(u32) -> bool,
) -> Option<QueueFamilyIndices> {
    // (index, graphics, present) for families with at least one queue
    let usable: Vec<(u32, bool, bool)> = families
        .iter()
        .enumerate()
        .filter(|(_, family)| family.queue_count > 0)
        .map(|(i, family)| {
            let i = i as u32;
            (
                i,
                family.queue_flags.contains(vk::QueueFlags::GRAPHICS),
                supports_present(i),
            )
        })
        .collect();

    if let Some(&(i, _, _)) = usable.iter().find(|(_, graphics, present)| *graphics && *present) {
        return Some(QueueFamilyIndices {
            graphics: i,
            present: i,
        });
    }

    let graphics = usable.iter().find(|(_, graphics, _)| *graphics)?.0;
    let present = usable.iter().find(|(_, _, present)| *present)?.0;
    Some(QueueFamilyIndices { graphics, present })
}

/// Snapshot of one adapter's properties relevant to selection.
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    pub physical_device: vk::PhysicalDevice,
    pub name: String,
    pub vendor: GpuVendor,
    pub api_version: u32,
    pub queue_families: Option<QueueFamilyIndices>,
    pub extensions: HashSet<String>,
    pub sampler_anisotropy: bool,
    pub surface_format_count: usize,
    pub present_mode_count: usize,
    /// Error from querying extensions or surface support.
    pub query_failure: Option<String>,
}

/// Why an adapter was passed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MissingGraphicsOrPresentQueue,
    MissingExtension(String),
    NoSamplerAnisotropy,
    NoSurfaceFormats,
    NoPresentModes,
    QueryFailed(String),
}

impl DeviceCandidate {
    /// Query an adapter.
    ///
    /// Query errors are recorded in [`query_failure`](Self::query_failure)
    /// so one broken adapter does not stop the others from being considered.
    /// Surface support is not queried for adapters without usable queues.
    ///
    /// # Safety
    /// The instance, physical device and surface must be valid.
    pub unsafe fn query(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> Self {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let features = unsafe { instance.get_physical_device_features(physical_device) };

        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        let families =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        let queue_families = find_queue_families(&families, |index| unsafe {
            surface_loader
                .get_physical_device_surface_support(physical_device, index, surface)
                .unwrap_or(false)
        });

        let mut candidate = Self {
            physical_device,
            name,
            vendor: GpuVendor::from_vendor_id(properties.vendor_id),
            api_version: properties.api_version,
            queue_families,
            extensions: HashSet::new(),
            sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
            surface_format_count: 0,
            present_mode_count: 0,
            query_failure: None,
        };

        if candidate.queue_families.is_some() {
            if let Err(e) = unsafe { candidate.query_support(instance, surface_loader, surface) } {
                candidate.query_failure = Some(e.to_string());
            }
        }

        candidate
    }

    unsafe fn query_support(
        &mut self,
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<()> {
        let pd = self.physical_device;

        self.extensions = unsafe { instance.enumerate_device_extension_properties(pd)? }
            .iter()
            .filter_map(|ext| {
                unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }
                    .to_str()
                    .ok()
                    .map(String::from)
            })
            .collect();

        self.surface_format_count =
            unsafe { surface_loader.get_physical_device_surface_formats(pd, surface)? }.len();
        self.present_mode_count =
            unsafe { surface_loader.get_physical_device_surface_present_modes(pd, surface)? }
                .len();

        Ok(())
    }

    /// The first requirement this adapter fails, if any.
    pub fn rejection(&self, requirements: &DeviceRequirements) -> Option<Rejection> {
        if self.queue_families.is_none() {
            return Some(Rejection::MissingGraphicsOrPresentQueue);
        }
        if let Some(failure) = &self.query_failure {
            return Some(Rejection::QueryFailed(failure.clone()));
        }

        for ext in &requirements.extensions {
            let ext = ext.to_string_lossy();
            if !self.extensions.contains(ext.as_ref()) {
                return Some(Rejection::MissingExtension(ext.into_owned()));
            }
        }

        if requirements.sampler_anisotropy && !self.sampler_anisotropy {
            return Some(Rejection::NoSamplerAnisotropy);
        }

        // Swapchain support is only useful if there is something to pick from
        if self.surface_format_count == 0 {
            return Some(Rejection::NoSurfaceFormats);
        }
        if self.present_mode_count == 0 {
            return Some(Rejection::NoPresentModes);
        }

        None
    }

    /// Get a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}) - Vulkan {}.{}.{}",
            self.name,
            self.vendor,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
        )
    }
}

/// Pick the first adapter that satisfies every requirement.
///
/// There is no ranking: enumeration order decides between suitable adapters.
pub fn select_first_suitable<'a>(
    candidates: &'a [DeviceCandidate],
    requirements: &DeviceRequirements,
) -> Result<&'a DeviceCandidate> {
    candidates
        .iter()
        .find(|candidate| match candidate.rejection(requirements) {
            None => true,
            Some(reason) => {
                tracing::debug!("Rejected GPU {}: {:?}", candidate.name, reason);
                false
            }
        })
        .ok_or(GpuError::NoSuitableDevice)
}
