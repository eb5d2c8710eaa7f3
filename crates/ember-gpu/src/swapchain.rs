//! Swapchain management.
//!
//! The swapchain is created once. Out-of-date and resize recovery are not
//! handled; any acquire or present failure is returned to the caller.

use crate::capabilities::QueueFamilyIndices;
use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::image::create_image_view;
use ash::vk;
use std::sync::Arc;

/// Surface format used when the surface places no restriction.
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::R8G8B8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Select the surface format.
///
/// Prefers an 8-bit RGBA or BGRA format in the sRGB nonlinear color space,
/// otherwise returns the first format offered.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    let Some(&first) = available.first() else {
        return Err(GpuError::SwapchainCreation(
            "Surface reports no formats".to_string(),
        ));
    };

    // A lone UNDEFINED entry means every format is allowed
    if available.len() == 1 && first.format == vk::Format::UNDEFINED {
        return Ok(PREFERRED_SURFACE_FORMAT);
    }

    let preferred = available.iter().find(|f| {
        matches!(
            f.format,
            vk::Format::R8G8B8A8_UNORM | vk::Format::B8G8R8A8_UNORM
        ) && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    match preferred {
        Some(&format) => Ok(format),
        None => {
            tracing::warn!(
                "No preferred surface format, falling back to {:?}/{:?}",
                first.format,
                first.color_space
            );
            Ok(first)
        }
    }
}

/// Select the present mode: mailbox when offered, otherwise FIFO.
pub fn select_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        // FIFO is always supported
        vk::PresentModeKHR::FIFO
    }
}

/// Calculate swapchain extent.
///
/// A current extent of `u32::MAX` means the surface size follows the
/// swapchain, so the window's framebuffer size is clamped into bounds.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired_width: u32,
    desired_height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: desired_width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: desired_height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// One image more than the minimum, capped by a nonzero maximum.
pub fn image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        count
    }
}

/// Sharing mode and participating families for swapchain images.
pub fn image_sharing(families: QueueFamilyIndices) -> (vk::SharingMode, Vec<u32>) {
    if families.is_shared() {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (vk::SharingMode::CONCURRENT, families.unique())
    }
}

/// Swapchain wrapper owning its image views.
pub struct Swapchain {
    device: Arc<ash::Device>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Negotiate and create the swapchain for the context's surface.
    pub fn new(gpu: &GpuContext, window_width: u32, window_height: u32) -> Result<Self> {
        let support = gpu.surface_support()?;

        let format = select_surface_format(&support.formats)?;
        let present_mode = select_present_mode(&support.present_modes);
        let extent = calculate_extent(&support.capabilities, window_width, window_height);
        let min_image_count = image_count(&support.capabilities);
        let (sharing_mode, family_indices) = image_sharing(gpu.queue_families());

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(gpu.surface())
            .min_image_count(min_image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let loader = ash::khr::swapchain::Device::new(gpu.instance(), gpu.device());
        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;

        let mut this = Self {
            device: gpu.device().clone(),
            loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            format: format.format,
            extent,
        };

        this.images = unsafe { this.loader.get_swapchain_images(swapchain)? };
        for &image in &this.images {
            let view = unsafe {
                create_image_view(
                    &this.device,
                    image,
                    format.format,
                    vk::ImageAspectFlags::COLOR,
                )?
            };
            this.image_views.push(view);
        }

        tracing::info!(
            "Swapchain created: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            this.images.len(),
            format.format,
            present_mode
        );

        Ok(this)
    }

    /// Get the swapchain handle.
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// One view per image.
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Number of presentable images.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Acquire the next image, signaling `semaphore` when it is ready.
    ///
    /// # Safety
    /// The semaphore must be valid and unsignaled.
    pub unsafe fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<u32> {
        let (index, suboptimal) = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())?
        };
        if suboptimal {
            tracing::trace!("Acquired suboptimal swapchain image {index}");
        }
        Ok(index)
    }

    /// Present an image after the wait semaphores signal.
    ///
    /// # Safety
    /// The queue and semaphores must be valid.
    pub unsafe fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<()> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let suboptimal = unsafe { self.loader.queue_present(queue, &present_info)? };
        if suboptimal {
            tracing::trace!("Presented to suboptimal swapchain");
        }
        Ok(())
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn variable_extent_caps() -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn surface_format_prefers_8bit_srgb_nonlinear() {
        let available = [
            surface_format(
                vk::Format::A2B10G10R10_UNORM_PACK32,
                vk::ColorSpaceKHR::SRGB_NONLINEAR,
            ),
            surface_format(
                vk::Format::B8G8R8A8_UNORM,
                vk::ColorSpaceKHR::SRGB_NONLINEAR,
            ),
        ];
        assert_eq!(
            select_surface_format(&available).unwrap().format,
            vk::Format::B8G8R8A8_UNORM
        );
    }

    #[test]
    fn surface_format_falls_back_to_first() {
        let available = [
            surface_format(
                vk::Format::A2B10G10R10_UNORM_PACK32,
                vk::ColorSpaceKHR::SRGB_NONLINEAR,
            ),
            surface_format(
                vk::Format::B8G8R8A8_UNORM,
                vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            ),
        ];
        let chosen = select_surface_format(&available).unwrap();
        assert_eq!(chosen.format, available[0].format);
        assert_eq!(chosen.color_space, available[0].color_space);
    }

    #[test]
    fn surface_format_undefined_means_any() {
        let available = [surface_format(
            vk::Format::UNDEFINED,
            vk::ColorSpaceKHR::SRGB_NONLINEAR,
        )];
        let chosen = select_surface_format(&available).unwrap();
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn surface_format_requires_one_entry() {
        assert!(matches!(
            select_surface_format(&[]),
            Err(GpuError::SwapchainCreation(_))
        ));
    }

    #[test]
    fn present_mode_policy() {
        assert_eq!(
            select_present_mode(&[
                vk::PresentModeKHR::FIFO,
                vk::PresentModeKHR::IMMEDIATE,
                vk::PresentModeKHR::MAILBOX
            ]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO]),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(select_present_mode(&[]), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn variable_extent_is_clamped() {
        let caps = variable_extent_caps();
        assert_eq!(
            calculate_extent(&caps, 50, 5000),
            vk::Extent2D {
                width: 100,
                height: 4096
            }
        );
        assert_eq!(
            calculate_extent(&caps, 800, 600),
            vk::Extent2D {
                width: 800,
                height: 600
            }
        );
    }

    #[test]
    fn fixed_extent_is_used_verbatim() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            ..variable_extent_caps()
        };
        assert_eq!(calculate_extent(&caps, 50, 5000), caps.current_extent);
    }

    #[test]
    fn image_count_is_min_plus_one_capped() {
        let mut caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(image_count(&caps), 3);

        caps.max_image_count = 8;
        assert_eq!(image_count(&caps), 3);

        caps.max_image_count = 2;
        assert_eq!(image_count(&caps), 2);
    }

    #[test]
    fn sharing_follows_queue_families() {
        let shared = QueueFamilyIndices {
            graphics: 0,
            present: 0,
        };
        assert_eq!(image_sharing(shared), (vk::SharingMode::EXCLUSIVE, vec![]));

        let split = QueueFamilyIndices {
            graphics: 0,
            present: 2,
        };
        assert_eq!(
            image_sharing(split),
            (vk::SharingMode::CONCURRENT, vec![0, 2])
        );
    }
}
