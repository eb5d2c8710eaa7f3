//! Images, image views, samplers and format probing.

use crate::error::{GpuError, Result};
use crate::memory::allocate_memory;
use ash::vk;
use std::sync::Arc;

/// Depth formats in order of preference.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D32_SFLOAT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Return the first candidate whose tiling features contain `features`.
pub fn select_supported_format(
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
    mut query: impl FnMut(vk::Format) -> vk::FormatProperties,
) -> Result<vk::Format> {
    candidates
        .iter()
        .copied()
        .find(|&format| {
            let props = query(format);
            match tiling {
                vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                _ => false,
            }
        })
        .ok_or_else(|| GpuError::NoSupportedFormat(candidates.to_vec()))
}

/// Pick a depth attachment format with optimal tiling.
pub fn find_depth_format(query: impl FnMut(vk::Format) -> vk::FormatProperties) -> Result<vk::Format> {
    select_supported_format(
        &DEPTH_FORMAT_CANDIDATES,
        vk::ImageTiling::OPTIMAL,
        vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        query,
    )
}

/// Whether a depth format also carries a stencil aspect.
pub fn has_stencil_component(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT
    )
}

/// Create a 2D view over a single mip level and layer.
///
/// # Safety
/// The device and image must be valid.
pub unsafe fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> Result<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping::default())
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect_mask)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        );

    let view = unsafe { device.create_image_view(&view_info, None)? };
    Ok(view)
}

/// 2D device-local image with its memory and a view.
pub struct GpuImage {
    device: Arc<ash::Device>,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    format: vk::Format,
    extent: vk::Extent2D,
    layout: vk::ImageLayout,
}

impl GpuImage {
    /// Create an image with optimal tiling, one mip level and one layer.
    pub fn new(
        device: Arc<ash::Device>,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect_mask: vk::ImageAspectFlags,
    ) -> Result<Self> {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.create_image(&image_info, None)? };

        let mut this = Self {
            device,
            image,
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
            format,
            extent,
            layout: vk::ImageLayout::UNDEFINED,
        };

        let requirements = unsafe { this.device.get_image_memory_requirements(image) };
        this.memory = unsafe {
            allocate_memory(
                &this.device,
                memory_properties,
                requirements,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )?
        };
        unsafe { this.device.bind_image_memory(image, this.memory, 0)? };
        this.view = unsafe { create_image_view(&this.device, image, format, aspect_mask)? };

        Ok(this)
    }

    /// Create a depth attachment sized to the swapchain.
    pub fn depth_attachment(
        device: Arc<ash::Device>,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        extent: vk::Extent2D,
        format: vk::Format,
    ) -> Result<Self> {
        Self::new(
            device,
            memory_properties,
            extent,
            format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
        )
    }

    /// Get the image handle.
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Get the image view.
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Get the image format.
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Get the image extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Layout after the last recorded transition.
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    pub(crate) fn set_layout(&mut self, layout: vk::ImageLayout) {
        self.layout = layout;
    }
}

impl Drop for GpuImage {
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

/// Linear, repeating sampler shared by every texture.
pub struct Sampler {
    device: Arc<ash::Device>,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Maximum anisotropy requested when the device supports it.
    pub const MAX_ANISOTROPY: f32 = 16.0;

    /// Create the sampler, enabling anisotropic filtering if requested.
    pub fn new(device: Arc<ash::Device>, anisotropy: bool) -> Result<Self> {
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(0.0)
            .anisotropy_enable(anisotropy)
            .max_anisotropy(if anisotropy { Self::MAX_ANISOTROPY } else { 1.0 });

        let sampler = unsafe { device.create_sampler(&create_info, None)? };
        Ok(Self { device, sampler })
    }

    /// Get the sampler handle.
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth_support(supported: &[vk::Format]) -> impl FnMut(vk::Format) -> vk::FormatProperties + '_ {
        move |format| {
            if supported.contains(&format) {
                vk::FormatProperties {
                    optimal_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
                        | vk::FormatFeatureFlags::SAMPLED_IMAGE,
                    ..Default::default()
                }
            } else {
                vk::FormatProperties::default()
            }
        }
    }

    #[test]
    fn depth_format_follows_priority() {
        let all = DEPTH_FORMAT_CANDIDATES;
        assert_eq!(
            find_depth_format(depth_support(&all)).unwrap(),
            vk::Format::D32_SFLOAT_S8_UINT
        );
        assert_eq!(
            find_depth_format(depth_support(&[
                vk::Format::D24_UNORM_S8_UINT,
                vk::Format::D32_SFLOAT
            ]))
            .unwrap(),
            vk::Format::D32_SFLOAT
        );
        assert_eq!(
            find_depth_format(depth_support(&[vk::Format::D24_UNORM_S8_UINT])).unwrap(),
            vk::Format::D24_UNORM_S8_UINT
        );
    }

    #[test]
    fn depth_format_ignores_linear_tiling() {
        let linear_only = |_| vk::FormatProperties {
            linear_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        };

        match find_depth_format(linear_only) {
            Err(GpuError::NoSupportedFormat(candidates)) => {
                assert_eq!(candidates, DEPTH_FORMAT_CANDIDATES.to_vec());
            }
            other => panic!("expected NoSupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn format_must_have_every_requested_feature() {
        let partial = |_| vk::FormatProperties {
            optimal_tiling_features: vk::FormatFeatureFlags::SAMPLED_IMAGE,
            ..Default::default()
        };

        assert!(select_supported_format(
            &[vk::Format::R8G8B8A8_SRGB],
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::SAMPLED_IMAGE | vk::FormatFeatureFlags::TRANSFER_DST,
            partial,
        )
        .is_err());
    }

    #[test]
    fn stencil_formats() {
        assert!(has_stencil_component(vk::Format::D32_SFLOAT_S8_UINT));
        assert!(has_stencil_component(vk::Format::D24_UNORM_S8_UINT));
        assert!(!has_stencil_component(vk::Format::D32_SFLOAT));
    }
}
