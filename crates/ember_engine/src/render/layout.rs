//! Image layout transitions
//!
//! Every layout change the renderer performs goes through [`transition_for`],
//! which maps an `(old, new)` pair to the pipeline stages and access masks of
//! the barrier. Pairs not listed in [`LEGAL_TRANSITIONS`] are rejected instead
//! of guessed, since a wrong mask is a silent synchronization bug.

use super::vulkan::VulkanError;
use ash::vk;

/// Stage and access masks for one layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransition {
    /// Layout the image is in
    pub old_layout: vk::ImageLayout,
    /// Layout the image moves to
    pub new_layout: vk::ImageLayout,
    /// Stages that must finish before the transition
    pub src_stage: vk::PipelineStageFlags,
    /// Stages that wait for the transition
    pub dst_stage: vk::PipelineStageFlags,
    /// Writes made available
    pub src_access: vk::AccessFlags,
    /// Accesses made visible
    pub dst_access: vk::AccessFlags,
}

/// Every transition the renderer knows how to synchronize
pub const LEGAL_TRANSITIONS: [(vk::ImageLayout, vk::ImageLayout); 14] = [
    (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
    (vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
    (vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
    (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
    (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL),
    (vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
    (vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
    (vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
    (vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
    (vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::PRESENT_SRC_KHR),
    (vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
    (vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL),
    (vk::ImageLayout::PRESENT_SRC_KHR, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
    (vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
];

/// Barrier parameters for moving an image from `old` to `new`
pub fn transition_for(
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> Result<LayoutTransition, VulkanError> {
    use vk::AccessFlags as A;
    use vk::ImageLayout as L;
    use vk::PipelineStageFlags as S;

    let (src_stage, src_access, dst_stage, dst_access) = match (old, new) {
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => {
            (S::TOP_OF_PIPE, A::empty(), S::TRANSFER, A::TRANSFER_WRITE)
        }
        (L::UNDEFINED, L::COLOR_ATTACHMENT_OPTIMAL) => (
            S::COLOR_ATTACHMENT_OUTPUT,
            A::empty(),
            S::COLOR_ATTACHMENT_OUTPUT,
            A::COLOR_ATTACHMENT_WRITE,
        ),
        (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => (
            S::EARLY_FRAGMENT_TESTS | S::LATE_FRAGMENT_TESTS,
            A::empty(),
            S::EARLY_FRAGMENT_TESTS | S::LATE_FRAGMENT_TESTS,
            A::DEPTH_STENCIL_ATTACHMENT_READ | A::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => {
            (S::TRANSFER, A::TRANSFER_WRITE, S::FRAGMENT_SHADER, A::SHADER_READ)
        }
        (L::TRANSFER_DST_OPTIMAL, L::TRANSFER_SRC_OPTIMAL) => {
            (S::TRANSFER, A::TRANSFER_WRITE, S::TRANSFER, A::TRANSFER_READ)
        }
        (L::TRANSFER_SRC_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => {
            (S::TRANSFER, A::TRANSFER_READ, S::FRAGMENT_SHADER, A::SHADER_READ)
        }
        (L::TRANSFER_SRC_OPTIMAL, L::TRANSFER_DST_OPTIMAL) => {
            (S::TRANSFER, A::TRANSFER_READ, S::TRANSFER, A::TRANSFER_WRITE)
        }
        (L::SHADER_READ_ONLY_OPTIMAL, L::TRANSFER_DST_OPTIMAL) => {
            (S::FRAGMENT_SHADER, A::SHADER_READ, S::TRANSFER, A::TRANSFER_WRITE)
        }
        (L::SHADER_READ_ONLY_OPTIMAL, L::COLOR_ATTACHMENT_OPTIMAL) => (
            S::FRAGMENT_SHADER,
            A::SHADER_READ,
            S::COLOR_ATTACHMENT_OUTPUT,
            A::COLOR_ATTACHMENT_WRITE,
        ),
        (L::COLOR_ATTACHMENT_OPTIMAL, L::PRESENT_SRC_KHR) => (
            S::COLOR_ATTACHMENT_OUTPUT,
            A::COLOR_ATTACHMENT_WRITE,
            S::BOTTOM_OF_PIPE,
            A::empty(),
        ),
        (L::COLOR_ATTACHMENT_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => (
            S::COLOR_ATTACHMENT_OUTPUT,
            A::COLOR_ATTACHMENT_WRITE,
            S::FRAGMENT_SHADER,
            A::SHADER_READ,
        ),
        (L::COLOR_ATTACHMENT_OPTIMAL, L::TRANSFER_SRC_OPTIMAL) => (
            S::COLOR_ATTACHMENT_OUTPUT,
            A::COLOR_ATTACHMENT_WRITE,
            S::TRANSFER,
            A::TRANSFER_READ,
        ),
        // Presentation reads are ordered by the acquire semaphore, which is
        // waited on at COLOR_ATTACHMENT_OUTPUT.
        (L::PRESENT_SRC_KHR, L::COLOR_ATTACHMENT_OPTIMAL) => (
            S::COLOR_ATTACHMENT_OUTPUT,
            A::empty(),
            S::COLOR_ATTACHMENT_OUTPUT,
            A::COLOR_ATTACHMENT_WRITE,
        ),
        (L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => (
            S::LATE_FRAGMENT_TESTS,
            A::DEPTH_STENCIL_ATTACHMENT_WRITE,
            S::FRAGMENT_SHADER,
            A::SHADER_READ,
        ),
        _ => return Err(VulkanError::IllegalLayoutTransition { from: old, to: new }),
    };

    Ok(LayoutTransition {
        old_layout: old,
        new_layout: new,
        src_stage,
        dst_stage,
        src_access,
        dst_access,
    })
}

/// Image aspect implied by a layout
pub fn aspect_for(layout: vk::ImageLayout) -> vk::ImageAspectFlags {
    if layout == vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

impl LayoutTransition {
    /// Barrier for the whole of `image`
    pub fn barrier(
        &self,
        image: vk::Image,
        aspect: vk::ImageAspectFlags,
        mip_levels: u32,
    ) -> vk::ImageMemoryBarrier {
        vk::ImageMemoryBarrier::builder()
            .old_layout(self.old_layout)
            .new_layout(self.new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_access_mask(self.src_access)
            .dst_access_mask(self.dst_access)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_LAYOUTS: [vk::ImageLayout; 7] = [
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        vk::ImageLayout::PRESENT_SRC_KHR,
    ];

    #[test]
    fn test_every_legal_pair_has_stages() {
        for (old, new) in LEGAL_TRANSITIONS {
            let t = transition_for(old, new)
                .unwrap_or_else(|e| panic!("{old:?} -> {new:?} rejected: {e}"));
            assert!(!t.src_stage.is_empty(), "{old:?} -> {new:?}");
            assert!(!t.dst_stage.is_empty(), "{old:?} -> {new:?}");
            assert_eq!(t.old_layout, old);
            assert_eq!(t.new_layout, new);
        }
    }

    #[test]
    fn test_unlisted_pairs_rejected() {
        for old in ALL_LAYOUTS {
            for new in ALL_LAYOUTS {
                let listed = LEGAL_TRANSITIONS.contains(&(old, new));
                assert_eq!(transition_for(old, new).is_ok(), listed, "{old:?} -> {new:?}");
            }
        }
    }

    #[test]
    fn test_nothing_transitions_to_undefined() {
        for old in ALL_LAYOUTS {
            assert!(matches!(
                transition_for(old, vk::ImageLayout::UNDEFINED),
                Err(VulkanError::IllegalLayoutTransition { .. })
            ));
        }
    }

    #[test]
    fn test_upload_barriers() {
        let to_dst = transition_for(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap();
        assert_eq!(to_dst.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(to_dst.dst_access, vk::AccessFlags::TRANSFER_WRITE);

        let to_read = transition_for(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(to_read.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(to_read.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn test_present_roundtrip_writes_are_ordered() {
        let to_present = transition_for(
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        )
        .unwrap();
        assert!(to_present.src_access.contains(vk::AccessFlags::COLOR_ATTACHMENT_WRITE));

        let to_color = transition_for(
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        )
        .unwrap();
        assert_eq!(to_color.src_stage, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
    }

    #[test]
    fn test_barrier_copies_masks() {
        let t = transition_for(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )
        .unwrap();
        let aspect = aspect_for(t.new_layout);
        let barrier = t.barrier(vk::Image::null(), aspect, 1);
        assert_eq!(barrier.subresource_range.aspect_mask, vk::ImageAspectFlags::DEPTH);
        assert_eq!(barrier.dst_access_mask, t.dst_access);
        assert_eq!(barrier.old_layout, vk::ImageLayout::UNDEFINED);
    }
}
