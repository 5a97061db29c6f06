//! Off-screen render targets.

use std::ops::{Deref, DerefMut};

use glam::UVec2;

use crate::device::{AttachmentHandle, Framebuffer, RenderDevice, TargetAttachments};
use crate::error::{RenderError, RenderResult};

/// A color + depth attachment pair of fixed size.
///
/// Resolution never changes in place: to resize, create a new target and
/// destroy the old one.
#[derive(Debug)]
pub struct RenderTarget {
    width: u32,
    height: u32,
    attachments: TargetAttachments,
    valid: bool,
}

impl RenderTarget {
    /// Allocates both attachments. Failure is an initialization error.
    pub fn create<D: RenderDevice + ?Sized>(
        device: &mut D,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        let attachments = device.create_render_target(width, height)?;
        log::debug!(
            "created {width}x{height} render target (color {}, depth {})",
            attachments.color.id(),
            attachments.depth.id()
        );
        Ok(Self {
            width,
            height,
            attachments,
            valid: true,
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    /// Whether the attachments are still allocated.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[must_use]
    pub fn attachments(&self) -> TargetAttachments {
        self.attachments
    }

    /// The color attachment, for sampling by a later pass.
    #[must_use]
    pub fn as_texture(&self) -> AttachmentHandle {
        self.attachments.color
    }

    /// Redirects draws on `device` to this target until the guard drops.
    ///
    /// Dropping the guard (or calling [`TargetBinding::unbind`]) restores
    /// whatever framebuffer was bound before.
    pub fn bind<'d, D: RenderDevice + ?Sized>(
        &self,
        device: &'d mut D,
    ) -> RenderResult<TargetBinding<'d, D>> {
        if !self.valid {
            return Err(RenderError::InvalidRenderTarget);
        }
        let previous = device.bound_framebuffer();
        device.bind_framebuffer(Framebuffer::Offscreen(self.attachments));
        Ok(TargetBinding { device, previous })
    }

    /// Releases the attachments. Later binds fail.
    pub fn destroy<D: RenderDevice + ?Sized>(&mut self, device: &mut D) {
        if self.valid {
            device.destroy_render_target(self.attachments);
            self.valid = false;
        }
    }
}

/// Scoped binding of a [`RenderTarget`].
///
/// Derefs to the device so draws can be issued through it.
pub struct TargetBinding<'d, D: RenderDevice + ?Sized> {
    device: &'d mut D,
    previous: Framebuffer,
}

impl<D: RenderDevice + ?Sized> TargetBinding<'_, D> {
    /// Restores the previous framebuffer.
    pub fn unbind(self) {}
}

impl<D: RenderDevice + ?Sized> Deref for TargetBinding<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.device
    }
}

impl<D: RenderDevice + ?Sized> DerefMut for TargetBinding<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.device
    }
}

impl<D: RenderDevice + ?Sized> Drop for TargetBinding<'_, D> {
    fn drop(&mut self) {
        self.device.bind_framebuffer(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::{DeviceCommand, SoftwareDevice};

    #[test]
    fn test_bind_restores_previous_framebuffer() {
        let mut device = SoftwareDevice::new(64, 64);
        let a = RenderTarget::create(&mut device, 64, 64).unwrap();
        let b = RenderTarget::create(&mut device, 4, 4).unwrap();

        {
            let mut outer = a.bind(&mut device).unwrap();
            assert_eq!(
                outer.bound_framebuffer(),
                Framebuffer::Offscreen(a.attachments())
            );
            {
                let inner = b.bind(&mut *outer).unwrap();
                assert_eq!(
                    inner.bound_framebuffer(),
                    Framebuffer::Offscreen(b.attachments())
                );
            }
            assert_eq!(
                outer.bound_framebuffer(),
                Framebuffer::Offscreen(a.attachments())
            );
        }
        assert_eq!(device.bound_framebuffer(), Framebuffer::Screen);
    }

    #[test]
    fn test_destroy_invalidates() {
        let mut device = SoftwareDevice::new(16, 16);
        let mut target = RenderTarget::create(&mut device, 16, 16).unwrap();
        target.destroy(&mut device);
        target.destroy(&mut device);
        assert!(!target.is_valid());
        assert!(matches!(
            target.bind(&mut device),
            Err(RenderError::InvalidRenderTarget)
        ));
        let destroys = device
            .commands()
            .iter()
            .filter(|c| matches!(c, DeviceCommand::DestroyTarget { .. }))
            .count();
        assert_eq!(destroys, 1);
    }

    #[test]
    fn test_zero_sized_target_fails() {
        let mut device = SoftwareDevice::new(16, 16);
        assert!(matches!(
            RenderTarget::create(&mut device, 0, 16),
            Err(RenderError::IncompleteRenderTarget { .. })
        ));
    }
}
