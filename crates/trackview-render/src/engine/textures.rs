//! Attachment and screen texture allocation.

/// Color format of off-screen render targets.
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Depth format of every depth attachment.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// Number of levels in a full mip chain down to 1x1.
#[must_use]
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    u32::BITS - width.max(height).max(1).leading_zeros()
}

/// Copy of a color attachment's base level, sampled when a pass reads the
/// target it draws into.
pub(crate) struct FeedbackTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// Sampleable color attachment with a full mip chain.
pub(crate) struct ColorAttachment {
    pub texture: wgpu::Texture,
    /// Base level only, for rendering.
    pub render_view: wgpu::TextureView,
    /// All levels, for sampling.
    pub sample_view: wgpu::TextureView,
    pub feedback: Option<FeedbackTexture>,
    pub width: u32,
    pub height: u32,
}

impl ColorAttachment {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render target color"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: mip_level_count(width, height),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let render_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("render target color (base level)"),
            base_mip_level: 0,
            mip_level_count: Some(1),
            ..wgpu::TextureViewDescriptor::default()
        });
        let sample_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            render_view,
            sample_view,
            feedback: None,
            width,
            height,
        }
    }

    /// Allocates the feedback copy on first use.
    pub fn ensure_feedback(&mut self, device: &wgpu::Device) {
        if self.feedback.is_some() {
            return;
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render target feedback"),
            size: wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.feedback = Some(FeedbackTexture { texture, view });
    }

    /// Records a copy of the base level into the feedback texture.
    pub fn copy_to_feedback(&self, encoder: &mut wgpu::CommandEncoder) {
        let Some(feedback) = &self.feedback else {
            return;
        };
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &feedback.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

pub(crate) struct DepthAttachment {
    /// Held so the texture lives exactly as long as the attachment.
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl DepthAttachment {
    pub fn new(device: &wgpu::Device, width: u32, height: u32, sample_count: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth attachment"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

pub(crate) enum GpuAttachment {
    Color(ColorAttachment),
    Depth(DepthAttachment),
}

/// Textures behind the screen framebuffer.
pub(crate) struct ScreenTargets {
    /// Multisampled color resolved into the output each frame.
    pub msaa: Option<(wgpu::Texture, wgpu::TextureView)>,
    pub depth: DepthAttachment,
    /// Output texture when there is no surface.
    pub headless: Option<wgpu::Texture>,
}

impl ScreenTargets {
    pub fn new(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        sample_count: u32,
        headless: bool,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        };

        let msaa = (sample_count > 1).then(|| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("screen msaa color"),
                size,
                mip_level_count: 1,
                sample_count,
                dimension: wgpu::TextureDimension::D2,
                format: config.format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            (texture, view)
        });

        let headless = headless.then(|| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("headless screen"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: config.format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        });

        Self {
            msaa,
            depth: DepthAttachment::new(device, config.width, config.height, sample_count),
            headless,
        }
    }
}
