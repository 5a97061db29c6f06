//! Command recording between presents.
//!
//! wgpu needs a whole render pass up front, while the pipeline issues GL-style
//! bind/clear/draw calls. Calls are recorded here as passes, one per run of
//! draws into the same framebuffer, and replayed into a single encoder at
//! present.

use glam::{UVec2, Vec4};

use crate::device::{AttachmentHandle, Framebuffer, ProgramHandle};

use super::pipelines::PipelineKey;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum DrawKind {
    Mesh { first: u32, count: u32 },
    Quad { input: AttachmentHandle, feedback: bool },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RecordedDraw {
    pub pipeline: PipelineKey,
    pub program: ProgramHandle,
    pub viewport: UVec2,
    /// Offset of this draw's uniform snapshot in the frame's uniform arena.
    pub uniform_offset: u32,
    pub kind: DrawKind,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedPass {
    pub target: Framebuffer,
    pub clear: Option<Vec4>,
    /// Color attachment to copy into its feedback texture before the pass.
    pub feedback_copy: Option<AttachmentHandle>,
    pub draws: Vec<RecordedDraw>,
}

impl RecordedPass {
    fn new(target: Framebuffer) -> Self {
        Self {
            target,
            clear: None,
            feedback_copy: None,
            draws: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FrameStep {
    Pass(RecordedPass),
    Mipmaps(AttachmentHandle),
}

#[derive(Debug, Default)]
pub(crate) struct FrameRecorder {
    pub steps: Vec<FrameStep>,
    /// Uniform snapshots, one per draw.
    pub uniforms: Vec<u8>,
}

impl FrameRecorder {
    /// Records a clear of `target`.
    ///
    /// A clear before any draw folds into the pass's load op; a clear after
    /// draws starts a new pass.
    pub fn clear(&mut self, target: Framebuffer, color: Vec4) {
        match self.steps.last_mut() {
            Some(FrameStep::Pass(pass)) if pass.target == target && pass.draws.is_empty() => {
                pass.clear = Some(color);
            }
            _ => {
                let mut pass = RecordedPass::new(target);
                pass.clear = Some(color);
                self.steps.push(FrameStep::Pass(pass));
            }
        }
    }

    /// Records a draw into `target`.
    ///
    /// Draws that sample their own target always open a new pass so the
    /// feedback copy sees everything drawn before them.
    pub fn draw(&mut self, target: Framebuffer, draw: RecordedDraw) {
        let feedback = match draw.kind {
            DrawKind::Quad {
                input,
                feedback: true,
            } => Some(input),
            _ => None,
        };

        if feedback.is_none() {
            if let Some(FrameStep::Pass(pass)) = self.steps.last_mut() {
                if pass.target == target {
                    pass.draws.push(draw);
                    return;
                }
            }
        }

        let mut pass = RecordedPass::new(target);
        pass.feedback_copy = feedback;
        pass.draws.push(draw);
        self.steps.push(FrameStep::Pass(pass));
    }

    pub fn generate_mipmaps(&mut self, texture: AttachmentHandle) {
        self.steps.push(FrameStep::Mipmaps(texture));
    }

    /// Appends a uniform block at the next `alignment` boundary and returns
    /// its offset.
    pub fn push_uniforms(&mut self, block: &[u8], alignment: u32) -> u32 {
        let alignment = alignment.max(1) as usize;
        let offset = self.uniforms.len().div_ceil(alignment) * alignment;
        self.uniforms.resize(offset, 0);
        self.uniforms.extend_from_slice(block);
        offset as u32
    }

    /// Hands the recorded frame over and starts a new one.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

/// GPU buffer holding one frame's uniform snapshots, bound with dynamic
/// offsets.
pub(crate) struct UniformArena {
    buffer: wgpu::Buffer,
    capacity: u64,
}

impl UniformArena {
    const INITIAL_CAPACITY: u64 = 64 * 1024;

    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            buffer: Self::allocate(device, Self::INITIAL_CAPACITY),
            capacity: Self::INITIAL_CAPACITY,
        }
    }

    fn allocate(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame uniforms"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Uploads `data`, growing the buffer to the next power of two if needed.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, data: &[u8]) {
        let len = data.len() as u64;
        if len > self.capacity {
            self.capacity = len.next_power_of_two();
            log::debug!("growing uniform arena to {} bytes", self.capacity);
            self.buffer = Self::allocate(device, self.capacity);
        }
        if !data.is_empty() {
            queue.write_buffer(&self.buffer, 0, data);
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::TargetAttachments;

    fn target(id: u32) -> Framebuffer {
        Framebuffer::Offscreen(TargetAttachments {
            color: AttachmentHandle(id),
            depth: AttachmentHandle(id + 1),
        })
    }

    fn draw(kind: DrawKind) -> RecordedDraw {
        RecordedDraw {
            pipeline: PipelineKey {
                program: ProgramHandle(0),
                format: wgpu::TextureFormat::Rgba8Unorm,
                sample_count: 1,
                depth_write: true,
            },
            program: ProgramHandle(0),
            viewport: UVec2::new(4, 4),
            uniform_offset: 0,
            kind,
        }
    }

    #[test]
    fn test_clear_folds_into_empty_pass() {
        let mut frame = FrameRecorder::default();
        frame.clear(target(1), Vec4::ONE);
        frame.clear(target(1), Vec4::ZERO);
        frame.draw(target(1), draw(DrawKind::Mesh { first: 0, count: 3 }));
        frame.draw(target(1), draw(DrawKind::Mesh { first: 3, count: 3 }));
        assert_eq!(frame.steps.len(), 1);
        let FrameStep::Pass(pass) = &frame.steps[0] else {
            panic!("expected a pass");
        };
        assert_eq!(pass.clear, Some(Vec4::ZERO));
        assert_eq!(pass.draws.len(), 2);

        frame.clear(target(1), Vec4::ONE);
        assert_eq!(frame.steps.len(), 2);
    }

    #[test]
    fn test_target_change_and_mipmaps_split_passes() {
        let mut frame = FrameRecorder::default();
        let quad = DrawKind::Quad {
            input: AttachmentHandle(9),
            feedback: false,
        };
        frame.draw(target(1), draw(quad));
        frame.generate_mipmaps(AttachmentHandle(1));
        frame.draw(target(1), draw(quad));
        frame.draw(Framebuffer::Screen, draw(quad));
        assert_eq!(frame.steps.len(), 4);
        assert_eq!(frame.steps[1], FrameStep::Mipmaps(AttachmentHandle(1)));
    }

    #[test]
    fn test_feedback_draw_opens_pass_with_copy() {
        let mut frame = FrameRecorder::default();
        frame.draw(target(1), draw(DrawKind::Mesh { first: 0, count: 3 }));
        frame.draw(
            target(1),
            draw(DrawKind::Quad {
                input: AttachmentHandle(1),
                feedback: true,
            }),
        );
        assert_eq!(frame.steps.len(), 2);
        let FrameStep::Pass(pass) = &frame.steps[1] else {
            panic!("expected a pass");
        };
        assert_eq!(pass.feedback_copy, Some(AttachmentHandle(1)));
        assert_eq!(pass.clear, None);
    }

    #[test]
    fn test_uniform_offsets_are_aligned() {
        let mut frame = FrameRecorder::default();
        assert_eq!(frame.push_uniforms(&[1; 192], 256), 0);
        assert_eq!(frame.push_uniforms(&[2; 16], 256), 256);
        assert_eq!(frame.push_uniforms(&[3; 16], 256), 512);
        assert_eq!(frame.uniforms.len(), 528);
        assert_eq!(frame.uniforms[256], 2);

        let taken = frame.take();
        assert_eq!(taken.uniforms.len(), 528);
        assert!(frame.uniforms.is_empty() && frame.steps.is_empty());
    }
}
