//! Shader programs and their WGSL sources.
//!
//! Every program is a vertex/fragment pair plus a description of its uniform
//! block and vertex attributes. The description lets the pipeline resolve
//! uniforms by name at startup and lets the software backend interpret
//! uniform writes without parsing WGSL.

use std::collections::HashMap;
use std::fmt;

use crate::device::{ProgramHandle, RenderDevice, UniformLocation};
use crate::error::{RenderError, RenderResult};

/// Entry point of every vertex stage.
pub const VERTEX_ENTRY: &str = "vs_main";
/// Entry point of every fragment stage.
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Size of the uniform block shared by all full-screen filter programs.
pub const FILTER_BLOCK_SIZE: u32 = 16;
/// Size of the model-shading uniform block (three 4x4 matrices).
pub const MODEL_BLOCK_SIZE: u32 = 192;

/// The distinct passes of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Phong shading of the mesh.
    ModelShading,
    /// Copies its input unchanged.
    Passthrough,
    HorizontalBlur,
    VerticalBlur,
    Greyscale,
}

impl ProgramKind {
    pub const ALL: [ProgramKind; 5] = [
        ProgramKind::ModelShading,
        ProgramKind::Passthrough,
        ProgramKind::HorizontalBlur,
        ProgramKind::VerticalBlur,
        ProgramKind::Greyscale,
    ];

    /// Whether the program draws mesh geometry rather than the full-screen quad.
    #[must_use]
    pub fn draws_mesh(self) -> bool {
        self == ProgramKind::ModelShading
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ProgramKind::ModelShading => "model shading",
            ProgramKind::Passthrough => "passthrough",
            ProgramKind::HorizontalBlur => "horizontal blur",
            ProgramKind::VerticalBlur => "vertical blur",
            ProgramKind::Greyscale => "greyscale",
        }
    }

    /// Returns the sources and interface of the program.
    #[must_use]
    pub fn source(self) -> ProgramSource {
        match self {
            ProgramKind::ModelShading => ProgramSource {
                kind: self,
                vertex: include_str!("shaders/phong.vert.wgsl"),
                fragment: include_str!("shaders/phong.frag.wgsl"),
                uniforms: &MODEL_UNIFORMS,
                block_size: MODEL_BLOCK_SIZE,
                attributes: &MESH_ATTRIBUTES,
            },
            ProgramKind::Passthrough => {
                Self::filter(self, include_str!("shaders/passthrough.frag.wgsl"), &[])
            }
            ProgramKind::HorizontalBlur => Self::filter(
                self,
                include_str!("shaders/horizontal_blur.frag.wgsl"),
                &HORIZONTAL_BLUR_UNIFORMS,
            ),
            ProgramKind::VerticalBlur => Self::filter(
                self,
                include_str!("shaders/vertical_blur.frag.wgsl"),
                &VERTICAL_BLUR_UNIFORMS,
            ),
            ProgramKind::Greyscale => {
                Self::filter(self, include_str!("shaders/greyscale.frag.wgsl"), &[])
            }
        }
    }

    fn filter(
        kind: ProgramKind,
        fragment: &'static str,
        uniforms: &'static [UniformDecl],
    ) -> ProgramSource {
        ProgramSource {
            kind,
            vertex: include_str!("shaders/passthrough.vert.wgsl"),
            fragment,
            uniforms,
            block_size: FILTER_BLOCK_SIZE,
            attributes: &QUAD_ATTRIBUTES,
        }
    }
}

impl fmt::Display for ProgramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Type of a uniform as declared in WGSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformType {
    Float,
    Vec2,
    Mat4,
}

impl UniformType {
    /// Size in bytes.
    #[must_use]
    pub fn size(self) -> u32 {
        match self {
            UniformType::Float => 4,
            UniformType::Vec2 => 8,
            UniformType::Mat4 => 64,
        }
    }
}

/// A named member of a program's uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: &'static str,
    pub ty: UniformType,
    pub offset: u32,
}

/// A named vertex input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDecl {
    pub name: &'static str,
    /// Shader location.
    pub location: u32,
    /// Number of f32 components.
    pub components: u32,
}

const MODEL_UNIFORMS: [UniformDecl; 3] = [
    UniformDecl {
        name: "projection_matrix",
        ty: UniformType::Mat4,
        offset: 0,
    },
    UniformDecl {
        name: "modelview_matrix",
        ty: UniformType::Mat4,
        offset: 64,
    },
    UniformDecl {
        name: "modelview_inverse_matrix",
        ty: UniformType::Mat4,
        offset: 128,
    },
];

const HORIZONTAL_BLUR_UNIFORMS: [UniformDecl; 1] = [UniformDecl {
    name: "dx",
    ty: UniformType::Float,
    offset: 0,
}];

const VERTICAL_BLUR_UNIFORMS: [UniformDecl; 1] = [UniformDecl {
    name: "dy",
    ty: UniformType::Float,
    offset: 4,
}];

const MESH_ATTRIBUTES: [AttributeDecl; 2] = [
    AttributeDecl {
        name: "position",
        location: 0,
        components: 3,
    },
    AttributeDecl {
        name: "normal",
        location: 1,
        components: 3,
    },
];

const QUAD_ATTRIBUTES: [AttributeDecl; 1] = [AttributeDecl {
    name: "position",
    location: 0,
    components: 2,
}];

/// Sources and interface of one program.
#[derive(Debug, Clone, Copy)]
pub struct ProgramSource {
    pub kind: ProgramKind,
    /// Vertex stage WGSL.
    pub vertex: &'static str,
    /// Fragment stage WGSL.
    pub fragment: &'static str,
    pub uniforms: &'static [UniformDecl],
    /// Size of the uniform block in bytes.
    pub block_size: u32,
    pub attributes: &'static [AttributeDecl],
}

impl ProgramSource {
    /// Looks up a uniform declaration by name.
    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<&UniformDecl> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    /// Checks that every uniform fits inside the block.
    pub fn validate(&self) -> RenderResult<()> {
        for decl in self.uniforms {
            if decl.offset + decl.ty.size() > self.block_size {
                return Err(RenderError::ShaderCompilationFailed {
                    program: self.kind.label().to_string(),
                    message: format!(
                        "uniform '{}' at offset {} overflows the {}-byte block",
                        decl.name, decl.offset, self.block_size
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Builder for a WGSL module from separate vertex and fragment stages.
pub struct ShaderBuilder {
    vertex_source: Option<String>,
    fragment_source: Option<String>,
    label: Option<String>,
}

impl ShaderBuilder {
    /// Creates a new shader builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            vertex_source: None,
            fragment_source: None,
            label: None,
        }
    }

    /// Starts a builder from a program's sources.
    #[must_use]
    pub fn from_source(source: &ProgramSource) -> Self {
        Self::new()
            .with_vertex(source.vertex)
            .with_fragment(source.fragment)
            .with_label(source.kind.label())
    }

    /// Sets the vertex shader source (WGSL).
    #[must_use]
    pub fn with_vertex(mut self, source: impl Into<String>) -> Self {
        self.vertex_source = Some(source.into());
        self
    }

    /// Sets the fragment shader source (WGSL).
    #[must_use]
    pub fn with_fragment(mut self, source: impl Into<String>) -> Self {
        self.fragment_source = Some(source.into());
        self
    }

    /// Sets the shader label for debugging.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Builds the shader module.
    ///
    /// WGSL errors are reported through the device's error scopes, not here.
    pub fn build_module(self, device: &wgpu::Device) -> RenderResult<wgpu::ShaderModule> {
        let source = self.combined_source()?;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: self.label.as_deref(),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        Ok(module)
    }

    /// Joins the two stages into one module source.
    pub fn combined_source(&self) -> RenderResult<String> {
        let program = self.label.clone().unwrap_or_else(|| "unnamed".into());
        let vertex = self
            .vertex_source
            .as_ref()
            .ok_or_else(|| RenderError::ShaderCompilationFailed {
                program: program.clone(),
                message: "missing vertex shader".into(),
            })?;

        let fragment =
            self.fragment_source
                .as_ref()
                .ok_or_else(|| RenderError::ShaderCompilationFailed {
                    program: program.clone(),
                    message: "missing fragment shader".into(),
                })?;

        if vertex == fragment {
            return Ok(vertex.clone());
        }

        Ok(format!("{vertex}\n\n{fragment}"))
    }
}

impl Default for ShaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A linked program with name lookups for its uniforms and attributes.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    handle: ProgramHandle,
    kind: ProgramKind,
    uniforms: HashMap<&'static str, UniformLocation>,
    attributes: HashMap<&'static str, u32>,
}

impl ShaderProgram {
    /// Compiles `source` on the device.
    pub fn create<D: RenderDevice + ?Sized>(
        device: &mut D,
        source: &ProgramSource,
    ) -> RenderResult<Self> {
        source.validate()?;
        let handle = device.create_program(source)?;
        log::debug!("compiled {} program ({})", source.kind, handle.id());
        Ok(Self {
            handle,
            kind: source.kind,
            uniforms: source
                .uniforms
                .iter()
                .map(|u| {
                    (
                        u.name,
                        UniformLocation {
                            offset: u.offset,
                            ty: u.ty,
                        },
                    )
                })
                .collect(),
            attributes: source
                .attributes
                .iter()
                .map(|a| (a.name, a.location))
                .collect(),
        })
    }

    #[must_use]
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    #[must_use]
    pub fn kind(&self) -> ProgramKind {
        self.kind
    }

    /// Returns the location of a named uniform.
    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied()
    }

    /// Returns the location of a uniform the caller cannot run without.
    pub fn require_uniform(&self, name: &str) -> RenderResult<UniformLocation> {
        self.uniform(name)
            .ok_or_else(|| RenderError::UniformNotFound {
                program: self.kind.label().to_string(),
                name: name.to_string(),
            })
    }

    /// Returns the shader location of a named vertex attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_sources_are_consistent() {
        for kind in ProgramKind::ALL {
            let source = kind.source();
            assert_eq!(source.kind, kind);
            source.validate().unwrap();
            assert!(source.vertex.contains(VERTEX_ENTRY));
            assert!(source.fragment.contains(FRAGMENT_ENTRY));
            assert!(source.attributes.iter().any(|a| a.name == "position"));
        }
    }

    #[test]
    fn test_model_uniforms() {
        let source = ProgramKind::ModelShading.source();
        assert_eq!(source.uniform("projection_matrix").unwrap().offset, 0);
        assert_eq!(source.uniform("modelview_matrix").unwrap().offset, 64);
        assert_eq!(source.uniform("modelview_inverse_matrix").unwrap().offset, 128);
        assert!(source.uniform("dx").is_none());
    }

    #[test]
    fn test_blur_uniforms_match_wgsl_block() {
        let h = ProgramKind::HorizontalBlur.source();
        let v = ProgramKind::VerticalBlur.source();
        assert!(h.fragment.contains("dx: f32"));
        assert!(v.fragment.contains("dy: f32"));
        assert_eq!(h.uniform("dx").unwrap().offset, 0);
        assert_eq!(v.uniform("dy").unwrap().offset, 4);
    }

    #[test]
    fn test_overflowing_uniform_is_rejected() {
        static BAD: [UniformDecl; 1] = [UniformDecl {
            name: "m",
            ty: UniformType::Mat4,
            offset: 0,
        }];
        let mut source = ProgramKind::Passthrough.source();
        source.uniforms = &BAD;
        assert!(matches!(
            source.validate(),
            Err(RenderError::ShaderCompilationFailed { .. })
        ));
    }

    #[test]
    fn test_builder_requires_both_stages() {
        let err = ShaderBuilder::new()
            .with_vertex("fn vs_main() {}")
            .with_label("broken")
            .combined_source()
            .unwrap_err();
        assert!(err.to_string().contains("broken"));

        let joined = ShaderBuilder::from_source(&ProgramKind::Greyscale.source())
            .combined_source()
            .unwrap();
        assert!(joined.contains(VERTEX_ENTRY) && joined.contains(FRAGMENT_ENTRY));
    }
}
