//! Shader Loading Utilities
//!
//! Embedded WGSL sources for the scene programs and the composition step that
//! turns definitions plus vertex and fragment stages into one module.

use super::gpu_context::ShaderDefinition;

/// Embedded shader stages, compiled into the binary.
///
/// Every vertex stage carries the shared prelude (`common.wgsl`), so a
/// vertex/fragment pair forms a complete module.
pub mod embedded {
    pub const COMMON: &str = include_str!("../../shaders/common.wgsl");

    /// Fullscreen triangle for offscreen passes.
    pub const FULLSCREEN_VERTEX: &str = concat!(
        include_str!("../../shaders/common.wgsl"),
        include_str!("../../shaders/fullscreen.wgsl")
    );

    /// Height-field displacement. Needs `HEIGHT_CHANNEL`.
    pub const DISPLACEMENT_FRAGMENT: &str = include_str!("../../shaders/displacement.wgsl");

    /// Terrain plane lifted by the height map. Needs `HEIGHT_CHANNEL`.
    pub const TERRAIN_VERTEX: &str = concat!(
        include_str!("../../shaders/common.wgsl"),
        include_str!("../../shaders/terrain.wgsl")
    );

    pub const TERRAIN_FRAGMENT: &str = include_str!("../../shaders/terrain_shading.wgsl");

    pub const MESH_VERTEX: &str = concat!(
        include_str!("../../shaders/common.wgsl"),
        include_str!("../../shaders/mesh.wgsl")
    );

    /// Flat sun-lit color. Needs `EMISSIVE`.
    pub const LIT_FRAGMENT: &str = include_str!("../../shaders/lit.wgsl");
}

/// Definition names the embedded stages expect.
pub mod definitions {
    pub const HEIGHT_CHANNEL: &str = "HEIGHT_CHANNEL";
    pub const EMISSIVE: &str = "EMISSIVE";
}

/// A vertex/fragment pair that [`GpuContext::compile_program`](super::GpuContext::compile_program)
/// accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgramSource {
    pub label: &'static str,
    pub vertex: &'static str,
    pub fragment: &'static str,
}

/// Offscreen displacement program that fills the height field.
pub const DISPLACEMENT_PROGRAM: ProgramSource = ProgramSource {
    label: "Displacement",
    vertex: embedded::FULLSCREEN_VERTEX,
    fragment: embedded::DISPLACEMENT_FRAGMENT,
};

/// Visible terrain surface.
pub const TERRAIN_PROGRAM: ProgramSource = ProgramSource {
    label: "Terrain Surface",
    vertex: embedded::TERRAIN_VERTEX,
    fragment: embedded::TERRAIN_FRAGMENT,
};

/// Everything else: sun, water, ground, stars, clouds, trees.
pub const BASIC_PROGRAM: ProgramSource = ProgramSource {
    label: "Basic Lit",
    vertex: embedded::MESH_VERTEX,
    fragment: embedded::LIT_FRAGMENT,
};

/// Join definitions, vertex and fragment stages into one WGSL module.
pub fn compose_program(
    definitions: &[ShaderDefinition],
    vertex_source: &str,
    fragment_source: &str,
) -> String {
    let mut source = String::with_capacity(vertex_source.len() + fragment_source.len() + 256);
    for definition in definitions {
        source.push_str(&definition.to_wgsl());
    }
    source.push_str(vertex_source);
    source.push('\n');
    source.push_str(fragment_source);
    source
}

/// Create a wgpu shader module from the given source.
pub fn create_shader_module(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_puts_definitions_first() {
        let defs = [ShaderDefinition::new(definitions::EMISSIVE, 1.0)];
        let source = compose_program(&defs, "// vs", "// fs");
        assert_eq!(source, "const EMISSIVE: f32 = 1.0;\n// vs\n// fs");
    }

    #[test]
    fn test_vertex_stages_carry_prelude() {
        for program in [DISPLACEMENT_PROGRAM, TERRAIN_PROGRAM, BASIC_PROGRAM] {
            assert!(
                program.vertex.starts_with(embedded::COMMON),
                "{} is missing the shared prelude",
                program.label
            );
            assert!(!program.fragment.contains("struct SceneUniforms"));
        }
    }
}
