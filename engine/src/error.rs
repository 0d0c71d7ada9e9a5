//! Error Types
//!
//! Failure taxonomy for the height-field pipeline and its collaborators.
//! None of these are fatal to the frame loop: callers log them and keep
//! using the last known-good state.

use std::path::PathBuf;

use thiserror::Error;

use crate::uniforms::UniformKind;

/// GPU-side failure while compiling a program, allocating a target,
/// drawing into it or reading it back.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderTargetError {
    #[error("render target allocation failed: {0}")]
    Allocation(String),

    #[error("shader program compile failed: {0}")]
    Compile(String),

    #[error("offscreen draw failed: {0}")]
    Draw(String),

    #[error("pixel readback failed: {0}")]
    Readback(String),

    #[error("readback returned {actual} floats, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("pixel layout has {layout} channels but the context reads back {context}")]
    LayoutMismatch { layout: usize, context: usize },

    #[error("unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: u32 },
}

/// A height query that maps outside the cached height field.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
#[error(
    "height query ({x}, {y}) maps to cell ({x_index}, {y_index}) / index {index}, \
     field holds {len} floats"
)]
pub struct OutOfRangeQueryError {
    pub x: f32,
    pub y: f32,
    pub x_index: i64,
    pub y_index: i64,
    pub index: i64,
    pub len: usize,
}

/// Acknowledgment from a consumer that never registered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("listener `{0}` was not registered before acknowledging a change")]
pub struct UnknownListenerError(pub String);

/// Misuse of the uniform registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UniformError {
    #[error("unknown uniform `{0}`")]
    Unknown(String),

    #[error("uniform `{name}` is tagged {expected:?}, got a {found:?} value")]
    TypeMismatch {
        name: String,
        expected: UniformKind,
        found: UniformKind,
    },
}

/// Invalid or unreadable scene configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("height channel {height_channel} is outside a {channels}-channel pixel")]
    PixelLayout {
        channels: usize,
        height_channel: usize,
    },

    #[error("plane size {width}x{height} must be positive")]
    PlaneSize { width: u32, height: u32 },
}

/// Failure while bringing up the wgpu device or window surface.
#[derive(Debug, Error)]
pub enum GpuInitError {
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}
