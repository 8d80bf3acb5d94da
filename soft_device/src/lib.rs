//! A software graphics device: a configurable six-stage rendering pipeline
//! (input assembler, vertex shader, primitive assembler, rasterizer, pixel
//! shader, output merger) executed on the CPU.
//!
//! Stages exchange dynamically-typed records through bounded FIFO streams.
//! Record schemas are built at draw-configuration time from each stage's
//! declared ports and matched between stages by [`Semantic`] rather than by
//! position, so shaders with arbitrary attribute layouts compose without
//! static typing.
//!
//! Everything is single-threaded and deterministic: the [`Pipeline`] driver
//! alone decides when each stage consumes or produces a record.

#![deny(unsafe_code)]

pub mod geometry;
pub mod input_assembler;
pub mod layout;
pub mod metrics;
pub mod output_merger;
pub mod pipeline;
pub mod primitive;
pub mod raster;
pub mod semantic;
pub mod shader;
pub mod stage;
pub mod stream;
pub mod texture;
pub mod types;

pub use crate::pipeline::{ConfigError, Pipeline, PipelineError};
pub use crate::semantic::{Semantic, SemanticName};
pub use crate::shader::{ShaderContext, ShaderProgram, ShaderSignature, ShaderSymbol};
pub use crate::texture::{AddressMode, FilterMode, Sampler2d, TexelFormat, Texture2d};
pub use crate::types::ScalarType;
