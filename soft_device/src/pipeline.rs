//! The pipeline driver: owns the stages, wires the inter-stage streams for
//! each draw and runs the loop until every stream and every pending set is
//! drained.

use bytemuck::Pod;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, trace_span};

use crate::input_assembler::InputAssembler;
use crate::layout::SchemaError;
use crate::metrics::PipelineMetrics;
use crate::output_merger::OutputMerger;
use crate::primitive::PrimitiveAssembler;
use crate::raster::Rasterizer;
use crate::semantic::Semantic;
use crate::shader::{ShaderError, ShaderProgram, ShaderStage};
use crate::stage::{BindError, PortBinding, PortInput, PortOutput, Stage, StageError, StageMode};
use crate::stream::{FifoStream, InputStream, OutputStream, StreamError};
use crate::texture::{PresentError, Sampler2d, Surface, Texture2d};
use crate::types::ScalarType;

/// Default capacity of the intermediate FIFO streams, in records.
pub const DEFAULT_FIFO_CAPACITY: usize = 1 << 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("target size is not set")]
    TargetSizeUnset,
    #[error("no index buffer is bound")]
    IndexBufferUnset,
    #[error("draw range {start}+{count} exceeds index buffer length {len}")]
    InvalidDrawRange {
        start: usize,
        count: usize,
        len: usize,
    },
    #[error("no program attached to the {0}")]
    ShaderUnbound(&'static str),
    #[error("vertex shader output lacks SV_Position")]
    MissingVsPosition,
    #[error("SV_Position must be Float4, found {0:?}")]
    VsPositionType(ScalarType),
    #[error("vertex shader output is not bound to the rasterizer")]
    VsOutputUnbound,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Present(#[from] PresentError),
    #[error("{stage}: missing required input {semantic}")]
    MissingRequiredInput {
        stage: &'static str,
        semantic: Semantic,
    },
    #[error("{stage}: {source}")]
    Stage {
        stage: &'static str,
        source: StageError,
    },
}

/// Runs `stage` between two streams, honoring its runtime mode.
///
/// One-in-one-out stages transfer records while the input has one and the
/// output has room. Asymmetric stages are first fed until they report
/// pending output (or the input runs dry), then drained until the output
/// fills or the pending set empties.
pub fn run_stage(
    stage: &mut dyn Stage,
    input: &mut dyn InputStream,
    output: &mut dyn OutputStream,
) -> Result<(), PipelineError> {
    let label = stage.label();
    let missing = |BindError::MissingRequired(semantic)| PipelineError::MissingRequiredInput {
        stage: label,
        semantic,
    };

    let in_binding = PortBinding::resolve(stage.input_ports(), &*input).map_err(missing)?;
    let out_binding = PortBinding::resolve(stage.output_ports(), &*output).map_err(missing)?;

    let failed = |source| PipelineError::Stage {
        stage: label,
        source,
    };

    match stage.mode() {
        StageMode::OneToOne => {
            while !input.is_empty() && !output.is_full() {
                output.push()?;

                let in_view = PortInput::new(&in_binding, &*input);
                let mut out_view = PortOutput::new(&out_binding, &mut *output);
                stage.run_one(&in_view, &mut out_view).map_err(failed)?;

                input.pop()?;
                stage.counters_mut().consumed += 1;
                stage.counters_mut().produced += 1;
            }
        }
        StageMode::Asymmetric => {
            while !input.is_empty() && !stage.has_pending_output() {
                let in_view = PortInput::new(&in_binding, &*input);
                stage.consume_one(&in_view).map_err(failed)?;

                input.pop()?;
                stage.counters_mut().consumed += 1;
            }

            while !output.is_full() && stage.has_pending_output() {
                output.push()?;

                let mut out_view = PortOutput::new(&out_binding, &mut *output);
                stage.produce_one(&mut out_view).map_err(failed)?;

                stage.counters_mut().produced += 1;
            }
        }
    }

    Ok(())
}

/// The staged software pipeline: input assembly, vertex shading, primitive
/// assembly, rasterization, pixel shading and output merging, connected by
/// bounded FIFO streams.
#[derive(Debug)]
pub struct Pipeline {
    input_assembler: InputAssembler,
    primitive_assembler: PrimitiveAssembler,
    vs: ShaderStage,
    ps: ShaderStage,
    rasterizer: Rasterizer,
    output_merger: OutputMerger,
    width: u32,
    height: u32,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            input_assembler: InputAssembler::new(),
            primitive_assembler: PrimitiveAssembler::new(),
            vs: ShaderStage::new("vertex-shader"),
            ps: ShaderStage::new("pixel-shader"),
            rasterizer: Rasterizer::new(),
            output_merger: OutputMerger::new(),
            width: 0,
            height: 0,
        }
    }

    pub fn set_vertex_buffer_channel(
        &mut self,
        semantic: Semantic,
        data: Bytes,
        offset: usize,
        stride: usize,
    ) {
        self.input_assembler
            .set_vertex_buffer_channel(semantic, data, offset, stride);
    }

    pub fn set_vertex_buffer_length(&mut self, len: usize) {
        self.input_assembler.set_vertex_buffer_length(len);
    }

    pub fn set_index_buffer(&mut self, data: Bytes, offset: usize, stride: usize, len: usize) {
        self.input_assembler.set_index_buffer(data, offset, stride, len);
    }

    pub fn set_vs_program(&mut self, program: Box<dyn ShaderProgram>) -> Result<(), PipelineError> {
        self.vs.attach(program)?;
        Ok(())
    }

    pub fn set_ps_program(&mut self, program: Box<dyn ShaderProgram>) -> Result<(), PipelineError> {
        self.ps.attach(program)?;
        Ok(())
    }

    /// Binds a numeric vertex-shader constant by symbol name.
    pub fn set_vs_constant<T: Pod>(&mut self, name: &str, value: T) -> Result<(), PipelineError> {
        self.vs.context_mut().set_constant(name, value)?;
        Ok(())
    }

    /// Binds a numeric pixel-shader constant by symbol name.
    pub fn set_ps_constant<T: Pod>(&mut self, name: &str, value: T) -> Result<(), PipelineError> {
        self.ps.context_mut().set_constant(name, value)?;
        Ok(())
    }

    pub fn set_ps_texture(&mut self, name: &str, texture: Texture2d) -> Result<(), PipelineError> {
        self.ps.context_mut().set_texture(name, texture)?;
        Ok(())
    }

    pub fn set_ps_sampler(&mut self, name: &str, sampler: Sampler2d) -> Result<(), PipelineError> {
        self.ps.context_mut().set_sampler(name, sampler)?;
        Ok(())
    }

    pub fn set_target_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.rasterizer.resize(width, height);
        self.output_merger.resize(width, height);
    }

    /// Resets the color target to black and the depth target to far.
    pub fn clear_targets(&mut self) {
        self.output_merger.clear();
    }

    pub fn color_target(&self) -> &Surface {
        self.output_merger.color_target()
    }

    pub fn depth_target(&self) -> &Surface {
        self.output_merger.depth_target()
    }

    /// Draws every primitive in the bound index buffer.
    pub fn draw_indexed(&mut self) -> Result<(), PipelineError> {
        self.draw(None)
    }

    /// Draws `count` indices starting at `start`.
    pub fn draw_indexed_range(&mut self, start: usize, count: usize) -> Result<(), PipelineError> {
        self.draw(Some((start, count)))
    }

    /// Writes the color and depth targets to `fb_color.bmp` / `fb_depth.bmp`.
    pub fn present(&self) -> Result<(), PipelineError> {
        let _span = trace_span!("Pipeline::present").entered();
        self.output_merger.present_to_bmp()?;
        Ok(())
    }

    pub fn metrics(&self) -> PipelineMetrics {
        PipelineMetrics {
            vertex_shader: *self.vs.counters(),
            primitive_assembler: *self.primitive_assembler.counters(),
            rasterizer: *self.rasterizer.counters(),
            pixel_shader: *self.ps.counters(),
            output_merger: *self.output_merger.counters(),
        }
    }

    fn draw(&mut self, range: Option<(usize, usize)>) -> Result<(), PipelineError> {
        let _span = trace_span!("Pipeline::draw_indexed").entered();

        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::TargetSizeUnset.into());
        }
        if !self.vs.is_attached() {
            return Err(ConfigError::ShaderUnbound("vertex-shader").into());
        }
        if !self.ps.is_attached() {
            return Err(ConfigError::ShaderUnbound("pixel-shader").into());
        }

        let mut vs_in = self.input_assembler.vertex_stream();
        let mut pa_in = match range {
            None => self
                .input_assembler
                .index_stream()
                .ok_or(ConfigError::IndexBufferUnset)?,
            Some((start, count)) => self
                .input_assembler
                .index_stream_range(start, count)
                .ok_or_else(|| match self.input_assembler.index_len() {
                    None => ConfigError::IndexBufferUnset,
                    Some(len) => ConfigError::InvalidDrawRange { start, count, len },
                })?,
        };

        // The vertex shader's output is buffered whole: the rasterizer
        // addresses it randomly by vertex index.
        let mut vs_out = FifoStream::with_channels(
            self.vs.output_ports().iter().map(|p| (p.semantic, p.ty)),
        )?;
        vs_out.set_capacity(vs_in.len());

        let mut pa_out = FifoStream::with_channels(
            self.primitive_assembler
                .output_ports()
                .iter()
                .map(|p| (p.semantic, p.ty)),
        )?;
        pa_out.set_capacity(DEFAULT_FIFO_CAPACITY);

        let mut ps_in = FifoStream::with_channels(
            self.ps.input_ports().iter().map(|p| (p.semantic, p.ty)),
        )?;
        ps_in.set_capacity(DEFAULT_FIFO_CAPACITY);

        let mut ps_out = FifoStream::with_channels(
            self.ps.output_ports().iter().map(|p| (p.semantic, p.ty)),
        )?;
        ps_out.set_capacity(DEFAULT_FIFO_CAPACITY);

        // The output merger is a sink; it still gets a stream so the driver
        // helper stays uniform.
        let mut sink = FifoStream::new();
        sink.set_capacity(1);

        debug!(
            vertices = InputStream::len(&vs_in),
            indices = InputStream::len(&pa_in),
            "starting indexed draw"
        );

        // The whole vertex range is transformed in one pass; the VS output
        // capacity matches the vertex count, so nothing can stall.
        run_stage(&mut self.vs, &mut vs_in, &mut vs_out)?;
        debug_assert!(InputStream::is_empty(&vs_in));

        self.rasterizer.bind_vs_output(vs_out)?;
        self.rasterizer.mirror_output_ports(self.ps.input_ports())?;

        loop {
            let stage_pending = self.primitive_assembler.has_pending_output()
                || self.rasterizer.has_pending_output()
                || self.ps.has_pending_output()
                || self.output_merger.has_pending_output();
            let stream_backlog = !InputStream::is_empty(&pa_in)
                || !pa_out.is_empty()
                || !ps_in.is_empty()
                || !ps_out.is_empty();

            if !stage_pending && !stream_backlog {
                break;
            }

            run_stage(&mut self.primitive_assembler, &mut pa_in, &mut pa_out)?;
            run_stage(&mut self.rasterizer, &mut pa_out, &mut ps_in)?;
            run_stage(&mut self.ps, &mut ps_in, &mut ps_out)?;
            run_stage(&mut self.output_merger, &mut ps_out, &mut sink)?;
        }

        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
