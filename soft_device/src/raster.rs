//! Triangle rasterization: the stage that turns assembled vertex indices
//! into interpolated pixel records.
//!
//! Consumption and production are decoupled. Three consecutive
//! `SV_VertexIndex` records form a triangle; setup walks the odd-aligned
//! sample grid inside the clamped NDC bounding box and queues the interior
//! samples. Production pops one queued sample at a time and interpolates
//! every output port from the three source vertices with barycentric
//! weights.

use bytemuck::{bytes_of, pod_read_unaligned};
use glam::{Vec2, Vec4, Vec4Swizzles};

use crate::geometry::{Aabb2, Triangle2};
use crate::pipeline::{ConfigError, PipelineError};
use crate::semantic::Semantic;
use crate::stage::{PortInput, PortList, PortOutput, Stage, StageCounters, StageError, StageMode};
use crate::stream::{FifoStream, StreamBuffer};
use crate::types::{interpolate_inplace3, ScalarType};

#[derive(Debug)]
pub struct Rasterizer {
    width: u32,
    height: u32,
    inputs: PortList,
    outputs: PortList,
    counters: StageCounters,

    vs_out: Option<StreamBuffer>,
    position_channel: usize,

    tri_indices: [u32; 3],
    tri_filled: usize,
    triangle: Triangle2,
    pending: Vec<Vec2>,
    emitted: usize,
}

impl Rasterizer {
    pub fn new() -> Self {
        let mut inputs = PortList::new();
        inputs
            .add("vtx_index", ScalarType::Uint, Semantic::SV_VERTEX_INDEX)
            .expect("empty port list");

        Self {
            width: 1,
            height: 1,
            inputs,
            outputs: PortList::new(),
            counters: StageCounters::default(),
            vs_out: None,
            position_channel: 0,
            tri_indices: [0; 3],
            tri_filled: 0,
            triangle: Triangle2::default(),
            pending: Vec::new(),
            emitted: 0,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Takes over the drained vertex-shader output for this draw.
    ///
    /// The buffer must carry an `SV_Position` channel of type `Float4`;
    /// every vertex is perspective-divided in place (w is left untouched,
    /// nothing downstream reads it).
    pub fn bind_vs_output(&mut self, stream: FifoStream) -> Result<(), ConfigError> {
        let mut buffer = stream.into_buffer();

        let position_channel = buffer
            .layout()
            .position(Semantic::SV_POSITION)
            .ok_or(ConfigError::MissingVsPosition)?;

        let position_ty = buffer.layout().fields()[position_channel].ty;
        if position_ty != ScalarType::Float4 {
            return Err(ConfigError::VsPositionType(position_ty));
        }

        for index in 0..buffer.len() {
            let Some(mut record) = buffer.get_mut(index) else {
                break;
            };
            let bytes = record.field_bytes_mut(position_channel);

            let mut position = pod_read_unaligned::<Vec4>(bytes);
            position.x /= position.w;
            position.y /= position.w;
            position.z /= position.w;
            bytes.copy_from_slice(bytes_of(&position));
        }

        self.vs_out = Some(buffer);
        self.position_channel = position_channel;

        // Per-draw consumption state starts fresh.
        self.tri_filled = 0;
        self.pending.clear();
        self.emitted = 0;

        Ok(())
    }

    /// Rebuilds the output port list as a copy of `next`'s input ports, so
    /// an arbitrary downstream attribute schema can be interpolated without
    /// static typing.
    ///
    /// Ports whose semantic exists in the bound vertex data must agree on
    /// the type; required ports must exist there.
    pub fn mirror_output_ports(&mut self, next: &PortList) -> Result<(), PipelineError> {
        let vs_out = self.vs_out.as_ref().ok_or(ConfigError::VsOutputUnbound)?;

        self.outputs.clear();
        for port in next.iter() {
            match vs_out.layout().position(port.semantic) {
                Some(channel) => {
                    let upstream = vs_out.layout().fields()[channel].ty;
                    if upstream != port.ty {
                        return Err(crate::layout::SchemaError::TypeMismatch {
                            semantic: port.semantic,
                            upstream,
                            downstream: port.ty,
                        }
                        .into());
                    }
                }
                None if port.is_required() => {
                    return Err(PipelineError::MissingRequiredInput {
                        stage: "rasterizer",
                        semantic: port.semantic,
                    });
                }
                // Optional attribute the vertex shader never wrote; the
                // pixel shader will read zeroes.
                None => {}
            }

            self.outputs.add(port.name.clone(), port.ty, port.semantic)?;
        }

        Ok(())
    }

    fn position_of(&self, index: u32) -> Result<Vec4, StageError> {
        let vs_out = self.vs_out.as_ref().ok_or(StageError::VertexDataUnbound)?;
        let record = vs_out
            .get(index as usize)
            .ok_or(StageError::VertexIndexOutOfBounds {
                index,
                len: vs_out.len(),
            })?;

        Ok(pod_read_unaligned(
            record.field_bytes(self.position_channel),
        ))
    }

    /// Triangle setup and pixel walk over NDC positions `va`, `vb`, `vc`.
    fn rasterize_triangle(&mut self, va: Vec4, vb: Vec4, vc: Vec4) {
        self.triangle = Triangle2::new(va.xy(), vb.xy(), vc.xy());
        self.pending.clear();
        self.emitted = 0;

        let ndc_box = Aabb2::from_points([va.xy(), vb.xy(), vc.xy()])
            .clamp(Vec2::splat(-1.0), Vec2::splat(1.0));

        let width = self.width as f32;
        let height = self.height as f32;

        let xmin = (ndc_box.min.x * width).floor() as i32;
        let xmax = (ndc_box.max.x * width).ceil() as i32;
        let ymin = (ndc_box.min.y * height).floor() as i32;
        let ymax = (ndc_box.max.y * height).ceil() as i32;

        // Samples sit on odd integers of the doubled screen grid; floor
        // division keeps the alignment stable for negative bounds.
        let x0 = xmin.div_euclid(2) * 2 + 1;
        let y0 = ymin.div_euclid(2) * 2 + 1;

        let mut y = y0;
        while y < ymax {
            let mut x = x0;
            while x < xmax {
                let sample = Vec2::new(x as f32 / width, y as f32 / height);
                if self.triangle.contains(sample) {
                    self.pending.push(sample);
                }
                x += 2;
            }
            y += 2;
        }

        tracing::trace!(
            pixels = self.pending.len(),
            "rasterized triangle ({}, {}, {})",
            va.xy(),
            vb.xy(),
            vc.xy()
        );
    }
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for Rasterizer {
    fn label(&self) -> &'static str {
        "rasterizer"
    }

    fn mode(&self) -> StageMode {
        StageMode::Asymmetric
    }

    fn input_ports(&self) -> &PortList {
        &self.inputs
    }

    fn output_ports(&self) -> &PortList {
        &self.outputs
    }

    fn counters(&self) -> &StageCounters {
        &self.counters
    }

    fn counters_mut(&mut self) -> &mut StageCounters {
        &mut self.counters
    }

    fn consume_one(&mut self, input: &PortInput<'_>) -> Result<(), StageError> {
        let index: u32 = input.read(0)?;
        self.tri_indices[self.tri_filled] = index;
        self.tri_filled += 1;

        if self.tri_filled == 3 {
            // The driver's back-pressure guarantees the previous triangle
            // has been fully emitted before the third index arrives.
            debug_assert!(!self.has_pending_output());
            self.tri_filled = 0;

            let va = self.position_of(self.tri_indices[0])?;
            let vb = self.position_of(self.tri_indices[1])?;
            let vc = self.position_of(self.tri_indices[2])?;

            self.rasterize_triangle(va, vb, vc);
        }

        Ok(())
    }

    fn has_pending_output(&self) -> bool {
        self.emitted < self.pending.len()
    }

    fn produce_one(&mut self, output: &mut PortOutput<'_>) -> Result<(), StageError> {
        if !self.has_pending_output() {
            return Err(StageError::NothingPending);
        }

        let pixel = self.pending[self.emitted];
        self.emitted += 1;

        let weights = self.triangle.barycentric(pixel);
        let vs_out = self.vs_out.as_ref().ok_or(StageError::VertexDataUnbound)?;
        let layout = vs_out.layout();

        let fetch = |index: u32| {
            vs_out.get(index as usize).ok_or(StageError::VertexIndexOutOfBounds {
                index,
                len: vs_out.len(),
            })
        };
        let record_a = fetch(self.tri_indices[0])?;
        let record_b = fetch(self.tri_indices[1])?;
        let record_c = fetch(self.tri_indices[2])?;

        for (location, port) in self.outputs.iter().enumerate() {
            // Attributes the vertex shader never produced stay zeroed in
            // the claimed record.
            let Some(channel) = layout.position(port.semantic) else {
                continue;
            };
            let Some(out) = output.bytes_mut(location) else {
                continue;
            };

            interpolate_inplace3(
                port.ty,
                out,
                record_a.field_bytes(channel),
                weights.u,
                record_b.field_bytes(channel),
                weights.v,
                record_c.field_bytes(channel),
                weights.w,
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::Rasterizer;
    use crate::pipeline::ConfigError;
    use crate::semantic::Semantic;
    use crate::stage::{PortList, Stage};
    use crate::stream::FifoStream;
    use crate::types::ScalarType;

    fn vs_out_with_positions(positions: &[Vec4]) -> FifoStream {
        let mut stream = FifoStream::with_channels([
            (Semantic::SV_POSITION, ScalarType::Float4),
            (Semantic::COLOR0, ScalarType::Float3),
        ])
        .unwrap();
        stream.set_capacity(positions.len());

        for &position in positions {
            stream.push().unwrap().write(0, position).unwrap();
        }
        stream
    }

    #[test]
    fn bind_requires_a_float4_position() {
        let mut raster = Rasterizer::new();

        let stream = FifoStream::with_channels([(Semantic::COLOR0, ScalarType::Float3)]).unwrap();
        assert!(matches!(
            raster.bind_vs_output(stream),
            Err(ConfigError::MissingVsPosition)
        ));

        let stream =
            FifoStream::with_channels([(Semantic::SV_POSITION, ScalarType::Float3)]).unwrap();
        assert!(matches!(
            raster.bind_vs_output(stream),
            Err(ConfigError::VsPositionType(ScalarType::Float3))
        ));
    }

    #[test]
    fn perspective_divide_is_applied_in_place() {
        let mut raster = Rasterizer::new();
        raster.resize(4, 4);

        let stream = vs_out_with_positions(&[Vec4::new(2.0, -4.0, 1.0, 2.0)]);
        raster.bind_vs_output(stream).unwrap();

        let position = raster.position_of(0).unwrap();
        assert_eq!(position, Vec4::new(1.0, -2.0, 0.5, 2.0));
    }

    #[test]
    fn perspective_divide_is_identity_for_unit_w() {
        let mut raster = Rasterizer::new();
        raster.resize(4, 4);

        let positions = [
            Vec4::new(-1.0, -1.0, 0.0, 1.0),
            Vec4::new(1.0, -1.0, 0.25, 1.0),
            Vec4::new(0.0, 1.0, -0.5, 1.0),
        ];
        raster.bind_vs_output(vs_out_with_positions(&positions)).unwrap();

        for (index, &expected) in positions.iter().enumerate() {
            assert_eq!(raster.position_of(index as u32).unwrap(), expected);
        }
    }

    #[test]
    fn mirrored_ports_copy_the_downstream_inputs() {
        let mut raster = Rasterizer::new();
        raster
            .bind_vs_output(vs_out_with_positions(&[Vec4::new(0.0, 0.0, 0.0, 1.0)]))
            .unwrap();

        let mut ps_inputs = PortList::new();
        ps_inputs
            .add("position", ScalarType::Float4, Semantic::SV_POSITION)
            .unwrap();
        ps_inputs
            .add("color", ScalarType::Float3, Semantic::COLOR0)
            .unwrap();
        ps_inputs
            .add("uv", ScalarType::Float2, Semantic::TEXCOORD0)
            .unwrap();

        raster.mirror_output_ports(&ps_inputs).unwrap();

        assert_eq!(raster.output_ports().len(), ps_inputs.len());
        for location in 0..ps_inputs.len() {
            assert_eq!(
                raster.output_ports().get(location),
                ps_inputs.get(location)
            );
        }
    }

    #[test]
    fn mirroring_rejects_cross_stage_type_mismatch() {
        let mut raster = Rasterizer::new();
        raster
            .bind_vs_output(vs_out_with_positions(&[Vec4::new(0.0, 0.0, 0.0, 1.0)]))
            .unwrap();

        let mut ps_inputs = PortList::new();
        ps_inputs
            .add("color", ScalarType::Float4, Semantic::COLOR0)
            .unwrap();

        assert!(raster.mirror_output_ports(&ps_inputs).is_err());
    }
}
