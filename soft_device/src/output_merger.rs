//! The final stage: maps NDC samples onto the render targets and applies
//! the early depth test.

use glam::Vec3;

use crate::semantic::Semantic;
use crate::stage::{PortInput, PortList, Stage, StageCounters, StageError, StageMode};
use crate::texture::{PresentError, Surface, TexelFormat};
use crate::types::ScalarType;

pub const COLOR_TARGET_PATH: &str = "fb_color.bmp";
pub const DEPTH_TARGET_PATH: &str = "fb_depth.bmp";

/// Depth test + target update. A pure sink: it consumes pixel records and
/// never produces output, so its `has_pending_output` is always `false`.
///
/// Depth convention: NDC z ∈ [−1, 1] remaps to d = −(z − 1)/2 ∈ [0, 1]
/// (clamped), so z = −1 is the near plane at d = 1 and the test keeps the
/// greater value.
#[derive(Debug)]
pub struct OutputMerger {
    width: u32,
    height: u32,
    inputs: PortList,
    outputs: PortList,
    counters: StageCounters,
    color: Surface,
    depth: Surface,
}

impl OutputMerger {
    pub fn new() -> Self {
        let mut inputs = PortList::new();
        inputs
            .add("position", ScalarType::Float3, Semantic::SV_POSITION)
            .expect("empty port list");
        inputs
            .add("color", ScalarType::Float3, Semantic::SV_TARGET)
            .expect("empty port list");

        Self {
            width: 0,
            height: 0,
            inputs,
            outputs: PortList::new(),
            counters: StageCounters::default(),
            color: Surface::new(TexelFormat::Rgb32Float, 0, 0),
            depth: Surface::new(TexelFormat::Depth32Float, 0, 0),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }

        self.width = width;
        self.height = height;
        self.color.resize(width, height);
        self.depth.resize(width, height);
    }

    /// Resets color to black and depth to 0 (far).
    pub fn clear(&mut self) {
        self.color.clear();
        self.depth.clear();
    }

    pub fn color_target(&self) -> &Surface {
        &self.color
    }

    pub fn depth_target(&self) -> &Surface {
        &self.depth
    }

    /// Writes both targets as `fb_color.bmp` / `fb_depth.bmp` in the
    /// working directory.
    pub fn present_to_bmp(&self) -> Result<(), PresentError> {
        self.color.save_bmp(COLOR_TARGET_PATH)?;
        self.depth.save_bmp(DEPTH_TARGET_PATH)?;
        Ok(())
    }
}

impl Default for OutputMerger {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for OutputMerger {
    fn label(&self) -> &'static str {
        "output-merger"
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
        let position: Vec3 = input.read(0)?;
        let color: Vec3 = input.read(1)?;

        // Samples sit on odd-aligned integers in the doubled screen grid, so
        // the halving below cannot land between pixels.
        let screen_x = ((position.x * self.width as f32).round() as i32 + self.width as i32) / 2;
        let screen_y = ((position.y * self.height as f32).round() as i32 + self.height as i32) / 2;

        if screen_x < 0
            || screen_y < 0
            || screen_x >= self.width as i32
            || screen_y >= self.height as i32
        {
            return Ok(());
        }
        let (screen_x, screen_y) = (screen_x as u32, screen_y as u32);

        let depth = (-(position.z - 1.0) / 2.0).clamp(0.0, 1.0);

        if depth > self.depth.read::<f32>(screen_x, screen_y) {
            self.depth.write(screen_x, screen_y, depth);
            self.color.write(screen_x, screen_y, color.to_array());
        }

        Ok(())
    }

    fn has_pending_output(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::OutputMerger;
    use crate::stage::{PortBinding, PortInput, Stage};
    use crate::stream::{FifoStream, InputStream};
    use crate::semantic::Semantic;
    use crate::types::ScalarType;

    fn pixel_stream(position: Vec3, color: Vec3) -> FifoStream {
        let mut stream = FifoStream::with_channels([
            (Semantic::SV_POSITION, ScalarType::Float3),
            (Semantic::SV_TARGET, ScalarType::Float3),
        ])
        .unwrap();
        stream.set_capacity(1);

        let mut record = stream.push().unwrap();
        record.write(0, position).unwrap();
        record.write(1, color).unwrap();
        stream
    }

    fn consume(om: &mut OutputMerger, position: Vec3, color: Vec3) {
        let stream = pixel_stream(position, color);
        let binding = PortBinding::resolve(om.input_ports(), &stream).unwrap();
        let input = PortInput::new(&binding, &stream as &dyn InputStream);
        om.consume_one(&input).unwrap();
    }

    #[test]
    fn depth_test_keeps_the_greater_remapped_depth() {
        let mut om = OutputMerger::new();
        om.resize(4, 4);

        // z = 1 is far (d = 0), z = -1 is near (d = 1).
        consume(&mut om, Vec3::new(0.25, 0.25, 1.0), Vec3::X);
        consume(&mut om, Vec3::new(0.25, 0.25, -1.0), Vec3::Y);
        // A far sample arriving later loses.
        consume(&mut om, Vec3::new(0.25, 0.25, 0.5), Vec3::Z);

        assert_eq!(om.depth_target().read::<f32>(2, 2), 1.0);
        assert_eq!(om.color_target().read::<[f32; 3]>(2, 2), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn ndc_maps_onto_the_screen_grid() {
        let mut om = OutputMerger::new();
        om.resize(4, 4);

        // Sample (-3, -3) on the doubled grid is pixel (0, 0).
        consume(&mut om, Vec3::new(-0.75, -0.75, 0.0), Vec3::ONE);

        assert_eq!(om.color_target().read::<[f32; 3]>(0, 0), [1.0, 1.0, 1.0]);
        assert_eq!(om.depth_target().read::<f32>(0, 0), 0.5);
    }

    #[test]
    fn depth_remap_clamps_out_of_range_z() {
        let mut om = OutputMerger::new();
        om.resize(2, 2);

        consume(&mut om, Vec3::new(-0.5, -0.5, -3.0), Vec3::ONE);
        assert_eq!(om.depth_target().read::<f32>(0, 0), 1.0);
    }
}
