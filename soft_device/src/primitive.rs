//! Primitive assembly. Triangle lists only: indices pass through unchanged
//! in groups the rasterizer reassembles, so the stage is a one-in-one-out
//! copy of the `SV_VertexIndex` channel.

use crate::semantic::Semantic;
use crate::stage::{PortInput, PortList, PortOutput, Stage, StageCounters, StageError, StageMode};
use crate::types::ScalarType;

#[derive(Debug)]
pub struct PrimitiveAssembler {
    inputs: PortList,
    outputs: PortList,
    counters: StageCounters,
}

impl PrimitiveAssembler {
    pub fn new() -> Self {
        let mut inputs = PortList::new();
        inputs
            .add("index", ScalarType::Uint, Semantic::SV_VERTEX_INDEX)
            .expect("empty port list");

        let mut outputs = PortList::new();
        outputs
            .add("index", ScalarType::Uint, Semantic::SV_VERTEX_INDEX)
            .expect("empty port list");

        Self {
            inputs,
            outputs,
            counters: StageCounters::default(),
        }
    }
}

impl Default for PrimitiveAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for PrimitiveAssembler {
    fn label(&self) -> &'static str {
        "primitive-assembler"
    }

    fn mode(&self) -> StageMode {
        StageMode::OneToOne
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

    fn run_one(&mut self, input: &PortInput<'_>, output: &mut PortOutput<'_>) -> Result<(), StageError> {
        let index: u32 = input.read(0)?;
        output.write(0, index)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::PrimitiveAssembler;
    use crate::semantic::Semantic;
    use crate::stage::Stage;

    #[test]
    fn ports_carry_the_vertex_index_semantic() {
        let pa = PrimitiveAssembler::new();
        assert_eq!(pa.input_ports().len(), 1);
        assert_eq!(pa.output_ports().len(), 1);
        assert_eq!(
            pa.input_ports().get(0).unwrap().semantic,
            Semantic::SV_VERTEX_INDEX
        );
        assert!(pa.input_ports().get(0).unwrap().is_required());
    }
}
