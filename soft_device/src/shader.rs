//! The shader collaborator contract and the stage that wraps a program as a
//! pipeline component.
//!
//! A shader declares three symbol sections: Input, Output and Constant. The
//! pipeline materialises them into a per-instance [`ShaderContext`] the
//! program reads and writes during execution; nothing shader-visible lives
//! in process-wide storage.

use bytemuck::{bytes_of, pod_read_unaligned, Pod};
use thiserror::Error;

use crate::layout::SchemaError;
use crate::semantic::Semantic;
use crate::stage::{PortInput, PortList, PortOutput, Stage, StageCounters, StageError, StageMode};
use crate::texture::{Sampler2d, Texture2d};
use crate::types::{ScalarType, TypeError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShaderError {
    #[error("unknown shader symbol {0:?}")]
    UnknownSymbol(String),
    #[error("symbol {name:?} is not a {expected:?}")]
    SymbolKind {
        name: String,
        expected: ScalarType,
    },
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// One entry of a shader's symbol table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSymbol {
    pub name: String,
    pub ty: ScalarType,
    pub semantic: Semantic,
}

impl ShaderSymbol {
    pub fn new(name: impl Into<String>, ty: ScalarType, semantic: Semantic) -> Self {
        Self {
            name: name.into(),
            ty,
            semantic,
        }
    }

    /// Constants carry no semantic; they are bound by name.
    pub fn constant(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::new(name, ty, Semantic::NONE)
    }
}

/// The declared interface of a shader program.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShaderSignature {
    pub inputs: Vec<ShaderSymbol>,
    pub outputs: Vec<ShaderSymbol>,
    pub constants: Vec<ShaderSymbol>,
}

/// A shader program: a signature plus a zero-argument entry point that works
/// entirely through the [`ShaderContext`] it is handed.
pub trait ShaderProgram {
    fn signature(&self) -> ShaderSignature;

    fn execute(&self, ctx: &mut ShaderContext);
}

#[derive(Clone, Debug)]
struct Slot {
    name: String,
    ty: ScalarType,
    offset: usize,
    width: usize,
}

#[derive(Clone, Debug, Default)]
struct Section {
    slots: Vec<Slot>,
    block: Vec<u8>,
}

impl Section {
    fn build(symbols: &[ShaderSymbol]) -> Result<Self, SchemaError> {
        let mut slots = Vec::with_capacity(symbols.len());
        let mut offset = 0;

        for symbol in symbols {
            // Resources occupy no bytes in the block; they live in the
            // context's resource slots instead.
            let width = if symbol.ty.is_resource() {
                0
            } else {
                symbol.ty.size()?
            };

            slots.push(Slot {
                name: symbol.name.clone(),
                ty: symbol.ty,
                offset,
                width,
            });
            offset += width;
        }

        Ok(Self {
            slots,
            block: vec![0; offset],
        })
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    fn bytes(&self, index: usize) -> &[u8] {
        let slot = &self.slots[index];
        &self.block[slot.offset..slot.offset + slot.width]
    }

    fn bytes_mut(&mut self, index: usize) -> &mut [u8] {
        let slot = &self.slots[index];
        &mut self.block[slot.offset..slot.offset + slot.width]
    }

    fn read<T: Pod>(&self, index: usize) -> Result<T, TypeError> {
        let bytes = self.bytes(index);
        if bytes.len() != size_of::<T>() {
            return Err(TypeError::SizeMismatch {
                expected: bytes.len(),
                found: size_of::<T>(),
            });
        }
        Ok(pod_read_unaligned(bytes))
    }

    fn write<T: Pod>(&mut self, index: usize, value: T) -> Result<(), TypeError> {
        let bytes = self.bytes_mut(index);
        if bytes.len() != size_of::<T>() {
            return Err(TypeError::SizeMismatch {
                expected: bytes.len(),
                found: size_of::<T>(),
            });
        }
        bytes.copy_from_slice(bytes_of(&value));
        Ok(())
    }
}

/// Per-shader-instance storage for inputs, outputs and constants.
///
/// The pipeline copies bound port bytes into the input slots before each
/// invocation and copies the output slots back afterwards. Hosts bind
/// numeric constants by name; texture and sampler constants live in
/// dedicated resource slots alongside the byte block.
#[derive(Clone, Debug, Default)]
pub struct ShaderContext {
    inputs: Section,
    outputs: Section,
    constants: Section,
    textures: Vec<Option<Texture2d>>,
    samplers: Vec<Option<Sampler2d>>,
}

impl ShaderContext {
    pub fn new(signature: &ShaderSignature) -> Result<Self, SchemaError> {
        let constants = Section::build(&signature.constants)?;
        let textures = vec![None; constants.slots.len()];
        let samplers = vec![None; constants.slots.len()];

        Ok(Self {
            inputs: Section::build(&signature.inputs)?,
            outputs: Section::build(&signature.outputs)?,
            constants,
            textures,
            samplers,
        })
    }

    /// Reads input slot `index` as `T`. The slot width must match exactly.
    pub fn input<T: Pod>(&self, index: usize) -> T {
        match self.inputs.read(index) {
            Ok(value) => value,
            Err(err) => panic!("shader input {index}: {err}"),
        }
    }

    /// Writes output slot `index`.
    pub fn set_output<T: Pod>(&mut self, index: usize, value: T) {
        if let Err(err) = self.outputs.write(index, value) {
            panic!("shader output {index}: {err}");
        }
    }

    /// Reads constant slot `index` as `T`.
    pub fn constant<T: Pod>(&self, index: usize) -> T {
        match self.constants.read(index) {
            Ok(value) => value,
            Err(err) => panic!("shader constant {index}: {err}"),
        }
    }

    pub fn texture(&self, index: usize) -> Option<&Texture2d> {
        self.textures.get(index)?.as_ref()
    }

    pub fn sampler(&self, index: usize) -> Option<Sampler2d> {
        *self.samplers.get(index)?
    }

    pub fn constant_position(&self, name: &str) -> Option<usize> {
        self.constants.position(name)
    }

    /// Binds a numeric constant by symbol name (the host-facing side of the
    /// Constant section).
    pub fn set_constant<T: Pod>(&mut self, name: &str, value: T) -> Result<(), ShaderError> {
        let index = self
            .constants
            .position(name)
            .ok_or_else(|| ShaderError::UnknownSymbol(name.into()))?;

        self.constants.write(index, value)?;
        Ok(())
    }

    pub fn set_texture(&mut self, name: &str, texture: Texture2d) -> Result<(), ShaderError> {
        let index = self
            .constants
            .position(name)
            .ok_or_else(|| ShaderError::UnknownSymbol(name.into()))?;

        if self.constants.slots[index].ty != ScalarType::Texture2D {
            return Err(ShaderError::SymbolKind {
                name: name.into(),
                expected: ScalarType::Texture2D,
            });
        }

        self.textures[index] = Some(texture);
        Ok(())
    }

    pub fn set_sampler(&mut self, name: &str, sampler: Sampler2d) -> Result<(), ShaderError> {
        let index = self
            .constants
            .position(name)
            .ok_or_else(|| ShaderError::UnknownSymbol(name.into()))?;

        if self.constants.slots[index].ty != ScalarType::Sampler2D {
            return Err(ShaderError::SymbolKind {
                name: name.into(),
                expected: ScalarType::Sampler2D,
            });
        }

        self.samplers[index] = Some(sampler);
        Ok(())
    }
}

/// Pipeline stage wrapping an attached [`ShaderProgram`]. Ports are rebuilt
/// from the program's signature on attach; each `run_one` call shuttles one
/// record through the program.
pub struct ShaderStage {
    label: &'static str,
    inputs: PortList,
    outputs: PortList,
    counters: StageCounters,
    program: Option<Box<dyn ShaderProgram>>,
    context: ShaderContext,
}

impl ShaderStage {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            inputs: PortList::new(),
            outputs: PortList::new(),
            counters: StageCounters::default(),
            program: None,
            context: ShaderContext::default(),
        }
    }

    /// Attaches a program, replacing any previous one. All ports are
    /// cleared and re-derived from the program's Input and Output sections.
    pub fn attach(&mut self, program: Box<dyn ShaderProgram>) -> Result<(), SchemaError> {
        let signature = program.signature();

        let mut inputs = PortList::new();
        for symbol in &signature.inputs {
            inputs.add(symbol.name.clone(), symbol.ty, symbol.semantic)?;
        }

        let mut outputs = PortList::new();
        for symbol in &signature.outputs {
            outputs.add(symbol.name.clone(), symbol.ty, symbol.semantic)?;
        }

        self.context = ShaderContext::new(&signature)?;
        self.inputs = inputs;
        self.outputs = outputs;
        self.program = Some(program);

        tracing::debug!(
            stage = self.label,
            inputs = self.inputs.len(),
            outputs = self.outputs.len(),
            "attached shader program"
        );

        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.program.is_some()
    }

    pub fn context(&self) -> &ShaderContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ShaderContext {
        &mut self.context
    }
}

impl std::fmt::Debug for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderStage")
            .field("label", &self.label)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("attached", &self.program.is_some())
            .finish_non_exhaustive()
    }
}

impl Stage for ShaderStage {
    fn label(&self) -> &'static str {
        self.label
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
        let Self {
            inputs,
            outputs,
            program,
            context,
            ..
        } = self;
        let program = program.as_deref().ok_or(StageError::NoProgram)?;

        // Bound ports feed the shader's input slots; unbound optional ports
        // leave their slot zeroed.
        for (location, port) in inputs.iter().enumerate() {
            if let Some(bytes) = input.bytes(location) {
                if bytes.len() < port.width {
                    return Err(StageError::Type(TypeError::SizeMismatch {
                        expected: port.width,
                        found: bytes.len(),
                    }));
                }
                context
                    .inputs
                    .bytes_mut(location)
                    .copy_from_slice(&bytes[..port.width]);
            }
        }

        program.execute(context);

        for (location, _) in outputs.iter().enumerate() {
            output.write_bytes(location, context.outputs.bytes(location))?;
        }

        Ok(())
    }
}
