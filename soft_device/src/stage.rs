//! The uniform component contract: typed ports, port-to-channel resolution
//! and the two runtime modes the pipeline driver understands.

use bytemuck::{bytes_of, pod_read_unaligned, Pod};
use thiserror::Error;

use crate::layout::SchemaError;
use crate::semantic::Semantic;
use crate::stream::{InputStream, OutputStream, StreamChannels};
use crate::types::{ScalarType, TypeError};

/// A stage's typed input or output slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Port {
    pub name: String,
    pub ty: ScalarType,
    pub semantic: Semantic,
    pub width: usize,
}

impl Port {
    /// Ports tagged with a system-value semantic must resolve to a stream
    /// channel when bound.
    pub fn is_required(&self) -> bool {
        self.semantic.is_system_value()
    }
}

/// Ordered port registry for one direction of a stage. Locations are
/// zero-based insertion indices; semantics are unique within the list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortList {
    ports: Vec<Port>,
}

impl PortList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a port and returns its location.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        ty: ScalarType,
        semantic: Semantic,
    ) -> Result<usize, SchemaError> {
        if self.location_by_semantic(semantic).is_some() {
            return Err(SchemaError::DuplicateSemantic(semantic));
        }

        let width = ty.size()?;
        self.ports.push(Port {
            name: name.into(),
            ty,
            semantic,
            width,
        });

        Ok(self.ports.len() - 1)
    }

    pub fn get(&self, location: usize) -> Option<&Port> {
        self.ports.get(location)
    }

    pub fn location_by_semantic(&self, semantic: Semantic) -> Option<usize> {
        self.ports.iter().position(|p| p.semantic == semantic)
    }

    pub fn location_by_name(&self, name: &str) -> Option<usize> {
        self.ports.iter().position(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn clear(&mut self) {
        self.ports.clear();
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindError {
    #[error("missing required input {0}")]
    MissingRequired(Semantic),
}

#[derive(Copy, Clone, Debug)]
struct BoundPort {
    channel: Option<usize>,
    width: usize,
}

/// Resolution of a port list against a stream's channels.
///
/// A required port without a matching channel fails the resolution; an
/// optional one stays unbound, which makes its reads yield zeroes and its
/// writes no-ops.
#[derive(Clone, Debug)]
pub struct PortBinding {
    slots: Vec<BoundPort>,
}

impl PortBinding {
    pub fn resolve<S>(ports: &PortList, stream: &S) -> Result<Self, BindError>
    where
        S: StreamChannels + ?Sized,
    {
        let mut slots = Vec::with_capacity(ports.len());

        for port in ports.iter() {
            let channel = stream.channel_index(port.semantic);
            if channel.is_none() && port.is_required() {
                return Err(BindError::MissingRequired(port.semantic));
            }

            slots.push(BoundPort {
                channel,
                width: port.width,
            });
        }

        Ok(Self { slots })
    }

    pub fn channel(&self, port: usize) -> Option<usize> {
        self.slots[port].channel
    }
}

/// Input ports bound to the head record of a stream.
#[derive(Copy, Clone)]
pub struct PortInput<'a> {
    binding: &'a PortBinding,
    stream: &'a dyn InputStream,
}

impl<'a> PortInput<'a> {
    pub fn new(binding: &'a PortBinding, stream: &'a dyn InputStream) -> Self {
        Self { binding, stream }
    }

    /// Bytes behind `port`, or `None` when the port is unbound.
    ///
    /// The slice is at least the port's width; adapter-backed streams may
    /// hand out the remainder of their host buffer.
    pub fn bytes(&self, port: usize) -> Option<&'a [u8]> {
        let slot = self.binding.slots[port];
        let channel = slot.channel?;

        let bytes = self.stream.front_channel(channel);
        Some(bytes)
    }

    /// Reads `port` as `T`. Unbound ports read as all-zeroes.
    pub fn read<T: Pod>(&self, port: usize) -> Result<T, TypeError> {
        let slot = self.binding.slots[port];
        if size_of::<T>() != slot.width {
            return Err(TypeError::SizeMismatch {
                expected: slot.width,
                found: size_of::<T>(),
            });
        }

        match self.bytes(port) {
            None => Ok(T::zeroed()),
            Some(bytes) if bytes.len() >= slot.width => {
                Ok(pod_read_unaligned(&bytes[..slot.width]))
            }
            Some(bytes) => Err(TypeError::SizeMismatch {
                expected: slot.width,
                found: bytes.len(),
            }),
        }
    }
}

/// Output ports bound to the most recently claimed record of a stream.
pub struct PortOutput<'a> {
    binding: &'a PortBinding,
    stream: &'a mut dyn OutputStream,
}

impl<'a> PortOutput<'a> {
    pub fn new(binding: &'a PortBinding, stream: &'a mut dyn OutputStream) -> Self {
        Self { binding, stream }
    }

    pub fn bytes_mut(&mut self, port: usize) -> Option<&mut [u8]> {
        let slot = self.binding.slots[port];
        let channel = slot.channel?;
        Some(self.stream.back_channel_mut(channel))
    }

    /// Copies the port's width worth of bytes from `src`. Writes to unbound
    /// ports are skipped.
    pub fn write_bytes(&mut self, port: usize, src: &[u8]) -> Result<(), TypeError> {
        let width = self.binding.slots[port].width;
        if src.len() < width {
            return Err(TypeError::SizeMismatch {
                expected: width,
                found: src.len(),
            });
        }

        if let Some(dst) = self.bytes_mut(port) {
            dst.copy_from_slice(&src[..width]);
        }
        Ok(())
    }

    pub fn write<T: Pod>(&mut self, port: usize, value: T) -> Result<(), TypeError> {
        let width = self.binding.slots[port].width;
        if size_of::<T>() != width {
            return Err(TypeError::SizeMismatch {
                expected: width,
                found: size_of::<T>(),
            });
        }

        self.write_bytes(port, bytes_of(&value))
    }
}

/// How the driver runs a stage.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StageMode {
    /// Exactly one record consumed and one produced per [`Stage::run_one`]
    /// call.
    OneToOne,
    /// Consumption and production are decoupled; the driver fills the stage
    /// until it reports pending output, then drains it.
    Asymmetric,
}

/// Monotonic per-stage record counters, exposed through the pipeline's
/// metrics snapshot.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StageCounters {
    pub consumed: u64,
    pub produced: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StageError {
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error("no shader program attached")]
    NoProgram,
    #[error("vertex data not bound")]
    VertexDataUnbound,
    #[error("vertex index {index} out of bounds for {len} vertices")]
    VertexIndexOutOfBounds { index: u32, len: usize },
    #[error("no pending output to produce")]
    NothingPending,
    #[error("operation not supported in this stage's mode")]
    WrongMode,
}

/// The contract every pipeline stage implements.
///
/// A stage is either [`StageMode::OneToOne`], in which case only
/// [`run_one`] is meaningful, or [`StageMode::Asymmetric`], in which case
/// the driver alternates [`consume_one`] and [`produce_one`] under
/// [`has_pending_output`] back-pressure. The unused half of the contract
/// defaults to [`StageError::WrongMode`].
///
/// [`run_one`]: Stage::run_one
/// [`consume_one`]: Stage::consume_one
/// [`produce_one`]: Stage::produce_one
/// [`has_pending_output`]: Stage::has_pending_output
pub trait Stage {
    fn label(&self) -> &'static str;

    fn mode(&self) -> StageMode;

    fn input_ports(&self) -> &PortList;

    fn output_ports(&self) -> &PortList;

    fn counters(&self) -> &StageCounters;

    fn counters_mut(&mut self) -> &mut StageCounters;

    fn run_one(&mut self, input: &PortInput<'_>, output: &mut PortOutput<'_>) -> Result<(), StageError> {
        let _ = (input, output);
        Err(StageError::WrongMode)
    }

    fn consume_one(&mut self, input: &PortInput<'_>) -> Result<(), StageError> {
        let _ = input;
        Err(StageError::WrongMode)
    }

    fn has_pending_output(&self) -> bool {
        false
    }

    fn produce_one(&mut self, output: &mut PortOutput<'_>) -> Result<(), StageError> {
        let _ = output;
        Err(StageError::WrongMode)
    }
}

#[cfg(test)]
mod tests {
    use super::{BindError, PortBinding, PortInput, PortList};
    use crate::layout::SchemaError;
    use crate::semantic::Semantic;
    use crate::stream::{FifoStream, InputStream, OutputStream};
    use crate::types::ScalarType;

    #[test]
    fn port_locations_are_insertion_ordered() {
        let mut ports = PortList::new();
        let a = ports.add("position", ScalarType::Float3, Semantic::POSITION0).unwrap();
        let b = ports.add("color", ScalarType::Float3, Semantic::COLOR0).unwrap();

        assert_eq!((a, b), (0, 1));
        assert_eq!(ports.location_by_name("color"), Some(1));
        assert_eq!(ports.location_by_semantic(Semantic::POSITION0), Some(0));
        assert_eq!(ports.location_by_name("normal"), None);
    }

    #[test]
    fn duplicate_port_semantic_is_rejected() {
        let mut ports = PortList::new();
        ports.add("a", ScalarType::Float3, Semantic::COLOR0).unwrap();

        assert_eq!(
            ports.add("b", ScalarType::Float4, Semantic::COLOR0),
            Err(SchemaError::DuplicateSemantic(Semantic::COLOR0))
        );
    }

    #[test]
    fn missing_required_channel_fails_resolution() {
        let mut ports = PortList::new();
        ports
            .add("index", ScalarType::Uint, Semantic::SV_VERTEX_INDEX)
            .unwrap();

        let stream = FifoStream::with_channels([(Semantic::COLOR0, ScalarType::Float3)]).unwrap();

        assert_eq!(
            PortBinding::resolve(&ports, &stream).err(),
            Some(BindError::MissingRequired(Semantic::SV_VERTEX_INDEX))
        );
    }

    #[test]
    fn optional_port_binds_unbound_and_reads_zero() {
        let mut ports = PortList::new();
        ports.add("uv", ScalarType::Float2, Semantic::TEXCOORD0).unwrap();

        let mut stream =
            FifoStream::with_channels([(Semantic::COLOR0, ScalarType::Float3)]).unwrap();
        stream.set_capacity(1);
        OutputStream::push(&mut stream).unwrap();

        let binding = PortBinding::resolve(&ports, &stream).unwrap();
        assert_eq!(binding.channel(0), None);

        let input = PortInput::new(&binding, &stream as &dyn InputStream);
        assert_eq!(input.bytes(0), None);
        assert_eq!(input.read::<[f32; 2]>(0).unwrap(), [0.0, 0.0]);
    }

    #[test]
    fn bound_port_reads_channel_bytes() {
        let mut ports = PortList::new();
        ports.add("index", ScalarType::Uint, Semantic::SV_VERTEX_INDEX).unwrap();

        let mut stream =
            FifoStream::with_channels([(Semantic::SV_VERTEX_INDEX, ScalarType::Uint)]).unwrap();
        stream.set_capacity(1);
        stream.push().unwrap().write(0, 42u32).unwrap();

        let binding = PortBinding::resolve(&ports, &stream).unwrap();
        let input = PortInput::new(&binding, &stream as &dyn InputStream);
        assert_eq!(input.read::<u32>(0).unwrap(), 42);
    }
}
