//! Semantics name the *role* of a value flowing through the pipeline.
//!
//! Stages are wired together by matching semantics between ports and stream
//! channels instead of by position, so a pixel shader can declare any subset
//! of the attributes the vertex shader emits, in any order.

use std::fmt::{self, Display, Formatter};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SemanticName {
    Invalid,
    Position,
    Color,
    Normal,
    Texcoord,
    SystemValue,
}

/// A `(name, index)` pair identifying a port or stream channel.
///
/// Semantics with [`SemanticName::SystemValue`] mark values the pipeline
/// itself consumes; a port carrying one is *required* and must resolve to a
/// channel when the stage is bound to a stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Semantic {
    pub name: SemanticName,
    pub index: u32,
}

impl Semantic {
    pub const NONE: Self = Self::new(SemanticName::Invalid, 0);

    pub const POSITION0: Self = Self::new(SemanticName::Position, 0);
    pub const POSITION1: Self = Self::new(SemanticName::Position, 1);
    pub const POSITION2: Self = Self::new(SemanticName::Position, 2);
    pub const POSITION3: Self = Self::new(SemanticName::Position, 3);

    pub const COLOR0: Self = Self::new(SemanticName::Color, 0);
    pub const COLOR1: Self = Self::new(SemanticName::Color, 1);
    pub const COLOR2: Self = Self::new(SemanticName::Color, 2);
    pub const COLOR3: Self = Self::new(SemanticName::Color, 3);

    pub const NORMAL0: Self = Self::new(SemanticName::Normal, 0);
    pub const NORMAL1: Self = Self::new(SemanticName::Normal, 1);
    pub const NORMAL2: Self = Self::new(SemanticName::Normal, 2);
    pub const NORMAL3: Self = Self::new(SemanticName::Normal, 3);

    pub const TEXCOORD0: Self = Self::new(SemanticName::Texcoord, 0);
    pub const TEXCOORD1: Self = Self::new(SemanticName::Texcoord, 1);
    pub const TEXCOORD2: Self = Self::new(SemanticName::Texcoord, 2);
    pub const TEXCOORD3: Self = Self::new(SemanticName::Texcoord, 3);

    /// Clip-space position, output of the vertex shader, consumed by the
    /// rasterizer.
    pub const SV_POSITION: Self = Self::new(SemanticName::SystemValue, 1);
    /// Depth value, consumed by the depth test.
    pub const SV_DEPTH: Self = Self::new(SemanticName::SystemValue, 2);
    /// Pixel color, output of the pixel shader.
    pub const SV_TARGET: Self = Self::new(SemanticName::SystemValue, 3);
    /// Vertex index, output of the primitive assembler.
    pub const SV_VERTEX_INDEX: Self = Self::new(SemanticName::SystemValue, 4);

    pub const fn new(name: SemanticName, index: u32) -> Self {
        Self { name, index }
    }

    /// System-value semantics mark required ports.
    pub const fn is_system_value(&self) -> bool {
        matches!(self.name, SemanticName::SystemValue)
    }
}

impl Default for Semantic {
    fn default() -> Self {
        Self::NONE
    }
}

impl Display for Semantic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Self::SV_POSITION => write!(f, "SV_Position"),
            Self::SV_DEPTH => write!(f, "SV_Depth"),
            Self::SV_TARGET => write!(f, "SV_Target"),
            Self::SV_VERTEX_INDEX => write!(f, "SV_VertexIndex"),
            Self { name, index } => write!(f, "{:?}{}", name, index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Semantic;

    #[test]
    fn semantic_equality_is_pairwise() {
        assert_eq!(Semantic::POSITION0, Semantic::POSITION0);
        assert_ne!(Semantic::POSITION0, Semantic::POSITION1);
        assert_ne!(Semantic::POSITION0, Semantic::COLOR0);
        assert_ne!(Semantic::SV_POSITION, Semantic::SV_TARGET);
    }

    #[test]
    fn system_values_are_required() {
        assert!(Semantic::SV_POSITION.is_system_value());
        assert!(Semantic::SV_VERTEX_INDEX.is_system_value());
        assert!(!Semantic::POSITION0.is_system_value());
        assert!(!Semantic::NONE.is_system_value());
    }
}
