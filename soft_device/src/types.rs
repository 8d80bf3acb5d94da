//! The closed set of scalar types a port, channel or shader symbol can
//! carry, and the barycentric blend that runs over raw record bytes.

use bytemuck::{bytes_of, pod_read_unaligned, Pod};
use glam::{Mat4, Vec2, Vec3, Vec4};
use thiserror::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Float,
    Float2,
    Float3,
    Float4,
    Float4x4,
    Half,
    Double,
    Int,
    Uint,
    Sampler2D,
    Texture2D,
}

impl ScalarType {
    /// Byte width of a value of this type inside a packed record.
    ///
    /// `Half` is reserved but carries no arithmetic; `Sampler2D` and
    /// `Texture2D` are opaque resources and never enter a record. All three
    /// fail here, which is what rejects them at schema registration.
    pub fn size(self) -> Result<usize, TypeError> {
        match self {
            Self::Float => Ok(4),
            Self::Float2 => Ok(8),
            Self::Float3 => Ok(12),
            Self::Float4 => Ok(16),
            Self::Float4x4 => Ok(64),
            Self::Double => Ok(8),
            Self::Int | Self::Uint => Ok(4),
            Self::Half | Self::Sampler2D | Self::Texture2D => Err(TypeError::Unsized(self)),
        }
    }

    /// `true` for the resource types that live in a shader's resource slots
    /// rather than its constant block.
    pub const fn is_resource(self) -> bool {
        matches!(self, Self::Sampler2D | Self::Texture2D)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("type {0:?} has no defined byte width")]
    Unsized(ScalarType),
    #[error("type {0:?} cannot be interpolated")]
    NotInterpolable(ScalarType),
    #[error("value size mismatch: expected {expected} bytes, found {found}")]
    SizeMismatch { expected: usize, found: usize },
}

fn check_len(expected: usize, bytes: &[u8]) -> Result<(), TypeError> {
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(TypeError::SizeMismatch {
            expected,
            found: bytes.len(),
        })
    }
}

fn blend2<T: Pod>(out: &mut [u8], a: &[u8], b: &[u8], f: impl FnOnce(T, T) -> T) {
    let a = pod_read_unaligned::<T>(a);
    let b = pod_read_unaligned::<T>(b);
    out.copy_from_slice(bytes_of(&f(a, b)));
}

fn blend3<T: Pod>(out: &mut [u8], a: &[u8], b: &[u8], c: &[u8], f: impl FnOnce(T, T, T) -> T) {
    let a = pod_read_unaligned::<T>(a);
    let b = pod_read_unaligned::<T>(b);
    let c = pod_read_unaligned::<T>(c);
    out.copy_from_slice(bytes_of(&f(a, b, c)));
}

/// Writes `a·u + b·v` into `out`, reading all operands as `ty`.
///
/// The three slices must all be exactly `ty.size()` bytes; record fields are
/// packed, so reads go through unaligned loads.
pub fn interpolate_inplace(
    ty: ScalarType,
    out: &mut [u8],
    a: &[u8],
    u: f32,
    b: &[u8],
    v: f32,
) -> Result<(), TypeError> {
    let width = interpolable_size(ty)?;
    check_len(width, out)?;
    check_len(width, a)?;
    check_len(width, b)?;

    match ty {
        ScalarType::Float => blend2::<f32>(out, a, b, |a, b| a * u + b * v),
        ScalarType::Float2 => blend2::<Vec2>(out, a, b, |a, b| a * u + b * v),
        ScalarType::Float3 => blend2::<Vec3>(out, a, b, |a, b| a * u + b * v),
        ScalarType::Float4 => blend2::<Vec4>(out, a, b, |a, b| a * u + b * v),
        ScalarType::Float4x4 => blend2::<Mat4>(out, a, b, |a, b| a * u + b * v),
        ScalarType::Double => blend2::<f64>(out, a, b, |a, b| a * f64::from(u) + b * f64::from(v)),
        ScalarType::Int => blend2::<i32>(out, a, b, |a, b| (a as f32 * u + b as f32 * v) as i32),
        ScalarType::Uint => blend2::<u32>(out, a, b, |a, b| (a as f32 * u + b as f32 * v) as u32),
        ScalarType::Half | ScalarType::Sampler2D | ScalarType::Texture2D => unreachable!(),
    }

    Ok(())
}

/// Writes `a·u + b·v + c·w` into `out`; the three-operand form used for
/// barycentric attribute interpolation.
pub fn interpolate_inplace3(
    ty: ScalarType,
    out: &mut [u8],
    a: &[u8],
    u: f32,
    b: &[u8],
    v: f32,
    c: &[u8],
    w: f32,
) -> Result<(), TypeError> {
    let width = interpolable_size(ty)?;
    check_len(width, out)?;
    check_len(width, a)?;
    check_len(width, b)?;
    check_len(width, c)?;

    match ty {
        ScalarType::Float => blend3::<f32>(out, a, b, c, |a, b, c| a * u + b * v + c * w),
        ScalarType::Float2 => blend3::<Vec2>(out, a, b, c, |a, b, c| a * u + b * v + c * w),
        ScalarType::Float3 => blend3::<Vec3>(out, a, b, c, |a, b, c| a * u + b * v + c * w),
        ScalarType::Float4 => blend3::<Vec4>(out, a, b, c, |a, b, c| a * u + b * v + c * w),
        ScalarType::Float4x4 => blend3::<Mat4>(out, a, b, c, |a, b, c| a * u + b * v + c * w),
        ScalarType::Double => blend3::<f64>(out, a, b, c, |a, b, c| {
            a * f64::from(u) + b * f64::from(v) + c * f64::from(w)
        }),
        ScalarType::Int => blend3::<i32>(out, a, b, c, |a, b, c| {
            (a as f32 * u + b as f32 * v + c as f32 * w) as i32
        }),
        ScalarType::Uint => blend3::<u32>(out, a, b, c, |a, b, c| {
            (a as f32 * u + b as f32 * v + c as f32 * w) as u32
        }),
        ScalarType::Half | ScalarType::Sampler2D | ScalarType::Texture2D => unreachable!(),
    }

    Ok(())
}

fn interpolable_size(ty: ScalarType) -> Result<usize, TypeError> {
    match ty {
        ScalarType::Half | ScalarType::Sampler2D | ScalarType::Texture2D => {
            Err(TypeError::NotInterpolable(ty))
        }
        _ => ty.size(),
    }
}

#[cfg(test)]
mod tests {
    use bytemuck::{bytes_of, pod_read_unaligned};
    use glam::Vec3;

    use super::{interpolate_inplace, interpolate_inplace3, ScalarType, TypeError};

    #[test]
    fn scalar_sizes() {
        assert_eq!(ScalarType::Float.size(), Ok(4));
        assert_eq!(ScalarType::Float3.size(), Ok(12));
        assert_eq!(ScalarType::Float4x4.size(), Ok(64));
        assert_eq!(
            ScalarType::Half.size(),
            Err(TypeError::Unsized(ScalarType::Half))
        );
    }

    #[test]
    fn interpolate_vec3_triple() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::new(0.0, 1.0, 0.0);
        let c = Vec3::new(0.0, 0.0, 1.0);
        let mut out = [0u8; 12];

        interpolate_inplace3(
            ScalarType::Float3,
            &mut out,
            bytes_of(&a),
            0.25,
            bytes_of(&b),
            0.25,
            bytes_of(&c),
            0.5,
        )
        .unwrap();

        assert_eq!(pod_read_unaligned::<Vec3>(&out), Vec3::new(0.25, 0.25, 0.5));
    }

    #[test]
    fn interpolate_float_pair() {
        let mut out = [0u8; 4];
        interpolate_inplace(
            ScalarType::Float,
            &mut out,
            bytes_of(&2.0f32),
            0.5,
            bytes_of(&4.0f32),
            0.5,
        )
        .unwrap();
        assert_eq!(pod_read_unaligned::<f32>(&out), 3.0);
    }

    #[test]
    fn interpolate_rejects_half() {
        let mut out = [0u8; 2];
        let err = interpolate_inplace(ScalarType::Half, &mut out, &[0; 2], 0.5, &[0; 2], 0.5);
        assert_eq!(err, Err(TypeError::NotInterpolable(ScalarType::Half)));
    }

    #[test]
    fn interpolate_rejects_size_mismatch() {
        let mut out = [0u8; 4];
        let err = interpolate_inplace(ScalarType::Float, &mut out, &[0; 8], 0.5, &[0; 4], 0.5);
        assert_eq!(
            err,
            Err(TypeError::SizeMismatch {
                expected: 4,
                found: 8
            })
        );
    }
}
