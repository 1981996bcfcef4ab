//! Primitive binary layout reader
//!
//! Decodes scalars, fixed-length strings and homogeneous arrays (real or
//! complex-paired) out of an in-memory byte buffer. Every read is bounds
//! checked against the buffer and never panics on short input.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use num_complex::{Complex32, Complex64};

use crate::error::{NmrError, Result};

/// Byte order of a binary record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

impl Endianness {
    pub fn from_big_flag(big_endian: bool) -> Self {
        if big_endian {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    pub fn is_big(self) -> bool {
        self == Endianness::Big
    }
}

/// Element types understood by the reader.
///
/// `Text` and `Bytes` carry their fixed length in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Text(usize),
    Bytes(usize),
}

impl PrimitiveType {
    /// Resolve a type by name (`"int16"`, `"float64"`, `"string"`, ...).
    /// `len` is only used by `string` and `byte`.
    pub fn from_name(name: &str, len: usize) -> Result<Self> {
        let ty = match name {
            "int8" => PrimitiveType::I8,
            "int16" => PrimitiveType::I16,
            "int32" => PrimitiveType::I32,
            "int64" => PrimitiveType::I64,
            "uint8" => PrimitiveType::U8,
            "uint16" => PrimitiveType::U16,
            "uint32" => PrimitiveType::U32,
            "uint64" => PrimitiveType::U64,
            "float32" => PrimitiveType::F32,
            "float64" => PrimitiveType::F64,
            "string" => PrimitiveType::Text(len),
            "byte" => PrimitiveType::Bytes(len.max(1)),
            other => return Err(NmrError::UnsupportedType(other.to_string())),
        };
        Ok(ty)
    }

    /// Width of one element in bytes
    pub fn size(self) -> usize {
        match self {
            PrimitiveType::I8 | PrimitiveType::U8 => 1,
            PrimitiveType::I16 | PrimitiveType::U16 => 2,
            PrimitiveType::I32 | PrimitiveType::U32 | PrimitiveType::F32 => 4,
            PrimitiveType::I64 | PrimitiveType::U64 | PrimitiveType::F64 => 8,
            PrimitiveType::Text(n) | PrimitiveType::Bytes(n) => n,
        }
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            PrimitiveType::U8 | PrimitiveType::U16 | PrimitiveType::U32 | PrimitiveType::U64
        )
    }

    fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveType::Text(_) | PrimitiveType::Bytes(_))
    }

    /// 64-bit primitives pair into double-precision complex values,
    /// everything narrower into single precision.
    fn pairs_to_double(self) -> bool {
        matches!(self, PrimitiveType::I64 | PrimitiveType::F64)
    }
}

/// A single decoded value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::UInt(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(*v),
            Scalar::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Scalar::UInt(v) => Some(*v),
            Scalar::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Scalar::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// How consecutive primitives are combined into complex samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing {
    /// Plain real array, no pairing
    None,
    /// (re, im) pairs
    RealFirst,
    /// (im, re) pairs
    ImaginaryFirst,
}

/// Result of an array read, with the complex promotion already applied
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Real(Vec<Scalar>),
    Single(Vec<Complex32>),
    Double(Vec<Complex64>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Real(v) => v.len(),
            ArrayData::Single(v) => v.len(),
            ArrayData::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widen a complex array to double precision.
    pub fn into_complex64(self) -> Result<Vec<Complex64>> {
        match self {
            ArrayData::Single(v) => Ok(v
                .into_iter()
                .map(|c| Complex64::new(c.re as f64, c.im as f64))
                .collect()),
            ArrayData::Double(v) => Ok(v),
            ArrayData::Real(_) => Err(NmrError::UnsupportedType(
                "real array requested as complex".into(),
            )),
        }
    }

    /// Numeric values of a real array as f64.
    pub fn into_f64(self) -> Result<Vec<f64>> {
        match self {
            ArrayData::Real(v) => v
                .iter()
                .map(|s| {
                    s.as_f64().ok_or_else(|| {
                        NmrError::UnsupportedType("non-numeric array element".into())
                    })
                })
                .collect(),
            _ => Err(NmrError::UnsupportedType(
                "complex array requested as real".into(),
            )),
        }
    }
}

// ─── Bounds ────────────────────────────────────────────────────────────────

fn window(buf: &[u8], offset: usize, needed: usize) -> Result<&[u8]> {
    let truncated = || NmrError::TruncatedData {
        offset,
        needed,
        available: buf.len(),
    };
    let end = offset.checked_add(needed).ok_or_else(truncated)?;
    buf.get(offset..end).ok_or_else(truncated)
}

fn text_until_nul(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

// ─── Decoding ──────────────────────────────────────────────────────────────

fn decode<B: ByteOrder>(bytes: &[u8], ty: PrimitiveType) -> Scalar {
    match ty {
        PrimitiveType::I8 => Scalar::Int(bytes[0] as i8 as i64),
        PrimitiveType::I16 => Scalar::Int(B::read_i16(bytes) as i64),
        PrimitiveType::I32 => Scalar::Int(B::read_i32(bytes) as i64),
        PrimitiveType::I64 => Scalar::Int(B::read_i64(bytes)),
        PrimitiveType::U8 => Scalar::UInt(bytes[0] as u64),
        PrimitiveType::U16 => Scalar::UInt(B::read_u16(bytes) as u64),
        PrimitiveType::U32 => Scalar::UInt(B::read_u32(bytes) as u64),
        PrimitiveType::U64 => Scalar::UInt(B::read_u64(bytes)),
        PrimitiveType::F32 => Scalar::Float(B::read_f32(bytes) as f64),
        PrimitiveType::F64 => Scalar::Float(B::read_f64(bytes)),
        PrimitiveType::Text(_) => Scalar::Text(text_until_nul(bytes)),
        PrimitiveType::Bytes(_) => Scalar::Bytes(bytes.to_vec()),
    }
}

/// Numeric element as f64; text and byte types never reach here.
fn decode_f64<B: ByteOrder>(bytes: &[u8], ty: PrimitiveType) -> f64 {
    match ty {
        PrimitiveType::I8 => bytes[0] as i8 as f64,
        PrimitiveType::I16 => B::read_i16(bytes) as f64,
        PrimitiveType::I32 => B::read_i32(bytes) as f64,
        PrimitiveType::I64 => B::read_i64(bytes) as f64,
        PrimitiveType::F32 => B::read_f32(bytes) as f64,
        PrimitiveType::F64 => B::read_f64(bytes),
        _ => 0.0,
    }
}

fn decode_f32<B: ByteOrder>(bytes: &[u8], ty: PrimitiveType) -> f32 {
    match ty {
        PrimitiveType::I8 => bytes[0] as i8 as f32,
        PrimitiveType::I16 => B::read_i16(bytes) as f32,
        PrimitiveType::I32 => B::read_i32(bytes) as f32,
        PrimitiveType::F32 => B::read_f32(bytes),
        _ => decode_f64::<B>(bytes, ty) as f32,
    }
}

fn read_pairs<B: ByteOrder>(raw: &[u8], ty: PrimitiveType, pairing: Pairing) -> ArrayData {
    let size = ty.size();
    let swap = pairing == Pairing::ImaginaryFirst;
    let pairs = raw.chunks_exact(2 * size);

    if ty.pairs_to_double() {
        ArrayData::Double(
            pairs
                .map(|p| {
                    let a = decode_f64::<B>(&p[..size], ty);
                    let b = decode_f64::<B>(&p[size..], ty);
                    if swap {
                        Complex64::new(b, a)
                    } else {
                        Complex64::new(a, b)
                    }
                })
                .collect(),
        )
    } else {
        ArrayData::Single(
            pairs
                .map(|p| {
                    let a = decode_f32::<B>(&p[..size], ty);
                    let b = decode_f32::<B>(&p[size..], ty);
                    if swap {
                        Complex32::new(b, a)
                    } else {
                        Complex32::new(a, b)
                    }
                })
                .collect(),
        )
    }
}

fn read_real<B: ByteOrder>(raw: &[u8], ty: PrimitiveType) -> ArrayData {
    let size = ty.size().max(1);
    ArrayData::Real(raw.chunks_exact(size).map(|c| decode::<B>(c, ty)).collect())
}

/// Read one scalar at `offset`.
pub fn read_scalar(
    buf: &[u8],
    offset: usize,
    endian: Endianness,
    ty: PrimitiveType,
) -> Result<Scalar> {
    let bytes = window(buf, offset, ty.size())?;
    Ok(match endian {
        Endianness::Big => decode::<BigEndian>(bytes, ty),
        Endianness::Little => decode::<LittleEndian>(bytes, ty),
    })
}

/// Read `count` elements starting at `offset`.
///
/// With a pairing, `count` is the number of complex samples and twice as
/// many primitives are consumed.
pub fn read_array(
    buf: &[u8],
    offset: usize,
    count: usize,
    ty: PrimitiveType,
    pairing: Pairing,
    endian: Endianness,
) -> Result<ArrayData> {
    let paired = pairing != Pairing::None;
    if paired && !ty.is_numeric() {
        return Err(NmrError::UnsupportedType(format!(
            "{:?} cannot be read as complex pairs",
            ty
        )));
    }
    if paired && ty.is_unsigned() {
        return Err(NmrError::UnsupportedType(format!(
            "complex pairs of unsigned {:?} are not supported",
            ty
        )));
    }

    let elements = if paired { count.saturating_mul(2) } else { count };
    let needed = elements.saturating_mul(ty.size());
    let raw = window(buf, offset, needed)?;

    Ok(match (endian, paired) {
        (Endianness::Big, true) => read_pairs::<BigEndian>(raw, ty, pairing),
        (Endianness::Little, true) => read_pairs::<LittleEndian>(raw, ty, pairing),
        (Endianness::Big, false) => read_real::<BigEndian>(raw, ty),
        (Endianness::Little, false) => read_real::<LittleEndian>(raw, ty),
    })
}

// ─── Convenience readers used by the vendor headers ────────────────────────

pub fn read_i16(buf: &[u8], offset: usize, endian: Endianness) -> Result<i16> {
    let b = window(buf, offset, 2)?;
    Ok(match endian {
        Endianness::Big => BigEndian::read_i16(b),
        Endianness::Little => LittleEndian::read_i16(b),
    })
}

pub fn read_u16(buf: &[u8], offset: usize, endian: Endianness) -> Result<u16> {
    let b = window(buf, offset, 2)?;
    Ok(match endian {
        Endianness::Big => BigEndian::read_u16(b),
        Endianness::Little => LittleEndian::read_u16(b),
    })
}

pub fn read_i32(buf: &[u8], offset: usize, endian: Endianness) -> Result<i32> {
    let b = window(buf, offset, 4)?;
    Ok(match endian {
        Endianness::Big => BigEndian::read_i32(b),
        Endianness::Little => LittleEndian::read_i32(b),
    })
}

pub fn read_u32(buf: &[u8], offset: usize, endian: Endianness) -> Result<u32> {
    let b = window(buf, offset, 4)?;
    Ok(match endian {
        Endianness::Big => BigEndian::read_u32(b),
        Endianness::Little => LittleEndian::read_u32(b),
    })
}

pub fn read_f32(buf: &[u8], offset: usize, endian: Endianness) -> Result<f32> {
    let b = window(buf, offset, 4)?;
    Ok(match endian {
        Endianness::Big => BigEndian::read_f32(b),
        Endianness::Little => LittleEndian::read_f32(b),
    })
}

pub fn read_f64(buf: &[u8], offset: usize, endian: Endianness) -> Result<f64> {
    let b = window(buf, offset, 8)?;
    Ok(match endian {
        Endianness::Big => BigEndian::read_f64(b),
        Endianness::Little => LittleEndian::read_f64(b),
    })
}

pub fn read_u8(buf: &[u8], offset: usize) -> Result<u8> {
    Ok(window(buf, offset, 1)?[0])
}

/// Fixed-length text field, cut at the first NUL.
pub fn read_text(buf: &[u8], offset: usize, len: usize) -> Result<String> {
    Ok(text_until_nul(window(buf, offset, len)?))
}
