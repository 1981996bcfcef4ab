/// JEOL Delta (.jdf) FID reader
///
/// The 1360-byte file header is always big-endian. Its endian byte then
/// selects the byte order of the parameter section and the data section.
/// 1D quadrature data is stored as all real points followed by all
/// imaginary points.

use std::collections::HashMap;

use num_complex::Complex64;

use crate::data::binary::{self, Endianness, Pairing, PrimitiveType};
use crate::data::spectrum::{ComplexFid, SpectrumInfo, Vendor};
use crate::error::{NmrError, Result};

pub const JEOL_MAGIC: &str = "JEOL.NMR";
/// Standard JEOL header size in bytes.
pub const DELTA_HDR_SIZE: usize = 1360;
/// Maximum number of JEOL dimensions.
pub const JMAXDIM: usize = 8;

const PARAM_HEADER_SIZE: usize = 16;
const PARAM_RECORD_SIZE: usize = 64;
const PARAM_STRLEN: usize = 16;
const PARAM_NAMELEN: usize = 28;

// ─── Data format / axis constants ───────────────────────────────────────────

pub const JEOL_FORMAT_1D: u8 = 1;
pub const JEOL_FORMAT_2D: u8 = 2;
pub const JEOL_FORMAT_SMALL2D: u8 = 12;

pub const JEOL_AXISTYPE_REAL: u8 = 1;
pub const JEOL_AXISTYPE_TPPI: u8 = 2;

// ─── Static lookup tables ───────────────────────────────────────────────────

/// SI unit names indexed by unit code
pub const UNIT_NAMES: [&str; 43] = [
    "None", "Abundance", "Ampere", "Candela", "Celsius", "Coulomb", "Degree",
    "Electronvolt", "Farad", "Sievert", "Gram", "Gray", "Henry", "Hertz",
    "Kelvin", "Joule", "Liter", "Lumen", "Lux", "Meter", "Mole", "Newton",
    "Ohm", "Pascal", "Percent", "Point", "Ppm", "Radian", "Second", "Siemens",
    "Steradian", "Tesla", "Volt", "Watt", "Weber", "Decibel", "Dalton",
    "Thompson", "Ugeneric", "LPercent", "PPT", "PPB", "Index",
];

/// Multiplier of a magnitude prefix code (-8 = yotta .. 7 = zepto)
pub fn prefix_factor(prefix: i8) -> f64 {
    match prefix {
        -8 => 1.0e+24,
        -7 => 1.0e+21,
        -6 => 1.0e+18,
        -5 => 1.0e+15,
        -4 => 1.0e+12,
        -3 => 1.0e+9,
        -2 => 1.0e+6,
        -1 => 1.0e+3,
        1 => 1.0e-3,
        2 => 1.0e-6,
        3 => 1.0e-9,
        4 => 1.0e-12,
        5 => 1.0e-15,
        6 => 1.0e-18,
        7 => 1.0e-21,
        _ => 1.0,
    }
}

/// One of the five unit descriptors attached to a parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JeolUnit {
    pub prefix: i8,
    pub power: i8,
    pub unit_code: u8,
}

impl JeolUnit {
    fn from_bytes(b0: u8, b1: u8) -> Self {
        // both nibbles are signed 4-bit values
        let signed = |nibble: u8| -> i8 {
            let v = (nibble & 0x0F) as i8;
            if v > 7 {
                v - 16
            } else {
                v
            }
        };
        Self {
            prefix: signed(b0 >> 4),
            power: signed(b0),
            unit_code: b1,
        }
    }

    pub fn name(&self) -> &'static str {
        UNIT_NAMES
            .get(self.unit_code as usize)
            .copied()
            .unwrap_or("Unknown")
    }

    /// Scale a raw value to the unprefixed SI unit.
    pub fn to_si(&self, value: f64) -> f64 {
        value * prefix_factor(self.prefix)
    }
}

/// Parameter value discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JeolValueType {
    String,
    Integer,
    Float,
    Complex,
    Infinity,
}

impl JeolValueType {
    fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(JeolValueType::String),
            1 => Some(JeolValueType::Integer),
            2 => Some(JeolValueType::Float),
            3 => Some(JeolValueType::Complex),
            4 => Some(JeolValueType::Infinity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JeolValue {
    Str(String),
    Int(i32),
    Float(f64),
    Complex(Complex64),
    Infinity(i32),
}

/// One 64-byte parameter record
#[derive(Debug, Clone, PartialEq)]
pub struct JeolParam {
    pub name: String,
    pub scale: i16,
    pub units: [JeolUnit; 5],
    pub value: JeolValue,
}

impl JeolParam {
    /// Record layout:
    ///   0-3:   class
    ///   4-5:   unit scale (i16)
    ///   6-15:  units (5 × 2 bytes)
    ///   16-31: value payload
    ///   32-35: value type (u32)
    ///   36-63: name
    fn parse(buf: &[u8], off: usize, endian: Endianness) -> Result<Option<Self>> {
        let raw_name = binary::read_text(buf, off + 36, PARAM_NAMELEN)?;
        let name = raw_name.split(' ').next().unwrap_or_default().to_string();
        let scale = binary::read_i16(buf, off + 4, endian)?;

        let mut units = [JeolUnit::default(); 5];
        for (i, unit) in units.iter_mut().enumerate() {
            let p = off + 6 + 2 * i;
            *unit = JeolUnit::from_bytes(binary::read_u8(buf, p)?, binary::read_u8(buf, p + 1)?);
        }

        let code = binary::read_u32(buf, off + 32, endian)?;
        let Some(value_type) = JeolValueType::from_code(code) else {
            log::debug!("JEOL parameter {:?} has unknown value type {}", name, code);
            return Ok(None);
        };

        let value = match value_type {
            JeolValueType::String => {
                let s = binary::read_text(buf, off + 16, PARAM_STRLEN)?;
                JeolValue::Str(s.trim_end().to_string())
            }
            JeolValueType::Integer => JeolValue::Int(binary::read_i32(buf, off + 16, endian)?),
            JeolValueType::Float => JeolValue::Float(binary::read_f64(buf, off + 16, endian)?),
            JeolValueType::Complex => {
                let a = binary::read_f64(buf, off + 16, endian)?;
                let b = binary::read_f64(buf, off + 24, endian)?;
                if endian.is_big() {
                    JeolValue::Complex(Complex64::new(b, a))
                } else {
                    JeolValue::Complex(Complex64::new(a, b))
                }
            }
            JeolValueType::Infinity => {
                JeolValue::Infinity(binary::read_i32(buf, off + 16, endian)?)
            }
        };

        Ok(Some(Self {
            name,
            scale,
            units,
            value,
        }))
    }

    /// Numeric value in SI base units (prefix of the first unit and the
    /// decimal unit scale applied).
    pub fn si_value(&self) -> Option<f64> {
        let raw = match &self.value {
            JeolValue::Int(i) => *i as f64,
            JeolValue::Float(f) => *f,
            _ => return None,
        };
        let mut val = self.units[0].to_si(raw);
        if self.scale != 0 {
            val *= 10.0f64.powi(self.scale as i32);
        }
        Some(val)
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            JeolValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Parameter section, looked up case-insensitively
#[derive(Debug, Clone, Default)]
pub struct JeolParams {
    by_name: HashMap<String, JeolParam>,
}

impl JeolParams {
    pub fn get(&self, name: &str) -> Option<&JeolParam> {
        self.by_name.get(&name.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn si_value(&self, name: &str) -> Result<f64> {
        let param = self
            .get(name)
            .ok_or_else(|| NmrError::MissingParameter(name.to_string()))?;
        param.si_value().ok_or_else(|| NmrError::InvalidParameter {
            name: name.to_string(),
            value: format!("{:?}", param.value),
        })
    }

    pub fn string(&self, name: &str) -> Result<String> {
        let param = self
            .get(name)
            .ok_or_else(|| NmrError::MissingParameter(name.to_string()))?;
        param
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| NmrError::InvalidParameter {
                name: name.to_string(),
                value: format!("{:?}", param.value),
            })
    }
}

// ─── Header ─────────────────────────────────────────────────────────────────

/// The fields of the Delta header the 1D reader uses
#[derive(Debug, Clone, PartialEq)]
pub struct JeolHeader {
    /// Byte order of the parameter and data sections
    pub endian: Endianness,
    pub major_version: u8,
    pub dim_count: u8,
    pub element_type: PrimitiveType,
    pub data_format: u8,
    pub axis_type: [u8; JMAXDIM],
    pub title: String,
    pub element_number: [u32; JMAXDIM],
    pub param_start: u32,
    pub param_length: u32,
    pub data_start: u32,
    pub data_length: u64,
}

impl JeolHeader {
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let magic = binary::read_text(buf, 0, 8)?;
        if magic != JEOL_MAGIC {
            return Err(NmrError::NotAnNmrFile(format!(
                "JEOL signature expected, found {:?}",
                magic
            )));
        }
        let be = Endianness::Big;

        let endian = Endianness::from_big_flag(binary::read_u8(buf, 8)? == 0);

        // DataType (offset 14): element type in the top 2 bits, format in the bottom 6
        let type_byte = binary::read_u8(buf, 14)?;
        let element_type = match type_byte >> 6 {
            0 => PrimitiveType::F64,
            1 => PrimitiveType::F32,
            other => {
                return Err(NmrError::UnsupportedType(format!(
                    "JEOL data type code {}",
                    other
                )))
            }
        };
        let data_format = type_byte & 0x3F;

        let mut axis_type = [0u8; JMAXDIM];
        for (i, t) in axis_type.iter_mut().enumerate() {
            *t = binary::read_u8(buf, 24 + i)?;
        }
        let mut element_number = [0u32; JMAXDIM];
        for (i, n) in element_number.iter_mut().enumerate() {
            *n = binary::read_u32(buf, 176 + i * 4, be)?;
        }

        Ok(Self {
            endian,
            major_version: binary::read_u8(buf, 9)?,
            dim_count: binary::read_u8(buf, 12)?,
            element_type,
            data_format,
            axis_type,
            title: binary::read_text(buf, 48, 124)?.trim().to_string(),
            element_number,
            param_start: binary::read_u32(buf, 1212, be)?,
            param_length: binary::read_u32(buf, 1216, be)?,
            data_start: binary::read_u32(buf, 1284, be)?,
            data_length: u64::from(binary::read_u32(buf, 1288, be)?) << 32
                | u64::from(binary::read_u32(buf, 1292, be)?),
        })
    }

    /// Reject anything but 1D quadrature data.
    pub fn check_supported(&self) -> Result<()> {
        match self.data_format {
            JEOL_FORMAT_1D => {}
            JEOL_FORMAT_2D => return Err(NmrError::UnsupportedDimension("2D".into())),
            JEOL_FORMAT_SMALL2D => {
                return Err(NmrError::UnsupportedDimension("Small 2D".into()))
            }
            other => {
                return Err(NmrError::UnsupportedDimension(format!(
                    "JEOL data format {}",
                    other
                )))
            }
        }
        match self.axis_type[0] {
            JEOL_AXISTYPE_REAL | JEOL_AXISTYPE_TPPI => Err(NmrError::UnsupportedSpectrumType(
                "non-quadrature JEOL acquisition".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Read the parameter section declared by the header.
pub fn read_params(buf: &[u8], header: &JeolHeader) -> Result<JeolParams> {
    let start = header.param_start as usize;
    let endian = header.endian;

    let parm_size = binary::read_u32(buf, start, endian)? as usize;
    let lo_id = binary::read_u32(buf, start + 4, endian)?;
    let hi_id = binary::read_u32(buf, start + 8, endian)?;
    if parm_size != PARAM_RECORD_SIZE {
        log::warn!(
            "JEOL parameter records declared as {} bytes, reading {}-byte slots",
            parm_size,
            PARAM_RECORD_SIZE
        );
    }

    let count = if hi_id >= lo_id { (hi_id - lo_id) as usize + 1 } else { 0 };
    let records_start = start + PARAM_HEADER_SIZE;
    let available = buf.len().saturating_sub(records_start) / PARAM_RECORD_SIZE;
    if count > available {
        return Err(NmrError::TruncatedData {
            offset: records_start,
            needed: count.saturating_mul(PARAM_RECORD_SIZE),
            available: buf.len().saturating_sub(records_start),
        });
    }
    let mut by_name = HashMap::with_capacity(count);
    for i in 0..count {
        let off = records_start + i * PARAM_RECORD_SIZE;
        if let Some(param) = JeolParam::parse(buf, off, endian)? {
            by_name.insert(param.name.to_uppercase(), param);
        }
    }

    Ok(JeolParams { by_name })
}

/// Read the 1D FID: `n` real points then `n` imaginary points.
pub fn read_fid(buf: &[u8], header: &JeolHeader) -> Result<ComplexFid> {
    let n = header.element_number[0] as usize;
    if n == 0 {
        return Err(NmrError::UnsupportedDimension("empty JEOL x axis".into()));
    }
    let start = header.data_start as usize;
    let ty = header.element_type;

    let re = binary::read_array(buf, start, n, ty, Pairing::None, header.endian)?.into_f64()?;
    let im = binary::read_array(buf, start + n * ty.size(), n, ty, Pairing::None, header.endian)?
        .into_f64()?;

    Ok(re
        .into_iter()
        .zip(im)
        .map(|(r, i)| Complex64::new(r, i))
        .collect())
}

/// Build the unified info from the parameter section.
///
/// `plot_begin` is the higher frequency here, unlike the other vendors.
pub fn to_info(params: &JeolParams, header: &JeolHeader, n: usize) -> Result<SpectrumInfo> {
    let offset_ppm = params.si_value("X_OFFSET")?;
    let x_freq_hz = params.si_value("X_FREQ")?;
    let spectral_width = params.si_value("X_SWEEP_CLIPPED")?;
    let acquisition_time = params.si_value("X_ACQ_TIME")?;

    let obs_nucl_freq = x_freq_hz / 1.0e6;
    if obs_nucl_freq == 0.0 {
        return Err(NmrError::InvalidParameter {
            name: "X_FREQ".into(),
            value: "0".into(),
        });
    }
    let center = obs_nucl_freq * offset_ppm;
    let plot_begin = center + spectral_width / 2.0;
    let plot_end = center - spectral_width / 2.0;

    Ok(SpectrumInfo {
        plot_begin,
        plot_end,
        plot_begin_ppm: plot_begin / obs_nucl_freq,
        plot_end_ppm: plot_end / obs_nucl_freq,
        spectral_width,
        acquisition_time,
        obs_nucl_freq,
        dwell_time: acquisition_time / n as f64,
        frequency_increment: spectral_width / n as f64,
        group_delay: 0.0,
        number_of_data_points: n,
        vendor: Vendor::Jeol,
        solvent: params.string("SOLVENT")?,
        samplename: header.title.clone(),
        nucleus: params.string("X_DOMAIN")?,
    })
}

/// Parse a complete `.jdf` file.
pub fn parse(buf: &[u8]) -> Result<(ComplexFid, SpectrumInfo)> {
    let header = JeolHeader::parse(buf)?;
    log::debug!("JEOL header: {:?}", header);
    header.check_supported()?;

    let params = read_params(buf, &header)?;
    let fid = read_fid(buf, &header)?;
    let info = to_info(&params, &header, fid.len())?;
    log::info!("Loaded JEOL FID: {}", info.summary());
    Ok((fid, info))
}
