/// Agilent / Varian VnmrJ FID reader
///
/// Layout of the `fid` file (all big-endian):
///   0-31:  file header (nblocks, ntraces, np, ebytes, tbytes, bbytes as i32,
///          vers_id as i16, two status bytes, nbheaders as i32)
///   32-59: block header (scale, status, index, mode as i16, ctcount as i32,
///          lpval, rpval, lvl, tlt as f32)
///   60-:   interleaved (imaginary, real) samples
///
/// Acquisition metadata comes from the sibling `procpar` text file.

use crate::data::binary::{self, Endianness, Pairing, PrimitiveType};
use crate::data::params::ParameterTable;
use crate::data::spectrum::{ComplexFid, SpectrumInfo, Vendor};
use crate::error::{NmrError, Result};

pub const FILE_HEADER_SIZE: usize = 32;
pub const BLOCK_HEADER_SIZE: usize = 28;

/// Ratio of the deuterium to proton gyromagnetic ratio
pub const DEUTERIUM_EPSILON: f64 = 0.1535069;

// ─── Status bits ────────────────────────────────────────────────────────────

// low status byte
const S_DATA: u8 = 0x01;
const S_SPEC: u8 = 0x02;
const S_32: u8 = 0x04;
const S_FLOAT: u8 = 0x08;
const S_COMPLEX: u8 = 0x10;
const S_HYPERCOMPLEX: u8 = 0x20;
const S_ACQPAR: u8 = 0x80;

// high status byte
const S_SECND: u8 = 0x01;
const S_TRANSF: u8 = 0x02;
const S_NP: u8 = 0x04;
const S_NF: u8 = 0x10;
const S_NI: u8 = 0x20;
const S_NI2: u8 = 0x40;

/// Decoded file status word
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags {
    pub data: bool,
    pub spectrum: bool,
    pub int32: bool,
    pub float: bool,
    pub complex: bool,
    pub hypercomplex: bool,
    pub acqpar: bool,
    pub second_ft: bool,
    pub transformed: bool,
    pub np: bool,
    pub nf: bool,
    pub ni: bool,
    pub ni2: bool,
}

impl StatusFlags {
    /// `status[0]` is the high byte of the big-endian status short.
    pub fn from_bytes(status: [u8; 2]) -> Self {
        let [hi, lo] = status;
        Self {
            data: lo & S_DATA != 0,
            spectrum: lo & S_SPEC != 0,
            int32: lo & S_32 != 0,
            float: lo & S_FLOAT != 0,
            complex: lo & S_COMPLEX != 0,
            hypercomplex: lo & S_HYPERCOMPLEX != 0,
            acqpar: lo & S_ACQPAR != 0,
            second_ft: hi & S_SECND != 0,
            transformed: hi & S_TRANSF != 0,
            np: hi & S_NP != 0,
            nf: hi & S_NF != 0,
            ni: hi & S_NI != 0,
            ni2: hi & S_NI2 != 0,
        }
    }

    /// Name of the first flag that makes the file unreadable as a raw 1D FID
    pub fn unsupported(&self) -> Option<&'static str> {
        let checks = [
            (!self.data, "no data"),
            (self.spectrum, "spectrum"),
            (self.hypercomplex, "hypercomplex"),
            (self.second_ft, "second FT"),
            (self.transformed, "transformed"),
            (self.np, "NP dimension"),
            (self.nf, "NF dimension"),
            (self.ni, "NI dimension"),
            (self.ni2, "NI2 dimension"),
        ];
        checks.iter().find(|(bad, _)| *bad).map(|(_, name)| *name)
    }

    pub fn primary_type(&self) -> PrimitiveType {
        if self.float {
            PrimitiveType::F32
        } else if self.int32 {
            PrimitiveType::I32
        } else {
            PrimitiveType::I16
        }
    }
}

/// 32-byte file header
#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    pub nblocks: i32,
    pub ntraces: i32,
    pub np: i32,
    pub ebytes: i32,
    pub tbytes: i32,
    pub bbytes: i32,
    pub vers_id: i16,
    pub status: [u8; 2],
    pub nbheaders: i32,
}

impl FileHeader {
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let be = Endianness::Big;
        Ok(Self {
            nblocks: binary::read_i32(buf, 0, be)?,
            ntraces: binary::read_i32(buf, 4, be)?,
            np: binary::read_i32(buf, 8, be)?,
            ebytes: binary::read_i32(buf, 12, be)?,
            tbytes: binary::read_i32(buf, 16, be)?,
            bbytes: binary::read_i32(buf, 20, be)?,
            vers_id: binary::read_i16(buf, 24, be)?,
            status: [binary::read_u8(buf, 26)?, binary::read_u8(buf, 27)?],
            nbheaders: binary::read_i32(buf, 28, be)?,
        })
    }

    pub fn flags(&self) -> StatusFlags {
        StatusFlags::from_bytes(self.status)
    }
}

/// 28-byte per-block header
#[derive(Debug, Clone, PartialEq)]
pub struct BlockHeader {
    pub scale: i16,
    pub status: i16,
    pub index: i16,
    pub mode: i16,
    pub ctcount: i32,
    pub lpval: f32,
    pub rpval: f32,
    pub lvl: f32,
    pub tlt: f32,
}

impl BlockHeader {
    pub fn parse(buf: &[u8], offset: usize) -> Result<Self> {
        let be = Endianness::Big;
        Ok(Self {
            scale: binary::read_i16(buf, offset, be)?,
            status: binary::read_i16(buf, offset + 2, be)?,
            index: binary::read_i16(buf, offset + 4, be)?,
            mode: binary::read_i16(buf, offset + 6, be)?,
            ctcount: binary::read_i32(buf, offset + 8, be)?,
            lpval: binary::read_f32(buf, offset + 12, be)?,
            rpval: binary::read_f32(buf, offset + 16, be)?,
            lvl: binary::read_f32(buf, offset + 20, be)?,
            tlt: binary::read_f32(buf, offset + 24, be)?,
        })
    }
}

/// Decode the binary `fid` file into its headers and the single FID it holds.
pub fn read_fid(buf: &[u8]) -> Result<(FileHeader, BlockHeader, ComplexFid)> {
    let header = FileHeader::parse(buf)?;
    let flags = header.flags();
    log::debug!("Agilent file header: {:?} {:?}", header, flags);

    if let Some(reason) = flags.unsupported() {
        return Err(NmrError::UnsupportedSpectrumType(format!(
            "Agilent status flags: {}",
            reason
        )));
    }

    if header.nblocks != 1 {
        return Err(NmrError::UnsupportedDimension(format!(
            "{} blocks (only single-block 1D data is read)",
            header.nblocks
        )));
    }
    match header.nbheaders {
        1 => {}
        2 => {
            return Err(NmrError::UnsupportedDimension(
                "hypercomplex block header".into(),
            ))
        }
        n => {
            return Err(NmrError::UnsupportedDimension(format!(
                "unexpected number of block headers: {}",
                n
            )))
        }
    }
    if header.ntraces != 1 {
        return Err(NmrError::UnsupportedDimension(format!(
            "{} traces per block",
            header.ntraces
        )));
    }

    let ty = flags.primary_type();
    if header.ebytes as usize != ty.size() {
        log::warn!(
            "Agilent header declares {} bytes per element, status implies {:?}",
            header.ebytes,
            ty
        );
    }

    let points = header.np / 2;
    if points <= 0 {
        return Err(NmrError::UnsupportedDimension(format!(
            "{} points per trace",
            header.np
        )));
    }

    let block = BlockHeader::parse(buf, FILE_HEADER_SIZE)?;
    let data_start = FILE_HEADER_SIZE + BLOCK_HEADER_SIZE;
    let fid = binary::read_array(
        buf,
        data_start,
        points as usize,
        ty,
        Pairing::ImaginaryFirst,
        Endianness::Big,
    )?
    .into_complex64()?;

    Ok((header, block, fid))
}

/// Typed view of the `procpar` entries the reader needs
#[derive(Debug, Clone, PartialEq)]
pub struct AgilentParams {
    /// [Hz]
    pub sw: f64,
    /// [MHz] observe frequency, absent on some older systems
    pub sfrq: Option<f64>,
    /// [MHz] lock (deuterium) frequency
    pub lockfreq: Option<f64>,
    /// [MHz] frequency of 0 ppm
    pub reffrq: f64,
    /// [s]
    pub at: f64,
    /// Raw point count (re + im)
    pub np: Option<i64>,
    pub solvent: String,
    pub samplename: String,
    pub nucleus: String,
}

impl AgilentParams {
    pub fn extract(table: &ParameterTable) -> Result<Self> {
        Ok(Self {
            sw: table.f64("sw")?,
            sfrq: table.optional_f64("sfrq")?,
            lockfreq: table.optional_f64("lockfreq_")?,
            reffrq: table.f64("reffrq")?,
            at: table.f64("at")?,
            np: table.optional_i64("np")?,
            solvent: table.string("solvent")?,
            samplename: table.string("samplename")?,
            nucleus: table.string("tn")?,
        })
    }

    /// Observe frequency, derived from the lock frequency when `sfrq` is absent.
    pub fn obs_nucl_freq(&self) -> Result<f64> {
        match (self.sfrq, self.lockfreq) {
            (Some(sfrq), _) => Ok(sfrq),
            (None, Some(lock)) => Ok(lock / DEUTERIUM_EPSILON),
            (None, None) => Err(NmrError::MissingParameter("sfrq".into())),
        }
    }

    pub fn to_info(&self, number_of_data_points: usize) -> Result<SpectrumInfo> {
        let obs = self.obs_nucl_freq()?;
        if obs == 0.0 {
            return Err(NmrError::InvalidParameter {
                name: "sfrq".into(),
                value: "0".into(),
            });
        }
        let n = number_of_data_points as f64;
        let irradiation_frequency = -1_000_000.0 * (self.reffrq - obs);
        let plot_begin = irradiation_frequency - self.sw / 2.0;
        let plot_end = irradiation_frequency + self.sw / 2.0;

        Ok(SpectrumInfo {
            plot_begin,
            plot_end,
            plot_begin_ppm: plot_begin / obs,
            plot_end_ppm: plot_end / obs,
            spectral_width: self.sw,
            acquisition_time: self.at,
            obs_nucl_freq: obs,
            dwell_time: self.at / n,
            frequency_increment: self.sw / n,
            group_delay: 0.0,
            number_of_data_points,
            vendor: Vendor::Agilent,
            solvent: self.solvent.clone(),
            samplename: self.samplename.clone(),
            nucleus: self.nucleus.clone(),
        })
    }
}

/// Parse an Agilent experiment from the `fid` bytes and `procpar` text.
pub fn parse(fid_bytes: &[u8], procpar: &str) -> Result<(ComplexFid, SpectrumInfo)> {
    let (header, _block, fid) = read_fid(fid_bytes)?;
    let params = AgilentParams::extract(&ParameterTable::from_procpar(procpar))?;

    if let Some(np) = params.np {
        if np != header.np as i64 {
            log::warn!(
                "procpar np={} disagrees with fid header np={}, using the header",
                np,
                header.np
            );
        }
    }

    let info = params.to_info(fid.len())?;
    log::info!("Loaded Agilent FID: {}", info.summary());
    Ok((fid, info))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use byteorder::{BigEndian, WriteBytesExt};
    use num_complex::Complex64;

    pub(crate) const PROCPAR: &str = r#"at 1 1 8190 0 0 2 1 11 1 64
1 0.5
0
np 7 1 1e+09 32 0 2 1 11 1 64
1 8
0
reffrq 1 1 1e+09 0 0 2 1 11 1 64
1 399.7937
0
samplename 2 2 127 0 0 2 1 0 1 64
1 "menthol"
0
sfrq 1 1 1e+09 0 0 2 1 11 1 64
1 399.7956
0
solvent 4 2 63 0 0 2 1 8 1 64
1 "cdcl3"
0
sw 1 1 1e+08 0 0 2 1 11 1 64
1 6410.3
0
tn 2 2 8 0 0 2 1 11 1 64
1 "H1"
0
"#;

    pub(crate) fn file_header(nblocks: i32, ntraces: i32, np: i32, ebytes: i32, status: [u8; 2], nbheaders: i32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_i32::<BigEndian>(nblocks).unwrap();
        buf.write_i32::<BigEndian>(ntraces).unwrap();
        buf.write_i32::<BigEndian>(np).unwrap();
        buf.write_i32::<BigEndian>(ebytes).unwrap();
        buf.write_i32::<BigEndian>(np * ebytes).unwrap();
        buf.write_i32::<BigEndian>(np * ebytes * ntraces + 28).unwrap();
        buf.write_i16::<BigEndian>(0).unwrap();
        buf.extend_from_slice(&status);
        buf.write_i32::<BigEndian>(nbheaders).unwrap();
        buf
    }

    pub(crate) fn block_header() -> Vec<u8> {
        let mut buf = Vec::new();
        for v in [1i16, 0x11, 1, 0] {
            buf.write_i16::<BigEndian>(v).unwrap();
        }
        buf.write_i32::<BigEndian>(1).unwrap();
        for v in [0.0f32, 0.0, 0.0, 0.0] {
            buf.write_f32::<BigEndian>(v).unwrap();
        }
        buf
    }

    /// Float32 FID with the given samples, stored imaginary first.
    pub(crate) fn float_fid(samples: &[Complex64]) -> Vec<u8> {
        let np = 2 * samples.len() as i32;
        let mut buf = file_header(1, 1, np, 4, [0, S_DATA | S_FLOAT | S_COMPLEX], 1);
        buf.extend(block_header());
        for s in samples {
            buf.write_f32::<BigEndian>(s.im as f32).unwrap();
            buf.write_f32::<BigEndian>(s.re as f32).unwrap();
        }
        buf
    }

    #[test]
    fn test_single_block_float_fid() {
        let ones = vec![Complex64::new(1.0, 0.0); 4];
        let buf = float_fid(&ones);
        assert_eq!(buf.len(), FILE_HEADER_SIZE + BLOCK_HEADER_SIZE + 32);

        let (fid, info) = parse(&buf, PROCPAR).unwrap();
        assert_eq!(fid.len(), 4);
        assert!(fid.iter().all(|c| *c == Complex64::new(1.0, 0.0)));
        assert_eq!(info.number_of_data_points, 4);
    }

    #[test]
    fn test_pairing_is_imaginary_first() {
        let samples = [Complex64::new(2.0, -3.0), Complex64::new(0.5, 0.25)];
        let (_, _, fid) = read_fid(&float_fid(&samples)).unwrap();
        assert_eq!(fid, samples.to_vec());
    }

    #[test]
    fn test_header_fields() {
        let buf = float_fid(&[Complex64::new(1.0, 0.0); 4]);
        let (header, block, _) = read_fid(&buf).unwrap();
        assert_eq!(header.np, 8);
        assert_eq!(header.ebytes, 4);
        let flags = header.flags();
        assert!(flags.data && flags.float && flags.complex);
        assert!(!flags.acqpar);
        assert_eq!(block.status, 0x11);
        assert_eq!(block.ctcount, 1);
    }

    #[test]
    fn test_hypercomplex_rejected() {
        for extra in [0u8, S_32, S_FLOAT, S_ACQPAR] {
            let mut buf = file_header(1, 1, 8, 4, [0, S_DATA | S_HYPERCOMPLEX | extra], 1);
            buf.extend(block_header());
            buf.extend(vec![0u8; 32]);
            assert!(matches!(read_fid(&buf), Err(NmrError::UnsupportedSpectrumType(_))));
        }
        // regardless of the other header fields
        let buf = file_header(3, 5, 0, 2, [0xFF, S_HYPERCOMPLEX], 2);
        assert!(matches!(read_fid(&buf), Err(NmrError::UnsupportedSpectrumType(_))));
    }

    #[test]
    fn test_transformed_and_missing_data_rejected() {
        let cases = [[S_TRANSF, S_DATA], [S_NI, S_DATA], [0, S_DATA | S_SPEC], [0, S_FLOAT]];
        for status in cases {
            let buf = file_header(1, 1, 8, 4, status, 1);
            assert!(matches!(read_fid(&buf), Err(NmrError::UnsupportedSpectrumType(_))));
        }
    }

    #[test]
    fn test_dimension_errors() {
        let status = [0, S_DATA | S_FLOAT];
        for (nblocks, ntraces, nbheaders) in [(2, 1, 1), (1, 2, 1), (1, 1, 2), (1, 1, 0)] {
            let mut buf = file_header(nblocks, ntraces, 8, 4, status, nbheaders);
            buf.extend(block_header());
            buf.extend(vec![0u8; 32]);
            assert!(matches!(read_fid(&buf), Err(NmrError::UnsupportedDimension(_))));
        }
    }

    #[test]
    fn test_int16_and_int32_elements() {
        let mut buf = file_header(1, 1, 4, 2, [0, S_DATA], 1);
        buf.extend(block_header());
        for v in [5i16, -1, 7, 2] {
            buf.write_i16::<BigEndian>(v).unwrap();
        }
        let (_, _, fid) = read_fid(&buf).unwrap();
        assert_eq!(fid, vec![Complex64::new(-1.0, 5.0), Complex64::new(2.0, 7.0)]);

        let mut buf = file_header(1, 1, 2, 4, [0, S_DATA | S_32], 1);
        buf.extend(block_header());
        buf.write_i32::<BigEndian>(100).unwrap();
        buf.write_i32::<BigEndian>(-200).unwrap();
        let (_, _, fid) = read_fid(&buf).unwrap();
        assert_eq!(fid, vec![Complex64::new(-200.0, 100.0)]);
    }

    #[test]
    fn test_truncated_fid() {
        let mut buf = float_fid(&[Complex64::new(1.0, 0.0); 4]);
        buf.truncate(buf.len() - 3);
        assert!(matches!(read_fid(&buf), Err(NmrError::TruncatedData { .. })));
        assert!(matches!(read_fid(&buf[..20]), Err(NmrError::TruncatedData { .. })));
    }

    #[test]
    fn test_derived_info() {
        let buf = float_fid(&[Complex64::new(1.0, 0.0); 4]);
        let (_, info) = parse(&buf, PROCPAR).unwrap();
        let irr = -1.0e6 * (399.7937 - 399.7956);
        assert!((info.plot_begin - (irr - 6410.3 / 2.0)).abs() < 1e-6);
        assert!((info.plot_end - (irr + 6410.3 / 2.0)).abs() < 1e-6);
        assert!((info.plot_end_ppm - info.plot_end / 399.7956).abs() < 1e-12);
        assert!((info.dwell_time - 0.5 / 4.0).abs() < 1e-12);
        assert!((info.frequency_increment - 6410.3 / 4.0).abs() < 1e-9);
        assert_eq!(info.group_delay, 0.0);
        assert_eq!(info.vendor, Vendor::Agilent);
        assert_eq!(info.samplename, "menthol");
        assert_eq!(info.solvent, "cdcl3");
        assert_eq!(info.nucleus, "H1");
        assert!(info.plot_end > info.plot_begin);
    }

    #[test]
    fn test_lock_frequency_fallback() {
        let procpar = PROCPAR.replace("sfrq 1 1", "lockfreq_ 1 1");
        let procpar = procpar.replace("1 399.7956", "1 61.37");
        let buf = float_fid(&[Complex64::new(1.0, 0.0); 4]);
        let (_, info) = parse(&buf, &procpar).unwrap();
        assert!((info.obs_nucl_freq - 61.37 / DEUTERIUM_EPSILON).abs() < 1e-9);
    }

    #[test]
    fn test_missing_parameter() {
        let procpar = PROCPAR.replace("sw 1 1", "sw1 1 1");
        let buf = float_fid(&[Complex64::new(1.0, 0.0); 4]);
        assert!(matches!(parse(&buf, &procpar), Err(NmrError::MissingParameter(k)) if k == "sw"));

        let procpar = PROCPAR.replace("sfrq 1 1", "xfrq 1 1");
        assert!(matches!(parse(&buf, &procpar), Err(NmrError::MissingParameter(k)) if k == "sfrq"));
    }
}
