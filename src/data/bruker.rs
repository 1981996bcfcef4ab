/// Bruker TopSpin / XWIN-NMR raw FID reader
///
/// The `fid` file is a bare array of interleaved complex samples, either
/// int32 (DTYPA=0) or float64 (DTYPA=2), in the byte order given by
/// BYTORDA. Acquisition metadata is read from the JCAMP-style `acqus` file.
///
/// Digital-filter spectrometers prepend GRPDLY points of filter response
/// to the FID; they are rotated to the end before the transform.

use crate::data::binary::{self, Endianness, Pairing, PrimitiveType};
use crate::data::params::ParameterTable;
use crate::data::spectrum::{ComplexFid, SpectrumInfo, Vendor};
use crate::error::{NmrError, Result};

/// Typed view of the `acqus` entries the reader needs
#[derive(Debug, Clone, PartialEq)]
pub struct BrukerParams {
    /// [Hz] transmitter offset, the spectrum centre
    pub o1: f64,
    /// [Hz] spectral width
    pub sw_h: f64,
    /// [ppm] spectral width
    pub sw: f64,
    /// [MHz] basic frequency
    pub bf1: f64,
    /// [MHz] irradiation frequency
    pub sfo1: f64,
    /// Raw point count (re + im)
    pub td: usize,
    pub dtypa: i64,
    pub bytorda: i64,
    pub grpdly: Option<f64>,
    pub decim: Option<i64>,
    pub dspfvs: Option<i64>,
    /// [s] declared acquisition time (`$AT`), rarely present
    pub at: Option<f64>,
    pub solvent: String,
    pub nucleus: String,
}

impl BrukerParams {
    pub fn extract(table: &ParameterTable) -> Result<Self> {
        let td = table.i64("TD")?;
        let td = usize::try_from(td).map_err(|_| NmrError::InvalidParameter {
            name: "TD".into(),
            value: td.to_string(),
        })?;

        Ok(Self {
            o1: table.f64("O1")?,
            sw_h: table.f64("SW_h")?,
            sw: table.f64("SW")?,
            bf1: table.f64("BF1")?,
            sfo1: table.f64("SFO1")?,
            td,
            dtypa: table.i64("DTYPA")?,
            bytorda: table.i64("BYTORDA")?,
            grpdly: table.optional_f64("GRPDLY")?,
            decim: table.optional_i64("DECIM")?,
            dspfvs: table.optional_i64("DSPFVS")?,
            at: table.optional_f64("AT")?,
            solvent: table.string("SOLVENT")?,
            nucleus: table.string("NUC1")?,
        })
    }

    pub fn data_type(&self) -> Result<PrimitiveType> {
        match self.dtypa {
            0 => Ok(PrimitiveType::I32),
            2 => Ok(PrimitiveType::F64),
            other => Err(NmrError::UnsupportedType(format!("Bruker DTYPA={}", other))),
        }
    }

    pub fn endianness(&self) -> Result<Endianness> {
        match self.bytorda {
            0 => Ok(Endianness::Little),
            1 => Ok(Endianness::Big),
            other => Err(NmrError::InvalidParameter {
                name: "BYTORDA".into(),
                value: other.to_string(),
            }),
        }
    }

    /// Samples are stored imaginary first on big-endian acquisitions.
    pub fn pairing(&self) -> Result<Pairing> {
        Ok(match self.endianness()? {
            Endianness::Big => Pairing::ImaginaryFirst,
            Endianness::Little => Pairing::RealFirst,
        })
    }

    /// GRPDLY, or the DECIM/DSPFVS table value on older acquisitions that
    /// store GRPDLY=-1.
    pub fn group_delay(&self) -> Result<f64> {
        match (self.grpdly, self.decim, self.dspfvs) {
            (Some(g), _, _) if g >= 0.0 => Ok(g),
            (_, Some(decim), Some(dspfvs)) => Ok(compute_grpdly(decim, dspfvs)),
            _ => Err(NmrError::MissingParameter("GRPDLY".into())),
        }
    }

    pub fn number_of_data_points(&self) -> usize {
        self.td / 2
    }

    pub fn to_info(&self, samplename: &str) -> Result<SpectrumInfo> {
        let n = self.number_of_data_points();
        if n == 0 {
            return Err(NmrError::InvalidParameter {
                name: "TD".into(),
                value: self.td.to_string(),
            });
        }
        let plot_begin = self.o1 - self.sw_h / 2.0;
        let plot_end = self.o1 + self.sw_h / 2.0;
        let dwell_time = 1.0 / (self.sw * self.sfo1);
        let acquisition_time = self.at.unwrap_or(n as f64 * dwell_time);

        Ok(SpectrumInfo {
            plot_begin,
            plot_end,
            plot_begin_ppm: plot_begin / self.bf1,
            plot_end_ppm: plot_end / self.bf1,
            spectral_width: self.sw_h,
            acquisition_time,
            obs_nucl_freq: self.bf1,
            dwell_time,
            frequency_increment: self.sw_h / n as f64,
            group_delay: self.group_delay()?,
            number_of_data_points: n,
            vendor: Vendor::Bruker,
            solvent: self.solvent.clone(),
            samplename: samplename.to_string(),
            nucleus: self.nucleus.clone(),
        })
    }
}

/// Digital filter group delay from DECIM and DSPFVS.
///
/// Lookup table from the Bruker DSP documentation, only used when GRPDLY
/// is not set in acqus.
pub fn compute_grpdly(decim: i64, dspfvs: i64) -> f64 {
    if decim <= 1 {
        return 0.0;
    }

    match dspfvs {
        10 => match decim {
            2 => 44.75, 3 => 33.5, 4 => 66.625, 6 => 59.0833,
            8 => 68.5625, 12 => 60.375, 16 => 69.5313, 24 => 61.0208,
            32 => 70.0156, 48 => 61.3438, 64 => 70.2578, 96 => 61.5052,
            128 => 70.3789, 192 => 61.5859, 256 => 70.4395, 384 => 61.6263,
            512 => 70.4697, 768 => 61.6465, 1024 => 70.4849, 1536 => 61.6566,
            2048 => 70.4924, _ => 0.0,
        },
        11 => match decim {
            2 => 46.0, 3 => 36.5, 4 => 48.0, 6 => 50.1667,
            8 => 53.25, 12 => 69.5, 16 => 72.25, 24 => 70.1667,
            32 => 72.75, 48 => 70.5, 64 => 73.0, 96 => 70.6667,
            128 => 72.5, 192 => 71.3333, 256 => 72.25, 384 => 71.6667,
            512 => 72.125, 768 => 71.8333, 1024 => 72.0625, 1536 => 71.9167,
            2048 => 72.0313, _ => 0.0,
        },
        12 => match decim {
            2 => 46.311, 3 => 36.530, 4 => 47.870, 6 => 50.229,
            8 => 53.289, 12 => 69.551, 16 => 71.600, 24 => 70.184,
            32 => 72.138, 48 => 70.528, 64 => 72.348, 96 => 70.700,
            128 => 72.524, _ => 0.0,
        },
        _ => 0.0,
    }
}

/// Rotate the FID left by the group delay rounded to whole points.
pub fn rotate_group_delay(fid: &mut ComplexFid, group_delay: f64) {
    if fid.is_empty() || !group_delay.is_finite() || group_delay <= 0.0 {
        return;
    }
    let shift = group_delay.round() as usize % fid.len();
    fid.rotate_left(shift);
}

/// Join the lines of a `pdata/<n>/title` file into one sample name.
pub fn title_to_samplename(title: &str) -> String {
    title
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a Bruker experiment from the `fid` bytes and `acqus` text.
///
/// The returned FID has the group delay already rotated out.
pub fn parse(fid_bytes: &[u8], acqus: &str, samplename: &str) -> Result<(ComplexFid, SpectrumInfo)> {
    let params = BrukerParams::extract(&ParameterTable::from_acqus(acqus))?;
    log::debug!("Bruker acqus: {:?}", params);

    let info = params.to_info(samplename)?;
    let mut fid = binary::read_array(
        fid_bytes,
        0,
        info.number_of_data_points,
        params.data_type()?,
        params.pairing()?,
        params.endianness()?,
    )?
    .into_complex64()?;

    rotate_group_delay(&mut fid, info.group_delay);
    log::info!("Loaded Bruker FID: {}", info.summary());
    Ok((fid, info))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
    use num_complex::Complex64;

    pub(crate) fn acqus(td: usize, dtypa: i32, bytorda: i32, grpdly: &str) -> String {
        format!(
            r#"##TITLE= Parameter file, TOPSPIN		Version 3.2
##JCAMP-DX= 5.0
##$AQ_mod= 3
##$BF1= 400.13
##$BYTORDA= {bytorda}
##$DECIM= 2
##$DSPFVS= 12
##$DTYPA= {dtypa}
##$GRPDLY= {grpdly}
##$NUC1= <1H>
##$O1= 1880.61
##$SFO1= 400.1318806
##$SOLVENT= <CDCl3>
##$SW= 20.0254193236558
##$SW_h= 8012.82051282051
##$TD= {td}
##END=
"#
        )
    }

    pub(crate) fn int32_le_fid(samples: &[(i32, i32)]) -> Vec<u8> {
        let mut buf = Vec::new();
        for &(re, im) in samples {
            buf.write_i32::<LittleEndian>(re).unwrap();
            buf.write_i32::<LittleEndian>(im).unwrap();
        }
        buf
    }

    #[test]
    fn test_group_delay_rotation() {
        let mut fid: ComplexFid = (0..5).map(|i| Complex64::new(i as f64, 0.0)).collect();
        rotate_group_delay(&mut fid, 2.0);
        let order: Vec<f64> = fid.iter().map(|c| c.re).collect();
        assert_eq!(order, vec![2.0, 3.0, 4.0, 0.0, 1.0]);
    }

    #[test]
    fn test_rotation_rounds_and_wraps() {
        let mut fid: ComplexFid = (0..4).map(|i| Complex64::new(i as f64, 0.0)).collect();
        rotate_group_delay(&mut fid, 5.4);
        assert_eq!(fid[0].re, 1.0);
        let mut fid: ComplexFid = (0..4).map(|i| Complex64::new(i as f64, 0.0)).collect();
        rotate_group_delay(&mut fid, 0.0);
        assert_eq!(fid[0].re, 0.0);
    }

    #[test]
    fn test_parse_int32_little_endian() {
        let samples = [(10, -1), (20, -2), (30, -3), (40, -4), (50, -5)];
        let acq = acqus(10, 0, 0, "2");
        let (fid, info) = parse(&int32_le_fid(&samples), &acq, "menthol").unwrap();
        assert_eq!(fid.len(), 5);
        assert_eq!(fid[0], Complex64::new(30.0, -3.0));
        assert_eq!(fid[3], Complex64::new(10.0, -1.0));
        assert_eq!(info.number_of_data_points, 5);
        assert_eq!(info.group_delay, 2.0);
        assert_eq!(info.samplename, "menthol");
        assert_eq!(info.nucleus, "1H");
        assert_eq!(info.solvent, "CDCl3");
        assert_eq!(info.vendor, Vendor::Bruker);
    }

    #[test]
    fn test_parse_float64_big_endian_is_imaginary_first() {
        let mut buf = Vec::new();
        for (im, re) in [(1.0f64, 2.0f64), (3.0, 4.0)] {
            buf.write_f64::<BigEndian>(im).unwrap();
            buf.write_f64::<BigEndian>(re).unwrap();
        }
        let (fid, _) = parse(&buf, &acqus(4, 2, 1, "0"), "").unwrap();
        assert_eq!(fid, vec![Complex64::new(2.0, 1.0), Complex64::new(4.0, 3.0)]);
    }

    #[test]
    fn test_derived_info() {
        let acq = acqus(16, 0, 0, "0");
        let (_, info) = parse(&int32_le_fid(&[(0, 0); 8]), &acq, "").unwrap();
        let sw_h = 8012.82051282051;
        assert!((info.plot_begin - (1880.61 - sw_h / 2.0)).abs() < 1e-9);
        assert!((info.plot_end - (1880.61 + sw_h / 2.0)).abs() < 1e-9);
        assert!((info.plot_begin_ppm - info.plot_begin / 400.13).abs() < 1e-12);
        let dwell = 1.0 / (20.0254193236558 * 400.1318806);
        assert!((info.dwell_time - dwell).abs() < 1e-15);
        assert!((info.acquisition_time - 8.0 * dwell).abs() < 1e-12);
        assert!((info.frequency_increment - sw_h / 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_declared_acquisition_time() {
        let acq = acqus(16, 0, 0, "0").replace("##END=", "##$AT= 1.25\n##END=");
        let params = BrukerParams::extract(&ParameterTable::from_acqus(&acq)).unwrap();
        assert_eq!(params.at, Some(1.25));
        assert_eq!(params.to_info("").unwrap().acquisition_time, 1.25);

        // AQ_mod is not the acquisition time
        let params = BrukerParams::extract(&ParameterTable::from_acqus(&acqus(16, 0, 0, "0"))).unwrap();
        assert_eq!(params.at, None);
    }

    #[test]
    fn test_unknown_data_type() {
        let acq = acqus(4, 1, 0, "0");
        let res = parse(&int32_le_fid(&[(0, 0); 2]), &acq, "");
        assert!(matches!(res, Err(NmrError::UnsupportedType(_))));
    }

    #[test]
    fn test_grpdly_fallback_from_table() {
        let table = ParameterTable::from_acqus(&acqus(8, 0, 0, "-1"));
        let params = BrukerParams::extract(&table).unwrap();
        assert!((params.group_delay().unwrap() - 46.311).abs() < 1e-9);

        let stripped: String = acqus(8, 0, 0, "-1")
            .lines()
            .filter(|l| !l.starts_with("##$DECIM"))
            .map(|l| format!("{l}\n"))
            .collect();
        let params = BrukerParams::extract(&ParameterTable::from_acqus(&stripped)).unwrap();
        assert!(matches!(params.group_delay(), Err(NmrError::MissingParameter(_))));
    }

    #[test]
    fn test_compute_grpdly() {
        assert!((compute_grpdly(2, 12) - 46.311).abs() < 0.001);
        assert!((compute_grpdly(4, 12) - 47.870).abs() < 0.001);
        assert!((compute_grpdly(1, 10) - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_truncated_fid() {
        let acq = acqus(16, 0, 0, "0");
        let res = parse(&int32_le_fid(&[(0, 0); 7]), &acq, "");
        assert!(matches!(res, Err(NmrError::TruncatedData { .. })));
    }

    #[test]
    fn test_title_join() {
        assert_eq!(title_to_samplename("  menthol \n\n in CDCl3\n"), "menthol in CDCl3");
    }
}
