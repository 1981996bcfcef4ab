/// Raw experiment inputs, one variant per vendor
///
/// Each variant owns the whole-file reads its parser needs, so parsing is a
/// pure function of the value.

use crate::data::spectrum::{ComplexFid, SpectrumInfo, Vendor};
use crate::data::{agilent, bruker, jdf};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum VendorInput {
    Agilent { fid: Vec<u8>, procpar: String },
    Bruker { fid: Vec<u8>, acqus: String, samplename: String },
    Jeol { data: Vec<u8> },
}

impl VendorInput {
    pub fn vendor(&self) -> Vendor {
        match self {
            VendorInput::Agilent { .. } => Vendor::Agilent,
            VendorInput::Bruker { .. } => Vendor::Bruker,
            VendorInput::Jeol { .. } => Vendor::Jeol,
        }
    }

    /// Decode the FID and normalize the metadata.
    pub fn parse(&self) -> Result<(ComplexFid, SpectrumInfo)> {
        match self {
            VendorInput::Agilent { fid, procpar } => agilent::parse(fid, procpar),
            VendorInput::Bruker {
                fid,
                acqus,
                samplename,
            } => bruker::parse(fid, acqus, samplename),
            VendorInput::Jeol { data } => jdf::parse(data),
        }
    }
}
