/// Format detection and whole-file reads
///
/// Resolves a user-supplied path (a `.jdf` file, a `fid` file or the
/// experiment directory holding it) to a vendor and reads everything the
/// vendor parser needs in one go.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::ProcessingConfig;
use crate::data::bruker;
use crate::data::spectrum::Vendor;
use crate::data::vendor::VendorInput;
use crate::error::{NmrError, Result};
use crate::pipeline::experiment::Experiment;

/// Located input files for one experiment
#[derive(Debug, Clone, PartialEq)]
struct Located {
    vendor: Vendor,
    /// FID file, or the .jdf file itself
    data: PathBuf,
    /// Experiment directory holding the parameter files
    dir: PathBuf,
}

fn is_jdf(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("jdf"))
        .unwrap_or(false)
}

fn locate(path: &Path) -> Result<Located> {
    if !path.exists() {
        return Err(NmrError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )));
    }

    if path.is_file() && is_jdf(path) {
        let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        return Ok(Located {
            vendor: Vendor::Jeol,
            data: path.to_path_buf(),
            dir,
        });
    }

    let (dir, fid) = if path.is_dir() {
        (path.to_path_buf(), path.join("fid"))
    } else {
        let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        (dir, path.to_path_buf())
    };

    let is_fid = fid.file_name().map(|n| n == "fid").unwrap_or(false);
    if !is_fid || !fid.is_file() {
        return Err(NmrError::NotAnNmrFile(format!(
            "{}: expected a .jdf file or a fid file",
            path.display()
        )));
    }

    let vendor = if dir.join("procpar").is_file() {
        Vendor::Agilent
    } else if dir.join("acqus").is_file() {
        Vendor::Bruker
    } else {
        return Err(NmrError::NotAnNmrFile(format!(
            "{}: no procpar or acqus next to fid",
            fid.display()
        )));
    };

    Ok(Located { vendor, data: fid, dir })
}

/// Detect the vendor from a path (file or directory)
pub fn detect_format(path: &Path) -> Result<Vendor> {
    locate(path).map(|l| l.vendor)
}

/// Subdirectories of `dir`, sorted by name
fn sorted_subdirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Bruker sample name from `<first subdir>/<its first subdir>/title`
/// (normally `pdata/1/title`); empty if there is none.
fn bruker_samplename(dir: &Path) -> String {
    let title = sorted_subdirs(dir)
        .ok()
        .and_then(|d| d.into_iter().next())
        .and_then(|first| sorted_subdirs(&first).ok())
        .and_then(|d| d.into_iter().next())
        .map(|second| second.join("title"));

    match title.map(|p| fs::read_to_string(&p)) {
        Some(Ok(text)) => bruker::title_to_samplename(&text),
        _ => {
            log::warn!("No Bruker title file under {}; sample name left empty", dir.display());
            String::new()
        }
    }
}

/// Read every file the vendor parser needs.
pub fn read_input(path: &Path) -> Result<VendorInput> {
    let located = locate(path)?;
    log::debug!("Detected {} data at {}", located.vendor, located.data.display());

    let input = match located.vendor {
        Vendor::Jeol => VendorInput::Jeol {
            data: fs::read(&located.data)?,
        },
        Vendor::Agilent => VendorInput::Agilent {
            fid: fs::read(&located.data)?,
            procpar: fs::read_to_string(located.dir.join("procpar"))?,
        },
        Vendor::Bruker => VendorInput::Bruker {
            fid: fs::read(&located.data)?,
            acqus: fs::read_to_string(located.dir.join("acqus"))?,
            samplename: bruker_samplename(&located.dir),
        },
    };
    Ok(input)
}

/// Read, parse and process one experiment.
pub fn load_experiment(path: &Path, config: &ProcessingConfig) -> Result<Experiment> {
    let input = read_input(path)?;
    let (fid, info) = input.parse()?;
    log::info!("Loaded {}: {}", path.display(), info.summary());
    Ok(Experiment::new(fid, info, config).with_source(&path.display().to_string()))
}
