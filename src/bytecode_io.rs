// bytecode_io.rs - on-disk bytecode container
// Fixed 16-byte header followed by the raw main bytecode. Word
// definitions are not persisted by this format.
//
// | offset | size | field                         |
// |--------|------|-------------------------------|
// | 0      | 4    | magic "V4BC"                  |
// | 4      | 1    | major version                 |
// | 5      | 1    | minor version                 |
// | 6      | 2    | flags, little-endian          |
// | 8      | 4    | code size, little-endian      |
// | 12     | 4    | reserved                      |

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::compiler::CompileOutput;

pub const MAGIC: [u8; 4] = *b"V4BC";
pub const VERSION_MAJOR: u8 = 0;
pub const VERSION_MINOR: u8 = 1;
pub const HEADER_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("nothing to save: bytecode buffer is empty")]
    EmptyOutput,
    #[error("cannot open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("failed to write container header: {0}")]
    HeaderWrite(#[source] io::Error),
    #[error("failed to write bytecode: {0}")]
    DataWrite(#[source] io::Error),
    #[error("failed to read container header: {0}")]
    HeaderRead(#[source] io::Error),
    #[error("bad magic: not a V4 bytecode file")]
    BadMagic,
    #[error("failed to read bytecode: {0}")]
    DataRead(#[source] io::Error),
}

impl IoError {
    /// Stable negative code per failure, matching the save/load numbering
    /// of the C tooling this format originated with.
    pub fn code(&self) -> i32 {
        match self {
            IoError::EmptyOutput => -1,
            IoError::Open { .. } => -2,
            IoError::HeaderWrite(_) | IoError::HeaderRead(_) => -3,
            IoError::DataWrite(_) | IoError::BadMagic => -4,
            IoError::DataRead(_) => -6,
        }
    }
}

/// Save the main bytecode of `output` to a container file. Word
/// definitions are intentionally not written.
pub fn save(output: &CompileOutput, path: &Path) -> Result<(), IoError> {
    if output.code.is_empty() {
        return Err(IoError::EmptyOutput);
    }

    let mut file = File::create(path)
        .map_err(|source| IoError::Open { path: path.to_path_buf(), source })?;

    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(&MAGIC);
    header[4] = VERSION_MAJOR;
    header[5] = VERSION_MINOR;
    // flags and reserved stay zero
    header[8..12].copy_from_slice(&(output.code.len() as u32).to_le_bytes());

    file.write_all(&header).map_err(IoError::HeaderWrite)?;
    file.write_all(&output.code).map_err(IoError::DataWrite)?;
    Ok(())
}

/// Load a container file. Only the magic is validated; version, flags and
/// reserved bytes are read permissively. The result carries no word
/// definitions.
pub fn load(path: &Path) -> Result<CompileOutput, IoError> {
    let mut file = File::open(path)
        .map_err(|source| IoError::Open { path: path.to_path_buf(), source })?;

    let mut header = [0u8; HEADER_LEN];
    file.read_exact(&mut header).map_err(IoError::HeaderRead)?;

    if header[0..4] != MAGIC {
        return Err(IoError::BadMagic);
    }

    let code_size = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
    let mut code = vec![0u8; code_size as usize];
    file.read_exact(&mut code).map_err(IoError::DataRead)?;

    Ok(CompileOutput { code, words: Vec::new() })
}
