// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! cpio archive reading.

Three ASCII dialects are supported: *new ASCII* (`070701`), *new ASCII with
checksums* (`070702`) and *portable ASCII* (`070707`). [NewcReader] and
[OdcReader] read a stream in a single dialect. [ArchiveReader] sniffs the
marker of every entry and dispatches to the appropriate decoder, so a stream
may mix dialects.
*/

pub mod archive;
pub use archive::{ArchiveEntry, ArchiveReader, Dialect};
pub mod newc;
pub use newc::{NewcHeader, NewcReader};
pub mod odc;
pub use odc::{OdcHeader, OdcReader};
pub mod replay;
pub use replay::ReplayReader;
#[cfg(any(test, feature = "test"))]
pub mod testutil;

use {
    chrono::{DateTime, TimeZone, Utc},
    std::{fmt::Debug, io::Read},
};

/// Length of the marker field at the start of every entry.
pub const MAGIC_LENGTH: usize = 6;

/// Name of the entry terminating an archive.
pub const TRAILER_NAME: &str = "TRAILER!!!";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad magic value encountered")]
    BadMagic,

    #[error("value in header is not an ASCII string")]
    BadHeaderString,

    #[error("string value in header is not a number: {0}")]
    BadHeaderHex(String),

    #[error("filename could not be decoded")]
    FilenameDecode,

    #[error("checksum mismatch for {name}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },
}

/// Result type for this crate.
pub type CpioResult<T> = Result<T, Error>;

/// Common behavior for a header/entry in a cpio archive.
pub trait CpioHeader: Debug {
    /// Device number.
    fn device(&self) -> u32;

    /// Inode number.
    fn inode(&self) -> u32;

    /// File mode.
    fn mode(&self) -> u32;

    /// User ID.
    fn uid(&self) -> u32;

    /// Group ID.
    fn gid(&self) -> u32;

    /// Number of links.
    fn nlink(&self) -> u32;

    /// Associated device number.
    fn rdev(&self) -> u32;

    /// Modified time as seconds since UNIX epoch.
    fn mtime(&self) -> u32;

    /// Modified time as a [DateTime].
    fn modified_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.mtime() as i64, 0).single()
    }

    /// File size in bytes.
    fn file_size(&self) -> u32;

    /// File name.
    fn name(&self) -> &str;

    /// Whether the file type bits of the mode denote a directory.
    fn is_directory(&self) -> bool {
        self.mode() & 0o170000 == 0o040000
    }
}

/// Common interface for cpio archive reading.
///
/// In addition to the members of this trait, instances implement [Iterator] over
/// the members of the archive and [Read] to obtain a reader for the current
/// archive member.
///
/// Instances behave like a cursor over members of the archive. The cursor is
/// advanced by calling [Self::read_next]. When the cursor is advanced, the
/// [Read] trait will read data for this and only this archive member. The reader
/// will hit EOF at the end of the current archive member.
pub trait CpioReader<T>: Iterator<Item = CpioResult<Box<dyn CpioHeader>>> + Read
where
    T: Read + Sized,
{
    /// Construct a new instance from a reader.
    fn new(reader: T) -> Self
    where
        Self: Sized;

    /// Read the next header from the archive.
    ///
    /// `Some` on another file entry. `None` if at end of file.
    ///
    /// The special `TRAILER!!!` entry is not emitted.
    fn read_next(&mut self) -> CpioResult<Option<Box<dyn CpioHeader>>>;

    /// Finish reading the current member.
    ///
    /// This will advance the reader to the next archive member if the
    /// current member hasn't been fully consumed.
    fn finish(&mut self) -> CpioResult<()>;
}

/// Construct a new cpio archive reader.
///
/// The dialect of each entry is sniffed as the archive is iterated.
pub fn reader<T: Read + Sized>(reader: T) -> ArchiveReader<T> {
    ArchiveReader::new(reader)
}

/// Parse an ASCII number in the given radix from a fixed width header field.
pub(crate) fn read_number(reader: &mut impl Read, count: usize, radix: u32) -> CpioResult<u32> {
    let mut buffer = vec![0u8; count];
    reader.read_exact(&mut buffer)?;

    let s = std::str::from_utf8(&buffer).map_err(|_| Error::BadHeaderString)?;
    u32::from_str_radix(s, radix).map_err(|_| Error::BadHeaderHex(s.to_string()))
}

/// Read a NUL terminated filename of a declared length, NUL included.
pub(crate) fn read_name(reader: &mut impl Read, length: u32) -> CpioResult<String> {
    let mut name_data = vec![];
    reader.take(length as u64).read_to_end(&mut name_data)?;
    if name_data.len() < length as usize {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "archive ended inside entry name",
        )
        .into());
    }

    Ok(std::ffi::CStr::from_bytes_with_nul(&name_data)
        .map_err(|_| Error::FilenameDecode)?
        .to_string_lossy()
        .to_string())
}
