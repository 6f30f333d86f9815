// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! XAR file format reading.

A XAR archive consists of 3 regions:

1. A fixed size, big-endian header (see [format::XarHeader]).
2. A zlib compressed XML *table of contents* describing every file in the
   archive (see [table_of_contents::TableOfContents]).
3. A *heap* holding raw file data. Offsets recorded in the table of contents
   are relative to the start of the heap.

[reader::XarReader] ties these together and provides path based access to
file content as well as inspection of the X.509 certificates embedded in the
table of contents.
*/

pub mod format;
pub mod heap;
pub mod reader;
pub mod table_of_contents;
#[cfg(any(test, feature = "test"))]
pub mod testutil;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("(de)serialization error: {0}")]
    Scroll(#[from] scroll::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad header magic: {0:#010x}")]
    BadMagic(u32),

    #[error("unexpected header size: {0}")]
    BadHeaderSize(u16),

    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u16),

    #[error("table of contents {0} length is 0")]
    EmptyTableOfContents(&'static str),

    #[error("unsupported checksum algorithm: {0}")]
    UnsupportedChecksumAlgorithm(u32),

    #[error("table of contents decompression error: {0}")]
    TableOfContentsDecompress(std::io::Error),

    #[error("XML error: {0}")]
    SerdeXml(#[from] serde_xml_rs::Error),

    #[error("table of contents is corrupted: {0}")]
    TableOfContentsCorrupted(&'static str),

    #[error("unknown file type in table of contents: {0}")]
    UnknownFileType(String),

    #[error("heap range {offset}+{length} exceeds heap size {heap_size}")]
    HeapRangeOutOfBounds {
        offset: u64,
        length: u64,
        heap_size: u64,
    },

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("Unimplemented file encoding: {0}")]
    UnimplementedFileEncoding(String),

    #[error("unable to parse checksum string: {0}")]
    BadChecksum(String),

    #[error("{what} checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        what: String,
        expected: String,
        actual: String,
    },

    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("x509 certificate error: {0}")]
    X509Certificate(#[from] x509_certificate::X509CertificateError),

    #[error("certificate {index} is not signed by certificate {}: {source}", .index + 1)]
    CertificateChain {
        index: usize,
        source: x509_certificate::X509CertificateError,
    },
}

impl Error {
    /// Whether this error denotes a recognized but unimplemented feature.
    ///
    /// Callers may choose to skip the affected content instead of failing.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedVersion(_)
                | Self::UnsupportedChecksumAlgorithm(_)
                | Self::UnimplementedFileEncoding(_)
        )
    }
}

pub type XarResult<T> = std::result::Result<T, Error>;
