// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Utilities for constructing XAR archives in tests.

use {
    crate::{
        format::{
            XarHeader, ENCODING_GZIP, ENCODING_OCTET_STREAM, XAR_HEADER_SIZE, XAR_MAGIC,
            XAR_VERSION,
        },
        table_of_contents::ChecksumType,
    },
    scroll::IOwrite,
    std::{fmt::Write as FmtWrite, io::Write},
};

#[cfg(feature = "bzip2")]
use crate::format::ENCODING_BZIP2;
#[cfg(feature = "xz2")]
use crate::format::ENCODING_LZMA;

/// Size of a SHA-1 digest, which is the table of contents checksum we emit.
const TOC_DIGEST_SIZE: usize = 20;

/// A node in an archive under construction.
#[derive(Clone, Debug)]
pub enum TestEntry {
    File {
        name: String,
        content: Option<Vec<u8>>,
        encoding: String,
    },
    Directory {
        name: String,
        children: Vec<TestEntry>,
    },
}

/// A file stored without encoding.
pub fn file(name: &str, content: Vec<u8>) -> TestEntry {
    encoded_file(name, content, ENCODING_OCTET_STREAM)
}

/// A file stored as a zlib stream.
pub fn compressed_file(name: &str, content: Vec<u8>) -> TestEntry {
    encoded_file(name, content, ENCODING_GZIP)
}

/// A file labeled with an arbitrary encoding style.
///
/// Content is compressed for the zlib, bzip2 and xz styles and stored
/// verbatim for any other style.
pub fn encoded_file(name: &str, content: Vec<u8>, encoding: &str) -> TestEntry {
    TestEntry::File {
        name: name.to_string(),
        content: Some(content),
        encoding: encoding.to_string(),
    }
}

/// A file record without a `<data>` element.
pub fn empty_file(name: &str) -> TestEntry {
    TestEntry::File {
        name: name.to_string(),
        content: None,
        encoding: ENCODING_OCTET_STREAM.to_string(),
    }
}

pub fn directory(name: &str, children: Vec<TestEntry>) -> TestEntry {
    TestEntry::Directory {
        name: name.to_string(),
        children,
    }
}

/// Assembles a complete archive with a SHA-1 table of contents checksum.
#[derive(Clone, Debug, Default)]
pub struct ArchiveBuilder {
    entries: Vec<TestEntry>,
    certificates: Vec<Vec<u8>>,
    signature_element: Option<String>,
}

impl ArchiveBuilder {
    pub fn new(entries: Vec<TestEntry>) -> Self {
        Self {
            entries,
            certificates: vec![],
            signature_element: None,
        }
    }

    /// Embed DER encoded certificates in a signature block.
    pub fn certificates(mut self, certificates: Vec<Vec<u8>>) -> Self {
        self.certificates = certificates;
        self
    }

    /// Element name of the certificate block. Defaults to `signature`.
    pub fn signature_element(mut self, name: &str) -> Self {
        self.signature_element = Some(name.to_string());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut heap = vec![0u8; TOC_DIGEST_SIZE];
        let mut next_id = 1;

        let mut xml = String::new();
        writeln!(xml, r#"<?xml version="1.0" encoding="UTF-8"?>"#).unwrap();
        writeln!(xml, "<xar>").unwrap();
        writeln!(xml, "<toc>").unwrap();
        writeln!(xml, "<creation-time>2022-03-01T10:00:00</creation-time>").unwrap();
        writeln!(
            xml,
            r#"<checksum style="sha1"><offset>0</offset><size>{}</size></checksum>"#,
            TOC_DIGEST_SIZE
        )
        .unwrap();

        for entry in &self.entries {
            render_entry(entry, &mut xml, &mut heap, &mut next_id);
        }

        if !self.certificates.is_empty() {
            let element = self.signature_element.as_deref().unwrap_or("signature");
            writeln!(
                xml,
                r#"<{} style="RSA"><offset>{}</offset><size>0</size><KeyInfo><X509Data>"#,
                element,
                heap.len()
            )
            .unwrap();
            for der in &self.certificates {
                writeln!(xml, "<X509Certificate>{}</X509Certificate>", wrapped_base64(der))
                    .unwrap();
            }
            writeln!(xml, "</X509Data></KeyInfo></{}>", element).unwrap();
        }

        writeln!(xml, "</toc>").unwrap();
        writeln!(xml, "</xar>").unwrap();

        let toc_compressed = zlib(xml.as_bytes());
        let digest = ChecksumType::Sha1.digest_data(&toc_compressed);
        heap[0..TOC_DIGEST_SIZE].copy_from_slice(&digest);

        assemble(&toc_compressed, xml.len(), 1, &heap)
    }
}

fn render_entry(entry: &TestEntry, xml: &mut String, heap: &mut Vec<u8>, next_id: &mut u64) {
    let id = *next_id;
    *next_id += 1;

    match entry {
        TestEntry::File {
            name,
            content,
            encoding,
        } => {
            writeln!(xml, r#"<file id="{}"><name>{}</name><type>file</type>"#, id, name).unwrap();
            writeln!(xml, "<mode>0644</mode>").unwrap();

            if let Some(content) = content {
                let stored = encode(content, encoding);

                writeln!(
                    xml,
                    "<data><length>{}</length><offset>{}</offset><size>{}</size>",
                    stored.len(),
                    heap.len(),
                    content.len()
                )
                .unwrap();
                writeln!(xml, r#"<encoding style="{}"/>"#, encoding).unwrap();
                writeln!(
                    xml,
                    r#"<extracted-checksum style="sha1">{}</extracted-checksum>"#,
                    hex::encode(ChecksumType::Sha1.digest_data(content))
                )
                .unwrap();
                writeln!(
                    xml,
                    r#"<archived-checksum style="sha1">{}</archived-checksum>"#,
                    hex::encode(ChecksumType::Sha1.digest_data(&stored))
                )
                .unwrap();
                writeln!(xml, "</data>").unwrap();

                heap.extend_from_slice(&stored);
            }

            writeln!(xml, "</file>").unwrap();
        }
        TestEntry::Directory { name, children } => {
            writeln!(
                xml,
                r#"<file id="{}"><name>{}</name><type>directory</type><mode>0755</mode>"#,
                id, name
            )
            .unwrap();
            for child in children {
                render_entry(child, xml, heap, next_id);
            }
            writeln!(xml, "</file>").unwrap();
        }
    }
}

/// Wrap `<file>` XML in a table of contents that declares no checksum.
pub fn toc_xml(files: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<xar><toc><checksum style="none"><offset>0</offset><size>0</size></checksum>{}</toc></xar>"#,
        files
    )
}

/// Produce an archive from literal table of contents XML and heap bytes.
///
/// The header declares no checksum.
pub fn archive_from_toc(toc: &str, heap: &[u8]) -> Vec<u8> {
    assemble(&zlib(toc.as_bytes()), toc.len(), 0, heap)
}

fn assemble(toc_compressed: &[u8], toc_len: usize, checksum: u32, heap: &[u8]) -> Vec<u8> {
    let header = XarHeader {
        magic: XAR_MAGIC,
        size: XAR_HEADER_SIZE,
        version: XAR_VERSION,
        toc_length_compressed: toc_compressed.len() as u64,
        toc_length_uncompressed: toc_len as u64,
        checksum_algorithm_id: checksum,
    };

    let mut data = Vec::new();
    data.iowrite_with(header, scroll::BE).unwrap();
    data.extend_from_slice(toc_compressed);
    data.extend_from_slice(heap);

    data
}

fn encode(data: &[u8], encoding: &str) -> Vec<u8> {
    match encoding {
        ENCODING_GZIP => zlib(data),
        #[cfg(feature = "bzip2")]
        ENCODING_BZIP2 => {
            let mut encoder =
                bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        }
        #[cfg(feature = "xz2")]
        ENCODING_LZMA => {
            let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        }
        _ => data.to_vec(),
    }
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Base64 with line breaks, the way signing tools emit it.
fn wrapped_base64(data: &[u8]) -> String {
    base64::encode(data)
        .as_bytes()
        .chunks(64)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}
