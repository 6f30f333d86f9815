// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::{
        format::{
            XarChecksum, XarHeader, ENCODING_BZIP2, ENCODING_GZIP, ENCODING_LZMA,
            ENCODING_OCTET_STREAM,
        },
        heap::{Heap, HeapSlice},
        table_of_contents::{ChecksumType, File, FileData, FileIndex, TableOfContents},
        Error, XarResult,
    },
    log::{debug, warn},
    once_cell::unsync::OnceCell,
    std::{
        fmt::Debug,
        io::{Read, Seek, SeekFrom, Write},
    },
    x509_certificate::CapturedX509Certificate,
};

/// Read-only interface to a single XAR archive.
///
/// The header and table of contents are parsed at construction time. The
/// flattened file index and the embedded certificates are derived lazily on
/// first use and cached for the lifetime of the instance.
#[derive(Debug)]
pub struct XarReader<R: Read + Seek + Sized + Debug> {
    /// Reader of raw XAR archive content.
    reader: R,

    /// Parsed file header.
    header: XarHeader,

    /// Parsed table of contents.
    toc: TableOfContents,

    /// Raw bytes of the compressed table of contents.
    toc_compressed: Vec<u8>,

    /// Location of the heap within the reader.
    heap: Heap,

    index: OnceCell<FileIndex>,

    certificates: OnceCell<Vec<CapturedX509Certificate>>,
}

impl<R: Read + Seek + Sized + Debug> XarReader<R> {
    /// Construct a new XAR reader from a stream reader.
    ///
    /// The reader must be positioned at the start of the archive.
    pub fn new(mut reader: R) -> XarResult<Self> {
        let header = XarHeader::from_reader(&mut reader)?;

        // Following the header is a zlib compressed table of contents.
        let mut toc_compressed = vec![];
        (&mut reader)
            .take(header.toc_length_compressed)
            .read_to_end(&mut toc_compressed)?;
        if (toc_compressed.len() as u64) < header.toc_length_compressed {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "archive ended inside table of contents",
            )
            .into());
        }

        let mut toc_data = vec![];
        flate2::read::ZlibDecoder::new(toc_compressed.as_slice())
            .read_to_end(&mut toc_data)
            .map_err(Error::TableOfContentsDecompress)?;

        if toc_data.len() as u64 != header.toc_length_uncompressed {
            warn!(
                "table of contents is {} bytes but header declares {}",
                toc_data.len(),
                header.toc_length_uncompressed
            );
        }

        let toc = TableOfContents::from_reader(std::io::Cursor::new(toc_data))?;

        let heap_start = header.heap_start_offset();
        let end = reader.seek(SeekFrom::End(0))?;
        let heap = Heap {
            start: heap_start,
            size: end.saturating_sub(heap_start),
        };
        debug!("heap starts at offset {} and spans {} bytes", heap.start, heap.size);

        Ok(Self {
            reader,
            header,
            toc,
            toc_compressed,
            heap,
            index: OnceCell::new(),
            certificates: OnceCell::new(),
        })
    }

    /// Obtain the inner reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Obtain the parsed [XarHeader] file header.
    pub fn header(&self) -> &XarHeader {
        &self.header
    }

    /// The location of the heap.
    pub fn heap(&self) -> Heap {
        self.heap
    }

    /// The start offset of the heap.
    pub fn heap_start_offset(&self) -> u64 {
        self.heap.start
    }

    /// Obtain the table of contents for this archive.
    pub fn table_of_contents(&self) -> &TableOfContents {
        &self.toc
    }

    /// Obtain the flattened file index, building it on first call.
    pub fn index(&self) -> XarResult<&FileIndex> {
        self.index.get_or_try_init(|| self.toc.flatten())
    }

    /// Full paths of all files in this archive, in table of contents order.
    pub fn paths(&self) -> XarResult<&[String]> {
        Ok(self.index()?.paths())
    }

    /// Obtain the file entries in this archive.
    pub fn files(&self) -> XarResult<Vec<(&str, &File)>> {
        Ok(self.index()?.iter().collect())
    }

    /// Attempt to find the [File] entry for a given path in the archive.
    pub fn find_file(&self, filename: &str) -> XarResult<Option<&File>> {
        Ok(self.index()?.get(filename))
    }

    fn file_data(&self, path: &str) -> XarResult<Option<FileData>> {
        Ok(self
            .find_file(path)?
            .ok_or_else(|| Error::FileNotFound(path.to_string()))?
            .data
            .clone())
    }

    /// Obtain a reader over a heap relative range.
    pub fn heap_slice(&mut self, offset: u64, length: u64) -> XarResult<HeapSlice<'_, R>> {
        self.heap.slice(&mut self.reader, offset, length)
    }

    /// Open a reader over the raw, possibly encoded, heap data for a path.
    pub fn open_raw(&mut self, path: &str) -> XarResult<Box<dyn Read + '_>> {
        match self.file_data(path)? {
            Some(data) => Ok(Box::new(self.heap_slice(data.offset, data.length)?)),
            None => Ok(Box::new(std::io::empty())),
        }
    }

    /// Open a reader over the decoded content of a path.
    ///
    /// The decoder is chosen by the file's encoding style.
    pub fn open(&mut self, path: &str) -> XarResult<Box<dyn Read + '_>> {
        match self.file_data(path)? {
            Some(data) => self.decoded_reader(&data),
            None => Ok(Box::new(std::io::empty())),
        }
    }

    fn decoded_reader(&mut self, data: &FileData) -> XarResult<Box<dyn Read + '_>> {
        let style = data.encoding.style.as_str();

        // Resolve the style before touching the heap so unknown encodings are
        // reported even when the range is bad.
        match style {
            ENCODING_OCTET_STREAM | ENCODING_GZIP => {}
            #[cfg(feature = "bzip2")]
            ENCODING_BZIP2 => {}
            #[cfg(feature = "xz2")]
            ENCODING_LZMA => {}
            encoding => {
                return Err(Error::UnimplementedFileEncoding(encoding.to_string()));
            }
        }

        let slice = self.heap.slice(&mut self.reader, data.offset, data.length)?;

        let reader: Box<dyn Read + '_> = match style {
            ENCODING_GZIP => Box::new(flate2::read::ZlibDecoder::new(slice)),
            #[cfg(feature = "bzip2")]
            ENCODING_BZIP2 => Box::new(bzip2::read::BzDecoder::new(slice)),
            #[cfg(feature = "xz2")]
            ENCODING_LZMA => Box::new(xz2::read::XzDecoder::new(slice)),
            _ => Box::new(slice),
        };

        Ok(reader)
    }

    /// Write heap file data for a given path to a writer.
    ///
    /// This will write the raw data backing a file as stored in the heap.
    /// There's a good chance the raw data is encoded/compressed.
    ///
    /// Returns the number of bytes written.
    pub fn write_file_data_heap(
        &mut self,
        path: &str,
        writer: &mut impl Write,
    ) -> XarResult<u64> {
        let mut reader = self.open_raw(path)?;

        Ok(std::io::copy(&mut reader, writer)?)
    }

    /// Write decoded file data for a given path to a writer.
    ///
    /// Returns the number of bytes written.
    pub fn write_file_data_decoded(
        &mut self,
        path: &str,
        writer: &mut impl Write,
    ) -> XarResult<u64> {
        let mut reader = self.open(path)?;

        Ok(std::io::copy(&mut reader, writer)?)
    }

    /// Resolve data for a given path.
    ///
    /// Returns `None` if the path does not exist.
    pub fn get_file_data_from_path(&mut self, path: &str) -> XarResult<Option<Vec<u8>>> {
        if self.find_file(path)?.is_none() {
            return Ok(None);
        }

        let mut buffer = vec![];
        self.write_file_data_decoded(path, &mut buffer)?;

        Ok(Some(buffer))
    }

    /// Obtain the archive checksum.
    ///
    /// The checksum consists of a digest format and a raw digest.
    pub fn checksum(&mut self) -> XarResult<(ChecksumType, Vec<u8>)> {
        let style = self.toc.checksum.style;
        let (offset, size) = (self.toc.checksum.offset, self.toc.checksum.size);

        let mut data = vec![];
        self.heap_slice(offset, size)?.read_to_end(&mut data)?;

        Ok((style, data))
    }

    /// Verify the checksum of the table of contents.
    ///
    /// The heap holds a digest of the compressed table of contents. Returns
    /// `false` if the archive declares no checksum.
    pub fn verify_table_of_contents_checksum(&mut self) -> XarResult<bool> {
        let (style, expected) = self.checksum()?;

        let header_style = match self.header.checksum() {
            XarChecksum::None => Some(ChecksumType::None),
            XarChecksum::Sha1 => Some(ChecksumType::Sha1),
            XarChecksum::Md5 => Some(ChecksumType::Md5),
            XarChecksum::Sha512 => Some(ChecksumType::Sha512),
            XarChecksum::Named | XarChecksum::Other(_) => None,
        };
        if header_style != Some(style) {
            warn!(
                "header checksum algorithm {:?} disagrees with table of contents style {}",
                self.header.checksum(),
                style
            );
        }

        if style == ChecksumType::None {
            return Ok(false);
        }

        let actual = style.digest_data(&self.toc_compressed);

        if actual != expected {
            return Err(Error::ChecksumMismatch {
                what: "table of contents".into(),
                expected: hex::encode(expected),
                actual: hex::encode(actual),
            });
        }

        Ok(true)
    }

    /// Verify the archived and extracted checksums of a file.
    ///
    /// The archived checksum covers the heap data as stored. The extracted
    /// checksum covers the decoded data. Returns whether any checksum was
    /// verified.
    pub fn verify_file_checksums(&mut self, path: &str) -> XarResult<bool> {
        let data = match self.file_data(path)? {
            Some(data) => data,
            None => return Ok(false),
        };

        let mut verified = false;

        let checks = [
            ("archived", data.archived_checksum.as_ref(), false),
            ("extracted", data.extracted_checksum.as_ref(), true),
        ];

        for (label, checksum, decoded) in checks {
            let checksum = match checksum {
                Some(c) if c.style != ChecksumType::None => c,
                _ => continue,
            };

            let expected = checksum.digest()?;
            let actual = if decoded {
                checksum.style.digest_reader(&mut self.decoded_reader(&data)?)?
            } else {
                checksum
                    .style
                    .digest_reader(&mut self.heap_slice(data.offset, data.length)?)?
            };

            if actual != expected {
                return Err(Error::ChecksumMismatch {
                    what: format!("{} {}", path, label),
                    expected: hex::encode(expected),
                    actual: hex::encode(actual),
                });
            }

            verified = true;
        }

        Ok(verified)
    }

    /// Obtain the X.509 certificates embedded in the table of contents.
    ///
    /// Certificates come from the primary signature block, in listed order
    /// (signing certificate first). The result is cached only if every
    /// certificate parses.
    pub fn certificates(&self) -> XarResult<&[CapturedX509Certificate]> {
        let certs = self.certificates.get_or_try_init(|| {
            if let Some(sig) = self.toc.primary_signature() {
                sig.x509_certificates()
            } else {
                Ok(vec![])
            }
        })?;

        Ok(certs.as_slice())
    }

    /// Verify the embedded certificate chain is internally consistent.
    ///
    /// Each certificate must be signed by the one following it. The last
    /// certificate is not checked against anything. This does not consult
    /// trust anchors, validity periods, or revocation status.
    pub fn verify_certificate_chain(&self) -> XarResult<()> {
        let certs = self.certificates()?;

        if certs.len() < 2 {
            warn!(
                "certificate chain has {} certificates; nothing to verify",
                certs.len()
            );
        }

        for (index, pair) in certs.windows(2).enumerate() {
            pair[0]
                .verify_signed_by_certificate(&pair[1])
                .map_err(|source| Error::CertificateChain { index, source })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{format::XAR_HEADER_SIZE, testutil::*},
        std::io::Cursor,
        x509_certificate::{KeyAlgorithm, X509CertificateBuilder},
    };

    fn reader(data: Vec<u8>) -> XarResult<XarReader<Cursor<Vec<u8>>>> {
        XarReader::new(Cursor::new(data))
    }

    fn self_signed_certificate(name: &str) -> CapturedX509Certificate {
        let mut builder = X509CertificateBuilder::new(KeyAlgorithm::Ed25519);
        builder
            .subject()
            .append_common_name_utf8_string(name)
            .unwrap();

        builder.create_with_random_keypair().unwrap().0
    }

    fn corrupt_signature(cert: &CapturedX509Certificate) -> Vec<u8> {
        // The signature bit string is the final element of the certificate.
        let mut der = cert.constructed_data().to_vec();
        let last = der.len() - 1;
        der[last] ^= 0xff;
        der
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn package_with_payload_and_chain() -> XarResult<()> {
        let cert = self_signed_certificate("signer");
        let der = cert.constructed_data().to_vec();

        let data = ArchiveBuilder::new(vec![directory(
            "pkg",
            vec![file("Payload", payload(2048))],
        )])
        .certificates(vec![der.clone(), der])
        .build();

        let mut xar = reader(data)?;
        assert_eq!(xar.header().size, XAR_HEADER_SIZE);
        assert_eq!(xar.header().checksum(), XarChecksum::Sha1);
        assert_eq!(xar.paths()?, &["pkg/Payload"]);

        let mut content = vec![];
        xar.open("pkg/Payload")?.read_to_end(&mut content)?;
        assert_eq!(content.len(), 2048);
        assert_eq!(content, payload(2048));

        assert_eq!(xar.certificates()?.len(), 2);
        xar.verify_certificate_chain()?;

        Ok(())
    }

    #[test]
    fn listing_is_stable_and_openable() -> XarResult<()> {
        let data = ArchiveBuilder::new(vec![
            file("Distribution", b"<xml/>".to_vec()),
            directory(
                "a.pkg",
                vec![
                    file("Bom", payload(10)),
                    compressed_file("Payload", payload(5000)),
                    directory("Resources", vec![file("en.lproj", payload(3))]),
                    empty_file("Empty"),
                ],
            ),
            directory("b.pkg", vec![file("Payload", payload(7))]),
        ])
        .build();

        let mut xar = reader(data)?;

        let expected = [
            "Distribution",
            "a.pkg/Bom",
            "a.pkg/Payload",
            "a.pkg/Resources/en.lproj",
            "a.pkg/Empty",
            "b.pkg/Payload",
        ];
        assert_eq!(xar.paths()?, &expected);
        assert_eq!(xar.paths()?, &expected);

        for path in expected {
            let mut content = vec![];
            xar.open(path)?.read_to_end(&mut content)?;
            let file = xar.find_file(path)?.unwrap();
            let size = file.data.as_ref().map(|d| d.size).unwrap_or(0);
            assert_eq!(content.len() as u64, size, "{}", path);
        }

        Ok(())
    }

    #[test]
    fn encodings_reproduce_bytes() -> XarResult<()> {
        let original = payload(10_000);

        let data = ArchiveBuilder::new(vec![
            file("plain", original.clone()),
            compressed_file("zlib", original.clone()),
        ])
        .build();

        let mut xar = reader(data)?;

        assert_eq!(xar.get_file_data_from_path("plain")?.unwrap(), original);
        assert_eq!(xar.get_file_data_from_path("zlib")?.unwrap(), original);
        assert!(xar.get_file_data_from_path("missing")?.is_none());

        // The raw heap data for the compressed file differs from the decoded form.
        let mut raw = vec![];
        let written = xar.write_file_data_heap("zlib", &mut raw)?;
        assert_eq!(written, raw.len() as u64);
        assert_ne!(raw, original);

        Ok(())
    }

    #[cfg(feature = "bzip2")]
    #[test]
    fn bzip2_encoding() -> XarResult<()> {
        let original = payload(10_000);
        let data = ArchiveBuilder::new(vec![encoded_file(
            "bz",
            original.clone(),
            ENCODING_BZIP2,
        )])
        .build();
        let mut xar = reader(data)?;

        assert_eq!(xar.get_file_data_from_path("bz")?.unwrap(), original);
        assert!(xar.verify_file_checksums("bz")?);

        let mut raw = vec![];
        xar.write_file_data_heap("bz", &mut raw)?;
        assert!(raw.starts_with(b"BZh"));

        Ok(())
    }

    #[cfg(feature = "xz2")]
    #[test]
    fn xz_encoding() -> XarResult<()> {
        let original = payload(10_000);
        let data = ArchiveBuilder::new(vec![encoded_file(
            "xz",
            original.clone(),
            ENCODING_LZMA,
        )])
        .build();
        let mut xar = reader(data)?;

        assert_eq!(xar.get_file_data_from_path("xz")?.unwrap(), original);
        assert!(xar.verify_file_checksums("xz")?);

        let mut raw = vec![];
        xar.write_file_data_heap("xz", &mut raw)?;
        assert!(raw.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]));

        Ok(())
    }

    #[test]
    fn not_found_does_not_poison() -> XarResult<()> {
        let data = ArchiveBuilder::new(vec![file("a", payload(4))]).build();
        let mut xar = reader(data)?;

        assert!(matches!(xar.open("b"), Err(Error::FileNotFound(ref p)) if p == "b"));
        assert_eq!(xar.get_file_data_from_path("a")?.unwrap(), payload(4));

        Ok(())
    }

    #[test]
    fn unknown_encoding() -> XarResult<()> {
        let data = ArchiveBuilder::new(vec![
            encoded_file("weird", payload(4), "application/x-unknown"),
            file("fine", payload(4)),
        ])
        .build();
        let mut xar = reader(data)?;

        let err = xar.open("weird").err().unwrap();
        assert!(
            matches!(err, Error::UnimplementedFileEncoding(ref s) if s == "application/x-unknown")
        );
        assert!(err.is_unsupported());

        // Raw access still works.
        let mut raw = vec![];
        xar.write_file_data_heap("weird", &mut raw)?;
        assert_eq!(raw, payload(4));

        Ok(())
    }

    #[test]
    fn out_of_bounds_range() -> XarResult<()> {
        let toc = toc_xml(
            r#"<file id="1"><name>big</name><type>file</type><data>
            <length>4096</length><offset>0</offset><size>4096</size>
            <encoding style="application/octet-stream"/></data></file>"#,
        );
        let mut xar = reader(archive_from_toc(&toc, &[0u8; 100]))?;

        assert!(matches!(
            xar.open("big"),
            Err(Error::HeapRangeOutOfBounds {
                offset: 0,
                length: 4096,
                heap_size: 100
            })
        ));

        Ok(())
    }

    #[test]
    fn unknown_file_type() -> XarResult<()> {
        let toc = toc_xml(r#"<file id="1"><name>link</name><type>fifo</type></file>"#);
        let xar = reader(archive_from_toc(&toc, &[]))?;

        assert!(matches!(xar.paths(), Err(Error::UnknownFileType(ref t)) if t == "fifo"));

        Ok(())
    }

    #[test]
    fn table_of_contents_failures() {
        let good = ArchiveBuilder::new(vec![file("a", payload(4))]).build();

        // Truncated inside the table of contents.
        assert!(matches!(
            reader(good[0..XAR_HEADER_SIZE as usize + 4].to_vec()),
            Err(Error::Io(_))
        ));

        // Corrupted zlib stream.
        let mut bad = good.clone();
        for b in &mut bad[XAR_HEADER_SIZE as usize..XAR_HEADER_SIZE as usize + 4] {
            *b = 0xff;
        }
        assert!(matches!(
            reader(bad),
            Err(Error::TableOfContentsDecompress(_))
        ));

        // Valid zlib, invalid XML.
        assert!(matches!(
            reader(archive_from_toc("<xar><toc>", &[])),
            Err(Error::SerdeXml(_))
        ));

        // Header problems surface before anything else.
        let mut bad = good;
        bad[0] = b'X';
        assert!(matches!(reader(bad), Err(Error::BadMagic(_))));
    }

    #[test]
    fn oversized_declared_lengths() -> XarResult<()> {
        let good = ArchiveBuilder::new(vec![file("a", payload(4))]).build();

        // Compressed length beyond the end of the archive.
        let mut bad = good.clone();
        bad[8..16].copy_from_slice(&u64::MAX.to_be_bytes());
        assert!(matches!(
            reader(bad),
            Err(Error::Io(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof
        ));

        // A wrong uncompressed length is tolerated.
        let mut bad = good;
        bad[16..24].copy_from_slice(&u64::MAX.to_be_bytes());
        let mut xar = reader(bad)?;
        assert_eq!(xar.get_file_data_from_path("a")?.unwrap(), payload(4));

        // A table of contents checksum larger than the heap.
        let toc = r#"<?xml version="1.0" encoding="UTF-8"?>
<xar><toc><checksum style="sha1"><offset>0</offset><size>18446744073709551615</size></checksum></toc></xar>"#;
        let mut xar = reader(archive_from_toc(toc, &[0u8; 20]))?;
        assert!(matches!(
            xar.checksum(),
            Err(Error::HeapRangeOutOfBounds { heap_size: 20, .. })
        ));

        Ok(())
    }

    #[test]
    fn checksums() -> XarResult<()> {
        let data = ArchiveBuilder::new(vec![
            file("plain", payload(100)),
            compressed_file("zlib", payload(1000)),
        ])
        .build();

        let mut xar = reader(data.clone())?;
        assert!(xar.verify_table_of_contents_checksum()?);
        assert!(xar.verify_file_checksums("plain")?);
        assert!(xar.verify_file_checksums("zlib")?);

        // The table of contents digest is stored at the start of the heap.
        let heap_start = xar.heap_start_offset() as usize;
        let mut bad = data;
        bad[heap_start] ^= 0xff;

        let mut xar = reader(bad)?;
        assert!(matches!(
            xar.verify_table_of_contents_checksum(),
            Err(Error::ChecksumMismatch { .. })
        ));

        Ok(())
    }

    #[test]
    fn file_checksum_mismatch() -> XarResult<()> {
        let data = ArchiveBuilder::new(vec![file("plain", payload(100))]).build();
        let mut xar = reader(data.clone())?;

        // Flip the last byte of the file data, which ends the archive.
        let mut bad = data;
        let last = bad.len() - 1;
        bad[last] ^= 0xff;

        let mut bad_xar = reader(bad)?;
        assert!(xar.verify_file_checksums("plain")?);
        assert!(matches!(
            bad_xar.verify_file_checksums("plain"),
            Err(Error::ChecksumMismatch { ref what, .. }) if what == "plain archived"
        ));

        Ok(())
    }

    #[test]
    fn chain_failure_names_pair() -> XarResult<()> {
        let a = self_signed_certificate("a");
        let b = self_signed_certificate("b");
        let a_der = a.constructed_data().to_vec();
        let b_der = b.constructed_data().to_vec();

        let verify = |certs: Vec<Vec<u8>>| -> XarResult<()> {
            let data = ArchiveBuilder::new(vec![file("x", payload(1))])
                .certificates(certs)
                .build();
            reader(data)?.verify_certificate_chain()
        };

        // a is signed by a. b did not sign a.
        verify(vec![a_der.clone(), a_der.clone(), a_der.clone()])?;
        assert!(matches!(
            verify(vec![a_der.clone(), b_der.clone()]),
            Err(Error::CertificateChain { index: 0, .. })
        ));
        assert!(matches!(
            verify(vec![a_der.clone(), a_der.clone(), b_der.clone()]),
            Err(Error::CertificateChain { index: 1, .. })
        ));

        // Corrupt signature on the middle certificate fails pair 1, not pair 0.
        let corrupted = corrupt_signature(&a);
        assert!(matches!(
            verify(vec![a_der.clone(), corrupted.clone(), a_der.clone()]),
            Err(Error::CertificateChain { index: 1, .. })
        ));

        // A bad first pair is reported even if later pairs are bad too.
        assert!(matches!(
            verify(vec![corrupted, b_der.clone(), a_der.clone()]),
            Err(Error::CertificateChain { index: 0, .. })
        ));

        // Root certificate is never checked.
        verify(vec![b_der.clone()])?;
        verify(vec![])?;

        Ok(())
    }

    #[test]
    fn x_signature_certificates() -> XarResult<()> {
        let cert = self_signed_certificate("signer");
        let der = cert.constructed_data().to_vec();

        let data = ArchiveBuilder::new(vec![file("x", payload(1))])
            .certificates(vec![der.clone()])
            .signature_element("x-signature")
            .build();
        let xar = reader(data)?;

        assert!(xar.table_of_contents().signature.is_none());
        assert!(xar.table_of_contents().x_signature.is_some());

        let certs = xar.certificates()?;
        assert_eq!(certs.len(), 1);
        assert_eq!(certs[0].constructed_data(), der.as_slice());
        xar.verify_certificate_chain()?;

        Ok(())
    }

    #[test]
    fn certificate_extraction_is_all_or_nothing() -> XarResult<()> {
        let cert = self_signed_certificate("a");
        let der = cert.constructed_data().to_vec();

        let data = ArchiveBuilder::new(vec![file("x", payload(1))])
            .certificates(vec![der, b"not a certificate".to_vec()])
            .build();
        let xar = reader(data)?;

        assert!(xar.certificates().is_err());
        // Nothing was cached, so the failure repeats.
        assert!(xar.certificates().is_err());
        assert!(xar.verify_certificate_chain().is_err());

        Ok(())
    }
}
