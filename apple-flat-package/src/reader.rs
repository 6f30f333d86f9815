// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reading support for Apple flat package (`.pkg`) installers.

use {
    crate::{distribution::Distribution, Error, PkgResult},
    apple_xar::reader::XarReader,
    cpio_archive::{ArchiveReader, ReplayReader},
    log::debug,
    once_cell::unsync::OnceCell,
    std::{
        fmt::Debug,
        io::{Cursor, Read, Seek},
    },
};

/// Leading bytes of a gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Leading bytes of Apple's chunked xz container.
const PBZX_MAGIC: &[u8; 4] = b"pbzx";

/// A cpio archive stored in a flat package.
pub type ComponentArchive<'a> = ArchiveReader<Box<dyn Read + 'a>>;

/// The type of a flat package.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PkgFlavor {
    /// A *component* installer.
    ///
    /// This consists of a single component.
    Component,

    /// A *product* installer.
    ///
    /// This consists of multiple components, described by a `Distribution` file.
    Product,
}

/// Read-only interface to a single flat package XAR archive.
pub struct PkgReader<R: Read + Seek + Sized + Debug> {
    xar: XarReader<R>,
    flavor: PkgFlavor,
    distribution: OnceCell<Option<Distribution>>,
    package_ids: OnceCell<Vec<String>>,
}

impl<R: Read + Seek + Sized + Debug> PkgReader<R> {
    /// Construct an instance from a reader.
    ///
    /// The reader will read the contents of a XAR archive. This is likely
    /// a `.pkg` file.
    pub fn new(reader: R) -> PkgResult<Self> {
        let xar = XarReader::new(reader)?;

        let flavor = if xar.find_file("Distribution")?.is_some() {
            PkgFlavor::Product
        } else {
            PkgFlavor::Component
        };
        debug!("opened {:?} flat package", flavor);

        Ok(Self {
            xar,
            flavor,
            distribution: OnceCell::new(),
            package_ids: OnceCell::new(),
        })
    }

    /// Return the inner reader, consuming self.
    pub fn into_inner(self) -> XarReader<R> {
        self.xar
    }

    /// Obtain the underlying XAR archive.
    pub fn xar(&mut self) -> &mut XarReader<R> {
        &mut self.xar
    }

    /// Obtain the flavor of the flat package.
    pub fn flavor(&self) -> PkgFlavor {
        self.flavor
    }

    /// Obtain the parsed `Distribution` XML file describing the installer.
    ///
    /// Not all flat packages have a `Distribution` file, so this may resolve to
    /// `None`.
    pub fn distribution(&mut self) -> PkgResult<Option<&Distribution>> {
        let xar = &mut self.xar;

        let distribution = self.distribution.get_or_try_init(|| -> PkgResult<_> {
            if let Some(xml_data) = xar.get_file_data_from_path("Distribution")? {
                Ok(Some(Distribution::from_reader(Cursor::new(xml_data))?))
            } else {
                Ok(None)
            }
        })?;

        Ok(distribution.as_ref())
    }

    /// Identifiers of the component packages in this installer.
    ///
    /// Identifiers come from the `Distribution` file. Component installers
    /// have none.
    pub fn package_ids(&mut self) -> PkgResult<&[String]> {
        let ids = self
            .distribution()?
            .map(|d| d.package_ids())
            .unwrap_or_default();

        Ok(self.package_ids.get_or_init(|| {
            debug!("found {} package ids", ids.len());
            ids
        }))
    }

    /// Resolve the archive directory holding a component package.
    fn component_directory(&mut self, id: &str) -> PkgResult<String> {
        let ids = self.package_ids()?;
        if !ids.is_empty() && !ids.iter().any(|x| x == id) {
            return Err(Error::InvalidPackageId(id.to_string()));
        }

        Ok(self
            .distribution()?
            .and_then(|d| d.component_directory(id))
            .unwrap_or(id)
            .to_string())
    }

    fn open_archive(&mut self, path: &str) -> PkgResult<ComponentArchive<'_>> {
        let stream = decompress(self.xar.open(path)?)?;

        Ok(cpio_archive::reader(stream))
    }

    /// Open the `Payload` cpio archive of a component package.
    pub fn open_payload(&mut self, id: &str) -> PkgResult<ComponentArchive<'_>> {
        let directory = self.component_directory(id)?;

        self.open_archive(&format!("{}/Payload", directory))
    }

    /// Open the `Scripts` cpio archive of a component package.
    pub fn open_scripts(&mut self, id: &str) -> PkgResult<ComponentArchive<'_>> {
        let directory = self.component_directory(id)?;

        self.open_archive(&format!("{}/Scripts", directory))
    }

    /// Open the `Payload` cpio archive at the root of a component installer.
    pub fn open_root_payload(&mut self) -> PkgResult<ComponentArchive<'_>> {
        self.open_archive("Payload")
    }
}

/// Strip compression from a cpio stream.
fn decompress<'a>(stream: Box<dyn Read + 'a>) -> PkgResult<Box<dyn Read + 'a>> {
    let mut stream = ReplayReader::new(stream);
    let magic = stream.peek(PBZX_MAGIC.len())?;

    if magic.starts_with(&GZIP_MAGIC) {
        debug!("payload is gzip compressed");
        Ok(Box::new(flate2::read::GzDecoder::new(stream)))
    } else if magic == PBZX_MAGIC {
        Err(Error::Unsupported("pbzx payload compression"))
    } else {
        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::distribution::tests::DISTRIBUTION,
        apple_xar::testutil::{directory, file, ArchiveBuilder},
        cpio_archive::testutil::{directory_entry, file_entry, write_newc, write_odc},
        std::io::Write,
    };

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn app_payload() -> Vec<u8> {
        write_newc(
            &[
                directory_entry("."),
                directory_entry("./Applications"),
                file_entry("./Applications/Example", b"binary".to_vec()),
            ],
            false,
            true,
        )
    }

    fn product() -> Vec<u8> {
        ArchiveBuilder::new(vec![
            file("Distribution", DISTRIBUTION.as_bytes().to_vec()),
            directory(
                "app.pkg",
                vec![
                    file("Bom", vec![0; 16]),
                    file("Payload", gzip(&app_payload())),
                    file(
                        "Scripts",
                        write_odc(&[file_entry("./postinstall", b"#!/bin/sh".to_vec())], true),
                    ),
                ],
            ),
            directory(
                "helper.pkg",
                vec![file("Payload", b"pbzx\x00\x00\x00\x00\x00\x10\x00\x00".to_vec())],
            ),
        ])
        .build()
    }

    fn names(mut archive: ComponentArchive<'_>) -> PkgResult<Vec<(String, bool)>> {
        let mut res = vec![];
        while let Some(entry) = archive.next_entry()? {
            res.push((entry.name().to_string(), entry.is_directory()));
        }

        Ok(res)
    }

    #[test]
    fn product_package() -> PkgResult<()> {
        let mut pkg = PkgReader::new(Cursor::new(product()))?;
        assert_eq!(pkg.flavor(), PkgFlavor::Product);
        assert_eq!(
            pkg.distribution()?.unwrap().title.as_deref(),
            Some("Example App")
        );
        assert_eq!(
            pkg.package_ids()?,
            &["com.example.app", "com.example.helper"]
        );
        // Cached across calls.
        let first = pkg.package_ids()?.as_ptr();
        assert_eq!(pkg.package_ids()?.as_ptr(), first);

        assert_eq!(
            names(pkg.open_payload("com.example.app")?)?,
            vec![
                (".".to_string(), true),
                ("./Applications".to_string(), true),
                ("./Applications/Example".to_string(), false),
            ]
        );

        let mut archive = pkg.open_payload("com.example.app")?;
        let mut content = vec![];
        loop {
            let mut entry = archive.next_entry()?.unwrap();
            if entry.name() == "./Applications/Example" {
                entry.read_to_end(&mut content)?;
                break;
            }
        }
        assert_eq!(content, b"binary");
        drop(archive);

        assert_eq!(
            names(pkg.open_scripts("com.example.app")?)?,
            vec![("./postinstall".to_string(), false)]
        );

        Ok(())
    }

    #[test]
    fn unknown_and_unsupported() -> PkgResult<()> {
        let mut pkg = PkgReader::new(Cursor::new(product()))?;

        assert!(matches!(
            pkg.open_payload("com.example.missing"),
            Err(Error::InvalidPackageId(ref id)) if id == "com.example.missing"
        ));

        let err = pkg.open_payload("com.example.helper").err().unwrap();
        assert!(matches!(err, Error::Unsupported(_)));
        assert!(err.is_unsupported());

        // Component exists in the Distribution but has no Scripts.
        assert!(matches!(
            pkg.open_scripts("com.example.helper"),
            Err(Error::Xar(apple_xar::Error::FileNotFound(ref p))) if p == "helper.pkg/Scripts"
        ));

        // Reader is still usable.
        assert_eq!(names(pkg.open_payload("com.example.app")?)?.len(), 3);

        Ok(())
    }

    #[test]
    fn component_package() -> PkgResult<()> {
        let data = ArchiveBuilder::new(vec![
            file("Bom", vec![0; 16]),
            file("PackageInfo", b"<pkg-info/>".to_vec()),
            file("Payload", app_payload()),
        ])
        .build();

        let mut pkg = PkgReader::new(Cursor::new(data))?;
        assert_eq!(pkg.flavor(), PkgFlavor::Component);
        assert!(pkg.distribution()?.is_none());
        assert!(pkg.package_ids()?.is_empty());

        assert_eq!(names(pkg.open_root_payload()?)?.len(), 3);

        // Without a Distribution, ids are used as directory names.
        assert!(matches!(
            pkg.open_payload("other.pkg"),
            Err(Error::Xar(apple_xar::Error::FileNotFound(_)))
        ));

        pkg.xar().verify_table_of_contents_checksum()?;

        Ok(())
    }
}
