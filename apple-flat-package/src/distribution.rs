// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Distribution XML file format.
//!
//! See https://developer.apple.com/library/archive/documentation/DeveloperTools/Reference/DistributionDefinitionRef/Chapters/Distribution_XML_Ref.html
//! for Apple's documentation of this file format.
//!
//! Only the parts needed to locate component packages are modelled.

use {
    crate::{Error, PkgResult},
    log::debug,
    std::io::Read,
    xml::{attribute::OwnedAttribute, reader::XmlEvent, EventReader},
};

/// Name of the document element.
pub const ROOT_ELEMENT: &str = "installer-gui-script";

/// Represents a distribution XML file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Distribution {
    pub min_spec_version: Option<String>,
    pub title: Option<String>,
    /// Top-level `<pkg-ref>` elements, in document order.
    ///
    /// `<pkg-ref>` elements nested in `<choice>` are references to these
    /// and are not included.
    pub pkg_refs: Vec<PkgRef>,
}

/// A `<pkg-ref>` element.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PkgRef {
    pub id: String,
    pub version: Option<String>,
    pub install_kbytes: Option<u64>,
    /// Text content, typically `#<component>.pkg`.
    pub location: Option<String>,
}

impl PkgRef {
    fn from_attributes(attributes: &[OwnedAttribute]) -> PkgResult<Self> {
        let mut res = Self::default();
        let mut have_id = false;

        for attr in attributes {
            match attr.name.local_name.as_str() {
                "id" => {
                    res.id = attr.value.clone();
                    have_id = true;
                }
                "version" => {
                    res.version = Some(attr.value.clone());
                }
                "installKBytes" => {
                    res.install_kbytes = Some(attr.value.parse::<u64>().map_err(|_| {
                        Error::BadDistribution(format!("invalid installKBytes: {}", attr.value))
                    })?);
                }
                _ => {}
            }
        }

        if have_id {
            Ok(res)
        } else {
            Err(Error::BadDistribution("pkg-ref without id".into()))
        }
    }

    /// Name of the directory holding this component in the archive.
    ///
    /// This is the location without its leading `#`.
    pub fn component_directory(&self) -> Option<&str> {
        self.location
            .as_deref()
            .map(|l| l.trim())
            .map(|l| l.strip_prefix('#').unwrap_or(l))
            .filter(|l| !l.is_empty())
    }
}

/// Element whose text content is being collected.
enum Capture {
    Title(String),
    PkgRef(PkgRef, String),
}

impl Distribution {
    /// Parse Distribution XML from a reader.
    pub fn from_reader(reader: impl Read) -> PkgResult<Self> {
        let mut res = Self::default();
        let mut depth = 0usize;
        let mut capture = None;

        for event in EventReader::new(reader) {
            match event? {
                XmlEvent::StartElement {
                    name, attributes, ..
                } => {
                    depth += 1;

                    match (depth, name.local_name.as_str()) {
                        (1, ROOT_ELEMENT) => {
                            res.min_spec_version = attributes
                                .iter()
                                .find(|a| a.name.local_name == "minSpecVersion")
                                .map(|a| a.value.clone());
                        }
                        (1, other) => {
                            return Err(Error::BadDistribution(format!(
                                "unexpected root element: {}",
                                other
                            )));
                        }
                        (2, "title") => {
                            capture = Some(Capture::Title(String::new()));
                        }
                        (2, "pkg-ref") => {
                            capture = Some(Capture::PkgRef(
                                PkgRef::from_attributes(&attributes)?,
                                String::new(),
                            ));
                        }
                        _ => {}
                    }
                }
                XmlEvent::Characters(s) | XmlEvent::CData(s) if depth == 2 => match &mut capture {
                    Some(Capture::Title(text)) | Some(Capture::PkgRef(_, text)) => {
                        text.push_str(&s);
                    }
                    None => {}
                },
                XmlEvent::EndElement { .. } => {
                    if depth == 2 {
                        match capture.take() {
                            Some(Capture::Title(text)) => {
                                res.title = Some(text.trim().to_string());
                            }
                            Some(Capture::PkgRef(mut pkg_ref, text)) => {
                                let text = text.trim();
                                if !text.is_empty() {
                                    pkg_ref.location = Some(text.to_string());
                                }
                                res.pkg_refs.push(pkg_ref);
                            }
                            None => {}
                        }
                    }

                    depth = depth.saturating_sub(1);
                }
                XmlEvent::EndDocument => break,
                _ => {}
            }
        }

        debug!("parsed Distribution with {} pkg-ref", res.pkg_refs.len());

        Ok(res)
    }

    /// Parse Distribution XML from a string.
    pub fn from_xml(s: &str) -> PkgResult<Self> {
        Self::from_reader(s.as_bytes())
    }

    /// Distinct component package identifiers, in document order.
    pub fn package_ids(&self) -> Vec<String> {
        let mut res: Vec<String> = vec![];

        for pkg_ref in &self.pkg_refs {
            if !res.contains(&pkg_ref.id) {
                res.push(pkg_ref.id.clone());
            }
        }

        res
    }

    /// Resolve the archive directory of a component package.
    ///
    /// A package may be referenced by several `<pkg-ref>`. The first one
    /// carrying a location wins.
    pub fn component_directory(&self, id: &str) -> Option<&str> {
        self.pkg_refs
            .iter()
            .filter(|r| r.id == id)
            .find_map(|r| r.component_directory())
    }
}
