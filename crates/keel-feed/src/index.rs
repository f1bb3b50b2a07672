//! Feed version-index parsing for constraint matching and floating-version
//! resolution.

use quick_xml::events::Event;
use quick_xml::Reader;

use keel_core::version::{Version, VersionConstraint};
use keel_util::errors::KeelError;

/// A package's version index as published by a feed.
#[derive(Debug, Clone, Default)]
pub struct FeedIndex {
    pub id: Option<String>,
    pub latest: Option<String>,
    pub versions: Vec<String>,
}

impl FeedIndex {
    /// The highest listed version satisfying `constraint`.
    ///
    /// Floating constraints are served by the same rule: the maximum
    /// satisfying version is the "latest available" the constraint asks for.
    pub fn best_match(&self, constraint: &VersionConstraint) -> Option<Version> {
        self.versions
            .iter()
            .filter_map(|v| Version::parse(v))
            .filter(|v| constraint.satisfied_by(v))
            .max()
    }
}

/// Parse a feed `index.xml` listing available versions.
pub fn parse_index(xml: &str) -> miette::Result<FeedIndex> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut index = FeedIndex::default();
    let mut path: Vec<String> = Vec::new();
    let mut text_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                path.push(String::from_utf8_lossy(e.name().as_ref()).to_string());
                text_buf.clear();
            }
            Ok(Event::Text(ref e)) => {
                text_buf = e.unescape().unwrap_or_default().to_string();
            }
            Ok(Event::End(_)) => {
                let ctx = path.join(">");

                match ctx.as_str() {
                    "index>id" => index.id = Some(text_buf.clone()),
                    "index>latest" => index.latest = Some(text_buf.clone()),
                    "index>versions>version" => {
                        index.versions.push(text_buf.clone());
                    }
                    _ => {}
                }

                path.pop();
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(KeelError::Generic {
                    message: format!("Failed to parse index.xml: {e}"),
                }
                .into());
            }
            _ => {}
        }
    }

    Ok(index)
}
