//! Filesystem-safe stems naming per-city artefacts.

use std::fmt;

use deunicode::deunicode_with_tofu;
use thiserror::Error;

use crate::Place;

/// Errors returned by [`Slug::new`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    /// The input held no letters or digits, even after transliteration.
    #[error("cannot derive a slug from {input:?}")]
    Empty { input: String },
}

/// Lowercase, hyphen-separated identifier used as the stem of every
/// per-city artefact (`{slug}.shp`, `{slug}.geojson`, `{slug}.osm`).
///
/// The same place always yields the same slug, so re-running a request
/// overwrites the previous run's files.
///
/// # Examples
///
/// ```
/// use spokeprep_core::Slug;
///
/// # fn main() -> Result<(), spokeprep_core::SlugError> {
/// let slug = Slug::new("Andorra la Vella, Andorra")?;
/// assert_eq!(slug.as_str(), "andorra-la-vella-andorra");
/// assert_eq!(slug.file_name("shp"), "andorra-la-vella-andorra.shp");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slug(String);

impl Slug {
    /// Slugify arbitrary text.
    ///
    /// Text is transliterated to ASCII first, so `São Paulo` becomes
    /// `sao-paulo`. Characters without a transliteration are dropped; runs
    /// of other non-alphanumeric characters collapse into a single hyphen.
    pub fn new(input: &str) -> Result<Self, SlugError> {
        let ascii = deunicode_with_tofu(input, "");
        let mut slug = String::with_capacity(ascii.len());
        let mut pending_separator = false;
        for ch in ascii.chars() {
            if ch.is_ascii_alphanumeric() {
                if pending_separator && !slug.is_empty() {
                    slug.push('-');
                }
                pending_separator = false;
                slug.push(ch.to_ascii_lowercase());
            } else if ch.is_ascii() {
                pending_separator = true;
            }
        }
        if slug.is_empty() {
            Err(SlugError::Empty {
                input: input.to_owned(),
            })
        } else {
            Ok(Self(slug))
        }
    }

    /// Slug for a place: city, then state when present, then country.
    pub fn for_place(place: &Place) -> Result<Self, SlugError> {
        let joined = match place.state() {
            Some(state) => format!("{}-{}-{}", place.city(), state, place.country()),
            None => format!("{}-{}", place.city(), place.country()),
        };
        Self::new(&joined)
    }

    /// Borrow the slug text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name made of the slug and `extension`.
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{extension}", self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
