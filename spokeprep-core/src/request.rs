//! The preparation request handed to the pipeline.

use std::fmt;
use std::num::NonZeroU32;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::RetryPolicy;

/// Default speed limit, in km/h, applied to synthetic jurisdictions.
pub const DEFAULT_SPEED_LIMIT: u32 = 50;
/// Default edge length, in metres, of a synthetic population cell.
pub const DEFAULT_BLOCK_SIZE: u32 = 500;
/// Default number of people placed in each synthetic population cell.
pub const DEFAULT_BLOCK_POPULATION: u32 = 100;
/// Default number of attempts for every retried operation.
pub const DEFAULT_RETRIES: u32 = 2;

/// Errors returned while building a [`PreparationRequest`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    /// A place component was empty or whitespace.
    #[error("{field} must not be blank")]
    Blank { field: &'static str },
    /// A numeric setting was zero.
    #[error("{field} must be a positive integer")]
    NonPositive { field: &'static str },
}

/// A place to prepare, as entered by the user.
///
/// # Examples
///
/// ```
/// use spokeprep_core::Place;
///
/// # fn main() -> Result<(), spokeprep_core::RequestError> {
/// let place = Place::new("usa", Some("rhode island"), "providence")?;
/// assert_eq!(place.to_string(), "providence, rhode island, usa");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    country: String,
    state: Option<String>,
    city: String,
}

impl Place {
    /// Validates and constructs a [`Place`].
    ///
    /// A blank `state` is treated as absent.
    pub fn new(
        country: impl Into<String>,
        state: Option<impl Into<String>>,
        city: impl Into<String>,
    ) -> Result<Self, RequestError> {
        let country = non_blank(country.into(), "country")?;
        let city = non_blank(city.into(), "city")?;
        let state = state
            .map(Into::into)
            .map(|value: String| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        Ok(Self {
            country,
            state,
            city,
        })
    }

    /// Country name.
    pub fn country(&self) -> &str {
        &self.country
    }

    /// State name, when one was supplied.
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// City name.
    pub fn city(&self) -> &str {
        &self.city
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            Some(state) => write!(f, "{}, {}, {}", self.city, state, self.country),
            None => write!(f, "{}, {}", self.city, self.country),
        }
    }
}

fn non_blank(value: String, field: &'static str) -> Result<String, RequestError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(RequestError::Blank { field })
    } else {
        Ok(trimmed.to_owned())
    }
}

fn positive(value: u32, field: &'static str) -> Result<NonZeroU32, RequestError> {
    NonZeroU32::new(value).ok_or(RequestError::NonPositive { field })
}

/// Everything one preparation run needs to know.
///
/// Numeric settings are stored as [`NonZeroU32`], so a request that reaches
/// the pipeline always carries positive values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparationRequest {
    place: Place,
    output_dir: Utf8PathBuf,
    speed_limit: NonZeroU32,
    block_size: NonZeroU32,
    block_population: NonZeroU32,
    retries: NonZeroU32,
}

impl PreparationRequest {
    /// Construct a request with default numeric settings.
    pub fn new(place: Place, output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            place,
            output_dir: output_dir.into(),
            speed_limit: NonZeroU32::MIN.saturating_add(DEFAULT_SPEED_LIMIT - 1),
            block_size: NonZeroU32::MIN.saturating_add(DEFAULT_BLOCK_SIZE - 1),
            block_population: NonZeroU32::MIN.saturating_add(DEFAULT_BLOCK_POPULATION - 1),
            retries: NonZeroU32::MIN.saturating_add(DEFAULT_RETRIES - 1),
        }
    }

    /// Override the synthetic speed limit (km/h).
    pub fn with_speed_limit(mut self, value: u32) -> Result<Self, RequestError> {
        self.speed_limit = positive(value, "speed-limit")?;
        Ok(self)
    }

    /// Override the synthetic cell edge length (metres).
    pub fn with_block_size(mut self, value: u32) -> Result<Self, RequestError> {
        self.block_size = positive(value, "block-size")?;
        Ok(self)
    }

    /// Override the population placed in each synthetic cell.
    pub fn with_block_population(mut self, value: u32) -> Result<Self, RequestError> {
        self.block_population = positive(value, "block-population")?;
        Ok(self)
    }

    /// Override the number of attempts for retried operations.
    pub fn with_retries(mut self, value: u32) -> Result<Self, RequestError> {
        self.retries = positive(value, "retries")?;
        Ok(self)
    }

    /// The place being prepared.
    pub fn place(&self) -> &Place {
        &self.place
    }

    /// Directory receiving every artefact.
    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    /// Speed limit applied to synthetic jurisdictions.
    pub fn speed_limit(&self) -> NonZeroU32 {
        self.speed_limit
    }

    /// Synthetic cell edge length in metres.
    pub fn block_size(&self) -> NonZeroU32 {
        self.block_size
    }

    /// People per synthetic cell.
    pub fn block_population(&self) -> NonZeroU32 {
        self.block_population
    }

    /// Total attempts allowed per retried operation.
    pub fn retries(&self) -> NonZeroU32 {
        self.retries
    }

    /// Retry policy shared by every retried stage of this run.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn providence() -> Place {
        Place::new("usa", Some("rhode island"), "providence").expect("valid place")
    }

    #[rstest]
    fn defaults_are_applied() {
        let request = PreparationRequest::new(providence(), "data");
        assert_eq!(request.speed_limit().get(), DEFAULT_SPEED_LIMIT);
        assert_eq!(request.block_size().get(), DEFAULT_BLOCK_SIZE);
        assert_eq!(request.block_population().get(), DEFAULT_BLOCK_POPULATION);
        assert_eq!(request.retries().get(), DEFAULT_RETRIES);
        assert_eq!(request.output_dir(), Utf8Path::new("data"));
    }

    #[rstest]
    #[case("", "providence", "country")]
    #[case("usa", "   ", "city")]
    fn blank_components_are_rejected(
        #[case] country: &str,
        #[case] city: &str,
        #[case] field: &'static str,
    ) {
        let err = Place::new(country, None::<String>, city).expect_err("blank component");
        assert_eq!(err, RequestError::Blank { field });
    }

    #[rstest]
    #[case(Some(""))]
    #[case(Some("  "))]
    #[case(None)]
    fn blank_state_is_absent(#[case] state: Option<&str>) {
        let place = Place::new("andorra", state, "andorra la vella").expect("valid place");
        assert_eq!(place.state(), None);
        assert_eq!(place.to_string(), "andorra la vella, andorra");
    }

    #[rstest]
    fn zero_settings_are_rejected() {
        let request = PreparationRequest::new(providence(), "data");
        assert_eq!(
            request.clone().with_retries(0),
            Err(RequestError::NonPositive { field: "retries" })
        );
        assert_eq!(
            request.clone().with_speed_limit(0),
            Err(RequestError::NonPositive {
                field: "speed-limit"
            })
        );
        assert_eq!(
            request.clone().with_block_size(0),
            Err(RequestError::NonPositive {
                field: "block-size"
            })
        );
        assert_eq!(
            request.with_block_population(0),
            Err(RequestError::NonPositive {
                field: "block-population"
            })
        );
    }

    #[rstest]
    fn overrides_are_kept() {
        let request = PreparationRequest::new(providence(), "data")
            .with_speed_limit(40)
            .and_then(|r| r.with_retries(3))
            .expect("positive overrides");
        assert_eq!(request.speed_limit().get(), 40);
        assert_eq!(request.retry_policy().max_attempts().get(), 3);
    }
}
