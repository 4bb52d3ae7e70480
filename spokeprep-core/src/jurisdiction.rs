//! US state classification and the US/non-US branch decision.

use thiserror::Error;

/// Abbreviation recorded in the manifest for non-US jurisdictions.
pub const NON_US_STATE_ABBREV: &str = "ZZ";
/// Identifier recorded in the manifest for non-US jurisdictions.
pub const NON_US_STATE_FIPS: &str = "0";

/// Canonical identity of a US state or state-equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateInfo {
    name: &'static str,
    abbreviation: &'static str,
    fips: &'static str,
}

impl StateInfo {
    /// Full state name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Two-letter postal abbreviation, upper case.
    pub const fn abbreviation(&self) -> &'static str {
        self.abbreviation
    }

    /// Two-digit FIPS code.
    pub const fn fips(&self) -> &'static str {
        self.fips
    }
}

/// Returned by [`classify`] when a name matches no known state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{name:?} is not a recognised US state")]
pub struct UnknownJurisdiction {
    /// The name that failed to match.
    pub name: String,
}

/// Outcome of classifying a run's place.
///
/// `Unclassified` is routing information, not a failure: it selects the
/// synthetic data branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jurisdiction {
    /// A recognised US state.
    Classified(StateInfo),
    /// Anything else.
    Unclassified,
}

impl Jurisdiction {
    /// Abbreviation recorded in the manifest.
    pub const fn abbreviation(&self) -> &'static str {
        match self {
            Self::Classified(info) => info.abbreviation,
            Self::Unclassified => NON_US_STATE_ABBREV,
        }
    }

    /// Identifier recorded in the manifest.
    pub const fn identifier(&self) -> &'static str {
        match self {
            Self::Classified(info) => info.fips,
            Self::Unclassified => NON_US_STATE_FIPS,
        }
    }
}

/// Map a state name, abbreviation, or FIPS code to its [`StateInfo`].
///
/// Matching ignores case and surrounding whitespace.
///
/// # Examples
///
/// ```
/// use spokeprep_core::classify;
///
/// let info = classify("Rhode Island").expect("known state");
/// assert_eq!(info.abbreviation(), "RI");
/// assert_eq!(info.fips(), "44");
/// assert!(classify("andorra").is_err());
/// ```
pub fn classify(name: &str) -> Result<StateInfo, UnknownJurisdiction> {
    let needle = name.trim();
    STATES
        .iter()
        .find(|info| {
            info.name.eq_ignore_ascii_case(needle)
                || info.abbreviation.eq_ignore_ascii_case(needle)
                || info.fips == needle
        })
        .copied()
        .ok_or_else(|| UnknownJurisdiction {
            name: name.to_owned(),
        })
}

/// Classify a run's place: the state first when present, then the country.
///
/// Any miss on the state name falls through to the country name, so a
/// misspelt state in a US request routes to the synthetic branch.
pub fn resolve_jurisdiction(state: Option<&str>, country: &str) -> Jurisdiction {
    state
        .map_or_else(|| classify(country), |name| classify(name).or_else(|_| classify(country)))
        .map_or(Jurisdiction::Unclassified, Jurisdiction::Classified)
}

const fn state(name: &'static str, abbreviation: &'static str, fips: &'static str) -> StateInfo {
    StateInfo {
        name,
        abbreviation,
        fips,
    }
}

static STATES: [StateInfo; 52] = [
    state("Alabama", "AL", "01"),
    state("Alaska", "AK", "02"),
    state("Arizona", "AZ", "04"),
    state("Arkansas", "AR", "05"),
    state("California", "CA", "06"),
    state("Colorado", "CO", "08"),
    state("Connecticut", "CT", "09"),
    state("Delaware", "DE", "10"),
    state("District of Columbia", "DC", "11"),
    state("Florida", "FL", "12"),
    state("Georgia", "GA", "13"),
    state("Hawaii", "HI", "15"),
    state("Idaho", "ID", "16"),
    state("Illinois", "IL", "17"),
    state("Indiana", "IN", "18"),
    state("Iowa", "IA", "19"),
    state("Kansas", "KS", "20"),
    state("Kentucky", "KY", "21"),
    state("Louisiana", "LA", "22"),
    state("Maine", "ME", "23"),
    state("Maryland", "MD", "24"),
    state("Massachusetts", "MA", "25"),
    state("Michigan", "MI", "26"),
    state("Minnesota", "MN", "27"),
    state("Mississippi", "MS", "28"),
    state("Missouri", "MO", "29"),
    state("Montana", "MT", "30"),
    state("Nebraska", "NE", "31"),
    state("Nevada", "NV", "32"),
    state("New Hampshire", "NH", "33"),
    state("New Jersey", "NJ", "34"),
    state("New Mexico", "NM", "35"),
    state("New York", "NY", "36"),
    state("North Carolina", "NC", "37"),
    state("North Dakota", "ND", "38"),
    state("Ohio", "OH", "39"),
    state("Oklahoma", "OK", "40"),
    state("Oregon", "OR", "41"),
    state("Pennsylvania", "PA", "42"),
    state("Rhode Island", "RI", "44"),
    state("South Carolina", "SC", "45"),
    state("South Dakota", "SD", "46"),
    state("Tennessee", "TN", "47"),
    state("Texas", "TX", "48"),
    state("Utah", "UT", "49"),
    state("Vermont", "VT", "50"),
    state("Virginia", "VA", "51"),
    state("Washington", "WA", "53"),
    state("West Virginia", "WV", "54"),
    state("Wisconsin", "WI", "55"),
    state("Wyoming", "WY", "56"),
    state("Puerto Rico", "PR", "72"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("rhode island", "RI", "44")]
    #[case("  TEXAS ", "TX", "48")]
    #[case("ny", "NY", "36")]
    #[case("06", "CA", "06")]
    #[case("District of Columbia", "DC", "11")]
    fn classifies_known_states(
        #[case] name: &str,
        #[case] abbreviation: &str,
        #[case] fips: &str,
    ) {
        let info = classify(name).expect("known state");
        assert_eq!(info.abbreviation(), abbreviation);
        assert_eq!(info.fips(), fips);
    }

    #[rstest]
    #[case("andorra")]
    #[case("usa")]
    #[case("")]
    #[case("rhode-island")]
    fn rejects_unknown_names(#[case] name: &str) {
        let err = classify(name).expect_err("unknown name");
        assert_eq!(err.name, name);
    }

    #[rstest]
    fn state_wins_over_country() {
        let jurisdiction = resolve_jurisdiction(Some("rhode island"), "usa");
        assert_eq!(jurisdiction.abbreviation(), "RI");
        assert_eq!(jurisdiction.identifier(), "44");
        assert!(matches!(jurisdiction, Jurisdiction::Classified(_)));
    }

    #[rstest]
    fn unknown_state_falls_back_to_country() {
        let jurisdiction = resolve_jurisdiction(Some("catalonia"), "texas");
        assert_eq!(jurisdiction.abbreviation(), "TX");
    }

    #[rstest]
    #[case(Some("catalonia"), "spain")]
    #[case(None, "andorra")]
    #[case(Some("rhode islnd"), "usa")]
    fn misses_yield_the_same_sentinel(#[case] state: Option<&str>, #[case] country: &str) {
        let jurisdiction = resolve_jurisdiction(state, country);
        assert_eq!(jurisdiction, Jurisdiction::Unclassified);
        assert_eq!(jurisdiction.abbreviation(), NON_US_STATE_ABBREV);
        assert_eq!(jurisdiction.identifier(), NON_US_STATE_FIPS);
    }

    #[rstest]
    fn table_has_unique_codes() {
        for (index, info) in STATES.iter().enumerate() {
            let duplicates = STATES
                .iter()
                .skip(index + 1)
                .filter(|other| other.fips == info.fips || other.abbreviation == info.abbreviation)
                .count();
            assert_eq!(duplicates, 0, "duplicate entry for {}", info.name);
        }
    }
}
