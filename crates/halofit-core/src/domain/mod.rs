pub mod errors;

pub use errors::{ErrorCategory, NonlinearError, NonlinearResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const METHOD_NAMES: &str = "one of none, halofit, trg_linear, trg_one_loop, trg";
const METHOD_CODES: &str = "an integer code in 0..=4";

/// Source of the non-linear correction stored in the spectrum tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum NonlinearMethod {
    #[default]
    None,
    Halofit,
    TrgLinear,
    TrgOneLoop,
    Trg,
}

impl NonlinearMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Halofit => "halofit",
            Self::TrgLinear => "trg_linear",
            Self::TrgOneLoop => "trg_one_loop",
            Self::Trg => "trg",
        }
    }

    pub const fn code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Halofit => 1,
            Self::TrgLinear => 2,
            Self::TrgOneLoop => 3,
            Self::Trg => 4,
        }
    }

    pub fn from_code(code: i32) -> NonlinearResult<Self> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::Halofit),
            2 => Ok(Self::TrgLinear),
            3 => Ok(Self::TrgOneLoop),
            4 => Ok(Self::Trg),
            other => Err(NonlinearError::ConfigurationRange {
                selector: other.to_string(),
                expected: METHOD_CODES,
            }),
        }
    }

    pub const fn is_requested(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Perturbative methods also fill velocity and cross spectra.
    pub const fn is_perturbative(self) -> bool {
        matches!(self, Self::TrgLinear | Self::TrgOneLoop | Self::Trg)
    }
}

impl Display for NonlinearMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl FromStr for NonlinearMethod {
    type Err = NonlinearError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "none" | "no" => Ok(Self::None),
            "halofit" => Ok(Self::Halofit),
            "trg_linear" => Ok(Self::TrgLinear),
            "trg_one_loop" => Ok(Self::TrgOneLoop),
            "trg" => Ok(Self::Trg),
            _ => Err(NonlinearError::ConfigurationRange {
                selector: value.to_string(),
                expected: METHOD_NAMES,
            }),
        }
    }
}

impl TryFrom<String> for NonlinearMethod {
    type Error = NonlinearError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NonlinearMethod> for String {
    fn from(method: NonlinearMethod) -> Self {
        method.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{NonlinearError, NonlinearMethod};

    #[test]
    fn method_names_round_trip_through_display() {
        for method in [
            NonlinearMethod::None,
            NonlinearMethod::Halofit,
            NonlinearMethod::TrgLinear,
            NonlinearMethod::TrgOneLoop,
            NonlinearMethod::Trg,
        ] {
            assert_eq!(method.to_string().parse::<NonlinearMethod>(), Ok(method));
            assert_eq!(NonlinearMethod::from_code(method.code()), Ok(method));
        }
    }

    #[test]
    fn out_of_range_selectors_are_configuration_errors() {
        let error = NonlinearMethod::from_code(7).expect_err("code 7 is not a method");
        assert!(matches!(error, NonlinearError::ConfigurationRange { .. }));
        assert_eq!(error.exit_code(), 2);

        let error = "one_loop_spt"
            .parse::<NonlinearMethod>()
            .expect_err("unknown name");
        assert_eq!(error.code(), "INPUT.METHOD_RANGE");
    }

    #[test]
    fn perturbative_methods_are_the_trg_family() {
        assert!(NonlinearMethod::TrgLinear.is_perturbative());
        assert!(NonlinearMethod::TrgOneLoop.is_perturbative());
        assert!(NonlinearMethod::Trg.is_perturbative());
        assert!(!NonlinearMethod::Halofit.is_perturbative());
        assert!(!NonlinearMethod::None.is_requested());
    }

    #[test]
    fn serde_accepts_names_and_rejects_unknown_methods() {
        let method: NonlinearMethod = serde_json::from_str("\"halofit\"").expect("known name");
        assert_eq!(method, NonlinearMethod::Halofit);
        assert_eq!(
            serde_json::to_string(&NonlinearMethod::TrgOneLoop).expect("serialize"),
            "\"trg_one_loop\""
        );
        assert!(serde_json::from_str::<NonlinearMethod>("\"pt2\"").is_err());
    }
}
