use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::errors::CisMapError;

///
/// Transcription direction of a TSS.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    #[serde(rename = "+")]
    Forward,
    #[serde(rename = "-")]
    Reverse,
}

impl Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

impl TryFrom<&str> for Strand {
    type Error = CisMapError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            _ => Err(CisMapError::Parse(format!("Invalid strand: '{}'", s))),
        }
    }
}
