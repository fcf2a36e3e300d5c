//! Dataset partitions and their on-disk directory names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use terra_core::Error;

/// A named partition of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    /// Accepted split names, in display order
    pub const NAMES: [&'static str; 3] = ["train", "val", "test"];

    pub fn name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }

    /// Directory holding this split under `images/` and `annotations/`
    pub fn dir_name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "validation",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Split {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Split::Train),
            "val" => Ok(Split::Val),
            "test" => Ok(Split::Test),
            other => Err(Error::InvalidArgument(format!(
                "Incorrect split '{}', please choose one of {:?}.",
                other,
                Split::NAMES
            ))),
        }
    }
}
