//! Supported tasks and the head each one builds.

use std::fmt;
use std::str::FromStr;

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use terra_core::{Error, Result};

use crate::head::{ClassificationHead, ClassificationHeadConfig, HeadConfig};

/// Scalar-output task kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Classification,
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::Classification => "classification",
        }
    }

    /// Build the head for this task on top of `in_channels` decoder channels.
    pub fn build_head<B: Backend>(
        &self,
        in_channels: usize,
        config: &HeadConfig,
        device: &B::Device,
    ) -> Result<ClassificationHead<B>> {
        match self {
            Task::Classification => {
                let num_classes = config.num_classes.ok_or_else(|| {
                    Error::Config("num_classes must be defined for classification task".to_string())
                })?;
                Ok(ClassificationHeadConfig::new(in_channels, num_classes)
                    .with_dim_list(Some(config.dim_list.clone()))
                    .with_dropout(config.dropout)
                    .init(device))
            }
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Task {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "classification" => Ok(Task::Classification),
            _ => Err(Error::Config("Task must be classification.".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terra_core::DefaultBackend;

    type TestBackend = DefaultBackend;

    #[test]
    fn test_parse_task() {
        assert_eq!("classification".parse::<Task>().unwrap(), Task::Classification);
        let err = "segmentation".parse::<Task>().unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: Task must be classification.");
    }

    #[test]
    fn test_build_head_requires_num_classes() {
        let device = Default::default();
        let err = Task::Classification
            .build_head::<TestBackend>(16, &HeadConfig::default(), &device)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: num_classes must be defined for classification task"
        );
    }

    #[test]
    fn test_build_head_sized_to_decoder() {
        let device = Default::default();
        let head = Task::Classification
            .build_head::<TestBackend>(16, &HeadConfig::new(4), &device)
            .unwrap();
        assert_eq!(head.num_classes(), 4);
    }
}
