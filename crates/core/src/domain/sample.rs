// Sample: one pair of read files

use crate::domain::error::{DomainError, Result};
use crate::domain::FileRef;
use serde::{Deserialize, Serialize};

/// Paired-end sample (exactly two read files)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub read1: FileRef,
    pub read2: FileRef,
}

impl Sample {
    pub fn new(read1: FileRef, read2: FileRef) -> Self {
        Self { read1, read2 }
    }

    /// Build a sample from two strings (paths or URIs)
    pub fn from_strs(read1: &str, read2: &str) -> Result<Self> {
        let sample = Self::new(FileRef::parse(read1), FileRef::parse(read2));
        sample.validate()?;
        Ok(sample)
    }

    pub fn validate(&self) -> Result<()> {
        self.read1.validate()?;
        self.read2.validate()?;
        if self.read1 == self.read2 {
            return Err(DomainError::ValidationError(format!(
                "read1 and read2 point at the same file: {}",
                self.read1
            )));
        }
        Ok(())
    }
}

/// Parse a JSON array of samples and validate each one
pub fn parse_samples(json: &str) -> crate::error::Result<Vec<Sample>> {
    let samples: Vec<Sample> = serde_json::from_str(json)?;
    for (index, sample) in samples.iter().enumerate() {
        sample.validate().map_err(|e| {
            crate::error::AppError::Validation(format!("sample {}: {}", index, e))
        })?;
    }
    Ok(samples)
}
