//! Firmware target identification.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ============================================================================
// Firmware Target
// ============================================================================

/// The firmware build to locate: device model, sales region, and the
/// three-part version code (`PDA/CSC/CP`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareTarget {
    /// Device model (e.g. `SM-S906B`).
    pub model: String,
    /// Sales/CSC region code (e.g. `EUX`).
    pub region: String,
    /// Full version code, slash-separated: `PDA/CSC/CP`.
    pub version: String,
}

impl FirmwareTarget {
    /// Creates a new target.
    pub fn new(
        model: impl Into<String>,
        region: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            region: region.into(),
            version: version.into(),
        }
    }

    /// Splits the version code into its `PDA`/`CSC`/`CP` parts.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTarget`] if the code does not contain at
    /// least three non-empty slash-separated parts.
    pub fn version_parts(&self) -> Result<VersionParts, CoreError> {
        let parts: Vec<&str> = self.version.split('/').collect();
        if parts.len() < 3 || parts.iter().take(3).any(|p| p.is_empty()) {
            return Err(CoreError::InvalidTarget(format!(
                "version code must be PDA/CSC/CP, got '{}'",
                self.version
            )));
        }
        Ok(VersionParts {
            pda: parts[0].to_string(),
            csc: parts[1].to_string(),
            cp: parts[2].to_string(),
        })
    }

    /// Returns the expected archive filename for this target.
    ///
    /// Firmware archives follow the pattern
    /// `{model}_{region}_{pda}_{csc}_{cp}.zip`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTarget`] if the version code is malformed.
    pub fn archive_name(&self) -> Result<String, CoreError> {
        let parts = self.version_parts()?;
        Ok(format!(
            "{}_{}_{}_{}_{}.zip",
            self.model, self.region, parts.pda, parts.csc, parts.cp
        ))
    }

    /// Validates that all fields are well-formed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTarget`] on an empty model or region, or
    /// a malformed version code.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.model.trim().is_empty() {
            return Err(CoreError::InvalidTarget("model must not be empty".into()));
        }
        if self.region.trim().is_empty() {
            return Err(CoreError::InvalidTarget("region must not be empty".into()));
        }
        self.version_parts().map(|_| ())
    }
}

/// The three components of a version code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionParts {
    /// Platform (AP) build.
    pub pda: String,
    /// CSC build.
    pub csc: String,
    /// Modem (CP) build.
    pub cp: String,
}

// ============================================================================
// Tests
// ============================================================================
