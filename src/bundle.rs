//! Bundles: hypothetical options described by numeric attributes.
//!
//! A bundle is created when its stage initializes and is read-only from then
//! on. The attribute schema of a stage fixes which attributes every bundle
//! (and the stage's goal) must carry, and the display order of those
//! attributes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Stable bundle identifier (e.g. `"optionA"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleId(String);

impl BundleId {
    /// Creates a bundle id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BundleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BundleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One hypothetical option shown to the respondent.
///
/// # Examples
///
/// ```
/// use prefsync::Bundle;
///
/// let bundle = Bundle::new("optionA", "Option A")
///     .with_attribute("saltiness", 5.0)
///     .with_attribute("sweetness", 7.0);
/// assert_eq!(bundle.attribute("sweetness"), Some(7.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Identifier, unique within its stage.
    pub id: BundleId,
    /// Display name shown on the card.
    pub label: String,
    /// Attribute values keyed by attribute name.
    #[serde(default)]
    pub attributes: BTreeMap<String, f64>,
}

impl Bundle {
    /// Creates a bundle with no attributes.
    #[must_use]
    pub fn new(id: impl Into<BundleId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute value.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: f64) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Returns the value of an attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).copied()
    }
}

/// One attribute of a stage's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    /// Key used in bundle attribute maps.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Lower bound of the value axis.
    #[serde(default)]
    pub min: f64,
    /// Upper bound of the value axis.
    #[serde(default = "default_axis_max")]
    pub max: f64,
}

const fn default_axis_max() -> f64 {
    10.0
}

impl AttributeSpec {
    /// Creates an attribute on the default `[0, 10]` axis.
    #[must_use]
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            min: 0.0,
            max: default_axis_max(),
        }
    }

    /// Sets the value axis.
    #[must_use]
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Checks the name and axis range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "attribute.name".to_string(),
            });
        }
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(ValidationError::InvalidAttributeRange {
                attribute: self.name.clone(),
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Checks that `values` carries a finite, in-range value for exactly the
/// attributes in `schema`.
pub(crate) fn validate_attribute_values(
    owner: &str,
    values: &BTreeMap<String, f64>,
    schema: &[AttributeSpec],
) -> Result<(), ValidationError> {
    for spec in schema {
        let Some(&value) = values.get(&spec.name) else {
            return Err(ValidationError::MissingAttribute {
                owner: owner.to_string(),
                attribute: spec.name.clone(),
            });
        };
        if !value.is_finite() || value < spec.min || value > spec.max {
            return Err(ValidationError::AttributeOutOfRange {
                owner: owner.to_string(),
                attribute: spec.name.clone(),
                value,
                min: spec.min,
                max: spec.max,
            });
        }
    }
    if let Some(extra) = values
        .keys()
        .find(|name| !schema.iter().any(|spec| &spec.name == *name))
    {
        return Err(ValidationError::UnknownAttribute {
            owner: owner.to_string(),
            attribute: extra.clone(),
        });
    }
    Ok(())
}
