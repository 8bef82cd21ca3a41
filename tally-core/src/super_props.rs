//! Super properties: defaults merged under every tracked event.

use crate::normalize::{LIB_NAME, LIB_VERSION};
use crate::types::{Properties, PropertyValue};

/// Process-held default properties, seeded with the library identity.
#[derive(Debug, Clone, PartialEq)]
pub struct SuperProperties {
    properties: Properties,
}

impl Default for SuperProperties {
    fn default() -> Self {
        Self::new()
    }
}

impl SuperProperties {
    /// Library identity defaults only (`$lib`, `$lib_version`)
    pub fn new() -> Self {
        Self {
            properties: Self::defaults(),
        }
    }

    /// No defaults at all
    pub fn empty() -> Self {
        Self {
            properties: Properties::new(),
        }
    }

    fn defaults() -> Properties {
        Properties::new()
            .with("$lib", LIB_NAME)
            .with("$lib_version", LIB_VERSION)
    }

    /// Merge `properties` in; new values replace existing ones.
    pub fn register(&mut self, properties: &Properties) {
        self.properties.merge(properties);
    }

    /// Reset to exactly the library identity defaults.
    pub fn clear(&mut self) {
        self.properties = Self::defaults();
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }
}
