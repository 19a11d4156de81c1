//! Model identifiers

use std::fmt;

/// Unique identifier for a model based on UUIDv7
///
/// Identifiers stay stable while a model moves around inside its project
/// (indices shift on removal), so anything that outlives a single call, such
/// as an in-flight solver request, refers to a model by its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelId(u128);

impl ModelId {
    /// Generate a new UUIDv7-based ModelId
    ///
    /// # Examples
    ///
    /// ```
    /// use powerscope_domain::ModelId;
    ///
    /// let id = ModelId::new();
    /// assert!(id.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a ModelId from a raw u128 value
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Parse a ModelId from its string form
    ///
    /// # Examples
    ///
    /// ```
    /// use powerscope_domain::ModelId;
    ///
    /// let id = ModelId::new();
    /// let parsed = ModelId::from_string(&id.to_string()).unwrap();
    /// assert_eq!(id, parsed);
    /// ```
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid model id: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}
