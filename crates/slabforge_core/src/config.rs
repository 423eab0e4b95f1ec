//! # Pool Configuration
//!
//! Pool geometry loaded once at startup from TOML:
//!
//! ```toml
//! kind = "growable"   # or "fixed"
//! element_size = 48
//! chunk_size = 256
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, PoolResult};
use crate::memory::{BlockAllocator, FixedCapacityPool, GrowablePool};

/// Which pool variant a configuration builds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    /// Grows one chunk at a time.
    #[default]
    Growable,
    /// One buffer of `chunk_size` blocks, never grows.
    Fixed,
}

/// Geometry of one pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Pool variant. Defaults to `growable`.
    #[serde(default)]
    pub kind: PoolKind,
    /// Bytes per block (clamped up to `MIN_ELEMENT_SIZE` by the pool).
    pub element_size: usize,
    /// Blocks per chunk, or total capacity for a fixed pool.
    pub chunk_size: usize,
}

impl PoolConfig {
    /// Creates a configuration.
    #[must_use]
    pub const fn new(kind: PoolKind, element_size: usize, chunk_size: usize) -> Self {
        Self {
            kind,
            element_size,
            chunk_size,
        }
    }

    /// Creates a configuration sized for values of `T`.
    #[must_use]
    pub const fn for_type<T>(kind: PoolKind, chunk_size: usize) -> Self {
        Self::new(kind, std::mem::size_of::<T>(), chunk_size)
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// `PoolError::InvalidConfig` if the text does not parse or validate.
    pub fn from_toml_str(text: &str) -> PoolResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| PoolError::InvalidConfig(format!("failed to parse pool config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// `PoolError::InvalidConfig` if the file cannot be read, parsed or
    /// validated.
    pub fn from_toml_file(path: impl AsRef<Path>) -> PoolResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PoolError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Serializes the configuration to TOML text.
    ///
    /// # Errors
    ///
    /// `PoolError::InvalidConfig` if serialization fails.
    pub fn to_toml_string(&self) -> PoolResult<String> {
        toml::to_string(self)
            .map_err(|e| PoolError::InvalidConfig(format!("failed to write pool config: {e}")))
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// `PoolError::InvalidConfig` if `chunk_size` is zero.
    pub fn validate(&self) -> PoolResult<()> {
        if self.chunk_size == 0 {
            return Err(PoolError::InvalidConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds a growable pool, whatever `kind` says.
    ///
    /// # Errors
    ///
    /// As [`GrowablePool::from_config`].
    pub fn build_growable(&self) -> PoolResult<GrowablePool> {
        GrowablePool::from_config(self)
    }

    /// Builds a fixed-capacity pool, whatever `kind` says.
    ///
    /// # Errors
    ///
    /// As [`FixedCapacityPool::from_config`].
    pub fn build_fixed(&self) -> PoolResult<FixedCapacityPool> {
        FixedCapacityPool::from_config(self)
    }

    /// Builds the pool variant named by `kind`.
    ///
    /// # Errors
    ///
    /// As the chosen variant's `from_config`.
    pub fn build(&self) -> PoolResult<Box<dyn BlockAllocator>> {
        let pool: Box<dyn BlockAllocator> = match self.kind {
            PoolKind::Growable => Box::new(self.build_growable()?),
            PoolKind::Fixed => Box::new(self.build_fixed()?),
        };
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_growable() {
        let config = PoolConfig::from_toml_str(
            r#"
            kind = "growable"
            element_size = 48
            chunk_size = 256
            "#,
        )
        .unwrap();
        assert_eq!(config, PoolConfig::new(PoolKind::Growable, 48, 256));
    }

    #[test]
    fn test_kind_defaults_to_growable() {
        let config = PoolConfig::from_toml_str("element_size = 8\nchunk_size = 4").unwrap();
        assert_eq!(config.kind, PoolKind::Growable);
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let result = PoolConfig::from_toml_str("element_size = 8\nchunk_size = 0");
        assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let result = PoolConfig::from_toml_str("element_size = \"big\"");
        assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = PoolConfig::from_toml_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PoolConfig::new(PoolKind::Fixed, 64, 16);
        let text = config.to_toml_string().unwrap();
        assert_eq!(PoolConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_build_by_kind() {
        let mut fixed = PoolConfig::new(PoolKind::Fixed, 16, 2).build().unwrap();
        fixed.malloc().unwrap();
        fixed.malloc().unwrap();
        assert!(matches!(fixed.malloc(), Err(PoolError::Exhausted { .. })));

        let mut growable = PoolConfig::new(PoolKind::Growable, 16, 2).build().unwrap();
        for _ in 0..3 {
            growable.malloc().unwrap();
        }
        assert_eq!(growable.capacity(), 4);
    }

    #[test]
    fn test_for_type() {
        let config = PoolConfig::for_type::<[u64; 4]>(PoolKind::Fixed, 8);
        assert_eq!(config.element_size, 32);
        assert_eq!(config.build_fixed().unwrap().capacity(), 8);
    }
}
