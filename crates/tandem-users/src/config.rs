//! Users domain configuration.

use serde::{Deserialize, Serialize};

/// Password hashing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 time cost (passes).
    #[serde(default = "default_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 lanes.
    #[serde(default = "default_parallelism")]
    pub argon2_parallelism: u32,
}

fn default_memory_kib() -> u32 {
    19 * 1024
}

fn default_iterations() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_kib: default_memory_kib(),
            argon2_iterations: default_iterations(),
            argon2_parallelism: default_parallelism(),
        }
    }
}

impl SecurityConfig {
    /// Cheap parameters for tests and demos.
    pub fn fast_for_tests() -> Self {
        Self {
            argon2_memory_kib: 256,
            argon2_iterations: 1,
            argon2_parallelism: 1,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.argon2_iterations == 0 {
            return Err("security.argon2_iterations must be greater than zero".into());
        }
        if self.argon2_parallelism == 0 {
            return Err("security.argon2_parallelism must be greater than zero".into());
        }
        if self.argon2_memory_kib < 8 * self.argon2_parallelism {
            return Err(format!(
                "security.argon2_memory_kib must be at least {} for {} lanes",
                8 * self.argon2_parallelism,
                self.argon2_parallelism
            ));
        }
        Ok(())
    }
}

/// Store labels and namespace used in the cache keys of the users stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStoreLabels {
    #[serde(default = "default_primary")]
    pub primary: String,

    #[serde(default = "default_secondary")]
    pub secondary: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_primary() -> String {
    "mongoose".to_string()
}

fn default_secondary() -> String {
    "typeorm".to_string()
}

fn default_namespace() -> String {
    "users".to_string()
}

impl Default for UserStoreLabels {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            secondary: default_secondary(),
            namespace: default_namespace(),
        }
    }
}
