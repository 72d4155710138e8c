//! CLI configuration loaded from environment variables.
//!
//! Everything except the local ACI has a default, so a plain
//! `ROSTER_LOCAL_ACI=<uuid> roster export out.bin` works against the
//! platform database.

use std::path::PathBuf;

use anyhow::Context;
use roster_shared::constants::MAX_FRAME_SIZE;
use roster_shared::types::{Aci, E164, Pni};
use roster_shared::LocalIdentifiers;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RosterConfig {
    /// Database file. `None` means the platform data directory.
    /// Env: `ROSTER_DB_PATH`
    pub db_path: Option<PathBuf>,

    /// Seal frames with a key derived from this passphrase.
    /// Env: `ROSTER_BACKUP_PASSPHRASE`
    /// Default: unset (plain frames).
    pub passphrase: Option<String>,

    /// Roll back the whole import on the first frame error.
    /// Env: `ROSTER_FAIL_ON_ANY_ERROR` (true/false)
    /// Default: `false`
    pub fail_on_any_error: bool,

    /// Largest frame the importer accepts, in bytes.
    /// Env: `ROSTER_MAX_FRAME_SIZE`
    pub max_frame_size: usize,

    /// Env: `ROSTER_LOCAL_ACI`, `ROSTER_LOCAL_PNI`, `ROSTER_LOCAL_E164`
    pub local_aci: Option<Aci>,
    pub local_pni: Option<Pni>,
    pub local_e164: Option<E164>,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            passphrase: None,
            fail_on_any_error: false,
            max_frame_size: MAX_FRAME_SIZE,
            local_aci: None,
            local_pni: None,
            local_e164: None,
        }
    }
}

impl RosterConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("ROSTER_DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Some(passphrase) = lookup("ROSTER_BACKUP_PASSPHRASE") {
            if !passphrase.is_empty() {
                config.passphrase = Some(passphrase);
            }
        }

        if let Some(val) = lookup("ROSTER_FAIL_ON_ANY_ERROR") {
            config.fail_on_any_error = val == "true" || val == "1";
        }

        if let Some(val) = lookup("ROSTER_MAX_FRAME_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_frame_size = n,
                _ => tracing::warn!(value = %val, "Invalid ROSTER_MAX_FRAME_SIZE, using default"),
            }
        }

        if let Some(val) = lookup("ROSTER_LOCAL_ACI") {
            match Uuid::parse_str(val.trim()) {
                Ok(uuid) => config.local_aci = Some(Aci(uuid)),
                Err(e) => tracing::warn!(error = %e, "Invalid ROSTER_LOCAL_ACI, ignoring"),
            }
        }

        if let Some(val) = lookup("ROSTER_LOCAL_PNI") {
            match Uuid::parse_str(val.trim()) {
                Ok(uuid) => config.local_pni = Some(Pni(uuid)),
                Err(e) => tracing::warn!(error = %e, "Invalid ROSTER_LOCAL_PNI, ignoring"),
            }
        }

        if let Some(val) = lookup("ROSTER_LOCAL_E164") {
            match E164::parse(val.trim()) {
                Ok(e164) => config.local_e164 = Some(e164),
                Err(e) => tracing::warn!(error = %e, "Invalid ROSTER_LOCAL_E164, ignoring"),
            }
        }

        config
    }

    /// The local user's identifiers. Both passes need at least the ACI.
    pub fn local_identifiers(&self) -> anyhow::Result<LocalIdentifiers> {
        let aci = self.local_aci.context("ROSTER_LOCAL_ACI must be set to a valid UUID")?;
        Ok(LocalIdentifiers::new(aci, self.local_pni, self.local_e164.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> RosterConfig {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        RosterConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]);
        assert!(config.db_path.is_none());
        assert!(config.passphrase.is_none());
        assert!(!config.fail_on_any_error);
        assert_eq!(config.max_frame_size, MAX_FRAME_SIZE);
        assert!(config.local_identifiers().is_err());
    }

    #[test]
    fn test_local_identifiers() {
        let config = config_from(&[
            ("ROSTER_LOCAL_ACI", "00000000-0000-0000-0000-000000000001"),
            ("ROSTER_LOCAL_PNI", "not-a-uuid"),
            ("ROSTER_LOCAL_E164", "+15550001111"),
        ]);
        let local = config.local_identifiers().unwrap();
        assert_eq!(local.aci, Aci(Uuid::from_u128(1)));
        assert!(local.pni.is_none());
        assert!(local.e164.is_some());
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("ROSTER_MAX_FRAME_SIZE", "0"),
            ("ROSTER_FAIL_ON_ANY_ERROR", "1"),
            ("ROSTER_BACKUP_PASSPHRASE", ""),
        ]);
        assert_eq!(config.max_frame_size, MAX_FRAME_SIZE);
        assert!(config.fail_on_any_error);
        assert!(config.passphrase.is_none());
    }
}
