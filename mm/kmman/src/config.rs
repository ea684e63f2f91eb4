// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Run-time policy loaded from TOML.
//!
//! ```toml
//! log_level = "debug"
//! deny_write_exec = true
//! shm_prefix = "myapp"
//! populate_by_default = false
//! ```
//!
//! Every key is optional. The settings may also live under a `[kmman]`
//! table, which takes precedence over top-level keys.

use std::path::Path;

use kerrno::{KError, KErrorKind, KResult, Op};
use log::{debug, warn};
use spin::Once;
use toml_edit::{DocumentMut, Item, Table};

/// Environment variable naming a config file for [`MmanConfig::from_env`].
pub const CONFIG_ENV: &str = "KMMAN_CONFIG";

const DEFAULT_SHM_PREFIX: &str = "kmman";

static INSTALLED: Once<MmanConfig> = Once::new();
static FALLBACK: Once<MmanConfig> = Once::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmanConfig {
    /// Passed to `klogger::set_log_level` on [`install`](Self::install).
    pub log_level: Option<String>,
    /// Reject protections that are both writable and executable.
    pub deny_write_exec: bool,
    /// Prefix for names produced by `SharedMemory::unique_name`.
    pub shm_prefix: String,
    /// New `MapOptions` start with `MAP_POPULATE`.
    pub populate_by_default: bool,
}

impl Default for MmanConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            deny_write_exec: cfg!(feature = "wx-enforcement"),
            shm_prefix: DEFAULT_SHM_PREFIX.into(),
            populate_by_default: false,
        }
    }
}

impl MmanConfig {
    pub fn from_toml_str(text: &str) -> KResult<Self> {
        let doc: DocumentMut = text.parse().map_err(|e| {
            warn!("config: {e}");
            KError::invalid(Op::Config)
        })?;

        let mut cfg = Self::default();
        cfg.apply_table(doc.as_table())?;
        if let Some(item) = doc.get("kmman") {
            let table = item.as_table().ok_or(KError::invalid(Op::Config))?;
            cfg.apply_table(table)?;
        }
        Ok(cfg)
    }

    fn apply_table(&mut self, table: &Table) -> KResult {
        for (key, item) in table.iter() {
            match key {
                "log_level" => self.log_level = Some(expect_str(key, item)?.to_owned()),
                "deny_write_exec" => {
                    // The build-time feature cannot be switched off at run time.
                    self.deny_write_exec = expect_bool(key, item)? || cfg!(feature = "wx-enforcement")
                }
                "shm_prefix" => {
                    let prefix = expect_str(key, item)?;
                    if prefix.is_empty() || prefix.contains(['/', '\0']) {
                        warn!("config: shm_prefix {prefix:?} cannot be part of a segment name");
                        return Err(KError::invalid(Op::Config));
                    }
                    self.shm_prefix = prefix.to_owned();
                }
                "populate_by_default" => self.populate_by_default = expect_bool(key, item)?,
                "kmman" => {}
                other => warn!("config: ignoring unknown key `{other}`"),
            }
        }
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> KResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| match e.raw_os_error() {
            Some(code) => KError::from_errno(Op::Config, code),
            None => KError::new(KErrorKind::Other, Op::Config),
        })?;
        debug!("config: loaded {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Loads the file named by `KMMAN_CONFIG`, or `Ok(None)` when it is unset.
    pub fn from_env() -> KResult<Option<Self>> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(path).map(Some),
            None => Ok(None),
        }
    }

    /// Makes this the process-wide configuration.
    ///
    /// Only the first call takes effect; later calls return `false`.
    pub fn install(self) -> bool {
        let mut fresh = false;
        let cfg = INSTALLED.call_once(|| {
            fresh = true;
            self
        });
        if fresh {
            if let Some(level) = &cfg.log_level {
                klogger::set_log_level(level);
            }
            debug!("config: installed {cfg:?}");
        }
        fresh
    }

    /// The installed configuration, or the defaults if none was installed.
    pub fn current() -> &'static MmanConfig {
        match INSTALLED.get() {
            Some(cfg) => cfg,
            None => FALLBACK.call_once(Self::default),
        }
    }
}

fn expect_str<'a>(key: &str, item: &'a Item) -> KResult<&'a str> {
    item.as_str().ok_or_else(|| {
        warn!("config: `{key}` must be a string");
        KError::invalid(Op::Config)
    })
}

fn expect_bool(key: &str, item: &Item) -> KResult<bool> {
    item.as_bool().ok_or_else(|| {
        warn!("config: `{key}` must be a boolean");
        KError::invalid(Op::Config)
    })
}

/// Whether W+X protections are refused, by feature or by configuration.
pub(crate) fn deny_write_exec() -> bool {
    cfg!(feature = "wx-enforcement") || MmanConfig::current().deny_write_exec
}
