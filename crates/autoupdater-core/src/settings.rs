//! # Settings
//!
//! The validated configuration for one autoupdater run. The settings
//! provider (config file plus command line) assembles a [`SettingsBuilder`]
//! and calls [`SettingsBuilder::build`]; any missing or invalid field is a
//! [`SettingsError`] and the process exits before the engine starts.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;

use crate::error::SettingsError;
use crate::manifest::normalize_key_id;

/// Immutable run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    branch: String,
    enabled: bool,
    force: bool,
    fallback: bool,
    mirrors: Vec<String>,
    public_keys: BTreeSet<String>,
    signature_threshold: NonZeroUsize,
    previous_version: Option<String>,
}

impl Settings {
    /// Start building settings for the given branch.
    pub fn builder(branch: impl Into<String>) -> SettingsBuilder {
        SettingsBuilder {
            branch: branch.into(),
            ..SettingsBuilder::default()
        }
    }

    /// Selected release branch.
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Whether updates are administratively enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the enabled switch is bypassed.
    pub fn force(&self) -> bool {
        self.force
    }

    /// Whether the rollout gate uses the delayed-certainty fallback policy.
    pub fn fallback(&self) -> bool {
        self.fallback
    }

    /// Candidate mirrors, in configuration order. Never empty.
    pub fn mirrors(&self) -> &[String] {
        &self.mirrors
    }

    /// Trust anchors as normalized lowercase hex key ids. Never empty.
    pub fn public_keys(&self) -> &BTreeSet<String> {
        &self.public_keys
    }

    /// Minimum number of distinct valid signatures.
    pub fn signature_threshold(&self) -> NonZeroUsize {
        self.signature_threshold
    }

    /// Version identifier of the currently installed firmware, if known.
    pub fn previous_version(&self) -> Option<&str> {
        self.previous_version.as_deref()
    }

    /// `true` unless updates are disabled and not forced.
    pub fn updates_permitted(&self) -> bool {
        self.enabled || self.force
    }
}

/// Builder for [`Settings`].
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    branch: String,
    enabled: bool,
    force: bool,
    fallback: bool,
    mirrors: Vec<String>,
    public_keys: BTreeSet<String>,
    signature_threshold: usize,
    previous_version: Option<String>,
}

impl SettingsBuilder {
    /// Set the administrative enabled switch.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Bypass the enabled switch.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Use the fallback rollout policy.
    pub fn fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    /// Append mirrors.
    pub fn mirrors<I, S>(mut self, mirrors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mirrors.extend(mirrors.into_iter().map(Into::into));
        self
    }

    /// Add trust anchors. Key ids are normalized to lowercase.
    pub fn public_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.public_keys
            .extend(keys.into_iter().map(|k| normalize_key_id(k.as_ref())));
        self
    }

    /// Minimum number of distinct valid signatures.
    pub fn signature_threshold(mut self, threshold: usize) -> Self {
        self.signature_threshold = threshold;
        self
    }

    /// Installed firmware version.
    pub fn previous_version(mut self, version: Option<String>) -> Self {
        self.previous_version = version;
        self
    }

    /// Validate and freeze the settings.
    pub fn build(self) -> Result<Settings, SettingsError> {
        let branch = self.branch.trim().to_string();
        if branch.is_empty() {
            return Err(SettingsError::MissingBranch);
        }
        let signature_threshold =
            NonZeroUsize::new(self.signature_threshold).ok_or(SettingsError::ZeroThreshold)?;
        if self.mirrors.is_empty() {
            return Err(SettingsError::NoMirrors);
        }
        if self.public_keys.is_empty() {
            return Err(SettingsError::NoPublicKeys);
        }
        Ok(Settings {
            branch,
            enabled: self.enabled,
            force: self.force,
            fallback: self.fallback,
            mirrors: self.mirrors,
            public_keys: self.public_keys,
            signature_threshold,
            previous_version: self.previous_version,
        })
    }
}
