//! Recorder configuration.

use crate::error::{RecorderError, RecorderResult};
use crate::record::MAX_RECORD_LEN;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default slot capacity in bytes.
pub const DEFAULT_SLOT_CAPACITY: usize = 16 * 1024;

/// Default exclusive upper bound on the file index.
pub const DEFAULT_MAX_FILE_INDEX: u32 = 0x1_0000;

/// Configuration for a [`crate::Recorder`].
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Directory that holds the log files.
    pub folder: PathBuf,

    /// File name pattern inside `folder`.
    pub file_name: FileNameTemplate,

    /// Capacity of each of the two slots in bytes.
    pub slot_capacity: usize,

    /// Free space kept in the active slot before handing it to the flush path.
    ///
    /// The active slot is swapped once `fill + len + reserve_margin` reaches
    /// the capacity. Defaults to the worst-case record length so the slot is
    /// handed over while it can still take one more record.
    pub reserve_margin: usize,

    /// File indices are probed from 0 up to, but excluding, this value.
    pub max_file_index: u32,

    /// Start a new file once this many bytes were written to the current one.
    pub rotate_after_bytes: Option<u64>,

    /// Delete empty `.log` files when a session opens.
    pub prune_on_open: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("/beacons"),
            file_name: FileNameTemplate::default(),
            slot_capacity: DEFAULT_SLOT_CAPACITY,
            reserve_margin: MAX_RECORD_LEN,
            max_file_index: DEFAULT_MAX_FILE_INDEX,
            rotate_after_bytes: None,
            prune_on_open: true,
        }
    }
}

impl RecorderConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the log folder.
    #[must_use]
    pub fn folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = folder.into();
        self
    }

    /// Sets the file name pattern.
    #[must_use]
    pub fn file_name(mut self, template: FileNameTemplate) -> Self {
        self.file_name = template;
        self
    }

    /// Sets the slot capacity.
    #[must_use]
    pub const fn slot_capacity(mut self, bytes: usize) -> Self {
        self.slot_capacity = bytes;
        self
    }

    /// Sets the reserve margin.
    #[must_use]
    pub const fn reserve_margin(mut self, bytes: usize) -> Self {
        self.reserve_margin = bytes;
        self
    }

    /// Sets the exclusive upper bound on file indices.
    #[must_use]
    pub const fn max_file_index(mut self, limit: u32) -> Self {
        self.max_file_index = limit;
        self
    }

    /// Enables size-based rotation.
    #[must_use]
    pub const fn rotate_after_bytes(mut self, bytes: u64) -> Self {
        self.rotate_after_bytes = Some(bytes);
        self
    }

    /// Sets whether empty files are pruned on open.
    #[must_use]
    pub const fn prune_on_open(mut self, value: bool) -> Self {
        self.prune_on_open = value;
        self
    }

    /// Checks that the configuration can be used.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::InvalidConfig`] if a slot cannot hold a
    /// worst-case record plus the reserve margin, or if a limit is zero.
    pub fn validate(&self) -> RecorderResult<()> {
        let minimum = MAX_RECORD_LEN + self.reserve_margin + 1;
        if self.slot_capacity < minimum {
            return Err(RecorderError::invalid_config(format!(
                "slot capacity {} is below the minimum of {minimum} bytes",
                self.slot_capacity
            )));
        }
        if self.max_file_index == 0 {
            return Err(RecorderError::invalid_config(
                "max_file_index must be at least 1",
            ));
        }
        if self.rotate_after_bytes == Some(0) {
            return Err(RecorderError::invalid_config(
                "rotate_after_bytes must be at least 1",
            ));
        }
        Ok(())
    }
}

/// A log file name with one integer placeholder.
///
/// The placeholder is `{index}` for a plain integer or `{index:0N}` for a
/// zero-padded integer of width `N` (1 to 10).
///
/// ```rust
/// use beacon_recorder::FileNameTemplate;
///
/// let plain: FileNameTemplate = "log_{index}".parse().unwrap();
/// assert_eq!(plain.render(5), "log_5");
///
/// let padded: FileNameTemplate = "LOG_{index:04}.log".parse().unwrap();
/// assert_eq!(padded.render(12), "LOG_0012.log");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameTemplate {
    prefix: String,
    suffix: String,
    width: Option<usize>,
}

const PLACEHOLDER: &str = "{index";

impl FileNameTemplate {
    /// Parses a template.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::InvalidConfig`] if the placeholder is missing,
    /// malformed or repeated, or if the template contains a path separator.
    pub fn parse(template: &str) -> RecorderResult<Self> {
        if template.contains('/') || template.contains('\\') {
            return Err(RecorderError::invalid_config(format!(
                "file name template {template:?} contains a path separator"
            )));
        }
        let start = template.find(PLACEHOLDER).ok_or_else(|| {
            RecorderError::invalid_config(format!(
                "file name template {template:?} has no {{index}} placeholder"
            ))
        })?;
        let rest = &template[start + PLACEHOLDER.len()..];
        let close = rest.find('}').ok_or_else(|| {
            RecorderError::invalid_config(format!(
                "unterminated placeholder in file name template {template:?}"
            ))
        })?;

        let width = match &rest[..close] {
            "" => None,
            placeholder => {
                let width = placeholder
                    .strip_prefix(":0")
                    .and_then(|w| w.parse::<usize>().ok())
                    .filter(|w| (1..=10).contains(w))
                    .ok_or_else(|| {
                        RecorderError::invalid_config(format!(
                            "bad placeholder format {placeholder:?} in {template:?}"
                        ))
                    })?;
                Some(width)
            }
        };

        let prefix = &template[..start];
        let suffix = &rest[close + 1..];
        if [prefix, suffix]
            .iter()
            .any(|part| part.contains('{') || part.contains('}'))
        {
            return Err(RecorderError::invalid_config(format!(
                "file name template {template:?} must contain exactly one placeholder"
            )));
        }

        Ok(Self {
            prefix: prefix.to_owned(),
            suffix: suffix.to_owned(),
            width,
        })
    }

    /// Renders the file name for `index`.
    #[must_use]
    pub fn render(&self, index: u32) -> String {
        match self.width {
            Some(width) => format!("{}{index:0width$}{}", self.prefix, self.suffix),
            None => format!("{}{index}{}", self.prefix, self.suffix),
        }
    }
}

impl Default for FileNameTemplate {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: ".log".to_owned(),
            width: None,
        }
    }
}

impl FromStr for FileNameTemplate {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FileNameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.width {
            Some(width) => write!(f, "{}{{index:0{width}}}{}", self.prefix, self.suffix),
            None => write!(f, "{}{{index}}{}", self.prefix, self.suffix),
        }
    }
}
