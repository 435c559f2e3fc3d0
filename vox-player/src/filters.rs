//! Filter-argument list management
//!
//! Each channel carries an ordered, deduplicated list of extra encoder
//! arguments that the resource factory splices into its pipeline. The
//! default arguments the factory always needs are protected: they cannot be
//! added twice or removed.

/// Encoder arguments every pipeline invocation carries.
///
/// User filters are appended after these; attempts to add or remove one of
/// them through the filter API are ignored.
pub const DEFAULT_ARGS: &[&str] = &[
    "-reconnect",
    "1",
    "-reconnect_streamed",
    "1",
    "-reconnect_delay_max",
    "5",
    "-analyzeduration",
    "0",
    "-loglevel",
    "0",
    "-f",
    "s16le",
    "-ar",
    "48000",
    "-ac",
    "2",
];

/// Ordered, deduplicated list of user filter arguments for one channel
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    args: Vec<String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add filter arguments, preserving order and skipping duplicates and
    /// protected defaults. Returns true if the set changed.
    pub fn add<I, S>(&mut self, filters: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut changed = false;
        for filter in filters {
            let filter = filter.into();
            if self.args.iter().any(|f| f == &filter) {
                continue;
            }
            if DEFAULT_ARGS.contains(&filter.as_str()) {
                continue;
            }
            self.args.push(filter);
            changed = true;
        }
        changed
    }

    /// Remove filter arguments; protected defaults are never present so
    /// they cannot be removed. Returns true if the set changed.
    pub fn remove<I, S>(&mut self, filters: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.args.len();
        for filter in filters {
            if let Some(index) = self.args.iter().position(|f| f == filter.as_ref()) {
                self.args.remove(index);
            }
        }
        before != self.args.len()
    }

    /// Current user filter arguments, in insertion order
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.args.clone()
    }
}
