//! Volume parsing and normalization
//!
//! Callers express volume either on a 0-10 integer scale or as an `"a/b"`
//! ratio string; both normalize to an f64 ratio in [0, 1] that is applied
//! to the live resource.

use crate::error::{Error, Result};

/// A caller-supplied volume setting, prior to normalization
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeSpec {
    /// Plain level on the 0-10 scale; normalized to `level / 10`
    Level(u32),
    /// `"a/b"` ratio string; normalized to `a / b`. A bare `"n"` is read
    /// as `n/10`.
    Ratio(String),
}

impl VolumeSpec {
    /// Normalize to a ratio in [0, 1].
    ///
    /// Fails with `InvalidVolume` when the level exceeds 10, the ratio's
    /// numerator exceeds its denominator, or the string does not parse.
    pub fn normalize(&self) -> Result<f64> {
        match self {
            VolumeSpec::Level(level) => {
                if *level > 10 {
                    return Err(Error::InvalidVolume(format!(
                        "the maximum volume level is 10, got {}",
                        level
                    )));
                }
                Ok(*level as f64 / 10.0)
            }
            VolumeSpec::Ratio(text) => {
                let text = text.trim();
                let (num, den) = match text.split_once('/') {
                    Some((a, b)) => (a.trim(), b.trim()),
                    None => (text, "10"),
                };
                let num: u32 = num
                    .parse()
                    .map_err(|_| Error::InvalidVolume(format!("not a ratio: {:?}", text)))?;
                let den: u32 = den
                    .parse()
                    .map_err(|_| Error::InvalidVolume(format!("not a ratio: {:?}", text)))?;
                if den == 0 {
                    return Err(Error::InvalidVolume("zero denominator".into()));
                }
                if num > den {
                    return Err(Error::InvalidVolume(format!(
                        "the base volume may not be higher than the max volume: {}/{}",
                        num, den
                    )));
                }
                Ok(num as f64 / den as f64)
            }
        }
    }
}

impl From<u32> for VolumeSpec {
    fn from(level: u32) -> Self {
        VolumeSpec::Level(level)
    }
}

impl From<&str> for VolumeSpec {
    fn from(ratio: &str) -> Self {
        VolumeSpec::Ratio(ratio.to_string())
    }
}

impl From<String> for VolumeSpec {
    fn from(ratio: String) -> Self {
        VolumeSpec::Ratio(ratio)
    }
}
