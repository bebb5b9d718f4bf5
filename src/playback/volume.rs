//! Process-wide output gain.

/// Output gain clamped to `[0.0, 1.0]`.
///
/// ```
/// use soundboard::playback::Volume;
///
/// assert_eq!(Volume::new(-0.3).get(), 0.0);
/// assert_eq!(Volume::new(1.7).get(), 1.0);
/// assert_eq!(Volume::new(0.25).get(), 0.25);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume(f32);

impl Volume {
    pub const MIN: f32 = 0.0;
    pub const MAX: f32 = 1.0;

    /// Clamp `value` into range.  NaN maps to silence.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(Self::MIN);
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_values() {
        assert_eq!(Volume::new(-0.3).get(), 0.0);
        assert_eq!(Volume::new(1.7).get(), 1.0);
        assert_eq!(Volume::new(f32::INFINITY).get(), 1.0);
        assert_eq!(Volume::new(f32::NEG_INFINITY).get(), 0.0);
    }

    #[test]
    fn keeps_in_range_values_and_bounds() {
        assert_eq!(Volume::new(0.0).get(), 0.0);
        assert_eq!(Volume::new(0.42).get(), 0.42);
        assert_eq!(Volume::new(1.0).get(), 1.0);
    }

    #[test]
    fn nan_is_silence() {
        assert_eq!(Volume::new(f32::NAN).get(), 0.0);
    }
}
