//! Time bases and timestamp rescaling.
//!
//! Every frame handed to the overlay stage carries a presentation timestamp
//! in [`TIME_BASE_US`]. Sources with other native time bases rescale before
//! handing frames over, so the two inputs can be compared directly.

use serde::{Deserialize, Serialize};

/// Presentation timestamp, in units of the stream's time base.
pub type Pts = i64;

/// A rational number used for time bases, frame rates and aspect ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

/// Microsecond time base shared by all stage inputs and outputs.
pub const TIME_BASE_US: Rational = Rational {
    num: 1,
    den: 1_000_000,
};

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Square-pixel aspect ratio.
    pub const fn one() -> Self {
        Self { num: 1, den: 1 }
    }

    pub fn is_valid(self) -> bool {
        self.den != 0
    }

    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Swap numerator and denominator, e.g. to turn a frame rate into the
    /// duration of one frame.
    pub fn invert(self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }

    /// Parse `"num/den"` or `"num:den"` (as printed by ffprobe), or a bare
    /// integer.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (num, den) = match text.split_once(|c: char| c == '/' || c == ':') {
            Some((n, d)) => (n.trim().parse().ok()?, d.trim().parse().ok()?),
            None => (text.parse().ok()?, 1),
        };
        Some(Self { num, den })
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::one()
    }
}

impl std::fmt::Display for Rational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Convert `value` from time base `from` to time base `to`, rounding to the
/// nearest unit (halves away from zero).
///
/// Returns `None` when either time base has a zero term.
pub fn rescale(value: i64, from: Rational, to: Rational) -> Option<i64> {
    if from.num == 0 || from.den == 0 || to.num == 0 || to.den == 0 {
        return None;
    }
    let numer = value as i128 * from.num as i128 * to.den as i128;
    let denom = from.den as i128 * to.num as i128;
    let (numer, denom) = if denom < 0 {
        (-numer, -denom)
    } else {
        (numer, denom)
    };
    let half = denom / 2;
    let rounded = if numer >= 0 {
        (numer + half) / denom
    } else {
        (numer - half) / denom
    };
    i64::try_from(rounded).ok()
}
