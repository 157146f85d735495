use serde::{Deserialize, Serialize};

/// Grade point average on the 0.00 - 4.00 scale, kept to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Gpa(f64);

impl Gpa {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 4.0;

    pub fn new(value: f64) -> Result<Self, GpaError> {
        if !value.is_finite() {
            return Err(GpaError::NotANumber);
        }
        let rounded = (value * 100.0).round() / 100.0;
        if !(Self::MIN..=Self::MAX).contains(&rounded) {
            return Err(GpaError::OutOfRange(value));
        }
        Ok(Self(rounded))
    }

    pub fn parse(input: &str) -> Result<Self, GpaError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        let value: f64 = trimmed.parse().map_err(|_| GpaError::NotANumber)?;
        Self::new(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Gpa {
    type Error = GpaError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Gpa::new(value)
    }
}

impl From<Gpa> for f64 {
    fn from(gpa: Gpa) -> Self {
        gpa.0
    }
}

impl std::fmt::Display for Gpa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GpaError {
    NotANumber,
    OutOfRange(f64),
}

impl std::fmt::Display for GpaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpaError::NotANumber => write!(f, "GPA must be a number"),
            GpaError::OutOfRange(v) => {
                write!(f, "GPA {} is outside the 0.0-4.0 scale", v)
            }
        }
    }
}

impl std::error::Error for GpaError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpa_bounds() {
        assert_eq!(Gpa::new(0.0).unwrap().value(), 0.0);
        assert_eq!(Gpa::new(4.0).unwrap().value(), 4.0);
        assert_eq!(Gpa::new(4.01), Err(GpaError::OutOfRange(4.01)));
        assert_eq!(Gpa::new(-0.5), Err(GpaError::OutOfRange(-0.5)));
        assert_eq!(Gpa::new(f64::NAN), Err(GpaError::NotANumber));
    }

    #[test]
    fn test_gpa_rounds_to_hundredths() {
        assert_eq!(Gpa::new(3.256).unwrap().value(), 3.26);
        assert_eq!(Gpa::new(3.256).unwrap().to_string(), "3.26");
    }

    #[test]
    fn test_gpa_parse() {
        assert_eq!(Gpa::parse(" 3.5 ").unwrap().value(), 3.5);
        assert_eq!(Gpa::parse("").unwrap(), Gpa::default());
        assert_eq!(Gpa::parse("A+"), Err(GpaError::NotANumber));
    }
}
