use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrightnessInputError {
    #[error("Brightness value must be an integer.")]
    NotAnInteger,
    #[error("Brightness value must be between 0 and 100.")]
    OutOfRange,
}

/// Parses a user-entered brightness percentage, accepting surrounding
/// whitespace and rejecting anything outside 0..=100.
pub fn parse_brightness_input(raw: &str) -> Result<u8, BrightnessInputError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| BrightnessInputError::NotAnInteger)?;
    if !(0..=100).contains(&value) {
        return Err(BrightnessInputError::OutOfRange);
    }
    Ok(value as u8)
}
