use std::fmt;

use super::error::LookupError;

const PREFIX_LEN: usize = 3;
const DIGITS_LEN: usize = 10;

/// Service center prefixes and the offices they stand for
const SERVICE_CENTERS: &[(&str, &str)] = &[
  ("WAC", "California Service Center"),
  ("LIN", "Nebraska Service Center"),
  ("SRC", "Texas Service Center"),
  ("EAC", "Vermont Service Center"),
  ("IOE", "USCIS Electronic Immigration System"),
  ("MSC", "National Benefits Center"),
  ("NBC", "National Benefits Center"),
  ("YSC", "Potomac Service Center"),
];

/// A validated receipt number: 3 uppercase letters followed by 10 digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptNumber(String);

impl ReceiptNumber {
  /// Validate user input. Surrounding whitespace is ignored, case is not.
  pub fn parse(input: &str) -> Result<Self, LookupError> {
    let input = input.trim();
    if input.is_empty() {
      return Err(LookupError::EmptyReceipt);
    }

    let bytes = input.as_bytes();
    let valid = bytes.len() == PREFIX_LEN + DIGITS_LEN
      && bytes[..PREFIX_LEN].iter().all(u8::is_ascii_uppercase)
      && bytes[PREFIX_LEN..].iter().all(u8::is_ascii_digit);

    if valid {
      Ok(Self(input.to_string()))
    } else {
      Err(LookupError::InvalidReceipt(input.to_string()))
    }
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// The three-letter service center prefix
  pub fn prefix(&self) -> &str {
    &self.0[..PREFIX_LEN]
  }

  /// Name of the issuing service center, or the bare prefix if unknown
  pub fn service_center(&self) -> &str {
    let prefix = self.prefix();
    SERVICE_CENTERS
      .iter()
      .find(|(code, _)| *code == prefix)
      .map(|(_, name)| *name)
      .unwrap_or(prefix)
  }
}

impl fmt::Display for ReceiptNumber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}
