//! Typed name definitions.

use crate::{define_name, IdError, MAX_NAME_LEN};

define_name!(JobName, "job name");
define_name!(MachineId, "machine ID");
define_name!(RoleName, "role name");

/// Shared validation for every name type.
#[doc(hidden)]
pub fn validate(kind: &'static str, s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty { kind });
    }

    if s.len() > MAX_NAME_LEN {
        return Err(IdError::TooLong {
            kind,
            len: s.len(),
            max: MAX_NAME_LEN,
        });
    }

    if let Some(ch) = s.chars().find(|c| !is_name_char(*c)) {
        return Err(IdError::InvalidChar {
            kind,
            ch,
            value: s.to_string(),
        });
    }

    match s.chars().next() {
        Some(ch @ ('.' | '-')) => Err(IdError::InvalidLeading {
            kind,
            ch,
            value: s.to_string(),
        }),
        _ => Ok(()),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '-')
}
