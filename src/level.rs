/*!
The [`Level`] type.

Levels follow the usual ETW ordering: lower numbers are more severe, and a listener enabled at
some level receives every event at that level or below it. [`Level::LogAlways`] is special in
both directions: events at that level pass any listener, and listeners at that level receive
everything.
*/

use core::{fmt, str::FromStr};

use crate::value::{ToValue, Value};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    LogAlways = 0,
    Critical = 1,
    Error = 2,
    Warning = 3,
    Informational = 4,
    Verbose = 5,
}

impl Level {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /**
    Whether a listener enabled at `self` should receive an event written at `event`.
    */
    pub fn admits(self, event: Level) -> bool {
        self == Level::LogAlways || event == Level::LogAlways || event <= self
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::LogAlways => "LogAlways",
            Level::Critical => "Critical",
            Level::Error => "Error",
            Level::Warning => "Warning",
            Level::Informational => "Informational",
            Level::Verbose => "Verbose",
        })
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lvl = s.as_bytes();

        match lvl.first() {
            Some(b'L') | Some(b'l') => parse(lvl, b"LOGALWAYS", Level::LogAlways),
            Some(b'C') | Some(b'c') => {
                parse(lvl, b"CRITICAL", Level::Critical)
                    .or_else(|_| parse(lvl, b"CRT", Level::Critical))
            }
            Some(b'E') | Some(b'e') => {
                parse(lvl, b"ERROR", Level::Error)
                    .or_else(|_| parse(lvl, b"ERR", Level::Error))
            }
            Some(b'W') | Some(b'w') => {
                parse(lvl, b"WARNING", Level::Warning)
                    .or_else(|_| parse(lvl, b"WRN", Level::Warning))
            }
            Some(b'I') | Some(b'i') => parse(lvl, b"INFORMATIONAL", Level::Informational),
            Some(b'V') | Some(b'v') => {
                parse(lvl, b"VERBOSE", Level::Verbose)
                    .or_else(|_| parse(lvl, b"VRB", Level::Verbose))
            }
            Some(_) => Err(ParseLevelError {}),
            None => Err(ParseLevelError {}),
        }
    }
}

fn parse(
    mut input: &[u8],
    mut expected_uppercase: &[u8],
    ok: Level,
) -> Result<Level, ParseLevelError> {
    // Assume the first character has already been matched
    input = &input[1..];
    expected_uppercase = &expected_uppercase[1..];

    // Doesn't require a full match of the expected content
    // For example, `INFO` will match `INFORMATIONAL`
    while let Some(b) = input.first() {
        let Some(e) = expected_uppercase.first() else {
            return Err(ParseLevelError {});
        };

        if b.to_ascii_uppercase() != *e {
            return Err(ParseLevelError {});
        }

        expected_uppercase = &expected_uppercase[1..];
        input = &input[1..];
    }

    Ok(ok)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError {}

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("the input was not a valid level")
    }
}

impl std::error::Error for ParseLevelError {}

impl Default for Level {
    fn default() -> Self {
        Level::Informational
    }
}

impl ToValue for Level {
    fn to_value(&self) -> Value {
        Value::capture_display(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_roundtrip() {
        for lvl in [
            Level::LogAlways,
            Level::Critical,
            Level::Error,
            Level::Warning,
            Level::Informational,
            Level::Verbose,
        ] {
            let fmt = lvl.to_string();

            let parsed: Level = fmt.parse().unwrap();

            assert_eq!(lvl, parsed, "{}", fmt);
        }
    }

    #[test]
    fn level_parse_abbreviated() {
        assert_eq!(Level::Informational, "info".parse().unwrap());
        assert_eq!(Level::Warning, "WRN".parse().unwrap());
        assert_eq!(Level::Verbose, "vrb".parse().unwrap());

        assert!("informationals".parse::<Level>().is_err());
        assert!("".parse::<Level>().is_err());
        assert!("debug".parse::<Level>().is_err());
    }

    #[test]
    fn level_admits() {
        assert!(Level::Verbose.admits(Level::Informational));
        assert!(Level::Informational.admits(Level::Informational));
        assert!(!Level::Warning.admits(Level::Informational));

        assert!(Level::LogAlways.admits(Level::Verbose));
        assert!(Level::Critical.admits(Level::LogAlways));
    }
}
