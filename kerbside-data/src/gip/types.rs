//! Mapping from export type descriptors to relational column types.
//!
//! The mapping is a pure function over the descriptor token. Match order is
//! load-bearing: the scaled and sized forms must be recognised before the
//! bare `decimal(P)` form, and the precision thresholds 4/10/18 are a fixed
//! policy table.

/// A primitive type descriptor parsed from one `frm` field.
///
/// # Examples
/// ```
/// use kerbside_data::gip::TypeToken;
///
/// assert_eq!(TypeToken::parse("decimal(9)").column_type(), "integer");
/// assert_eq!(TypeToken::parse("string(10)").column_type(), "varchar(10)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeToken {
    /// Bare `string`.
    Text,
    /// `string(N)` with an explicit length.
    SizedText(u32),
    /// `decimal(P,S)` with precision and scale.
    Scaled {
        /// Total number of digits.
        precision: u32,
        /// Digits after the decimal point.
        scale: u32,
    },
    /// `decimal(P)` with precision only.
    Fixed {
        /// Total number of digits.
        precision: u32,
    },
    /// Any unrecognised descriptor, kept verbatim.
    Other(String),
}

impl TypeToken {
    /// Parse one descriptor token. Unrecognised tokens are preserved as-is.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        if token == "string" {
            return Self::Text;
        }
        if let Some(length) = parenthesised(token, "string").and_then(|arg| arg.parse().ok()) {
            return Self::SizedText(length);
        }
        if let Some(argument) = parenthesised(token, "decimal") {
            if let Some((precision, scale)) = argument.split_once(',') {
                if let (Ok(precision), Ok(scale)) = (precision.parse(), scale.parse()) {
                    return Self::Scaled { precision, scale };
                }
            } else if let Ok(precision) = argument.parse() {
                return Self::Fixed { precision };
            }
        }
        Self::Other(token.to_owned())
    }

    /// Relational column type for this descriptor.
    #[must_use]
    pub fn column_type(&self) -> String {
        match self {
            Self::Text => "varchar".to_owned(),
            Self::SizedText(length) => format!("varchar({length})"),
            Self::Scaled { precision, scale } => format!("numeric({precision},{scale})"),
            Self::Fixed { precision } => match precision {
                0..=4 => "smallint".to_owned(),
                5..=10 => "integer".to_owned(),
                11..=18 => "bigint".to_owned(),
                _ => format!("numeric({precision})"),
            },
            Self::Other(token) => token.clone(),
        }
    }
}

fn parenthesised<'a>(token: &'a str, keyword: &str) -> Option<&'a str> {
    token
        .strip_prefix(keyword)?
        .strip_prefix('(')?
        .strip_suffix(')')
}

/// Map one raw descriptor token to its relational column type.
#[must_use]
pub fn column_type(token: &str) -> String {
    TypeToken::parse(token).column_type()
}

/// Normalise a column name for the generated schema.
///
/// `offset` collides with a reserved word and is renamed to `offset_`; every
/// other name passes through unchanged.
#[must_use]
pub fn column_name(raw: &str) -> String {
    if raw == "offset" {
        "offset_".to_owned()
    } else {
        raw.to_owned()
    }
}
