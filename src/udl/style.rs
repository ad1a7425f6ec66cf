//! UDL style numbers
//!
//! Every sub-language family owns a contiguous block of style numbers.
//! The first style of each block is that family's default style.

/// A numeric style as stored by the host per byte.
pub type Style = u8;

pub const M_DEFAULT: Style = 0;
pub const M_STAGO: Style = 1;
pub const M_TAGNAME: Style = 2;
pub const M_TAGSPACE: Style = 3;
pub const M_ATTRNAME: Style = 4;
pub const M_OPERATOR: Style = 5;
pub const M_STAGC: Style = 6;
pub const M_EMP_TAGC: Style = 7;
pub const M_STRING: Style = 8;
pub const M_ETAGO: Style = 9;
pub const M_ETAGC: Style = 10;
pub const M_ENTITY: Style = 11;
pub const M_PI: Style = 12;
pub const M_CDATA: Style = 13;
pub const M_COMMENT: Style = 14;

pub const CSS_DEFAULT: Style = 15;
pub const CSS_COMMENT: Style = 16;
pub const CSS_NUMBER: Style = 17;
pub const CSS_STRING: Style = 18;
pub const CSS_WORD: Style = 19;
pub const CSS_IDENTIFIER: Style = 20;
pub const CSS_OPERATOR: Style = 21;

pub const CSL_DEFAULT: Style = 22;
pub const CSL_COMMENT: Style = 23;
pub const CSL_COMMENTBLOCK: Style = 24;
pub const CSL_NUMBER: Style = 25;
pub const CSL_STRING: Style = 26;
pub const CSL_WORD: Style = 27;
pub const CSL_IDENTIFIER: Style = 28;
pub const CSL_OPERATOR: Style = 29;
pub const CSL_REGEX: Style = 30;

pub const SSL_DEFAULT: Style = 31;
pub const SSL_COMMENT: Style = 32;
pub const SSL_COMMENTBLOCK: Style = 33;
pub const SSL_NUMBER: Style = 34;
pub const SSL_STRING: Style = 35;
pub const SSL_WORD: Style = 36;
pub const SSL_IDENTIFIER: Style = 37;
pub const SSL_OPERATOR: Style = 38;
pub const SSL_REGEX: Style = 39;
pub const SSL_VARIABLE: Style = 40;

pub const TPL_DEFAULT: Style = 41;
pub const TPL_COMMENT: Style = 42;
pub const TPL_COMMENTBLOCK: Style = 43;
pub const TPL_NUMBER: Style = 44;
pub const TPL_STRING: Style = 45;
pub const TPL_WORD: Style = 46;
pub const TPL_IDENTIFIER: Style = 47;
pub const TPL_OPERATOR: Style = 48;
pub const TPL_VARIABLE: Style = 49;

/// Highest valid style number
pub const UPPER_BOUND: Style = TPL_VARIABLE;

const NAMES: [&str; UPPER_BOUND as usize + 1] = [
    "M_DEFAULT",
    "M_STAGO",
    "M_TAGNAME",
    "M_TAGSPACE",
    "M_ATTRNAME",
    "M_OPERATOR",
    "M_STAGC",
    "M_EMP_TAGC",
    "M_STRING",
    "M_ETAGO",
    "M_ETAGC",
    "M_ENTITY",
    "M_PI",
    "M_CDATA",
    "M_COMMENT",
    "CSS_DEFAULT",
    "CSS_COMMENT",
    "CSS_NUMBER",
    "CSS_STRING",
    "CSS_WORD",
    "CSS_IDENTIFIER",
    "CSS_OPERATOR",
    "CSL_DEFAULT",
    "CSL_COMMENT",
    "CSL_COMMENTBLOCK",
    "CSL_NUMBER",
    "CSL_STRING",
    "CSL_WORD",
    "CSL_IDENTIFIER",
    "CSL_OPERATOR",
    "CSL_REGEX",
    "SSL_DEFAULT",
    "SSL_COMMENT",
    "SSL_COMMENTBLOCK",
    "SSL_NUMBER",
    "SSL_STRING",
    "SSL_WORD",
    "SSL_IDENTIFIER",
    "SSL_OPERATOR",
    "SSL_REGEX",
    "SSL_VARIABLE",
    "TPL_DEFAULT",
    "TPL_COMMENT",
    "TPL_COMMENTBLOCK",
    "TPL_NUMBER",
    "TPL_STRING",
    "TPL_WORD",
    "TPL_IDENTIFIER",
    "TPL_OPERATOR",
    "TPL_VARIABLE",
];

/// Check that a raw number names a style
pub fn is_valid(style: u32) -> bool {
    style <= UPPER_BOUND as u32
}

/// Get a human-readable name for a style
pub fn name(style: Style) -> &'static str {
    NAMES.get(style as usize).copied().unwrap_or("UNKNOWN")
}

/// Parse a style from its name
pub fn from_name(name: &str) -> Option<Style> {
    NAMES.iter().position(|&n| n == name).map(|i| i as Style)
}
