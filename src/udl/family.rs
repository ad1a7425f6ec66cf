//! Sub-language families
//!
//! A UDL document multiplexes up to five independently lexed families.
//! Which family is current is decided by the numeric range of the style.

use std::ops::RangeInclusive;

use rustc_hash::FxHashSet;

use super::lookback::LookBackTests;
use super::style::{self, Style};
use super::transition::StateId;

/// One of the five parallel sub-languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Family {
    #[default]
    Markup = 0,
    Css = 1,
    ClientScript = 2,
    ServerScript = 3,
    TemplateDirective = 4,
}

impl Family {
    pub const COUNT: usize = 5;

    pub const ALL: [Family; Family::COUNT] = [
        Family::Markup,
        Family::Css,
        Family::ClientScript,
        Family::ServerScript,
        Family::TemplateDirective,
    ];

    /// Family from its bytecode index
    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Block of styles owned by this family
    pub fn style_range(self) -> RangeInclusive<Style> {
        match self {
            Family::Markup => style::M_DEFAULT..=style::M_COMMENT,
            Family::Css => style::CSS_DEFAULT..=style::CSS_OPERATOR,
            Family::ClientScript => style::CSL_DEFAULT..=style::CSL_REGEX,
            Family::ServerScript => style::SSL_DEFAULT..=style::SSL_VARIABLE,
            Family::TemplateDirective => style::TPL_DEFAULT..=style::TPL_VARIABLE,
        }
    }

    pub fn default_style(self) -> Style {
        *self.style_range().start()
    }

    /// Family owning a style; out-of-range styles count as markup
    pub fn of_style(style: Style) -> Self {
        Self::ALL
            .into_iter()
            .find(|family| family.style_range().contains(&style))
            .unwrap_or(Family::Markup)
    }

    pub fn name(self) -> &'static str {
        match self {
            Family::Markup => "markup",
            Family::Css => "css",
            Family::ClientScript => "csl",
            Family::ServerScript => "ssl",
            Family::TemplateDirective => "tpl",
        }
    }
}

/// Per-family tables filled in by the loader
#[derive(Debug, Default)]
pub struct FamilyInfo {
    /// State entered when lexing starts in this family
    pub start_state: StateId,
    /// Style that keyword promotion applies to
    pub identifier_style: Option<Style>,
    /// Style identifiers are promoted to when they are keywords
    pub keyword_style: Option<Style>,
    /// Style shared by operator glyphs (probed by prefix when folding)
    pub operator_style: Option<Style>,
    pub keywords: FxHashSet<Vec<u8>>,
    pub lookback: Option<LookBackTests>,
}

impl FamilyInfo {
    pub fn is_keyword(&self, text: &[u8]) -> bool {
        self.keywords.contains(text)
    }

    /// Promote an identifier-styled span to the keyword style if its text
    /// is a keyword; any other style is returned unchanged.
    pub fn promote(&self, style: Style, text: &[u8]) -> Style {
        match (self.identifier_style, self.keyword_style) {
            (Some(ident), Some(keyword)) if ident == style && self.is_keyword(text) => keyword,
            _ => style,
        }
    }
}
