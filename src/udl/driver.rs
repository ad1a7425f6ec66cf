//! Host-facing lexer
//!
//! [`UdlLexer`] is what an editor instantiates per document: it resolves a
//! language identifier through the shared cache and runs the colorize and
//! fold passes against the host's [`Document`].

use std::sync::Arc;

use tracing::{instrument, warn};

use super::cache::DefinitionCache;
use super::family::Family;
use super::fold::{fold, FOLD_LEVEL_BASE};
use super::line_state::StateFamily;
use super::machine::colorize;
use super::store::DefinitionStore;
use super::style::Style;
use crate::config::Config;
use crate::document::Document;
use crate::error::{Result, UdlError};

pub struct UdlLexer {
    cache: Arc<DefinitionCache>,
    config: Config,
}

impl UdlLexer {
    pub fn new(cache: Arc<DefinitionCache>, config: Config) -> Self {
        Self { cache, config }
    }

    /// Lexer reading descriptions from the configured `lexres_dir`
    pub fn from_config(config: Config) -> Self {
        let cache = Arc::new(DefinitionCache::with_root(config.lexres_dir.clone()));
        Self::new(cache, config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<DefinitionCache> {
        &self.cache
    }

    /// The store for `language`, or why it is unusable
    pub fn definition(&self, language: &str) -> Result<Arc<DefinitionStore>> {
        let store = self.cache.get(language);
        if store.is_ready() {
            Ok(store)
        } else {
            let reason = store
                .load_error()
                .map_or_else(|| store.identifier().to_string(), |err| format!("{}: {err}", store.identifier()));
            Err(UdlError::NotReady(reason))
        }
    }

    /// Style `[start, start + length)`.
    ///
    /// Without a usable definition the range is painted with the default
    /// style of `initial_style`'s family and `None` is returned.
    #[instrument(skip(self, doc), level = "debug")]
    pub fn colorize<D: Document + ?Sized>(
        &self,
        start: usize,
        length: usize,
        initial_style: Style,
        language: &str,
        doc: &mut D,
    ) -> Option<StateFamily> {
        match self.definition(language) {
            Ok(store) => Some(colorize(&store, doc, start, length, &self.config)),
            Err(err) => {
                warn!(error = %err, "colorizing without a definition");
                let len = doc.len();
                let start = start.min(len);
                let end = start.saturating_add(length).min(len);
                doc.set_style_range(start..end, Family::of_style(initial_style).default_style());
                None
            }
        }
    }

    /// Compute fold levels for the lines covering `[start, start + length)`.
    ///
    /// `initial_style` is only recorded for diagnostics; levels come from
    /// the styles already in the document. Without a usable definition the
    /// lines get the base level.
    #[instrument(skip(self, doc), level = "debug")]
    pub fn fold<D: Document + ?Sized>(
        &self,
        start: usize,
        length: usize,
        initial_style: Style,
        language: &str,
        doc: &mut D,
    ) {
        match self.definition(language) {
            Ok(store) => fold(&store, doc, start, length, self.config.nested_resync_window),
            Err(err) => {
                warn!(error = %err, "folding without a definition");
                let len = doc.len();
                let first = doc.line_of(start.min(len));
                let last = doc.line_of(start.saturating_add(length).min(len));
                for line in first..=last.min(doc.line_count().saturating_sub(1)) {
                    doc.set_fold_level(line, FOLD_LEVEL_BASE);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;
    use crate::udl::cache::MemorySource;
    use crate::udl::style::{CSL_DEFAULT, CSL_STRING, M_DEFAULT, SSL_DEFAULT};

    const SMALL: &str = "0:1:0:0\n10:0\n12:1\n30:3\n31:1:0\t<%\n32:0\n35:2:3\n36:0:0\n31:2:0\t%>\n33:31\n37\n";

    fn lexer() -> UdlLexer {
        let source = MemorySource::new().with("small", SMALL).with("broken", "nonsense\n");
        UdlLexer::new(Arc::new(DefinitionCache::new(source)), Config::default())
    }

    #[test]
    fn test_colorize_ready() {
        let lexer = lexer();
        let mut doc = MemoryDocument::new("a<%b%>c");
        let end = lexer.colorize(0, 7, M_DEFAULT, "small", &mut doc);
        assert_eq!(end, Some(StateFamily::new(1, Family::Markup)));
        assert_eq!(doc.style_at(3), SSL_DEFAULT);
    }

    #[test]
    fn test_colorize_not_ready_paints_family_default() {
        let lexer = lexer();
        let mut doc = MemoryDocument::new("var s = 1;");
        assert_eq!(lexer.colorize(2, 5, CSL_STRING, "broken", &mut doc), None);
        assert_eq!(doc.style_at(1), M_DEFAULT);
        assert_eq!(&doc.styles()[2..7], &[CSL_DEFAULT; 5]);
        assert_eq!(doc.style_at(7), M_DEFAULT);

        assert_eq!(lexer.colorize(0, 3, M_DEFAULT, "unknown", &mut doc), None);
        assert!(matches!(lexer.definition("unknown"), Err(UdlError::NotReady(_))));
    }

    #[test]
    fn test_fold_not_ready_sets_base_level() {
        let lexer = lexer();
        let mut doc = MemoryDocument::new("a\nb\nc");
        doc.set_fold_level(1, FOLD_LEVEL_BASE + 3);
        lexer.fold(0, 5, M_DEFAULT, "broken", &mut doc);
        for line in 0..3 {
            assert_eq!(doc.fold_level(line), FOLD_LEVEL_BASE);
        }
    }
}
