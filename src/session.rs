//! The translate mode session.
//!
//! A session owns the document tree and every piece of state the overlay needs: the
//! observed documents, the registered translations, the retention mode and the
//! pointers currently shown. Hosts mutate the tree through [`TranslateSession::tree_mut`]
//! and call [`TranslateSession::process_mutations`] when they want the overlay to
//! catch up.

/// Highlight pointers
mod pointer;
/// Mutation coalescing
mod queue;

use std::time::Instant;

use thiserror::Error;

pub use pointer::{
    MIN_POINTER_SIZE,
    Pointer,
    PointerOverlay,
    PointerTone,
};
pub use queue::MutationQueue;

use crate::config::{
    ConfigError,
    IgnoreMatcher,
    MatcherError,
    TranslateModeSettings,
};
use crate::hash::{
    FingerprintCache,
    HashError,
};
use crate::link::{
    LinkResolver,
    WeblateLinks,
    version_segment,
};
use crate::marker::MarkerCodec;
use crate::reconcile::reconcile;
use crate::scanner::TranslationScanner;
use crate::tree::{
    NodeId,
    Tree,
};
use crate::types::{
    RetentionMode,
    TranslationCategories,
    TranslationSet,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Matcher(#[from] MatcherError),

    #[error("No document has been started")]
    NotStarted,

    #[error("Document {0:?} has no body element")]
    NoBody(NodeId),
}

/// Everything a scan pass reads or updates, apart from the tree.
#[derive(Debug)]
struct Registry {
    /// Marker decoder.
    codec: MarkerCodec,
    /// Opt-out attributes.
    ignore: IgnoreMatcher,
    /// Whether targets are tracked.
    highlights_enabled: bool,
    /// Applied on the next reconciliation.
    mode: RetentionMode,
    /// Term links and their fingerprint cache.
    links: LinkResolver,
    /// Documents whose mutations are observed.
    observed_documents: Vec<NodeId>,
    /// Registered translations.
    translations: TranslationSet,
}

impl Registry {
    /// Adds `document` to the observed set. Returns `false` if it already was.
    fn register(&mut self, document: NodeId) -> bool {
        register(&mut self.observed_documents, document)
    }

    /// Scans `roots`, then every frame document met on the way, and reconciles the
    /// result.
    ///
    /// Returns the documents registered by this pass.
    fn scan(&mut self, tree: &mut Tree, roots: Vec<NodeId>) -> Vec<NodeId> {
        let mut scanner =
            TranslationScanner::new(tree, self.codec, &self.ignore, self.highlights_enabled);
        scanner.scan(roots);

        let observed = &mut self.observed_documents;
        let mut registered = Vec::new();
        let mut seen = 0;
        loop {
            let found = scanner.added_documents();
            let fresh: Vec<NodeId> = found
                .get(seen..)
                .unwrap_or_default()
                .iter()
                .copied()
                .filter(|&document| register(observed, document))
                .collect();
            seen = found.len();
            if fresh.is_empty() {
                break;
            }
            tracing::debug!(documents = ?fresh, "Registered frame documents");
            registered.extend_from_slice(&fresh);
            scanner.scan(fresh);
        }

        let output = scanner.finish(&mut self.links);
        let previous = std::mem::take(&mut self.translations);
        self.translations = reconcile(previous, output.translations, self.mode, &*tree);
        registered
    }
}

/// Pushes `document` unless already present.
fn register(observed: &mut Vec<NodeId>, document: NodeId) -> bool {
    if observed.contains(&document) {
        return false;
    }
    observed.push(document);
    true
}

/// Interactive translation overlay over one document tree.
#[derive(Debug)]
pub struct TranslateSession {
    /// The displayed documents.
    tree: Tree,
    /// Validated settings.
    settings: TranslateModeSettings,
    /// Scan state.
    registry: Registry,
    /// Highlight pointers.
    pointers: PointerOverlay,
    /// Main document, once started.
    document: Option<NodeId>,
}

impl TranslateSession {
    /// Creates a session for `locale` on the server version `version_info`.
    ///
    /// # Errors
    /// - The settings do not validate
    /// - The hash key or an ignore pattern is unusable
    pub fn new<S: AsRef<str>>(
        tree: Tree,
        settings: TranslateModeSettings,
        locale: &str,
        version_info: &[S],
    ) -> Result<Self, SessionError> {
        settings.validate().map_err(ConfigError::ValidationErrors)?;
        let links = LinkResolver::new(
            FingerprintCache::new(settings.sip_key()?),
            Box::new(WeblateLinks::from_settings(&settings)),
            locale,
            version_segment(version_info),
        );
        let highlights_enabled = settings.highlights_enabled(locale);
        if highlights_enabled {
            tracing::debug!(locale, "Translate mode is active with translation highlighting");
        } else {
            tracing::info!(
                locale,
                "Translate mode is active, but highlighting is disabled for the source locale"
            );
        }

        let registry = Registry {
            codec: settings.codec(),
            ignore: IgnoreMatcher::new(&settings)?,
            highlights_enabled,
            mode: settings.default_mode,
            links,
            observed_documents: Vec::new(),
            translations: TranslationSet::new(),
        };
        Ok(Self { tree, settings, registry, pointers: PointerOverlay::new(), document: None })
    }

    /// Registers the main document, runs the initial scan and starts observing.
    ///
    /// Frame documents found by the scan are registered and scanned too. Returns
    /// `false` if the session was already started.
    pub fn start(&mut self, document: NodeId) -> bool {
        if self.document.is_some() {
            return false;
        }
        self.document = Some(document);
        self.registry.register(document);
        self.registry.scan(&mut self.tree, vec![document]);
        self.observe_all();
        true
    }

    /// Registers an extra document, scans it and observes it.
    ///
    /// Returns `false` if the document is already observed.
    pub fn add_document(&mut self, document: NodeId) -> bool {
        self.process_mutations();
        if !self.registry.register(document) {
            return false;
        }
        let registered = {
            let mut paused = self.tree.pause_observation();
            self.registry.scan(&mut paused, vec![document])
        };
        self.tree.observe(document);
        for document in registered {
            self.tree.observe(document);
        }
        true
    }

    /// Scans what changed since the last pass and reconciles the result.
    ///
    /// Returns the number of subtrees scanned.
    pub fn process_mutations(&mut self) -> usize {
        let start = Instant::now();
        let (roots, registered) = {
            let mut paused = self.tree.pause_observation();
            let records = paused.take_pending();
            if records.is_empty() {
                return 0;
            }
            let mut queue = MutationQueue::new();
            queue.extend(&paused, &records);
            let roots = queue.into_targets();
            let registered = self.registry.scan(&mut paused, roots.clone());
            (roots, registered)
        };
        for document in registered {
            self.tree.observe(document);
        }
        tracing::debug!(
            roots = roots.len(),
            translations = self.registry.translations.len(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Processed mutations"
        );
        roots.len()
    }

    /// Sets the retention mode used from the next pass on.
    pub fn set_mode(&mut self, mode: RetentionMode) {
        tracing::debug!(%mode, "Retention mode changed");
        self.registry.mode = mode;
    }

    #[must_use]
    pub const fn mode(&self) -> RetentionMode {
        self.registry.mode
    }

    #[must_use]
    pub const fn translations(&self) -> &TranslationSet {
        &self.registry.translations
    }

    #[must_use]
    pub fn categories(&self) -> TranslationCategories<'_> {
        self.registry.translations.categories()
    }

    /// Points at every element displaying `source`.
    ///
    /// Existing pointers are cleared first unless `keep_highlighted` is set. Returns
    /// the number of pointers added.
    pub fn highlight_translation(&mut self, source: &str, keep_highlighted: bool) -> usize {
        self.process_mutations();
        if !keep_highlighted {
            self.pointers.clear();
        }
        let Some(translation) = self.registry.translations.get(source) else {
            return 0;
        };
        let mut added = 0;
        for target in &translation.targets {
            let bounds = self.tree.element(target.node).and_then(|el| el.bounds());
            if self.pointers.show(target.node, bounds, translation.translated) {
                added += 1;
            }
        }
        added
    }

    #[must_use]
    pub const fn pointers(&self) -> &PointerOverlay {
        &self.pointers
    }

    pub fn clear_pointers(&mut self) {
        self.pointers.clear();
    }

    /// A pointer press anywhere clears the pointers, unless Ctrl is held.
    pub fn on_pointer_down(&mut self, ctrl_key: bool) {
        if !ctrl_key {
            self.clear_pointers();
        }
    }

    pub fn on_key_down(&mut self, key: &str) {
        if key == "Escape" {
            self.clear_pointers();
        }
    }

    /// Adds or removes `class` on the main document body without triggering a scan.
    ///
    /// Pending mutations are processed first. Returns whether the class list changed.
    ///
    /// # Errors
    /// - The session has not been started
    /// - The main document has no `<body>`
    pub fn set_body_class(&mut self, class: &str, present: bool) -> Result<bool, SessionError> {
        let document = self.document.ok_or(SessionError::NotStarted)?;
        let body = self.tree.find_element(document, "body").ok_or(SessionError::NoBody(document))?;
        self.process_mutations();

        let Some(classes) = toggle_class(self.tree.attribute(body, "class"), class, present) else {
            return Ok(false);
        };
        let mut paused = self.tree.pause_observation();
        paused.set_attribute(body, "class", classes);
        Ok(true)
    }

    /// Stops observing and forgets the observed documents and pointers.
    pub fn destroy(&mut self) {
        self.tree.disconnect();
        self.registry.observed_documents.clear();
        self.pointers.clear();
        self.document = None;
        tracing::debug!("Translate mode session destroyed");
    }

    #[must_use]
    pub const fn tree(&self) -> &Tree {
        &self.tree
    }

    /// The tree, for host-side changes. Changes are picked up by
    /// [`Self::process_mutations`].
    pub const fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    #[must_use]
    pub const fn settings(&self) -> &TranslateModeSettings {
        &self.settings
    }

    #[must_use]
    pub const fn highlights_enabled(&self) -> bool {
        self.registry.highlights_enabled
    }

    #[must_use]
    pub fn observed_documents(&self) -> &[NodeId] {
        &self.registry.observed_documents
    }

    #[must_use]
    pub fn links(&self) -> &LinkResolver {
        &self.registry.links
    }

    /// Observes every registered document.
    fn observe_all(&mut self) {
        for &document in &self.registry.observed_documents {
            self.tree.observe(document);
        }
    }
}

/// New value of a `class` attribute, or `None` when nothing changes.
fn toggle_class(current: Option<&str>, class: &str, present: bool) -> Option<String> {
    let mut classes: Vec<&str> = current.unwrap_or_default().split_whitespace().collect();
    let has = classes.contains(&class);
    match (has, present) {
        (false, true) => classes.push(class),
        (true, false) => classes.retain(|&c| c != class),
        _ => return None,
    }
    Some(classes.join(" "))
}
