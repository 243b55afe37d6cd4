#![forbid(unsafe_code)]

//! Block type handlers.
//!
//! The board never looks inside a block's attributes. A type tag resolves to
//! a [`BlockTypeHandler`] that supplies defaults and edit-mode hooks; hosts
//! that own a drawing surface additionally implement [`BlockRenderer`].

use std::fmt;
use std::sync::Arc;

use blockgrid_layout::{Block, GridSize};
use rustc_hash::FxHashMap;
use serde_json::Value;

/// Behaviour attached to a block type tag.
pub trait BlockTypeHandler: Send + Sync {
    /// The type tag this handler serves.
    fn tag(&self) -> &str;

    /// Size used when an add does not specify one.
    fn default_size(&self) -> GridSize {
        GridSize::new(1, 1)
    }

    /// Attributes used when an add does not specify any.
    fn default_attributes(&self) -> Value {
        Value::Null
    }

    /// Called when a block of this type enters content-edit mode.
    fn on_enter_edit(&self, _block: &Block) {}

    /// Called when content-edit mode ends. Returning attributes replaces the
    /// block's attributes without recording history.
    fn on_exit_edit(&self, _block: &Block) -> Option<Value> {
        None
    }
}

/// Draws a block onto a host-owned surface element `S`.
pub trait BlockRenderer<S: ?Sized> {
    fn render(&self, block: &Block, surface: &mut S, edit_mode: bool);
}

/// Minimal handler: tag plus default size.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleBlockType {
    tag: String,
    default_size: GridSize,
    default_attributes: Value,
}

impl SimpleBlockType {
    #[must_use]
    pub fn new(tag: impl Into<String>, default_size: GridSize) -> Self {
        Self {
            tag: tag.into(),
            default_size,
            default_attributes: Value::Null,
        }
    }

    #[must_use]
    pub fn with_default_attributes(mut self, attributes: Value) -> Self {
        self.default_attributes = attributes;
        self
    }
}

impl BlockTypeHandler for SimpleBlockType {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn default_size(&self) -> GridSize {
        self.default_size
    }

    fn default_attributes(&self) -> Value {
        self.default_attributes.clone()
    }
}

/// Tag → handler lookup.
///
/// An empty registry is permissive: every tag is accepted with 1x1 defaults.
/// Once any handler is registered, unknown tags are rejected.
#[derive(Clone, Default)]
pub struct BlockTypeRegistry {
    handlers: FxHashMap<String, Arc<dyn BlockTypeHandler>>,
}

impl fmt::Debug for BlockTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("BlockTypeRegistry")
            .field("tags", &tags)
            .finish()
    }
}

impl BlockTypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous handler for its tag.
    pub fn register(&mut self, handler: impl BlockTypeHandler + 'static) {
        self.handlers
            .insert(handler.tag().to_string(), Arc::new(handler));
    }

    pub fn unregister(&mut self, tag: &str) -> bool {
        self.handlers.remove(tag).is_some()
    }

    pub fn get(&self, tag: &str) -> Option<&Arc<dyn BlockTypeHandler>> {
        self.handlers.get(tag)
    }

    /// Whether `tag` may be added.
    pub fn accepts(&self, tag: &str) -> bool {
        self.handlers.is_empty() || self.handlers.contains_key(tag)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn default_size(&self, tag: &str) -> GridSize {
        self.get(tag)
            .map_or_else(GridSize::default, |handler| handler.default_size())
    }

    pub fn default_attributes(&self, tag: &str) -> Value {
        self.get(tag)
            .map_or(Value::Null, |handler| handler.default_attributes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_registry_is_permissive() {
        let registry = BlockTypeRegistry::new();
        assert!(registry.accepts("anything"));
        assert_eq!(registry.default_size("anything"), GridSize::new(1, 1));
    }

    #[test]
    fn registered_registry_rejects_unknown() {
        let mut registry = BlockTypeRegistry::new();
        registry.register(
            SimpleBlockType::new("note", GridSize::new(3, 2))
                .with_default_attributes(json!({ "text": "" })),
        );
        assert!(registry.accepts("note"));
        assert!(!registry.accepts("chart"));
        assert_eq!(registry.default_size("note"), GridSize::new(3, 2));
        assert_eq!(registry.default_attributes("note"), json!({ "text": "" }));
        assert!(registry.unregister("note"));
        assert!(registry.accepts("chart"));
    }

    struct Label;

    impl BlockRenderer<String> for Label {
        fn render(&self, block: &Block, surface: &mut String, edit_mode: bool) {
            surface.push_str(block.id.as_str());
            if edit_mode {
                surface.push('*');
            }
        }
    }

    #[test]
    fn renderer_writes_into_host_surface() {
        let block = Block::new(
            "a",
            "note",
            blockgrid_layout::GridPosition::new(1, 1),
            GridSize::new(1, 1),
        );
        let mut out = String::new();
        Label.render(&block, &mut out, true);
        assert_eq!(out, "a*");
    }
}
