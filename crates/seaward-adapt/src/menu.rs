//! Bidirectional registry of policy tags and the factories that build them.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use rand::RngCore;
use seaward_core::StateView;
use thiserror::Error;

/// Builds a fresh live strategy for one tag.
pub type StrategyFactory<S> = Box<dyn Fn(&StateView<'_>, &mut dyn RngCore) -> S + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MenuError {
    #[error("policy menu must offer at least one option")]
    Empty,
    #[error("menu has {tags} tags but {factories} factories")]
    LengthMismatch { tags: usize, factories: usize },
    #[error("menu entry {duplicate} repeats the tag at position {first}")]
    DuplicateTag { first: usize, duplicate: usize },
}

/// Ordered, injective mapping between tags and strategy factories.
pub struct PolicyMenu<T, S> {
    tags: Vec<T>,
    factories: Vec<StrategyFactory<S>>,
    positions: HashMap<T, usize>,
}

impl<T, S> PolicyMenu<T, S>
where
    T: Clone + Eq + Hash,
{
    /// Pair `tags[i]` with `factories[i]`.
    pub fn new(tags: Vec<T>, factories: Vec<StrategyFactory<S>>) -> Result<Self, MenuError> {
        if tags.len() != factories.len() {
            return Err(MenuError::LengthMismatch {
                tags: tags.len(),
                factories: factories.len(),
            });
        }
        if tags.is_empty() {
            return Err(MenuError::Empty);
        }
        let mut positions = HashMap::with_capacity(tags.len());
        for (index, tag) in tags.iter().enumerate() {
            if let Some(first) = positions.insert(tag.clone(), index) {
                return Err(MenuError::DuplicateTag {
                    first,
                    duplicate: index,
                });
            }
        }
        Ok(Self {
            tags,
            factories,
            positions,
        })
    }

    pub fn from_entries(
        entries: impl IntoIterator<Item = (T, StrategyFactory<S>)>,
    ) -> Result<Self, MenuError> {
        let (tags, factories) = entries.into_iter().unzip();
        Self::new(tags, factories)
    }

    /// Tags in menu order.
    #[must_use]
    pub fn tags(&self) -> &[T] {
        &self.tags
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    #[must_use]
    pub fn position(&self, tag: &T) -> Option<usize> {
        self.positions.get(tag).copied()
    }

    #[must_use]
    pub fn contains(&self, tag: &T) -> bool {
        self.positions.contains_key(tag)
    }

    #[must_use]
    pub fn tag_at(&self, position: usize) -> Option<&T> {
        self.tags.get(position)
    }

    /// Build a new strategy for `tag`, or `None` if the tag is not on the menu.
    pub fn build(&self, tag: &T, state: &StateView<'_>, rng: &mut dyn RngCore) -> Option<S> {
        let position = self.position(tag)?;
        Some((self.factories[position])(state, rng))
    }
}

impl<T: fmt::Debug, S> fmt::Debug for PolicyMenu<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyMenu")
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}
