use serde::{Deserialize, Serialize};

use crate::identity::{ContainerId, ItemId};
use crate::metadata::FilamentMetadata;
use crate::temporal::Timestamp;

/// Name given to an item created from a scan that carried no brand or type.
pub const SCANNED_ITEM_NAME: &str = "Item";
/// Name given to a hand-entered item with no brand or type.
pub const ENTERED_ITEM_NAME: &str = "Filament";

/// Canonical item record (one filament spool).
///
/// The canonical copy lives in the store's item collection; containers only
/// hold derived copies of it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    /// Identifier read from a physical tag. Blank when not yet bound.
    pub tag_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: Timestamp,
    /// Owning container, or `None` when unassigned.
    #[serde(default)]
    pub container_id: Option<ContainerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FilamentMetadata>,
}

impl Item {
    /// Create an unassigned item with a fresh id.
    pub fn new(tag_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(),
            tag_id: tag_id.into(),
            name: name.into(),
            description: String::new(),
            created_at: Timestamp::now(),
            container_id: None,
            metadata: None,
        }
    }

    /// Create an item for a freshly scanned, unknown tag.
    ///
    /// The name is `"<brand> <type>"` when the tag carried either, otherwise
    /// [`SCANNED_ITEM_NAME`].
    pub fn from_scan(tag_id: impl Into<String>, metadata: Option<FilamentMetadata>) -> Self {
        Self::named_after(tag_id, metadata, SCANNED_ITEM_NAME)
    }

    /// Like [`Item::from_scan`], for items entered by hand. Falls back to
    /// [`ENTERED_ITEM_NAME`].
    pub fn from_entry(tag_id: impl Into<String>, metadata: Option<FilamentMetadata>) -> Self {
        Self::named_after(tag_id, metadata, ENTERED_ITEM_NAME)
    }

    fn named_after(tag_id: impl Into<String>, metadata: Option<FilamentMetadata>, fallback: &str) -> Self {
        let name = metadata
            .as_ref()
            .map(|m| {
                format!(
                    "{} {}",
                    m.brand.as_deref().unwrap_or(""),
                    m.material.as_deref().unwrap_or("")
                )
                .trim()
                .to_string()
            })
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| fallback.to_string());
        Self {
            metadata,
            ..Self::new(tag_id, name)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(mut self, metadata: FilamentMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn in_container(mut self, container_id: ContainerId) -> Self {
        self.container_id = Some(container_id);
        self
    }

    /// Returns `true` if this item is bound to a physical tag.
    pub fn has_tag(&self) -> bool {
        !self.tag_id.trim().is_empty()
    }

    /// `"<brand> <type> <variant>"` from the metadata, falling back to `name`.
    pub fn display_title(&self) -> String {
        self.metadata
            .as_ref()
            .and_then(FilamentMetadata::display_title)
            .unwrap_or_else(|| self.name.clone())
    }
}
