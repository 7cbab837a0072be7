use serde::{Deserialize, Serialize};

use crate::identity::{ContainerId, ItemId};
use crate::item::Item;
use crate::temporal::Timestamp;

/// A container (shelf, dry box, printer) holding items.
///
/// `items` is a cached view derived from the canonical item collection. It is
/// never authoritative: the store rebuilds it on every read and before every
/// commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: ContainerId,
    pub tag_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub capacity: Option<u32>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub is_standard: bool,
}

impl Container {
    /// Create an empty, non-standard container with a fresh id.
    pub fn new(tag_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ContainerId::new(),
            tag_id: tag_id.into(),
            name: name.into(),
            description: String::new(),
            capacity: None,
            created_at: Timestamp::now(),
            items: Vec::new(),
            is_standard: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Returns `true` if the cached view holds an item with this id.
    pub fn contains(&self, item_id: &ItemId) -> bool {
        self.items.iter().any(|i| &i.id == item_id)
    }

    /// Returns `true` if a capacity is set and the view has reached it.
    pub fn is_full(&self) -> bool {
        self.capacity
            .is_some_and(|cap| self.items.len() >= cap as usize)
    }
}

/// The pre-seeded, protected system containers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StandardContainer {
    /// Printer intake: the spool currently loaded.
    Printer,
    /// Items not stored anywhere in particular.
    Loose,
}

impl StandardContainer {
    pub const ALL: [StandardContainer; 2] = [Self::Printer, Self::Loose];

    /// The standard container with this id, if any.
    pub fn from_id(id: &ContainerId) -> Option<Self> {
        Self::ALL.into_iter().find(|which| which.id() == *id)
    }

    pub fn id(&self) -> ContainerId {
        ContainerId::from(match self {
            Self::Printer => "std_printer",
            Self::Loose => "std_loose",
        })
    }

    pub fn tag_id(&self) -> &'static str {
        match self {
            Self::Printer => "STD_PRINTER",
            Self::Loose => "STD_LOOSE",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Printer => "Printer",
            Self::Loose => "Loose",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Printer => "Standard container for the printer",
            Self::Loose => "Standard container for loose items",
        }
    }

    /// The seed record for this standard container.
    pub fn to_container(&self) -> Container {
        Container {
            id: self.id(),
            tag_id: self.tag_id().to_string(),
            name: self.name().to_string(),
            description: self.description().to_string(),
            capacity: None,
            created_at: Timestamp::now(),
            items: Vec::new(),
            is_standard: true,
        }
    }
}
