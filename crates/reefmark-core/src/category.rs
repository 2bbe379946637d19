//! Category taxonomy.
//!
//! Categories are leaf labels. Coral categories come in HEALTHY/BLEACHED pairs
//! that share a supercategory id, which also selects the display palette slot.
//! The taxonomy keeps a primary `id -> Category` map and a grouping index
//! `supercategory_id -> [id]` that is rebuilt after every mutation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, error};

use crate::color::{palette, Color};
use crate::error::{ReefError, Result};

/// Category identifier. Negative values are reserved.
pub type CategoryId = i32;

/// Generic dead coral.
pub const DEAD_ID: CategoryId = 0;
/// Model prediction not yet assigned by the user.
pub const PREDICTED_ID: CategoryId = -1;
/// Transient prompt preview; never persisted.
pub const PROMPT_PREVIEW_ID: CategoryId = -2;

const BLEACHED_PREFIX: &str = "Bleached ";

// ── Status ──────────────────────────────────────────────────────

/// Health status of a category. Serialized as its integer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Status {
    #[default]
    Undefined,
    Healthy,
    Bleached,
    Dead,
}

impl Status {
    pub const ALL: [Status; 4] = [Self::Undefined, Self::Healthy, Self::Bleached, Self::Dead];

    /// Wire id.
    pub const fn id(self) -> i32 {
        match self {
            Self::Undefined => -1,
            Self::Healthy => 0,
            Self::Bleached => 1,
            Self::Dead => 2,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }
}

impl TryFrom<i32> for Status {
    type Error = String;

    fn try_from(id: i32) -> std::result::Result<Self, Self::Error> {
        Self::from_id(id).ok_or_else(|| format!("unknown status id {id}"))
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status.id()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Undefined => "Undefined",
            Self::Healthy => "Healthy",
            Self::Bleached => "Bleached",
            Self::Dead => "Dead",
        };
        f.write_str(name)
    }
}

/// Display name for a status id, as delivered with the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub id: i32,
    pub name: String,
}

// ── Category ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(rename = "supercategory")]
    pub supercategory_name: String,
    pub supercategory_id: i32,
    #[serde(default)]
    pub is_coral: bool,
    #[serde(default)]
    pub status: Status,
}

impl Category {
    /// Short badge text: the supercategory id, with a `B` suffix when bleached.
    pub fn icon_name(&self) -> String {
        match self.status {
            Status::Bleached => format!("{}B", self.supercategory_id),
            _ => self.supercategory_id.to_string(),
        }
    }

    pub fn is_healthy_coral(&self) -> bool {
        self.is_coral && self.status == Status::Healthy
    }
}

/// Parameters for [`Taxonomy::add_category`]. Unset ids are auto-assigned.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub id: Option<CategoryId>,
    pub supercategory_name: Option<String>,
    pub supercategory_id: Option<i32>,
    pub is_coral: bool,
    pub status: Status,
}

impl NewCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            supercategory_name: None,
            supercategory_id: None,
            is_coral: false,
            status: Status::Undefined,
        }
    }

    pub fn with_id(mut self, id: CategoryId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_supercategory(mut self, name: impl Into<String>, id: i32) -> Self {
        self.supercategory_name = Some(name.into());
        self.supercategory_id = Some(id);
        self
    }

    pub fn coral(mut self, status: Status) -> Self {
        self.is_coral = true;
        self.status = status;
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }
}

// ── Taxonomy ────────────────────────────────────────────────────

/// All categories of the loaded project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Taxonomy {
    categories: BTreeMap<CategoryId, Category>,
    groups: BTreeMap<i32, SmallVec<[CategoryId; 3]>>,
    statuses: Vec<StatusInfo>,
}

impl Taxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a category list. Later duplicates of an id replace earlier ones.
    pub fn from_parts(categories: Vec<Category>, statuses: Vec<StatusInfo>) -> Self {
        let mut taxonomy = Self::new();
        taxonomy.replace(categories, statuses);
        taxonomy
    }

    /// Replace every category and status name wholesale.
    pub fn replace(&mut self, categories: Vec<Category>, statuses: Vec<StatusInfo>) {
        self.categories = categories.into_iter().map(|c| (c.id, c)).collect();
        self.statuses = statuses;
        self.rebuild_groups();
        debug!(categories = self.categories.len(), "Taxonomy replaced");
    }

    /// Replace categories but keep the status names.
    pub fn replace_categories(&mut self, categories: Vec<Category>) {
        let statuses = std::mem::take(&mut self.statuses);
        self.replace(categories, statuses);
    }

    fn rebuild_groups(&mut self) {
        self.groups.clear();
        for category in self.categories.values() {
            self.groups
                .entry(category.supercategory_id)
                .or_default()
                .push(category.id);
        }
    }

    // ── Lookup ──

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn get(&self, id: CategoryId) -> Option<&Category> {
        self.categories.get(&id)
    }

    /// Like [`get`](Self::get) but reports a missing id as an error.
    pub fn category(&self, id: CategoryId) -> Result<&Category> {
        self.categories.get(&id).ok_or(ReefError::CategoryNotFound(id))
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.categories.values().any(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    /// Category list ordered by id, as saved and snapshotted.
    pub fn to_list(&self) -> Vec<Category> {
        self.categories.values().cloned().collect()
    }

    /// Ids sharing a supercategory.
    pub fn group(&self, supercategory_id: i32) -> &[CategoryId] {
        self.groups
            .get(&supercategory_id)
            .map(|g| g.as_slice())
            .unwrap_or(&[])
    }

    pub fn supercategory_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.groups.keys().copied()
    }

    pub fn statuses(&self) -> &[StatusInfo] {
        &self.statuses
    }

    pub fn set_statuses(&mut self, statuses: Vec<StatusInfo>) {
        self.statuses = statuses;
    }

    /// Project-provided status name, falling back to the built-in one.
    pub fn status_name(&self, status: Status) -> String {
        self.statuses
            .iter()
            .find(|s| s.id == status.id())
            .map(|s| s.name.clone())
            .unwrap_or_else(|| status.to_string())
    }

    /// Categories with `status`, ascending by supercategory id.
    pub fn category_list_by_status(&self, status: Status) -> Vec<&Category> {
        let mut list: Vec<&Category> = self
            .categories
            .values()
            .filter(|c| c.status == status)
            .collect();
        list.sort_by_key(|c| (c.supercategory_id, c.id));
        list
    }

    /// Sibling with the same supercategory and the given status, or the
    /// category itself when no such sibling exists.
    pub fn corresponding_by_status(&self, id: CategoryId, status: Status) -> Result<&Category> {
        let category = self.category(id)?;
        Ok(self
            .group(category.supercategory_id)
            .iter()
            .filter_map(|sid| self.categories.get(sid))
            .find(|c| c.status == status)
            .unwrap_or(category))
    }

    /// Siblings of `id` whose status differs from its own.
    pub fn other_statuses_of(&self, id: CategoryId) -> Result<Vec<&Category>> {
        let category = self.category(id)?;
        Ok(self
            .group(category.supercategory_id)
            .iter()
            .filter_map(|sid| self.categories.get(sid))
            .filter(|c| c.status != category.status)
            .collect())
    }

    fn find_available_id(&self) -> CategoryId {
        (0..).find(|id| !self.categories.contains_key(id)).unwrap_or(0)
    }

    fn find_available_supercategory_id(&self) -> i32 {
        (0..).find(|id| !self.groups.contains_key(id)).unwrap_or(0)
    }

    // ── Mutation ──

    /// Add a healthy coral category and its bleached sibling.
    ///
    /// Returns `(healthy_id, bleached_id)`.
    pub fn add_coral_category(&mut self, name: &str) -> Result<(CategoryId, CategoryId)> {
        let bleached_name = format!("{BLEACHED_PREFIX}{name}");
        if name.is_empty() {
            return Err(ReefError::InvalidCategory("Category name is empty".into()));
        }
        for candidate in [name, bleached_name.as_str()] {
            if self.contains_name(candidate) {
                return Err(ReefError::DuplicateCategory(candidate.to_string()));
            }
        }

        let supercategory_id = self.find_available_supercategory_id();
        let healthy_id = self.add_category(
            NewCategory::new(name)
                .with_supercategory(name, supercategory_id)
                .coral(Status::Healthy),
        )?;
        let bleached_id = self.add_category(
            NewCategory::new(bleached_name)
                .with_supercategory(name, supercategory_id)
                .coral(Status::Bleached),
        )?;
        Ok((healthy_id, bleached_id))
    }

    /// Add one category. Missing ids take the lowest unused value from 0 and
    /// the supercategory name defaults to the category name.
    pub fn add_category(&mut self, new: NewCategory) -> Result<CategoryId> {
        if new.name.is_empty() {
            return Err(ReefError::InvalidCategory("Category name is empty".into()));
        }
        if self.contains_name(&new.name) {
            return Err(ReefError::DuplicateCategory(new.name));
        }
        let id = match new.id {
            Some(id) if self.categories.contains_key(&id) => {
                return Err(ReefError::InvalidCategory(format!("Category id {id} is in use")));
            }
            Some(id) => id,
            None => self.find_available_id(),
        };
        let supercategory_id = new
            .supercategory_id
            .unwrap_or_else(|| self.find_available_supercategory_id());
        let supercategory_name = new.supercategory_name.unwrap_or_else(|| new.name.clone());

        debug!(id, supercategory_id, name = %new.name, "Adding category");
        self.categories.insert(
            id,
            Category {
                id,
                name: new.name,
                supercategory_name,
                supercategory_id,
                is_coral: new.is_coral,
                status: new.status,
            },
        );
        self.rebuild_groups();
        Ok(id)
    }

    /// Rename a healthy coral category together with its bleached sibling.
    pub fn rename_category(&mut self, id: CategoryId, new_name: &str) -> Result<()> {
        let category = self.category(id)?;
        if !category.is_healthy_coral() {
            return Err(ReefError::InvalidCategory(format!(
                "Only healthy coral categories can be renamed (id {id})"
            )));
        }
        if new_name.is_empty() {
            return Err(ReefError::InvalidCategory("Category name is empty".into()));
        }
        if category.name == new_name {
            return Ok(());
        }

        let supercategory_id = category.supercategory_id;
        let bleached_id = self
            .group(supercategory_id)
            .iter()
            .copied()
            .find(|sid| self.categories.get(sid).is_some_and(|c| c.status == Status::Bleached));
        let bleached_name = format!("{BLEACHED_PREFIX}{new_name}");

        let clash = self.categories.values().find(|c| {
            c.id != id
                && Some(c.id) != bleached_id
                && (c.name == new_name || c.name == bleached_name)
        });
        if let Some(existing) = clash {
            return Err(ReefError::DuplicateCategory(existing.name.clone()));
        }

        for member in self.groups.get(&supercategory_id).into_iter().flatten() {
            if let Some(c) = self.categories.get_mut(member) {
                c.supercategory_name = new_name.to_string();
                if c.id == id {
                    c.name = new_name.to_string();
                } else if Some(c.id) == bleached_id {
                    c.name = bleached_name.clone();
                }
            }
        }
        debug!(id, name = new_name, "Category renamed");
        Ok(())
    }

    pub fn remove_category(&mut self, id: CategoryId) -> Result<Category> {
        self.remove_categories(&[id])?
            .pop()
            .ok_or(ReefError::CategoryNotFound(id))
    }

    /// Remove several categories at once. Nothing is removed if any id is
    /// reserved or unknown.
    pub fn remove_categories(&mut self, ids: &[CategoryId]) -> Result<Vec<Category>> {
        if ids.contains(&PREDICTED_ID) {
            return Err(ReefError::ReservedCategory(PREDICTED_ID));
        }
        if let Some(&missing) = ids.iter().find(|id| !self.categories.contains_key(id)) {
            return Err(ReefError::CategoryNotFound(missing));
        }
        let removed = ids
            .iter()
            .filter_map(|id| self.categories.remove(id))
            .collect();
        self.rebuild_groups();
        Ok(removed)
    }

    // ── Colors ──

    /// Fill color for masks of category `id`.
    pub fn mask_color(&self, id: CategoryId) -> Color {
        match id {
            PREDICTED_ID => palette::PREDICTED,
            PROMPT_PREVIEW_ID => palette::PROMPT,
            _ => match self.categories.get(&id) {
                Some(c) => palette::mask_color(c.supercategory_id),
                None => {
                    error!(id, "Color requested for unknown category");
                    palette::PREDICTED
                }
            },
        }
    }

    /// Label text color for category `id`.
    pub fn text_color(&self, id: CategoryId) -> Color {
        match id {
            PREDICTED_ID | PROMPT_PREVIEW_ID => palette::DEFAULT_TEXT,
            _ => match self.categories.get(&id) {
                Some(c) => palette::text_color(c.supercategory_id),
                None => {
                    error!(id, "Text color requested for unknown category");
                    palette::DEFAULT_TEXT
                }
            },
        }
    }

    /// Outline color: gray for bleached, black for dead, fill color otherwise.
    pub fn border_color(&self, id: CategoryId) -> Color {
        match self.categories.get(&id).map(|c| c.status) {
            Some(Status::Bleached) => palette::BLEACHED_BORDER,
            Some(Status::Dead) => palette::DEAD_BORDER,
            _ => self.mask_color(id),
        }
    }
}
