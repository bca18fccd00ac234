//! Catalog - the read-only list of celebrities and their relationships
//!
//! Records are loaded once from JSON. Names in the source data can be plain
//! strings or `{ "en": .., "ru": .. }` objects; they are resolved to a single
//! display language here, and partner/ex references are resolved from names
//! to ids, so nothing downstream ever sees a localized value.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bundled catalog shipped with the game.
pub const BUNDLED_CATALOG_JSON: &str = include_str!("../../../data/celebrities.json");

/// Stable catalog identifier of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Display language used when resolving names at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    En,
    Ru,
}

/// An immutable catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub image: String,
    /// Expected to be symmetric, but not required to be.
    pub partner: Option<EntityId>,
    /// One-directional: A listing B does not imply B lists A.
    pub exes: Vec<EntityId>,
}

impl Entity {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: EntityId(id),
            name: name.into(),
            image: String::new(),
            partner: None,
            exes: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_partner(mut self, partner: u32) -> Self {
        self.partner = Some(EntityId(partner));
        self
    }

    pub fn with_exes(mut self, exes: &[u32]) -> Self {
        self.exes = exes.iter().map(|&id| EntityId(id)).collect();
        self
    }

    /// Entities with no relationships only pad the grid.
    pub fn is_filler(&self) -> bool {
        self.partner.is_none() && self.exes.is_empty()
    }
}

/// Ordered, read-only collection of entities.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entities: Vec<Entity>,
    index: HashMap<EntityId, usize>,
}

impl Catalog {
    /// Build a catalog from already-resolved entities.
    pub fn from_entities(entities: Vec<Entity>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(entities.len());
        for (idx, entity) in entities.iter().enumerate() {
            if index.insert(entity.id, idx).is_some() {
                return Err(CatalogError::DuplicateId(entity.id));
            }
        }
        Ok(Self { entities, index })
    }

    /// Parse catalog JSON and resolve names for `language`.
    pub fn from_json(json: &str, language: Language) -> Result<Self, CatalogError> {
        let records: Vec<RawRecord> = serde_json::from_str(json)?;

        // Canonical (English) name -> id, used to resolve references
        let mut by_name: HashMap<&str, EntityId> = HashMap::with_capacity(records.len());
        for record in &records {
            let key = record.name.canonical();
            if by_name.insert(key, EntityId(record.id)).is_some() {
                return Err(CatalogError::DuplicateName(key.to_string()));
            }
        }

        let resolve = |owner: u32, text: &LocalizedText| -> Option<EntityId> {
            let found = by_name.get(text.canonical()).copied();
            if found.is_none() {
                log::debug!(
                    "Catalog entry {} references unknown entity '{}'",
                    owner,
                    text.canonical()
                );
            }
            found
        };

        let entities = records
            .iter()
            .map(|record| Entity {
                id: EntityId(record.id),
                name: record.name.resolve(language).to_string(),
                image: record.image.clone(),
                partner: record.partner.as_ref().and_then(|p| resolve(record.id, p)),
                exes: record
                    .exes
                    .iter()
                    .filter_map(|ex| resolve(record.id, ex))
                    .collect(),
            })
            .collect();

        Self::from_entities(entities)
    }

    /// The catalog bundled with the crate.
    pub fn bundled(language: Language) -> Result<Self, CatalogError> {
        Self::from_json(BUNDLED_CATALOG_JSON, language)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.index.get(&id).map(|&idx| &self.entities[idx])
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    /// Partner id, only if the partner is present in this catalog.
    pub fn partner_of(&self, entity: &Entity) -> Option<EntityId> {
        entity
            .partner
            .filter(|&p| p != entity.id && self.contains(p))
    }

    /// Ex ids that are present in this catalog.
    pub fn resolvable_exes<'a>(
        &'a self,
        entity: &'a Entity,
    ) -> impl Iterator<Item = EntityId> + 'a {
        entity
            .exes
            .iter()
            .copied()
            .filter(move |&ex| ex != entity.id && self.contains(ex))
    }

    /// Display name, or the id when the entity is unknown.
    pub fn display_name(&self, id: EntityId) -> String {
        self.get(id)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

/// A name as it appears in the source data.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum LocalizedText {
    Plain(String),
    Localized { en: String, ru: Option<String> },
}

impl LocalizedText {
    fn canonical(&self) -> &str {
        match self {
            LocalizedText::Plain(s) => s,
            LocalizedText::Localized { en, .. } => en,
        }
    }

    fn resolve(&self, language: Language) -> &str {
        match (self, language) {
            (LocalizedText::Localized { ru: Some(ru), .. }, Language::Ru) => ru,
            _ => self.canonical(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawRecord {
    id: u32,
    name: LocalizedText,
    #[serde(default)]
    image: String,
    #[serde(default)]
    partner: Option<LocalizedText>,
    #[serde(default)]
    exes: Vec<LocalizedText>,
}

/// Errors raised while loading a catalog
#[derive(Debug)]
pub enum CatalogError {
    Json(serde_json::Error),
    DuplicateId(EntityId),
    DuplicateName(String),
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        CatalogError::Json(e)
    }
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Json(e) => write!(f, "Catalog parse error: {}", e),
            CatalogError::DuplicateId(id) => write!(f, "Duplicate catalog id {}", id),
            CatalogError::DuplicateName(name) => write!(f, "Duplicate catalog name '{}'", name),
        }
    }
}

impl std::error::Error for CatalogError {}
