//! Quest Catalog
//!
//! Loads quest definitions from TOML files and checks follow-up references.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{info, warn};

use super::definition::{Quest, QuestId, QuestRef, RawQuestFile};
use crate::error::CatalogError;

/// All authored quest definitions, keyed by id
#[derive(Debug, Default, Clone)]
pub struct QuestCatalog {
    quests: HashMap<QuestId, QuestRef>,
}

impl QuestCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.toml` file under `dir`, recursively
    ///
    /// Files that fail to parse are skipped with a warning; an unreadable
    /// directory is an error. A missing directory yields an empty catalog.
    pub fn load_from_directory(dir: &Path) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();

        if !dir.exists() {
            warn!("Quest directory does not exist: {:?}", dir);
            return Ok(catalog);
        }

        let mut paths = Vec::new();
        collect_toml_files(dir, &mut paths)?;
        paths.sort();

        let mut count = 0;
        for path in paths {
            match load_quest_file(&path) {
                Ok(quest) => {
                    info!("Loaded quest: {} ({})", quest.name, quest.id);
                    catalog.insert(quest);
                    count += 1;
                }
                Err(e) => warn!("Failed to load quest {:?}: {}", path, e),
            }
        }

        info!("Loaded {} quest definitions", count);
        catalog.validate_follow_ups();
        Ok(catalog)
    }

    /// Add or replace a definition
    pub fn insert(&mut self, quest: Quest) -> QuestRef {
        let quest = Rc::new(quest);
        if self.quests.insert(quest.id.clone(), Rc::clone(&quest)).is_some() {
            warn!("Duplicate quest ID '{}', overwriting", quest.id);
        }
        quest
    }

    pub fn get(&self, id: &QuestId) -> Option<QuestRef> {
        self.quests.get(id).cloned()
    }

    pub fn contains(&self, id: &QuestId) -> bool {
        self.quests.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }

    /// All ids in sorted order
    pub fn ids(&self) -> Vec<QuestId> {
        let mut ids: Vec<QuestId> = self.quests.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuestRef> {
        self.quests.values()
    }

    /// Report follow-up references to quests that were never loaded
    pub fn validate_follow_ups(&self) -> Vec<(QuestId, QuestId)> {
        let mut missing = Vec::new();
        for quest in self.quests.values() {
            for follow_up in &quest.follow_ups {
                if !self.quests.contains_key(follow_up) {
                    warn!(
                        "Quest '{}' references non-existent follow-up quest '{}'",
                        quest.id, follow_up
                    );
                    missing.push((quest.id.clone(), follow_up.clone()));
                }
            }
        }
        missing.sort();
        missing
    }
}

fn load_quest_file(path: &Path) -> Result<Quest, CatalogError> {
    let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let raw: RawQuestFile = toml::from_str(&content).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Quest::from_raw(&raw.quest)
}

/// Recursively gather `*.toml` paths under `dir`
pub(crate) fn collect_toml_files(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<(), CatalogError> {
    let io_error = |source| CatalogError::Io {
        path: dir.to_path_buf(),
        source,
    };

    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();

        if path.is_dir() {
            collect_toml_files(&path, paths)?;
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            paths.push(path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_quest_toml(id: &str, follow_up: &str) -> String {
        format!(
            r#"
[quest]
id = "{id}"
name = "Test Quest"
description = "A test quest"
follow_ups = ["{follow_up}"]

[[quest.objectives]]
description = "Read the letter"
"#
        )
    }

    #[test]
    fn test_load_quests_recursively() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("act_one");
        std::fs::create_dir_all(&nested).unwrap();

        std::fs::write(temp_dir.path().join("a.toml"), create_test_quest_toml("a", "b")).unwrap();
        std::fs::write(nested.join("b.toml"), create_test_quest_toml("b", "ghost")).unwrap();
        std::fs::write(nested.join("broken.toml"), "[quest\n").unwrap();
        std::fs::write(nested.join("notes.txt"), "ignored").unwrap();

        let catalog = QuestCatalog::load_from_directory(temp_dir.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.ids(), vec![QuestId::from("a"), QuestId::from("b")]);

        let quest = catalog.get(&QuestId::from("a")).unwrap();
        assert_eq!(quest.name, "Test Quest");
        assert_eq!(quest.objective_count(), 1);

        assert_eq!(
            catalog.validate_follow_ups(),
            vec![(QuestId::from("b"), QuestId::from("ghost"))]
        );
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = QuestCatalog::load_from_directory(&temp_dir.path().join("nope")).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_insert_overwrites() {
        let mut catalog = QuestCatalog::new();
        catalog.insert(Quest::new("q", "First"));
        catalog.insert(Quest::new("q", "Second"));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(&QuestId::from("q")).unwrap().name, "Second");
    }
}
