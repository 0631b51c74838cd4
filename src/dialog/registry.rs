//! Dialog Catalog
//!
//! Loads dialog definitions from TOML files and checks branch targets.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;
use tracing::{info, warn};

use super::definition::{Dialog, DialogId, DialogRef, RawDialogFile};
use crate::error::CatalogError;
use crate::quest::registry::collect_toml_files;
use crate::quest::QuestCatalog;

#[derive(Debug, Default, Clone)]
pub struct DialogCatalog {
    dialogs: HashMap<DialogId, DialogRef>,
}

/// A reference from a dialog choice to something that does not exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DanglingReference {
    Dialog { from: DialogId, target: DialogId },
    Quest { from: DialogId, quest: crate::quest::QuestId },
}

impl DialogCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.toml` file under `dir`, recursively
    pub fn load_from_directory(dir: &Path) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();

        if !dir.exists() {
            warn!("Dialog directory does not exist: {:?}", dir);
            return Ok(catalog);
        }

        let mut paths = Vec::new();
        collect_toml_files(dir, &mut paths)?;
        paths.sort();

        for path in paths {
            match load_dialog_file(&path) {
                Ok(dialog) => {
                    info!("Loaded dialog: {} ({} lines)", dialog.id, dialog.lines.len());
                    catalog.insert(dialog);
                }
                Err(e) => warn!("Failed to load dialog {:?}: {}", path, e),
            }
        }

        info!("Loaded {} dialog definitions", catalog.len());

        for cycle_entry in catalog.find_cycles() {
            info!("Dialog '{}' is part of a looping conversation", cycle_entry);
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, dialog: Dialog) -> DialogRef {
        let dialog = Rc::new(dialog);
        if self.dialogs.insert(dialog.id.clone(), Rc::clone(&dialog)).is_some() {
            warn!("Duplicate dialog ID '{}', overwriting", dialog.id);
        }
        dialog
    }

    pub fn get(&self, id: &DialogId) -> Option<DialogRef> {
        self.dialogs.get(id).cloned()
    }

    pub fn contains(&self, id: &DialogId) -> bool {
        self.dialogs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.dialogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }

    pub fn ids(&self) -> Vec<DialogId> {
        let mut ids: Vec<DialogId> = self.dialogs.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Report branches to unknown dialogs and grants of unknown quests
    pub fn validate_references(&self, quests: &QuestCatalog) -> Vec<DanglingReference> {
        let mut dangling = Vec::new();

        for id in self.ids() {
            let dialog = &self.dialogs[&id];
            for choice in dialog.lines.iter().flat_map(|l| l.choices.iter()) {
                if let Some(target) = &choice.next_dialog {
                    if !self.dialogs.contains_key(target) {
                        warn!("Dialog '{}' branches to non-existent dialog '{}'", id, target);
                        dangling.push(DanglingReference::Dialog {
                            from: id.clone(),
                            target: target.clone(),
                        });
                    }
                }
                if let Some(quest) = &choice.grants_quest {
                    if !quests.contains(quest) {
                        warn!("Dialog '{}' grants non-existent quest '{}'", id, quest);
                        dangling.push(DanglingReference::Quest {
                            from: id.clone(),
                            quest: quest.clone(),
                        });
                    }
                }
            }
        }

        dangling
    }

    /// Dialogs that a branch loops back to
    ///
    /// Loops are allowed (a conversation can return to its menu), so this is
    /// informational only.
    pub fn find_cycles(&self) -> Vec<DialogId> {
        fn visit(
            id: &DialogId,
            dialogs: &HashMap<DialogId, DialogRef>,
            visited: &mut HashSet<DialogId>,
            visiting: &mut HashSet<DialogId>,
            loops: &mut Vec<DialogId>,
        ) {
            if visited.contains(id) {
                return;
            }
            visiting.insert(id.clone());

            if let Some(dialog) = dialogs.get(id) {
                let mut targets: Vec<&DialogId> = dialog.branches().collect();
                targets.sort();
                targets.dedup();
                for target in targets {
                    if visiting.contains(target) {
                        if !loops.contains(target) {
                            loops.push(target.clone());
                        }
                    } else {
                        visit(target, dialogs, visited, visiting, loops);
                    }
                }
            }

            visiting.remove(id);
            visited.insert(id.clone());
        }

        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();
        let mut loops = Vec::new();
        for id in self.ids() {
            visit(&id, &self.dialogs, &mut visited, &mut visiting, &mut loops);
        }
        loops
    }
}

fn load_dialog_file(path: &Path) -> Result<Dialog, CatalogError> {
    let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let raw: RawDialogFile = toml::from_str(&content).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Dialog::from_raw(&raw.dialog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::{DialogChoice, DialogLine};
    use crate::quest::Quest;
    use tempfile::TempDir;

    fn menu(id: &str, targets: &[&str]) -> Dialog {
        let mut line = DialogLine::new("Choose.");
        for target in targets {
            line = line.with_choice(DialogChoice::new(*target).leading_to(*target));
        }
        Dialog::new(id).with_line(line)
    }

    #[test]
    fn test_load_from_directory() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("maid.toml"),
            r#"
[dialog]
id = "maid"

[[dialog.lines]]
text = "The master is not home."
speaker = { name = "Maid" }
"#,
        )
        .unwrap();
        std::fs::write(temp_dir.path().join("empty.toml"), "[dialog]\nid = \"empty\"\n").unwrap();

        let catalog = DialogCatalog::load_from_directory(temp_dir.path()).unwrap();
        assert_eq!(catalog.ids(), vec![DialogId::from("maid")]);
        assert!(!catalog.contains(&DialogId::from("empty")));
    }

    #[test]
    fn test_validate_references() {
        let mut quests = QuestCatalog::new();
        quests.insert(Quest::new("known", "Known"));

        let mut catalog = DialogCatalog::new();
        catalog.insert(
            Dialog::new("start").with_line(
                DialogLine::new("Hi")
                    .with_choice(DialogChoice::new("a").granting("known").leading_to("nowhere"))
                    .with_choice(DialogChoice::new("b").granting("unknown")),
            ),
        );

        let dangling = catalog.validate_references(&quests);
        assert_eq!(
            dangling,
            vec![
                DanglingReference::Dialog {
                    from: DialogId::from("start"),
                    target: DialogId::from("nowhere"),
                },
                DanglingReference::Quest {
                    from: DialogId::from("start"),
                    quest: crate::quest::QuestId::from("unknown"),
                },
            ]
        );
    }

    #[test]
    fn test_find_cycles() {
        let mut catalog = DialogCatalog::new();
        catalog.insert(menu("hub", &["rumors", "leave"]));
        catalog.insert(menu("rumors", &["hub"]));
        catalog.insert(menu("leave", &[]));
        assert_eq!(catalog.find_cycles(), vec![DialogId::from("hub")]);

        let mut acyclic = DialogCatalog::new();
        acyclic.insert(menu("a", &["b"]));
        acyclic.insert(menu("b", &[]));
        assert!(acyclic.find_cycles().is_empty());
    }
}
