//! Derived folder hierarchy: parent lookups, containment, display paths.
//!
//! Parent links come from each kind's parent relationship (`folder` for
//! folders, events and banks; `output` for buses). Every walk guards
//! against malformed data: a record that names itself as parent ends the
//! walk, and so does any longer cycle.

use std::collections::HashSet;

use super::record::{Record, RecordId};
use super::{Collection, ProjectIndex, Result};

/// One line of a rendered hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEntry {
    pub depth: usize,
    pub id: RecordId,
    pub name: String,
}

impl ProjectIndex {
    pub fn parent_of(&self, id: &RecordId) -> Option<&RecordId> {
        self.record(id).and_then(Record::parent)
    }

    /// True if `start` is `ancestor` or sits below it.
    pub fn is_within(&self, start: &RecordId, ancestor: &RecordId) -> bool {
        let mut current = start;
        let mut seen = HashSet::new();
        loop {
            if current == ancestor {
                return true;
            }
            if !seen.insert(current) {
                return false;
            }
            match self.parent_of(current) {
                Some(parent) if parent == current => return false,
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Every event whose folder is `folder` or any folder beneath it,
    /// ordered by name.
    pub fn events_in_folder(&self, folder: &RecordId) -> Result<Vec<&Record>> {
        self.require(Collection::Folder, folder)?;
        let mut events: Vec<&Record> = self
            .events()
            .into_iter()
            .filter(|event| {
                event
                    .first("folder")
                    .is_some_and(|f| self.is_within(f, folder))
            })
            .collect();
        events.sort_by(|a, b| a.name().cmp(&b.name()).then_with(|| a.id.cmp(&b.id)));
        Ok(events)
    }

    /// Direct children of a record within its hierarchy.
    pub fn children_of(&self, id: &RecordId) -> Vec<&Record> {
        let mut children: Vec<&Record> = self
            .records()
            .filter(|r| r.id != *id && r.parent() == Some(id))
            .collect();
        children.sort_by(|a, b| a.name().cmp(&b.name()).then_with(|| a.id.cmp(&b.id)));
        children
    }

    /// Names from just below the hierarchy root down to `id`, joined by `/`.
    /// The root itself has an empty path.
    pub fn path_of(&self, id: &RecordId) -> String {
        let mut names = Vec::new();
        let mut current = id;
        let mut seen = HashSet::new();
        while seen.insert(current) {
            let Some(record) = self.record(current) else {
                break;
            };
            let Some(parent) = record.parent() else {
                break;
            };
            names.push(record.name().unwrap_or_default());
            if parent == current {
                break;
            }
            current = parent;
        }
        names.reverse();
        names.join("/")
    }

    /// Path with its collection scheme, e.g. `event:/SFX/Enemies/Attack`.
    pub fn display_path(&self, collection: Collection, id: &RecordId) -> String {
        match collection {
            Collection::AssetFolder => self.asset_folder_path(id),
            _ => format!("{}{}", collection.scheme(), self.path_of(id)),
        }
    }

    /// Asset-relative directory of an asset folder, with a trailing `/`
    /// (empty for the master asset folder).
    pub fn asset_folder_path(&self, id: &RecordId) -> String {
        let path = self.path_of(id);
        if path.is_empty() { path } else { format!("{path}/") }
    }

    /// Depth-first listing of a collection's hierarchy under `root`.
    pub fn tree(&self, collection: Collection, root: &RecordId) -> Vec<TreeEntry> {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        self.walk_tree(collection, root, 0, &mut seen, &mut entries);
        entries
    }

    fn walk_tree<'a>(
        &'a self,
        collection: Collection,
        id: &'a RecordId,
        depth: usize,
        seen: &mut HashSet<&'a RecordId>,
        entries: &mut Vec<TreeEntry>,
    ) {
        if !seen.insert(id) {
            return;
        }
        let name = self
            .record(id)
            .and_then(Record::name)
            .unwrap_or("(root)")
            .to_string();
        entries.push(TreeEntry {
            depth,
            id: id.clone(),
            name,
        });
        for child in self.children_of(id) {
            if collection.in_tree(&child.kind) {
                self.walk_tree(collection, &child.id, depth + 1, seen, entries);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::record::RecordKind;
    use crate::testutil::{self, ids};

    fn names<'a>(records: &[&'a Record]) -> Vec<&'a str> {
        records.iter().filter_map(|r| r.name()).collect()
    }

    #[test]
    fn test_events_in_folder_is_reflexive() {
        let fx = testutil::project();
        let index = ProjectIndex::load(&fx.root).unwrap();
        let events = index
            .events_in_folder(&RecordId::from(ids::TEMPLATES_FOLDER))
            .unwrap();
        assert_eq!(names(&events), vec!["Template_Attack", "Template_Idle"]);
    }

    #[test]
    fn test_events_in_folder_is_transitive() {
        let fx = testutil::project();
        let index = ProjectIndex::load(&fx.root).unwrap();
        let events = index.events_in_folder(&RecordId::from(ids::SFX_FOLDER)).unwrap();
        assert_eq!(names(&events), vec!["Old_Event"]);

        let all = index
            .events_in_folder(&RecordId::from(ids::MASTER_EVENT_FOLDER))
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_events_in_unknown_folder_is_not_found() {
        let fx = testutil::project();
        let index = ProjectIndex::load(&fx.root).unwrap();
        assert!(index.events_in_folder(&RecordId::from("{nope}")).is_err());
    }

    #[test]
    fn test_self_parented_folder_terminates() {
        let fx = testutil::project();
        let looped = Record::new(RecordKind::EventFolder, RecordId::from("{loop}"))
            .with_property("name", "Loop")
            .with_relationship("folder", vec![RecordId::from("{loop}")]);
        let event = Record::new(RecordKind::Event, RecordId::from("{in-loop}"))
            .with_property("name", "Stuck")
            .with_relationship("folder", vec![RecordId::from("{loop}")]);
        testutil::write_records(&fx.root, "EventFolder/{loop}.xml", &[looped]);
        testutil::write_records(&fx.root, "Event/{in-loop}.xml", &[event]);

        let index = ProjectIndex::load(&fx.root).unwrap();
        let in_loop = index.events_in_folder(&RecordId::from("{loop}")).unwrap();
        assert_eq!(names(&in_loop), vec!["Stuck"]);

        let under_master = index
            .events_in_folder(&RecordId::from(ids::MASTER_EVENT_FOLDER))
            .unwrap();
        assert!(!names(&under_master).contains(&"Stuck"));
        assert_eq!(index.path_of(&RecordId::from("{in-loop}")), "Loop/Stuck");
    }

    #[test]
    fn test_two_folder_cycle_terminates() {
        let fx = testutil::project();
        let a = Record::new(RecordKind::EventFolder, RecordId::from("{cyc-a}"))
            .with_property("name", "A")
            .with_relationship("folder", vec![RecordId::from("{cyc-b}")]);
        let b = Record::new(RecordKind::EventFolder, RecordId::from("{cyc-b}"))
            .with_property("name", "B")
            .with_relationship("folder", vec![RecordId::from("{cyc-a}")]);
        testutil::write_records(&fx.root, "EventFolder/{cyc-a}.xml", &[a]);
        testutil::write_records(&fx.root, "EventFolder/{cyc-b}.xml", &[b]);

        let index = ProjectIndex::load(&fx.root).unwrap();
        assert!(!index.is_within(&RecordId::from("{cyc-a}"), &RecordId::from(ids::SFX_FOLDER)));
        assert!(index.is_within(&RecordId::from("{cyc-a}"), &RecordId::from("{cyc-b}")));
        assert!(!index.path_of(&RecordId::from("{cyc-a}")).is_empty());
    }

    #[test]
    fn test_display_paths_use_collection_schemes() {
        let fx = testutil::project();
        let index = ProjectIndex::load(&fx.root).unwrap();
        assert_eq!(
            index.display_path(Collection::Event, &RecordId::from(ids::OLD_EVENT)),
            "event:/SFX/Enemies/Old_Event"
        );
        assert_eq!(
            index.display_path(Collection::Bus, &RecordId::from(ids::CHARACTER_BUS)),
            "bus:/Characters"
        );
        assert_eq!(
            index.display_path(Collection::Folder, &RecordId::from(ids::MASTER_EVENT_FOLDER)),
            "event:/"
        );
    }

    #[test]
    fn test_tree_lists_folders_depth_first() {
        let fx = testutil::project();
        let index = ProjectIndex::load(&fx.root).unwrap();
        let tree = index.tree(Collection::Folder, &index.roots().event_folder);
        let rendered: Vec<(usize, &str)> =
            tree.iter().map(|e| (e.depth, e.name.as_str())).collect();
        assert_eq!(rendered[0].0, 0);
        assert!(rendered.contains(&(1, "SFX")));
        assert!(rendered.contains(&(2, "Enemies")));
        assert!(rendered.contains(&(1, "Templates")));
    }
}
