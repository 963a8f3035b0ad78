pub mod create;
pub mod hierarchy;
pub mod record;
pub mod schema;
pub mod xml;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::scanner::metadata::AudioReadError;
use record::{Record, RecordId, RecordKind};

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    AudioRead(#[from] AudioReadError),
    #[error("Malformed record file {path}: {message}")]
    Malformed { path: String, message: String },
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<crate::matcher::ConventionError> for ProjectError {
    fn from(e: crate::matcher::ConventionError) -> Self {
        Self::Validation(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProjectError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ProjectError + '_ {
    move |source| ProjectError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// The record collections the index exposes for lookup and CRUD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Folder,
    Bank,
    Bus,
    AssetFolder,
    Event,
}

impl Collection {
    pub fn contains(&self, kind: &RecordKind) -> bool {
        match self {
            Self::Folder => matches!(kind, RecordKind::EventFolder | RecordKind::MasterEventFolder),
            Self::Bank => matches!(kind, RecordKind::Bank),
            Self::Bus => matches!(kind, RecordKind::MixerGroup | RecordKind::MixerMaster),
            Self::AssetFolder => {
                matches!(kind, RecordKind::AssetFolder | RecordKind::MasterAssetFolder)
            }
            Self::Event => matches!(kind, RecordKind::Event),
        }
    }

    /// Kinds shown when rendering this collection's hierarchy.
    pub fn in_tree(&self, kind: &RecordKind) -> bool {
        match self {
            Self::Bank => self.contains(kind) || matches!(kind, RecordKind::BankFolder),
            Self::Event => self.contains(kind) || Self::Folder.contains(kind),
            _ => self.contains(kind),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Folder => "event folder",
            Self::Bank => "bank",
            Self::Bus => "bus",
            Self::AssetFolder => "asset folder",
            Self::Event => "event",
        }
    }

    /// Scheme prefix used in display paths.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Folder | Self::Event => "event:/",
            Self::Bank => "bank:/",
            Self::Bus => "bus:/",
            Self::AssetFolder => "",
        }
    }
}

/// Root records the workspace file points at.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceRoots {
    pub event_folder: RecordId,
    pub bank_folder: RecordId,
    pub asset_folder: RecordId,
    pub mixer: Option<RecordId>,
}

#[derive(Debug, Clone)]
struct StoredFile {
    serialization_model: String,
    ids: Vec<RecordId>,
}

/// In-memory index of every record in a project, plus which file each
/// record lives in.
#[derive(Debug)]
pub struct ProjectIndex {
    root: PathBuf,
    metadata_dir: PathBuf,
    serialization_model: String,
    records: HashMap<RecordId, Record>,
    files: BTreeMap<PathBuf, StoredFile>,
    owners: HashMap<RecordId, PathBuf>,
    roots: WorkspaceRoots,
}

fn read_document(path: &Path) -> Result<xml::RecordDocument> {
    let text = std::fs::read_to_string(path).map_err(io_error(path))?;
    xml::parse(&text).map_err(|message| ProjectError::Malformed {
        path: path.display().to_string(),
        message,
    })
}

impl ProjectIndex {
    /// Load a project from its directory (or any file directly inside it,
    /// such as the project file).
    pub fn load(path: &Path) -> Result<Self> {
        let root = if path.is_file() {
            path.parent().unwrap_or(Path::new(".")).to_path_buf()
        } else {
            path.to_path_buf()
        };
        let metadata_dir = root.join("Metadata");
        let workspace_file = metadata_dir.join("Workspace.xml");
        if !workspace_file.is_file() {
            return Err(ProjectError::NotFound(format!(
                "no project metadata at {}",
                workspace_file.display()
            )));
        }

        let workspace = read_document(&workspace_file)?;
        let mut index = Self {
            root,
            metadata_dir: metadata_dir.clone(),
            serialization_model: workspace.serialization_model.clone(),
            records: HashMap::new(),
            files: BTreeMap::new(),
            owners: HashMap::new(),
            roots: WorkspaceRoots {
                event_folder: RecordId::from(""),
                bank_folder: RecordId::from(""),
                asset_folder: RecordId::from(""),
                mixer: None,
            },
        };
        index.adopt(workspace_file.clone(), workspace)?;

        for entry in WalkDir::new(&metadata_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || path == workspace_file {
                continue;
            }
            let is_xml = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("xml"));
            if !is_xml {
                continue;
            }
            let doc = read_document(path)?;
            index.adopt(path.to_path_buf(), doc)?;
        }

        index.roots = index.resolve_roots()?;
        log::info!(
            "Loaded {} records from {} files in {}",
            index.records.len(),
            index.files.len(),
            index.root.display()
        );
        Ok(index)
    }

    fn adopt(&mut self, path: PathBuf, doc: xml::RecordDocument) -> Result<()> {
        let mut ids = Vec::with_capacity(doc.records.len());
        for record in &doc.records {
            schema::validate(record)
                .map_err(|m| ProjectError::Validation(format!("{}: {m}", path.display())))?;
            if self.records.contains_key(&record.id) || ids.contains(&record.id) {
                return Err(ProjectError::Validation(format!(
                    "{}: duplicate identifier {}",
                    path.display(),
                    record.id
                )));
            }
            ids.push(record.id.clone());
        }
        for record in doc.records {
            self.owners.insert(record.id.clone(), path.clone());
            self.records.insert(record.id.clone(), record);
        }
        self.files.insert(
            path,
            StoredFile {
                serialization_model: doc.serialization_model,
                ids,
            },
        );
        Ok(())
    }

    fn resolve_roots(&self) -> Result<WorkspaceRoots> {
        let workspace = self
            .records
            .values()
            .find(|r| r.kind == RecordKind::Workspace);

        let find = |relationship: &str, kind: RecordKind| -> Result<RecordId> {
            if let Some(id) = workspace.and_then(|w| w.first(relationship)) {
                if self.records.get(id).is_some_and(|r| r.kind == kind) {
                    return Ok(id.clone());
                }
            }
            let mut candidates = self.records.values().filter(|r| r.kind == kind);
            match (candidates.next(), candidates.next()) {
                (Some(r), None) => Ok(r.id.clone()),
                _ => Err(ProjectError::NotFound(format!("workspace {kind} record"))),
            }
        };

        Ok(WorkspaceRoots {
            event_folder: find("masterEventFolder", RecordKind::MasterEventFolder)?,
            bank_folder: find("masterBankFolder", RecordKind::MasterBankFolder)?,
            asset_folder: find("masterAssetFolder", RecordKind::MasterAssetFolder)?,
            mixer: find("mixer", RecordKind::Mixer).ok(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_dir(&self) -> &Path {
        &self.metadata_dir
    }

    pub fn roots(&self) -> &WorkspaceRoots {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, id: &RecordId) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// File a record is persisted in.
    pub fn file_of(&self, id: &RecordId) -> Option<&Path> {
        self.owners.get(id).map(|p| p.as_path())
    }

    /// Look up a record and check it belongs to `collection`.
    pub fn require(&self, collection: Collection, id: &RecordId) -> Result<&Record> {
        self.records
            .get(id)
            .filter(|r| collection.contains(&r.kind))
            .ok_or_else(|| ProjectError::NotFound(format!("{} {id}", collection.label())))
    }

    /// Every record of a collection, ordered by display path.
    pub fn collection(&self, collection: Collection) -> Vec<&Record> {
        let mut records: Vec<(String, &Record)> = self
            .records
            .values()
            .filter(|r| collection.contains(&r.kind))
            .map(|r| (self.path_of(&r.id), r))
            .collect();
        records.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        records.into_iter().map(|(_, r)| r).collect()
    }

    pub fn folders(&self) -> Vec<&Record> {
        self.collection(Collection::Folder)
    }

    pub fn banks(&self) -> Vec<&Record> {
        self.collection(Collection::Bank)
    }

    pub fn buses(&self) -> Vec<&Record> {
        self.collection(Collection::Bus)
    }

    pub fn asset_folders(&self) -> Vec<&Record> {
        self.collection(Collection::AssetFolder)
    }

    pub fn events(&self) -> Vec<&Record> {
        self.collection(Collection::Event)
    }

    /// The unique bus with no parent.
    pub fn master_bus(&self) -> Result<RecordId> {
        let mut masters = self
            .records
            .values()
            .filter(|r| Collection::Bus.contains(&r.kind) && r.parent().is_none());
        match (masters.next(), masters.next()) {
            (Some(r), None) => Ok(r.id.clone()),
            (None, _) => Err(ProjectError::NotFound("master bus".into())),
            (Some(_), Some(_)) => Err(ProjectError::Validation(
                "more than one bus has no output".into(),
            )),
        }
    }

    /// Resolve user input naming a record: either an identifier or a display
    /// path such as `event:/SFX/Enemies` or `SFX/Enemies`.
    pub fn resolve(&self, collection: Collection, text: &str) -> Result<RecordId> {
        let text = text.trim();
        if RecordId::looks_like_id(text) {
            return Ok(self.require(collection, &RecordId::from(text))?.id.clone());
        }

        let wanted = normalize_path(text);
        let mut found = self
            .records
            .values()
            .filter(|r| collection.contains(&r.kind))
            .filter(|r| normalize_path(&self.path_of(&r.id)) == wanted);
        match (found.next(), found.next()) {
            (Some(r), None) => Ok(r.id.clone()),
            (None, _) => Err(ProjectError::NotFound(format!("{} '{text}'", collection.label()))),
            (Some(_), Some(_)) => Err(ProjectError::Validation(format!(
                "{} path '{text}' is ambiguous",
                collection.label()
            ))),
        }
    }

    /// Rename a record and rewrite its file.
    pub fn rename(&mut self, collection: Collection, id: &RecordId, name: &str) -> Result<()> {
        create::check_name(name)?;
        let mut updated = self.require(collection, id)?.clone();
        let old = updated.name().unwrap_or_default().to_string();
        updated.set_property("name", name);
        self.commit(vec![updated])?;
        log::info!("Renamed {} {id}: '{old}' -> '{name}'", collection.label());
        Ok(())
    }

    /// Delete a record together with the file it owns.
    ///
    /// Master roots, folders and buses that still have children, and banks
    /// still assigned to events are refused.
    pub fn delete(&mut self, collection: Collection, id: &RecordId) -> Result<()> {
        let record = self.require(collection, id)?;
        if record.parent().is_none() && collection != Collection::Event {
            return Err(ProjectError::Validation(format!(
                "{} {id} is a master root and cannot be deleted",
                collection.label()
            )));
        }

        let dependants = match collection {
            Collection::Bank => self
                .records
                .values()
                .filter(|r| r.kind == RecordKind::Event && r.relationship("banks").contains(id))
                .count(),
            Collection::Bus => self
                .records
                .values()
                .filter(|r| r.id != *id && r.relationship("output").contains(id))
                .count(),
            _ => self
                .records
                .values()
                .filter(|r| r.id != *id && r.parent() == Some(id))
                .count(),
        };
        if dependants > 0 {
            return Err(ProjectError::Validation(format!(
                "{} {id} is still referenced by {dependants} record(s)",
                collection.label()
            )));
        }

        let path = self
            .owners
            .get(id)
            .cloned()
            .ok_or_else(|| ProjectError::NotFound(format!("file for {id}")))?;
        let primary = self.files.get(&path).and_then(|f| f.ids.first());
        if primary != Some(id) {
            return Err(ProjectError::Validation(format!(
                "{} {id} does not own {}",
                collection.label(),
                path.display()
            )));
        }

        self.remove_file(&path)?;
        log::info!("Deleted {} {id} ({})", collection.label(), path.display());
        Ok(())
    }

    /// Remove a file and every record it holds.
    fn remove_file(&mut self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).map_err(io_error(path))?;
        if let Some(file) = self.files.remove(path) {
            for removed in &file.ids {
                self.records.remove(removed);
                self.owners.remove(removed);
            }
        }
        Ok(())
    }

    /// Undo files written earlier in an operation that then failed.
    pub(crate) fn discard_files(&mut self, paths: &[PathBuf]) {
        for path in paths {
            match self.remove_file(path) {
                Ok(()) => log::debug!("Removed {}", path.display()),
                Err(e) => log::warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }

    /// Write a brand-new file holding `records`, whose first record names the
    /// file, then adopt them into the index.
    pub(crate) fn adopt_new_file(&mut self, records: Vec<Record>) -> Result<PathBuf> {
        let primary = records
            .first()
            .ok_or_else(|| ProjectError::Validation("nothing to persist".into()))?;
        let dir = primary.kind.storage_dir().ok_or_else(|| {
            ProjectError::Validation(format!("{} records are not stored on their own", primary.kind))
        })?;
        let path = self
            .metadata_dir
            .join(dir)
            .join(format!("{}.xml", primary.id));
        if self.files.contains_key(&path) {
            return Err(ProjectError::Validation(format!(
                "{} already exists",
                path.display()
            )));
        }

        let doc = xml::RecordDocument {
            serialization_model: self.serialization_model.clone(),
            records,
        };
        for record in &doc.records {
            schema::validate(record).map_err(ProjectError::Validation)?;
            if self.records.contains_key(&record.id) {
                return Err(ProjectError::Validation(format!(
                    "identifier {} is already in use",
                    record.id
                )));
            }
        }

        write_file(&path, &doc.serialization_model, &doc.records)?;
        self.adopt(path.clone(), doc)?;
        Ok(path)
    }

    /// Replace existing records with updated copies, rewriting every file
    /// they live in before touching the index.
    pub(crate) fn commit(&mut self, updated: Vec<Record>) -> Result<()> {
        {
            let mut by_file: BTreeMap<PathBuf, Vec<&Record>> = BTreeMap::new();
            for record in &updated {
                schema::validate(record).map_err(ProjectError::Validation)?;
                let path = self
                    .owners
                    .get(&record.id)
                    .ok_or_else(|| ProjectError::NotFound(format!("record {}", record.id)))?;
                by_file.entry(path.clone()).or_default().push(record);
            }

            for (path, changes) in &by_file {
                let Some(file) = self.files.get(path) else {
                    continue;
                };
                let records: Vec<&Record> = file
                    .ids
                    .iter()
                    .filter_map(|id| {
                        changes
                            .iter()
                            .find(|r| r.id == *id)
                            .copied()
                            .or_else(|| self.records.get(id))
                    })
                    .collect();
                write_file(path, &file.serialization_model, records)?;
            }
        }

        for record in updated {
            self.records.insert(record.id.clone(), record);
        }
        Ok(())
    }
}

fn write_file<'a>(
    path: &Path,
    serialization_model: &str,
    records: impl IntoIterator<Item = &'a Record>,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let text = xml::write(serialization_model, records);
    std::fs::write(path, text).map_err(io_error(path))?;
    log::debug!("Wrote {}", path.display());
    Ok(())
}

fn normalize_path(path: &str) -> String {
    let without_scheme = match path.find(":/") {
        Some(pos) => &path[pos + 2..],
        None => path,
    };
    without_scheme.trim_matches('/').to_string()
}
