//! A working session: one loaded project plus the user's current choices,
//! and the populate pipeline that runs over them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};

use crate::cloner::CloneRequest;
use crate::matcher::{self, Convention, Reconciliation};
use crate::project::record::{RecordId, RecordKind};
use crate::project::{Collection, ProjectIndex, Result};
use crate::request::{self, ImportRequest, PlannedEvent, RequestContext};
use crate::scanner::{self, AudioFileDescriptor};

/// Where templates come from and where clones go.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub template_folder: RecordId,
    pub destination: RecordId,
    pub bank: Option<RecordId>,
    pub bus: Option<RecordId>,
    /// Asset-relative folder new audio files are registered under.
    pub asset_folder: String,
}

#[derive(Debug, Default)]
pub struct PopulateReport {
    /// New event names and identifiers, in creation order.
    pub created: Vec<(String, RecordId)>,
    /// Events not cloned because the destination already has one by that name.
    pub skipped: Vec<String>,
    /// Files outside the convention or matching no template.
    pub orphan_files: Vec<AudioFileDescriptor>,
    /// Expected events with no audio.
    pub orphan_events: Vec<String>,
    /// Audio files that could not be read and were left out.
    pub unreadable_audio: Vec<PathBuf>,
    /// Event name and error for each clone that failed.
    pub failures: Vec<(String, String)>,
}

pub struct Session {
    pub index: ProjectIndex,
    pub selection: Selection,
}

impl Session {
    /// Start a session, checking every selected record exists.
    pub fn new(index: ProjectIndex, selection: Selection) -> Result<Self> {
        index.require(Collection::Folder, &selection.template_folder)?;
        index.require(Collection::Folder, &selection.destination)?;
        if let Some(bank) = &selection.bank {
            index.require(Collection::Bank, bank)?;
        }
        if let Some(bus) = &selection.bus {
            index.require(Collection::Bus, bus)?;
        }
        Ok(Self { index, selection })
    }

    pub fn open(project: &Path, selection: Selection) -> Result<Self> {
        Self::new(ProjectIndex::load(project)?, selection)
    }

    /// Templates in the template folder keyed by the event name each is
    /// expected to produce. When two templates expect the same name the first
    /// by name wins.
    pub fn templates(&self, convention: &Convention) -> Result<BTreeMap<String, RecordId>> {
        let mut expected = BTreeMap::new();
        for template in self.index.events_in_folder(&self.selection.template_folder)? {
            let name = template.name().unwrap_or_default();
            let event_name = matcher::expected_event_name(convention, name);
            if let Some(existing) = expected.get(&event_name) {
                log::warn!(
                    "Templates {} and {} both map to '{event_name}', using the first",
                    existing,
                    template.id
                );
                continue;
            }
            expected.insert(event_name, template.id.clone());
        }
        Ok(expected)
    }

    /// Collect, match and reconcile audio against the templates.
    pub fn analyze(&self, audio_dir: &Path, convention: &Convention) -> Result<Reconciliation<RecordId>> {
        let expected = self.templates(convention)?;
        let matched = matcher::match_files_to_events(scanner::collect_audio_files(audio_dir), convention);
        log::info!(
            "{} event groups and {} orphan files in {}",
            matched.groups.len(),
            matched.orphans.len(),
            audio_dir.display()
        );
        Ok(matcher::reconcile(matched, &expected))
    }

    fn existing_names(&self) -> Vec<String> {
        self.index
            .children_of(&self.selection.destination)
            .into_iter()
            .filter(|r| r.kind == RecordKind::Event)
            .filter_map(|r| r.name().map(str::to_string))
            .collect()
    }

    /// Clone every matched template into the destination with its audio.
    ///
    /// A failed clone is recorded in the report and the run moves on.
    pub fn populate(&mut self, audio_dir: &Path, convention: &Convention) -> Result<PopulateReport> {
        let analysis = self.analyze(audio_dir, convention)?;
        let mut report = PopulateReport {
            orphan_events: analysis.orphan_events.into_iter().map(|(name, _)| name).collect(),
            orphan_files: analysis.orphan_files,
            ..Default::default()
        };
        report
            .orphan_files
            .extend(analysis.orphan_groups.into_values().flatten());

        let existing = self.existing_names();
        let pb = ProgressBar::new(analysis.assignments.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )
            .unwrap()
            .progress_chars("#>-"),
        );

        for assignment in analysis.assignments {
            pb.set_message(assignment.event_name.clone());
            if existing.contains(&assignment.event_name) {
                log::info!("'{}' already exists, skipping", assignment.event_name);
                report.skipped.push(assignment.event_name);
                pb.inc(1);
                continue;
            }

            let request = CloneRequest {
                template: assignment.template,
                new_name: assignment.event_name.clone(),
                new_id: None,
                destination: self.selection.destination.clone(),
                bank: self.selection.bank.clone(),
                bus: self.selection.bus.clone(),
                audio_files: assignment.files.into_iter().map(|f| f.path).collect(),
                asset_folder: self.selection.asset_folder.clone(),
            };
            match self.index.clone_event(&request) {
                Ok(outcome) => {
                    report.unreadable_audio.extend(outcome.skipped_audio);
                    report.created.push((assignment.event_name, outcome.event));
                }
                Err(e) => {
                    log::warn!("Failed to create '{}': {}", assignment.event_name, e);
                    report.failures.push((assignment.event_name, e.to_string()));
                }
            }
            pb.inc(1);
        }

        pb.finish_with_message(format!(
            "Done: {} created, {} skipped, {} failed",
            report.created.len(),
            report.skipped.len(),
            report.failures.len()
        ));
        Ok(report)
    }

    /// The same matches as `populate`, as a request for the external tool.
    pub fn plan_request(&self, audio_dir: &Path, convention: &Convention) -> Result<ImportRequest> {
        let analysis = self.analyze(audio_dir, convention)?;
        let planned: Vec<PlannedEvent> = analysis
            .assignments
            .into_iter()
            .map(|a| PlannedEvent {
                template_path: self.index.display_path(Collection::Event, &a.template),
                event_name: a.event_name,
                files: a.files.into_iter().map(|f| f.path).collect(),
            })
            .collect();

        let name_of = |id: &RecordId| {
            self.index
                .record(id)
                .and_then(|r| r.name())
                .map(str::to_string)
        };
        let context = RequestContext {
            project_path: self.index.root().to_path_buf(),
            destination_path: self
                .index
                .display_path(Collection::Folder, &self.selection.destination),
            bank_name: self.selection.bank.as_ref().and_then(name_of),
            bus_name: self.selection.bus.as_ref().and_then(name_of),
            asset_folder_path: self.selection.asset_folder.clone(),
        };
        Ok(request::build_request(&planned, &context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{self, ids};

    fn selection() -> Selection {
        Selection {
            template_folder: RecordId::from(ids::TEMPLATES_FOLDER),
            destination: RecordId::from(ids::ENEMIES_FOLDER),
            bank: Some(RecordId::from(ids::BANK)),
            bus: Some(RecordId::from(ids::CHARACTER_BUS)),
            asset_folder: "Characters/Mecha".into(),
        }
    }

    fn audio_dir(root: &Path) -> PathBuf {
        let dir = root.join("audio");
        testutil::write_wav(&dir.join("SFX_Mecha_Attack_01.wav"), 1, 48_000, 4_800);
        testutil::write_wav(&dir.join("SFX_Mecha_Attack_02.wav"), 1, 48_000, 9_600);
        testutil::write_wav(&dir.join("SFX_Mecha_Taunt.wav"), 1, 48_000, 4_800);
        testutil::write_wav(&dir.join("notes.wav"), 1, 48_000, 4_800);
        dir
    }

    #[test]
    fn test_selection_must_exist() {
        let fx = testutil::project();
        let mut sel = selection();
        sel.destination = RecordId::from("{gone}");
        assert!(Session::open(&fx.root, sel).is_err());
    }

    #[test]
    fn test_templates_map_to_expected_names() {
        let fx = testutil::project();
        let session = Session::open(&fx.root, selection()).unwrap();
        let conv = Convention::new("SFX", "Mecha").unwrap();
        let templates = session.templates(&conv).unwrap();
        let names: Vec<&String> = templates.keys().collect();
        assert_eq!(names, vec!["SFX_Mecha_Attack", "SFX_Mecha_Idle"]);
        assert_eq!(templates["SFX_Mecha_Attack"], RecordId::from(ids::TEMPLATE_ATTACK));
    }

    #[test]
    fn test_populate_clones_matches_and_reports_orphans() {
        let fx = testutil::project();
        let audio = audio_dir(&fx.root);
        let mut session = Session::open(&fx.root, selection()).unwrap();
        let conv = Convention::new("SFX", "Mecha").unwrap();

        let report = session.populate(&audio, &conv).unwrap();
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.created[0].0, "SFX_Mecha_Attack");
        assert_eq!(report.orphan_events, vec!["SFX_Mecha_Idle"]);
        let orphans: Vec<&str> = report.orphan_files.iter().map(|f| f.filename.as_str()).collect();
        assert!(orphans.contains(&"notes.wav"));
        assert!(orphans.contains(&"SFX_Mecha_Taunt.wav"));
        assert!(report.failures.is_empty());

        let event = session.index.record(&report.created[0].1).unwrap();
        assert_eq!(event.first("folder"), Some(&RecordId::from(ids::ENEMIES_FOLDER)));

        // A second run finds the event already there.
        let again = session.populate(&audio, &conv).unwrap();
        assert!(again.created.is_empty());
        assert_eq!(again.skipped, vec!["SFX_Mecha_Attack"]);
    }

    #[test]
    fn test_failed_clone_is_reported_and_run_continues() {
        let fx = testutil::project();
        let audio = audio_dir(&fx.root);
        testutil::write_wav(&audio.join("SFX_Mecha_Idle.wav"), 1, 48_000, 480);
        let mut session = Session::open(&fx.root, selection()).unwrap();
        let conv = Convention::new("SFX", "Mecha").unwrap();

        // Pull the bank out from under the session: every clone now fails.
        let bank_file = session.index.file_of(&RecordId::from(ids::BANK)).unwrap().to_path_buf();
        std::fs::remove_file(&bank_file).unwrap();
        session.index = ProjectIndex::load(&fx.root).unwrap();

        let report = session.populate(&audio, &conv).unwrap();
        assert!(report.created.is_empty());
        assert_eq!(report.failures.len(), 2);
    }

    #[test]
    fn test_plan_request_uses_display_paths() {
        let fx = testutil::project();
        let audio = audio_dir(&fx.root);
        let session = Session::open(&fx.root, selection()).unwrap();
        let conv = Convention::new("SFX", "Mecha").unwrap();

        let request = session.plan_request(&audio, &conv).unwrap();
        assert_eq!(request.default_destination, "event:/SFX/Enemies");
        assert_eq!(request.default_bank.as_deref(), Some("Enemies"));
        assert_eq!(request.entries.len(), 1);
        let entry = &request.entries[0];
        assert_eq!(entry.template_path, "event:/Templates/Template_Attack");
        assert_eq!(entry.new_name, "SFX_Mecha_Attack");
        assert_eq!(entry.audio_paths.len(), 2);
        assert!(entry.multi_sound);
    }
}
