//! Deep-copying a template event into a new event.
//!
//! A template's internal graph is every record reachable from its Event over
//! the relationships its kind schema follows. Cloning mints one fresh
//! identifier per record up front, then re-emits each record with its
//! relationships rewritten through that map. Destinations outside the graph
//! (folders, banks, buses, audio files) are left as they are, apart from the
//! folder, bank and bus the caller retargets.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::project::create::{check_name, join_asset_path, mixer_strip};
use crate::project::record::{Record, RecordId, RecordKind};
use crate::project::{Collection, ProjectError, ProjectIndex, Result};
use crate::scanner::metadata::{self, AudioInfo};

/// Original identifier to fresh identifier, one entry per cloned record.
#[derive(Debug, Default)]
pub struct IdentifierMap {
    map: HashMap<RecordId, RecordId>,
}

impl IdentifierMap {
    /// Mint a fresh identifier for each of `ids`. `root` may force the
    /// identifier of one of them.
    pub fn build<'a>(
        ids: impl IntoIterator<Item = &'a RecordId>,
        root: Option<(&RecordId, RecordId)>,
    ) -> Self {
        let mut map: HashMap<RecordId, RecordId> = ids
            .into_iter()
            .map(|id| (id.clone(), RecordId::generate()))
            .collect();
        if let Some((original, forced)) = root {
            if let Some(slot) = map.get_mut(original) {
                *slot = forced;
            }
        }
        Self { map }
    }

    pub fn get(&self, id: &RecordId) -> Option<&RecordId> {
        self.map.get(id)
    }

    /// The fresh identifier for an internal record, or `id` unchanged if it
    /// is an external reference.
    pub fn rewrite(&self, id: &RecordId) -> RecordId {
        self.map.get(id).cloned().unwrap_or_else(|| id.clone())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Where the clone goes and what it is routed to. `None` keeps the template's
/// own bank assignment or bus routing.
#[derive(Debug, Clone)]
pub struct Retarget {
    pub folder: RecordId,
    pub bank: Option<RecordId>,
    pub bus: Option<RecordId>,
}

/// A cloned event's records, root Event first.
#[derive(Debug, Clone)]
pub struct ClonedEvent {
    pub root: RecordId,
    pub records: Vec<Record>,
}

impl ClonedEvent {
    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|r| r.id == *id)
    }

    fn find(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id == *id)
    }

    fn root_mut(&mut self) -> &mut Record {
        &mut self.records[0]
    }

    /// Drop records no longer reachable from the root.
    fn prune(&mut self) {
        let by_id: HashMap<&RecordId, &Record> = self.records.iter().map(|r| (&r.id, r)).collect();
        let reachable = reachable_from(&self.root, |id| by_id.get(id).copied());
        let before = self.records.len();
        self.records.retain(|r| reachable.contains(&r.id));
        if self.records.len() < before {
            log::debug!("Pruned {} unreachable records", before - self.records.len());
        }
    }
}

fn reachable_from<'a>(
    root: &RecordId,
    lookup: impl Fn(&RecordId) -> Option<&'a Record>,
) -> HashSet<RecordId> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([root.clone()]);
    while let Some(id) = queue.pop_front() {
        if seen.contains(&id) {
            continue;
        }
        let Some(record) = lookup(&id) else {
            continue;
        };
        seen.insert(id);
        for rel in record.kind.schema().followed {
            queue.extend(record.relationship(rel).iter().cloned());
        }
    }
    seen
}

/// Every record in a template event's internal graph, root first, in
/// breadth-first order.
pub fn collect_subgraph<'a>(index: &'a ProjectIndex, root: &RecordId) -> Result<Vec<&'a Record>> {
    let template = index.require(Collection::Event, root)?;

    let mut records = vec![template];
    let mut seen: HashSet<&RecordId> = HashSet::from([&template.id]);
    let mut queue = VecDeque::from([template]);
    while let Some(record) = queue.pop_front() {
        for rel in record.kind.schema().followed {
            for dest in record.relationship(rel) {
                if seen.contains(dest) {
                    continue;
                }
                match index.record(dest) {
                    Some(next) => {
                        seen.insert(&next.id);
                        records.push(next);
                        queue.push_back(next);
                    }
                    None => log::warn!(
                        "{} {} references missing record {dest} via '{rel}'",
                        record.kind,
                        record.id
                    ),
                }
            }
        }
    }
    Ok(records)
}

/// Re-emit a template graph under fresh identifiers.
///
/// `template[0]` must be the root Event. The clone's Event gets `new_name`,
/// lands in `retarget.folder`, and is assigned to `retarget.bank` when one
/// is given; a MixerInput is routed to `retarget.bus` when one is given.
pub fn clone_subgraph(
    template: &[&Record],
    new_name: &str,
    retarget: &Retarget,
    forced_root: Option<RecordId>,
) -> ClonedEvent {
    let root = &template[0].id;
    let map = IdentifierMap::build(
        template.iter().map(|r| &r.id),
        forced_root.map(|forced| (root, forced)),
    );

    let records: Vec<Record> = template
        .iter()
        .map(|original| {
            let mut record = (*original).clone();
            record.id = map.rewrite(&original.id);
            for (_, ids) in record.relationships_mut() {
                for id in ids.iter_mut() {
                    *id = map.rewrite(id);
                }
            }

            if original.id == *root {
                record.set_property("name", new_name);
                record.set_relationship("folder", vec![retarget.folder.clone()]);
                if let Some(bank) = &retarget.bank {
                    record.set_relationship("banks", vec![bank.clone()]);
                }
            } else if record.kind == RecordKind::MixerInput {
                if let Some(bus) = &retarget.bus {
                    record.set_relationship("output", vec![bus.clone()]);
                }
            }
            record
        })
        .collect();

    ClonedEvent {
        root: map.rewrite(root),
        records,
    }
}

/// A registered audio file ready to be wrapped in a sound.
#[derive(Debug, Clone)]
pub struct SoundSource {
    pub audio_file: RecordId,
    pub duration_secs: f64,
}

/// Replace the clone's sound wiring with one MultiSound holding a SingleSound
/// per source, in order.
///
/// The event's first GroupTrack is reused, or a GroupTrack with its own
/// mixer group is created; a Timeline is created if the event has none.
pub fn attach_sounds(event: &mut ClonedEvent, sources: &[SoundSource]) {
    if sources.is_empty() {
        return;
    }

    let singles: Vec<Record> = sources
        .iter()
        .map(|s| {
            Record::new(RecordKind::SingleSound, RecordId::generate())
                .with_relationship("audioFile", vec![s.audio_file.clone()])
        })
        .collect();
    let length = sources[0].duration_secs;
    let multi = Record::new(RecordKind::MultiSound, RecordId::generate())
        .with_property("length", length.to_string())
        .with_relationship("sounds", singles.iter().map(|s| s.id.clone()).collect());
    let multi_id = multi.id.clone();

    let track = match existing_group_track(event) {
        Some(track) => track,
        None => synthesize_group_track(event),
    };
    let existing_timeline = event.records[0]
        .first("timeline")
        .and_then(|t| event.position(t));
    let timeline = match existing_timeline {
        Some(pos) => event.records[pos].id.clone(),
        None => {
            let timeline = Record::new(RecordKind::Timeline, RecordId::generate());
            let id = timeline.id.clone();
            event.records.push(timeline);
            event.root_mut().set_relationship("timeline", vec![id.clone()]);
            id
        }
    };

    for id in [&track, &timeline] {
        if let Some(pos) = event.position(id) {
            event.records[pos].set_relationship("modules", vec![multi_id.clone()]);
        }
    }

    event.records.push(multi);
    event.records.extend(singles);
    event.prune();
}

fn existing_group_track(event: &ClonedEvent) -> Option<RecordId> {
    event.records[0]
        .relationship("groupTracks")
        .iter()
        .find(|id| event.find(id).is_some_and(|r| r.kind == RecordKind::GroupTrack))
        .cloned()
}

/// Master bus of the event's own mixer, creating the mixer if missing.
fn event_mixer_master(event: &mut ClonedEvent) -> RecordId {
    let existing = event.records[0]
        .first("mixer")
        .and_then(|m| event.find(m))
        .and_then(|mixer| mixer.first("masterBus"))
        .filter(|bus| event.find(bus).is_some())
        .cloned();
    if let Some(bus) = existing {
        return bus;
    }

    let strip = mixer_strip(RecordKind::EventMixerMaster);
    let master = strip[0].id.clone();
    let mixer = Record::new(RecordKind::EventMixer, RecordId::generate())
        .with_relationship("masterBus", vec![master.clone()]);
    event.root_mut().set_relationship("mixer", vec![mixer.id.clone()]);
    event.records.push(mixer);
    event.records.extend(strip);
    master
}

fn synthesize_group_track(event: &mut ClonedEvent) -> RecordId {
    let master = event_mixer_master(event);

    let mut strip = mixer_strip(RecordKind::EventMixerGroup);
    strip[0].set_property("name", "Audio 1");
    strip[0].set_relationship("output", vec![master]);
    let track = Record::new(RecordKind::GroupTrack, RecordId::generate())
        .with_relationship("mixerGroup", vec![strip[0].id.clone()]);
    let track_id = track.id.clone();

    event.root_mut().push_relationship("groupTracks", track_id.clone());
    event.records.push(track);
    event.records.extend(strip);
    log::debug!("Created group track {track_id}");
    track_id
}

/// Everything needed to clone one event.
#[derive(Debug, Clone)]
pub struct CloneRequest {
    pub template: RecordId,
    pub new_name: String,
    /// Force the new Event's identifier instead of minting one.
    pub new_id: Option<RecordId>,
    pub destination: RecordId,
    pub bank: Option<RecordId>,
    pub bus: Option<RecordId>,
    pub audio_files: Vec<PathBuf>,
    /// Asset-relative folder the audio files are registered under.
    pub asset_folder: String,
}

#[derive(Debug, Clone)]
pub struct CloneOutcome {
    pub event: RecordId,
    /// Records written in the event's file.
    pub records: usize,
    pub audio_files: Vec<RecordId>,
    /// Inputs whose audio metadata could not be read.
    pub skipped_audio: Vec<PathBuf>,
}

fn read_sources(paths: &[PathBuf]) -> (Vec<(&Path, AudioInfo)>, Vec<PathBuf>) {
    let mut readable = Vec::new();
    let mut skipped = Vec::new();
    let mut seen = HashSet::new();
    for path in paths {
        if !seen.insert(path) {
            continue;
        }
        match metadata::read_audio_info(path) {
            Ok(info) => readable.push((path.as_path(), info)),
            Err(e) => {
                log::warn!("Skipping audio: {e}");
                skipped.push(path.clone());
            }
        }
    }
    (readable, skipped)
}

impl ProjectIndex {
    /// Clone a template event into a new event and persist it.
    ///
    /// Readable audio files are registered and wired into the new event;
    /// unreadable ones are skipped and listed in the outcome.
    pub fn clone_event(&mut self, request: &CloneRequest) -> Result<CloneOutcome> {
        check_name(&request.new_name)?;
        self.require(Collection::Folder, &request.destination)?;
        if let Some(bank) = &request.bank {
            self.require(Collection::Bank, bank)?;
        }
        if let Some(bus) = &request.bus {
            self.require(Collection::Bus, bus)?;
        }
        if let Some(id) = &request.new_id {
            if self.record(id).is_some() {
                return Err(ProjectError::Validation(format!(
                    "identifier {id} is already in use"
                )));
            }
        }

        let retarget = Retarget {
            folder: request.destination.clone(),
            bank: request.bank.clone(),
            bus: request.bus.clone(),
        };
        let (template_name, mut cloned) = {
            let template = collect_subgraph(self, &request.template)?;
            let name = template[0].name().unwrap_or_default().to_string();
            let cloned =
                clone_subgraph(&template, &request.new_name, &retarget, request.new_id.clone());
            (name, cloned)
        };

        let (readable, skipped_audio) = read_sources(&request.audio_files);
        let audio_records: Vec<Record> = readable
            .iter()
            .map(|(path, info)| {
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                self.audio_file_record(info, &join_asset_path(&request.asset_folder, &filename))
            })
            .collect();
        let sources: Vec<SoundSource> = audio_records
            .iter()
            .zip(&readable)
            .map(|(record, (_, info))| SoundSource {
                audio_file: record.id.clone(),
                duration_secs: info.duration_secs,
            })
            .collect();
        attach_sounds(&mut cloned, &sources);

        // Audio files go first; if anything after them fails they are removed.
        let mut audio_files = Vec::with_capacity(audio_records.len());
        let mut written = Vec::with_capacity(audio_records.len());
        for record in audio_records {
            let id = record.id.clone();
            match self.adopt_new_file(vec![record]) {
                Ok(path) => {
                    written.push(path);
                    audio_files.push(id);
                }
                Err(e) => {
                    self.discard_files(&written);
                    return Err(e);
                }
            }
        }

        let records = cloned.records.len();
        if let Err(e) = self.adopt_new_file(cloned.records) {
            self.discard_files(&written);
            return Err(e);
        }
        log::info!(
            "Cloned '{}' as '{}' {} ({} records, {} audio files, {} skipped)",
            template_name,
            request.new_name,
            cloned.root,
            records,
            audio_files.len(),
            skipped_audio.len()
        );

        Ok(CloneOutcome {
            event: cloned.root,
            records,
            audio_files,
            skipped_audio,
        })
    }
}
