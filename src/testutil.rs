//! On-disk project fixtures shared by the unit tests.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::project::record::{Record, RecordId, RecordKind};
use crate::project::xml;

pub mod ids {
    pub const WORKSPACE: &str = "{workspace}";
    pub const MASTER_EVENT_FOLDER: &str = "{master-event-folder}";
    pub const MASTER_BANK_FOLDER: &str = "{master-bank-folder}";
    pub const MASTER_ASSET_FOLDER: &str = "{master-asset-folder}";
    pub const MIXER: &str = "{mixer}";
    pub const MASTER_BUS: &str = "{master-bus}";
    pub const TEMPLATES_FOLDER: &str = "{templates-folder}";
    pub const SFX_FOLDER: &str = "{sfx-folder}";
    pub const ENEMIES_FOLDER: &str = "{enemies-folder}";
    pub const BANK: &str = "{enemies-bank}";
    pub const CHARACTER_BUS: &str = "{characters-bus}";
    pub const PLACEHOLDER_AUDIO: &str = "{placeholder-audio}";
    pub const TEMPLATE_ATTACK: &str = "{template-attack}";
    pub const TEMPLATE_TIMELINE: &str = "{template-attack-timeline}";
    pub const TEMPLATE_PROPERTIES: &str = "{template-attack-properties}";
    pub const TEMPLATE_MARKERS: &str = "{template-attack-markers}";
    pub const TEMPLATE_IDLE: &str = "{template-idle}";
    pub const OLD_EVENT: &str = "{old-event}";
}

pub struct Fixture {
    _dir: TempDir,
    pub root: PathBuf,
}

fn id(text: &str) -> RecordId {
    RecordId::from(text)
}

fn rec(kind: RecordKind, text: &str) -> Record {
    Record::new(kind, id(text))
}

/// Write records into `Metadata/<relative>` under a project root.
pub fn write_records(root: &Path, relative: &str, records: &[Record]) {
    let path = root.join("Metadata").join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, xml::write(xml::DEFAULT_SERIALIZATION_MODEL, records)).unwrap();
}

/// Silent 16-bit PCM WAV with `frames` frames.
pub fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..frames {
        for _ in 0..channels {
            writer.write_sample(0i16).unwrap();
        }
    }
    writer.finalize().unwrap();
}

/// Bus-like record plus effect chain, fader and panner, using `prefix` to
/// derive identifiers.
fn strip(kind: RecordKind, bus: &str, prefix: &str) -> Vec<Record> {
    let chain = format!("{{{prefix}-chain}}");
    let panner = format!("{{{prefix}-panner}}");
    let fader = format!("{{{prefix}-fader}}");
    vec![
        rec(kind, bus)
            .with_relationship("effectChain", vec![id(&chain)])
            .with_relationship("panner", vec![id(&panner)]),
        rec(RecordKind::MixerBusEffectChain, &chain).with_relationship("effects", vec![id(&fader)]),
        rec(RecordKind::MixerBusFader, &fader),
        rec(RecordKind::MixerBusPanner, &panner),
    ]
}

fn folder(text: &str, name: &str, parent: &str) -> Record {
    rec(RecordKind::EventFolder, text)
        .with_property("name", name)
        .with_relationship("folder", vec![id(parent)])
}

/// Template with a full event graph: 17 records.
fn template_attack() -> Vec<Record> {
    let mut records = vec![
        rec(RecordKind::Event, ids::TEMPLATE_ATTACK)
            .with_property("name", "Template_Attack")
            .with_relationship("folder", vec![id(ids::TEMPLATES_FOLDER)])
            .with_relationship("mixer", vec![id("{ta-mixer}")])
            .with_relationship("masterTrack", vec![id("{ta-master-track}")])
            .with_relationship("mixerInput", vec![id("{ta-input}")])
            .with_relationship("automatableProperties", vec![id(ids::TEMPLATE_PROPERTIES)])
            .with_relationship("markerTracks", vec![id(ids::TEMPLATE_MARKERS)])
            .with_relationship("groupTracks", vec![id("{ta-track}")])
            .with_relationship("timeline", vec![id(ids::TEMPLATE_TIMELINE)])
            .with_relationship("banks", vec![id(ids::BANK)]),
        rec(RecordKind::EventMixer, "{ta-mixer}")
            .with_relationship("masterBus", vec![id("{ta-mixer-master}")]),
    ];
    records.extend(strip(RecordKind::EventMixerMaster, "{ta-mixer-master}", "ta-mm"));
    records.push(rec(RecordKind::EventAutomatableProperties, ids::TEMPLATE_PROPERTIES));
    records.push(rec(RecordKind::MarkerTrack, ids::TEMPLATE_MARKERS));
    records.push(
        rec(RecordKind::MasterTrack, "{ta-master-track}")
            .with_relationship("mixerGroup", vec![id("{ta-mixer-master}")]),
    );
    records.push(
        rec(RecordKind::MixerInput, "{ta-input}")
            .with_relationship("output", vec![id(ids::CHARACTER_BUS)]),
    );
    records.push(
        rec(RecordKind::GroupTrack, "{ta-track}")
            .with_relationship("mixerGroup", vec![id("{ta-group}")])
            .with_relationship("modules", vec![id("{ta-sound}")]),
    );
    let mut group = strip(RecordKind::EventMixerGroup, "{ta-group}", "ta-group");
    group[0].set_property("name", "Audio 1");
    group[0].set_relationship("output", vec![id("{ta-mixer-master}")]);
    records.extend(group);
    records.push(
        rec(RecordKind::Timeline, ids::TEMPLATE_TIMELINE)
            .with_relationship("modules", vec![id("{ta-sound}")]),
    );
    records.push(
        rec(RecordKind::SingleSound, "{ta-sound}")
            .with_relationship("audioFile", vec![id(ids::PLACEHOLDER_AUDIO)]),
    );
    records
}

/// Template with only a mixer: no tracks, no timeline.
fn template_idle() -> Vec<Record> {
    let mut records = vec![
        rec(RecordKind::Event, ids::TEMPLATE_IDLE)
            .with_property("name", "Template_Idle")
            .with_relationship("folder", vec![id(ids::TEMPLATES_FOLDER)])
            .with_relationship("mixer", vec![id("{ti-mixer}")]),
        rec(RecordKind::EventMixer, "{ti-mixer}")
            .with_relationship("masterBus", vec![id("{ti-mixer-master}")]),
    ];
    records.extend(strip(RecordKind::EventMixerMaster, "{ti-mixer-master}", "ti-mm"));
    records
}

/// A small project:
///
/// ```text
/// event:/Templates/{Template_Attack, Template_Idle}
/// event:/SFX/Enemies/Old_Event
/// bank:/Enemies
/// bus:/Characters
/// ```
pub fn project() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();

    write_records(
        &root,
        "Workspace.xml",
        &[
            rec(RecordKind::Workspace, ids::WORKSPACE)
                .with_relationship("masterEventFolder", vec![id(ids::MASTER_EVENT_FOLDER)])
                .with_relationship("masterBankFolder", vec![id(ids::MASTER_BANK_FOLDER)])
                .with_relationship("masterAssetFolder", vec![id(ids::MASTER_ASSET_FOLDER)])
                .with_relationship("mixer", vec![id(ids::MIXER)]),
            rec(RecordKind::MasterEventFolder, ids::MASTER_EVENT_FOLDER),
            rec(RecordKind::MasterBankFolder, ids::MASTER_BANK_FOLDER),
            rec(RecordKind::MasterAssetFolder, ids::MASTER_ASSET_FOLDER),
        ],
    );

    let mut master = vec![
        rec(RecordKind::Mixer, ids::MIXER).with_relationship("masterBus", vec![id(ids::MASTER_BUS)]),
    ];
    master.extend(strip(RecordKind::MixerMaster, ids::MASTER_BUS, "master"));
    write_records(&root, "Master.xml", &master);

    for (text, name, parent) in [
        (ids::TEMPLATES_FOLDER, "Templates", ids::MASTER_EVENT_FOLDER),
        (ids::SFX_FOLDER, "SFX", ids::MASTER_EVENT_FOLDER),
        (ids::ENEMIES_FOLDER, "Enemies", ids::SFX_FOLDER),
    ] {
        write_records(&root, &format!("EventFolder/{text}.xml"), &[folder(text, name, parent)]);
    }

    write_records(
        &root,
        &format!("Bank/{}.xml", ids::BANK),
        &[rec(RecordKind::Bank, ids::BANK)
            .with_property("name", "Enemies")
            .with_relationship("folder", vec![id(ids::MASTER_BANK_FOLDER)])],
    );

    let mut bus = strip(RecordKind::MixerGroup, ids::CHARACTER_BUS, "characters");
    bus[0].set_property("name", "Characters");
    bus[0].set_relationship("output", vec![id(ids::MASTER_BUS)]);
    write_records(&root, &format!("Group/{}.xml", ids::CHARACTER_BUS), &bus);

    write_records(
        &root,
        &format!("AudioFile/{}.xml", ids::PLACEHOLDER_AUDIO),
        &[rec(RecordKind::AudioFile, ids::PLACEHOLDER_AUDIO)
            .with_property("assetPath", "Placeholder/placeholder.wav")
            .with_relationship("masterAssetFolder", vec![id(ids::MASTER_ASSET_FOLDER)])],
    );

    write_records(&root, &format!("Event/{}.xml", ids::TEMPLATE_ATTACK), &template_attack());
    write_records(&root, &format!("Event/{}.xml", ids::TEMPLATE_IDLE), &template_idle());
    write_records(
        &root,
        &format!("Event/{}.xml", ids::OLD_EVENT),
        &[rec(RecordKind::Event, ids::OLD_EVENT)
            .with_property("name", "Old_Event")
            .with_relationship("folder", vec![id(ids::ENEMIES_FOLDER)])],
    );

    Fixture { _dir: dir, root }
}
