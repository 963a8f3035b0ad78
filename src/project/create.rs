//! Record creation: folders, banks, buses, asset folders and audio files.
//!
//! Each call mints fresh identifiers, builds the minimal record set its kind
//! needs, writes it to a new file and adopts it into the index.

use std::path::Path;

use super::record::{Record, RecordId, RecordKind};
use super::{Collection, ProjectError, ProjectIndex, Result};
use crate::scanner::metadata::{self, AudioInfo};

/// Names become path segments, so they must be non-empty and slash-free.
pub fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ProjectError::Validation("name must not be empty".into()));
    }
    if name.contains('/') {
        return Err(ProjectError::Validation(format!(
            "name '{name}' must not contain '/'"
        )));
    }
    Ok(())
}

/// A mixer strip: the bus-like record plus its effect chain, panner and
/// fader. The fader is listed in the chain's `effects`.
pub(crate) fn mixer_strip(kind: RecordKind) -> Vec<Record> {
    let chain_id = RecordId::generate();
    let panner_id = RecordId::generate();
    let fader_id = RecordId::generate();

    let bus = Record::new(kind, RecordId::generate())
        .with_relationship("effectChain", vec![chain_id.clone()])
        .with_relationship("panner", vec![panner_id.clone()]);
    let chain = Record::new(RecordKind::MixerBusEffectChain, chain_id)
        .with_relationship("effects", vec![fader_id.clone()]);
    let panner = Record::new(RecordKind::MixerBusPanner, panner_id);
    let fader = Record::new(RecordKind::MixerBusFader, fader_id);

    vec![bus, chain, panner, fader]
}

/// Join an asset folder path and a filename into an asset-relative path
/// using forward slashes.
pub fn join_asset_path(folder: &str, filename: &str) -> String {
    let folder = folder.replace('\\', "/");
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        filename.to_string()
    } else {
        format!("{folder}/{filename}")
    }
}

impl ProjectIndex {
    fn expect_parent(&self, parent: &RecordId, kinds: &[RecordKind], label: &str) -> Result<()> {
        match self.record(parent) {
            Some(r) if kinds.contains(&r.kind) => Ok(()),
            _ => Err(ProjectError::NotFound(format!("parent {label} {parent}"))),
        }
    }

    pub fn create_folder(&mut self, name: &str, parent: Option<&RecordId>) -> Result<RecordId> {
        check_name(name)?;
        let parent = match parent {
            Some(p) => {
                self.require(Collection::Folder, p)?;
                p.clone()
            }
            None => self.roots().event_folder.clone(),
        };

        let folder = Record::new(RecordKind::EventFolder, RecordId::generate())
            .with_property("name", name)
            .with_relationship("folder", vec![parent]);
        let id = folder.id.clone();
        self.adopt_new_file(vec![folder])?;
        log::info!("Created event folder '{name}' {id}");
        Ok(id)
    }

    pub fn create_bank(&mut self, name: &str, parent: Option<&RecordId>) -> Result<RecordId> {
        check_name(name)?;
        let parent = match parent {
            Some(p) => {
                self.expect_parent(
                    p,
                    &[RecordKind::MasterBankFolder, RecordKind::BankFolder],
                    "bank folder",
                )?;
                p.clone()
            }
            None => self.roots().bank_folder.clone(),
        };

        let bank = Record::new(RecordKind::Bank, RecordId::generate())
            .with_property("name", name)
            .with_relationship("folder", vec![parent]);
        let id = bank.id.clone();
        self.adopt_new_file(vec![bank])?;
        log::info!("Created bank '{name}' {id}");
        Ok(id)
    }

    /// Create a bus routed to `parent`, or to the master bus when none is
    /// given.
    pub fn create_bus(&mut self, name: &str, parent: Option<&RecordId>) -> Result<RecordId> {
        check_name(name)?;
        let output = match parent {
            Some(p) => {
                self.require(Collection::Bus, p)?;
                p.clone()
            }
            None => self.master_bus()?,
        };

        let mut strip = mixer_strip(RecordKind::MixerGroup);
        strip[0].set_property("name", name);
        strip[0].set_relationship("output", vec![output]);
        let id = strip[0].id.clone();
        self.adopt_new_file(strip)?;
        log::info!("Created bus '{name}' {id}");
        Ok(id)
    }

    pub fn create_asset_folder(&mut self, name: &str, parent: Option<&RecordId>) -> Result<RecordId> {
        check_name(name)?;
        let parent = match parent {
            Some(p) => {
                self.require(Collection::AssetFolder, p)?;
                p.clone()
            }
            None => self.roots().asset_folder.clone(),
        };
        let asset_path = format!("{}{name}/", self.asset_folder_path(&parent));

        let folder = Record::new(RecordKind::AssetFolder, RecordId::generate())
            .with_property("name", name)
            .with_property("assetPath", asset_path)
            .with_relationship("folder", vec![parent]);
        let id = folder.id.clone();
        self.adopt_new_file(vec![folder])?;
        log::info!("Created asset folder '{name}' {id}");
        Ok(id)
    }

    /// Build an AudioFile record from already-read technical properties.
    pub(crate) fn audio_file_record(&self, info: &AudioInfo, asset_path: &str) -> Record {
        Record::new(RecordKind::AudioFile, RecordId::generate())
            .with_property("assetPath", asset_path)
            .with_property("channelCount", info.channels.to_string())
            .with_property("frequencyInKHz", format_number(info.frequency_khz()))
            .with_property("length", format_number(info.duration_secs))
            .with_relationship("masterAssetFolder", vec![self.roots().asset_folder.clone()])
    }

    /// Register an AudioFile record for `source` under `asset_path`.
    ///
    /// The source's technical metadata is mandatory: an unreadable file is an
    /// `AudioReadError` and nothing is written.
    pub fn create_audio_file_record(&mut self, source: &Path, asset_path: &str) -> Result<RecordId> {
        if asset_path.trim().is_empty() {
            return Err(ProjectError::Validation("asset path must not be empty".into()));
        }
        let info = metadata::read_audio_info(source)?;
        let record = self.audio_file_record(&info, asset_path);
        let id = record.id.clone();
        self.adopt_new_file(vec![record])?;
        log::debug!(
            "Registered audio file {} as {asset_path} ({} ch, {} Hz, {:.3}s)",
            source.display(),
            info.channels,
            info.sample_rate,
            info.duration_secs
        );
        Ok(id)
    }
}

/// Shortest decimal rendering that still parses back to the same value.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
