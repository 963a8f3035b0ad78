use super::record::{Record, RecordKind};

/// Fixed per-kind shape: which properties must be present, which
/// relationships hold at most one destination, and which relationships the
/// cloner follows into an event's internal graph.
#[derive(Debug, Clone, Copy)]
pub struct KindSchema {
    pub required_properties: &'static [&'static str],
    pub single_relationships: &'static [&'static str],
    pub followed: &'static [&'static str],
}

const EMPTY: KindSchema = KindSchema {
    required_properties: &[],
    single_relationships: &[],
    followed: &[],
};

const BUS_LIKE: KindSchema = KindSchema {
    required_properties: &[],
    single_relationships: &["output", "effectChain", "panner"],
    followed: &["effectChain", "panner"],
};

impl RecordKind {
    pub fn schema(&self) -> KindSchema {
        match self {
            Self::Workspace => KindSchema {
                single_relationships: &[
                    "masterEventFolder",
                    "masterBankFolder",
                    "masterAssetFolder",
                    "mixer",
                ],
                ..EMPTY
            },
            Self::EventFolder | Self::BankFolder | Self::Bank | Self::AssetFolder => KindSchema {
                required_properties: &["name"],
                single_relationships: &["folder"],
                followed: &[],
            },
            Self::Event => KindSchema {
                required_properties: &["name"],
                single_relationships: &[
                    "folder",
                    "mixer",
                    "masterTrack",
                    "mixerInput",
                    "automatableProperties",
                    "timeline",
                ],
                followed: &[
                    "mixer",
                    "masterTrack",
                    "mixerInput",
                    "automatableProperties",
                    "markerTracks",
                    "groupTracks",
                    "timeline",
                ],
            },
            Self::Mixer => KindSchema {
                single_relationships: &["masterBus"],
                ..EMPTY
            },
            Self::MixerGroup => KindSchema {
                required_properties: &["name"],
                ..BUS_LIKE
            },
            Self::MixerMaster | Self::MixerInput | Self::EventMixerMaster | Self::EventMixerGroup => {
                BUS_LIKE
            }
            Self::AudioFile => KindSchema {
                required_properties: &["assetPath"],
                single_relationships: &["masterAssetFolder"],
                followed: &[],
            },
            Self::SingleSound => KindSchema {
                single_relationships: &["audioFile"],
                ..EMPTY
            },
            Self::MultiSound => KindSchema {
                followed: &["sounds"],
                ..EMPTY
            },
            Self::MasterTrack => KindSchema {
                single_relationships: &["mixerGroup"],
                followed: &["mixerGroup"],
                ..EMPTY
            },
            Self::GroupTrack => KindSchema {
                single_relationships: &["mixerGroup"],
                followed: &["mixerGroup", "modules"],
                ..EMPTY
            },
            Self::EventMixer => KindSchema {
                single_relationships: &["masterBus"],
                followed: &["masterBus"],
                ..EMPTY
            },
            Self::MixerBusEffectChain => KindSchema {
                followed: &["effects"],
                ..EMPTY
            },
            Self::Timeline => KindSchema {
                followed: &["modules"],
                ..EMPTY
            },
            Self::MasterEventFolder
            | Self::MasterBankFolder
            | Self::MasterAssetFolder
            | Self::MixerBusPanner
            | Self::MixerBusFader
            | Self::EventAutomatableProperties
            | Self::MarkerTrack
            | Self::Opaque(_) => EMPTY,
        }
    }
}

/// Check a record against its kind schema. Returns a description of the
/// first violation.
pub fn validate(record: &Record) -> Result<(), String> {
    let schema = record.kind.schema();

    for prop in schema.required_properties {
        match record.property(prop) {
            Some(v) if !v.trim().is_empty() => {}
            _ => {
                return Err(format!(
                    "{} {} is missing required property '{prop}'",
                    record.kind, record.id
                ));
            }
        }
    }

    for rel in schema.single_relationships {
        let count = record.relationship(rel).len();
        if count > 1 {
            return Err(format!(
                "{} {} has {count} destinations for single relationship '{rel}'",
                record.kind, record.id
            ));
        }
    }

    Ok(())
}
