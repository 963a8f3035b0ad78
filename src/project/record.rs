use std::fmt;

use uuid::Uuid;

/// Opaque record identifier, stored brace-wrapped: `{xxxxxxxx-xxxx-...}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    /// Mint a fresh, globally unique identifier.
    pub fn generate() -> Self {
        Self(format!("{{{}}}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the text looks like a stored identifier rather than a path.
    pub fn looks_like_id(text: &str) -> bool {
        text.starts_with('{') && text.ends_with('}')
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Every record class the tool understands. Anything else is carried as
/// `Opaque` and written back untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Workspace,
    MasterEventFolder,
    EventFolder,
    Event,
    MasterBankFolder,
    BankFolder,
    Bank,
    Mixer,
    MixerMaster,
    MixerGroup,
    MixerInput,
    MasterAssetFolder,
    AssetFolder,
    AudioFile,
    SingleSound,
    MultiSound,
    MasterTrack,
    GroupTrack,
    EventMixer,
    EventMixerMaster,
    EventMixerGroup,
    MixerBusEffectChain,
    MixerBusPanner,
    MixerBusFader,
    Timeline,
    EventAutomatableProperties,
    MarkerTrack,
    Opaque(String),
}

impl RecordKind {
    pub fn from_class(class: &str) -> Self {
        match class {
            "Workspace" => Self::Workspace,
            "MasterEventFolder" => Self::MasterEventFolder,
            "EventFolder" => Self::EventFolder,
            "Event" => Self::Event,
            "MasterBankFolder" => Self::MasterBankFolder,
            "BankFolder" => Self::BankFolder,
            "Bank" => Self::Bank,
            "Mixer" => Self::Mixer,
            "MixerMaster" => Self::MixerMaster,
            "MixerGroup" => Self::MixerGroup,
            "MixerInput" => Self::MixerInput,
            "MasterAssetFolder" => Self::MasterAssetFolder,
            "AssetFolder" => Self::AssetFolder,
            "AudioFile" => Self::AudioFile,
            "SingleSound" => Self::SingleSound,
            "MultiSound" => Self::MultiSound,
            "MasterTrack" => Self::MasterTrack,
            "GroupTrack" => Self::GroupTrack,
            "EventMixer" => Self::EventMixer,
            "EventMixerMaster" => Self::EventMixerMaster,
            "EventMixerGroup" => Self::EventMixerGroup,
            "MixerBusEffectChain" => Self::MixerBusEffectChain,
            "MixerBusPanner" => Self::MixerBusPanner,
            "MixerBusFader" => Self::MixerBusFader,
            "Timeline" => Self::Timeline,
            "EventAutomatableProperties" => Self::EventAutomatableProperties,
            "MarkerTrack" => Self::MarkerTrack,
            other => Self::Opaque(other.to_string()),
        }
    }

    pub fn class(&self) -> &str {
        match self {
            Self::Workspace => "Workspace",
            Self::MasterEventFolder => "MasterEventFolder",
            Self::EventFolder => "EventFolder",
            Self::Event => "Event",
            Self::MasterBankFolder => "MasterBankFolder",
            Self::BankFolder => "BankFolder",
            Self::Bank => "Bank",
            Self::Mixer => "Mixer",
            Self::MixerMaster => "MixerMaster",
            Self::MixerGroup => "MixerGroup",
            Self::MixerInput => "MixerInput",
            Self::MasterAssetFolder => "MasterAssetFolder",
            Self::AssetFolder => "AssetFolder",
            Self::AudioFile => "AudioFile",
            Self::SingleSound => "SingleSound",
            Self::MultiSound => "MultiSound",
            Self::MasterTrack => "MasterTrack",
            Self::GroupTrack => "GroupTrack",
            Self::EventMixer => "EventMixer",
            Self::EventMixerMaster => "EventMixerMaster",
            Self::EventMixerGroup => "EventMixerGroup",
            Self::MixerBusEffectChain => "MixerBusEffectChain",
            Self::MixerBusPanner => "MixerBusPanner",
            Self::MixerBusFader => "MixerBusFader",
            Self::Timeline => "Timeline",
            Self::EventAutomatableProperties => "EventAutomatableProperties",
            Self::MarkerTrack => "MarkerTrack",
            Self::Opaque(class) => class,
        }
    }

    /// Relationship that points at this record's parent in its hierarchy.
    pub fn parent_relationship(&self) -> Option<&'static str> {
        match self {
            Self::EventFolder
            | Self::Event
            | Self::BankFolder
            | Self::Bank
            | Self::AssetFolder => Some("folder"),
            Self::MixerGroup => Some("output"),
            _ => None,
        }
    }

    /// Metadata subdirectory that holds files whose primary record has this kind.
    pub fn storage_dir(&self) -> Option<&'static str> {
        match self {
            Self::EventFolder => Some("EventFolder"),
            Self::Event => Some("Event"),
            Self::BankFolder => Some("BankFolder"),
            Self::Bank => Some("Bank"),
            Self::MixerGroup => Some("Group"),
            Self::AssetFolder => Some("AssetFolder"),
            Self::AudioFile => Some("AudioFile"),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class())
    }
}

/// A persisted entity: kind, identifier, ordered properties and ordered
/// relationships.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub kind: RecordKind,
    pub id: RecordId,
    properties: Vec<(String, String)>,
    relationships: Vec<(String, Vec<RecordId>)>,
}

impl Record {
    pub fn new(kind: RecordKind, id: RecordId) -> Self {
        Self {
            kind,
            id,
            properties: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_property(name, value);
        self
    }

    pub fn with_relationship(mut self, name: &str, destinations: Vec<RecordId>) -> Self {
        self.set_relationship(name, destinations);
        self
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn property_f64(&self, name: &str) -> Option<f64> {
        self.property(name).and_then(|v| v.trim().parse().ok())
    }

    pub fn name(&self) -> Option<&str> {
        self.property("name")
    }

    /// Set a property, keeping its position if it already exists.
    pub fn set_property(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.properties.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => self.properties.push((name.to_string(), value)),
        }
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn relationship(&self, name: &str) -> &[RecordId] {
        self.relationships
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ids)| ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn first(&self, name: &str) -> Option<&RecordId> {
        self.relationship(name).first()
    }

    /// Replace a relationship's destinations, keeping its position if it exists.
    pub fn set_relationship(&mut self, name: &str, destinations: Vec<RecordId>) {
        match self.relationships.iter_mut().find(|(n, _)| n == name) {
            Some((_, ids)) => *ids = destinations,
            None => self.relationships.push((name.to_string(), destinations)),
        }
    }

    pub fn push_relationship(&mut self, name: &str, destination: RecordId) {
        match self.relationships.iter_mut().find(|(n, _)| n == name) {
            Some((_, ids)) => ids.push(destination),
            None => self
                .relationships
                .push((name.to_string(), vec![destination])),
        }
    }

    pub fn relationships(&self) -> impl Iterator<Item = (&str, &[RecordId])> {
        self.relationships
            .iter()
            .map(|(n, ids)| (n.as_str(), ids.as_slice()))
    }

    pub fn relationships_mut(&mut self) -> impl Iterator<Item = (&str, &mut Vec<RecordId>)> {
        self.relationships
            .iter_mut()
            .map(|(n, ids)| (n.as_str(), ids))
    }

    /// Parent in the record's hierarchy, if its kind has one.
    pub fn parent(&self) -> Option<&RecordId> {
        self.kind
            .parent_relationship()
            .and_then(|rel| self.first(rel))
    }

    /// True if any relationship of this record points at `id`.
    pub fn references(&self, id: &RecordId) -> bool {
        self.relationships.iter().any(|(_, ids)| ids.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_braced_and_unique() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert!(RecordId::looks_like_id(a.as_str()));
        assert_eq!(a.as_str().len(), 38);
        assert_ne!(a, b);
    }

    #[test]
    fn test_unknown_class_round_trips_as_opaque() {
        let kind = RecordKind::from_class("ParameterProxy");
        assert_eq!(kind, RecordKind::Opaque("ParameterProxy".into()));
        assert_eq!(kind.class(), "ParameterProxy");
        assert_eq!(RecordKind::from_class("MarkerTrack"), RecordKind::MarkerTrack);
        assert_eq!(RecordKind::from_class("GroupTrack"), RecordKind::GroupTrack);
    }

    #[test]
    fn test_set_property_keeps_position() {
        let mut r = Record::new(RecordKind::Event, RecordId::from("{e}"))
            .with_property("name", "Old")
            .with_property("note", "x");
        r.set_property("name", "New");
        let names: Vec<_> = r.properties().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["name", "note"]);
        assert_eq!(r.name(), Some("New"));
    }

    #[test]
    fn test_missing_relationship_is_empty() {
        let r = Record::new(RecordKind::Timeline, RecordId::from("{t}"));
        assert!(r.relationship("modules").is_empty());
        assert!(r.first("modules").is_none());
    }

    #[test]
    fn test_parent_follows_kind_relationship() {
        let bus = Record::new(RecordKind::MixerGroup, RecordId::from("{b}"))
            .with_relationship("output", vec![RecordId::from("{m}")]);
        assert_eq!(bus.parent(), Some(&RecordId::from("{m}")));

        let track = Record::new(RecordKind::GroupTrack, RecordId::from("{g}"))
            .with_relationship("folder", vec![RecordId::from("{f}")]);
        assert_eq!(track.parent(), None);
    }
}
