//! Reading and writing record files.
//!
//! A record file is an `<objects>` document holding one or more `<object>`
//! elements, each with `<property>`/`<value>` and
//! `<relationship>`/`<destination>` children. Output is tab-indented and
//! keeps records, properties and relationships in their stored order, so an
//! unmodified file is rewritten byte-for-byte in the same shape.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::record::{Record, RecordId, RecordKind};

/// Serialization model written into new files when none is known.
pub const DEFAULT_SERIALIZATION_MODEL: &str = "Studio.02.02.00";

/// Parsed contents of one record file.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDocument {
    pub serialization_model: String,
    pub records: Vec<Record>,
}

#[derive(Default)]
struct DocumentParser {
    model: Option<String>,
    records: Vec<Record>,
    object: Option<Record>,
    property: Option<String>,
    relationship: Option<(String, Vec<RecordId>)>,
    text: String,
}

impl DocumentParser {
    fn open(&mut self, e: &BytesStart) -> Result<(), String> {
        match e.name().as_ref() {
            b"objects" => {
                self.model = attribute(e, "serializationModel")?;
            }
            b"object" => {
                if self.object.is_some() {
                    return Err("nested <object> element".into());
                }
                let class = attribute(e, "class")?.ok_or("<object> without class")?;
                let id = attribute(e, "id")?.ok_or("<object> without id")?;
                self.object = Some(Record::new(RecordKind::from_class(&class), RecordId::from(id)));
            }
            b"property" => {
                let name = attribute(e, "name")?.ok_or("<property> without name")?;
                self.property = Some(name);
            }
            b"relationship" => {
                let name = attribute(e, "name")?.ok_or("<relationship> without name")?;
                self.relationship = Some((name, Vec::new()));
            }
            b"value" | b"destination" => self.text.clear(),
            other => {
                log::trace!("Ignoring element <{}>", String::from_utf8_lossy(other));
            }
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8]) -> Result<(), String> {
        match name {
            b"object" => {
                let record = self.object.take().ok_or("</object> without <object>")?;
                self.records.push(record);
            }
            b"value" => {
                let object = self.object.as_mut().ok_or("<value> outside <object>")?;
                let prop = self.property.as_deref().ok_or("<value> outside <property>")?;
                object.set_property(prop, std::mem::take(&mut self.text));
            }
            b"property" => self.property = None,
            b"destination" => {
                let (_, ids) = self
                    .relationship
                    .as_mut()
                    .ok_or("<destination> outside <relationship>")?;
                ids.push(RecordId::from(self.text.trim()));
                self.text.clear();
            }
            b"relationship" => {
                let (rel, ids) = self.relationship.take().ok_or("unbalanced </relationship>")?;
                let object = self.object.as_mut().ok_or("<relationship> outside <object>")?;
                object.set_relationship(&rel, ids);
            }
            _ => {}
        }
        Ok(())
    }
}

fn attribute(e: &BytesStart, name: &str) -> Result<Option<String>, String> {
    match e.try_get_attribute(name).map_err(|err| err.to_string())? {
        Some(attr) => {
            let value = attr.unescape_value().map_err(|err| err.to_string())?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

/// Parse a record file. Errors carry a human-readable description.
pub fn parse(text: &str) -> Result<RecordDocument, String> {
    // Untrimmed: property values keep surrounding whitespace. Text between
    // elements is discarded when the next <value> or <destination> opens.
    let mut reader = Reader::from_str(text);

    let mut parser = DocumentParser::default();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {e}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => parser.open(&e)?,
            Event::Empty(e) => {
                parser.open(&e)?;
                parser.close(e.name().as_ref())?;
            }
            Event::End(e) => parser.close(e.name().as_ref())?,
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                parser.text.push_str(&text);
            }
            Event::CData(c) => {
                parser.text.push_str(&String::from_utf8_lossy(&c));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if parser.object.is_some() {
        return Err("unterminated <object> element".into());
    }

    Ok(RecordDocument {
        serialization_model: parser
            .model
            .unwrap_or_else(|| DEFAULT_SERIALIZATION_MODEL.to_string()),
        records: parser.records,
    })
}

/// Serialize records into a record file.
pub fn write<'a>(serialization_model: &str, records: impl IntoIterator<Item = &'a Record>) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!(
        "<objects serializationModel=\"{}\">\n",
        escape(serialization_model)
    ));

    for record in records {
        out.push_str(&format!(
            "\t<object class=\"{}\" id=\"{}\">\n",
            escape(record.kind.class()),
            escape(record.id.as_str())
        ));
        for (name, value) in record.properties() {
            out.push_str(&format!("\t\t<property name=\"{}\">\n", escape(name)));
            out.push_str(&format!("\t\t\t<value>{}</value>\n", escape(value)));
            out.push_str("\t\t</property>\n");
        }
        for (name, ids) in record.relationships() {
            if ids.is_empty() {
                continue;
            }
            out.push_str(&format!("\t\t<relationship name=\"{}\">\n", escape(name)));
            for id in ids {
                out.push_str(&format!(
                    "\t\t\t<destination>{}</destination>\n",
                    escape(id.as_str())
                ));
            }
            out.push_str("\t\t</relationship>\n");
        }
        out.push_str("\t</object>\n");
    }

    out.push_str("</objects>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<objects serializationModel="Studio.02.01.00">
	<object class="Event" id="{e1}">
		<property name="name">
			<value>Hit &amp; Run</value>
		</property>
		<relationship name="folder">
			<destination>{f1}</destination>
		</relationship>
		<relationship name="groupTracks">
			<destination>{g1}</destination>
			<destination>{g2}</destination>
		</relationship>
	</object>
	<object class="ParameterProxy" id="{m1}" />
</objects>
"#;

    #[test]
    fn test_parses_objects_properties_and_relationships() {
        let doc = parse(SAMPLE).unwrap();
        assert_eq!(doc.serialization_model, "Studio.02.01.00");
        assert_eq!(doc.records.len(), 2);

        let event = &doc.records[0];
        assert_eq!(event.kind, RecordKind::Event);
        assert_eq!(event.name(), Some("Hit & Run"));
        assert_eq!(event.first("folder"), Some(&RecordId::from("{f1}")));
        assert_eq!(event.relationship("groupTracks").len(), 2);

        assert_eq!(doc.records[1].kind, RecordKind::Opaque("ParameterProxy".into()));
    }

    #[test]
    fn test_value_whitespace_is_kept() {
        let record = Record::new(RecordKind::Bank, RecordId::from("{b}")).with_property("name", " Creatures ");
        let text = write(DEFAULT_SERIALIZATION_MODEL, [&record]);
        let doc = parse(&text).unwrap();
        assert_eq!(doc.records[0].name(), Some(" Creatures "));
        assert_eq!(doc.records[0].id, RecordId::from("{b}"));
    }

    #[test]
    fn test_destination_ids_are_trimmed() {
        let text = "<objects><object class=\"Event\" id=\"{e}\"><relationship name=\"folder\">\n<destination>\n\t{f}\n</destination></relationship></object></objects>";
        let doc = parse(text).unwrap();
        assert_eq!(doc.records[0].first("folder"), Some(&RecordId::from("{f}")));
    }

    #[test]
    fn test_writer_output_reparses_to_the_same_records() {
        let doc = parse(SAMPLE).unwrap();
        let text = write(&doc.serialization_model, &doc.records);
        let again = parse(&text).unwrap();
        assert_eq!(doc, again);
    }

    #[test]
    fn test_writer_is_tab_indented_and_stable() {
        let doc = parse(SAMPLE).unwrap();
        let first = write(&doc.serialization_model, &doc.records);
        let second = write(&doc.serialization_model, &parse(&first).unwrap().records);
        assert_eq!(first, second);
        assert!(first.contains("\n\t<object class=\"Event\" id=\"{e1}\">\n"));
        assert!(first.contains("\t\t\t<value>Hit &amp; Run</value>\n"));
        assert!(first.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
    }

    #[test]
    fn test_object_without_id_is_malformed() {
        let err = parse(r#"<objects><object class="Event"></object></objects>"#).unwrap_err();
        assert!(err.contains("without id"), "{err}");
    }

    #[test]
    fn test_truncated_document_is_malformed() {
        let text = &SAMPLE[..SAMPLE.find("</relationship>").unwrap()];
        assert!(parse(text).is_err());
    }

    #[test]
    fn test_missing_model_falls_back_to_default() {
        let doc = parse("<objects></objects>").unwrap();
        assert_eq!(doc.serialization_model, DEFAULT_SERIALIZATION_MODEL);
        assert!(doc.records.is_empty());
    }
}
