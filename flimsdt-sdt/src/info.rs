//! Identification and setup text blocks.

use flimsdt_core::MetadataTable;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const END_MARKER: &str = "*END";

/// `Key : Value` pairs of the `*IDENTIFICATION` block, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Identification {
    pub entries: Vec<(String, String)>,
}

impl Identification {
    /// Parses the text block.
    ///
    /// Lines without a colon, the section markers, and anything after
    /// `*END` are skipped. The `0x04` framing bytes around the ID are
    /// dropped.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        let mut entries = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.starts_with(END_MARKER) {
                break;
            }
            if line.starts_with('*') {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            let value: String = value.chars().filter(|&c| c != '\u{4}').collect();
            entries.push((key.to_string(), value.trim().to_string()));
        }
        Self { entries }
    }

    /// Value of `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v.as_str()))
    }

    pub fn fill_metadata(&self, table: &mut MetadataTable) {
        for (key, value) in &self.entries {
            table.insert(key.as_str(), value.as_str());
        }
    }
}

/// Leading ASCII part of the setup block, up to `*END`.
///
/// Newer software stores binary setup data after the text; it is dropped.
#[must_use]
pub fn setup_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let end = text.find(END_MARKER).unwrap_or(text.len());
    text[..end].trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPC830_INFO: &str = "*IDENTIFICATION\r\n  ID        : \u{4}SPC Setup & Data File\u{4}                     \r\n  Title     :                         \r\n  Version   : 1  781 M\r\n  Revision  : 8 bits ADC\r\n  Date      : 11:28:2003\r\n  Time      : 13:22:11\r\n  Author    : Unknown          \r\n  Company   : Unknown          \r\n  Contents  :                                                \r\n*END\r\n\r\n";

    #[test]
    fn test_identification_fields() {
        let ident = Identification::parse(SPC830_INFO.as_bytes());
        assert_eq!(ident.entries.len(), 9);
        assert_eq!(ident.get("ID"), Some("SPC Setup & Data File"));
        assert_eq!(ident.get("Title"), Some(""));
        assert_eq!(ident.get("Version"), Some("1  781 M"));
        assert_eq!(ident.get("Revision"), Some("8 bits ADC"));
        assert_eq!(ident.get("Time"), Some("13:22:11"));
        assert_eq!(ident.get("Company"), Some("Unknown"));
        assert_eq!(ident.get("Missing"), None);
    }

    #[test]
    fn test_identification_stops_at_end() {
        let ident = Identification::parse(b"*IDENTIFICATION\r\n A : 1\r\n*END\r\n B : 2\r\n");
        assert_eq!(ident.entries, vec![("A".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_setup_text_drops_binary_tail() {
        let mut block = b"*SETUP\r\n SP_TAC_R = 5e-8\r\n*END\r\n\r\n".to_vec();
        block.extend_from_slice(&[0xFF, 0x00, 0x12]);
        assert_eq!(setup_text(&block), "*SETUP\r\n SP_TAC_R = 5e-8");
        assert_eq!(setup_text(b"*SETUP\r\n*END\r\n\r\n"), "*SETUP");
    }
}
