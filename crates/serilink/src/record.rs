// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Record transcoding between the 16-field wire line and JSON.
//!
//! A text line carries exactly 16 comma-separated fields: 8 field names
//! followed by 8 field values, paired positionally (field *i* pairs with
//! field *i + 8*). Names are not validated against a schema; any 16-field
//! line produces a valid record.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// Field delimiter of the wire line.
pub const FIELD_DELIMITER: &str = ",";

/// Number of named fields in one record (the line holds twice as many).
pub const FIELD_COUNT: usize = 8;

/// Record parsing errors.
#[derive(Debug)]
pub enum ParseError {
    /// The line has too few fields to pair names with values.
    TooFewFields { found: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::TooFewFields { found } => write!(
                f,
                "record line has {} fields, expected {}",
                found,
                FIELD_COUNT * 2
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// An ordered name-to-value mapping derived from one 16-field line.
///
/// Insertion order is the line's field order and is preserved through
/// serialization (keys are never sorted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    /// Build a record by zipping the name half and value half of a line.
    ///
    /// Fields beyond the 16th are silently ignored; fewer than 16 is a
    /// parse error propagated to the caller.
    pub fn from_line(line: &str) -> Result<Self, ParseError> {
        let cells: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        if cells.len() < FIELD_COUNT * 2 {
            return Err(ParseError::TooFewFields { found: cells.len() });
        }

        let fields = (0..FIELD_COUNT)
            .map(|i| (cells[i].to_string(), cells[i + FIELD_COUNT].to_string()))
            .collect();
        Ok(Self { fields })
    }

    /// Look up a value by field name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Number of fields in the record.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Compact JSON rendering, keys in insertion order, no trailing newline.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Join an already-flattened name-then-value field sequence into one wire
/// line. Embedded line terminators are stripped so the result is exactly
/// one line.
pub fn join_fields(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| f.replace('\r', "").replace('\n', ""))
        .collect::<Vec<_>>()
        .join(FIELD_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LINE: &str = "Total runtime,FW ver,Dev ID,Type,inputs,state,Sensor1,Sensor2,\
                               2021-01-01T00:00:00,V001,0,Sensor,8,Active,42,7";

    const SAMPLE_JSON: &str = "{\"Total runtime\":\"2021-01-01T00:00:00\",\"FW ver\":\"V001\",\
                               \"Dev ID\":\"0\",\"Type\":\"Sensor\",\"inputs\":\"8\",\
                               \"state\":\"Active\",\"Sensor1\":\"42\",\"Sensor2\":\"7\"}";

    #[test]
    fn test_sample_line_transcodes_to_expected_json() {
        let record = Record::from_line(SAMPLE_LINE).expect("parse");
        assert_eq!(record.to_json().expect("render"), SAMPLE_JSON);
    }

    #[test]
    fn test_record_pairs_names_with_values() {
        let record = Record::from_line(SAMPLE_LINE).expect("parse");
        assert_eq!(record.len(), 8);
        assert_eq!(record.get("Total runtime"), Some("2021-01-01T00:00:00"));
        assert_eq!(record.get("FW ver"), Some("V001"));
        assert_eq!(record.get("Sensor2"), Some("7"));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn test_too_few_fields_is_an_error() {
        let err = Record::from_line("a,b,c,d,e,f,g,h,1,2,3").unwrap_err();
        match err {
            ParseError::TooFewFields { found } => assert_eq!(found, 11),
        }
    }

    #[test]
    fn test_excess_fields_are_ignored() {
        let line = format!("{},extra1,extra2", SAMPLE_LINE);
        let record = Record::from_line(&line).expect("parse");
        assert_eq!(record.len(), 8);
        assert_eq!(record.to_json().expect("render"), SAMPLE_JSON);
    }

    #[test]
    fn test_json_escapes_values() {
        let line = "n1,n2,n3,n4,n5,n6,n7,n8,va\"lue,v2,v3,v4,v5,v6,v7,v8";
        let record = Record::from_line(line).expect("parse");
        let json = record.to_json().expect("render");
        assert!(json.contains("\"va\\\"lue\""));
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(parsed["n1"], "va\"lue");
    }

    #[test]
    fn test_join_fields_strips_terminators() {
        let fields = vec![
            "name\n".to_string(),
            "value\r\n".to_string(),
            "plain".to_string(),
        ];
        assert_eq!(join_fields(&fields), "name,value,plain");
    }
}
