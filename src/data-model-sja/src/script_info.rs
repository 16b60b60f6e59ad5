//! The structured-output contract for script analysis.
//!
//! `SCRIPT_INFO_FIELDS` is the one declaration of the fields a model must return.
//! The JSON schema embedded in prompts is rendered from it, and `ResultSchema::new`
//! refuses to build if `ScriptInfo`'s serde representation disagrees with it,
//! so the prompt and the parser cannot drift apart.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Longest `language` the results table's `VARCHAR(255)` column holds.
pub const MAX_LANGUAGE_LEN: usize = 255;

/// Metadata a model extracts from one batch script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptInfo {
    pub language: String,
    pub module: Vec<String>,
    pub package: Vec<String>,
    pub technique: Vec<String>,
    pub summary: String,
}

/// JSON type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    StringList,
}

impl FieldKind {
    fn json_schema(&self) -> Value {
        match self {
            FieldKind::String => json!({ "type": "string" }),
            FieldKind::StringList => json!({ "type": "array", "items": { "type": "string" } }),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::StringList => value.is_array(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
}

pub const SCRIPT_INFO_FIELDS: [SchemaField; 5] = [
    SchemaField {
        name: "language",
        kind: FieldKind::String,
        description: "programming language of the script provided.",
    },
    SchemaField {
        name: "module",
        kind: FieldKind::StringList,
        description: "modules used in the script.",
    },
    SchemaField {
        name: "package",
        kind: FieldKind::StringList,
        description: "packages used in the script.",
    },
    SchemaField {
        name: "technique",
        kind: FieldKind::StringList,
        description: "techniques used in the script.",
    },
    SchemaField {
        name: "summary",
        kind: FieldKind::String,
        description: "summary of the script.",
    },
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    /// Declared fields and the `ScriptInfo` serde representation disagree.
    #[error("Schema fields {declared:?} do not match ScriptInfo fields {serialized:?}")]
    FieldMismatch {
        declared: Vec<String>,
        serialized: Vec<String>,
    },
    #[error("Schema field '{0}' is declared with a type that ScriptInfo does not use")]
    KindMismatch(String),
    #[error("Model output does not contain a JSON object")]
    NoJsonFound,
    #[error("Model output does not conform to the schema: {0}")]
    Malformed(String),
    #[error("Field 'language' is {0} characters long, at most 255 can be stored")]
    LanguageTooLong(usize),
}

/// Format instructions + strict parser built from `SCRIPT_INFO_FIELDS`.
#[derive(Debug, Clone)]
pub struct ResultSchema {
    format_instructions: String,
}

impl ResultSchema {
    pub fn new() -> Result<Self, SchemaError> {
        Self::from_fields(&SCRIPT_INFO_FIELDS)
    }

    /// Builds a schema from a field table, checking it against `ScriptInfo` first.
    pub fn from_fields(fields: &[SchemaField]) -> Result<Self, SchemaError> {
        check_fields(fields)?;

        let mut properties = Map::new();
        for field in fields {
            let mut property = field.kind.json_schema();
            property["description"] = Value::String(field.description.to_string());
            properties.insert(field.name.to_string(), property);
        }
        let required: Vec<&str> = fields.iter().map(|f| f.name).collect();
        let json_schema = json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        });

        let format_instructions = format!(
            "The output must be a single JSON object that conforms to the JSON schema below.\n\
             Every field in \"required\" must be present, no other fields are allowed, \
             and list fields must be JSON arrays of strings.\n\n\
             Here is the output schema:\n```json\n{}\n```",
            json_schema
        );

        Ok(ResultSchema { format_instructions })
    }

    /// Text to embed in prompts so the model produces schema-conformant output.
    pub fn format_instructions(&self) -> &str {
        &self.format_instructions
    }

    /// Strictly parses raw model output: malformed JSON, missing fields, unknown fields
    /// and type mismatches are all rejected, as is a `language` the results table cannot hold.
    pub fn parse(&self, raw_model_output: &str) -> Result<ScriptInfo, SchemaError> {
        let payload = extract_json_payload(raw_model_output).ok_or(SchemaError::NoJsonFound)?;
        let info = serde_json::from_str::<ScriptInfo>(payload).map_err(|e| SchemaError::Malformed(e.to_string()))?;

        let language_len = info.language.chars().count();
        if language_len > MAX_LANGUAGE_LEN {
            return Err(SchemaError::LanguageTooLong(language_len));
        }
        Ok(info)
    }
}

fn check_fields(fields: &[SchemaField]) -> Result<(), SchemaError> {
    let sample = ScriptInfo::default();
    let serialized = match serde_json::to_value(&sample) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };

    let declared_names: BTreeSet<&str> = fields.iter().map(|f| f.name).collect();
    let serialized_names: BTreeSet<&str> = serialized.keys().map(|k| k.as_str()).collect();
    if declared_names != serialized_names || declared_names.len() != fields.len() {
        return Err(SchemaError::FieldMismatch {
            declared: fields.iter().map(|f| f.name.to_string()).collect(),
            serialized: serialized.keys().cloned().collect(),
        });
    }

    for field in fields {
        if !serialized.get(field.name).is_some_and(|v| field.kind.matches(v)) {
            return Err(SchemaError::KindMismatch(field.name.to_string()));
        }
    }
    Ok(())
}

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid fenced JSON regex"));

/// Finds the JSON object in a completion: a fenced code block if there is one,
/// otherwise the span from the first `{` to the last `}`.
pub fn extract_json_payload(text: &str) -> Option<&str> {
    if let Some(captures) = FENCED_JSON.captures(text)
        && let Some(body) = captures.get(1)
    {
        return Some(body.as_str());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"language": "Python", "module": ["torch"], "package": ["numpy", "scipy"], "technique": ["deep-learning"], "summary": "Trains a model."}"#;

    fn schema() -> ResultSchema {
        ResultSchema::new().expect("declared fields match ScriptInfo")
    }

    #[test]
    fn test_schema_lists_every_field() {
        let schema = schema();
        let embedded = extract_json_payload(schema.format_instructions()).unwrap();
        let json_schema: Value = serde_json::from_str(embedded).unwrap();
        let properties = json_schema["properties"].as_object().unwrap();
        assert_eq!(properties.len(), SCRIPT_INFO_FIELDS.len());
        for field in SCRIPT_INFO_FIELDS {
            assert!(properties.contains_key(field.name), "missing {}", field.name);
            assert!(schema.format_instructions().contains(field.description));
        }
        assert_eq!(json_schema["properties"]["module"]["type"], "array");
        assert_eq!(json_schema["properties"]["summary"]["type"], "string");
        assert_eq!(json_schema["additionalProperties"], false);
    }

    #[test]
    fn test_mismatched_field_table_is_rejected() {
        let mut fields = SCRIPT_INFO_FIELDS.to_vec();
        fields.pop();
        assert!(matches!(
            ResultSchema::from_fields(&fields),
            Err(SchemaError::FieldMismatch { .. })
        ));

        let mut fields = SCRIPT_INFO_FIELDS.to_vec();
        fields[0].kind = FieldKind::StringList;
        assert_eq!(
            ResultSchema::from_fields(&fields).unwrap_err(),
            SchemaError::KindMismatch("language".to_string())
        );
    }

    #[test]
    fn test_parse_valid_output() {
        let info = schema().parse(VALID).unwrap();
        assert_eq!(info.language, "Python");
        assert_eq!(info.module, vec!["torch"]);
        assert_eq!(info.package, vec!["numpy", "scipy"]);
        assert_eq!(info.technique, vec!["deep-learning"]);
        assert_eq!(info.summary, "Trains a model.");
    }

    #[test]
    fn test_parse_fenced_output_with_chatter() {
        let raw = format!("Sure! Here is the analysis:\n```json\n{}\n```\nLet me know if you need more.", VALID);
        assert_eq!(schema().parse(&raw).unwrap().language, "Python");
    }

    #[test]
    fn test_parse_unfenced_output_with_chatter() {
        let raw = format!("The result is {} as requested.", VALID);
        assert_eq!(schema().parse(&raw).unwrap().summary, "Trains a model.");
    }

    #[test]
    fn test_parse_missing_summary_fails() {
        let raw = r#"{"language": "bash", "module": [], "package": [], "technique": []}"#;
        assert!(matches!(schema().parse(raw), Err(SchemaError::Malformed(_))));
    }

    #[test]
    fn test_parse_extra_field_fails() {
        let raw = r#"{"language": "bash", "module": [], "package": [], "technique": [], "summary": "s", "confidence": 0.9}"#;
        assert!(matches!(schema().parse(raw), Err(SchemaError::Malformed(_))));
    }

    #[test]
    fn test_parse_type_mismatch_fails() {
        let raw = r#"{"language": "bash", "module": "os", "package": [], "technique": [], "summary": "s"}"#;
        assert!(matches!(schema().parse(raw), Err(SchemaError::Malformed(_))));
    }

    #[test]
    fn test_parse_language_longer_than_column_fails() {
        let language = "x".repeat(MAX_LANGUAGE_LEN + 1);
        let raw = format!(
            r#"{{"language": "{}", "module": [], "package": [], "technique": [], "summary": "s"}}"#,
            language
        );
        assert_eq!(schema().parse(&raw), Err(SchemaError::LanguageTooLong(256)));
    }

    #[test]
    fn test_parse_language_at_column_limit() {
        // Multi-byte characters count once each, as VARCHAR does.
        let language = "é".repeat(MAX_LANGUAGE_LEN);
        let raw = format!(
            r#"{{"language": "{}", "module": [], "package": [], "technique": [], "summary": "s"}}"#,
            language
        );
        assert_eq!(schema().parse(&raw).unwrap().language, language);
    }

    #[test]
    fn test_parse_without_json_fails() {
        assert_eq!(
            schema().parse("The script is written in bash."),
            Err(SchemaError::NoJsonFound)
        );
    }

    #[test]
    fn test_parse_truncated_json_fails() {
        let raw = r#"{"language": "bash", "module": ["os"], "package": [], "technique": [], "summary": "s""#;
        assert!(schema().parse(raw).is_err());
    }
}
