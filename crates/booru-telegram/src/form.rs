use reqwest::multipart::{Form, Part};
use serde_json::Value;

use booru_core::{errors::Error, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    File { filename: String, bytes: Vec<u8> },
}

/// Ordered multipart fields for one Bot API call.
#[derive(Clone, Debug, Default)]
pub struct FormFields {
    fields: Vec<(String, FieldValue)>,
}

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_text(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.fields
            .push((key.to_string(), FieldValue::Text(value.into())));
        self
    }

    pub fn add_int(&mut self, key: &str, value: i64) -> &mut Self {
        self.add_text(key, value.to_string())
    }

    pub fn add_file(&mut self, key: &str, filename: &str, bytes: Vec<u8>) -> &mut Self {
        self.fields.push((
            key.to_string(),
            FieldValue::File {
                filename: filename.to_string(),
                bytes,
            },
        ));
        self
    }

    /// Encode a JSON value: scalars as their text, arrays/objects as JSON.
    /// `null` has no form representation.
    pub fn add_value(&mut self, key: &str, value: &Value) -> Result<&mut Self> {
        let text = match value {
            Value::Null => {
                return Err(Error::UnsupportedFieldType {
                    key: key.to_string(),
                    kind: "null",
                })
            }
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(_) | Value::Object(_) => serde_json::to_string(value)?,
        };
        Ok(self.add_text(key, text))
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            FieldValue::Text(t) => Some(t.as_str()),
            FieldValue::File { .. } => None,
        }
    }

    #[cfg(test)]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_multipart(self) -> Result<Form> {
        let mut form = Form::new();
        for (key, value) in self.fields {
            form = match value {
                FieldValue::Text(text) => form.text(key, text),
                FieldValue::File { filename, bytes } => {
                    let part = Part::bytes(bytes)
                        .file_name(filename)
                        .mime_str("application/octet-stream")
                        .map_err(|e| Error::Transport(format!("multipart error: {e}")))?;
                    form.part(key, part)
                }
            };
        }
        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn keeps_insertion_order_and_types() {
        let mut f = FormFields::new();
        f.add_int("chat_id", -100)
            .add_int("reply_to_message_id", 5)
            .add_text("caption", "https://derpibooru.org/1\nBest recent image for your search")
            .add_file("photo", "1.png", vec![0x89, b'P']);

        assert_eq!(
            f.keys().collect::<Vec<_>>(),
            vec!["chat_id", "reply_to_message_id", "caption", "photo"]
        );
        assert_eq!(f.text("chat_id"), Some("-100"));
        assert_eq!(
            f.get("photo"),
            Some(&FieldValue::File {
                filename: "1.png".to_string(),
                bytes: vec![0x89, b'P'],
            })
        );
        assert_eq!(f.text("photo"), None);
    }

    #[test]
    fn json_values_are_encoded_by_kind() {
        let mut f = FormFields::new();
        f.add_value("text", &json!("hi")).unwrap();
        f.add_value("cache_time", &json!(1)).unwrap();
        f.add_value("is_personal", &json!(false)).unwrap();
        f.add_value("results", &json!([{"type": "photo", "id": "1"}]))
            .unwrap();

        assert_eq!(f.text("text"), Some("hi"));
        assert_eq!(f.text("cache_time"), Some("1"));
        assert_eq!(f.text("is_personal"), Some("false"));
        assert_eq!(f.text("results"), Some(r#"[{"id":"1","type":"photo"}]"#));
    }

    #[test]
    fn null_is_an_unsupported_field_type() {
        let mut f = FormFields::new();
        let err = f.add_value("caption", &Value::Null).unwrap_err();
        match err {
            Error::UnsupportedFieldType { key, kind } => {
                assert_eq!(key, "caption");
                assert_eq!(kind, "null");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(f.is_empty());
    }

    #[test]
    fn builds_multipart_form() {
        let mut f = FormFields::new();
        f.add_int("chat_id", 1).add_file("document", "2.gif", b"GIF89a".to_vec());
        let form = f.into_multipart().unwrap();
        assert!(!form.boundary().is_empty());
    }
}
