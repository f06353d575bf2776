//! Form schema validation.
//!
//! A schema turns an untyped submitted object into a typed input, or rejects it with a
//! field → messages map. Rules are string length bounds, optional/nullable fields, UUID and
//! timestamp formats, one-of-set enumerations and nested objects. Nothing here looks across
//! fields or at stored records.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{FromRequest, Request},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::AppError;

pub const MSG_REQUIRED: &str = "is required";
pub const MSG_NOT_STRING: &str = "must be a string";
pub const MSG_INVALID_ID: &str = "must be a valid identifier";
pub const MSG_INVALID_TIMESTAMP: &str = "must be an RFC 3339 timestamp";
pub const MSG_NOT_OBJECT: &str = "must be an object";
pub const MSG_NOT_LIST: &str = "must be a list";

/// Field path → messages. Nested fields use `parent.child` and list items `list[0].child`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field failure, for checks made outside a schema.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.fields
    }

    fn absorb(&mut self, prefix: &str, nested: ValidationErrors) {
        for (field, messages) in nested.fields {
            let path = if field.is_empty() {
                prefix.to_string()
            } else {
                format!("{}.{}", prefix, field)
            };
            self.fields.entry(path).or_default().extend(messages);
        }
    }
}

/// A declared object shape.
pub trait Schema: Sized {
    fn parse(input: &Value) -> Result<Self, ValidationErrors>;
}

/// Fields
///
/// Reads named fields out of a submitted object, recording one error per failed rule. Getters
/// hand back a placeholder on failure; `finish` refuses the whole object if anything was
/// recorded, so placeholders never reach a caller.
pub struct Fields<'a> {
    object: &'a Map<String, Value>,
    errors: ValidationErrors,
}

impl<'a> Fields<'a> {
    pub fn new(input: &'a Value) -> Result<Self, ValidationErrors> {
        match input {
            Value::Object(object) => Ok(Self {
                object,
                errors: ValidationErrors::new(),
            }),
            _ => Err(ValidationErrors::single("", MSG_NOT_OBJECT)),
        }
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    /// Present and non-null, or `None`.
    fn present(&self, name: &str) -> Option<&'a Value> {
        match self.object.get(name) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    /// Trimmed string content. Records an error and returns `None` for non-strings.
    fn string(&mut self, name: &str) -> Option<&'a str> {
        match self.present(name)? {
            Value::String(s) => Some(s.trim()),
            _ => {
                self.errors.add(name, MSG_NOT_STRING);
                None
            }
        }
    }

    fn check_length(&mut self, name: &str, value: &str, min: usize, max: usize) -> bool {
        let len = value.chars().count();
        if len < min {
            self.errors
                .add(name, format!("must be at least {} characters", min));
            false
        } else if len > max {
            self.errors
                .add(name, format!("must be at most {} characters", max));
            false
        } else {
            true
        }
    }

    pub fn required_text(&mut self, name: &str, min: usize, max: usize) -> String {
        if self.present(name).is_none() {
            self.errors.add(name, MSG_REQUIRED);
            return String::new();
        }
        match self.string(name) {
            Some(s) if self.check_length(name, s, min, max) => s.to_string(),
            _ => String::new(),
        }
    }

    /// Like `required_text` but keeps surrounding whitespace, for passwords.
    pub fn required_secret(&mut self, name: &str, min: usize, max: usize) -> String {
        match self.present(name) {
            None => {
                self.errors.add(name, MSG_REQUIRED);
                String::new()
            }
            Some(Value::String(s)) if self.check_length(name, s, min, max) => s.clone(),
            Some(Value::String(_)) => String::new(),
            Some(_) => {
                self.errors.add(name, MSG_NOT_STRING);
                String::new()
            }
        }
    }

    /// Missing, null and blank all read as absent.
    pub fn optional_text(&mut self, name: &str, min: usize, max: usize) -> Option<String> {
        let s = self.string(name).filter(|s| !s.is_empty())?;
        self.check_length(name, s, min, max).then(|| s.to_string())
    }

    pub fn uuid(&mut self, name: &str) -> Uuid {
        if self.present(name).is_none() {
            self.errors.add(name, MSG_REQUIRED);
            return Uuid::nil();
        }
        self.parse_uuid(name).unwrap_or_default()
    }

    pub fn optional_uuid(&mut self, name: &str) -> Option<Uuid> {
        self.string(name).filter(|s| !s.is_empty())?;
        self.parse_uuid(name)
    }

    fn parse_uuid(&mut self, name: &str) -> Option<Uuid> {
        match self.present(name) {
            Some(Value::String(s)) => match Uuid::parse_str(s.trim()) {
                Ok(id) => Some(id),
                Err(_) => {
                    self.errors.add(name, MSG_INVALID_ID);
                    None
                }
            },
            Some(_) => {
                self.errors.add(name, MSG_INVALID_ID);
                None
            }
            None => None,
        }
    }

    pub fn timestamp(&mut self, name: &str) -> DateTime<Utc> {
        if self.present(name).is_none() {
            self.errors.add(name, MSG_REQUIRED);
            return DateTime::<Utc>::UNIX_EPOCH;
        }
        self.parse_timestamp(name)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn optional_timestamp(&mut self, name: &str) -> Option<DateTime<Utc>> {
        self.string(name).filter(|s| !s.is_empty())?;
        self.parse_timestamp(name)
    }

    fn parse_timestamp(&mut self, name: &str) -> Option<DateTime<Utc>> {
        let raw = self.string(name)?;
        match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(_) => {
                self.errors.add(name, MSG_INVALID_TIMESTAMP);
                None
            }
        }
    }

    /// Required string drawn from a fixed set.
    pub fn one_of(&mut self, name: &str, allowed: &[&'static str]) -> &'static str {
        if self.present(name).is_none() {
            self.errors.add(name, MSG_REQUIRED);
            return "";
        }
        let Some(raw) = self.string(name) else {
            return "";
        };
        match allowed.iter().find(|candidate| **candidate == raw) {
            Some(found) => *found,
            None => {
                self.errors
                    .add(name, format!("must be one of: {}", allowed.join(", ")));
                ""
            }
        }
    }

    pub fn nested<T: Schema + Default>(&mut self, name: &str) -> T {
        if self.present(name).is_none() {
            self.errors.add(name, MSG_REQUIRED);
            return T::default();
        }
        self.optional_nested(name).unwrap_or_default()
    }

    pub fn optional_nested<T: Schema>(&mut self, name: &str) -> Option<T> {
        let value = self.present(name)?;
        match T::parse(value) {
            Ok(parsed) => Some(parsed),
            Err(nested) => {
                self.errors.absorb(name, nested);
                None
            }
        }
    }

    /// Optional list of nested objects; missing or null reads as empty.
    pub fn list<T: Schema>(&mut self, name: &str) -> Vec<T> {
        let items = match self.present(name) {
            None => return Vec::new(),
            Some(Value::Array(items)) => items,
            Some(_) => {
                self.errors.add(name, MSG_NOT_LIST);
                return Vec::new();
            }
        };

        let mut parsed = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match T::parse(item) {
                Ok(value) => parsed.push(value),
                Err(nested) => self.errors.absorb(&format!("{}[{}]", name, index), nested),
            }
        }
        parsed
    }
}

/// Valid
///
/// Extractor that reads a JSON body and runs it through `T`'s schema before the handler sees
/// it. Malformed JSON and schema failures both reject with `AppError::Validation`.
pub struct Valid<T>(pub T);

impl<S, T> FromRequest<S> for Valid<T>
where
    S: Send + Sync,
    T: Schema,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| {
                AppError::Validation(ValidationErrors::single("", rejection.body_text()))
            })?;

        T::parse(&value).map(Valid).map_err(AppError::Validation)
    }
}
