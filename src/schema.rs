//! # Show Schema Module
//!
//! One declarative rule table covers every writable column of a show. Each rule
//! carries the limits that apply when a show is created and when it is updated,
//! so both endpoints validate against the same table and cannot drift apart.
//!
//! Validation is the first stage of every write:
//!
//! ```text
//! ShowInput --validate(op)--> ValidShow --sanitize()--> ShowRecord --> database
//! ```
//!
//! [`ShowRecord`] has no public constructor, so the database layer cannot be
//! handed a record that skipped either stage.

use crate::sanitize::{sanitize, sanitize_optional};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize, de::IgnoredAny};
use validator::ValidateUrl;

/// Date format accepted for `first_aired`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Which write a payload is validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
}

/// A single validation failure, serialized as `{"field": ..., "error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub error: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            error: error.into(),
        }
    }
}

/// Raw show fields exactly as extracted from a request.
///
/// `in_production` accepts a JSON boolean as well as a string, since multipart
/// forms can only carry text. A JSON value of any other type is remembered as
/// malformed and reported by [`validate`] for that field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawShowInput")]
pub struct ShowInput {
    pub title: Option<String>,
    pub first_aired: Option<String>,
    pub in_production: Option<String>,
    pub tagline: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub network: Option<String>,
    pub webpage: Option<String>,
    /// Fields whose JSON value had the wrong type.
    pub(crate) malformed: Vec<&'static str>,
}

impl ShowInput {
    /// Sets a field by its form name. Unknown names are ignored.
    pub fn set(&mut self, field: &str, value: String) {
        if let Some(slot) = self.slot(field) {
            *slot = Some(value);
        }
    }

    fn slot(&mut self, field: &str) -> Option<&mut Option<String>> {
        let slot = match field {
            "title" => &mut self.title,
            "first_aired" => &mut self.first_aired,
            "in_production" => &mut self.in_production,
            "tagline" => &mut self.tagline,
            "image" => &mut self.image,
            "description" => &mut self.description,
            "language" => &mut self.language,
            "network" => &mut self.network,
            "webpage" => &mut self.webpage,
            _ => return None,
        };
        Some(slot)
    }

    fn get(&self, field: &str) -> Option<&str> {
        let value = match field {
            "title" => &self.title,
            "first_aired" => &self.first_aired,
            "in_production" => &self.in_production,
            "tagline" => &self.tagline,
            "image" => &self.image,
            "description" => &self.description,
            "language" => &self.language,
            "network" => &self.network,
            "webpage" => &self.webpage,
            _ => return None,
        };
        present(value)
    }
}

/// Any JSON value a show field may arrive as.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Text(String),
    #[allow(dead_code)]
    Other(IgnoredAny),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawShowInput {
    title: Option<Scalar>,
    first_aired: Option<Scalar>,
    in_production: Option<Scalar>,
    tagline: Option<Scalar>,
    image: Option<Scalar>,
    description: Option<Scalar>,
    language: Option<Scalar>,
    network: Option<Scalar>,
    webpage: Option<Scalar>,
}

impl From<RawShowInput> for ShowInput {
    fn from(raw: RawShowInput) -> Self {
        let mut input = ShowInput::default();
        let fields = [
            ("title", raw.title),
            ("first_aired", raw.first_aired),
            ("in_production", raw.in_production),
            ("tagline", raw.tagline),
            ("image", raw.image),
            ("description", raw.description),
            ("language", raw.language),
            ("network", raw.network),
            ("webpage", raw.webpage),
        ];

        for (field, value) in fields {
            match value {
                None => {}
                Some(Scalar::Text(s)) => input.set(field, s),
                Some(Scalar::Bool(b)) if field == "in_production" => input.set(field, b.to_string()),
                Some(_) => input.malformed.push(field),
            }
        }

        input
    }
}

/// Trimmed value, or `None` when absent or blank.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Text,
    /// Letters only.
    Language,
    /// http(s) URL.
    Url,
    Date,
    Flag,
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    required: bool,
    min: usize,
    max: usize,
}

const fn optional(max: usize) -> Option<Limits> {
    Some(Limits {
        required: false,
        min: 0,
        max,
    })
}

const fn required(min: usize, max: usize) -> Option<Limits> {
    Some(Limits {
        required: true,
        min,
        max,
    })
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    field: &'static str,
    label: &'static str,
    kind: Kind,
    /// `None` means the field is not taken from the payload for this operation.
    create: Option<Limits>,
    update: Option<Limits>,
}

impl Rule {
    fn limits(&self, op: Operation) -> Option<Limits> {
        match op {
            Operation::Create => self.create,
            Operation::Update => self.update,
        }
    }
}

const RULES: [Rule; 9] = [
    Rule {
        field: "title",
        label: "Titill",
        kind: Kind::Text,
        create: required(1, 255),
        update: required(1, 128),
    },
    Rule {
        field: "first_aired",
        label: "First aired",
        kind: Kind::Date,
        create: optional(10),
        update: optional(10),
    },
    Rule {
        field: "in_production",
        label: "In production",
        kind: Kind::Flag,
        create: optional(5),
        update: optional(5),
    },
    Rule {
        field: "tagline",
        label: "Tagline",
        kind: Kind::Text,
        create: optional(255),
        update: optional(128),
    },
    // On create the image comes from the uploaded file, never from a form field.
    Rule {
        field: "image",
        label: "Image",
        kind: Kind::Text,
        create: None,
        update: optional(255),
    },
    Rule {
        field: "description",
        label: "Description",
        kind: Kind::Text,
        create: optional(400),
        update: optional(400),
    },
    Rule {
        field: "language",
        label: "Language",
        kind: Kind::Language,
        create: required(2, 2),
        update: optional(2),
    },
    Rule {
        field: "network",
        label: "Network",
        kind: Kind::Text,
        create: optional(255),
        update: optional(40),
    },
    Rule {
        field: "webpage",
        label: "Webpage",
        kind: Kind::Url,
        create: optional(255),
        update: optional(255),
    },
];

fn check(rule: &Rule, limits: Limits, op: Operation, value: Option<&str>) -> Option<String> {
    let Rule { label, kind, .. } = *rule;

    if let Kind::Language = kind {
        let valid = match value {
            None => !limits.required,
            Some(v) => {
                let len = v.chars().count();
                v.chars().all(|c| c.is_ascii_alphabetic()) && len >= limits.min && len <= limits.max
            }
        };
        return (!valid).then(|| match op {
            Operation::Create => {
                "Language þarf að vera til staðar og er táknað með tveimur bókstöfum".to_string()
            }
            Operation::Update => "Language er táknað með tveimur bókstöfum".to_string(),
        });
    }

    let Some(value) = value else {
        return limits
            .required
            .then(|| format!("{label} þarf að vera amk {} stafur", limits.min));
    };

    let len = value.chars().count();
    if len < limits.min {
        return Some(format!("{label} þarf að vera amk {} stafur", limits.min));
    }

    match kind {
        Kind::Date if parse_date(value).is_none() => {
            return Some(format!("{label} þarf að vera dagsetning á forminu YYYY-MM-DD"));
        }
        Kind::Flag if parse_flag(value).is_none() => {
            return Some(format!("{label} þarf að vera true eða false"));
        }
        _ => {}
    }

    if len > limits.max {
        return Some(format!("{label} má að hámarki vera {} stafir", limits.max));
    }

    if let Kind::Url = kind {
        if !is_web_url(value) {
            return Some(format!("{label} þarf að vera á URL formi"));
        }
    }

    None
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

fn is_web_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://")) && value.validate_url()
}

fn type_error(rule: &Rule) -> String {
    let label = rule.label;
    match rule.kind {
        Kind::Date => format!("{label} þarf að vera dagsetning á forminu YYYY-MM-DD"),
        Kind::Flag => format!("{label} þarf að vera true eða false"),
        Kind::Text | Kind::Language | Kind::Url => format!("{label} þarf að vera texti"),
    }
}

/// Checks a path id. Only plain integers are accepted.
pub fn validate_id(id: &str) -> Result<i64, FieldError> {
    id.trim()
        .parse::<i64>()
        .map_err(|_| FieldError::new("id", "id þarf að vera tala"))
}

/// Runs every rule for `op` against `input`, collecting all failures.
pub fn validate(op: Operation, input: &ShowInput) -> Result<ValidShow, Vec<FieldError>> {
    let errors: Vec<FieldError> = RULES
        .iter()
        .filter_map(|rule| {
            let limits = rule.limits(op)?;
            let error = if input.malformed.contains(&rule.field) {
                Some(type_error(rule))
            } else {
                check(rule, limits, op, input.get(rule.field))
            };
            error.map(|error| FieldError::new(rule.field, error))
        })
        .collect();

    if !errors.is_empty() {
        return Err(errors);
    }

    let owned = |field: &str| input.get(field).map(str::to_string);

    Ok(ValidShow {
        op,
        title: owned("title").unwrap_or_default(),
        first_aired: input.get("first_aired").and_then(parse_date),
        in_production: input.get("in_production").and_then(parse_flag),
        tagline: owned("tagline"),
        image: match op {
            Operation::Create => None,
            Operation::Update => owned("image"),
        },
        description: owned("description"),
        language: owned("language"),
        network: owned("network"),
        webpage: owned("webpage"),
    })
}

/// A payload that passed [`validate`] but has not been sanitized yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidShow {
    op: Operation,
    title: String,
    first_aired: Option<NaiveDate>,
    in_production: Option<bool>,
    tagline: Option<String>,
    image: Option<String>,
    description: Option<String>,
    language: Option<String>,
    network: Option<String>,
    webpage: Option<String>,
}

impl ValidShow {
    /// Strips markup from every text field.
    ///
    /// Text rules are checked again on the stripped values, so a field made
    /// only of markup fails its minimum length instead of being stored empty.
    /// Optional fields that end up blank become `None`.
    pub fn sanitize(self) -> Result<ShowRecord, Vec<FieldError>> {
        let clean = |value: Option<String>| {
            sanitize_optional(value)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let record = ShowRecord {
            title: sanitize(&self.title).trim().to_string(),
            first_aired: self.first_aired,
            in_production: self.in_production,
            tagline: clean(self.tagline),
            image: clean(self.image),
            description: clean(self.description),
            language: clean(self.language),
            network: clean(self.network),
            webpage: clean(self.webpage),
        };

        let errors: Vec<FieldError> = RULES
            .iter()
            .filter(|rule| !matches!(rule.kind, Kind::Date | Kind::Flag))
            .filter_map(|rule| {
                let limits = rule.limits(self.op)?;
                check(rule, limits, self.op, record.text(rule.field))
                    .map(|error| FieldError::new(rule.field, error))
            })
            .collect();

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(record)
    }
}

/// Validated and sanitized column values, ready to be bound to a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ShowRecord {
    pub(crate) title: String,
    pub(crate) first_aired: Option<NaiveDate>,
    pub(crate) in_production: Option<bool>,
    pub(crate) tagline: Option<String>,
    pub(crate) image: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) language: Option<String>,
    pub(crate) network: Option<String>,
    pub(crate) webpage: Option<String>,
}

impl ShowRecord {
    /// Attaches the URL produced by the image resolver.
    pub(crate) fn with_image(mut self, url: String) -> Self {
        self.image = Some(url);
        self
    }

    fn text(&self, field: &str) -> Option<&str> {
        match field {
            "title" => Some(self.title.as_str()).filter(|s| !s.is_empty()),
            "tagline" => self.tagline.as_deref(),
            "image" => self.image.as_deref(),
            "description" => self.description.as_deref(),
            "language" => self.language.as_deref(),
            "network" => self.network.as_deref(),
            "webpage" => self.webpage.as_deref(),
            _ => None,
        }
    }
}
