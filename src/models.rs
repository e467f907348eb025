use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use uuid::Uuid;
use validator::Validate;

/// The nine descriptive attributes collected by the form.
///
/// Wire keys match the form inputs (`Nationality`, `Occupation` are capitalized).
/// Missing keys come in as empty strings, which is also the form's reset state.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct AvatarRequest {
    #[validate(length(min = 2, message = "Hair description must be at least 2 characters."))]
    pub hair: String,
    #[validate(length(min = 2, message = "Eye color must be at least 2 characters."))]
    pub eyes: String,
    #[validate(
        length(min = 2, message = "Face shape must be at least 2 characters."),
        custom(function = "crate::validation::face_shape_option", message = "Face shape must be one of: oval, round, square, heart.")
    )]
    pub face_shape: String,
    #[validate(
        length(min = 1, message = "Age is required."),
        custom(function = "crate::validation::numeric_age", message = "Age must be a number.")
    )]
    pub age: String,
    #[validate(
        length(min = 1, message = "Gender is required."),
        custom(function = "crate::validation::gender_option", message = "Gender must be one of: male, female, non-binary.")
    )]
    pub gender: String,
    #[serde(rename = "Nationality", alias = "nationality")]
    #[validate(length(min = 2, message = "Nationality must be at least 2 characters."))]
    pub nationality: String,
    #[serde(rename = "Occupation", alias = "occupation")]
    #[validate(length(min = 2, message = "Occupation must be at least 2 characters."))]
    pub occupation: String,
    #[validate(length(min = 2, message = "Dress description must be at least 2 characters."))]
    pub dress: String,
    #[validate(
        length(min = 2, message = "Customer type must be at least 2 characters."),
        custom(function = "crate::validation::customer_type_option", message = "Customer type must be one of: regular, premium, vip.")
    )]
    pub customer_type: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    #[serde(rename = "hair")] Hair,
    #[serde(rename = "eyes")] Eyes,
    #[serde(rename = "face_shape")] FaceShape,
    #[serde(rename = "age")] Age,
    #[serde(rename = "gender")] Gender,
    #[serde(rename = "Nationality")] Nationality,
    #[serde(rename = "Occupation")] Occupation,
    #[serde(rename = "dress")] Dress,
    #[serde(rename = "customer_type")] CustomerType,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Hair,
        Field::Eyes,
        Field::FaceShape,
        Field::Age,
        Field::Gender,
        Field::Nationality,
        Field::Occupation,
        Field::Dress,
        Field::CustomerType,
    ];

    pub fn value<'a>(&self, request: &'a AvatarRequest) -> &'a str {
        match self {
            Field::Hair => &request.hair,
            Field::Eyes => &request.eyes,
            Field::FaceShape => &request.face_shape,
            Field::Age => &request.age,
            Field::Gender => &request.gender,
            Field::Nationality => &request.nationality,
            Field::Occupation => &request.occupation,
            Field::Dress => &request.dress,
            Field::CustomerType => &request.customer_type,
        }
    }

    /// Accepts both the wire key and the Rust field name.
    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.wire_name() == name || f.rust_name() == name)
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            Field::Nationality => "Nationality",
            Field::Occupation => "Occupation",
            other => other.rust_name(),
        }
    }

    fn rust_name(&self) -> &'static str {
        match self {
            Field::Hair => "hair",
            Field::Eyes => "eyes",
            Field::FaceShape => "face_shape",
            Field::Age => "age",
            Field::Gender => "gender",
            Field::Nationality => "nationality",
            Field::Occupation => "occupation",
            Field::Dress => "dress",
            Field::CustomerType => "customer_type",
        }
    }

    #[cfg(test)]
    pub fn value_mut<'a>(&self, request: &'a mut AvatarRequest) -> &'a mut String {
        match self {
            Field::Hair => &mut request.hair,
            Field::Eyes => &mut request.eyes,
            Field::FaceShape => &mut request.face_shape,
            Field::Age => &mut request.age,
            Field::Gender => &mut request.gender,
            Field::Nationality => &mut request.nationality,
            Field::Occupation => &mut request.occupation,
            Field::Dress => &mut request.dress,
            Field::CustomerType => &mut request.customer_type,
        }
    }
}

pub type FieldErrors = BTreeMap<Field, String>;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct SelectOption {
    pub value: &'static str,
    pub label: &'static str,
}

pub const FACE_SHAPES: &[SelectOption] = &[
    SelectOption { value: "oval", label: "Oval" },
    SelectOption { value: "round", label: "Round" },
    SelectOption { value: "square", label: "Square" },
    SelectOption { value: "heart", label: "Heart" },
];

pub const GENDERS: &[SelectOption] = &[
    SelectOption { value: "male", label: "Male" },
    SelectOption { value: "female", label: "Female" },
    SelectOption { value: "non-binary", label: "Non-binary" },
];

pub const CUSTOMER_TYPES: &[SelectOption] = &[
    SelectOption { value: "regular", label: "Regular" },
    SelectOption { value: "premium", label: "Premium" },
    SelectOption { value: "vip", label: "VIP" },
];

/// A decoded-enough image returned by the inference host.
/// `bytes` is cheap to clone; the session is the only writer of its slot.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Bytes,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
    pub generated_at: DateTime<Utc>,
}

impl GeneratedImage {
    pub fn to_data_url(&self) -> String {
        use base64::Engine;
        format!(
            "data:{};base64,{}",
            self.content_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    pub fn info(&self, session_id: Uuid) -> ImageInfo {
        ImageInfo {
            url: format!("/api/sessions/{}/image", session_id),
            content_type: self.content_type.to_string(),
            width: self.width,
            height: self.height,
            generated_at: self.generated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub url: String,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting,
    CoolingDown,
    Error,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
    pub visible: bool,
}

impl Default for Toast {
    fn default() -> Self {
        Self { message: String::new(), kind: ToastKind::Success, visible: false }
    }
}

/// Everything a front end needs to render one form session.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub state: SubmissionState,
    pub loading: bool,
    pub submit_enabled: bool,
    pub button_label: String,
    pub countdown: Option<u32>,
    pub countdown_label: Option<String>,
    pub form: AvatarRequest,
    pub errors: FieldErrors,
    pub toast: Toast,
    pub image: Option<ImageInfo>,
    pub last_prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PromptPreview {
    pub prompt: String,
}
