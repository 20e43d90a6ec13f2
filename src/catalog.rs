// src/catalog.rs
//! Model catalog, bundled floral patterns, and the pattern API's JSON shapes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StudioError};

pub const DEFAULT_PATTERN_BASE_URL: &str = "https://terratechpacks.com/App_3D/Patterns/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub src: String,
}

impl ModelEntry {
    pub fn new(name: &str, src: &str) -> Self {
        Self {
            name: name.to_string(),
            src: src.to_string(),
        }
    }

    pub fn export_file_stem(&self) -> String {
        export_file_stem(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub id: String,
    pub label: String,
    pub src: String,
}

pub fn default_models() -> Vec<ModelEntry> {
    [
        ("120ml Round Container", "/assets/terra_tech_models/logo_120 ml round.glb"),
        ("500ml Round Container", "/assets/terra_tech_models/logo_500ml round container.glb"),
        ("500gms/450ml Container", "/assets/terra_tech_models/logo_500gms450ml container.glb"),
        (
            "500ml Rectangular Container",
            "/assets/terra_tech_models/logo_500ml rectangular container .glb",
        ),
        ("250gms Sweet Box", "/assets/terra_tech_models/logo_250 gms sweet.glb"),
        ("250gms Sweet BoxTE", "/assets/terra_tech_models/logo_250_gms_te_sb.glb"),
    ]
    .into_iter()
    .map(|(name, src)| ModelEntry::new(name, src))
    .collect()
}

pub fn default_patterns() -> Vec<PatternEntry> {
    (1..=6)
        .map(|n| PatternEntry {
            id: format!("f{n}"),
            label: format!("Floral {n}"),
            src: format!("/assets/pattern/pattern-{n}.webp"),
        })
        .collect()
}

/// File name for exported images: every whitespace run becomes `_`.
pub fn export_file_stem(model_name: &str) -> String {
    let mut out = String::with_capacity(model_name.len());
    let mut in_space = false;
    for ch in model_name.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

// ---------- API envelope ----------

#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope {
    Status {
        status: String,
        #[serde(default)]
        data: Value,
        #[serde(default)]
        message: Option<String>,
    },
    Success {
        success: bool,
        #[serde(default)]
        data: Value,
        #[serde(default)]
        message: Option<String>,
    },
}

/// Either server reply shape, normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub ok: bool,
    pub data: Value,
    pub message: Option<String>,
}

impl ApiResponse {
    pub fn parse(body: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(body)
            .map_err(|e| StudioError::Api(format!("unrecognized response: {e}")))?;
        Ok(match envelope {
            Envelope::Status {
                status,
                data,
                message,
            } => Self {
                ok: status.eq_ignore_ascii_case("success"),
                data,
                message,
            },
            Envelope::Success {
                success,
                data,
                message,
            } => Self {
                ok: success,
                data,
                message,
            },
        })
    }

    /// `data` as `T`, or `Api` carrying the server message on failure.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T> {
        if !self.ok {
            return Err(StudioError::Api(
                self.message.unwrap_or_else(|| "request failed".into()),
            ));
        }
        serde_json::from_value(self.data).map_err(Into::into)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(u64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PatternRecord {
    pub id: RecordId,
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub pattern_url: String,
}

impl PatternRecord {
    /// Served image location; the stored file name is percent-encoded.
    pub fn image_url(&self, base: &str) -> String {
        let sep = if base.ends_with('/') { "" } else { "/" };
        format!("{base}{sep}{}", urlencoding::encode(&self.pattern_url))
    }
}

/// Decode a pattern listing reply.
pub fn parse_pattern_list(body: &str) -> Result<Vec<PatternRecord>> {
    ApiResponse::parse(body)?.into_data()
}
