use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the house a participant belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Affiliation {
    Internal,
    External,
    Unknown,
}

impl Affiliation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Affiliation::Internal => "Internal",
            Affiliation::External => "External",
            Affiliation::Unknown => "Unknown",
        }
    }
}

/// A participant in a call, as returned by the extensive endpoint.
///
/// `speaker_id` is only unique within a single call's participant set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub speaker_id: Option<String>,
    #[serde(default)]
    pub affiliation: Option<Affiliation>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Metadata for one call. Immutable once fetched; `id` is the join key
/// across the independently-fetched facets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMetadata {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub scheduled: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started: Option<DateTime<Utc>>,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub media: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub primary_user_id: Option<String>,
}

/// One sentence of transcript. The API has emitted both `startMs`/`endMs`
/// and `start`/`end` over time, so both spellings are accepted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Sentence {
    #[serde(rename = "startMs", alias = "start")]
    pub start_ms: u64,
    #[serde(rename = "endMs", alias = "end")]
    pub end_ms: u64,
    pub text: String,
}

/// A run of consecutive sentences from one speaker.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    pub speaker_id: String,
    pub sentences: Vec<Sentence>,
}

/// The transcript facet for one call.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallTranscript {
    pub call_id: String,
    pub transcript: Vec<TranscriptSegment>,
}

/// CRM context attached to a call (e.g. a linked Salesforce account).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallContext {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub objects: Vec<ContextObject>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextObject {
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub fields: Vec<ContextField>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextField {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

/// The extensive-endpoint facet: full metadata, participants, CRM context.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensiveCall {
    #[serde(rename = "metaData")]
    pub metadata: CallMetadata,
    #[serde(default)]
    pub parties: Vec<Participant>,
    #[serde(default)]
    pub context: Vec<CallContext>,
}

impl ExtensiveCall {
    /// Account name from CRM context, if one is attached.
    pub fn crm_account_name(&self) -> Option<String> {
        crm_account_name(&self.context)
    }
}

/// Walk CRM context entries for a Salesforce Account name.
pub fn crm_account_name(context: &[CallContext]) -> Option<String> {
    for ctx in context {
        if ctx.system.as_deref() != Some("Salesforce") {
            continue;
        }
        for obj in &ctx.objects {
            if obj.object_type.as_deref() != Some("Account") {
                continue;
            }
            for field in &obj.fields {
                if field.name.as_deref() == Some("Name") {
                    if let Some(value) = field.value.as_ref().and_then(|v| v.as_str()) {
                        if !value.is_empty() {
                            return Some(value.to_string());
                        }
                    }
                }
            }
        }
    }
    None
}
