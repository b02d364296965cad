use std::fmt;

use tracing::debug;

use crate::models::{
    Affiliation, CallMetadata, CallTranscript, ExtensiveCall, Participant, Sentence, UserDirectory,
};

/// Placeholder name for a speaker id that resolves nowhere.
pub const UNKNOWN_SPEAKER: &str = "Unknown";

/// Client name used when neither CRM context nor participant domains yield one.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// A transcript speaker resolved to a display name and affiliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerIdentity {
    pub name: String,
    pub affiliation: Affiliation,
}

impl SpeakerIdentity {
    fn unknown() -> Self {
        Self {
            name: UNKNOWN_SPEAKER.to_string(),
            affiliation: Affiliation::Unknown,
        }
    }
}

/// A transcript segment with its speaker resolved.
#[derive(Debug, Clone)]
pub struct ResolvedSegment {
    pub speaker: SpeakerIdentity,
    pub sentences: Vec<Sentence>,
}

/// Data-integrity notes recorded during assembly. Non-fatal; the call is
/// still emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataFlag {
    /// No transcript was available for this call (e.g. not yet transcribed).
    MissingTranscript,
    /// A segment's speaker id matched neither the participant set nor the
    /// user directory.
    UnresolvedSpeaker(String),
    /// No client name could be derived from CRM context or participants.
    MissingClientName,
}

impl fmt::Display for DataFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFlag::MissingTranscript => write!(f, "no transcript available"),
            DataFlag::UnresolvedSpeaker(id) => write!(f, "unresolved speaker id {id}"),
            DataFlag::MissingClientName => write!(f, "client name unknown"),
        }
    }
}

/// One call joined from its three independently-fetched facets, with every
/// transcript line attributed to a named speaker.
#[derive(Debug, Clone)]
pub struct AssembledCall {
    pub metadata: CallMetadata,
    pub parties: Vec<Participant>,
    pub client_name: String,
    pub segments: Vec<ResolvedSegment>,
    pub flags: Vec<DataFlag>,
}

impl AssembledCall {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn internal_participants(&self) -> impl Iterator<Item = &Participant> {
        self.parties
            .iter()
            .filter(|p| p.affiliation == Some(Affiliation::Internal))
    }

    pub fn external_participants(&self) -> impl Iterator<Item = &Participant> {
        self.parties
            .iter()
            .filter(|p| p.affiliation == Some(Affiliation::External))
    }

    /// True when assembly recorded any data-integrity flag.
    pub fn is_flagged(&self) -> bool {
        !self.flags.is_empty()
    }
}

/// Join one call's facets and resolve each segment's speaker.
///
/// The facets share nothing but the call id; this is an explicit
/// map-by-key merge, and a missing transcript is a flag, not an error.
pub fn assemble_call(
    extensive: ExtensiveCall,
    transcript: Option<CallTranscript>,
    directory: &UserDirectory,
) -> AssembledCall {
    let ExtensiveCall {
        metadata,
        parties,
        context,
    } = extensive;
    let mut flags = Vec::new();

    let client_name = match resolve_client_name(&context, &parties) {
        Some(name) => name,
        None => {
            flags.push(DataFlag::MissingClientName);
            UNKNOWN_CLIENT.to_string()
        }
    };

    let segments = match transcript {
        Some(transcript) => transcript
            .transcript
            .into_iter()
            .map(|segment| {
                let speaker = match resolve_speaker(&segment.speaker_id, &parties, directory) {
                    Some(identity) => identity,
                    None => {
                        debug!(
                            "Call {}: speaker id {} resolved nowhere",
                            metadata.id, segment.speaker_id
                        );
                        if !flags.contains(&DataFlag::UnresolvedSpeaker(segment.speaker_id.clone()))
                        {
                            flags.push(DataFlag::UnresolvedSpeaker(segment.speaker_id.clone()));
                        }
                        SpeakerIdentity::unknown()
                    }
                };
                ResolvedSegment {
                    speaker,
                    sentences: segment.sentences,
                }
            })
            .collect(),
        None => {
            flags.push(DataFlag::MissingTranscript);
            Vec::new()
        }
    };

    AssembledCall {
        metadata,
        parties,
        client_name,
        segments,
        flags,
    }
}

/// Map a raw speaker id to a name and affiliation.
///
/// Participant set first; then the user directory, for internal users whose
/// names were not echoed in the extensive data for this call.
fn resolve_speaker(
    speaker_id: &str,
    parties: &[Participant],
    directory: &UserDirectory,
) -> Option<SpeakerIdentity> {
    if let Some(party) = parties
        .iter()
        .find(|p| p.speaker_id.as_deref() == Some(speaker_id))
    {
        if let Some(name) = party.name.clone().or_else(|| party.email_address.clone()) {
            return Some(SpeakerIdentity {
                name,
                affiliation: party.affiliation.unwrap_or(Affiliation::Unknown),
            });
        }
    }

    directory.get(speaker_id).map(|user| SpeakerIdentity {
        name: user.full_name(),
        affiliation: Affiliation::Internal,
    })
}

/// Fixed client-name policy: CRM account context, then the first external
/// participant's email domain, then unknown.
fn resolve_client_name(
    context: &[crate::models::CallContext],
    parties: &[Participant],
) -> Option<String> {
    if let Some(name) = crate::models::crm_account_name(context) {
        return Some(name);
    }

    parties
        .iter()
        .filter(|p| p.affiliation == Some(Affiliation::External))
        .filter_map(|p| p.email_address.as_deref())
        .filter_map(domain_label)
        .next()
}

/// "jane@acme.com" -> "Acme".
fn domain_label(email: &str) -> Option<String> {
    let domain = email.rsplit('@').next()?;
    let label = domain.split('.').next()?;
    if label.is_empty() {
        return None;
    }
    let mut chars = label.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().collect::<String>() + chars.as_str())
}

#[cfg(test)]
mod tests {
    use crate::models::{CallContext, ContextField, ContextObject, TranscriptSegment, User};

    use super::*;

    fn metadata(id: &str) -> CallMetadata {
        serde_json::from_value(serde_json::json!({"id": id, "title": "Demo"})).unwrap()
    }

    fn participant(speaker_id: &str, name: Option<&str>, email: Option<&str>, aff: Affiliation) -> Participant {
        Participant {
            id: format!("party-{speaker_id}"),
            email_address: email.map(String::from),
            name: name.map(String::from),
            title: None,
            speaker_id: Some(speaker_id.to_string()),
            affiliation: Some(aff),
            user_id: None,
        }
    }

    fn segment(speaker_id: &str, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            speaker_id: speaker_id.to_string(),
            sentences: vec![Sentence {
                start_ms: 0,
                end_ms: 1000,
                text: text.to_string(),
            }],
        }
    }

    fn transcript(call_id: &str, segments: Vec<TranscriptSegment>) -> CallTranscript {
        CallTranscript {
            call_id: call_id.to_string(),
            transcript: segments,
        }
    }

    fn extensive(id: &str, parties: Vec<Participant>) -> ExtensiveCall {
        ExtensiveCall {
            metadata: metadata(id),
            parties,
            context: Vec::new(),
        }
    }

    fn salesforce_context(account: &str) -> CallContext {
        CallContext {
            system: Some("Salesforce".to_string()),
            objects: vec![ContextObject {
                object_type: Some("Account".to_string()),
                fields: vec![ContextField {
                    name: Some("Name".to_string()),
                    value: Some(serde_json::Value::String(account.to_string())),
                }],
            }],
        }
    }

    fn directory() -> UserDirectory {
        UserDirectory::new(vec![User {
            id: "user-9".to_string(),
            email_address: "mary@company.com".to_string(),
            first_name: Some("Mary".to_string()),
            last_name: Some("Major".to_string()),
            active: true,
        }])
    }

    #[test]
    fn test_speaker_resolved_from_participants() {
        let ext = extensive(
            "c1",
            vec![
                participant("spk-1", Some("John Doe"), None, Affiliation::Internal),
                participant("spk-2", Some("Jane Smith"), Some("jane@acme.com"), Affiliation::External),
            ],
        );
        let tr = transcript("c1", vec![segment("spk-1", "Hi"), segment("spk-2", "Hello")]);

        let call = assemble_call(ext, Some(tr), &UserDirectory::default());
        assert_eq!(call.segments[0].speaker.name, "John Doe");
        assert_eq!(call.segments[0].speaker.affiliation, Affiliation::Internal);
        assert_eq!(call.segments[1].speaker.name, "Jane Smith");
        assert_eq!(call.segments[1].speaker.affiliation, Affiliation::External);
        assert!(!call.flags.contains(&DataFlag::MissingTranscript));
    }

    #[test]
    fn test_speaker_falls_back_to_user_directory() {
        let ext = extensive("c1", vec![]);
        let tr = transcript("c1", vec![segment("user-9", "Status update")]);

        let call = assemble_call(ext, Some(tr), &directory());
        assert_eq!(call.segments[0].speaker.name, "Mary Major");
        assert_eq!(call.segments[0].speaker.affiliation, Affiliation::Internal);
        assert!(!call.flags.iter().any(|f| matches!(f, DataFlag::UnresolvedSpeaker(_))));
    }

    #[test]
    fn test_unresolved_speaker_gets_placeholder_and_flag() {
        let ext = extensive("c1", vec![]);
        let tr = transcript(
            "c1",
            vec![segment("spk-mystery", "Who am I"), segment("spk-mystery", "Still me")],
        );

        let call = assemble_call(ext, Some(tr), &UserDirectory::default());
        assert_eq!(call.segments[0].speaker.name, UNKNOWN_SPEAKER);
        assert_eq!(call.segments[0].speaker.affiliation, Affiliation::Unknown);
        // Same unresolved id is flagged once.
        let unresolved: Vec<_> = call
            .flags
            .iter()
            .filter(|f| matches!(f, DataFlag::UnresolvedSpeaker(_)))
            .collect();
        assert_eq!(unresolved.len(), 1);
    }

    #[test]
    fn test_participant_without_name_uses_email() {
        let ext = extensive(
            "c1",
            vec![participant("spk-1", None, Some("anon@acme.com"), Affiliation::External)],
        );
        let tr = transcript("c1", vec![segment("spk-1", "Hi")]);

        let call = assemble_call(ext, Some(tr), &UserDirectory::default());
        assert_eq!(call.segments[0].speaker.name, "anon@acme.com");
    }

    #[test]
    fn test_client_name_prefers_crm_context() {
        let mut ext = extensive(
            "c1",
            vec![participant("spk-2", Some("Jane"), Some("jane@acme.com"), Affiliation::External)],
        );
        ext.context = vec![salesforce_context("Acme Corporation")];

        let call = assemble_call(ext, None, &UserDirectory::default());
        assert_eq!(call.client_name, "Acme Corporation");
    }

    #[test]
    fn test_client_name_from_external_email_domain() {
        let ext = extensive(
            "c1",
            vec![
                participant("spk-1", Some("John"), Some("john@company.com"), Affiliation::Internal),
                participant("spk-2", Some("Jane"), Some("jane@acme.com"), Affiliation::External),
            ],
        );

        let call = assemble_call(ext, None, &UserDirectory::default());
        assert_eq!(call.client_name, "Acme");
    }

    #[test]
    fn test_client_name_unknown_when_unresolvable() {
        let ext = extensive(
            "c1",
            vec![participant("spk-1", Some("John"), Some("john@company.com"), Affiliation::Internal)],
        );

        let call = assemble_call(ext, None, &UserDirectory::default());
        assert_eq!(call.client_name, UNKNOWN_CLIENT);
        assert!(call.flags.contains(&DataFlag::MissingClientName));
    }

    #[test]
    fn test_transcriptless_call_is_emitted_flagged() {
        let ext = extensive("c1", vec![participant("spk-2", Some("Jane"), Some("jane@acme.com"), Affiliation::External)]);

        let call = assemble_call(ext, None, &UserDirectory::default());
        assert!(call.segments.is_empty());
        assert!(call.flags.contains(&DataFlag::MissingTranscript));
        assert!(call.is_flagged());
    }

    #[test]
    fn test_participant_filters() {
        let ext = extensive(
            "c1",
            vec![
                participant("spk-1", Some("John"), None, Affiliation::Internal),
                participant("spk-2", Some("Jane"), Some("jane@acme.com"), Affiliation::External),
                participant("spk-3", Some("Max"), None, Affiliation::Internal),
            ],
        );

        let call = assemble_call(ext, None, &UserDirectory::default());
        assert_eq!(call.internal_participants().count(), 2);
        assert_eq!(call.external_participants().count(), 1);
    }

    #[test]
    fn test_domain_label() {
        assert_eq!(domain_label("jane@acme.com").as_deref(), Some("Acme"));
        assert_eq!(domain_label("x@big-co.io").as_deref(), Some("Big-co"));
        assert_eq!(domain_label("nodomain"), Some("Nodomain".to_string()));
    }
}
