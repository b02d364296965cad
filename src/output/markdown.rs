use chrono::{DateTime, Utc};

use crate::assemble::{AssembledCall, UNKNOWN_CLIENT};
use crate::models::{Affiliation, Participant};

/// Convert text to a URL-friendly slug.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_matches('-').to_string()
}

/// Format milliseconds as [HH:MM:SS], or [MM:SS] under an hour.
pub fn format_timestamp(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("[{hours:02}:{minutes:02}:{seconds:02}]")
    } else {
        format!("[{minutes:02}:{seconds:02}]")
    }
}

/// Format a duration in seconds in a human-readable way.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;

    if hours > 0 {
        format!("{hours}h {minutes}min")
    } else {
        format!("{minutes} min")
    }
}

fn format_participant(participant: &Participant) -> String {
    let name = participant
        .name
        .as_deref()
        .or(participant.email_address.as_deref())
        .unwrap_or("Unknown");
    let affiliation = match participant.affiliation {
        Some(Affiliation::Internal) => "Internal",
        _ => "External",
    };

    let mut line = format!("{name} ({affiliation})");
    if let Some(title) = &participant.title {
        line.push_str(&format!(" - {title}"));
    }
    line
}

/// Render one assembled call as a markdown document with YAML frontmatter.
pub fn call_to_markdown(call: &AssembledCall) -> String {
    let mut lines: Vec<String> = Vec::new();
    let meta = &call.metadata;

    lines.push("---".to_string());
    lines.push(format!("call_id: {}", meta.id));
    if let Some(started) = meta.started {
        lines.push(format!("date: {}", started.to_rfc3339()));
    }
    if let Some(duration) = meta.duration {
        lines.push(format!("duration_seconds: {duration}"));
    }
    if let Some(title) = &meta.title {
        lines.push(format!("title: \"{}\"", title.replace('"', "\\\"")));
    }
    if call.client_name != UNKNOWN_CLIENT {
        lines.push(format!("client: {}", call.client_name));
    }
    if let Some(url) = &meta.url {
        lines.push(format!("call_url: {url}"));
    }
    if let Some(scope) = &meta.scope {
        lines.push(format!("scope: {scope}"));
    }
    if let Some(system) = &meta.system {
        lines.push(format!("system: {system}"));
    }

    let internal_emails: Vec<&str> = call
        .internal_participants()
        .filter_map(|p| p.email_address.as_deref())
        .collect();
    let external_emails: Vec<&str> = call
        .external_participants()
        .filter_map(|p| p.email_address.as_deref())
        .collect();
    if !internal_emails.is_empty() {
        lines.push(format!("internal_participants: {internal_emails:?}"));
    }
    if !external_emails.is_empty() {
        lines.push(format!("external_participants: {external_emails:?}"));
    }

    lines.push("---".to_string());
    lines.push(String::new());

    let title = meta.title.as_deref().unwrap_or("Untitled Call");
    lines.push(format!("# {title}"));
    lines.push(String::new());

    if let Some(started) = meta.started {
        lines.push(format!("**Date:** {}", started.format("%Y-%m-%d %H:%M")));
    }
    if let Some(duration) = meta.duration {
        lines.push(format!("**Duration:** {}", format_duration(duration)));
    }

    if !call.parties.is_empty() {
        lines.push(String::new());
        lines.push("**Participants:**".to_string());
        for participant in call.internal_participants() {
            lines.push(format!("- {}", format_participant(participant)));
        }
        for participant in call.external_participants() {
            lines.push(format!("- {}", format_participant(participant)));
        }
    }

    let mut meta_parts = Vec::new();
    if let Some(system) = &meta.system {
        meta_parts.push(format!("**System:** {system}"));
    }
    if let Some(scope) = &meta.scope {
        meta_parts.push(format!("**Type:** {scope}"));
    }
    if let Some(media) = &meta.media {
        meta_parts.push(format!("**Media:** {media}"));
    }
    if !meta_parts.is_empty() {
        lines.push(String::new());
        lines.push(meta_parts.join(" | "));
    }

    if let Some(url) = &meta.url {
        lines.push(String::new());
        lines.push(format!("[View recording]({url})"));
    }

    if !call.segments.is_empty() {
        lines.push(String::new());
        lines.push("---".to_string());
        lines.push(String::new());
        lines.push("## Transcript".to_string());
        lines.push(String::new());

        for segment in &call.segments {
            let speaker = if segment.speaker.affiliation == Affiliation::External {
                format!("{} (Client)", segment.speaker.name)
            } else {
                segment.speaker.name.clone()
            };

            for sentence in &segment.sentences {
                lines.push(format!(
                    "**{} {speaker}:**",
                    format_timestamp(sentence.start_ms)
                ));
                lines.push(sentence.text.clone());
                lines.push(String::new());
            }
        }
    }

    lines.join("\n")
}

/// Filename for a call document: YYYY-MM-DD-<title-slug>.md.
pub fn generate_filename(call: &AssembledCall) -> String {
    let date_prefix = match call.metadata.started {
        Some(started) => started.format("%Y-%m-%d").to_string(),
        None => "unknown-date".to_string(),
    };

    let title = call.metadata.title.as_deref().unwrap_or(&call.metadata.id);
    let mut slug = slugify(title);
    let mut cut = slug.len().min(50);
    while !slug.is_char_boundary(cut) {
        cut -= 1;
    }
    slug.truncate(cut);

    format!("{date_prefix}-{}.md", slug.trim_end_matches('-'))
}

/// Destination folder for a call, derived from the resolved client name.
pub fn client_folder(call: &AssembledCall) -> String {
    slugify(&call.client_name)
}

/// One row of a client's call index.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub started: Option<DateTime<Utc>>,
    pub title: String,
    pub duration: Option<u64>,
    pub participants: usize,
    pub filename: String,
}

impl IndexEntry {
    pub fn for_call(call: &AssembledCall) -> Self {
        Self {
            started: call.metadata.started,
            title: call
                .metadata
                .title
                .clone()
                .unwrap_or_else(|| "Untitled".to_string()),
            duration: call.metadata.duration,
            participants: call.parties.len(),
            filename: generate_filename(call),
        }
    }
}

/// Render a client's index page, newest calls first.
pub fn client_index(client_name: &str, entries: &[IndexEntry]) -> String {
    let mut sorted: Vec<&IndexEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| std::cmp::Reverse(e.started));

    let mut lines = vec![
        format!("# {client_name} - Call History"),
        String::new(),
        format!("Total calls: {}", entries.len()),
        String::new(),
        "## Calls".to_string(),
        String::new(),
        "| Date | Title | Duration | Participants |".to_string(),
        "|------|-------|----------|--------------|".to_string(),
    ];

    for entry in sorted {
        let date = entry
            .started
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let duration = entry
            .duration
            .map(format_duration)
            .unwrap_or_else(|| "N/A".to_string());
        lines.push(format!(
            "| {date} | [{}](./{}) | {duration} | {} |",
            entry.title, entry.filename, entry.participants
        ));
    }

    lines.join("\n")
}
