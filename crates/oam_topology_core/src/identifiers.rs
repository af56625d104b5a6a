//! Declaration identifiers.
//!
//! Every declared resource is keyed by an identifier that must start with an
//! uppercase ASCII letter and contain only ASCII letters and digits
//! (`^[A-Z][A-Za-z0-9]*$`). Identifiers are built from segments such as
//! `["Source A", "Link", "us-east-1"]`: each segment is split on anything
//! that is not alphanumeric, each word gets an uppercase first letter, and
//! the words are concatenated (`SourceALinkUsEast1`).

use crate::contract::ValidationError;

pub const MONITORING_SEGMENT: &str = "Monitoring";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Provider,
    Sink,
    SinkPolicy,
    Link,
}

impl DeclarationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provider => "Provider",
            Self::Sink => "Sink",
            Self::SinkPolicy => "SinkPolicy",
            Self::Link => "Link",
        }
    }
}

pub fn is_valid_declaration_id(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => chars.all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}

pub fn declaration_id(segments: &[&str]) -> Result<String, ValidationError> {
    let mut identifier = String::new();
    for segment in segments {
        for word in segment
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                identifier.push(first.to_ascii_uppercase());
                identifier.extend(chars);
            }
        }
    }

    if !is_valid_declaration_id(&identifier) {
        return Err(ValidationError::new(format!(
            "Declaration identifier '{identifier}' built from {segments:?} must start with an uppercase letter and contain only letters and digits"
        )));
    }
    Ok(identifier)
}

/// `<owner><Kind><Region>`, e.g. `MonitoringSinkUsEast1`.
pub fn resource_declaration_id(
    owner: &str,
    kind: DeclarationKind,
    region: &str,
) -> Result<String, ValidationError> {
    declaration_id(&[owner, kind.as_str(), region])
}

/// Cloud-side name derived from a declaration id: first letter lowercased.
pub fn cloud_resource_name(declaration_id: &str) -> String {
    let mut chars = declaration_id.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

pub fn assume_role_arn(account_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{account_id}:role/{role_name}")
}
