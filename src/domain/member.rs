use super::ids::{FellowshipId, UserId};
use serde::{Deserialize, Serialize};

/// A known person in a fellowship, as supplied by the member directory.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Member {
    pub id: UserId,
    pub fellowship_id: FellowshipId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Outcome of matching an external payer to a member.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub enum PayerMatch {
    Matched(UserId),
    Unmatched,
    /// Several members fit equally well; nobody is credited.
    Ambiguous(Vec<UserId>),
}

impl PayerMatch {
    pub fn member_id(&self) -> Option<UserId> {
        match self {
            Self::Matched(id) => Some(*id),
            Self::Unmatched | Self::Ambiguous(_) => None,
        }
    }
}

fn normalize_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Digits only, with a leading country code `234` folded to the local `0` prefix.
fn normalize_phone(value: &str) -> String {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.strip_prefix("234") {
        Some(rest) if rest.len() == 10 => format!("0{rest}"),
        _ => digits,
    }
}

fn decide(candidates: Vec<UserId>) -> Option<PayerMatch> {
    match candidates.as_slice() {
        [] => None,
        [only] => Some(PayerMatch::Matched(*only)),
        _ => Some(PayerMatch::Ambiguous(candidates)),
    }
}

/// Matches a payer by normalized-exact phone first, then normalized-exact name or email.
///
/// Substring matching is never used: "Jo" must not land on "Joanna".
pub fn match_payer(members: &[Member], payer_name: &str, payer_phone: Option<&str>) -> PayerMatch {
    if let Some(phone) = payer_phone.map(normalize_phone).filter(|p| !p.is_empty()) {
        let by_phone = members
            .iter()
            .filter(|m| m.phone.as_deref().map(normalize_phone).as_deref() == Some(phone.as_str()))
            .map(|m| m.id)
            .collect();
        if let Some(found) = decide(by_phone) {
            return found;
        }
    }

    let name = normalize_text(payer_name);
    if name.is_empty() {
        return PayerMatch::Unmatched;
    }
    let by_name = members
        .iter()
        .filter(|m| {
            normalize_text(&m.name) == name
                || m.email.as_deref().map(normalize_text).as_deref() == Some(name.as_str())
        })
        .map(|m| m.id)
        .collect();
    decide(by_name).unwrap_or(PayerMatch::Unmatched)
}
