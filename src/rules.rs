//! Status rule table: the single authority mapping clinical event labels
//! (treatment types, appointment types, diagnosis text) to a canonical
//! tooth status and its display color.
//!
//! No other module may carry a color literal. The color-integrity pass
//! repairs any stored color that disagrees with `color_for`.

use serde::Serialize;

use crate::models::enums::ToothStatus;

/// How a label matched the rule table. Surfaced in the linkage audit so
/// fuzzy matches can be reviewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchKind {
    Exact,
    Substring,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Substring => "substring",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMatch {
    pub status: ToothStatus,
    pub color: &'static str,
    pub match_kind: MatchKind,
}

/// Authoritative status → display color mapping.
pub fn color_for(status: ToothStatus) -> &'static str {
    match status {
        ToothStatus::Healthy => "#22c55e",
        ToothStatus::Caries => "#ef4444",
        ToothStatus::Filled => "#3b82f6",
        ToothStatus::Crown => "#eab308",
        ToothStatus::RootCanal => "#8b5cf6",
        ToothStatus::Implant => "#06b6d4",
        ToothStatus::Attention => "#f97316",
        ToothStatus::ExtractionNeeded => "#dc2626",
        ToothStatus::Missing => "#6b7280",
    }
}

/// Known event labels. Matching is exact first, then substring with the
/// longest keys tried first so "root canal retreatment" never lands on a
/// shorter, wrong key.
const RULES: &[(&str, ToothStatus)] = &[
    ("root canal treatment", ToothStatus::RootCanal),
    ("root canal", ToothStatus::RootCanal),
    ("endodontic treatment", ToothStatus::RootCanal),
    ("composite filling", ToothStatus::Filled),
    ("amalgam filling", ToothStatus::Filled),
    ("filling", ToothStatus::Filled),
    ("restoration", ToothStatus::Filled),
    ("crown placement", ToothStatus::Crown),
    ("crown", ToothStatus::Crown),
    ("bridge", ToothStatus::Crown),
    ("implant placement", ToothStatus::Implant),
    ("implant", ToothStatus::Implant),
    ("extraction", ToothStatus::Missing),
    ("tooth removal", ToothStatus::Missing),
    ("extraction needed", ToothStatus::ExtractionNeeded),
    ("teeth cleaning", ToothStatus::Healthy),
    ("cleaning", ToothStatus::Healthy),
    ("scaling", ToothStatus::Healthy),
    ("polishing", ToothStatus::Healthy),
    ("fluoride", ToothStatus::Healthy),
    ("caries", ToothStatus::Caries),
    ("cavity", ToothStatus::Caries),
    ("decay", ToothStatus::Caries),
    ("follow up", ToothStatus::Attention),
    ("follow_up", ToothStatus::Attention),
    ("observation", ToothStatus::Attention),
];

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Resolve an event label to a status + color, or None if nothing in the
/// rule table applies (the event is then ignored, not an error).
/// Deterministic, no side effects, no I/O.
pub fn resolve_event(label: &str) -> Option<RuleMatch> {
    let normalized = normalize(label);
    if normalized.is_empty() {
        return None;
    }

    for (key, status) in RULES {
        if *key == normalized {
            return Some(RuleMatch {
                status: *status,
                color: color_for(*status),
                match_kind: MatchKind::Exact,
            });
        }
    }

    // Longest key first so a broad key never shadows a more specific one.
    let mut keys: Vec<&(&str, ToothStatus)> = RULES.iter().collect();
    keys.sort_by_key(|(key, _)| std::cmp::Reverse(key.len()));

    for (key, status) in keys {
        if normalized.contains(key) {
            return Some(RuleMatch {
                status: *status,
                color: color_for(*status),
                match_kind: MatchKind::Substring,
            });
        }
    }

    None
}

/// Whether an appointment type denotes an actual procedure. Follow-up
/// and observation visits match the rule table (they set a status) but
/// are not procedures, so the treatment overview must not synthesize
/// pseudo-treatments for them.
pub fn is_treatment_like(label: &str) -> bool {
    matches!(resolve_event(label), Some(m) if m.status != ToothStatus::Attention)
}
