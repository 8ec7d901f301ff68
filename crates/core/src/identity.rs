use serde::{Deserialize, Serialize};

pub const FALLBACK_DISPLAY_NAME: &str = "User";

/// Raw identity fields as reported by the chat platform. Any of them may be
/// absent or blank.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub real_name: Option<String>,
    pub display_name: Option<String>,
    pub handle: Option<String>,
    pub email: Option<String>,
}

/// Which profile field produced the resolved name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NameSource {
    FirstAndLast,
    RealName,
    DisplayName,
    FirstNameOnly,
    Handle,
    Fallback,
}

/// Identity consumed by the prompt builder. `display_name` is never empty;
/// an empty `email` means the organizer is unknown.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserContext {
    pub display_name: String,
    pub email: String,
}

impl UserContext {
    pub fn new(display_name: impl Into<String>, email: impl Into<String>) -> Self {
        let display_name = collapse_whitespace(&display_name.into());
        Self {
            display_name: if display_name.is_empty() {
                FALLBACK_DISPLAY_NAME.to_owned()
            } else {
                display_name
            },
            email: email.into().trim().to_owned(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(FALLBACK_DISPLAY_NAME, "")
    }

    pub fn organizer_known(&self) -> bool {
        !self.email.is_empty()
    }

    /// Email reduced to a short prefix for log lines.
    pub fn redacted_email(&self) -> String {
        if self.email.is_empty() {
            return "none".to_owned();
        }
        let prefix: String = self.email.chars().take(3).collect();
        format!("{prefix}***")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub context: UserContext,
    pub name_source: NameSource,
}

/// Picks a full name by fixed precedence: first+last, real name, display
/// name, first name alone, handle, then the generic placeholder. The email is
/// carried through as-is (empty when absent).
pub fn resolve_user_context(profile: &UserProfile) -> ResolvedIdentity {
    let first = non_blank(profile.first_name.as_deref());
    let last = non_blank(profile.last_name.as_deref());

    let (name, name_source) = if let (Some(first), Some(last)) = (first, last) {
        (format!("{first} {last}"), NameSource::FirstAndLast)
    } else if let Some(real_name) = non_blank(profile.real_name.as_deref()) {
        (real_name.to_owned(), NameSource::RealName)
    } else if let Some(display_name) = non_blank(profile.display_name.as_deref()) {
        (display_name.to_owned(), NameSource::DisplayName)
    } else if let Some(first) = first {
        (first.to_owned(), NameSource::FirstNameOnly)
    } else if let Some(handle) = non_blank(profile.handle.as_deref()) {
        (handle.trim_start_matches('@').to_owned(), NameSource::Handle)
    } else {
        (FALLBACK_DISPLAY_NAME.to_owned(), NameSource::Fallback)
    };

    let email = non_blank(profile.email.as_deref()).unwrap_or_default();
    ResolvedIdentity { context: UserContext::new(name, email), name_source }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
