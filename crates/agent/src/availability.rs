//! User-facing explanations of why capabilities are missing.

use concierge_core::{SourceId, SourceKey};

/// Display metadata for one capability source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceProfile {
    pub id: SourceId,
    pub label: String,
    /// Lowercase words in a request that imply this source is needed.
    pub keywords: Vec<String>,
}

impl SourceProfile {
    pub fn new(id: SourceId, label: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            id,
            label: label.into(),
            keywords: keywords.iter().map(|keyword| keyword.to_string()).collect(),
        }
    }

    pub fn for_key(key: SourceKey) -> Self {
        match key {
            SourceKey::HotelTools => Self::new(
                key.id(),
                "Hotel Search & Pricing Service",
                &["search", "find", "price", "hotel"],
            ),
            SourceKey::Booking => Self::new(key.id(), "Hotel Booking Service", &["book", "reserve"]),
            SourceKey::LiveSearch => {
                Self::new(key.id(), "Live Hotel Search", &["live", "real", "actual"])
            }
        }
    }

    pub fn matches(&self, intent_lower: &str) -> bool {
        self.keywords.iter().any(|keyword| intent_lower.contains(keyword.as_str()))
    }
}

/// An enabled source that currently contributes nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnavailableSource<'a> {
    pub profile: &'a SourceProfile,
    pub address: &'a str,
    pub reason: Option<&'a str>,
}

pub(crate) fn render_unavailable_message(intent: &str, unavailable: &[UnavailableSource<'_>]) -> String {
    let intent = intent.to_lowercase();
    let mut message = String::from("I'm sorry, but I can't help with that right now.\n\n");

    let mut sections = 0;
    for source in unavailable.iter().filter(|source| source.profile.matches(&intent)) {
        message.push_str(&format!("**{}**\n", source.profile.label));
        message.push_str("   Status: Unavailable\n");
        message.push_str(&format!("   Address: {}\n", source.address));
        if let Some(reason) = source.reason {
            message.push_str(&format!("   Reason: {reason}\n"));
        }
        message.push('\n');
        sections += 1;
    }

    if sections == 0 {
        message.push_str(&combined_status(unavailable));
    }

    message.push_str("\n**What you can do:**\n");
    message.push_str("1. Wait a moment - the system is trying to reconnect automatically\n");
    message.push_str("2. Check if the backend services are running\n");
    message.push_str("3. Try your request again in a few seconds\n");
    message
}

fn combined_status(unavailable: &[UnavailableSource<'_>]) -> String {
    if unavailable.is_empty() {
        return "All services are currently available.\n".to_string();
    }

    let mut status = String::new();
    for source in unavailable {
        status.push_str(&format!("**{} is unavailable** ({})\n", source.profile.label, source.address));
        if let Some(reason) = source.reason {
            status.push_str(&format!("   -> {reason}\n"));
        }
        status.push('\n');
    }
    status.push_str("The system is continuously trying to reconnect. Please try again in a moment.\n");
    status
}
