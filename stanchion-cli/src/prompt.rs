//! Minimal prompt wrapper around resolved topic content.

use stanchion_fetch::Prompt;
use stanchion_providers::FeedResult;

const ANALYST_ROLE: &str =
    "You are a content analyst. You study social media notes about a topic and report what readers care about.";

/// Builds a JSON-mode prompt asking for `fields`.
pub fn structured(topic: &str, feed: &FeedResult, fields: &[String], non_empty: &[String]) -> Prompt {
    let mut system = format!(
        "{ANALYST_ROLE}\nReply with a single JSON object with the keys: {}.",
        fields.join(", ")
    );
    if !non_empty.is_empty() {
        system.push_str(&format!(
            "\nThese keys must be non-empty arrays: {}.",
            non_empty.join(", ")
        ));
    }

    Prompt::new(user_message(topic, feed))
        .with_system(system)
        .with_temperature(0.4)
        .json()
}

/// Builds a free-text prompt for streamed Markdown output.
pub fn streamed(topic: &str, feed: &FeedResult) -> Prompt {
    Prompt::new(user_message(topic, feed))
        .with_system(format!(
            "{ANALYST_ROLE}\nWrite a Markdown report. Start with a level-one heading."
        ))
        .with_temperature(0.7)
}

fn user_message(topic: &str, feed: &FeedResult) -> String {
    format!(
        "Topic: {topic}\n\nReference notes:\n\n{}",
        feed.entry.payload.trim_end()
    )
}
