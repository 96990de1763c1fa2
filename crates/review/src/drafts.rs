//! Draft body rewrites applied by reviewer decisions, plus the canned draft
//! set used when no generation service is involved.

use chrono::{DateTime, Utc};
use outreach_core::{Channel, Draft};

/// Appended to a draft body when the reviewer skips it.
pub const SKIP_MARKER: &str = "[Skipped by reviewer]";

/// Prefix of the stamp closing every regenerated body.
pub const REGENERATED_MARKER: &str = "[Regenerated at";

/// Follow-up paragraph that replaces everything after a regenerated draft's opening lines.
pub const FOLLOW_UP_TEMPLATE: &str = "I wanted to follow up with a sharper angle: teams like yours \
usually see the quickest wins by starting small and measuring early. \
Would a 15-minute call next week be worth it?";

/// Keep the first two lines of `body`, add the follow-up template, and stamp
/// the result with `now`.
pub fn regenerate_body(body: &str, now: DateTime<Utc>) -> String {
    let opening: Vec<&str> = body.lines().take(2).collect();
    let mut out = opening.join("\n");
    if !out.trim().is_empty() {
        out.push_str("\n\n");
    }
    out.push_str(FOLLOW_UP_TEMPLATE);
    out.push_str(&format!(
        "\n\n{REGENERATED_MARKER} {}]",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out
}

/// Append the skip marker once. Skipping an already skipped body is a no-op.
pub fn annotate_skipped(body: &str) -> String {
    if body.contains(SKIP_MARKER) {
        body.to_string()
    } else {
        format!("{body}\n\n{SKIP_MARKER}")
    }
}

pub fn is_regenerated(body: &str) -> bool {
    body.contains(REGENERATED_MARKER)
}

pub fn is_skipped(body: &str) -> bool {
    body.contains(SKIP_MARKER)
}

/// One unscored, unapproved draft per supported channel.
pub fn draft_set(company: Option<&str>, role: Option<&str>) -> Vec<Draft> {
    let company = company.unwrap_or("your team");
    let role = role.unwrap_or("leader");

    Channel::ALL
        .into_iter()
        .map(|channel| {
            let subject = channel
                .has_subject()
                .then(|| format!("Quick idea for {company}"));
            Draft::new(channel, subject, channel_body(channel, company, role))
        })
        .collect()
}

fn channel_body(channel: Channel, company: &str, role: &str) -> String {
    match channel {
        Channel::Email => format!(
            "Hi there,\n\
             I came across {company} and was impressed by what you are building.\n\
             As a {role}, you are probably juggling growth and focus at the same time.\n\
             We help teams cut outreach prep time in half without losing the personal touch.\n\
             Open to a short chat next week?\n\
             Best regards"
        ),
        Channel::Sms => format!(
            "Hi! Loved what {company} is doing.\n\
             Got a quick idea that could save your team hours each week. Worth a 10-min call?"
        ),
        Channel::Linkedin => format!(
            "Hi, great to connect!\n\
             Your work as {role} at {company} caught my eye.\n\
             I'd love to swap notes on how teams like yours approach outreach."
        ),
        Channel::Instagram => format!(
            "Hey! Big fan of the {company} feed.\n\
             Would love to share an idea that fits your style. Open to a DM chat?"
        ),
        Channel::Whatsapp => format!(
            "Hello!\n\
             Reaching out because {company} looks like a great fit for something we're building.\n\
             Happy to send details here if that works for you."
        ),
    }
}
