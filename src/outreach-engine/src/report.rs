//! Plain-text rendering of drafts and stage progress for the terminal.

use outreach_core::{Campaign, Stage, StageInfo, StageStatus};

pub fn print_drafts(campaign: &Campaign) {
    println!("Campaign {} ({:?})", campaign.id, campaign.status);
    if campaign.drafts.is_empty() {
        println!("  no drafts yet");
        return;
    }
    for draft in &campaign.drafts {
        let score = draft
            .score
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| "-".to_string());
        let mark = if draft.approved { " [approved]" } else { "" };
        println!();
        println!("== {} (score {score}){mark}", draft.channel.display_name());
        if let Some(subject) = &draft.subject {
            println!("Subject: {subject}");
        }
        for line in draft.body.lines() {
            println!("  {line}");
        }
    }
    println!();
}

pub fn print_stages(stages: &[(Stage, StageInfo)]) {
    for (stage, info) in stages {
        println!(
            "{} {:<12} {}",
            status_glyph(info.status),
            stage.display_name(),
            info.message
        );
    }
}

fn status_glyph(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Pending => "[ ]",
        StageStatus::Running => "[~]",
        StageStatus::Completed => "[x]",
        StageStatus::Failed => "[!]",
    }
}
