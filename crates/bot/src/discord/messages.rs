//! Review card builders and user-facing texts.
//!
//! Cards are rendered from the persisted application alone, so the pending
//! card, the finalized card and any later re-render by the reconciler all
//! come out identical for the same row.

use waco_verify_core::{ApplicationControl, ApplicationStatus, Decision, LinkApplicationId, RoleId};

use super::types::{
    ActionRow, Button, ButtonStyle, Embed, EmbedAuthor, EmbedField, EmbedFooter, EmbedImage,
};
use crate::models::LinkApplication;

pub const COLOR_PENDING: u32 = 0x0034_98DB;
pub const COLOR_APPROVED: u32 = 0x002E_CC71;
pub const COLOR_REJECTED: u32 = 0x00E7_4C3C;

/// A card keeps at most this many fields before the decision field is added.
const MAX_SUMMARY_FIELDS: usize = 5;

/// Discord's embed description limit, minus room for the code fence.
const MAX_HISTORY_CHARS: usize = 3900;

const APPROVED_FIELD: &str = "Approved";
const REJECTED_FIELD: &str = "Rejected";

/// Build the pending review card for an application.
#[must_use]
pub fn build_application_card(application: &LinkApplication, skin_viewer_url: &str) -> Embed {
    let history = application
        .history
        .as_deref()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or("Not specified");

    let mut fields = vec![
        EmbedField::new("Player", format!("```{}```", application.display_name), true),
        EmbedField::new("User ID", format!("```{}```", application.account_id), true),
        EmbedField::new(
            "Discord",
            format!(
                "{} ({})",
                application.requester_id.mention(),
                application.requester_id
            ),
            false,
        ),
    ];

    if let Some(skin_url) = &application.skin_url {
        fields.push(EmbedField::new(
            "Skin",
            format!("[3D preview]({})", skin_preview_url(skin_viewer_url, skin_url)),
            false,
        ));
    }

    Embed {
        title: Some("New verification application".to_string()),
        description: Some(format!(
            "Roleplay history: ```{}```",
            truncate_chars(history, MAX_HISTORY_CHARS)
        )),
        color: Some(COLOR_PENDING),
        timestamp: Some(application.created_at.to_rfc3339()),
        author: Some(EmbedAuthor {
            name: application.requester_name.clone(),
            icon_url: application.requester_avatar_url.clone(),
        }),
        fields,
        thumbnail: application
            .skin_url
            .as_ref()
            .map(|url| EmbedImage { url: url.clone() }),
        footer: Some(EmbedFooter {
            text: "Awaiting review".to_string(),
        }),
    }
}

/// Approve and Reject buttons for an application.
#[must_use]
pub fn control_row(application_id: LinkApplicationId, disabled: bool) -> ActionRow {
    ActionRow::new(vec![
        Button::new(
            ButtonStyle::Success,
            "Approve",
            ApplicationControl::new(Decision::Approve, application_id).custom_id(),
        )
        .disabled(disabled),
        Button::new(
            ButtonStyle::Danger,
            "Reject",
            ApplicationControl::new(Decision::Reject, application_id).custom_id(),
        )
        .disabled(disabled),
    ])
}

/// Apply a decided application's outcome to a card.
///
/// An existing decision field is replaced in place. Otherwise the oldest
/// fields are dropped until at most five remain and the decision field is
/// appended, so the card never carries more than six fields. Pending
/// applications leave the card untouched.
#[must_use]
pub fn finalize_card(mut card: Embed, application: &LinkApplication) -> Embed {
    let Some(field) = decision_field(application) else {
        return card;
    };

    let (title, color) = match application.status {
        ApplicationStatus::Approved => ("✅ Application approved", COLOR_APPROVED),
        ApplicationStatus::Rejected => ("❌ Application rejected", COLOR_REJECTED),
        ApplicationStatus::Pending => return card,
    };
    card.title = Some(title.to_string());
    card.color = Some(color);
    card.footer = Some(EmbedFooter {
        text: "Reviewed".to_string(),
    });

    if let Some(existing) = card
        .fields
        .iter_mut()
        .find(|f| f.name == APPROVED_FIELD || f.name == REJECTED_FIELD)
    {
        *existing = field;
    } else {
        while card.fields.len() > MAX_SUMMARY_FIELDS {
            card.fields.remove(0);
        }
        card.fields.push(field);
    }

    card
}

/// Full card for an application in its current state, with buttons.
#[must_use]
pub fn render_card(application: &LinkApplication, skin_viewer_url: &str) -> (Embed, ActionRow) {
    let card = build_application_card(application, skin_viewer_url);
    let decided = application.status.is_terminal();
    let card = if decided {
        finalize_card(card, application)
    } else {
        card
    };
    (card, control_row(application.id, decided))
}

fn decision_field(application: &LinkApplication) -> Option<EmbedField> {
    let name = match application.status {
        ApplicationStatus::Approved => APPROVED_FIELD,
        ApplicationStatus::Rejected => REJECTED_FIELD,
        ApplicationStatus::Pending => return None,
    };
    let moderator = application.decided_by_id?;
    let decided_at = application.decided_at?;

    let mut value = format!(
        "**Moderator:** {} ({})\n**Time:** <t:{}:F>",
        moderator.mention(),
        application.decided_by_name.as_deref().unwrap_or("unknown"),
        decided_at.timestamp()
    );
    if !application.role_changes.is_empty() {
        value.push_str("\n\n");
        value.push_str(&application.role_changes.join("\n"));
    }

    Some(EmbedField::new(name, value, false))
}

/// Link to the 3D skin viewer for a skin texture URL.
#[must_use]
pub fn skin_preview_url(viewer_base: &str, skin_url: &str) -> String {
    let separator = if viewer_base.contains('?') { '&' } else { '?' };
    format!(
        "{viewer_base}{separator}url={}",
        urlencoding::encode(skin_url)
    )
}

/// Content line pinging both staff roles.
#[must_use]
pub fn staff_ping([moderator, admin]: [RoleId; 2]) -> String {
    format!("{} {}", moderator.mention(), admin.mention())
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max).collect();
    truncated.push('…');
    truncated
}

// =============================================================================
// User-facing texts
// =============================================================================

#[must_use]
pub fn link_success(username: &str) -> String {
    format!(
        "✅ Your Discord account has been linked to **{username}**! \
         Watch your DMs for the review result."
    )
}

#[must_use]
pub fn link_already_pending(username: &str) -> String {
    format!("⏳ Your application for **{username}** is already awaiting review.")
}

pub const LINK_ACCOUNT_NOT_FOUND: &str = "❌ No account with this ID was found.";

pub const LINK_ALREADY_LINKED: &str =
    "❌ This account is already linked to another Discord account.";

pub const LINK_CARD_DELIVERY_FAILED: &str = "⚠️ Your account was linked, but the application \
     could not be sent to staff. Run /link again in a moment.";

pub const LINK_FAILED: &str = "❌ Could not reach the database. Please try again later.";

pub const LINK_INVALID_INPUT: &str = "❌ Please provide a valid user ID.";

pub const DECISION_DENIED: &str = "❌ You do not have permission to perform this action.";

pub const DECISION_MISSING_APPLICATION: &str = "❌ This application no longer exists.";

#[must_use]
pub fn decision_failed(decision: Decision) -> &'static str {
    match decision {
        Decision::Approve => "❌ Could not approve the application.",
        Decision::Reject => "❌ Could not reject the application.",
    }
}

#[must_use]
pub fn decision_already_made(status: ApplicationStatus) -> String {
    format!("ℹ️ This application has already been {status}.")
}

/// Direct message telling the applicant about the decision.
#[must_use]
pub fn applicant_notice(decision: Decision, username: &str, moderator: &str) -> String {
    match decision {
        Decision::Approve => format!(
            "🎉 Your verification application for **{username}** was approved by moderator **{moderator}**!"
        ),
        Decision::Reject => format!(
            "❌ Your verification application for **{username}** was rejected by moderator **{moderator}**."
        ),
    }
}

/// Audit log reason for role changes.
#[must_use]
pub fn approval_audit_reason(moderator: &str) -> String {
    format!("Application approved by moderator {moderator}")
}
