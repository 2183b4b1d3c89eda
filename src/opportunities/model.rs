//! Opportunity listings and their card rendering.

use serde::{Deserialize, Serialize};

use crate::channels::{Button, Card, CardField, OutgoingResponse};

/// Longest description/benefits text shown on a card.
const CARD_TEXT_LIMIT: usize = 500;

/// A single listing returned by the opportunity search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub title: String,
    pub description: String,
    pub company: String,
    /// `Type <n>` or `N/A`.
    pub job_type: String,
    /// `YYYY-MM-DD` or `N/A`.
    pub deadline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_office: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benefits: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formal_requirements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_requirements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

impl Opportunity {
    pub fn to_card(&self) -> Card {
        let mut fields = vec![
            field("🏢 Company", &self.company, true),
            field("💼 Type", &self.job_type, true),
            field("📅 Deadline", &self.deadline, true),
        ];

        let optional = [
            ("💰 Salary", &self.wage, true),
            ("🏠 Home Office", &self.home_office, true),
            ("📚 Formal Req.", &self.formal_requirements, true),
            ("🛠 Tech Req.", &self.technical_requirements, true),
            ("🎁 Benefits", &self.benefits, false),
            ("📞 Contact", &self.contact, true),
        ];
        for (name, value, inline) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                fields.push(field(name, &ellipsize(value, CARD_TEXT_LIMIT), inline));
            }
        }

        Card {
            title: format!("📌 {}", self.title),
            url: self.url.clone(),
            description: ellipsize(&self.description, CARD_TEXT_LIMIT),
            fields,
            footer: Some("Powered by EXPERTS.AI".to_string()),
        }
    }

    /// Card message with an apply button when a link exists.
    pub fn to_response(&self) -> OutgoingResponse {
        let response = OutgoingResponse::text(String::new()).with_card(self.to_card());
        match self.url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => response.with_buttons(vec![Button::link(url, "📩 Apply")]),
            None => response,
        }
    }
}

fn field(name: &str, value: &str, inline: bool) -> CardField {
    CardField {
        name: name.to_string(),
        value: value.to_string(),
        inline,
    }
}

/// Cut `text` to `limit` characters, appending "..." when shortened.
fn ellipsize(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(limit).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ButtonStyle, Component};

    fn sample() -> Opportunity {
        Opportunity {
            id: "op-1".into(),
            title: "Backend Intern".into(),
            description: "Build APIs".into(),
            company: "NovaTech".into(),
            job_type: "Type 2".into(),
            deadline: "2025-03-01".into(),
            url: Some("https://example.com/apply".into()),
            wage: Some("1500 EUR".into()),
            home_office: None,
            benefits: Some("b".repeat(600)),
            formal_requirements: None,
            technical_requirements: Some(" ".into()),
            contact: None,
        }
    }

    #[test]
    fn card_has_fixed_and_present_optional_fields() {
        let card = sample().to_card();
        assert_eq!(card.title, "📌 Backend Intern");
        let names: Vec<&str> = card.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["🏢 Company", "💼 Type", "📅 Deadline", "💰 Salary", "🎁 Benefits"]
        );
        let benefits = &card.fields[4];
        assert!(!benefits.inline);
        assert_eq!(benefits.value.chars().count(), CARD_TEXT_LIMIT + 3);
        assert_eq!(card.footer.as_deref(), Some("Powered by EXPERTS.AI"));
    }

    #[test]
    fn response_has_apply_link_only_with_url() {
        let resp = sample().to_response();
        match &resp.components[..] {
            [Component::Buttons(buttons)] => {
                assert_eq!(buttons[0].style, ButtonStyle::Link);
                assert_eq!(buttons[0].url.as_deref(), Some("https://example.com/apply"));
            }
            other => panic!("expected apply button, got {other:?}"),
        }

        let mut no_link = sample();
        no_link.url = None;
        assert!(no_link.to_response().components.is_empty());
    }

    #[test]
    fn long_description_is_cut() {
        let mut op = sample();
        op.description = "é".repeat(800);
        let card = op.to_card();
        assert!(card.description.ends_with("..."));
        assert_eq!(card.description.chars().count(), CARD_TEXT_LIMIT + 3);
    }
}
