use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;

use crate::jobs::mailer::{MailError, Mailer};
use crate::models::Listing;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Delivers one saved-search notification to one user.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        recipient_email: &str,
        recipient_name: Option<&str>,
        search_name: &str,
        listings: &[Listing],
    ) -> Result<(), DispatchError>;
}

/// Renders the notification as HTML mail and hands it to a [`Mailer`].
pub struct EmailDispatcher {
    mailer: Arc<dyn Mailer>,
    public_base_url: String,
}

impl EmailDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, public_base_url: impl Into<String>) -> Self {
        Self {
            mailer,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn listing_url(&self, listing_id: i32) -> String {
        format!("{}/listing/{}", self.public_base_url, listing_id)
    }

    pub fn render_body(
        &self,
        recipient_name: Option<&str>,
        search_name: &str,
        listings: &[Listing],
    ) -> String {
        let greeting = match recipient_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => format!("Hello {},", escape_html(name)),
            None => "Hello,".to_string(),
        };

        let mut html = String::new();
        let _ = write!(
            html,
            "<p>{greeting}</p>\n<p>{count} new listing(s) match your saved search \"{search}\":</p>\n<ul>\n",
            count = listings.len(),
            search = escape_html(search_name),
        );
        for listing in listings {
            let location = match listing.district.as_deref() {
                Some(district) => format!("{} / {}", listing.city, district),
                None => listing.city.clone(),
            };
            let _ = writeln!(
                html,
                "<li><a href=\"{url}\">{title}</a> - {price} {currency} - {location}</li>",
                url = self.listing_url(listing.id),
                title = escape_html(&listing.title),
                price = listing.price,
                currency = escape_html(&listing.currency),
                location = escape_html(&location),
            );
        }
        html.push_str("</ul>\n");
        html
    }
}

pub fn subject_for(search_name: &str) -> String {
    format!("New listings matching \"{search_name}\"")
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[async_trait]
impl NotificationDispatcher for EmailDispatcher {
    async fn dispatch(
        &self,
        recipient_email: &str,
        recipient_name: Option<&str>,
        search_name: &str,
        listings: &[Listing],
    ) -> Result<(), DispatchError> {
        let subject = subject_for(search_name);
        let body = self.render_body(recipient_name, search_name, listings);

        let summaries: Vec<String> = listings
            .iter()
            .map(|l| format!("#{} {} ({} {}, {})", l.id, l.title, l.price, l.currency, l.city))
            .collect();
        tracing::info!(
            to = %recipient_email,
            subject = %subject,
            listings = ?summaries,
            "dispatching saved search notification"
        );

        self.mailer.send(recipient_email, &subject, &body).await?;
        Ok(())
    }
}
