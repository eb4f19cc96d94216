//! URL resolution for content-change triggers.
//!
//! When a post changes, the trigger asks a [`PostUrlResolver`] which URLs to
//! invalidate. Hosts embedding the library supply their own strategy; the
//! default resolves just the post's canonical permalink from a configured
//! template.

use url::Url;

/// Strategy for deriving the URLs affected by a post change.
pub trait PostUrlResolver: Send + Sync {
    fn urls_for_post(&self, post_id: i64) -> Vec<String>;
}

/// Default resolver: the canonical permalink only.
///
/// The template may reference `{base_url}` and `{id}`. With the default
/// template `{base_url}/?p={id}`, post 42 on `https://example.com` resolves
/// to `https://example.com/?p=42`.
#[derive(Debug, Clone)]
pub struct PermalinkResolver {
    base_url: Url,
    template: String,
}

impl PermalinkResolver {
    pub fn new(base_url: Url, template: impl Into<String>) -> Self {
        Self {
            base_url,
            template: template.into(),
        }
    }

    fn render(&self, post_id: i64) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        self.template
            .replace("{base_url}", base)
            .replace("{id}", &post_id.to_string())
    }
}

impl PostUrlResolver for PermalinkResolver {
    fn urls_for_post(&self, post_id: i64) -> Vec<String> {
        vec![self.render(post_id)]
    }
}
