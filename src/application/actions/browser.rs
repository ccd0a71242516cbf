//! Browser actions: preview refresh and navigation.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{ActionHandler, required};
use crate::domain::errors::ActionError;
use crate::domain::traits::PreviewSink;
use crate::domain::types::{Action, ActionCategory, ActionKind, ActionResult, PreviewEvent};

pub struct BrowserHandler {
    preview: Arc<dyn PreviewSink>,
}

impl BrowserHandler {
    pub fn new(preview: Arc<dyn PreviewSink>) -> Self {
        Self { preview }
    }
}

#[async_trait]
impl ActionHandler for BrowserHandler {
    fn category(&self) -> ActionCategory {
        ActionCategory::Browser
    }

    async fn handle(&self, action: &Action) -> Result<ActionResult, ActionError> {
        let (event, output) = match action.kind {
            ActionKind::RefreshPreview => (PreviewEvent::Refresh, "Preview refreshed".to_string()),
            ActionKind::NavigateTo => {
                let url = required(action.url.as_deref(), "url")?;
                (
                    PreviewEvent::Navigate {
                        url: url.to_string(),
                    },
                    format!("Navigated to: {}", url),
                )
            }
            _ => return Err(ActionError::UnknownKind(action.kind.to_string())),
        };

        debug!("Preview event: {:?}", event);
        self.preview.emit(event)?;
        Ok(ActionResult::ok(action, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    #[tokio::test]
    async fn test_navigate_emits_event() {
        let fixture = Fixture::new();
        let handler = BrowserHandler::new(fixture.preview.clone());
        let mut action = Action::new(ActionKind::NavigateTo);
        action.url = Some("/about.html".into());

        let result = handler.handle(&action).await.unwrap();
        assert_eq!(result.output.as_deref(), Some("Navigated to: /about.html"));
        assert_eq!(
            fixture.preview.events(),
            vec![PreviewEvent::Navigate {
                url: "/about.html".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_navigate_requires_url() {
        let fixture = Fixture::new();
        let handler = BrowserHandler::new(fixture.preview.clone());
        let err = handler
            .handle(&Action::new(ActionKind::NavigateTo))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::MissingField("url")));
        assert!(fixture.preview.events().is_empty());
    }
}
