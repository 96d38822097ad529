use anyhow::Result;
use shared::{ChildProfile, ChildTheme, ThemeUpdateRequest};
use tracing::info;

use super::state_store::StateStore;
use crate::error::BoardError;

/// Service for per-child look and feel. Open to everyone, no PIN required.
#[derive(Clone)]
pub struct ThemeService {
    store: StateStore,
}

impl ThemeService {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Apply a theme change. Out-of-range percentages are clamped, never rejected.
    pub async fn update_theme(&self, child_id: &str, update: ThemeUpdateRequest) -> Result<ChildProfile> {
        info!("Updating theme for {}", child_id);

        self.store
            .try_update(|state| {
                let child = state
                    .child_mut(child_id)
                    .ok_or_else(|| BoardError::ChildNotFound(child_id.to_string()))?;
                let theme = &mut child.theme;

                if let Some(accent_color) = update.accent_color {
                    let accent_color = accent_color.trim();
                    theme.accent_color = if accent_color.is_empty() {
                        ChildTheme::DEFAULT_ACCENT_COLOR.to_string()
                    } else {
                        accent_color.to_string()
                    };
                }

                if let Some(background) = update.background {
                    theme.background = background;
                }

                if let Some(opacity) = update.background_overlay_opacity {
                    theme.background_overlay_opacity = ChildTheme::clamp_overlay_opacity(opacity);
                }

                for (panel, opacity) in update.panel_opacity {
                    theme
                        .panel_opacity
                        .insert(panel, ChildTheme::clamp_panel_opacity(opacity));
                }

                Ok(child.clone())
            })
            .await
    }
}
