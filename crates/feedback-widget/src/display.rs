//! Theme resolution and panel sizing for small screens.

use crate::config::ThemePreference;
use serde::{
    Deserialize,
    Serialize,
};

/// Viewports narrower than this use the mobile layout.
pub const MOBILE_BREAKPOINT: u32 = 768;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

/// An explicit preference wins; `Auto` follows the system color scheme.
pub fn resolve_theme(preference: ThemePreference, system_prefers_dark: bool) -> Theme {
    match preference {
        ThemePreference::Light => Theme::Light,
        ThemePreference::Dark => Theme::Dark,
        ThemePreference::Auto if system_prefers_dark => Theme::Dark,
        ThemePreference::Auto => Theme::Light,
    }
}

pub fn is_mobile(width: u32) -> bool {
    width < MOBILE_BREAKPOINT
}

/// Panel placement on a mobile viewport, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelGeometry {
    pub max_height: u32,
    pub top_margin: u32,
    pub bottom_margin: u32,
}

impl PanelGeometry {
    /// Geometry for the given viewport, or `None` on desktop widths.
    pub fn for_viewport(width: u32, height: u32) -> Option<Self> {
        if !is_mobile(width) {
            return None;
        }

        let geometry = if height < 500 {
            // landscape phones
            Self {
                max_height: height.saturating_sub(80).max(300),
                top_margin: 20,
                bottom_margin: 20,
            }
        } else if height < 600 {
            Self {
                max_height: height.saturating_sub(120).max(400),
                top_margin: 40,
                bottom_margin: 40,
            }
        } else {
            Self {
                max_height: height.saturating_sub(160).max(500),
                top_margin: 60,
                bottom_margin: 80,
            }
        };

        Some(geometry)
    }
}
