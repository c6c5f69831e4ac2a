//! Light/dark presentation toggle. Lives only as long as the process.

use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    /// Label of the toggle button, which names the theme it switches to.
    pub fn button_label(self) -> &'static str {
        match self {
            Self::Dark => "☀️ Light Theme",
            Self::Light => "🌙 Dark Theme",
        }
    }

    /// Class applied to the document root.
    pub fn root_class(self) -> Option<&'static str> {
        match self {
            Self::Dark => Some("dark"),
            Self::Light => None,
        }
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => anyhow::bail!("Unknown theme: {} (expected light or dark)", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_round_trip() {
        let t = Theme::Light;
        assert_eq!(t.toggled(), Theme::Dark);
        assert_eq!(t.toggled().toggled(), Theme::Light);
    }

    #[test]
    fn test_button_label_names_other_theme() {
        assert_eq!(Theme::Dark.button_label(), "☀️ Light Theme");
        assert_eq!(Theme::Light.button_label(), "🌙 Dark Theme");
        assert_eq!(Theme::Dark.root_class(), Some("dark"));
        assert_eq!(Theme::Light.root_class(), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("DARK".parse::<Theme>().unwrap(), Theme::Dark);
        assert!("sepia".parse::<Theme>().is_err());
    }
}
