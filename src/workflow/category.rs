//! Creation flow categories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ai::{AspectRatio, StyleMode};

/// Whether a flow asks clarifying questions before drafting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowMode {
    /// One request straight to the artifact
    Direct,
    /// Questions first, then drafts until complete
    Guided,
}

/// Kind of contract drafted by the contract flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractKind {
    Services,
    Sale,
    Lease,
    Employment,
    Nda,
}

/// Kind of brief produced by the design flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesignKind {
    Logo,
    Website,
    Interior,
    Packaging,
    Branding,
}

/// Photo flow settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhotoMode {
    pub style: StyleMode,
    pub aspect_ratio: AspectRatio,
}

/// What a creation session produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "flow", rename_all = "kebab-case")]
pub enum Category {
    Contract { kind: ContractKind },
    Design { kind: DesignKind },
    SocialPlan,
    Presentation,
    Photo { mode: PhotoMode },
}

impl ContractKind {
    pub const ALL: [Self; 5] = [Self::Services, Self::Sale, Self::Lease, Self::Employment, Self::Nda];

    pub fn id(self) -> &'static str {
        match self {
            Self::Services => "services",
            Self::Sale => "sale",
            Self::Lease => "lease",
            Self::Employment => "employment",
            Self::Nda => "nda",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Services => "договор оказания услуг",
            Self::Sale => "договор купли-продажи",
            Self::Lease => "договор аренды",
            Self::Employment => "трудовой договор",
            Self::Nda => "соглашение о неразглашении (NDA)",
        }
    }
}

impl DesignKind {
    pub const ALL: [Self; 5] =
        [Self::Logo, Self::Website, Self::Interior, Self::Packaging, Self::Branding];

    pub fn id(self) -> &'static str {
        match self {
            Self::Logo => "logo",
            Self::Website => "website",
            Self::Interior => "interior",
            Self::Packaging => "packaging",
            Self::Branding => "branding",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Logo => "логотип",
            Self::Website => "веб-сайт",
            Self::Interior => "дизайн интерьера",
            Self::Packaging => "упаковка",
            Self::Branding => "фирменный стиль",
        }
    }
}

impl Category {
    /// Every selectable category with default photo settings.
    pub fn all() -> Vec<Self> {
        let mut all: Vec<Self> =
            ContractKind::ALL.into_iter().map(|kind| Self::Contract { kind }).collect();
        all.extend(DesignKind::ALL.into_iter().map(|kind| Self::Design { kind }));
        all.push(Self::SocialPlan);
        all.push(Self::Presentation);
        all.extend(StyleMode::ALL.into_iter().map(|style| Self::Photo {
            mode: PhotoMode { style, aspect_ratio: AspectRatio::default() },
        }));
        all
    }

    /// Default flow mode for the category.
    pub fn flow_mode(self) -> FlowMode {
        match self {
            Self::Contract { .. } | Self::Photo { .. } => FlowMode::Direct,
            Self::Design { .. } | Self::SocialPlan | Self::Presentation => FlowMode::Guided,
        }
    }

    /// Whether the final artifact is a structured plan rather than a document.
    pub fn produces_plan(self) -> bool {
        matches!(self, Self::SocialPlan | Self::Presentation)
    }

    /// Identifier accepted by [`FromStr`].
    pub fn id(self) -> String {
        match self {
            Self::Contract { kind } => format!("contract:{}", kind.id()),
            Self::Design { kind } => format!("design:{}", kind.id()),
            Self::SocialPlan => "instagram".to_string(),
            Self::Presentation => "presentation".to_string(),
            Self::Photo { mode } => format!("photo:{}", mode.style.id()),
        }
    }

    /// Label shown to the user.
    pub fn label(self) -> String {
        match self {
            Self::Contract { kind } => format!("Договор: {}", kind.label()),
            Self::Design { kind } => format!("Дизайн-бриф: {}", kind.label()),
            Self::SocialPlan => "Контент-план Instagram".to_string(),
            Self::Presentation => "КП / презентация".to_string(),
            Self::Photo { mode } => format!("AI-фото: {}", mode.style.label()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let (head, tail) = match s.split_once(':') {
            Some((head, tail)) => (head, Some(tail)),
            None => (s.as_str(), None),
        };

        match (head, tail) {
            ("contract", kind) => {
                let kind = kind.unwrap_or("services");
                ContractKind::ALL
                    .into_iter()
                    .find(|k| k.id() == kind)
                    .map(|kind| Self::Contract { kind })
                    .ok_or_else(|| format!("unknown contract type: {kind}"))
            }
            ("design", kind) => {
                let kind = kind.unwrap_or("logo");
                DesignKind::ALL
                    .into_iter()
                    .find(|k| k.id() == kind)
                    .map(|kind| Self::Design { kind })
                    .ok_or_else(|| format!("unknown design type: {kind}"))
            }
            ("instagram" | "social", None) => Ok(Self::SocialPlan),
            ("presentation" | "kp", None) => Ok(Self::Presentation),
            ("photo", style) => {
                let style = match style {
                    Some(style) => style.parse()?,
                    None => StyleMode::default(),
                };
                Ok(Self::Photo { mode: PhotoMode { style, aspect_ratio: AspectRatio::default() } })
            }
            _ => Err(format!("unknown category: {s}")),
        }
    }
}
