use serde::{Deserialize, Serialize};

/// Current [`crate::persistence::SessionSnapshot`] schema version.
pub const SESSION_SCHEMA_VERSION: u32 = 2;
/// Default z-index assigned to the bottom-most window.
pub const DEFAULT_BASE_Z_INDEX: u32 = 100;
/// Default z-index floor for non-windowed modal overlays.
pub const DEFAULT_MODAL_Z_INDEX: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u64);

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowKind {
    FileBrowser,
    Terminal,
    TextEditor,
    PhotoViewer,
    About,
}

impl WindowKind {
    pub const ALL: [WindowKind; 5] = [
        Self::FileBrowser,
        Self::Terminal,
        Self::TextEditor,
        Self::PhotoViewer,
        Self::About,
    ];

    /// Stable token written into session snapshots.
    pub fn token(self) -> &'static str {
        match self {
            Self::FileBrowser => "file-browser",
            Self::Terminal => "terminal",
            Self::TextEditor => "text-editor",
            Self::PhotoViewer => "photo-viewer",
            Self::About => "about",
        }
    }

    /// Parses a snapshot token, accepting the names older builds wrote.
    pub fn from_token(raw: &str) -> Option<Self> {
        let kind = match raw.trim().to_ascii_lowercase().as_str() {
            "file-browser" | "finder" | "files" => Self::FileBrowser,
            "terminal" | "shell" | "console" => Self::Terminal,
            "text-editor" | "textedit" | "editor" | "notes" => Self::TextEditor,
            "photo-viewer" | "preview" | "viewer" | "photos" => Self::PhotoViewer,
            "about" => Self::About,
            _ => return None,
        };
        Some(kind)
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::FileBrowser => "Finder",
            Self::Terminal => "Terminal",
            Self::TextEditor => "TextEdit",
            Self::PhotoViewer => "Preview",
            Self::About => "About This Computer",
        }
    }

    /// Label key resolved through the host [`desktop_app_contract::LabelResolver`].
    pub fn label_key(self) -> &'static str {
        match self {
            Self::FileBrowser => "app.file-browser",
            Self::Terminal => "app.terminal",
            Self::TextEditor => "app.text-editor",
            Self::PhotoViewer => "app.photo-viewer",
            Self::About => "app.about",
        }
    }
}

impl std::fmt::Display for WindowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Visibility and stacking of a non-tabbed overlay (about box, alert, sheet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalState {
    pub visible: bool,
    pub z_index: u32,
}
