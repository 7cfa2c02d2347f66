/// Outgoing "chat action" (the "sending photo..." indicator, etc).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatAction {
    UploadPhoto,
}

impl ChatAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatAction::UploadPhoto => "upload_photo",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InlineKind {
    Photo,
    Gif,
}

impl InlineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InlineKind::Photo => "photo",
            InlineKind::Gif => "gif",
        }
    }
}

/// One entry of an inline query answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineResult {
    pub kind: InlineKind,
    pub id: String,
    pub media_url: String,
    pub thumb_url: String,
    pub width: u32,
    pub height: u32,
    pub caption: String,
}
