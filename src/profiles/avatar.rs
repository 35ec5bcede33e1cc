use uuid::Uuid;

use crate::error::{Error, Result};

pub const AVATAR_BUCKET: &str = "avatars";

/// Largest accepted avatar, in bytes.
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Accepted MIME types and the extension stored objects get.
pub const ACCEPTED_IMAGE_TYPES: [(&str, &str); 4] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

/// A replacement profile image picked by the user.
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl AvatarUpload {
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    /// Check type and size, returning the extension to store the file under.
    pub fn validate(&self) -> Result<&'static str> {
        let mime = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let Some(&(_, extension)) = ACCEPTED_IMAGE_TYPES
            .iter()
            .find(|(accepted, _)| *accepted == mime)
        else {
            return Err(Error::Validation(format!(
                "{} is not a supported image type",
                self.content_type
            )));
        };

        if self.bytes.is_empty() {
            return Err(Error::Validation("image is empty".to_owned()));
        }
        if self.bytes.len() > MAX_AVATAR_BYTES {
            return Err(Error::Validation(format!(
                "image is {} bytes, the limit is {MAX_AVATAR_BYTES}",
                self.bytes.len()
            )));
        }

        Ok(extension)
    }
}

/// Fresh object name so a replaced avatar never reuses a cached URL.
pub(crate) fn object_name(user_id: Uuid, extension: &str) -> String {
    format!("{user_id}-{}.{extension}", Uuid::now_v7().simple())
}
