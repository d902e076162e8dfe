use mime::Mime;

use crate::errors::BackendError;

/// Known video subtypes and the file extension stored for each.
const EXTENSIONS: &[(&str, &str)] = &[
    ("webm", "webm"),
    ("mp4", "mp4"),
    ("quicktime", "mov"),
    ("x-matroska", "mkv"),
    ("ogg", "ogv"),
];

/// A validated video content type.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoFormat {
    /// The MIME essence sent along with the signed upload, e.g. `video/webm`.
    pub essence: String,
    pub extension: &'static str,
}

impl VideoFormat {
    /// Parses a client-supplied content type. Parameters such as
    /// `codecs=vp9` are accepted but not kept.
    ///
    /// ```
    /// use glossary_backend::media::VideoFormat;
    /// let format = VideoFormat::parse("video/webm; codecs=vp9").unwrap();
    /// assert_eq!(format.essence, "video/webm");
    /// assert_eq!(format.extension, "webm");
    /// ```
    pub fn parse(content_type: &str) -> Result<Self, BackendError> {
        let parsed: Mime = content_type
            .trim()
            .parse()
            .map_err(|_| BackendError::invalid(format!("invalid content type {:?}", content_type)))?;

        if parsed.type_() != mime::VIDEO {
            return Err(BackendError::invalid(format!(
                "content type {} is not a video type",
                parsed.essence_str()
            )));
        }

        let subtype = parsed.subtype().as_str();

        EXTENSIONS
            .iter()
            .find(|(known, _)| *known == subtype)
            .map(|&(_, extension)| VideoFormat {
                essence: parsed.essence_str().to_owned(),
                extension,
            })
            .ok_or_else(|| {
                BackendError::invalid(format!("unsupported video type {}", parsed.essence_str()))
            })
    }

    /// The filename stored for the `position`th recording of a session,
    /// counting from 1.
    pub fn filename(&self, position: usize) -> String {
        format!("recording_{}.{}", position, self.extension)
    }
}
