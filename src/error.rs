#[derive(Debug)]
pub enum CycleMapError {
    /// The location provider refused access; the sampler stays idle.
    PermissionDenied,
    AlreadySampling,
    SubscriptionFailed {
        message: String,
    },
    XmlParse(quick_xml::Error),
    /// A `trkpt` without a usable `lat` or `lon` attribute. `value` is `None`
    /// when the attribute is missing entirely.
    MalformedTrackPoint {
        attribute: &'static str,
        value: Option<String>,
    },
    FavouriteDecode {
        message: String,
    },
    EncodingFailure {
        message: String,
    },
    ThumbnailDecode {
        message: String,
    },
    Storage {
        message: String,
    },
    Config {
        message: String,
    },
    Io(std::io::Error),
}

impl std::fmt::Display for CycleMapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "Location permission denied"),
            Self::AlreadySampling => write!(f, "Location sampling is already active"),
            Self::SubscriptionFailed { message } => {
                write!(f, "Location subscription failed: {message}")
            }
            Self::XmlParse(e) => write!(f, "XML parse error: {e}"),
            Self::MalformedTrackPoint { attribute, value } => match value {
                Some(value) => write!(
                    f,
                    "Invalid value '{value}' for attribute '{attribute}' on <trkpt>"
                ),
                None => write!(f, "Missing attribute '{attribute}' on <trkpt>"),
            },
            Self::FavouriteDecode { message } => write!(f, "Favourite decode error: {message}"),
            Self::EncodingFailure { message } => {
                write!(f, "Thumbnail encoding failed: {message}")
            }
            Self::ThumbnailDecode { message } => {
                write!(f, "Thumbnail decoding failed: {message}")
            }
            Self::Storage { message } => write!(f, "Storage error: {message}"),
            Self::Config { message } => write!(f, "Configuration error: {message}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CycleMapError {}

/// Result type alias for cyclemap-core operations.
pub type Result<T> = std::result::Result<T, CycleMapError>;

impl From<quick_xml::Error> for CycleMapError {
    fn from(e: quick_xml::Error) -> Self {
        Self::XmlParse(e)
    }
}

impl From<std::io::Error> for CycleMapError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for CycleMapError {
    fn from(e: serde_json::Error) -> Self {
        Self::FavouriteDecode {
            message: e.to_string(),
        }
    }
}

impl From<base64::DecodeError> for CycleMapError {
    fn from(e: base64::DecodeError) -> Self {
        Self::ThumbnailDecode {
            message: e.to_string(),
        }
    }
}
