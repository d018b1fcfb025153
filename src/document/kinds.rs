//! Fixed classification enums stored in documents.

use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

use crate::exchange::{content_type_code, param_code};

/// Where a request parameter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Url,
    Body,
    Cookie,
    Xml,
    XmlAttr,
    MultipartAttr,
    Json,
    Unknown,
}

impl ParameterKind {
    /// Total mapping from the analysis facility's code; anything
    /// unrecognised becomes [`ParameterKind::Unknown`].
    pub fn from_code(code: i32) -> Self {
        match code {
            param_code::URL => ParameterKind::Url,
            param_code::BODY => ParameterKind::Body,
            param_code::COOKIE => ParameterKind::Cookie,
            param_code::XML => ParameterKind::Xml,
            param_code::XML_ATTR => ParameterKind::XmlAttr,
            param_code::MULTIPART_ATTR => ParameterKind::MultipartAttr,
            param_code::JSON => ParameterKind::Json,
            _ => ParameterKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::Url => "url",
            ParameterKind::Body => "body",
            ParameterKind::Cookie => "cookie",
            ParameterKind::Xml => "xml",
            ParameterKind::XmlAttr => "xmlattr",
            ParameterKind::MultipartAttr => "multipartattr",
            ParameterKind::Json => "json",
            ParameterKind::Unknown => "unknown",
        }
    }
}

/// Request body classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum RequestContentType {
    #[default]
    None,
    UrlEncoded,
    Multipart,
    Xml,
    Json,
    Amf,
    Unknown,
}

impl RequestContentType {
    pub fn from_code(code: i32) -> Self {
        match code {
            content_type_code::NONE => RequestContentType::None,
            content_type_code::URL_ENCODED => RequestContentType::UrlEncoded,
            content_type_code::MULTIPART => RequestContentType::Multipart,
            content_type_code::XML => RequestContentType::Xml,
            content_type_code::JSON => RequestContentType::Json,
            content_type_code::AMF => RequestContentType::Amf,
            _ => RequestContentType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestContentType::None => "none",
            RequestContentType::UrlEncoded => "urlencoded",
            RequestContentType::Multipart => "multipart",
            RequestContentType::Xml => "xml",
            RequestContentType::Json => "json",
            RequestContentType::Amf => "amf",
            RequestContentType::Unknown => "unknown",
        }
    }
}
