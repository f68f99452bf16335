//! Document metadata with a format-discriminated payload.
//!
//! On the wire, metadata is one flat JSON object: common keys, the keys of
//! the format-specific payload selected by `format_type`, and any keys the
//! engine added that this crate does not know about.

use std::collections::BTreeMap;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata of one extraction result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub authors: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    /// Primary language (ISO 639 code).
    pub language: Option<String>,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    pub created_by: Option<String>,
    pub modified_by: Option<String>,
    /// Page structure, serialized under `pages`.
    pub pages: Option<PageStructure>,
    /// Format-specific payload, `None` for unknown or missing `format_type`.
    pub format: Option<FormatMetadata>,
    pub image_preprocessing: Option<ImagePreprocessingMetadata>,
    pub json_schema: Option<Value>,
    pub error: Option<ErrorMetadata>,
    /// Keys not covered above, kept verbatim.
    pub additional: BTreeMap<String, Value>,
}

const FORMAT_TAG: &str = "format_type";

impl Metadata {
    /// The `format_type` discriminant, if a known format payload is present.
    pub fn format_type(&self) -> Option<&'static str> {
        self.format.as_ref().map(FormatMetadata::format_type)
    }
}

fn take<T, E>(map: &mut Map<String, Value>, key: &str) -> Result<Option<T>, E>
where
    T: DeserializeOwned,
    E: de::Error,
{
    match map.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| E::custom(format!("invalid metadata field `{key}`: {e}"))),
    }
}

fn put<T, E>(map: &mut Map<String, Value>, key: &str, value: &Option<T>) -> Result<(), E>
where
    T: Serialize,
    E: ser::Error,
{
    if let Some(value) = value {
        let value = serde_json::to_value(value).map_err(E::custom)?;
        map.insert(key.to_string(), value);
    }
    Ok(())
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut map = Map::<String, Value>::deserialize(deserializer)?;

        let known_tag = map
            .get(FORMAT_TAG)
            .and_then(Value::as_str)
            .is_some_and(|tag| FormatMetadata::TAGS.contains(&tag));

        // Payload structs own no common key, so decoding them from the full
        // object takes nothing the common fields need.
        let mut format_keys = Vec::new();
        let format = if known_tag {
            let format = FormatMetadata::deserialize(Value::Object(map.clone())).map_err(|e| {
                <D::Error as de::Error>::custom(format!("invalid format metadata: {e}"))
            })?;
            if let Ok(Value::Object(fields)) = serde_json::to_value(&format) {
                format_keys.extend(fields.into_iter().map(|(key, _)| key));
            }
            format_keys.push(FORMAT_TAG.to_string());
            Some(format)
        } else {
            None
        };

        let mut metadata = Metadata {
            title: take::<_, D::Error>(&mut map, "title")?,
            subject: take::<_, D::Error>(&mut map, "subject")?,
            authors: take::<_, D::Error>(&mut map, "authors")?,
            keywords: take::<_, D::Error>(&mut map, "keywords")?,
            language: take::<_, D::Error>(&mut map, "language")?,
            created_at: take::<_, D::Error>(&mut map, "created_at")?,
            modified_at: take::<_, D::Error>(&mut map, "modified_at")?,
            created_by: take::<_, D::Error>(&mut map, "created_by")?,
            modified_by: take::<_, D::Error>(&mut map, "modified_by")?,
            pages: take::<_, D::Error>(&mut map, "pages")?,
            format,
            image_preprocessing: take::<_, D::Error>(&mut map, "image_preprocessing")?,
            json_schema: take::<_, D::Error>(&mut map, "json_schema")?,
            error: take::<_, D::Error>(&mut map, "error")?,
            additional: BTreeMap::new(),
        };

        for key in &format_keys {
            map.remove(key);
        }
        metadata.additional = map.into_iter().collect();
        Ok(metadata)
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = Map::new();
        put::<_, S::Error>(&mut map, "title", &self.title)?;
        put::<_, S::Error>(&mut map, "subject", &self.subject)?;
        put::<_, S::Error>(&mut map, "authors", &self.authors)?;
        put::<_, S::Error>(&mut map, "keywords", &self.keywords)?;
        put::<_, S::Error>(&mut map, "language", &self.language)?;
        put::<_, S::Error>(&mut map, "created_at", &self.created_at)?;
        put::<_, S::Error>(&mut map, "modified_at", &self.modified_at)?;
        put::<_, S::Error>(&mut map, "created_by", &self.created_by)?;
        put::<_, S::Error>(&mut map, "modified_by", &self.modified_by)?;
        put::<_, S::Error>(&mut map, "pages", &self.pages)?;
        put::<_, S::Error>(&mut map, "image_preprocessing", &self.image_preprocessing)?;
        put::<_, S::Error>(&mut map, "json_schema", &self.json_schema)?;
        put::<_, S::Error>(&mut map, "error", &self.error)?;

        if let Some(format) = &self.format {
            match serde_json::to_value(format).map_err(<S::Error as ser::Error>::custom)? {
                Value::Object(fields) => {
                    for (key, value) in fields {
                        map.entry(key).or_insert(value);
                    }
                }
                _ => {
                    return Err(<S::Error as ser::Error>::custom(
                        "format metadata must be an object",
                    ));
                }
            }
        }
        for (key, value) in &self.additional {
            map.entry(key.clone()).or_insert_with(|| value.clone());
        }

        map.serialize(serializer)
    }
}

/// Exactly one format-specific payload, selected by `format_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format_type", rename_all = "snake_case")]
pub enum FormatMetadata {
    Pdf(PdfMetadata),
    Excel(ExcelMetadata),
    Email(EmailMetadata),
    Pptx(PptxMetadata),
    Archive(ArchiveMetadata),
    Image(ImageMetadata),
    Xml(XmlMetadata),
    Text(TextMetadata),
    Html(HtmlMetadata),
    Ocr(OcrMetadata),
}

impl FormatMetadata {
    /// Every `format_type` value with a payload type.
    pub const TAGS: [&'static str; 10] = [
        "pdf", "excel", "email", "pptx", "archive", "image", "xml", "text", "html", "ocr",
    ];

    pub fn format_type(&self) -> &'static str {
        match self {
            FormatMetadata::Pdf(_) => "pdf",
            FormatMetadata::Excel(_) => "excel",
            FormatMetadata::Email(_) => "email",
            FormatMetadata::Pptx(_) => "pptx",
            FormatMetadata::Archive(_) => "archive",
            FormatMetadata::Image(_) => "image",
            FormatMetadata::Xml(_) => "xml",
            FormatMetadata::Text(_) => "text",
            FormatMetadata::Html(_) => "html",
            FormatMetadata::Ocr(_) => "ocr",
        }
    }
}

/// PDF-specific fields. Title, authors and dates live in [`Metadata`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_encrypted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcelMetadata {
    pub sheet_count: usize,
    pub sheet_names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    pub to_emails: Vec<String>,
    pub cc_emails: Vec<String>,
    pub bcc_emails: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PptxMetadata {
    pub slide_count: usize,
    pub slide_names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveMetadata {
    /// Archive format, e.g. "zip".
    pub format: String,
    pub file_count: usize,
    pub file_list: Vec<String>,
    pub total_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub exif: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XmlMetadata {
    pub element_count: usize,
    pub unique_elements: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextMetadata {
    pub line_count: usize,
    pub word_count: usize,
    pub character_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
    /// `[text, url]` pairs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<[String; 2]>>,
    /// `[language, code]` pairs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_blocks: Option<Vec<[String; 2]>>,
}

/// HTML document fields. Title, keywords and language live in [`Metadata`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_href: Option<String>,
    /// "ltr", "rtl" or "auto".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_graph: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_card: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_tags: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<HeaderMetadata>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<LinkMetadata>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderMetadata {
    pub level: u8,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub depth: usize,
    pub html_offset: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkMetadata {
    pub href: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// "anchor", "internal", "external", "email", "phone" or "other".
    pub link_type: String,
}

/// OCR run parameters. The OCR language lives in [`Metadata::language`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrMetadata {
    pub psm: i32,
    pub output_format: String,
    pub table_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_cols: Option<usize>,
}

/// How the engine normalized an image before OCR.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagePreprocessingMetadata {
    pub original_dimensions: [u64; 2],
    pub original_dpi: [f64; 2],
    pub target_dpi: i32,
    pub scale_factor: f64,
    pub auto_adjusted: bool,
    pub final_dpi: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_dimensions: Option<[u64; 2]>,
    pub resample_method: String,
    pub dimension_clamped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculated_dpi: Option<i32>,
    pub skipped_resize: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_error: Option<String>,
}

/// Error recorded by a batch item that the engine still returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetadata {
    pub error_type: String,
    pub message: String,
}

/// Unit a document is paginated in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageUnitType {
    #[default]
    Page,
    Slide,
    Sheet,
}

/// Byte range of one page in the extracted content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageBoundary {
    pub byte_start: usize,
    pub byte_end: usize,
    pub page_number: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub number: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

/// Pagination of the source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageStructure {
    pub total_count: usize,
    #[serde(default)]
    pub unit_type: PageUnitType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundaries: Option<Vec<PageBoundary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<PageInfo>>,
}
