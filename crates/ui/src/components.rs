use serde::{Serialize, Serializer};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingLevel {
    Heading,
    Subheading,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextVariant {
    Body,
    Caption,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonMode {
    Raw,
    Tree,
    #[default]
    Both,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonVariant {
    #[default]
    Primary,
    Secondary,
    Danger,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableOptions {
    pub page_size: Option<u32>,
    pub sortable: Option<bool>,
    pub filterable: Option<bool>,
    pub pagination: Option<bool>,
}

pub const DEFAULT_GALLERY_MAX_IMAGES: u32 = 6;
pub const DEFAULT_GALLERY_COLUMNS: u32 = 3;

/// One renderable element. Headings are their own kind even though they share
/// the `text` wire type with body copy.
#[derive(Clone, Debug, PartialEq)]
pub enum UiComponent {
    Heading { content: String, level: HeadingLevel },
    Text { content: String, variant: TextVariant, align: TextAlign },
    Card { title: String, subtitle: Option<String>, content: String },
    Divider,
    Status { message: String, level: StatusLevel },
    Table { headers: Vec<String>, rows: Vec<Vec<Value>>, options: TableOptions },
    JsonTree { label: Option<String>, data: Value, mode: JsonMode, collapsed: bool },
    ImageGallery { images: Vec<String>, alt: Option<String>, max_images: u32, columns: u32 },
    Image { src: String, alt: Option<String>, caption: Option<String> },
    List { items: Vec<String>, ordered: bool },
    Button { label: String, action: String, variant: ButtonVariant },
    Grid { columns: u32, items: Vec<UiComponent> },
}

impl UiComponent {
    pub fn heading(content: impl Into<String>) -> Self {
        Self::Heading { content: content.into(), level: HeadingLevel::Heading }
    }

    pub fn body(content: impl Into<String>) -> Self {
        Self::Text { content: content.into(), variant: TextVariant::Body, align: TextAlign::Left }
    }

    pub fn status(message: impl Into<String>, level: StatusLevel) -> Self {
        Self::Status { message: message.into(), level }
    }

    /// Wire `type` discriminator.
    pub fn wire_type(&self) -> &'static str {
        match self {
            Self::Heading { .. } | Self::Text { .. } => "text",
            Self::Card { .. } => "card",
            Self::Divider => "divider",
            Self::Status { .. } => "status",
            Self::Table { .. } => "table",
            Self::JsonTree { .. } => "json",
            Self::ImageGallery { .. } => "image-gallery",
            Self::Image { .. } => "image",
            Self::List { .. } => "list",
            Self::Button { .. } => "button",
            Self::Grid { .. } => "grid",
        }
    }

    pub fn is_json_tree(&self) -> bool {
        match self {
            Self::JsonTree { .. } => true,
            Self::Grid { items, .. } => items.iter().any(Self::is_json_tree),
            _ => false,
        }
    }

    fn to_wire(&self) -> WireComponent<'_> {
        match self {
            Self::Heading { content, level } => WireComponent::Text {
                content,
                variant: match level {
                    HeadingLevel::Heading => "heading",
                    HeadingLevel::Subheading => "subheading",
                },
                align: TextAlign::Left,
            },
            Self::Text { content, variant, align } => WireComponent::Text {
                content,
                variant: match variant {
                    TextVariant::Body => "body",
                    TextVariant::Caption => "caption",
                },
                align: *align,
            },
            Self::Card { title, subtitle, content } => {
                WireComponent::Card { title, subtitle: subtitle.as_deref(), content }
            }
            Self::Divider => WireComponent::Divider,
            Self::Status { message, level } => WireComponent::Status { message, status: *level },
            Self::Table { headers, rows, options } => WireComponent::Table {
                headers,
                rows,
                page_size: options.page_size,
                sortable: options.sortable,
                filterable: options.filterable,
                pagination: options.pagination,
            },
            Self::JsonTree { label, data, mode, collapsed } => WireComponent::Json {
                label: label.as_deref(),
                data,
                mode: *mode,
                collapsed: *collapsed,
            },
            Self::ImageGallery { images, alt, max_images, columns } => {
                WireComponent::ImageGallery {
                    images,
                    alt: alt.as_deref(),
                    max_images: *max_images,
                    columns: *columns,
                }
            }
            Self::Image { src, alt, caption } => {
                WireComponent::Image { src, alt: alt.as_deref(), caption: caption.as_deref() }
            }
            Self::List { items, ordered } => WireComponent::List { items, ordered: *ordered },
            Self::Button { label, action, variant } => {
                WireComponent::Button { label, action, variant: *variant }
            }
            Self::Grid { columns, items } => WireComponent::Grid { columns: *columns, items },
        }
    }
}

impl Serialize for UiComponent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum WireComponent<'a> {
    #[serde(rename = "text")]
    Text { content: &'a str, variant: &'static str, align: TextAlign },
    #[serde(rename = "card")]
    Card {
        title: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        subtitle: Option<&'a str>,
        content: &'a str,
    },
    #[serde(rename = "divider")]
    Divider,
    #[serde(rename = "status")]
    Status { message: &'a str, status: StatusLevel },
    #[serde(rename = "table")]
    Table {
        headers: &'a [String],
        rows: &'a [Vec<Value>],
        #[serde(rename = "pageSize", skip_serializing_if = "Option::is_none")]
        page_size: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        sortable: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        filterable: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pagination: Option<bool>,
    },
    #[serde(rename = "json")]
    Json {
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<&'a str>,
        data: &'a Value,
        mode: JsonMode,
        collapsed: bool,
    },
    #[serde(rename = "image-gallery")]
    ImageGallery {
        images: &'a [String],
        #[serde(skip_serializing_if = "Option::is_none")]
        alt: Option<&'a str>,
        #[serde(rename = "maxImages")]
        max_images: u32,
        columns: u32,
    },
    #[serde(rename = "image")]
    Image {
        src: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        alt: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        caption: Option<&'a str>,
    },
    #[serde(rename = "list")]
    List { items: &'a [String], ordered: bool },
    #[serde(rename = "button")]
    Button { label: &'a str, action: &'a str, variant: ButtonVariant },
    #[serde(rename = "grid")]
    Grid { columns: u32, items: &'a [UiComponent] },
}
