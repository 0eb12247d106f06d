use serde_json::Value;

use crate::components::{
    ButtonVariant, HeadingLevel, JsonMode, StatusLevel, TableOptions, TextAlign, TextVariant,
    UiComponent, DEFAULT_GALLERY_COLUMNS, DEFAULT_GALLERY_MAX_IMAGES,
};
use crate::document::UiDocument;

/// Accumulates components in render order.
#[derive(Default)]
pub struct UiBuilder {
    components: Vec<UiComponent>,
}

impl UiBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, component: UiComponent) -> Self {
        self.components.push(component);
        self
    }

    pub fn heading(self, content: impl Into<String>) -> Self {
        self.push(UiComponent::heading(content))
    }

    pub fn subheading(self, content: impl Into<String>) -> Self {
        self.push(UiComponent::Heading { content: content.into(), level: HeadingLevel::Subheading })
    }

    pub fn body(self, content: impl Into<String>) -> Self {
        self.push(UiComponent::body(content))
    }

    pub fn caption(self, content: impl Into<String>) -> Self {
        self.push(UiComponent::Text {
            content: content.into(),
            variant: TextVariant::Caption,
            align: TextAlign::Left,
        })
    }

    pub fn text(self, content: impl Into<String>, variant: TextVariant, align: TextAlign) -> Self {
        self.push(UiComponent::Text { content: content.into(), variant, align })
    }

    pub fn card(
        self,
        title: impl Into<String>,
        subtitle: Option<String>,
        content: impl Into<String>,
    ) -> Self {
        self.push(UiComponent::Card { title: title.into(), subtitle, content: content.into() })
    }

    pub fn divider(self) -> Self {
        self.push(UiComponent::Divider)
    }

    pub fn status(self, message: impl Into<String>, level: StatusLevel) -> Self {
        self.push(UiComponent::status(message, level))
    }

    pub fn json_tree(
        self,
        label: Option<String>,
        data: Value,
        mode: JsonMode,
        collapsed: bool,
    ) -> Self {
        self.push(UiComponent::JsonTree { label, data, mode, collapsed })
    }

    pub fn image_gallery(self, images: Vec<String>, alt: Option<String>) -> Self {
        self.push(UiComponent::ImageGallery {
            images,
            alt,
            max_images: DEFAULT_GALLERY_MAX_IMAGES,
            columns: DEFAULT_GALLERY_COLUMNS,
        })
    }

    pub fn list(self, items: Vec<String>, ordered: bool) -> Self {
        self.push(UiComponent::List { items, ordered })
    }

    pub fn button(
        self,
        label: impl Into<String>,
        action: impl Into<String>,
        variant: ButtonVariant,
    ) -> Self {
        self.push(UiComponent::Button { label: label.into(), action: action.into(), variant })
    }

    pub fn table<F>(self, headers: Vec<String>, build: F) -> Self
    where
        F: FnOnce(&mut TableBuilder),
    {
        let mut builder = TableBuilder::default();
        build(&mut builder);
        let (rows, options) = builder.build();
        self.push(UiComponent::Table { headers, rows, options })
    }

    pub fn grid<F>(self, columns: u32, build: F) -> Self
    where
        F: FnOnce(&mut GridBuilder),
    {
        let mut builder = GridBuilder::default();
        build(&mut builder);
        self.push(UiComponent::Grid { columns, items: builder.build() })
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn build(self) -> UiDocument {
        UiDocument::new(self.components)
    }
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<Vec<Value>>,
    options: TableOptions,
}

impl TableBuilder {
    pub fn row(&mut self, cells: Vec<Value>) -> &mut Self {
        self.rows.push(cells);
        self
    }

    pub fn page_size(&mut self, page_size: u32) -> &mut Self {
        self.options.page_size = Some(page_size);
        self.options.pagination = Some(true);
        self
    }

    pub fn sortable(&mut self, sortable: bool) -> &mut Self {
        self.options.sortable = Some(sortable);
        self
    }

    pub fn filterable(&mut self, filterable: bool) -> &mut Self {
        self.options.filterable = Some(filterable);
        self
    }

    fn build(self) -> (Vec<Vec<Value>>, TableOptions) {
        (self.rows, self.options)
    }
}

#[derive(Default)]
pub struct GridBuilder {
    items: Vec<UiComponent>,
}

impl GridBuilder {
    pub fn item(&mut self, component: UiComponent) -> &mut Self {
        self.items.push(component);
        self
    }

    pub fn card(
        &mut self,
        title: impl Into<String>,
        subtitle: Option<String>,
        content: impl Into<String>,
    ) -> &mut Self {
        self.item(UiComponent::Card { title: title.into(), subtitle, content: content.into() })
    }

    pub fn body(&mut self, content: impl Into<String>) -> &mut Self {
        self.item(UiComponent::body(content))
    }

    pub fn button(
        &mut self,
        label: impl Into<String>,
        action: impl Into<String>,
        variant: ButtonVariant,
    ) -> &mut Self {
        self.item(UiComponent::Button { label: label.into(), action: action.into(), variant })
    }

    fn build(self) -> Vec<UiComponent> {
        self.items
    }
}
