//! UI description builder.
//!
//! Produces renderer-agnostic component trees in the `a2ui` wire format:
//!
//! ```text
//! {"format": "a2ui", "version": "1.0", "components": [...], "__a2ui_direct__": true?}
//! ```
//!
//! - `components` - typed [`UiComponent`] values and their wire shapes
//! - `builder` - [`UiBuilder`] with closure sub-builders for tables and grids
//! - `document` - the built [`UiDocument`] and the [`UiMessage`] envelope sent to transports

pub mod builder;
pub mod components;
pub mod document;

pub use builder::{GridBuilder, TableBuilder, UiBuilder};
pub use components::{
    ButtonVariant, HeadingLevel, JsonMode, StatusLevel, TableOptions, TextAlign, TextVariant,
    UiComponent,
};
pub use document::{UiDocument, UiMessage, A2UI_FORMAT, A2UI_VERSION, DIRECT_RENDER_FLAG};
