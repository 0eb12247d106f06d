//! Deterministic rendering of a tool result when the runtime produced no text.
//!
//! Payloads are classified by shape, not by tool name, so any source returning a
//! search, price or booking result gets the same presentation.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use concierge_ui::{JsonMode, StatusLevel, UiBuilder, UiDocument};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPayload {
    #[serde(default)]
    destination: Option<String>,
    hotels: Vec<HotelEntry>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HotelEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    rating: Option<Value>,
    #[serde(default, alias = "baseRate", alias = "rate")]
    price_per_night: Option<Value>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PricePayload {
    hotel_name: String,
    #[serde(default, alias = "pricePerNight", alias = "rate")]
    base_rate: Option<Value>,
    #[serde(default, alias = "nights")]
    number_of_nights: Option<Value>,
    #[serde(default)]
    subtotal: Option<Value>,
    #[serde(default)]
    tax: Option<Value>,
    #[serde(default, alias = "totalCost")]
    total: Option<Value>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingPayload {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    booking_id: Option<Value>,
    #[serde(default)]
    hotel_name: Option<String>,
    #[serde(default)]
    guest_name: Option<String>,
    #[serde(default)]
    check_in_date: Option<String>,
    #[serde(default)]
    check_out_date: Option<String>,
    #[serde(default)]
    number_of_guests: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

enum Shape {
    Search(SearchPayload),
    Price(PricePayload),
    Booking(BookingPayload),
    Unrecognized,
}

fn classify(tool_name: &str, payload: &Value) -> Shape {
    let Some(object) = payload.as_object() else {
        return Shape::Unrecognized;
    };

    let booking_like = object.contains_key("bookingId")
        || (tool_name.to_lowercase().contains("book") && object.contains_key("success"));
    if booking_like {
        if let Ok(booking) = BookingPayload::deserialize(payload) {
            return Shape::Booking(booking);
        }
    }

    if object.get("hotels").is_some_and(Value::is_array) {
        if let Ok(search) = SearchPayload::deserialize(payload) {
            return Shape::Search(search);
        }
    }

    let priced = object.contains_key("total") || object.contains_key("totalCost");
    if object.contains_key("hotelName") && priced {
        if let Ok(price) = PricePayload::deserialize(payload) {
            return Shape::Price(price);
        }
    }

    Shape::Unrecognized
}

/// Builds the UI for a tool result nobody narrated.
pub fn synthesize(tool_name: &str, payload: &Value) -> UiDocument {
    match classify(tool_name, payload) {
        Shape::Search(search) => render_search(search),
        Shape::Price(price) => render_price(price),
        Shape::Booking(booking) => render_booking(booking),
        Shape::Unrecognized => UiBuilder::new()
            .heading(format!("📋 Results from {tool_name}"))
            .json_tree(Some("Tool Response".to_string()), payload.clone(), JsonMode::Tree, false)
            .build(),
    }
}

fn render_search(search: SearchPayload) -> UiDocument {
    let destination = search.destination.as_deref().map(capitalize).unwrap_or_default();
    let builder = UiBuilder::new().heading(format!("🏨 Hotels in {destination}")).divider();
    let mut summary = String::new();
    push_extras(&mut summary, &search.extra);

    if search.hotels.is_empty() {
        let builder = builder.status("No hotels found for this destination.", StatusLevel::Warning);
        return if summary.is_empty() { builder } else { builder.body(summary.trim_end()) }.build();
    }

    let builder = search.hotels.into_iter().enumerate().fold(
        builder,
        |builder, (index, hotel)| {
            let mut content = String::new();
            if let Some(rating) = &hotel.rating {
                let _ = writeln!(content, "⭐ Rating: {}/5", display(rating));
            }
            if let Some(price) = &hotel.price_per_night {
                let _ = writeln!(content, "💰 Price: {} per night", money(price));
            }
            if let Some(location) = &hotel.location {
                let _ = writeln!(content, "📍 {location}");
            }
            if let Some(description) = &hotel.description {
                let _ = writeln!(content, "{description}");
            }
            push_extras(&mut content, &hotel.extra);

            let title = hotel.name.unwrap_or_else(|| format!("Hotel {}", index + 1));
            builder.card(title, Some(format!("Hotel #{}", index + 1)), content.trim_end())
        },
    );

    let builder = builder.divider();
    let builder = if summary.is_empty() { builder } else { builder.body(summary.trim_end()) };
    builder.body("Would you like me to get pricing details or book any of these hotels?").build()
}

fn render_price(price: PricePayload) -> UiDocument {
    let mut details = String::new();
    if let Some(rate) = &price.base_rate {
        let _ = writeln!(details, "**Price per night:** {}", money(rate));
    }
    if let Some(nights) = &price.number_of_nights {
        let _ = writeln!(details, "**Number of nights:** {}", display(nights));
    }
    if let Some(subtotal) = &price.subtotal {
        let _ = writeln!(details, "**Subtotal:** {}", money(subtotal));
    }
    if let Some(tax) = &price.tax {
        let _ = writeln!(details, "**Tax:** {}", money(tax));
    }
    if let Some(total) = &price.total {
        let _ = writeln!(details, "**Total cost:** {}", money(total));
    }
    push_extras(&mut details, &price.extra);

    UiBuilder::new()
        .heading(format!("💰 Pricing for {}", price.hotel_name))
        .divider()
        .body(details.trim_end())
        .divider()
        .body("Would you like me to book this hotel?")
        .build()
}

fn render_booking(booking: BookingPayload) -> UiDocument {
    let succeeded = booking.success.unwrap_or(booking.booking_id.is_some());
    if !succeeded {
        let message = booking
            .message
            .unwrap_or_else(|| "An error occurred while processing your booking.".to_string());
        return UiBuilder::new().status("Booking Failed", StatusLevel::Error).body(message).build();
    }

    let mut details = String::new();
    if let Some(id) = &booking.booking_id {
        let _ = writeln!(details, "**Booking ID:** {}", display(id));
    }
    if let Some(hotel) = &booking.hotel_name {
        let _ = writeln!(details, "**Hotel:** {hotel}");
    }
    if let Some(guest) = &booking.guest_name {
        let _ = writeln!(details, "**Guest:** {guest}");
    }
    match (&booking.check_in_date, &booking.check_out_date) {
        (Some(check_in), Some(check_out)) => {
            let _ = writeln!(details, "**Dates:** {check_in} to {check_out}");
        }
        (Some(check_in), None) => {
            let _ = writeln!(details, "**Check-in:** {check_in}");
        }
        (None, Some(check_out)) => {
            let _ = writeln!(details, "**Check-out:** {check_out}");
        }
        (None, None) => {}
    }
    if let Some(guests) = &booking.number_of_guests {
        let _ = writeln!(details, "**Guests:** {}", display(guests));
    }
    push_extras(&mut details, &booking.extra);
    if let Some(message) = &booking.message {
        let _ = write!(details, "\n{message}");
    }

    UiBuilder::new()
        .status("Booking Confirmed!", StatusLevel::Success)
        .divider()
        .body(details.trim_end())
        .status("Your reservation has been successfully created.", StatusLevel::Info)
        .build()
}

fn push_extras(out: &mut String, extra: &BTreeMap<String, Value>) {
    for (key, value) in extra {
        if value.is_null() {
            continue;
        }
        let _ = writeln!(out, "**{}:** {}", humanize(key), display(value));
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(display).collect::<Vec<_>>().join(", "),
        Value::Object(fields) => fields
            .iter()
            .map(|(key, value)| format!("{}: {}", humanize(key), display(value)))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

fn money(value: &Value) -> String {
    match value.as_f64() {
        Some(amount) => format!("${amount:.2}"),
        None => display(value),
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// `checkInDate` -> `Check In Date`.
fn humanize(key: &str) -> String {
    let mut label = String::with_capacity(key.len() + 4);
    for (index, ch) in key.chars().enumerate() {
        if index == 0 {
            label.extend(ch.to_uppercase());
        } else if ch.is_uppercase() {
            label.push(' ');
            label.push(ch);
        } else if ch == '_' {
            label.push(' ');
        } else {
            label.push(ch);
        }
    }
    label
}
