//! Default texts for new bookmarks.

use std::future::Future;

use chrono::{DateTime, Utc};
use log::warn;

use crate::error::Result;
use crate::favourites::Favourite;
use crate::geometry;
use crate::thumbnail::Thumbnail;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceDescription {
    pub name: String,
    pub description: String,
}

/// Reverse-geocoding backend (search SDK, web service, ...).
pub trait ReverseGeocoder: Send + Sync {
    fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> impl Future<Output = Result<PlaceDescription>> + Send;
}

/// Formatted coordinate as name, formatted timestamp as description.
pub fn fallback_description(latitude: f64, longitude: f64, at: DateTime<Utc>) -> PlaceDescription {
    PlaceDescription {
        name: geometry::format_coordinate(latitude, longitude),
        description: geometry::format_timestamp(at),
    }
}

/// Ask `geocoder` for a place name, falling back to
/// [`fallback_description`] on failure. Never fails itself.
pub async fn describe_place<G: ReverseGeocoder>(
    geocoder: &G,
    latitude: f64,
    longitude: f64,
    at: DateTime<Utc>,
) -> PlaceDescription {
    match geocoder.reverse(latitude, longitude).await {
        Ok(place) => place,
        Err(e) => {
            warn!("[geocode] reverse lookup failed, using fallback: {e}");
            fallback_description(latitude, longitude, at)
        }
    }
}

/// Build a new favourite for the current map position.
pub async fn bookmark<G: ReverseGeocoder>(
    geocoder: &G,
    latitude: f64,
    longitude: f64,
    zoom: f64,
    screenshot: Option<Thumbnail>,
    at: DateTime<Utc>,
) -> Favourite {
    let place = describe_place(geocoder, latitude, longitude, at).await;
    let favourite = Favourite::new(place.name, place.description, longitude, latitude, zoom);
    match screenshot {
        Some(image) => favourite.with_image(image),
        None => favourite,
    }
}
