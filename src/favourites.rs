//! User-saved places, persisted as one JSON string per entry in a single
//! key-value slot.
//!
//! Thumbnails travel inside the JSON as base64 JPEG (`imageEncoded`) and are
//! decoded into [`Favourite::image`] on load. On save a missing
//! `imageEncoded` is filled from `image`, but an existing one is never
//! recomputed, even when `image` has since changed.

use std::collections::{BTreeSet, HashMap};
use std::collections::hash_map::Values;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tokio::sync::Mutex;

use crate::error::{CycleMapError, Result};
use crate::geometry;
use crate::options::CoreConfig;
use crate::storage::KeyValueStore;
use crate::thumbnail::{self, Thumbnail};

pub const DEFAULT_FAVOURITE_NAME: &str = "screenshot location";
pub const DEFAULT_FAVOURITE_LONGITUDE: f64 = 10.897498;
pub const DEFAULT_FAVOURITE_LATITUDE: f64 = 48.279076;
pub const DEFAULT_FAVOURITE_ZOOM: f64 = 14.87486;

/// Zoom assumed for records written before zoom was stored.
const LEGACY_ZOOM: f64 = 15.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favourite {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default = "legacy_zoom")]
    pub zoom: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_encoded: Option<String>,
    #[serde(skip)]
    pub image: Option<Thumbnail>,
    /// Keys written by other versions of the app, kept verbatim.
    #[serde(flatten)]
    extra: Map<String, JsonValue>,
}

fn legacy_zoom() -> f64 {
    LEGACY_ZOOM
}

impl Favourite {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        longitude: f64,
        latitude: f64,
        zoom: f64,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            longitude,
            latitude,
            zoom,
            image_encoded: None,
            image: None,
            extra: Map::new(),
        }
    }

    pub fn with_image(mut self, image: Thumbnail) -> Self {
        self.image = Some(image);
        self
    }

    fn key(&self) -> FavouriteKey {
        FavouriteKey {
            name: self.name.clone(),
            description: self.description.clone(),
            longitude: normalized_bits(self.longitude),
            latitude: normalized_bits(self.latitude),
            zoom: normalized_bits(self.zoom),
            image_encoded: self.image_encoded.clone(),
            extra: JsonValue::Object(self.extra.clone()).to_string(),
        }
    }

    /// JSON has no NaN or infinity; such a value would be written as `null`.
    fn is_storable(&self) -> bool {
        self.longitude.is_finite() && self.latitude.is_finite() && self.zoom.is_finite()
    }
}

/// Equality ignores the decoded `image`.
impl PartialEq for Favourite {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

/// Treats -0.0 and 0.0 as the same coordinate.
fn normalized_bits(v: f64) -> u64 {
    (v + 0.0).to_bits()
}

/// Every persisted field of a favourite; the decoded image is derived data
/// and not part of identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FavouriteKey {
    name: String,
    description: String,
    longitude: u64,
    latitude: u64,
    zoom: u64,
    image_encoded: Option<String>,
    extra: String,
}

/// The placeholder shown when nothing has been saved yet.
pub fn default_favourite(now: DateTime<Utc>) -> Favourite {
    Favourite::new(
        DEFAULT_FAVOURITE_NAME,
        geometry::format_timestamp(now),
        DEFAULT_FAVOURITE_LONGITUDE,
        DEFAULT_FAVOURITE_LATITUDE,
        DEFAULT_FAVOURITE_ZOOM,
    )
}

/// Unordered set of favourites; structurally equal entries are stored once.
#[derive(Debug, Clone, Default)]
pub struct FavouritesCollection {
    entries: HashMap<FavouriteKey, Favourite>,
}

impl FavouritesCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if an equal favourite was already present.
    pub fn insert(&mut self, favourite: Favourite) -> bool {
        let key = favourite.key();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, favourite);
        true
    }

    pub fn remove(&mut self, favourite: &Favourite) -> Option<Favourite> {
        self.entries.remove(&favourite.key())
    }

    pub fn contains(&self, favourite: &Favourite) -> bool {
        self.entries.contains_key(&favourite.key())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> Values<'_, FavouriteKey, Favourite> {
        self.entries.values()
    }

    /// Keys depend on `imageEncoded`, so they are recomputed after the
    /// save path fills it in.
    fn rekey(&mut self) {
        let favourites: Vec<Favourite> = self.entries.drain().map(|(_, f)| f).collect();
        self.extend(favourites);
    }
}

impl Extend<Favourite> for FavouritesCollection {
    fn extend<T: IntoIterator<Item = Favourite>>(&mut self, iter: T) {
        for favourite in iter {
            self.insert(favourite);
        }
    }
}

impl FromIterator<Favourite> for FavouritesCollection {
    fn from_iter<T: IntoIterator<Item = Favourite>>(iter: T) -> Self {
        let mut collection = Self::new();
        collection.extend(iter);
        collection
    }
}

impl<'a> IntoIterator for &'a FavouritesCollection {
    type Item = &'a Favourite;
    type IntoIter = Values<'a, FavouriteKey, Favourite>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Loads and saves a [`FavouritesCollection`] through a [`KeyValueStore`].
pub struct FavouritesStore<S: KeyValueStore> {
    store: S,
    key: String,
    io_lock: Mutex<()>,
}

impl<S: KeyValueStore> FavouritesStore<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            io_lock: Mutex::new(()),
        }
    }

    pub fn from_config(store: S, config: &CoreConfig) -> Self {
        Self::new(store, config.favourites_key.clone())
    }

    /// Load the persisted favourites; see [`FavouritesStore::load_with_report`].
    pub async fn load(&self) -> Result<FavouritesCollection> {
        Ok(self.load_with_report().await?.0)
    }

    /// Load the persisted favourites, skipping entries that cannot be
    /// decoded. The skipped entries' errors are returned alongside.
    ///
    /// When nothing decodes, the collection holds just the default
    /// favourite. That seed is not written back.
    pub async fn load_with_report(&self) -> Result<(FavouritesCollection, Vec<CycleMapError>)> {
        let raw = {
            let _guard = self.io_lock.lock().await;
            self.store.get(&self.key).await?
        };

        let mut collection = FavouritesCollection::new();
        let mut problems = Vec::new();
        for entry in &raw {
            let mut favourite = match serde_json::from_str::<Favourite>(entry) {
                Ok(favourite) => favourite,
                Err(e) => {
                    warn!("[favourites] skipping malformed entry: {e}");
                    problems.push(CycleMapError::FavouriteDecode {
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            if let Some(encoded) = &favourite.image_encoded {
                match thumbnail::decode(encoded) {
                    Ok(image) => favourite.image = Some(image),
                    Err(e) => {
                        warn!("[favourites] thumbnail of '{}' unreadable: {e}", favourite.name);
                        problems.push(e);
                    }
                }
            }
            collection.insert(favourite);
        }

        if collection.is_empty() {
            info!("[favourites] no stored favourites, seeding default");
            collection.insert(default_favourite(Utc::now()));
        }

        Ok((collection, problems))
    }

    /// Persist `collection`, replacing the stored slot wholesale.
    pub async fn save(&self, collection: &mut FavouritesCollection) -> Result<()> {
        self.save_with_report(collection).await.map(|_| ())
    }

    /// Like [`FavouritesStore::save`], also returning per-entry problems.
    /// A thumbnail that cannot be encoded is left out of its favourite; a
    /// favourite with a non-finite position or zoom is not written at all.
    pub async fn save_with_report(
        &self,
        collection: &mut FavouritesCollection,
    ) -> Result<Vec<CycleMapError>> {
        let _guard = self.io_lock.lock().await;

        let mut problems = Vec::new();
        let mut filled = false;
        for favourite in collection.entries.values_mut() {
            if favourite.image_encoded.is_some() {
                continue;
            }
            let Some(image) = &favourite.image else {
                continue;
            };
            match thumbnail::encode(image) {
                Ok(encoded) => {
                    favourite.image_encoded = Some(encoded);
                    filled = true;
                }
                Err(e) => {
                    warn!("[favourites] saving '{}' without thumbnail: {e}", favourite.name);
                    problems.push(e);
                }
            }
        }
        if filled {
            collection.rekey();
        }

        let mut values = BTreeSet::new();
        for favourite in collection.iter() {
            if !favourite.is_storable() {
                warn!(
                    "[favourites] not saving '{}': non-finite position or zoom",
                    favourite.name
                );
                problems.push(CycleMapError::Storage {
                    message: format!(
                        "favourite '{}' has a non-finite longitude, latitude or zoom",
                        favourite.name
                    ),
                });
                continue;
            }
            let json = serde_json::to_string(favourite).map_err(|e| CycleMapError::Storage {
                message: e.to_string(),
            })?;
            values.insert(json);
        }

        let count = values.len();
        self.store.put(&self.key, values).await?;
        info!("[favourites] saved {count} favourite(s)");
        Ok(problems)
    }
}
