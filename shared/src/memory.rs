//! In-memory store doubles. The handlers are written against the store
//! seams, so tests (and local experiments) run against these instead of
//! DynamoDB/S3. They enforce the same contracts — in particular the version
//! compare-and-swap — so a race that would conflict in production conflicts
//! here too.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::ApiError;
use crate::objects::{Bucket, ObjectStore};
use crate::store::{ProfileStore, SeriesOrder, SeriesStore};
use crate::types::{Profile, Series};

#[derive(Default)]
pub struct MemoryStore {
    series: Mutex<HashMap<String, Series>>,
    profiles: Mutex<HashMap<String, Profile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, profile: Profile) -> Self {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.id.clone(), profile);
        self
    }

    /// Seed a series row directly, bypassing the insert contract. Test setup
    /// helper; both store traits expose `insert`, so calls on the concrete
    /// type would need qualification anyway.
    pub fn seed_series(&self, series: Series) {
        self.series.lock().unwrap().insert(series.id.clone(), series);
    }

    pub fn series_snapshot(&self, id: &str) -> Option<Series> {
        self.series.lock().unwrap().get(id).cloned()
    }
}

impl SeriesStore for MemoryStore {
    async fn insert(&self, series: &Series) -> Result<(), ApiError> {
        let mut map = self.series.lock().unwrap();
        if map.contains_key(&series.id) {
            return Err(ApiError::Storage(format!(
                "series {} already exists",
                series.id
            )));
        }
        map.insert(series.id.clone(), series.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Series>, ApiError> {
        Ok(self.series.lock().unwrap().get(id).cloned())
    }

    async fn list(&self, order: SeriesOrder) -> Result<Vec<Series>, ApiError> {
        let mut all: Vec<Series> = self.series.lock().unwrap().values().cloned().collect();
        order.sort(&mut all);
        Ok(all)
    }

    async fn put(&self, series: &Series, expected_version: u64) -> Result<(), ApiError> {
        let mut map = self.series.lock().unwrap();
        match map.get(&series.id) {
            None => Err(ApiError::NotFound("series")),
            Some(stored) if stored.version != expected_version => Err(ApiError::Conflict),
            Some(_) => {
                map.insert(series.id.clone(), series.clone());
                Ok(())
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.series.lock().unwrap().remove(id);
        Ok(())
    }
}

impl ProfileStore for MemoryStore {
    async fn insert(&self, profile: &Profile) -> Result<(), ApiError> {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<Profile>, ApiError> {
        Ok(self.profiles.lock().unwrap().get(user_id).cloned())
    }

    async fn set_username(&self, user_id: &str, username: &str) -> Result<(), ApiError> {
        let mut map = self.profiles.lock().unwrap();
        match map.get_mut(user_id) {
            Some(profile) => {
                profile.username = username.to_string();
                Ok(())
            }
            None => Err(ApiError::NotFound("profile")),
        }
    }
}

/// Object-store double. `failing_after(n)` makes every put past the first
/// `n` fail, which is how the commit rollback path is exercised.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    fail_after: Option<usize>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(n: usize) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            fail_after: Some(n),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, bucket: Bucket, key: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&(bucket.name(), key.to_string()))
    }
}

impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ApiError> {
        let _ = content_type;
        let mut map = self.objects.lock().unwrap();
        if let Some(limit) = self.fail_after {
            if map.len() >= limit {
                return Err(ApiError::Storage("simulated upload failure".into()));
            }
        }
        let bucket_name = bucket.name();
        map.insert((bucket_name.clone(), key.to_string()), bytes);
        Ok(format!("https://{}.s3.amazonaws.com/{}", bucket_name, key))
    }

    async fn delete(&self, bucket: Bucket, keys: &[String]) -> Result<(), ApiError> {
        let bucket_name = bucket.name();
        let mut map = self.objects.lock().unwrap();
        for key in keys {
            map.remove(&(bucket_name.clone(), key.clone()));
        }
        Ok(())
    }

    async fn delete_prefix(&self, bucket: Bucket, prefix: &str) -> Result<(), ApiError> {
        let bucket_name = bucket.name();
        self.objects
            .lock()
            .unwrap()
            .retain(|(b, k), _| !(b == &bucket_name && k.starts_with(prefix)));
        Ok(())
    }
}
