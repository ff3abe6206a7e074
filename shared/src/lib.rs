pub mod auth;
pub mod authz;
pub mod chapters;
pub mod dynamo;
pub mod error;
pub mod memory;
pub mod objects;
pub mod profiles;
pub mod series;
pub mod store;
pub mod types;
pub mod uploads;

use std::sync::Arc;

use crate::objects::ObjectStore;
use crate::store::{ProfileStore, SeriesStore};

/// Shared application state: the storage seams every handler runs against.
/// Generic so the Lambda wires in DynamoDB/S3 while tests wire in the
/// in-memory doubles from [`memory`].
pub struct AppState<S, P, O>
where
    S: SeriesStore,
    P: ProfileStore,
    O: ObjectStore,
{
    pub series: S,
    pub profiles: P,
    pub objects: O,
}

impl<S, P, O> AppState<S, P, O>
where
    S: SeriesStore,
    P: ProfileStore,
    O: ObjectStore,
{
    pub fn new(series: S, profiles: P, objects: O) -> Arc<Self> {
        Arc::new(Self {
            series,
            profiles,
            objects,
        })
    }
}
