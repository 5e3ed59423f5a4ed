//! Normalized client-side cache
//!
//! - [`state`] - entity records, cache slices, request status and errors
//! - [`event`] - lifecycle events and how they are addressed
//! - [`reducer`] - the reducer generator and its merge rules

pub mod event;
pub mod reducer;
pub mod state;

pub use event::{Event, EventKind, PagePayload, ResourceEvent, SliceAddress};
pub use reducer::{generate_reducer, ResourceReducer};
pub use state::{
    CacheSlice, EntityId, EntityRecord, ErrorDetail, ErrorMap, RequestStatus, GLOBAL_SCOPE,
    RESERVED_FIELDS,
};
