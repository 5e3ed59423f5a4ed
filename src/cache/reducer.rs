//! Reducer Generator
//!
//! [`generate_reducer`] turns a top-level [`ResourceConfig`] into a pure
//! transition function over that resource's [`CacheSlice`]. Events aimed at
//! sub-resources are routed down through the owning entities' nested caches
//! and handled by the same rules.
//!
//! Rules:
//! - request status: `Unfetched -> Fetching -> Fetched | Error`, and any
//!   status goes back to `Fetching` on a new begin event
//! - success merges server fields over local ones; absent fields and nested
//!   caches are left untouched
//! - page success upserts every returned entity, records the page once and
//!   takes the totals from the latest response
//! - delete success drops the record and scrubs it from page membership,
//!   leaving `pages_fetched` and totals as they were
//! - errors overwrite the scopes they name and flag the entity or listing
//! - a success clears `_` and the field scopes written by the same entity
//!   (or by the listing, or by create); other field errors stay readable

use super::event::{Event, PagePayload, ResourceEvent};
use super::state::{CacheSlice, EntityId, EntityRecord, ErrorMap, ErrorOwner};
use crate::resource::ResourceConfig;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Pure `(slice, event) -> slice` function for one top-level resource
#[derive(Debug, Clone)]
pub struct ResourceReducer {
    config: Arc<ResourceConfig>,
}

/// Build the reducer for a top-level resource
pub fn generate_reducer(config: Arc<ResourceConfig>) -> ResourceReducer {
    ResourceReducer { config }
}

impl ResourceReducer {
    /// Plural name this reducer's slice is stored under
    pub fn resource(&self) -> &str {
        self.config.plural_name()
    }

    pub fn config(&self) -> &Arc<ResourceConfig> {
        &self.config
    }

    /// Apply one event. Events for other resources, or for sub-resources the
    /// config does not declare, leave the slice as it was.
    pub fn reduce(&self, slice: CacheSlice, event: &Event) -> CacheSlice {
        let address = &event.address;
        if address.root() != self.config.plural_name() {
            return slice;
        }
        let nested_path = &address.path()[1..];
        if self.config.descendant(nested_path).is_none() {
            tracing::warn!("ignoring {} for undeclared slice {}", event.kind(), address);
            return slice;
        }

        tracing::trace!("reducing {} into {}", event.kind(), address);
        reduce_at(
            slice,
            &self.config,
            nested_path,
            address.ancestors(),
            &event.payload,
        )
    }
}

/// Descend through `path`/`ancestors` and apply `event` to the target slice.
fn reduce_at(
    mut slice: CacheSlice,
    config: &ResourceConfig,
    path: &[String],
    ancestors: &[EntityId],
    event: &ResourceEvent,
) -> CacheSlice {
    let (Some((child, rest_path)), Some((parent_id, rest_ids))) =
        (path.split_first(), ancestors.split_first())
    else {
        return apply(slice, config, event);
    };
    let Some(child_config) = config.sub_resource(child) else {
        return slice;
    };

    let mut parent = slice
        .entities_by_id
        .remove(parent_id)
        .unwrap_or_else(|| EntityRecord::new(parent_id.clone()));
    let nested = parent.nested_caches.remove(child).unwrap_or_default();
    let nested = reduce_at(nested, child_config, rest_path, rest_ids, event);
    parent.nested_caches.insert(child.clone(), nested);
    slice.entities_by_id.insert(parent_id.clone(), parent);
    slice
}

fn apply(mut slice: CacheSlice, config: &ResourceConfig, event: &ResourceEvent) -> CacheSlice {
    match event {
        ResourceEvent::FetchOneBegin { id } => {
            let record = record_mut(&mut slice, id);
            record.request_status = record.request_status.begin();
        }
        ResourceEvent::FetchOneSuccess { id, entity } | ResourceEvent::UpdateSuccess { id, entity } => {
            upsert(&mut slice, id, entity);
            slice.clear_errors(&ErrorOwner::Entity(id.clone()));
        }
        ResourceEvent::CreateSuccess { id, entity } => {
            upsert(&mut slice, id, entity);
            slice.clear_errors(&ErrorOwner::Create);
        }
        ResourceEvent::FetchOneError { id, errors } => {
            let record = record_mut(&mut slice, id);
            record.request_status = record.request_status.fail();
            slice.record_errors(errors, ErrorOwner::Entity(id.clone()));
        }
        ResourceEvent::FetchPageBegin { .. } => {
            slice.list_request_status = slice.list_request_status.begin();
        }
        ResourceEvent::FetchPageSuccess(page) => {
            merge_page(&mut slice, config, page);
            slice.clear_errors(&ErrorOwner::Listing);
        }
        ResourceEvent::FetchPageError { errors, .. } => {
            slice.list_request_status = slice.list_request_status.fail();
            slice.record_errors(errors, ErrorOwner::Listing);
        }
        ResourceEvent::CreateError { errors } => {
            slice.list_request_status = slice.list_request_status.fail();
            slice.record_errors(errors, ErrorOwner::Create);
        }
        ResourceEvent::UpdateError { id, errors } | ResourceEvent::DeleteError { id, errors } => {
            fail_existing(&mut slice, id, errors);
        }
        ResourceEvent::DeleteSuccess { id } => {
            slice.entities_by_id.remove(id);
            for members in slice.page_members.values_mut() {
                members.retain(|member| member != id);
            }
            slice.clear_errors(&ErrorOwner::Entity(id.clone()));
        }
    }
    slice
}

/// Record for `id`, creating an unfetched placeholder on first sight
fn record_mut<'a>(slice: &'a mut CacheSlice, id: &EntityId) -> &'a mut EntityRecord {
    slice
        .entities_by_id
        .entry(id.clone())
        .or_insert_with(|| EntityRecord::new(id.clone()))
}

fn upsert(slice: &mut CacheSlice, id: &EntityId, entity: &Map<String, Value>) {
    let record = record_mut(slice, id);
    record.merge_attributes(entity);
    record.request_status = record.request_status.succeed();
}

fn merge_page(slice: &mut CacheSlice, config: &ResourceConfig, page: &PagePayload) {
    let mut members = Vec::with_capacity(page.entities.len());
    for entity in &page.entities {
        let Some(id) = entity.get(config.id_field()).and_then(EntityId::from_value) else {
            tracing::warn!(
                "{}: page {} entry without `{}`, skipped",
                config.plural_name(),
                page.page,
                config.id_field()
            );
            continue;
        };
        upsert(slice, &id, entity);
        if !members.contains(&id) {
            members.push(id);
        }
    }

    slice.pages_fetched.insert(page.page);
    slice.page_members.insert(page.page, members);
    slice.total_pages = Some(page.total_pages);
    slice.total_results = Some(page.total_results);
    slice.list_request_status = slice.list_request_status.succeed();
}

/// Update and delete failures only flag records that are already cached;
/// a failed call on an unknown id does not invent one.
fn fail_existing(slice: &mut CacheSlice, id: &EntityId, errors: &ErrorMap) {
    if let Some(record) = slice.entities_by_id.get_mut(id) {
        record.request_status = record.request_status.fail();
    }
    slice.record_errors(errors, ErrorOwner::Entity(id.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ErrorDetail, RequestStatus, SliceAddress};
    use crate::resource::{configure, EndpointTemplate, ResourceOptions, SupportedOp};
    use serde_json::json;

    fn linodes() -> Arc<ResourceConfig> {
        let backups = configure(
            ResourceOptions::new("backup", "backups")
                .endpoint(EndpointTemplate::pattern("/linode/instances/{0}/backups/{id}").unwrap())
                .supports(&[SupportedOp::Single, SupportedOp::Collection]),
        )
        .unwrap();
        Arc::new(
            configure(
                ResourceOptions::new("linode", "linodes")
                    .endpoint(EndpointTemplate::pattern("/linode/instances/{id}").unwrap())
                    .supports(&[SupportedOp::Single, SupportedOp::Collection])
                    .sub_resource(backups),
            )
            .unwrap(),
        )
    }

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn top(payload: ResourceEvent) -> Event {
        Event::new(SliceAddress::top_level("linodes"), payload)
    }

    fn backups_of(parent: u64, payload: ResourceEvent) -> Event {
        Event::new(
            SliceAddress::nested(
                vec!["linodes".to_string(), "backups".to_string()],
                vec![EntityId::from(parent)],
            )
            .unwrap(),
            payload,
        )
    }

    fn fetched(id: u64, attrs: Value) -> Event {
        top(ResourceEvent::FetchOneSuccess {
            id: EntityId::from(id),
            entity: obj(attrs),
        })
    }

    fn page(page: u32, ids: std::ops::Range<u64>, total_pages: u32, total_results: u64) -> Event {
        top(ResourceEvent::FetchPageSuccess(PagePayload {
            page,
            entities: ids
                .map(|id| obj(json!({"id": id, "label": format!("linode-{}", id)})))
                .collect(),
            total_pages,
            total_results,
        }))
    }

    fn run(reducer: &ResourceReducer, events: &[Event]) -> CacheSlice {
        events
            .iter()
            .fold(CacheSlice::default(), |slice, event| reducer.reduce(slice, event))
    }

    #[test]
    fn test_fetch_one_lifecycle() {
        let reducer = generate_reducer(linodes());
        let id = EntityId::from(5u64);

        let slice = reducer.reduce(
            CacheSlice::default(),
            &top(ResourceEvent::FetchOneBegin { id: id.clone() }),
        );
        assert_eq!(slice.entity(&id).unwrap().request_status(), RequestStatus::Fetching);

        let slice = reducer.reduce(slice, &fetched(5, json!({"id": 5, "label": "api-client"})));
        let record = slice.entity(&id).unwrap();
        assert_eq!(record.request_status(), RequestStatus::Fetched);
        assert_eq!(record.attributes(), &obj(json!({"id": 5, "label": "api-client"})));

        // Refetch goes back through Fetching
        let slice = reducer.reduce(slice, &top(ResourceEvent::FetchOneBegin { id: id.clone() }));
        assert_eq!(slice.entity(&id).unwrap().request_status(), RequestStatus::Fetching);
        assert_eq!(slice.entity(&id).unwrap().get("label"), Some(&json!("api-client")));
    }

    #[test]
    fn test_fetch_one_success_is_idempotent() {
        let reducer = generate_reducer(linodes());
        let event = fetched(5, json!({"id": 5, "label": "api-client"}));

        let once = reducer.reduce(CacheSlice::default(), &event);
        let twice = reducer.reduce(once.clone(), &event);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let reducer = generate_reducer(linodes());
        let slice = run(
            &reducer,
            &[
                fetched(1, json!({"id": 1, "label": "web", "status": "running"})),
                top(ResourceEvent::UpdateSuccess {
                    id: EntityId::from(1u64),
                    entity: obj(json!({"status": "offline"})),
                }),
            ],
        );

        let record = slice.entity(&EntityId::from(1u64)).unwrap();
        assert_eq!(record.get("label"), Some(&json!("web")));
        assert_eq!(record.get("status"), Some(&json!("offline")));
    }

    #[test]
    fn test_parent_update_preserves_nested_cache() {
        let reducer = generate_reducer(linodes());
        let slice = run(
            &reducer,
            &[
                fetched(1235, json!({"id": 1235, "label": "test-linode-1"})),
                backups_of(
                    1235,
                    ResourceEvent::FetchPageSuccess(PagePayload {
                        page: 1,
                        entities: vec![obj(json!({"id": 7, "type": "auto"}))],
                        total_pages: 1,
                        total_results: 1,
                    }),
                ),
            ],
        );
        let nested_before = slice
            .entity(&EntityId::from(1235u64))
            .unwrap()
            .nested("backups")
            .cloned()
            .unwrap();
        assert_eq!(nested_before.len(), 1);

        let slice = reducer.reduce(
            slice,
            &top(ResourceEvent::UpdateSuccess {
                id: EntityId::from(1235u64),
                entity: obj(json!({"label": "renamed", "backups": {"enabled": true}})),
            }),
        );
        let record = slice.entity(&EntityId::from(1235u64)).unwrap();
        assert_eq!(record.get("label"), Some(&json!("renamed")));
        assert_eq!(record.get("backups"), Some(&json!({"enabled": true})));
        assert_eq!(record.nested("backups"), Some(&nested_before));
    }

    #[test]
    fn test_nested_event_creates_placeholder_parent() {
        let reducer = generate_reducer(linodes());
        let slice = reducer.reduce(
            CacheSlice::default(),
            &backups_of(
                9,
                ResourceEvent::FetchOneSuccess {
                    id: EntityId::from(3u64),
                    entity: obj(json!({"id": 3})),
                },
            ),
        );

        let parent = slice.entity(&EntityId::from(9u64)).unwrap();
        assert_eq!(parent.request_status(), RequestStatus::Unfetched);
        assert!(parent.attributes().is_empty());
        let backup = parent.nested("backups").unwrap().entity(&EntityId::from(3u64)).unwrap();
        assert_eq!(backup.request_status(), RequestStatus::Fetched);
    }

    #[test]
    fn test_two_pages_of_a_listing() {
        let reducer = generate_reducer(linodes());
        let slice = run(
            &reducer,
            &[
                top(ResourceEvent::FetchPageBegin { page: 0 }),
                page(0, 0..20, 2, 25),
                top(ResourceEvent::FetchPageBegin { page: 1 }),
                page(1, 20..25, 2, 25),
            ],
        );

        assert_eq!(slice.pages_fetched().iter().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(slice.len(), 25);
        assert_eq!(slice.total_pages(), Some(2));
        assert_eq!(slice.total_results(), Some(25));
        assert_eq!(slice.list_request_status(), RequestStatus::Fetched);
        assert_eq!(slice.page(1).len(), 5);
    }

    #[test]
    fn test_refetching_a_page_does_not_duplicate_bookkeeping() {
        let reducer = generate_reducer(linodes());
        let slice = run(&reducer, &[page(1, 0..3, 1, 3), page(1, 0..3, 1, 3)]);

        assert_eq!(slice.pages_fetched().len(), 1);
        assert_eq!(slice.page_members(1).unwrap().len(), 3);
        assert_eq!(slice.len(), 3);
    }

    #[test]
    fn test_latest_totals_win() {
        let reducer = generate_reducer(linodes());
        let slice = run(&reducer, &[page(1, 0..2, 3, 30), page(2, 2..4, 4, 31)]);
        assert_eq!(slice.total_pages(), Some(4));
        assert_eq!(slice.total_results(), Some(31));
    }

    #[test]
    fn test_page_entries_without_id_are_skipped() {
        let reducer = generate_reducer(linodes());
        let slice = reducer.reduce(
            CacheSlice::default(),
            &top(ResourceEvent::FetchPageSuccess(PagePayload {
                page: 1,
                entities: vec![obj(json!({"label": "no id"})), obj(json!({"id": 2}))],
                total_pages: 1,
                total_results: 2,
            })),
        );
        assert_eq!(slice.len(), 1);
        assert_eq!(slice.page_members(1), Some(&[EntityId::from(2u64)][..]));
    }

    #[test]
    fn test_delete_removes_entity_only() {
        let reducer = generate_reducer(linodes());
        let before = run(
            &reducer,
            &[page(1, 1234..1237, 1, 3), fetched(1235, json!({"id": 1235}))],
        );
        let after = reducer.reduce(
            before.clone(),
            &top(ResourceEvent::DeleteSuccess {
                id: EntityId::from(1235u64),
            }),
        );

        assert!(after.entity(&EntityId::from(1235u64)).is_none());
        assert_eq!(after.len(), 2);
        assert_eq!(
            after.entity(&EntityId::from(1234u64)),
            before.entity(&EntityId::from(1234u64))
        );
        assert_eq!(after.pages_fetched(), before.pages_fetched());
        assert_eq!(after.total_pages(), before.total_pages());
        assert_eq!(after.total_results(), before.total_results());
        assert_eq!(
            after.page_members(1),
            Some(&[EntityId::from(1234u64), EntityId::from(1236u64)][..])
        );
    }

    #[test]
    fn test_errors_replace_per_scope() {
        let reducer = generate_reducer(linodes());
        let id = EntityId::from(1u64);
        let error = |reason: &str| {
            top(ResourceEvent::FetchOneError {
                id: id.clone(),
                errors: ErrorMap::from_details(vec![ErrorDetail::new(reason)]),
            })
        };

        let slice = run(&reducer, &[error("first"), error("Nooo!")]);
        assert_eq!(slice.errors().global(), Some(&[ErrorDetail::new("Nooo!")][..]));
        assert_eq!(slice.entity(&id).unwrap().request_status(), RequestStatus::Error);
    }

    #[test]
    fn test_field_errors_are_scoped() {
        let reducer = generate_reducer(linodes());
        let slice = reducer.reduce(
            CacheSlice::default(),
            &top(ResourceEvent::CreateError {
                errors: ErrorMap::from_details(vec![ErrorDetail::for_field(
                    "Label is too short",
                    "label",
                )]),
            }),
        );
        assert!(slice.errors().global().is_none());
        assert_eq!(slice.errors().scope("label").unwrap()[0].reason, "Label is too short");
        assert_eq!(slice.list_request_status(), RequestStatus::Error);
        assert!(slice.is_empty());
    }

    #[test]
    fn test_success_clears_errors() {
        let reducer = generate_reducer(linodes());
        let slice = run(
            &reducer,
            &[
                top(ResourceEvent::FetchPageError {
                    page: 1,
                    errors: ErrorMap::from_details(vec![ErrorDetail::new("timeout")]),
                }),
                page(1, 0..1, 1, 1),
            ],
        );
        assert!(slice.errors().is_empty());
    }

    #[test]
    fn test_field_errors_survive_success_on_another_entity() {
        let reducer = generate_reducer(linodes());
        let label_error = top(ResourceEvent::UpdateError {
            id: EntityId::from(1u64),
            errors: ErrorMap::from_details(vec![
                ErrorDetail::for_field("Label too short", "label"),
                ErrorDetail::new("Update failed"),
            ]),
        });
        let slice = run(
            &reducer,
            &[
                top(ResourceEvent::FetchOneSuccess {
                    id: EntityId::from(1u64),
                    entity: obj(json!({"id": 1})),
                }),
                label_error,
                top(ResourceEvent::FetchOneSuccess {
                    id: EntityId::from(2u64),
                    entity: obj(json!({"id": 2})),
                }),
                page(1, 0..3, 1, 3),
            ],
        );
        assert_eq!(
            slice.errors().scope("label"),
            Some(&[ErrorDetail::for_field("Label too short", "label")][..])
        );
        assert!(slice.errors().global().is_none());

        let slice = reducer.reduce(
            slice,
            &top(ResourceEvent::UpdateSuccess {
                id: EntityId::from(1u64),
                entity: obj(json!({"label": "long-enough"})),
            }),
        );
        assert!(slice.errors().is_empty());
    }

    #[test]
    fn test_create_errors_survive_page_refresh() {
        let reducer = generate_reducer(linodes());
        let slice = run(
            &reducer,
            &[
                top(ResourceEvent::CreateError {
                    errors: ErrorMap::from_details(vec![ErrorDetail::for_field(
                        "Region is required",
                        "region",
                    )]),
                }),
                page(1, 0..2, 1, 2),
            ],
        );
        assert!(slice.errors().scope("region").is_some());

        let slice = reducer.reduce(
            slice,
            &top(ResourceEvent::CreateSuccess {
                id: EntityId::from(9u64),
                entity: obj(json!({"id": 9, "region": "us-east"})),
            }),
        );
        assert!(slice.errors().is_empty());
    }

    #[test]
    fn test_update_error_on_unknown_id_adds_no_record() {
        let reducer = generate_reducer(linodes());
        let slice = reducer.reduce(
            CacheSlice::default(),
            &top(ResourceEvent::UpdateError {
                id: EntityId::from(404u64),
                errors: ErrorMap::from_details(vec![ErrorDetail::new("Not found")]),
            }),
        );
        assert!(slice.is_empty());
        assert!(slice.errors().global().is_some());
    }

    #[test]
    fn test_last_event_wins_for_overlapping_fetches() {
        // Two fetches of the same id: the one issued first lands last.
        let reducer = generate_reducer(linodes());
        let slice = run(
            &reducer,
            &[
                top(ResourceEvent::FetchOneBegin { id: EntityId::from(1u64) }),
                top(ResourceEvent::FetchOneBegin { id: EntityId::from(1u64) }),
                fetched(1, json!({"id": 1, "label": "newer"})),
                fetched(1, json!({"id": 1, "label": "older"})),
            ],
        );
        assert_eq!(
            slice.entity(&EntityId::from(1u64)).unwrap().get("label"),
            Some(&json!("older"))
        );
    }

    #[test]
    fn test_other_resources_pass_through() {
        let reducer = generate_reducer(linodes());
        let before = run(&reducer, &[fetched(1, json!({"id": 1}))]);
        let foreign = Event::new(
            SliceAddress::top_level("clients"),
            ResourceEvent::DeleteSuccess {
                id: EntityId::from(1u64),
            },
        );
        assert_eq!(reducer.reduce(before.clone(), &foreign), before);

        let undeclared = Event::new(
            SliceAddress::nested(
                vec!["linodes".to_string(), "volumes".to_string()],
                vec![EntityId::from(1u64)],
            )
            .unwrap(),
            ResourceEvent::DeleteSuccess {
                id: EntityId::from(1u64),
            },
        );
        assert_eq!(reducer.reduce(before.clone(), &undeclared), before);
    }
}
