//! Action Generator
//!
//! [`generate_actions`] binds a [`ResourceConfig`] to a [`Transport`] and
//! hands out [`Task`]s for every operation the resource supports. A task
//! emits its begin event before touching the network, then exactly one
//! success or error event. Transport failures are turned into error events
//! and a [`TaskOutcome::Failed`]; nothing is retried and nothing escapes.

use super::config::{ResourceConfig, SupportedOp};
use crate::api::{Method, Transport, TransportError};
use crate::cache::{EntityId, ErrorMap, Event, PagePayload, ResourceEvent, SliceAddress};
use crate::error::ConfigurationError;
use crate::store::{Dispatch, Task, TaskFailure, TaskOutcome};
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Pages of a `fetch_all` in flight at once
const MAX_CONCURRENT_PAGES: usize = 4;

/// Actions for one resource
#[derive(Clone)]
pub struct ResourceActions {
    config: Arc<ResourceConfig>,
    transport: Arc<dyn Transport>,
}

/// Build the action set for `config`
pub fn generate_actions(
    config: Arc<ResourceConfig>,
    transport: Arc<dyn Transport>,
) -> ResourceActions {
    ResourceActions { config, transport }
}

/// Everything a running task needs, detached from `&self`
#[derive(Clone)]
struct Call {
    config: Arc<ResourceConfig>,
    transport: Arc<dyn Transport>,
    address: SliceAddress,
}

impl ResourceActions {
    pub fn config(&self) -> &Arc<ResourceConfig> {
        &self.config
    }

    fn prepare(&self, op: SupportedOp, ancestors: &[EntityId]) -> Result<Call, ConfigurationError> {
        if !self.config.supports(op) {
            return Err(ConfigurationError::UnsupportedOperation {
                resource: self.config.plural_name().to_string(),
                op,
            });
        }
        Ok(Call {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
            address: self.config.address(ancestors)?,
        })
    }

    /// GET one entity
    pub fn fetch_one(
        &self,
        id: impl Into<EntityId>,
        ancestors: &[EntityId],
    ) -> Result<Task, ConfigurationError> {
        let call = self.prepare(SupportedOp::Single, ancestors)?;
        let id = id.into();
        let path = call.config.entity_path(&id, ancestors);

        Ok(Task::new(format!("fetch {}", path), move |dispatch| async move {
            call.emit(&*dispatch, ResourceEvent::FetchOneBegin { id: id.clone() });
            let result = call
                .transport
                .request(Method::Get, &path, &[], None)
                .await
                .and_then(|body| entity_from(&body).map(|entity| (entity, body)));

            match result {
                Ok((entity, body)) => {
                    call.emit(&*dispatch, ResourceEvent::FetchOneSuccess { id, entity });
                    TaskOutcome::Completed(body)
                }
                Err(err) => TaskOutcome::Failed(call.fail(&*dispatch, err, |errors| {
                    ResourceEvent::FetchOneError { id, errors }
                })),
            }
        }))
    }

    /// GET one page of the collection
    pub fn fetch_page(&self, page: u32, ancestors: &[EntityId]) -> Result<Task, ConfigurationError> {
        let call = self.prepare(SupportedOp::Collection, ancestors)?;
        let path = call.config.collection_path(ancestors);

        Ok(Task::new(
            format!("fetch {} page {}", path, page),
            move |dispatch| async move {
                match call.fetch_page(&*dispatch, &path, page).await {
                    Ok((_, body)) => TaskOutcome::Completed(body),
                    Err(failure) => TaskOutcome::Failed(failure),
                }
            },
        ))
    }

    /// Fetch `first_page`, then the remaining pages, at most
    /// [`MAX_CONCURRENT_PAGES`] at a time. Each page emits its own events; the
    /// first failure stops the walk and pages already merged stay cached.
    /// The outcome carries all page bodies in order.
    pub fn fetch_all(&self, first_page: u32, ancestors: &[EntityId]) -> Result<Task, ConfigurationError> {
        let call = self.prepare(SupportedOp::Collection, ancestors)?;
        let path = call.config.collection_path(ancestors);

        Ok(Task::new(format!("fetch all {}", path), move |dispatch| async move {
            let (first, body) = match call.fetch_page(&*dispatch, &path, first_page).await {
                Ok(fetched) => fetched,
                Err(failure) => return TaskOutcome::Failed(failure),
            };

            let last_page = first_page.saturating_add(first.total_pages.saturating_sub(1));
            let remaining = first_page.saturating_add(1)..=last_page;
            let (call, dispatch, path) = (&call, &*dispatch, path.as_str());
            let mut pages = stream::iter(remaining)
                .map(move |page| call.fetch_page(dispatch, path, page))
                .buffered(MAX_CONCURRENT_PAGES);

            let mut bodies = vec![body];
            while let Some(result) = pages.next().await {
                match result {
                    Ok((_, body)) => bodies.push(body),
                    Err(failure) => return TaskOutcome::Failed(failure),
                }
            }
            TaskOutcome::Completed(Value::Array(bodies))
        }))
    }

    /// POST a new entity to the collection
    pub fn create(
        &self,
        attributes: Map<String, Value>,
        ancestors: &[EntityId],
    ) -> Result<Task, ConfigurationError> {
        let call = self.prepare(SupportedOp::Collection, ancestors)?;
        let path = call.config.collection_path(ancestors);

        Ok(Task::new(format!("create {}", path), move |dispatch| async move {
            let body = Value::Object(attributes);
            let result = call
                .transport
                .request(Method::Post, &path, &[], Some(&body))
                .await
                .and_then(|body| {
                    let entity = entity_from(&body)?;
                    let id = entity
                        .get(call.config.id_field())
                        .and_then(EntityId::from_value)
                        .ok_or_else(|| {
                            TransportError::Decode(format!(
                                "created {} has no `{}`",
                                call.config.name(),
                                call.config.id_field()
                            ))
                        })?;
                    Ok((id, entity, body))
                });

            match result {
                Ok((id, entity, body)) => {
                    call.emit(&*dispatch, ResourceEvent::CreateSuccess { id, entity });
                    TaskOutcome::Completed(body)
                }
                Err(err) => TaskOutcome::Failed(call.fail(&*dispatch, err, |errors| {
                    ResourceEvent::CreateError { errors }
                })),
            }
        }))
    }

    /// PUT changed attributes; the response may be partial
    pub fn update(
        &self,
        id: impl Into<EntityId>,
        attributes: Map<String, Value>,
        ancestors: &[EntityId],
    ) -> Result<Task, ConfigurationError> {
        let call = self.prepare(SupportedOp::Single, ancestors)?;
        let id = id.into();
        let path = call.config.entity_path(&id, ancestors);

        Ok(Task::new(format!("update {}", path), move |dispatch| async move {
            let body = Value::Object(attributes);
            let result = call.transport.request(Method::Put, &path, &[], Some(&body)).await;
            call.settle_update(&*dispatch, id, result)
        }))
    }

    /// DELETE an entity
    pub fn delete(&self, id: impl Into<EntityId>, ancestors: &[EntityId]) -> Result<Task, ConfigurationError> {
        let call = self.prepare(SupportedOp::Single, ancestors)?;
        let id = id.into();
        let path = call.config.entity_path(&id, ancestors);

        Ok(Task::new(format!("delete {}", path), move |dispatch| async move {
            match call.transport.request(Method::Delete, &path, &[], None).await {
                Ok(body) => {
                    call.emit(&*dispatch, ResourceEvent::DeleteSuccess { id });
                    TaskOutcome::Completed(body)
                }
                Err(err) => TaskOutcome::Failed(call.fail(&*dispatch, err, |errors| {
                    ResourceEvent::DeleteError { id, errors }
                })),
            }
        }))
    }

    /// POST a named entity action (e.g. `enable_backups`). A returned entity
    /// is merged like an update response.
    pub fn perform(
        &self,
        id: impl Into<EntityId>,
        action: &str,
        body: Option<Value>,
        ancestors: &[EntityId],
    ) -> Result<Task, ConfigurationError> {
        let call = self.prepare(SupportedOp::Single, ancestors)?;
        let Some(action) = call.config.action(action) else {
            return Err(ConfigurationError::UnknownAction {
                resource: call.config.plural_name().to_string(),
                action: action.to_string(),
            });
        };
        let id = id.into();
        let path = format!(
            "{}/{}",
            call.config.entity_path(&id, ancestors),
            action.path.trim_start_matches('/')
        );

        Ok(Task::new(format!("{} {}", action.name, path), move |dispatch| async move {
            let result = call.transport.request(Method::Post, &path, &[], body.as_ref()).await;
            call.settle_update(&*dispatch, id, result)
        }))
    }
}

impl Call {
    fn emit(&self, dispatch: &dyn Dispatch, payload: ResourceEvent) {
        dispatch.emit(Event::new(self.address.clone(), payload));
    }

    /// Record a failure in the cache and keep it for the task outcome
    fn fail(
        &self,
        dispatch: &dyn Dispatch,
        err: TransportError,
        event: impl FnOnce(ErrorMap) -> ResourceEvent,
    ) -> TaskFailure {
        tracing::warn!("{}: {}", self.address, err);
        let errors = err.error_map();
        self.emit(dispatch, event(errors.clone()));
        TaskFailure {
            errors,
            source: err,
        }
    }

    fn settle_update(
        &self,
        dispatch: &dyn Dispatch,
        id: EntityId,
        result: Result<Value, TransportError>,
    ) -> TaskOutcome {
        match result {
            Ok(body) => {
                // Entity actions may answer with an empty body
                let entity = body.as_object().cloned().unwrap_or_default();
                self.emit(dispatch, ResourceEvent::UpdateSuccess { id, entity });
                TaskOutcome::Completed(body)
            }
            Err(err) => TaskOutcome::Failed(self.fail(dispatch, err, |errors| {
                ResourceEvent::UpdateError { id, errors }
            })),
        }
    }

    async fn fetch_page(
        &self,
        dispatch: &dyn Dispatch,
        path: &str,
        page: u32,
    ) -> Result<(PagePayload, Value), TaskFailure> {
        self.emit(dispatch, ResourceEvent::FetchPageBegin { page });
        let query = [("page".to_string(), page.to_string())];
        let result = self
            .transport
            .request(Method::Get, path, &query, None)
            .await
            .and_then(|body| parse_page(&body, self.config.response_path(), page).map(|p| (p, body)));

        match result {
            Ok((payload, body)) => {
                self.emit(dispatch, ResourceEvent::FetchPageSuccess(payload.clone()));
                Ok((payload, body))
            }
            Err(err) => Err(self.fail(dispatch, err, |errors| ResourceEvent::FetchPageError {
                page,
                errors,
            })),
        }
    }
}

fn entity_from(body: &Value) -> Result<Map<String, Value>, TransportError> {
    body.as_object()
        .cloned()
        .ok_or_else(|| TransportError::Decode("expected a JSON object".to_string()))
}

/// Read a page response: the entity list under `response_path` (or `data`),
/// plus `page`, `total_pages`/`pages` and `total_results`/`results`.
fn parse_page(body: &Value, response_path: &str, requested: u32) -> Result<PagePayload, TransportError> {
    let list = lookup(body, response_path)
        .or_else(|| body.get("data"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            TransportError::Decode(format!("page response has no `{}` list", response_path))
        })?;

    let entities: Vec<Map<String, Value>> = list
        .iter()
        .filter_map(|item| item.as_object().cloned())
        .collect();

    let number = |keys: &[&str]| keys.iter().find_map(|k| body.get(*k).and_then(Value::as_u64));
    let page = number(&["page"])
        .and_then(|p| u32::try_from(p).ok())
        .unwrap_or(requested);
    let total_pages = number(&["total_pages", "pages"])
        .and_then(|p| u32::try_from(p).ok())
        .unwrap_or(1);
    let total_results = number(&["total_results", "results"]).unwrap_or(entities.len() as u64);

    Ok(PagePayload {
        page,
        entities,
        total_pages,
        total_results,
    })
}

/// Follow a dot path into a JSON value
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|p| !p.is_empty())
        .try_fold(value, |current, part| current.get(part))
}
