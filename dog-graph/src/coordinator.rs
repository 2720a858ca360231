//! Resolution coordinator.
//!
//! One [`Coordinator::execute`] call is one resolution pass:
//!
//! ```text
//! Start -> Authorized -> RootFetched -> RelationsResolved -> Assembled
//!   \________\_______________\________________\______________-> Rejected
//! ```
//!
//! The pass owns its [`BatchWindow`]. Relations are resolved level by
//! level: every relation field of every entity at one depth is scheduled
//! into the window, the window is flushed once, and the children become
//! the next level. Siblings therefore share one store fetch per relation
//! and depth, whatever their number.
//!
//! A pass is all-or-nothing. The first failure rejects it, and dropping
//! the pass closes the window so nothing still pending reaches the store.

use std::collections::HashMap;
use std::sync::Arc;

use dog_core::{
    DogConfigSnapshot, Entity, EntityId, EntityStore, Predicate, RequestContext, ID_FIELD,
};
use futures::future::try_join_all;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn, Span};

use crate::batch::BatchWindow;
use crate::catalog::{Catalog, FieldKind, TYPENAME_FIELD};
use crate::error::{GraphError, GraphResult, RelationError};
use crate::gate;
use crate::resolver::{Related, RelationLoad, RelationResolver};
use crate::schema::GraphSchema;
use crate::scope::view_predicate;
use crate::selection::{Arguments, FieldRequest, QueryRequest, SelectionSet};
use crate::settings::GraphSettings;
use crate::view::{RootField, RootOperation, ViewDefinition};

/// Lifecycle of one resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Start,
    Authorized,
    RootFetched,
    RelationsResolved,
    Assembled,
    Rejected,
}

pub struct Coordinator {
    schema: Arc<GraphSchema>,
    store: Arc<dyn EntityStore>,
    settings: GraphSettings,
}

impl Coordinator {
    pub fn new(schema: Arc<GraphSchema>, store: Arc<dyn EntityStore>) -> Self {
        Self {
            schema,
            store,
            settings: GraphSettings::default(),
        }
    }

    pub fn from_config(
        schema: Arc<GraphSchema>,
        store: Arc<dyn EntityStore>,
        config: &DogConfigSnapshot,
    ) -> Self {
        Self::new(schema, store).with_settings(GraphSettings::from_config(config))
    }

    pub fn with_settings(mut self, settings: GraphSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn schema(&self) -> &GraphSchema {
        &self.schema
    }

    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    /// Run one resolution pass and return `{ <response key>: <result> }`.
    #[instrument(
        skip(self, ctx, request),
        fields(request_id = %ctx.request_id, root_field = %request.root_field, operation = tracing::field::Empty)
    )]
    pub async fn execute(&self, ctx: &RequestContext, request: &QueryRequest) -> GraphResult<Value> {
        let mut pass = Pass::new(self, ctx);
        let result = pass.run(request).await;

        match &result {
            Ok(_) => debug!("Pass finished after {} batch fetches", pass.window.fetch_count()),
            Err(GraphError::Auth(e)) => info!("Pass rejected at authorization: {}", e),
            Err(e) => warn!("Pass rejected: {}", e),
        }
        result
    }
}

/// Arena node: one resolved entity and the links to its related nodes,
/// indexed like the fields of its selection.
struct Node<'r> {
    entity: Entity,
    selection: &'r SelectionSet,
    links: Vec<Option<Link>>,
}

impl<'r> Node<'r> {
    fn new(entity: Entity, selection: &'r SelectionSet) -> Self {
        Self {
            entity,
            links: vec![None; selection.fields.len()],
            selection,
        }
    }
}

#[derive(Clone)]
enum Link {
    One(Option<usize>),
    Many(Vec<usize>),
}

struct Resolved<'r> {
    arena: Vec<Node<'r>>,
    roots: Vec<usize>,
}

struct Pass<'c> {
    coordinator: &'c Coordinator,
    ctx: &'c RequestContext,
    window: BatchWindow,
    state: PassState,
}

impl<'c> Pass<'c> {
    fn new(coordinator: &'c Coordinator, ctx: &'c RequestContext) -> Self {
        Self {
            coordinator,
            ctx,
            window: BatchWindow::new(),
            state: PassState::Start,
        }
    }

    fn transition(&mut self, next: PassState) {
        debug!("Pass {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    async fn run(&mut self, request: &QueryRequest) -> GraphResult<Value> {
        match self.resolve(request).await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.transition(PassState::Rejected);
                self.window.close();
                Err(e)
            }
        }
    }

    async fn resolve(&mut self, request: &QueryRequest) -> GraphResult<Value> {
        let coordinator = self.coordinator;
        let schema = coordinator.schema.as_ref();

        let (view, _) = schema
            .views()
            .resolve_root(&request.root_field)
            .ok_or_else(|| GraphError::UnknownRootField(request.root_field.clone()))?;
        let root = gate::authorize(view, &request.root_field, self.ctx.principal())?;
        Span::current().record("operation", root.operation.as_str());
        self.transition(PassState::Authorized);

        validate_selection(
            schema.catalog(),
            view.entity_type(),
            &request.selection,
            coordinator.settings.max_depth,
        )?;

        let entities = self.fetch_root(view, root, &request.arguments).await?;
        if root.operation.is_mutation() {
            info!(
                "{} on {} through view {} applied",
                root.operation.as_str(),
                view.entity_type(),
                view.name()
            );
        }
        self.transition(PassState::RootFetched);

        let resolved = self
            .resolve_relations(view, entities, &request.selection)
            .await?;
        self.transition(PassState::RelationsResolved);

        let result = if root.operation.returns_many() {
            Value::Array(
                resolved
                    .roots
                    .iter()
                    .map(|&id| project(&resolved.arena, id))
                    .collect(),
            )
        } else {
            resolved
                .roots
                .first()
                .map_or(Value::Null, |&id| project(&resolved.arena, id))
        };
        self.transition(PassState::Assembled);

        let mut response = Map::new();
        response.insert(request.response_key().to_string(), result);
        Ok(Value::Object(response))
    }

    /// Root fetch or mutation. Every store call carries the view's scope
    /// predicate; a scope nobody can satisfy short-circuits to the empty
    /// answer without touching the store.
    async fn fetch_root(
        &self,
        view: &ViewDefinition,
        root: &RootField,
        args: &Arguments,
    ) -> GraphResult<Vec<Entity>> {
        let store = self.coordinator.store.as_ref();
        let catalog = self.coordinator.schema.catalog();
        let settings = &self.coordinator.settings;
        let principal = self.ctx.principal();
        let entity_type = view.entity_type();
        let scope = view_predicate(view, principal);

        match root.operation {
            RootOperation::FindMany => {
                let mut predicate = Predicate::Always;
                for (field, value) in args.filter.iter().flatten() {
                    require_scalar(catalog, entity_type, field)?;
                    predicate = predicate.and(Predicate::eq(field.clone(), value.clone()));
                }
                let predicate = predicate.and(scope);
                if predicate.is_never() {
                    return Ok(Vec::new());
                }

                let rows = store.find_many(entity_type, &predicate).await?;
                let limit = settings.page_limit(args.limit).unwrap_or(usize::MAX);
                Ok(rows
                    .into_iter()
                    .skip(args.offset.unwrap_or(0))
                    .take(limit)
                    .collect())
            }
            RootOperation::FindOne => {
                let id = require_id(root, args)?;
                if scope.is_never() {
                    return Err(GraphError::not_found(entity_type, id.clone()));
                }
                store
                    .find_one(entity_type, id, &scope)
                    .await?
                    .map(|e| vec![e])
                    .ok_or_else(|| GraphError::not_found(entity_type, id.clone()))
            }
            RootOperation::Create => {
                let mut data = require_data(root, args)?;
                for field in data.keys() {
                    require_scalar(catalog, entity_type, field)?;
                }
                if let Some(owner) = view.scope() {
                    // a chosen id could collide with a row outside the scope
                    if data.contains_key(ID_FIELD) {
                        return Err(GraphError::invalid_request(
                            "`id` is assigned by the store in a scoped view",
                        ));
                    }
                    owner.stamp(principal, &mut data)?;
                }
                Ok(vec![store.create(entity_type, data).await?])
            }
            RootOperation::Update => {
                let id = require_id(root, args)?;
                let data = require_data(root, args)?;
                if data.contains_key(ID_FIELD) {
                    return Err(GraphError::invalid_request("`id` is not writable"));
                }
                for field in data.keys() {
                    require_scalar(catalog, entity_type, field)?;
                }
                if let Some(owner) = view.scope() {
                    owner.guard_update(&data)?;
                }
                if scope.is_never() {
                    return Err(GraphError::not_found(entity_type, id.clone()));
                }
                store
                    .update(entity_type, id, data, &scope)
                    .await?
                    .map(|e| vec![e])
                    .ok_or_else(|| GraphError::not_found(entity_type, id.clone()))
            }
            RootOperation::Delete => {
                let id = require_id(root, args)?;
                if scope.is_never() {
                    return Err(GraphError::not_found(entity_type, id.clone()));
                }
                store
                    .delete(entity_type, id, &scope)
                    .await?
                    .map(|e| vec![e])
                    .ok_or_else(|| GraphError::not_found(entity_type, id.clone()))
            }
        }
    }

    async fn resolve_relations<'r>(
        &self,
        view: &ViewDefinition,
        entities: Vec<Entity>,
        selection: &'r SelectionSet,
    ) -> GraphResult<Resolved<'r>> {
        let store = self.coordinator.store.as_ref();
        let resolver = RelationResolver::new(self.coordinator.schema.catalog(), view, &self.window);

        let mut arena: Vec<Node<'r>> = entities
            .into_iter()
            .map(|entity| Node::new(entity, selection))
            .collect();
        let roots: Vec<usize> = (0..arena.len()).collect();
        let mut frontier = roots.clone();
        let mut depth = 1;

        while !frontier.is_empty() {
            let mut targets: Vec<(usize, usize, &'r SelectionSet)> = Vec::new();
            let mut loads: Vec<RelationLoad> = Vec::new();

            for &node_id in &frontier {
                let node_selection: &'r SelectionSet = arena[node_id].selection;
                for (slot, field) in node_selection.fields.iter().enumerate() {
                    let Some(child_selection) = field.selection.as_ref() else {
                        continue;
                    };
                    loads.push(resolver.resolve(&arena[node_id].entity, &field.name)?);
                    targets.push((node_id, slot, child_selection));
                }
            }
            if loads.is_empty() {
                break;
            }

            let fetches = self.window.dispatch(store).await?;
            debug!(
                "Depth {}: {} relation loads, {} batch fetches",
                depth,
                loads.len(),
                fetches
            );

            let related = try_join_all(loads.into_iter().map(RelationLoad::finish)).await?;

            let mut next = Vec::new();
            for ((node_id, slot, child_selection), related) in targets.into_iter().zip(related) {
                let link = match related {
                    Related::One(entity) => {
                        Link::One(entity.map(|e| push_node(&mut arena, &mut next, e, child_selection)))
                    }
                    Related::Many(entities) => Link::Many(
                        entities
                            .into_iter()
                            .map(|e| push_node(&mut arena, &mut next, e, child_selection))
                            .collect(),
                    ),
                };
                arena[node_id].links[slot] = Some(link);
            }

            frontier = next;
            depth += 1;
        }

        Ok(Resolved { arena, roots })
    }
}

impl Drop for Pass<'_> {
    fn drop(&mut self) {
        self.window.close();
    }
}

fn push_node<'r>(
    arena: &mut Vec<Node<'r>>,
    frontier: &mut Vec<usize>,
    entity: Entity,
    selection: &'r SelectionSet,
) -> usize {
    arena.push(Node::new(entity, selection));
    let id = arena.len() - 1;
    frontier.push(id);
    id
}

/// Shape one node as requested. Missing scalars come back as null.
fn project(arena: &[Node<'_>], id: usize) -> Value {
    let node = &arena[id];
    let mut out = Map::new();

    for (field, link) in node.selection.fields.iter().zip(&node.links) {
        let value = match link {
            Some(Link::One(child)) => child.map_or(Value::Null, |c| project(arena, c)),
            Some(Link::Many(children)) => {
                Value::Array(children.iter().map(|&c| project(arena, c)).collect())
            }
            None if field.name == TYPENAME_FIELD => {
                Value::String(node.entity.entity_type.clone())
            }
            None => node.entity.value(&field.name).unwrap_or(Value::Null),
        };
        out.insert(field.response_key().to_string(), value);
    }
    Value::Object(out)
}

/// Check a request tree against the catalog before anything is fetched.
fn validate_selection(
    catalog: &Catalog,
    entity_type: &str,
    selection: &SelectionSet,
    max_depth: usize,
) -> GraphResult<()> {
    let depth = selection.depth();
    if depth > max_depth {
        return Err(GraphError::invalid_request(format!(
            "selection depth {} exceeds the limit of {}",
            depth, max_depth
        )));
    }
    validate_fields(catalog, entity_type, selection)
}

fn validate_fields(catalog: &Catalog, entity_type: &str, selection: &SelectionSet) -> GraphResult<()> {
    let mut keys: HashMap<&str, &FieldRequest> = HashMap::new();

    for field in &selection.fields {
        // one response key holds exactly one shape
        if let Some(previous) = keys.insert(field.response_key(), field) {
            if previous.name != field.name {
                return Err(GraphError::invalid_request(format!(
                    "`{}` is used as a key for both `{}` and `{}`",
                    field.response_key(),
                    previous.name,
                    field.name
                )));
            }
            if previous.selection != field.selection {
                return Err(GraphError::invalid_request(format!(
                    "`{}` is requested twice with different selections",
                    field.response_key()
                )));
            }
        }

        let kind = catalog
            .field_kind(entity_type, &field.name)
            .ok_or_else(|| RelationError::UnknownField {
                entity_type: entity_type.to_string(),
                field: field.name.clone(),
            })?;

        match (kind, &field.selection) {
            (FieldKind::Relation(relation), Some(nested)) => {
                validate_fields(catalog, relation.target_type(), nested)?
            }
            (FieldKind::Relation(_), None) => {
                return Err(GraphError::invalid_request(format!(
                    "relation `{}` of {} needs a selection",
                    field.name, entity_type
                )))
            }
            (_, Some(_)) => {
                return Err(GraphError::invalid_request(format!(
                    "scalar `{}` of {} cannot have a selection",
                    field.name, entity_type
                )))
            }
            (_, None) => {}
        }
    }
    Ok(())
}

fn require_scalar(catalog: &Catalog, entity_type: &str, field: &str) -> GraphResult<()> {
    match catalog.field_kind(entity_type, field) {
        Some(FieldKind::Scalar) => Ok(()),
        _ => Err(RelationError::UnknownField {
            entity_type: entity_type.to_string(),
            field: field.to_string(),
        }
        .into()),
    }
}

fn require_id<'a>(root: &RootField, args: &'a Arguments) -> GraphResult<&'a EntityId> {
    args.id.as_ref().ok_or_else(|| {
        GraphError::invalid_request(format!("`{}` requires an `id` argument", root.name))
    })
}

fn require_data(root: &RootField, args: &Arguments) -> GraphResult<Map<String, Value>> {
    args.data.clone().ok_or_else(|| {
        GraphError::invalid_request(format!("`{}` requires a `data` argument", root.name))
    })
}
