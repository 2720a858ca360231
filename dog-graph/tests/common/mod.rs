#![allow(dead_code)]

use std::sync::Arc;

use dog_core::{Entity, EntityStore, MemoryStore, Principal, RequestContext};
use dog_graph::{
    Coordinator, EntityType, GraphSchema, OwnershipScope, Relation, RoleRequirement,
    RootOperation, ViewDefinition,
};
use serde_json::{Map, Value};

/// Blog schema shared by the integration suites.
///
/// * `public`: open reads over every post
/// * `admin`: admin-only reads and writes, scoped to `Post.ownerId`
/// * `staff`: staff-only listing of users
/// * `strict`: public reads where every post must have an author
pub fn blog_schema() -> Arc<GraphSchema> {
    let schema = GraphSchema::builder()
        .entity(EntityType::new("User").scalars(["name", "email"]))
        .unwrap()
        .entity(EntityType::new("Post").scalars(["title", "ownerId", "authorId"]))
        .unwrap()
        .entity(EntityType::new("Profile").scalars(["bio", "userId"]))
        .unwrap()
        .relation(Relation::belongs_to("Post", "author", "User", "authorId"))
        .unwrap()
        .relation(Relation::belongs_to("Post", "owner", "User", "ownerId"))
        .unwrap()
        .relation(Relation::has_many("User", "posts", "Post", "authorId"))
        .unwrap()
        .relation(Relation::has_one("User", "profile", "Profile", "userId"))
        .unwrap()
        .view(
            ViewDefinition::new("public", "Post")
                .root("posts", RootOperation::FindMany, RoleRequirement::public())
                .root("post", RootOperation::FindOne, RoleRequirement::public()),
        )
        .unwrap()
        .view(
            ViewDefinition::new("admin", "Post")
                .root("adminPost", RootOperation::FindOne, admin_only())
                .root("adminPosts", RootOperation::FindMany, admin_only())
                .root("createPost", RootOperation::Create, admin_only())
                .root("updatePost", RootOperation::Update, admin_only())
                .root("deletePost", RootOperation::Delete, admin_only())
                .scoped_by(OwnershipScope::owner_field("ownerId")),
        )
        .unwrap()
        .view(
            ViewDefinition::new("mine", "Post")
                .root("myFeed", RootOperation::FindMany, RoleRequirement::public())
                .root("myDraft", RootOperation::FindOne, RoleRequirement::public())
                .root("createDraft", RootOperation::Create, RoleRequirement::public())
                .root("editDraft", RootOperation::Update, RoleRequirement::public())
                .root("dropDraft", RootOperation::Delete, RoleRequirement::public())
                .scoped_by(OwnershipScope::owner_field("ownerId")),
        )
        .unwrap()
        .view(
            ViewDefinition::new("staff", "User").root(
                "users",
                RootOperation::FindMany,
                RoleRequirement::any_of(["staff", "admin"]),
            ),
        )
        .unwrap()
        .view(
            ViewDefinition::new("strict", "Post")
                .root("strictPost", RootOperation::FindOne, RoleRequirement::public())
                .require_relation("Post", "author"),
        )
        .unwrap()
        .build()
        .unwrap();
    Arc::new(schema)
}

fn admin_only() -> RoleRequirement {
    RoleRequirement::any_of(["admin"])
}

pub fn user(id: &str, name: &str) -> Entity {
    Entity::new("User", id).with_field("name", name)
}

pub fn post(id: &str, owner: &str, author: &str) -> Entity {
    Entity::new("Post", id)
        .with_field("title", format!("post-{id}"))
        .with_field("ownerId", owner)
        .with_field("authorId", author)
}

/// Three users; posts 1 and 2 owned by user 7, post 3 owned by user 9.
pub fn seeded_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new().with_entities([
        user("1", "ada"),
        user("7", "grace"),
        user("9", "linus"),
        post("1", "7", "1"),
        post("2", "7", "7"),
        post("3", "9", "1"),
        Entity::new("Profile", "p1").with_field("bio", "compilers").with_field("userId", "1"),
    ]))
}

pub fn coordinator(store: Arc<dyn EntityStore>) -> Coordinator {
    Coordinator::new(blog_schema(), store)
}

pub fn admin(id: &str) -> RequestContext {
    RequestContext::authenticated(Principal::new(id).with_role("admin"))
}

pub fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}
