//! Integration test utilities for Reinhardt hydration
//!
//! A small blog domain wired through the facade crate: derived models, a
//! service container with call counters and record helpers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use reinhardt_hydration::prelude::*;
use serde_json::Value;

/// Publication state computed from the `status` column.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Published {
	#[default]
	Draft,
	Live,
}

/// A blog author as returned by the `authors` service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
	pub id: i64,
	pub name: String,
}

/// A blog post row.
#[derive(Debug, Default, Clone, Hydrate)]
#[hydrate(crate = "reinhardt_hydration::hydrator")]
#[hydrate(locator(service = "posts", method = "find"))]
pub struct Post {
	pub id: i64,
	#[hydrate(filter = "trim")]
	pub title: String,
	#[hydrate(field = "tag_list", filter = "explode")]
	pub tags: Vec<String>,
	#[hydrate(field = "status", resolver = "@statuses::parse", setter = "set_state")]
	pub state: Published,
	#[hydrate(field = "author_id", resolver = "@authors::find", lazy)]
	pub author: Option<Arc<Author>>,
	#[hydrate(field = "$this", resolver = "@posts::slug")]
	pub slug: String,
}

impl Post {
	pub fn set_state(&mut self, live: bool) {
		self.state = if live { Published::Live } else { Published::Draft };
	}
}

/// Call counters shared with the registered services.
#[derive(Debug, Default)]
pub struct Calls {
	pub author_lookups: AtomicUsize,
	pub post_lookups: AtomicUsize,
}

impl Calls {
	pub fn author_lookups(&self) -> usize {
		self.author_lookups.load(Ordering::SeqCst)
	}

	pub fn post_lookups(&self) -> usize {
		self.post_lookups.load(Ordering::SeqCst)
	}
}

/// Builds a container with the `authors`, `statuses` and `posts` services.
pub fn blog_container(calls: Arc<Calls>) -> ServiceContainer {
	let container = ServiceContainer::new();

	let author_calls = calls.clone();
	container.register_service(
		"authors",
		MethodTable::new("authors").method("find", move |input| {
			author_calls.author_lookups.fetch_add(1, Ordering::SeqCst);
			Ok(match input.value().and_then(Value::as_i64) {
				Some(id) if id > 0 => FieldValue::object(Author {
					id,
					name: format!("author-{id}"),
				}),
				_ => FieldValue::Null,
			})
		}),
	);

	container.register_service(
		"statuses",
		MethodTable::new("statuses").method("parse", |input| {
			let live = input.value().and_then(Value::as_str) == Some("published");
			Ok(FieldValue::Bool(live))
		}),
	);

	let post_calls = calls;
	container.register_service(
		"posts",
		MethodTable::new("posts")
			.method("find", move |input| {
				post_calls.post_lookups.fetch_add(1, Ordering::SeqCst);
				Ok(match input.value().and_then(Value::as_i64) {
					Some(id) if id > 0 => FieldValue::from(serde_json::json!({"id": id, "title": "found"})),
					_ => FieldValue::Null,
				})
			})
			.method("slug", |input| {
				let title = input.instance::<Post>().map(|post| post.title.clone()).unwrap_or_default();
				Ok(FieldValue::from(title.to_lowercase().replace(' ', "-")))
			}),
	);

	container
}

/// Converts a JSON object literal into a record.
pub fn record(value: Value) -> Record {
	match value {
		Value::Object(map) => map,
		other => panic!("expected a JSON object, got {other}"),
	}
}
