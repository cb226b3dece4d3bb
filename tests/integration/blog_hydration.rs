//! End-to-end hydration of blog posts through the facade crate.

use reinhardt_hydration::prelude::*;
use reinhardt_hydration_integration_tests::{Author, Calls, Post, Published, blog_container, record};
use rstest::*;
use serde_json::json;
use std::sync::Arc;

#[fixture]
fn calls() -> Arc<Calls> {
	Arc::new(Calls::default())
}

#[rstest]
fn test_post_hydrates_eager_and_lazy_fields(calls: Arc<Calls>) {
	// Arrange
	let hydrator = Hydrator::new(Arc::new(blog_container(calls.clone())));
	let row = record(json!({
		"id": "12",
		"title": "  Hello Rust  ",
		"tag_list": "rust,,orm",
		"status": "published",
		"author_id": 3,
	}));

	// Act
	let mut post = hydrator.hydrate::<Post>(&row).unwrap().unwrap();

	// Assert
	assert_eq!(post.id, 12);
	assert_eq!(post.title, "Hello Rust");
	assert_eq!(post.tags, vec!["rust", "orm"]);
	assert_eq!(post.state, Published::Live);
	assert_eq!(post.slug, "hello-rust");
	assert!(post.author.is_none());
	assert_eq!(calls.author_lookups(), 0);

	let author = post.get("author", |p| p.author.clone()).unwrap();
	post.get("author", |p| p.author.clone()).unwrap();
	assert_eq!(
		author.as_deref(),
		Some(&Author {
			id: 3,
			name: "author-3".into(),
		})
	);
	assert_eq!(calls.author_lookups(), 1);
}

#[rstest]
fn test_missing_status_keeps_default_state(calls: Arc<Calls>) {
	// Arrange
	let hydrator = Hydrator::new(Arc::new(blog_container(calls)));

	// Act
	let post = hydrator
		.hydrate::<Post>(&record(json!({"id": 1, "title": "Draft"})))
		.unwrap()
		.unwrap();

	// Assert
	assert_eq!(post.state, Published::Draft);
	assert!(post.tags.is_empty());
}

#[rstest]
fn test_batch_hydration_creates_independent_proxies(calls: Arc<Calls>) {
	// Arrange
	let hydrator = Hydrator::new(Arc::new(blog_container(calls.clone())));
	let rows = [
		record(json!({"id": 1, "author_id": 1})),
		record(json!({"id": 2, "author_id": 2})),
	];

	// Act
	let mut posts: Vec<_> = hydrator
		.hydrate_set::<Post, _, _>(rows.iter().map(Some))
		.unwrap()
		.into_iter()
		.flatten()
		.collect();
	let names: Vec<String> = posts
		.iter_mut()
		.map(|post| {
			post.get("author", |p| p.author.as_ref().map(|a| a.name.clone()))
				.unwrap()
				.unwrap_or_default()
		})
		.collect();

	// Assert
	assert_eq!(names, vec!["author-1", "author-2"]);
	assert_eq!(calls.author_lookups(), 2);
	assert!(posts.iter().all(|post| post.is_completed("author")));
}

#[rstest]
fn test_lookup_record_goes_through_posts_service(calls: Arc<Calls>) {
	// Arrange
	let hydrator = Hydrator::new(Arc::new(blog_container(calls.clone())));

	// Act
	let found = hydrator.lookup_record::<Post>(&json!(5)).unwrap();
	let missing = hydrator.lookup_record::<Post>(&json!(-1)).unwrap();

	// Assert
	let found: serde_json::Value = FromFieldValue::from_field_value(found.unwrap()).unwrap();
	assert_eq!(found, json!({"id": 5, "title": "found"}));
	assert!(missing.is_none());
	assert_eq!(calls.post_lookups(), 2);
}

#[rstest]
fn test_unregistered_service_is_reported(calls: Arc<Calls>) {
	// Arrange
	let container = blog_container(calls);
	container.clear();
	let hydrator = Hydrator::new(Arc::new(container));

	// Act
	let result = hydrator.hydrate::<Post>(&record(json!({"id": 1, "status": "published"})));

	// Assert
	match result {
		Err(HydrationError::DependencyNotFound(name)) => assert_eq!(name, "statuses"),
		other => panic!("expected a missing dependency, got {other:?}"),
	}
}
