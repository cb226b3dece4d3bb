//! Cached hydration of lazy proxies and persisted proxy artifacts.

use reinhardt_hydration::hydrator::ProxyGenerator;
use reinhardt_hydration::prelude::*;
use reinhardt_hydration_integration_tests::{Calls, Post, blog_container, record};
use rstest::*;
use serde_json::json;
use std::cell::Cell;
use std::sync::Arc;

#[fixture]
fn calls() -> Arc<Calls> {
	Arc::new(Calls::default())
}

#[rstest]
fn test_cached_proxy_keeps_resolving_lazily(calls: Arc<Calls>) {
	// Arrange
	let cache = Arc::new(InMemoryCache::new());
	let hydrator = Hydrator::builder(Arc::new(blog_container(calls.clone())))
		.cache(cache.clone())
		.build();
	let produced = Cell::new(0);
	let producer = || {
		produced.set(produced.get() + 1);
		Some(record(json!({"id": 4, "title": "Cached", "author_id": 9})))
	};

	// Act
	let first = hydrator.hydrate_cached::<Post, _, _>("post:4", producer).unwrap();
	let mut second = hydrator
		.hydrate_cached::<Post, _, _>("post:4", producer)
		.unwrap()
		.unwrap();
	let author = second.get("author", |p| p.author.clone()).unwrap();

	// Assert
	assert_eq!(produced.get(), 1);
	assert_eq!(author.map(|a| a.id), Some(9));
	assert_eq!(calls.author_lookups(), 1);
	// The cached copy is untouched by reads on the returned clone.
	assert!(!first.unwrap().is_completed("author"));
	assert_eq!(cache.get_statistics().hits, 1);
}

#[rstest]
fn test_proxy_artifacts_are_written_once_per_fingerprint(calls: Arc<Calls>) {
	// Arrange
	let dir = tempfile::tempdir().unwrap();
	let settings = HydratorSettings::new()
		.with_proxy_dir(dir.path())
		.with_release("2024.1");
	let hydrator = Hydrator::builder(Arc::new(blog_container(calls)))
		.settings(settings)
		.build();

	// Act
	for id in 1..=3 {
		hydrator
			.hydrate::<Post>(&record(json!({"id": id})))
			.unwrap()
			.unwrap();
	}

	// Assert
	let artifacts: Vec<_> = std::fs::read_dir(dir.path())
		.unwrap()
		.map(|entry| entry.unwrap().path())
		.collect();
	assert_eq!(artifacts.len(), 1);
	let rendered = std::fs::read_to_string(&artifacts[0]).unwrap();
	assert!(rendered.contains("PostProxy"));
	assert!(rendered.contains("author_id"));
}

#[rstest]
fn test_release_bump_regenerates_artifact() {
	// Arrange
	let dir = tempfile::tempdir().unwrap();
	let metadata = reinhardt_hydration::hydrator::metadata_for::<Post>();
	let before = ProxyGenerator::new(Some(dir.path().to_path_buf()), "1.0");
	let after = ProxyGenerator::new(Some(dir.path().to_path_buf()), "1.1");

	// Act
	let old = before.proxy_for(&*metadata).unwrap();
	let new = after.proxy_for(&*metadata).unwrap();

	// Assert
	assert_ne!(old.fingerprint, new.fingerprint);
	assert_eq!(old.accessors, new.accessors);
	assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}
