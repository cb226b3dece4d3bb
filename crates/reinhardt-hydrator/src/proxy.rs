//! Lazy field proxies.
//!
//! Types with lazy fields are hydrated into a [`Proxy`], which wraps the
//! instance and resolves each lazy field through the [`Locator`] the first time
//! it is read. Which accessors are intercepted is described by a [`ProxySpec`]
//! artifact, generated once per [`Fingerprint`] and persisted for reuse.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use md5::{Digest, Md5};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HydrationError, HydrationResult};
use crate::locator::{Locator, ResolverInput};
use crate::metadata::{Hydrate, ResolverRef, TypeMetadata, metadata_for};
use crate::settings::HydratorSettings;
use crate::value::{FieldValue, Record};

static NULL_VALUE: Value = Value::Null;

/// Freshness key of a proxy artifact.
///
/// Hex MD5 of the declaring source file's modification time, the type path
/// and the release stamp. Touching the source or bumping the release yields a
/// new fingerprint, so stale artifacts are never picked up again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
	pub fn compute<T: 'static>(metadata: &TypeMetadata<T>, release: &str) -> Self {
		let mtime = source_mtime(metadata);
		Self::from_parts(mtime, metadata.type_path(), release)
	}

	pub fn from_parts(mtime: u64, type_path: &str, release: &str) -> Self {
		let digest = Md5::digest(format!("{mtime}{type_path}{release}").as_bytes());
		Self(hex::encode(digest))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Fingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Modification time of the file declaring the type, in seconds since the epoch.
///
/// `file!()` paths are relative to the workspace root while the manifest dir
/// points at the declaring crate, so every ancestor of the manifest dir is
/// tried as a base.
fn source_mtime<T: 'static>(metadata: &TypeMetadata<T>) -> u64 {
	let file = metadata.source_file();
	if file.is_empty() {
		return 0;
	}
	let file_path = Path::new(file);
	let mut candidates = vec![file_path.to_path_buf()];
	if file_path.is_relative() && !metadata.manifest_dir().is_empty() {
		candidates.extend(
			Path::new(metadata.manifest_dir())
				.ancestors()
				.map(|base| base.join(file_path)),
		);
	}

	for candidate in &candidates {
		let modified = fs::metadata(candidate).and_then(|meta| meta.modified());
		if let Ok(modified) = modified {
			return modified
				.duration_since(UNIX_EPOCH)
				.map(|elapsed| elapsed.as_secs())
				.unwrap_or_default();
		}
	}
	tracing::warn!(
		target_type = metadata.type_path(),
		source = file,
		"could not read source modification time, fingerprinting with 0"
	);
	0
}

/// Where a lazy accessor takes its resolver argument from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", content = "key", rename_all = "snake_case")]
pub enum Lookup {
	/// The raw hydration record value under this key.
	Param(String),
	/// The wrapped instance.
	Instance,
}

/// One intercepted accessor pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LazyAccessor {
	pub field: String,
	pub getter: String,
	/// Present when explicit assignment should mark the field completed.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub setter: Option<String>,
	pub resolver: ResolverRef,
	pub lookup: Lookup,
}

/// The proxy artifact for one type and fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySpec {
	pub target: String,
	pub proxy: String,
	pub fingerprint: Fingerprint,
	pub accessors: Vec<LazyAccessor>,
}

impl ProxySpec {
	pub fn accessor(&self, field: &str) -> Option<&LazyAccessor> {
		self.accessors.iter().find(|accessor| accessor.field == field)
	}
}

/// Produces and caches [`ProxySpec`] artifacts.
///
/// Artifacts are looked up in memory first, then under the artifact
/// directory as `<fingerprint>.proxy.json`. Generation is deterministic, so
/// two callers racing on the same fingerprint write identical bytes.
pub struct ProxyGenerator {
	dir: Option<PathBuf>,
	release: String,
	loaded: RwLock<HashMap<Fingerprint, Arc<ProxySpec>>>,
}

impl ProxyGenerator {
	pub fn new(dir: Option<PathBuf>, release: impl Into<String>) -> Self {
		Self {
			dir,
			release: release.into(),
			loaded: RwLock::new(HashMap::new()),
		}
	}

	/// A generator that never touches the filesystem.
	pub fn in_memory(release: impl Into<String>) -> Self {
		Self::new(None, release)
	}

	pub fn from_settings(settings: &HydratorSettings) -> Self {
		Self::new(settings.proxy_dir.clone(), settings.release.clone())
	}

	pub fn release(&self) -> &str {
		&self.release
	}

	pub fn dir(&self) -> Option<&Path> {
		self.dir.as_deref()
	}

	pub fn fingerprint<T: 'static>(&self, metadata: &TypeMetadata<T>) -> Fingerprint {
		Fingerprint::compute(metadata, &self.release)
	}

	/// Path of the artifact for `fingerprint`, if artifacts are persisted.
	pub fn artifact_path(&self, fingerprint: &Fingerprint) -> Option<PathBuf> {
		self.dir
			.as_ref()
			.map(|dir| dir.join(format!("{fingerprint}.proxy.json")))
	}

	/// Describes the accessors a proxy of `T` intercepts.
	pub fn build_spec<T: 'static>(&self, metadata: &TypeMetadata<T>, fingerprint: Fingerprint) -> ProxySpec {
		let accessors = metadata
			.lazy_fields()
			.filter_map(|spec| {
				let resolver = spec.resolver.clone()?;
				let lookup = if spec.is_self_reference() {
					Lookup::Instance
				} else {
					Lookup::Param(spec.source_key.clone())
				};
				Some(LazyAccessor {
					field: spec.name.clone(),
					getter: spec.getter_name(),
					setter: spec.setter.as_ref().map(|setter| setter.name.clone()),
					resolver,
					lookup,
				})
			})
			.collect();
		ProxySpec {
			target: metadata.type_path().to_string(),
			proxy: format!("{}Proxy", metadata.type_name()),
			fingerprint,
			accessors,
		}
	}

	/// Renders the artifact for the current fingerprint.
	pub fn generate<T: 'static>(&self, metadata: &TypeMetadata<T>) -> HydrationResult<String> {
		let spec = self.build_spec(metadata, self.fingerprint(metadata));
		render(&spec)
	}

	/// Returns the artifact for `T`, generating and persisting it if needed.
	pub fn proxy_for<T: 'static>(&self, metadata: &TypeMetadata<T>) -> HydrationResult<Arc<ProxySpec>> {
		let fingerprint = self.fingerprint(metadata);
		if let Some(spec) = self.loaded.read().get(&fingerprint) {
			return Ok(spec.clone());
		}

		let spec = match self.artifact_path(&fingerprint) {
			Some(path) => self.load_or_generate(metadata, fingerprint.clone(), &path)?,
			None => self.build_spec(metadata, fingerprint.clone()),
		};
		let mut loaded = self.loaded.write();
		Ok(loaded.entry(fingerprint).or_insert_with(|| Arc::new(spec)).clone())
	}

	fn load_or_generate<T: 'static>(
		&self,
		metadata: &TypeMetadata<T>,
		fingerprint: Fingerprint,
		path: &Path,
	) -> HydrationResult<ProxySpec> {
		if path.exists() {
			let persisted = fs::read_to_string(path)
				.map_err(HydrationError::from)
				.and_then(|source| serde_json::from_str::<ProxySpec>(&source).map_err(HydrationError::from));
			match persisted {
				Ok(spec) if spec.fingerprint == fingerprint => {
					tracing::debug!(target_type = metadata.type_path(), %fingerprint, "reusing proxy artifact");
					return Ok(spec);
				}
				Ok(_) => {
					tracing::warn!(path = %path.display(), "proxy artifact fingerprint mismatch, regenerating");
				}
				Err(error) => {
					tracing::warn!(path = %path.display(), %error, "unreadable proxy artifact, regenerating");
				}
			}
		}

		let spec = self.build_spec(metadata, fingerprint);
		let rendered = render(&spec)?;
		let artifact_error = |error: std::io::Error| HydrationError::ProxyArtifact {
			target: spec.target.clone(),
			message: format!("{}: {error}", path.display()),
		};
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).map_err(artifact_error)?;
		}
		fs::write(path, rendered).map_err(artifact_error)?;
		tracing::debug!(
			target_type = metadata.type_path(),
			path = %path.display(),
			accessors = spec.accessors.len(),
			"generated proxy artifact"
		);
		Ok(spec)
	}
}

impl Default for ProxyGenerator {
	fn default() -> Self {
		Self::from_settings(&HydratorSettings::default())
	}
}

impl fmt::Debug for ProxyGenerator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProxyGenerator")
			.field("dir", &self.dir)
			.field("release", &self.release)
			.field("loaded", &self.loaded.read().len())
			.finish()
	}
}

fn render(spec: &ProxySpec) -> HydrationResult<String> {
	let mut rendered = serde_json::to_string_pretty(spec)?;
	rendered.push('\n');
	Ok(rendered)
}

/// Everything a proxy needs to resolve its lazy fields later.
pub struct LazyBinding<T> {
	pub(crate) params: Record,
	pub(crate) locator: Arc<dyn Locator>,
	pub(crate) spec: Arc<ProxySpec>,
	pub(crate) metadata: Arc<TypeMetadata<T>>,
}

impl<T> LazyBinding<T> {
	pub fn new(
		params: Record,
		locator: Arc<dyn Locator>,
		spec: Arc<ProxySpec>,
		metadata: Arc<TypeMetadata<T>>,
	) -> Self {
		Self {
			params,
			locator,
			spec,
			metadata,
		}
	}

	pub fn spec(&self) -> &ProxySpec {
		&self.spec
	}
}

impl<T> Clone for LazyBinding<T> {
	fn clone(&self) -> Self {
		Self {
			params: self.params.clone(),
			locator: self.locator.clone(),
			spec: self.spec.clone(),
			metadata: self.metadata.clone(),
		}
	}
}

struct Resolution<T> {
	locator: Arc<dyn Locator>,
	spec: Arc<ProxySpec>,
	metadata: Arc<TypeMetadata<T>>,
}

impl<T> Clone for Resolution<T> {
	fn clone(&self) -> Self {
		Self {
			locator: self.locator.clone(),
			spec: self.spec.clone(),
			metadata: self.metadata.clone(),
		}
	}
}

/// A hydrated instance whose lazy fields resolve on first read.
///
/// Eager fields are read through `Deref`. Lazy fields are read with
/// [`Proxy::load`] or [`Proxy::get`], which call the field's resolver at most
/// once per proxy. Assigning a lazy field with [`Proxy::set`] or
/// [`Proxy::set_with`] marks it completed, so a later read keeps the
/// assigned value.
pub struct Proxy<T> {
	inner: T,
	params: Record,
	completed: HashSet<String>,
	resolution: Option<Resolution<T>>,
}

impl<T: Hydrate> Proxy<T> {
	pub fn new(inner: T, binding: Option<LazyBinding<T>>) -> Self {
		let (params, resolution) = match binding {
			Some(binding) => (
				binding.params,
				Some(Resolution {
					locator: binding.locator,
					spec: binding.spec,
					metadata: binding.metadata,
				}),
			),
			None => (Record::new(), None),
		};
		Self {
			inner,
			params,
			completed: HashSet::new(),
			resolution,
		}
	}

	/// Replaces the raw record lazy fields read their input from.
	pub fn set_params(&mut self, params: Record) {
		self.params = params;
	}

	pub fn params(&self) -> &Record {
		&self.params
	}

	/// Whether `field` has been resolved or explicitly assigned.
	pub fn is_completed(&self, field: &str) -> bool {
		self.completed.contains(field)
	}

	/// Whether `field` is resolved lazily by this proxy.
	pub fn is_lazy(&self, field: &str) -> bool {
		self.resolution
			.as_ref()
			.is_some_and(|resolution| resolution.spec.accessor(field).is_some())
	}

	pub fn spec(&self) -> Option<&ProxySpec> {
		self.resolution.as_ref().map(|resolution| resolution.spec.as_ref())
	}

	/// Resolves `field` if it is lazy and still pending, then returns the instance.
	pub fn load(&mut self, field: &str) -> HydrationResult<&T> {
		self.resolve(field)?;
		Ok(&self.inner)
	}

	/// Resolves `field` if needed and reads from the instance.
	///
	/// # Examples
	///
	/// ```ignore
	/// let owner = proxy.get("owner", |post| post.owner.clone())?;
	/// ```
	pub fn get<R>(&mut self, field: &str, reader: impl FnOnce(&T) -> R) -> HydrationResult<R> {
		self.resolve(field)?;
		Ok(reader(&self.inner))
	}

	/// Resolves every pending lazy field.
	pub fn load_all(&mut self) -> HydrationResult<&T> {
		let fields: Vec<String> = self
			.resolution
			.as_ref()
			.map(|resolution| resolution.spec.accessors.iter().map(|a| a.field.clone()).collect())
			.unwrap_or_default();
		for field in fields {
			self.resolve(&field)?;
		}
		Ok(&self.inner)
	}

	/// Assigns `field` through its registered setter.
	///
	/// Lazy fields are marked completed. Fields without a setter are an error.
	pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> HydrationResult<()> {
		let metadata = match &self.resolution {
			Some(resolution) => resolution.metadata.clone(),
			None => metadata_for::<T>(),
		};
		let setter = metadata
			.get_field(field)
			.and_then(|spec| spec.setter.as_ref())
			.ok_or_else(|| HydrationError::MissingSetter(field.to_string()))?;
		(setter.apply)(&mut self.inner, value.into())?;
		if self.is_lazy(field) {
			self.completed.insert(field.to_string());
		}
		Ok(())
	}

	/// Mutates the instance directly and marks `field` completed.
	pub fn set_with(&mut self, field: &str, assign: impl FnOnce(&mut T)) {
		assign(&mut self.inner);
		self.completed.insert(field.to_string());
	}

	pub fn inner(&self) -> &T {
		&self.inner
	}

	/// Unwraps the instance. Pending lazy fields stay unresolved.
	pub fn into_inner(self) -> T {
		self.inner
	}

	fn resolve(&mut self, field: &str) -> HydrationResult<()> {
		if self.completed.contains(field) {
			return Ok(());
		}
		let Some(resolution) = &self.resolution else {
			return Ok(());
		};
		let Some(accessor) = resolution.spec.accessor(field) else {
			return Ok(());
		};

		let input = match &accessor.lookup {
			Lookup::Param(key) => ResolverInput::Value(self.params.get(key).unwrap_or(&NULL_VALUE)),
			Lookup::Instance => ResolverInput::Instance(&self.inner),
		};
		let value = accessor.resolver.invoke(&*resolution.locator, input)?;

		if !value.is_null() {
			match resolution
				.metadata
				.get_field(field)
				.and_then(|spec| spec.setter.as_ref())
			{
				Some(setter) => (setter.apply)(&mut self.inner, value)?,
				None => tracing::trace!(field, "lazy field has no setter, value dropped"),
			}
		}
		self.completed.insert(field.to_string());
		Ok(())
	}
}

impl<T> Deref for Proxy<T> {
	type Target = T;

	fn deref(&self) -> &T {
		&self.inner
	}
}

impl<T: Clone> Clone for Proxy<T> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
			params: self.params.clone(),
			completed: self.completed.clone(),
			resolution: self.resolution.clone(),
		}
	}
}

impl<T: fmt::Debug> fmt::Debug for Proxy<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut completed: Vec<&str> = self.completed.iter().map(String::as_str).collect();
		completed.sort_unstable();
		f.debug_struct("Proxy")
			.field("inner", &self.inner)
			.field("params", &self.params)
			.field("completed", &completed)
			.finish_non_exhaustive()
	}
}
