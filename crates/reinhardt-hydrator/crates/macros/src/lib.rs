//! Procedural macros for reinhardt-hydrator.
//!
//! Provides `#[derive(Hydrate)]`, which generates the field metadata and the
//! output wrapping used by `Hydrator`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod hydrate_derive;

/// Derive macro implementing `Hydrate` for a struct with named fields.
///
/// Every named field is hydrated. Types with at least one lazy field are
/// returned wrapped in a `Proxy`.
///
/// # Attributes
///
/// ## Struct-level attributes
///
/// - `#[hydrate(locator = "Repository::find")]` - Dependency used by
///   `Hydrator::lookup_record`. A leading `@` names a service.
/// - `#[hydrate(locator(class = "Repository", method = "find"))]` - Same,
///   autowired by type. Use `service = "..."` to look up by name.
/// - `#[hydrate(crate = "path::to::hydrator")]` - Path of the runtime crate
///   when it is re-exported.
///
/// ## Field-level attributes
///
/// - `#[hydrate(field = "key")]` - Record key, defaults to the snake-cased
///   field name.
///   `"$this"` passes the instance itself to the resolver.
/// - `#[hydrate(value_type = "datetime")]` - Overrides the declared type used
///   for coercion.
/// - `#[hydrate(format = "d/m/Y")]` - Explicit date format.
/// - `#[hydrate(filter = "trim")]` - One of `trim`, `json_decode`, `explode`,
///   `array_from_string` or `key_value_pairs`.
/// - `#[hydrate(resolver = "Dependency::method")]` - Custom resolver.
/// - `#[hydrate(resolver(service = "users", method = "find"))]` - Custom
///   resolver in structured form.
/// - `#[hydrate(lazy)]` - Resolve on first read. Requires a resolver.
/// - `#[hydrate(setter = "set_author")]` - Assign through a method instead of
///   the field.
/// - `#[hydrate(readonly)]` - Never assigned; the field keeps its default.
///
/// # Example
///
/// ```ignore
/// use reinhardt_hydrator::Hydrate;
///
/// #[derive(Default, Hydrate)]
/// #[hydrate(locator = "@posts::find")]
/// struct Post {
/// 	id: i64,
/// 	#[hydrate(field = "body_text", filter = "trim")]
/// 	body: String,
/// 	#[hydrate(field = "author_id", resolver = "@users::find", lazy)]
/// 	author: Option<Arc<User>>,
/// }
/// ```
#[proc_macro_derive(Hydrate, attributes(hydrate))]
pub fn derive_hydrate(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	hydrate_derive::derive_hydrate_impl(input)
		.unwrap_or_else(|err| err.to_compile_error())
		.into()
}
