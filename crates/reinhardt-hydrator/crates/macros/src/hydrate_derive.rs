//! Implementation of `#[derive(Hydrate)]`.

use convert_case::{Case, Casing};
use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::{Data, DeriveInput, Fields, LitStr, Result};

/// Accepted `filter` names and the variant each one maps to.
const FILTERS: &[(&str, &str)] = &[
	("trim", "Trim"),
	("json_decode", "JsonDecode"),
	("explode", "Explode"),
	("explode_to_list", "Explode"),
	("array_from_string", "KeyValuePairs"),
	("key_value_pairs", "KeyValuePairs"),
];

#[derive(Debug, Clone, Copy)]
enum TargetKind {
	Type,
	Service,
	Auto,
}

/// A `dependency::method` reference checked at expansion time.
#[derive(Debug, Clone)]
struct ResolverSpec {
	kind: TargetKind,
	dependency: String,
	method: String,
}

impl ResolverSpec {
	/// Parses either `key = "Dep::method"` or `key(class = "Dep", method = "m")`.
	fn from_meta(meta: &ParseNestedMeta) -> Result<Self> {
		if meta.input.peek(syn::token::Paren) {
			let mut target = None;
			let mut method = None;
			meta.parse_nested_meta(|nested| {
				if nested.path.is_ident("class") {
					let value: LitStr = nested.value()?.parse()?;
					target = Some((TargetKind::Type, value.value()));
					Ok(())
				} else if nested.path.is_ident("service") {
					let value: LitStr = nested.value()?.parse()?;
					target = Some((TargetKind::Service, value.value()));
					Ok(())
				} else if nested.path.is_ident("method") {
					let value: LitStr = nested.value()?.parse()?;
					method = Some(value.value());
					Ok(())
				} else {
					Err(nested.error("expected `class`, `service` or `method`"))
				}
			})?;
			let (kind, dependency) = target.ok_or_else(|| meta.error("missing `class` or `service`"))?;
			let method = method
				.filter(|method| !method.is_empty())
				.ok_or_else(|| meta.error("missing `method`"))?;
			if dependency.is_empty() {
				return Err(meta.error("dependency name must not be empty"));
			}
			return Ok(Self {
				kind,
				dependency,
				method,
			});
		}

		let value: LitStr = meta.value()?.parse()?;
		Self::from_lit(&value)
	}

	fn from_lit(lit: &LitStr) -> Result<Self> {
		let raw = lit.value();
		let reference = raw.trim();
		let Some((dependency, method)) = reference
			.rsplit_once("::")
			.filter(|(dependency, method)| !dependency.is_empty() && !method.is_empty())
		else {
			return Err(syn::Error::new_spanned(
				lit,
				"resolver must have the form `Dependency::method` or `@service::method`",
			));
		};
		let (kind, dependency) = match dependency.strip_prefix('@') {
			Some(service) if !service.is_empty() => (TargetKind::Service, service),
			Some(_) => return Err(syn::Error::new_spanned(lit, "service name must not be empty")),
			None => (TargetKind::Auto, dependency),
		};
		Ok(Self {
			kind,
			dependency: dependency.to_string(),
			method: method.to_string(),
		})
	}

	fn to_tokens(&self, krate: &syn::Path) -> TokenStream {
		let dependency = &self.dependency;
		let method = &self.method;
		let variant = match self.kind {
			TargetKind::Type => quote!(Type),
			TargetKind::Service => quote!(Service),
			TargetKind::Auto => quote!(Auto),
		};
		quote! {
			#krate::ResolverRef::new(
				#krate::DependencyTarget::#variant(::std::string::String::from(#dependency)),
				#method,
			)
		}
	}
}

/// Struct-level configuration from `#[hydrate(...)]`.
struct StructConfig {
	locator: Option<ResolverSpec>,
	krate: syn::Path,
}

impl StructConfig {
	fn from_attrs(attrs: &[syn::Attribute]) -> Result<Self> {
		let mut locator = None;
		let mut krate = None;

		for attr in attrs {
			if !attr.path().is_ident("hydrate") {
				continue;
			}

			attr.parse_nested_meta(|meta| {
				if meta.path.is_ident("locator") {
					locator = Some(ResolverSpec::from_meta(&meta)?);
					Ok(())
				} else if meta.path.is_ident("crate") {
					let value: LitStr = meta.value()?.parse()?;
					krate = Some(value.parse::<syn::Path>()?);
					Ok(())
				} else {
					Err(meta.error("unsupported hydrate attribute on struct"))
				}
			})?;
		}

		Ok(Self {
			locator,
			krate: krate.unwrap_or_else(|| syn::parse_quote!(::reinhardt_hydrator)),
		})
	}
}

/// Field configuration from `#[hydrate(...)]`.
#[derive(Default)]
struct FieldConfig {
	source_key: Option<String>,
	value_type: Option<String>,
	format: Option<String>,
	filter: Option<&'static str>,
	resolver: Option<ResolverSpec>,
	lazy: bool,
	setter: Option<syn::Ident>,
	readonly: bool,
}

impl FieldConfig {
	fn from_attrs(attrs: &[syn::Attribute]) -> Result<Self> {
		let mut config = Self::default();

		for attr in attrs {
			if !attr.path().is_ident("hydrate") {
				continue;
			}

			attr.parse_nested_meta(|meta| {
				if meta.path.is_ident("field") {
					let value: LitStr = meta.value()?.parse()?;
					config.source_key = Some(value.value());
					Ok(())
				} else if meta.path.is_ident("value_type") {
					let value: LitStr = meta.value()?.parse()?;
					config.value_type = Some(value.value());
					Ok(())
				} else if meta.path.is_ident("format") {
					let value: LitStr = meta.value()?.parse()?;
					config.format = Some(value.value());
					Ok(())
				} else if meta.path.is_ident("filter") {
					let value: LitStr = meta.value()?.parse()?;
					let name = value.value().trim().to_lowercase().replace('-', "_");
					let variant = FILTERS
						.iter()
						.find(|(known, _)| *known == name)
						.map(|(_, variant)| *variant)
						.ok_or_else(|| {
							syn::Error::new_spanned(
								&value,
								"unknown filter, expected one of `trim`, `json_decode`, `explode`, \
								 `array_from_string` or `key_value_pairs`",
							)
						})?;
					config.filter = Some(variant);
					Ok(())
				} else if meta.path.is_ident("resolver") {
					config.resolver = Some(ResolverSpec::from_meta(&meta)?);
					Ok(())
				} else if meta.path.is_ident("lazy") {
					config.lazy = parse_flag(&meta)?;
					Ok(())
				} else if meta.path.is_ident("setter") {
					let value: LitStr = meta.value()?.parse()?;
					config.setter = Some(value.parse()?);
					Ok(())
				} else if meta.path.is_ident("readonly") {
					config.readonly = parse_flag(&meta)?;
					Ok(())
				} else {
					Err(meta.error("unsupported hydrate attribute on field"))
				}
			})?;
		}

		Ok(config)
	}
}

/// Accepts both `flag` and `flag = true`.
fn parse_flag(meta: &ParseNestedMeta) -> Result<bool> {
	if meta.input.peek(syn::Token![=]) {
		let value: syn::LitBool = meta.value()?.parse()?;
		Ok(value.value)
	} else {
		Ok(true)
	}
}

pub(crate) fn derive_hydrate_impl(input: DeriveInput) -> Result<TokenStream> {
	let struct_name = &input.ident;
	let config = StructConfig::from_attrs(&input.attrs)?;
	let krate = &config.krate;

	let fields = match &input.data {
		Data::Struct(data) => match &data.fields {
			Fields::Named(fields) => &fields.named,
			_ => {
				return Err(syn::Error::new_spanned(
					struct_name,
					"Hydrate can only be derived for structs with named fields",
				));
			}
		},
		_ => {
			return Err(syn::Error::new_spanned(
				struct_name,
				"Hydrate can only be derived for structs",
			));
		}
	};

	let mut field_specs = Vec::new();
	let mut has_lazy = false;

	for field in fields {
		let Some(ident) = &field.ident else { continue };
		let field_config = FieldConfig::from_attrs(&field.attrs)?;
		let name = ident.unraw().to_string();
		let source_key = field_config
			.source_key
			.clone()
			.unwrap_or_else(|| name.to_case(Case::Snake));
		let ty = &field.ty;
		let type_name = match &field_config.value_type {
			Some(value_type) => value_type.clone(),
			None => quote!(#ty).to_string().chars().filter(|c| !c.is_whitespace()).collect(),
		};

		if field_config.lazy && field_config.resolver.is_none() {
			return Err(syn::Error::new_spanned(ident, "lazy fields need a `resolver`"));
		}
		if field_config.readonly && field_config.setter.is_some() {
			return Err(syn::Error::new_spanned(ident, "`readonly` fields cannot have a `setter`"));
		}
		has_lazy |= field_config.lazy;

		let mut builder = quote! {
			#krate::FieldSpec::new(#name)
				.with_source_key(#source_key)
				.with_type_name(#type_name)
		};
		if let Some(format) = &field_config.format {
			builder = quote!(#builder.with_date_format(#format));
		}
		if let Some(variant) = field_config.filter {
			let variant = syn::Ident::new(variant, proc_macro2::Span::call_site());
			builder = quote!(#builder.with_filter(#krate::FilterKind::#variant));
		}
		if let Some(resolver) = &field_config.resolver {
			let resolver = resolver.to_tokens(krate);
			builder = quote!(#builder.with_resolver(#resolver));
		}
		if field_config.lazy {
			builder = quote!(#builder.lazy());
		}
		if !field_config.readonly {
			let (setter_name, assign) = match &field_config.setter {
				Some(method) => (
					method.to_string(),
					quote! {
						target.#method(
							#krate::FromFieldValue::from_field_value(value)
								.map_err(|err| err.for_field(#name))?,
						);
					},
				),
				None => (
					format!("set_{name}"),
					quote! {
						target.#ident = <#ty as #krate::FromFieldValue>::from_field_value(value)
							.map_err(|err| err.for_field(#name))?;
					},
				),
			};
			builder = quote! {
				#builder.with_setter(
					#setter_name,
					|target: &mut Self, value: #krate::FieldValue| -> #krate::HydrationResult<()> {
						#assign
						Ok(())
					},
				)
			};
		}
		field_specs.push(builder);
	}

	let locator = config.locator.as_ref().map(|locator| {
		let locator = locator.to_tokens(krate);
		quote!(.with_locator(#locator))
	});

	let type_name = struct_name.unraw().to_string();
	let (output, assemble) = if has_lazy {
		(
			quote!(#krate::Proxy<Self>),
			quote!(#krate::Proxy::new(instance, lazy)),
		)
	} else {
		(quote!(Self), quote!({
			let _ = lazy;
			instance
		}))
	};
	let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

	Ok(quote! {
		#[automatically_derived]
		impl #impl_generics #krate::Hydrate for #struct_name #ty_generics #where_clause {
			type Output = #output;

			fn metadata() -> #krate::TypeMetadata<Self> {
				#krate::TypeMetadata::new(#type_name)
					.with_source(file!(), env!("CARGO_MANIFEST_DIR"))
					#(.field(#field_specs))*
					#locator
			}

			fn assemble(
				instance: Self,
				lazy: ::std::option::Option<#krate::LazyBinding<Self>>,
			) -> Self::Output {
				#assemble
			}
		}
	})
}
