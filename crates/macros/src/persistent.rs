//! Persistent derive macro implementation

use std::collections::HashSet;

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::DeriveInput;

use crate::parse::{option_inner_type, parse_persistent, PersistentArgs, PersistentFieldArgs};

/// Generate the Persistent implementation
pub fn derive_persistent(input: DeriveInput) -> TokenStream {
    match parse_persistent(&input) {
        Ok(args) => generate_impl(args),
        Err(e) => e.write_errors(),
    }
}

/// How a field converts to and from `Value`
enum FieldKind<'a> {
    Plain,
    Reference(&'a str),
    Embedded(&'a syn::Type),
}

struct MappedField<'a> {
    args: &'a PersistentFieldArgs,
    kind: FieldKind<'a>,
    property: String,
}

fn classify<'a>(field: &'a PersistentFieldArgs) -> syn::Result<MappedField<'a>> {
    let kind = match (field.embedded, field.reference.as_deref()) {
        (true, Some(_)) => {
            return Err(syn::Error::new_spanned(
                &field.ty,
                "a field cannot be both `embedded` and a `reference`",
            ))
        }
        (true, None) => {
            let inner = option_inner_type(&field.ty).ok_or_else(|| {
                syn::Error::new_spanned(&field.ty, "embedded fields must have type `Option<T>`")
            })?;
            FieldKind::Embedded(inner)
        }
        (false, Some(target)) => FieldKind::Reference(target),
        (false, None) => FieldKind::Plain,
    };
    Ok(MappedField {
        args: field,
        kind,
        property: field.property_name(),
    })
}

fn generate_impl(args: PersistentArgs) -> TokenStream {
    let struct_name = &args.ident;
    let class_name = args.class_name();

    if !args.generics.params.is_empty() {
        return syn::Error::new_spanned(&args.generics, "Persistent cannot be derived for generic structs")
            .to_compile_error();
    }

    let fields = match &args.data {
        darling::ast::Data::Struct(fields) => &fields.fields,
        _ => {
            return syn::Error::new_spanned(&args.ident, "Persistent can only be derived for structs")
                .to_compile_error()
        }
    };

    let mut mapped = Vec::new();
    let mut seen = HashSet::new();
    for field in fields.iter().filter(|f| !f.skip) {
        match classify(field) {
            Ok(m) => {
                if !seen.insert(m.property.clone()) {
                    return syn::Error::new_spanned(
                        &field.ty,
                        format!("duplicate property name `{}`", m.property),
                    )
                    .to_compile_error();
                }
                mapped.push(m);
            }
            Err(e) => return e.to_compile_error(),
        }
    }

    if mapped.iter().filter(|m| m.args.id).count() > 1 {
        return syn::Error::new_spanned(&args.ident, "at most one field can be marked `id`")
            .to_compile_error();
    }

    let static_name = format_ident!("__{}_DESCRIPTOR", struct_name.to_string().to_uppercase());

    let accessor_fns: Vec<_> = mapped
        .iter()
        .map(|m| generate_accessor_fns(struct_name, &class_name, m))
        .collect();
    let property_entries: Vec<_> = mapped.iter().map(generate_property_entry).collect();
    let constants = generate_constants(&mapped);

    let get_arms = mapped.iter().map(|m| {
        let property = &m.property;
        let read = read_expr(m);
        quote! { #property => Ok(#read), }
    });
    let set_arms = mapped.iter().map(|m| {
        let property = &m.property;
        let field_ident = &m.args.ident;
        let convert = convert_expr(&class_name, m);
        quote! {
            #property => {
                this.#field_ident = #convert;
                Ok(())
            }
        }
    });

    let parent = match &args.extends {
        Some(parent) => quote! { ::std::option::Option::Some(#parent) },
        None => quote! { ::std::option::Option::None },
    };
    let enhanced = args.enhanced;

    let (constructor_fn, constructor) = if args.no_default {
        (quote! {}, quote! { ::std::option::Option::None })
    } else {
        (
            quote! {
                fn __construct() -> ::std::boxed::Box<dyn ::palimpsest_bytecode::descriptor::Persistent> {
                    ::std::boxed::Box::new(<#struct_name as ::std::default::Default>::default())
                }
            },
            quote! {
                ::std::option::Option::Some(__construct as ::palimpsest_bytecode::descriptor::ConstructorFn)
            },
        )
    };

    quote! {
        impl #struct_name {
            #constants
        }

        #[allow(non_upper_case_globals, unused_imports)]
        const _: () = {
            use ::palimpsest_bytecode::descriptor::{
                ClassDescriptor, Persistent, PersistentClass, PropertyAccess, PropertyDescriptor,
                PropertyFlags,
            };
            use ::palimpsest_bytecode::error::AccessError;
            use ::palimpsest_bytecode::model::{IntoValue, Value, ValueKind, ValueType};

            static #static_name: ::std::sync::OnceLock<ClassDescriptor> = ::std::sync::OnceLock::new();

            #constructor_fn

            #(#accessor_fns)*

            impl PersistentClass for #struct_name {
                const CLASS_NAME: &'static str = #class_name;

                fn class_descriptor() -> &'static ClassDescriptor {
                    #static_name.get_or_init(|| ClassDescriptor {
                        name: #class_name,
                        parent: #parent,
                        enhanced: #enhanced,
                        constructor: #constructor,
                        properties: ::std::vec![#(#property_entries),*],
                    })
                }
            }

            impl PropertyAccess for #struct_name {
                fn class_name(&self) -> &str {
                    #class_name
                }

                fn get_property(&self, name: &str) -> ::std::result::Result<Value, AccessError> {
                    let this = self;
                    match name {
                        #(#get_arms)*
                        _ => Err(AccessError::unknown(#class_name, name)),
                    }
                }

                fn set_property(&mut self, name: &str, value: Value) -> ::std::result::Result<(), AccessError> {
                    let this = self;
                    match name {
                        #(#set_arms)*
                        _ => Err(AccessError::unknown(#class_name, name)),
                    }
                }

                fn accepts_null(&self, name: &str) -> bool {
                    <Self as PersistentClass>::class_descriptor()
                        .property(name)
                        .map(|p| p.is_nullable())
                        .unwrap_or(false)
                }
            }

            impl Persistent for #struct_name {
                fn descriptor(&self) -> &'static ClassDescriptor {
                    <Self as PersistentClass>::class_descriptor()
                }

                fn as_any(&self) -> &dyn ::std::any::Any {
                    self
                }

                fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                    self
                }

                fn as_access(&self) -> &dyn PropertyAccess {
                    self
                }

                fn as_access_mut(&mut self) -> &mut dyn PropertyAccess {
                    self
                }
            }
        };
    }
}

/// Expression reading the field of `this` as a `Value`
fn read_expr(field: &MappedField<'_>) -> TokenStream {
    let field_ident = &field.args.ident;
    match field.kind {
        FieldKind::Embedded(_) => quote! {
            ::palimpsest_bytecode::descriptor::embedded::to_value(&this.#field_ident)
        },
        FieldKind::Plain | FieldKind::Reference(_) => quote! {
            IntoValue::to_value(&this.#field_ident)
        },
    }
}

/// Expression converting `value` into the field type, propagating with `?`
fn convert_expr(class_name: &str, field: &MappedField<'_>) -> TokenStream {
    let property = &field.property;
    match field.kind {
        FieldKind::Embedded(inner) => quote! {
            ::palimpsest_bytecode::descriptor::embedded::from_value::<#inner>(#class_name, #property, value)?
        },
        FieldKind::Plain | FieldKind::Reference(_) => {
            let ty = &field.args.ty;
            quote! {
                ::palimpsest_bytecode::descriptor::convert_field::<#ty>(#class_name, #property, value)?
            }
        }
    }
}

fn accessor_idents(field: &MappedField<'_>) -> (syn::Ident, syn::Ident) {
    let clean = field.args.clean_name();
    (format_ident!("__get_{}", clean), format_ident!("__set_{}", clean))
}

fn generate_accessor_fns(struct_name: &syn::Ident, class_name: &str, field: &MappedField<'_>) -> TokenStream {
    let (get_fn, set_fn) = accessor_idents(field);
    let field_ident = &field.args.ident;
    let read = read_expr(field);
    let convert = convert_expr(class_name, field);

    quote! {
        fn #get_fn(target: &dyn ::std::any::Any) -> ::std::option::Option<Value> {
            target.downcast_ref::<#struct_name>().map(|this| #read)
        }

        fn #set_fn(
            target: &mut dyn ::std::any::Any,
            value: Value,
        ) -> ::std::result::Result<(), AccessError> {
            let this = target
                .downcast_mut::<#struct_name>()
                .ok_or_else(|| AccessError::WrongTarget {
                    expected: #class_name.to_string(),
                    found: "another class".to_string(),
                })?;
            this.#field_ident = #convert;
            Ok(())
        }
    }
}

fn generate_property_entry(field: &MappedField<'_>) -> TokenStream {
    let (get_fn, set_fn) = accessor_idents(field);
    let property = &field.property;
    let clean = field.args.clean_name();
    let setter = format!("set_{}", clean);
    let ty = &field.args.ty;

    let value_type = match field.kind {
        FieldKind::Plain => quote! { <#ty as ValueKind>::value_type() },
        FieldKind::Reference(target) => quote! { ValueType::Reference(#target) },
        FieldKind::Embedded(inner) => quote! {
            ValueType::Embedded(<#inner as PersistentClass>::CLASS_NAME)
        },
    };

    let mut static_flags = Vec::new();
    if field.args.id {
        static_flags.push(quote! { PropertyFlags::ID });
    }
    if field.args.lazy {
        static_flags.push(quote! { PropertyFlags::LAZY });
    }
    if field.args.not_audited {
        static_flags.push(quote! { PropertyFlags::NOT_AUDITED });
    }
    match field.kind {
        FieldKind::Embedded(_) => {
            static_flags.push(quote! { PropertyFlags::EMBEDDED });
            static_flags.push(quote! { PropertyFlags::NULLABLE });
        }
        FieldKind::Reference(_) => static_flags.push(quote! { PropertyFlags::REFERENCE }),
        FieldKind::Plain => {}
    }

    let nullable = match field.kind {
        FieldKind::Embedded(_) => quote! { true },
        FieldKind::Plain | FieldKind::Reference(_) => quote! { <#ty as ValueKind>::NULLABLE },
    };

    quote! {
        {
            let value_type = #value_type;
            let mut flags = PropertyFlags::empty() #(| #static_flags)*;
            if #nullable {
                flags |= PropertyFlags::NULLABLE;
            }
            if matches!(value_type, ValueType::List(_)) {
                flags |= PropertyFlags::COLLECTION;
            }
            PropertyDescriptor {
                name: #property,
                getter: #clean,
                setter: #setter,
                value_type,
                flags,
                get: #get_fn,
                set: #set_fn,
            }
        }
    }
}

fn generate_constants(fields: &[MappedField<'_>]) -> TokenStream {
    let constants = fields.iter().map(|f| {
        let property = &f.property;
        let const_name = format_ident!("{}_PROPERTY", f.args.clean_name().to_uppercase());
        let doc = format!("Property name of `{}`", f.args.clean_name());
        quote! {
            #[doc = #doc]
            pub const #const_name: &'static str = #property;
        }
    });
    quote! { #(#constants)* }
}
