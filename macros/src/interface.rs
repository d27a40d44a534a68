use proc_macro2::{Span, TokenStream};
use syn::{
    ext::IdentExt, parse_quote, spanned::Spanned, Attribute, Expr, ExprPath, FieldValue, FnArg,
    GenericParam, Ident, ItemTrait, Meta, Pat, Receiver, ReturnType, TraitItem, TraitItemFn,
    TypeParamBound,
};

use crate::{
    args::{self, Arg},
    util::parse_comma_separated2,
};

pub struct ExpandTokens {
    pub input: TokenStream,
    pub item: TokenStream,
}

struct Args {
    provider: Option<String>,
}

impl Args {
    fn parse(input: TokenStream) -> Result<Self, syn::Error> {
        let mut provider = Arg::str("provider");

        args::set_from_field_values(
            parse_comma_separated2::<FieldValue>(input)?.iter(),
            [&mut provider],
        )?;

        Ok(Args {
            provider: provider.take(),
        })
    }
}

struct EventArgs {
    attributes: TokenStream,
}

impl EventArgs {
    fn parse(attr: &Attribute) -> Result<Self, syn::Error> {
        let tokens = match attr.meta {
            Meta::List(ref list) => list.tokens.clone(),
            Meta::Path(_) => TokenStream::new(),
            Meta::NameValue(ref meta) => {
                return Err(syn::Error::new(
                    meta.span(),
                    "expected `#[event(..)]` with field-value arguments",
                ))
            }
        };

        let mut id = Arg::<u32>::int("id");
        let mut level = Arg::token_stream("level", |fv| {
            let expr = match fv.expr {
                Expr::Path(ExprPath { ref path, .. }) if is_level_variant(path) => {
                    quote!(::emit_source::__private::Level::#path)
                }
                ref expr => quote!(#expr),
            };

            Ok(quote!(.level(#expr)))
        });
        let mut keywords = Arg::token_stream("keywords", |fv| {
            let expr = &fv.expr;
            Ok(quote!(.keywords(::emit_source::__private::Keywords::from(#expr))))
        });
        let mut opcode = Arg::token_stream("opcode", |fv| {
            let expr = &fv.expr;
            Ok(quote!(.opcode(::emit_source::__private::Opcode::from(#expr))))
        });
        let mut task = Arg::<u16>::int("task");
        let mut version = Arg::<u8>::int("version");
        let mut message = Arg::str("message");

        args::set_from_field_values(
            parse_comma_separated2::<FieldValue>(tokens)?.iter(),
            [
                &mut id,
                &mut level,
                &mut keywords,
                &mut opcode,
                &mut task,
                &mut version,
                &mut message,
            ],
        )?;

        let id = id.take().map(|id| quote!(.id(#id)));
        let level = level.take();
        let keywords = keywords.take();
        let opcode = opcode.take();
        let task = task.take().map(|task| quote!(.task(#task)));
        let version = version.take().map(|version| quote!(.version(#version)));
        let message = message.take().map(|message| quote!(.message(#message)));

        Ok(EventArgs {
            attributes: quote!(
                ::emit_source::__private::EventAttributes::new()
                    #id #level #keywords #opcode #task #version #message
            ),
        })
    }
}

struct Method {
    ident: Ident,
    name: String,
    attributes: Option<TokenStream>,
    params: Vec<Param>,
}

struct Param {
    ident: Ident,
    name: String,
    ty: syn::Type,
}

pub fn expand_tokens(opts: ExpandTokens) -> Result<TokenStream, syn::Error> {
    let args = Args::parse(opts.input)?;

    let mut item = syn::parse2::<ItemTrait>(opts.item)?;

    for param in &item.generics.params {
        match param {
            GenericParam::Type(_) => (),
            GenericParam::Lifetime(param) => {
                return Err(syn::Error::new(
                    param.span(),
                    "event interfaces can't have lifetime parameters",
                ))
            }
            GenericParam::Const(param) => {
                return Err(syn::Error::new(
                    param.span(),
                    "event interfaces can't have const parameters",
                ))
            }
        }
    }

    let mut methods = Vec::new();
    for trait_item in &mut item.items {
        match trait_item {
            TraitItem::Fn(method) => methods.push(method_from_trait_item(method)?),
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    "only methods can be declared by an event interface",
                ))
            }
        }
    }

    let ident = &item.ident;
    let interface_name = ident.unraw().to_string();

    let (_, ty_generics, _) = item.generics.split_for_impl();

    let mut static_generics = item.generics.clone();
    let type_params = static_generics
        .type_params()
        .map(|param| param.ident.clone())
        .collect::<Vec<_>>();
    if !type_params.is_empty() {
        let where_clause = static_generics.make_where_clause();
        for param in &type_params {
            where_clause.predicates.push(parse_quote!(#param: 'static));
        }
    }
    let where_clause = &static_generics.where_clause;

    let bases = item.supertraits.iter().filter_map(|bound| match bound {
        TypeParamBound::Trait(bound) if is_interface_bound(bound) => {
            let path = &bound.path;
            Some(quote!(.extends::<dyn #path>()))
        }
        _ => None,
    });

    let provider = args
        .provider
        .map(|provider| quote!(.provider_name(#provider)));

    let describe_methods = methods.iter().map(|method| {
        let name = &method.name;
        let attributes = method
            .attributes
            .as_ref()
            .map(|attributes| quote!(.event(#attributes)));
        let params = method.params.iter().map(|param| {
            let ty = &param.ty;
            let name = &param.name;

            quote!(.param::<#ty>(#name))
        });

        quote!(.method(#name, |m| m #attributes #(#params)*))
    });

    let impl_methods = methods.iter().enumerate().map(|(index, method)| {
        let method_ident = &method.ident;
        let arg_idents = method.params.iter().map(|param| &param.ident);
        let arg_tys = method.params.iter().map(|param| &param.ty);
        let arg_refs = method.params.iter().map(|param| {
            let ident = &param.ident;
            quote!(&#ident as &dyn ::emit_source::__private::Any)
        });

        quote!(
            fn #method_ident(&self, #(#arg_idents: #arg_tys),*) {
                ::emit_source::__private::EventSource::dispatch(
                    self,
                    ::emit_source::__private::TypeId::of::<dyn #ident #ty_generics>(),
                    #index,
                    &[#(#arg_refs),*],
                )
            }
        )
    });

    let source_param = Ident::new("__EmitSourceInterface", Span::call_site());

    let mut source_generics = static_generics.clone();
    source_generics
        .params
        .push(parse_quote!(#source_param: ?Sized + #ident #ty_generics + 'static));
    let (source_impl_generics, _, source_where_clause) = source_generics.split_for_impl();

    let (static_impl_generics, _, _) = static_generics.split_for_impl();

    Ok(quote!(
        #item

        impl #static_impl_generics ::emit_source::__private::EventInterface
            for dyn #ident #ty_generics #where_clause
        {
            fn describe() -> ::emit_source::__private::InterfaceDescriptor {
                ::emit_source::__private::InterfaceDescriptor::builder::<dyn #ident #ty_generics>(
                    #interface_name,
                    ::core::module_path!(),
                )
                #provider
                #(.type_arg::<#type_params>())*
                #(#bases)*
                #(#describe_methods)*
                .build()
            }
        }

        impl #source_impl_generics #ident #ty_generics
            for ::emit_source::__private::EventSource<#source_param> #source_where_clause
        {
            #(#impl_methods)*
        }
    ))
}

fn is_level_variant(path: &syn::Path) -> bool {
    match path.get_ident() {
        Some(ident) => [
            "LogAlways",
            "Critical",
            "Error",
            "Warning",
            "Informational",
            "Verbose",
        ]
        .iter()
        .any(|variant| ident == variant),
        None => false,
    }
}

/**
Whether a supertrait bound names a base interface.

Auto traits and `?Sized` don't.
*/
fn is_interface_bound(bound: &syn::TraitBound) -> bool {
    if !matches!(bound.modifier, syn::TraitBoundModifier::None) {
        return false;
    }

    match bound.path.segments.last() {
        Some(segment) => !["Send", "Sync", "Sized", "Unpin"]
            .iter()
            .any(|auto| segment.ident == auto),
        None => false,
    }
}

fn method_from_trait_item(method: &mut TraitItemFn) -> Result<Method, syn::Error> {
    let sig = &method.sig;

    if let Some(ref body) = method.default {
        return Err(syn::Error::new(
            body.span(),
            "event methods are generated, so they can't have a default body",
        ));
    }

    if let ReturnType::Type(_, ref ty) = sig.output {
        return Err(syn::Error::new(
            ty.span(),
            "event methods can't return a value",
        ));
    }

    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            sig.generics.span(),
            "event methods can't have generic parameters",
        ));
    }

    if let Some(asyncness) = sig.asyncness {
        return Err(syn::Error::new(
            asyncness.span(),
            "event methods can't be async",
        ));
    }

    match sig.receiver() {
        Some(Receiver {
            reference: Some(_),
            mutability: None,
            colon_token: None,
            ..
        }) => (),
        _ => {
            return Err(syn::Error::new(
                sig.ident.span(),
                "event methods must take `&self`",
            ))
        }
    }

    let mut params = Vec::new();
    for (position, input) in sig.inputs.iter().skip(1).enumerate() {
        let FnArg::Typed(input) = input else {
            continue;
        };

        let name = match *input.pat {
            Pat::Ident(ref pat) => pat.ident.unraw().to_string(),
            _ => format!("arg{}", position),
        };

        params.push(Param {
            ident: Ident::new(&format!("__arg{}", position), Span::call_site()),
            name,
            ty: (*input.ty).clone(),
        });
    }

    let mut attributes = None;
    let mut err = None;
    method.attrs.retain(|attr| {
        if !attr.path().is_ident("event") {
            return true;
        }

        match (attributes.is_some(), EventArgs::parse(attr)) {
            (false, Ok(args)) => attributes = Some(args.attributes),
            (true, _) => {
                err.get_or_insert_with(|| {
                    syn::Error::new(attr.span(), "only one `#[event]` attribute is allowed")
                });
            }
            (false, Err(e)) => {
                err.get_or_insert(e);
            }
        }

        false
    });

    if let Some(err) = err {
        return Err(err);
    }

    Ok(Method {
        ident: method.sig.ident.clone(),
        name: method.sig.ident.unraw().to_string(),
        attributes,
        params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(item: TokenStream) -> Result<TokenStream, syn::Error> {
        expand_tokens(ExpandTokens {
            input: TokenStream::new(),
            item,
        })
    }

    #[test]
    fn expand_strips_event_attributes() {
        let expanded = expand(quote!(
            trait Log {
                #[event(id: 1, level: Warning)]
                fn started(&self, r#type: String);
            }
        ))
        .unwrap()
        .to_string();

        assert!(!expanded.contains("# [event"));
        assert!(expanded.contains("\"type\""));
        assert!(expanded.contains("Level :: Warning"));
    }

    #[test]
    fn expand_level_paths() {
        let expanded = expand(quote!(
            trait Log {
                #[event(id: 1, level: Critical)]
                fn failed(&self);

                #[event(id: 2, level: NOISY)]
                fn chatty(&self);
            }
        ))
        .unwrap()
        .to_string();

        assert!(expanded.contains("Level :: Critical"));
        assert!(expanded.contains("NOISY"));
        assert!(!expanded.contains("Level :: NOISY"));
    }

    #[test]
    fn expand_bounds_event_sources_by_interface() {
        let expanded = expand(quote!(
            trait Log {
                fn started(&self);
            }
        ))
        .unwrap()
        .to_string();

        assert!(expanded.contains("__EmitSourceInterface : ? Sized + Log"));
    }

    #[test]
    fn expand_ignores_auto_trait_bases() {
        let expanded = expand(quote!(
            trait Log: Base + Send + Sync {
                fn started(&self);
            }
        ))
        .unwrap()
        .to_string();

        assert!(expanded.contains("dyn Base"));
        assert!(!expanded.contains("dyn Send"));
        assert!(!expanded.contains("dyn Sync"));
    }

    #[test]
    fn expand_err() {
        for (expected, item) in [
            (
                "event methods can't return a value",
                quote!(trait Log { fn started(&self) -> bool; }),
            ),
            (
                "event methods are generated, so they can't have a default body",
                quote!(trait Log { fn started(&self) {} }),
            ),
            (
                "event methods must take `&self`",
                quote!(trait Log { fn started(&mut self); }),
            ),
            (
                "event methods can't have generic parameters",
                quote!(trait Log { fn started<T>(&self, value: T); }),
            ),
            (
                "only methods can be declared by an event interface",
                quote!(trait Log { const ID: u32; }),
            ),
            (
                "event interfaces can't have lifetime parameters",
                quote!(trait Log<'a> { fn started(&self); }),
            ),
            (
                "only one `#[event]` attribute is allowed",
                quote!(trait Log {
                    #[event(id: 1)]
                    #[event(id: 2)]
                    fn started(&self);
                }),
            ),
        ] {
            let err = expand(item).unwrap_err();

            assert_eq!(expected, err.to_string());
        }
    }

    #[test]
    fn expand_provider() {
        let expanded = expand_tokens(ExpandTokens {
            input: quote!(provider: "Shop-Orders"),
            item: quote!(trait Orders {
                fn placed(&self);
            }),
        })
        .unwrap()
        .to_string();

        assert!(expanded.contains("\"Shop-Orders\""));
    }
}
