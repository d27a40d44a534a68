use std::{fmt, str::FromStr};

use proc_macro2::TokenStream;
use syn::{spanned::Spanned, Expr, ExprLit, FieldValue, Lit};

use crate::util::{print_list, FieldValueKey};

/**
An argument represented as a field-value input to a macro.

Arguments are set from a collection of field-values using the `set_from_field_values` function.
*/
pub struct Arg<T> {
    key: &'static str,
    set: Box<dyn FnMut(&FieldValue) -> Result<T, syn::Error>>,
    value: Option<T>,
}

impl Arg<String> {
    pub fn str(key: &'static str) -> Self {
        Arg::new(key, move |fv| {
            if let Expr::Lit(ExprLit {
                lit: Lit::Str(ref l),
                ..
            }) = fv.expr
            {
                Ok(l.value())
            } else {
                Err(syn::Error::new(
                    fv.expr.span(),
                    format_args!("`{}` requires a string value", key),
                ))
            }
        })
    }
}

impl<T: FromStr> Arg<T>
where
    T::Err: fmt::Display,
{
    /**
    An integer literal that fits in `T`.
    */
    pub fn int(key: &'static str) -> Self {
        Arg::new(key, move |fv| {
            if let Expr::Lit(ExprLit {
                lit: Lit::Int(ref l),
                ..
            }) = fv.expr
            {
                l.base10_parse::<T>()
            } else {
                Err(syn::Error::new(
                    fv.expr.span(),
                    format_args!("`{}` requires an integer value", key),
                ))
            }
        })
    }
}

impl Arg<TokenStream> {
    pub fn token_stream(
        key: &'static str,
        to_tokens: impl FnMut(&FieldValue) -> Result<TokenStream, syn::Error> + 'static,
    ) -> Self {
        Arg::new(key, to_tokens)
    }
}

impl<T> Arg<T> {
    pub fn new(
        key: &'static str,
        to_custom: impl FnMut(&FieldValue) -> Result<T, syn::Error> + 'static,
    ) -> Self {
        Arg {
            key,
            set: Box::new(to_custom),
            value: None,
        }
    }

    pub fn take(self) -> Option<T> {
        self.value
    }
}

pub trait ArgDef {
    fn key(&self) -> &str;
    fn set(&mut self, fv: &FieldValue) -> Result<(), syn::Error>;
}

impl<T> ArgDef for Arg<T> {
    fn key(&self) -> &str {
        self.key
    }

    fn set(&mut self, fv: &FieldValue) -> Result<(), syn::Error> {
        if self.value.is_some() {
            return Err(syn::Error::new(
                fv.span(),
                format_args!("a value for `{}` has already been specified", self.key),
            ));
        }

        self.value = Some((self.set)(fv)?);
        Ok(())
    }
}

pub fn set_from_field_values<'a, const N: usize>(
    field_values: impl Iterator<Item = &'a FieldValue> + 'a,
    mut args: [&mut dyn ArgDef; N],
) -> Result<(), syn::Error> {
    'fields: for fv in field_values {
        let key_name = fv.key_name();

        for arg in &mut args {
            if arg.key() == key_name {
                arg.set(fv)?;
                continue 'fields;
            }
        }

        return Err(syn::Error::new(
            fv.span(),
            format_args!(
                "unknown argument `{}`; available arguments are {}",
                key_name,
                print_list(args.iter().map(|arg| arg.key()))
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::util::parse_comma_separated2;

    use super::*;

    #[test]
    fn arg_set() {
        let mut str = Arg::str("message");
        let mut ts = Arg::token_stream("id", |fv| {
            let expr = &fv.expr;
            Ok(quote!(#expr))
        });

        let fv = parse_comma_separated2::<FieldValue>(quote!(id: 1 + 2, message: "started"))
            .unwrap();

        set_from_field_values(fv.iter(), [&mut str, &mut ts]).unwrap();

        assert_eq!("started", str.take().unwrap());
        assert_eq!(quote!(1 + 2).to_string(), ts.take().unwrap().to_string());
    }

    #[test]
    fn arg_int() {
        let mut id = Arg::<u32>::int("id");
        let mut version = Arg::<u8>::int("version");

        let fv = parse_comma_separated2::<FieldValue>(quote!(id: 7, version: 2)).unwrap();

        set_from_field_values(fv.iter(), [&mut id, &mut version]).unwrap();

        assert_eq!(Some(7), id.take());
        assert_eq!(Some(2), version.take());
    }

    #[test]
    fn arg_int_err() {
        for fv in [quote!(version: 256), quote!(version: "1"), quote!(version: -1)] {
            let mut version = Arg::<u8>::int("version");

            let fv = parse_comma_separated2::<FieldValue>(fv).unwrap();

            assert!(set_from_field_values(fv.iter(), [&mut version]).is_err());
        }
    }

    #[test]
    fn arg_err() {
        for (expected, fv) in [
            (
                "a value for `a` has already been specified",
                quote!(a: "x", a: "y"),
            ),
            (
                "unknown argument `b`; available arguments are `a`",
                quote!(b: "x"),
            ),
            ("`a` requires a string value", quote!(a: true)),
        ] {
            let mut a = Arg::str("a");

            let fv = parse_comma_separated2::<FieldValue>(fv).unwrap();

            let err = set_from_field_values(fv.iter(), [&mut a]).unwrap_err();

            assert_eq!(expected, err.to_string());
        }
    }
}
