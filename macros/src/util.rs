use proc_macro2::TokenStream;
use syn::{
    ext::IdentExt,
    parse::{self, Parse, ParseStream},
    punctuated::Punctuated,
    FieldValue, Member,
};

pub trait FieldValueKey {
    fn key_name(&self) -> String;
}

impl FieldValueKey for FieldValue {
    fn key_name(&self) -> String {
        match self.member {
            Member::Named(ref member) => member.unraw().to_string(),
            Member::Unnamed(ref member) => member.index.to_string(),
        }
    }
}

pub fn print_list<'a>(list: impl IntoIterator<Item = &'a str>) -> String {
    list.into_iter()
        .map(|item| format!("`{}`", item))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn parse_comma_separated2<T: Parse>(
    tokens: TokenStream,
) -> Result<Punctuated<T, Token![,]>, syn::Error> {
    struct ParsePunctuated<T> {
        value: Punctuated<T, Token![,]>,
    }

    impl<T: Parse> Parse for ParsePunctuated<T> {
        fn parse(input: ParseStream) -> parse::Result<Self> {
            Ok(ParsePunctuated {
                value: input.parse_terminated(T::parse, Token![,])?,
            })
        }
    }

    Ok(syn::parse2::<ParsePunctuated<T>>(tokens)?.value)
}
