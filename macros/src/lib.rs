/*!
Implementation details for `emit_source`'s `#[event_interface]` attribute.

This crate is not intended to be consumed directly.
*/

extern crate proc_macro;

#[macro_use]
extern crate quote;

#[macro_use]
extern crate syn;

use proc_macro2::TokenStream;

mod args;
mod interface;
mod util;

/**
Define an event interface from a trait.

See the `emit_source` crate for details.
*/
#[proc_macro_attribute]
pub fn event_interface(
    args: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    base_emit(interface::expand_tokens(interface::ExpandTokens {
        input: TokenStream::from(args),
        item: TokenStream::from(item),
    }))
}

fn base_emit(r: Result<TokenStream, syn::Error>) -> proc_macro::TokenStream {
    proc_macro::TokenStream::from(match r {
        Ok(tokens) => tokens,
        Err(err) => err.into_compile_error(),
    })
}
