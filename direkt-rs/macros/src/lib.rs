//! Derive macros for direkt-rs. Use `#[derive(Action)]` so you don't need `impl Action for T { .. }`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, LitStr};

/// Implements the `Action` trait. The action name is the type name unless
/// overridden with `#[action(name = "Order")]`.
#[proc_macro_derive(Action, attributes(action))]
pub fn derive_action(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_action(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_action(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let ident = &input.ident;
    let mut action_name = ident.to_string();

    for attr in &input.attrs {
        if !attr.path().is_ident("action") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                action_name = lit.value();
                Ok(())
            } else {
                Err(meta.error("unsupported action attribute, expected `name = \"...\"`"))
            }
        })?;
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::direkt_rs::Action for #ident #ty_generics #where_clause {
            fn name() -> &'static str {
                #action_name
            }
        }
    })
}
