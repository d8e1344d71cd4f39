//! Procedural macros for the ipcsim simulator.
//!
//! - `#[derive(Label)]`: Implements `ipcsim::Label` for an enum, returning the
//!   variant name. Used for log fields and report messages.
//!
//! Usage:
//! ```rust,ignore
//! use ipcsim::Label;
//!
//! #[derive(Label)]
//! enum Severity { Medium, High, Critical }
//!
//! assert_eq!(Severity::High.label(), "High");
//! ```
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

#[proc_macro_derive(Label)]
pub fn derive_label(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let ident = input.ident.clone();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Enum(data_enum) => {
            let match_arms = data_enum.variants.iter().map(|variant| {
                let variant_ident = &variant.ident;
                let variant_name = variant_ident.to_string();

                let pattern = match &variant.fields {
                    Fields::Unit => quote! { Self::#variant_ident },
                    Fields::Unnamed(_) => quote! { Self::#variant_ident(..) },
                    Fields::Named(_) => quote! { Self::#variant_ident { .. } },
                };

                quote! {
                    #pattern => ::std::borrow::Cow::Borrowed(#variant_name)
                }
            });

            quote! {
                match self {
                    #(#match_arms),*
                }
            }
        }
        // Structs and unions are labelled with the type name
        _ => type_name_label(&ident),
    };

    let expanded = quote! {
        impl #impl_generics ipcsim::Label for #ident #ty_generics #where_clause {
            fn label(&self) -> ::std::borrow::Cow<'static, str> {
                #body
            }
        }
    };
    TokenStream::from(expanded)
}

fn type_name_label(ident: &syn::Ident) -> TokenStream2 {
    let name = ident.to_string();
    quote! { ::std::borrow::Cow::Borrowed(#name) }
}
