use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ItemStruct;

/// Splits a slice declaration into `<Name>Inner` (the fields) and an `Arc`
/// handle `<Name>` that the kernel registry can store and hand back out.
pub fn expand_slice(input: ItemStruct) -> TokenStream {
    if !matches!(input.fields, syn::Fields::Named(_)) {
        return syn::Error::new_spanned(&input.ident, "shortly_slice requires named fields")
            .to_compile_error();
    }

    let ItemStruct { attrs, vis, ident, generics, fields, .. } = &input;
    if !generics.params.is_empty() {
        return syn::Error::new_spanned(generics, "shortly_slice does not support generics")
            .to_compile_error();
    }

    let inner = format_ident!("{ident}Inner");
    let registry = quote! { ::shortly_kernel::domain::registry };

    quote! {
        #(#attrs)*
        #[derive(Debug)]
        #vis struct #inner #fields

        #[derive(Debug, Clone)]
        #vis struct #ident {
            inner: ::std::sync::Arc<#inner>,
        }

        impl #ident {
            #[must_use]
            pub fn new(inner: #inner) -> Self {
                Self { inner: ::std::sync::Arc::new(inner) }
            }
        }

        impl ::std::convert::From<#inner> for #ident {
            fn from(inner: #inner) -> Self {
                Self::new(inner)
            }
        }

        impl ::std::ops::Deref for #ident {
            type Target = #inner;

            fn deref(&self) -> &Self::Target {
                &self.inner
            }
        }

        impl #registry::FeatureSlice for #ident {
            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn name(&self) -> &'static str {
                stringify!(#ident)
            }
        }

        impl ::std::convert::From<#ident> for #registry::InitializedSlice {
            fn from(slice: #ident) -> Self {
                Self::new(slice)
            }
        }
    }
}
