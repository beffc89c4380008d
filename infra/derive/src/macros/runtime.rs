use proc_macro2::TokenStream;
use quote::quote;
use syn::{Error, Ident, ItemFn, ReturnType, Type};

const PROFILES: &[&str] = &["default", "high_performance", "memory_efficient"];

/// Expands `#[shortly_runtime::main(profile)]` into a synchronous `main` that
/// builds the tuned runtime and blocks on the original body.
pub fn expand_main(args: TokenStream, input: ItemFn) -> TokenStream {
    if input.sig.asyncness.is_none() {
        return Error::new_spanned(input.sig.fn_token, "#[shortly_runtime::main] requires an async fn")
            .to_compile_error();
    }
    if !returns_result(&input.sig.output) {
        return Error::new_spanned(
            &input.sig,
            "#[shortly_runtime::main] requires the function to return a Result",
        )
        .to_compile_error();
    }

    let profile = match profile_constructor(args) {
        Ok(profile) => profile,
        Err(err) => return err.to_compile_error(),
    };

    let ItemFn { attrs, vis, sig, block } = input;
    let name = &sig.ident;
    let output = &sig.output;

    quote! {
        #(#attrs)*
        #vis fn #name() #output {
            let runtime = ::shortly_runtime::build_runtime_with_config(&#profile)?;
            runtime.block_on(async move #block)
        }
    }
}

fn profile_constructor(args: TokenStream) -> syn::Result<TokenStream> {
    if args.is_empty() {
        return Ok(quote! { ::shortly_runtime::RuntimeConfig::default() });
    }

    let ident: Ident = syn::parse2(args)?;
    let name = ident.to_string();
    if !PROFILES.contains(&name.as_str()) {
        return Err(Error::new_spanned(
            ident,
            format!("unknown runtime profile, expected one of: {}", PROFILES.join(", ")),
        ));
    }

    Ok(quote! { ::shortly_runtime::RuntimeConfig::#ident() })
}

fn returns_result(output: &ReturnType) -> bool {
    let ReturnType::Type(_, ty) = output else {
        return false;
    };
    let Type::Path(path) = ty.as_ref() else {
        return false;
    };
    path.path.segments.last().is_some_and(|segment| segment.ident == "Result")
}
