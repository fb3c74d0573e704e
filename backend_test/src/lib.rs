use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one and inject
/// dependencies.
///
/// Every test gets a fresh server over its own in-memory store. Injectable
/// dependencies are [`rocket::local::asynchronous::Client`] and
/// [`crate::store::MemoryStore`], the latter sharing state with the server.
#[proc_macro_attribute]
pub fn backend_test(_args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            // Tests enter backend code, so enable logging.
            log4rs_test_utils::test_logging::init_logging_once_for(
                ["geopoll_backend"],
                None,
                None,
            );

            /// Test setup.
            async fn setup() -> (rocket::local::asynchronous::Client, crate::store::MemoryStore) {
                let store = crate::store::MemoryStore::new();
                let rocket_client = rocket::local::asynchronous::Client::tracked(crate::rocket_for_store(store.clone()))
                    .await
                    .unwrap();
                (rocket_client, store)
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                #[allow(unused_variables)]
                let (rocket_client, store) = setup().await;
                #new_name(#(#test_args),*).await;
            });
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_store = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(_) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    // Valid as the last path segment for any type is itself
                    let type_ident = &type_path.path.segments.last().unwrap().ident;
                    if type_ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    } else if type_ident == "MemoryStore" {
                        if has_store {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `MemoryStore`",
                            ));
                        }
                        has_store = true;
                        args.push(quote! { store.clone() });
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client` or `store_ident: MemoryStore`",
        ));
    }

    Ok(args)
}
