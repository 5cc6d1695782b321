//! Test attribute macros for the mcast test suite.
//!
//! Raw IGMP tests open `SOCK_RAW` sockets, which needs CAP_NET_RAW. The
//! `#[requires_root]` attribute turns a missing privilege into an explicit
//! skip message instead of an opaque `EPERM` from deep inside the transport.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn};

/// Require root privileges for this test.
///
/// ```ignore
/// use mcast_test_macros::requires_root;
///
/// #[tokio::test]
/// #[ignore]
/// #[requires_root]
/// async fn test_raw_report_reaches_loopback() {
///     // opens a raw IGMP socket
/// }
/// ```
///
/// The body is left untouched; a euid check is inserted in front of it.
/// Tests using this attribute must have `nix` (feature `user`) available.
#[proc_macro_attribute]
pub fn requires_root(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;
    let name = sig.ident.to_string();

    let output = quote! {
        #(#attrs)*
        #vis #sig {
            if !nix::unistd::geteuid().is_root() {
                panic!(
                    "SKIPPED: {} opens raw sockets and needs root - run with: sudo -E cargo test -- --ignored {}",
                    #name,
                    #name
                );
            }

            #block
        }
    };

    output.into()
}
