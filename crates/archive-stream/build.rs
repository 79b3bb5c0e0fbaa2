//! Locates the native libarchive installation and emits its link flags.

fn main() {
    println!("cargo:rerun-if-env-changed=LIBARCHIVE_NO_PKG_CONFIG");

    if std::env::var_os("LIBARCHIVE_NO_PKG_CONFIG").is_none() {
        match pkg_config::Config::new()
            .atleast_version("3.0.0")
            .probe("libarchive")
        {
            Ok(_) => return,
            Err(e) => println!("cargo:warning=pkg-config could not find libarchive: {e}"),
        }
    }

    // Fall back to whatever the system linker can resolve on its own.
    println!("cargo:rustc-link-lib=archive");
}
