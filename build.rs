use std::env;

// Mirror the gdal crate's version gates so the optional band types only
// compile against a libgdal that has them.
fn main() {
    println!("cargo:rustc-check-cfg=cfg(gdal_has_int64)");
    println!("cargo:rustc-check-cfg=cfg(gdal_has_int8)");

    let Some(version) = env::var("DEP_GDAL_VERSION_NUMBER")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
    else {
        return;
    };
    let major = version / 1_000_000;
    let minor = (version - major * 1_000_000) / 10_000;

    // Same conditions the gdal crate uses for its own cfgs
    if major >= 3 && minor >= 5 {
        println!("cargo:rustc-cfg=gdal_has_int64");
    }
    if (major >= 3 && minor >= 7) || major >= 4 {
        println!("cargo:rustc-cfg=gdal_has_int8");
    }
}
