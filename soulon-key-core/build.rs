fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rustc-check-cfg=cfg(has_hardware_keystore)");
    println!("cargo:rustc-check-cfg=cfg(has_biometric_auth)");

    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_else(|_| "unknown".to_string());

    // Targets whose platform ships a hardware-backed keystore and a presence prompt
    match target_os.as_str() {
        "ios" | "macos" => {
            println!("cargo:rustc-cfg=has_hardware_keystore");
            println!("cargo:rustc-cfg=has_biometric_auth");
        }
        "android" => {
            println!("cargo:rustc-cfg=has_hardware_keystore");
            println!("cargo:rustc-cfg=has_biometric_auth");
        }
        "windows" => {
            println!("cargo:rustc-cfg=has_biometric_auth");
        }
        _ => {}
    }
}
